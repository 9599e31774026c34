use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{entity_identity, Column, Entity, Partitioned, PathEntity, Table};
use crate::adaptor::{ChainAdaptor, ContactAdaptor, FetchArgs, ResidueAdaptor};
use crate::config::Schema;
use crate::db::Credo;
use crate::entity::{Chain, Contact, Residue};
use crate::error::Result;
use crate::sql::{ColumnRef, Expr};

/// A binary protein-protein interface between two chains of a biomolecule.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Interface {
    pub interface_id: i32,
    pub biomolecule_id: i32,
    pub path: Option<String>,
    pub chain_bgn_id: i32,
    pub chain_end_id: i32,
    pub num_res_bgn: Option<i32>,
    pub num_res_end: Option<i32>,
    pub num_contacts: Option<i32>,
    pub num_hbonds: Option<i32>,
    pub is_homo_dimer: Option<bool>,
}

impl Interface {
    pub const INTERFACE_ID: ColumnRef = ColumnRef::new("interfaces", "interface_id");
    pub const BIOMOLECULE_ID: ColumnRef = ColumnRef::new("interfaces", "biomolecule_id");
    pub const PATH: ColumnRef = ColumnRef::new("interfaces", "path");
    pub const CHAIN_BGN_ID: ColumnRef = ColumnRef::new("interfaces", "chain_bgn_id");
    pub const CHAIN_END_ID: ColumnRef = ColumnRef::new("interfaces", "chain_end_id");
    pub const IS_HOMO_DIMER: ColumnRef = ColumnRef::new("interfaces", "is_homo_dimer");

    const COLUMNS: &'static [Column] = &[
        Column::eager("interface_id"),
        Column::eager("biomolecule_id"),
        Column::text("path"),
        Column::eager("chain_bgn_id"),
        Column::eager("chain_end_id"),
        Column::eager("num_res_bgn"),
        Column::eager("num_res_end"),
        Column::eager("num_contacts"),
        Column::eager("num_hbonds"),
        Column::eager("is_homo_dimer"),
    ];

    pub fn involves(&self, chain_id: i32) -> bool {
        self.chain_bgn_id == chain_id || self.chain_end_id == chain_id
    }

    pub async fn chain_bgn(&self, credo: &Credo) -> Result<Option<Chain>> {
        ChainAdaptor::new(credo.clone())
            .fetch_by_chain_id(self.chain_bgn_id)
            .await
    }

    pub async fn chain_end(&self, credo: &Credo) -> Result<Option<Chain>> {
        ChainAdaptor::new(credo.clone())
            .fetch_by_chain_id(self.chain_end_id)
            .await
    }

    /// Residues of either chain that take part in the interface.
    pub async fn residues(&self, credo: &Credo, args: FetchArgs) -> Result<Vec<Residue>> {
        ResidueAdaptor::new(credo.clone())
            .fetch_all_by_interface_id(self.interface_id, self.biomolecule_id, args)
            .await?
            .collect(credo)
            .await
    }

    pub async fn contacts(&self, credo: &Credo, args: FetchArgs) -> Result<Vec<Contact>> {
        ContactAdaptor::new(credo.clone())
            .fetch_all_by_chain_pair(self.chain_bgn_id, self.chain_end_id, self.biomolecule_id, args)
            .await?
            .collect(credo)
            .await
    }
}

impl Entity for Interface {
    const TABLE: Table = Table {
        schema: Schema::Credo,
        name: "interfaces",
        primary_key: &["interface_id"],
        columns: Self::COLUMNS,
        partitioned: false,
    };

    type Key = i32;

    fn primary_key(&self) -> i32 {
        self.interface_id
    }

    fn key_filter(&self) -> Expr {
        Self::INTERFACE_ID.eq(self.interface_id)
    }
}

impl PathEntity for Interface {
    const PATH: ColumnRef = Interface::PATH;
}

impl Partitioned for Interface {
    fn biomolecule_id(&self) -> i32 {
        self.biomolecule_id
    }
}

/// A protein-nucleic acid interaction.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Groove {
    pub groove_id: i32,
    pub biomolecule_id: i32,
    pub path: Option<String>,
    pub chain_prot_id: i32,
    pub chain_nuc_id: i32,
    pub num_res_prot: Option<i32>,
    pub num_res_nuc: Option<i32>,
    pub num_contacts: Option<i32>,
    pub is_dsdna: Option<bool>,
}

impl Groove {
    pub const GROOVE_ID: ColumnRef = ColumnRef::new("grooves", "groove_id");
    pub const BIOMOLECULE_ID: ColumnRef = ColumnRef::new("grooves", "biomolecule_id");
    pub const PATH: ColumnRef = ColumnRef::new("grooves", "path");
    pub const CHAIN_PROT_ID: ColumnRef = ColumnRef::new("grooves", "chain_prot_id");
    pub const CHAIN_NUC_ID: ColumnRef = ColumnRef::new("grooves", "chain_nuc_id");
    pub const IS_DSDNA: ColumnRef = ColumnRef::new("grooves", "is_dsdna");

    const COLUMNS: &'static [Column] = &[
        Column::eager("groove_id"),
        Column::eager("biomolecule_id"),
        Column::text("path"),
        Column::eager("chain_prot_id"),
        Column::eager("chain_nuc_id"),
        Column::eager("num_res_prot"),
        Column::eager("num_res_nuc"),
        Column::eager("num_contacts"),
        Column::eager("is_dsdna"),
    ];

    pub async fn chain_prot(&self, credo: &Credo) -> Result<Option<Chain>> {
        ChainAdaptor::new(credo.clone())
            .fetch_by_chain_id(self.chain_prot_id)
            .await
    }

    pub async fn chain_nuc(&self, credo: &Credo) -> Result<Option<Chain>> {
        ChainAdaptor::new(credo.clone())
            .fetch_by_chain_id(self.chain_nuc_id)
            .await
    }

    pub async fn contacts(&self, credo: &Credo, args: FetchArgs) -> Result<Vec<Contact>> {
        ContactAdaptor::new(credo.clone())
            .fetch_all_by_chain_pair(self.chain_prot_id, self.chain_nuc_id, self.biomolecule_id, args)
            .await?
            .collect(credo)
            .await
    }
}

impl Entity for Groove {
    const TABLE: Table = Table {
        schema: Schema::Credo,
        name: "grooves",
        primary_key: &["groove_id"],
        columns: Self::COLUMNS,
        partitioned: false,
    };

    type Key = i32;

    fn primary_key(&self) -> i32 {
        self.groove_id
    }

    fn key_filter(&self) -> Expr {
        Self::GROOVE_ID.eq(self.groove_id)
    }
}

impl PathEntity for Groove {
    const PATH: ColumnRef = Groove::PATH;
}

impl Partitioned for Groove {
    fn biomolecule_id(&self) -> i32 {
        self.biomolecule_id
    }
}

entity_identity!(Interface, Groove);
