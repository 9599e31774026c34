use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{entity_identity, load_deferred, Column, Entity, Partitioned, PathEntity, Table};
use crate::adaptor::{
    FetchArgs, InterfaceAdaptor, LigandAdaptor, ProtFragmentAdaptor, ResidueAdaptor, SiftAdaptor,
    ResidueSift, XRefAdaptor,
};
use crate::config::Schema;
use crate::db::Credo;
use crate::entity::{Biomolecule, Interface, Ligand, Residue, XRef};
use crate::error::Result;
use crate::sql::{ColumnRef, Expr};

/// A polymer chain of a biomolecule.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Chain {
    pub chain_id: i32,
    pub biomolecule_id: i32,
    pub path: Option<String>,
    pub pdb_chain_id: String,
    pub pdb_chain_asu_id: Option<String>,
    pub chain_type: Option<String>,
    pub chain_length: Option<i32>,
    pub is_at_identity: Option<bool>,
    pub has_disordered_regions: Option<bool>,
    pub rotation: Option<Vec<f64>>,
    pub translation: Option<Vec<f64>>,
    #[sqlx(default)]
    pub title: Option<String>,
    #[sqlx(default)]
    pub seq: Option<String>,
    #[sqlx(default)]
    pub seq_md5: Option<String>,
}

impl Chain {
    pub const CHAIN_ID: ColumnRef = ColumnRef::new("chains", "chain_id");
    pub const BIOMOLECULE_ID: ColumnRef = ColumnRef::new("chains", "biomolecule_id");
    pub const PATH: ColumnRef = ColumnRef::new("chains", "path");
    pub const PDB_CHAIN_ID: ColumnRef = ColumnRef::new("chains", "pdb_chain_id");
    pub const CHAIN_TYPE: ColumnRef = ColumnRef::new("chains", "chain_type");
    pub const CHAIN_LENGTH: ColumnRef = ColumnRef::new("chains", "chain_length");
    pub const SEQ_MD5: ColumnRef = ColumnRef::new("chains", "seq_md5");

    const COLUMNS: &'static [Column] = &[
        Column::eager("chain_id"),
        Column::eager("biomolecule_id"),
        Column::text("path"),
        Column::eager("pdb_chain_id"),
        Column::eager("pdb_chain_asu_id"),
        Column::eager("chain_type"),
        Column::eager("chain_length"),
        Column::eager("is_at_identity"),
        Column::eager("has_disordered_regions"),
        Column::floats("rotation"),
        Column::floats("translation"),
        Column::deferred("title"),
        Column::deferred("seq"),
        Column::deferred("seq_md5"),
    ];

    pub async fn load_title(&mut self, credo: &Credo) -> Result<Option<&str>> {
        if self.title.is_none() {
            self.title = load_deferred(credo, self, "title").await?;
        }
        Ok(self.title.as_deref())
    }

    pub async fn load_seq(&mut self, credo: &Credo) -> Result<Option<&str>> {
        if self.seq.is_none() {
            self.seq = load_deferred(credo, self, "seq").await?;
        }
        Ok(self.seq.as_deref())
    }

    pub async fn load_seq_md5(&mut self, credo: &Credo) -> Result<Option<&str>> {
        if self.seq_md5.is_none() {
            self.seq_md5 = load_deferred(credo, self, "seq_md5").await?;
        }
        Ok(self.seq_md5.as_deref())
    }

    pub fn is_protein(&self) -> bool {
        self.chain_type
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case("polypeptide(L)") || t.eq_ignore_ascii_case("protein"))
    }

    pub async fn biomolecule(&self, credo: &Credo) -> Result<Option<Biomolecule>> {
        crate::adaptor::BiomoleculeAdaptor::new(credo.clone())
            .fetch_by_biomolecule_id(self.biomolecule_id)
            .await
    }

    pub async fn residues(&self, credo: &Credo, args: FetchArgs) -> Result<Vec<Residue>> {
        ResidueAdaptor::new(credo.clone())
            .fetch_all_by_chain_id(self.chain_id, args)
            .await?
            .collect(credo)
            .await
    }

    /// Looks up a residue by number and insertion code (`' '` when none).
    pub async fn residue(&self, credo: &Credo, res_num: i32, ins_code: &str) -> Result<Option<Residue>> {
        ResidueAdaptor::new(credo.clone())
            .fetch_by_chain_id_and_res_num(self.chain_id, res_num, ins_code)
            .await
    }

    /// Residues keyed by `(res_num, ins_code)`.
    pub async fn residue_map(&self, credo: &Credo) -> Result<BTreeMap<(i32, String), Residue>> {
        Ok(self
            .residues(credo, FetchArgs::default())
            .await?
            .into_iter()
            .map(|r| ((r.res_num, r.ins_code.clone()), r))
            .collect())
    }

    pub async fn ligands(&self, credo: &Credo, args: FetchArgs) -> Result<Vec<Ligand>> {
        LigandAdaptor::new(credo.clone())
            .fetch_all_by_chain_id(self.chain_id, self.biomolecule_id, args)
            .await?
            .collect(credo)
            .await
    }

    pub async fn interfaces(&self, credo: &Credo) -> Result<Vec<Interface>> {
        InterfaceAdaptor::new(credo.clone())
            .fetch_all_by_chain_id(self.chain_id, FetchArgs::default())
            .await?
            .collect(credo)
            .await
    }

    pub async fn prot_fragments(&self, credo: &Credo) -> Result<Vec<ProtFragment>> {
        ProtFragmentAdaptor::new(credo.clone())
            .fetch_all_by_chain_id(self.chain_id, FetchArgs::default())
            .await?
            .collect(credo)
            .await
    }

    pub async fn xrefs(&self, credo: &Credo) -> Result<Vec<XRef>> {
        XRefAdaptor::new(credo.clone())
            .fetch_all_by_entity("Chain", self.chain_id, FetchArgs::default())
            .await?
            .collect(credo)
            .await
    }

    /// Per-residue interaction fingerprint of this chain's contacts with
    /// other entities.
    pub async fn sift(&self, credo: &Credo, args: FetchArgs) -> Result<Vec<ResidueSift>> {
        SiftAdaptor::new(credo.clone())
            .fetch_all_by_chain_id(self.chain_id, self.biomolecule_id, args)
            .await?
            .collect(credo)
            .await
    }
}

impl Entity for Chain {
    const TABLE: Table = Table {
        schema: Schema::Credo,
        name: "chains",
        primary_key: &["chain_id"],
        columns: Self::COLUMNS,
        partitioned: false,
    };

    type Key = i32;

    fn primary_key(&self) -> i32 {
        self.chain_id
    }

    fn key_filter(&self) -> Expr {
        Self::CHAIN_ID.eq(self.chain_id)
    }
}

impl PathEntity for Chain {
    const PATH: ColumnRef = Chain::PATH;
}

impl Partitioned for Chain {
    fn biomolecule_id(&self) -> i32 {
        self.biomolecule_id
    }
}

/// A secondary-structure fragment of a protein chain.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ProtFragment {
    pub prot_fragment_id: i32,
    pub biomolecule_id: i32,
    pub chain_id: i32,
    pub path: Option<String>,
    pub sstruct_serial: i32,
    pub sstruct: Option<String>,
    pub fragment_size: Option<i32>,
    pub fragment_seq: Option<String>,
    pub prot_fragment_nterm_id: Option<i32>,
    pub prot_fragment_cterm_id: Option<i32>,
}

impl ProtFragment {
    pub const PROT_FRAGMENT_ID: ColumnRef = ColumnRef::new("prot_fragments", "prot_fragment_id");
    pub const BIOMOLECULE_ID: ColumnRef = ColumnRef::new("prot_fragments", "biomolecule_id");
    pub const CHAIN_ID: ColumnRef = ColumnRef::new("prot_fragments", "chain_id");
    pub const PATH: ColumnRef = ColumnRef::new("prot_fragments", "path");
    pub const SSTRUCT: ColumnRef = ColumnRef::new("prot_fragments", "sstruct");
    pub const SSTRUCT_SERIAL: ColumnRef = ColumnRef::new("prot_fragments", "sstruct_serial");

    const COLUMNS: &'static [Column] = &[
        Column::eager("prot_fragment_id"),
        Column::eager("biomolecule_id"),
        Column::eager("chain_id"),
        Column::text("path"),
        Column::eager("sstruct_serial"),
        Column::eager("sstruct"),
        Column::eager("fragment_size"),
        Column::eager("fragment_seq"),
        Column::eager("prot_fragment_nterm_id"),
        Column::eager("prot_fragment_cterm_id"),
    ];

    pub async fn residues(&self, credo: &Credo, args: FetchArgs) -> Result<Vec<Residue>> {
        ResidueAdaptor::new(credo.clone())
            .fetch_all_by_prot_fragment_id(self.prot_fragment_id, args)
            .await?
            .collect(credo)
            .await
    }

    async fn neighbour(&self, credo: &Credo, id: Option<i32>) -> Result<Option<ProtFragment>> {
        match id {
            Some(id) => {
                ProtFragmentAdaptor::new(credo.clone())
                    .fetch_by_prot_fragment_id(id)
                    .await
            }
            None => Ok(None),
        }
    }

    /// The fragment preceding this one in the chain.
    pub async fn nterm(&self, credo: &Credo) -> Result<Option<ProtFragment>> {
        self.neighbour(credo, self.prot_fragment_nterm_id).await
    }

    pub async fn cterm(&self, credo: &Credo) -> Result<Option<ProtFragment>> {
        self.neighbour(credo, self.prot_fragment_cterm_id).await
    }
}

impl Entity for ProtFragment {
    const TABLE: Table = Table {
        schema: Schema::Credo,
        name: "prot_fragments",
        primary_key: &["prot_fragment_id"],
        columns: Self::COLUMNS,
        partitioned: false,
    };

    type Key = i32;

    fn primary_key(&self) -> i32 {
        self.prot_fragment_id
    }

    fn key_filter(&self) -> Expr {
        Self::PROT_FRAGMENT_ID.eq(self.prot_fragment_id)
    }
}

impl PathEntity for ProtFragment {
    const PATH: ColumnRef = ProtFragment::PATH;
}

entity_identity!(Chain, ProtFragment);
