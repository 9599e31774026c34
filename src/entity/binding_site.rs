use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{entity_identity, Column, Entity, Table};
use crate::adaptor::{FetchArgs, PeptideAdaptor};
use crate::config::Schema;
use crate::db::Credo;
use crate::entity::Peptide;
use crate::error::Result;
use crate::sql::{ColumnRef, Expr};

/// A residue lining a ligand's binding site.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct BindingSiteResidue {
    pub ligand_id: i32,
    pub residue_id: i32,
    pub entity_type_bm: i32,
    pub is_binding: bool,
}

impl BindingSiteResidue {
    pub const LIGAND_ID: ColumnRef = ColumnRef::new("binding_site_residues", "ligand_id");
    pub const RESIDUE_ID: ColumnRef = ColumnRef::new("binding_site_residues", "residue_id");
    pub const IS_BINDING: ColumnRef = ColumnRef::new("binding_site_residues", "is_binding");

    const COLUMNS: &'static [Column] = &[
        Column::eager("ligand_id"),
        Column::eager("residue_id"),
        Column::eager("entity_type_bm"),
        Column::eager("is_binding"),
    ];
}

impl Entity for BindingSiteResidue {
    const TABLE: Table = Table {
        schema: Schema::Credo,
        name: "binding_site_residues",
        primary_key: &["ligand_id", "residue_id"],
        columns: Self::COLUMNS,
        partitioned: false,
    };

    type Key = (i32, i32);

    fn primary_key(&self) -> (i32, i32) {
        (self.ligand_id, self.residue_id)
    }

    fn key_filter(&self) -> Expr {
        Expr::and([
            Self::LIGAND_ID.eq(self.ligand_id),
            Self::RESIDUE_ID.eq(self.residue_id),
        ])
    }
}

/// A domain overlapping a ligand's binding site.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct BindingSiteDomain {
    pub ligand_id: i32,
    pub domain_id: i32,
}

impl BindingSiteDomain {
    pub const LIGAND_ID: ColumnRef = ColumnRef::new("binding_site_domains", "ligand_id");
    pub const DOMAIN_ID: ColumnRef = ColumnRef::new("binding_site_domains", "domain_id");

    const COLUMNS: &'static [Column] = &[Column::eager("ligand_id"), Column::eager("domain_id")];
}

impl Entity for BindingSiteDomain {
    const TABLE: Table = Table {
        schema: Schema::Credo,
        name: "binding_site_domains",
        primary_key: &["ligand_id", "domain_id"],
        columns: Self::COLUMNS,
        partitioned: false,
    };

    type Key = (i32, i32);

    fn primary_key(&self) -> (i32, i32) {
        (self.ligand_id, self.domain_id)
    }

    fn key_filter(&self) -> Expr {
        Expr::and([
            Self::LIGAND_ID.eq(self.ligand_id),
            Self::DOMAIN_ID.eq(self.domain_id),
        ])
    }
}

/// FuzCav pharmacophore fingerprints of a binding site.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct BindingSiteFuzcav {
    pub ligand_id: i32,
    pub calpha: Vec<i32>,
    pub rep: Option<Vec<i32>>,
}

impl BindingSiteFuzcav {
    pub const LIGAND_ID: ColumnRef = ColumnRef::new("binding_site_fuzcav", "ligand_id");
    pub const CALPHA: ColumnRef = ColumnRef::new("binding_site_fuzcav", "calpha");
    pub const REP: ColumnRef = ColumnRef::new("binding_site_fuzcav", "rep");

    const COLUMNS: &'static [Column] = &[
        Column::eager("ligand_id"),
        Column::eager("calpha"),
        Column::eager("rep"),
    ];

    /// Number of set features in the C-alpha fingerprint.
    pub fn calpha_bits(&self) -> usize {
        self.calpha.iter().filter(|&&count| count > 0).count()
    }
}

impl Entity for BindingSiteFuzcav {
    const TABLE: Table = Table {
        schema: Schema::Credo,
        name: "binding_site_fuzcav",
        primary_key: &["ligand_id"],
        columns: Self::COLUMNS,
        partitioned: false,
    };

    type Key = i32;

    fn primary_key(&self) -> i32 {
        self.ligand_id
    }

    fn key_filter(&self) -> Expr {
        Self::LIGAND_ID.eq(self.ligand_id)
    }
}

/// A CATH, SCOP or Pfam domain.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Domain {
    pub domain_id: i32,
    pub db_source: String,
    pub db_accession_id: String,
    pub description: Option<String>,
}

impl Domain {
    pub const DOMAIN_ID: ColumnRef = ColumnRef::new("domains", "domain_id");
    pub const DB_SOURCE: ColumnRef = ColumnRef::new("domains", "db_source");
    pub const DB_ACCESSION_ID: ColumnRef = ColumnRef::new("domains", "db_accession_id");

    const COLUMNS: &'static [Column] = &[
        Column::eager("domain_id"),
        Column::eager("db_source"),
        Column::eager("db_accession_id"),
        Column::eager("description"),
    ];

    pub async fn peptides(&self, credo: &Credo, args: FetchArgs) -> Result<Vec<Peptide>> {
        PeptideAdaptor::new(credo.clone())
            .fetch_all_by_domain_id(self.domain_id, args)
            .await?
            .collect(credo)
            .await
    }
}

impl Entity for Domain {
    const TABLE: Table = Table {
        schema: Schema::Credo,
        name: "domains",
        primary_key: &["domain_id"],
        columns: Self::COLUMNS,
        partitioned: false,
    };

    type Key = i32;

    fn primary_key(&self) -> i32 {
        self.domain_id
    }

    fn key_filter(&self) -> Expr {
        Self::DOMAIN_ID.eq(self.domain_id)
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DomainPeptide {
    pub domain_id: i32,
    pub residue_id: i32,
}

impl DomainPeptide {
    pub const DOMAIN_ID: ColumnRef = ColumnRef::new("domain_peptides", "domain_id");
    pub const RESIDUE_ID: ColumnRef = ColumnRef::new("domain_peptides", "residue_id");

    const COLUMNS: &'static [Column] = &[Column::eager("domain_id"), Column::eager("residue_id")];
}

impl Entity for DomainPeptide {
    const TABLE: Table = Table {
        schema: Schema::Credo,
        name: "domain_peptides",
        primary_key: &["domain_id", "residue_id"],
        columns: Self::COLUMNS,
        partitioned: false,
    };

    type Key = (i32, i32);

    fn primary_key(&self) -> (i32, i32) {
        (self.domain_id, self.residue_id)
    }

    fn key_filter(&self) -> Expr {
        Expr::and([
            Self::DOMAIN_ID.eq(self.domain_id),
            Self::RESIDUE_ID.eq(self.residue_id),
        ])
    }
}

entity_identity!(
    BindingSiteResidue,
    BindingSiteDomain,
    BindingSiteFuzcav,
    Domain,
    DomainPeptide
);
