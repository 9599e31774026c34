use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{entity_identity, Column, Entity, Table};
use crate::adaptor::{FetchArgs, LigandAdaptor, PhenotypeAdaptor};
use crate::config::Schema;
use crate::db::Credo;
use crate::entity::Ligand;
use crate::error::Result;
use crate::sql::{ColumnRef, Expr};

/// A genetic variant (dbSNP / Ensembl variation).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Variation {
    pub variation_id: i32,
    pub variation_name: String,
    pub source: Option<String>,
    pub is_somatic: Option<bool>,
    pub validation_status: Option<String>,
}

impl Variation {
    pub const VARIATION_ID: ColumnRef = ColumnRef::new("variations", "variation_id");
    pub const VARIATION_NAME: ColumnRef = ColumnRef::new("variations", "variation_name");
    pub const SOURCE: ColumnRef = ColumnRef::new("variations", "source");
    pub const IS_SOMATIC: ColumnRef = ColumnRef::new("variations", "is_somatic");

    const COLUMNS: &'static [Column] = &[
        Column::eager("variation_id"),
        Column::eager("variation_name"),
        Column::eager("source"),
        Column::eager("is_somatic"),
        Column::eager("validation_status"),
    ];

    pub async fn phenotypes(&self, credo: &Credo) -> Result<Vec<Phenotype>> {
        PhenotypeAdaptor::new(credo.clone())
            .fetch_all_by_variation_id(self.variation_id, FetchArgs::default())
            .await?
            .collect(credo)
            .await
    }

    /// Ligands whose binding site carries this variant.
    pub async fn ligands(&self, credo: &Credo, args: FetchArgs) -> Result<Vec<Ligand>> {
        LigandAdaptor::new(credo.clone())
            .fetch_all_by_variation_id(self.variation_id, args)
            .await?
            .collect(credo)
            .await
    }
}

impl Entity for Variation {
    const TABLE: Table = Table {
        schema: Schema::Variations,
        name: "variations",
        primary_key: &["variation_id"],
        columns: Self::COLUMNS,
        partitioned: false,
    };

    type Key = i32;

    fn primary_key(&self) -> i32 {
        self.variation_id
    }

    fn key_filter(&self) -> Expr {
        Self::VARIATION_ID.eq(self.variation_id)
    }
}

/// Maps a variant onto a UniProt residue.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Variation2UniProt {
    pub variation_to_uniprot_id: i32,
    pub variation_id: i32,
    pub uniprot: String,
    pub res_num: i32,
    pub peptide_allele_string: Option<String>,
}

impl Variation2UniProt {
    pub const VARIATION_TO_UNIPROT_ID: ColumnRef =
        ColumnRef::new("variation_to_uniprot", "variation_to_uniprot_id");
    pub const VARIATION_ID: ColumnRef = ColumnRef::new("variation_to_uniprot", "variation_id");
    pub const UNIPROT: ColumnRef = ColumnRef::new("variation_to_uniprot", "uniprot");
    pub const RES_NUM: ColumnRef = ColumnRef::new("variation_to_uniprot", "res_num");

    const COLUMNS: &'static [Column] = &[
        Column::eager("variation_to_uniprot_id"),
        Column::eager("variation_id"),
        Column::eager("uniprot"),
        Column::eager("res_num"),
        Column::eager("peptide_allele_string"),
    ];

    /// Reference and variant amino acids, split from `A/B`.
    pub fn alleles(&self) -> Option<(&str, &str)> {
        self.peptide_allele_string.as_deref()?.split_once('/')
    }
}

impl Entity for Variation2UniProt {
    const TABLE: Table = Table {
        schema: Schema::Variations,
        name: "variation_to_uniprot",
        primary_key: &["variation_to_uniprot_id"],
        columns: Self::COLUMNS,
        partitioned: false,
    };

    type Key = i32;

    fn primary_key(&self) -> i32 {
        self.variation_to_uniprot_id
    }

    fn key_filter(&self) -> Expr {
        Self::VARIATION_TO_UNIPROT_ID.eq(self.variation_to_uniprot_id)
    }
}

/// Maps a variant onto a PDB residue through SIFTS.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Variation2PDB {
    pub variation_to_pdb_id: i32,
    pub variation_id: i32,
    pub res_map_id: i32,
}

impl Variation2PDB {
    pub const VARIATION_TO_PDB_ID: ColumnRef =
        ColumnRef::new("variation_to_pdb", "variation_to_pdb_id");
    pub const VARIATION_ID: ColumnRef = ColumnRef::new("variation_to_pdb", "variation_id");
    pub const RES_MAP_ID: ColumnRef = ColumnRef::new("variation_to_pdb", "res_map_id");

    const COLUMNS: &'static [Column] = &[
        Column::eager("variation_to_pdb_id"),
        Column::eager("variation_id"),
        Column::eager("res_map_id"),
    ];
}

impl Entity for Variation2PDB {
    const TABLE: Table = Table {
        schema: Schema::Variations,
        name: "variation_to_pdb",
        primary_key: &["variation_to_pdb_id"],
        columns: Self::COLUMNS,
        partitioned: false,
    };

    type Key = i32;

    fn primary_key(&self) -> i32 {
        self.variation_to_pdb_id
    }

    fn key_filter(&self) -> Expr {
        Self::VARIATION_TO_PDB_ID.eq(self.variation_to_pdb_id)
    }
}

/// A variant falling on a ligand's binding-site residue.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Variation2BindingSite {
    pub variation_id: i32,
    pub ligand_id: i32,
    pub residue_id: i32,
}

impl Variation2BindingSite {
    pub const VARIATION_ID: ColumnRef =
        ColumnRef::new("variation_to_binding_sites", "variation_id");
    pub const LIGAND_ID: ColumnRef = ColumnRef::new("variation_to_binding_sites", "ligand_id");
    pub const RESIDUE_ID: ColumnRef = ColumnRef::new("variation_to_binding_sites", "residue_id");

    const COLUMNS: &'static [Column] = &[
        Column::eager("variation_id"),
        Column::eager("ligand_id"),
        Column::eager("residue_id"),
    ];
}

impl Entity for Variation2BindingSite {
    const TABLE: Table = Table {
        schema: Schema::Variations,
        name: "variation_to_binding_sites",
        primary_key: &["variation_id", "ligand_id", "residue_id"],
        columns: Self::COLUMNS,
        partitioned: false,
    };

    type Key = (i32, i32, i32);

    fn primary_key(&self) -> (i32, i32, i32) {
        (self.variation_id, self.ligand_id, self.residue_id)
    }

    fn key_filter(&self) -> Expr {
        Expr::and([
            Self::VARIATION_ID.eq(self.variation_id),
            Self::LIGAND_ID.eq(self.ligand_id),
            Self::RESIDUE_ID.eq(self.residue_id),
        ])
    }
}

/// Links a variant to a phenotype.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Annotation {
    pub variation_id: i32,
    pub phenotype_id: i32,
    pub study_type: Option<String>,
    pub associated_gene: Option<String>,
}

impl Annotation {
    pub const VARIATION_ID: ColumnRef = ColumnRef::new("annotations", "variation_id");
    pub const PHENOTYPE_ID: ColumnRef = ColumnRef::new("annotations", "phenotype_id");

    const COLUMNS: &'static [Column] = &[
        Column::eager("variation_id"),
        Column::eager("phenotype_id"),
        Column::eager("study_type"),
        Column::eager("associated_gene"),
    ];
}

impl Entity for Annotation {
    const TABLE: Table = Table {
        schema: Schema::Variations,
        name: "annotations",
        primary_key: &["variation_id", "phenotype_id"],
        columns: Self::COLUMNS,
        partitioned: false,
    };

    type Key = (i32, i32);

    fn primary_key(&self) -> (i32, i32) {
        (self.variation_id, self.phenotype_id)
    }

    fn key_filter(&self) -> Expr {
        Expr::and([
            Self::VARIATION_ID.eq(self.variation_id),
            Self::PHENOTYPE_ID.eq(self.phenotype_id),
        ])
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Phenotype {
    pub phenotype_id: i32,
    pub description: String,
}

impl Phenotype {
    pub const PHENOTYPE_ID: ColumnRef = ColumnRef::new("phenotypes", "phenotype_id");
    pub const DESCRIPTION: ColumnRef = ColumnRef::new("phenotypes", "description");

    const COLUMNS: &'static [Column] = &[
        Column::eager("phenotype_id"),
        Column::eager("description"),
    ];
}

impl Entity for Phenotype {
    const TABLE: Table = Table {
        schema: Schema::Variations,
        name: "phenotypes",
        primary_key: &["phenotype_id"],
        columns: Self::COLUMNS,
        partitioned: false,
    };

    type Key = i32;

    fn primary_key(&self) -> i32 {
        self.phenotype_id
    }

    fn key_filter(&self) -> Expr {
        Self::PHENOTYPE_ID.eq(self.phenotype_id)
    }
}

/// SIFTS residue mapping between PDB and UniProt numbering.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ResMap {
    pub res_map_id: i32,
    pub pdb: String,
    pub pdb_chain_id: String,
    pub pdb_res_num: Option<i32>,
    pub pdb_ins_code: Option<String>,
    pub uniprot: Option<String>,
    pub uniprot_res_num: Option<i32>,
}

impl ResMap {
    pub const RES_MAP_ID: ColumnRef = ColumnRef::new("res_map", "res_map_id");
    pub const PDB: ColumnRef = ColumnRef::new("res_map", "pdb");
    pub const PDB_CHAIN_ID: ColumnRef = ColumnRef::new("res_map", "pdb_chain_id");
    pub const UNIPROT: ColumnRef = ColumnRef::new("res_map", "uniprot");
    pub const UNIPROT_RES_NUM: ColumnRef = ColumnRef::new("res_map", "uniprot_res_num");

    const COLUMNS: &'static [Column] = &[
        Column::eager("res_map_id"),
        Column::text("pdb"),
        Column::text("pdb_chain_id"),
        Column::eager("pdb_res_num"),
        Column::eager("pdb_ins_code"),
        Column::eager("uniprot"),
        Column::eager("uniprot_res_num"),
    ];
}

impl Entity for ResMap {
    const TABLE: Table = Table {
        schema: Schema::Pdb,
        name: "res_map",
        primary_key: &["res_map_id"],
        columns: Self::COLUMNS,
        partitioned: false,
    };

    type Key = i32;

    fn primary_key(&self) -> i32 {
        self.res_map_id
    }

    fn key_filter(&self) -> Expr {
        Self::RES_MAP_ID.eq(self.res_map_id)
    }
}

entity_identity!(
    Variation,
    Variation2UniProt,
    Variation2PDB,
    Variation2BindingSite,
    Annotation,
    Phenotype,
    ResMap
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alleles_split_on_slash() {
        let mapping = Variation2UniProt {
            variation_to_uniprot_id: 1,
            variation_id: 2,
            uniprot: "P00519".to_string(),
            res_num: 315,
            peptide_allele_string: Some("T/I".to_string()),
        };
        assert_eq!(mapping.alleles(), Some(("T", "I")));

        let unknown = Variation2UniProt {
            peptide_allele_string: None,
            ..mapping
        };
        assert_eq!(unknown.alleles(), None);
    }
}
