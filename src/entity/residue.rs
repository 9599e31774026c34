use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{entity_identity, Column, Entity, Partitioned, PathEntity, Table};
use crate::adaptor::{
    AromaticRingAdaptor, AtomAdaptor, ChainAdaptor, ContactAdaptor, FetchArgs, PeptideAdaptor,
    ResidueSift, SiftAdaptor, VariationAdaptor,
};
use crate::bitmask::{EntityType, EntityTypes};
use crate::config::Schema;
use crate::db::Credo;
use crate::entity::{AromaticRing, Atom, Chain, Contact, Variation};
use crate::error::Result;
use crate::sql::{ColumnRef, Expr};

/// Insertion code used when a residue has none.
pub const NO_INS_CODE: &str = " ";

/// A residue of any entity type.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Residue {
    pub residue_id: i32,
    pub biomolecule_id: i32,
    pub chain_id: i32,
    pub path: Option<String>,
    pub res_name: String,
    pub res_num: i32,
    pub ins_code: String,
    pub entity_type_bm: i32,
    pub is_disordered: Option<bool>,
    pub is_incomplete: Option<bool>,
}

impl Residue {
    pub const RESIDUE_ID: ColumnRef = ColumnRef::new("residues", "residue_id");
    pub const BIOMOLECULE_ID: ColumnRef = ColumnRef::new("residues", "biomolecule_id");
    pub const CHAIN_ID: ColumnRef = ColumnRef::new("residues", "chain_id");
    pub const PATH: ColumnRef = ColumnRef::new("residues", "path");
    pub const RES_NAME: ColumnRef = ColumnRef::new("residues", "res_name");
    pub const RES_NUM: ColumnRef = ColumnRef::new("residues", "res_num");
    pub const INS_CODE: ColumnRef = ColumnRef::new("residues", "ins_code");
    pub const ENTITY_TYPE_BM: ColumnRef = ColumnRef::new("residues", "entity_type_bm");

    const COLUMNS: &'static [Column] = &[
        Column::eager("residue_id"),
        Column::eager("biomolecule_id"),
        Column::eager("chain_id"),
        Column::text("path"),
        Column::eager("res_name"),
        Column::eager("res_num"),
        Column::eager("ins_code"),
        Column::eager("entity_type_bm"),
        Column::eager("is_disordered"),
        Column::eager("is_incomplete"),
    ];

    pub fn entity_types(&self) -> EntityTypes {
        EntityTypes(self.entity_type_bm)
    }

    pub fn is_a(&self, entity_type: EntityType) -> bool {
        self.entity_types().contains(entity_type)
    }

    /// `SER 72` or `SER 72A`.
    pub fn label(&self) -> String {
        format!("{} {}{}", self.res_name, self.res_num, self.ins_code.trim())
    }

    pub async fn chain(&self, credo: &Credo) -> Result<Option<Chain>> {
        ChainAdaptor::new(credo.clone())
            .fetch_by_chain_id(self.chain_id)
            .await
    }

    /// The entity-specific extension row for this residue.
    pub async fn variant(&self, credo: &Credo) -> Result<ResidueVariant> {
        ResidueVariant::load(credo, self).await
    }

    pub async fn atoms(&self, credo: &Credo, args: FetchArgs) -> Result<Vec<Atom>> {
        AtomAdaptor::new(credo.clone())
            .fetch_all_by_residue_id(self.residue_id, self.biomolecule_id, args)
            .await?
            .collect(credo)
            .await
    }

    pub async fn contacts(&self, credo: &Credo, args: FetchArgs) -> Result<Vec<Contact>> {
        ContactAdaptor::new(credo.clone())
            .fetch_all_by_residue_id(self.residue_id, self.biomolecule_id, args)
            .await?
            .collect(credo)
            .await
    }

    pub async fn aromatic_rings(&self, credo: &Credo) -> Result<Vec<AromaticRing>> {
        AromaticRingAdaptor::new(credo.clone())
            .fetch_all_by_residue_id(self.residue_id, FetchArgs::default())
            .await?
            .collect(credo)
            .await
    }

    /// Interaction fingerprints of the residues this residue is in contact
    /// with.
    pub async fn sift(&self, credo: &Credo, args: FetchArgs) -> Result<Vec<ResidueSift>> {
        SiftAdaptor::new(credo.clone())
            .fetch_all_by_residue_id(self.residue_id, self.biomolecule_id, args)
            .await?
            .collect(credo)
            .await
    }

    pub async fn variations(&self, credo: &Credo) -> Result<Vec<Variation>> {
        VariationAdaptor::new(credo.clone())
            .fetch_all_by_residue_id(self.residue_id, FetchArgs::default())
            .await?
            .collect(credo)
            .await
    }
}

impl Entity for Residue {
    const TABLE: Table = Table {
        schema: Schema::Credo,
        name: "residues",
        primary_key: &["residue_id"],
        columns: Self::COLUMNS,
        partitioned: false,
    };

    type Key = i32;

    fn primary_key(&self) -> i32 {
        self.residue_id
    }

    fn key_filter(&self) -> Expr {
        Self::RESIDUE_ID.eq(self.residue_id)
    }
}

impl PathEntity for Residue {
    const PATH: ColumnRef = Residue::PATH;
}

impl Partitioned for Residue {
    fn biomolecule_id(&self) -> i32 {
        self.biomolecule_id
    }
}

/// Amino acid extension of a [`Residue`]; shares its `residue_id`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Peptide {
    pub residue_id: i32,
    pub biomolecule_id: i32,
    pub chain_id: i32,
    pub path: Option<String>,
    pub res_name: String,
    pub res_num: i32,
    pub ins_code: String,
    pub one_letter_code: Option<String>,
    pub sstruct: Option<String>,
    pub res_map_id: Option<i32>,
    pub is_non_std: Option<bool>,
    pub is_modified: Option<bool>,
    pub phi: Option<f64>,
    pub psi: Option<f64>,
    pub omega: Option<f64>,
}

impl Peptide {
    pub const RESIDUE_ID: ColumnRef = ColumnRef::new("peptides", "residue_id");
    pub const BIOMOLECULE_ID: ColumnRef = ColumnRef::new("peptides", "biomolecule_id");
    pub const CHAIN_ID: ColumnRef = ColumnRef::new("peptides", "chain_id");
    pub const PATH: ColumnRef = ColumnRef::new("peptides", "path");
    pub const RES_NUM: ColumnRef = ColumnRef::new("peptides", "res_num");
    pub const SSTRUCT: ColumnRef = ColumnRef::new("peptides", "sstruct");
    pub const RES_MAP_ID: ColumnRef = ColumnRef::new("peptides", "res_map_id");
    pub const IS_NON_STD: ColumnRef = ColumnRef::new("peptides", "is_non_std");

    const COLUMNS: &'static [Column] = &[
        Column::eager("residue_id"),
        Column::eager("biomolecule_id"),
        Column::eager("chain_id"),
        Column::text("path"),
        Column::eager("res_name"),
        Column::eager("res_num"),
        Column::eager("ins_code"),
        Column::text("one_letter_code"),
        Column::text("sstruct"),
        Column::eager("res_map_id"),
        Column::eager("is_non_std"),
        Column::eager("is_modified"),
        Column::float("phi"),
        Column::float("psi"),
        Column::float("omega"),
    ];

    pub fn is_helix(&self) -> bool {
        matches!(self.sstruct.as_deref(), Some("H" | "G" | "I"))
    }

    pub fn is_strand(&self) -> bool {
        matches!(self.sstruct.as_deref(), Some("E" | "B"))
    }
}

impl Entity for Peptide {
    const TABLE: Table = Table {
        schema: Schema::Credo,
        name: "peptides",
        primary_key: &["residue_id"],
        columns: Self::COLUMNS,
        partitioned: false,
    };

    type Key = i32;

    fn primary_key(&self) -> i32 {
        self.residue_id
    }

    fn key_filter(&self) -> Expr {
        Self::RESIDUE_ID.eq(self.residue_id)
    }
}

impl PathEntity for Peptide {
    const PATH: ColumnRef = Peptide::PATH;
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Nucleotide {
    pub residue_id: i32,
    pub biomolecule_id: i32,
    pub chain_id: i32,
    pub res_name: String,
    pub res_num: i32,
    pub ins_code: String,
    pub one_letter_code: Option<String>,
    pub is_non_std: Option<bool>,
}

impl Nucleotide {
    pub const RESIDUE_ID: ColumnRef = ColumnRef::new("nucleotides", "residue_id");
    pub const CHAIN_ID: ColumnRef = ColumnRef::new("nucleotides", "chain_id");

    const COLUMNS: &'static [Column] = &[
        Column::eager("residue_id"),
        Column::eager("biomolecule_id"),
        Column::eager("chain_id"),
        Column::eager("res_name"),
        Column::eager("res_num"),
        Column::eager("ins_code"),
        Column::text("one_letter_code"),
        Column::eager("is_non_std"),
    ];
}

impl Entity for Nucleotide {
    const TABLE: Table = Table {
        schema: Schema::Credo,
        name: "nucleotides",
        primary_key: &["residue_id"],
        columns: Self::COLUMNS,
        partitioned: false,
    };

    type Key = i32;

    fn primary_key(&self) -> i32 {
        self.residue_id
    }

    fn key_filter(&self) -> Expr {
        Self::RESIDUE_ID.eq(self.residue_id)
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Saccharide {
    pub residue_id: i32,
    pub biomolecule_id: i32,
    pub chain_id: i32,
    pub res_name: String,
    pub res_num: i32,
    pub ins_code: String,
    pub oligosaccharide_id: Option<i32>,
}

impl Saccharide {
    pub const RESIDUE_ID: ColumnRef = ColumnRef::new("saccharides", "residue_id");

    const COLUMNS: &'static [Column] = &[
        Column::eager("residue_id"),
        Column::eager("biomolecule_id"),
        Column::eager("chain_id"),
        Column::eager("res_name"),
        Column::eager("res_num"),
        Column::eager("ins_code"),
        Column::eager("oligosaccharide_id"),
    ];
}

impl Entity for Saccharide {
    const TABLE: Table = Table {
        schema: Schema::Credo,
        name: "saccharides",
        primary_key: &["residue_id"],
        columns: Self::COLUMNS,
        partitioned: false,
    };

    type Key = i32;

    fn primary_key(&self) -> i32 {
        self.residue_id
    }

    fn key_filter(&self) -> Expr {
        Self::RESIDUE_ID.eq(self.residue_id)
    }
}

/// A residue resolved to its polymer-specific row, chosen by the entity type
/// bits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ResidueVariant {
    Peptide(Peptide),
    Nucleotide(Nucleotide),
    Saccharide(Saccharide),
    /// Solvent, ligand residues and residues without an extension row.
    Plain,
}

impl ResidueVariant {
    /// The variant table implied by `entity_type_bm`, protein first.
    pub fn kind(types: EntityTypes) -> Option<EntityType> {
        [
            EntityType::Protein,
            EntityType::Dna,
            EntityType::Rna,
            EntityType::Saccharide,
        ]
        .into_iter()
        .find(|t| types.contains(*t))
    }

    async fn load(credo: &Credo, residue: &Residue) -> Result<Self> {
        let variant = match Self::kind(residue.entity_types()) {
            Some(EntityType::Protein) => PeptideAdaptor::new(credo.clone())
                .fetch_by_residue_id(residue.residue_id)
                .await?
                .map(ResidueVariant::Peptide),
            Some(EntityType::Dna | EntityType::Rna) => Nucleotide::query()
                .filter(Nucleotide::RESIDUE_ID.eq(residue.residue_id))
                .first(credo)
                .await?
                .map(ResidueVariant::Nucleotide),
            Some(EntityType::Saccharide) => Saccharide::query()
                .filter(Saccharide::RESIDUE_ID.eq(residue.residue_id))
                .first(credo)
                .await?
                .map(ResidueVariant::Saccharide),
            _ => None,
        };
        Ok(variant.unwrap_or(ResidueVariant::Plain))
    }
}

entity_identity!(Residue, Peptide, Nucleotide, Saccharide);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchemaNames;
    use crate::entity::Load;

    fn residue(bm: i32) -> Residue {
        Residue {
            residue_id: 1,
            biomolecule_id: 1,
            chain_id: 1,
            path: Some("2P33/1/A/SER`72".to_string()),
            res_name: "SER".to_string(),
            res_num: 72,
            ins_code: NO_INS_CODE.to_string(),
            entity_type_bm: bm,
            is_disordered: None,
            is_incomplete: None,
        }
    }

    #[test]
    fn labels_skip_blank_insertion_codes() {
        assert_eq!(residue(32).label(), "SER 72");
        let mut inserted = residue(32);
        inserted.ins_code = "A".to_string();
        assert_eq!(inserted.label(), "SER 72A");
    }

    #[test]
    fn insertion_codes_are_read_as_stored() {
        let names = SchemaNames::default();
        for table in [
            Residue::TABLE,
            Peptide::TABLE,
            Nucleotide::TABLE,
            Saccharide::TABLE,
        ] {
            assert_eq!(
                table.column("ins_code").map(|c| c.load),
                Some(Load::Eager)
            );
            let projection: Vec<String> = table
                .projection(table.name)
                .iter()
                .map(|sql| sql.to_sql(&names))
                .collect();
            assert!(projection.contains(&format!("{}.ins_code", table.name)));
        }
    }

    #[test]
    fn variant_kind_follows_entity_bits() {
        assert_eq!(
            ResidueVariant::kind(residue(32).entity_types()),
            Some(EntityType::Protein)
        );
        assert_eq!(
            ResidueVariant::kind(EntityType::Ligand | EntityType::Saccharide),
            Some(EntityType::Saccharide)
        );
        assert_eq!(ResidueVariant::kind(EntityTypes(1)), None);
        assert!(residue(34).is_a(EntityType::Ligand));
    }
}
