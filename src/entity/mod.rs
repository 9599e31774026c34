//! The CREDO entity model.
//!
//! Every reflected table maps to one struct deriving `sqlx::FromRow`. The
//! static [`Table`] description drives projections (deferred columns are left
//! out, composite columns are cast to text) and the [`Entity`] trait gives
//! adaptors a uniform way to build queries, compare instances by primary key
//! and load deferred columns on demand.

pub mod atom;
pub mod binding_site;
pub mod chain;
pub mod chemcomp;
pub mod contact;
pub mod fragment;
pub mod interface;
pub mod ligand;
pub mod residue;
pub mod ring;
pub mod structure;
pub mod variation;
pub mod xref;

use std::fmt::Debug;
use std::hash::Hash;

use sqlx::postgres::PgRow;
use sqlx::FromRow;

use crate::config::Schema;
use crate::db::Credo;
use crate::error::{CredoError, Result};
use crate::query::Query;
use crate::sql::{ColumnRef, Expr, Select, Sql};

pub use atom::Atom;
pub use binding_site::{BindingSiteDomain, BindingSiteFuzcav, BindingSiteResidue, Domain, DomainPeptide};
pub use chain::{Chain, ProtFragment};
pub use chemcomp::{
    ChemComp, ChemCompConformer, ChemCompFragment, ChemCompRDFP, ChemCompRDMol,
};
pub use contact::Contact;
pub use fragment::{Fragment, FragmentHierarchy, FragmentRDFP, FragmentRDMol};
pub use interface::{Groove, Interface};
pub use ligand::{
    Ligand, LigandComponent, LigandFragment, LigandFragmentAtom, LigandMolString, LigandUsr,
};
pub use residue::{Nucleotide, Peptide, Residue, ResidueVariant, Saccharide};
pub use ring::{AromaticRing, AtomRingInteraction, PiGroup, PiInteraction, RingInteraction};
pub use structure::{Biomolecule, Structure};
pub use variation::{
    Annotation, Phenotype, ResMap, Variation, Variation2BindingSite, Variation2PDB,
    Variation2UniProt,
};
pub use xref::XRef;

/// How a column is projected by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Load {
    Eager,
    /// Projected as `column::text`; used for label trees, cubes, composites
    /// and cartridge types without a binary output function.
    Text,
    /// Projected as `column::<type> AS column`; used to widen `real` and
    /// `numeric` columns to `float8`.
    Cast(&'static str),
    /// Left out of default projections and loaded explicitly.
    Deferred,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub load: Load,
}

impl Column {
    pub const fn eager(name: &'static str) -> Self {
        Self {
            name,
            load: Load::Eager,
        }
    }

    pub const fn text(name: &'static str) -> Self {
        Self {
            name,
            load: Load::Text,
        }
    }

    /// A `real`/`numeric` column read as `f64`.
    pub const fn float(name: &'static str) -> Self {
        Self {
            name,
            load: Load::Cast("float8"),
        }
    }

    pub const fn floats(name: &'static str) -> Self {
        Self {
            name,
            load: Load::Cast("float8[]"),
        }
    }

    pub const fn deferred(name: &'static str) -> Self {
        Self {
            name,
            load: Load::Deferred,
        }
    }
}

/// Static description of a reflected table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Table {
    pub schema: Schema,
    pub name: &'static str,
    pub primary_key: &'static [&'static str],
    pub columns: &'static [Column],
    /// Partitioned by `biomolecule_id`; queries must pin it.
    pub partitioned: bool,
}

impl Table {
    pub const fn col(&self, name: &'static str) -> ColumnRef {
        ColumnRef::new(self.name, name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// `alias.col` for each eager column, `alias.col::text AS col` for text
    /// and cast columns; deferred columns are skipped.
    pub fn projection(&self, alias: &str) -> Vec<Sql> {
        self.columns
            .iter()
            .filter_map(|column| match column.load {
                Load::Eager => Some(Sql::text(format!("{alias}.{}", column.name))),
                Load::Text => Some(Sql::text(format!(
                    "{alias}.{name}::text AS {name}",
                    name = column.name
                ))),
                Load::Cast(ty) => Some(Sql::text(format!(
                    "{alias}.{name}::{ty} AS {name}",
                    name = column.name
                ))),
                Load::Deferred => None,
            })
            .collect()
    }

    pub fn deferred_columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns
            .iter()
            .filter(|c| c.load == Load::Deferred)
            .map(|c| c.name)
    }

    /// `SELECT <projection> FROM schema.table AS table`
    pub fn select(&self) -> Select {
        self.select_as(self.name)
    }

    pub fn select_as(&self, alias: &str) -> Select {
        Select::from_table(self.schema, self.name, alias).columns(self.projection(alias))
    }
}

/// A row type that can be materialized from a query result.
pub trait Row: for<'r> FromRow<'r, PgRow> + Send + Unpin + 'static {}

impl<T> Row for T where T: for<'r> FromRow<'r, PgRow> + Send + Unpin + 'static {}

pub trait Entity: Row + Clone + Debug + Sync {
    const TABLE: Table;

    type Key: Clone + Eq + Hash + Debug + Send + Sync;

    fn primary_key(&self) -> Self::Key;

    /// Predicate selecting exactly this row.
    fn key_filter(&self) -> Expr;

    fn column(name: &'static str) -> ColumnRef {
        ColumnRef::new(Self::TABLE.name, name)
    }

    /// The default query for this entity.
    fn query() -> Query<Self> {
        Query::new(Self::TABLE.select())
    }
}

/// Entities carrying a hierarchical path label.
pub trait PathEntity: Entity {
    const PATH: ColumnRef;
}

/// Entities whose rows live in a `biomolecule_id`-partitioned table, or that
/// are scoped to one biomolecule and used to address partitioned tables.
pub trait Partitioned {
    fn biomolecule_id(&self) -> i32;
}

/// Loads one deferred text column of `entity`.
pub async fn load_deferred<E: Entity>(
    credo: &Credo,
    entity: &E,
    column: &'static str,
) -> Result<Option<String>> {
    match E::TABLE.column(column) {
        Some(c) if c.load == Load::Deferred => {}
        _ => {
            return Err(CredoError::invalid(format!(
                "{} is not a deferred column of {}",
                column,
                E::TABLE.name
            )));
        }
    }

    let select = Select::from_table(E::TABLE.schema, E::TABLE.name, E::TABLE.name)
        .column(Sql::text(format!("{}.{}::text", E::TABLE.name, column)))
        .filter(entity.key_filter());

    let value: Option<Option<String>> = Query::<(Option<String>,)>::new(select)
        .first(credo)
        .await?
        .map(|(value,)| value);
    Ok(value.flatten())
}

/// Equality and hashing by primary key.
macro_rules! entity_identity {
    ($($ty:ty),* $(,)?) => {
        $(
            impl PartialEq for $ty {
                fn eq(&self, other: &Self) -> bool {
                    $crate::entity::Entity::primary_key(self)
                        == $crate::entity::Entity::primary_key(other)
                }
            }

            impl Eq for $ty {}

            impl std::hash::Hash for $ty {
                fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
                    $crate::entity::Entity::primary_key(self).hash(state)
                }
            }
        )*
    };
}

pub(crate) use entity_identity;

/// All entity tables, used to check reflection coverage.
pub const TABLES: &[Table] = &[
    Structure::TABLE,
    Biomolecule::TABLE,
    Chain::TABLE,
    ProtFragment::TABLE,
    Residue::TABLE,
    Peptide::TABLE,
    Nucleotide::TABLE,
    Saccharide::TABLE,
    Atom::TABLE,
    Contact::TABLE,
    AromaticRing::TABLE,
    PiGroup::TABLE,
    RingInteraction::TABLE,
    AtomRingInteraction::TABLE,
    PiInteraction::TABLE,
    Ligand::TABLE,
    LigandComponent::TABLE,
    LigandFragment::TABLE,
    LigandFragmentAtom::TABLE,
    LigandUsr::TABLE,
    LigandMolString::TABLE,
    Interface::TABLE,
    Groove::TABLE,
    BindingSiteResidue::TABLE,
    BindingSiteDomain::TABLE,
    BindingSiteFuzcav::TABLE,
    Domain::TABLE,
    DomainPeptide::TABLE,
    ChemComp::TABLE,
    ChemCompConformer::TABLE,
    ChemCompFragment::TABLE,
    ChemCompRDMol::TABLE,
    ChemCompRDFP::TABLE,
    Fragment::TABLE,
    FragmentHierarchy::TABLE,
    FragmentRDMol::TABLE,
    FragmentRDFP::TABLE,
    XRef::TABLE,
    Variation::TABLE,
    Variation2UniProt::TABLE,
    Variation2PDB::TABLE,
    Variation2BindingSite::TABLE,
    Annotation::TABLE,
    Phenotype::TABLE,
    ResMap::TABLE,
];

/// Association tables that have no entity of their own.
pub mod association {
    use crate::config::Schema;
    use crate::sql::ColumnRef;

    pub const AROMATIC_RING_ATOMS: (Schema, &str) = (Schema::Credo, "aromatic_ring_atoms");
    pub const PI_GROUP_ATOMS: (Schema, &str) = (Schema::Credo, "pi_group_atoms");
    pub const PROT_FRAGMENT_RESIDUES: (Schema, &str) = (Schema::Credo, "prot_fragment_residues");

    pub const RING_ATOM_RING_ID: ColumnRef = ColumnRef::new("aromatic_ring_atoms", "aromatic_ring_id");
    pub const RING_ATOM_ATOM_ID: ColumnRef = ColumnRef::new("aromatic_ring_atoms", "atom_id");
    pub const PI_ATOM_PI_ID: ColumnRef = ColumnRef::new("pi_group_atoms", "pi_id");
    pub const PI_ATOM_ATOM_ID: ColumnRef = ColumnRef::new("pi_group_atoms", "atom_id");
    pub const PF_RESIDUE_PF_ID: ColumnRef =
        ColumnRef::new("prot_fragment_residues", "prot_fragment_id");
    pub const PF_RESIDUE_RESIDUE_ID: ColumnRef =
        ColumnRef::new("prot_fragment_residues", "residue_id");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchemaNames;
    use std::collections::HashSet;

    #[test]
    fn projection_skips_deferred_and_casts_text_columns() {
        let sql: Vec<String> = Structure::TABLE
            .projection("structures")
            .iter()
            .map(|s| s.to_sql(&SchemaNames::default()))
            .collect();
        assert!(sql.contains(&"structures.pdb".to_string()));
        assert!(!sql.iter().any(|c| c.contains("title") || c.contains("authors")));

        let ring: Vec<String> = AromaticRing::TABLE
            .projection("aromatic_rings")
            .iter()
            .map(|s| s.to_sql(&SchemaNames::default()))
            .collect();
        assert!(ring.contains(&"aromatic_rings.centroid::text AS centroid".to_string()));
        assert!(sql.contains(&"structures.resolution::float8 AS resolution".to_string()));
    }

    #[test]
    fn deferred_columns_match_the_heavy_text_fields() {
        let structure: Vec<_> = Structure::TABLE.deferred_columns().collect();
        assert_eq!(structure, vec!["title", "authors"]);
        let chain: Vec<_> = Chain::TABLE.deferred_columns().collect();
        assert_eq!(chain, vec!["title", "seq", "seq_md5"]);
        let molstring: Vec<_> = LigandMolString::TABLE.deferred_columns().collect();
        assert_eq!(molstring, vec!["pdb", "oeb"]);
    }

    #[test]
    fn table_names_are_unique_per_schema() {
        let mut seen = HashSet::new();
        for table in TABLES {
            assert!(
                seen.insert((table.schema, table.name)),
                "duplicate table {}",
                table.name
            );
            assert!(!table.primary_key.is_empty(), "{} has no key", table.name);
            for key in table.primary_key {
                assert!(
                    table.column(key).is_some(),
                    "{}.{} is not a declared column",
                    table.name,
                    key
                );
            }
        }
    }

    #[test]
    fn only_atoms_and_contacts_are_partitioned() {
        let partitioned: Vec<_> = TABLES
            .iter()
            .filter(|t| t.partitioned)
            .map(|t| t.name)
            .collect();
        assert_eq!(partitioned, vec!["atoms", "contacts"]);
    }
}
