use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{entity_identity, Column, Entity, Table};
use crate::adaptor::{ChemCompAdaptor, FetchArgs, FragmentAdaptor, LigandFragmentAdaptor};
use crate::config::Schema;
use crate::db::Credo;
use crate::entity::{ChemComp, LigandFragment};
use crate::error::Result;
use crate::sql::{ColumnRef, Expr};

/// A canonical substructure obtained by recursive fragmentation.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Fragment {
    pub fragment_id: i32,
    pub ism: String,
    pub mw: Option<f64>,
    pub num_hvy_atoms: Option<i32>,
    pub is_terminal: bool,
}

impl Fragment {
    pub const FRAGMENT_ID: ColumnRef = ColumnRef::new("fragments", "fragment_id");
    pub const ISM: ColumnRef = ColumnRef::new("fragments", "ism");
    pub const NUM_HVY_ATOMS: ColumnRef = ColumnRef::new("fragments", "num_hvy_atoms");
    pub const IS_TERMINAL: ColumnRef = ColumnRef::new("fragments", "is_terminal");

    const COLUMNS: &'static [Column] = &[
        Column::eager("fragment_id"),
        Column::eager("ism"),
        Column::float("mw"),
        Column::eager("num_hvy_atoms"),
        Column::eager("is_terminal"),
    ];

    pub async fn children(&self, credo: &Credo) -> Result<Vec<Fragment>> {
        FragmentAdaptor::new(credo.clone())
            .fetch_all_children(self.fragment_id, FetchArgs::default())
            .await?
            .collect(credo)
            .await
    }

    pub async fn parents(&self, credo: &Credo) -> Result<Vec<Fragment>> {
        FragmentAdaptor::new(credo.clone())
            .fetch_all_parents(self.fragment_id, FetchArgs::default())
            .await?
            .collect(credo)
            .await
    }

    pub async fn descendants(&self, credo: &Credo) -> Result<Vec<Fragment>> {
        FragmentAdaptor::new(credo.clone())
            .fetch_all_descendants(self.fragment_id, FetchArgs::default())
            .await?
            .collect(credo)
            .await
    }

    pub async fn leaves(&self, credo: &Credo) -> Result<Vec<Fragment>> {
        FragmentAdaptor::new(credo.clone())
            .fetch_all_leaves(self.fragment_id, FetchArgs::default())
            .await?
            .collect(credo)
            .await
    }

    pub async fn chem_comps(&self, credo: &Credo, args: FetchArgs) -> Result<Vec<ChemComp>> {
        ChemCompAdaptor::new(credo.clone())
            .fetch_all_by_fragment_id(self.fragment_id, args)
            .await?
            .collect(credo)
            .await
    }

    pub async fn ligand_fragments(&self, credo: &Credo, args: FetchArgs) -> Result<Vec<LigandFragment>> {
        LigandFragmentAdaptor::new(credo.clone())
            .fetch_all_by_fragment_id(self.fragment_id, args)
            .await?
            .collect(credo)
            .await
    }
}

impl Entity for Fragment {
    const TABLE: Table = Table {
        schema: Schema::PdbChem,
        name: "fragments",
        primary_key: &["fragment_id"],
        columns: Self::COLUMNS,
        partitioned: false,
    };

    type Key = i32;

    fn primary_key(&self) -> i32 {
        self.fragment_id
    }

    fn key_filter(&self) -> Expr {
        Self::FRAGMENT_ID.eq(self.fragment_id)
    }
}

/// One parent-to-child edge of the fragment DAG, recorded per source
/// compound.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct FragmentHierarchy {
    pub parent_id: i32,
    pub child_id: i32,
    pub het_id: String,
    pub order_child: i32,
}

impl FragmentHierarchy {
    pub const PARENT_ID: ColumnRef = ColumnRef::new("fragment_hierarchies", "parent_id");
    pub const CHILD_ID: ColumnRef = ColumnRef::new("fragment_hierarchies", "child_id");
    pub const HET_ID: ColumnRef = ColumnRef::new("fragment_hierarchies", "het_id");
    pub const ORDER_CHILD: ColumnRef = ColumnRef::new("fragment_hierarchies", "order_child");

    const COLUMNS: &'static [Column] = &[
        Column::eager("parent_id"),
        Column::eager("child_id"),
        Column::text("het_id"),
        Column::eager("order_child"),
    ];
}

impl Entity for FragmentHierarchy {
    const TABLE: Table = Table {
        schema: Schema::PdbChem,
        name: "fragment_hierarchies",
        primary_key: &["parent_id", "child_id", "het_id"],
        columns: Self::COLUMNS,
        partitioned: false,
    };

    type Key = (i32, i32, String);

    fn primary_key(&self) -> (i32, i32, String) {
        (self.parent_id, self.child_id, self.het_id.clone())
    }

    fn key_filter(&self) -> Expr {
        Expr::and([
            Self::PARENT_ID.eq(self.parent_id),
            Self::CHILD_ID.eq(self.child_id),
            Self::HET_ID.eq(self.het_id.as_str()),
        ])
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct FragmentRDMol {
    pub fragment_id: i32,
    pub rdmol: Option<String>,
}

impl FragmentRDMol {
    pub const FRAGMENT_ID: ColumnRef = ColumnRef::new("fragment_rdmols", "fragment_id");
    pub const RDMOL: ColumnRef = ColumnRef::new("fragment_rdmols", "rdmol");

    const COLUMNS: &'static [Column] = &[Column::eager("fragment_id"), Column::text("rdmol")];
}

impl Entity for FragmentRDMol {
    const TABLE: Table = Table {
        schema: Schema::PdbChem,
        name: "fragment_rdmols",
        primary_key: &["fragment_id"],
        columns: Self::COLUMNS,
        partitioned: false,
    };

    type Key = i32;

    fn primary_key(&self) -> i32 {
        self.fragment_id
    }

    fn key_filter(&self) -> Expr {
        Self::FRAGMENT_ID.eq(self.fragment_id)
    }
}

/// RDKit fingerprints of a fragment. One row per fragment carrying every
/// fingerprint type.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct FragmentRDFP {
    pub fragment_id: i32,
    pub circular_fp: Option<String>,
    pub atompair_fp: Option<String>,
    pub torsion_fp: Option<String>,
    pub maccs_fp: Option<String>,
    pub layered_fp: Option<String>,
    pub avalon_fp: Option<String>,
}

impl FragmentRDFP {
    pub const FRAGMENT_ID: ColumnRef = ColumnRef::new("fragment_rdfps", "fragment_id");

    const COLUMNS: &'static [Column] = &[
        Column::eager("fragment_id"),
        Column::text("circular_fp"),
        Column::text("atompair_fp"),
        Column::text("torsion_fp"),
        Column::text("maccs_fp"),
        Column::text("layered_fp"),
        Column::text("avalon_fp"),
    ];
}

impl Entity for FragmentRDFP {
    const TABLE: Table = Table {
        schema: Schema::PdbChem,
        name: "fragment_rdfps",
        primary_key: &["fragment_id"],
        columns: Self::COLUMNS,
        partitioned: false,
    };

    type Key = i32;

    fn primary_key(&self) -> i32 {
        self.fragment_id
    }

    fn key_filter(&self) -> Expr {
        Self::FRAGMENT_ID.eq(self.fragment_id)
    }
}

entity_identity!(Fragment, FragmentHierarchy, FragmentRDMol, FragmentRDFP);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hierarchy_edges_are_keyed_per_source_compound() {
        let a = FragmentHierarchy {
            parent_id: 1,
            child_id: 2,
            het_id: "STI".to_string(),
            order_child: 1,
        };
        let b = FragmentHierarchy {
            het_id: "NIL".to_string(),
            ..a.clone()
        };
        let c = FragmentHierarchy {
            order_child: 4,
            ..a.clone()
        };
        assert_ne!(a, b);
        assert_eq!(a, c);
    }
}
