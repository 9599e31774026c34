use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{entity_identity, Column, Entity, Table};
use crate::config::Schema;
use crate::sql::{ColumnRef, Expr};

/// A cross-reference from a CREDO entity to an external database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct XRef {
    pub xref_id: i32,
    /// Entity class name, e.g. `Chain` or `ChemComp`.
    pub entity_type: String,
    pub entity_id: i32,
    pub source: String,
    pub xref: String,
}

impl XRef {
    pub const XREF_ID: ColumnRef = ColumnRef::new("xrefs", "xref_id");
    pub const ENTITY_TYPE: ColumnRef = ColumnRef::new("xrefs", "entity_type");
    pub const ENTITY_ID: ColumnRef = ColumnRef::new("xrefs", "entity_id");
    pub const SOURCE: ColumnRef = ColumnRef::new("xrefs", "source");
    pub const XREF: ColumnRef = ColumnRef::new("xrefs", "xref");

    const COLUMNS: &'static [Column] = &[
        Column::eager("xref_id"),
        Column::eager("entity_type"),
        Column::eager("entity_id"),
        Column::eager("source"),
        Column::eager("xref"),
    ];

    pub fn is_source(&self, source: &str) -> bool {
        self.source.eq_ignore_ascii_case(source)
    }
}

impl Entity for XRef {
    const TABLE: Table = Table {
        schema: Schema::Credo,
        name: "xrefs",
        primary_key: &["xref_id"],
        columns: Self::COLUMNS,
        partitioned: false,
    };

    type Key = i32;

    fn primary_key(&self) -> i32 {
        self.xref_id
    }

    fn key_filter(&self) -> Expr {
        Self::XREF_ID.eq(self.xref_id)
    }
}

entity_identity!(XRef);
