//! Schema reflection and capability detection.
//!
//! Reflection reads `information_schema` once per process and records every
//! column of the configured tables together with its primary key, so entity
//! metadata can be checked against the live database.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::Serialize;
use sqlx::pool::PoolConnection;
use sqlx::{FromRow, Postgres};
use tracing::{info, warn};

use crate::config::{CredoConfig, Schema, SchemaNames};
use crate::entity::{Entity, Load, Table, TABLES};
use crate::error::Result;

const COLUMNS_QUERY: &str = "SELECT table_schema::text AS table_schema, \
     table_name::text AS table_name, column_name::text AS column_name, \
     data_type::text AS data_type, udt_name::text AS udt_name, \
     (is_nullable::text = 'YES') AS nullable, ordinal_position::int4 AS ordinal \
     FROM information_schema.columns WHERE table_schema::text = ANY($1) \
     ORDER BY table_schema, table_name, ordinal_position";

const PRIMARY_KEY_QUERY: &str = "SELECT tc.table_schema::text AS table_schema, \
     tc.table_name::text AS table_name, kcu.column_name::text AS column_name \
     FROM information_schema.table_constraints tc \
     JOIN information_schema.key_column_usage kcu \
       ON kcu.constraint_name = tc.constraint_name \
      AND kcu.table_schema = tc.table_schema \
      AND kcu.table_name = tc.table_name \
     WHERE tc.constraint_type::text = 'PRIMARY KEY' AND tc.table_schema::text = ANY($1) \
     ORDER BY tc.table_schema, tc.table_name, kcu.ordinal_position";

const EXTENSIONS_QUERY: &str = "SELECT extname::text FROM pg_catalog.pg_extension";

const NAMESPACES_QUERY: &str = "SELECT nspname::text FROM pg_catalog.pg_namespace";

const TYPES_QUERY: &str =
    "SELECT typname::text FROM pg_catalog.pg_type WHERE typname::text = ANY($1)";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnMetadata {
    pub name: String,
    pub data_type: String,
    pub udt_name: String,
    pub nullable: bool,
    pub ordinal: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableMetadata {
    pub schema: Schema,
    pub name: String,
    pub columns: Vec<ColumnMetadata>,
    pub primary_key: Vec<String>,
}

impl TableMetadata {
    pub fn column(&self, name: &str) -> Option<&ColumnMetadata> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Columns the entity declares but the database lacks.
    pub fn missing_columns(&self, table: &Table) -> Vec<&'static str> {
        table
            .columns
            .iter()
            .filter(|c| self.column(c.name).is_none())
            .map(|c| c.name)
            .collect()
    }
}

#[derive(Debug, FromRow)]
struct ColumnRow {
    table_schema: String,
    table_name: String,
    column_name: String,
    data_type: String,
    udt_name: String,
    nullable: bool,
    ordinal: i32,
}

#[derive(Debug, FromRow)]
struct KeyRow {
    table_schema: String,
    table_name: String,
    column_name: String,
}

/// Reflected table metadata, keyed by logical schema and table name.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tables: HashMap<(Schema, String), TableMetadata>,
}

impl Catalog {
    pub async fn reflect(
        conn: &mut PoolConnection<Postgres>,
        config: &CredoConfig,
        names: &SchemaNames,
    ) -> Result<Self> {
        let physical = names.physical_names();

        let columns: Vec<ColumnRow> = sqlx::query_as(COLUMNS_QUERY)
            .bind(&physical)
            .fetch_all(&mut **conn)
            .await?;
        let keys: Vec<KeyRow> = sqlx::query_as(PRIMARY_KEY_QUERY)
            .bind(&physical)
            .fetch_all(&mut **conn)
            .await?;

        let mut catalog = Catalog::from_rows(columns, keys, names, |schema, table| {
            let wanted = config.reflect_list(schema);
            wanted.is_empty() || wanted.iter().any(|name| name == table)
        });

        for table in TABLES {
            match catalog.get(table.schema, table.name) {
                Some(meta) => {
                    let missing = meta.missing_columns(table);
                    if !missing.is_empty() {
                        warn!(
                            stage = "catalog",
                            event = "catalog.columns",
                            table = table.name,
                            missing = ?missing,
                            "entity declares columns missing from the database"
                        );
                    }
                }
                None if config
                    .reflect_list(table.schema)
                    .iter()
                    .any(|name| name == table.name) =>
                {
                    warn!(
                        stage = "catalog",
                        event = "catalog.table",
                        schema = %table.schema,
                        table = table.name,
                        "configured table was not found"
                    );
                }
                None => {}
            }
        }

        // Entities without a database primary key fall back to their declared key.
        for table in TABLES {
            if let Some(meta) = catalog.tables.get_mut(&(table.schema, table.name.to_string())) {
                if meta.primary_key.is_empty() {
                    meta.primary_key = table.primary_key.iter().map(|k| k.to_string()).collect();
                }
            }
        }

        info!(
            stage = "catalog",
            event = "catalog.reflect",
            tables = catalog.tables.len(),
            "schema reflected"
        );
        catalog.tables.shrink_to_fit();
        Ok(catalog)
    }

    fn from_rows(
        columns: Vec<ColumnRow>,
        keys: Vec<KeyRow>,
        names: &SchemaNames,
        wanted: impl Fn(Schema, &str) -> bool,
    ) -> Self {
        let mut tables: HashMap<(Schema, String), TableMetadata> = HashMap::new();
        for row in columns {
            let Some(schema) = names.schema_for(&row.table_schema) else {
                continue;
            };
            if !wanted(schema, &row.table_name) {
                continue;
            }
            tables
                .entry((schema, row.table_name.clone()))
                .or_insert_with(|| TableMetadata {
                    schema,
                    name: row.table_name.clone(),
                    columns: Vec::new(),
                    primary_key: Vec::new(),
                })
                .columns
                .push(ColumnMetadata {
                    name: row.column_name,
                    data_type: row.data_type,
                    udt_name: row.udt_name,
                    nullable: row.nullable,
                    ordinal: row.ordinal,
                });
        }
        for key in keys {
            let Some(schema) = names.schema_for(&key.table_schema) else {
                continue;
            };
            if let Some(table) = tables.get_mut(&(schema, key.table_name)) {
                table.primary_key.push(key.column_name);
            }
        }
        Self { tables }
    }

    pub fn get(&self, schema: Schema, table: &str) -> Option<&TableMetadata> {
        self.tables.get(&(schema, table.to_string()))
    }

    pub fn metadata<E: Entity>(&self) -> Option<&TableMetadata> {
        self.get(E::TABLE.schema, E::TABLE.name)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Declared columns that the entity layer projects as text, checked
    /// against the reflected type so mismatches surface early.
    pub fn text_projected(&self, table: &Table) -> Vec<(&'static str, Option<String>)> {
        table
            .columns
            .iter()
            .filter(|c| c.load == Load::Text)
            .map(|c| {
                let udt = self
                    .get(table.schema, table.name)
                    .and_then(|meta| meta.column(c.name))
                    .map(|meta| meta.udt_name.clone());
                (c.name, udt)
            })
            .collect()
    }
}

/// An optional database feature some operations depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Capability {
    /// Client-side cheminformatics toolkit.
    RdkitClient,
    /// The RDKit cartridge (`mol`, `bfp`, `sfp` types and operators).
    RdkitCartridge,
    /// OpenEye cartridge functions in the `openeye` schema.
    OpenEye,
    /// pg_trgm, for trigram string similarity.
    Trigram,
    /// The cube extension, for USR shape search.
    Cube,
    /// The `ptree`/`pquery` label-tree types used by path operators.
    PathTree,
}

impl Capability {
    pub const ALL: [Capability; 6] = [
        Capability::RdkitClient,
        Capability::RdkitCartridge,
        Capability::OpenEye,
        Capability::Trigram,
        Capability::Cube,
        Capability::PathTree,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Capability::RdkitClient => "rdkit",
            Capability::RdkitCartridge => "rdkit-cartridge",
            Capability::OpenEye => "openeye",
            Capability::Trigram => "pg_trgm",
            Capability::Cube => "cube",
            Capability::PathTree => "ptree",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The set of capabilities available to this process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    available: BTreeMap<Capability, bool>,
}

impl Capabilities {
    /// Probes the database and combines the result with the config extras:
    /// a capability is available only when enabled (or not configurable) and
    /// present in the database.
    pub async fn detect(
        conn: &mut PoolConnection<Postgres>,
        config: &CredoConfig,
    ) -> Result<Self> {
        let extensions: Vec<String> = sqlx::query_scalar(EXTENSIONS_QUERY)
            .fetch_all(&mut **conn)
            .await?;
        let namespaces: Vec<String> = sqlx::query_scalar(NAMESPACES_QUERY)
            .fetch_all(&mut **conn)
            .await?;
        let types: Vec<String> = sqlx::query_scalar(TYPES_QUERY)
            .bind(vec!["ptree", "pquery", "cube", "mol", "bfp"])
            .fetch_all(&mut **conn)
            .await?;

        let capabilities = Self::from_probe(config, &extensions, &namespaces, &types);
        info!(
            stage = "catalog",
            event = "catalog.capabilities",
            available = %capabilities,
            "capabilities detected"
        );
        Ok(capabilities)
    }

    pub(crate) fn from_probe(
        config: &CredoConfig,
        extensions: &[String],
        namespaces: &[String],
        types: &[String],
    ) -> Self {
        let has_ext = |name: &str| extensions.iter().any(|e| e == name);
        let has_type = |name: &str| types.iter().any(|t| t == name);

        let mut available = BTreeMap::new();
        available.insert(Capability::RdkitClient, config.extras.rdkit);
        available.insert(
            Capability::RdkitCartridge,
            config.extras.rdkit_cartridge && (has_ext("rdkit") || has_type("mol")),
        );
        available.insert(
            Capability::OpenEye,
            config.extras.openeye && namespaces.iter().any(|n| n == "openeye"),
        );
        available.insert(Capability::Trigram, has_ext("pg_trgm"));
        available.insert(Capability::Cube, has_ext("cube") || has_type("cube"));
        available.insert(
            Capability::PathTree,
            has_type("ptree") && has_type("pquery"),
        );
        Self { available }
    }

    /// Capabilities taken from config alone, for handles that skip probing.
    pub fn assumed(config: &CredoConfig) -> Self {
        let mut available = BTreeMap::new();
        available.insert(Capability::RdkitClient, config.extras.rdkit);
        available.insert(Capability::RdkitCartridge, config.extras.rdkit_cartridge);
        available.insert(Capability::OpenEye, config.extras.openeye);
        available.insert(Capability::Trigram, true);
        available.insert(Capability::Cube, true);
        available.insert(Capability::PathTree, true);
        Self { available }
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.available.get(&capability).copied().unwrap_or(false)
    }

    pub fn set(&mut self, capability: Capability, available: bool) {
        self.available.insert(capability, available);
    }

    pub fn report(&self) -> Vec<(Capability, bool)> {
        Capability::ALL
            .into_iter()
            .map(|cap| (cap, self.has(cap)))
            .collect()
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = Capability::ALL
            .into_iter()
            .filter(|cap| self.has(*cap))
            .map(Capability::name)
            .collect();
        if names.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&names.join(","))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = r#"{
        "connection": {"user": "credo", "db": "credo"},
        "schema": {
            "credo": {"name": "credo_v2", "reflect": ["chains", "ligands"]},
            "pdbchem": {"name": "pdbchem", "reflect": ["chem_comps"]}
        },
        "extras": {"rdkit": true, "rdkit-cartridge": true, "openeye": false}
    }"#;

    fn column(schema: &str, table: &str, name: &str, ordinal: i32) -> ColumnRow {
        ColumnRow {
            table_schema: schema.to_string(),
            table_name: table.to_string(),
            column_name: name.to_string(),
            data_type: "integer".to_string(),
            udt_name: "int4".to_string(),
            nullable: false,
            ordinal,
        }
    }

    #[test]
    fn rows_are_grouped_and_filtered_by_reflect_list() {
        let config = CredoConfig::parse(RAW).expect("config");
        let names = config.schema_names();
        let columns = vec![
            column("credo_v2", "chains", "chain_id", 1),
            column("credo_v2", "chains", "biomolecule_id", 2),
            column("credo_v2", "atoms", "atom_id", 1),
            column("pdbchem", "chem_comps", "het_id", 2),
            column("public", "other", "id", 1),
        ];
        let keys = vec![KeyRow {
            table_schema: "credo_v2".to_string(),
            table_name: "chains".to_string(),
            column_name: "chain_id".to_string(),
        }];

        let catalog = Catalog::from_rows(columns, keys, &names, |schema, table| {
            config.reflect_list(schema).iter().any(|name| name == table)
        });

        assert_eq!(catalog.len(), 2);
        let chains = catalog.get(Schema::Credo, "chains").expect("chains");
        assert_eq!(chains.columns.len(), 2);
        assert_eq!(chains.primary_key, vec!["chain_id".to_string()]);
        assert!(catalog.get(Schema::Credo, "atoms").is_none());
        assert!(catalog.get(Schema::PdbChem, "chem_comps").is_some());
    }

    #[test]
    fn missing_columns_are_reported() {
        let meta = TableMetadata {
            schema: Schema::Credo,
            name: "chains".to_string(),
            columns: vec![ColumnMetadata {
                name: "chain_id".to_string(),
                data_type: "integer".to_string(),
                udt_name: "int4".to_string(),
                nullable: false,
                ordinal: 1,
            }],
            primary_key: vec!["chain_id".to_string()],
        };
        let missing = meta.missing_columns(&crate::entity::Chain::TABLE);
        assert!(missing.contains(&"pdb_chain_id"));
        assert!(!missing.contains(&"chain_id"));
    }

    #[test]
    fn capabilities_require_both_config_and_database() {
        let config = CredoConfig::parse(RAW).expect("config");
        let caps = Capabilities::from_probe(
            &config,
            &["pg_trgm".to_string(), "rdkit".to_string()],
            &["openeye".to_string()],
            &["cube".to_string()],
        );
        assert!(caps.has(Capability::RdkitClient));
        assert!(caps.has(Capability::RdkitCartridge));
        assert!(caps.has(Capability::Trigram));
        assert!(caps.has(Capability::Cube));
        // openeye schema exists but is disabled in config
        assert!(!caps.has(Capability::OpenEye));
        assert!(!caps.has(Capability::PathTree));
        assert_eq!(caps.to_string(), "rdkit,rdkit-cartridge,pg_trgm,cube");
    }

    #[test]
    fn report_lists_every_capability() {
        let config = CredoConfig::parse(RAW).expect("config");
        let report = Capabilities::assumed(&config).report();
        assert_eq!(report.len(), Capability::ALL.len());
        assert!(report.contains(&(Capability::OpenEye, false)));
    }
}
