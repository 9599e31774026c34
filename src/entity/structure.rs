use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{entity_identity, load_deferred, Column, Entity, PathEntity, Table};
use crate::adaptor::{
    BiomoleculeAdaptor, ChainAdaptor, FetchArgs, InterfaceAdaptor, GrooveAdaptor, LigandAdaptor,
};
use crate::config::Schema;
use crate::db::Credo;
use crate::entity::{Chain, Groove, Interface, Ligand};
use crate::error::Result;
use crate::sql::{ColumnRef, Expr};

/// A PDB entry.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Structure {
    pub structure_id: i32,
    pub pdb: String,
    pub method: Option<String>,
    pub resolution: Option<f64>,
    pub r_factor: Option<f64>,
    pub r_free: Option<f64>,
    pub ph: Option<f64>,
    pub dpi: Option<f64>,
    pub num_biomolecules: i32,
    pub deposition_date: Option<NaiveDate>,
    pub modified_date: Option<NaiveDate>,
    #[sqlx(default)]
    pub title: Option<String>,
    #[sqlx(default)]
    pub authors: Option<String>,
}

impl Structure {
    pub const STRUCTURE_ID: ColumnRef = ColumnRef::new("structures", "structure_id");
    pub const PDB: ColumnRef = ColumnRef::new("structures", "pdb");
    pub const METHOD: ColumnRef = ColumnRef::new("structures", "method");
    pub const RESOLUTION: ColumnRef = ColumnRef::new("structures", "resolution");
    pub const DEPOSITION_DATE: ColumnRef = ColumnRef::new("structures", "deposition_date");

    const COLUMNS: &'static [Column] = &[
        Column::eager("structure_id"),
        Column::eager("pdb"),
        Column::eager("method"),
        Column::float("resolution"),
        Column::float("r_factor"),
        Column::float("r_free"),
        Column::float("ph"),
        Column::float("dpi"),
        Column::eager("num_biomolecules"),
        Column::eager("deposition_date"),
        Column::eager("modified_date"),
        Column::deferred("title"),
        Column::deferred("authors"),
    ];

    pub async fn load_title(&mut self, credo: &Credo) -> Result<Option<&str>> {
        if self.title.is_none() {
            self.title = load_deferred(credo, self, "title").await?;
        }
        Ok(self.title.as_deref())
    }

    pub async fn load_authors(&mut self, credo: &Credo) -> Result<Option<&str>> {
        if self.authors.is_none() {
            self.authors = load_deferred(credo, self, "authors").await?;
        }
        Ok(self.authors.as_deref())
    }

    pub async fn biomolecules(&self, credo: &Credo) -> Result<Vec<Biomolecule>> {
        BiomoleculeAdaptor::new(credo.clone())
            .fetch_all_by_structure_id(self.structure_id, FetchArgs::default())
            .await?
            .collect(credo)
            .await
    }

    /// Biomolecules keyed by assembly serial.
    pub async fn biomolecules_by_serial(&self, credo: &Credo) -> Result<BTreeMap<i32, Biomolecule>> {
        Ok(self
            .biomolecules(credo)
            .await?
            .into_iter()
            .map(|b| (b.assembly_serial, b))
            .collect())
    }

    pub async fn ligands(&self, credo: &Credo, args: FetchArgs) -> Result<Vec<Ligand>> {
        LigandAdaptor::new(credo.clone())
            .fetch_all_by_structure_id(self.structure_id, args)
            .await?
            .collect(credo)
            .await
    }

    pub async fn interfaces(&self, credo: &Credo) -> Result<Vec<Interface>> {
        InterfaceAdaptor::new(credo.clone())
            .fetch_all_by_structure_id(self.structure_id, FetchArgs::default())
            .await?
            .collect(credo)
            .await
    }
}

impl Entity for Structure {
    const TABLE: Table = Table {
        schema: Schema::Credo,
        name: "structures",
        primary_key: &["structure_id"],
        columns: Self::COLUMNS,
        partitioned: false,
    };

    type Key = i32;

    fn primary_key(&self) -> i32 {
        self.structure_id
    }

    fn key_filter(&self) -> Expr {
        Self::STRUCTURE_ID.eq(self.structure_id)
    }
}

/// A biological assembly generated from a structure.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Biomolecule {
    pub biomolecule_id: i32,
    pub structure_id: i32,
    pub path: Option<String>,
    pub assembly_serial: i32,
    pub assembly_type: Option<String>,
    pub conformational_state_bm: Option<i32>,
    pub structural_interaction_bm: Option<i32>,
    pub num_chains: Option<i32>,
    pub num_ligands: Option<i32>,
    pub num_atoms: Option<i32>,
}

impl Biomolecule {
    pub const BIOMOLECULE_ID: ColumnRef = ColumnRef::new("biomolecules", "biomolecule_id");
    pub const STRUCTURE_ID: ColumnRef = ColumnRef::new("biomolecules", "structure_id");
    pub const PATH: ColumnRef = ColumnRef::new("biomolecules", "path");
    pub const ASSEMBLY_SERIAL: ColumnRef = ColumnRef::new("biomolecules", "assembly_serial");

    const COLUMNS: &'static [Column] = &[
        Column::eager("biomolecule_id"),
        Column::eager("structure_id"),
        Column::text("path"),
        Column::eager("assembly_serial"),
        Column::eager("assembly_type"),
        Column::eager("conformational_state_bm"),
        Column::eager("structural_interaction_bm"),
        Column::eager("num_chains"),
        Column::eager("num_ligands"),
        Column::eager("num_atoms"),
    ];

    pub async fn structure(&self, credo: &Credo) -> Result<Option<Structure>> {
        crate::adaptor::StructureAdaptor::new(credo.clone())
            .fetch_by_structure_id(self.structure_id)
            .await
    }

    pub async fn chains(&self, credo: &Credo) -> Result<Vec<Chain>> {
        ChainAdaptor::new(credo.clone())
            .fetch_all_by_biomolecule_id(self.biomolecule_id, FetchArgs::default())
            .await?
            .collect(credo)
            .await
    }

    /// Chains keyed by PDB chain id.
    pub async fn chains_by_pdb_chain_id(&self, credo: &Credo) -> Result<BTreeMap<String, Chain>> {
        Ok(self
            .chains(credo)
            .await?
            .into_iter()
            .map(|c| (c.pdb_chain_id.clone(), c))
            .collect())
    }

    pub async fn ligands(&self, credo: &Credo, args: FetchArgs) -> Result<Vec<Ligand>> {
        LigandAdaptor::new(credo.clone())
            .fetch_all_by_biomolecule_id(self.biomolecule_id, args)
            .await?
            .collect(credo)
            .await
    }

    pub async fn interfaces(&self, credo: &Credo) -> Result<Vec<Interface>> {
        InterfaceAdaptor::new(credo.clone())
            .fetch_all_by_biomolecule_id(self.biomolecule_id, FetchArgs::default())
            .await?
            .collect(credo)
            .await
    }

    pub async fn grooves(&self, credo: &Credo) -> Result<Vec<Groove>> {
        GrooveAdaptor::new(credo.clone())
            .fetch_all_by_biomolecule_id(self.biomolecule_id, FetchArgs::default())
            .await?
            .collect(credo)
            .await
    }
}

impl Entity for Biomolecule {
    const TABLE: Table = Table {
        schema: Schema::Credo,
        name: "biomolecules",
        primary_key: &["biomolecule_id"],
        columns: Self::COLUMNS,
        partitioned: false,
    };

    type Key = i32;

    fn primary_key(&self) -> i32 {
        self.biomolecule_id
    }

    fn key_filter(&self) -> Expr {
        Self::BIOMOLECULE_ID.eq(self.biomolecule_id)
    }
}

impl PathEntity for Biomolecule {
    const PATH: ColumnRef = Biomolecule::PATH;
}

impl super::Partitioned for Biomolecule {
    fn biomolecule_id(&self) -> i32 {
        self.biomolecule_id
    }
}

entity_identity!(Structure, Biomolecule);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn structure(id: i32, pdb: &str) -> Structure {
        Structure {
            structure_id: id,
            pdb: pdb.to_string(),
            method: None,
            resolution: Some(2.0),
            r_factor: None,
            r_free: None,
            ph: None,
            dpi: None,
            num_biomolecules: 1,
            deposition_date: None,
            modified_date: None,
            title: None,
            authors: None,
        }
    }

    #[test]
    fn identity_follows_primary_key() {
        let a = structure(1, "2P33");
        let mut b = structure(1, "2P33");
        b.resolution = Some(3.1);
        b.title = Some("loaded".to_string());
        let c = structure(2, "2P33");
        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<_> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }
}
