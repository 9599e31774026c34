use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{entity_identity, Column, Entity, Table};
use crate::adaptor::{FetchArgs, FragmentAdaptor, LigandAdaptor, XRefAdaptor};
use crate::chem::usr::{usrcat_similarity, UsrWeights};
use crate::config::Schema;
use crate::db::{Credo, Cube};
use crate::entity::{Fragment, Ligand, XRef};
use crate::error::Result;
use crate::sql::{ColumnRef, Expr};

/// A PDB chemical component, keyed by its HET-ID.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ChemComp {
    pub chem_comp_id: i32,
    pub het_id: String,
    pub name: Option<String>,
    pub formula: Option<String>,
    pub ism: Option<String>,
    pub mw: Option<f64>,
    pub heavy_atom_count: Option<i32>,
    pub hbond_donors: Option<i32>,
    pub hbond_acceptors: Option<i32>,
    pub num_rings: Option<i32>,
    pub num_aro_rings: Option<i32>,
    pub num_rotatable_bonds: Option<i32>,
    pub tpsa: Option<f64>,
    pub xlogp: Option<f64>,
    pub fraction_csp3: Option<f64>,
    pub is_approved_drug: Option<bool>,
}

impl ChemComp {
    pub const CHEM_COMP_ID: ColumnRef = ColumnRef::new("chem_comps", "chem_comp_id");
    pub const HET_ID: ColumnRef = ColumnRef::new("chem_comps", "het_id");
    pub const NAME: ColumnRef = ColumnRef::new("chem_comps", "name");
    pub const ISM: ColumnRef = ColumnRef::new("chem_comps", "ism");
    pub const MW: ColumnRef = ColumnRef::new("chem_comps", "mw");
    pub const HEAVY_ATOM_COUNT: ColumnRef = ColumnRef::new("chem_comps", "heavy_atom_count");
    pub const IS_APPROVED_DRUG: ColumnRef = ColumnRef::new("chem_comps", "is_approved_drug");

    const COLUMNS: &'static [Column] = &[
        Column::eager("chem_comp_id"),
        Column::text("het_id"),
        Column::eager("name"),
        Column::eager("formula"),
        Column::eager("ism"),
        Column::float("mw"),
        Column::eager("heavy_atom_count"),
        Column::eager("hbond_donors"),
        Column::eager("hbond_acceptors"),
        Column::eager("num_rings"),
        Column::eager("num_aro_rings"),
        Column::eager("num_rotatable_bonds"),
        Column::float("tpsa"),
        Column::float("xlogp"),
        Column::float("fraction_csp3"),
        Column::eager("is_approved_drug"),
    ];

    /// Violations of Lipinski's rule of five. Missing properties count as
    /// satisfied.
    pub fn lipinski_violations(&self) -> u8 {
        [
            self.mw.is_some_and(|mw| mw > 500.0),
            self.xlogp.is_some_and(|logp| logp > 5.0),
            self.hbond_donors.is_some_and(|d| d > 5),
            self.hbond_acceptors.is_some_and(|a| a > 10),
        ]
        .into_iter()
        .filter(|&violated| violated)
        .count() as u8
    }

    /// Rule-of-three fragment compliance. Every property must be known.
    pub fn is_ro3_compliant(&self) -> bool {
        matches!(
            (
                self.mw,
                self.xlogp,
                self.hbond_donors,
                self.hbond_acceptors,
                self.num_rotatable_bonds,
                self.tpsa,
            ),
            (Some(mw), Some(logp), Some(d), Some(a), Some(rot), Some(tpsa))
                if mw <= 300.0 && logp <= 3.0 && d <= 3 && a <= 3 && rot <= 3 && tpsa <= 60.0
        )
    }

    pub async fn ligands(&self, credo: &Credo, args: FetchArgs) -> Result<Vec<Ligand>> {
        LigandAdaptor::new(credo.clone())
            .fetch_all_by_het_id(&self.het_id, args)
            .await?
            .collect(credo)
            .await
    }

    pub async fn fragments(&self, credo: &Credo) -> Result<Vec<Fragment>> {
        FragmentAdaptor::new(credo.clone())
            .fetch_all_by_het_id(&self.het_id, FetchArgs::default())
            .await?
            .collect(credo)
            .await
    }

    pub async fn conformers(&self, credo: &Credo) -> Result<Vec<ChemCompConformer>> {
        ChemCompConformer::query()
            .filter(ChemCompConformer::HET_ID.eq(self.het_id.as_str()))
            .order_by(ChemCompConformer::CONFORMER, crate::sql::Direction::Asc)
            .all(credo)
            .await
    }

    pub async fn rdmol(&self, credo: &Credo) -> Result<Option<ChemCompRDMol>> {
        ChemCompRDMol::query()
            .filter(ChemCompRDMol::HET_ID.eq(self.het_id.as_str()))
            .first(credo)
            .await
    }

    pub async fn rdfp(&self, credo: &Credo) -> Result<Option<ChemCompRDFP>> {
        ChemCompRDFP::query()
            .filter(ChemCompRDFP::HET_ID.eq(self.het_id.as_str()))
            .first(credo)
            .await
    }

    pub async fn xrefs(&self, credo: &Credo) -> Result<Vec<XRef>> {
        XRefAdaptor::new(credo.clone())
            .fetch_all_by_entity("ChemComp", self.chem_comp_id, FetchArgs::default())
            .await?
            .collect(credo)
            .await
    }
}

impl Entity for ChemComp {
    const TABLE: Table = Table {
        schema: Schema::PdbChem,
        name: "chem_comps",
        primary_key: &["chem_comp_id"],
        columns: Self::COLUMNS,
        partitioned: false,
    };

    type Key = i32;

    fn primary_key(&self) -> i32 {
        self.chem_comp_id
    }

    fn key_filter(&self) -> Expr {
        Self::CHEM_COMP_ID.eq(self.chem_comp_id)
    }
}

/// One 3D conformer of a chemical component with its USR descriptors.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ChemCompConformer {
    pub chem_comp_conformer_id: i32,
    pub het_id: String,
    pub conformer: i32,
    pub usr_space: Cube,
    pub usr_moments: Vec<f64>,
}

impl ChemCompConformer {
    pub const CHEM_COMP_CONFORMER_ID: ColumnRef =
        ColumnRef::new("chem_comp_conformers", "chem_comp_conformer_id");
    pub const HET_ID: ColumnRef = ColumnRef::new("chem_comp_conformers", "het_id");
    pub const CONFORMER: ColumnRef = ColumnRef::new("chem_comp_conformers", "conformer");
    pub const USR_SPACE: ColumnRef = ColumnRef::new("chem_comp_conformers", "usr_space");
    pub const USR_MOMENTS: ColumnRef = ColumnRef::new("chem_comp_conformers", "usr_moments");

    const COLUMNS: &'static [Column] = &[
        Column::eager("chem_comp_conformer_id"),
        Column::text("het_id"),
        Column::eager("conformer"),
        Column::text("usr_space"),
        Column::floats("usr_moments"),
    ];

    pub fn similarity_to(&self, other: &ChemCompConformer, weights: &UsrWeights) -> Result<f64> {
        usrcat_similarity(&self.usr_moments, &other.usr_moments, weights)
    }
}

impl Entity for ChemCompConformer {
    const TABLE: Table = Table {
        schema: Schema::PdbChem,
        name: "chem_comp_conformers",
        primary_key: &["chem_comp_conformer_id"],
        columns: Self::COLUMNS,
        partitioned: false,
    };

    type Key = i32;

    fn primary_key(&self) -> i32 {
        self.chem_comp_conformer_id
    }

    fn key_filter(&self) -> Expr {
        Self::CHEM_COMP_CONFORMER_ID.eq(self.chem_comp_conformer_id)
    }
}

/// Occurrence of a fragment in a chemical component.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ChemCompFragment {
    pub chem_comp_fragment_id: i32,
    pub het_id: String,
    pub fragment_id: i32,
    pub hit: i32,
}

impl ChemCompFragment {
    pub const CHEM_COMP_FRAGMENT_ID: ColumnRef =
        ColumnRef::new("chem_comp_fragments", "chem_comp_fragment_id");
    pub const HET_ID: ColumnRef = ColumnRef::new("chem_comp_fragments", "het_id");
    pub const FRAGMENT_ID: ColumnRef = ColumnRef::new("chem_comp_fragments", "fragment_id");

    const COLUMNS: &'static [Column] = &[
        Column::eager("chem_comp_fragment_id"),
        Column::text("het_id"),
        Column::eager("fragment_id"),
        Column::eager("hit"),
    ];
}

impl Entity for ChemCompFragment {
    const TABLE: Table = Table {
        schema: Schema::PdbChem,
        name: "chem_comp_fragments",
        primary_key: &["chem_comp_fragment_id"],
        columns: Self::COLUMNS,
        partitioned: false,
    };

    type Key = i32;

    fn primary_key(&self) -> i32 {
        self.chem_comp_fragment_id
    }

    fn key_filter(&self) -> Expr {
        Self::CHEM_COMP_FRAGMENT_ID.eq(self.chem_comp_fragment_id)
    }
}

/// RDKit molecule of a chemical component, projected as SMILES text.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ChemCompRDMol {
    pub het_id: String,
    pub rdmol: Option<String>,
}

impl ChemCompRDMol {
    pub const HET_ID: ColumnRef = ColumnRef::new("chem_comp_rdmols", "het_id");
    pub const RDMOL: ColumnRef = ColumnRef::new("chem_comp_rdmols", "rdmol");

    const COLUMNS: &'static [Column] = &[Column::text("het_id"), Column::text("rdmol")];
}

impl Entity for ChemCompRDMol {
    const TABLE: Table = Table {
        schema: Schema::PdbChem,
        name: "chem_comp_rdmols",
        primary_key: &["het_id"],
        columns: Self::COLUMNS,
        partitioned: false,
    };

    type Key = String;

    fn primary_key(&self) -> String {
        self.het_id.clone()
    }

    fn key_filter(&self) -> Expr {
        Self::HET_ID.eq(self.het_id.as_str())
    }
}

/// RDKit fingerprints of a chemical component, one column per type.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ChemCompRDFP {
    pub het_id: String,
    pub circular_fp: Option<String>,
    pub atompair_fp: Option<String>,
    pub torsion_fp: Option<String>,
    pub maccs_fp: Option<String>,
    pub layered_fp: Option<String>,
    pub avalon_fp: Option<String>,
}

impl ChemCompRDFP {
    pub const HET_ID: ColumnRef = ColumnRef::new("chem_comp_rdfps", "het_id");

    const COLUMNS: &'static [Column] = &[
        Column::text("het_id"),
        Column::text("circular_fp"),
        Column::text("atompair_fp"),
        Column::text("torsion_fp"),
        Column::text("maccs_fp"),
        Column::text("layered_fp"),
        Column::text("avalon_fp"),
    ];
}

impl Entity for ChemCompRDFP {
    const TABLE: Table = Table {
        schema: Schema::PdbChem,
        name: "chem_comp_rdfps",
        primary_key: &["het_id"],
        columns: Self::COLUMNS,
        partitioned: false,
    };

    type Key = String;

    fn primary_key(&self) -> String {
        self.het_id.clone()
    }

    fn key_filter(&self) -> Expr {
        Self::HET_ID.eq(self.het_id.as_str())
    }
}

entity_identity!(
    ChemComp,
    ChemCompConformer,
    ChemCompFragment,
    ChemCompRDMol,
    ChemCompRDFP
);

#[cfg(test)]
mod tests {
    use super::*;

    fn chem_comp(mw: f64, xlogp: f64, donors: i32, acceptors: i32) -> ChemComp {
        ChemComp {
            chem_comp_id: 1,
            het_id: "STI".to_string(),
            name: Some("IMATINIB".to_string()),
            formula: None,
            ism: None,
            mw: Some(mw),
            heavy_atom_count: Some(37),
            hbond_donors: Some(donors),
            hbond_acceptors: Some(acceptors),
            num_rings: Some(5),
            num_aro_rings: Some(4),
            num_rotatable_bonds: Some(2),
            tpsa: Some(50.0),
            xlogp: Some(xlogp),
            fraction_csp3: Some(0.2),
            is_approved_drug: Some(true),
        }
    }

    #[test]
    fn lipinski_counts_each_rule_once() {
        assert_eq!(chem_comp(493.6, 4.4, 2, 7).lipinski_violations(), 0);
        assert_eq!(chem_comp(720.0, 6.1, 6, 12).lipinski_violations(), 4);
        assert_eq!(chem_comp(520.0, 2.0, 1, 3).lipinski_violations(), 1);
    }

    #[test]
    fn rule_of_three_requires_every_property() {
        assert!(chem_comp(250.0, 1.5, 2, 3).is_ro3_compliant());
        assert!(!chem_comp(350.0, 1.5, 2, 3).is_ro3_compliant());

        let mut unknown = chem_comp(250.0, 1.5, 2, 3);
        unknown.tpsa = None;
        assert!(!unknown.is_ro3_compliant());
    }
}
