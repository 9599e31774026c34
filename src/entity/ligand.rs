use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{entity_identity, load_deferred, Column, Entity, Partitioned, PathEntity, Table};
use crate::adaptor::{
    AtomAdaptor, BiomoleculeAdaptor, ContactAdaptor, FetchArgs, FragmentAdaptor,
    LigandComponentAdaptor, LigandFragmentAdaptor, ResidueAdaptor, ResidueSift, SiftAdaptor,
    VariationAdaptor, WaterBridge,
};
use crate::chem::usr::{usrcat_similarity, UsrWeights};
use crate::config::Schema;
use crate::db::{Credo, Cube};
use crate::entity::{Atom, Biomolecule, Contact, Fragment, Residue, Variation};
use crate::error::{CredoError, Result};
use crate::query::Query;
use crate::sql::{ColumnRef, Expr, Select, Sql};

/// A bound small molecule: one or more PDB residues treated as a unit.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Ligand {
    pub ligand_id: i32,
    pub biomolecule_id: i32,
    pub entity_serial: Option<i32>,
    pub path: Option<String>,
    pub pdb_chain_id: String,
    pub res_num: Option<i32>,
    pub ligand_name: String,
    pub num_hvy_atoms: Option<i32>,
    pub ism: Option<String>,
    pub is_at_identity: Option<bool>,
    pub is_incomplete: Option<bool>,
    pub is_disordered: Option<bool>,
}

impl Ligand {
    pub const LIGAND_ID: ColumnRef = ColumnRef::new("ligands", "ligand_id");
    pub const BIOMOLECULE_ID: ColumnRef = ColumnRef::new("ligands", "biomolecule_id");
    pub const PATH: ColumnRef = ColumnRef::new("ligands", "path");
    pub const PDB_CHAIN_ID: ColumnRef = ColumnRef::new("ligands", "pdb_chain_id");
    pub const LIGAND_NAME: ColumnRef = ColumnRef::new("ligands", "ligand_name");
    pub const NUM_HVY_ATOMS: ColumnRef = ColumnRef::new("ligands", "num_hvy_atoms");
    pub const ISM: ColumnRef = ColumnRef::new("ligands", "ism");
    pub const IS_INCOMPLETE: ColumnRef = ColumnRef::new("ligands", "is_incomplete");

    const COLUMNS: &'static [Column] = &[
        Column::eager("ligand_id"),
        Column::eager("biomolecule_id"),
        Column::eager("entity_serial"),
        Column::text("path"),
        Column::text("pdb_chain_id"),
        Column::eager("res_num"),
        Column::eager("ligand_name"),
        Column::eager("num_hvy_atoms"),
        Column::eager("ism"),
        Column::eager("is_at_identity"),
        Column::eager("is_incomplete"),
        Column::eager("is_disordered"),
    ];

    pub async fn biomolecule(&self, credo: &Credo) -> Result<Option<Biomolecule>> {
        BiomoleculeAdaptor::new(credo.clone())
            .fetch_by_biomolecule_id(self.biomolecule_id)
            .await
    }

    pub async fn components(&self, credo: &Credo) -> Result<Vec<LigandComponent>> {
        LigandComponentAdaptor::new(credo.clone())
            .fetch_all_by_ligand_id(self.ligand_id, FetchArgs::default())
            .await?
            .collect(credo)
            .await
    }

    pub async fn ligand_fragments(&self, credo: &Credo) -> Result<Vec<LigandFragment>> {
        LigandFragmentAdaptor::new(credo.clone())
            .fetch_all_by_ligand_id(self.ligand_id, FetchArgs::default())
            .await?
            .collect(credo)
            .await
    }

    pub async fn fragments(&self, credo: &Credo) -> Result<Vec<Fragment>> {
        FragmentAdaptor::new(credo.clone())
            .fetch_all_by_ligand_id(self.ligand_id, FetchArgs::default())
            .await?
            .collect(credo)
            .await
    }

    pub async fn atoms(&self, credo: &Credo, args: FetchArgs) -> Result<Vec<Atom>> {
        AtomAdaptor::new(credo.clone())
            .fetch_all_by_ligand_id(self.ligand_id, self.biomolecule_id, args)
            .await?
            .collect(credo)
            .await
    }

    pub async fn contacts(&self, credo: &Credo, args: FetchArgs) -> Result<Vec<Contact>> {
        ContactAdaptor::new(credo.clone())
            .fetch_all_by_ligand_id(self.ligand_id, self.biomolecule_id, args)
            .await?
            .collect(credo)
            .await
    }

    pub async fn water_bridges(&self, credo: &Credo) -> Result<Vec<WaterBridge>> {
        ContactAdaptor::new(credo.clone())
            .fetch_all_water_bridges_by_ligand_id(
                self.ligand_id,
                self.biomolecule_id,
                FetchArgs::default(),
            )
            .await?
            .collect(credo)
            .await
    }

    /// Residues listed as this ligand's binding site.
    pub async fn binding_site(&self, credo: &Credo, args: FetchArgs) -> Result<Vec<Residue>> {
        ResidueAdaptor::new(credo.clone())
            .fetch_all_by_ligand_id(self.ligand_id, args)
            .await?
            .collect(credo)
            .await
    }

    /// Per-residue interaction fingerprints of the binding site.
    pub async fn sift(&self, credo: &Credo, args: FetchArgs) -> Result<Vec<ResidueSift>> {
        SiftAdaptor::new(credo.clone())
            .fetch_all_by_ligand_id(self.ligand_id, self.biomolecule_id, args)
            .await?
            .collect(credo)
            .await
    }

    pub async fn usr(&self, credo: &Credo) -> Result<Option<LigandUsr>> {
        LigandUsr::query()
            .filter(LigandUsr::LIGAND_ID.eq(self.ligand_id))
            .first(credo)
            .await
    }

    pub async fn molstring(&self, credo: &Credo) -> Result<Option<LigandMolString>> {
        LigandMolString::query()
            .filter(LigandMolString::LIGAND_ID.eq(self.ligand_id))
            .first(credo)
            .await
    }

    pub async fn variations(&self, credo: &Credo) -> Result<Vec<Variation>> {
        VariationAdaptor::new(credo.clone())
            .fetch_all_by_ligand_id(self.ligand_id, FetchArgs::default())
            .await?
            .collect(credo)
            .await
    }

    /// The binding site as PDB-formatted text, rendered by the database.
    pub async fn binding_site_pdb(&self, credo: &Credo) -> Result<Option<String>> {
        let mut column = Sql::new();
        column
            .push_table(Schema::Credo, "binding_site_pdbstring")
            .push("(")
            .push_bind(self.biomolecule_id)
            .push(", ")
            .push_bind(self.ligand_id)
            .push(")::text");
        let select = Select::new().column(column);
        let row: Option<(Option<String>,)> = Query::new(select).first(credo).await?;
        Ok(row.and_then(|(pdb,)| pdb))
    }
}

impl Entity for Ligand {
    const TABLE: Table = Table {
        schema: Schema::Credo,
        name: "ligands",
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

impl PathEntity for Ligand {
    const PATH: ColumnRef = Ligand::PATH;
}

impl Partitioned for Ligand {
    fn biomolecule_id(&self) -> i32 {
        self.biomolecule_id
    }
}

/// One PDB residue of a ligand. Keyed by `(ligand_id, residue_id)`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LigandComponent {
    pub ligand_id: i32,
    pub residue_id: i32,
    pub het_id: String,
}

impl LigandComponent {
    pub const LIGAND_ID: ColumnRef = ColumnRef::new("ligand_components", "ligand_id");
    pub const RESIDUE_ID: ColumnRef = ColumnRef::new("ligand_components", "residue_id");
    pub const HET_ID: ColumnRef = ColumnRef::new("ligand_components", "het_id");

    /// A ligand spans at most this many residues.
    pub const MAX_PER_LIGAND: usize = 10;

    const COLUMNS: &'static [Column] = &[
        Column::eager("ligand_id"),
        Column::eager("residue_id"),
        Column::text("het_id"),
    ];

    pub async fn residue(&self, credo: &Credo) -> Result<Option<Residue>> {
        ResidueAdaptor::new(credo.clone())
            .fetch_by_residue_id(self.residue_id)
            .await
    }

    pub async fn chem_comp(&self, credo: &Credo) -> Result<Option<crate::entity::ChemComp>> {
        crate::adaptor::ChemCompAdaptor::new(credo.clone())
            .fetch_by_het_id(&self.het_id)
            .await
    }
}

impl Entity for LigandComponent {
    const TABLE: Table = Table {
        schema: Schema::Credo,
        name: "ligand_components",
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

/// An occurrence of a [`Fragment`] in a ligand, with its interaction counts.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LigandFragment {
    pub ligand_fragment_id: i32,
    pub ligand_id: i32,
    pub biomolecule_id: i32,
    pub fragment_id: i32,
    pub hit: i32,
    pub is_root: bool,
    pub num_int_atoms: Option<i32>,
    pub num_hbond: Option<i32>,
    pub num_weak_hbond: Option<i32>,
    pub num_xbond: Option<i32>,
    pub num_ionic: Option<i32>,
    pub num_carbonyl: Option<i32>,
    pub num_metal_complex: Option<i32>,
    pub num_covalent: Option<i32>,
}

impl LigandFragment {
    pub const LIGAND_FRAGMENT_ID: ColumnRef =
        ColumnRef::new("ligand_fragments", "ligand_fragment_id");
    pub const LIGAND_ID: ColumnRef = ColumnRef::new("ligand_fragments", "ligand_id");
    pub const BIOMOLECULE_ID: ColumnRef = ColumnRef::new("ligand_fragments", "biomolecule_id");
    pub const FRAGMENT_ID: ColumnRef = ColumnRef::new("ligand_fragments", "fragment_id");
    pub const IS_ROOT: ColumnRef = ColumnRef::new("ligand_fragments", "is_root");

    const COLUMNS: &'static [Column] = &[
        Column::eager("ligand_fragment_id"),
        Column::eager("ligand_id"),
        Column::eager("biomolecule_id"),
        Column::eager("fragment_id"),
        Column::eager("hit"),
        Column::eager("is_root"),
        Column::eager("num_int_atoms"),
        Column::eager("num_hbond"),
        Column::eager("num_weak_hbond"),
        Column::eager("num_xbond"),
        Column::eager("num_ionic"),
        Column::eager("num_carbonyl"),
        Column::eager("num_metal_complex"),
        Column::eager("num_covalent"),
    ];

    /// Sum of the polar interaction counters.
    pub fn num_polar(&self) -> i32 {
        [
            self.num_hbond,
            self.num_weak_hbond,
            self.num_xbond,
            self.num_ionic,
            self.num_metal_complex,
        ]
        .into_iter()
        .flatten()
        .sum()
    }

    pub async fn fragment(&self, credo: &Credo) -> Result<Option<Fragment>> {
        FragmentAdaptor::new(credo.clone())
            .fetch_by_fragment_id(self.fragment_id)
            .await
    }

    pub async fn atoms(&self, credo: &Credo) -> Result<Vec<Atom>> {
        AtomAdaptor::new(credo.clone())
            .fetch_all_by_ligand_fragment_id(
                self.ligand_fragment_id,
                self.biomolecule_id,
                FetchArgs::default(),
            )
            .await?
            .collect(credo)
            .await
    }

    pub async fn contacts(&self, credo: &Credo, args: FetchArgs) -> Result<Vec<Contact>> {
        ContactAdaptor::new(credo.clone())
            .fetch_all_by_ligand_fragment_id(self.ligand_fragment_id, self.biomolecule_id, args)
            .await?
            .collect(credo)
            .await
    }

    pub async fn sift(&self, credo: &Credo, args: FetchArgs) -> Result<Vec<ResidueSift>> {
        SiftAdaptor::new(credo.clone())
            .fetch_all_by_ligand_fragment_id(self.ligand_fragment_id, self.biomolecule_id, args)
            .await?
            .collect(credo)
            .await
    }
}

impl Entity for LigandFragment {
    const TABLE: Table = Table {
        schema: Schema::Credo,
        name: "ligand_fragments",
        primary_key: &["ligand_fragment_id"],
        columns: Self::COLUMNS,
        partitioned: false,
    };

    type Key = i32;

    fn primary_key(&self) -> i32 {
        self.ligand_fragment_id
    }

    fn key_filter(&self) -> Expr {
        Self::LIGAND_FRAGMENT_ID.eq(self.ligand_fragment_id)
    }
}

impl Partitioned for LigandFragment {
    fn biomolecule_id(&self) -> i32 {
        self.biomolecule_id
    }
}

/// Atom realizing a ligand fragment.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LigandFragmentAtom {
    pub ligand_fragment_id: i32,
    pub atom_id: i32,
}

impl LigandFragmentAtom {
    pub const LIGAND_FRAGMENT_ID: ColumnRef =
        ColumnRef::new("ligand_fragment_atoms", "ligand_fragment_id");
    pub const ATOM_ID: ColumnRef = ColumnRef::new("ligand_fragment_atoms", "atom_id");

    const COLUMNS: &'static [Column] = &[
        Column::eager("ligand_fragment_id"),
        Column::eager("atom_id"),
    ];
}

impl Entity for LigandFragmentAtom {
    const TABLE: Table = Table {
        schema: Schema::Credo,
        name: "ligand_fragment_atoms",
        primary_key: &["ligand_fragment_id", "atom_id"],
        columns: Self::COLUMNS,
        partitioned: false,
    };

    type Key = (i32, i32);

    fn primary_key(&self) -> (i32, i32) {
        (self.ligand_fragment_id, self.atom_id)
    }

    fn key_filter(&self) -> Expr {
        Expr::and([
            Self::LIGAND_FRAGMENT_ID.eq(self.ligand_fragment_id),
            Self::ATOM_ID.eq(self.atom_id),
        ])
    }
}

/// USR shape descriptors of a ligand.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LigandUsr {
    pub ligand_id: i32,
    pub usr_space: Cube,
    pub usr_moments: Vec<f64>,
}

impl LigandUsr {
    pub const LIGAND_ID: ColumnRef = ColumnRef::new("ligand_usr", "ligand_id");
    pub const USR_SPACE: ColumnRef = ColumnRef::new("ligand_usr", "usr_space");
    pub const USR_MOMENTS: ColumnRef = ColumnRef::new("ligand_usr", "usr_moments");

    const COLUMNS: &'static [Column] = &[
        Column::eager("ligand_id"),
        Column::text("usr_space"),
        Column::floats("usr_moments"),
    ];

    /// USRCAT similarity to another descriptor set, computed locally.
    pub fn similarity_to(&self, other: &LigandUsr, weights: &UsrWeights) -> Result<f64> {
        usrcat_similarity(&self.usr_moments, &other.usr_moments, weights)
    }

    /// The 12 classic USR moments as stored in the shape cube.
    pub fn shape(&self) -> Result<[f64; 12]> {
        self.usr_space
            .lower()
            .try_into()
            .map_err(|_| {
                CredoError::Decode(format!(
                    "usr_space of ligand {} has {} dimensions, expected 12",
                    self.ligand_id,
                    self.usr_space.dim()
                ))
            })
    }
}

impl Entity for LigandUsr {
    const TABLE: Table = Table {
        schema: Schema::Credo,
        name: "ligand_usr",
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

/// Text representations of a ligand. The PDB block and the OpenEye binary
/// are deferred.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LigandMolString {
    pub ligand_id: i32,
    pub ism: Option<String>,
    #[sqlx(default)]
    pub pdb: Option<String>,
    #[sqlx(default)]
    pub oeb: Option<String>,
}

impl LigandMolString {
    pub const LIGAND_ID: ColumnRef = ColumnRef::new("ligand_molstrings", "ligand_id");
    pub const ISM: ColumnRef = ColumnRef::new("ligand_molstrings", "ism");
    pub const OEB: ColumnRef = ColumnRef::new("ligand_molstrings", "oeb");

    const COLUMNS: &'static [Column] = &[
        Column::eager("ligand_id"),
        Column::eager("ism"),
        Column::deferred("pdb"),
        Column::deferred("oeb"),
    ];

    pub async fn load_pdb(&mut self, credo: &Credo) -> Result<Option<&str>> {
        if self.pdb.is_none() {
            self.pdb = load_deferred(credo, self, "pdb").await?;
        }
        Ok(self.pdb.as_deref())
    }

    pub async fn load_oeb(&mut self, credo: &Credo) -> Result<Option<&str>> {
        if self.oeb.is_none() {
            self.oeb = load_deferred(credo, self, "oeb").await?;
        }
        Ok(self.oeb.as_deref())
    }
}

impl Entity for LigandMolString {
    const TABLE: Table = Table {
        schema: Schema::Credo,
        name: "ligand_molstrings",
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

entity_identity!(
    Ligand,
    LigandComponent,
    LigandFragment,
    LigandFragmentAtom,
    LigandUsr,
    LigandMolString
);
