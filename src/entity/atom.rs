use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{entity_identity, Column, Entity, Partitioned, Table};
use crate::adaptor::{ContactAdaptor, FetchArgs, ResidueAdaptor};
use crate::bitmask::AtomType;
use crate::config::Schema;
use crate::db::{Credo, Vector3d};
use crate::entity::{Contact, Residue};
use crate::error::Result;
use crate::sql::{ColumnRef, Expr};

/// An atom of a biomolecule. Atoms are partitioned by `biomolecule_id`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Atom {
    pub atom_id: i32,
    pub biomolecule_id: i32,
    pub residue_id: i32,
    pub path: Option<String>,
    pub atom_serial: i32,
    pub group_pdb: Option<String>,
    pub atom_name: String,
    pub alt_loc: String,
    pub coords: Vector3d,
    pub occupancy: Option<f64>,
    pub b_factor: Option<f64>,
    pub element: String,
    pub hyb: Option<i32>,
    pub tripos_atom_type: Option<String>,
    pub is_donor: bool,
    pub is_acceptor: bool,
    pub is_aromatic: bool,
    pub is_weak_acceptor: bool,
    pub is_weak_donor: bool,
    pub is_hydrophobe: bool,
    pub is_metal: bool,
    pub is_pos_ionisable: bool,
    pub is_neg_ionisable: bool,
    pub is_xbond_donor: bool,
    pub is_xbond_acceptor: bool,
    pub is_carbonyl_oxygen: bool,
    pub is_carbonyl_carbon: bool,
}

impl Atom {
    pub const ATOM_ID: ColumnRef = ColumnRef::new("atoms", "atom_id");
    pub const BIOMOLECULE_ID: ColumnRef = ColumnRef::new("atoms", "biomolecule_id");
    pub const RESIDUE_ID: ColumnRef = ColumnRef::new("atoms", "residue_id");
    pub const ATOM_NAME: ColumnRef = ColumnRef::new("atoms", "atom_name");
    pub const ALT_LOC: ColumnRef = ColumnRef::new("atoms", "alt_loc");
    pub const ELEMENT: ColumnRef = ColumnRef::new("atoms", "element");
    pub const IS_DONOR: ColumnRef = ColumnRef::new("atoms", "is_donor");
    pub const IS_ACCEPTOR: ColumnRef = ColumnRef::new("atoms", "is_acceptor");
    pub const IS_METAL: ColumnRef = ColumnRef::new("atoms", "is_metal");

    const COLUMNS: &'static [Column] = &[
        Column::eager("atom_id"),
        Column::eager("biomolecule_id"),
        Column::eager("residue_id"),
        Column::text("path"),
        Column::eager("atom_serial"),
        Column::text("group_pdb"),
        Column::text("atom_name"),
        Column::text("alt_loc"),
        Column::text("coords"),
        Column::float("occupancy"),
        Column::float("b_factor"),
        Column::text("element"),
        Column::eager("hyb"),
        Column::text("tripos_atom_type"),
        Column::eager("is_donor"),
        Column::eager("is_acceptor"),
        Column::eager("is_aromatic"),
        Column::eager("is_weak_acceptor"),
        Column::eager("is_weak_donor"),
        Column::eager("is_hydrophobe"),
        Column::eager("is_metal"),
        Column::eager("is_pos_ionisable"),
        Column::eager("is_neg_ionisable"),
        Column::eager("is_xbond_donor"),
        Column::eager("is_xbond_acceptor"),
        Column::eager("is_carbonyl_oxygen"),
        Column::eager("is_carbonyl_carbon"),
    ];

    /// The 13-bit typed-atom mask.
    pub fn atom_type(&self) -> AtomType {
        AtomType::from_flags([
            self.is_donor,
            self.is_acceptor,
            self.is_aromatic,
            self.is_weak_acceptor,
            self.is_weak_donor,
            self.is_hydrophobe,
            self.is_metal,
            self.is_pos_ionisable,
            self.is_neg_ionisable,
            self.is_xbond_donor,
            self.is_xbond_acceptor,
            self.is_carbonyl_oxygen,
            self.is_carbonyl_carbon,
        ])
    }

    pub fn distance_to(&self, other: &Atom) -> f64 {
        self.coords.distance(&other.coords)
    }

    pub async fn residue(&self, credo: &Credo) -> Result<Option<Residue>> {
        ResidueAdaptor::new(credo.clone())
            .fetch_by_residue_id(self.residue_id)
            .await
    }

    /// Contacts in which this atom takes part on either side.
    pub async fn contacts(&self, credo: &Credo, args: FetchArgs) -> Result<Vec<Contact>> {
        ContactAdaptor::new(credo.clone())
            .fetch_all_by_atom_id(self.atom_id, self.biomolecule_id, args)
            .await?
            .collect(credo)
            .await
    }
}

impl Entity for Atom {
    const TABLE: Table = Table {
        schema: Schema::Credo,
        name: "atoms",
        primary_key: &["atom_id"],
        columns: Self::COLUMNS,
        partitioned: true,
    };

    type Key = i32;

    fn primary_key(&self) -> i32 {
        self.atom_id
    }

    /// Pins the partition as well as the key.
    fn key_filter(&self) -> Expr {
        Expr::and([
            Self::ATOM_ID.eq(self.atom_id),
            Self::BIOMOLECULE_ID.eq(self.biomolecule_id),
        ])
    }
}

impl Partitioned for Atom {
    fn biomolecule_id(&self) -> i32 {
        self.biomolecule_id
    }
}

entity_identity!(Atom);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchemaNames;

    fn atom(atom_id: i32, name: &str, coords: Vector3d) -> Atom {
        Atom {
            atom_id,
            biomolecule_id: 9,
            residue_id: 3,
            path: None,
            atom_serial: atom_id,
            group_pdb: Some("ATOM".to_string()),
            atom_name: name.to_string(),
            alt_loc: " ".to_string(),
            coords,
            occupancy: Some(1.0),
            b_factor: None,
            element: "O".to_string(),
            hyb: None,
            tripos_atom_type: None,
            is_donor: true,
            is_acceptor: true,
            is_aromatic: false,
            is_weak_acceptor: false,
            is_weak_donor: false,
            is_hydrophobe: false,
            is_metal: false,
            is_pos_ionisable: false,
            is_neg_ionisable: false,
            is_xbond_donor: false,
            is_xbond_acceptor: false,
            is_carbonyl_oxygen: false,
            is_carbonyl_carbon: false,
        }
    }

    #[test]
    fn atom_type_mask_uses_feature_flags() {
        let og = atom(1, "OG", Vector3d::new(0.0, 0.0, 0.0));
        let mask = og.atom_type();
        assert!(mask.has("is_donor"));
        assert!(mask.has("is_acceptor"));
        assert!(!mask.has("is_metal"));
        assert_eq!(mask.0, 0b11);
    }

    #[test]
    fn key_filter_pins_the_partition() {
        let og = atom(1, "OG", Vector3d::new(0.0, 0.0, 0.0));
        let filter = og.key_filter();
        assert!(filter.pins(Atom::BIOMOLECULE_ID));
        assert_eq!(
            filter.to_sql().to_sql(&SchemaNames::default()),
            "(atoms.atom_id = $1) AND (atoms.biomolecule_id = $2)"
        );
    }

    #[test]
    fn distance_between_atoms() {
        let a = atom(1, "OG", Vector3d::new(0.0, 0.0, 0.0));
        let b = atom(2, "N", Vector3d::new(0.0, 3.0, 4.0));
        assert!((a.distance_to(&b) - 5.0).abs() < 1e-12);
    }
}
