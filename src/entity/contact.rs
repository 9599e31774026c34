use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{entity_identity, Column, Entity, Partitioned, Table};
use crate::adaptor::AtomAdaptor;
use crate::bitmask::{split_interaction_type_bm, EntityTypes, Sift};
use crate::config::Schema;
use crate::db::Credo;
use crate::entity::Atom;
use crate::error::Result;
use crate::sql::{ColumnRef, Expr};

/// An interatomic contact. Stored directed (`bgn` -> `end`) but treated as an
/// undirected edge by every traversal.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Contact {
    pub contact_id: i32,
    pub biomolecule_id: i32,
    pub atom_bgn_id: i32,
    pub atom_end_id: i32,
    pub distance: f64,
    pub structural_interaction_type_bm: i32,
    pub is_same_entity: bool,
    pub is_secondary: bool,
    pub is_clash: bool,
    pub is_covalent: bool,
    pub is_vdw_clash: bool,
    pub is_vdw: bool,
    pub is_proximal: bool,
    pub is_hbond: bool,
    pub is_weak_hbond: bool,
    pub is_xbond: bool,
    pub is_ionic: bool,
    pub is_metal_complex: bool,
    pub is_aromatic: bool,
    pub is_hydrophobic: bool,
    pub is_carbonyl: bool,
}

impl Contact {
    pub const CONTACT_ID: ColumnRef = ColumnRef::new("contacts", "contact_id");
    pub const BIOMOLECULE_ID: ColumnRef = ColumnRef::new("contacts", "biomolecule_id");
    pub const ATOM_BGN_ID: ColumnRef = ColumnRef::new("contacts", "atom_bgn_id");
    pub const ATOM_END_ID: ColumnRef = ColumnRef::new("contacts", "atom_end_id");
    pub const DISTANCE: ColumnRef = ColumnRef::new("contacts", "distance");
    pub const STRUCTURAL_INTERACTION_TYPE_BM: ColumnRef =
        ColumnRef::new("contacts", "structural_interaction_type_bm");
    pub const IS_SAME_ENTITY: ColumnRef = ColumnRef::new("contacts", "is_same_entity");
    pub const IS_SECONDARY: ColumnRef = ColumnRef::new("contacts", "is_secondary");
    pub const IS_CLASH: ColumnRef = ColumnRef::new("contacts", "is_clash");
    pub const IS_COVALENT: ColumnRef = ColumnRef::new("contacts", "is_covalent");
    pub const IS_VDW: ColumnRef = ColumnRef::new("contacts", "is_vdw");
    pub const IS_PROXIMAL: ColumnRef = ColumnRef::new("contacts", "is_proximal");
    pub const IS_HBOND: ColumnRef = ColumnRef::new("contacts", "is_hbond");
    pub const IS_WEAK_HBOND: ColumnRef = ColumnRef::new("contacts", "is_weak_hbond");
    pub const IS_XBOND: ColumnRef = ColumnRef::new("contacts", "is_xbond");
    pub const IS_IONIC: ColumnRef = ColumnRef::new("contacts", "is_ionic");
    pub const IS_METAL_COMPLEX: ColumnRef = ColumnRef::new("contacts", "is_metal_complex");
    pub const IS_AROMATIC: ColumnRef = ColumnRef::new("contacts", "is_aromatic");
    pub const IS_HYDROPHOBIC: ColumnRef = ColumnRef::new("contacts", "is_hydrophobic");
    pub const IS_CARBONYL: ColumnRef = ColumnRef::new("contacts", "is_carbonyl");

    const COLUMNS: &'static [Column] = &[
        Column::eager("contact_id"),
        Column::eager("biomolecule_id"),
        Column::eager("atom_bgn_id"),
        Column::eager("atom_end_id"),
        Column::float("distance"),
        Column::eager("structural_interaction_type_bm"),
        Column::eager("is_same_entity"),
        Column::eager("is_secondary"),
        Column::eager("is_clash"),
        Column::eager("is_covalent"),
        Column::eager("is_vdw_clash"),
        Column::eager("is_vdw"),
        Column::eager("is_proximal"),
        Column::eager("is_hbond"),
        Column::eager("is_weak_hbond"),
        Column::eager("is_xbond"),
        Column::eager("is_ionic"),
        Column::eager("is_metal_complex"),
        Column::eager("is_aromatic"),
        Column::eager("is_hydrophobic"),
        Column::eager("is_carbonyl"),
    ];

    /// This contact's interaction fingerprint (each feature 0 or 1).
    pub fn sift(&self) -> Sift {
        Sift::from_flags([
            self.is_clash,
            self.is_covalent,
            self.is_vdw_clash,
            self.is_vdw,
            self.is_proximal,
            self.is_hbond,
            self.is_weak_hbond,
            self.is_xbond,
            self.is_ionic,
            self.is_metal_complex,
            self.is_aromatic,
            self.is_hydrophobic,
            self.is_carbonyl,
        ])
    }

    /// Entity types of the `(bgn, end)` residues.
    pub fn entity_types(&self) -> (EntityTypes, EntityTypes) {
        split_interaction_type_bm(self.structural_interaction_type_bm)
    }

    pub fn involves(&self, atom_id: i32) -> bool {
        self.atom_bgn_id == atom_id || self.atom_end_id == atom_id
    }

    /// The atom on the other side of `atom_id`.
    pub fn partner_of(&self, atom_id: i32) -> Option<i32> {
        if self.atom_bgn_id == atom_id {
            Some(self.atom_end_id)
        } else if self.atom_end_id == atom_id {
            Some(self.atom_bgn_id)
        } else {
            None
        }
    }

    pub async fn atom_bgn(&self, credo: &Credo) -> Result<Option<Atom>> {
        AtomAdaptor::new(credo.clone())
            .fetch_by_atom_id(self.atom_bgn_id, self.biomolecule_id)
            .await
    }

    pub async fn atom_end(&self, credo: &Credo) -> Result<Option<Atom>> {
        AtomAdaptor::new(credo.clone())
            .fetch_by_atom_id(self.atom_end_id, self.biomolecule_id)
            .await
    }
}

impl Entity for Contact {
    const TABLE: Table = Table {
        schema: Schema::Credo,
        name: "contacts",
        primary_key: &["contact_id"],
        columns: Self::COLUMNS,
        partitioned: true,
    };

    type Key = i32;

    fn primary_key(&self) -> i32 {
        self.contact_id
    }

    fn key_filter(&self) -> Expr {
        Expr::and([
            Self::CONTACT_ID.eq(self.contact_id),
            Self::BIOMOLECULE_ID.eq(self.biomolecule_id),
        ])
    }
}

impl Partitioned for Contact {
    fn biomolecule_id(&self) -> i32 {
        self.biomolecule_id
    }
}

entity_identity!(Contact);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmask::{interaction_type_bm, EntityType};

    fn contact(contact_id: i32, bgn: i32, end: i32) -> Contact {
        Contact {
            contact_id,
            biomolecule_id: 9,
            atom_bgn_id: bgn,
            atom_end_id: end,
            distance: 2.9,
            structural_interaction_type_bm: interaction_type_bm(
                EntityType::Ligand,
                EntityType::Protein,
            ),
            is_same_entity: false,
            is_secondary: false,
            is_clash: false,
            is_covalent: false,
            is_vdw_clash: false,
            is_vdw: false,
            is_proximal: true,
            is_hbond: true,
            is_weak_hbond: false,
            is_xbond: false,
            is_ionic: false,
            is_metal_complex: false,
            is_aromatic: false,
            is_hydrophobic: false,
            is_carbonyl: false,
        }
    }

    #[test]
    fn contacts_are_undirected_edges() {
        let c = contact(1, 10, 20);
        assert!(c.involves(10));
        assert!(c.involves(20));
        assert_eq!(c.partner_of(10), Some(20));
        assert_eq!(c.partner_of(20), Some(10));
        assert_eq!(c.partner_of(30), None);
    }

    #[test]
    fn per_contact_sift_and_entity_types() {
        let c = contact(1, 10, 20);
        let sift = c.sift();
        assert_eq!(sift.total(), 2);
        assert_eq!(sift.present(), vec!["is_proximal", "is_hbond"]);
        assert_eq!(
            c.entity_types(),
            (EntityType::Ligand.into(), EntityType::Protein.into())
        );
    }
}
