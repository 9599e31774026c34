use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{entity_identity, Column, Entity, Partitioned, Table};
use crate::adaptor::{AtomAdaptor, FetchArgs, RingInteractionAdaptor};
use crate::config::Schema;
use crate::db::{Credo, Vector3d};
use crate::entity::Atom;
use crate::error::Result;
use crate::sql::{ColumnRef, Expr};

/// An aromatic ring of a residue.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AromaticRing {
    pub aromatic_ring_id: i32,
    pub biomolecule_id: i32,
    pub residue_id: i32,
    pub ring_serial: i32,
    pub size: i32,
    pub is_hetero_aromatic: bool,
    pub centroid: Vector3d,
    pub normal: Vector3d,
}

impl AromaticRing {
    pub const AROMATIC_RING_ID: ColumnRef = ColumnRef::new("aromatic_rings", "aromatic_ring_id");
    pub const BIOMOLECULE_ID: ColumnRef = ColumnRef::new("aromatic_rings", "biomolecule_id");
    pub const RESIDUE_ID: ColumnRef = ColumnRef::new("aromatic_rings", "residue_id");
    pub const SIZE: ColumnRef = ColumnRef::new("aromatic_rings", "size");

    const COLUMNS: &'static [Column] = &[
        Column::eager("aromatic_ring_id"),
        Column::eager("biomolecule_id"),
        Column::eager("residue_id"),
        Column::eager("ring_serial"),
        Column::eager("size"),
        Column::eager("is_hetero_aromatic"),
        Column::text("centroid"),
        Column::text("normal"),
    ];

    /// Angle between the ring planes' normals, in degrees folded to
    /// `[0, 90]`.
    pub fn interplanar_angle(&self, other: &AromaticRing) -> f64 {
        let angle = self.normal.angle_to(&other.normal);
        if angle > 90.0 { 180.0 - angle } else { angle }
    }

    pub fn centroid_distance(&self, other: &AromaticRing) -> f64 {
        self.centroid.distance(&other.centroid)
    }

    pub async fn atoms(&self, credo: &Credo) -> Result<Vec<Atom>> {
        AtomAdaptor::new(credo.clone())
            .fetch_all_by_aromatic_ring_id(
                self.aromatic_ring_id,
                self.biomolecule_id,
                FetchArgs::default(),
            )
            .await?
            .collect(credo)
            .await
    }

    pub async fn ring_interactions(&self, credo: &Credo) -> Result<Vec<RingInteraction>> {
        RingInteractionAdaptor::new(credo.clone())
            .fetch_all_by_aromatic_ring_id(self.aromatic_ring_id, FetchArgs::default())
            .await?
            .collect(credo)
            .await
    }
}

impl Entity for AromaticRing {
    const TABLE: Table = Table {
        schema: Schema::Credo,
        name: "aromatic_rings",
        primary_key: &["aromatic_ring_id"],
        columns: Self::COLUMNS,
        partitioned: false,
    };

    type Key = i32;

    fn primary_key(&self) -> i32 {
        self.aromatic_ring_id
    }

    fn key_filter(&self) -> Expr {
        Self::AROMATIC_RING_ID.eq(self.aromatic_ring_id)
    }
}

impl Partitioned for AromaticRing {
    fn biomolecule_id(&self) -> i32 {
        self.biomolecule_id
    }
}

/// A non-ring pi system, possibly spanning residues.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PiGroup {
    pub pi_id: i32,
    pub biomolecule_id: i32,
    pub pi_serial: i32,
    pub size: i32,
    pub centroid: Vector3d,
    pub normal: Vector3d,
}

impl PiGroup {
    pub const PI_ID: ColumnRef = ColumnRef::new("pi_groups", "pi_id");
    pub const BIOMOLECULE_ID: ColumnRef = ColumnRef::new("pi_groups", "biomolecule_id");

    const COLUMNS: &'static [Column] = &[
        Column::eager("pi_id"),
        Column::eager("biomolecule_id"),
        Column::eager("pi_serial"),
        Column::eager("size"),
        Column::text("centroid"),
        Column::text("normal"),
    ];

    pub async fn atoms(&self, credo: &Credo) -> Result<Vec<Atom>> {
        AtomAdaptor::new(credo.clone())
            .fetch_all_by_pi_id(self.pi_id, self.biomolecule_id, FetchArgs::default())
            .await?
            .collect(credo)
            .await
    }
}

impl Entity for PiGroup {
    const TABLE: Table = Table {
        schema: Schema::Credo,
        name: "pi_groups",
        primary_key: &["pi_id"],
        columns: Self::COLUMNS,
        partitioned: false,
    };

    type Key = i32;

    fn primary_key(&self) -> i32 {
        self.pi_id
    }

    fn key_filter(&self) -> Expr {
        Self::PI_ID.eq(self.pi_id)
    }
}

impl Partitioned for PiGroup {
    fn biomolecule_id(&self) -> i32 {
        self.biomolecule_id
    }
}

/// Ring-ring stacking geometry. `interaction_type` is one of the two-letter
/// tags (`FF`, `OF`, `EE`, `FT`, `OT`, `ET`, `FE`, `OE`, `EF`).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RingInteraction {
    pub ring_interaction_id: i32,
    pub biomolecule_id: i32,
    pub aromatic_ring_bgn_id: i32,
    pub aromatic_ring_end_id: i32,
    pub closest_atom_distance: Option<f64>,
    pub distance: f64,
    pub dihedral: Option<f64>,
    pub theta: Option<f64>,
    pub iota: Option<f64>,
    pub interaction_type: Option<String>,
    pub is_intramolecular: Option<bool>,
}

impl RingInteraction {
    pub const RING_INTERACTION_ID: ColumnRef =
        ColumnRef::new("ring_interactions", "ring_interaction_id");
    pub const BIOMOLECULE_ID: ColumnRef = ColumnRef::new("ring_interactions", "biomolecule_id");
    pub const AROMATIC_RING_BGN_ID: ColumnRef =
        ColumnRef::new("ring_interactions", "aromatic_ring_bgn_id");
    pub const AROMATIC_RING_END_ID: ColumnRef =
        ColumnRef::new("ring_interactions", "aromatic_ring_end_id");
    pub const DISTANCE: ColumnRef = ColumnRef::new("ring_interactions", "distance");
    pub const INTERACTION_TYPE: ColumnRef = ColumnRef::new("ring_interactions", "interaction_type");

    const COLUMNS: &'static [Column] = &[
        Column::eager("ring_interaction_id"),
        Column::eager("biomolecule_id"),
        Column::eager("aromatic_ring_bgn_id"),
        Column::eager("aromatic_ring_end_id"),
        Column::float("closest_atom_distance"),
        Column::float("distance"),
        Column::float("dihedral"),
        Column::float("theta"),
        Column::float("iota"),
        Column::text("interaction_type"),
        Column::eager("is_intramolecular"),
    ];

    pub fn is_parallel_stacked(&self) -> bool {
        self.interaction_type.as_deref() == Some("FF")
    }
}

impl Entity for RingInteraction {
    const TABLE: Table = Table {
        schema: Schema::Credo,
        name: "ring_interactions",
        primary_key: &["ring_interaction_id"],
        columns: Self::COLUMNS,
        partitioned: false,
    };

    type Key = i32;

    fn primary_key(&self) -> i32 {
        self.ring_interaction_id
    }

    fn key_filter(&self) -> Expr {
        Self::RING_INTERACTION_ID.eq(self.ring_interaction_id)
    }
}

/// Atom-ring interaction: `CARBONPI`, `HALOGENPI`, `DONORPI` or `CATIONPI`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AtomRingInteraction {
    pub atom_ring_interaction_id: i32,
    pub biomolecule_id: i32,
    pub aromatic_ring_id: i32,
    pub atom_id: i32,
    pub distance: f64,
    pub theta: Option<f64>,
    pub interaction_type: Option<String>,
}

impl AtomRingInteraction {
    pub const ATOM_RING_INTERACTION_ID: ColumnRef =
        ColumnRef::new("atom_ring_interactions", "atom_ring_interaction_id");
    pub const BIOMOLECULE_ID: ColumnRef =
        ColumnRef::new("atom_ring_interactions", "biomolecule_id");
    pub const AROMATIC_RING_ID: ColumnRef =
        ColumnRef::new("atom_ring_interactions", "aromatic_ring_id");
    pub const ATOM_ID: ColumnRef = ColumnRef::new("atom_ring_interactions", "atom_id");
    pub const INTERACTION_TYPE: ColumnRef =
        ColumnRef::new("atom_ring_interactions", "interaction_type");

    const COLUMNS: &'static [Column] = &[
        Column::eager("atom_ring_interaction_id"),
        Column::eager("biomolecule_id"),
        Column::eager("aromatic_ring_id"),
        Column::eager("atom_id"),
        Column::float("distance"),
        Column::float("theta"),
        Column::text("interaction_type"),
    ];
}

impl Entity for AtomRingInteraction {
    const TABLE: Table = Table {
        schema: Schema::Credo,
        name: "atom_ring_interactions",
        primary_key: &["atom_ring_interaction_id"],
        columns: Self::COLUMNS,
        partitioned: false,
    };

    type Key = i32;

    fn primary_key(&self) -> i32 {
        self.atom_ring_interaction_id
    }

    fn key_filter(&self) -> Expr {
        Self::ATOM_RING_INTERACTION_ID.eq(self.atom_ring_interaction_id)
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PiInteraction {
    pub pi_interaction_id: i32,
    pub biomolecule_id: i32,
    pub pi_bgn_id: i32,
    pub pi_bgn_is_ring: bool,
    pub pi_end_id: i32,
    pub pi_end_is_ring: bool,
    pub distance: f64,
    pub dihedral: Option<f64>,
    pub theta: Option<f64>,
    pub iota: Option<f64>,
    pub interaction_type: Option<String>,
}

impl PiInteraction {
    pub const PI_INTERACTION_ID: ColumnRef = ColumnRef::new("pi_interactions", "pi_interaction_id");
    pub const BIOMOLECULE_ID: ColumnRef = ColumnRef::new("pi_interactions", "biomolecule_id");
    pub const PI_BGN_ID: ColumnRef = ColumnRef::new("pi_interactions", "pi_bgn_id");
    pub const PI_BGN_IS_RING: ColumnRef = ColumnRef::new("pi_interactions", "pi_bgn_is_ring");
    pub const PI_END_ID: ColumnRef = ColumnRef::new("pi_interactions", "pi_end_id");
    pub const PI_END_IS_RING: ColumnRef = ColumnRef::new("pi_interactions", "pi_end_is_ring");

    const COLUMNS: &'static [Column] = &[
        Column::eager("pi_interaction_id"),
        Column::eager("biomolecule_id"),
        Column::eager("pi_bgn_id"),
        Column::eager("pi_bgn_is_ring"),
        Column::eager("pi_end_id"),
        Column::eager("pi_end_is_ring"),
        Column::float("distance"),
        Column::float("dihedral"),
        Column::float("theta"),
        Column::float("iota"),
        Column::text("interaction_type"),
    ];
}

impl Entity for PiInteraction {
    const TABLE: Table = Table {
        schema: Schema::Credo,
        name: "pi_interactions",
        primary_key: &["pi_interaction_id"],
        columns: Self::COLUMNS,
        partitioned: false,
    };

    type Key = i32;

    fn primary_key(&self) -> i32 {
        self.pi_interaction_id
    }

    fn key_filter(&self) -> Expr {
        Self::PI_INTERACTION_ID.eq(self.pi_interaction_id)
    }
}

entity_identity!(
    AromaticRing,
    PiGroup,
    RingInteraction,
    AtomRingInteraction,
    PiInteraction
);

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(id: i32, normal: Vector3d) -> AromaticRing {
        AromaticRing {
            aromatic_ring_id: id,
            biomolecule_id: 1,
            residue_id: 1,
            ring_serial: 1,
            size: 6,
            is_hetero_aromatic: false,
            centroid: Vector3d::new(0.0, 0.0, f64::from(id)),
            normal,
        }
    }

    #[test]
    fn interplanar_angle_is_folded() {
        let a = ring(1, Vector3d::new(0.0, 0.0, 1.0));
        let b = ring(2, Vector3d::new(0.0, 0.0, -1.0));
        let c = ring(3, Vector3d::new(1.0, 0.0, 0.0));
        assert!(a.interplanar_angle(&b).abs() < 1e-9);
        assert!((a.interplanar_angle(&c) - 90.0).abs() < 1e-9);
        assert!((a.centroid_distance(&c) - 2.0).abs() < 1e-12);
    }
}
