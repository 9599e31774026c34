//! Aromatic rings, pi groups and the interactions between them.

use super::{adaptor, union_query, FetchArgs, Fetched};
use crate::entity::{AromaticRing, AtomRingInteraction, Entity, PiGroup, PiInteraction, RingInteraction};
use crate::error::Result;
use crate::query::Query;
use crate::sql::{ColumnRef, Direction, Expr, Select};

/// Rows of `T` matching `bgn` or `end`, one select per side with the caller's
/// filters applied to each. A ring never interacts with itself, so the sides
/// are disjoint.
fn either_side<T: Entity>(bgn: Expr, end: Expr, filters: &[Expr], order: ColumnRef) -> Query<T> {
    let selects: Vec<Select> = [bgn, end]
        .into_iter()
        .map(|side| T::TABLE.select().filter(side).filters(filters.to_vec()))
        .collect();
    union_query::<T>(&selects, false, T::TABLE.name).order_by(order, Direction::Asc)
}

adaptor!(AromaticRingAdaptor);

impl AromaticRingAdaptor {
    pub async fn fetch_by_aromatic_ring_id(&self, aromatic_ring_id: i32) -> Result<Option<AromaticRing>> {
        let query =
            AromaticRing::query().filter(AromaticRing::AROMATIC_RING_ID.eq(aromatic_ring_id));
        self.core.fetch_one(query).await
    }

    pub async fn fetch_all_by_residue_id(
        &self,
        residue_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<AromaticRing>> {
        let query = AromaticRing::query()
            .filter(AromaticRing::RESIDUE_ID.eq(residue_id))
            .order_by(AromaticRing::AROMATIC_RING_ID, Direction::Asc);
        self.core.fetch_all(query, args).await
    }

    pub async fn fetch_all_by_biomolecule_id(
        &self,
        biomolecule_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<AromaticRing>> {
        let query = AromaticRing::query()
            .filter(AromaticRing::BIOMOLECULE_ID.eq(biomolecule_id))
            .order_by(AromaticRing::AROMATIC_RING_ID, Direction::Asc);
        self.core.fetch_all(query, args).await
    }
}

adaptor!(PiGroupAdaptor);

impl PiGroupAdaptor {
    pub async fn fetch_by_pi_id(&self, pi_id: i32) -> Result<Option<PiGroup>> {
        self.core
            .fetch_one(PiGroup::query().filter(PiGroup::PI_ID.eq(pi_id)))
            .await
    }

    pub async fn fetch_all_by_biomolecule_id(
        &self,
        biomolecule_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<PiGroup>> {
        let query = PiGroup::query()
            .filter(PiGroup::BIOMOLECULE_ID.eq(biomolecule_id))
            .order_by(PiGroup::PI_ID, Direction::Asc);
        self.core.fetch_all(query, args).await
    }
}

adaptor!(
    /// Ring-ring stacking interactions, traversed in both directions.
    RingInteractionAdaptor
);

impl RingInteractionAdaptor {
    pub async fn fetch_all_by_aromatic_ring_id(
        &self,
        aromatic_ring_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<RingInteraction>> {
        let (filters, shape) = args.split();
        let query = either_side::<RingInteraction>(
            RingInteraction::AROMATIC_RING_BGN_ID.eq(aromatic_ring_id),
            RingInteraction::AROMATIC_RING_END_ID.eq(aromatic_ring_id),
            &filters,
            RingInteraction::RING_INTERACTION_ID,
        );
        self.core.finalize(query, shape).await
    }

    pub async fn fetch_all_by_biomolecule_id(
        &self,
        biomolecule_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<RingInteraction>> {
        let query = RingInteraction::query()
            .filter(RingInteraction::BIOMOLECULE_ID.eq(biomolecule_id))
            .order_by(RingInteraction::RING_INTERACTION_ID, Direction::Asc);
        self.core.fetch_all(query, args).await
    }
}

adaptor!(AtomRingInteractionAdaptor);

impl AtomRingInteractionAdaptor {
    pub async fn fetch_all_by_aromatic_ring_id(
        &self,
        aromatic_ring_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<AtomRingInteraction>> {
        let query = AtomRingInteraction::query()
            .filter(AtomRingInteraction::AROMATIC_RING_ID.eq(aromatic_ring_id))
            .order_by(AtomRingInteraction::ATOM_RING_INTERACTION_ID, Direction::Asc);
        self.core.fetch_all(query, args).await
    }

    pub async fn fetch_all_by_atom_id(
        &self,
        atom_id: i32,
        biomolecule_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<AtomRingInteraction>> {
        let query = AtomRingInteraction::query()
            .filter(AtomRingInteraction::BIOMOLECULE_ID.eq(biomolecule_id))
            .filter(AtomRingInteraction::ATOM_ID.eq(atom_id))
            .order_by(AtomRingInteraction::ATOM_RING_INTERACTION_ID, Direction::Asc);
        self.core.fetch_all(query, args).await
    }
}

adaptor!(
    /// Interactions between pi systems, either of which may be an aromatic
    /// ring or a pi group.
    PiInteractionAdaptor
);

impl PiInteractionAdaptor {
    async fn fetch_all_by_pi_system(
        &self,
        id: i32,
        is_ring: bool,
        args: FetchArgs,
    ) -> Result<Fetched<PiInteraction>> {
        let (filters, shape) = args.split();
        let query = either_side::<PiInteraction>(
            Expr::and([
                PiInteraction::PI_BGN_ID.eq(id),
                PiInteraction::PI_BGN_IS_RING.eq(is_ring),
            ]),
            Expr::and([
                PiInteraction::PI_END_ID.eq(id),
                PiInteraction::PI_END_IS_RING.eq(is_ring),
            ]),
            &filters,
            PiInteraction::PI_INTERACTION_ID,
        );
        self.core.finalize(query, shape).await
    }

    pub async fn fetch_all_by_pi_id(
        &self,
        pi_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<PiInteraction>> {
        self.fetch_all_by_pi_system(pi_id, false, args).await
    }

    pub async fn fetch_all_by_aromatic_ring_id(
        &self,
        aromatic_ring_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<PiInteraction>> {
        self.fetch_all_by_pi_system(aromatic_ring_id, true, args).await
    }

    pub async fn fetch_all_by_biomolecule_id(
        &self,
        biomolecule_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<PiInteraction>> {
        let query = PiInteraction::query()
            .filter(PiInteraction::BIOMOLECULE_ID.eq(biomolecule_id))
            .order_by(PiInteraction::PI_INTERACTION_ID, Direction::Asc);
        self.core.fetch_all(query, args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adaptor::testing::*;
    use crate::db::testing::lazy_credo;

    #[tokio::test]
    async fn ring_interactions_are_symmetric() {
        let adaptor = RingInteractionAdaptor::with_options(lazy_credo(), dynamic());
        let sql = rendered(
            adaptor
                .fetch_all_by_aromatic_ring_id(
                    12,
                    FetchArgs::from(RingInteraction::INTERACTION_TYPE.eq("FF")),
                )
                .await
                .expect("query"),
        );
        assert!(sql.contains(
            "WHERE (ring_interactions.aromatic_ring_bgn_id = $1) AND (ring_interactions.interaction_type = $2)"
        ));
        assert!(sql.contains(
            "WHERE (ring_interactions.aromatic_ring_end_id = $3) AND (ring_interactions.interaction_type = $4)"
        ));
        assert!(sql.contains(") UNION ALL ("));
        assert!(sql.ends_with(") AS ring_interactions ORDER BY ring_interactions.ring_interaction_id ASC"));
    }

    #[tokio::test]
    async fn pi_interactions_distinguish_rings_from_pi_groups() {
        let adaptor = PiInteractionAdaptor::with_options(lazy_credo(), dynamic());
        let sql = rendered(
            adaptor
                .fetch_all_by_pi_id(3, FetchArgs::default())
                .await
                .expect("query"),
        );
        assert!(sql.contains("(pi_interactions.pi_bgn_id = $1) AND (pi_interactions.pi_bgn_is_ring = $2)"));
        assert!(sql.contains("(pi_interactions.pi_end_id = $3) AND (pi_interactions.pi_end_is_ring = $4)"));
    }

    #[tokio::test]
    async fn rings_of_a_residue() {
        let adaptor = AromaticRingAdaptor::with_options(lazy_credo(), dynamic());
        let sql = rendered(
            adaptor
                .fetch_all_by_residue_id(8, FetchArgs::default())
                .await
                .expect("query"),
        );
        assert!(sql.contains("aromatic_rings.centroid::text AS centroid"));
        assert!(sql.ends_with("WHERE aromatic_rings.residue_id = $1 ORDER BY aromatic_rings.aromatic_ring_id ASC"));
    }
}
