use super::{adaptor, FetchArgs, Fetched};
use crate::config::Schema;
use crate::entity::association::{
    AROMATIC_RING_ATOMS, PI_GROUP_ATOMS, PI_ATOM_ATOM_ID, PI_ATOM_PI_ID, RING_ATOM_ATOM_ID,
    RING_ATOM_RING_ID,
};
use crate::entity::{Atom, Entity, LigandComponent, LigandFragmentAtom};
use crate::error::Result;
use crate::query::Query;
use crate::sql::Direction;

adaptor!(
    /// Atoms. Every query pins `biomolecule_id` so that only one partition
    /// is scanned.
    AtomAdaptor
);

impl AtomAdaptor {
    /// Atoms of one biomolecule, in atom order.
    fn partition(biomolecule_id: i32) -> Query<Atom> {
        Atom::query()
            .filter(Atom::BIOMOLECULE_ID.eq(biomolecule_id))
            .order_by(Atom::ATOM_ID, Direction::Asc)
    }

    /// The ligand's atoms joined through its components.
    fn ligand_atoms(ligand_id: i32, biomolecule_id: i32) -> Query<Atom> {
        Self::partition(biomolecule_id)
            .map_select(|s| {
                s.join(
                    Schema::Credo,
                    LigandComponent::TABLE.name,
                    LigandComponent::TABLE.name,
                    LigandComponent::RESIDUE_ID.eq(Atom::RESIDUE_ID),
                )
            })
            .filter(LigandComponent::LIGAND_ID.eq(ligand_id))
    }

    pub async fn fetch_by_atom_id(&self, atom_id: i32, biomolecule_id: i32) -> Result<Option<Atom>> {
        let query = Atom::query()
            .filter(Atom::ATOM_ID.eq(atom_id))
            .filter(Atom::BIOMOLECULE_ID.eq(biomolecule_id));
        self.core.fetch_one(query).await
    }

    pub async fn fetch_all_by_residue_id(
        &self,
        residue_id: i32,
        biomolecule_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<Atom>> {
        let query = Self::partition(biomolecule_id).filter(Atom::RESIDUE_ID.eq(residue_id));
        self.core.fetch_all(query, args).await
    }

    pub async fn fetch_all_by_ligand_id(
        &self,
        ligand_id: i32,
        biomolecule_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<Atom>> {
        let query = Self::ligand_atoms(ligand_id, biomolecule_id);
        self.core.fetch_all(query, args).await
    }

    pub async fn fetch_all_by_ligand_id_and_atom_names(
        &self,
        ligand_id: i32,
        biomolecule_id: i32,
        atom_names: &[String],
        args: FetchArgs,
    ) -> Result<Fetched<Atom>> {
        let query = Self::ligand_atoms(ligand_id, biomolecule_id)
            .filter(Atom::ATOM_NAME.any(atom_names.to_vec()));
        self.core.fetch_all(query, args).await
    }

    pub async fn fetch_all_by_ligand_fragment_id(
        &self,
        ligand_fragment_id: i32,
        biomolecule_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<Atom>> {
        let query = Self::partition(biomolecule_id)
            .map_select(|s| {
                s.join(
                    Schema::Credo,
                    LigandFragmentAtom::TABLE.name,
                    LigandFragmentAtom::TABLE.name,
                    LigandFragmentAtom::ATOM_ID.eq(Atom::ATOM_ID),
                )
            })
            .filter(LigandFragmentAtom::LIGAND_FRAGMENT_ID.eq(ligand_fragment_id));
        self.core.fetch_all(query, args).await
    }

    pub async fn fetch_all_by_aromatic_ring_id(
        &self,
        aromatic_ring_id: i32,
        biomolecule_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<Atom>> {
        let (schema, table) = AROMATIC_RING_ATOMS;
        let query = Self::partition(biomolecule_id)
            .map_select(|s| s.join(schema, table, table, RING_ATOM_ATOM_ID.eq(Atom::ATOM_ID)))
            .filter(RING_ATOM_RING_ID.eq(aromatic_ring_id));
        self.core.fetch_all(query, args).await
    }

    pub async fn fetch_all_by_pi_id(
        &self,
        pi_id: i32,
        biomolecule_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<Atom>> {
        let (schema, table) = PI_GROUP_ATOMS;
        let query = Self::partition(biomolecule_id)
            .map_select(|s| s.join(schema, table, table, PI_ATOM_ATOM_ID.eq(Atom::ATOM_ID)))
            .filter(PI_ATOM_PI_ID.eq(pi_id));
        self.core.fetch_all(query, args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adaptor::testing::*;
    use crate::db::testing::lazy_credo;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn residue_atoms_are_pinned_to_the_partition() {
        let adaptor = AtomAdaptor::with_options(lazy_credo(), dynamic());
        let sql = rendered(
            adaptor
                .fetch_all_by_residue_id(5, 7, FetchArgs::from(Atom::ELEMENT.eq("C")))
                .await
                .expect("query"),
        );
        assert!(sql.starts_with("SELECT atoms.atom_id, atoms.biomolecule_id"));
        assert!(sql.contains(
            "WHERE (atoms.biomolecule_id = $1) AND (atoms.residue_id = $2) AND (atoms.element = $3)"
        ));
        assert!(sql.ends_with("ORDER BY atoms.atom_id ASC"));
        assert_partition_pinned(&sql);
    }

    #[tokio::test]
    async fn ligand_atoms_join_components() {
        let adaptor = AtomAdaptor::with_options(lazy_credo(), dynamic());
        let names = vec!["N1".to_string()];
        let sql = rendered(
            adaptor
                .fetch_all_by_ligand_id_and_atom_names(3, 7, &names, FetchArgs::default())
                .await
                .expect("query"),
        );
        assert!(sql.contains(
            "JOIN credo.ligand_components AS ligand_components ON ligand_components.residue_id = atoms.residue_id"
        ));
        assert!(sql.contains("(ligand_components.ligand_id = $2) AND (atoms.atom_name = ANY($3))"));
        assert_partition_pinned(&sql);
    }

    #[tokio::test]
    async fn ring_atoms_use_the_association_table() {
        let adaptor = AtomAdaptor::with_options(lazy_credo(), dynamic());
        let fetched = adaptor
            .fetch_all_by_aromatic_ring_id(4, 7, FetchArgs::default().limit(6))
            .await
            .expect("query");
        let sql = rendered(fetched);
        assert!(sql.contains("JOIN credo.aromatic_ring_atoms AS aromatic_ring_atoms"));
        assert_eq!(sql.matches("$").count(), 2);
        assert!(sql.ends_with("LIMIT 6"));
    }
}
