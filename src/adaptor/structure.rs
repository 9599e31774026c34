use super::{adaptor, path_ops, FetchArgs, Fetched};
use crate::config::Schema;
use crate::entity::{Biomolecule, Entity, Ligand, LigandComponent, Structure};
use crate::error::Result;
use crate::query::Query;
use crate::sql::{Direction, Select};

adaptor!(StructureAdaptor);

/// PDB codes are stored upper case.
fn normalize_pdb(pdb: &str) -> String {
    pdb.trim().to_ascii_uppercase()
}

impl StructureAdaptor {
    pub async fn fetch_by_structure_id(&self, structure_id: i32) -> Result<Option<Structure>> {
        self.core
            .fetch_one(Structure::query().filter(Structure::STRUCTURE_ID.eq(structure_id)))
            .await
    }

    pub async fn fetch_by_pdb(&self, pdb: &str) -> Result<Option<Structure>> {
        self.core
            .fetch_one(Structure::query().filter(Structure::PDB.eq(normalize_pdb(pdb))))
            .await
    }

    pub async fn fetch_all_by_pdbs(
        &self,
        pdbs: &[&str],
        args: FetchArgs,
    ) -> Result<Fetched<Structure>> {
        let pdbs: Vec<String> = pdbs.iter().map(|pdb| normalize_pdb(pdb)).collect();
        let query = Structure::query()
            .filter(Structure::PDB.any(pdbs))
            .order_by(Structure::PDB, Direction::Asc);
        self.core.fetch_all(query, args).await
    }

    /// Structures with at least one ligand containing the chemical component.
    pub async fn fetch_all_by_het_id(
        &self,
        het_id: &str,
        args: FetchArgs,
    ) -> Result<Fetched<Structure>> {
        let select = Structure::TABLE
            .select()
            .distinct()
            .join(
                Schema::Credo,
                Biomolecule::TABLE.name,
                Biomolecule::TABLE.name,
                Biomolecule::STRUCTURE_ID.eq(Structure::STRUCTURE_ID),
            )
            .join(
                Schema::Credo,
                Ligand::TABLE.name,
                Ligand::TABLE.name,
                Ligand::BIOMOLECULE_ID.eq(Biomolecule::BIOMOLECULE_ID),
            )
            .join(
                Schema::Credo,
                LigandComponent::TABLE.name,
                LigandComponent::TABLE.name,
                LigandComponent::LIGAND_ID.eq(Ligand::LIGAND_ID),
            );
        let query = Query::<Structure>::new(select)
            .filter(LigandComponent::HET_ID.eq(het_id.trim().to_ascii_uppercase()))
            .order_by(Structure::STRUCTURE_ID, Direction::Asc);
        self.core.fetch_all(query, args).await
    }
}

adaptor!(BiomoleculeAdaptor);
path_ops!(BiomoleculeAdaptor, Biomolecule);

impl BiomoleculeAdaptor {
    pub async fn fetch_by_biomolecule_id(&self, biomolecule_id: i32) -> Result<Option<Biomolecule>> {
        let query = Biomolecule::query().filter(Biomolecule::BIOMOLECULE_ID.eq(biomolecule_id));
        self.core.fetch_one(query).await
    }

    pub async fn fetch_all_by_structure_id(
        &self,
        structure_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<Biomolecule>> {
        let query = Biomolecule::query()
            .filter(Biomolecule::STRUCTURE_ID.eq(structure_id))
            .order_by(Biomolecule::ASSEMBLY_SERIAL, Direction::Asc);
        self.core.fetch_all(query, args).await
    }

    pub async fn fetch_all_by_pdb(&self, pdb: &str, args: FetchArgs) -> Result<Fetched<Biomolecule>> {
        let query = Query::<Biomolecule>::new(structure_biomolecules())
            .filter(Structure::PDB.eq(normalize_pdb(pdb)))
            .order_by(Biomolecule::ASSEMBLY_SERIAL, Direction::Asc);
        self.core.fetch_all(query, args).await
    }
}

fn structure_biomolecules() -> Select {
    Biomolecule::TABLE.select().join(
        Schema::Credo,
        Structure::TABLE.name,
        Structure::TABLE.name,
        Structure::STRUCTURE_ID.eq(Biomolecule::STRUCTURE_ID),
    )
}
