//! Sequence variations mapped onto structures and their phenotypes.

use super::{adaptor, FetchArgs, Fetched};
use crate::entity::{
    Annotation, Entity, Peptide, Phenotype, ResMap, Variation, Variation2BindingSite,
    Variation2PDB, Variation2UniProt,
};
use crate::error::Result;
use crate::sql::Direction;

adaptor!(VariationAdaptor);

impl VariationAdaptor {
    pub async fn fetch_by_variation_id(&self, variation_id: i32) -> Result<Option<Variation>> {
        self.core
            .fetch_one(Variation::query().filter(Variation::VARIATION_ID.eq(variation_id)))
            .await
    }

    /// Variations located in a ligand's binding site.
    pub async fn fetch_all_by_ligand_id(
        &self,
        ligand_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<Variation>> {
        let query = Variation::query()
            .map_select(|s| {
                s.distinct().join(
                    Variation2BindingSite::TABLE.schema,
                    Variation2BindingSite::TABLE.name,
                    Variation2BindingSite::TABLE.name,
                    Variation2BindingSite::VARIATION_ID.eq(Variation::VARIATION_ID),
                )
            })
            .filter(Variation2BindingSite::LIGAND_ID.eq(ligand_id))
            .order_by(Variation::VARIATION_ID, Direction::Asc);
        self.core.fetch_all(query, args).await
    }

    /// Variations of a peptide residue, found through its SIFTS mapping.
    pub async fn fetch_all_by_residue_id(
        &self,
        residue_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<Variation>> {
        let query = Variation::query()
            .map_select(|s| {
                s.distinct()
                    .join(
                        Variation2PDB::TABLE.schema,
                        Variation2PDB::TABLE.name,
                        Variation2PDB::TABLE.name,
                        Variation2PDB::VARIATION_ID.eq(Variation::VARIATION_ID),
                    )
                    .join(
                        Peptide::TABLE.schema,
                        Peptide::TABLE.name,
                        Peptide::TABLE.name,
                        Peptide::RES_MAP_ID.eq(Variation2PDB::RES_MAP_ID),
                    )
            })
            .filter(Peptide::RESIDUE_ID.eq(residue_id))
            .order_by(Variation::VARIATION_ID, Direction::Asc);
        self.core.fetch_all(query, args).await
    }

    /// Variations at a UniProt position.
    pub async fn fetch_all_by_uniprot(
        &self,
        uniprot: &str,
        res_num: i32,
        args: FetchArgs,
    ) -> Result<Fetched<Variation>> {
        let query = Variation::query()
            .map_select(|s| {
                s.distinct().join(
                    Variation2UniProt::TABLE.schema,
                    Variation2UniProt::TABLE.name,
                    Variation2UniProt::TABLE.name,
                    Variation2UniProt::VARIATION_ID.eq(Variation::VARIATION_ID),
                )
            })
            .filter(Variation2UniProt::UNIPROT.eq(uniprot))
            .filter(Variation2UniProt::RES_NUM.eq(res_num))
            .order_by(Variation::VARIATION_ID, Direction::Asc);
        self.core.fetch_all(query, args).await
    }

    pub async fn fetch_all_by_phenotype_id(
        &self,
        phenotype_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<Variation>> {
        let query = Variation::query()
            .map_select(|s| {
                s.join(
                    Annotation::TABLE.schema,
                    Annotation::TABLE.name,
                    Annotation::TABLE.name,
                    Annotation::VARIATION_ID.eq(Variation::VARIATION_ID),
                )
            })
            .filter(Annotation::PHENOTYPE_ID.eq(phenotype_id))
            .order_by(Variation::VARIATION_ID, Direction::Asc);
        self.core.fetch_all(query, args).await
    }

    /// The SIFTS mapping row of a peptide residue.
    pub async fn fetch_res_map_by_residue_id(&self, residue_id: i32) -> Result<Option<ResMap>> {
        let query = ResMap::query()
            .map_select(|s| {
                s.join(
                    Peptide::TABLE.schema,
                    Peptide::TABLE.name,
                    Peptide::TABLE.name,
                    Peptide::RES_MAP_ID.eq(ResMap::RES_MAP_ID),
                )
            })
            .filter(Peptide::RESIDUE_ID.eq(residue_id));
        self.core.fetch_one(query).await
    }
}

adaptor!(PhenotypeAdaptor);

impl PhenotypeAdaptor {
    pub async fn fetch_by_phenotype_id(&self, phenotype_id: i32) -> Result<Option<Phenotype>> {
        self.core
            .fetch_one(Phenotype::query().filter(Phenotype::PHENOTYPE_ID.eq(phenotype_id)))
            .await
    }

    pub async fn fetch_all_by_variation_id(
        &self,
        variation_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<Phenotype>> {
        let query = Phenotype::query()
            .map_select(|s| {
                s.join(
                    Annotation::TABLE.schema,
                    Annotation::TABLE.name,
                    Annotation::TABLE.name,
                    Annotation::PHENOTYPE_ID.eq(Phenotype::PHENOTYPE_ID),
                )
            })
            .filter(Annotation::VARIATION_ID.eq(variation_id))
            .order_by(Phenotype::PHENOTYPE_ID, Direction::Asc);
        self.core.fetch_all(query, args).await
    }

    /// Case-insensitive substring search over phenotype descriptions.
    pub async fn fetch_all_by_description(
        &self,
        text: &str,
        args: FetchArgs,
    ) -> Result<Fetched<Phenotype>> {
        let query = Phenotype::query()
            .filter(Phenotype::DESCRIPTION.ilike(format!("%{}%", text.trim())))
            .order_by(Phenotype::PHENOTYPE_ID, Direction::Asc);
        self.core.fetch_all(query, args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adaptor::testing::*;
    use crate::db::testing::lazy_credo;

    #[tokio::test]
    async fn residue_variations_go_through_the_sifts_mapping() {
        let adaptor = VariationAdaptor::with_options(lazy_credo(), dynamic());
        let sql = rendered(
            adaptor
                .fetch_all_by_residue_id(77, FetchArgs::default())
                .await
                .expect("query"),
        );
        assert!(sql.starts_with("SELECT DISTINCT variations.variation_id"));
        assert!(sql.contains(
            "JOIN variations.variation_to_pdb AS variation_to_pdb ON variation_to_pdb.variation_id = variations.variation_id"
        ));
        assert!(sql.contains(
            "JOIN credo.peptides AS peptides ON peptides.res_map_id = variation_to_pdb.res_map_id"
        ));
        assert!(sql.contains("WHERE peptides.residue_id = $1"));
    }

    #[tokio::test]
    async fn phenotypes_match_descriptions_case_insensitively() {
        let adaptor = PhenotypeAdaptor::with_options(lazy_credo(), dynamic());
        let sql = rendered(
            adaptor
                .fetch_all_by_description("leukemia", FetchArgs::default())
                .await
                .expect("query"),
        );
        assert!(sql.contains("WHERE phenotypes.description ILIKE $1"));
    }
}
