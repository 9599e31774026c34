use super::{adaptor, FetchArgs, Fetched};
use crate::config::Schema;
use crate::entity::{
    BindingSiteDomain, BindingSiteFuzcav, BindingSiteResidue, Domain, DomainPeptide, Entity,
};
use crate::error::Result;
use crate::sql::Direction;

adaptor!(
    /// Structural and sequence domains mapped onto chains.
    DomainAdaptor
);

impl DomainAdaptor {
    pub async fn fetch_by_domain_id(&self, domain_id: i32) -> Result<Option<Domain>> {
        self.core
            .fetch_one(Domain::query().filter(Domain::DOMAIN_ID.eq(domain_id)))
            .await
    }

    /// A domain by its accession in the source database, e.g. `("Pfam",
    /// "PF07714")`.
    pub async fn fetch_by_db_accession_id(
        &self,
        db_source: &str,
        db_accession_id: &str,
    ) -> Result<Option<Domain>> {
        let query = Domain::query()
            .filter(Domain::DB_SOURCE.eq(db_source))
            .filter(Domain::DB_ACCESSION_ID.eq(db_accession_id));
        self.core.fetch_one(query).await
    }

    /// Domains overlapping a ligand's binding site.
    pub async fn fetch_all_by_ligand_id(
        &self,
        ligand_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<Domain>> {
        let query = Domain::query()
            .map_select(|s| {
                s.join(
                    Schema::Credo,
                    BindingSiteDomain::TABLE.name,
                    BindingSiteDomain::TABLE.name,
                    BindingSiteDomain::DOMAIN_ID.eq(Domain::DOMAIN_ID),
                )
            })
            .filter(BindingSiteDomain::LIGAND_ID.eq(ligand_id))
            .order_by(Domain::DOMAIN_ID, Direction::Asc);
        self.core.fetch_all(query, args).await
    }

    /// Domains containing a peptide residue.
    pub async fn fetch_all_by_residue_id(
        &self,
        residue_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<Domain>> {
        let query = Domain::query()
            .map_select(|s| {
                s.distinct().join(
                    Schema::Credo,
                    DomainPeptide::TABLE.name,
                    DomainPeptide::TABLE.name,
                    DomainPeptide::DOMAIN_ID.eq(Domain::DOMAIN_ID),
                )
            })
            .filter(DomainPeptide::RESIDUE_ID.eq(residue_id))
            .order_by(Domain::DOMAIN_ID, Direction::Asc);
        self.core.fetch_all(query, args).await
    }
}

adaptor!(
    /// Precomputed binding-site annotations of ligands.
    BindingSiteAdaptor
);

impl BindingSiteAdaptor {
    pub async fn fetch_all_residues_by_ligand_id(
        &self,
        ligand_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<BindingSiteResidue>> {
        let query = BindingSiteResidue::query()
            .filter(BindingSiteResidue::LIGAND_ID.eq(ligand_id))
            .order_by(BindingSiteResidue::RESIDUE_ID, Direction::Asc);
        self.core.fetch_all(query, args).await
    }

    pub async fn fetch_all_domains_by_ligand_id(
        &self,
        ligand_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<BindingSiteDomain>> {
        let query = BindingSiteDomain::query()
            .filter(BindingSiteDomain::LIGAND_ID.eq(ligand_id))
            .order_by(BindingSiteDomain::DOMAIN_ID, Direction::Asc);
        self.core.fetch_all(query, args).await
    }

    pub async fn fetch_fuzcav_by_ligand_id(&self, ligand_id: i32) -> Result<Option<BindingSiteFuzcav>> {
        let query = BindingSiteFuzcav::query().filter(BindingSiteFuzcav::LIGAND_ID.eq(ligand_id));
        self.core.fetch_one(query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adaptor::testing::*;
    use crate::db::testing::lazy_credo;

    #[tokio::test]
    async fn domains_of_a_binding_site() {
        let adaptor = DomainAdaptor::with_options(lazy_credo(), dynamic());
        let sql = rendered(
            adaptor
                .fetch_all_by_ligand_id(5, FetchArgs::from(Domain::DB_SOURCE.eq("Pfam")))
                .await
                .expect("query"),
        );
        assert!(sql.contains(
            "JOIN credo.binding_site_domains AS binding_site_domains ON binding_site_domains.domain_id = domains.domain_id"
        ));
        assert!(sql.contains("WHERE (binding_site_domains.ligand_id = $1) AND (domains.db_source = $2)"));
    }

    #[tokio::test]
    async fn binding_site_residues_are_ordered() {
        let adaptor = BindingSiteAdaptor::with_options(lazy_credo(), dynamic());
        let sql = rendered(
            adaptor
                .fetch_all_residues_by_ligand_id(5, FetchArgs::from(BindingSiteResidue::IS_BINDING.is_true()))
                .await
                .expect("query"),
        );
        assert!(sql.ends_with(
            "WHERE (binding_site_residues.ligand_id = $1) AND (binding_site_residues.is_binding = $2) ORDER BY binding_site_residues.residue_id ASC"
        ));
    }
}
