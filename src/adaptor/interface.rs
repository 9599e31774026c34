use super::{adaptor, path_ops, FetchArgs, Fetched};
use crate::config::Schema;
use crate::entity::{Biomolecule, Entity, Groove, Interface};
use crate::error::Result;
use crate::sql::{Direction, Expr};

adaptor!(
    /// Protein-protein interfaces.
    InterfaceAdaptor
);
path_ops!(InterfaceAdaptor, Interface);

impl InterfaceAdaptor {
    pub async fn fetch_by_interface_id(&self, interface_id: i32) -> Result<Option<Interface>> {
        self.core
            .fetch_one(Interface::query().filter(Interface::INTERFACE_ID.eq(interface_id)))
            .await
    }

    /// Interfaces the chain takes part in, on either side.
    pub async fn fetch_all_by_chain_id(
        &self,
        chain_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<Interface>> {
        let query = Interface::query()
            .filter(Expr::or([
                Interface::CHAIN_BGN_ID.eq(chain_id),
                Interface::CHAIN_END_ID.eq(chain_id),
            ]))
            .order_by(Interface::INTERFACE_ID, Direction::Asc);
        self.core.fetch_all(query, args).await
    }

    pub async fn fetch_all_by_biomolecule_id(
        &self,
        biomolecule_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<Interface>> {
        let query = Interface::query()
            .filter(Interface::BIOMOLECULE_ID.eq(biomolecule_id))
            .order_by(Interface::INTERFACE_ID, Direction::Asc);
        self.core.fetch_all(query, args).await
    }

    pub async fn fetch_all_by_structure_id(
        &self,
        structure_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<Interface>> {
        let query = Interface::query()
            .map_select(|s| {
                s.join(
                    Schema::Credo,
                    Biomolecule::TABLE.name,
                    Biomolecule::TABLE.name,
                    Biomolecule::BIOMOLECULE_ID.eq(Interface::BIOMOLECULE_ID),
                )
            })
            .filter(Biomolecule::STRUCTURE_ID.eq(structure_id))
            .order_by(Interface::INTERFACE_ID, Direction::Asc);
        self.core.fetch_all(query, args).await
    }
}

adaptor!(
    /// Protein-nucleic acid interactions.
    GrooveAdaptor
);
path_ops!(GrooveAdaptor, Groove);

impl GrooveAdaptor {
    pub async fn fetch_by_groove_id(&self, groove_id: i32) -> Result<Option<Groove>> {
        self.core
            .fetch_one(Groove::query().filter(Groove::GROOVE_ID.eq(groove_id)))
            .await
    }

    pub async fn fetch_all_by_biomolecule_id(
        &self,
        biomolecule_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<Groove>> {
        let query = Groove::query()
            .filter(Groove::BIOMOLECULE_ID.eq(biomolecule_id))
            .order_by(Groove::GROOVE_ID, Direction::Asc);
        self.core.fetch_all(query, args).await
    }

    /// Grooves involving the chain as either the protein or the nucleic acid.
    pub async fn fetch_all_by_chain_id(
        &self,
        chain_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<Groove>> {
        let query = Groove::query()
            .filter(Expr::or([
                Groove::CHAIN_PROT_ID.eq(chain_id),
                Groove::CHAIN_NUC_ID.eq(chain_id),
            ]))
            .order_by(Groove::GROOVE_ID, Direction::Asc);
        self.core.fetch_all(query, args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adaptor::testing::*;
    use crate::adaptor::{AdaptorOptions, PathOps};
    use crate::db::testing::lazy_credo;

    #[tokio::test]
    async fn interfaces_of_a_chain_check_both_sides() {
        let adaptor = InterfaceAdaptor::with_options(lazy_credo(), dynamic());
        let sql = rendered(
            adaptor
                .fetch_all_by_chain_id(3, FetchArgs::from(Interface::IS_HOMO_DIMER.is_true()))
                .await
                .expect("query"),
        );
        assert!(sql.contains(
            "WHERE ((interfaces.chain_bgn_id = $1) OR (interfaces.chain_end_id = $2)) AND (interfaces.is_homo_dimer = $3)"
        ));
    }

    #[tokio::test]
    async fn grooves_support_path_descendants() {
        let adaptor = GrooveAdaptor::with_options(lazy_credo(), AdaptorOptions::dynamic());
        let sql = rendered(
            adaptor
                .fetch_all_path_descendants("1AAY/1", FetchArgs::default())
                .await
                .expect("query")
                .expect("ptree available"),
        );
        assert!(sql.contains("grooves.path <@ CAST($1 AS ptree)"));
    }
}
