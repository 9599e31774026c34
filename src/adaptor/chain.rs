use super::{adaptor, path_ops, FetchArgs, Fetched};
use crate::config::Schema;
use crate::entity::{Chain, Entity, ProtFragment, XRef};
use crate::error::Result;
use crate::sql::Direction;

adaptor!(ChainAdaptor);
path_ops!(ChainAdaptor, Chain);

impl ChainAdaptor {
    pub async fn fetch_by_chain_id(&self, chain_id: i32) -> Result<Option<Chain>> {
        self.core
            .fetch_one(Chain::query().filter(Chain::CHAIN_ID.eq(chain_id)))
            .await
    }

    pub async fn fetch_all_by_biomolecule_id(
        &self,
        biomolecule_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<Chain>> {
        let query = Chain::query()
            .filter(Chain::BIOMOLECULE_ID.eq(biomolecule_id))
            .order_by(Chain::PDB_CHAIN_ID, Direction::Asc);
        self.core.fetch_all(query, args).await
    }

    /// Chains with an identical sequence, matched on the sequence digest.
    pub async fn fetch_all_by_seq_md5(&self, seq_md5: &str, args: FetchArgs) -> Result<Fetched<Chain>> {
        let query = Chain::query()
            .filter(Chain::SEQ_MD5.eq(seq_md5.to_ascii_lowercase()))
            .order_by(Chain::CHAIN_ID, Direction::Asc);
        self.core.fetch_all(query, args).await
    }

    /// Chains mapped to a UniProt accession through the cross references.
    pub async fn fetch_all_by_uniprot(&self, uniprot: &str, args: FetchArgs) -> Result<Fetched<Chain>> {
        let query = Chain::query()
            .map_select(|s| {
                s.distinct().join(
                    Schema::Credo,
                    XRef::TABLE.name,
                    XRef::TABLE.name,
                    XRef::ENTITY_ID.eq(Chain::CHAIN_ID),
                )
            })
            .filter(XRef::ENTITY_TYPE.eq("Chain"))
            .filter(XRef::SOURCE.eq("UniProt"))
            .filter(XRef::XREF.eq(uniprot))
            .order_by(Chain::CHAIN_ID, Direction::Asc);
        self.core.fetch_all(query, args).await
    }
}

adaptor!(ProtFragmentAdaptor);
path_ops!(ProtFragmentAdaptor, ProtFragment);

impl ProtFragmentAdaptor {
    pub async fn fetch_by_prot_fragment_id(&self, prot_fragment_id: i32) -> Result<Option<ProtFragment>> {
        let query =
            ProtFragment::query().filter(ProtFragment::PROT_FRAGMENT_ID.eq(prot_fragment_id));
        self.core.fetch_one(query).await
    }

    /// Fragments of a chain from N- to C-terminus.
    pub async fn fetch_all_by_chain_id(
        &self,
        chain_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<ProtFragment>> {
        let query = ProtFragment::query()
            .filter(ProtFragment::CHAIN_ID.eq(chain_id))
            .order_by(ProtFragment::SSTRUCT_SERIAL, Direction::Asc);
        self.core.fetch_all(query, args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adaptor::testing::*;
    use crate::adaptor::{AdaptorOptions, Fetched};
    use crate::db::testing::lazy_credo;

    #[tokio::test]
    async fn uniprot_lookup_goes_through_xrefs() {
        let adaptor = ChainAdaptor::with_options(lazy_credo(), dynamic());
        let sql = rendered(
            adaptor
                .fetch_all_by_uniprot("P00519", FetchArgs::default())
                .await
                .expect("query"),
        );
        assert!(sql.starts_with("SELECT DISTINCT chains.chain_id"));
        assert!(sql.contains("JOIN credo.xrefs AS xrefs ON xrefs.entity_id = chains.chain_id"));
        assert!(sql.contains("(xrefs.entity_type = $1) AND (xrefs.source = $2) AND (xrefs.xref = $3)"));
    }

    #[tokio::test]
    async fn dynamic_limit_is_applied_to_the_handle() {
        let adaptor = ChainAdaptor::with_options(lazy_credo(), AdaptorOptions::dynamic());
        let fetched = adaptor
            .fetch_all_by_biomolecule_id(1, FetchArgs::default().limit(2))
            .await
            .expect("query");
        assert!(matches!(fetched, Fetched::Query(_)));
        let sql = rendered(fetched);
        assert!(sql.ends_with("ORDER BY chains.pdb_chain_id ASC LIMIT 2"));
    }

    #[tokio::test]
    async fn fragments_follow_sequence_order() {
        let adaptor = ProtFragmentAdaptor::with_options(lazy_credo(), dynamic());
        let sql = rendered(
            adaptor
                .fetch_all_by_chain_id(4, FetchArgs::default())
                .await
                .expect("query"),
        );
        assert!(sql.ends_with("WHERE prot_fragments.chain_id = $1 ORDER BY prot_fragments.sstruct_serial ASC"));
    }
}
