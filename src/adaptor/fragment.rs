//! Fragments and the hierarchy produced by recursive fragmentation.
//!
//! The hierarchy is a DAG keyed per source compound: the same child can hang
//! below several parents, once for every HET-ID whose fragmentation produced
//! the edge.

use super::similarity::{fingerprint_query, rdkit_available, FingerprintSearch};
use super::{adaptor, FetchArgs, Fetched};
use crate::chem::StructureMatch;
use crate::config::Schema;
use crate::entity::{
    ChemCompFragment, Entity, Fragment, FragmentHierarchy, FragmentRDFP, FragmentRDMol,
    LigandFragment,
};
use crate::error::Result;
use crate::query::{Query, Scored};
use crate::sql::{self, ColumnRef, Direction, Expr, Select, Sql};

const CANONICAL_HET_ID: ColumnRef = ColumnRef::new("canonical", "het_id");
const CANONICAL_ORDER_CHILD: ColumnRef = ColumnRef::new("canonical", "order_child");
const DESCENDANT_ID: ColumnRef = ColumnRef::new("descendants", "child_id");

fn hierarchy() -> Select {
    Select::from_table(
        Schema::PdbChem,
        FragmentHierarchy::TABLE.name,
        FragmentHierarchy::TABLE.name,
    )
}

/// Every fragment reachable below `fragment_id`, as a recursive CTE named
/// `descendants` joined to `fragments`. `UNION` stops the walk at revisited
/// nodes.
fn descendants(fragment_id: i32) -> Query<Fragment> {
    let base = hierarchy()
        .column(FragmentHierarchy::CHILD_ID.to_sql())
        .filter(FragmentHierarchy::PARENT_ID.eq(fragment_id));
    let step = Select::from_named("descendants", "descendants")
        .column(FragmentHierarchy::CHILD_ID.to_sql())
        .join(
            Schema::PdbChem,
            FragmentHierarchy::TABLE.name,
            FragmentHierarchy::TABLE.name,
            FragmentHierarchy::PARENT_ID.eq(DESCENDANT_ID),
        );

    let select = Fragment::TABLE
        .select()
        .with_recursive("descendants", sql::union(&[base, step], true))
        .join_named("descendants", "descendants", DESCENDANT_ID.eq(Fragment::FRAGMENT_ID));
    Query::new(select).order_by(Fragment::FRAGMENT_ID, Direction::Asc)
}

adaptor!(FragmentAdaptor);

impl FragmentAdaptor {
    pub async fn fetch_by_fragment_id(&self, fragment_id: i32) -> Result<Option<Fragment>> {
        self.core
            .fetch_one(Fragment::query().filter(Fragment::FRAGMENT_ID.eq(fragment_id)))
            .await
    }

    /// Fragments of a chemical component.
    pub async fn fetch_all_by_het_id(&self, het_id: &str, args: FetchArgs) -> Result<Fetched<Fragment>> {
        let query = Fragment::query()
            .map_select(|s| {
                s.join(
                    Schema::PdbChem,
                    ChemCompFragment::TABLE.name,
                    ChemCompFragment::TABLE.name,
                    ChemCompFragment::FRAGMENT_ID.eq(Fragment::FRAGMENT_ID),
                )
            })
            .filter(ChemCompFragment::HET_ID.eq(het_id.trim().to_ascii_uppercase()))
            .order_by(Fragment::FRAGMENT_ID, Direction::Asc);
        self.core.fetch_all(query, args).await
    }

    /// Fragments observed in a bound ligand.
    pub async fn fetch_all_by_ligand_id(
        &self,
        ligand_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<Fragment>> {
        let query = Fragment::query()
            .map_select(|s| {
                s.distinct().join(
                    Schema::Credo,
                    LigandFragment::TABLE.name,
                    LigandFragment::TABLE.name,
                    LigandFragment::FRAGMENT_ID.eq(Fragment::FRAGMENT_ID),
                )
            })
            .filter(LigandFragment::LIGAND_ID.eq(ligand_id))
            .order_by(Fragment::FRAGMENT_ID, Direction::Asc);
        self.core.fetch_all(query, args).await
    }

    /// Direct children in the hierarchy.
    pub async fn fetch_all_children(
        &self,
        fragment_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<Fragment>> {
        let query = Fragment::query()
            .map_select(|s| {
                s.distinct().join(
                    Schema::PdbChem,
                    FragmentHierarchy::TABLE.name,
                    FragmentHierarchy::TABLE.name,
                    FragmentHierarchy::CHILD_ID.eq(Fragment::FRAGMENT_ID),
                )
            })
            .filter(FragmentHierarchy::PARENT_ID.eq(fragment_id))
            .order_by(Fragment::FRAGMENT_ID, Direction::Asc);
        self.core.fetch_all(query, args).await
    }

    /// Direct parents, taking only the canonical edge of every source
    /// compound: the one with the highest `order_child`.
    pub async fn fetch_all_parents(
        &self,
        fragment_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<Fragment>> {
        let mut max_order = Sql::text("MAX(");
        max_order
            .append(&FragmentHierarchy::ORDER_CHILD.to_sql())
            .push(") AS order_child");
        let canonical = hierarchy()
            .column(FragmentHierarchy::HET_ID.to_sql())
            .column(max_order)
            .filter(FragmentHierarchy::CHILD_ID.eq(fragment_id))
            .group_by(FragmentHierarchy::HET_ID.to_sql());

        let query = Fragment::query()
            .map_select(|s| {
                s.distinct()
                    .join(
                        Schema::PdbChem,
                        FragmentHierarchy::TABLE.name,
                        FragmentHierarchy::TABLE.name,
                        FragmentHierarchy::PARENT_ID.eq(Fragment::FRAGMENT_ID),
                    )
                    .join_subquery(
                        &canonical.to_sql(),
                        "canonical",
                        Expr::and([
                            CANONICAL_HET_ID.eq(FragmentHierarchy::HET_ID),
                            CANONICAL_ORDER_CHILD.eq(FragmentHierarchy::ORDER_CHILD),
                        ]),
                    )
            })
            .filter(FragmentHierarchy::CHILD_ID.eq(fragment_id))
            .order_by(Fragment::FRAGMENT_ID, Direction::Asc);
        self.core.fetch_all(query, args).await
    }

    /// Every fragment below this one, at any depth.
    pub async fn fetch_all_descendants(
        &self,
        fragment_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<Fragment>> {
        self.core.fetch_all(descendants(fragment_id), args).await
    }

    /// Terminal descendants, which cannot be fragmented further.
    pub async fn fetch_all_leaves(
        &self,
        fragment_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<Fragment>> {
        let query = descendants(fragment_id).filter(Fragment::IS_TERMINAL.is_true());
        self.core.fetch_all(query, args).await
    }

    /// Fragments containing the SMILES substructure. `None` when RDKit is
    /// unavailable.
    pub async fn fetch_all_by_substruct(
        &self,
        smiles: &str,
        args: FetchArgs,
    ) -> Result<Option<Fetched<Fragment>>> {
        if !rdkit_available(self.core.credo(), "fragment.fetch_all_by_substruct") {
            return Ok(None);
        }
        let query = Fragment::query()
            .map_select(|s| {
                s.join(
                    Schema::PdbChem,
                    FragmentRDMol::TABLE.name,
                    FragmentRDMol::TABLE.name,
                    FragmentRDMol::FRAGMENT_ID.eq(Fragment::FRAGMENT_ID),
                )
            })
            .filter(StructureMatch::Substructure.predicate(FragmentRDMol::RDMOL, smiles))
            .order_by(Fragment::FRAGMENT_ID, Direction::Asc);
        self.core.fetch_all(query, args).await.map(Some)
    }

    pub async fn fetch_all_by_sim_fp(
        &self,
        smiles: &str,
        search: FingerprintSearch,
        args: FetchArgs,
    ) -> Result<Option<Fetched<Scored<Fragment>>>> {
        if !rdkit_available(self.core.credo(), "fragment.fetch_all_by_sim_fp") {
            return Ok(None);
        }
        let query = fingerprint_query::<Fragment>(
            Fragment::TABLE.select(),
            FragmentRDFP::TABLE.name,
            FragmentRDFP::FRAGMENT_ID,
            Fragment::FRAGMENT_ID,
            smiles,
            search,
        );
        self.core.fetch_all(query, args).await.map(Some)
    }
}

adaptor!(LigandFragmentAdaptor);

impl LigandFragmentAdaptor {
    pub async fn fetch_by_ligand_fragment_id(
        &self,
        ligand_fragment_id: i32,
    ) -> Result<Option<LigandFragment>> {
        let query = LigandFragment::query()
            .filter(LigandFragment::LIGAND_FRAGMENT_ID.eq(ligand_fragment_id));
        self.core.fetch_one(query).await
    }

    pub async fn fetch_all_by_ligand_id(
        &self,
        ligand_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<LigandFragment>> {
        let query = LigandFragment::query()
            .filter(LigandFragment::LIGAND_ID.eq(ligand_id))
            .order_by(LigandFragment::LIGAND_FRAGMENT_ID, Direction::Asc);
        self.core.fetch_all(query, args).await
    }

    /// Every occurrence of a fragment in bound ligands.
    pub async fn fetch_all_by_fragment_id(
        &self,
        fragment_id: i32,
        args: FetchArgs,
    ) -> Result<Fetched<LigandFragment>> {
        let query = LigandFragment::query()
            .filter(LigandFragment::FRAGMENT_ID.eq(fragment_id))
            .order_by(LigandFragment::LIGAND_FRAGMENT_ID, Direction::Asc);
        self.core.fetch_all(query, args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adaptor::testing::*;
    use crate::config::SchemaNames;
    use crate::db::testing::lazy_credo;
    use pretty_assertions::assert_eq;

    #[test]
    fn descendants_walk_the_hierarchy_recursively() {
        let sql = descendants(11).to_sql(&SchemaNames::default());
        assert_eq!(
            sql,
            "WITH RECURSIVE descendants AS (\
             (SELECT fragment_hierarchies.child_id FROM pdbchem.fragment_hierarchies AS fragment_hierarchies \
             WHERE fragment_hierarchies.parent_id = $1) UNION \
             (SELECT fragment_hierarchies.child_id FROM descendants AS descendants \
             JOIN pdbchem.fragment_hierarchies AS fragment_hierarchies \
             ON fragment_hierarchies.parent_id = descendants.child_id)) \
             SELECT fragments.fragment_id, fragments.ism, fragments.mw::float8 AS mw, \
             fragments.num_hvy_atoms, fragments.is_terminal \
             FROM pdbchem.fragments AS fragments \
             JOIN descendants AS descendants ON descendants.child_id = fragments.fragment_id \
             ORDER BY fragments.fragment_id ASC"
        );
    }

    #[tokio::test]
    async fn leaves_are_terminal_descendants() {
        let adaptor = FragmentAdaptor::with_options(lazy_credo(), dynamic());
        let sql = rendered(
            adaptor
                .fetch_all_leaves(11, FetchArgs::default())
                .await
                .expect("query"),
        );
        assert!(sql.starts_with("WITH RECURSIVE descendants AS ("));
        assert!(sql.contains("WHERE fragments.is_terminal = $2"));
    }

    #[tokio::test]
    async fn parents_use_the_canonical_edge_per_compound() {
        let adaptor = FragmentAdaptor::with_options(lazy_credo(), dynamic());
        let sql = rendered(
            adaptor
                .fetch_all_parents(11, FetchArgs::default())
                .await
                .expect("query"),
        );
        assert!(sql.contains(
            "JOIN (SELECT fragment_hierarchies.het_id, MAX(fragment_hierarchies.order_child) AS order_child \
             FROM pdbchem.fragment_hierarchies AS fragment_hierarchies \
             WHERE fragment_hierarchies.child_id = $1 GROUP BY fragment_hierarchies.het_id) AS canonical"
        ));
        assert!(sql.contains(
            "ON (canonical.het_id = fragment_hierarchies.het_id) AND (canonical.order_child = fragment_hierarchies.order_child)"
        ));
        assert!(sql.contains("WHERE fragment_hierarchies.child_id = $2"));
    }

    #[tokio::test]
    async fn children_are_one_step_down() {
        let adaptor = FragmentAdaptor::with_options(lazy_credo(), dynamic());
        let sql = rendered(
            adaptor
                .fetch_all_children(11, FetchArgs::default())
                .await
                .expect("query"),
        );
        assert!(sql.starts_with("SELECT DISTINCT fragments.fragment_id"));
        assert!(sql.contains("ON fragment_hierarchies.child_id = fragments.fragment_id"));
        assert!(sql.contains("WHERE fragment_hierarchies.parent_id = $1"));
    }

    #[tokio::test]
    async fn fragment_similarity_joins_the_fragment_fingerprints() {
        let adaptor = FragmentAdaptor::with_options(lazy_credo(), dynamic());
        let sql = rendered(
            adaptor
                .fetch_all_by_sim_fp("c1ccccc1", FingerprintSearch::default(), FetchArgs::default())
                .await
                .expect("query")
                .expect("rdkit enabled"),
        );
        assert!(sql.contains(
            "JOIN pdbchem.fragment_rdfps AS fragment_rdfps ON fragment_rdfps.fragment_id = fragments.fragment_id"
        ));
    }
}
