//! Adaptors: query builders that answer domain questions.
//!
//! Each adaptor builds a [`Query`] against its entity's default projection,
//! splices in the caller's filter expressions and then hands the query to
//! [`AdaptorCore::finalize`], the single place that decides whether the
//! caller gets a list, the unexecuted query, or one page.

mod atom;
mod chain;
mod chemcomp;
mod contact;
mod domain;
mod fragment;
mod interface;
mod ligand;
mod residue;
mod ring;
mod sift;
mod similarity;
mod structure;
mod variation;
mod xref;

use async_trait::async_trait;
use tracing::debug;

use crate::db::{Capability, Credo};
use crate::entity::{Entity, PathEntity, Row};
use crate::error::Result;
use crate::pagination::Pagination;
use crate::path::{self, EntityPath, PathPattern};
use crate::query::Query;
use crate::sql::{self, Expr, Select, Sql};

pub use atom::AtomAdaptor;
pub use chain::{ChainAdaptor, ProtFragmentAdaptor};
pub use chemcomp::ChemCompAdaptor;
pub use contact::{ContactAdaptor, WaterBridge};
pub use domain::{BindingSiteAdaptor, DomainAdaptor};
pub use fragment::{FragmentAdaptor, LigandFragmentAdaptor};
pub use interface::{GrooveAdaptor, InterfaceAdaptor};
pub use ligand::{FuzcavQuery, LigandAdaptor, LigandComponentAdaptor, FUZCAV_TOP_HITS};
pub use residue::{PeptideAdaptor, ResidueAdaptor};
pub use ring::{
    AromaticRingAdaptor, AtomRingInteractionAdaptor, PiGroupAdaptor, PiInteractionAdaptor,
    RingInteractionAdaptor,
};
pub use sift::{ResidueSift, SiftAdaptor};
pub use similarity::FingerprintSearch;
pub use structure::{BiomoleculeAdaptor, StructureAdaptor};
pub use variation::{PhenotypeAdaptor, VariationAdaptor};
pub use xref::XRefAdaptor;

pub const DEFAULT_PER_PAGE: i64 = 100;

/// Behavior flags shared by every adaptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdaptorOptions {
    /// Return the unexecuted query.
    pub dynamic: bool,
    /// Return one page instead of a list.
    pub paginate: bool,
    pub per_page: i64,
}

impl Default for AdaptorOptions {
    fn default() -> Self {
        Self {
            dynamic: false,
            paginate: false,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl AdaptorOptions {
    pub fn dynamic() -> Self {
        Self {
            dynamic: true,
            ..Self::default()
        }
    }

    pub fn paginated(per_page: i64) -> Self {
        Self {
            paginate: true,
            per_page,
            ..Self::default()
        }
    }
}

/// Caller-supplied filters and result shaping for one `fetch_all_*` call.
#[derive(Debug, Clone, Default)]
pub struct FetchArgs {
    pub exprs: Vec<Expr>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub limit: Option<i64>,
}

/// The shaping half of [`FetchArgs`], consumed by [`AdaptorCore::finalize`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Shape {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub limit: Option<i64>,
}

impl FetchArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, expr: Expr) -> Self {
        self.exprs.push(expr);
        self
    }

    pub fn filters(mut self, exprs: impl IntoIterator<Item = Expr>) -> Self {
        self.exprs.extend(exprs);
        self
    }

    pub fn page(mut self, page: i64) -> Self {
        self.page = Some(page);
        self
    }

    pub fn per_page(mut self, per_page: i64) -> Self {
        self.per_page = Some(per_page);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn split(self) -> (Vec<Expr>, Shape) {
        (
            self.exprs,
            Shape {
                page: self.page,
                per_page: self.per_page,
                limit: self.limit,
            },
        )
    }
}

impl From<Expr> for FetchArgs {
    fn from(expr: Expr) -> Self {
        FetchArgs::new().filter(expr)
    }
}

impl From<Vec<Expr>> for FetchArgs {
    fn from(exprs: Vec<Expr>) -> Self {
        FetchArgs::new().filters(exprs)
    }
}

/// The result of a `fetch_all_*` call.
#[derive(Debug, Clone)]
pub enum Fetched<T> {
    List(Vec<T>),
    Query(Query<T>),
    Page(Pagination<T>),
}

impl<T> Fetched<T> {
    pub fn into_list(self) -> Option<Vec<T>> {
        match self {
            Fetched::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn into_query(self) -> Option<Query<T>> {
        match self {
            Fetched::Query(query) => Some(query),
            _ => None,
        }
    }

    pub fn into_page(self) -> Option<Pagination<T>> {
        match self {
            Fetched::Page(page) => Some(page),
            _ => None,
        }
    }

    /// Items already materialized by this result, if any.
    pub fn items(&self) -> &[T] {
        match self {
            Fetched::List(items) => items,
            Fetched::Page(page) => &page.items,
            Fetched::Query(_) => &[],
        }
    }
}

impl<T: Row> Fetched<T> {
    /// Materializes the result regardless of shape: a query handle is
    /// executed, a page yields its items.
    pub async fn collect(self, credo: &Credo) -> Result<Vec<T>> {
        match self {
            Fetched::List(items) => Ok(items),
            Fetched::Page(page) => Ok(page.items),
            Fetched::Query(query) => query.all(credo).await,
        }
    }
}

/// State shared by every adaptor.
#[derive(Debug, Clone)]
pub struct AdaptorCore {
    credo: Credo,
    options: AdaptorOptions,
}

impl AdaptorCore {
    pub fn new(credo: Credo, options: AdaptorOptions) -> Self {
        Self { credo, options }
    }

    pub fn credo(&self) -> &Credo {
        &self.credo
    }

    pub fn options(&self) -> AdaptorOptions {
        self.options
    }

    /// Decides the return shape for a fully built query.
    pub async fn finalize<T: Row>(&self, query: Query<T>, shape: Shape) -> Result<Fetched<T>> {
        if self.options.dynamic {
            let query = match shape.limit {
                Some(limit) => query.limit(limit),
                None => query,
            };
            return Ok(Fetched::Query(query));
        }

        if self.options.paginate {
            let page = shape.page.unwrap_or(1);
            let per_page = shape.per_page.unwrap_or(self.options.per_page);
            debug!(stage = "adaptor", event = "adaptor.paginate", page, per_page);
            return Ok(Fetched::Page(query.paginate(&self.credo, page, per_page).await?));
        }

        let query = match shape.limit {
            Some(limit) => query.limit(limit),
            None => query,
        };
        Ok(Fetched::List(query.all(&self.credo).await?))
    }

    /// Like [`finalize`](Self::finalize) but never paginates, for top-k
    /// kernels.
    pub async fn finalize_unpaged<T: Row>(&self, query: Query<T>, shape: Shape) -> Result<Fetched<T>> {
        let query = match shape.limit {
            Some(limit) => query.limit(limit),
            None => query,
        };
        if self.options.dynamic {
            Ok(Fetched::Query(query))
        } else {
            Ok(Fetched::List(query.all(&self.credo).await?))
        }
    }

    /// Applies the caller's filters to `query`, then finalizes.
    pub async fn fetch_all<T: Row>(&self, query: Query<T>, args: FetchArgs) -> Result<Fetched<T>> {
        let (filters, shape) = args.split();
        self.finalize(query.filters(filters), shape).await
    }

    pub async fn fetch_one<T: Row>(&self, query: Query<T>) -> Result<Option<T>> {
        query.first(&self.credo).await
    }
}

/// Wraps the union of `selects` as a subquery aliased `alias`, so that outer
/// filters and ordering can address it like the entity's own table.
pub(crate) fn union_query<T>(selects: &[Select], dedup: bool, alias: &str) -> Query<T> {
    Query::new(Select::from_subquery(&sql::union(selects, dedup), alias))
}

/// `(SELECT 1 FROM ...)`-style raw predicate.
pub(crate) fn exists(select: Select) -> Expr {
    let mut sql = Sql::text("EXISTS (");
    sql.append(&select.to_sql()).push(")");
    Expr::raw(sql)
}

/// Path operators for entities carrying a path label.
#[async_trait]
pub trait PathOps: Sync {
    type Entity: PathEntity;

    fn core(&self) -> &AdaptorCore;

    /// Entities whose path matches a glob pattern such as `2P33/*/A|B`.
    /// `None` when the database lacks the `ptree` types.
    async fn fetch_all_by_path_match(
        &self,
        pattern: &str,
        args: FetchArgs,
    ) -> Result<Option<Fetched<Self::Entity>>> {
        let pattern = PathPattern::parse(pattern)?;
        if !self.core().credo().require(Capability::PathTree, "path.fetch_all_by_path_match") {
            return Ok(None);
        }
        let query = Self::Entity::query()
            .filter(path::match_expr(<Self::Entity as PathEntity>::PATH, &pattern));
        self.core().fetch_all(query, args).await.map(Some)
    }

    /// Entities whose path equals or lies below `prefix`. `None` when the
    /// database lacks the `ptree` types.
    async fn fetch_all_path_descendants(
        &self,
        prefix: &str,
        args: FetchArgs,
    ) -> Result<Option<Fetched<Self::Entity>>> {
        let prefix: EntityPath = prefix.parse()?;
        if !self.core().credo().require(Capability::PathTree, "path.fetch_all_path_descendants") {
            return Ok(None);
        }
        let query = Self::Entity::query()
            .filter(path::descendant_expr(<Self::Entity as PathEntity>::PATH, &prefix));
        self.core().fetch_all(query, args).await.map(Some)
    }
}

/// Declares an adaptor struct with the standard constructors.
macro_rules! adaptor {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name {
            core: $crate::adaptor::AdaptorCore,
        }

        impl $name {
            pub fn new(credo: $crate::db::Credo) -> Self {
                Self::with_options(credo, $crate::adaptor::AdaptorOptions::default())
            }

            pub fn with_options(
                credo: $crate::db::Credo,
                options: $crate::adaptor::AdaptorOptions,
            ) -> Self {
                Self {
                    core: $crate::adaptor::AdaptorCore::new(credo, options),
                }
            }

            pub fn options(&self) -> $crate::adaptor::AdaptorOptions {
                self.core.options()
            }
        }
    };
}

pub(crate) use adaptor;

/// Implements [`PathOps`] for an adaptor over a path-carrying entity.
macro_rules! path_ops {
    ($adaptor:ty, $entity:ty) => {
        impl $crate::adaptor::PathOps for $adaptor {
            type Entity = $entity;

            fn core(&self) -> &$crate::adaptor::AdaptorCore {
                &self.core
            }
        }
    };
}

pub(crate) use path_ops;

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::config::SchemaNames;

    /// Renders a dynamic-mode result to SQL.
    pub fn rendered<T>(fetched: Fetched<T>) -> String {
        match fetched {
            Fetched::Query(query) => query.to_sql(&SchemaNames::default()),
            _ => panic!("expected a query handle"),
        }
    }

    pub fn dynamic() -> AdaptorOptions {
        AdaptorOptions::dynamic()
    }

    /// Asserts that every atoms or contacts relation in `sql` is pinned to
    /// a biomolecule.
    pub fn assert_partition_pinned(sql: &str) {
        for table in ["credo.atoms AS ", "credo.contacts AS "] {
            for (idx, _) in sql.match_indices(table) {
                let alias: String = sql[idx + table.len()..]
                    .chars()
                    .take_while(|c| c.is_alphanumeric() || *c == '_')
                    .collect();
                assert!(
                    sql.contains(&format!("{alias}.biomolecule_id = $")),
                    "{alias} is not pinned to a biomolecule: {sql}"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::db::testing::lazy_credo;
    use crate::entity::Chain;

    #[test]
    fn fetch_args_split_filters_from_shape() {
        let args = FetchArgs::new()
            .filter(Chain::PDB_CHAIN_ID.eq("A"))
            .page(2)
            .per_page(10)
            .limit(5);
        let (filters, shape) = args.split();
        assert_eq!(filters.len(), 1);
        assert_eq!(
            shape,
            Shape {
                page: Some(2),
                per_page: Some(10),
                limit: Some(5)
            }
        );
    }

    #[tokio::test]
    async fn dynamic_mode_returns_the_unexecuted_query() {
        let credo = lazy_credo();
        let core = AdaptorCore::new(credo, dynamic());
        let fetched = core
            .fetch_all(
                Chain::query().filter(Chain::BIOMOLECULE_ID.eq(1)),
                FetchArgs::from(Chain::PDB_CHAIN_ID.eq("A")).limit(3),
            )
            .await
            .expect("dynamic");
        let sql = rendered(fetched);
        assert!(sql.contains("WHERE (chains.biomolecule_id = $1) AND (chains.pdb_chain_id = $2)"));
        assert!(sql.ends_with("LIMIT 3"));
    }

    #[tokio::test]
    async fn path_operators_validate_before_querying() {
        let credo = lazy_credo();
        let adaptor = ChainAdaptor::with_options(credo, dynamic());
        let err = adaptor
            .fetch_all_by_path_match("2P33/{A,B", FetchArgs::default())
            .await
            .expect_err("bad pattern");
        assert!(err.to_string().contains("unbalanced"));

        let sql = rendered(
            adaptor
                .fetch_all_path_descendants("2P33/1", FetchArgs::default())
                .await
                .expect("descendants")
                .expect("path tree capability"),
        );
        assert!(sql.contains("chains.path <@ CAST($1 AS ptree)"));
    }
}
