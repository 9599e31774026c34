//! Deferred queries.
//!
//! A [`Query`] is a composable, clonable `SELECT` that has not been executed
//! yet. Adaptors return one in dynamic mode; otherwise they execute it
//! themselves. Session settings (similarity thresholds) travel with the query
//! and are applied on the same connection right before it runs.

use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;

use futures::TryStreamExt;
use serde::Serialize;
use sqlx::pool::PoolConnection;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Postgres, Row as _};

use crate::config::SchemaNames;
use crate::db::Credo;
use crate::entity::Row;
use crate::error::{CredoError, Result};
use crate::pagination::Pagination;
use crate::sql::{ColumnRef, Direction, Expr, Select, Sql};

/// A per-session setting applied before a query executes.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionSetting {
    /// `set_config(name, value, false)`
    Config { name: &'static str, value: String },
    /// pg_trgm similarity threshold.
    TrigramLimit(f64),
    /// OpenEye fingerprint similarity threshold for one metric.
    OpenEyeLimit { metric: &'static str, value: f64 },
}

impl SessionSetting {
    pub fn to_sql(&self) -> Sql {
        let mut sql = Sql::text("SELECT ");
        match self {
            SessionSetting::Config { name, value } => {
                sql.push("set_config(")
                    .push_bind(*name)
                    .push(", ")
                    .push_bind(value.as_str())
                    .push(", false)");
            }
            SessionSetting::TrigramLimit(limit) => {
                sql.push("set_limit(CAST(")
                    .push_bind(*limit)
                    .push(" AS real))::float8");
            }
            SessionSetting::OpenEyeLimit { metric, value } => {
                sql.push("openeye.set_oefp_similarity_limit(")
                    .push_bind(*value)
                    .push(", ")
                    .push_bind(*metric)
                    .push(")::text");
            }
        }
        sql
    }

    async fn apply(&self, credo: &Credo, conn: &mut PoolConnection<Postgres>) -> Result<()> {
        let sql = self.to_sql();
        let names = credo.schema_names();
        credo.log_sql(&sql.to_sql(names), sql.binds().count());
        sql.to_builder(names).build().execute(&mut **conn).await?;
        Ok(())
    }
}

pub struct Query<T> {
    select: Select,
    settings: Vec<SessionSetting>,
    _row: PhantomData<fn() -> T>,
}

impl<T> Clone for Query<T> {
    fn clone(&self) -> Self {
        Self {
            select: self.select.clone(),
            settings: self.settings.clone(),
            _row: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Query<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("sql", &self.to_sql(&SchemaNames::default()))
            .field("settings", &self.settings)
            .finish()
    }
}

impl<T> Query<T> {
    pub fn new(select: Select) -> Self {
        Self {
            select,
            settings: Vec::new(),
            _row: PhantomData,
        }
    }

    /// A query that yields no rows.
    pub fn empty() -> Self {
        Self::new(
            Select::new()
                .column(Sql::text("NULL"))
                .filter(Expr::raw(Sql::text("FALSE"))),
        )
    }

    pub fn with_setting(mut self, setting: SessionSetting) -> Self {
        self.settings.push(setting);
        self
    }

    pub fn settings(&self) -> &[SessionSetting] {
        &self.settings
    }

    pub fn select(&self) -> &Select {
        &self.select
    }

    /// Applies `f` to the underlying statement.
    pub fn map_select(mut self, f: impl FnOnce(Select) -> Select) -> Self {
        self.select = f(self.select);
        self
    }

    /// Reinterprets the rows as another type, keeping statement and settings.
    pub fn cast<U>(self) -> Query<U> {
        Query {
            select: self.select,
            settings: self.settings,
            _row: PhantomData,
        }
    }

    pub fn filter(self, expr: Expr) -> Self {
        self.map_select(|s| s.filter(expr))
    }

    pub fn filters(self, exprs: impl IntoIterator<Item = Expr>) -> Self {
        self.map_select(|s| s.filters(exprs))
    }

    pub fn order_by(self, column: ColumnRef, direction: Direction) -> Self {
        self.map_select(|s| s.order_by_column(column, direction))
    }

    pub fn limit(self, limit: i64) -> Self {
        self.map_select(|s| s.limit(limit))
    }

    pub fn offset(self, offset: i64) -> Self {
        self.map_select(|s| s.offset(offset))
    }

    /// Rows of the 1-based `page` at `per_page` rows per page.
    pub fn page(self, page: i64, per_page: i64) -> Self {
        self.limit(per_page).offset((page - 1) * per_page)
    }

    /// The statement counting every row the query matches, ignoring order
    /// and paging.
    pub fn count_statement(&self) -> Sql {
        self.select.count_sql()
    }

    pub fn statement(&self) -> Sql {
        self.select.to_sql()
    }

    pub fn to_sql(&self, names: &SchemaNames) -> String {
        self.statement().to_sql(names)
    }

    /// A connection with every session setting applied.
    async fn session(&self, credo: &Credo) -> Result<PoolConnection<Postgres>> {
        let mut conn = credo.acquire().await?;
        for setting in &self.settings {
            setting.apply(credo, &mut conn).await?;
        }
        Ok(conn)
    }
}

impl<T: Row> Query<T> {
    async fn fetch_rows(&self, credo: &Credo, select: &Select) -> Result<Vec<T>> {
        let sql = select.to_sql();
        let names = credo.schema_names();
        let mut conn = self.session(credo).await?;
        credo.log_sql(&sql.to_sql(names), sql.binds().count());

        let mut builder = sql.to_builder(names);
        let query = builder.build_query_as::<T>();
        let rows: Vec<T> = if credo.stream_results() {
            query.fetch(&mut *conn).try_collect::<Vec<T>>().await?
        } else {
            query.fetch_all(&mut *conn).await?
        };
        Ok(rows)
    }

    pub async fn all(&self, credo: &Credo) -> Result<Vec<T>> {
        self.fetch_rows(credo, &self.select).await
    }

    pub async fn first(&self, credo: &Credo) -> Result<Option<T>> {
        let select = self.select.clone().limit(1);
        Ok(self.fetch_rows(credo, &select).await?.into_iter().next())
    }

    /// The single matching row, `None` when nothing matches; more than one
    /// row is an error.
    pub async fn one_or_none(&self, credo: &Credo) -> Result<Option<T>> {
        let select = self.select.clone().limit(2);
        let mut rows = self.fetch_rows(credo, &select).await?;
        if rows.len() > 1 {
            return Err(CredoError::MultipleRows(
                self.to_sql(credo.schema_names()),
            ));
        }
        Ok(rows.pop())
    }

    pub async fn count(&self, credo: &Credo) -> Result<i64> {
        let sql = self.count_statement();
        let names = credo.schema_names();
        let mut conn = self.session(credo).await?;
        credo.log_sql(&sql.to_sql(names), sql.binds().count());

        let mut builder = sql.to_builder(names);
        let count = builder
            .build_query_scalar::<i64>()
            .fetch_one(&mut *conn)
            .await?;
        Ok(count)
    }

    pub async fn paginate(self, credo: &Credo, page: i64, per_page: i64) -> Result<Pagination<T>> {
        Pagination::fetch(self, credo, page, per_page).await
    }
}

/// A row paired with the similarity score that selected it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scored<T> {
    pub entity: T,
    pub similarity: f64,
}

impl<T> Deref for Scored<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.entity
    }
}

impl<'r, T: FromRow<'r, PgRow>> FromRow<'r, PgRow> for Scored<T> {
    fn from_row(row: &'r PgRow) -> std::result::Result<Self, sqlx::Error> {
        Ok(Self {
            entity: T::from_row(row)?,
            similarity: row.try_get("similarity")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Schema;
    use pretty_assertions::assert_eq;

    #[test]
    fn settings_render_as_select_statements() {
        let names = SchemaNames::default();
        let config = SessionSetting::Config {
            name: "rdkit.tanimoto_threshold",
            value: "0.5".to_string(),
        };
        assert_eq!(config.to_sql().to_sql(&names), "SELECT set_config($1, $2, false)");

        let trgm = SessionSetting::TrigramLimit(0.3);
        assert_eq!(
            trgm.to_sql().to_sql(&names),
            "SELECT set_limit(CAST($1 AS real))::float8"
        );
    }

    #[test]
    fn query_builders_compose_on_the_outer_select() {
        let query: Query<(i32,)> = Query::new(
            Select::from_table(Schema::Credo, "chains", "chains")
                .column(Sql::text("chains.chain_id")),
        )
        .filter(ColumnRef::new("chains", "biomolecule_id").eq(1))
        .order_by(ColumnRef::new("chains", "chain_id"), Direction::Asc)
        .limit(5);
        assert_eq!(
            query.to_sql(&SchemaNames::default()),
            "SELECT chains.chain_id FROM credo.chains AS chains WHERE chains.biomolecule_id = $1 \
             ORDER BY chains.chain_id ASC LIMIT 5"
        );
    }

    #[test]
    fn empty_query_selects_nothing() {
        let query: Query<(i32,)> = Query::empty();
        assert_eq!(
            query.to_sql(&SchemaNames::default()),
            "SELECT NULL WHERE FALSE"
        );
    }

    #[test]
    fn count_and_page_share_the_filtered_union() {
        let side = |column: &'static str| {
            Select::from_table(Schema::Credo, "contacts", "contacts")
                .filter(ColumnRef::new("contacts", column).eq(42))
                .filter(ColumnRef::new("contacts", "biomolecule_id").eq(7))
        };
        let query: Query<(i32,)> = crate::adaptor::union_query(
            &[side("atom_bgn_id"), side("atom_end_id")],
            false,
            "contacts",
        )
        .filter(ColumnRef::new("contacts", "distance").le(4.0))
        .order_by(ColumnRef::new("contacts", "contact_id"), Direction::Asc);

        let names = SchemaNames::default();
        let filtered = "SELECT * FROM (\
            (SELECT * FROM credo.contacts AS contacts \
            WHERE (contacts.atom_bgn_id = $1) AND (contacts.biomolecule_id = $2)) \
            UNION ALL \
            (SELECT * FROM credo.contacts AS contacts \
            WHERE (contacts.atom_end_id = $3) AND (contacts.biomolecule_id = $4))\
            ) AS contacts WHERE contacts.distance <= $5";

        let count = query.count_statement();
        assert_eq!(
            count.to_sql(&names),
            format!("SELECT COUNT(*) FROM ({filtered}) AS counted")
        );

        let page = query.clone().page(3, 10);
        assert_eq!(
            page.to_sql(&names),
            format!("{filtered} ORDER BY contacts.contact_id ASC LIMIT 10 OFFSET 20")
        );
        assert_eq!(page.count_statement().to_sql(&names), count.to_sql(&names));

        let count_binds: Vec<_> = count.binds().collect();
        let page_statement = page.statement();
        let page_binds: Vec<_> = page_statement.binds().collect();
        assert_eq!(count_binds.len(), 5);
        assert_eq!(count_binds, page_binds);
    }

    #[test]
    fn cast_keeps_settings() {
        let query: Query<(i32,)> =
            Query::new(Select::new()).with_setting(SessionSetting::TrigramLimit(0.2));
        let cast: Query<(i64,)> = query.cast();
        assert_eq!(cast.settings().len(), 1);
    }
}
