//! Clonable SQL fragments and the `SELECT` tree used by every adaptor.
//!
//! Queries are assembled as [`Sql`] values instead of strings so that they can
//! be cloned, composed, counted and inspected before execution. Values are
//! always bound; only static identifiers and integer limits are inlined.

pub mod expr;

use std::fmt::Write as _;

use sqlx::{Postgres, QueryBuilder};

use crate::config::{Schema, SchemaNames};

pub use expr::{BinaryOp, ColumnRef, Expr, IntoOperand};

/// A literal bound as a query parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    IntArray(Vec<i64>),
    FloatArray(Vec<f64>),
    TextArray(Vec<String>),
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<Vec<i32>> for Value {
    fn from(v: Vec<i32>) -> Self {
        Value::IntArray(v.into_iter().map(i64::from).collect())
    }
}

impl From<Vec<i64>> for Value {
    fn from(v: Vec<i64>) -> Self {
        Value::IntArray(v)
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::FloatArray(v)
    }
}

impl From<&[f64]> for Value {
    fn from(v: &[f64]) -> Self {
        Value::FloatArray(v.to_vec())
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::TextArray(v)
    }
}

impl From<Vec<&str>> for Value {
    fn from(v: Vec<&str>) -> Self {
        Value::TextArray(v.into_iter().map(str::to_string).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Part {
    Text(String),
    Bind(Value),
    Table(Schema, &'static str),
}

/// A piece of SQL text interleaved with bound values and schema-qualified
/// table names that are resolved only at render time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sql {
    parts: Vec<Part>,
}

impl Sql {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(text: impl AsRef<str>) -> Self {
        let mut sql = Self::new();
        sql.push(text);
        sql
    }

    pub fn bind(value: impl Into<Value>) -> Self {
        let mut sql = Self::new();
        sql.push_bind(value);
        sql
    }

    pub fn push(&mut self, text: impl AsRef<str>) -> &mut Self {
        let text = text.as_ref();
        if text.is_empty() {
            return self;
        }
        match self.parts.last_mut() {
            Some(Part::Text(existing)) => existing.push_str(text),
            _ => self.parts.push(Part::Text(text.to_string())),
        }
        self
    }

    pub fn push_bind(&mut self, value: impl Into<Value>) -> &mut Self {
        match value.into() {
            Value::Null => self.push("NULL"),
            value => {
                self.parts.push(Part::Bind(value));
                self
            }
        }
    }

    pub fn push_table(&mut self, schema: Schema, name: &'static str) -> &mut Self {
        self.parts.push(Part::Table(schema, name));
        self
    }

    pub fn append(&mut self, other: &Sql) -> &mut Self {
        for part in &other.parts {
            match part {
                Part::Text(text) => {
                    self.push(text);
                }
                other => self.parts.push(other.clone()),
            }
        }
        self
    }

    /// Appends `items` separated by `separator`.
    pub fn push_separated<'a>(
        &mut self,
        items: impl IntoIterator<Item = &'a Sql>,
        separator: &str,
    ) -> &mut Self {
        for (idx, item) in items.into_iter().enumerate() {
            if idx > 0 {
                self.push(separator);
            }
            self.append(item);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn binds(&self) -> impl Iterator<Item = &Value> {
        self.parts.iter().filter_map(|part| match part {
            Part::Bind(value) => Some(value),
            _ => None,
        })
    }

    /// Renders the statement with `$n` placeholders.
    pub fn to_sql(&self, names: &SchemaNames) -> String {
        let mut out = String::new();
        let mut n = 0;
        for part in &self.parts {
            match part {
                Part::Text(text) => out.push_str(text),
                Part::Bind(_) => {
                    n += 1;
                    let _ = write!(out, "${n}");
                }
                Part::Table(schema, name) => {
                    let _ = write!(out, "{}.{}", names.resolve(*schema), name);
                }
            }
        }
        out
    }

    pub fn to_builder(&self, names: &SchemaNames) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new("");
        for part in &self.parts {
            match part {
                Part::Text(text) => {
                    qb.push(text);
                }
                Part::Table(schema, name) => {
                    qb.push(names.resolve(*schema)).push(".").push(*name);
                }
                Part::Bind(value) => push_value(&mut qb, value),
            }
        }
        qb
    }
}

fn push_value(qb: &mut QueryBuilder<'static, Postgres>, value: &Value) {
    match value {
        Value::Null => {
            qb.push("NULL");
        }
        Value::Bool(v) => {
            qb.push_bind(*v);
        }
        Value::Int(v) => {
            qb.push_bind(*v);
        }
        Value::Float(v) => {
            qb.push_bind(*v);
        }
        Value::Text(v) => {
            qb.push_bind(v.clone());
        }
        Value::IntArray(v) => {
            qb.push_bind(v.clone());
        }
        Value::FloatArray(v) => {
            qb.push_bind(v.clone());
        }
        Value::TextArray(v) => {
            qb.push_bind(v.clone());
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Cte {
    name: &'static str,
    recursive: bool,
    body: Sql,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// A `SELECT` statement under construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Select {
    ctes: Vec<Cte>,
    distinct: bool,
    columns: Vec<Sql>,
    from: Sql,
    joins: Vec<Sql>,
    filters: Vec<Sql>,
    group_by: Vec<Sql>,
    having: Vec<Sql>,
    order_by: Vec<Sql>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl Select {
    pub fn new() -> Self {
        Self::default()
    }

    /// `FROM schema.table AS alias`
    pub fn from_table(schema: Schema, table: &'static str, alias: &str) -> Self {
        let mut select = Self::new();
        select.from.push_table(schema, table);
        select.from.push(" AS ").push(alias);
        select
    }

    /// `FROM (subquery) AS alias`
    pub fn from_subquery(subquery: &Sql, alias: &str) -> Self {
        let mut select = Self::new();
        select.from.push("(").append(subquery).push(") AS ").push(alias);
        select
    }

    /// `FROM name AS alias` for a CTE.
    pub fn from_named(name: &str, alias: &str) -> Self {
        let mut select = Self::new();
        select.from.push(name).push(" AS ").push(alias);
        select
    }

    pub fn with(mut self, name: &'static str, body: Sql) -> Self {
        self.ctes.push(Cte {
            name,
            recursive: false,
            body,
        });
        self
    }

    pub fn with_recursive(mut self, name: &'static str, body: Sql) -> Self {
        self.ctes.push(Cte {
            name,
            recursive: true,
            body,
        });
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn column(mut self, column: Sql) -> Self {
        self.columns.push(column);
        self
    }

    pub fn columns(mut self, columns: impl IntoIterator<Item = Sql>) -> Self {
        self.columns.extend(columns);
        self
    }

    /// Replaces the projection.
    pub fn set_columns(mut self, columns: impl IntoIterator<Item = Sql>) -> Self {
        self.columns = columns.into_iter().collect();
        self
    }

    pub fn join(mut self, schema: Schema, table: &'static str, alias: &str, on: Expr) -> Self {
        self.joins.push(join_clause("JOIN", schema, table, alias, on));
        self
    }

    pub fn left_join(
        mut self,
        schema: Schema,
        table: &'static str,
        alias: &str,
        on: Expr,
    ) -> Self {
        self.joins
            .push(join_clause("LEFT JOIN", schema, table, alias, on));
        self
    }

    pub fn join_subquery(mut self, subquery: &Sql, alias: &str, on: Expr) -> Self {
        let mut clause = Sql::text("JOIN (");
        clause
            .append(subquery)
            .push(") AS ")
            .push(alias)
            .push(" ON ")
            .append(&on.to_sql());
        self.joins.push(clause);
        self
    }

    /// Joins a named CTE or other unqualified relation.
    pub fn join_named(mut self, name: &str, alias: &str, on: Expr) -> Self {
        let mut clause = Sql::text("JOIN ");
        clause
            .push(name)
            .push(" AS ")
            .push(alias)
            .push(" ON ")
            .append(&on.to_sql());
        self.joins.push(clause);
        self
    }

    pub fn filter(mut self, expr: Expr) -> Self {
        self.filters.push(expr.to_sql());
        self
    }

    pub fn filters(mut self, exprs: impl IntoIterator<Item = Expr>) -> Self {
        self.filters.extend(exprs.into_iter().map(|e| e.to_sql()));
        self
    }

    pub fn group_by(mut self, expr: Sql) -> Self {
        self.group_by.push(expr);
        self
    }

    pub fn having(mut self, expr: Expr) -> Self {
        self.having.push(expr.to_sql());
        self
    }

    pub fn order_by(mut self, expr: Sql, direction: Direction) -> Self {
        let mut clause = expr;
        clause.push(match direction {
            Direction::Asc => " ASC",
            Direction::Desc => " DESC",
        });
        self.order_by.push(clause);
        self
    }

    pub fn order_by_column(self, column: ColumnRef, direction: Direction) -> Self {
        self.order_by(column.to_sql(), direction)
    }

    pub fn clear_order(mut self) -> Self {
        self.order_by.clear();
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit.max(0));
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset.max(0));
        self
    }

    pub fn has_limit(&self) -> bool {
        self.limit.is_some()
    }

    /// The statement without ordering and paging, for `COUNT(*)` wrappers.
    pub fn unpaged(&self) -> Self {
        let mut select = self.clone();
        select.order_by.clear();
        select.limit = None;
        select.offset = None;
        select
    }

    pub fn to_sql(&self) -> Sql {
        let mut sql = Sql::new();

        if !self.ctes.is_empty() {
            sql.push("WITH ");
            if self.ctes.iter().any(|cte| cte.recursive) {
                sql.push("RECURSIVE ");
            }
            for (idx, cte) in self.ctes.iter().enumerate() {
                if idx > 0 {
                    sql.push(", ");
                }
                sql.push(cte.name).push(" AS (").append(&cte.body).push(")");
            }
            sql.push(" ");
        }

        sql.push("SELECT ");
        if self.distinct {
            sql.push("DISTINCT ");
        }
        if self.columns.is_empty() {
            sql.push("*");
        } else {
            sql.push_separated(&self.columns, ", ");
        }

        if !self.from.is_empty() {
            sql.push(" FROM ").append(&self.from);
        }

        for join in &self.joins {
            sql.push(" ").append(join);
        }

        if !self.filters.is_empty() {
            sql.push(" WHERE ");
            push_conjunction(&mut sql, &self.filters);
        }

        if !self.group_by.is_empty() {
            sql.push(" GROUP BY ").push_separated(&self.group_by, ", ");
        }

        if !self.having.is_empty() {
            sql.push(" HAVING ");
            push_conjunction(&mut sql, &self.having);
        }

        if !self.order_by.is_empty() {
            sql.push(" ORDER BY ").push_separated(&self.order_by, ", ");
        }

        if let Some(limit) = self.limit {
            sql.push(format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.offset {
            sql.push(format!(" OFFSET {offset}"));
        }

        sql
    }

    /// `SELECT COUNT(*) FROM (<self without order/limit>) AS counted`
    pub fn count_sql(&self) -> Sql {
        let mut sql = Sql::text("SELECT COUNT(*) FROM (");
        sql.append(&self.unpaged().to_sql()).push(") AS counted");
        sql
    }
}

fn push_conjunction(sql: &mut Sql, terms: &[Sql]) {
    for (idx, term) in terms.iter().enumerate() {
        if idx > 0 {
            sql.push(" AND ");
        }
        if terms.len() > 1 {
            sql.push("(").append(term).push(")");
        } else {
            sql.append(term);
        }
    }
}

fn join_clause(kind: &str, schema: Schema, table: &'static str, alias: &str, on: Expr) -> Sql {
    let mut clause = Sql::text(kind);
    clause
        .push(" ")
        .push_table(schema, table)
        .push(" AS ")
        .push(alias)
        .push(" ON ")
        .append(&on.to_sql());
    clause
}

/// Combines selects with `UNION ALL` (or `UNION` when `dedup` is set).
pub fn union(selects: &[Select], dedup: bool) -> Sql {
    let separator = if dedup { " UNION " } else { " UNION ALL " };
    let mut sql = Sql::new();
    for (idx, select) in selects.iter().enumerate() {
        if idx > 0 {
            sql.push(separator);
        }
        sql.push("(").append(&select.to_sql()).push(")");
    }
    sql
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn render(select: &Select) -> String {
        select.to_sql().to_sql(&SchemaNames::default())
    }

    #[test]
    fn adjacent_text_parts_are_merged() {
        let mut sql = Sql::text("SELECT ");
        sql.push("1").push(" + ").push_bind(2).push(" + ").push("3");
        assert_eq!(sql.parts.len(), 3);
        assert_eq!(sql.to_sql(&SchemaNames::default()), "SELECT 1 + $1 + 3");
    }

    #[test]
    fn null_values_are_inlined() {
        let sql = Sql::bind(Option::<i32>::None);
        assert_eq!(sql.to_sql(&SchemaNames::default()), "NULL");
        assert_eq!(sql.binds().count(), 0);
    }

    #[test]
    fn renders_full_select() {
        let select = Select::from_table(Schema::Credo, "chains", "chains")
            .column(Sql::text("chains.chain_id"))
            .filter(ColumnRef::new("chains", "biomolecule_id").eq(7))
            .filter(ColumnRef::new("chains", "pdb_chain_id").eq("A"))
            .order_by_column(ColumnRef::new("chains", "chain_id"), Direction::Asc)
            .limit(10)
            .offset(20);
        assert_eq!(
            render(&select),
            "SELECT chains.chain_id FROM credo.chains AS chains \
             WHERE (chains.biomolecule_id = $1) AND (chains.pdb_chain_id = $2) \
             ORDER BY chains.chain_id ASC LIMIT 10 OFFSET 20"
        );
    }

    #[test]
    fn schema_names_are_resolved_at_render_time() {
        let raw = r#"{
            "connection": {"user": "credo", "db": "credo"},
            "schema": {"credo": {"name": "credo_2013", "reflect": ["chains"]}}
        }"#;
        let names = crate::config::CredoConfig::parse(raw)
            .expect("config")
            .schema_names();
        let select = Select::from_table(Schema::Credo, "chains", "chains");
        assert_eq!(
            select.to_sql().to_sql(&names),
            "SELECT * FROM credo_2013.chains AS chains"
        );
    }

    #[test]
    fn count_strips_order_and_paging() {
        let select = Select::from_table(Schema::Credo, "chains", "chains")
            .filter(ColumnRef::new("chains", "chain_id").gt(1))
            .order_by_column(ColumnRef::new("chains", "chain_id"), Direction::Desc)
            .limit(5);
        assert_eq!(
            select.count_sql().to_sql(&SchemaNames::default()),
            "SELECT COUNT(*) FROM (SELECT * FROM credo.chains AS chains WHERE chains.chain_id > $1) AS counted"
        );
    }

    #[test]
    fn recursive_cte_is_marked_once() {
        let select = Select::new()
            .with("a", Sql::text("SELECT 1"))
            .with_recursive("b", Sql::text("SELECT 2"))
            .column(Sql::text("1"));
        assert_eq!(
            render(&select),
            "WITH RECURSIVE a AS (SELECT 1), b AS (SELECT 2) SELECT 1"
        );
    }

    #[test]
    fn union_wraps_each_branch() {
        let a = Select::from_table(Schema::Credo, "contacts", "contacts");
        let b = Select::from_table(Schema::Credo, "contacts", "contacts");
        let sql = union(&[a, b], false).to_sql(&SchemaNames::default());
        assert_eq!(
            sql,
            "(SELECT * FROM credo.contacts AS contacts) UNION ALL (SELECT * FROM credo.contacts AS contacts)"
        );
    }

    #[test]
    fn binds_are_numbered_across_subqueries() {
        let inner = Select::from_table(Schema::Credo, "atoms", "atoms")
            .filter(ColumnRef::new("atoms", "atom_id").eq(1));
        let outer = Select::from_subquery(&inner.to_sql(), "atoms")
            .filter(ColumnRef::new("atoms", "element").eq("C"));
        assert_eq!(
            render(&outer),
            "SELECT * FROM (SELECT * FROM credo.atoms AS atoms WHERE atoms.atom_id = $1) AS atoms WHERE atoms.element = $2"
        );
        assert_eq!(outer.to_sql().binds().count(), 2);
    }
}
