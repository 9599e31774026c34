//! Caller-facing predicate algebra.
//!
//! Adaptor methods accept `Expr` values and splice them into their `WHERE`
//! clauses as additional conjunctions. Literals are always bound parameters.

use serde::Serialize;

use super::{Sql, Value};

/// A column of a table (or alias) participating in a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ColumnRef {
    pub table: &'static str,
    pub name: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    ILike,
    BitAnd,
    Add,
    Sub,
    Mul,
    /// `@>`
    Contains,
    /// `<@`
    ContainedBy,
    /// `~`
    Matches,
    /// `%`, the pg_trgm / RDKit tanimoto similarity operator
    Similar,
    /// `#`, the RDKit dice similarity operator
    DiceSimilar,
    /// `<->`
    Distance,
    /// `@=`
    SameStructure,
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Like => "LIKE",
            BinaryOp::ILike => "ILIKE",
            BinaryOp::BitAnd => "&",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Contains => "@>",
            BinaryOp::ContainedBy => "<@",
            BinaryOp::Matches => "~",
            BinaryOp::Similar => "%",
            BinaryOp::DiceSimilar => "#",
            BinaryOp::Distance => "<->",
            BinaryOp::SameStructure => "@=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Column(ColumnRef),
    Value(Value),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
    InList {
        expr: Box<Expr>,
        values: Vec<Value>,
        negated: bool,
    },
    /// `expr = ANY(array)`
    Any {
        expr: Box<Expr>,
        array: Value,
    },
    Between {
        expr: Box<Expr>,
        low: Value,
        high: Value,
    },
    Function {
        name: &'static str,
        args: Vec<Expr>,
    },
    Cast {
        expr: Box<Expr>,
        type_name: &'static str,
    },
    /// Pre-rendered SQL built by the crate itself.
    Raw(Sql),
}

/// Anything that can stand on either side of an operator.
pub trait IntoOperand {
    fn into_operand(self) -> Expr;
}

impl IntoOperand for Expr {
    fn into_operand(self) -> Expr {
        self
    }
}

impl IntoOperand for ColumnRef {
    fn into_operand(self) -> Expr {
        Expr::Column(self)
    }
}

impl IntoOperand for Value {
    fn into_operand(self) -> Expr {
        Expr::Value(self)
    }
}

macro_rules! literal_operand {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoOperand for $ty {
                fn into_operand(self) -> Expr {
                    Expr::Value(Value::from(self))
                }
            }
        )*
    };
}

literal_operand!(
    bool,
    i32,
    i64,
    f32,
    f64,
    &str,
    String,
    &String,
    Vec<i32>,
    Vec<i64>,
    Vec<f64>,
    Vec<String>,
    Vec<&str>
);

impl ColumnRef {
    pub const fn new(table: &'static str, name: &'static str) -> Self {
        Self { table, name }
    }

    /// The same column seen through another alias.
    pub const fn aliased(self, table: &'static str) -> Self {
        Self {
            table,
            name: self.name,
        }
    }

    pub fn expr(self) -> Expr {
        Expr::Column(self)
    }

    pub fn to_sql(self) -> Sql {
        Sql::text(format!("{}.{}", self.table, self.name))
    }

    pub fn eq(self, rhs: impl IntoOperand) -> Expr {
        self.expr().eq(rhs)
    }

    pub fn ne(self, rhs: impl IntoOperand) -> Expr {
        self.expr().ne(rhs)
    }

    pub fn lt(self, rhs: impl IntoOperand) -> Expr {
        self.expr().lt(rhs)
    }

    pub fn le(self, rhs: impl IntoOperand) -> Expr {
        self.expr().le(rhs)
    }

    pub fn gt(self, rhs: impl IntoOperand) -> Expr {
        self.expr().gt(rhs)
    }

    pub fn ge(self, rhs: impl IntoOperand) -> Expr {
        self.expr().ge(rhs)
    }

    pub fn like(self, pattern: impl Into<String>) -> Expr {
        self.expr().like(pattern)
    }

    pub fn ilike(self, pattern: impl Into<String>) -> Expr {
        self.expr().ilike(pattern)
    }

    pub fn is_null(self) -> Expr {
        self.expr().is_null()
    }

    pub fn is_not_null(self) -> Expr {
        self.expr().is_not_null()
    }

    pub fn is_true(self) -> Expr {
        self.expr().eq(true)
    }

    pub fn is_false(self) -> Expr {
        self.expr().eq(false)
    }

    pub fn in_list<V: Into<Value>>(self, values: impl IntoIterator<Item = V>) -> Expr {
        self.expr().in_list(values)
    }

    pub fn any(self, array: impl Into<Value>) -> Expr {
        self.expr().any(array)
    }

    pub fn between(self, low: impl Into<Value>, high: impl Into<Value>) -> Expr {
        self.expr().between(low, high)
    }

    /// `(column & mask) <> 0`
    pub fn has_bits(self, mask: i64) -> Expr {
        self.expr().has_bits(mask)
    }
}

impl Expr {
    pub fn value(value: impl Into<Value>) -> Self {
        Expr::Value(value.into())
    }

    pub fn binary(op: BinaryOp, lhs: impl IntoOperand, rhs: impl IntoOperand) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs.into_operand()),
            rhs: Box::new(rhs.into_operand()),
        }
    }

    pub fn function(name: &'static str, args: Vec<Expr>) -> Self {
        Expr::Function { name, args }
    }

    pub fn cast(self, type_name: &'static str) -> Self {
        Expr::Cast {
            expr: Box::new(self),
            type_name,
        }
    }

    pub(crate) fn raw(sql: Sql) -> Self {
        Expr::Raw(sql)
    }

    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Self {
        Expr::And(exprs.into_iter().collect())
    }

    pub fn or(exprs: impl IntoIterator<Item = Expr>) -> Self {
        Expr::Or(exprs.into_iter().collect())
    }

    pub fn and_also(self, other: Expr) -> Self {
        match self {
            Expr::And(mut items) => {
                items.push(other);
                Expr::And(items)
            }
            expr => Expr::And(vec![expr, other]),
        }
    }

    pub fn or_else(self, other: Expr) -> Self {
        match self {
            Expr::Or(mut items) => {
                items.push(other);
                Expr::Or(items)
            }
            expr => Expr::Or(vec![expr, other]),
        }
    }

    pub fn negate(self) -> Self {
        Expr::Not(Box::new(self))
    }

    pub fn eq(self, rhs: impl IntoOperand) -> Self {
        Expr::binary(BinaryOp::Eq, self, rhs)
    }

    pub fn ne(self, rhs: impl IntoOperand) -> Self {
        Expr::binary(BinaryOp::Ne, self, rhs)
    }

    pub fn lt(self, rhs: impl IntoOperand) -> Self {
        Expr::binary(BinaryOp::Lt, self, rhs)
    }

    pub fn le(self, rhs: impl IntoOperand) -> Self {
        Expr::binary(BinaryOp::Le, self, rhs)
    }

    pub fn gt(self, rhs: impl IntoOperand) -> Self {
        Expr::binary(BinaryOp::Gt, self, rhs)
    }

    pub fn ge(self, rhs: impl IntoOperand) -> Self {
        Expr::binary(BinaryOp::Ge, self, rhs)
    }

    pub fn like(self, pattern: impl Into<String>) -> Self {
        Expr::binary(BinaryOp::Like, self, Value::Text(pattern.into()))
    }

    pub fn ilike(self, pattern: impl Into<String>) -> Self {
        Expr::binary(BinaryOp::ILike, self, Value::Text(pattern.into()))
    }

    pub fn is_null(self) -> Self {
        Expr::IsNull {
            expr: Box::new(self),
            negated: false,
        }
    }

    pub fn is_not_null(self) -> Self {
        Expr::IsNull {
            expr: Box::new(self),
            negated: true,
        }
    }

    pub fn in_list<V: Into<Value>>(self, values: impl IntoIterator<Item = V>) -> Self {
        Expr::InList {
            expr: Box::new(self),
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
        }
    }

    pub fn not_in_list<V: Into<Value>>(self, values: impl IntoIterator<Item = V>) -> Self {
        Expr::InList {
            expr: Box::new(self),
            values: values.into_iter().map(Into::into).collect(),
            negated: true,
        }
    }

    pub fn any(self, array: impl Into<Value>) -> Self {
        Expr::Any {
            expr: Box::new(self),
            array: array.into(),
        }
    }

    pub fn between(self, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        Expr::Between {
            expr: Box::new(self),
            low: low.into(),
            high: high.into(),
        }
    }

    pub fn has_bits(self, mask: i64) -> Self {
        Expr::binary(BinaryOp::BitAnd, self, mask).ne(0)
    }

    fn needs_parens(&self) -> bool {
        matches!(
            self,
            Expr::Binary { .. }
                | Expr::And(_)
                | Expr::Or(_)
                | Expr::Not(_)
                | Expr::IsNull { .. }
                | Expr::InList { .. }
                | Expr::Between { .. }
                | Expr::Any { .. }
                | Expr::Raw(_)
        )
    }

    fn push_operand(&self, sql: &mut Sql) {
        if self.needs_parens() {
            sql.push("(").append(&self.to_sql()).push(")");
        } else {
            sql.append(&self.to_sql());
        }
    }

    pub fn to_sql(&self) -> Sql {
        let mut sql = Sql::new();
        match self {
            Expr::Column(column) => {
                sql.append(&column.to_sql());
            }
            Expr::Value(value) => {
                sql.push_bind(value.clone());
            }
            Expr::Binary { op, lhs, rhs } => {
                lhs.push_operand(&mut sql);
                sql.push(" ").push(op.symbol()).push(" ");
                rhs.push_operand(&mut sql);
            }
            Expr::And(items) | Expr::Or(items) => {
                let (joiner, empty) = if matches!(self, Expr::And(_)) {
                    (" AND ", "TRUE")
                } else {
                    (" OR ", "FALSE")
                };
                match items.as_slice() {
                    [] => {
                        sql.push(empty);
                    }
                    [single] => {
                        sql.append(&single.to_sql());
                    }
                    items => {
                        for (idx, item) in items.iter().enumerate() {
                            if idx > 0 {
                                sql.push(joiner);
                            }
                            sql.push("(").append(&item.to_sql()).push(")");
                        }
                    }
                }
            }
            Expr::Not(inner) => {
                sql.push("NOT (").append(&inner.to_sql()).push(")");
            }
            Expr::IsNull { expr, negated } => {
                expr.push_operand(&mut sql);
                sql.push(if *negated { " IS NOT NULL" } else { " IS NULL" });
            }
            Expr::InList {
                expr,
                values,
                negated,
            } => {
                if values.is_empty() {
                    sql.push(if *negated { "TRUE" } else { "FALSE" });
                } else {
                    expr.push_operand(&mut sql);
                    sql.push(if *negated { " NOT IN (" } else { " IN (" });
                    for (idx, value) in values.iter().enumerate() {
                        if idx > 0 {
                            sql.push(", ");
                        }
                        sql.push_bind(value.clone());
                    }
                    sql.push(")");
                }
            }
            Expr::Any { expr, array } => {
                expr.push_operand(&mut sql);
                sql.push(" = ANY(").push_bind(array.clone()).push(")");
            }
            Expr::Between { expr, low, high } => {
                expr.push_operand(&mut sql);
                sql.push(" BETWEEN ")
                    .push_bind(low.clone())
                    .push(" AND ")
                    .push_bind(high.clone());
            }
            Expr::Function { name, args } => {
                sql.push(*name).push("(");
                for (idx, arg) in args.iter().enumerate() {
                    if idx > 0 {
                        sql.push(", ");
                    }
                    sql.append(&arg.to_sql());
                }
                sql.push(")");
            }
            Expr::Cast { expr, type_name } => {
                sql.push("CAST(")
                    .append(&expr.to_sql())
                    .push(" AS ")
                    .push(*type_name)
                    .push(")");
            }
            Expr::Raw(raw) => {
                sql.append(raw);
            }
        }
        sql
    }

    /// True when this expression (or any conjunct) pins `column` to a value
    /// with `=`.
    pub fn pins(&self, column: ColumnRef) -> bool {
        match self {
            Expr::Binary {
                op: BinaryOp::Eq,
                lhs,
                rhs,
            } => {
                matches!(lhs.as_ref(), Expr::Column(c) if *c == column)
                    || matches!(rhs.as_ref(), Expr::Column(c) if *c == column)
            }
            Expr::And(items) => items.iter().any(|item| item.pins(column)),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchemaNames;
    use pretty_assertions::assert_eq;

    const DISTANCE: ColumnRef = ColumnRef::new("contacts", "distance");
    const BM: ColumnRef = ColumnRef::new("contacts", "structural_interaction_type_bm");

    fn render(expr: &Expr) -> String {
        expr.to_sql().to_sql(&SchemaNames::default())
    }

    #[test]
    fn renders_comparisons_with_binds() {
        let expr = DISTANCE.le(4.0);
        assert_eq!(render(&expr), "contacts.distance <= $1");
        assert_eq!(
            expr.to_sql().binds().cloned().collect::<Vec<_>>(),
            vec![Value::Float(4.0)]
        );
    }

    #[test]
    fn renders_nested_boolean_logic() {
        let expr = Expr::and([
            DISTANCE.lt(3.5),
            Expr::or([
                ColumnRef::new("contacts", "is_hbond").is_true(),
                ColumnRef::new("contacts", "is_ionic").is_true(),
            ]),
        ]);
        assert_eq!(
            render(&expr),
            "(contacts.distance < $1) AND ((contacts.is_hbond = $2) OR (contacts.is_ionic = $3))"
        );
    }

    #[test]
    fn renders_bitmask_test() {
        assert_eq!(
            render(&BM.has_bits(32 << 6)),
            "(contacts.structural_interaction_type_bm & $1) <> $2"
        );
    }

    #[test]
    fn empty_in_list_is_false() {
        let expr = DISTANCE.in_list(Vec::<f64>::new());
        assert_eq!(render(&expr), "FALSE");
        let expr = DISTANCE.expr().not_in_list(Vec::<f64>::new());
        assert_eq!(render(&expr), "TRUE");
    }

    #[test]
    fn renders_any_between_and_cast() {
        let names = ColumnRef::new("atoms", "atom_name").any(vec!["N1", "C2"]);
        assert_eq!(render(&names), "atoms.atom_name = ANY($1)");

        let range = DISTANCE.between(2.0, 4.0);
        assert_eq!(render(&range), "contacts.distance BETWEEN $1 AND $2");

        let ins = ColumnRef::new("residues", "ins_code").eq(Expr::value(" ").cast("bpchar"));
        assert_eq!(render(&ins), "residues.ins_code = CAST($1 AS bpchar)");
    }

    #[test]
    fn renders_function_calls_and_negation() {
        let expr = Expr::function("lower", vec![ColumnRef::new("chem_comps", "name").expr()])
            .like("%kinase%")
            .negate();
        assert_eq!(render(&expr), "NOT (lower(chem_comps.name) LIKE $1)");
    }

    #[test]
    fn and_also_flattens() {
        let expr = DISTANCE.lt(4.0).and_also(DISTANCE.gt(1.0)).and_also(BM.eq(2));
        match expr {
            Expr::And(items) => assert_eq!(items.len(), 3),
            other => panic!("expected conjunction, got {:?}", other),
        }
    }

    #[test]
    fn detects_pinned_columns() {
        let bio = ColumnRef::new("contacts", "biomolecule_id");
        assert!(bio.eq(3).pins(bio));
        assert!(Expr::and([DISTANCE.lt(4.0), bio.eq(3)]).pins(bio));
        assert!(!Expr::or([DISTANCE.lt(4.0), bio.eq(3)]).pins(bio));
        assert!(!bio.gt(3).pins(bio));
    }
}
