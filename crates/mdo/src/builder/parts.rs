//! Clause parts held by the statement builders.

use crate::builder::select::Select;
use crate::error::DbError;
use crate::value::Expr;
use std::fmt;
use std::str::FromStr;

/// Named slots of a SELECT, in rendering order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClausePart {
    Distinct,
    Columns,
    From,
    Union,
    Where,
    Group,
    Having,
    Order,
    LimitCount,
    LimitOffset,
    ForUpdate,
}

impl ClausePart {
    /// Every part, in the order `assemble()` renders them.
    pub const ALL: [ClausePart; 11] = [
        ClausePart::Distinct,
        ClausePart::Columns,
        ClausePart::From,
        ClausePart::Union,
        ClausePart::Where,
        ClausePart::Group,
        ClausePart::Having,
        ClausePart::Order,
        ClausePart::LimitCount,
        ClausePart::LimitOffset,
        ClausePart::ForUpdate,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ClausePart::Distinct => "distinct",
            ClausePart::Columns => "columns",
            ClausePart::From => "from",
            ClausePart::Union => "union",
            ClausePart::Where => "where",
            ClausePart::Group => "group",
            ClausePart::Having => "having",
            ClausePart::Order => "order",
            ClausePart::LimitCount => "limitcount",
            ClausePart::LimitOffset => "limitoffset",
            ClausePart::ForUpdate => "forupdate",
        }
    }
}

impl FromStr for ClausePart {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "");
        ClausePart::ALL
            .into_iter()
            .find(|p| p.name() == wanted)
            .ok_or_else(|| DbError::malformed(format!("invalid select part '{s}'")))
    }
}

/// How a FROM entry is attached to the ones before it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum JoinType {
    /// Plain FROM table (comma-free; later ones render as INNER JOIN).
    From,
    Inner,
    Left,
    Right,
    Full,
    Cross,
    Natural,
    Straight,
}

impl JoinType {
    pub fn keyword(&self) -> &'static str {
        match self {
            JoinType::From | JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
            JoinType::Right => "RIGHT JOIN",
            JoinType::Full => "FULL JOIN",
            JoinType::Cross => "CROSS JOIN",
            JoinType::Natural => "NATURAL JOIN",
            JoinType::Straight => "STRAIGHT_JOIN",
        }
    }

    /// Whether the join takes an ON condition.
    pub fn takes_condition(&self) -> bool {
        !matches!(self, JoinType::Cross | JoinType::Natural)
    }
}

impl FromStr for JoinType {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_lowercase();
        match normalized.as_str() {
            "from" => Ok(JoinType::From),
            "join" | "inner join" | "inner" => Ok(JoinType::Inner),
            "left join" | "left" => Ok(JoinType::Left),
            "right join" | "right" => Ok(JoinType::Right),
            "full join" | "full" => Ok(JoinType::Full),
            "cross join" | "cross" => Ok(JoinType::Cross),
            "natural join" | "natural" => Ok(JoinType::Natural),
            "straight_join" | "straight join" | "straight" => Ok(JoinType::Straight),
            _ => Err(DbError::malformed(format!("invalid join type '{s}'"))),
        }
    }
}

/// UNION or UNION ALL.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum UnionType {
    #[default]
    Union,
    UnionAll,
}

impl UnionType {
    pub fn keyword(&self) -> &'static str {
        match self {
            UnionType::Union => "UNION",
            UnionType::UnionAll => "UNION ALL",
        }
    }
}

impl FromStr for UnionType {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_whitespace().collect::<Vec<_>>().join(" ").to_ascii_uppercase().as_str() {
            "UNION" => Ok(UnionType::Union),
            "UNION ALL" => Ok(UnionType::UnionAll),
            _ => Err(DbError::malformed(format!("invalid union type '{s}'"))),
        }
    }
}

/// The thing a FROM entry reads from.
#[derive(Clone, Debug)]
pub enum TableSource {
    Name(String),
    Expr(Expr),
    Subquery(Box<Select>),
}

impl From<&str> for TableSource {
    fn from(name: &str) -> Self {
        TableSource::Name(name.to_string())
    }
}

impl From<String> for TableSource {
    fn from(name: String) -> Self {
        TableSource::Name(name)
    }
}

impl From<Expr> for TableSource {
    fn from(expr: Expr) -> Self {
        TableSource::Expr(expr)
    }
}

impl From<Select> for TableSource {
    fn from(select: Select) -> Self {
        TableSource::Subquery(Box::new(select))
    }
}

/// Table argument of `from()` / `join*()`.
///
/// - `"orders"` / `"shop.orders"`: correlation name is the last dot segment
/// - `"orders AS o"`: explicit correlation name `o`
/// - `("o", "orders")`: explicit correlation name `o`
/// - an [`Expr`] or a [`Select`]: correlation name `t`, `t_2`, ...
#[derive(Clone, Debug)]
pub enum TableRef {
    Source(TableSource),
    Aliased { alias: String, source: TableSource },
}

impl TableRef {
    pub fn aliased(alias: impl Into<String>, source: impl Into<TableSource>) -> Self {
        TableRef::Aliased {
            alias: alias.into(),
            source: source.into(),
        }
    }
}

impl From<&str> for TableRef {
    fn from(name: &str) -> Self {
        TableRef::Source(name.into())
    }
}

impl From<String> for TableRef {
    fn from(name: String) -> Self {
        TableRef::Source(name.into())
    }
}

impl From<(&str, &str)> for TableRef {
    fn from((alias, name): (&str, &str)) -> Self {
        TableRef::aliased(alias, name)
    }
}

impl From<Expr> for TableRef {
    fn from(expr: Expr) -> Self {
        TableRef::Source(expr.into())
    }
}

impl From<Select> for TableRef {
    fn from(select: Select) -> Self {
        TableRef::Source(select.into())
    }
}

/// One correlation-named entry of the FROM clause.
#[derive(Clone, Debug)]
pub struct FromEntry {
    pub correlation: String,
    pub join_type: JoinType,
    pub schema: Option<String>,
    pub table: TableSource,
    pub condition: Option<String>,
    pub index_hints: Vec<String>,
}

/// A selected column or expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ColumnExpr {
    /// Plain column name, or `*`.
    Name(String),
    Expr(Expr),
}

impl ColumnExpr {
    pub fn is_wildcard(&self) -> bool {
        matches!(self, ColumnExpr::Name(n) if n == "*")
    }
}

/// `(correlation, column, alias)` as stored in the COLUMNS part.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnEntry {
    /// Empty when the column is not qualified.
    pub correlation: String,
    pub column: ColumnExpr,
    pub alias: Option<String>,
}

/// Column argument of `columns()` and of the `*_cols` join variants.
///
/// Strings are parsed: `"expr AS alias"` extracts the alias, anything with
/// parentheses is an opaque expression, and `"t.col"` is split into
/// correlation name and column.
#[derive(Clone, Debug)]
pub enum Column {
    Token(String),
    Expr(Expr),
    Aliased { alias: String, column: Box<Column> },
}

impl Column {
    pub fn aliased(alias: impl Into<String>, column: impl Into<Column>) -> Self {
        Column::Aliased {
            alias: alias.into(),
            column: Box::new(column.into()),
        }
    }
}

impl From<&str> for Column {
    fn from(token: &str) -> Self {
        Column::Token(token.to_string())
    }
}

impl From<String> for Column {
    fn from(token: String) -> Self {
        Column::Token(token)
    }
}

impl From<&String> for Column {
    fn from(token: &String) -> Self {
        Column::Token(token.clone())
    }
}

impl From<Expr> for Column {
    fn from(expr: Expr) -> Self {
        Column::Expr(expr)
    }
}

impl From<(&str, &str)> for Column {
    fn from((alias, column): (&str, &str)) -> Self {
        Column::aliased(alias, column)
    }
}

/// Explicitly select no columns for a table.
pub const NO_COLUMNS: [&str; 0] = [];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn keyword(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OrderExpr {
    Column(String),
    /// 1-based select-list position, rendered unquoted.
    Ordinal(u64),
    Expr(Expr),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderTerm {
    pub expr: OrderExpr,
    pub direction: Direction,
}

/// A member of a UNION.
#[derive(Clone, Debug)]
pub enum UnionMember {
    Select(Box<Select>),
    Sql(String),
}

impl From<Select> for UnionMember {
    fn from(select: Select) -> Self {
        UnionMember::Select(Box::new(select))
    }
}

impl From<&str> for UnionMember {
    fn from(sql: &str) -> Self {
        UnionMember::Sql(sql.to_string())
    }
}

impl From<String> for UnionMember {
    fn from(sql: String) -> Self {
        UnionMember::Sql(sql)
    }
}

/// Read-only view of one clause part.
#[derive(Debug)]
pub enum PartRef<'a> {
    Flag(bool),
    Columns(&'a [ColumnEntry]),
    From(&'a [FromEntry]),
    Union(&'a [(UnionMember, UnionType)]),
    Predicates(&'a [String]),
    Group(&'a [ColumnExpr]),
    Order(&'a [OrderTerm]),
    Count(Option<u64>),
}

impl fmt::Display for ClausePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
