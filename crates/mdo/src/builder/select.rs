//! SELECT statement builder (MySQL dialect).

use crate::builder::parts::{
    ClausePart, Column, ColumnEntry, ColumnExpr, Direction, FromEntry, JoinType, OrderExpr,
    OrderTerm, PartRef, TableRef, TableSource, UnionMember, UnionType,
};
use crate::builder::predicate::{Cond, Connective, Predicate};
use crate::builder::{Assemble, StatementKind};
use crate::error::{DbError, DbResult};
use crate::quote::{MySqlDialect, Quote};
use crate::record::RowOrigin;
use crate::table::Table;
use crate::value::Expr;
use regex::Regex;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Row count emitted when only an offset was requested.
pub const MAX_LIMIT_COUNT: u64 = u64::MAX;

fn alias_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(.+)\s+AS\s+(.+)$").expect("invalid built-in alias regex")
    })
}

fn direction_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)^(.*\W)(ASC|DESC)\b").expect("invalid built-in direction regex")
    })
}

fn looks_like_expr(token: &str) -> bool {
    token
        .find('(')
        .is_some_and(|open| token[open..].contains(')'))
}

/// Where freshly parsed columns go in the COLUMNS part.
enum Placement {
    Append,
    /// After the last column of any of these correlation names; first if none.
    AfterAny(Vec<String>),
    /// After the last column of this correlation name; appended if none.
    After(String),
}

/// SELECT builder.
///
/// Methods consume and return the builder. Contract violations are recorded
/// and reported by [`Assemble::assemble`], so no SQL text is ever produced
/// for an invalid statement.
#[derive(Clone)]
pub struct Select {
    quoter: Arc<dyn Quote>,
    /// Bound table, if any
    table: Option<Arc<dyn Table>>,
    /// SELECT DISTINCT
    distinct: bool,
    /// Select list, grouped by correlation name
    columns: Vec<ColumnEntry>,
    /// FROM entry followed by its JOINs
    from: Vec<FromEntry>,
    /// UNION members
    union: Vec<(UnionMember, UnionType)>,
    /// WHERE conditions
    where_terms: Predicate,
    /// GROUP BY
    group: Vec<ColumnExpr>,
    /// HAVING conditions
    having_terms: Predicate,
    /// ORDER BY
    order: Vec<OrderTerm>,
    /// LIMIT
    limit_count: Option<u64>,
    /// OFFSET
    limit_offset: Option<u64>,
    /// FOR UPDATE
    for_update: bool,
    /// First contract violation
    build_error: Option<String>,
}

impl Select {
    /// Create an empty SELECT that quotes through `quoter`.
    pub fn new(quoter: Arc<dyn Quote>) -> Self {
        Self {
            quoter,
            table: None,
            distinct: false,
            columns: Vec::new(),
            from: Vec::new(),
            union: Vec::new(),
            where_terms: Predicate::new(),
            group: Vec::new(),
            having_terms: Predicate::new(),
            order: Vec::new(),
            limit_count: None,
            limit_offset: None,
            for_update: false,
            build_error: None,
        }
    }

    /// Create an empty SELECT using the stock MySQL quoter.
    pub fn mysql() -> Self {
        Self::new(Arc::new(MySqlDialect))
    }

    /// Bind a table: supplies the implicit `table.*` when no columns were
    /// declared, and tags hydrated rows.
    pub fn bind_table(mut self, table: Arc<dyn Table>) -> Self {
        self.table = Some(table);
        self
    }

    pub fn table(&self) -> Option<&Arc<dyn Table>> {
        self.table.as_ref()
    }

    pub fn quoter(&self) -> &Arc<dyn Quote> {
        &self.quoter
    }

    /// First recorded contract violation, if any.
    pub fn build_error(&self) -> Option<&str> {
        self.build_error.as_deref()
    }

    fn fail(&mut self, message: impl Into<String>) {
        if self.build_error.is_none() {
            self.build_error = Some(message.into());
        }
    }

    // ==================== SELECT modifiers ====================

    /// Toggle `SELECT DISTINCT`.
    pub fn distinct(mut self, flag: bool) -> Self {
        self.distinct = flag;
        self
    }

    /// Toggle `FOR UPDATE`.
    pub fn for_update(mut self, flag: bool) -> Self {
        self.for_update = flag;
        self
    }

    // ==================== FROM / JOIN ====================

    /// Add a FROM table selecting `correlation.*`.
    pub fn from(self, name: impl Into<TableRef>) -> Self {
        self.from_cols(name, ["*"])
    }

    /// Add a FROM table with explicit columns.
    pub fn from_cols<I, C>(self, name: impl Into<TableRef>, cols: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Column>,
    {
        self.join_with(JoinType::From, name, None, cols, None)
    }

    /// Add INNER JOIN.
    pub fn join_inner<I, C>(self, name: impl Into<TableRef>, cond: &str, cols: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Column>,
    {
        self.join_with(JoinType::Inner, name, Some(cond), cols, None)
    }

    /// Add LEFT JOIN.
    pub fn join_left<I, C>(self, name: impl Into<TableRef>, cond: &str, cols: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Column>,
    {
        self.join_with(JoinType::Left, name, Some(cond), cols, None)
    }

    /// Add RIGHT JOIN.
    pub fn join_right<I, C>(self, name: impl Into<TableRef>, cond: &str, cols: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Column>,
    {
        self.join_with(JoinType::Right, name, Some(cond), cols, None)
    }

    /// Add FULL JOIN.
    pub fn join_full<I, C>(self, name: impl Into<TableRef>, cond: &str, cols: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Column>,
    {
        self.join_with(JoinType::Full, name, Some(cond), cols, None)
    }

    /// Add STRAIGHT_JOIN.
    pub fn join_straight<I, C>(self, name: impl Into<TableRef>, cond: &str, cols: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Column>,
    {
        self.join_with(JoinType::Straight, name, Some(cond), cols, None)
    }

    /// Add CROSS JOIN.
    pub fn join_cross<I, C>(self, name: impl Into<TableRef>, cols: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Column>,
    {
        self.join_with(JoinType::Cross, name, None, cols, None)
    }

    /// Add NATURAL JOIN.
    pub fn join_natural<I, C>(self, name: impl Into<TableRef>, cols: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Column>,
    {
        self.join_with(JoinType::Natural, name, None, cols, None)
    }

    /// General form of every FROM / JOIN method.
    ///
    /// A schema embedded in `name` (`"shop.orders"`) overrides `schema`.
    /// FROM entries are kept ahead of JOIN entries whatever the call order.
    pub fn join_with<I, C>(
        mut self,
        join_type: JoinType,
        name: impl Into<TableRef>,
        cond: Option<&str>,
        cols: I,
        schema: Option<&str>,
    ) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Column>,
    {
        let cols = cols.into_iter().map(Into::into).collect();
        if let Err(message) = self.add_join(join_type, name.into(), cond, cols, schema) {
            self.fail(message);
        }
        self
    }

    /// Join on a column shared with the first FROM table:
    /// `` `new`.`col` = `first`.`col` ``.
    pub fn join_using<I, C>(
        mut self,
        join_type: JoinType,
        name: impl Into<TableRef>,
        column: &str,
        cols: I,
    ) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Column>,
    {
        if matches!(
            join_type,
            JoinType::From | JoinType::Cross | JoinType::Natural
        ) {
            self.fail(format!(
                "join_using is not valid for {}",
                join_type.keyword()
            ));
            return self;
        }
        let Some(first) = self.from.first().map(|e| e.correlation.clone()) else {
            self.fail("join_using requires a FROM table");
            return self;
        };
        let name = name.into();
        let Some((joined, _)) = self.correlation_for(&name) else {
            self.fail("join_using requires a table name");
            return self;
        };
        let cond = format!(
            "{} = {}",
            self.quoter.quote_identifier(&format!("{joined}.{column}"), true),
            self.quoter.quote_identifier(&format!("{first}.{column}"), true),
        );
        self.join_with(join_type, name, Some(&cond), cols, None)
    }

    fn add_join(
        &mut self,
        join_type: JoinType,
        name: TableRef,
        cond: Option<&str>,
        cols: Vec<Column>,
        schema: Option<&str>,
    ) -> Result<(), String> {
        if !self.union.is_empty() {
            return Err(format!(
                "cannot add a table to a statement that already has a {} part",
                ClausePart::Union
            ));
        }

        let prefix = self
            .from
            .iter()
            .take_while(|e| e.join_type == JoinType::From)
            .count();
        let placement = if join_type == JoinType::From {
            Placement::AfterAny(
                self.from[..prefix]
                    .iter()
                    .map(|e| e.correlation.clone())
                    .collect(),
            )
        } else {
            Placement::Append
        };

        let Some((correlation, explicit)) = self.correlation_for(&name) else {
            self.add_columns("", cols, placement);
            return Ok(());
        };
        if explicit && self.from.iter().any(|e| e.correlation == correlation) {
            return Err(format!(
                "correlation name '{correlation}' is defined more than once"
            ));
        }

        let mut schema = schema.map(str::to_string);
        let table = match name {
            TableRef::Aliased { source, .. } => source,
            TableRef::Source(TableSource::Name(n)) => {
                let n = n.trim();
                let bare = match alias_re().captures(n) {
                    Some(caps) => caps[1].trim().to_string(),
                    None => n.to_string(),
                };
                TableSource::Name(bare)
            }
            TableRef::Source(other) => other,
        };
        let table = match table {
            TableSource::Name(n) => match n.split_once('.') {
                Some((s, t)) => {
                    schema = Some(s.to_string());
                    TableSource::Name(t.to_string())
                }
                None => TableSource::Name(n),
            },
            other => other,
        };

        let condition = if join_type.takes_condition() && join_type != JoinType::From {
            cond.map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
        } else {
            None
        };

        let entry = FromEntry {
            correlation: correlation.clone(),
            join_type,
            schema,
            table,
            condition,
            index_hints: Vec::new(),
        };
        if join_type == JoinType::From {
            self.from.insert(prefix, entry);
        } else {
            self.from.push(entry);
        }

        self.add_columns(&correlation, cols, placement);
        Ok(())
    }

    /// Correlation name for a table argument, and whether the caller gave it
    /// explicitly. `None` for an empty table name.
    fn correlation_for(&self, name: &TableRef) -> Option<(String, bool)> {
        match name {
            TableRef::Aliased { alias, .. } => Some((alias.trim().to_string(), true)),
            TableRef::Source(TableSource::Name(n)) => {
                let n = n.trim();
                if n.is_empty() {
                    return None;
                }
                match alias_re().captures(n) {
                    Some(caps) => Some((caps[2].trim().to_string(), true)),
                    None => Some((self.unique_correlation(n), false)),
                }
            }
            TableRef::Source(_) => Some((self.unique_correlation("t"), false)),
        }
    }

    fn unique_correlation(&self, name: &str) -> String {
        let base = name.rsplit('.').next().unwrap_or(name);
        let mut candidate = base.to_string();
        let mut suffix = 2;
        while self.from.iter().any(|e| e.correlation == candidate) {
            candidate = format!("{base}_{suffix}");
            suffix += 1;
        }
        candidate
    }

    // ==================== Columns ====================

    /// Add columns for the first FROM table.
    pub fn columns<I, C>(mut self, cols: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Column>,
    {
        let Some(correlation) = self.from.first().map(|e| e.correlation.clone()) else {
            self.fail("no table has been specified for the FROM clause");
            return self;
        };
        let cols = cols.into_iter().map(Into::into).collect();
        self.add_columns(&correlation, cols, Placement::Append);
        self
    }

    /// Add columns for `correlation`, spliced right after its existing ones.
    pub fn columns_for<I, C>(mut self, cols: I, correlation: &str) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Column>,
    {
        if !self.from.iter().any(|e| e.correlation == correlation) {
            self.fail(format!(
                "no table `{correlation}` has been specified for the FROM clause"
            ));
            return self;
        }
        let cols = cols.into_iter().map(Into::into).collect();
        self.add_columns(
            correlation,
            cols,
            Placement::After(correlation.to_string()),
        );
        self
    }

    fn add_columns(&mut self, correlation: &str, cols: Vec<Column>, placement: Placement) {
        let entries: Vec<ColumnEntry> = cols
            .into_iter()
            .filter_map(|col| parse_column(correlation, col))
            .collect();
        if entries.is_empty() {
            return;
        }

        let at = match placement {
            Placement::Append => self.columns.len(),
            Placement::AfterAny(correlations) => self
                .columns
                .iter()
                .rposition(|c| correlations.contains(&c.correlation))
                .map_or(0, |idx| idx + 1),
            Placement::After(correlation) => self
                .columns
                .iter()
                .rposition(|c| c.correlation == correlation)
                .map_or(self.columns.len(), |idx| idx + 1),
        };
        self.columns.splice(at..at, entries);
    }

    // ==================== UNION ====================

    /// Combine other selects (or raw SQL) with UNION / UNION ALL.
    pub fn union<I, M>(mut self, members: I, union_type: UnionType) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<UnionMember>,
    {
        if !self.from.is_empty() || !self.where_terms.is_empty() {
            self.fail(format!(
                "cannot add a {} part to a statement that already has a {} or {} part",
                ClausePart::Union,
                ClausePart::From,
                ClausePart::Where
            ));
            return self;
        }
        self.union
            .extend(members.into_iter().map(|m| (m.into(), union_type)));
        self
    }

    // ==================== WHERE / HAVING ====================

    /// Add an AND-connected WHERE condition.
    pub fn and_where(self, cond: impl Into<Cond>) -> Self {
        self.push_where(Connective::And, cond.into())
    }

    /// Add an OR-connected WHERE condition.
    pub fn or_where(self, cond: impl Into<Cond>) -> Self {
        self.push_where(Connective::Or, cond.into())
    }

    fn push_where(mut self, connective: Connective, cond: Cond) -> Self {
        if !self.union.is_empty() {
            self.fail(format!(
                "cannot add a {} condition to a statement with a {} part",
                ClausePart::Where,
                ClausePart::Union
            ));
            return self;
        }
        let sql = cond.render(self.quoter.as_ref());
        self.where_terms.push(connective, &sql);
        self
    }

    /// Add an AND-connected HAVING condition.
    pub fn and_having(mut self, cond: impl Into<Cond>) -> Self {
        let sql = cond.into().render(self.quoter.as_ref());
        self.having_terms.push(Connective::And, &sql);
        self
    }

    /// Add an OR-connected HAVING condition.
    pub fn or_having(mut self, cond: impl Into<Cond>) -> Self {
        let sql = cond.into().render(self.quoter.as_ref());
        self.having_terms.push(Connective::Or, &sql);
        self
    }

    // ==================== GROUP / ORDER ====================

    /// Add a GROUP BY term; parenthesized terms are kept verbatim.
    pub fn group_by(mut self, term: &str) -> Self {
        let term = term.trim();
        if !term.is_empty() {
            self.group.push(if looks_like_expr(term) {
                ColumnExpr::Expr(Expr::new(term))
            } else {
                ColumnExpr::Name(term.to_string())
            });
        }
        self
    }

    /// Add several GROUP BY terms.
    pub fn group_by_cols(self, terms: &[&str]) -> Self {
        terms.iter().fold(self, |select, term| select.group_by(term))
    }

    /// Add an ORDER BY term such as `"created_at DESC"`, `"2"` or
    /// `"FIELD(id, 3, 1)"`. Direction defaults to ASC.
    pub fn order_by(mut self, clause: &str) -> Self {
        let clause = clause.trim();
        if clause.is_empty() {
            return self;
        }
        let (term, direction) = match direction_re().captures(clause) {
            Some(caps) => {
                let direction = if caps[2].eq_ignore_ascii_case("DESC") {
                    Direction::Desc
                } else {
                    Direction::Asc
                };
                (caps[1].trim().to_string(), direction)
            }
            None => (clause.to_string(), Direction::Asc),
        };
        let expr = if looks_like_expr(&term) {
            OrderExpr::Expr(Expr::new(term))
        } else if let Ok(ordinal) = term.parse::<u64>() {
            OrderExpr::Ordinal(ordinal)
        } else {
            OrderExpr::Column(term)
        };
        self.order.push(OrderTerm { expr, direction });
        self
    }

    /// Add several ORDER BY terms.
    pub fn order_by_cols(self, clauses: &[&str]) -> Self {
        clauses.iter().fold(self, |select, clause| select.order_by(clause))
    }

    /// Order by a raw expression.
    pub fn order_expr(mut self, expr: Expr, direction: Direction) -> Self {
        self.order.push(OrderTerm {
            expr: OrderExpr::Expr(expr),
            direction,
        });
        self
    }

    // ==================== LIMIT ====================

    /// Set the row count; 0 clears it.
    pub fn limit(mut self, count: u64) -> Self {
        self.limit_count = Some(count);
        self
    }

    /// Set the offset.
    pub fn offset(mut self, offset: u64) -> Self {
        self.limit_offset = Some(offset);
        self
    }

    /// Set count and offset together.
    pub fn limit_offset(self, count: u64, offset: u64) -> Self {
        self.limit(count).offset(offset)
    }

    /// Page-based limit (1-based page; both arguments clamped to at least 1).
    pub fn limit_page(self, page: u64, rows_per_page: u64) -> Self {
        let page = page.max(1);
        let rows = rows_per_page.max(1);
        self.limit_offset(rows, rows.saturating_mul(page - 1))
    }

    // ==================== Index hints ====================

    /// `FORCE INDEX` on `correlation` (default: the first FROM table).
    pub fn force_index(
        self,
        indexes: &[&str],
        for_clause: Option<&str>,
        correlation: Option<&str>,
    ) -> Self {
        self.index_hint("FORCE", indexes, for_clause, correlation)
    }

    /// `USE INDEX` on `correlation` (default: the first FROM table).
    pub fn use_index(
        self,
        indexes: &[&str],
        for_clause: Option<&str>,
        correlation: Option<&str>,
    ) -> Self {
        self.index_hint("USE", indexes, for_clause, correlation)
    }

    /// `IGNORE INDEX` on `correlation` (default: the first FROM table).
    pub fn ignore_index(
        self,
        indexes: &[&str],
        for_clause: Option<&str>,
        correlation: Option<&str>,
    ) -> Self {
        self.index_hint("IGNORE", indexes, for_clause, correlation)
    }

    fn index_hint(
        mut self,
        kind: &str,
        indexes: &[&str],
        for_clause: Option<&str>,
        correlation: Option<&str>,
    ) -> Self {
        if indexes.is_empty() {
            self.fail(format!("{kind} INDEX needs at least one index name"));
            return self;
        }
        let mut hint = format!("{kind} INDEX");
        if let Some(clause) = for_clause.map(str::trim).filter(|c| !c.is_empty()) {
            hint.push_str(" FOR ");
            hint.push_str(&clause.to_ascii_uppercase());
        }
        hint.push_str(&format!(" ({})", indexes.join(",")));

        let target = match correlation {
            Some(c) => self.from.iter_mut().find(|e| e.correlation == c),
            None => self.from.first_mut(),
        };
        let applied = match target {
            Some(entry) => {
                entry.index_hints.push(hint);
                true
            }
            None => false,
        };
        if !applied {
            self.fail(format!(
                "{kind} INDEX refers to an unknown table '{}'",
                correlation.unwrap_or("<first FROM table>")
            ));
        }
        self
    }

    // ==================== Parts ====================

    /// Clear every part.
    pub fn reset(self) -> Self {
        let mut fresh = Self::new(self.quoter);
        fresh.table = self.table;
        fresh
    }

    /// Clear one part.
    pub fn reset_part(mut self, part: ClausePart) -> Self {
        match part {
            ClausePart::Distinct => self.distinct = false,
            ClausePart::Columns => self.columns.clear(),
            ClausePart::From => self.from.clear(),
            ClausePart::Union => self.union.clear(),
            ClausePart::Where => self.where_terms.clear(),
            ClausePart::Group => self.group.clear(),
            ClausePart::Having => self.having_terms.clear(),
            ClausePart::Order => self.order.clear(),
            ClausePart::LimitCount => self.limit_count = None,
            ClausePart::LimitOffset => self.limit_offset = None,
            ClausePart::ForUpdate => self.for_update = false,
        }
        self
    }

    /// Read-only view of one part.
    pub fn part(&self, part: ClausePart) -> PartRef<'_> {
        match part {
            ClausePart::Distinct => PartRef::Flag(self.distinct),
            ClausePart::Columns => PartRef::Columns(&self.columns),
            ClausePart::From => PartRef::From(&self.from),
            ClausePart::Union => PartRef::Union(&self.union),
            ClausePart::Where => PartRef::Predicates(self.where_terms.terms()),
            ClausePart::Group => PartRef::Group(&self.group),
            ClausePart::Having => PartRef::Predicates(self.having_terms.terms()),
            ClausePart::Order => PartRef::Order(&self.order),
            ClausePart::LimitCount => PartRef::Count(self.limit_count),
            ClausePart::LimitOffset => PartRef::Count(self.limit_offset),
            ClausePart::ForUpdate => PartRef::Flag(self.for_update),
        }
    }

    /// Like [`Select::part`], by name (`"where"`, `"limitcount"`, ...).
    pub fn part_by_name(&self, name: &str) -> DbResult<PartRef<'_>> {
        Ok(self.part(name.parse::<ClausePart>()?))
    }

    /// Whether rows produced by this select can be written back: false as
    /// soon as an unaliased expression is selected.
    pub fn is_read_only(&self) -> bool {
        self.columns
            .iter()
            .any(|c| c.alias.is_none() && matches!(c.column, ColumnExpr::Expr(_)))
    }

    /// Hydration context for rows of this select.
    pub fn origin(&self) -> RowOrigin {
        RowOrigin {
            read_only: self.is_read_only(),
            table: self.table.clone(),
        }
    }

    // ==================== Rendering ====================

    fn with_table_wildcard(mut self, table: Arc<dyn Table>) -> Self {
        let info = table.info();
        let existing = self
            .from
            .iter()
            .find(|e| {
                matches!(&e.table, TableSource::Name(n) if *n == info.name)
                    && (info.schema.is_none() || e.schema == info.schema)
            })
            .map(|e| e.correlation.clone());
        match existing {
            Some(correlation) => {
                self.columns.push(ColumnEntry {
                    correlation,
                    column: ColumnExpr::Name("*".to_string()),
                    alias: None,
                });
                self
            }
            None => self.join_with(
                JoinType::From,
                info.name.as_str(),
                None,
                ["*"],
                info.schema.as_deref(),
            ),
        }
    }

    fn render(&self) -> DbResult<String> {
        if let Some(err) = &self.build_error {
            return Err(DbError::malformed(err.clone()));
        }

        let mut sql = if self.union.is_empty() {
            let mut head = String::from("SELECT");
            if self.distinct {
                head.push_str(" DISTINCT");
            }
            head.push(' ');
            head.push_str(&self.render_columns()?);
            if !self.from.is_empty() {
                head.push_str(" FROM ");
                head.push_str(&self.render_from()?);
            }
            head
        } else {
            self.render_union()?
        };

        if !self.where_terms.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.where_terms.render());
        }
        if !self.from.is_empty() {
            if !self.group.is_empty() {
                let terms: Vec<String> = self
                    .group
                    .iter()
                    .map(|g| match g {
                        ColumnExpr::Name(n) => self.quoter.quote_identifier(n, true),
                        ColumnExpr::Expr(e) => e.to_string(),
                    })
                    .collect();
                sql.push_str(" GROUP BY ");
                sql.push_str(&terms.join(", "));
            }
            if !self.having_terms.is_empty() {
                sql.push_str(" HAVING ");
                sql.push_str(&self.having_terms.render());
            }
        }
        if !self.order.is_empty() {
            let terms: Vec<String> = self
                .order
                .iter()
                .map(|o| {
                    let term = match &o.expr {
                        OrderExpr::Column(c) => self.quoter.quote_identifier(c, true),
                        OrderExpr::Ordinal(n) => n.to_string(),
                        OrderExpr::Expr(e) => e.to_string(),
                    };
                    format!("{term} {}", o.direction.keyword())
                })
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms.join(", "));
        }

        let offset = self.limit_offset.unwrap_or(0);
        let count = match self.limit_count.unwrap_or(0) {
            0 if offset > 0 => MAX_LIMIT_COUNT,
            n => n,
        };
        if count > 0 {
            sql.push_str(&format!(" LIMIT {count}"));
            if offset > 0 {
                sql.push_str(&format!(" OFFSET {offset}"));
            }
        }

        if self.for_update {
            sql.push_str(" FOR UPDATE");
        }
        Ok(sql)
    }

    fn render_columns(&self) -> DbResult<String> {
        if self.columns.is_empty() {
            return Err(DbError::malformed("no columns selected"));
        }
        let rendered: Vec<String> = self
            .columns
            .iter()
            .map(|c| match &c.column {
                ColumnExpr::Expr(e) => match &c.alias {
                    Some(alias) => {
                        format!("{e} AS {}", self.quoter.quote_identifier(alias, true))
                    }
                    None => e.to_string(),
                },
                ColumnExpr::Name(n) if n == "*" => {
                    if c.correlation.is_empty() {
                        "*".to_string()
                    } else {
                        format!("{}.*", self.quoter.quote_identifier(&c.correlation, true))
                    }
                }
                ColumnExpr::Name(n) => {
                    let full = if c.correlation.is_empty() {
                        n.clone()
                    } else {
                        format!("{}.{n}", c.correlation)
                    };
                    self.quoter.quote_column_as(&full, c.alias.as_deref())
                }
            })
            .collect();
        Ok(rendered.join(", "))
    }

    fn render_from(&self) -> DbResult<String> {
        let mut pieces = Vec::with_capacity(self.from.len());
        for (i, entry) in self.from.iter().enumerate() {
            let mut piece = String::new();
            if i > 0 {
                piece.push_str(entry.join_type.keyword());
                piece.push(' ');
            }
            piece.push_str(&self.render_table(entry)?);
            for hint in &entry.index_hints {
                piece.push(' ');
                piece.push_str(hint);
            }
            if i > 0 {
                if let Some(cond) = &entry.condition {
                    piece.push_str(" ON ");
                    piece.push_str(cond);
                }
            }
            pieces.push(piece);
        }
        Ok(pieces.join(" "))
    }

    fn render_table(&self, entry: &FromEntry) -> DbResult<String> {
        let alias = self.quoter.quote_identifier(&entry.correlation, true);
        Ok(match &entry.table {
            TableSource::Name(name) => {
                let table = self
                    .quoter
                    .quote_table_as(name, Some(&entry.correlation));
                match &entry.schema {
                    Some(schema) => {
                        format!("{}.{table}", self.quoter.quote_identifier(schema, true))
                    }
                    None => table,
                }
            }
            TableSource::Expr(e) => format!("{e} AS {alias}"),
            TableSource::Subquery(select) => format!("({}) AS {alias}", select.assemble()?),
        })
    }

    fn render_union(&self) -> DbResult<String> {
        let mut sql = String::new();
        let last = self.union.len().saturating_sub(1);
        for (i, (member, union_type)) in self.union.iter().enumerate() {
            match member {
                UnionMember::Select(select) => sql.push_str(&select.assemble()?),
                UnionMember::Sql(text) => sql.push_str(text),
            }
            if i < last {
                sql.push(' ');
                sql.push_str(union_type.keyword());
                sql.push(' ');
            }
        }
        Ok(sql)
    }
}

fn parse_column(correlation: &str, col: Column) -> Option<ColumnEntry> {
    match col {
        Column::Aliased { alias, column } => parse_column(correlation, *column).map(|mut entry| {
            let alias = alias.trim();
            if !alias.is_empty() {
                entry.alias = Some(alias.to_string());
            }
            entry
        }),
        Column::Expr(expr) => Some(ColumnEntry {
            correlation: correlation.to_string(),
            column: ColumnExpr::Expr(expr),
            alias: None,
        }),
        Column::Token(token) => {
            let token = token.trim();
            if token.is_empty() {
                return None;
            }
            let (body, alias) = match alias_re().captures(token) {
                Some(caps) => (
                    caps.get(1).map_or("", |m| m.as_str()).trim(),
                    Some(caps[2].trim().to_string()),
                ),
                None => (token, None),
            };
            let mut correlation = correlation.to_string();
            let column = if looks_like_expr(body) {
                ColumnExpr::Expr(Expr::new(body))
            } else {
                match body.rsplit_once('.') {
                    Some((c, name)) if !c.is_empty() && !name.is_empty() => {
                        correlation = c.to_string();
                        ColumnExpr::Name(name.to_string())
                    }
                    _ => ColumnExpr::Name(body.to_string()),
                }
            };
            Some(ColumnEntry {
                correlation,
                column,
                alias,
            })
        }
    }
}

impl Assemble for Select {
    fn assemble(&self) -> DbResult<String> {
        if self.build_error.is_none() && self.columns.is_empty() && self.union.is_empty() {
            if let Some(table) = &self.table {
                return self.clone().with_table_wildcard(Arc::clone(table)).render();
            }
        }
        self.render()
    }

    fn kind(&self) -> StatementKind {
        StatementKind::Select
    }

    fn origin(&self) -> RowOrigin {
        Select::origin(self)
    }
}

impl fmt::Debug for Select {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Select")
            .field("table", &self.table)
            .field("distinct", &self.distinct)
            .field("columns", &self.columns)
            .field("from", &self.from)
            .field("union", &self.union)
            .field("where", &self.where_terms)
            .field("group", &self.group)
            .field("having", &self.having_terms)
            .field("order", &self.order)
            .field("limit_count", &self.limit_count)
            .field("limit_offset", &self.limit_offset)
            .field("for_update", &self.for_update)
            .field("build_error", &self.build_error)
            .finish()
    }
}
