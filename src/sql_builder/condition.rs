use crate::error::SqlClusterError;
use crate::types::{ConditionValue, RowValues};

use super::escape::{escape_string, quote_column};
use super::where_clause::placeholders;

/// Row cap applied when the caller never sets a limit.
pub const DEFAULT_LIMIT: i64 = 300;

/// Sort direction for an ORDER BY term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    fn as_sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// What a built condition will be used for, for [`SqlCondition::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildKind {
    /// SELECT / COUNT
    Read,
    /// UPDATE / DELETE
    Mutating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Like,
    NotLike,
    In,
    NotIn,
}

impl Comparator {
    /// Unrecognized or blank comparators fall back to equality.
    fn parse(op: &str) -> Self {
        match op.trim().to_ascii_uppercase().as_str() {
            "!=" | "<>" => Self::Ne,
            ">" => Self::Gt,
            ">=" => Self::Ge,
            "<" => Self::Lt,
            "<=" => Self::Le,
            "LIKE" => Self::Like,
            "NOT LIKE" => Self::NotLike,
            "IN" => Self::In,
            "NOT IN" => Self::NotIn,
            _ => Self::Eq,
        }
    }

    fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
        }
    }
}

#[derive(Debug, Clone)]
enum Term {
    Compare {
        column: String,
        op: Comparator,
        value: ConditionValue,
    },
    Fragment {
        sql: String,
        values: Vec<RowValues>,
    },
}

/// Fluent WHERE / ORDER BY / LIMIT builder.
///
/// The builder is not consumed by [`build`](Self::build), so one set of
/// conditions can be rendered against several shard tables:
/// ```rust
/// use sql_cluster::prelude::*;
///
/// let cond = SqlCondition::new("orders_")
///     .with_condition("age", ">", 18)
///     .with_limit(10);
/// let built = cond.build("07");
/// assert_eq!(built.table, "orders_07");
/// assert_eq!(built.clause, " WHERE `age` > ? LIMIT ?");
/// assert_eq!(built.values, vec![RowValues::Int(18), RowValues::Int(10)]);
/// ```
#[derive(Debug, Clone)]
pub struct SqlCondition {
    table: String,
    terms: Vec<Term>,
    orders: Vec<(String, Direction)>,
    limit: i64,
    offset: i64,
}

/// Output of [`SqlCondition::build`].
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltCondition {
    /// Escaped table name (prefix + shard suffix), without backticks
    pub table: String,
    /// Clause text beginning with a space, or empty
    pub clause: String,
    /// Parameters for `clause`, in placeholder order
    pub values: Vec<RowValues>,
}

impl BuiltCondition {
    /// The table name wrapped in backticks.
    #[must_use]
    pub fn quoted_table(&self) -> String {
        format!("`{}`", self.table)
    }
}

impl SqlCondition {
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            terms: Vec::new(),
            orders: Vec::new(),
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }

    /// Add `column <op> value`.
    ///
    /// # Arguments
    ///
    /// * `column` - Column name, backtick-quoted when rendered
    /// * `op` - Comparison operator such as `=`, `>=` or `LIKE`
    /// * `value` - A scalar binds one placeholder; a list renders as
    ///   `IN (...)`, or `NOT IN` when `op` is a negation
    ///
    /// # Returns
    ///
    /// The condition with the term appended
    #[must_use]
    pub fn with_condition(
        mut self,
        column: impl Into<String>,
        op: &str,
        value: impl Into<ConditionValue>,
    ) -> Self {
        self.terms.push(Term::Compare {
            column: column.into(),
            op: Comparator::parse(op),
            value: value.into(),
        });
        self
    }

    /// Add a pre-rendered predicate with its own parameters, ANDed with the
    /// other conditions. Blank fragments are ignored.
    #[must_use]
    pub fn with_fragment(mut self, sql: impl Into<String>, values: Vec<RowValues>) -> Self {
        let sql = sql.into();
        if !sql.trim().is_empty() {
            self.terms.push(Term::Fragment { sql, values });
        }
        self
    }

    #[must_use]
    pub fn with_order(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.orders.push((column.into(), direction));
        self
    }

    /// Override the default limit. Negative values are ignored; `0` disables
    /// the LIMIT clause.
    #[must_use]
    pub fn with_limit(mut self, limit: i64) -> Self {
        if limit >= 0 {
            self.limit = limit;
        }
        self
    }

    /// Offset is emitted only when both it and the limit are positive.
    #[must_use]
    pub fn with_offset(mut self, offset: i64) -> Self {
        if offset >= 0 {
            self.offset = offset;
        }
        self
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn limit(&self) -> i64 {
        self.limit
    }

    #[must_use]
    pub fn offset(&self) -> i64 {
        self.offset
    }

    #[must_use]
    pub fn has_conditions(&self) -> bool {
        !self.terms.is_empty()
    }

    /// Reject statements that would touch the whole table.
    ///
    /// # Errors
    /// Returns `SqlClusterError::UnsafeStatement` for a mutating build without
    /// conditions, or a read build with neither conditions nor a limit.
    pub fn validate(&self, kind: BuildKind) -> Result<(), SqlClusterError> {
        if self.has_conditions() {
            return Ok(());
        }
        match kind {
            BuildKind::Mutating => Err(SqlClusterError::UnsafeStatement(format!(
                "refusing to modify every row of `{}`",
                self.table
            ))),
            BuildKind::Read if self.limit <= 0 => Err(SqlClusterError::UnsafeStatement(format!(
                "refusing to read every row of `{}` without a limit",
                self.table
            ))),
            BuildKind::Read => Ok(()),
        }
    }

    /// Render against `table + suffix`.
    #[must_use]
    pub fn build(&self, suffix: &str) -> BuiltCondition {
        let mut clause = String::new();
        let mut values = Vec::new();

        let mut rendered = Vec::with_capacity(self.terms.len());
        for term in &self.terms {
            rendered.push(render_term(term, &mut values));
        }
        if !rendered.is_empty() {
            clause.push_str(" WHERE ");
            clause.push_str(&rendered.join(" AND "));
        }

        if !self.orders.is_empty() {
            let orders: Vec<String> = self
                .orders
                .iter()
                .map(|(column, direction)| format!("{column} {}", direction.as_sql()))
                .collect();
            clause.push_str(" ORDER BY ");
            clause.push_str(&orders.join(","));
        }

        if self.limit > 0 {
            if self.offset > 0 {
                clause.push_str(" LIMIT ?,?");
                values.push(RowValues::Int(self.offset));
            } else {
                clause.push_str(" LIMIT ?");
            }
            values.push(RowValues::Int(self.limit));
        }

        BuiltCondition {
            table: escape_string(&format!("{}{suffix}", self.table)),
            clause,
            values,
        }
    }
}

fn render_term(term: &Term, values: &mut Vec<RowValues>) -> String {
    match term {
        Term::Fragment { sql, values: own } => {
            values.extend(own.iter().cloned());
            sql.clone()
        }
        Term::Compare { column, op, value } => {
            let column = quote_column(column);
            let (op, items) = match value {
                ConditionValue::Single(v) if !matches!(op, Comparator::In | Comparator::NotIn) => {
                    values.push(v.clone());
                    return format!("{column} {} ?", op.as_sql());
                }
                ConditionValue::Single(v) => (*op, std::slice::from_ref(v)),
                ConditionValue::List(list) => match op {
                    Comparator::Ne | Comparator::NotIn => (Comparator::NotIn, list.as_slice()),
                    _ => (Comparator::In, list.as_slice()),
                },
            };

            if items.is_empty() {
                let always = if op == Comparator::NotIn { "1=1" } else { "1=0" };
                return always.to_string();
            }
            values.extend(items.iter().cloned());
            format!("{column} {} ({})", op.as_sql(), placeholders(items.len()))
        }
    }
}
