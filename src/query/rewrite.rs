use sqlparser::ast::{BinaryOperator, Expr, Ident, SelectItem, SetExpr, Statement, TableFactor};
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;

use crate::analyzer::table_registry::TableRegistry;
use crate::error::{Error, Result};
use crate::parser::expr::object_name_tail;
use crate::parser::sql_parser::parse_statements;

/// Which visibility restrictions the store applies to a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Restrictions {
    /// Skip soft-deleted rows.
    pub deleted: bool,
    /// Skip hidden rows.
    pub hidden: bool,
    /// Skip rows whose start time is in the future.
    pub start_time: bool,
    /// Skip rows whose end time has passed.
    pub end_time: bool,
}

impl Default for Restrictions {
    fn default() -> Self {
        Self::all()
    }
}

impl Restrictions {
    /// Every restriction active, as for a frontend render.
    pub fn all() -> Self {
        Self {
            deleted: true,
            hidden: true,
            start_time: true,
            end_time: true,
        }
    }

    /// No restriction active.
    pub fn none() -> Self {
        Self {
            deleted: false,
            hidden: false,
            start_time: false,
            end_time: false,
        }
    }
}

/// A table of the FROM list or a JOIN, with the name it is referred to by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueriedTable {
    /// Alias, or the table name when unaliased.
    pub alias: String,
    /// Table name.
    pub table: String,
}

impl QueriedTable {
    /// Describe a table referenced under `alias`.
    pub fn new(alias: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            table: table.into(),
        }
    }
}

/// An extra `alias.column AS name` projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperProjection {
    /// Alias of the table the column belongs to.
    pub table_alias: String,
    /// Column to select.
    pub column: String,
    /// Name of the projected column.
    pub name: String,
}

/// A `SELECT` as built by the application, before the store's restrictions
/// are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    /// Statement text without restriction predicates.
    pub statement: String,
    /// Tables the statement reads.
    pub tables: Vec<QueriedTable>,
    /// Restrictions the store applies.
    pub restrictions: Restrictions,
}

/// Seconds the restriction time is rounded down to.
pub const ACCESS_TIME_GRANULARITY: i64 = 60;

/// `now` rounded down to the minute. Statements prepared within the same
/// minute render to the same text and share one analysis cache entry.
pub fn access_time(now: i64) -> i64 {
    now - now.rem_euclid(ACCESS_TIME_GRANULARITY)
}

impl QueryPlan {
    /// Plan with explicit queried tables and every restriction active.
    pub fn new(statement: impl Into<String>, tables: Vec<QueriedTable>) -> Self {
        Self {
            statement: statement.into(),
            tables,
            restrictions: Restrictions::all(),
        }
    }

    /// Plan whose queried tables are read from the FROM list and JOINs of
    /// `statement`.
    pub fn parse(statement: impl Into<String>) -> Result<Self> {
        let statement = statement.into();
        let parsed = single_select(&statement)?;
        let mut tables = Vec::new();
        if let Statement::Query(query) = &parsed {
            if let SetExpr::Select(select) = query.body.as_ref() {
                for from in &select.from {
                    let relations = std::iter::once(&from.relation)
                        .chain(from.joins.iter().map(|j| &j.relation));
                    for relation in relations {
                        if let TableFactor::Table { name, alias, .. } = relation {
                            let Some(table) = object_name_tail(name) else {
                                continue;
                            };
                            let alias = alias
                                .as_ref()
                                .map_or_else(|| table.clone(), |alias| alias.name.value.clone());
                            tables.push(QueriedTable { alias, table });
                        }
                    }
                }
            }
        }
        Ok(Self::new(statement, tables))
    }

    /// Replace the active restrictions.
    pub fn with_restrictions(mut self, restrictions: Restrictions) -> Self {
        self.restrictions = restrictions;
        self
    }

    /// Restriction predicates for every queried table known to `registry`.
    ///
    /// The start-time predicate is only emitted when `include_start_time` is
    /// set, so the executed query can leave it to the row filter.
    pub fn restriction_predicates(
        &self,
        registry: &TableRegistry,
        now: i64,
        include_start_time: bool,
    ) -> Vec<String> {
        let mut predicates = Vec::new();
        for QueriedTable { alias, table } in &self.tables {
            let Some(definition) = registry.get(table) else {
                continue;
            };
            let columns = &definition.enable_columns;
            if self.restrictions.deleted {
                if let Some(deleted) = &definition.delete {
                    predicates.push(format!("{} = 0", qualified(alias, deleted)));
                }
            }
            if self.restrictions.hidden {
                if let Some(hidden) = &columns.disabled {
                    predicates.push(format!("{} = 0", qualified(alias, hidden)));
                }
            }
            if self.restrictions.start_time && include_start_time {
                if let Some(starttime) = &columns.starttime {
                    predicates.push(format!("{} <= {now}", qualified(alias, starttime)));
                }
            }
            if self.restrictions.end_time {
                if let Some(endtime) = &columns.endtime {
                    let column = qualified(alias, endtime);
                    predicates.push(format!("(({column} = 0) OR ({column} > {now}))"));
                }
            }
        }
        predicates
    }

    /// Render the statement with `helpers` appended to the projection and the
    /// restriction predicates ANDed into the WHERE clause.
    pub fn render(
        &self,
        registry: &TableRegistry,
        now: i64,
        helpers: &[HelperProjection],
        include_start_time: bool,
    ) -> Result<String> {
        let mut statement = single_select(&self.statement)?;
        let predicates = self.restriction_predicates(registry, now, include_start_time);
        let restriction = if predicates.is_empty() {
            None
        } else {
            let text = predicates
                .iter()
                .map(|p| format!("({p})"))
                .collect::<Vec<_>>()
                .join(" AND ");
            Some(parse_predicate(&self.statement, &text)?)
        };

        if let Statement::Query(query) = &mut statement {
            if let SetExpr::Select(select) = query.body.as_mut() {
                for helper in helpers {
                    select.projection.push(SelectItem::ExprWithAlias {
                        expr: Expr::CompoundIdentifier(vec![
                            Ident::with_quote('`', helper.table_alias.as_str()),
                            Ident::with_quote('`', helper.column.as_str()),
                        ]),
                        alias: Ident::with_quote('`', helper.name.as_str()),
                    });
                }
                if let Some(restriction) = restriction {
                    select.selection = Some(match select.selection.take() {
                        Some(existing) => Expr::BinaryOp {
                            left: Box::new(Expr::Nested(Box::new(existing))),
                            op: BinaryOperator::And,
                            right: Box::new(Expr::Nested(Box::new(restriction))),
                        },
                        None => restriction,
                    });
                }
            }
        }
        Ok(statement.to_string())
    }
}

fn qualified(alias: &str, column: &str) -> String {
    format!("`{alias}`.`{column}`")
}

fn single_select(sql: &str) -> Result<Statement> {
    let mut statements = parse_statements(sql)?;
    if statements.len() != 1 {
        return Err(Error::unsupported(sql, "expected exactly one statement"));
    }
    let statement = statements.remove(0);
    match &statement {
        Statement::Query(query) if matches!(query.body.as_ref(), SetExpr::Select(_)) => {
            Ok(statement)
        }
        _ => Err(Error::unsupported(sql, "only a plain SELECT can be rewritten")),
    }
}

fn parse_predicate(sql: &str, predicate: &str) -> Result<Expr> {
    Parser::new(&MySqlDialect {})
        .try_with_sql(predicate)
        .and_then(|mut parser| parser.parse_expr())
        .map_err(|e| Error::unsupported(sql, format!("restriction predicate: {e}")))
}
