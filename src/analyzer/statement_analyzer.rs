use std::sync::Arc;

use sqlparser::ast::{
    Expr, JoinConstraint, JoinOperator, Query, Select, SelectItem,
    SelectItemQualifiedWildcardKind, SetExpr, Statement, TableFactor, TableWithJoins, Visit,
};
use tracing::debug;

use crate::analyzer::dependency::{is_relation_field, DependencyFact, UID_FIELD};
use crate::analyzer::scope::QueryScope;
use crate::cache::analysis_cache::{get_json, set_json, statement_key};
use crate::cache::AnalysisCache;
use crate::error::{Error, Result};
use crate::parser::expr::{collect_column_references, column_reference, object_name_tail};
use crate::parser::schema::SchemaSnapshot;
use crate::parser::sql_parser::parse_statements;

/// Infers what a `SELECT` depends on from its text alone.
///
/// Results are stored in the analysis cache keyed by the statement text, so
/// each distinct statement is parsed at most once per cache lifetime.
pub struct StatementAnalyzer {
    schema: Arc<SchemaSnapshot>,
    cache: Arc<dyn AnalysisCache>,
}

impl StatementAnalyzer {
    /// Create an analyzer over an immutable schema snapshot.
    pub fn new(schema: impl Into<Arc<SchemaSnapshot>>, cache: Arc<dyn AnalysisCache>) -> Self {
        Self {
            schema: schema.into(),
            cache,
        }
    }

    /// Schema the analyzer resolves field names against.
    pub fn schema(&self) -> &SchemaSnapshot {
        &self.schema
    }

    /// Analyze `sql`, serving repeated texts from the cache.
    ///
    /// `Ok(None)` means no main table could be identified and the statement
    /// is untracked; such results are not cached.
    pub fn analyze(&self, sql: &str) -> Result<Option<DependencyFact>> {
        let key = statement_key(sql);
        if let Some(fact) = get_json::<DependencyFact>(self.cache.as_ref(), &key)? {
            debug!(%key, main_table = fact.main_table(), "analysis cache hit");
            return Ok(Some(fact));
        }

        let fact = analyze_text(&self.schema, sql)?;
        match &fact {
            Some(fact) => {
                set_json(self.cache.as_ref(), &key, fact)?;
                debug!(
                    %key,
                    main_table = fact.main_table(),
                    fields = fact.conditional_fields().len(),
                    relational = fact.is_relational(),
                    "statement analyzed"
                );
            }
            None => debug!(%key, "statement has no main table, untracked"),
        }
        Ok(fact)
    }
}

impl std::fmt::Debug for StatementAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatementAnalyzer")
            .field("tables", &self.schema.len())
            .finish_non_exhaustive()
    }
}

/// Uncached analysis of every statement in `sql`.
pub fn analyze_text(schema: &SchemaSnapshot, sql: &str) -> Result<Option<DependencyFact>> {
    let statements = parse_statements(sql)?;
    let mut scope = QueryScope::new(schema);
    let mut fields: Vec<String> = Vec::new();
    let mut main_table: Option<String> = None;

    for statement in &statements {
        let Statement::Query(query) = statement else {
            return Err(Error::unsupported(sql, "not a SELECT statement"));
        };
        analyze_query(sql, query, &mut scope, &mut fields, &mut main_table)?;
    }

    let Some(main_table) = main_table else {
        return Ok(None);
    };
    let is_relational = scope.possible_tables().iter().any(|table| {
        fields.iter().any(|reference| {
            reference
                .strip_prefix(table.as_str())
                .and_then(|rest| rest.strip_prefix('.'))
                .is_some_and(is_relation_field)
        })
    });
    Ok(Some(DependencyFact::new(main_table, fields, is_relational)))
}

fn analyze_query(
    sql: &str,
    query: &Query,
    scope: &mut QueryScope<'_>,
    fields: &mut Vec<String>,
    main_table: &mut Option<String>,
) -> Result<()> {
    if query.with.is_some() {
        return Err(Error::unsupported(sql, "common table expressions"));
    }
    let select: &Select = match query.body.as_ref() {
        SetExpr::Select(select) => select,
        SetExpr::SetOperation { .. } => {
            return Err(Error::unsupported(sql, "set operation"));
        }
        _ => return Err(Error::unsupported(sql, "not a plain SELECT")),
    };

    for from in &select.from {
        register_from(sql, from, scope, fields)?;
    }

    scope.clear_selected();
    let mut statement_main = None;
    for item in select.projection.iter().rev() {
        let Some((qualifier, column)) = projection_column(item) else {
            continue;
        };
        scope.add_selected(&qualifier, &column);
        if statement_main.is_none() && (column == "*" || column.ends_with(UID_FIELD)) {
            statement_main = Some(scope.resolve_table(&qualifier).to_string());
        }
    }
    // Subqueries in the projection are rejected; its columns never count.
    collect_column_references(&select.projection)
        .map_err(|reason| Error::unsupported(sql, reason))?;

    if main_table.is_none() {
        *main_table = match statement_main {
            Some(table) => Some(table),
            None => scope
                .unique_table_for_field(UID_FIELD, false)?
                .map(str::to_string),
        };
    }

    collect_fields(sql, &select.selection, scope, fields, false)?;
    collect_fields(sql, &select.group_by, scope, fields, false)?;
    collect_fields(sql, &select.having, scope, fields, false)?;
    collect_fields(sql, &query.order_by, scope, fields, true)?;
    Ok(())
}

fn register_from(
    sql: &str,
    from: &TableWithJoins,
    scope: &mut QueryScope<'_>,
    fields: &mut Vec<String>,
) -> Result<()> {
    register_relation(sql, &from.relation, scope)?;
    for join in &from.joins {
        register_relation(sql, &join.relation, scope)?;
        match join_constraint(&join.join_operator) {
            Some(JoinConstraint::On(on)) => collect_fields(sql, on, scope, fields, false)?,
            Some(JoinConstraint::Using(_)) => {
                return Err(Error::unsupported(sql, "JOIN ... USING"));
            }
            Some(JoinConstraint::Natural) => {
                return Err(Error::unsupported(sql, "NATURAL JOIN"));
            }
            Some(JoinConstraint::None) => {}
            None => collect_fields(sql, &join.join_operator, scope, fields, false)?,
        }
    }
    Ok(())
}

fn register_relation(sql: &str, relation: &TableFactor, scope: &mut QueryScope<'_>) -> Result<()> {
    match relation {
        TableFactor::Table { name, alias, .. } => {
            let table = object_name_tail(name)
                .ok_or_else(|| Error::unsupported(sql, format!("table name `{name}`")))?;
            let alias = alias.as_ref().map(|alias| alias.name.value.as_str());
            scope.add_table(&table, alias);
            Ok(())
        }
        TableFactor::Derived { .. } => Err(Error::unsupported(sql, "derived table")),
        other => Err(Error::unsupported(sql, format!("table factor `{other}`"))),
    }
}

fn join_constraint(operator: &JoinOperator) -> Option<&JoinConstraint> {
    match operator {
        JoinOperator::Join(constraint)
        | JoinOperator::Inner(constraint)
        | JoinOperator::Left(constraint)
        | JoinOperator::LeftOuter(constraint)
        | JoinOperator::Right(constraint)
        | JoinOperator::RightOuter(constraint)
        | JoinOperator::FullOuter(constraint) => Some(constraint),
        _ => None,
    }
}

/// `(qualifier, column)` of a qualified projection item; `*` for wildcards.
fn projection_column(item: &SelectItem) -> Option<(String, String)> {
    let expr: &Expr = match item {
        SelectItem::UnnamedExpr(expr) | SelectItem::ExprWithAlias { expr, .. } => expr,
        SelectItem::QualifiedWildcard(SelectItemQualifiedWildcardKind::ObjectName(name), _) => {
            return object_name_tail(name).map(|qualifier| (qualifier, "*".to_string()));
        }
        _ => return None,
    };
    let column = column_reference(expr)?;
    Some((column.qualifier?, column.field))
}

fn collect_fields<V: Visit>(
    sql: &str,
    node: &V,
    scope: &QueryScope<'_>,
    fields: &mut Vec<String>,
    narrow_by_selection: bool,
) -> Result<()> {
    let references =
        collect_column_references(node).map_err(|reason| Error::unsupported(sql, reason))?;
    for column in &references {
        if let Some(reference) = scope.resolve(column, narrow_by_selection)? {
            fields.push(reference);
        }
    }
    Ok(())
}
