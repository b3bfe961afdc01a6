use std::ops::ControlFlow;

use sqlparser::ast::{visit_expressions, Expr, ObjectName, ObjectNamePart, Visit};

/// A column reference found in an expression: an optional qualifier (table or
/// alias) and the column name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    /// Table name or alias in front of the column, if any.
    pub qualifier: Option<String>,
    /// Terminal column component.
    pub field: String,
}

/// Extract a column reference from an expression.
///
/// Supports plain identifiers (`uid`) and qualified identifiers (`p.uid`,
/// `db.pages.uid`), in which case the second-to-last component is the
/// qualifier.
pub fn column_reference(expr: &Expr) -> Option<ColumnRef> {
    match expr {
        Expr::Identifier(ident) => Some(ColumnRef {
            qualifier: None,
            field: ident.value.clone(),
        }),
        Expr::CompoundIdentifier(parts) => {
            let (field, rest) = parts.split_last()?;
            Some(ColumnRef {
                qualifier: rest.last().map(|q| q.value.clone()),
                field: field.value.clone(),
            })
        }
        Expr::Nested(inner) => column_reference(inner),
        _ => None,
    }
}

/// Collect every column reference nested anywhere inside `node`, in source
/// order.
///
/// Subquery expressions are rejected: the returned `Err` carries the reason.
pub fn collect_column_references<V: Visit>(node: &V) -> Result<Vec<ColumnRef>, String> {
    let mut refs = Vec::new();
    let flow = visit_expressions(node, |expr| {
        match expr {
            Expr::Subquery(_) | Expr::Exists { .. } | Expr::InSubquery { .. } => {
                return ControlFlow::Break(format!("subquery in expression `{expr}`"));
            }
            Expr::Identifier(_) | Expr::CompoundIdentifier(_) => {
                if let Some(column) = column_reference(expr) {
                    refs.push(column);
                }
            }
            _ => {}
        }
        ControlFlow::Continue(())
    });
    match flow {
        ControlFlow::Break(reason) => Err(reason),
        ControlFlow::Continue(()) => Ok(refs),
    }
}

/// Terminal identifier of an object name (`db.pages` -> `pages`).
pub fn object_name_tail(name: &ObjectName) -> Option<String> {
    match name.0.last()? {
        ObjectNamePart::Identifier(ident) => Some(ident.value.clone()),
        #[allow(unreachable_patterns)]
        _ => None,
    }
}
