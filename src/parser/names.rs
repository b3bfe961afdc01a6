use std::cmp::Ordering;

/// Return the identifier without surrounding double quotes or backticks.
pub fn unquote_identifier(ident: &str) -> &str {
    for quote in ['"', '`'] {
        if let Some(inner) = ident
            .strip_prefix(quote)
            .and_then(|s| s.strip_suffix(quote))
        {
            return inner;
        }
    }
    ident
}

/// Split a `table.field` reference into its parts.
///
/// Only the first dot separates; table names never contain one in the
/// snapshot, so `a.b.c` yields `("a", "b.c")` and is rejected by lookups.
pub fn split_table_field(reference: &str) -> Option<(&str, &str)> {
    let (table, field) = reference.split_once('.')?;
    if table.is_empty() || field.is_empty() {
        return None;
    }
    Some((table, field))
}

/// Join a table and a field into the `table.field` form used in facts.
pub fn table_field(table: &str, field: &str) -> String {
    format!("{table}.{field}")
}

/// Case-insensitive ordering with a byte-order tie break, so the result is a
/// total order and sorting is deterministic.
pub fn case_insensitive_cmp(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Alias of the helper column that carries `column_kind` (e.g. `starttime`)
/// for `table` in rewritten queries.
pub fn helper_column_alias(column_kind: &str, table: &str) -> String {
    format!("{column_kind}__{table}")
}
