use serde::{Deserialize, Serialize};

use crate::parser::names::{case_insensitive_cmp, split_table_field};

/// Identifier column of every tracked table.
pub const UID_FIELD: &str = "uid";
/// Relation-key columns of junction tables.
pub const RELATION_KEY_FIELDS: [&str; 2] = ["uid_foreign", "uid_local"];

/// What a single `SELECT` depends on.
///
/// Built once per distinct statement text and cached; two facts for the same
/// text always compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyFact {
    main_table: String,
    conditional_fields: Vec<String>,
    is_relational: bool,
}

impl DependencyFact {
    /// Create a fact, sorting `conditional_fields` case-insensitively and
    /// removing duplicates.
    pub fn new(
        main_table: impl Into<String>,
        conditional_fields: impl IntoIterator<Item = String>,
        is_relational: bool,
    ) -> Self {
        let mut conditional_fields: Vec<String> = conditional_fields.into_iter().collect();
        conditional_fields.sort_by(|a, b| case_insensitive_cmp(a, b));
        conditional_fields.dedup();
        Self {
            main_table: main_table.into(),
            conditional_fields,
            is_relational,
        }
    }

    /// Table whose rows are the primary entity of the result.
    pub fn main_table(&self) -> &str {
        &self.main_table
    }

    /// `table.field` references used in predicates, grouping and ordering.
    pub fn conditional_fields(&self) -> &[String] {
        &self.conditional_fields
    }

    /// Conditional fields split into `(table, field)` pairs.
    pub fn conditional_field_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.conditional_fields
            .iter()
            .filter_map(|reference| split_table_field(reference))
    }

    /// Whether the predicates pin the result to row identities or relations.
    pub fn is_relational(&self) -> bool {
        self.is_relational
    }
}

/// Returns `true` when `field` is the identifier or a relation key.
pub fn is_relation_field(field: &str) -> bool {
    field == UID_FIELD || RELATION_KEY_FIELDS.contains(&field)
}
