use crate::error::{Error, Result};
use crate::query::row::{Row, RowSource, Value};
use crate::query::select_by::SelectBy;
use crate::usage::UsageAccumulator;

/// Cursor wrapper that reports every fetched row to the render's usage and
/// hides rows whose start time has not been reached yet.
///
/// Every fetch operation is built on [`ResultInterceptor::fetch_row`], so all
/// of them see the same filtered, helper-free rows.
pub struct ResultInterceptor<'u, S> {
    source: S,
    main_table: Option<String>,
    select_by: SelectBy,
    usage: &'u UsageAccumulator,
}

impl<'u, S: RowSource> ResultInterceptor<'u, S> {
    /// Wrap `source`; rows are attributed to `main_table` when it is known.
    pub fn new(
        source: S,
        main_table: Option<String>,
        select_by: SelectBy,
        usage: &'u UsageAccumulator,
    ) -> Self {
        Self {
            source,
            main_table,
            select_by,
            usage,
        }
    }

    /// Table the rows are attributed to.
    pub fn main_table(&self) -> Option<&str> {
        self.main_table.as_deref()
    }

    /// Next visible row with the helper columns removed.
    ///
    /// Usage and lifetime are recorded for every fetched row, hidden ones
    /// included. Helper columns are only required on rows that pass the
    /// start time gate.
    pub fn fetch_row(&mut self) -> Result<Option<Row>> {
        while let Some(raw) = self.source.next_row()? {
            if let Some(table) = &self.main_table {
                self.usage.record_row_usage(table, raw.uid());
            }
            for alias in self
                .select_by
                .start_times()
                .iter()
                .chain(self.select_by.end_times())
            {
                self.usage.bound_lifetime(helper_timestamp(&raw, alias));
            }

            let now = self.usage.now();
            let not_yet_visible = self
                .select_by
                .filter_by_start_times()
                .iter()
                .map(|alias| helper_timestamp(&raw, alias))
                .any(|start| start != 0 && start > now);
            if not_yet_visible {
                continue;
            }
            let (row, _) = self.select_by.split(raw)?;
            return Ok(Some(row));
        }
        Ok(None)
    }

    /// Next row as named columns.
    pub fn fetch_associative(&mut self) -> Result<Option<Row>> {
        self.fetch_row()
    }

    /// Next row as positional values.
    pub fn fetch_numeric(&mut self) -> Result<Option<Vec<Value>>> {
        Ok(self.fetch_row()?.map(Row::into_values))
    }

    /// First column of the next row.
    pub fn fetch_one(&mut self) -> Result<Option<Value>> {
        Ok(self
            .fetch_numeric()?
            .map(|values| values.into_iter().next().unwrap_or(Value::Null)))
    }

    /// Every remaining row as named columns.
    pub fn fetch_all_associative(&mut self) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        while let Some(row) = self.fetch_row()? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Every remaining row as positional values.
    pub fn fetch_all_numeric(&mut self) -> Result<Vec<Vec<Value>>> {
        let mut rows = Vec::new();
        while let Some(values) = self.fetch_numeric()? {
            rows.push(values);
        }
        Ok(rows)
    }

    /// First column of every remaining row.
    pub fn fetch_first_column(&mut self) -> Result<Vec<Value>> {
        let mut column = Vec::new();
        while let Some(value) = self.fetch_one()? {
            column.push(value);
        }
        Ok(column)
    }

    /// First column mapped to second column. A repeated key keeps its first
    /// position and takes the later value.
    pub fn fetch_all_key_value(&mut self) -> Result<Vec<(Value, Value)>> {
        self.ensure_key_value()?;
        let mut pairs: Vec<(Value, Value)> = Vec::new();
        for values in self.fetch_all_numeric()? {
            let mut values = values.into_iter();
            let key = values.next().unwrap_or(Value::Null);
            let value = values.next().unwrap_or(Value::Null);
            upsert(&mut pairs, key, value);
        }
        Ok(pairs)
    }

    /// First column mapped to the rest of the row, with the same key rules as
    /// [`ResultInterceptor::fetch_all_key_value`].
    pub fn fetch_all_associative_indexed(&mut self) -> Result<Vec<(Value, Row)>> {
        let mut indexed: Vec<(Value, Row)> = Vec::new();
        for mut row in self.fetch_all_associative()? {
            let key = row.take_first().map_or(Value::Null, |(_, value)| value);
            upsert(&mut indexed, key, row);
        }
        Ok(indexed)
    }

    /// Number of visible rows. Consumes the cursor.
    pub fn row_count(&mut self) -> Result<usize> {
        let mut count = 0;
        while self.fetch_row()?.is_some() {
            count += 1;
        }
        Ok(count)
    }

    /// Number of columns the caller selected, helper columns excluded.
    pub fn column_count(&self) -> usize {
        self.source
            .column_count()
            .saturating_sub(self.select_by.all_fields().len())
    }

    fn ensure_key_value(&self) -> Result<()> {
        let column_count = self.column_count();
        if column_count < 2 {
            return Err(Error::NoKeyValue { column_count });
        }
        Ok(())
    }
}

impl<S: RowSource> Iterator for ResultInterceptor<'_, S> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        self.fetch_row().transpose()
    }
}

impl<S> std::fmt::Debug for ResultInterceptor<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultInterceptor")
            .field("main_table", &self.main_table)
            .field("select_by", &self.select_by)
            .finish_non_exhaustive()
    }
}

fn helper_timestamp(row: &Row, alias: &str) -> i64 {
    row.get(alias).map_or(0, Value::as_integer)
}

fn upsert<T>(entries: &mut Vec<(Value, T)>, key: Value, value: T) {
    match entries.iter_mut().find(|(existing, _)| *existing == key) {
        Some(entry) => entry.1 = value,
        None => entries.push((key, value)),
    }
}
