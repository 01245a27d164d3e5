//! Persistence of flattened forecast tables.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::Table;
use crate::error::{Error, Result};

/// Value columns every forecast table carries besides its id and date.
pub const FORECAST_VALUE_COLUMNS: [&str; 4] = ["value", "prediction", "ci_lo", "ci_hi"];

/// Behaviour when the target table already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IfExists {
    #[default]
    Fail,
    Replace,
    /// Upsert rows keyed by (id, date).
    Append,
}

/// Check that `table` has exactly the columns
/// `{id_column, date_column, value, prediction, ci_lo, ci_hi}`.
pub fn validate_forecast_schema(table: &Table, id_column: &str, date_column: &str) -> Result<()> {
    let required: Vec<&str> = [id_column, date_column]
        .into_iter()
        .chain(FORECAST_VALUE_COLUMNS)
        .collect();
    let present: HashSet<&str> = table.column_names().iter().map(String::as_str).collect();

    let missing: Vec<String> = required
        .iter()
        .filter(|c| !present.contains(*c))
        .map(|c| c.to_string())
        .collect();
    let extra: Vec<String> = table
        .column_names()
        .iter()
        .filter(|c| !required.contains(&c.as_str()))
        .cloned()
        .collect();

    if missing.is_empty() && extra.is_empty() {
        Ok(())
    } else {
        Err(Error::Schema { missing, extra })
    }
}

/// Destination for forecast tables.
pub trait ForecastSink {
    /// Store `table` under `table_name` after validating its layout.
    fn write(
        &mut self,
        table_name: &str,
        table: &Table,
        id_column: &str,
        date_column: &str,
        if_exists: IfExists,
    ) -> Result<()>;

    /// Load a previously written table.
    fn read(&self, table_name: &str) -> Result<Table>;
}

/// In-memory sink, keyed by table name.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    tables: HashMap<String, Table>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, table_name: &str) -> bool {
        self.tables.contains_key(table_name)
    }

    pub fn table_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tables.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl ForecastSink for MemorySink {
    fn write(
        &mut self,
        table_name: &str,
        table: &Table,
        id_column: &str,
        date_column: &str,
        if_exists: IfExists,
    ) -> Result<()> {
        validate_forecast_schema(table, id_column, date_column)?;

        let stored = match (self.tables.get(table_name), if_exists) {
            (None, _) | (Some(_), IfExists::Replace) => table.clone(),
            (Some(_), IfExists::Fail) => return Err(Error::TableExists(table_name.to_string())),
            (Some(existing), IfExists::Append) => upsert(existing, table, id_column, date_column)?,
        };
        info!(
            table = table_name,
            rows = stored.num_rows(),
            mode = ?if_exists,
            "wrote forecast table"
        );
        self.tables.insert(table_name.to_string(), stored);
        Ok(())
    }

    fn read(&self, table_name: &str) -> Result<Table> {
        self.tables
            .get(table_name)
            .cloned()
            .ok_or_else(|| Error::TableNotFound(table_name.to_string()))
    }
}

/// Existing rows not superseded by `incoming`, followed by all of `incoming`.
fn upsert(existing: &Table, incoming: &Table, id_column: &str, date_column: &str) -> Result<Table> {
    let keys = |t: &Table| -> Result<Vec<(String, NaiveDateTime)>> {
        Ok(t.text(id_column)?
            .iter()
            .cloned()
            .zip(t.datetime(date_column)?.iter().copied())
            .collect())
    };
    let incoming_keys: HashSet<(String, NaiveDateTime)> = keys(incoming)?.into_iter().collect();
    let kept: Vec<usize> = keys(existing)?
        .iter()
        .enumerate()
        .filter(|(_, key)| !incoming_keys.contains(*key))
        .map(|(i, _)| i)
        .collect();

    existing.select_rows(&kept).vstack(incoming)
}
