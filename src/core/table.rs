//! Column-oriented in-memory table used as the tabular input and output.

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// A typed column. Float `NaN` marks a null cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    DateTime(Vec<NaiveDateTime>),
    Float(Vec<f64>),
    Text(Vec<String>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::DateTime(v) => v.len(),
            Column::Float(v) => v.len(),
            Column::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Name of the column type, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Column::DateTime(_) => "datetime",
            Column::Float(_) => "float",
            Column::Text(_) => "text",
        }
    }

    /// Date-only convenience constructor (midnight timestamps).
    pub fn dates(dates: Vec<NaiveDate>) -> Self {
        Column::DateTime(dates.into_iter().map(|d| d.and_time(Default::default())).collect())
    }

    pub fn text<S: Into<String>>(values: impl IntoIterator<Item = S>) -> Self {
        Column::Text(values.into_iter().map(Into::into).collect())
    }
}

/// Named, equally long columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    names: Vec<String>,
    columns: Vec<Column>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column, checking its name and length.
    pub fn with_column(mut self, name: impl Into<String>, column: Column) -> Result<Self> {
        self.push_column(name, column)?;
        Ok(self)
    }

    /// Append a column in place.
    pub fn push_column(&mut self, name: impl Into<String>, column: Column) -> Result<()> {
        let name = name.into();
        if self.names.contains(&name) {
            return Err(Error::invalid(format!("duplicate column '{name}'")));
        }
        if let Some(first) = self.columns.first() {
            if first.len() != column.len() {
                return Err(Error::invalid(format!(
                    "column '{name}' has {} rows, table has {}",
                    column.len(),
                    first.len()
                )));
            }
        }
        self.names.push(name);
        self.columns.push(column);
        Ok(())
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Result<&Column> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| &self.columns[i])
            .ok_or_else(|| Error::invalid(format!("column '{name}' not found")))
    }

    pub fn float(&self, name: &str) -> Result<&[f64]> {
        match self.column(name)? {
            Column::Float(v) => Ok(v),
            other => Err(type_error(name, "float", other)),
        }
    }

    pub fn text(&self, name: &str) -> Result<&[String]> {
        match self.column(name)? {
            Column::Text(v) => Ok(v),
            other => Err(type_error(name, "text", other)),
        }
    }

    pub fn datetime(&self, name: &str) -> Result<&[NaiveDateTime]> {
        match self.column(name)? {
            Column::DateTime(v) => Ok(v),
            other => Err(type_error(name, "datetime", other)),
        }
    }

    /// Convert a text column of date strings into a datetime column.
    ///
    /// Accepts `%Y-%m-%d`, `%Y-%m-%d %H:%M:%S`, `%Y-%m-%dT%H:%M:%S` and
    /// RFC 3339 (converted to UTC wall time).
    pub fn parse_datetimes(mut self, name: &str) -> Result<Self> {
        let idx = self
            .names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| Error::invalid(format!("column '{name}' not found")))?;

        let parsed = match &self.columns[idx] {
            Column::DateTime(_) => return Ok(self),
            Column::Text(values) => values
                .iter()
                .enumerate()
                .map(|(row, s)| {
                    parse_datetime(s).ok_or_else(|| {
                        Error::invalid(format!(
                            "column '{name}' row {row}: cannot parse '{s}' as a date"
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            other => return Err(type_error(name, "text", other)),
        };

        self.columns[idx] = Column::DateTime(parsed);
        Ok(self)
    }

    /// Rows at `indices`, in that order.
    pub fn select_rows(&self, indices: &[usize]) -> Table {
        let columns = self
            .columns
            .iter()
            .map(|column| match column {
                Column::DateTime(v) => Column::DateTime(indices.iter().map(|&i| v[i]).collect()),
                Column::Float(v) => Column::Float(indices.iter().map(|&i| v[i]).collect()),
                Column::Text(v) => Column::Text(indices.iter().map(|&i| v[i].clone()).collect()),
            })
            .collect();
        Table {
            names: self.names.clone(),
            columns,
        }
    }

    /// Stack `other` below `self`. Columns are matched by name and must
    /// have the same types.
    pub fn vstack(&self, other: &Table) -> Result<Table> {
        if self.num_columns() != other.num_columns() {
            return Err(Error::invalid(format!(
                "cannot stack {} columns onto {}",
                other.num_columns(),
                self.num_columns()
            )));
        }
        let mut out = Table::new();
        for (name, top) in self.names.iter().zip(&self.columns) {
            let column = match (top, other.column(name)?) {
                (Column::DateTime(a), Column::DateTime(b)) => {
                    Column::DateTime(a.iter().chain(b).copied().collect())
                }
                (Column::Float(a), Column::Float(b)) => Column::Float(a.iter().chain(b).copied().collect()),
                (Column::Text(a), Column::Text(b)) => Column::Text(a.iter().chain(b).cloned().collect()),
                (_, found) => return Err(type_error(name, top.kind(), found)),
            };
            out.push_column(name.clone(), column)?;
        }
        Ok(out)
    }

    /// Add `name = a * b` over two float columns.
    pub fn with_derived_product(self, name: &str, a: &str, b: &str) -> Result<Self> {
        let product: Vec<f64> = self
            .float(a)?
            .iter()
            .zip(self.float(b)?)
            .map(|(x, y)| x * y)
            .collect();
        self.with_column(name, Column::Float(product))
    }
}

fn type_error(name: &str, expected: &str, found: &Column) -> Error {
    Error::invalid(format!(
        "column '{name}' must be {expected}, found {}",
        found.kind()
    ))
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date.and_time(Default::default()));
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_utc()))
}
