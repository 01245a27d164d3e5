//! `summarize_by_time`: bucket, group, reduce and reshape raw observations.

use crate::aggregate::AggFunc;
use crate::core::{Column, Rule, Table, TimeKey, TimeSeries};
use crate::error::{Error, ModelResult, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::debug;

/// Representation of the time index of a summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeFormat {
    /// Bucket anchor dates.
    #[default]
    Timestamp,
    /// Discrete periods ("2015-03").
    Period,
}

/// Options for [`summarize_by_time`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizeOptions {
    /// Numeric columns to reduce, in output order.
    pub value_columns: Vec<String>,
    /// Timestamp column to bucket by; `None` aggregates without time.
    pub date_column: Option<String>,
    /// Categorical columns to group by.
    pub groups: Option<Vec<String>>,
    pub rule: Rule,
    pub agg_func: AggFunc,
    pub time_format: TimeFormat,
    /// Pivot group values into columns.
    pub wide_format: bool,
    /// Value for bucket/group combinations without observations.
    pub fill_value: f64,
}

impl Default for SummarizeOptions {
    fn default() -> Self {
        Self {
            value_columns: Vec::new(),
            date_column: None,
            groups: None,
            rule: Rule::Day,
            agg_func: AggFunc::Sum,
            time_format: TimeFormat::Timestamp,
            wide_format: true,
            fill_value: 0.0,
        }
    }
}

impl SummarizeOptions {
    /// Options reducing the given value columns.
    pub fn new<S: Into<String>>(value_columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            value_columns: value_columns.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn date_column(mut self, name: impl Into<String>) -> Self {
        self.date_column = Some(name.into());
        self
    }

    pub fn groups<S: Into<String>>(mut self, groups: impl IntoIterator<Item = S>) -> Self {
        self.groups = Some(groups.into_iter().map(Into::into).collect());
        self
    }

    pub fn rule(mut self, rule: Rule) -> Self {
        self.rule = rule;
        self
    }

    pub fn agg_func(mut self, agg_func: AggFunc) -> Self {
        self.agg_func = agg_func;
        self
    }

    pub fn time_format(mut self, time_format: TimeFormat) -> Self {
        self.time_format = time_format;
        self
    }

    pub fn wide_format(mut self, wide: bool) -> Self {
        self.wide_format = wide;
        self
    }

    pub fn fill_value(mut self, fill_value: f64) -> Self {
        self.fill_value = fill_value;
        self
    }
}

/// Row label of a summary.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct RowKey {
    pub time: Option<TimeKey>,
    /// Group tuple; empty in wide or ungrouped summaries.
    pub groups: Vec<String>,
}

/// Column label of a summary.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ColumnKey {
    pub value: String,
    /// Group tuple pivoted into this column; empty unless wide and grouped.
    pub groups: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryColumn {
    pub key: ColumnKey,
    pub values: Vec<f64>,
}

/// Aggregated table produced by [`summarize_by_time`].
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    index: Vec<RowKey>,
    columns: Vec<SummaryColumn>,
    rule: Option<Rule>,
    time_format: TimeFormat,
    date_column: Option<String>,
    group_columns: Vec<String>,
    value_columns: Vec<String>,
    wide: bool,
}

impl Summary {
    pub fn num_rows(&self) -> usize {
        self.index.len()
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn index(&self) -> &[RowKey] {
        &self.index
    }

    pub fn columns(&self) -> &[SummaryColumn] {
        &self.columns
    }

    /// Bucketing rule, `None` when no date column was used.
    pub fn rule(&self) -> Option<Rule> {
        self.rule
    }

    pub fn time_format(&self) -> TimeFormat {
        self.time_format
    }

    pub fn date_column(&self) -> Option<&str> {
        self.date_column.as_deref()
    }

    pub fn group_columns(&self) -> &[String] {
        &self.group_columns
    }

    /// True when group values live in the column labels rather than rows.
    pub fn is_wide(&self) -> bool {
        self.wide
    }

    /// Time keys of the rows, if every row has one.
    pub fn time_index(&self) -> Option<Vec<TimeKey>> {
        self.index.iter().map(|k| k.time).collect()
    }

    /// Identifier of column `i` as used for series ids and flattened tables.
    pub fn series_label(&self, i: usize) -> String {
        let key = &self.columns[i].key;
        if key.groups.is_empty() {
            key.value.clone()
        } else if self.value_columns.len() == 1 {
            key.groups.join("_")
        } else {
            format!("{}_{}", key.value, key.groups.join("_"))
        }
    }

    pub fn series_labels(&self) -> Vec<String> {
        (0..self.columns.len()).map(|i| self.series_label(i)).collect()
    }

    /// Values of the column whose series label is `label`.
    pub fn column(&self, label: &str) -> Option<&[f64]> {
        (0..self.columns.len())
            .find(|&i| self.series_label(i) == label)
            .map(|i| self.columns[i].values.as_slice())
    }

    /// Column `i` as a time series. Requires a time-indexed summary.
    pub fn series(&self, i: usize) -> ModelResult<TimeSeries> {
        let index = self.time_index().unwrap_or_default();
        TimeSeries::new(self.series_label(i), index, self.columns[i].values.clone())
    }

    /// Convert period keys back to bucket anchor dates.
    pub fn to_timestamps(&self) -> Summary {
        let mut out = self.clone();
        if let Some(rule) = self.rule {
            for key in &mut out.index {
                if let Some(TimeKey::Period(p)) = key.time {
                    key.time = Some(TimeKey::Date(rule.bucket_of(&p)));
                }
            }
        }
        out.time_format = TimeFormat::Timestamp;
        out
    }

    /// Flatten into a table: time column, group columns (long form), then
    /// one float column per series label.
    pub fn to_table(&self) -> Result<Table> {
        let mut table = Table::new();

        if let Some(keys) = self.time_index() {
            let rule = self.rule;
            let dates: Vec<NaiveDate> = keys
                .iter()
                .map(|k| match (k, rule) {
                    (TimeKey::Date(d), _) => *d,
                    (TimeKey::Period(p), Some(rule)) => rule.bucket_of(p),
                    (TimeKey::Period(p), None) => p.start_date(),
                })
                .collect();
            let name = self.date_column.as_deref().unwrap_or("date");
            table.push_column(name, Column::dates(dates))?;
        }

        if !self.wide {
            for (g, name) in self.group_columns.iter().enumerate() {
                let values: Vec<String> = self.index.iter().map(|k| k.groups[g].clone()).collect();
                table.push_column(name.clone(), Column::Text(values))?;
            }
        }

        for (i, column) in self.columns.iter().enumerate() {
            table.push_column(self.series_label(i), Column::Float(column.values.clone()))?;
        }

        Ok(table)
    }
}

/// Aggregate `data` by time bucket and optional groups.
///
/// # Example
/// ```
/// use salescast::aggregate::{summarize_by_time, SummarizeOptions};
/// use salescast::core::{Column, Rule, Table};
///
/// let table = Table::new()
///     .with_column("order_date", Column::text(["2015-01-05", "2015-01-20", "2015-02-03"]))?
///     .parse_datetimes("order_date")?
///     .with_column("total_price", Column::Float(vec![100.0, 50.0, 70.0]))?;
///
/// let options = SummarizeOptions::new(["total_price"])
///     .date_column("order_date")
///     .rule(Rule::MonthStart);
/// let summary = summarize_by_time(&table, &options)?;
///
/// assert_eq!(summary.num_rows(), 2);
/// assert_eq!(summary.column("total_price").unwrap(), &[150.0, 70.0]);
/// # Ok::<(), salescast::Error>(())
/// ```
pub fn summarize_by_time(data: &Table, options: &SummarizeOptions) -> Result<Summary> {
    validate(data, options)?;

    let n = data.num_rows();
    let values: Vec<&[f64]> = options
        .value_columns
        .iter()
        .map(|name| data.float(name))
        .collect::<Result<_>>()?;

    let buckets: Vec<Option<NaiveDate>> = match &options.date_column {
        Some(name) => data
            .datetime(name)?
            .iter()
            .map(|ts| Some(options.rule.floor(*ts)))
            .collect(),
        None => vec![None; n],
    };

    let group_names: &[String] = options.groups.as_deref().unwrap_or(&[]);
    let group_data: Vec<&[String]> = group_names
        .iter()
        .map(|name| data.text(name))
        .collect::<Result<_>>()?;

    // rows of each observed (bucket, group tuple) cell
    let mut cells: BTreeMap<(Option<NaiveDate>, Vec<String>), Vec<usize>> = BTreeMap::new();
    for (row, bucket) in buckets.iter().enumerate() {
        let tuple: Vec<String> = group_data.iter().map(|col| col[row].clone()).collect();
        cells.entry((*bucket, tuple)).or_default().push(row);
    }

    let observed_buckets: BTreeSet<Option<NaiveDate>> = cells.keys().map(|(b, _)| *b).collect();
    let observed_groups: BTreeSet<Vec<String>> = cells.keys().map(|(_, g)| g.clone()).collect();

    let reduced = |bucket: &Option<NaiveDate>, groups: &Vec<String>, col: usize| -> f64 {
        cells
            .get(&(*bucket, groups.clone()))
            .and_then(|rows| {
                let cell: Vec<f64> = rows.iter().map(|&r| values[col][r]).collect();
                options.agg_func.reduce(&cell)
            })
            .unwrap_or(options.fill_value)
    };

    let time_key = |bucket: &Option<NaiveDate>| -> Option<TimeKey> {
        bucket.map(|d| match options.time_format {
            TimeFormat::Timestamp => TimeKey::Date(d),
            TimeFormat::Period => TimeKey::Period(options.rule.to_period(d)),
        })
    };

    let grouped = !group_names.is_empty();
    let wide = options.wide_format || !grouped;

    let (index, columns) = if wide {
        let index: Vec<RowKey> = observed_buckets
            .iter()
            .map(|b| RowKey {
                time: time_key(b),
                groups: Vec::new(),
            })
            .collect();

        let mut columns = Vec::with_capacity(options.value_columns.len() * observed_groups.len());
        for (col, value) in options.value_columns.iter().enumerate() {
            for groups in &observed_groups {
                columns.push(SummaryColumn {
                    key: ColumnKey {
                        value: value.clone(),
                        groups: groups.clone(),
                    },
                    values: observed_buckets
                        .iter()
                        .map(|b| reduced(b, groups, col))
                        .collect(),
                });
            }
        }
        (index, columns)
    } else {
        let pairs: Vec<(&Option<NaiveDate>, &Vec<String>)> = observed_buckets
            .iter()
            .flat_map(|b| observed_groups.iter().map(move |g| (b, g)))
            .collect();

        let index: Vec<RowKey> = pairs
            .iter()
            .map(|(b, g)| RowKey {
                time: time_key(b),
                groups: (*g).clone(),
            })
            .collect();

        let columns = options
            .value_columns
            .iter()
            .enumerate()
            .map(|(col, value)| SummaryColumn {
                key: ColumnKey {
                    value: value.clone(),
                    groups: Vec::new(),
                },
                values: pairs.iter().map(|(b, g)| reduced(b, g, col)).collect(),
            })
            .collect();
        (index, columns)
    };

    debug!(
        rows = n,
        buckets = observed_buckets.len(),
        groups = observed_groups.len(),
        columns = columns.len(),
        rule = %options.rule,
        agg = %options.agg_func,
        "summarized by time"
    );

    let summary = Summary {
        index,
        columns,
        rule: options.date_column.as_ref().map(|_| options.rule),
        time_format: options.time_format,
        date_column: options.date_column.clone(),
        group_columns: group_names.to_vec(),
        value_columns: options.value_columns.clone(),
        wide,
    };
    if wide {
        check_unique_labels(&summary)?;
    }
    Ok(summary)
}

/// Joined group values can collide ("a_b" + "c" and "a" + "b_c"); series
/// labels are identifiers downstream and must be unique.
fn check_unique_labels(summary: &Summary) -> Result<()> {
    let mut seen = HashSet::new();
    for label in summary.series_labels() {
        if !seen.insert(label.clone()) {
            return Err(Error::invalid(format!(
                "series label '{label}' is produced by more than one column; \
                 rename group values or value columns so labels are unique"
            )));
        }
    }
    Ok(())
}

fn validate(data: &Table, options: &SummarizeOptions) -> Result<()> {
    if options.value_columns.is_empty() {
        return Err(Error::invalid("value_columns must not be empty"));
    }
    if data.is_empty() {
        return Err(Error::invalid("data must not be empty"));
    }

    for name in &options.value_columns {
        data.float(name)?;
    }
    if let Some(name) = &options.date_column {
        data.datetime(name)?;
    }
    if let Some(groups) = &options.groups {
        if groups.is_empty() {
            return Err(Error::invalid(
                "groups was given but names no columns to group or pivot by",
            ));
        }
        for name in groups {
            data.text(name)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Period;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn orders() -> Table {
        Table::new()
            .with_column(
                "order_date",
                Column::dates(vec![
                    date(2015, 1, 3),
                    date(2015, 1, 17),
                    date(2015, 1, 30),
                    date(2015, 2, 2),
                    date(2015, 3, 9),
                ]),
            )
            .unwrap()
            .with_column("category", Column::text(["A", "B", "A", "A", "B"]))
            .unwrap()
            .with_column("total_price", Column::Float(vec![10.0, 5.0, 20.0, 7.0, 3.0]))
            .unwrap()
            .with_column("quantity", Column::Float(vec![1.0, 1.0, 2.0, 1.0, 1.0]))
            .unwrap()
    }

    #[test]
    fn monthly_sum_without_groups() {
        let options = SummarizeOptions::new(["total_price"])
            .date_column("order_date")
            .rule(Rule::MonthStart);
        let summary = summarize_by_time(&orders(), &options).unwrap();

        assert_eq!(summary.num_rows(), 3);
        assert_eq!(
            summary.time_index().unwrap(),
            vec![
                TimeKey::Date(date(2015, 1, 1)),
                TimeKey::Date(date(2015, 2, 1)),
                TimeKey::Date(date(2015, 3, 1)),
            ]
        );
        assert_eq!(summary.column("total_price").unwrap(), &[35.0, 7.0, 3.0]);
    }

    #[test]
    fn wide_groups_fill_missing_cells() {
        let options = SummarizeOptions::new(["total_price"])
            .date_column("order_date")
            .groups(["category"])
            .rule(Rule::MonthStart)
            .fill_value(-1.0);
        let summary = summarize_by_time(&orders(), &options).unwrap();

        assert!(summary.is_wide());
        assert_eq!(summary.series_labels(), vec!["A", "B"]);
        assert_eq!(summary.column("A").unwrap(), &[30.0, 7.0, -1.0]);
        assert_eq!(summary.column("B").unwrap(), &[5.0, -1.0, 3.0]);
    }

    #[test]
    fn long_format_keeps_full_cross_product() {
        let options = SummarizeOptions::new(["total_price"])
            .date_column("order_date")
            .groups(["category"])
            .rule(Rule::MonthStart)
            .wide_format(false);
        let summary = summarize_by_time(&orders(), &options).unwrap();

        assert!(!summary.is_wide());
        assert_eq!(summary.num_rows(), 6);
        assert_eq!(summary.index()[1].groups, vec!["B".to_string()]);
        assert_eq!(
            summary.column("total_price").unwrap(),
            &[30.0, 5.0, 7.0, 0.0, 0.0, 3.0]
        );
    }

    #[test]
    fn multiple_value_columns_prefix_labels() {
        let options = SummarizeOptions::new(["total_price", "quantity"])
            .date_column("order_date")
            .groups(["category"])
            .rule(Rule::YearStart);
        let summary = summarize_by_time(&orders(), &options).unwrap();

        assert_eq!(
            summary.series_labels(),
            vec!["total_price_A", "total_price_B", "quantity_A", "quantity_B"]
        );
        assert_eq!(summary.column("quantity_A").unwrap(), &[4.0]);
    }

    #[test]
    fn period_format_uses_periods() {
        let options = SummarizeOptions::new(["total_price"])
            .date_column("order_date")
            .rule(Rule::QuarterEnd)
            .time_format(TimeFormat::Period);
        let summary = summarize_by_time(&orders(), &options).unwrap();

        assert_eq!(
            summary.time_index().unwrap(),
            vec![TimeKey::Period(Period::quarter(2015, 1).unwrap())]
        );
        let back = summary.to_timestamps();
        assert_eq!(
            back.time_index().unwrap(),
            vec![TimeKey::Date(date(2015, 3, 31))]
        );
    }

    #[test]
    fn without_date_column_aggregates_whole_table() {
        let options = SummarizeOptions::new(["total_price"]).agg_func(AggFunc::Mean);
        let summary = summarize_by_time(&orders(), &options).unwrap();

        assert_eq!(summary.num_rows(), 1);
        assert!(summary.rule().is_none());
        assert!(summary.time_index().is_none());
        assert_eq!(summary.column("total_price").unwrap(), &[9.0]);
    }

    #[test]
    fn without_date_column_long_groups() {
        let options = SummarizeOptions::new(["total_price"])
            .groups(["category"])
            .wide_format(false);
        let summary = summarize_by_time(&orders(), &options).unwrap();

        assert_eq!(summary.num_rows(), 2);
        assert_eq!(summary.column("total_price").unwrap(), &[37.0, 8.0]);
    }

    #[test]
    fn to_table_flattens_long_summary() {
        let options = SummarizeOptions::new(["total_price"])
            .date_column("order_date")
            .groups(["category"])
            .rule(Rule::MonthStart)
            .wide_format(false);
        let table = summarize_by_time(&orders(), &options)
            .unwrap()
            .to_table()
            .unwrap();

        assert_eq!(
            table.column_names(),
            &["order_date", "category", "total_price"]
        );
        assert_eq!(table.num_rows(), 6);
    }

    #[test]
    fn invalid_arguments() {
        let table = orders();
        let cases = vec![
            SummarizeOptions::new(Vec::<String>::new()),
            SummarizeOptions::new(["missing"]),
            SummarizeOptions::new(["category"]),
            SummarizeOptions::new(["total_price"]).date_column("category"),
            SummarizeOptions::new(["total_price"]).groups(Vec::<String>::new()),
            SummarizeOptions::new(["total_price"]).groups(["quantity"]),
        ];
        for options in cases {
            assert!(
                matches!(summarize_by_time(&table, &options), Err(Error::InvalidArgument(_))),
                "{options:?}"
            );
        }

        let empty = Table::new()
            .with_column("total_price", Column::Float(vec![]))
            .unwrap();
        assert!(summarize_by_time(&empty, &SummarizeOptions::new(["total_price"])).is_err());
    }

    #[test]
    fn colliding_series_labels_are_rejected() {
        let table = Table::new()
            .with_column("order_date", Column::dates(vec![date(2015, 1, 3), date(2015, 1, 9)]))
            .unwrap()
            .with_column("g1", Column::text(["a_b", "a"]))
            .unwrap()
            .with_column("g2", Column::text(["c", "b_c"]))
            .unwrap()
            .with_column("total_price", Column::Float(vec![1.0, 2.0]))
            .unwrap();

        let wide = SummarizeOptions::new(["total_price"])
            .date_column("order_date")
            .groups(["g1", "g2"]);
        match summarize_by_time(&table, &wide) {
            Err(Error::InvalidArgument(message)) => assert!(message.contains("a_b_c"), "{message}"),
            other => panic!("expected invalid argument, got {other:?}"),
        }

        // long form keeps the group values in separate columns
        let long = wide.wide_format(false);
        assert_eq!(summarize_by_time(&table, &long).unwrap().num_rows(), 2);
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: SummarizeOptions = toml::from_str(
            r#"
            value_columns = ["total_price"]
            date_column = "order_date"
            rule = "MS"
            time_format = "period"
            "#,
        )
        .unwrap();
        assert_eq!(options.rule, Rule::MonthStart);
        assert_eq!(options.agg_func, AggFunc::Sum);
        assert!(options.wide_format);
        assert_eq!(options.fill_value, 0.0);
    }
}
