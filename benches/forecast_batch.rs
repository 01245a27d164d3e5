//! Benchmarks for aggregation and per-series forecasting.

use chrono::{Days, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use salescast::aggregate::{summarize_by_time, SummarizeOptions, Summary, TimeFormat};
use salescast::batch::{forecast_with, ForecastConfig};
use salescast::core::{Column, Rule, Table};

fn generate_orders(months: usize, categories: usize) -> Table {
    let start = NaiveDate::from_ymd_opt(2011, 1, 1).unwrap();
    let mut dates = Vec::new();
    let mut price = Vec::new();
    let mut category = Vec::new();
    for day in 0..(months * 30) {
        for c in 0..categories {
            let season = (2.0 * std::f64::consts::PI * day as f64 / 365.0).sin();
            dates.push(start + Days::new(day as u64));
            price.push(500.0 * (c + 1) as f64 * (1.0 + 0.2 * season) + ((day * 7 + c) % 13) as f64);
            category.push(format!("category_{c}"));
        }
    }
    Table::new()
        .with_column("order_date", Column::dates(dates))
        .and_then(|t| t.with_column("total_price", Column::Float(price)))
        .and_then(|t| t.with_column("category", Column::Text(category)))
        .unwrap()
}

fn monthly_summary(table: &Table) -> Summary {
    let options = SummarizeOptions::new(["total_price"])
        .date_column("order_date")
        .groups(["category"])
        .rule(Rule::MonthStart)
        .time_format(TimeFormat::Period);
    summarize_by_time(table, &options).unwrap()
}

fn bench_summarize(c: &mut Criterion) {
    let mut group = c.benchmark_group("summarize_by_time");

    for months in [12, 48, 120].iter() {
        let table = generate_orders(*months, 4);
        group.bench_with_input(BenchmarkId::new("monthly_grouped", months), months, |b, _| {
            b.iter(|| monthly_summary(black_box(&table)))
        });
    }

    group.finish();
}

fn bench_forecast(c: &mut Criterion) {
    let mut group = c.benchmark_group("forecast_batch");
    group.sample_size(10);

    let summary = monthly_summary(&generate_orders(48, 8));
    for parallel in [false, true] {
        let config = ForecastConfig::new(12, 12, 0.95).with_parallel(parallel);
        let name = if parallel { "parallel" } else { "sequential" };
        group.bench_function(BenchmarkId::new(name, summary.num_columns()), |b| {
            b.iter(|| forecast_with(black_box(&summary), &config))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_summarize, bench_forecast);
criterion_main!(benches);
