//! Bike sales walkthrough: monthly revenue, per-category forecasts,
//! outlier flags and persistence.
//!
//! Run with: cargo run --example bike_sales
//! Set RUST_LOG=salescast=debug to see the selected model orders.

use chrono::{Days, NaiveDate};
use salescast::detection::{detect_outliers, OutlierSide};
use salescast::prelude::*;

fn orders() -> Result<Table> {
    let categories = [("Mountain", 3200.0), ("Road", 2100.0), ("Cyclocross", 900.0)];
    let start = NaiveDate::from_ymd_opt(2011, 1, 1).ok_or_else(|| Error::InvalidArgument("start date".into()))?;

    let mut dates = Vec::new();
    let mut price = Vec::new();
    let mut quantity = Vec::new();
    let mut category = Vec::new();
    for day in 0u64..(5 * 365) {
        // a couple of orders every third day
        if day % 3 != 0 {
            continue;
        }
        let season = 1.0 + 0.35 * (2.0 * std::f64::consts::PI * (day as f64 - 60.0) / 365.25).sin();
        for (i, (name, base)) in categories.iter().enumerate() {
            let growth = 1.0 + day as f64 / 3650.0;
            dates.push(start + Days::new(day));
            price.push((base * season * growth / 10.0).round() * 10.0);
            quantity.push(1.0 + ((day as usize + i) % 4) as f64);
            category.push(name.to_string());
        }
    }

    Table::new()
        .with_column("order_date", Column::dates(dates))?
        .with_column("price", Column::Float(price))?
        .with_column("quantity", Column::Float(quantity))?
        .with_column("category_1", Column::Text(category))?
        .with_derived_product("total_price", "price", "quantity")
}

fn print_forecast(result: &ForecastTable, id: &str) {
    println!("{:>10} {:>12} {:>12} {:>12} {:>12}", "bucket", "value", "lower", "forecast", "upper");
    println!("{:-<62}", "");
    let fmt = |v: Option<f64>| v.map(|x| format!("{x:.0}")).unwrap_or_default();
    for row in result.rows_for(id).skip_while(|r| !r.is_forecast()) {
        println!(
            "{:>10} {:>12} {:>12} {:>12} {:>12}",
            row.time_bucket.to_string(),
            fmt(row.value),
            fmt(row.ci_lo),
            fmt(row.prediction),
            fmt(row.ci_hi)
        );
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "salescast=info".into()),
        )
        .init();

    println!("=== salescast: bike sales ===\n");
    let table = orders()?;
    println!("{} order rows", table.num_rows());

    // 1. Total revenue by month
    let monthly = SummarizeOptions::new(["total_price"])
        .date_column("order_date")
        .rule(Rule::MonthStart)
        .time_format(TimeFormat::Period);
    let total = summarize_by_time(&table, &monthly)?;
    println!("{} monthly buckets", total.num_rows());

    let revenue = total.column("total_price").unwrap_or_default();
    let flags = detect_outliers(revenue, 1.5, OutlierSide::Both)?;
    let outliers: Vec<String> = total
        .index()
        .iter()
        .zip(&flags)
        .filter(|(_, flag)| **flag)
        .filter_map(|(key, _)| key.time.map(|t| t.to_string()))
        .collect();
    println!("Outlier months: {outliers:?}");

    // 2. Total revenue forecast through the pipeline
    println!("\n--- Total revenue, next 12 months ---");
    let config = PipelineConfig::new(monthly.clone(), ForecastConfig::new(12, 12, 0.95))
        .with_series_id("Total Revenue");
    let total_forecast = run_pipeline(&table, &config)?;
    print_forecast(&total_forecast, "Total Revenue");

    // 3. One model per category, fitted in parallel
    println!("\n--- Revenue by category, next 6 quarters ---");
    let quarterly = SummarizeOptions::new(["total_price"])
        .date_column("order_date")
        .groups(["category_1"])
        .rule(Rule::QuarterStart);
    let by_category = summarize_by_time(&table, &quarterly)?;
    let config = ForecastConfig::new(6, 4, 0.9)
        .with_parallel(true)
        .with_failure_policy(FailurePolicy::Skip);
    let category_forecast = forecast_with(&by_category, &config)?;
    for model in category_forecast.models() {
        println!("{:<12} {} ({} quarters)", model.series_id, model.order, model.observations);
    }
    for failure in category_forecast.failures() {
        println!("{:<12} skipped: {}", failure.series_id, failure.error);
    }
    print_forecast(&category_forecast, "Road");

    // 4. Persist both results
    let mut sink = MemorySink::new();
    sink.write(
        "total_revenue_forecast",
        &total_forecast.to_table("id", "date")?,
        "id",
        "date",
        IfExists::Replace,
    )?;
    sink.write(
        "category_forecast",
        &category_forecast.to_table("id", "date")?,
        "id",
        "date",
        IfExists::Replace,
    )?;
    println!("\nStored tables: {:?}", sink.table_names());

    Ok(())
}
