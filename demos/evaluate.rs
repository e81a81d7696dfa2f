//! Forecast and evaluate a synthetic monthly sales column.
//!
//! ```sh
//! RUST_LOG=multiforecast=debug cargo run --example evaluate
//! ```

use chrono::{Duration, TimeZone, Utc};
use multiforecast::prelude::*;
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "multiforecast=info".into()),
        )
        .init();

    let store = MemoryStore::new();
    let start = Utc.with_ymd_and_hms(2018, 1, 1, 0, 0, 0)
        .single()
        .ok_or("invalid start date")?;
    store.insert_rows(
        "retail",
        (0..96).map(|i| {
            let trend = 500.0 + 2.5 * i as f64;
            let season = 40.0 * (2.0 * std::f64::consts::PI * i as f64 / 12.0).sin();
            let noise = 6.0 * (i as f64 * 2.3).sin();
            (
                start + Duration::days(30 * i),
                json!({"sales": trend + season + noise, "region": "north"}),
            )
        }),
    );

    let outcomes = Orchestrator::new().forecast(&store, "retail", "sales", 6)?;
    println!("forecasts:\n{}", serde_json::to_string_pretty(&outcomes)?);

    let evaluator = Evaluator::new(&store).with_config(EvaluationConfig::default().with_holdout(true));
    let evaluation = evaluator.evaluate("retail", "sales")?;
    println!("evaluation:\n{}", serde_json::to_string_pretty(&evaluation)?);

    if let Some((best, metrics)) = evaluation.best() {
        println!("best model: {best} (MAE {:.2}, RMSE {:.2})", metrics.mae, metrics.rmse);
    }
    Ok(())
}
