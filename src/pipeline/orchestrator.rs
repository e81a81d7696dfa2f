//! Fan-out of every registered strategy over one series.

use std::any::Any;
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::RecvTimeoutError;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::Span;

use super::strategy::{default_strategies, ForecastResult, ForecastStrategy, StrategyKind};
use crate::core::Series;
use crate::error::{ForecastError, Result};
use crate::provider::SeriesProvider;
use crate::utils::CancelFlag;

/// How strategies are scheduled.
#[derive(Debug, Clone, Default)]
pub struct OrchestratorConfig {
    /// Run strategies on the rayon pool instead of one after another.
    pub parallel: bool,
    /// Per-strategy wall-clock limit. Each strategy then runs on its own
    /// thread and anything still running at the deadline is reported as a
    /// failure. Stragglers are signalled through a shared [`CancelFlag`] and
    /// their threads wind down in the background.
    pub timeout: Option<Duration>,
}

impl OrchestratorConfig {
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Per-strategy results of one orchestrator run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelOutcomes(BTreeMap<StrategyKind, ForecastResult>);

impl ModelOutcomes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: StrategyKind, result: ForecastResult) -> Option<ForecastResult> {
        self.0.insert(kind, result)
    }

    pub fn get(&self, kind: StrategyKind) -> Option<&ForecastResult> {
        self.0.get(&kind)
    }

    pub fn contains(&self, kind: StrategyKind) -> bool {
        self.0.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, StrategyKind, ForecastResult> {
        self.0.iter()
    }

    /// Kinds whose result is a failure.
    pub fn failures(&self) -> impl Iterator<Item = (StrategyKind, &str)> + '_ {
        self.0
            .iter()
            .filter_map(|(kind, result)| result.reason().map(|r| (*kind, r)))
    }
}

impl FromIterator<(StrategyKind, ForecastResult)> for ModelOutcomes {
    fn from_iter<I: IntoIterator<Item = (StrategyKind, ForecastResult)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for ModelOutcomes {
    type Item = (StrategyKind, ForecastResult);
    type IntoIter = btree_map::IntoIter<StrategyKind, ForecastResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ModelOutcomes {
    type Item = (&'a StrategyKind, &'a ForecastResult);
    type IntoIter = btree_map::Iter<'a, StrategyKind, ForecastResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Runs every registered strategy against the same series.
///
/// Strategies never see each other's state: each gets a shared read-only
/// view of the series and returns its own [`ForecastResult`]. A strategy
/// that panics, returns too few points or overruns the timeout is
/// recorded as a failure and the others are unaffected.
pub struct Orchestrator {
    strategies: Vec<Arc<dyn ForecastStrategy>>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Orchestrator with the four default strategies, run sequentially.
    pub fn new() -> Self {
        let mut orchestrator = Self::empty();
        for strategy in default_strategies() {
            orchestrator.register(strategy);
        }
        orchestrator
    }

    /// Orchestrator with no strategies registered.
    pub fn empty() -> Self {
        Self {
            strategies: Vec::new(),
            config: OrchestratorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Add a strategy, replacing any registered strategy of the same kind.
    pub fn register<S: ForecastStrategy + 'static>(&mut self, strategy: S) -> &mut Self {
        let kind = strategy.kind();
        self.strategies.retain(|s| s.kind() != kind);
        self.strategies.push(Arc::new(strategy));
        self
    }

    pub fn kinds(&self) -> Vec<StrategyKind> {
        self.strategies.iter().map(|s| s.kind()).collect()
    }

    /// Load `column` of `dataset` and forecast it `steps` ahead with every
    /// strategy.
    ///
    /// Only loading errors and a zero horizon fail the call; strategy
    /// problems end up inside the returned map.
    pub fn forecast<P>(&self, provider: &P, dataset: &str, column: &str, steps: usize) -> Result<ModelOutcomes>
    where
        P: SeriesProvider + ?Sized,
    {
        let span = tracing::info_span!("forecast", dataset, column, steps);
        let _guard = span.enter();

        if steps == 0 {
            return Err(ForecastError::InvalidParameter(
                "steps must be positive".to_string(),
            ));
        }

        let series = provider.series(dataset, column).map_err(|e| {
            tracing::error!(error = %e, "failed to load series");
            e
        })?;
        tracing::info!(rows = series.len(), "series loaded");

        Ok(self.run_all(&series, steps))
    }

    /// Run every strategy on `series`. Always returns one entry per
    /// registered strategy.
    pub fn run_all(&self, series: &Series, steps: usize) -> ModelOutcomes {
        let cancel = CancelFlag::new();
        match self.config.timeout {
            Some(timeout) => self.run_with_deadline(series, steps, timeout),
            None if self.config.parallel => {
                let span = Span::current();
                self.strategies
                    .par_iter()
                    .map(|strategy| {
                        let _guard = span.enter();
                        let result = run_isolated(strategy.as_ref(), series, steps, &cancel);
                        (strategy.kind(), result)
                    })
                    .collect::<Vec<_>>()
                    .into_iter()
                    .collect()
            }
            None => self
                .strategies
                .iter()
                .map(|strategy| {
                    (strategy.kind(), run_isolated(strategy.as_ref(), series, steps, &cancel))
                })
                .collect(),
        }
    }

    fn run_with_deadline(&self, series: &Series, steps: usize, timeout: Duration) -> ModelOutcomes {
        let series = Arc::new(series.clone());
        let (tx, rx) = crossbeam_channel::unbounded();
        let span = Span::current();
        let cancel = CancelFlag::new();
        let mut outcomes = ModelOutcomes::new();
        let mut pending = 0usize;

        for strategy in &self.strategies {
            let kind = strategy.kind();
            let strategy = Arc::clone(strategy);
            let series = Arc::clone(&series);
            let tx = tx.clone();
            let span = span.clone();
            let cancel = cancel.clone();

            let spawned = thread::Builder::new()
                .name(format!("forecast-{kind}"))
                .spawn(move || {
                    let _guard = span.enter();
                    let result = run_isolated(strategy.as_ref(), &series, steps, &cancel);
                    // Receiver is gone once the deadline passed
                    let _ = tx.send((kind, result));
                });

            match spawned {
                Ok(_) => pending += 1,
                Err(e) => {
                    tracing::error!(strategy = %kind, error = %e, "failed to spawn strategy thread");
                    outcomes.insert(kind, ForecastResult::failure(format!("{kind} failed")));
                }
            }
        }
        drop(tx);

        let deadline = Instant::now() + timeout;
        while pending > 0 {
            match rx.recv_deadline(deadline) {
                Ok((kind, result)) => {
                    outcomes.insert(kind, result);
                    pending -= 1;
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        if pending > 0 {
            cancel.cancel();
        }
        for strategy in &self.strategies {
            let kind = strategy.kind();
            if !outcomes.contains(kind) {
                tracing::warn!(strategy = %kind, timeout_ms = timeout.as_millis() as u64, "strategy timed out");
                outcomes.insert(
                    kind,
                    ForecastResult::failure(format!("{kind} timed out after {} ms", timeout.as_millis())),
                );
            }
        }
        outcomes
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("strategies", &self.kinds())
            .field("config", &self.config)
            .finish()
    }
}

/// Run one strategy behind a panic boundary and check its length.
fn run_isolated(
    strategy: &dyn ForecastStrategy,
    series: &Series,
    steps: usize,
    cancel: &CancelFlag,
) -> ForecastResult {
    let kind = strategy.kind();
    let started = Instant::now();

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        strategy.forecast_with_cancel(series, steps, cancel)
    }))
        .unwrap_or_else(|payload| {
            tracing::error!(strategy = %kind, panic = %panic_message(payload.as_ref()), "strategy panicked");
            ForecastResult::failure(format!("{kind} failed"))
        });

    let result = match result.points() {
        Some(points) if points.len() != steps => {
            tracing::warn!(strategy = %kind, expected = steps, got = points.len(), "forecast has wrong length");
            ForecastResult::failure(format!("{kind} failed"))
        }
        _ => result,
    };

    tracing::debug!(
        strategy = %kind,
        elapsed_ms = started.elapsed().as_millis() as u64,
        failed = result.is_failure(),
        "strategy finished"
    );
    result
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::strategy::ForecastPoint;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};

    fn series(n: usize) -> Series {
        let start = Utc.with_ymd_and_hms(2021, 6, 1, 0, 0, 0).unwrap();
        let values: Vec<f64> = (0..n).map(|i| 10.0 + (i as f64 * 0.3).sin()).collect();
        Series::regular(start, ChronoDuration::hours(1), &values)
    }

    struct Constant {
        kind: StrategyKind,
        len_offset: isize,
    }

    impl ForecastStrategy for Constant {
        fn kind(&self) -> StrategyKind {
            self.kind
        }

        fn forecast(&self, _series: &Series, steps: usize) -> ForecastResult {
            let n = (steps as isize + self.len_offset).max(0) as usize;
            ForecastResult::Points(
                (1..=n)
                    .map(|step| ForecastPoint {
                        step,
                        point: 1.0,
                        lower: None,
                        upper: None,
                    })
                    .collect(),
            )
        }
    }

    struct Panicking(StrategyKind);

    impl ForecastStrategy for Panicking {
        fn kind(&self) -> StrategyKind {
            self.0
        }

        fn forecast(&self, _series: &Series, _steps: usize) -> ForecastResult {
            panic!("boom")
        }
    }

    fn constant(kind: StrategyKind) -> Constant {
        Constant { kind, len_offset: 0 }
    }

    #[test]
    fn register_replaces_same_kind() {
        let mut orchestrator = Orchestrator::new();
        assert_eq!(orchestrator.kinds().len(), 4);

        orchestrator.register(constant(StrategyKind::Sarima));
        assert_eq!(orchestrator.kinds().len(), 4);
        assert!(orchestrator.kinds().contains(&StrategyKind::Sarima));
    }

    #[test]
    fn panic_is_contained() {
        let mut orchestrator = Orchestrator::empty();
        orchestrator
            .register(constant(StrategyKind::Arima))
            .register(Panicking(StrategyKind::Sarima));

        let outcomes = orchestrator.run_all(&series(20), 3);
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes.get(StrategyKind::Arima).unwrap().points().unwrap().len(), 3);
        assert_eq!(
            outcomes.get(StrategyKind::Sarima),
            Some(&ForecastResult::failure("SARIMA failed"))
        );
    }

    #[test]
    fn short_forecast_becomes_failure() {
        let mut orchestrator = Orchestrator::empty();
        orchestrator.register(Constant {
            kind: StrategyKind::XGBoostLagged,
            len_offset: -1,
        });

        let outcomes = orchestrator.run_all(&series(20), 4);
        assert_eq!(
            outcomes.get(StrategyKind::XGBoostLagged).and_then(|r| r.reason()),
            Some("XGBoost failed")
        );
    }

    #[test]
    fn parallel_matches_sequential_for_deterministic_strategies() {
        let build = |parallel| {
            let mut o = Orchestrator::empty().with_config(OrchestratorConfig::default().with_parallel(parallel));
            o.register(constant(StrategyKind::Arima))
                .register(constant(StrategyKind::RandomForestLagged))
                .register(Panicking(StrategyKind::Sarima));
            o
        };
        let s = series(15);
        assert_eq!(build(true).run_all(&s, 5), build(false).run_all(&s, 5));
    }

    #[test]
    fn failures_iterator_lists_reasons() {
        let outcomes: ModelOutcomes = vec![
            (StrategyKind::Arima, ForecastResult::failure("ARIMA failed")),
            (StrategyKind::Sarima, ForecastResult::Points(vec![])),
        ]
        .into_iter()
        .collect();
        let failures: Vec<_> = outcomes.failures().collect();
        assert_eq!(failures, vec![(StrategyKind::Arima, "ARIMA failed")]);
    }

    #[test]
    fn panic_messages_are_extracted() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
