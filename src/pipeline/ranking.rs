//! Ordering of strategies by forecast error.

use crate::utils::MetricsOutcome;

/// Rank entries ascending by `(MAE, RMSE)`.
///
/// The sort is stable, so exact ties keep their input order. Entries
/// without metrics follow all scored entries, also in input order.
///
/// # Example
/// ```
/// use multiforecast::pipeline::rank_models;
/// use multiforecast::utils::{Metrics, MetricsOutcome};
///
/// let scored = |mae, rmse| MetricsOutcome::Scored(Metrics { mae, rmse, mape: 0.0 });
/// let ranked = rank_models(vec![
///     ("A", scored(1.0, 2.0)),
///     ("B", scored(1.0, 1.0)),
///     ("C", MetricsOutcome::failure("forecast generation failed")),
/// ]);
/// let order: Vec<_> = ranked.iter().map(|(k, _)| *k).collect();
/// assert_eq!(order, ["B", "A", "C"]);
/// ```
pub fn rank_models<K, I>(entries: I) -> Vec<(K, MetricsOutcome)>
where
    I: IntoIterator<Item = (K, MetricsOutcome)>,
{
    let (mut scored, failed): (Vec<_>, Vec<_>) = entries
        .into_iter()
        .partition(|(_, outcome)| outcome.metrics().is_some());

    scored.sort_by(|(_, a), (_, b)| match (a.metrics(), b.metrics()) {
        (Some(a), Some(b)) => a.mae.total_cmp(&b.mae).then(a.rmse.total_cmp(&b.rmse)),
        _ => std::cmp::Ordering::Equal,
    });

    scored.extend(failed);
    scored
}
