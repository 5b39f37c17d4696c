//! Summary statistics of a simulated observation.

use serde::{Deserialize, Serialize};

use gammasim_types::ComponentId;

use crate::table::EventTable;

/// Counts, background and rates summed over the whole table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountsSummary {
    /// Object name of the table.
    pub name: String,
    /// Good-time duration in seconds.
    pub livetime: f64,
    /// Number of events.
    pub n_on: u64,
    /// Expected background counts.
    pub background: f64,
    /// `n_on - background`.
    pub excess: f64,
    /// Signed Cash significance of the excess.
    pub significance: f64,
    /// Background counts per second, if the good time is positive.
    pub background_rate: Option<f64>,
    /// Excess counts per second, if the good time is positive.
    pub gamma_rate: Option<f64>,
}

impl CountsSummary {
    /// Build a summary from raw totals.
    #[allow(clippy::cast_precision_loss)]
    pub fn new(name: impl Into<String>, n_on: u64, background: f64, livetime: f64) -> Self {
        let excess = n_on as f64 - background;
        let rate = |value: f64| (livetime > 0.0).then(|| value / livetime);
        Self {
            name: name.into(),
            livetime,
            n_on,
            background,
            excess,
            significance: cash_significance(n_on as f64, background),
            background_rate: rate(background),
            gamma_rate: rate(excess),
        }
    }

    /// Summarise an event table.
    ///
    /// The background is the expected count of the background component
    /// recorded in the table's bookkeeping (zero if the table has none), and
    /// the live time is the summed GTI duration.
    pub fn from_table(table: &EventTable) -> Self {
        let meta = table.meta();
        let background = meta
            .component(ComponentId::BACKGROUND)
            .map_or(0.0, |summary| summary.expected);
        let n_on = u64::try_from(table.len()).unwrap_or(u64::MAX);
        Self::new(meta.object_name.clone(), n_on, background, table.gti().time_sum())
    }
}

/// Background expectations below this are treated as this value.
const MIN_BACKGROUND: f64 = 1e-25;

/// Signed significance of `n_on` counts over a known background `mu_bkg`.
///
/// `sqrt(TS)` with `TS = 2 (n ln(n / mu) - (n - mu))`, carrying the sign
/// of `n_on - mu_bkg`. The `n ln n` term vanishes for `n_on = 0`, and a
/// zero background is floored so that any counts give a large but finite
/// value.
pub fn cash_significance(n_on: f64, mu_bkg: f64) -> f64 {
    let mu = mu_bkg.max(MIN_BACKGROUND);
    let log_term = if n_on > 0.0 { n_on * (n_on / mu).ln() } else { 0.0 };
    let ts = 2.0 * (log_term - (n_on - mu));
    let magnitude = ts.max(0.0).sqrt();
    let excess = n_on - mu_bkg;
    if excess > 0.0 {
        magnitude
    } else if excess < 0.0 {
        -magnitude
    } else {
        0.0
    }
}
