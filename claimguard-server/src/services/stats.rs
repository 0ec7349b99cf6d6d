//! Population statistics shared by Stage-1 and Stage-2
//!
//! Quantiles use linear interpolation between closest ranks:
//! position `q * (n - 1)` in the sorted sample.

use std::collections::HashMap;

/// Quantile of an ascending-sorted sample; None for an empty sample
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }

    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;

    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Quantile of an unsorted sample
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    quantile_sorted(&sorted, q)
}

pub fn median(values: &[f64]) -> Option<f64> {
    quantile(values, 0.5)
}

/// Arithmetic mean; None for an empty sample
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Quartiles of one procedure group's amounts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuartileStats {
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
}

impl QuartileStats {
    /// Multiplier on the IQR above Q3 beyond which an amount is an outlier
    pub const OUTLIER_IQR_MULTIPLIER: f64 = 3.0;

    pub fn from_amounts(amounts: &[f64]) -> Option<Self> {
        let mut sorted = amounts.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let q1 = quantile_sorted(&sorted, 0.25)?;
        let q3 = quantile_sorted(&sorted, 0.75)?;
        Some(Self { q1, q3, iqr: q3 - q1 })
    }

    /// `Q3 + 3 * IQR`
    pub fn outlier_threshold(&self) -> f64 {
        self.q3 + Self::OUTLIER_IQR_MULTIPLIER * self.iqr
    }

    /// Strictly above the threshold; undefined statistics never flag
    pub fn is_outlier(&self, amount: f64) -> bool {
        self.q3.is_finite() && self.iqr.is_finite() && amount > self.outlier_threshold()
    }
}

/// Quartiles per procedure code, computed over the whole population given
pub fn procedure_quartiles<'a, I>(rows: I) -> HashMap<String, QuartileStats>
where
    I: IntoIterator<Item = (&'a str, f64)>,
{
    let mut groups: HashMap<String, Vec<f64>> = HashMap::new();
    for (procedure, amount) in rows {
        groups.entry(procedure.to_string()).or_default().push(amount);
    }

    groups
        .into_iter()
        .filter_map(|(procedure, amounts)| {
            QuartileStats::from_amounts(&amounts).map(|stats| (procedure, stats))
        })
        .collect()
}
