//! Polynomial gap filling
//!
//! Opening and closing prices are fitted independently, one fit per run
//! of missing values. Each fit uses only the known values around its run:
//! up to `degree + 1` on either side, so a gap follows its own neighbours
//! rather than the trend of the whole window. The independent variable is
//! the row position, mapped onto [-1, 1] across the neighbourhood;
//! coefficients come from least squares (normal equations, Gaussian
//! elimination with partial pivoting). Known prices are kept as they are
//! apart from rounding.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::debug;

use series_common::data::{Sample, WindowRow};
use series_common::error::{ErrorCategory, ErrorClassification};

/// Decimal places kept on persisted prices
pub const PRICE_DP: u32 = 2;

const PIVOT_EPSILON: f64 = 1e-12;

/// Interpolation errors
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum InterpolationError {
    /// Fewer known values than coefficients to determine
    #[error("Insufficient data for {series} fit: {known} known values, degree {degree} needs {required}")]
    InsufficientData {
        series: &'static str,
        known: usize,
        degree: usize,
        required: usize,
    },

    /// Normal equations could not be solved
    #[error("Singular system while fitting {series}")]
    Singular { series: &'static str },

    /// Fitted value is NaN, infinite or out of decimal range
    #[error("Non-finite fitted {series} value at position {position}")]
    NonFinite {
        series: &'static str,
        position: usize,
    },
}

impl ErrorClassification for InterpolationError {
    fn category(&self) -> ErrorCategory {
        ErrorCategory::Permanent
    }
}

/// Fills placeholder prices with a fitted polynomial
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interpolator {
    degree: usize,
}

impl Interpolator {
    pub fn new(degree: usize) -> Self {
        Self { degree }
    }

    /// Fill every missing price and return the persistable rows.
    ///
    /// Context rows take part in the fit and are then dropped, so the
    /// output has exactly one sample per slot row, in order.
    pub fn fill(&self, rows: Vec<WindowRow>) -> Result<Vec<Sample>, InterpolationError> {
        let openings: Vec<Option<Decimal>> = rows.iter().map(WindowRow::opening).collect();
        let closings: Vec<Option<Decimal>> = rows.iter().map(WindowRow::closing).collect();

        let openings = self.fill_series("opening", &openings)?;
        let closings = self.fill_series("closing", &closings)?;

        let samples: Vec<Sample> = rows
            .into_iter()
            .zip(openings.into_iter().zip(closings))
            .filter_map(|(row, (opening, closing))| match row {
                WindowRow::Slot(slot) => Some(Sample::new(
                    slot.unit,
                    slot.timestamp,
                    opening,
                    closing,
                    slot.synthetic,
                )),
                WindowRow::Context(_) => None,
            })
            .collect();

        Ok(samples)
    }

    fn fill_series(
        &self,
        series: &'static str,
        values: &[Option<Decimal>],
    ) -> Result<Vec<Decimal>, InterpolationError> {
        let mut filled: Vec<Decimal> = values
            .iter()
            .map(|v| v.map(round_price).unwrap_or_default())
            .collect();

        let known: Vec<usize> = values
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.map(|_| i))
            .collect();
        if known.len() == values.len() {
            return Ok(filled);
        }

        let required = self.degree + 1;
        if known.len() < required {
            return Err(InterpolationError::InsufficientData {
                series,
                known: known.len(),
                degree: self.degree,
                required,
            });
        }

        let mut runs = 0usize;
        for (first, last) in missing_runs(values) {
            let neighbours = self.neighbourhood(&known, first);
            let lo = neighbours.first().map_or(first, |&p| p.min(first));
            let hi = neighbours.last().map_or(last, |&p| p.max(last));

            let points: Vec<(f64, f64)> = neighbours
                .iter()
                .filter_map(|&p| {
                    values[p]
                        .and_then(|d| d.to_f64())
                        .map(|y| (scale_position(p, lo, hi), y))
                })
                .collect();
            if points.len() < required {
                return Err(InterpolationError::InsufficientData {
                    series,
                    known: points.len(),
                    degree: self.degree,
                    required,
                });
            }

            let coefficients = fit_polynomial(&points, self.degree)
                .ok_or(InterpolationError::Singular { series })?;

            for position in first..=last {
                let y = evaluate(&coefficients, scale_position(position, lo, hi));
                if !y.is_finite() {
                    return Err(InterpolationError::NonFinite { series, position });
                }
                filled[position] = Decimal::from_f64_retain(y)
                    .map(round_price)
                    .ok_or(InterpolationError::NonFinite { series, position })?;
            }
            runs += 1;
        }

        debug!(
            series,
            known = known.len(),
            filled = values.len() - known.len(),
            runs,
            degree = self.degree,
            "Interpolated series"
        );

        Ok(filled)
    }

    /// Up to `degree + 1` known positions on each side of the run that
    /// starts at `first`, ascending.
    fn neighbourhood<'a>(&self, known: &'a [usize], first: usize) -> &'a [usize] {
        let per_side = self.degree + 1;
        let split = known.partition_point(|&p| p < first);
        let from = split.saturating_sub(per_side);
        let to = (split + per_side).min(known.len());
        &known[from..to]
    }
}

/// Inclusive `(first, last)` positions of each run of missing values
fn missing_runs(values: &[Option<Decimal>]) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut open: Option<usize> = None;
    for (i, v) in values.iter().enumerate() {
        match (v.is_none(), open) {
            (true, None) => open = Some(i),
            (false, Some(first)) => {
                runs.push((first, i - 1));
                open = None;
            }
            _ => {}
        }
    }
    if let Some(first) = open {
        runs.push((first, values.len() - 1));
    }
    runs
}

/// Round half to even at [`PRICE_DP`]
fn round_price(value: Decimal) -> Decimal {
    value.round_dp(PRICE_DP)
}

/// Map `position` in `[lo, hi]` onto [-1, 1]
fn scale_position(position: usize, lo: usize, hi: usize) -> f64 {
    let center = (lo + hi) as f64 / 2.0;
    let half_span = ((hi - lo) as f64 / 2.0).max(1.0);
    (position as f64 - center) / half_span
}

fn evaluate(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

/// Least-squares coefficients, lowest power first
fn fit_polynomial(points: &[(f64, f64)], degree: usize) -> Option<Vec<f64>> {
    let m = degree + 1;

    // Augmented normal equations [AᵀA | Aᵀy]
    let mut system = vec![vec![0.0f64; m + 1]; m];
    for &(x, y) in points {
        let mut powers = vec![1.0f64; 2 * m - 1];
        for k in 1..powers.len() {
            powers[k] = powers[k - 1] * x;
        }
        for (row, equation) in system.iter_mut().enumerate() {
            for col in 0..m {
                equation[col] += powers[row + col];
            }
            equation[m] += powers[row] * y;
        }
    }

    solve(system)
}

fn solve(mut system: Vec<Vec<f64>>) -> Option<Vec<f64>> {
    let n = system.len();

    for col in 0..n {
        let pivot = (col..n).max_by(|&a, &b| {
            system[a][col]
                .abs()
                .partial_cmp(&system[b][col].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;
        if system[pivot][col].abs() < PIVOT_EPSILON {
            return None;
        }
        system.swap(col, pivot);

        let pivot_row = system[col].clone();
        for equation in system.iter_mut().skip(col + 1) {
            let factor = equation[col] / pivot_row[col];
            if factor == 0.0 {
                continue;
            }
            for k in col..=n {
                equation[k] -= factor * pivot_row[k];
            }
        }
    }

    let mut solution = vec![0.0f64; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| system[row][k] * solution[k]).sum();
        solution[row] = (system[row][n] - tail) / system[row][row];
    }

    solution.iter().all(|c| c.is_finite()).then_some(solution)
}
