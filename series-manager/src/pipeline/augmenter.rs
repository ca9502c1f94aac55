//! Fitting context for short windows with gaps
//!
//! A short window has too few real points for a stable fit. Recent
//! persisted real samples are prepended as price-only context rows; the
//! interpolator drops them again before anything is persisted.

use series_common::data::{ContextSample, PendingSample, Sample, WindowRow};

use super::normalizer::NormalizedWindow;

/// Whether `window` should borrow context before interpolation
pub fn needs_context(window: &NormalizedWindow, trigger_len: usize) -> bool {
    window.has_synthetic && window.len() <= trigger_len
}

/// Build the interpolation working set.
///
/// `context` may come in any order (the store hands it out newest first);
/// it is prepended oldest first so positions keep their time order.
pub fn augment(rows: Vec<PendingSample>, context: &[Sample]) -> Vec<WindowRow> {
    let mut history: Vec<&Sample> = context.iter().collect();
    history.sort_by_key(|s| s.datetime);

    let mut out = Vec::with_capacity(history.len() + rows.len());
    out.extend(
        history
            .into_iter()
            .map(|s| WindowRow::Context(ContextSample::from(s))),
    );
    out.extend(rows.into_iter().map(WindowRow::Slot));
    out
}
