//! Pipeline stages of a refresh cycle
//!
//! Every stage here is a pure function over in-memory data. The
//! orchestrator owns all I/O and feeds each stage what it needs:
//!
//! 1. [`watermark`]: where each instrument's fetch starts
//! 2. [`normalizer`]: hour-aligned, gap-free window with placeholders
//! 3. [`augmenter`]: optional fitting context from persisted history
//! 4. [`interpolation`]: polynomial gap filling and context removal
//! 5. [`rolling`]: daily rolling return at each day boundary

pub mod augmenter;
pub mod interpolation;
pub mod normalizer;
pub mod rolling;
pub mod watermark;

pub use augmenter::{augment, needs_context};
pub use interpolation::{InterpolationError, Interpolator};
pub use normalizer::{normalize, NormalizedWindow};
pub use rolling::{compute_daily_return, window_bounds, RollingReturnError};
pub use watermark::resolve_watermarks;
