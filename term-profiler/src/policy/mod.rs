//! Pure profiling policies.
//!
//! - [`eligibility`]: decides whether a table is profiled or skipped.
//! - [`sampling`]: decides whether and how a table is sampled.
//!
//! Neither module performs side effects; counters and logging belong to the
//! orchestrator.

pub mod eligibility;
pub mod sampling;

pub use eligibility::{Decision, EligibilityFilter, SkipReason};
pub use sampling::{plan_sampling, SamplingPlan, SAMPLE_FRACTION_PRECISION};
