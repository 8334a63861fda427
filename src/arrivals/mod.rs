//! The arrival-correlation pipeline.
//!
//! Pure functions joining decoded trip updates against the static reference
//! index: correlation produces one `Arrival` per matched, not-yet-passed
//! stop-time prediction; ranking sorts, derives the active line set, and caps
//! the list.

pub mod correlate;
pub mod rank;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One predicted arrival at the target stop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Arrival {
    /// Route label: short name, falling back to the raw route id, then "?".
    pub line: String,
    /// Vehicle headsign, when the feed provides one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    /// Whole minutes until the predicted arrival; never negative.
    pub in_minutes: i64,
}
