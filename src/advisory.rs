//! Leave-by advisory calculation.
//!
//! Pure and stateless: recomputed per arrival on every render from the
//! caller's current walk and buffer minutes, never cached and never sent to
//! the server.

use serde::{Deserialize, Serialize};

use crate::arrivals::Arrival;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    /// The vehicle cannot be reached anymore.
    Late,
    /// Leaving right now makes it exactly.
    Now,
    /// There is slack before leaving.
    Ok,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advice {
    pub leave_in_minutes: i64,
    pub tone: Tone,
    pub label: String,
}

/// Compute the leave-by recommendation for one arrival.
///
/// `leave_in = in_minutes − (walk + buffer)`; negative means the vehicle is
/// already out of reach.
pub fn advice_for(in_minutes: i64, walk_minutes: i64, buffer_minutes: i64) -> Advice {
    let leave_in_minutes = in_minutes - (walk_minutes + buffer_minutes);
    let (tone, label) = if leave_in_minutes < 0 {
        (Tone::Late, "too late".to_string())
    } else if leave_in_minutes == 0 {
        (Tone::Now, "go now".to_string())
    } else {
        (Tone::Ok, format!("leave in {} min", leave_in_minutes))
    };
    Advice {
        leave_in_minutes,
        tone,
        label,
    }
}

/// Index of the first arrival in the rendered list that can still be caught.
///
/// Presentation concern: the highlighted card. Recomputed whenever walk or
/// buffer change.
pub fn first_catchable(
    arrivals: &[Arrival],
    walk_minutes: i64,
    buffer_minutes: i64,
) -> Option<usize> {
    arrivals
        .iter()
        .position(|a| advice_for(a.in_minutes, walk_minutes, buffer_minutes).tone != Tone::Late)
}

/// Same as [`first_catchable`], scoped to one line's subgroup of the list.
pub fn first_catchable_on_line(
    arrivals: &[Arrival],
    line: &str,
    walk_minutes: i64,
    buffer_minutes: i64,
) -> Option<usize> {
    arrivals.iter().position(|a| {
        a.line == line && advice_for(a.in_minutes, walk_minutes, buffer_minutes).tone != Tone::Late
    })
}
