use super::Arrival;

/// Maximum number of arrivals returned to a caller.
pub const MAX_ARRIVALS: usize = 8;

/// Sorted, capped arrivals plus the distinct line labels of the uncapped set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedArrivals {
    pub arrivals: Vec<Arrival>,
    pub lines: Vec<String>,
}

/// Sort ascending by minutes-until-arrival and cap the list.
///
/// The sort is stable, so equal-minute arrivals keep their feed order. The
/// line set is derived from the full list before capping: a line whose only
/// vehicle falls past the cap is still reported as active.
pub fn rank(mut arrivals: Vec<Arrival>) -> RankedArrivals {
    arrivals.sort_by_key(|a| a.in_minutes);

    let mut lines: Vec<String> = Vec::new();
    for arrival in &arrivals {
        if !arrival.line.is_empty() && !lines.contains(&arrival.line) {
            lines.push(arrival.line.clone());
        }
    }

    arrivals.truncate(MAX_ARRIVALS);

    RankedArrivals { arrivals, lines }
}
