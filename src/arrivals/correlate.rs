use std::collections::{HashMap, HashSet};

use crate::gtfs::realtime::TripUpdateRecord;
use crate::gtfs::reference::RouteRecord;

use super::Arrival;

/// Label used when neither a short name nor a route id is available.
pub const UNKNOWN_LINE: &str = "?";

/// Join decoded trip updates against the target stop set and route index.
///
/// Pure function of its inputs; `now_epoch` is the evaluation time in
/// epoch-seconds. Emits one `Arrival` per surviving (trip, stop-time) pair,
/// in feed order, with no deduplication across trips — two vehicles of the
/// same line are two arrivals.
pub fn correlate(
    updates: &[TripUpdateRecord],
    target_stop_ids: &HashSet<String>,
    routes: &HashMap<String, RouteRecord>,
    now_epoch: i64,
) -> Vec<Arrival> {
    let mut arrivals = Vec::new();

    for update in updates {
        let line = resolve_line(&update.route_id, routes);

        for prediction in &update.predictions {
            if !target_stop_ids.contains(&prediction.stop_id) {
                continue;
            }

            // arrival is authoritative; departure is the fallback
            let Some(t) = prediction.arrival_epoch.or(prediction.departure_epoch) else {
                continue;
            };

            let delta_sec = t - now_epoch;
            if delta_sec < 0 {
                // already departed; clamping to zero would misreport a
                // missed vehicle as imminent
                continue;
            }

            let in_minutes = ((delta_sec as f64 / 60.0).round() as i64).max(0);

            let direction = prediction
                .headsign
                .clone()
                .or_else(|| update.trip_headsign.clone());

            arrivals.push(Arrival {
                line: line.clone(),
                direction,
                in_minutes,
            });
        }
    }

    arrivals
}

/// Route label fallback chain: short name, raw route id, placeholder.
fn resolve_line(route_id: &str, routes: &HashMap<String, RouteRecord>) -> String {
    if let Some(route) = routes.get(route_id) {
        if !route.route_short_name.is_empty() {
            return route.route_short_name.clone();
        }
    }
    if !route_id.is_empty() {
        return route_id.to_string();
    }
    UNKNOWN_LINE.to_string()
}
