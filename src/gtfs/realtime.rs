use gtfs_realtime::trip_update::StopTimeEvent;
use prost::Message;
use tracing::debug;

use super::error::GtfsError;

/// Maximum allowed protobuf response size (50 MB)
const MAX_PROTOBUF_SIZE: usize = 50 * 1024 * 1024;

/// One per-stop prediction of a trip update, with every loosely structured
/// wire field modeled as an explicit option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopPrediction {
    pub stop_id: String,
    pub arrival_epoch: Option<i64>,
    pub departure_epoch: Option<i64>,
    pub headsign: Option<String>,
}

/// One decoded trip update. Transient: produced per feed fetch, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripUpdateRecord {
    pub route_id: String,
    pub trip_headsign: Option<String>,
    pub predictions: Vec<StopPrediction>,
}

/// Fetch and decode the GTFS-RT trip-updates protobuf feed.
///
/// The request is explicitly uncached; the feed is a snapshot and every
/// correlation cycle needs a fresh one. No retry here — the caller's next
/// poll is the retry.
pub async fn fetch_feed(
    client: &reqwest::Client,
    url: &str,
) -> Result<gtfs_realtime::FeedMessage, GtfsError> {
    let response = client
        .get(url)
        .header(reqwest::header::CACHE_CONTROL, "no-cache")
        .timeout(std::time::Duration::from_secs(30))
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(GtfsError::NetworkMessage(format!(
            "GTFS-RT HTTP {}",
            response.status()
        )));
    }

    let bytes = response.bytes().await?;

    if bytes.len() > MAX_PROTOBUF_SIZE {
        return Err(GtfsError::NetworkMessage(format!(
            "GTFS-RT response too large: {} bytes (max {} bytes)",
            bytes.len(),
            MAX_PROTOBUF_SIZE
        )));
    }

    gtfs_realtime::FeedMessage::decode(bytes.as_ref()).map_err(GtfsError::from)
}

/// Convert the raw feed into typed trip-update records.
///
/// Entities without a trip update and stop-time updates without a stop id are
/// dropped; they cannot take part in stop matching.
pub fn decode_trip_updates(feed: &gtfs_realtime::FeedMessage) -> Vec<TripUpdateRecord> {
    let mut records = Vec::new();

    for entity in &feed.entity {
        let Some(trip_update) = &entity.trip_update else {
            continue;
        };

        let route_id = trip_update.trip.route_id.clone().unwrap_or_default();
        let trip_headsign = trip_update
            .trip_properties
            .as_ref()
            .and_then(|p| p.trip_headsign.clone())
            .filter(|h| !h.is_empty());

        let predictions = trip_update
            .stop_time_update
            .iter()
            .filter_map(|stu| {
                let stop_id = stu.stop_id.clone()?;
                Some(StopPrediction {
                    stop_id,
                    arrival_epoch: event_epoch_seconds(stu.arrival.as_ref()),
                    departure_epoch: event_epoch_seconds(stu.departure.as_ref()),
                    headsign: stu
                        .stop_time_properties
                        .as_ref()
                        .and_then(|p| p.stop_headsign.clone())
                        .filter(|h| !h.is_empty()),
                })
            })
            .collect();

        records.push(TripUpdateRecord {
            route_id,
            trip_headsign,
            predictions,
        });
    }

    debug!(
        entities = feed.entity.len(),
        trip_updates = records.len(),
        "Decoded GTFS-RT feed"
    );

    records
}

/// Normalize a stop-time event to canonical integer epoch-seconds.
///
/// The feed expresses the prediction either as an absolute `time` or, for
/// unpredicted stops, only as `scheduled_time`; both collapse to one value
/// here. Zero is treated as absent, matching feeds that emit unset fields
/// as 0.
pub fn event_epoch_seconds(event: Option<&StopTimeEvent>) -> Option<i64> {
    let event = event?;
    event.time.or(event.scheduled_time).filter(|&t| t > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gtfs_realtime::trip_update::stop_time_update::StopTimeProperties;
    use gtfs_realtime::trip_update::{StopTimeUpdate, TripProperties};
    use gtfs_realtime::{FeedEntity, FeedMessage, TripDescriptor, TripUpdate};

    fn event(time: Option<i64>, scheduled_time: Option<i64>) -> StopTimeEvent {
        StopTimeEvent {
            time,
            scheduled_time,
            ..Default::default()
        }
    }

    fn stop_time_update(
        stop_id: Option<&str>,
        arrival: Option<StopTimeEvent>,
        departure: Option<StopTimeEvent>,
    ) -> StopTimeUpdate {
        StopTimeUpdate {
            stop_id: stop_id.map(|s| s.to_string()),
            arrival,
            departure,
            ..Default::default()
        }
    }

    fn trip_update_entity(
        id: &str,
        route_id: Option<&str>,
        trip_headsign: Option<&str>,
        stop_time_updates: Vec<StopTimeUpdate>,
    ) -> FeedEntity {
        FeedEntity {
            id: id.to_string(),
            trip_update: Some(TripUpdate {
                trip: TripDescriptor {
                    route_id: route_id.map(|r| r.to_string()),
                    ..Default::default()
                },
                trip_properties: trip_headsign.map(|h| TripProperties {
                    trip_headsign: Some(h.to_string()),
                    ..Default::default()
                }),
                stop_time_update: stop_time_updates,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn feed(entities: Vec<FeedEntity>) -> FeedMessage {
        FeedMessage {
            header: gtfs_realtime::FeedHeader {
                gtfs_realtime_version: "2.0".to_string(),
                ..Default::default()
            },
            entity: entities,
            ..Default::default()
        }
    }

    // --- event_epoch_seconds: both wire shapes normalize to one value ---

    #[test]
    fn epoch_from_absolute_time() {
        let e = event(Some(1_700_000_000), None);
        assert_eq!(event_epoch_seconds(Some(&e)), Some(1_700_000_000));
    }

    #[test]
    fn epoch_falls_back_to_scheduled_time() {
        let e = event(None, Some(1_700_000_300));
        assert_eq!(event_epoch_seconds(Some(&e)), Some(1_700_000_300));
    }

    #[test]
    fn epoch_prefers_absolute_over_scheduled() {
        let e = event(Some(1_700_000_000), Some(1_700_000_300));
        assert_eq!(event_epoch_seconds(Some(&e)), Some(1_700_000_000));
    }

    #[test]
    fn epoch_zero_and_absent_are_none() {
        assert_eq!(event_epoch_seconds(None), None);
        assert_eq!(event_epoch_seconds(Some(&event(None, None))), None);
        assert_eq!(event_epoch_seconds(Some(&event(Some(0), None))), None);
    }

    // --- decode_trip_updates ---

    #[test]
    fn decodes_route_headsign_and_predictions() {
        let f = feed(vec![trip_update_entity(
            "e1",
            Some("R1"),
            Some("Business Park"),
            vec![stop_time_update(
                Some("A1"),
                Some(event(Some(1_700_000_000), None)),
                Some(event(Some(1_700_000_030), None)),
            )],
        )]);

        let records = decode_trip_updates(&f);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].route_id, "R1");
        assert_eq!(records[0].trip_headsign.as_deref(), Some("Business Park"));
        assert_eq!(
            records[0].predictions,
            vec![StopPrediction {
                stop_id: "A1".to_string(),
                arrival_epoch: Some(1_700_000_000),
                departure_epoch: Some(1_700_000_030),
                headsign: None,
            }]
        );
    }

    #[test]
    fn entities_without_trip_update_are_skipped() {
        let f = feed(vec![
            FeedEntity {
                id: "vehicle-only".to_string(),
                ..Default::default()
            },
            trip_update_entity("e2", Some("R4"), None, vec![]),
        ]);

        let records = decode_trip_updates(&f);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].route_id, "R4");
    }

    #[test]
    fn predictions_without_stop_id_are_dropped() {
        let f = feed(vec![trip_update_entity(
            "e1",
            Some("R1"),
            None,
            vec![
                stop_time_update(None, Some(event(Some(1_700_000_000), None)), None),
                stop_time_update(Some("A1"), Some(event(Some(1_700_000_060), None)), None),
            ],
        )]);

        let records = decode_trip_updates(&f);
        assert_eq!(records[0].predictions.len(), 1);
        assert_eq!(records[0].predictions[0].stop_id, "A1");
    }

    #[test]
    fn missing_route_id_becomes_empty_string() {
        let f = feed(vec![trip_update_entity("e1", None, None, vec![])]);
        let records = decode_trip_updates(&f);
        assert_eq!(records[0].route_id, "");
    }

    #[test]
    fn per_stop_headsign_is_taken_from_stop_time_properties() {
        let mut stu = stop_time_update(Some("A1"), Some(event(Some(1_700_000_000), None)), None);
        stu.stop_time_properties = Some(StopTimeProperties {
            stop_headsign: Some("ж.к. Люлин".to_string()),
            ..Default::default()
        });
        let f = feed(vec![trip_update_entity("e1", Some("R1"), Some("Depot"), vec![stu])]);

        let records = decode_trip_updates(&f);
        assert_eq!(
            records[0].predictions[0].headsign.as_deref(),
            Some("ж.к. Люлин")
        );
    }

    #[test]
    fn empty_per_stop_headsign_is_absent() {
        let mut stu = stop_time_update(Some("A1"), Some(event(Some(1_700_000_000), None)), None);
        stu.stop_time_properties = Some(StopTimeProperties {
            stop_headsign: Some(String::new()),
            ..Default::default()
        });
        let f = feed(vec![trip_update_entity("e1", Some("R1"), None, vec![stu])]);

        let records = decode_trip_updates(&f);
        assert_eq!(records[0].predictions[0].headsign, None);
    }

    #[test]
    fn empty_trip_headsign_is_absent() {
        let f = feed(vec![trip_update_entity("e1", Some("R1"), Some(""), vec![])]);
        let records = decode_trip_updates(&f);
        assert_eq!(records[0].trip_headsign, None);
    }

    #[test]
    fn round_trips_through_protobuf_bytes() {
        let f = feed(vec![trip_update_entity(
            "e1",
            Some("R1"),
            None,
            vec![stop_time_update(
                Some("A1"),
                Some(event(Some(1_700_000_000), None)),
                None,
            )],
        )]);

        let mut buf = Vec::new();
        f.encode(&mut buf).unwrap();
        let decoded = FeedMessage::decode(buf.as_slice()).unwrap();

        assert_eq!(decode_trip_updates(&decoded), decode_trip_updates(&f));
    }
}
