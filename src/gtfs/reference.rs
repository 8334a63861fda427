use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Read, Seek};
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::error::GtfsError;

/// Maximum allowed download size for the static GTFS zip (200 MB)
const MAX_DOWNLOAD_SIZE: u64 = 200 * 1024 * 1024;

/// A physical stop from stops.txt.
#[derive(Debug, Clone)]
pub struct StopRecord {
    pub stop_id: String,
    pub stop_name: String,
}

/// A route from routes.txt.
#[derive(Debug, Clone)]
pub struct RouteRecord {
    pub route_id: String,
    pub route_short_name: String,
    pub route_long_name: String,
}

/// The in-memory static reference index.
///
/// Built once at startup; read-only afterwards. `target_stop_ids` holds every
/// stop whose name contains the configured target name — interchanges often
/// publish several platform stops under one display name, and the live feed
/// reports against each of them individually.
#[derive(Debug)]
pub struct ReferenceIndex {
    pub stops: HashMap<String, StopRecord>,
    pub routes: HashMap<String, RouteRecord>,
    pub target_stop_ids: HashSet<String>,
    pub loaded_at: chrono::DateTime<chrono::Utc>,
}

impl ReferenceIndex {
    /// Correlation needs at least one resolved target stop.
    pub fn is_ready(&self) -> bool {
        !self.target_stop_ids.is_empty()
    }
}

/// Shared reference store. `None` means the startup load has not completed
/// (or failed); consumers must treat that as not-ready, not as empty data.
/// The index itself is behind its own `Arc` so readers clone a handle out and
/// release the lock immediately instead of holding it across slow work.
pub type ReferenceStore = Arc<RwLock<Option<Arc<ReferenceIndex>>>>;

/// Download the static GTFS zip into memory.
pub async fn download_archive(
    client: &reqwest::Client,
    url: &str,
) -> Result<Vec<u8>, GtfsError> {
    let response = client
        .get(url)
        .timeout(std::time::Duration::from_secs(600))
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(GtfsError::NetworkMessage(format!(
            "GTFS static HTTP {}",
            response.status()
        )));
    }

    if let Some(content_length) = response.content_length() {
        if content_length > MAX_DOWNLOAD_SIZE {
            return Err(GtfsError::NetworkMessage(format!(
                "GTFS download too large: {} bytes (max {} bytes)",
                content_length, MAX_DOWNLOAD_SIZE
            )));
        }
    }

    let mut buf: Vec<u8> = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if buf.len() as u64 + chunk.len() as u64 > MAX_DOWNLOAD_SIZE {
            return Err(GtfsError::NetworkMessage(format!(
                "GTFS download exceeded size limit at {} bytes (max {} bytes)",
                buf.len() + chunk.len(),
                MAX_DOWNLOAD_SIZE
            )));
        }
        buf.extend_from_slice(&chunk);
    }

    info!(size_kb = buf.len() / 1024, "Downloaded static GTFS feed");
    Ok(buf)
}

/// Parse the zip and build the reference index (blocking — call on spawn_blocking).
///
/// Any failure aborts the whole build; a partial index is never produced.
pub fn build_index(zip_bytes: &[u8], target_stop_name: &str) -> Result<ReferenceIndex, GtfsError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(zip_bytes))?;

    let stops = parse_stops(&mut archive)?;
    info!(count = stops.len(), "Parsed GTFS stops");

    let routes = parse_routes(&mut archive)?;
    info!(count = routes.len(), "Parsed GTFS routes");

    let target_stop_ids = find_target_stops(&stops, target_stop_name);
    if target_stop_ids.is_empty() {
        warn!(
            target = target_stop_name,
            "No stop in stops.txt matches the target name; double-check the dataset"
        );
    } else {
        info!(
            target = target_stop_name,
            stop_ids = ?target_stop_ids,
            "Resolved target stop set"
        );
    }

    Ok(ReferenceIndex {
        stops,
        routes,
        target_stop_ids,
        loaded_at: chrono::Utc::now(),
    })
}

/// Collect every stop whose name contains the target name, case-insensitively.
/// Matching is deliberately inclusive so that no platform of an interchange is
/// missed; no transliteration or script normalization is applied.
fn find_target_stops(stops: &HashMap<String, StopRecord>, target_name: &str) -> HashSet<String> {
    let needle = target_name.to_lowercase();
    stops
        .values()
        .filter(|s| s.stop_name.to_lowercase().contains(&needle))
        .map(|s| s.stop_id.clone())
        .collect()
}

// --- CSV parsing ---

fn parse_stops<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
) -> Result<HashMap<String, StopRecord>, GtfsError> {
    info!("Parsing stops.txt");
    let file = archive.by_name("stops.txt")?;
    let mut rdr = csv::Reader::from_reader(file);
    let headers = rdr.headers()?.clone();

    let idx_id = headers
        .iter()
        .position(|h| h == "stop_id")
        .ok_or_else(|| GtfsError::ParseError("stops.txt missing stop_id".into()))?;
    let idx_name = headers.iter().position(|h| h == "stop_name");

    let mut stops = HashMap::new();
    let mut skipped = 0usize;
    for result in rdr.records() {
        let record = result?;
        let stop_id = record.get(idx_id).unwrap_or("").to_string();
        if stop_id.is_empty() {
            skipped += 1;
            continue;
        }
        stops.insert(
            stop_id.clone(),
            StopRecord {
                stop_id,
                stop_name: idx_name
                    .and_then(|i| record.get(i))
                    .unwrap_or("")
                    .trim()
                    .to_string(),
            },
        );
    }
    if skipped > 0 {
        warn!(skipped, "Skipped stops.txt records with empty stop_id");
    }
    Ok(stops)
}

fn parse_routes<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
) -> Result<HashMap<String, RouteRecord>, GtfsError> {
    info!("Parsing routes.txt");
    let file = archive.by_name("routes.txt")?;
    let mut rdr = csv::Reader::from_reader(file);
    let headers = rdr.headers()?.clone();

    let idx_id = headers
        .iter()
        .position(|h| h == "route_id")
        .ok_or_else(|| GtfsError::ParseError("routes.txt missing route_id".into()))?;
    let idx_short = headers.iter().position(|h| h == "route_short_name");
    let idx_long = headers.iter().position(|h| h == "route_long_name");

    let mut routes = HashMap::new();
    let mut skipped = 0usize;
    for result in rdr.records() {
        let record = result?;
        let route_id = record.get(idx_id).unwrap_or("").to_string();
        if route_id.is_empty() {
            skipped += 1;
            continue;
        }
        routes.insert(
            route_id.clone(),
            RouteRecord {
                route_id,
                route_short_name: idx_short
                    .and_then(|i| record.get(i))
                    .unwrap_or("")
                    .trim()
                    .to_string(),
                route_long_name: idx_long
                    .and_then(|i| record.get(i))
                    .unwrap_or("")
                    .trim()
                    .to_string(),
            },
        );
    }
    if skipped > 0 {
        warn!(skipped, "Skipped routes.txt records with empty route_id");
    }
    Ok(routes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn make_zip(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in entries {
            writer
                .start_file(name.to_string(), SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn sample_zip() -> Vec<u8> {
        make_zip(&[
            (
                "stops.txt",
                "stop_id,stop_name,stop_lat,stop_lon\n\
                 A1,Target Platform 1,42.69,23.31\n\
                 A2,Target Platform 2,42.69,23.32\n\
                 B1,Other Stop,42.70,23.33\n",
            ),
            (
                "routes.txt",
                "route_id,route_short_name,route_long_name\n\
                 R1,1,Line One\n\
                 R4,4,Line Four\n",
            ),
        ])
    }

    #[test]
    fn builds_index_and_resolves_all_matching_platforms() {
        let index = build_index(&sample_zip(), "target").unwrap();

        assert_eq!(index.stops.len(), 3);
        assert_eq!(index.routes.len(), 2);
        assert!(index.target_stop_ids.contains("A1"));
        assert!(index.target_stop_ids.contains("A2"));
        assert!(!index.target_stop_ids.contains("B1"));
        assert!(index.is_ready());

        assert_eq!(index.routes["R1"].route_short_name, "1");
        assert_eq!(index.routes["R4"].route_long_name, "Line Four");
    }

    #[test]
    fn target_matching_is_case_insensitive_substring() {
        let index = build_index(&sample_zip(), "TARGET PLATFORM 1").unwrap();
        assert_eq!(index.target_stop_ids.len(), 1);
        assert!(index.target_stop_ids.contains("A1"));
    }

    #[test]
    fn cyrillic_names_match_case_insensitively() {
        let zip = make_zip(&[
            (
                "stops.txt",
                "stop_id,stop_name\n1287,МЕТРОСТАНЦИЯ ВАРДАР\n1288,ВАРДАР\n2000,СЕРДИКА\n",
            ),
            ("routes.txt", "route_id,route_short_name,route_long_name\nR1,M1,Metro 1\n"),
        ]);
        let index = build_index(&zip, "вардар").unwrap();
        assert_eq!(index.target_stop_ids.len(), 2);
        assert!(index.target_stop_ids.contains("1287"));
        assert!(index.target_stop_ids.contains("1288"));
    }

    #[test]
    fn no_match_yields_empty_not_ready_set() {
        let index = build_index(&sample_zip(), "nonexistent").unwrap();
        assert!(index.target_stop_ids.is_empty());
        assert!(!index.is_ready());
    }

    #[test]
    fn missing_id_column_is_a_parse_error() {
        let zip = make_zip(&[
            ("stops.txt", "stop_code,stop_name\nX,Somewhere\n"),
            ("routes.txt", "route_id,route_short_name,route_long_name\nR1,1,One\n"),
        ]);
        let err = build_index(&zip, "somewhere").unwrap_err();
        assert!(matches!(err, GtfsError::ParseError(_)));
        assert!(err.to_string().contains("stop_id"));
    }

    #[test]
    fn missing_file_is_a_zip_error() {
        let zip = make_zip(&[(
            "routes.txt",
            "route_id,route_short_name,route_long_name\nR1,1,One\n",
        )]);
        let err = build_index(&zip, "anything").unwrap_err();
        assert!(matches!(err, GtfsError::ZipError(_)));
    }

    #[test]
    fn rows_with_empty_ids_are_skipped() {
        let zip = make_zip(&[
            ("stops.txt", "stop_id,stop_name\nA1,Target\n,Ghost Stop\n"),
            ("routes.txt", "route_id,route_short_name,route_long_name\n,9,Ghost\nR1,1,One\n"),
        ]);
        let index = build_index(&zip, "target").unwrap();
        assert_eq!(index.stops.len(), 1);
        assert_eq!(index.routes.len(), 1);
    }

    #[test]
    fn names_are_trimmed() {
        let zip = make_zip(&[
            ("stops.txt", "stop_id,stop_name\nA1,  Target Platform  \n"),
            ("routes.txt", "route_id,route_short_name,route_long_name\nR1, 1 ,One\n"),
        ]);
        let index = build_index(&zip, "target platform").unwrap();
        assert_eq!(index.stops["A1"].stop_name, "Target Platform");
        assert_eq!(index.routes["R1"].route_short_name, "1");
        assert!(index.target_stop_ids.contains("A1"));
    }
}
