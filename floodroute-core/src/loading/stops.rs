use std::path::Path;

use geo::Point;
use log::{info, warn};
use serde::Deserialize;

use super::open_csv;
use crate::{Error, model::TransitStop};

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct FeedStop {
    stop_id: String,
    stop_code: String,
    stop_name: String,
    stop_lat: Option<f64>,
    stop_lon: Option<f64>,
}

/// Reads transit stops from a GTFS `stops.txt`. The stop code falls back to
/// the stop id when the feed leaves it empty. Rows that cannot be read or
/// carry no usable coordinate are logged and left out.
///
/// # Errors
///
/// Returns `ArtifactNotFound` if the file does not exist and a CSV error if
/// the header cannot be read
pub fn read_stops_csv(path: &Path) -> Result<Vec<TransitStop>, Error> {
    let mut reader = open_csv(path)?;
    reader.headers()?;

    let mut stops = Vec::new();
    let mut rejected = 0usize;
    for (line, row) in reader.deserialize::<FeedStop>().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                warn!("Skipping stop row {}: {e}", line + 2);
                rejected += 1;
                continue;
            }
        };
        let (Some(lon), Some(lat)) = (row.stop_lon, row.stop_lat) else {
            warn!("Skipping stop {}: no coordinate", row.stop_id);
            rejected += 1;
            continue;
        };
        if !lon.is_finite() || !lat.is_finite() {
            warn!("Skipping stop {}: non-finite coordinate", row.stop_id);
            rejected += 1;
            continue;
        }
        let code = if row.stop_code.is_empty() {
            row.stop_id
        } else {
            row.stop_code
        };
        stops.push(TransitStop {
            code,
            name: row.stop_name,
            geometry: Point::new(lon, lat),
        });
    }

    info!(
        "Read {} stops from {} ({rejected} rows rejected)",
        stops.len(),
        path.display()
    );
    Ok(stops)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn reads_gtfs_stops() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            b"stop_id,stop_code,stop_name,stop_lat,stop_lon\n\
              s1,01012,Hotel Grand Pacific,1.29684,103.85253\n\
              s2,,Opp Bugis Stn,1.29950,103.85504\n\
              s3,01019,Nowhere,,\n",
        )
        .unwrap();

        let stops = read_stops_csv(file.path()).unwrap();
        assert_eq!(stops.len(), 2);
        assert_eq!(stops[0].code, "01012");
        assert_eq!(stops[0].geometry, Point::new(103.85253, 1.29684));
        assert_eq!(stops[1].code, "s2");
    }

    #[test]
    fn malformed_rows_are_skipped_not_fatal() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            b"stop_id,stop_code,stop_name,stop_lat,stop_lon\n\
              s1,01012,Hotel Grand Pacific,north,103.85253\n\
              s2,01013,Victoria St,1.29770,103.85400,extra\n\
              s3,01019,Bras Basah,1.29620,103.85100\n",
        )
        .unwrap();

        let stops = read_stops_csv(file.path()).unwrap();
        assert_eq!(stops.len(), 1);
        assert_eq!(stops[0].code, "01019");
    }
}
