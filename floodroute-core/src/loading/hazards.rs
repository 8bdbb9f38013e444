use std::path::Path;

use chrono::NaiveDate;
use log::{info, warn};
use serde::Deserialize;

use super::open_csv;
use crate::{
    Error,
    model::{HazardMeta, HazardRecord, RawGeometry},
};

#[derive(Debug, Deserialize)]
struct HazardRow {
    flood_id: i64,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    rainfall_mm: Option<f64>,
    #[serde(default)]
    flooded_location: Option<String>,
    /// Hex (E)WKB
    #[serde(default)]
    geom: Option<String>,
    #[serde(default)]
    geom_wkt: Option<String>,
    #[serde(default)]
    lon: Option<f64>,
    #[serde(default)]
    lat: Option<f64>,
}

impl HazardRow {
    fn geometry(&self) -> Option<RawGeometry> {
        if let Some(wkb) = self.geom.as_ref().filter(|g| !g.is_empty()) {
            return Some(RawGeometry::Wkb { wkb: wkb.clone() });
        }
        if let Some(wkt) = self.geom_wkt.as_ref().filter(|g| !g.is_empty()) {
            return Some(RawGeometry::Wkt(wkt.clone()));
        }
        match (self.lon, self.lat) {
            (Some(lon), Some(lat)) => Some(RawGeometry::Point { lon, lat }),
            _ => None,
        }
    }
}

/// Reads hazard records from a CSV file with a `flood_id` column, optional
/// `date`, `rainfall_mm` and `flooded_location` columns and the geometry in
/// `geom` (hex WKB), `geom_wkt` or `lon`/`lat`.
///
/// Rows that cannot be read are logged and left out; geometry is validated
/// later, when the records are indexed.
///
/// # Errors
///
/// Returns `ArtifactNotFound` if the file does not exist and a CSV error if
/// the header cannot be read
pub fn read_hazard_csv(path: &Path) -> Result<Vec<HazardRecord>, Error> {
    let mut reader = open_csv(path)?;
    reader.headers()?;

    let mut records = Vec::new();
    let mut rejected = 0usize;
    for (line, row) in reader.deserialize::<HazardRow>().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                warn!("Skipping hazard row {}: {e}", line + 2);
                rejected += 1;
                continue;
            }
        };
        let Some(geometry) = row.geometry() else {
            warn!("Skipping hazard {}: no geometry column is filled", row.flood_id);
            rejected += 1;
            continue;
        };
        records.push(HazardRecord {
            id: row.flood_id,
            meta: HazardMeta {
                date: row.date.as_deref().and_then(parse_date),
                rainfall_mm: row.rainfall_mm,
                location: row.flooded_location.filter(|l| !l.trim().is_empty()),
            },
            geometry,
        });
    }

    info!(
        "Read {} hazard records from {} ({rejected} rows rejected)",
        records.len(),
        path.display()
    );
    Ok(records)
}

/// Accepts a plain date or a timestamp starting with one
fn parse_date(text: &str) -> Option<NaiveDate> {
    let day = text.get(..10).unwrap_or(text);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn csv_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn reads_each_geometry_encoding() {
        let file = csv_file(
            "flood_id,date,rainfall_mm,flooded_location,geom,geom_wkt,lon,lat\n\
             1,2024-11-02,41.5,Bukit Timah,01010000003333333333f35940cdccccccccccf43f,,,\n\
             2,2024-11-03 08:15:00+00,,,,POINT(103.9 1.35),,\n\
             3,,,  ,,,103.7,1.33\n",
        );
        let records = read_hazard_csv(file.path()).unwrap();
        assert_eq!(records.len(), 3);

        assert!(matches!(records[0].geometry, RawGeometry::Wkb { .. }));
        assert_eq!(records[0].meta.location.as_deref(), Some("Bukit Timah"));
        assert_eq!(records[0].meta.rainfall_mm, Some(41.5));

        assert_eq!(records[1].geometry, RawGeometry::Wkt("POINT(103.9 1.35)".into()));
        assert_eq!(records[1].meta.date, NaiveDate::from_ymd_opt(2024, 11, 3));

        assert_eq!(records[2].geometry, RawGeometry::Point { lon: 103.7, lat: 1.33 });
        assert_eq!(records[2].meta.location, None);
        assert_eq!(records[2].meta.date, None);
    }

    #[test]
    fn bad_rows_are_skipped() {
        let file = csv_file(
            "flood_id,geom_wkt\n\
             abc,POINT(1 1)\n\
             5,\n\
             6,POINT(2 2)\n",
        );
        let records = read_hazard_csv(file.path()).unwrap();
        let ids: Vec<i64> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![6]);
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = read_hazard_csv(Path::new("/nonexistent/hazards.csv")).unwrap_err();
        assert!(matches!(err, Error::ArtifactNotFound(_)));
    }
}
