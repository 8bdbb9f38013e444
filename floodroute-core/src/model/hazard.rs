//! Hazard (flood) zones and the raw records they are parsed from

use std::fmt;

use chrono::NaiveDate;
use geo::{
    BoundingRect, Centroid, Coord, Distance, Euclidean, Geometry, LineString, MapCoords, Point,
    Polygon, Rect, coord,
};
use serde::{Deserialize, Serialize};
use wkt::TryFromWkt;

use crate::Meters;

/// Length of one degree of latitude on the mean Earth sphere
const METERS_PER_DEGREE: f64 = 6_371_008.8 * std::f64::consts::PI / 180.0;

/// Descriptive metadata attached to a hazard. Opaque to the analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HazardMeta {
    pub date: Option<NaiveDate>,
    pub rainfall_mm: Option<f64>,
    pub location: Option<String>,
}

/// Geometry as delivered by a hazard source, before validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawGeometry {
    Point { lon: f64, lat: f64 },
    /// Hex-encoded WKB or PostGIS EWKB
    Wkb { wkb: String },
    Wkt(String),
}

/// Hazard record as delivered by a hazard source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardRecord {
    pub id: i64,
    pub geometry: RawGeometry,
    #[serde(default)]
    pub meta: HazardMeta,
}

/// Validated hazard geometry
#[derive(Debug, Clone, PartialEq)]
pub enum HazardGeometry {
    Point(Point<f64>),
    Polygon(Polygon<f64>),
}

/// Why a hazard record did not make it into the index
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    UnparseableWkt(String),
    UnparseableWkb(String),
    UnsupportedGeometry(&'static str),
    NonFiniteCoordinate,
    EmptyGeometry,
    DuplicateId,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UnparseableWkt(e) => write!(f, "unparseable WKT: {e}"),
            SkipReason::UnparseableWkb(e) => write!(f, "unparseable WKB: {e}"),
            SkipReason::UnsupportedGeometry(kind) => write!(f, "unsupported geometry type {kind}"),
            SkipReason::NonFiniteCoordinate => f.write_str("non-finite coordinate"),
            SkipReason::EmptyGeometry => f.write_str("empty geometry"),
            SkipReason::DuplicateId => f.write_str("duplicate hazard id"),
        }
    }
}

impl HazardGeometry {
    /// # Errors
    ///
    /// Returns the reason the raw geometry cannot be used as a hazard
    pub fn parse(raw: &RawGeometry) -> Result<Self, SkipReason> {
        let geometry = match raw {
            RawGeometry::Point { lon, lat } => HazardGeometry::Point(Point::new(*lon, *lat)),
            RawGeometry::Wkb { wkb } => decode_wkb(wkb)?,
            RawGeometry::Wkt(text) => {
                let parsed = Geometry::<f64>::try_from_wkt_str(text)
                    .map_err(|e| SkipReason::UnparseableWkt(e.to_string()))?;
                match parsed {
                    Geometry::Point(point) => HazardGeometry::Point(point),
                    Geometry::Polygon(polygon) => HazardGeometry::Polygon(polygon),
                    Geometry::Line(_) => return Err(SkipReason::UnsupportedGeometry("Line")),
                    Geometry::LineString(_) => {
                        return Err(SkipReason::UnsupportedGeometry("LineString"));
                    }
                    Geometry::MultiPoint(_) => {
                        return Err(SkipReason::UnsupportedGeometry("MultiPoint"));
                    }
                    Geometry::MultiLineString(_) => {
                        return Err(SkipReason::UnsupportedGeometry("MultiLineString"));
                    }
                    Geometry::MultiPolygon(_) => {
                        return Err(SkipReason::UnsupportedGeometry("MultiPolygon"));
                    }
                    Geometry::GeometryCollection(_) => {
                        return Err(SkipReason::UnsupportedGeometry("GeometryCollection"));
                    }
                    Geometry::Rect(rect) => HazardGeometry::Polygon(rect.to_polygon()),
                    Geometry::Triangle(triangle) => HazardGeometry::Polygon(triangle.to_polygon()),
                }
            }
        };
        geometry.validate()?;
        Ok(geometry)
    }

    fn validate(&self) -> Result<(), SkipReason> {
        match self {
            HazardGeometry::Point(point) => {
                if point.x().is_finite() && point.y().is_finite() {
                    Ok(())
                } else {
                    Err(SkipReason::NonFiniteCoordinate)
                }
            }
            HazardGeometry::Polygon(polygon) => {
                if polygon.exterior().0.is_empty() {
                    return Err(SkipReason::EmptyGeometry);
                }
                if polygon
                    .exterior()
                    .coords()
                    .chain(polygon.interiors().iter().flat_map(|ring| ring.coords()))
                    .all(|c| c.x.is_finite() && c.y.is_finite())
                {
                    Ok(())
                } else {
                    Err(SkipReason::NonFiniteCoordinate)
                }
            }
        }
    }

    /// Planar distance from the hazard to `line`, in coordinate units. Zero
    /// when the line touches or crosses a polygon.
    pub fn distance_to_line(&self, line: &LineString<f64>) -> f64 {
        match self {
            HazardGeometry::Point(point) => Euclidean.distance(point, line),
            HazardGeometry::Polygon(polygon) => Euclidean.distance(polygon, line),
        }
    }

    /// Distance in metres from the hazard to `line`, measured in an
    /// equirectangular projection centred on the hazard's latitude. Zero when
    /// the line touches or crosses a polygon.
    pub fn distance_to_line_m(&self, line: &LineString<f64>) -> Meters {
        let lon_scale = METERS_PER_DEGREE * self.anchor().y().to_radians().cos();
        let project = |c: Coord<f64>| coord! { x: c.x * lon_scale, y: c.y * METERS_PER_DEGREE };
        let line = line.map_coords(project);
        match self {
            HazardGeometry::Point(point) => Euclidean.distance(&point.map_coords(project), &line),
            HazardGeometry::Polygon(polygon) => {
                Euclidean.distance(&polygon.map_coords(project), &line)
            }
        }
    }

    /// Bounding rectangle grown by `radius` on every side
    pub fn buffered_rect(&self, radius: f64) -> Rect<f64> {
        self.grown_rect(radius, radius)
    }

    /// Bounding rectangle grown by `radius_m` metres on every side, in the
    /// same projection as [`Self::distance_to_line_m`]
    pub fn buffered_rect_m(&self, radius_m: Meters) -> Rect<f64> {
        let dy = radius_m / METERS_PER_DEGREE;
        let cos = self.anchor().y().to_radians().cos();
        let dx = if cos > f64::EPSILON { dy / cos } else { 180.0 };
        self.grown_rect(dx, dy)
    }

    fn grown_rect(&self, dx: f64, dy: f64) -> Rect<f64> {
        let rect = match self {
            HazardGeometry::Point(point) => Rect::new(point.0, point.0),
            HazardGeometry::Polygon(polygon) => polygon.bounding_rect().unwrap_or_else(|| {
                let anchor = self.anchor();
                Rect::new(anchor.0, anchor.0)
            }),
        };
        Rect::new(
            coord! { x: rect.min().x - dx, y: rect.min().y - dy },
            coord! { x: rect.max().x + dx, y: rect.max().y + dy },
        )
    }

    /// Representative point: the point itself, or the polygon centroid
    pub fn anchor(&self) -> Point<f64> {
        match self {
            HazardGeometry::Point(point) => *point,
            HazardGeometry::Polygon(polygon) => polygon
                .centroid()
                .or_else(|| polygon.exterior().points().next())
                .unwrap_or_else(|| Point::new(f64::NAN, f64::NAN)),
        }
    }
}

const WKB_Z: u32 = 0x8000_0000;
const WKB_M: u32 = 0x4000_0000;
const WKB_SRID: u32 = 0x2000_0000;

/// Decodes a hex (E)WKB point or polygon. Z and M ordinates are dropped.
fn decode_wkb(text: &str) -> Result<HazardGeometry, SkipReason> {
    let bytes = hex::decode(text.trim()).map_err(|e| SkipReason::UnparseableWkb(e.to_string()))?;
    let mut reader = WkbReader::new(&bytes)?;

    let raw_type = reader.u32()?;
    if raw_type & WKB_SRID != 0 {
        reader.u32()?;
    }
    // ISO WKB encodes Z/M as +1000/+2000/+3000 on the type code
    let iso_dims = (raw_type & 0xFFFF) / 1000;
    let base_type = (raw_type & 0xFFFF) % 1000;
    let extra_dims = match iso_dims {
        1 | 2 => 1,
        3 => 2,
        _ => usize::from(raw_type & WKB_Z != 0) + usize::from(raw_type & WKB_M != 0),
    };
    let dims = 2 + extra_dims;

    let geometry = match base_type {
        1 => HazardGeometry::Point(Point::from(reader.coord(dims)?)),
        3 => {
            let rings = reader.u32()?;
            let mut parsed = (0..rings)
                .map(|_| {
                    let count = reader.u32()?;
                    (0..count)
                        .map(|_| reader.coord(dims))
                        .collect::<Result<Vec<Coord<f64>>, _>>()
                        .map(LineString::new)
                })
                .collect::<Result<Vec<_>, _>>()?
                .into_iter();
            let exterior = parsed.next().ok_or(SkipReason::EmptyGeometry)?;
            HazardGeometry::Polygon(Polygon::new(exterior, parsed.collect()))
        }
        2 => return Err(SkipReason::UnsupportedGeometry("LineString")),
        4 => return Err(SkipReason::UnsupportedGeometry("MultiPoint")),
        5 => return Err(SkipReason::UnsupportedGeometry("MultiLineString")),
        6 => return Err(SkipReason::UnsupportedGeometry("MultiPolygon")),
        7 => return Err(SkipReason::UnsupportedGeometry("GeometryCollection")),
        other => {
            return Err(SkipReason::UnparseableWkb(format!("unknown geometry type {other}")));
        }
    };
    Ok(geometry)
}

struct WkbReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    little_endian: bool,
}

impl<'a> WkbReader<'a> {
    fn new(bytes: &'a [u8]) -> Result<Self, SkipReason> {
        let little_endian = match bytes.first() {
            Some(0) => false,
            Some(1) => true,
            Some(other) => {
                return Err(SkipReason::UnparseableWkb(format!("invalid byte order {other}")));
            }
            None => return Err(SkipReason::EmptyGeometry),
        };
        Ok(Self {
            bytes,
            pos: 1,
            little_endian,
        })
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], SkipReason> {
        let chunk = self
            .bytes
            .get(self.pos..self.pos + N)
            .ok_or_else(|| SkipReason::UnparseableWkb("unexpected end of input".to_string()))?;
        self.pos += N;
        let mut out = [0u8; N];
        out.copy_from_slice(chunk);
        Ok(out)
    }

    fn u32(&mut self) -> Result<u32, SkipReason> {
        let raw = self.take::<4>()?;
        Ok(if self.little_endian {
            u32::from_le_bytes(raw)
        } else {
            u32::from_be_bytes(raw)
        })
    }

    fn f64(&mut self) -> Result<f64, SkipReason> {
        let raw = self.take::<8>()?;
        Ok(if self.little_endian {
            f64::from_le_bytes(raw)
        } else {
            f64::from_be_bytes(raw)
        })
    }

    fn coord(&mut self, dims: usize) -> Result<Coord<f64>, SkipReason> {
        let x = self.f64()?;
        let y = self.f64()?;
        for _ in 2..dims {
            self.f64()?;
        }
        Ok(Coord { x, y })
    }
}

/// A validated hazard zone
#[derive(Debug, Clone, PartialEq)]
pub struct HazardZone {
    pub id: i64,
    pub geometry: HazardGeometry,
    pub meta: HazardMeta,
}
