use geo::Point;
use serde::Serialize;

/// Public transit stop, located at (longitude, latitude)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitStop {
    pub code: String,
    pub name: String,
    #[serde(skip)]
    pub geometry: Point<f64>,
}
