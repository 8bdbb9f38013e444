use std::str::FromStr;

use geo::{Intersects, LineString, Rect, coord};
use serde::{Deserialize, Serialize};

use crate::Error;

/// Axis-aligned query box in network coordinates (x = longitude, y = latitude)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// # Errors
    ///
    /// Returns `InvalidInput` if any bound is not finite or a minimum
    /// exceeds its maximum
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Result<Self, Error> {
        if ![min_x, min_y, max_x, max_y].iter().all(|v| v.is_finite()) {
            return Err(Error::InvalidInput(
                "Invalid bbox: bounds must be finite numbers".to_string(),
            ));
        }
        if min_x > max_x || min_y > max_y {
            return Err(Error::InvalidInput(format!(
                "Invalid bbox: min ({min_x}, {min_y}) exceeds max ({max_x}, {max_y})"
            )));
        }
        Ok(Self {
            min_x,
            min_y,
            max_x,
            max_y,
        })
    }

    /// A box with zero width or zero height covers no area and selects nothing
    pub fn is_degenerate(&self) -> bool {
        self.min_x == self.max_x || self.min_y == self.max_y
    }

    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new(
            coord! { x: self.min_x, y: self.min_y },
            coord! { x: self.max_x, y: self.max_y },
        )
    }

    /// Partial overlap is enough, the line does not need to be contained
    pub fn intersects(&self, line: &LineString<f64>) -> bool {
        !self.is_degenerate() && line.intersects(&self.to_rect())
    }
}

impl FromStr for BoundingBox {
    type Err = Error;

    /// Parses `minx,miny,maxx,maxy`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidInput("Invalid bbox. Use minx,miny,maxx,maxy".to_string());

        let values = s
            .split(',')
            .map(|part| part.trim().parse::<f64>().map_err(|_| invalid()))
            .collect::<Result<Vec<_>, _>>()?;

        match values.as_slice() {
            &[min_x, min_y, max_x, max_y] => Self::new(min_x, min_y, max_x, max_y),
            _ => Err(invalid()),
        }
    }
}
