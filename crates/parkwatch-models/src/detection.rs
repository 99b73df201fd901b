//! Vehicle and plate detection results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Vehicle class tracked by the facility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VehicleType {
    Car,
    Bike,
}

impl VehicleType {
    pub const ALL: &'static [VehicleType] = &[VehicleType::Car, VehicleType::Bike];

    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleType::Car => "CAR",
            VehicleType::Bike => "BIKE",
        }
    }

    /// Single-letter code used in slot codes (`A-C-01`, `A-B-01`).
    pub fn code(&self) -> char {
        match self {
            VehicleType::Car => 'C',
            VehicleType::Bike => 'B',
        }
    }

    /// Offset added to slot ids of this vehicle type.
    pub fn slot_offset(&self) -> u32 {
        match self {
            VehicleType::Car => 0,
            VehicleType::Bike => 100,
        }
    }
}

impl fmt::Display for VehicleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Error)]
#[error("invalid vehicle type: '{0}' (expected car or bike)")]
pub struct ParseVehicleTypeError(String);

impl FromStr for VehicleType {
    type Err = ParseVehicleTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "CAR" => Ok(VehicleType::Car),
            "BIKE" => Ok(VehicleType::Bike),
            _ => Err(ParseVehicleTypeError(s.to_string())),
        }
    }
}

// ============================================================================
// Geometry
// ============================================================================

/// Pixel coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

/// Axis-aligned rectangle in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Smallest box containing every point.
    pub fn enclosing(points: &[(f32, f32)]) -> Option<Self> {
        let first = points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.0, first.1, first.0, first.1);
        for &(x, y) in &points[1..] {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        Some(Self::new(
            min_x.floor() as i32,
            min_y.floor() as i32,
            (max_x - min_x).ceil() as i32,
            (max_y - min_y).ceil() as i32,
        ))
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point {
            x: self.x + self.width / 2,
            y: self.y + self.height / 2,
        }
    }

    pub fn area(&self) -> i64 {
        self.width.max(0) as i64 * self.height.max(0) as i64
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Grow the box by `padding` pixels on every side.
    pub fn padded(&self, padding: i32) -> Self {
        Self::new(
            self.x - padding,
            self.y - padding,
            self.width + 2 * padding,
            self.height + 2 * padding,
        )
    }

    /// Intersect with a `frame_width` x `frame_height` frame.
    ///
    /// Returns `None` when nothing of the box lies inside the frame.
    pub fn clamp_to(&self, frame_width: u32, frame_height: u32) -> Option<Self> {
        let x1 = self.x.max(0);
        let y1 = self.y.max(0);
        let x2 = self.right().min(frame_width as i32);
        let y2 = self.bottom().min(frame_height as i32);
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(Self::new(x1, y1, x2 - x1, y2 - y1))
    }

    /// Translate a box expressed relative to this one into frame coordinates.
    pub fn offset_child(&self, child: &BoundingBox) -> Self {
        Self::new(self.x + child.x, self.y + child.y, child.width, child.height)
    }
}

// ============================================================================
// Detection results
// ============================================================================

/// A vehicle found in a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub vehicle_type: VehicleType,
    pub confidence: f32,
    pub bbox: BoundingBox,
    pub center: Point,
    pub timestamp: DateTime<Utc>,
}

impl Detection {
    pub fn new(vehicle_type: VehicleType, confidence: f32, bbox: BoundingBox, timestamp: DateTime<Utc>) -> Self {
        Self {
            vehicle_type,
            confidence: confidence.clamp(0.0, 1.0),
            center: bbox.center(),
            bbox,
            timestamp,
        }
    }
}

/// A validated plate read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlateReading {
    /// Text as returned by OCR.
    pub raw_text: String,
    /// Cleaned, upper-cased plate text.
    pub text: String,
    pub confidence: f32,
    /// Plate region in frame coordinates.
    pub bbox: BoundingBox,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vehicle_type_serde_uppercase() {
        assert_eq!(serde_json::to_string(&VehicleType::Bike).unwrap(), "\"BIKE\"");
        assert_eq!("car".parse::<VehicleType>().unwrap(), VehicleType::Car);
        assert!("truck".parse::<VehicleType>().is_err());
    }

    #[test]
    fn test_clamp_to_frame() {
        let bbox = BoundingBox::new(-20, -20, 100, 60).clamp_to(640, 480).unwrap();
        assert_eq!(bbox, BoundingBox::new(0, 0, 80, 40));

        let edge = BoundingBox::new(600, 450, 100, 100).clamp_to(640, 480).unwrap();
        assert_eq!(edge, BoundingBox::new(600, 450, 40, 30));

        assert!(BoundingBox::new(700, 10, 50, 50).clamp_to(640, 480).is_none());
        assert!(BoundingBox::new(10, 10, 0, 50).clamp_to(640, 480).is_none());
    }

    #[test]
    fn test_padded_and_center() {
        let bbox = BoundingBox::new(100, 100, 40, 20);
        assert_eq!(bbox.padded(20), BoundingBox::new(80, 80, 80, 60));
        assert_eq!(bbox.center(), Point { x: 120, y: 110 });
    }

    #[test]
    fn test_enclosing_polygon() {
        let quad = [(10.5, 20.0), (60.0, 18.0), (61.0, 40.0), (11.0, 42.0)];
        let bbox = BoundingBox::enclosing(&quad).unwrap();
        assert_eq!(bbox, BoundingBox::new(10, 18, 51, 24));
        assert!(BoundingBox::enclosing(&[]).is_none());
    }

    #[test]
    fn test_detection_center_and_confidence_clamped() {
        let det = Detection::new(VehicleType::Car, 1.3, BoundingBox::new(0, 0, 10, 10), Utc::now());
        assert_eq!(det.center, Point { x: 5, y: 5 });
        assert!((det.confidence - 1.0).abs() < f32::EPSILON);
    }
}
