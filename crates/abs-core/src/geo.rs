//! Distance and direction between global coordinates.
//!
//! Horizontal bearings are measured clockwise from +y, so `+y` is north and
//! `+x` is east. The vertical axis is `z`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kilometres per global coordinate unit.
pub const DISTANCE_SCALE: f64 = 4000.0;

const SECTOR_DEGREES: f64 = 45.0;
const ARROWS: [char; 8] = ['↑', '↗', '→', '↘', '↓', '↙', '←', '↖'];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// The universe's centre, the default survey reference point.
    pub const fn origin() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, {}", self.x, self.y, self.z)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Compass {
    N,
    NE,
    E,
    SE,
    S,
    SW,
    W,
    NW,
}

impl Compass {
    const ALL: [Compass; 8] = [
        Compass::N,
        Compass::NE,
        Compass::E,
        Compass::SE,
        Compass::S,
        Compass::SW,
        Compass::W,
        Compass::NW,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::N => "N",
            Self::NE => "NE",
            Self::E => "E",
            Self::SE => "SE",
            Self::S => "S",
            Self::SW => "SW",
            Self::W => "W",
            Self::NW => "NW",
        }
    }

    pub fn arrow(self) -> char {
        ARROWS[self as usize]
    }
}

impl fmt::Display for Compass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Horizontal heading from one point toward another.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bearing {
    /// Degrees in `[0, 360)`.
    pub degrees: f64,
    /// Clock position, 12 is straight north.
    pub clock: u8,
    pub compass: Compass,
    pub arrow: char,
}

impl Bearing {
    /// Clock hours are 30° sectors centred on each hour, clockwise from north,
    /// so north reads 12 and east reads 3. This is deliberately not
    /// `round((deg + 90) / 30)`, which reads north as 3 o'clock.
    pub fn from_degrees(degrees: f64) -> Self {
        let normalized = normalize_degrees(degrees);
        let sector = ((normalized + SECTOR_DEGREES / 2.0) / SECTOR_DEGREES).floor() as usize % 8;
        let compass = Compass::ALL[sector];
        let hour = ((normalized + 15.0) / 30.0).floor() as u8 % 12;
        Self {
            degrees: normalized,
            clock: if hour == 0 { 12 } else { hour },
            compass,
            arrow: compass.arrow(),
        }
    }
}

/// Heading, elevation and distance together, as the direction readout shows them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Direction {
    pub horizontal: Option<Bearing>,
    pub vertical: i32,
    pub distance: i64,
}

fn normalize_degrees(degrees: f64) -> f64 {
    let wrapped = degrees % 360.0;
    let normalized = if wrapped < 0.0 { wrapped + 360.0 } else { wrapped };
    if normalized >= 360.0 {
        0.0
    } else {
        normalized
    }
}

/// Scaled euclidean distance, rounded to whole kilometres.
pub fn distance(a: Point, b: Point) -> i64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let dz = b.z - a.z;
    (DISTANCE_SCALE * (dx * dx + dy * dy + dz * dz).sqrt()).round() as i64
}

/// `None` when the points share a horizontal position.
pub fn bearing(a: Point, b: Point) -> Option<Bearing> {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    if dx == 0.0 && dy == 0.0 {
        return None;
    }
    Some(Bearing::from_degrees(dx.atan2(dy).to_degrees()))
}

/// Vertical angle in `[-90, 90]` degrees.
pub fn elevation(a: Point, b: Point) -> i32 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let dz = b.z - a.z;
    if dz == 0.0 {
        return 0;
    }

    let horizontal = (dx * dx + dy * dy).sqrt().round();
    if horizontal == 0.0 {
        return if dz > 0.0 { 90 } else { -90 };
    }

    let degrees = dz.atan2(horizontal).to_degrees().round() as i32;
    if degrees < -90 {
        -180 - degrees
    } else if degrees > 90 {
        180 - degrees
    } else {
        degrees
    }
}

pub fn direction(a: Point, b: Point) -> Direction {
    Direction {
        horizontal: bearing(a, b),
        vertical: elevation(a, b),
        distance: distance(a, b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_scaled_rounded_and_symmetric() {
        let a = Point::new(1.0, 2.0, 3.0);
        let b = Point::new(4.0, 6.0, 3.0);
        assert_eq!(distance(a, b), 20_000);
        assert_eq!(distance(a, b), distance(b, a));
        assert_eq!(distance(a, a), 0);
        assert_eq!(distance(Point::origin(), Point::new(0.0001, 0.0, 0.0)), 0);
    }

    #[test]
    fn bearing_to_same_horizontal_position_is_none() {
        let a = Point::new(5.0, 5.0, 0.0);
        assert_eq!(bearing(a, a), None);
        assert_eq!(bearing(a, Point::new(5.0, 5.0, 40.0)), None);
        assert_eq!(direction(a, a).horizontal, None);
    }

    #[test]
    fn cardinal_bearings() {
        let north = bearing(Point::origin(), Point::new(0.0, 1.0, 0.0)).expect("north");
        assert_eq!(north.degrees, 0.0);
        assert_eq!(north.compass, Compass::N);
        assert_eq!(north.arrow, '↑');
        assert_eq!(north.clock, 12);

        let east = bearing(Point::origin(), Point::new(1.0, 0.0, 0.0)).expect("east");
        assert!((east.degrees - 90.0).abs() < 1e-9);
        assert_eq!(east.compass, Compass::E);
        assert_eq!(east.arrow, '→');
        assert_eq!(east.clock, 3);

        let west = bearing(Point::origin(), Point::new(-1.0, 0.0, 0.0)).expect("west");
        assert!((west.degrees - 270.0).abs() < 1e-9);
        assert_eq!(west.compass, Compass::W);
        assert_eq!(west.clock, 9);
    }

    #[test]
    fn sector_boundaries_sit_half_a_sector_off_axis() {
        assert_eq!(Bearing::from_degrees(0.0).compass, Compass::N);
        assert_eq!(Bearing::from_degrees(22.4).compass, Compass::N);
        assert_eq!(Bearing::from_degrees(22.4).arrow, '↑');
        assert_eq!(Bearing::from_degrees(22.6).compass, Compass::NE);
        assert_eq!(Bearing::from_degrees(22.6).arrow, '↗');
        assert_eq!(Bearing::from_degrees(45.0).compass, Compass::NE);
        assert_eq!(Bearing::from_degrees(45.0).clock, 2);
        assert_eq!(Bearing::from_degrees(337.4).compass, Compass::NW);
        assert_eq!(Bearing::from_degrees(337.6).compass, Compass::N);
    }

    #[test]
    fn full_turn_wraps_to_north() {
        let wrapped = Bearing::from_degrees(360.0);
        assert_eq!(wrapped.degrees, 0.0);
        assert_eq!(wrapped.compass, Compass::N);
        assert_eq!(wrapped.clock, 12);
        assert_eq!(Bearing::from_degrees(-90.0).compass, Compass::W);
        assert_eq!(Bearing::from_degrees(405.0).compass, Compass::NE);
    }

    #[test]
    fn elevation_covers_flat_vertical_and_sloped() {
        let origin = Point::origin();
        assert_eq!(elevation(origin, Point::new(10.0, 0.0, 0.0)), 0);
        assert_eq!(elevation(origin, Point::new(0.0, 0.0, 3.0)), 90);
        assert_eq!(elevation(origin, Point::new(0.0, 0.0, -3.0)), -90);
        assert_eq!(elevation(origin, Point::new(10.0, 0.0, 10.0)), 45);
        assert_eq!(elevation(origin, Point::new(0.0, 10.0, -10.0)), -45);
        // horizontal offset rounds to zero
        assert_eq!(elevation(origin, Point::new(0.2, 0.2, 1.0)), 90);
    }
}
