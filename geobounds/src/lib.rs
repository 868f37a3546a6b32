//! Linear correspondence between a planar document coordinate system and a
//! geographic latitude/longitude rectangle.

use std::fmt;

use geo::{Coord, Point};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Lat,
    Lon,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Lat => "lat",
            Axis::Lon => "lon",
        })
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BoundsError {
    #[error("degenerate {axis} span: max ({max}) must be greater than min ({min})")]
    Degenerate { axis: Axis, min: f64, max: f64 },
    #[error("{axis} span [{min}, {max}] is not finite")]
    NonFiniteSpan { axis: Axis, min: f64, max: f64 },
    #[error("rotation `{0}` is not finite")]
    NonFiniteRotation(f64),
    #[error("point ({x}, {y}) is not finite")]
    NonFinitePoint { x: f64, y: f64 },
}

/// A closed `[min, max]` interval with `max > min`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Span {
    min: f64,
    max: f64,
}

impl Span {
    pub fn new(axis: Axis, [min, max]: [f64; 2]) -> Result<Self, BoundsError> {
        if !min.is_finite() || !max.is_finite() {
            return Err(BoundsError::NonFiniteSpan { axis, min, max });
        }
        if max <= min {
            return Err(BoundsError::Degenerate { axis, min, max });
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn len(&self) -> f64 {
        self.max - self.min
    }

    pub fn center(&self) -> f64 {
        (self.min + self.max) / 2.0
    }

    /// Position of `value` inside the span, `0.0` at `min` and `1.0` at `max`.
    pub fn fraction(&self, value: f64) -> f64 {
        (value - self.min) / (self.max - self.min)
    }

    pub fn lerp(&self, fraction: f64) -> f64 {
        self.min + fraction * (self.max - self.min)
    }

    /// Reflects `value` across the middle of the span.
    pub fn mirror(&self, value: f64) -> f64 {
        self.max - (value - self.min)
    }
}

/// Which way the source `y` axis points relative to north.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum YAxis {
    /// `y_min` is the southern edge.
    #[default]
    Up,
    /// `y_min` is the northern edge, as in SVG and PDF page space.
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// GeoJSON ordering, `[lon, lat]`.
    pub fn position(&self) -> Vec<f64> {
        vec![self.lon, self.lat]
    }
}

impl From<LatLon> for Point<f64> {
    fn from(value: LatLon) -> Self {
        geo::point! { x: value.lon, y: value.lat }
    }
}

impl From<LatLon> for Coord<f64> {
    fn from(value: LatLon) -> Self {
        geo::coord! { x: value.lon, y: value.lat }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    x: Span,
    y: Span,
    lat: Span,
    lon: Span,
    rotation: Option<f64>,
    y_axis: YAxis,
}

impl Bounds {
    pub fn new(
        x: [f64; 2],
        y: [f64; 2],
        lat: [f64; 2],
        lon: [f64; 2],
    ) -> Result<Self, BoundsError> {
        Ok(Self {
            x: Span::new(Axis::X, x)?,
            y: Span::new(Axis::Y, y)?,
            lat: Span::new(Axis::Lat, lat)?,
            lon: Span::new(Axis::Lon, lon)?,
            rotation: None,
            y_axis: YAxis::Up,
        })
    }

    /// Switches to the rotated mapping. Note that a rotation of `0.0` still
    /// mirrors the longitude axis.
    pub fn with_rotation(mut self, radians: f64) -> Result<Self, BoundsError> {
        if !radians.is_finite() {
            return Err(BoundsError::NonFiniteRotation(radians));
        }
        self.rotation = Some(radians);
        Ok(self)
    }

    pub fn with_y_axis(mut self, y_axis: YAxis) -> Self {
        self.y_axis = y_axis;
        self
    }

    pub fn x(&self) -> Span {
        self.x
    }

    pub fn y(&self) -> Span {
        self.y
    }

    pub fn lat(&self) -> Span {
        self.lat
    }

    pub fn lon(&self) -> Span {
        self.lon
    }

    pub fn rotation(&self) -> Option<f64> {
        self.rotation
    }

    pub fn y_axis(&self) -> YAxis {
        self.y_axis
    }

    pub fn geo_center(&self) -> LatLon {
        LatLon::new(self.lat.center(), self.lon.center())
    }

    pub fn to_geo(&self, point: impl Into<Coord<f64>>) -> Result<LatLon, BoundsError> {
        let Coord { x, y } = point.into();
        if !x.is_finite() || !y.is_finite() {
            return Err(BoundsError::NonFinitePoint { x, y });
        }

        let fx = self.x.fraction(x);
        let fy = match self.y_axis {
            YAxis::Up => self.y.fraction(y),
            YAxis::Down => 1.0 - self.y.fraction(y),
        };

        let lat = self.lat.lerp(fy);
        let lon = self.lon.lerp(fx);

        let Some(angle) = self.rotation else {
            return Ok(LatLon { lat, lon });
        };

        // normalize, mirror longitude, then rotate about the centroid
        let lon = self.lon.mirror(lon);
        let center = self.geo_center();
        let (sin, cos) = angle.sin_cos();
        let (dlat, dlon) = (lat - center.lat, lon - center.lon);

        Ok(LatLon {
            lat: center.lat + dlat * cos - dlon * sin,
            lon: center.lon + dlat * sin + dlon * cos,
        })
    }
}

pub fn to_geo(bounds: &Bounds, point: impl Into<Coord<f64>>) -> Result<LatLon, BoundsError> {
    bounds.to_geo(point)
}

#[cfg(test)]
fn sample() -> Bounds {
    Bounds::new([0.0, 10.0], [0.0, 10.0], [40.0, 41.0], [-72.0, -71.0]).unwrap()
}

#[cfg(test)]
fn assert_close(a: LatLon, b: LatLon) {
    assert!((a.lat - b.lat).abs() < 1e-9, "{a:?} != {b:?}");
    assert!((a.lon - b.lon).abs() < 1e-9, "{a:?} != {b:?}");
}

#[test]
fn center_maps_to_geo_center() {
    let bounds = sample();
    assert_eq!(to_geo(&bounds, (5.0, 5.0)).unwrap(), LatLon::new(40.5, -71.5));
}

#[test]
fn corners_map_to_corners() {
    let bounds = sample();
    assert_eq!(bounds.to_geo((0.0, 0.0)).unwrap(), LatLon::new(40.0, -72.0));
    assert_eq!(bounds.to_geo((10.0, 10.0)).unwrap(), LatLon::new(41.0, -71.0));
}

#[test]
fn y_down_flips_latitude() {
    let bounds = sample().with_y_axis(YAxis::Down);
    assert_eq!(bounds.to_geo((0.0, 0.0)).unwrap(), LatLon::new(41.0, -72.0));
    assert_eq!(bounds.to_geo((10.0, 10.0)).unwrap(), LatLon::new(40.0, -71.0));
}

#[test]
fn degenerate_bounds_fail() {
    let err = Bounds::new([5.0, 5.0], [0.0, 10.0], [40.0, 41.0], [-72.0, -71.0]).unwrap_err();
    assert_eq!(
        err,
        BoundsError::Degenerate {
            axis: Axis::X,
            min: 5.0,
            max: 5.0
        }
    );

    assert!(Bounds::new([0.0, 10.0], [0.0, 10.0], [41.0, 40.0], [-72.0, -71.0]).is_err());
    assert!(Bounds::new([0.0, f64::INFINITY], [0.0, 10.0], [40.0, 41.0], [-72.0, -71.0]).is_err());
}

#[test]
fn non_finite_point_fails() {
    let bounds = sample();
    assert!(matches!(
        bounds.to_geo((f64::NAN, 1.0)),
        Err(BoundsError::NonFinitePoint { .. })
    ));
    assert!(sample().with_rotation(f64::NAN).is_err());
}

#[test]
fn zero_rotation_mirrors_longitude() {
    let bounds = sample().with_rotation(0.0).unwrap();
    assert_close(bounds.to_geo((0.0, 0.0)).unwrap(), LatLon::new(40.0, -71.0));
    assert_close(bounds.to_geo((5.0, 5.0)).unwrap(), LatLon::new(40.5, -71.5));
}

#[test]
fn rotation_turns_about_geo_center() {
    let half = sample()
        .with_rotation(std::f64::consts::FRAC_PI_2)
        .unwrap();
    assert_close(half.to_geo((0.0, 0.0)).unwrap(), LatLon::new(40.0, -72.0));

    let full = sample().with_rotation(std::f64::consts::PI).unwrap();
    assert_close(full.to_geo((0.0, 0.0)).unwrap(), LatLon::new(41.0, -72.0));
    assert_close(full.to_geo((5.0, 5.0)).unwrap(), LatLon::new(40.5, -71.5));
}

#[test]
fn latlon_into_point_is_lon_lat() {
    let p: Point<f64> = LatLon::new(43.19, -71.57).into();
    assert_eq!(p.x(), -71.57);
    assert_eq!(p.y(), 43.19);
    assert_eq!(LatLon::new(43.19, -71.57).position(), vec![-71.57, 43.19]);
}
