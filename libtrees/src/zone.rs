use std::{
    io::Read,
    path::{Path, PathBuf},
};

use geobounds::{Bounds, YAxis};
use serde::Deserialize;

use crate::{
    label::{Label, LabelId},
    matcher::MatchConfig,
    scanner::LabelFilter,
    svg::{parse::RGB, PaintChannel, SvgError},
    Error,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum YDirection {
    #[default]
    Up,
    Down,
}

impl From<YDirection> for YAxis {
    fn from(value: YDirection) -> Self {
        match value {
            YDirection::Up => YAxis::Up,
            YDirection::Down => YAxis::Down,
        }
    }
}

/// A label placed by hand where the drawing has none.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExtraLabel {
    pub text: LabelId,
    pub coords: [f64; 2],
}

impl From<ExtraLabel> for Label {
    fn from(extra: ExtraLabel) -> Self {
        let [x, y] = extra.coords;
        Label::new(extra.text, (x, y))
    }
}

fn default_name() -> String {
    "zone".to_string()
}

fn default_marker_colors() -> Vec<String> {
    vec!["#ff0000".to_string()]
}

fn default_label_max_len() -> usize {
    3
}

fn default_svg_scale() -> f32 {
    1.0
}

/// Per zone sidecar describing where the zone drawing lives and how it lines
/// up with the world.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ZoneConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub svg: Option<PathBuf>,
    pub x: [f64; 2],
    pub y: [f64; 2],
    pub lat: [f64; 2],
    pub lon: [f64; 2],
    #[serde(default)]
    pub rotation: Option<f64>,
    #[serde(default)]
    pub y_axis: YDirection,
    #[serde(default)]
    pub extra_labels: Vec<ExtraLabel>,
    #[serde(default = "default_marker_colors")]
    pub marker_colors: Vec<String>,
    #[serde(default)]
    pub marker_channel: PaintChannel,
    #[serde(default = "default_label_max_len")]
    pub label_max_len: usize,
    #[serde(default = "default_svg_scale")]
    pub svg_scale: f32,
    #[serde(flatten)]
    pub matching: MatchConfig,
}

impl ZoneConfig {
    pub fn from_reader(reader: impl Read) -> Result<Self, Error> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Loads a sidecar file. A relative `svg` path is taken relative to the
    /// sidecar's directory.
    #[tracing::instrument]
    pub fn open(path: impl AsRef<Path> + std::fmt::Debug) -> Result<Self, Error> {
        let path = path.as_ref();
        let mut config = Self::from_reader(std::io::BufReader::new(std::fs::File::open(path)?))?;
        if let (Some(svg), Some(dir)) = (config.svg.as_mut(), path.parent()) {
            if svg.is_relative() {
                *svg = dir.join(&*svg);
            }
        }
        debug!(name = %config.name, svg = ?config.svg, "loaded zone");
        Ok(config)
    }

    /// Validated remapping bounds; fails on degenerate or non-finite spans.
    pub fn bounds(&self) -> Result<Bounds, Error> {
        let bounds = Bounds::new(self.x, self.y, self.lat, self.lon)?.with_y_axis(self.y_axis.into());
        Ok(match self.rotation {
            Some(radians) => bounds.with_rotation(radians)?,
            None => bounds,
        })
    }

    pub fn marker_colors(&self) -> Result<Vec<RGB>, Error> {
        self.marker_colors
            .iter()
            .map(|color| {
                crate::svg::parse::parse_paint(color).ok_or_else(|| SvgError::UnknownPaint(color.clone()).into())
            })
            .collect()
    }

    pub fn extra_labels(&self) -> Vec<Label> {
        self.extra_labels.iter().cloned().map(Label::from).collect()
    }

    pub fn label_filter(&self) -> LabelFilter {
        LabelFilter {
            max_len: self.label_max_len,
        }
    }
}

#[test]
fn minimal_sidecar_uses_defaults() {
    let config = ZoneConfig::from_reader(
        r#"{"x": [0, 612], "y": [0, 792], "lat": [43.194975, 43.196924], "lon": [-71.579557, -71.57225]}"#
            .as_bytes(),
    )
    .unwrap();

    assert_eq!(config.name, "zone");
    assert_eq!(config.svg, None);
    assert_eq!(config.y_axis, YDirection::Up);
    assert_eq!(config.marker_colors().unwrap(), vec![RGB::RED]);
    assert_eq!(config.marker_channel, PaintChannel::Stroke);
    assert_eq!(config.label_filter(), LabelFilter { max_len: 3 });
    assert_eq!(config.matching, MatchConfig::default());
    assert!(config.extra_labels().is_empty());
    assert!(config.bounds().unwrap().rotation().is_none());
}

#[test]
fn full_sidecar() {
    let config = ZoneConfig::from_reader(
        r##"{
            "name": "zone_b",
            "svg": "zone_b.svg",
            "x": [0, 10], "y": [0, 10], "lat": [40, 41], "lon": [-72, -71],
            "rotation": 0.25,
            "y_axis": "down",
            "extra_labels": [{"text": 14, "coords": [3.5, 4.0]}, {"text": "15", "coords": [1, 2]}],
            "marker_colors": ["rgb(100%, 0%, 0%)", "#f00"],
            "marker_channel": "either",
            "label_max_len": 4,
            "max_distance": 100,
            "accept_within": 5,
            "svg_scale": 0.5
        }"##
        .as_bytes(),
    )
    .unwrap();

    let bounds = config.bounds().unwrap();
    assert_eq!(bounds.rotation(), Some(0.25));
    assert_eq!(bounds.y_axis(), YAxis::Down);
    assert_eq!(
        config.extra_labels(),
        vec![Label::new(14u32, (3.5, 4.0)), Label::new(15u32, (1.0, 2.0))]
    );
    assert_eq!(config.marker_colors().unwrap(), vec![RGB::RED, RGB::RED]);
    assert_eq!(
        config.matching,
        MatchConfig {
            max_distance: Some(100.0),
            accept_within: Some(5.0)
        }
    );
    assert_eq!(config.svg_scale, 0.5);
}

#[test]
fn invalid_sidecars_fail_at_load() {
    let degenerate = ZoneConfig::from_reader(
        r#"{"x": [5, 5], "y": [0, 10], "lat": [40, 41], "lon": [-72, -71]}"#.as_bytes(),
    )
    .unwrap();
    assert!(matches!(degenerate.bounds(), Err(Error::Bounds(_))));

    let paint = ZoneConfig::from_reader(
        r#"{"x": [0, 5], "y": [0, 10], "lat": [40, 41], "lon": [-72, -71], "marker_colors": ["hotpink"]}"#
            .as_bytes(),
    )
    .unwrap();
    assert!(matches!(
        paint.marker_colors(),
        Err(Error::Svg(SvgError::UnknownPaint(_)))
    ));

    assert!(ZoneConfig::from_reader(r#"{"x": [0, 5]}"#.as_bytes()).is_err());
}
