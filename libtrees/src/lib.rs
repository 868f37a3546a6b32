//! Georeferencing of printed tree inventories.
//!
//! A zone drawing (SVG) holds red dots for trees and short numbers for their
//! ids. [`extract_zone`] pairs every number with its nearest dot, flags dots
//! claimed twice, and maps the result onto latitude/longitude.
//! [`extract_vegetation`] does the same remapping for outlines such as
//! planting beds.

#[macro_use]
extern crate tracing;

use std::{io::Write, path::PathBuf};

pub mod clean;
pub mod georef;
pub mod label;
pub mod matcher;
pub mod pipe;
pub mod scanner;
pub mod ser;
pub mod svg;
pub mod table;
pub mod vegetation;
pub mod zone;

pub use geobounds::{Bounds, BoundsError, LatLon, YAxis};

use crate::{
    clean::CleanLines,
    georef::{GeoLine, ToGeo},
    matcher::{MatchLabels, MatchOutcome},
    pipe::{Pipe, Producer, Tee, TryCollector},
    scanner::{Primitive, ZoneScanner},
    ser::{WriteAssignments, WriteGeojson},
    svg::{parse::RGB, CenterSampler, LineStringSampler, PaintChannel, PaintFilter, SvgError, SvgReader},
    table::{InventoryTable, Tabulate},
    vegetation::{LineCollector, VegetationLine},
    zone::ZoneConfig,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Svg(#[from] SvgError),
    #[error(transparent)]
    Bounds(#[from] BoundsError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Regex(#[from] regex::Error),
    #[error("table pattern has no `id` capture group")]
    TableMissingId,
    #[error("pipeline produced no output")]
    EmptyPipeline,
    #[error("`{0}` already exists")]
    OutputExists(PathBuf),
    #[error("resampling rate must be a positive number of units, got {0}")]
    InvalidRate(f32),
}

/// Matches the labels of one zone drawing to its markers.
///
/// Writes the assignments and the georeferenced trees (with `table`
/// attributes attached) and returns the match for inspection. Conflicts are
/// logged, not treated as errors.
#[tracing::instrument(skip_all, fields(zone = %zone.name))]
pub fn extract_zone(
    content: &str,
    zone: &ZoneConfig,
    table: InventoryTable,
    assignments: impl Write,
    geojson: impl Write,
) -> Result<MatchOutcome, Error> {
    let bounds = zone.bounds()?;
    let colors = zone.marker_colors()?;

    let pipes = ::svg::read(content)?
        .feed(
            SvgReader::scaled(zone.svg_scale)
                .pipe(PaintFilter::new(colors, zone.marker_channel))
                .pipe(CenterSampler)
                .pipe(ZoneScanner::new(zone.label_filter())),
        )
        .producer()
        .feed(
            TryCollector::<_, Vec<Primitive>>::new()
                .pipe(MatchLabels::new(zone.extra_labels(), zone.matching))
                .pipe(Tee::new(WriteAssignments::new(assignments)))
                .pipe(Tee::new(
                    ToGeo::<MatchOutcome>::new(bounds)
                        .pipe(Tabulate::new(table))
                        .pipe(WriteGeojson::new(geojson)),
                )),
        );

    pipe::run(pipes)
}

/// Stroke colors of vegetation outlines: pure red, and the darker red some
/// sheets were printed with.
pub const VEGETATION_COLORS: [RGB; 2] = [RGB::RED, RGB { r: 154, g: 27, b: 30 }];

#[derive(Debug, Clone, PartialEq)]
pub struct VegetationOptions {
    /// Resampling interval, in document units. Must be positive.
    pub rate: f32,
    /// Neighbouring coordinates closer than this, in degrees, are merged.
    pub threshold: f64,
    pub min_points: usize,
    pub colors: Vec<RGB>,
    pub channel: PaintChannel,
}

impl VegetationOptions {
    pub fn validate(&self) -> Result<(), Error> {
        if !(self.rate.is_finite() && self.rate > 0.0) {
            return Err(Error::InvalidRate(self.rate));
        }
        Ok(())
    }
}

impl Default for VegetationOptions {
    fn default() -> Self {
        Self {
            rate: 2.0,
            threshold: 0.000007,
            min_points: 3,
            colors: VEGETATION_COLORS.to_vec(),
            channel: PaintChannel::Stroke,
        }
    }
}

/// Resamples the vegetation outlines of a zone drawing into cleaned lon/lat
/// line strings and writes them as GeoJSON.
#[tracing::instrument(skip_all, fields(zone = %zone.name, rate = options.rate))]
pub fn extract_vegetation(
    content: &str,
    zone: &ZoneConfig,
    options: &VegetationOptions,
    output: impl Write,
) -> Result<Vec<GeoLine>, Error> {
    options.validate()?;
    let bounds = zone.bounds()?;

    let pipes = ::svg::read(content)?
        .feed(
            SvgReader::scaled(zone.svg_scale)
                .pipe(PaintFilter::new(options.colors.clone(), options.channel))
                .pipe(LineStringSampler { rate: options.rate })
                .pipe(LineCollector::new()),
        )
        .producer()
        .feed(
            TryCollector::<_, Vec<VegetationLine>>::new()
                .pipe(ToGeo::<Vec<VegetationLine>>::new(bounds))
                .pipe(CleanLines::new(options.threshold, options.min_points))
                .pipe(Tee::new(WriteGeojson::new(output))),
        );

    pipe::run(pipes)
}

#[cfg(test)]
const ZONE_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10">
  <g id="trees">
    <path id="dot1" d="M 0.5 0.5 L 1.5 0.5 L 1.5 1.5 L 0.5 1.5 Z" stroke="rgb(100%, 0%, 0%)" fill="none"/>
    <path id="dot2" d="M 7.5 7.5 L 8.5 7.5 L 8.5 8.5 L 7.5 8.5 Z" style="fill:none;stroke:#ff0000"/>
    <path id="road" d="M 0 5 L 10 5" stroke="#000000"/>
    <text x="1.5" y="1.5">1</text>
    <text x="1.5" y="2.0">2</text>
    <text x="8.5" y="8.5">3</text>
    <text x="5" y="9">Zone A</text>
  </g>
</svg>"##;

#[cfg(test)]
fn zone(json: &str) -> ZoneConfig {
    ZoneConfig::from_reader(json.as_bytes()).unwrap()
}

#[test]
fn zone_end_to_end() {
    let zone = zone(r#"{"name": "a", "x": [0, 10], "y": [0, 10], "lat": [40, 41], "lon": [-72, -71]}"#);
    let table = InventoryTable::parse("3 Acer rubrum\n", r"(?P<id>\d+) (?P<species>.+)").unwrap();

    let (mut assignments, mut geojson) = (Vec::<u8>::new(), Vec::<u8>::new());
    let outcome = extract_zone(ZONE_SVG, &zone, table, &mut assignments, &mut geojson).unwrap();

    assert_eq!(outcome.labels.len(), 3);
    assert_eq!(outcome.conflicts.len(), 1);
    assert_eq!(outcome.conflicts[0].label, label::LabelId::Number(2));
    assert_eq!(outcome.conflicts[0].claimed_by, label::LabelId::Number(1));
    assert_eq!(outcome.labels[2].marker, Some(geo::coord! { x: 8.0, y: 8.0 }));

    let assignments: serde_json::Value = serde_json::from_slice(&assignments).unwrap();
    assert_eq!(
        assignments,
        serde_json::json!({"assignments": [
            {"n": 1, "coords": [1.0, 1.0]},
            {"n": 2, "coords": [1.0, 1.0]},
            {"n": 3, "coords": [8.0, 8.0]},
        ]})
    );

    let geojson: serde_json::Value = serde_json::from_slice(&geojson).unwrap();
    let features = geojson["features"].as_array().unwrap();
    assert_eq!(features.len(), 3);
    assert_eq!(features[1]["properties"]["verify"], true);
    assert_eq!(features[2]["properties"]["species"], "Acer rubrum");
    assert_eq!(features[2]["geometry"]["coordinates"][1], 40.8);
}

#[test]
fn zone_extra_labels_override_scanned_ones() {
    let zone = zone(
        r#"{"x": [0, 10], "y": [0, 10], "lat": [40, 41], "lon": [-72, -71],
            "extra_labels": [{"text": 2, "coords": [8, 7.5]}, {"text": "44", "coords": [0, 0]}],
            "max_distance": 3}"#,
    );
    let outcome = extract_zone(
        ZONE_SVG,
        &zone,
        InventoryTable::default(),
        std::io::sink(),
        std::io::sink(),
    )
    .unwrap();

    let markers = outcome
        .assignments()
        .into_iter()
        .map(|a| (a.n.to_string(), a.coords))
        .collect::<Vec<_>>();
    assert_eq!(
        markers,
        vec![
            ("1".to_string(), Some([1.0, 1.0])),
            ("2".to_string(), Some([8.0, 8.0])),
            ("3".to_string(), Some([8.0, 8.0])),
            ("44".to_string(), Some([1.0, 1.0])),
        ]
    );
    let flagged = outcome.ambiguous().map(|l| l.label.id.to_string()).collect::<Vec<_>>();
    assert_eq!(flagged, vec!["3", "44"]);
}

#[test]
fn zone_without_markers() {
    let zone = zone(r##"{"x": [0, 10], "y": [0, 10], "lat": [40, 41], "lon": [-72, -71], "marker_colors": ["#00ff00"]}"##);
    let mut geojson = Vec::<u8>::new();
    let outcome = extract_zone(ZONE_SVG, &zone, InventoryTable::default(), std::io::sink(), &mut geojson).unwrap();

    assert_eq!(outcome.unmatched().count(), 3);
    assert!(outcome.conflicts.is_empty());
    let geojson: serde_json::Value = serde_json::from_slice(&geojson).unwrap();
    assert!(geojson["features"].as_array().unwrap().is_empty());
}

#[test]
fn zone_with_degenerate_bounds_fails() {
    let zone = zone(r#"{"x": [5, 5], "y": [0, 10], "lat": [40, 41], "lon": [-72, -71]}"#);
    let err = extract_zone(ZONE_SVG, &zone, InventoryTable::default(), std::io::sink(), std::io::sink());
    assert!(matches!(err, Err(Error::Bounds(BoundsError::Degenerate { .. }))));
}

#[test]
fn vegetation_end_to_end() {
    let content = r##"<svg xmlns="http://www.w3.org/2000/svg">
      <g inkscape:label="beds">
        <path id="bed" d="M 0 0 L 10 0 L 10 10" stroke="rgb(60.351562%, 10.594177%, 11.767578%)"/>
        <path id="stub" d="M 0 0 L 0.5 0" stroke="#f00"/>
        <path id="fence" d="M 0 0 L 10 10" stroke="black"/>
      </g>
    </svg>"##;
    let zone = zone(r#"{"x": [0, 10], "y": [0, 10], "lat": [40, 41], "lon": [-72, -71]}"#);

    let mut out = Vec::<u8>::new();
    let lines = extract_vegetation(content, &zone, &VegetationOptions::default(), &mut out).unwrap();

    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].id, "bed");
    assert_eq!(lines[0].groups, vec!["beds"]);
    assert!(lines[0].line.0.len() >= 3);
    assert_eq!(lines[0].line.0.last(), Some(&geo::coord! { x: -71.0, y: 41.0 }));

    let geojson: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(geojson["features"][0]["geometry"]["type"], "LineString");
    assert_eq!(geojson["features"][0]["id"], "bed");
}

#[cfg(test)]
fn assign(body: &str) -> Vec<(String, Option<[f64; 2]>)> {
    let content = format!(r#"<svg xmlns="http://www.w3.org/2000/svg">{body}</svg>"#);
    let zone = zone(r#"{"x": [0, 20], "y": [0, 20], "lat": [40, 41], "lon": [-72, -71]}"#);
    extract_zone(&content, &zone, InventoryTable::default(), std::io::sink(), std::io::sink())
        .unwrap()
        .assignments()
        .into_iter()
        .map(|a| (a.n.to_string(), a.coords))
        .collect()
}

#[test]
fn zone_with_wrapped_path_data() {
    let assigned = assign(
        "<path d=\"M 0 0\n L 8 0\n L 8 8\n L 0 8 Z\" stroke=\"#ff0000\"/>\n<text x=\"4\" y=\"4\">1</text>",
    );
    assert_eq!(assigned, vec![("1".to_string(), Some([4.0, 4.0]))]);
}

#[test]
fn zone_with_closed_path_elements() {
    let assigned = assign(
        r##"<path d="M 0 0 L 2 0 L 2 2 L 0 2 Z" stroke="#ff0000"></path><text x="5" y="5">4</text>"##,
    );
    assert_eq!(assigned, vec![("4".to_string(), Some([1.0, 1.0]))]);
}

#[test]
fn zone_labels_match_from_their_centre() {
    // the baseline start (0, 10) sits next to the dot at (0, 11), the glyph
    // box centre (2.78, 6.5) next to the one at (3, 6)
    let assigned = assign(
        r##"<path d="M -0.5 10.5 L 0.5 10.5 L 0.5 11.5 L -0.5 11.5 Z" stroke="#ff0000"/>
            <path d="M 2.5 5.5 L 3.5 5.5 L 3.5 6.5 L 2.5 6.5 Z" stroke="#ff0000"/>
            <text x="0" y="10" font-size="10">1</text>"##,
    );
    assert_eq!(assigned, vec![("1".to_string(), Some([3.0, 6.0]))]);
}

#[test]
fn zone_in_transformed_group() {
    let assigned = assign(
        r##"<g transform="translate(10, 10)">
              <path d="M -1 -1 L 1 -1 L 1 1 L -1 1 Z" stroke="#ff0000"/>
              <text x="0" y="0">9</text>
            </g>
            <path d="M 0 0 L 2 0 L 2 2 L 0 2 Z" stroke="#ff0000"/>
            <text x="9" y="9">8</text>"##,
    );
    assert_eq!(
        assigned,
        vec![("9".to_string(), Some([10.0, 10.0])), ("8".to_string(), Some([10.0, 10.0]))]
    );
}

#[test]
fn vegetation_rejects_non_positive_rate() {
    let zone = zone(r#"{"x": [0, 10], "y": [0, 10], "lat": [40, 41], "lon": [-72, -71]}"#);
    for rate in [0.0, -2.0, f32::NAN] {
        let options = VegetationOptions {
            rate,
            ..Default::default()
        };
        let err = extract_vegetation("<svg></svg>", &zone, &options, std::io::sink());
        assert!(matches!(err, Err(Error::InvalidRate(_))));
    }
}
