use geo::{Coord, LineString};

use crate::{georef::GeoLine, pipe::Pipe, Error};

/// `a` and `b` are equal within `threshold`, or within a relative `1e-9`
/// for large magnitudes.
fn is_close(a: f64, b: f64, threshold: f64) -> bool {
    (a - b).abs() <= (1e-9 * a.abs().max(b.abs())).max(threshold)
}

fn coords_close(a: Coord<f64>, b: Coord<f64>, threshold: f64) -> bool {
    is_close(a.x, b.x, threshold) && is_close(a.y, b.y, threshold)
}

/// Drops every coordinate that is close, on both axes, to the last one kept.
pub fn remove_close_coords(line: &LineString, threshold: f64) -> LineString {
    let mut kept: Vec<Coord<f64>> = Vec::with_capacity(line.0.len());
    for coord in line.coords() {
        match kept.last() {
            Some(last) if coords_close(*last, *coord, threshold) => {}
            _ => kept.push(*coord),
        }
    }
    LineString(kept)
}

/// Thins out georeferenced lines and discards the ones left too short to
/// draw.
pub struct CleanLines {
    threshold: f64,
    min_points: usize,
}

impl CleanLines {
    pub fn new(threshold: f64, min_points: usize) -> Self {
        Self {
            threshold,
            min_points,
        }
    }
}

impl Pipe for CleanLines {
    type Input = Vec<GeoLine>;
    type Output = Vec<GeoLine>;

    type Error = Error;

    #[tracing::instrument(skip_all, fields(threshold = self.threshold))]
    fn process(&mut self, input: Self::Input) -> Result<Option<Self::Output>, Self::Error> {
        let before = input.len();
        let lines = input
            .into_iter()
            .filter_map(|mut line| {
                let points = line.line.0.len();
                line.line = remove_close_coords(&line.line, self.threshold);
                trace!(id = %line.id, points, kept = line.line.0.len());
                (line.line.0.len() >= self.min_points).then_some(line)
            })
            .collect::<Vec<_>>();
        debug!(dropped = before - lines.len(), kept = lines.len());
        Ok(Some(lines))
    }
}

#[test]
fn close_neighbours_collapse_to_the_first() {
    let line = LineString::from(vec![
        (0.0, 0.0),
        (0.000001, 0.000002),
        (0.00001, 0.0),
        (0.00001, 0.00003),
        (0.000012, 0.000031),
    ]);
    let cleaned = remove_close_coords(&line, 0.000007);
    assert_eq!(
        cleaned,
        LineString::from(vec![(0.0, 0.0), (0.00001, 0.0), (0.00001, 0.00003)])
    );
}

#[test]
fn close_on_one_axis_is_kept() {
    let line = LineString::from(vec![(0.0, 0.0), (0.0, 1.0), (0.0, 2.0)]);
    assert_eq!(remove_close_coords(&line, 0.5), line);
    assert_eq!(remove_close_coords(&LineString::new(vec![]), 0.5).0.len(), 0);
}

#[test]
fn short_lines_are_dropped() {
    let line = |id: &str, points: Vec<(f64, f64)>| GeoLine {
        id: id.to_string(),
        groups: vec![],
        line: LineString::from(points),
    };
    let lines = CleanLines::new(0.1, 3)
        .process(vec![
            line("a", vec![(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]),
            line("b", vec![(0.0, 0.0), (0.01, 0.0), (1.0, 0.0)]),
        ])
        .unwrap()
        .unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].id, "a");
}
