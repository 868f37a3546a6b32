use std::collections::HashMap;

use geo::{Coord, EuclideanDistance, Point};
use serde::{Deserialize, Serialize};

use crate::{
    label::{Label, LabelId, LabelSet, Marker},
    pipe::Pipe,
    scanner::Primitive,
    Error,
};

/// Limits on the nearest marker search. Both are off by default, in which
/// case every marker is considered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Markers at this distance or further never match.
    pub max_distance: Option<f64>,
    /// Stop scanning as soon as a marker closer than this is found.
    pub accept_within: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchedLabel {
    pub label: Label,
    pub marker: Option<Coord<f64>>,
    pub distance: Option<f64>,
    /// Set when an earlier label already claimed the same marker.
    pub ambiguous: bool,
}

/// A label that selected a marker some earlier label had already selected.
#[derive(Debug, Clone, PartialEq)]
pub struct Conflict {
    pub label: LabelId,
    pub claimed_by: LabelId,
    pub marker: Coord<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assignment {
    pub n: LabelId,
    pub coords: Option<[f64; 2]>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchOutcome {
    pub labels: Vec<MatchedLabel>,
    pub conflicts: Vec<Conflict>,
}

impl MatchOutcome {
    pub fn assignments(&self) -> Vec<Assignment> {
        self.labels
            .iter()
            .map(|matched| Assignment {
                n: matched.label.id.clone(),
                coords: matched.marker.map(|c| [c.x, c.y]),
            })
            .collect()
    }

    pub fn ambiguous(&self) -> impl Iterator<Item = &MatchedLabel> {
        self.labels.iter().filter(|matched| matched.ambiguous)
    }

    pub fn unmatched(&self) -> impl Iterator<Item = &MatchedLabel> {
        self.labels.iter().filter(|matched| matched.marker.is_none())
    }
}

/// Markers are identified by their coordinates, `-0.0` and `0.0` alike.
fn marker_key(coords: Coord<f64>) -> [u64; 2] {
    [(coords.x + 0.0).to_bits(), (coords.y + 0.0).to_bits()]
}

fn nearest(label: &Label, markers: &[Marker], config: &MatchConfig) -> Option<(Coord<f64>, f64)> {
    let origin = Point::from(label.coords);
    let mut best = None;
    let mut min = config.max_distance.unwrap_or(f64::INFINITY);

    for Marker(coords) in markers {
        let distance = origin.euclidean_distance(&Point::from(*coords));
        if distance < min {
            min = distance;
            best = Some((*coords, distance));
        }
        if config.accept_within.is_some_and(|within| distance < within) {
            break;
        }
    }
    best
}

/// Greedy first-come assignment of every label to its nearest marker.
///
/// Labels are handled in iteration order and never reassigned. A label whose
/// nearest marker was already taken keeps it anyway, is flagged ambiguous and
/// produces a [`Conflict`]. Ties go to the earliest marker.
pub fn match_labels(
    labels: impl IntoIterator<Item = Label>,
    markers: &[Marker],
    config: &MatchConfig,
) -> MatchOutcome {
    let mut claims: HashMap<[u64; 2], LabelId> = HashMap::new();
    let mut outcome = MatchOutcome::default();

    for label in labels {
        let Some((marker, distance)) = nearest(&label, markers, config) else {
            trace!(label = %label.id, "no marker in range");
            outcome.labels.push(MatchedLabel {
                label,
                marker: None,
                distance: None,
                ambiguous: false,
            });
            continue;
        };

        let ambiguous = match claims.get(&marker_key(marker)) {
            Some(first) => {
                warn!(
                    label = %label.id,
                    claimed_by = %first,
                    x = marker.x,
                    y = marker.y,
                    "marker already claimed, flagging for review"
                );
                outcome.conflicts.push(Conflict {
                    label: label.id.clone(),
                    claimed_by: first.clone(),
                    marker,
                });
                true
            }
            None => {
                claims.insert(marker_key(marker), label.id.clone());
                false
            }
        };

        trace!(label = %label.id, distance, ambiguous);
        outcome.labels.push(MatchedLabel {
            label,
            marker: Some(marker),
            distance: Some(distance),
            ambiguous,
        });
    }

    outcome
}

/// Matches a whole zone worth of scanned primitives at once. Manual labels
/// replace scanned ones with the same id.
pub struct MatchLabels {
    extra: Vec<Label>,
    config: MatchConfig,
}

impl MatchLabels {
    pub fn new(extra: Vec<Label>, config: MatchConfig) -> Self {
        Self { extra, config }
    }
}

impl Pipe for MatchLabels {
    type Input = Vec<Primitive>;
    type Output = MatchOutcome;

    type Error = Error;

    #[tracing::instrument(skip(self, input))]
    fn process(&mut self, input: Self::Input) -> Result<Option<Self::Output>, Self::Error> {
        let mut labels = LabelSet::new();
        let mut markers = vec![];
        for primitive in input {
            match primitive {
                Primitive::Label(label) => {
                    labels.insert(label);
                }
                Primitive::Marker(marker) => markers.push(marker),
            }
        }
        debug!(scanned = labels.len(), extra = self.extra.len(), markers = markers.len());
        labels.extend(self.extra.iter().cloned());

        let outcome = match_labels(labels.iter(), &markers, &self.config);
        info!(
            labels = outcome.labels.len(),
            ambiguous = outcome.conflicts.len(),
            unmatched = outcome.unmatched().count(),
            "matched labels"
        );
        Ok(Some(outcome))
    }
}

#[cfg(test)]
fn markers(points: &[(f64, f64)]) -> Vec<Marker> {
    points.iter().copied().map(Marker::from).collect()
}

#[test]
fn assignments_follow_label_order() {
    let labels = vec![
        Label::new(3u32, (9.0, 9.0)),
        Label::new(1u32, (0.0, 0.0)),
        Label::new(2u32, (5.0, 5.0)),
    ];
    let outcome = match_labels(
        labels,
        &markers(&[(0.0, 1.0), (5.0, 4.0), (9.0, 8.0)]),
        &MatchConfig::default(),
    );
    let ids = outcome.assignments().into_iter().map(|a| a.n).collect::<Vec<_>>();
    assert_eq!(
        ids,
        vec![LabelId::Number(3), LabelId::Number(1), LabelId::Number(2)]
    );
    assert!(outcome.conflicts.is_empty());
    assert_eq!(outcome.labels[0].marker, Some(geo::coord! { x: 9.0, y: 8.0 }));
    assert_eq!(outcome.labels[0].distance, Some(1.0));
}

#[test]
fn no_markers_leaves_every_label_unmatched() {
    let labels = vec![Label::new(1u32, (0.0, 0.0)), Label::new(2u32, (3.0, 3.0))];
    let outcome = match_labels(labels, &[], &MatchConfig::default());
    assert!(outcome
        .assignments()
        .iter()
        .all(|assignment| assignment.coords.is_none()));
    assert!(outcome.labels.iter().all(|l| l.distance.is_none() && !l.ambiguous));
    assert!(outcome.conflicts.is_empty());
    assert_eq!(outcome.unmatched().count(), 2);
}

#[test]
fn single_marker_is_shared_and_flagged() {
    let labels = (1..=4u32).map(|n| Label::new(n, (n as f64, 0.0)));
    let outcome = match_labels(labels, &markers(&[(0.0, 0.0)]), &MatchConfig::default());

    assert!(outcome
        .labels
        .iter()
        .all(|l| l.marker == Some(geo::coord! { x: 0.0, y: 0.0 })));
    let flags = outcome.labels.iter().map(|l| l.ambiguous).collect::<Vec<_>>();
    assert_eq!(flags, vec![false, true, true, true]);
    assert_eq!(outcome.conflicts.len(), 3);
    assert!(outcome
        .conflicts
        .iter()
        .all(|c| c.claimed_by == LabelId::Number(1)));
}

#[test]
fn two_labels_one_dot() {
    let labels = vec![Label::new(1u32, (0.0, 0.0)), Label::new(2u32, (0.0, 0.1))];
    let outcome = match_labels(labels, &markers(&[(0.0, 0.0)]), &MatchConfig::default());

    assert_eq!(
        outcome.assignments(),
        vec![
            Assignment {
                n: 1u32.into(),
                coords: Some([0.0, 0.0])
            },
            Assignment {
                n: 2u32.into(),
                coords: Some([0.0, 0.0])
            },
        ]
    );
    assert!(!outcome.labels[0].ambiguous);
    assert!(outcome.labels[1].ambiguous);
    assert_eq!(
        outcome.conflicts,
        vec![Conflict {
            label: 2u32.into(),
            claimed_by: 1u32.into(),
            marker: geo::coord! { x: 0.0, y: 0.0 },
        }]
    );
}

#[test]
fn matching_is_idempotent() {
    let labels = vec![
        Label::new(1u32, (0.0, 0.0)),
        Label::new(2u32, (2.0, 2.0)),
        Label::new("7b", (2.5, 2.0)),
    ];
    let dots = markers(&[(0.5, 0.0), (2.2, 2.0), (10.0, 10.0)]);
    let config = MatchConfig::default();
    assert_eq!(
        match_labels(labels.clone(), &dots, &config),
        match_labels(labels, &dots, &config)
    );
}

#[test]
fn ties_go_to_the_first_marker() {
    let outcome = match_labels(
        vec![Label::new(1u32, (0.0, 0.0))],
        &markers(&[(1.0, 0.0), (-1.0, 0.0), (0.0, 1.0)]),
        &MatchConfig::default(),
    );
    assert_eq!(outcome.labels[0].marker, Some(geo::coord! { x: 1.0, y: 0.0 }));
}

#[test]
fn max_distance_excludes_far_markers() {
    let config = MatchConfig {
        max_distance: Some(5.0),
        accept_within: None,
    };
    let outcome = match_labels(
        vec![Label::new(1u32, (0.0, 0.0)), Label::new(2u32, (20.0, 0.0))],
        &markers(&[(3.0, 4.0), (30.0, 0.0)]),
        &config,
    );
    // exactly at the ceiling is still too far
    assert_eq!(outcome.labels[0].marker, None);
    assert_eq!(outcome.labels[1].marker, None);
    assert!(outcome.conflicts.is_empty());
}

#[test]
fn accept_within_stops_the_scan() {
    let config = MatchConfig {
        max_distance: None,
        accept_within: Some(2.0),
    };
    let outcome = match_labels(
        vec![Label::new(1u32, (0.0, 0.0))],
        &markers(&[(1.5, 0.0), (0.1, 0.0)]),
        &config,
    );
    assert_eq!(outcome.labels[0].marker, Some(geo::coord! { x: 1.5, y: 0.0 }));
    assert_eq!(outcome.labels[0].distance, Some(1.5));
}

#[test]
fn extra_labels_replace_scanned_ones() {
    let mut pipe = MatchLabels::new(vec![Label::new(2u32, (10.0, 10.0))], MatchConfig::default());
    let outcome = pipe
        .process(vec![
            Primitive::Label(Label::new(2u32, (0.0, 0.0))),
            Primitive::Marker(Marker::from((0.0, 0.0))),
            Primitive::Label(Label::new(5u32, (1.0, 0.0))),
            Primitive::Marker(Marker::from((10.0, 9.0))),
        ])
        .unwrap()
        .unwrap();

    assert_eq!(
        outcome.assignments(),
        vec![
            Assignment {
                n: 2u32.into(),
                coords: Some([10.0, 9.0])
            },
            Assignment {
                n: 5u32.into(),
                coords: Some([0.0, 0.0])
            },
        ]
    );
    assert!(outcome.conflicts.is_empty());
}
