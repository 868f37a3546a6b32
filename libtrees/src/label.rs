use std::fmt;

use geo::Coord;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Tree identifier printed on the map. Mostly small integers, sometimes a
/// short code such as `12A`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged, from = "RawLabelId")]
pub enum LabelId {
    Number(u32),
    Text(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawLabelId {
    Number(u32),
    Text(String),
}

impl From<RawLabelId> for LabelId {
    fn from(raw: RawLabelId) -> Self {
        match raw {
            RawLabelId::Number(n) => LabelId::Number(n),
            RawLabelId::Text(text) => LabelId::parse(&text),
        }
    }
}

impl LabelId {
    /// All-digit text becomes a number so `"12"` and `12` name the same tree.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        match text.parse::<u32>() {
            Ok(n) if text.bytes().all(|b| b.is_ascii_digit()) => LabelId::Number(n),
            _ => LabelId::Text(text.to_string()),
        }
    }
}

impl From<u32> for LabelId {
    fn from(n: u32) -> Self {
        LabelId::Number(n)
    }
}

impl From<&str> for LabelId {
    fn from(text: &str) -> Self {
        LabelId::parse(text)
    }
}

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelId::Number(n) => write!(f, "{n}"),
            LabelId::Text(text) => f.write_str(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub id: LabelId,
    pub coords: Coord<f64>,
}

impl Label {
    pub fn new(id: impl Into<LabelId>, coords: impl Into<Coord<f64>>) -> Self {
        Self {
            id: id.into(),
            coords: coords.into(),
        }
    }
}

/// An unlabeled dot in document space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Marker(pub Coord<f64>);

impl From<Coord<f64>> for Marker {
    fn from(coords: Coord<f64>) -> Self {
        Marker(coords)
    }
}

impl From<(f64, f64)> for Marker {
    fn from(coords: (f64, f64)) -> Self {
        Marker(coords.into())
    }
}

/// Labels keyed by id, in first-insertion order. Inserting an id that is
/// already present moves its coordinates but keeps its place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelSet(IndexMap<LabelId, Coord<f64>>);

impl LabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the replaced coordinates, if any.
    pub fn insert(&mut self, label: Label) -> Option<Coord<f64>> {
        self.0.insert(label.id, label.coords)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Label> + '_ {
        self.0.iter().map(|(id, coords)| Label {
            id: id.clone(),
            coords: *coords,
        })
    }
}

impl Extend<Label> for LabelSet {
    fn extend<I: IntoIterator<Item = Label>>(&mut self, iter: I) {
        for label in iter {
            if let Some(previous) = self.insert(label) {
                trace!(?previous, "label overridden");
            }
        }
    }
}

impl FromIterator<Label> for LabelSet {
    fn from_iter<I: IntoIterator<Item = Label>>(iter: I) -> Self {
        let mut set = LabelSet::new();
        set.extend(iter);
        set
    }
}

#[test]
fn ids_from_text_and_json() {
    assert_eq!(LabelId::parse("012"), LabelId::Number(12));
    assert_eq!(LabelId::parse("12A"), LabelId::Text("12A".into()));
    assert_eq!(LabelId::parse("+5"), LabelId::Text("+5".into()));

    let ids: Vec<LabelId> = serde_json::from_str(r#"[7, "7", "7b"]"#).unwrap();
    assert_eq!(
        ids,
        vec![LabelId::Number(7), LabelId::Number(7), LabelId::Text("7b".into())]
    );
    assert_eq!(
        serde_json::to_string(&[LabelId::Number(3), LabelId::Text("3c".into())]).unwrap(),
        r#"[3,"3c"]"#
    );
}

#[test]
fn override_keeps_insertion_order() {
    let set: LabelSet = [
        Label::new(1u32, (0.0, 0.0)),
        Label::new(2u32, (1.0, 1.0)),
        Label::new(1u32, (5.0, 5.0)),
        Label::new("9", (2.0, 2.0)),
    ]
    .into_iter()
    .collect();

    let labels = set.iter().collect::<Vec<_>>();
    assert_eq!(
        labels,
        vec![
            Label::new(1u32, (5.0, 5.0)),
            Label::new(2u32, (1.0, 1.0)),
            Label::new(9u32, (2.0, 2.0)),
        ]
    );
}
