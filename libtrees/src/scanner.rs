use geo::Coord;

use crate::{
    label::{Label, LabelId, Marker},
    pipe::Pipe,
    svg::SvgOperation,
    Error,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Marker(Marker),
    Label(Label),
}

/// Decides which text runs are tree numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelFilter {
    pub max_len: usize,
}

impl Default for LabelFilter {
    fn default() -> Self {
        Self { max_len: 3 }
    }
}

impl LabelFilter {
    pub fn accept(&self, text: &str) -> Option<LabelId> {
        let text = text.trim();
        let digits = text.bytes().all(|b| b.is_ascii_digit());
        (digits && (1..=self.max_len).contains(&text.len())).then(|| LabelId::parse(text))
    }
}

/// Sorts sampled zone operations into markers and labels.
///
/// Every path reaching this stage is a marker candidate, so color filtering
/// has to happen upstream.
pub struct ZoneScanner {
    filter: LabelFilter,
    groups: Vec<String>,
}

impl ZoneScanner {
    pub fn new(filter: LabelFilter) -> Self {
        Self {
            filter,
            groups: vec![],
        }
    }
}

impl Pipe for ZoneScanner {
    type Input = SvgOperation<Option<Coord<f64>>>;
    type Output = Primitive;

    type Error = Error;

    fn process(&mut self, input: Self::Input) -> Result<Option<Self::Output>, Self::Error> {
        match input {
            SvgOperation::StartNewGroup(id) => {
                trace!("new group: {id}");
                self.groups.push(id);
                Ok(None)
            }
            SvgOperation::EndNewGroup => {
                self.groups.pop();
                Ok(None)
            }
            SvgOperation::NewPath(Some(center), _) => {
                trace!(x = center.x, y = center.y, groups = ?self.groups, "marker");
                Ok(Some(Primitive::Marker(Marker(center))))
            }
            SvgOperation::NewPath(None, attrs) => {
                trace!(id = ?attrs.get("id"), "empty path has no center");
                Ok(None)
            }
            SvgOperation::NewText { anchor, text } => match self.filter.accept(&text) {
                Some(id) => {
                    trace!(%id, x = anchor.x, y = anchor.y, "label");
                    Ok(Some(Primitive::Label(Label { id, coords: anchor })))
                }
                None => {
                    trace!(%text, "not a label");
                    Ok(None)
                }
            },
            SvgOperation::NotSupported => Ok(None),
        }
    }
}

#[test]
fn label_filter_accepts_short_numbers() {
    let filter = LabelFilter::default();
    assert_eq!(filter.accept("12"), Some(LabelId::Number(12)));
    assert_eq!(filter.accept(" 7 "), Some(LabelId::Number(7)));
    assert_eq!(filter.accept("1234"), None);
    assert_eq!(filter.accept("12A"), None);
    assert_eq!(filter.accept(""), None);
    assert_eq!(filter.accept("Oak"), None);

    assert_eq!(LabelFilter { max_len: 4 }.accept("1234"), Some(LabelId::Number(1234)));
}

#[test]
fn scanner_sorts_markers_and_labels() {
    let mut scanner = ZoneScanner::new(LabelFilter::default());
    let ops = vec![
        SvgOperation::StartNewGroup("zone".to_string()),
        SvgOperation::NewPath(Some(geo::coord! { x: 1.0, y: 2.0 }), Default::default()),
        SvgOperation::NewPath(None, Default::default()),
        SvgOperation::NewText {
            anchor: geo::coord! { x: 1.5, y: 2.5 },
            text: "4".to_string(),
        },
        SvgOperation::NewText {
            anchor: geo::coord! { x: 0.0, y: 0.0 },
            text: "Legend".to_string(),
        },
        SvgOperation::NotSupported,
        SvgOperation::EndNewGroup,
    ];

    let primitives = ops
        .into_iter()
        .filter_map(|op| scanner.process(op).unwrap())
        .collect::<Vec<_>>();
    assert_eq!(
        primitives,
        vec![
            Primitive::Marker(Marker::from((1.0, 2.0))),
            Primitive::Label(Label::new(4u32, (1.5, 2.5))),
        ]
    );
    assert!(scanner.groups.is_empty());
}
