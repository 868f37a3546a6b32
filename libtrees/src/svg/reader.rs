use std::{collections::HashMap, ops::Deref};

use geo::Coord;
use lyon_geom::{Point, Transform, Vector};
use lyon_path::{
    traits::{Build, SvgPathBuilder},
    Path,
};
use svg::{
    node::{element::tag::Type, Value},
    parser::Event,
};

use crate::{
    pipe::Pipe,
    svg::{
        parse::{parse_length, parse_transform, path_to_operations, style_value, Operation},
        SvgError,
    },
    Error,
};

/// Advance of a digit glyph, in em.
const DIGIT_ADVANCE: f32 = 0.556;
/// Height of a text box centre above the baseline, in em.
const CENTRE_RISE: f32 = 0.35;

pub enum SvgOperation<S> {
    StartNewGroup(String),
    NewPath(S, HashMap<String, Value>),
    /// A run of text, positioned at the estimated centre of its box.
    NewText {
        anchor: Coord<f64>,
        text: String,
    },
    EndNewGroup,
    NotSupported,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
enum TextAlign {
    #[default]
    Start,
    Middle,
    End,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct TextStyle {
    font_size: Option<f32>,
    align: TextAlign,
}

impl TextStyle {
    fn attr<'v>(attrs: &'v HashMap<String, Value>, key: &str) -> Option<&'v str> {
        attrs
            .get(key)
            .map(Deref::deref)
            .or_else(|| attrs.get("style").and_then(|style| style_value(style, key)))
    }

    /// `font-size` and `text-anchor` of `attrs`, falling back to `self`.
    fn inherit(self, attrs: &HashMap<String, Value>) -> Self {
        Self {
            font_size: Self::attr(attrs, "font-size")
                .and_then(parse_length)
                .or(self.font_size),
            align: match Self::attr(attrs, "text-anchor").map(str::trim) {
                Some("start") => TextAlign::Start,
                Some("middle") => TextAlign::Middle,
                Some("end") => TextAlign::End,
                _ => self.align,
            },
        }
    }

    /// Offset from the text origin to the centre of a run of `chars` glyphs.
    /// Without a font size the origin is used as is.
    fn centre_offset(&self, chars: usize) -> Vector<f32> {
        let Some(size) = self.font_size else {
            return Vector::zero();
        };
        let width = DIGIT_ADVANCE * size * chars as f32;
        let dx = match self.align {
            TextAlign::Start => width / 2.0,
            TextAlign::Middle => 0.0,
            TextAlign::End => -width / 2.0,
        };
        Vector::new(dx, -CENTRE_RISE * size)
    }
}

/// The `<text>` element being read.
struct TextRun {
    transform: Transform<f32>,
    base: TextStyle,
    style: TextStyle,
    origin: Option<Point<f32>>,
}

/// Turns raw svg parser events into [`SvgOperation`]s. Paths and text
/// positions go through their own and their groups' `transform` attributes,
/// then through the reader's `transform`.
pub struct SvgReader<'a> {
    transform: Transform<f32>,
    groups: Vec<Transform<f32>>,
    text: Option<TextRun>,
    _s: std::marker::PhantomData<&'a ()>,
}

impl Default for SvgReader<'_> {
    fn default() -> Self {
        Self::new(Transform::identity())
    }
}

impl SvgReader<'_> {
    pub fn new(transform: Transform<f32>) -> Self {
        Self {
            transform,
            groups: vec![],
            text: None,
            _s: std::marker::PhantomData,
        }
    }

    pub fn scaled(factor: f32) -> Self {
        Self::new(Transform::scale(factor, factor))
    }

    fn current(&self) -> Transform<f32> {
        self.groups.last().copied().unwrap_or(self.transform)
    }

    /// Element transform followed by everything above it.
    fn element_transform(&self, attrs: &HashMap<String, Value>) -> Result<Transform<f32>, SvgError> {
        let local = match attrs.get("transform") {
            Some(value) => parse_transform(value).ok_or_else(|| SvgError::InvalidTransform {
                value: value.to_string(),
            })?,
            None => Transform::identity(),
        };
        Ok(local.then(&self.current()))
    }

    /// First number of the `x` and `y` attributes, both of which may be lists.
    fn origin(attrs: &HashMap<String, Value>) -> Option<Point<f32>> {
        fn first(attrs: &HashMap<String, Value>, key: &str) -> Option<f32> {
            attrs
                .get(key)?
                .split(|c: char| c.is_whitespace() || c == ',')
                .find(|s| !s.is_empty())?
                .parse()
                .ok()
        }
        Some(lyon_geom::point(first(attrs, "x")?, first(attrs, "y")?))
    }
}

impl<'a> Pipe for SvgReader<'a> {
    type Input = Event<'a>;
    type Output = SvgOperation<Path>;

    type Error = Error;

    fn process(&mut self, event: Self::Input) -> Result<Option<Self::Output>, Self::Error> {
        match event {
            Event::Tag("g", Type::Start, attrs) => {
                let transform = self.element_transform(&attrs)?;
                self.groups.push(transform);
                Ok(Some(SvgOperation::StartNewGroup(
                    attrs
                        .get("inkscape:label")
                        .or(attrs.get("id"))
                        .map(ToString::to_string)
                        .unwrap_or_default(),
                )))
            }
            Event::Tag("g", Type::End, _) => {
                self.groups.pop();
                Ok(Some(SvgOperation::EndNewGroup))
            }
            Event::Tag("path", Type::Start | Type::Empty, attrs) => {
                if !attrs.contains_key("d") {
                    return Err(SvgError::PathNotFound { attrs }.into());
                }
                let transform = self.element_transform(&attrs)?;
                let path = build_path(&attrs["d"], Path::svg_builder())?.transformed(&transform);
                Ok(Some(SvgOperation::NewPath(path, attrs)))
            }
            Event::Tag("text", Type::Start, attrs) => {
                let style = TextStyle::default().inherit(&attrs);
                self.text = Some(TextRun {
                    transform: self.element_transform(&attrs)?,
                    base: style,
                    style,
                    origin: Self::origin(&attrs),
                });
                Ok(Some(SvgOperation::NotSupported))
            }
            Event::Tag("tspan", Type::Start, attrs) => {
                if let Some(run) = self.text.as_mut() {
                    run.style = run.base.inherit(&attrs);
                    if let Some(origin) = Self::origin(&attrs) {
                        run.origin = Some(origin);
                    }
                }
                Ok(Some(SvgOperation::NotSupported))
            }
            Event::Tag("text", Type::End, _) => {
                self.text = None;
                Ok(Some(SvgOperation::NotSupported))
            }
            Event::Text(text) => match &self.text {
                Some(TextRun {
                    transform,
                    style,
                    origin: Some(origin),
                    ..
                }) if !text.trim().is_empty() => {
                    let text = text.trim();
                    let centre = *origin + style.centre_offset(text.chars().count());
                    let centre = transform.transform_point(centre);
                    Ok(Some(SvgOperation::NewText {
                        anchor: geo::coord! { x: centre.x as f64, y: centre.y as f64 },
                        text: text.to_string(),
                    }))
                }
                _ => Ok(Some(SvgOperation::NotSupported)),
            },
            Event::Error(err) => Err(SvgError::Parse(err.to_string()).into()),
            _ => Ok(Some(SvgOperation::NotSupported)),
        }
    }
}

/// Builds `d` into a path. Data left over after the last command is an error.
pub fn build_path(
    d: &str,
    builder: impl SvgPathBuilder + Build<PathType = Path> + 'static,
) -> Result<Path, SvgError> {
    let invalid = || SvgError::InvalidPath { d: d.to_string() };
    let (rest, ops) = path_to_operations(d).map_err(|_| invalid())?;
    if !rest.trim().is_empty() {
        return Err(invalid());
    }
    Ok(ops
        .into_iter()
        .flatten()
        .fold(builder, |mut builder, op| {
            match op {
                Operation::MoveTo(to) => SvgPathBuilder::move_to(&mut builder, to),
                Operation::LineTo(to) => SvgPathBuilder::line_to(&mut builder, to),
                Operation::QuadBezierTo { ctrl, to } => SvgPathBuilder::quadratic_bezier_to(&mut builder, ctrl, to),
                Operation::SmoothQuadBezierTo(to) => SvgPathBuilder::smooth_quadratic_bezier_to(&mut builder, to),
                Operation::ArcTo {
                    radii,
                    x_rotation,
                    flags,
                    to,
                } => SvgPathBuilder::arc_to(&mut builder, radii, x_rotation, flags, to),
                Operation::RelMoveTo(to) => SvgPathBuilder::relative_move_to(&mut builder, to),
                Operation::RelQuadBezierTo { ctrl, to } => {
                    SvgPathBuilder::relative_quadratic_bezier_to(&mut builder, ctrl, to)
                }
                Operation::SmoothRelQuadBezierTo(to) => {
                    SvgPathBuilder::smooth_relative_quadratic_bezier_to(&mut builder, to)
                }
                Operation::RelLineTo(to) => SvgPathBuilder::relative_line_to(&mut builder, to),
                Operation::RelArcTo {
                    radii,
                    x_rotation,
                    flags,
                    to,
                } => SvgPathBuilder::relative_arc_to(&mut builder, radii, x_rotation, flags, to),
                Operation::VerticalLineTo(to) => SvgPathBuilder::vertical_line_to(&mut builder, to),
                Operation::HorizontalLineTo(to) => SvgPathBuilder::horizontal_line_to(&mut builder, to),
                Operation::RelVerticalLineTo(dy) => SvgPathBuilder::relative_vertical_line_to(&mut builder, dy),
                Operation::RelHorizontalLineTo(dx) => SvgPathBuilder::relative_horizontal_line_to(&mut builder, dx),
                Operation::CubicBezierTo { ctrl1, ctrl2, to } => {
                    SvgPathBuilder::cubic_bezier_to(&mut builder, ctrl1, ctrl2, to)
                }
                Operation::RelCubicBezierTo { ctrl1, ctrl2, to } => {
                    SvgPathBuilder::relative_cubic_bezier_to(&mut builder, ctrl1, ctrl2, to)
                }
                Operation::SmoothCubicBezierTo { ctrl2, to } => {
                    SvgPathBuilder::smooth_cubic_bezier_to(&mut builder, ctrl2, to)
                }
                Operation::SmoothRelCubicBezierTo { ctrl2, to } => {
                    SvgPathBuilder::smooth_relative_cubic_bezier_to(&mut builder, ctrl2, to)
                }
                Operation::Close => SvgPathBuilder::close(&mut builder),
            };
        builder
        })
        .build())
}

#[cfg(test)]
fn read_all(content: &str) -> Vec<SvgOperation<Path>> {
    let mut reader = SvgReader::default();
    svg::read(content)
        .unwrap()
        .filter_map(|event| reader.process(event).unwrap())
        .collect()
}

#[test]
fn reads_groups_paths_and_text() {
    let content = r#"<svg xmlns="http://www.w3.org/2000/svg">
        <g id="zone_a">
            <path d="M 0 0 L 10 0 L 10 10 Z" stroke="rgb(100%, 0%, 0%)"/>
            <text x="4.5" y="7"><tspan x="5 6" y="8">12</tspan></text>
        </g>
    </svg>"#;

    let ops = read_all(content);
    assert!(ops
        .iter()
        .any(|op| matches!(op, SvgOperation::StartNewGroup(id) if id == "zone_a")));
    assert!(ops
        .iter()
        .any(|op| matches!(op, SvgOperation::NewPath(_, attrs) if attrs.contains_key("stroke"))));
    let texts = ops
        .iter()
        .filter_map(|op| match op {
            SvgOperation::NewText { anchor, text } => Some((*anchor, text.clone())),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(texts, vec![(geo::coord! { x: 5.0, y: 8.0 }, "12".to_string())]);
}

#[test]
fn path_without_data_is_an_error() {
    let mut reader = SvgReader::default();
    let err = svg::read(r#"<svg><path stroke="red"/></svg>"#)
        .unwrap()
        .find_map(|event| reader.process(event).err());
    assert!(matches!(
        err,
        Some(Error::Svg(SvgError::PathNotFound { .. }))
    ));
}

#[test]
fn scaled_reader_scales_text_anchors() {
    let mut reader = SvgReader::scaled(2.0);
    let texts = svg::read(r#"<svg><text x="1" y="3">7</text></svg>"#)
        .unwrap()
        .filter_map(|event| match reader.process(event).unwrap() {
            Some(SvgOperation::NewText { anchor, .. }) => Some(anchor),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(texts, vec![geo::coord! { x: 2.0, y: 6.0 }]);
}

#[test]
fn closed_path_elements() {
    let ops = read_all(r#"<svg><path d="M 0 0 L 2 0 L 2 2 Z" stroke="red"></path></svg>"#);
    let paths = ops.iter().filter(|op| matches!(op, SvgOperation::NewPath(..))).count();
    assert_eq!(paths, 1);
}

#[test]
fn trailing_path_data_is_an_error() {
    let mut reader = SvgReader::default();
    let err = svg::read(r#"<svg><path d="M 0 0 L 2 0 ; L 2 2"/></svg>"#)
        .unwrap()
        .find_map(|event| reader.process(event).err());
    assert!(matches!(
        err,
        Some(Error::Svg(SvgError::InvalidPath { d })) if d == "M 0 0 L 2 0 ; L 2 2"
    ));
}

#[test]
fn group_and_element_transforms() {
    let content = r#"<svg>
        <g transform="translate(10 0)">
            <g transform="scale(2)">
                <path d="M 1 1 L 2 2" transform="translate(1, 0)"/>
                <text x="1" y="1">2</text>
            </g>
        </g>
        <text x="1" y="1">3</text>
    </svg>"#;
    let ops = read_all(content);

    let start = ops.iter().find_map(|op| match op {
        SvgOperation::NewPath(path, _) => match path.iter().next() {
            Some(lyon_path::Event::Begin { at }) => Some(at),
            _ => None,
        },
        _ => None,
    });
    assert_eq!(start, Some(lyon_geom::point(14.0, 2.0)));

    let texts = ops
        .iter()
        .filter_map(|op| match op {
            SvgOperation::NewText { anchor, .. } => Some(*anchor),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(texts, vec![geo::coord! { x: 12.0, y: 2.0 }, geo::coord! { x: 1.0, y: 1.0 }]);
}

#[test]
fn text_positions_are_box_centres() {
    let content = r#"<svg>
        <text x="0" y="10" font-size="10">12</text>
        <text x="0" y="10" style="font-size:10px;text-anchor:middle">12</text>
        <text x="0" y="10" font-size="10px" text-anchor="end"><tspan x="20" y="10">1</tspan></text>
    </svg>"#;
    let texts = read_all(content)
        .into_iter()
        .filter_map(|op| match op {
            SvgOperation::NewText { anchor, .. } => Some(anchor),
            _ => None,
        })
        .collect::<Vec<_>>();

    let expected = [(5.56, 6.5), (0.0, 6.5), (20.0 - 2.78, 6.5)];
    assert_eq!(texts.len(), expected.len());
    for (got, (x, y)) in texts.iter().zip(expected) {
        assert!((got.x - x).abs() < 1e-4 && (got.y - y).abs() < 1e-4, "{got:?}");
    }
}

#[test]
fn invalid_transform_is_an_error() {
    let mut reader = SvgReader::default();
    let err = svg::read(r#"<svg><g transform="spin(3)"></g></svg>"#)
        .unwrap()
        .find_map(|event| reader.process(event).err());
    assert!(matches!(
        err,
        Some(Error::Svg(SvgError::InvalidTransform { .. }))
    ));
}
