use lyon_geom::{Angle, Point, Transform, Vector};
use lyon_path::ArcFlags;
use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while_m_n},
    character::complete::{alpha1, char, multispace0, multispace1, one_of, space0},
    combinator::{all_consuming, map, map_opt, map_res, opt},
    multi::{many0, many1, separated_list1},
    number::complete::float,
    sequence::{delimited, pair, preceded, separated_pair, terminated, tuple},
    IResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RGB {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl RGB {
    pub const RED: RGB = RGB { r: 255, g: 0, b: 0 };
}

fn rgb_body<'a, O>(
    component: fn(&'a str) -> IResult<&'a str, O>,
) -> impl FnMut(&'a str) -> IResult<&'a str, (O, O, O)> {
    move |s| {
        let (s, _) = tag("rgb")(s)?;
        delimited(
            pair(space0, char('(')),
            tuple((
                delimited(space0, component, space0),
                preceded(char(','), delimited(space0, component, space0)),
                preceded(char(','), delimited(space0, component, space0)),
            )),
            char(')'),
        )(s)
    }
}

fn channel(s: &str) -> IResult<&str, u8> {
    nom::character::complete::u8(s)
}

fn percent(s: &str) -> IResult<&str, f32> {
    terminated(float, char('%'))(s)
}

fn from_percent(p: f32) -> u8 {
    (p.clamp(0.0, 100.0) * 255.0 / 100.0).round() as u8
}

/// `rgb(255, 0, 0)`
pub fn parse_rgb(s: &str) -> IResult<&str, RGB> {
    map(rgb_body(channel), |(r, g, b)| RGB { r, g, b })(s)
}

/// `rgb(100%, 0%, 0%)`, as written by cairo based pdf converters.
pub fn parse_percent_rgb(s: &str) -> IResult<&str, RGB> {
    map(rgb_body(percent), |(r, g, b)| RGB {
        r: from_percent(r),
        g: from_percent(g),
        b: from_percent(b),
    })(s)
}

fn from_hex(input: &str) -> Result<u8, std::num::ParseIntError> {
    u8::from_str_radix(input, 16)
}

fn is_hex_digit(c: char) -> bool {
    c.is_ascii_hexdigit()
}

fn hex_primary(input: &str) -> IResult<&str, u8> {
    map_res(take_while_m_n(2, 2, is_hex_digit), from_hex)(input)
}

fn short_hex_primary(input: &str) -> IResult<&str, u8> {
    map_res(take_while_m_n(1, 1, is_hex_digit), |d: &str| {
        from_hex(d).map(|v| v * 17)
    })(input)
}

pub fn parse_hex_rgb(input: &str) -> IResult<&str, RGB> {
    let (input, _) = tag("#")(input)?;
    let (input, (r, g, b)) = tuple((hex_primary, hex_primary, hex_primary))(input)?;
    Ok((input, RGB { r, g, b }))
}

pub fn parse_short_hex_rgb(input: &str) -> IResult<&str, RGB> {
    let (input, _) = tag("#")(input)?;
    let (input, (r, g, b)) =
        tuple((short_hex_primary, short_hex_primary, short_hex_primary))(input)?;
    Ok((input, RGB { r, g, b }))
}

pub fn parse_named(input: &str) -> IResult<&str, RGB> {
    alt((
        map(tag_no_case("red"), |_| RGB::RED),
        map(tag_no_case("black"), |_| RGB { r: 0, g: 0, b: 0 }),
        map(tag_no_case("white"), |_| RGB { r: 255, g: 255, b: 255 }),
    ))(input)
}

/// Parses a full paint value. `none` and anything unrecognised give `None`.
pub fn parse_paint(value: &str) -> Option<RGB> {
    let (_, rgb) = all_consuming(alt((
        parse_rgb,
        parse_percent_rgb,
        parse_hex_rgb,
        parse_short_hex_rgb,
        parse_named,
    )))(value.trim())
    .ok()?;
    Some(rgb)
}

/// Raw value of the `key` declaration inside a `style` attribute.
pub fn style_value<'s>(style: &'s str, key: &str) -> Option<&'s str> {
    style
        .split(';')
        .filter_map(|decl| decl.split_once(':'))
        .find(|(name, _)| name.trim() == key)
        .map(|(_, value)| value)
}

/// Looks up `key` (`fill` or `stroke`) inside a `style` attribute.
pub fn style_paint(style: &str, key: &str) -> Option<RGB> {
    style_value(style, key).and_then(parse_paint)
}

#[derive(Debug)]
pub enum Operation {
    RelVerticalLineTo(f32),
    VerticalLineTo(f32),
    HorizontalLineTo(f32),
    RelHorizontalLineTo(f32),
    RelMoveTo(Vector<f32>),
    MoveTo(Point<f32>),
    RelLineTo(Vector<f32>),
    LineTo(Point<f32>),
    RelQuadBezierTo {
        ctrl: Vector<f32>,
        to: Vector<f32>,
    },
    QuadBezierTo {
        ctrl: Point<f32>,
        to: Point<f32>,
    },
    SmoothRelQuadBezierTo(Vector<f32>),
    SmoothQuadBezierTo(Point<f32>),
    RelArcTo {
        radii: Vector<f32>,
        x_rotation: Angle<f32>,
        flags: ArcFlags,
        to: Vector<f32>,
    },
    ArcTo {
        radii: Vector<f32>,
        x_rotation: Angle<f32>,
        flags: ArcFlags,
        to: Point<f32>,
    },
    CubicBezierTo {
        ctrl1: Point<f32>,
        ctrl2: Point<f32>,
        to: Point<f32>,
    },
    RelCubicBezierTo {
        ctrl1: Vector<f32>,
        ctrl2: Vector<f32>,
        to: Vector<f32>,
    },
    SmoothCubicBezierTo {
        ctrl2: Point<f32>,
        to: Point<f32>,
    },
    SmoothRelCubicBezierTo {
        ctrl2: Vector<f32>,
        to: Vector<f32>,
    },
    Close,
}

pub fn path_to_operations(svg: &str) -> IResult<&str, Vec<Vec<Operation>>> {
    preceded(multispace0, many1(parse_op))(svg)
}

/// Whitespace (line breaks included) or a comma with optional whitespace
/// around it.
fn sep(s: &str) -> IResult<&str, &str> {
    alt((delimited(multispace0, tag(","), multispace0), multispace1))(s)
}

pub(crate) fn parse_op(s: &str) -> nom::IResult<&str, Vec<Operation>> {
    let (s, op) = one_of("vVhHmMlLzZqQtTaAcCsS")(s)?;
    let (s, _) = multispace0(s)?;

    let (s, operation) = match op {
        'v' => separated_list1(sep, map(readf32, Operation::RelVerticalLineTo))(s)?,
        'V' => separated_list1(sep, map(readf32, Operation::VerticalLineTo))(s)?,
        'h' => separated_list1(sep, map(readf32, Operation::RelHorizontalLineTo))(s)?,
        'H' => separated_list1(sep, map(readf32, Operation::HorizontalLineTo))(s)?,
        // extra coordinate pairs after a move are implicit line segments
        'm' => {
            let (s, moves) = separated_list1(sep, read_vector)(s)?;
            let ops = moves
                .into_iter()
                .enumerate()
                .map(|(i, v)| match i {
                    0 => Operation::RelMoveTo(v),
                    _ => Operation::RelLineTo(v),
                })
                .collect();
            (s, ops)
        }
        'M' => {
            let (s, moves) = separated_list1(sep, read_point)(s)?;
            let ops = moves
                .into_iter()
                .enumerate()
                .map(|(i, p)| match i {
                    0 => Operation::MoveTo(p),
                    _ => Operation::LineTo(p),
                })
                .collect();
            (s, ops)
        }
        'l' => separated_list1(sep, map(read_vector, Operation::RelLineTo))(s)?,
        'L' => separated_list1(sep, map(read_point, Operation::LineTo))(s)?,
        'Z' | 'z' => (s, vec![Operation::Close]),
        'q' => separated_list1(
            sep,
            map(separated_pair(read_vector, sep, read_vector), |(ctrl, to)| {
                Operation::RelQuadBezierTo { ctrl, to }
            }),
        )(s)?,
        'Q' => separated_list1(
            sep,
            map(separated_pair(read_point, sep, read_point), |(ctrl, to)| {
                Operation::QuadBezierTo { ctrl, to }
            }),
        )(s)?,
        't' => separated_list1(sep, map(read_vector, Operation::SmoothRelQuadBezierTo))(s)?,
        'T' => separated_list1(sep, map(read_point, Operation::SmoothQuadBezierTo))(s)?,
        'a' => separated_list1(
            sep,
            map(
                tuple((
                    read_vector,
                    sep,
                    read_angle,
                    sep,
                    read_arcflags,
                    sep,
                    read_vector,
                )),
                |(radii, _, x_rotation, _, flags, _, to)| Operation::RelArcTo {
                    radii,
                    x_rotation,
                    flags,
                    to,
                },
            ),
        )(s)?,
        'A' => separated_list1(
            sep,
            map(
                tuple((
                    read_vector,
                    sep,
                    read_angle,
                    sep,
                    read_arcflags,
                    sep,
                    read_point,
                )),
                |(radii, _, x_rotation, _, flags, _, to)| Operation::ArcTo {
                    radii,
                    x_rotation,
                    flags,
                    to,
                },
            ),
        )(s)?,
        'C' => separated_list1(
            sep,
            map(
                tuple((read_point, sep, read_point, sep, read_point)),
                |(ctrl1, _, ctrl2, _, to)| Operation::CubicBezierTo { ctrl1, ctrl2, to },
            ),
        )(s)?,
        'c' => separated_list1(
            sep,
            map(
                tuple((read_vector, sep, read_vector, sep, read_vector)),
                |(ctrl1, _, ctrl2, _, to)| Operation::RelCubicBezierTo { ctrl1, ctrl2, to },
            ),
        )(s)?,
        'S' => separated_list1(
            sep,
            map(separated_pair(read_point, sep, read_point), |(ctrl2, to)| {
                Operation::SmoothCubicBezierTo { ctrl2, to }
            }),
        )(s)?,
        // 's', the only command left in the `one_of` set
        _ => separated_list1(
            sep,
            map(separated_pair(read_vector, sep, read_vector), |(ctrl2, to)| {
                Operation::SmoothRelCubicBezierTo { ctrl2, to }
            }),
        )(s)?,
    };
    let (s, _) = multispace0(s)?;
    Ok((s, operation))
}

fn readf32(s: &str) -> IResult<&str, f32> {
    alt((float, map(nom::character::complete::u32, |n| n as f32)))(s)
}

fn read_vector(s: &str) -> IResult<&str, Vector<f32>> {
    let (s, (x, y)) = separated_pair(readf32, alt((sep, multispace0)), readf32)(s)?;
    Ok((s, Vector::new(x, y)))
}

fn read_angle(s: &str) -> IResult<&str, Angle<f32>> {
    let (s, degrees) = readf32(s)?;
    Ok((s, Angle::degrees(degrees)))
}

fn read_arcflags(s: &str) -> IResult<&str, ArcFlags> {
    let (s, large) = one_of("01")(s)?;
    let (s, _) = alt((sep, multispace0))(s)?;
    let (s, sweep) = one_of("01")(s)?;
    Ok((
        s,
        ArcFlags {
            large_arc: large == '1',
            sweep: sweep == '1',
        },
    ))
}

fn read_point(s: &str) -> IResult<&str, Point<f32>> {
    let (s, (x, y)) = separated_pair(readf32, alt((sep, multispace0)), readf32)(s)?;
    Ok((s, Point::new(x, y)))
}

fn transform_fn(s: &str) -> IResult<&str, Transform<f32>> {
    map_opt(
        pair(
            alpha1,
            delimited(
                tuple((multispace0, char('('), multispace0)),
                separated_list1(sep, readf32),
                pair(multispace0, char(')')),
            ),
        ),
        |(name, args): (&str, Vec<f32>)| match (name, args.as_slice()) {
            ("matrix", &[a, b, c, d, e, f]) => Some(Transform::new(a, b, c, d, e, f)),
            ("translate", &[x]) => Some(Transform::translation(x, 0.0)),
            ("translate", &[x, y]) => Some(Transform::translation(x, y)),
            ("scale", &[k]) => Some(Transform::scale(k, k)),
            ("scale", &[x, y]) => Some(Transform::scale(x, y)),
            ("rotate", &[a]) => Some(Transform::rotation(Angle::degrees(a))),
            ("rotate", &[a, cx, cy]) => Some(
                Transform::translation(-cx, -cy)
                    .then_rotate(Angle::degrees(a))
                    .then_translate(Vector::new(cx, cy)),
            ),
            ("skewX", &[a]) => Some(Transform::new(1.0, 0.0, Angle::degrees(a).radians.tan(), 1.0, 0.0, 0.0)),
            ("skewY", &[a]) => Some(Transform::new(1.0, Angle::degrees(a).radians.tan(), 0.0, 1.0, 0.0, 0.0)),
            _ => None,
        },
    )(s)
}

/// Parses a `transform` attribute into a single matrix. The rightmost
/// function applies first, as in `translate(10) scale(2)`.
pub fn parse_transform(value: &str) -> Option<Transform<f32>> {
    let (_, transforms) =
        all_consuming(preceded(multispace0, many0(terminated(transform_fn, opt(sep)))))(value).ok()?;
    Some(
        transforms
            .into_iter()
            .rev()
            .fold(Transform::identity(), |acc, t| acc.then(&t)),
    )
}

/// Leading number of a length such as `12px` or `9.5`. Units are ignored.
pub fn parse_length(value: &str) -> Option<f32> {
    let (_, n) = float::<_, nom::error::Error<&str>>(value.trim()).ok()?;
    (n.is_finite() && n > 0.0).then_some(n)
}

#[test]
fn paints() {
    assert_eq!(parse_paint("rgb(255,0,0)"), Some(RGB::RED));
    assert_eq!(parse_paint("rgb(255, 0, 0)"), Some(RGB::RED));
    assert_eq!(parse_paint("rgb(100%, 0%, 0%)"), Some(RGB::RED));
    assert_eq!(
        parse_paint("rgb(60.351562%, 10.594177%, 11.767578%)"),
        Some(RGB { r: 154, g: 27, b: 30 })
    );
    assert_eq!(parse_paint("#FF0000"), Some(RGB::RED));
    assert_eq!(parse_paint("#f00"), Some(RGB::RED));
    assert_eq!(parse_paint("red"), Some(RGB::RED));
    assert_eq!(parse_paint("none"), None);
    assert_eq!(parse_paint("#ff000"), None);
}

#[test]
fn style_lookup() {
    let style = "fill:none;stroke:#ff0000;stroke-width:0.5";
    assert_eq!(style_paint(style, "stroke"), Some(RGB::RED));
    assert_eq!(style_paint(style, "fill"), None);
    assert_eq!(style_paint(style, "color"), None);
}

#[test]
fn cairo_path_data() {
    let (rest, ops) =
        path_to_operations("M 745.078125 2511.960938 L 755.039062 2505.601562 Z M 1 2 3 4").unwrap();
    assert!(rest.is_empty());
    let ops = ops.into_iter().flatten().collect::<Vec<_>>();
    assert_eq!(ops.len(), 5);
    assert!(matches!(ops[0], Operation::MoveTo(p) if p.x == 745.078125));
    assert!(matches!(ops[1], Operation::LineTo(_)));
    assert!(matches!(ops[2], Operation::Close));
    assert!(matches!(ops[4], Operation::LineTo(p) if p == Point::new(3.0, 4.0)));
}

#[test]
fn compact_path_data() {
    let (rest, ops) = path_to_operations("m10,10 h5 v-5 c1,1 2,2 3,3 s1,1 2,2z").unwrap();
    assert!(rest.is_empty());
    assert_eq!(ops.into_iter().flatten().count(), 6);
}

#[test]
fn wrapped_path_data() {
    let (rest, ops) = path_to_operations("\n  M 0 0\n L 8 0\r\n L 8,\n8\n\tL 0 8 Z\n").unwrap();
    assert!(rest.is_empty());
    let ops = ops.into_iter().flatten().collect::<Vec<_>>();
    assert_eq!(ops.len(), 5);
    assert!(matches!(ops[2], Operation::LineTo(p) if p == Point::new(8.0, 8.0)));
    assert!(matches!(ops[4], Operation::Close));
}

#[test]
fn transforms() {
    let t = parse_transform("translate(10, 5) scale(2)").unwrap();
    assert_eq!(t.transform_point(Point::new(1.0, 1.0)), Point::new(12.0, 7.0));

    let t = parse_transform(" matrix(1 0 0 1 3 4)\n").unwrap();
    assert_eq!(t.transform_point(Point::new(0.0, 0.0)), Point::new(3.0, 4.0));

    let p = parse_transform("rotate(90 1 1)").unwrap().transform_point(Point::new(2.0, 1.0));
    assert!((p.x - 1.0).abs() < 1e-5 && (p.y - 2.0).abs() < 1e-5);

    assert_eq!(parse_transform(""), Some(Transform::identity()));
    assert_eq!(parse_transform("scale(1, 2, 3)"), None);
    assert_eq!(parse_transform("translate(1"), None);
}

#[test]
fn lengths() {
    assert_eq!(parse_length("12px"), Some(12.0));
    assert_eq!(parse_length(" 9.5 "), Some(9.5));
    assert_eq!(parse_length("large"), None);
    assert_eq!(parse_length("0"), None);
}
