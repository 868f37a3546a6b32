use std::collections::HashMap;

use svg::node::Value;

use crate::{
    pipe::Pipe,
    svg::{
        parse::{parse_paint, style_paint, RGB},
        SvgOperation,
    },
    Error,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaintChannel {
    #[default]
    Stroke,
    Fill,
    Either,
}

/// Paint of `key` (`stroke` or `fill`), from the attribute itself or from
/// the `style` attribute.
pub fn paint(attrs: &HashMap<String, Value>, key: &str) -> Option<RGB> {
    attrs
        .get(key)
        .and_then(|value| parse_paint(value))
        .or_else(|| attrs.get("style").and_then(|style| style_paint(style, key)))
}

/// Drops every path not painted with one of `colors` on `channel`.
pub struct PaintFilter<S> {
    colors: Vec<RGB>,
    channel: PaintChannel,
    _s: std::marker::PhantomData<S>,
}

impl<S> PaintFilter<S> {
    pub fn new(colors: Vec<RGB>, channel: PaintChannel) -> Self {
        Self {
            colors,
            channel,
            _s: std::marker::PhantomData,
        }
    }

    fn matches(&self, attrs: &HashMap<String, Value>) -> bool {
        let hit = |key| paint(attrs, key).is_some_and(|rgb| self.colors.contains(&rgb));
        match self.channel {
            PaintChannel::Stroke => hit("stroke"),
            PaintChannel::Fill => hit("fill"),
            PaintChannel::Either => hit("stroke") || hit("fill"),
        }
    }
}

impl<S> Pipe for PaintFilter<S> {
    type Input = SvgOperation<S>;
    type Output = SvgOperation<S>;

    type Error = Error;

    fn process(&mut self, input: Self::Input) -> Result<Option<Self::Output>, Self::Error> {
        match input {
            SvgOperation::NewPath(_, ref attrs) if !self.matches(attrs) => {
                trace!(id = ?attrs.get("id"), "skipping unpainted path");
                Ok(None)
            }
            op => Ok(Some(op)),
        }
    }
}

#[cfg(test)]
fn attrs(pairs: &[(&str, &str)]) -> HashMap<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), Value::from(*v)))
        .collect()
}

#[test]
fn filters_on_channel() {
    let red = attrs(&[("stroke", "rgb(100%, 0%, 0%)"), ("fill", "none")]);
    let styled = attrs(&[("style", "fill:#ff0000")]);

    let stroke = PaintFilter::<()>::new(vec![RGB::RED], PaintChannel::Stroke);
    assert!(stroke.matches(&red));
    assert!(!stroke.matches(&styled));

    let either = PaintFilter::<()>::new(vec![RGB::RED], PaintChannel::Either);
    assert!(either.matches(&styled));
}

#[test]
fn passes_non_path_operations() {
    let mut filter = PaintFilter::<()>::new(vec![RGB::RED], PaintChannel::Stroke);
    assert!(matches!(
        filter.process(SvgOperation::EndNewGroup),
        Ok(Some(SvgOperation::EndNewGroup))
    ));
    assert!(matches!(
        filter.process(SvgOperation::NewPath((), attrs(&[("stroke", "#000000")]))),
        Ok(None)
    ));
}
