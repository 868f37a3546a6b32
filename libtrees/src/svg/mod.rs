mod paint;
pub mod parse;
mod reader;
mod sampler;

use std::collections::HashMap;

pub use paint::{paint, PaintChannel, PaintFilter};
pub use reader::{build_path, SvgOperation, SvgReader};
pub use sampler::{CenterSampler, LineStringSampler, PathSampler};
use svg::node::Value;

#[derive(Debug, thiserror::Error)]
pub enum SvgError {
    #[error("svg path data not found, available attributes: `{attrs:#?}`")]
    PathNotFound { attrs: HashMap<String, Value> },
    #[error("svg path data could not be parsed: `{d}`")]
    InvalidPath { d: String },
    #[error("svg transform could not be parsed: `{value}`")]
    InvalidTransform { value: String },
    #[error("unrecognised paint `{0}`")]
    UnknownPaint(String),
    #[error("malformed svg document: {0}")]
    Parse(String),
}
