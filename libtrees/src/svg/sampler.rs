use geo::{Coord, LineString};
use lyon_algorithms::walk::{RegularPattern, WalkerEvent};
use lyon_path::Path;

use crate::{svg::SvgOperation, Error};

pub trait PathSampler {
    type Sample;

    fn sample(&self, path: Path) -> Self::Sample;

    fn rate(&self) -> Option<f32> {
        None
    }
}

impl<S> crate::pipe::Pipe for S
where
    S: PathSampler,
{
    type Input = SvgOperation<lyon_path::Path>;
    type Output = SvgOperation<S::Sample>;
    type Error = Error;

    #[tracing::instrument(skip(self, input))]
    fn process(&mut self, input: Self::Input) -> Result<Option<Self::Output>, Self::Error> {
        Ok(Some(match input {
            SvgOperation::NewPath(path, attrs) => {
                let len = lyon_algorithms::length::approximate_length(&path, 0.1);
                let samples = self.sample(path);
                trace!(path_len = len, samples = self.rate().map(|r| len / r));
                SvgOperation::NewPath(samples, attrs)
            }
            SvgOperation::NewText { anchor, text } => SvgOperation::NewText { anchor, text },
            SvgOperation::StartNewGroup(g) => SvgOperation::StartNewGroup(g),
            SvgOperation::EndNewGroup => SvgOperation::EndNewGroup,
            SvgOperation::NotSupported => SvgOperation::NotSupported,
        }))
    }
}

/// Reduces a path to the center of its bounding box, which is where a dot
/// marker sits. Empty paths have no center.
pub struct CenterSampler;

impl PathSampler for CenterSampler {
    type Sample = Option<Coord<f64>>;

    fn sample(&self, path: Path) -> Self::Sample {
        path.iter().next()?;
        let center = lyon_algorithms::aabb::bounding_box(path.iter()).center();
        Some(geo::coord! { x: center.x as f64, y: center.y as f64 })
    }
}

/// Resamples a path every `rate` units along its length.
pub struct LineStringSampler {
    pub rate: f32,
}

impl PathSampler for LineStringSampler {
    type Sample = LineString;

    fn sample(&self, path: Path) -> Self::Sample {
        let mut samples = vec![];

        let mut pattern = RegularPattern {
            callback: &mut |event: WalkerEvent| {
                samples.push(geo::coord! {x: event.position.x as f64, y: event.position.y as f64});
                true
            },
            interval: self.rate,
        };
        lyon_algorithms::walk::walk_along_path(&path, 0.0, 0.1, &mut pattern);

        // the walk stops short of the end unless the length is a multiple of `rate`
        let end = path.iter().last().map(|event| match event {
            lyon_path::Event::End { last, first, close } => {
                if close {
                    first
                } else {
                    last
                }
            }
            event => event.to(),
        });
        if let Some(end) = end {
            let end = geo::coord! { x: end.x as f64, y: end.y as f64 };
            if samples.last() != Some(&end) {
                samples.push(end);
            }
        }
        LineString(samples)
    }

    fn rate(&self) -> Option<f32> {
        Some(self.rate)
    }
}

#[cfg(test)]
fn square(x: f32, y: f32, side: f32) -> Path {
    let mut builder = Path::builder();
    builder.begin(lyon_geom::point(x, y));
    builder.line_to(lyon_geom::point(x + side, y));
    builder.line_to(lyon_geom::point(x + side, y + side));
    builder.line_to(lyon_geom::point(x, y + side));
    builder.close();
    builder.build()
}

#[test]
fn center_of_square() {
    assert_eq!(
        CenterSampler.sample(square(10.0, 20.0, 4.0)),
        Some(geo::coord! { x: 12.0, y: 22.0 })
    );
    assert_eq!(CenterSampler.sample(Path::new()), None);
}

#[test]
fn line_samples_end_on_the_last_point() {
    let mut builder = Path::builder();
    builder.begin(lyon_geom::point(0.0, 0.0));
    builder.line_to(lyon_geom::point(10.0, 0.0));
    builder.end(false);

    let line = LineStringSampler { rate: 4.0 }.sample(builder.build());
    let xs = line.coords().map(|c| c.x.round()).collect::<Vec<_>>();
    assert!(xs[0] <= 4.0);
    assert_eq!(xs.last(), Some(&10.0));
    assert!(xs.len() >= 3);
}
