use super::{Pipe, Producer};

/// Two stages run back to back; the second only sees what the first emits.
#[derive(Debug)]
pub struct Chain<A, B> {
    first: A,
    second: B,
}

impl<A, B> Chain<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<A, B> Pipe for Chain<A, B>
where
    A: Pipe,
    B: Pipe<Input = A::Output, Error = A::Error>,
{
    type Input = A::Input;
    type Output = B::Output;
    type Error = A::Error;

    fn process(&mut self, input: Self::Input) -> Result<Option<Self::Output>, Self::Error> {
        self.first
            .process(input)?
            .map_or(Ok(None), |item| self.second.process(item))
    }

    fn close(&mut self) {
        self.first.close();
        self.second.close();
    }
}

/// A producer drained through a stage. Absorbed items are skipped, and the
/// stage is closed once the source runs dry.
#[derive(Debug)]
pub struct Feed<P, S> {
    source: P,
    stage: S,
    closed: bool,
}

impl<P, S> Feed<P, S> {
    pub fn new(source: P, stage: S) -> Self {
        Self {
            source,
            stage,
            closed: false,
        }
    }
}

impl<P, S> Producer for Feed<P, S>
where
    P: Producer,
    S: Pipe<Input = P::Item>,
{
    type Item = Result<S::Output, S::Error>;

    fn produce(&mut self) -> Option<Self::Item> {
        while let Some(item) = self.source.produce() {
            if let Some(output) = self.stage.process(item).transpose() {
                return Some(output);
            }
        }
        if !std::mem::replace(&mut self.closed, true) {
            self.stage.close();
        }
        None
    }
}
