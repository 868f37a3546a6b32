use super::Pipe;

/// Hands a copy of every item to a side stage, such as a writer, and passes
/// the original on.
#[derive(Debug)]
pub struct Tee<S> {
    side: S,
}

impl<S> Tee<S> {
    pub fn new(side: S) -> Self {
        Self { side }
    }
}

impl<S> Pipe for Tee<S>
where
    S: Pipe,
    S::Input: Clone,
{
    type Input = S::Input;
    type Output = S::Input;
    type Error = S::Error;

    fn process(&mut self, input: Self::Input) -> Result<Option<Self::Output>, Self::Error> {
        self.side.process(input.clone())?;
        Ok(Some(input))
    }

    fn close(&mut self) {
        self.side.close()
    }
}
