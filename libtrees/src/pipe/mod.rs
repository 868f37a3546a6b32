//! Push-style processing stages.
//!
//! A [`Pipe`] turns one input into zero or one output, a [`Producer`] yields
//! items until exhausted. `producer.feed(pipe)` is itself a producer, and
//! `a.pipe(b)` is itself a pipe, so a whole extraction reads as one chain.

mod chained;
mod tee;
pub use chained::{Chain, Feed};
pub use tee::Tee;

use crate::Error;

pub trait Pipe {
    type Input;
    type Output;

    type Error;

    /// `Ok(None)` means the input was absorbed without producing anything.
    fn process(&mut self, input: Self::Input) -> Result<Option<Self::Output>, Self::Error>;

    fn pipe<P>(self, other: P) -> Chain<Self, P>
    where
        Self: Sized,
        P: Pipe<Input = Self::Output, Error = Self::Error>,
    {
        Chain::new(self, other)
    }

    /// Called once the upstream producer is exhausted.
    fn close(&mut self) {}
}

pub trait Producer {
    type Item;

    fn produce(&mut self) -> Option<Self::Item>;

    /// Wraps the producer so that it is handed downstream as a single item.
    fn producer(self) -> OwnedProducer<Self>
    where
        Self: Sized,
    {
        OwnedProducer(Some(self))
    }

    fn feed<P>(self, other: P) -> Feed<Self, P>
    where
        Self: Sized,
        P: Pipe<Input = Self::Item>,
    {
        Feed::new(self, other)
    }
}

impl<T> Producer for T
where
    T: Iterator,
{
    type Item = <T as Iterator>::Item;

    fn produce(&mut self) -> Option<Self::Item> {
        <Self as Iterator>::next(self)
    }
}

#[derive(Debug)]
pub struct OwnedProducer<P: Producer>(Option<P>);

impl<P: Producer> Producer for OwnedProducer<P> {
    type Item = P;

    fn produce(&mut self) -> Option<Self::Item> {
        self.0.take()
    }
}

/// Drains a producer of results into `C`, stopping at the first error.
#[derive(Debug)]
pub struct TryCollector<P: Producer, C> {
    _s: std::marker::PhantomData<(P, C)>,
}

impl<P: Producer, C> TryCollector<P, C> {
    pub fn new() -> Self {
        Self {
            _s: std::marker::PhantomData,
        }
    }
}

impl<P: Producer, C> Default for TryCollector<P, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O, P, C> Pipe for TryCollector<P, C>
where
    P: Producer<Item = Result<O, Error>>,
    C: FromIterator<O>,
{
    type Input = P;

    type Output = C;

    type Error = Error;

    fn process(&mut self, mut input: Self::Input) -> Result<Option<Self::Output>, Self::Error> {
        Result::<C, Self::Error>::from_iter(std::iter::from_fn(|| input.produce())).map(Some)
    }
}

/// Runs a chain to completion and returns its last output.
pub fn run<P, T>(mut pipes: P) -> Result<T, Error>
where
    P: Producer<Item = Result<T, Error>>,
{
    let mut last = None;
    while let Some(output) = pipes.produce() {
        last = Some(output?);
    }
    last.ok_or(Error::EmptyPipeline)
}

#[cfg(test)]
struct Double;

#[cfg(test)]
impl Pipe for Double {
    type Input = u32;
    type Output = u32;
    type Error = Error;

    fn process(&mut self, input: Self::Input) -> Result<Option<Self::Output>, Self::Error> {
        Ok(Some(input * 2))
    }
}

#[cfg(test)]
struct SkipOdd;

#[cfg(test)]
impl Pipe for SkipOdd {
    type Input = u32;
    type Output = u32;
    type Error = Error;

    fn process(&mut self, input: Self::Input) -> Result<Option<Self::Output>, Self::Error> {
        Ok((input % 2 == 0).then_some(input))
    }
}

#[test]
fn chained_pipes_skip_absorbed_items() {
    let pipes = vec![1u32, 2, 3, 4].into_iter().feed(SkipOdd.pipe(Double));
    let out = std::iter::from_fn({
        let mut pipes = pipes;
        move || pipes.produce()
    })
    .collect::<Result<Vec<_>, _>>()
    .unwrap();
    assert_eq!(out, vec![4, 8]);
}

#[test]
fn collector_gathers_whole_producer() {
    let pipes = vec![1u32, 2, 3]
        .into_iter()
        .feed(Double)
        .producer()
        .feed(TryCollector::<_, Vec<u32>>::new());
    assert_eq!(run(pipes).unwrap(), vec![2, 4, 6]);
}

#[test]
fn run_on_empty_chain_is_an_error() {
    let pipes = Vec::<u32>::new().into_iter().feed(Double);
    assert!(matches!(run(pipes), Err(Error::EmptyPipeline)));
}

#[cfg(test)]
#[derive(Default)]
struct Record(std::rc::Rc<std::cell::RefCell<(Vec<u32>, usize)>>);

#[cfg(test)]
impl Pipe for Record {
    type Input = u32;
    type Output = ();
    type Error = Error;

    fn process(&mut self, input: Self::Input) -> Result<Option<Self::Output>, Self::Error> {
        self.0.borrow_mut().0.push(input);
        Ok(Some(()))
    }

    fn close(&mut self) {
        self.0.borrow_mut().1 += 1;
    }
}

#[test]
fn tee_copies_to_side_stage_and_closes_it_once() {
    let record = Record::default();
    let seen = record.0.clone();
    let mut pipes = vec![1u32, 2, 3].into_iter().feed(Double.pipe(Tee::new(record)));

    let mut out = vec![];
    while let Some(item) = pipes.produce() {
        out.push(item.unwrap());
    }
    assert!(pipes.produce().is_none());

    assert_eq!(out, vec![2, 4, 6]);
    assert_eq!(*seen.borrow(), (vec![2, 4, 6], 1));
}
