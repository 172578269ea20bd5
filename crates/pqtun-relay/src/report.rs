//! The optional byte-count reporter invoked from the relay's data path.
//! Implementations must be cheap; the data path never waits on them.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    A,
    B,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Read,
    Write,
}

pub trait Reporter: Send + Sync {
    fn report(&self, side: Side, op: Op, n: usize);
}

/// A reporter that forwards counts over a bounded channel, dropping reports
/// under backpressure rather than blocking the data path.
pub struct ChannelReporter {
    tx: tokio::sync::mpsc::Sender<(Side, Op, usize)>,
}

impl ChannelReporter {
    pub fn new(capacity: usize) -> (Self, tokio::sync::mpsc::Receiver<(Side, Op, usize)>) {
        let (tx, rx) = tokio::sync::mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl Reporter for ChannelReporter {
    fn report(&self, side: Side, op: Op, n: usize) {
        let _ = self.tx.try_send((side, op, n));
    }
}
