//! Double-buffered producer pools.
//!
//! The only cross-thread pattern the coders need: a background worker fills
//! fixed-size pools of items (match tuples, prefetched symbols) while the
//! consumer drains the previous pool, with a rendezvous at every pool
//! boundary. There are no locks and no shared mutable state; the worker owns
//! its source outright and hands it back at the end, so model state moved
//! into a prefetch source survives for the next block.
//!
//! Pool contents never depend on scheduling, so output is byte-identical
//! whether a stage runs threaded or inline.

use std::thread::{Scope, ScopedJoinHandle};

use crossbeam_channel::{bounded, Receiver};

use crate::error::FormatError;

/// A producer that fills pools of items until its input is exhausted.
pub trait PoolSource: Send {
    type Item: Send;

    /// Fills `pool` with up to `limit` items. Returns `Ok(true)` while more
    /// items remain to be produced after this pool.
    fn refill(
        &mut self,
        pool: &mut Vec<Self::Item>,
        limit: usize,
    ) -> Result<bool, FormatError>;
}

enum Feed<'scope, S: PoolSource + 'scope> {
    Inline { source: S, exhausted: bool },
    Threaded {
        rx: Receiver<Result<Vec<S::Item>, FormatError>>,
        handle: ScopedJoinHandle<'scope, S>,
    },
}

/// Consumer handle over a [`PoolSource`], threaded or inline.
pub struct Prefetcher<'scope, S: PoolSource + 'scope> {
    feed: Feed<'scope, S>,
    cur: std::vec::IntoIter<S::Item>,
    limit: usize,
}

impl<'scope, S: PoolSource + 'scope> Prefetcher<'scope, S> {
    /// Starts the producer. With `threaded` unset the source is polled on
    /// the caller's thread at each pool boundary instead.
    pub fn start<'env>(
        scope: &'scope Scope<'scope, 'env>,
        source: S,
        limit: usize,
        threaded: bool,
    ) -> Self {
        let feed = if threaded {
            let (tx, rx) = bounded::<Result<Vec<S::Item>, FormatError>>(0);
            let handle = scope.spawn(move || {
                let mut source = source;
                loop {
                    let mut pool = Vec::with_capacity(limit);
                    match source.refill(&mut pool, limit) {
                        Ok(more) => {
                            if tx.send(Ok(pool)).is_err() || !more {
                                break;
                            }
                        }
                        Err(err) => {
                            let _ = tx.send(Err(err));
                            break;
                        }
                    }
                }
                source
            });
            Feed::Threaded { rx, handle }
        } else {
            Feed::Inline {
                source,
                exhausted: false,
            }
        };
        Prefetcher {
            feed,
            cur: Vec::new().into_iter(),
            limit,
        }
    }

    /// Next item; a dry source surfaces as a truncated stream.
    pub fn next(&mut self) -> Result<S::Item, FormatError> {
        loop {
            if let Some(item) = self.cur.next() {
                return Ok(item);
            }
            match &mut self.feed {
                Feed::Inline { source, exhausted } => {
                    if *exhausted {
                        return Err(FormatError::TruncatedStream);
                    }
                    let mut pool = Vec::with_capacity(self.limit);
                    let more = source.refill(&mut pool, self.limit)?;
                    *exhausted = !more;
                    self.cur = pool.into_iter();
                }
                Feed::Threaded { rx, .. } => match rx.recv() {
                    Ok(Ok(pool)) => self.cur = pool.into_iter(),
                    Ok(Err(err)) => return Err(err),
                    Err(_) => return Err(FormatError::TruncatedStream),
                },
            }
        }
    }

    /// Stops the producer and returns the source (with whatever model or
    /// cursor state it accumulated).
    pub fn finish(self) -> S {
        match self.feed {
            Feed::Inline { source, .. } => source,
            Feed::Threaded { rx, handle } => {
                // closing the channel unblocks a producer waiting to hand
                // over a pool the consumer no longer wants
                drop(rx);
                handle.join().expect("pool worker panicked")
            }
        }
    }
}
