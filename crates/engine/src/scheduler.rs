//! Bounded-concurrency admission.
//!
//! Items are admitted in iteration order. Once `limit` futures are in flight
//! the scheduler waits for whichever settles first and admits the next item
//! immediately, so a slow item never holds back a whole batch. Everything
//! runs cooperatively inside the caller's task.

use std::future::Future;

use futures::stream::FuturesUnordered;
use futures::StreamExt;

/// Run `run(item)` for every item with at most `limit` in flight.
///
/// A `limit` of zero is treated as one. Outputs are returned in completion
/// order. One future's output never stops its siblings.
pub async fn run_bounded<I, F, Fut>(items: I, limit: usize, mut run: F) -> Vec<Fut::Output>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future,
{
    let limit = limit.max(1);
    let mut in_flight = FuturesUnordered::new();
    let mut outputs = Vec::new();

    for item in items {
        if in_flight.len() >= limit {
            if let Some(output) = in_flight.next().await {
                outputs.push(output);
            }
        }
        in_flight.push(run(item));
    }

    while let Some(output) = in_flight.next().await {
        outputs.push(output);
    }
    outputs
}
