//! Chunked, order-preserving batch execution.
//!
//! Items run in sequential chunks of at most `concurrency` spawned tasks.
//! A chunk is awaited as a whole, its results are collected in item order,
//! and the first failure stops the batch before the next chunk starts.
//! Tasks of a failing chunk are left to finish on their own.

use futures::future::join_all;
use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinError;
use tracing::{debug, info};

/// Why a batch stopped.
#[derive(Debug, Error)]
pub enum BatchError<E> {
    #[error("Item {index} failed: {error}")]
    ItemFailed { index: usize, error: E },

    #[error("Item {index} panicked: {message}")]
    TaskPanicked { index: usize, message: String },
}

impl<E> BatchError<E> {
    /// Position of the failing item in the batch.
    pub fn index(&self) -> usize {
        match self {
            BatchError::ItemFailed { index, .. } | BatchError::TaskPanicked { index, .. } => *index,
        }
    }
}

/// 1-based number of item `i` when this batch starts at `start_offset`.
pub fn global_index(start_offset: usize, i: usize) -> usize {
    start_offset + i + 1
}

/// Number of chunks a batch of `total` items runs in.
pub fn chunk_count(total: usize, concurrency: usize) -> usize {
    total.div_ceil(concurrency.max(1))
}

/// Run `worker_fn(index, item)` for every item, at most `concurrency` at a
/// time, returning the results in item order.
///
/// A `concurrency` of 0 is treated as 1.
pub async fn run_batch<T, R, E, F, Fut>(
    items: Vec<T>,
    concurrency: usize,
    worker_fn: F,
) -> Result<Vec<R>, BatchError<E>>
where
    T: Send + 'static,
    R: Send + 'static,
    E: Send + 'static,
    F: Fn(usize, T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
{
    let concurrency = concurrency.max(1);
    let total = items.len();
    let chunks = chunk_count(total, concurrency);
    let worker_fn = Arc::new(worker_fn);

    let mut results = Vec::with_capacity(total);
    let mut pending = items.into_iter().enumerate().peekable();
    let mut chunk_number = 0;

    while pending.peek().is_some() {
        chunk_number += 1;
        let chunk: Vec<(usize, T)> = pending.by_ref().take(concurrency).collect();
        let first = chunk.first().map(|(i, _)| *i).unwrap_or_default();
        debug!(
            chunk = chunk_number,
            chunks,
            items = chunk.len(),
            "Starting batch chunk"
        );

        let handles: Vec<_> = chunk
            .into_iter()
            .map(|(index, item)| {
                let worker_fn = Arc::clone(&worker_fn);
                tokio::spawn(async move { worker_fn(index, item).await })
            })
            .collect();

        for (offset, joined) in join_all(handles).await.into_iter().enumerate() {
            let index = first + offset;
            match joined {
                Ok(Ok(result)) => results.push(result),
                Ok(Err(error)) => return Err(BatchError::ItemFailed { index, error }),
                Err(join_error) => {
                    return Err(BatchError::TaskPanicked {
                        index,
                        message: join_error_message(join_error),
                    })
                }
            }
        }

        info!(
            chunk = chunk_number,
            chunks,
            completed = results.len(),
            total,
            "Batch chunk complete"
        );
    }

    Ok(results)
}

fn join_error_message(error: JoinError) -> String {
    if !error.is_panic() {
        return error.to_string();
    }
    panic_message(error.into_panic())
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_global_index() {
        assert_eq!(global_index(0, 0), 1);
        assert_eq!(global_index(100, 4), 105);
    }

    #[test]
    fn test_chunk_count() {
        assert_eq!(chunk_count(10, 4), 3);
        assert_eq!(chunk_count(8, 4), 2);
        assert_eq!(chunk_count(0, 4), 0);
        assert_eq!(chunk_count(3, 0), 3);
    }

    #[tokio::test]
    async fn test_results_keep_input_order() {
        for (n, c) in [(1usize, 1usize), (7, 3), (16, 4), (10, 16), (5, 0)] {
            let items: Vec<u64> = (0..n as u64).collect();
            let results = run_batch(items, c, move |index, item| async move {
                // Later items finish first within a chunk.
                let delay = (n as u64 - item) * 3 + (item * 7) % 5;
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Ok::<_, String>((index, item * 10))
            })
            .await
            .unwrap();

            let expected: Vec<(usize, u64)> = (0..n).map(|i| (i, i as u64 * 10)).collect();
            assert_eq!(results, expected, "n={} c={}", n, c);
        }
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let results = run_batch(Vec::<u8>::new(), 4, |_, item| async move { Ok::<_, ()>(item) })
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_fail_fast_skips_later_chunks() {
        let invocations = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&invocations);

        let result = run_batch((0..6).collect::<Vec<u32>>(), 3, move |index, _| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                if index == 1 {
                    Err(format!("item {} broke", index))
                } else {
                    Ok(index)
                }
            }
        })
        .await;

        match result {
            Err(BatchError::ItemFailed { index, error }) => {
                assert_eq!(index, 1);
                assert_eq!(error, "item 1 broke");
            }
            other => panic!("expected item failure, got {:?}", other),
        }
        // The whole first chunk ran; the second never started.
        assert_eq!(invocations.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_first_failure_by_index_is_reported() {
        let result = run_batch(vec![0u32, 1, 2, 3], 4, |index, _| async move {
            if index >= 2 {
                tokio::time::sleep(Duration::from_millis(if index == 3 { 1 } else { 20 })).await;
                Err(index)
            } else {
                Ok(index)
            }
        })
        .await;

        assert_eq!(result.unwrap_err().index(), 2);
    }

    #[tokio::test]
    async fn test_panic_is_reported() {
        let result = run_batch(vec![1u32, 2, 3], 2, |index, item| async move {
            if item == 3 {
                panic!("boom at {}", index);
            }
            Ok::<_, String>(item)
        })
        .await;

        match result {
            Err(BatchError::TaskPanicked { index, message }) => {
                assert_eq!(index, 2);
                assert_eq!(message, "boom at 2");
            }
            other => panic!("expected panic, got {:?}", other),
        }
    }
}
