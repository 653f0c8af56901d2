//! Bounded mapper - order-preserving map with at most N transforms in flight.
//!
//! Flow:
//! 1. Spawn one task per input (full fan-out)
//! 2. Each task acquires a gate permit, runs the transform, releases the permit
//! 3. Drain tasks in completion order, writing successes to their input's slot
//! 4. Return the ordered outputs, or the first failure observed

use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use tokio::task::JoinError;

use crate::config::{Concurrency, MapConfig};
use crate::error::{ConfigError, MapError};
use crate::gate::AdmissionGate;

/// Applies transforms with bounded concurrency, sharing one admission gate
/// across every call made through it.
#[derive(Debug, Clone)]
pub struct BoundedMapper {
    gate: Arc<AdmissionGate>,
}

impl BoundedMapper {
    pub fn new(concurrency: Concurrency) -> Self {
        Self {
            gate: Arc::new(AdmissionGate::new(concurrency)),
        }
    }

    pub fn try_new(concurrency: usize) -> Result<Self, ConfigError> {
        Ok(Self::new(Concurrency::new(concurrency)?))
    }

    pub fn from_config(config: &MapConfig) -> Self {
        Self::new(config.concurrency)
    }

    pub fn gate(&self) -> &Arc<AdmissionGate> {
        &self.gate
    }

    pub fn concurrency(&self) -> usize {
        self.gate.capacity()
    }

    /// Map `inputs` through an async `transform`, returning outputs in input order.
    ///
    /// Every task runs to completion even after a failure; the error returned is
    /// the first one observed by completion order, not by input index.
    pub async fn map<T, R, E, F, Fut>(
        &self,
        inputs: impl IntoIterator<Item = T>,
        transform: F,
    ) -> Result<Vec<R>, MapError<E>>
    where
        T: Send + 'static,
        R: Send + 'static,
        E: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        let transform = Arc::new(transform);
        let units = inputs.into_iter().enumerate().map(|(index, input)| {
            run_unit(
                Arc::clone(&self.gate),
                Arc::clone(&transform),
                index,
                input,
            )
        });

        self.fan_out(units.collect()).await
    }

    /// Map `inputs` through a synchronous `transform` run on tokio's blocking pool.
    ///
    /// The permit is claimed before the blocking call is scheduled, so the bound
    /// applies to blocking threads as well.
    pub async fn map_blocking<T, R, E, F>(
        &self,
        inputs: impl IntoIterator<Item = T>,
        transform: F,
    ) -> Result<Vec<R>, MapError<E>>
    where
        T: Send + 'static,
        R: Send + 'static,
        E: Send + 'static,
        F: Fn(T) -> Result<R, E> + Send + Sync + 'static,
    {
        let transform = Arc::new(transform);
        let units = inputs.into_iter().enumerate().map(|(index, input)| {
            run_blocking_unit(
                Arc::clone(&self.gate),
                Arc::clone(&transform),
                index,
                input,
            )
        });

        self.fan_out(units.collect()).await
    }

    async fn fan_out<R, E, U>(&self, units: Vec<U>) -> Result<Vec<R>, MapError<E>>
    where
        R: Send + 'static,
        E: Send + 'static,
        U: Future<Output = Result<R, MapError<E>>> + Send + 'static,
    {
        let len = units.len();
        if len == 0 {
            return Ok(Vec::new());
        }

        tracing::debug!(inputs = len, concurrency = self.concurrency(), "Starting bounded map");

        let mut pending: FuturesUnordered<_> = units
            .into_iter()
            .enumerate()
            .map(|(index, unit)| tokio::spawn(unit).map(move |joined| (index, joined)))
            .collect();

        let mut slots: Vec<Option<R>> = std::iter::repeat_with(|| None).take(len).collect();
        let mut first_failure: Option<MapError<E>> = None;

        while let Some((index, joined)) = pending.next().await {
            let outcome = joined.unwrap_or_else(|e| {
                Err(MapError::Panicked {
                    index,
                    message: join_error_message(e),
                })
            });

            match outcome {
                Ok(value) => slots[index] = Some(value),
                Err(err) if first_failure.is_none() => {
                    tracing::warn!(index, "Transform failed - letting remaining tasks finish");
                    first_failure = Some(err);
                }
                Err(_) => {
                    tracing::debug!(index, "Additional transform failure ignored");
                }
            }
        }

        if let Some(err) = first_failure {
            return Err(err);
        }

        debug_assert!(slots.iter().all(Option::is_some));
        tracing::debug!(inputs = len, "Bounded map complete");
        Ok(slots.into_iter().flatten().collect())
    }
}

/// Map `inputs` through `transform` with at most `concurrency` transforms running at once.
///
/// Rejects `concurrency == 0` before any work starts. The gate is sized to
/// `min(concurrency, inputs)`, so a bound at or above the input length costs
/// nothing extra and behaves as unbounded parallelism.
pub async fn map_bounded<T, R, E, F, Fut>(
    inputs: impl IntoIterator<Item = T>,
    transform: F,
    concurrency: usize,
) -> Result<Vec<R>, MapError<E>>
where
    T: Send + 'static,
    R: Send + 'static,
    E: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
{
    let concurrency = Concurrency::new(concurrency)?;
    let inputs: Vec<T> = inputs.into_iter().collect();
    let Ok(lanes) = Concurrency::new(concurrency.get().min(inputs.len())) else {
        return Ok(Vec::new());
    };

    BoundedMapper::new(lanes).map(inputs, transform).await
}

/// One unit of work: acquire, transform, release.
async fn run_unit<T, R, E, F, Fut>(
    gate: Arc<AdmissionGate>,
    transform: Arc<F>,
    index: usize,
    input: T,
) -> Result<R, MapError<E>>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<R, E>>,
{
    let permit = gate.acquire().await?;
    let outcome = transform(input).await;
    permit.release();
    outcome.map_err(|source| MapError::Transform { index, source })
}

async fn run_blocking_unit<T, R, E, F>(
    gate: Arc<AdmissionGate>,
    transform: Arc<F>,
    index: usize,
    input: T,
) -> Result<R, MapError<E>>
where
    T: Send + 'static,
    R: Send + 'static,
    E: Send + 'static,
    F: Fn(T) -> Result<R, E> + Send + Sync + 'static,
{
    let permit = gate.acquire().await?;
    let joined = tokio::task::spawn_blocking(move || transform(input)).await;
    permit.release();

    match joined {
        Ok(outcome) => outcome.map_err(|source| MapError::Transform { index, source }),
        Err(e) => Err(MapError::Panicked {
            index,
            message: join_error_message(e),
        }),
    }
}

fn join_error_message(err: JoinError) -> String {
    match err.try_into_panic() {
        Ok(payload) => panic_message(&*payload),
        Err(err) => err.to_string(),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[derive(Debug, PartialEq, thiserror::Error)]
    #[error("rejected {0}")]
    struct Rejected(u32);

    #[tokio::test]
    async fn empty_input_returns_empty_without_calls() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let transform = move |x: u32| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<_, Rejected>(x) }
        };

        let out = map_bounded(Vec::new(), transform, 3).await.unwrap();

        assert!(out.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_input_with_zero_concurrency_is_still_rejected() {
        let transform = |x: u32| async move { Ok::<_, Rejected>(x) };

        let err = map_bounded(Vec::new(), transform, 0).await.unwrap_err();

        assert!(matches!(err, MapError::Config(ConfigError::InvalidConcurrency(0))));
    }

    #[tokio::test]
    async fn zero_concurrency_is_rejected_before_work() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let transform = move |x: u32| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<_, Rejected>(x) }
        };

        let err = map_bounded(vec![1, 2, 3], transform, 0).await.unwrap_err();

        assert!(matches!(err, MapError::Config(ConfigError::InvalidConcurrency(0))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn output_order_matches_input_order() {
        // Later inputs finish first.
        let transform = |x: u64| async move {
            tokio::time::sleep(Duration::from_millis(x * 5)).await;
            Ok::<_, Rejected>(x * 10)
        };

        let out = map_bounded(vec![5, 4, 3, 2, 1], transform, 5).await.unwrap();

        assert_eq!(out, vec![50, 40, 30, 20, 10]);
    }

    #[tokio::test]
    async fn transform_failure_is_reported_with_index() {
        let mapper = BoundedMapper::try_new(2).unwrap();

        let err = mapper
            .map(1u32..=6, |x| async move {
                if x == 4 { Err(Rejected(x)) } else { Ok(x) }
            })
            .await
            .unwrap_err();

        assert_eq!(err.index(), Some(3));
        assert_eq!(err.into_transform_error(), Some(Rejected(4)));
        assert_eq!(mapper.gate().available(), 2);
    }

    #[tokio::test]
    async fn panicking_transform_releases_permit() {
        let mapper = BoundedMapper::try_new(1).unwrap();

        let err = mapper
            .map(vec![1u32, 2, 3], |x| async move {
                if x == 2 {
                    panic!("bad input {x}");
                }
                Ok::<_, Rejected>(x)
            })
            .await
            .unwrap_err();

        match err {
            MapError::Panicked { index, message } => {
                assert_eq!(index, 1);
                assert_eq!(message, "bad input 2");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(mapper.gate().available(), 1);
    }

    #[tokio::test]
    async fn mapper_is_reusable() {
        let mapper = BoundedMapper::try_new(2).unwrap();

        let first = mapper
            .map(vec![1u32, 2, 3], |x| async move { Ok::<_, Rejected>(x + 1) })
            .await
            .unwrap();
        let second = mapper
            .map(vec![10u32, 20], |x| async move { Ok::<_, Rejected>(x + 1) })
            .await
            .unwrap();

        assert_eq!(first, vec![2, 3, 4]);
        assert_eq!(second, vec![11, 21]);
        assert_eq!(mapper.concurrency(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn map_blocking_respects_bound() {
        let mapper = BoundedMapper::try_new(2).unwrap();
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let (r, p) = (Arc::clone(&running), Arc::clone(&peak));
        let out = mapper
            .map_blocking(0u32..8, move |x| {
                let now = r.fetch_add(1, Ordering::SeqCst) + 1;
                p.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(10));
                r.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, Rejected>(x * 3)
            })
            .await
            .unwrap();

        assert_eq!(out, (0u32..8).map(|x| x * 3).collect::<Vec<_>>());
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(mapper.gate().available(), 2);
    }

    #[tokio::test]
    async fn map_blocking_reports_failure() {
        let mapper = BoundedMapper::try_new(3).unwrap();

        let err = mapper
            .map_blocking(vec![1u32, 2, 3], |x| if x == 3 { Err(Rejected(x)) } else { Ok(x) })
            .await
            .unwrap_err();

        assert_eq!(err.index(), Some(2));
        assert_eq!(format!("{}", err), "transform failed for input 2");
        assert_eq!(err.into_transform_error(), Some(Rejected(3)));
    }

    #[test]
    fn panic_message_handles_payload_types() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&"owned".to_string()), "owned");
        assert_eq!(panic_message(&42u8), "unknown panic payload");
    }
}
