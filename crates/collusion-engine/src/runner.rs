//! Dimension execution
//!
//! Each dimension runs behind its own panic boundary: a detector that fails
//! unexpectedly produces a degraded result and the others carry on. In
//! parallel mode every dimension gets a scoped thread; results always come
//! back in the order the dimensions were requested.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Instant;

use bid_types::{Dimension, DimensionResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// Reported once per finished dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub dimension: Dimension,
    /// Dimensions finished so far, this one included
    pub completed: usize,
    pub total: usize,
    pub max_score: f64,
    pub degraded: bool,
    pub elapsed_ms: u64,
}

/// Receives progress from the runner. Closures taking `&ProgressUpdate` qualify.
pub trait ProgressSink: Sync {
    fn on_progress(&self, update: &ProgressUpdate);
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressUpdate) + Sync,
{
    fn on_progress(&self, update: &ProgressUpdate) {
        self(update)
    }
}

/// Sink that drops every update
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&self, _update: &ProgressUpdate) {}
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "detector panicked".to_string()
    }
}

/// Run one dimension, turning a panic into a degraded result
pub fn run_guarded<F>(dimension: Dimension, detect: F) -> DimensionResult
where
    F: FnOnce() -> DimensionResult,
{
    match panic::catch_unwind(AssertUnwindSafe(detect)) {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(dimension = %dimension, error = %message, "dimension failed, scoring it as degraded");
            DimensionResult::degraded(dimension, message)
        }
    }
}

struct Progress<'a> {
    sink: &'a dyn ProgressSink,
    completed: AtomicUsize,
    total: usize,
}

impl Progress<'_> {
    fn run<F>(&self, dimension: Dimension, detect: &F) -> DimensionResult
    where
        F: Fn(Dimension) -> DimensionResult + Sync,
    {
        let started = Instant::now();
        let result = run_guarded(dimension, || detect(dimension));
        let update = ProgressUpdate {
            dimension,
            completed: self.completed.fetch_add(1, Ordering::SeqCst) + 1,
            total: self.total,
            max_score: result.max_score,
            degraded: result.degraded,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        debug!(
            dimension = %dimension,
            score = result.max_score,
            alerts = result.alerts.len(),
            elapsed_ms = update.elapsed_ms,
            "dimension finished"
        );
        self.sink.on_progress(&update);
        result
    }
}

/// Run `detect` for every dimension in `dimensions`, in order of the input
pub fn run_dimensions<F>(
    dimensions: &[Dimension],
    parallel: bool,
    sink: &dyn ProgressSink,
    detect: F,
) -> Vec<DimensionResult>
where
    F: Fn(Dimension) -> DimensionResult + Sync,
{
    let progress = Progress {
        sink,
        completed: AtomicUsize::new(0),
        total: dimensions.len(),
    };

    if !parallel || dimensions.len() < 2 {
        return dimensions
            .iter()
            .map(|d| progress.run(*d, &detect))
            .collect();
    }

    thread::scope(|scope| {
        let handles: Vec<_> = dimensions
            .iter()
            .map(|d| {
                let dimension = *d;
                let progress = &progress;
                let detect = &detect;
                (dimension, scope.spawn(move || progress.run(dimension, detect)))
            })
            .collect();

        handles
            .into_iter()
            .map(|(dimension, handle)| {
                handle.join().unwrap_or_else(|payload| {
                    // only reachable when the progress sink itself panicked
                    let message = panic_message(payload.as_ref());
                    error!(dimension = %dimension, error = %message, "dimension thread failed");
                    DimensionResult::degraded(dimension, message)
                })
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bid_types::{Alert, AlertKind, Evidence};
    use std::sync::Mutex;

    fn fake_detect(dimension: Dimension) -> DimensionResult {
        if dimension == Dimension::FormatMatch {
            panic!("format descriptor exploded");
        }
        let alert = Alert::batch(
            AlertKind::PriceCluster,
            0.5,
            dimension.as_str(),
            Evidence::SharedErrors { items: vec![] },
        );
        DimensionResult::from_alerts(dimension, vec![alert])
    }

    #[test]
    fn test_guarded_panic_degrades() {
        let result = run_guarded(Dimension::FormatMatch, || fake_detect(Dimension::FormatMatch));
        assert!(result.degraded);
        assert_eq!(result.max_score, 0.0);
        assert_eq!(result.failure.as_deref(), Some("format descriptor exploded"));
    }

    #[test]
    fn test_sequential_and_parallel_agree() {
        let sequential = run_dimensions(&Dimension::ALL, false, &NoProgress, fake_detect);
        let parallel = run_dimensions(&Dimension::ALL, true, &NoProgress, fake_detect);
        assert_eq!(sequential, parallel);
        let order: Vec<Dimension> = parallel.iter().map(|r| r.dimension).collect();
        assert_eq!(order, Dimension::ALL.to_vec());
        assert!(parallel[2].degraded);
        assert!(!parallel[0].degraded);
    }

    #[test]
    fn test_progress_reported_once_per_dimension() {
        let seen = Mutex::new(Vec::new());
        let sink = |update: &ProgressUpdate| {
            seen.lock().unwrap().push((update.dimension, update.completed, update.total));
        };
        run_dimensions(&Dimension::ALL, true, &sink, fake_detect);

        let mut seen = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 7);
        let mut counts: Vec<usize> = seen.iter().map(|(_, c, _)| *c).collect();
        counts.sort_unstable();
        assert_eq!(counts, (1..=7).collect::<Vec<_>>());
        assert!(seen.iter().all(|(_, _, total)| *total == 7));
        seen.sort_by_key(|(d, _, _)| *d);
        assert_eq!(seen[0].0, Dimension::ContentSimilarity);
    }

    #[test]
    fn test_empty_dimension_list() {
        assert!(run_dimensions(&[], true, &NoProgress, fake_detect).is_empty());
    }
}
