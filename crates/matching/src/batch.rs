use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::thread;

use reconap_core::InvoiceId;
use tracing::{debug, info};

/// Bounded-concurrency execution of the matching engine across many
/// invoices. Each invoice gets its own short-lived transaction (the
/// per-invoice closure is expected to open a `Session`, stage its
/// `MatchResult`/audit writes, and commit before returning) so one
/// invoice's conflict never blocks another's.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub max_concurrent: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { max_concurrent: 4 }
    }
}

/// Outcome for one invoice processed by a batch run.
pub struct InvoiceOutcome {
    pub invoice_id: InvoiceId,
    pub error: Option<String>,
}

/// Summary stats for a finished batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchStats {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Runs `process_one` for every id in `invoice_ids`, at most
/// `config.max_concurrent` at a time, and reports progress via
/// `on_progress` as each invoice finishes (not necessarily in input order).
pub fn run_batch<F>(invoice_ids: Vec<InvoiceId>, config: BatchConfig, process_one: F, on_progress: impl Fn(&InvoiceOutcome, usize, usize) + Send + Sync) -> BatchStats
where
    F: Fn(InvoiceId) -> Result<(), String> + Send + Sync,
{
    let total = invoice_ids.len();
    let queue: Arc<Mutex<VecDeque<InvoiceId>>> = Arc::new(Mutex::new(invoice_ids.into()));
    let stats = Arc::new(Mutex::new(BatchStats { total, ..Default::default() }));
    let completed = Arc::new(Mutex::new(0usize));
    let workers = config.max_concurrent.max(1).min(total.max(1));

    info!(total, workers, "starting matching batch");

    thread::scope(|scope| {
        for worker_id in 0..workers {
            let queue = Arc::clone(&queue);
            let stats = Arc::clone(&stats);
            let completed = Arc::clone(&completed);
            let process_one = &process_one;
            let on_progress = &on_progress;
            scope.spawn(move || loop {
                let next = {
                    let mut q = queue.lock().expect("batch queue lock poisoned");
                    q.pop_front()
                };
                let Some(invoice_id) = next else { break };

                let result = process_one(invoice_id);
                let outcome = InvoiceOutcome {
                    invoice_id,
                    error: result.err(),
                };

                {
                    let mut s = stats.lock().expect("batch stats lock poisoned");
                    if outcome.error.is_some() {
                        s.failed += 1;
                    } else {
                        s.succeeded += 1;
                    }
                }

                let done = {
                    let mut c = completed.lock().expect("batch progress lock poisoned");
                    *c += 1;
                    *c
                };
                debug!(worker_id, invoice_id = %outcome.invoice_id, done, total, "invoice processed");
                on_progress(&outcome, done, total);
            });
        }
    });

    let stats = stats.lock().expect("batch stats lock poisoned").clone();
    info!(succeeded = stats.succeeded, failed = stats.failed, "matching batch finished");
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn processes_every_invoice_exactly_once() {
        let ids: Vec<InvoiceId> = (0..20).map(|_| InvoiceId::new()).collect();
        let processed = Arc::new(Mutex::new(Vec::new()));
        let processed_clone = Arc::clone(&processed);

        let stats = run_batch(
            ids.clone(),
            BatchConfig { max_concurrent: 4 },
            move |id| {
                processed_clone.lock().unwrap().push(id);
                Ok(())
            },
            |_, _, _| {},
        );

        assert_eq!(stats.total, 20);
        assert_eq!(stats.succeeded, 20);
        assert_eq!(stats.failed, 0);
        let processed = processed.lock().unwrap();
        assert_eq!(processed.len(), 20);
    }

    #[test]
    fn records_failures_without_stopping_the_batch() {
        let ids: Vec<InvoiceId> = (0..5).map(|_| InvoiceId::new()).collect();
        let fail_id = ids[2];

        let stats = run_batch(
            ids,
            BatchConfig { max_concurrent: 2 },
            move |id| if id == fail_id { Err("boom".to_string()) } else { Ok(()) },
            |_, _, _| {},
        );

        assert_eq!(stats.succeeded, 4);
        assert_eq!(stats.failed, 1);
    }

    #[test]
    fn progress_callback_fires_once_per_invoice() {
        let ids: Vec<InvoiceId> = (0..10).map(|_| InvoiceId::new()).collect();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);

        run_batch(
            ids,
            BatchConfig::default(),
            |_| Ok(()),
            move |_, _, _| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
            },
        );

        assert_eq!(calls.load(Ordering::SeqCst), 10);
    }
}
