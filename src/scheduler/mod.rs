//! Time-based triggering and the serialized upload worker.
//!
//! Schedules only decide WHEN an account's cycle runs; all pipeline work
//! happens on a single worker task fed through an unbounded queue. One
//! consumer means account cycles never overlap, which is what keeps the
//! per-account ledger free of write races without any file locking.

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::accounts::{ManagedAccount, Schedule};
use crate::pipeline::Pipeline;

/// Producer half of the upload work queue. Cloneable and non-blocking;
/// entries are handled strictly in enqueue order by the single worker.
#[derive(Clone)]
pub struct UploadQueue {
    tx: mpsc::UnboundedSender<Arc<ManagedAccount>>,
}

impl UploadQueue {
    /// Create the queue together with the receiver the worker consumes.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Arc<ManagedAccount>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Enqueue a cycle for the account. Duplicates are allowed; the worker
    /// simply runs another cycle, which is harmless because a cycle with
    /// nothing to do reports NO_CONTENT_AVAILABLE.
    pub fn enqueue(&self, account: Arc<ManagedAccount>) {
        tracing::info!("Adding to the queue account={}", account.name);
        if self.tx.send(account).is_err() {
            tracing::warn!("Upload worker is gone - dropping queued account");
        }
    }
}

/// Consume the queue until every producer is dropped, running one full
/// pipeline cycle per entry. Sequential by construction.
pub async fn run_worker(
    pipeline: Arc<Pipeline>,
    mut rx: mpsc::UnboundedReceiver<Arc<ManagedAccount>>,
) {
    tracing::info!("Upload worker started");
    while let Some(account) = rx.recv().await {
        let outcome = pipeline.run_account_cycle(&account).await;
        tracing::info!("Worker finished account={} with {}", account.name, outcome);
    }
    tracing::info!("Upload worker stopped - queue closed");
}

/// Polls wall-clock time and enqueues accounts whose schedule slots are due.
pub struct Scheduler {
    accounts: Vec<Arc<ManagedAccount>>,
    queue: UploadQueue,
    poll_interval: Duration,
    start_date: NaiveDate,
    /// Last date each (account, slot) pair fired, so a slot fires once per day
    fired: HashMap<(String, String), NaiveDate>,
}

impl Scheduler {
    pub fn new(accounts: Vec<Arc<ManagedAccount>>, queue: UploadQueue, poll_seconds: u64) -> Self {
        Self {
            accounts,
            queue,
            poll_interval: Duration::from_secs(poll_seconds),
            start_date: Local::now().date_naive(),
            fired: HashMap::new(),
        }
    }

    /// Poll forever. Each pass enqueues every account whose slot became due
    /// since the previous pass.
    pub async fn run(mut self) {
        tracing::info!(
            "Scheduler started for {} accounts (poll every {:?})",
            self.accounts.len(),
            self.poll_interval
        );
        loop {
            self.tick(Local::now().naive_local());
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// One scheduler pass at the given instant. Split out from `run` so the
    /// firing logic is testable without sleeping.
    fn tick(&mut self, now: NaiveDateTime) -> usize {
        let mut fired_count = 0;
        for account in &self.accounts {
            let Some(schedule) = &account.schedule else {
                continue;
            };

            for slot in &schedule.times {
                let Some(slot_time) = parse_slot(slot) else {
                    tracing::warn!(
                        "Ignoring unparseable schedule time {:?} for account={}",
                        slot,
                        account.name
                    );
                    continue;
                };

                let key = (account.name.clone(), slot.clone());
                let last = self.fired.get(&key).copied();
                if slot_due(schedule, slot_time, now, self.start_date, last) {
                    self.fired.insert(key, now.date());
                    self.queue.enqueue(Arc::clone(account));
                    fired_count += 1;
                }
            }
        }
        fired_count
    }
}

/// Parse a "HH:MM" schedule slot.
fn parse_slot(slot: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(slot, "%H:%M").ok()
}

/// Whether a schedule slot is due at `now`.
///
/// A slot fires at most once per day, only on days the `every_days` cadence
/// selects (counted from the scheduler's start date), and only once the slot
/// time of day has passed.
fn slot_due(
    schedule: &Schedule,
    slot_time: NaiveTime,
    now: NaiveDateTime,
    start_date: NaiveDate,
    last_fired: Option<NaiveDate>,
) -> bool {
    if last_fired == Some(now.date()) {
        return false;
    }
    if now.time() < slot_time {
        return false;
    }

    let every = schedule.every_days.max(1) as i64;
    let days_since_start = (now.date() - start_date).num_days();
    days_since_start >= 0 && days_since_start % every == 0
}
