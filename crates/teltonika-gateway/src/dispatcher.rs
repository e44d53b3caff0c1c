//! Fire-and-forget delivery of normalized record batches to the Fleet API.
//!
//! Per spec.md §4.E, enqueuing a batch must never block the socket read
//! path, and per §5 the gateway must not let sink backpressure grow an
//! unbounded queue or task count. This implements §9's explicit
//! recommendation: a bounded queue with drop-oldest and a counter metric,
//! drained by a small fixed pool of worker tasks that each deliver batches
//! concurrently with the others. Grounded on the teacher's
//! `Arc<Mutex<..>>`-wrapped shared-state pattern
//! (`lockframe-server::storage::memory::MemoryStorage`), generalized from a
//! storage handle to a bounded work queue with a waiter notification.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use teltonika_core::NormalizedRecord;
use teltonika_proto::Imei;
use tokio::sync::Notify;

/// Maximum number of pending batches before the oldest is dropped to make
/// room for a new one.
const QUEUE_CAPACITY: usize = 1024;
/// Number of concurrent delivery workers.
const WORKER_COUNT: usize = 8;

#[derive(Debug, Serialize)]
struct SinkRequestBody<'a> {
    imei: &'a str,
    records: &'a [NormalizedRecord],
}

#[derive(Debug, Clone)]
struct Batch {
    imei: Imei,
    records: Vec<NormalizedRecord>,
}

struct Shared {
    queue: Mutex<VecDeque<Batch>>,
    notify: Notify,
    dropped_batches: AtomicU64,
    client: reqwest::Client,
    ingest_url: String,
    bearer: String,
}

/// Handle for enqueuing batches; cheap to clone, shared by every
/// connection task.
#[derive(Clone)]
pub struct SinkDispatcher {
    shared: Arc<Shared>,
}

impl SinkDispatcher {
    /// Builds the ingest URL, starts the worker pool, and returns a handle.
    pub fn spawn(fleet_api_url: &str, shared_secret: &str) -> Self {
        let ingest_url = format!("{}/api/gps/ingest", fleet_api_url.trim_end_matches('/'));
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            dropped_batches: AtomicU64::new(0),
            client: reqwest::Client::new(),
            ingest_url,
            bearer: shared_secret.to_string(),
        });

        for _ in 0..WORKER_COUNT {
            let shared = Arc::clone(&shared);
            tokio::spawn(async move { worker_loop(shared).await });
        }

        Self { shared }
    }

    /// Enqueues a batch for delivery. Never awaits, never blocks on I/O;
    /// the held lock guards only an in-memory deque push.
    pub fn enqueue(&self, imei: Imei, records: Vec<NormalizedRecord>) {
        if records.is_empty() {
            return;
        }
        let mut queue = self.shared.queue.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if queue.len() >= QUEUE_CAPACITY {
            queue.pop_front();
            let dropped = self.shared.dropped_batches.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::warn!(dropped_total = dropped, "sink queue saturated, dropped oldest batch");
        }
        queue.push_back(Batch { imei, records });
        drop(queue);
        self.shared.notify.notify_one();
    }

    /// Total number of batches dropped so far due to queue saturation.
    pub fn dropped_batches(&self) -> u64 {
        self.shared.dropped_batches.load(Ordering::Relaxed)
    }
}

async fn worker_loop(shared: Arc<Shared>) {
    loop {
        let batch = next_batch(&shared).await;
        deliver(&shared, &batch).await;
    }
}

async fn next_batch(shared: &Shared) -> Batch {
    loop {
        {
            let mut queue = shared.queue.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            if let Some(batch) = queue.pop_front() {
                return batch;
            }
        }
        shared.notify.notified().await;
    }
}

async fn deliver(shared: &Shared, batch: &Batch) {
    let body = SinkRequestBody { imei: batch.imei.as_str(), records: &batch.records };

    let result = shared
        .client
        .post(&shared.ingest_url)
        .header("Authorization", format!("Bearer {}", shared.bearer))
        .json(&body)
        .send()
        .await;

    match result {
        Ok(response) if response.status().is_success() => {
            tracing::debug!(imei = batch.imei.as_str(), records = batch.records.len(), "batch delivered");
        },
        Ok(response) => {
            tracing::warn!(
                imei = batch.imei.as_str(),
                status = %response.status(),
                "sink returned non-2xx, dropping batch"
            );
        },
        Err(error) => {
            tracing::warn!(imei = batch.imei.as_str(), error = %error, "sink delivery failed, dropping batch");
        },
    }
}
