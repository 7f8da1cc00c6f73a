//! Cross-process log relay.
//!
//! [`LogRelay`] is the trust boundary: it validates submissions from producer
//! processes, turns accepted ones into [`LogRecord`]s, retains them in the
//! [`LogStore`] and mirrors a one-line rendering onto the [`LogBus`]. The
//! socket server and client live in the sub-modules and only ever call
//! [`LogRelay::register`] and [`LogRelay::submit`].

pub mod protocol;

#[cfg(unix)]
pub mod client;
#[cfg(unix)]
pub mod server;

use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::bus::LogBus;
use crate::clock::{is_plausible, now_millis};
use crate::error::RelayError;
use crate::record::{LogRecord, Severity};
use crate::store::LogStore;

pub use protocol::RelayFrame;

/// One inbound record exactly as a producer sent it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub producer_id: String,
    pub tag: String,
    pub message: String,
    pub severity: i32,
    pub timestamp_ms: i64,
}

impl Submission {
    pub fn new(
        producer_id: impl Into<String>,
        tag: impl Into<String>,
        message: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            producer_id: producer_id.into(),
            tag: tag.into(),
            message: message.into(),
            severity: severity.code(),
            timestamp_ms: i64::try_from(now_millis()).unwrap_or(i64::MAX),
        }
    }
}

/// Bounds applied to every accepted submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitPolicy {
    pub max_message_chars: usize,
    pub max_clock_skew_ms: u64,
    /// Distinct producer ids remembered; the oldest is forgotten beyond this.
    pub max_producers: usize,
}

/// Default cap on remembered producer ids.
pub const DEFAULT_MAX_PRODUCERS: usize = 1024;

impl Default for SubmitPolicy {
    fn default() -> Self {
        Self {
            max_message_chars: 4096,
            max_clock_skew_ms: 5 * 60 * 1000,
            max_producers: DEFAULT_MAX_PRODUCERS,
        }
    }
}

/// Counters describing what the relay absorbed instead of failing.
#[derive(Debug, Default)]
pub struct RelayHealth {
    accepted: AtomicU64,
    rejected_identity: AtomicU64,
    truncated: AtomicU64,
    severity_coerced: AtomicU64,
    clock_adjusted: AtomicU64,
    producers_evicted: AtomicU64,
    malformed_frames: AtomicU64,
    oversized_frames: AtomicU64,
    transport_failures: AtomicU64,
    idle_timeouts: AtomicU64,
    connections_open: AtomicU64,
    connections_total: AtomicU64,
}

/// Point-in-time copy of [`RelayHealth`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub accepted: u64,
    pub rejected_identity: u64,
    pub truncated: u64,
    pub severity_coerced: u64,
    pub clock_adjusted: u64,
    pub producers_evicted: u64,
    pub malformed_frames: u64,
    pub oversized_frames: u64,
    pub transport_failures: u64,
    pub idle_timeouts: u64,
    pub connections_open: u64,
    pub connections_total: u64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl RelayHealth {
    pub fn snapshot(&self) -> HealthSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        HealthSnapshot {
            accepted: load(&self.accepted),
            rejected_identity: load(&self.rejected_identity),
            truncated: load(&self.truncated),
            severity_coerced: load(&self.severity_coerced),
            clock_adjusted: load(&self.clock_adjusted),
            producers_evicted: load(&self.producers_evicted),
            malformed_frames: load(&self.malformed_frames),
            oversized_frames: load(&self.oversized_frames),
            transport_failures: load(&self.transport_failures),
            idle_timeouts: load(&self.idle_timeouts),
            connections_open: load(&self.connections_open),
            connections_total: load(&self.connections_total),
        }
    }

    pub(crate) fn malformed_frame(&self) {
        bump(&self.malformed_frames);
    }

    pub(crate) fn oversized_frame(&self) {
        bump(&self.oversized_frames);
    }

    pub(crate) fn transport_failure(&self) {
        bump(&self.transport_failures);
    }

    pub(crate) fn idle_timeout(&self) {
        bump(&self.idle_timeouts);
    }

    pub(crate) fn connection_opened(&self) {
        bump(&self.connections_open);
        bump(&self.connections_total);
    }

    pub(crate) fn connection_closed(&self) {
        self.connections_open.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Validating ingestion point shared by every producer connection.
pub struct LogRelay {
    store: Arc<LogStore>,
    bus: LogBus,
    policy: SubmitPolicy,
    producers: RwLock<ProducerRegistry>,
    health: RelayHealth,
}

impl LogRelay {
    pub fn new(store: Arc<LogStore>, bus: LogBus, policy: SubmitPolicy) -> Self {
        Self {
            store,
            bus,
            policy,
            producers: RwLock::new(ProducerRegistry::new(policy.max_producers)),
            health: RelayHealth::default(),
        }
    }

    pub fn shared(store: Arc<LogStore>, bus: LogBus, policy: SubmitPolicy) -> Arc<Self> {
        Arc::new(Self::new(store, bus, policy))
    }

    /// Record `producer_id` as a known producer. Returns `true` if it was new.
    pub fn register(&self, producer_id: &str) -> Result<bool, RelayError> {
        let producer_id = validate_identity(producer_id).inspect_err(|_| {
            bump(&self.health.rejected_identity);
        })?;
        Ok(self.note_producer(producer_id))
    }

    /// Validate and ingest one submission.
    ///
    /// Fails only on an empty producer identity; unknown severities become
    /// [`Severity::Info`], long messages are ellipsized and implausible
    /// timestamps are replaced with the receipt time.
    pub fn submit(&self, submission: Submission) -> Result<Arc<LogRecord>, RelayError> {
        let Submission {
            producer_id,
            tag,
            message,
            severity,
            timestamp_ms,
        } = submission;

        if let Err(err) = validate_identity(&producer_id) {
            bump(&self.health.rejected_identity);
            warn!(error = %err, "rejected submission");
            return Err(err);
        }

        let severity = match Severity::from_code(severity) {
            Some(sev) => sev,
            None => {
                bump(&self.health.severity_coerced);
                trace!(producer = %producer_id, code = severity, "unknown severity coerced to INFO");
                Severity::Info
            }
        };

        let now = now_millis();
        let timestamp = if is_plausible(timestamp_ms, now, self.policy.max_clock_skew_ms) {
            timestamp_ms as u64
        } else {
            bump(&self.health.clock_adjusted);
            now
        };

        self.note_producer(&producer_id);
        let record = Arc::new(LogRecord::new(
            producer_id,
            tag,
            message,
            severity,
            timestamp,
            self.policy.max_message_chars,
        ));
        if record.truncated() {
            bump(&self.health.truncated);
        }

        self.store.append(Arc::clone(&record));
        // Store lock is released by now; the bus never runs under it.
        self.bus.publish(record.render_line());
        bump(&self.health.accepted);
        trace!(producer = %record.producer_id(), severity = %record.severity(), "record accepted");
        Ok(record)
    }

    /// Recently seen producers, sorted.
    pub fn producers(&self) -> Vec<String> {
        self.producers.read().known.iter().cloned().collect()
    }

    pub fn health(&self) -> &RelayHealth {
        &self.health
    }

    pub fn store(&self) -> &Arc<LogStore> {
        &self.store
    }

    pub fn bus(&self) -> &LogBus {
        &self.bus
    }

    pub fn policy(&self) -> SubmitPolicy {
        self.policy
    }

    fn note_producer(&self, producer_id: &str) -> bool {
        if self.producers.read().known.contains(producer_id) {
            return false;
        }
        let (new, evicted) = self.producers.write().insert(producer_id);
        if let Some(evicted) = evicted {
            bump(&self.health.producers_evicted);
            debug!(producer = %evicted, "forgetting oldest producer");
        }
        new
    }
}

/// Producer ids in first-seen order, capped so untrusted clients cannot grow it.
#[derive(Debug)]
struct ProducerRegistry {
    known: BTreeSet<String>,
    order: VecDeque<String>,
    limit: usize,
}

impl ProducerRegistry {
    fn new(limit: usize) -> Self {
        Self {
            known: BTreeSet::new(),
            order: VecDeque::new(),
            limit: limit.max(1),
        }
    }

    /// Returns whether `producer_id` was new and which id, if any, made room for it.
    fn insert(&mut self, producer_id: &str) -> (bool, Option<String>) {
        if self.known.contains(producer_id) {
            return (false, None);
        }
        let mut evicted = None;
        if self.known.len() >= self.limit {
            if let Some(oldest) = self.order.pop_front() {
                self.known.remove(&oldest);
                evicted = Some(oldest);
            }
        }
        self.known.insert(producer_id.to_string());
        self.order.push_back(producer_id.to_string());
        (true, evicted)
    }
}

fn validate_identity(producer_id: &str) -> Result<&str, RelayError> {
    if producer_id.trim().is_empty() {
        return Err(RelayError::MalformedIdentity(producer_id.to_string()));
    }
    Ok(producer_id)
}
