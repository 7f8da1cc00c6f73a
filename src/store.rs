//! Bounded in-memory retention of structured log records.

use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::record::{LogRecord, Severity};

/// Retention used when none is configured.
pub const DEFAULT_CAPACITY: usize = 5000;

/// Tag prefixes emitted by the platform rather than the application.
const SYSTEM_TAG_PREFIXES: &[&str] = &[
    "VRI",
    "InputMethodManager",
    "InputEventReceiver",
    "ImeFocusController",
    "SurfaceControl",
    "BufferQueueProducer",
    "BufferQueueConsumer",
    "RenderService",
    "libEGL",
    "HwViewRootImpl",
    "RmeSchedManager",
    "RtgSchedEvent",
    "RtgSchedIpcFile",
    "RtgSched",
    "PhoneWindow",
    "FullScreenUtils",
    "DecorView",
    "HWUI",
    "skia",
    "AwareBitmapCacher",
    "Resource",
    "ProfileInstaller",
    "ZrHung",
    "libc",
    "dalvikvm",
    "art",
    "Choreographer",
];

const SYSTEM_MESSAGE_FRAGMENTS: &[&str] = &[
    "type=1400 audit",
    "RCS is disable",
    "Compiler allocated",
];

/// Whether a record looks like platform noise rather than application output.
pub fn is_system_noise(record: &LogRecord) -> bool {
    let tag = record.tag();
    if tag.starts_with('.') || SYSTEM_TAG_PREFIXES.iter().any(|p| tag.starts_with(p)) {
        return true;
    }
    SYSTEM_MESSAGE_FRAGMENTS
        .iter()
        .any(|f| record.message().contains(f))
}

/// Conjunction of optional predicates. Empty strings mean "no constraint".
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    pub producer_id: Option<String>,
    pub min_severity: Option<Severity>,
    /// Case-insensitive substring of the tag.
    pub tag_contains: Option<String>,
    /// Case-insensitive substring of the message.
    pub message_contains: Option<String>,
    pub hide_system: bool,
}

impl LogFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn producer(mut self, producer_id: impl Into<String>) -> Self {
        self.producer_id = Some(producer_id.into());
        self
    }

    pub fn min_severity(mut self, severity: Severity) -> Self {
        self.min_severity = Some(severity);
        self
    }

    pub fn tag_contains(mut self, needle: impl Into<String>) -> Self {
        self.tag_contains = Some(needle.into());
        self
    }

    pub fn message_contains(mut self, needle: impl Into<String>) -> Self {
        self.message_contains = Some(needle.into());
        self
    }

    pub fn hide_system(mut self, hide: bool) -> Self {
        self.hide_system = hide;
        self
    }

    fn compile(&self) -> CompiledFilter<'_> {
        fn non_empty(s: &Option<String>) -> Option<&str> {
            s.as_deref().filter(|s| !s.is_empty())
        }
        CompiledFilter {
            producer_id: non_empty(&self.producer_id),
            min_severity: self.min_severity,
            tag: non_empty(&self.tag_contains).map(str::to_lowercase),
            message: non_empty(&self.message_contains).map(str::to_lowercase),
            hide_system: self.hide_system,
        }
    }
}

struct CompiledFilter<'a> {
    producer_id: Option<&'a str>,
    min_severity: Option<Severity>,
    tag: Option<String>,
    message: Option<String>,
    hide_system: bool,
}

impl CompiledFilter<'_> {
    fn matches(&self, record: &LogRecord) -> bool {
        if self.producer_id.is_some_and(|p| p != record.producer_id()) {
            return false;
        }
        if self.min_severity.is_some_and(|s| record.severity() < s) {
            return false;
        }
        if let Some(tag) = &self.tag {
            if !record.tag().to_lowercase().contains(tag.as_str()) {
                return false;
            }
        }
        if let Some(message) = &self.message {
            if !record.message().to_lowercase().contains(message.as_str()) {
                return false;
            }
        }
        !(self.hide_system && is_system_noise(record))
    }
}

/// Fixed-capacity ring buffer of records, oldest evicted first.
///
/// Queries run under the read lock and return shared handles, so a caller
/// holds a stable snapshot while appends continue.
pub struct LogStore {
    records: RwLock<VecDeque<Arc<LogRecord>>>,
    capacity: usize,
    appended: AtomicU64,
}

impl LogStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
            appended: AtomicU64::new(0),
        }
    }

    pub fn shared(capacity: usize) -> Arc<Self> {
        Arc::new(Self::new(capacity))
    }

    /// Insert at the tail, evicting the head when full.
    pub fn append(&self, record: impl Into<Arc<LogRecord>>) {
        let record = record.into();
        let mut records = self.records.write();
        if records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record);
        self.appended.fetch_add(1, Ordering::Relaxed);
    }

    /// Matching records, oldest first.
    pub fn query(&self, filter: &LogFilter) -> Vec<Arc<LogRecord>> {
        let compiled = filter.compile();
        self.records
            .read()
            .iter()
            .filter(|r| compiled.matches(r))
            .cloned()
            .collect()
    }

    /// Every retained record, oldest first.
    pub fn snapshot(&self) -> Vec<Arc<LogRecord>> {
        self.records.read().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Records appended since creation, including evicted ones.
    pub fn total_appended(&self) -> u64 {
        self.appended.load(Ordering::Relaxed)
    }

    pub fn clear(&self) {
        self.records.write().clear();
    }

    /// Distinct producers among retained records, sorted.
    pub fn producers(&self) -> Vec<String> {
        self.records
            .read()
            .iter()
            .map(|r| r.producer_id())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }
}

impl Default for LogStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
