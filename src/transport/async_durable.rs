//! Async durable sink (component C7, spec §4.3): an SQLite-backed queue that
//! survives process restarts. Formatted records are persisted before
//! delivery is attempted; a failed delivery leaves its rows for retry, and
//! retried rows are re-inserted at the tail of the queue rather than
//! retried in place, so redelivery does not preserve strict FIFO order
//! (spec §9 open question, resolved: this is the intended behavior, not a
//! defect — a crashed sink must not wedge the whole queue behind one bad
//! chunk).

use super::{LoggerMetrics, MetricsSnapshot, Transport};
use crate::event::{Event, EventRecord};
use crate::format::Formatter;
use crate::levels::Severity;
use rayon::prelude::*;
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// The 128-bit id a delegate can use to correlate a delivery outcome back to
/// the originating [`Event`] (spec §4.3 step 3/5's `event_id` keys).
pub type EventId = u128;

#[derive(Debug, Clone)]
pub enum StorageLocation {
    InMemory,
    File(PathBuf),
}

pub struct AsyncDurableConfig {
    pub storage: StorageLocation,
    pub chunk_size: usize,
    pub max_retry_attempts: u32,
    pub auto_flush_interval: Option<Duration>,
    /// Upper bound on buffered rows; a vacuum pass trims the oldest excess
    /// down to this cap before every chunk take (spec §4.3 "vacuum").
    pub max_entries: usize,
    /// If set, a `record` that pushes the buffer past `max_entries` triggers
    /// an immediate `flush_chunk` instead of waiting for the auto-flush timer
    /// or an explicit `flush_all` call (spec §4.3 "flush on record").
    pub flush_on_record: bool,
}

impl Default for AsyncDurableConfig {
    fn default() -> Self {
        AsyncDurableConfig {
            storage: StorageLocation::InMemory,
            chunk_size: 50,
            max_retry_attempts: 3,
            auto_flush_interval: None,
            max_entries: 10_000,
            flush_on_record: false,
        }
    }
}

/// The result of one delivery attempt (spec §4.3 step 3): either every event
/// in the chunk made it, the whole attempt failed before anything could be
/// distinguished (e.g. the connection never opened), or some subset of
/// events individually failed while the rest were accepted.
pub enum ChunkOutcome {
    AllSent,
    ChunkFailed(String),
    EventsFailed(HashMap<EventId, String>),
}

/// Delivery and lifecycle callbacks (spec §4.3: "the sink reports its own
/// progress and failures through a delegate, never by returning an error
/// from `record`").
pub trait AsyncDurableDelegate: Send + Sync {
    /// Attempts to deliver one chunk, each entry paired with the id of the
    /// event it was rendered from. A [`ChunkOutcome::EventsFailed`] retry
    /// or discard decision only touches the named ids; everything else in
    /// the chunk is treated as delivered.
    fn send(&self, chunk: &[(EventId, Vec<u8>)]) -> ChunkOutcome;
    /// Called once per flush with the ids that were actually delivered this
    /// round, separately from [`Self::finished_chunk`]'s fuller accounting
    /// (spec §4.3 step 5: "`finished_chunk(...)` and separately `sent(...)`").
    fn sent(&self, _sent_ids: &[EventId]) {}
    /// The full per-chunk accounting: which ids were delivered, which were
    /// requeued for retry (with the error that caused it), and which were
    /// discarded after exhausting `max_retry_attempts`.
    fn finished_chunk(
        &self,
        _sent_ids: &[EventId],
        _retry_ids_with_errors: &[(EventId, String)],
        _discarded_ids: &[EventId],
    ) {
    }
    /// Rows dropped by vacuum (cap overflow), not by retry exhaustion —
    /// reported as a count since vacuum trims by row age without decoding
    /// each row's event id.
    fn discarded_from_buffer(&self, _count: usize) {}
    fn did_fail_with_error(&self, _message: &str) {}
}

struct BufferRow {
    row_id: i64,
    /// Canonical, format-independent encoding of the original event (spec
    /// §4.3 step 1: "serialize event to bytes using an internal canonical
    /// encoder"). Preserved across retries so a replay after a crash still
    /// has the full event, not just whatever one formatter produced.
    event_blob: Vec<u8>,
    /// The formatter's rendering of the event (spec §4.3 step 2: "format
    /// through configured formatters into an auxiliary payload"). This is
    /// what actually gets handed to the delegate on delivery.
    message_blob: Vec<u8>,
    retry_attempt: u32,
}

/// Outcome of applying a [`ChunkOutcome`] to a set of buffered rows: the ids
/// actually removed from the buffer as delivered, the ids requeued for
/// retry with the error that caused it, and the ids discarded outright.
struct AppliedOutcome {
    sent: Vec<EventId>,
    retried: Vec<(EventId, String)>,
    discarded: Vec<EventId>,
}

/// The durable queue (spec §6 "SQLite storage contract"): one `buffer` table
/// with an autoincrementing `row_id` giving FIFO admission order.
pub struct AsyncDurableSink {
    conn: Mutex<Connection>,
    formatter: Box<dyn Formatter>,
    delegate: Arc<dyn AsyncDurableDelegate>,
    config: AsyncDurableConfig,
    queue: super::TransportQueue,
    enabled: AtomicBool,
    min_level: Option<Severity>,
    metrics: LoggerMetrics,
}

impl AsyncDurableSink {
    /// Validates `config` and opens the backing SQLite connection. Spec §7.1
    /// ("Configuration errors... surfaced at transport construction;
    /// construction fails"): a zero `chunk_size` would never make progress,
    /// so construction is rejected rather than silently hanging.
    pub fn new(
        config: AsyncDurableConfig,
        formatter: Box<dyn Formatter>,
        delegate: Arc<dyn AsyncDurableDelegate>,
    ) -> crate::error::Result<Self> {
        if config.chunk_size == 0 {
            return Err(crate::error::LogCoreError::Configuration(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        let conn = match &config.storage {
            StorageLocation::InMemory => Connection::open_in_memory()?,
            StorageLocation::File(path) => Connection::open(path)?,
        };
        conn.execute(
            "CREATE TABLE IF NOT EXISTS buffer (
                row_id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                event_blob BLOB NOT NULL,
                message_blob BLOB NOT NULL,
                retry_attempt INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;
        Ok(AsyncDurableSink {
            conn: Mutex::new(conn),
            formatter,
            delegate,
            config,
            queue: super::TransportQueue::new("async-durable"),
            enabled: AtomicBool::new(true),
            min_level: None,
            metrics: LoggerMetrics::default(),
        })
    }

    pub fn with_min_level(mut self, level: Severity) -> Self {
        self.min_level = Some(level);
        self
    }

    pub fn buffered_len(&self) -> u64 {
        let conn = self.conn.lock().expect("buffer connection poisoned");
        conn.query_row("SELECT COUNT(*) FROM buffer", [], |row| row.get(0))
            .unwrap_or(0)
    }

    fn insert(&self, timestamp: &str, event_blob: &[u8], message_blob: &[u8]) -> rusqlite::Result<()> {
        let conn = self.conn.lock().expect("buffer connection poisoned");
        conn.execute(
            "INSERT INTO buffer (timestamp, event_blob, message_blob, retry_attempt) VALUES (?1, ?2, ?3, 0)",
            params![timestamp, event_blob, message_blob],
        )?;
        Ok(())
    }

    fn next_chunk(&self) -> Vec<BufferRow> {
        let conn = self.conn.lock().expect("buffer connection poisoned");
        let mut stmt = match conn.prepare(
            "SELECT row_id, event_blob, message_blob, retry_attempt FROM buffer ORDER BY row_id ASC LIMIT ?1",
        ) {
            Ok(stmt) => stmt,
            Err(_) => return Vec::new(),
        };
        let rows = stmt.query_map(params![self.config.chunk_size as i64], |row| {
            Ok(BufferRow {
                row_id: row.get(0)?,
                event_blob: row.get(1)?,
                message_blob: row.get(2)?,
                retry_attempt: row.get(3)?,
            })
        });
        match rows {
            Ok(rows) => rows.filter_map(Result::ok).collect(),
            Err(_) => Vec::new(),
        }
    }

    fn delete_rows(&self, row_ids: &[i64]) {
        if row_ids.is_empty() {
            return;
        }
        let conn = self.conn.lock().expect("buffer connection poisoned");
        let placeholders = row_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!("DELETE FROM buffer WHERE row_id IN ({placeholders})");
        let params: Vec<&dyn rusqlite::ToSql> =
            row_ids.iter().map(|id| id as &dyn rusqlite::ToSql).collect();
        let _ = conn.execute(&sql, params.as_slice());
    }

    /// Recovers the event id a row was buffered under by decoding its
    /// canonical `event_blob` (no separate `event_id` column exists in the
    /// SQLite schema; spec §6 documents only the four columns above). This
    /// crate is the only writer of `event_blob`, so a row that fails to
    /// decode means the buffer itself has been corrupted underneath us —
    /// not a condition a retry or a `Result` can meaningfully recover from.
    fn row_event_id(row: &BufferRow) -> EventId {
        let decoded = EventRecord::from_bytes(&row.event_blob);
        crate::error::assert_invariant(
            decoded.is_ok(),
            "buffered event_blob must decode via the canonical encoder that wrote it",
        );
        let record = decoded.expect("checked by assert_invariant above");
        u128::from_str_radix(&record.id, 16).unwrap_or(0)
    }

    /// Applies one [`ChunkOutcome`] to the rows it was derived from,
    /// updating the buffer and returning the sent/retried/discarded id
    /// breakdown for the caller to report through the delegate.
    fn apply_outcome(&self, rows: Vec<BufferRow>, ids: &[EventId], outcome: ChunkOutcome) -> AppliedOutcome {
        match outcome {
            ChunkOutcome::AllSent => {
                let row_ids: Vec<i64> = rows.iter().map(|r| r.row_id).collect();
                self.delete_rows(&row_ids);
                AppliedOutcome {
                    sent: ids.to_vec(),
                    retried: Vec::new(),
                    discarded: Vec::new(),
                }
            }
            ChunkOutcome::ChunkFailed(message) => {
                self.delegate.did_fail_with_error(&message);
                self.metrics.error();
                let errors: HashMap<EventId, String> =
                    ids.iter().map(|id| (*id, message.clone())).collect();
                self.requeue_or_discard(rows, ids, &errors)
            }
            ChunkOutcome::EventsFailed(errors) => {
                self.metrics.error();
                self.requeue_or_discard(rows, ids, &errors)
            }
        }
    }

    /// Partitions `rows` by whether their id appears in `errors`: ids absent
    /// from the map are treated as delivered and removed; ids present are
    /// re-inserted at the tail with an incremented retry count, or discarded
    /// once `max_retry_attempts` is exceeded (spec §4.3 step 3/5: a mixed
    /// per-event result retries/discards only the events that actually
    /// failed, not the whole chunk).
    fn requeue_or_discard(
        &self,
        rows: Vec<BufferRow>,
        ids: &[EventId],
        errors: &HashMap<EventId, String>,
    ) -> AppliedOutcome {
        let mut to_delete = Vec::with_capacity(rows.len());
        let mut to_reinsert = Vec::new();
        let mut sent = Vec::new();
        let mut retried = Vec::new();
        let mut discarded = Vec::new();

        for (row, id) in rows.into_iter().zip(ids.iter().copied()) {
            to_delete.push(row.row_id);
            match errors.get(&id) {
                None => sent.push(id),
                Some(message) => {
                    if row.retry_attempt + 1 > self.config.max_retry_attempts {
                        discarded.push(id);
                    } else {
                        to_reinsert.push((row.event_blob, row.message_blob, row.retry_attempt + 1));
                        retried.push((id, message.clone()));
                    }
                }
            }
        }

        self.delete_rows(&to_delete);
        if !to_reinsert.is_empty() {
            let conn = self.conn.lock().expect("buffer connection poisoned");
            for (event_blob, message_blob, attempt) in to_reinsert {
                let _ = conn.execute(
                    "INSERT INTO buffer (timestamp, event_blob, message_blob, retry_attempt) VALUES (?1, ?2, ?3, ?4)",
                    params![chrono::Utc::now().to_rfc3339(), event_blob, message_blob, attempt],
                );
            }
        }

        AppliedOutcome {
            sent,
            retried,
            discarded,
        }
    }

    /// Pulls one chunk and attempts delivery. Formatting of each row's
    /// payload for the wire is parallelized across a `rayon` pool since each
    /// row is independent (spec §9 "chunked delivery may format rows
    /// concurrently").
    pub fn flush_chunk(&self) -> usize {
        self.vacuum();
        let rows = self.next_chunk();
        if rows.is_empty() {
            return 0;
        }
        let payloads: Vec<(EventId, Vec<u8>)> = rows
            .par_iter()
            .map(|r| (Self::row_event_id(r), r.message_blob.clone()))
            .collect();
        let ids: Vec<EventId> = payloads.iter().map(|(id, _)| *id).collect();

        let outcome = self.delegate.send(&payloads);
        let applied = self.apply_outcome(rows, &ids, outcome);

        if !applied.sent.is_empty() {
            self.delegate.sent(&applied.sent);
        }
        self.delegate
            .finished_chunk(&applied.sent, &applied.retried, &applied.discarded);
        applied.sent.len()
    }

    /// Drains the entire buffer, chunk by chunk.
    pub fn flush_all(&self) {
        loop {
            if self.flush_chunk() == 0 {
                break;
            }
        }
    }

    /// Spawns a background thread that calls [`Self::flush_all`] on
    /// `config.auto_flush_interval`, for as long as `self` has other
    /// references alive. No-op if no interval was configured.
    pub fn start_auto_flush(self: &Arc<Self>) {
        let Some(interval) = self.config.auto_flush_interval else {
            return;
        };
        let weak = Arc::downgrade(self);
        std::thread::Builder::new()
            .name("logcore-async-durable-timer".to_string())
            .spawn(move || loop {
                std::thread::sleep(interval);
                match weak.upgrade() {
                    Some(sink) => sink.flush_all(),
                    None => break,
                }
            })
            .expect("failed to spawn auto-flush timer thread");
    }

    /// Trims the oldest rows beyond `config.max_entries`, discarding them
    /// without attempting delivery (spec §4.3 "vacuum"). Runs automatically
    /// at the top of every [`Self::flush_chunk`]; also safe to call directly.
    pub fn vacuum(&self) {
        let conn = self.conn.lock().expect("buffer connection poisoned");
        let total: i64 = conn
            .query_row("SELECT COUNT(*) FROM buffer", [], |row| row.get(0))
            .unwrap_or(0);
        let cap = self.config.max_entries as i64;
        let excess = total - cap;
        if excess <= 0 {
            return;
        }
        let _ = conn.execute(
            "DELETE FROM buffer WHERE row_id IN (SELECT row_id FROM buffer ORDER BY row_id ASC LIMIT ?1)",
            params![excess],
        );
        drop(conn);
        self.delegate.discarded_from_buffer(excess as usize);
    }
}

impl Transport for AsyncDurableSink {
    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    fn min_level(&self) -> Option<Severity> {
        self.min_level
    }

    fn record(&self, event: &Event) -> bool {
        let Some(formatted) = self.formatter.format(event) else {
            return false;
        };
        let message_blob = formatted.as_bytes().to_vec();
        let event_blob = EventRecord::from_event(event).to_bytes();
        let timestamp = event.timestamp().to_rfc3339();
        match self.insert(&timestamp, &event_blob, &message_blob) {
            Ok(()) => {
                self.metrics.record(message_blob.len() as u64);
                if self.config.flush_on_record {
                    self.flush_chunk();
                }
                true
            }
            Err(err) => {
                self.metrics.error();
                self.delegate.did_fail_with_error(&err.to_string());
                false
            }
        }
    }

    fn queue(&self) -> Option<&super::TransportQueue> {
        Some(&self.queue)
    }

    fn flush(&self) {
        self.flush_all();
    }

    fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Message;
    use crate::format::fields::FieldsFormatter;
    use crate::scope::Scope;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex as StdMutex;

    /// A delegate that fails every delivery for `remaining_failures` calls
    /// (as a whole-chunk failure), then accepts everything.
    struct FailNTimesThenSucceed {
        remaining_failures: AtomicUsize,
        delivered: StdMutex<Vec<Vec<u8>>>,
        discarded: AtomicUsize,
    }

    impl AsyncDurableDelegate for FailNTimesThenSucceed {
        fn send(&self, chunk: &[(EventId, Vec<u8>)]) -> ChunkOutcome {
            if self.remaining_failures.load(Ordering::SeqCst) > 0 {
                self.remaining_failures.fetch_sub(1, Ordering::SeqCst);
                return ChunkOutcome::ChunkFailed("simulated failure".to_string());
            }
            self.delivered
                .lock()
                .unwrap()
                .extend(chunk.iter().map(|(_, payload)| payload.clone()));
            ChunkOutcome::AllSent
        }

        fn discarded_from_buffer(&self, count: usize) {
            self.discarded.fetch_add(count, Ordering::SeqCst);
        }

        fn finished_chunk(
            &self,
            _sent_ids: &[EventId],
            _retry_ids_with_errors: &[(EventId, String)],
            discarded_ids: &[EventId],
        ) {
            self.discarded.fetch_add(discarded_ids.len(), Ordering::SeqCst);
        }
    }

    fn event(text: &str) -> Event {
        Event::new(Severity::Info, Message::from_str(text), Scope::default())
    }

    #[test]
    fn delegate_receives_the_formatted_payload_not_the_canonical_encoding() {
        let delegate = Arc::new(FailNTimesThenSucceed {
            remaining_failures: AtomicUsize::new(0),
            delivered: StdMutex::new(Vec::new()),
            discarded: AtomicUsize::new(0),
        });
        let sink = AsyncDurableSink::new(
            AsyncDurableConfig::default(),
            Box::new(FieldsFormatter::default_line()),
            delegate.clone(),
        )
        .unwrap();
        sink.record(&event("distinct payload check"));
        sink.flush_all();

        let delivered = delegate.delivered.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        let line = String::from_utf8(delivered[0].clone()).unwrap();
        assert!(line.contains("distinct payload check"));
        // The line formatter's output must not be the canonical MsgPack
        // encoding used internally for event_blob.
        assert!(crate::event::EventRecord::from_bytes(&delivered[0]).is_err());
    }

    #[test]
    fn construction_rejects_zero_chunk_size() {
        let delegate = Arc::new(FailNTimesThenSucceed {
            remaining_failures: AtomicUsize::new(0),
            delivered: StdMutex::new(Vec::new()),
            discarded: AtomicUsize::new(0),
        });
        let config = AsyncDurableConfig {
            chunk_size: 0,
            ..AsyncDurableConfig::default()
        };
        let err = AsyncDurableSink::new(config, Box::new(FieldsFormatter::default_line()), delegate)
            .expect_err("chunk_size=0 should be rejected at construction");
        assert!(matches!(err, crate::error::LogCoreError::Configuration(_)));
    }

    #[test]
    fn delivered_rows_are_removed_from_the_buffer() {
        let delegate = Arc::new(FailNTimesThenSucceed {
            remaining_failures: AtomicUsize::new(0),
            delivered: StdMutex::new(Vec::new()),
            discarded: AtomicUsize::new(0),
        });
        let sink = AsyncDurableSink::new(
            AsyncDurableConfig::default(),
            Box::new(FieldsFormatter::default_line()),
            delegate.clone(),
        )
        .unwrap();
        sink.record(&event("a"));
        sink.record(&event("b"));
        assert_eq!(sink.buffered_len(), 2);
        sink.flush_all();
        assert_eq!(sink.buffered_len(), 0);
        assert_eq!(delegate.delivered.lock().unwrap().len(), 2);
    }

    #[test]
    fn failed_delivery_retries_and_eventually_discards() {
        let delegate = Arc::new(FailNTimesThenSucceed {
            remaining_failures: AtomicUsize::new(100),
            delivered: StdMutex::new(Vec::new()),
            discarded: AtomicUsize::new(0),
        });
        let config = AsyncDurableConfig {
            max_retry_attempts: 2,
            ..AsyncDurableConfig::default()
        };
        let sink = AsyncDurableSink::new(
            config,
            Box::new(FieldsFormatter::default_line()),
            delegate.clone(),
        )
        .unwrap();
        sink.record(&event("will fail"));
        // attempt 0 -> retry 1, attempt 1 -> retry 2, attempt 2 -> exceeds max, discarded
        sink.flush_chunk();
        sink.flush_chunk();
        sink.flush_chunk();
        assert_eq!(sink.buffered_len(), 0);
        assert_eq!(delegate.discarded.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn vacuum_trims_oldest_rows_beyond_the_cap() {
        let delegate = Arc::new(FailNTimesThenSucceed {
            remaining_failures: AtomicUsize::new(0),
            delivered: StdMutex::new(Vec::new()),
            discarded: AtomicUsize::new(0),
        });
        let config = AsyncDurableConfig {
            max_entries: 3,
            ..AsyncDurableConfig::default()
        };
        let sink = AsyncDurableSink::new(
            config,
            Box::new(FieldsFormatter::default_line()),
            delegate.clone(),
        )
        .unwrap();
        for text in ["a", "b", "c", "d", "e"] {
            sink.record(&event(text));
        }
        assert_eq!(sink.buffered_len(), 5);
        sink.vacuum();
        assert_eq!(sink.buffered_len(), 3);
        assert_eq!(delegate.discarded.load(Ordering::SeqCst), 2);
        assert!(delegate.delivered.lock().unwrap().is_empty());
    }

    #[test]
    fn flush_on_record_drains_as_entries_are_recorded() {
        let delegate = Arc::new(FailNTimesThenSucceed {
            remaining_failures: AtomicUsize::new(0),
            delivered: StdMutex::new(Vec::new()),
            discarded: AtomicUsize::new(0),
        });
        let config = AsyncDurableConfig {
            flush_on_record: true,
            ..AsyncDurableConfig::default()
        };
        let sink = AsyncDurableSink::new(
            config,
            Box::new(FieldsFormatter::default_line()),
            delegate.clone(),
        )
        .unwrap();
        sink.record(&event("a"));
        sink.record(&event("b"));
        assert_eq!(sink.buffered_len(), 0);
        assert_eq!(delegate.delivered.lock().unwrap().len(), 2);
    }

    #[test]
    fn vacuum_runs_automatically_before_each_chunk_take() {
        let delegate = Arc::new(FailNTimesThenSucceed {
            remaining_failures: AtomicUsize::new(0),
            delivered: StdMutex::new(Vec::new()),
            discarded: AtomicUsize::new(0),
        });
        let config = AsyncDurableConfig {
            max_entries: 100,
            chunk_size: 1000,
            ..AsyncDurableConfig::default()
        };
        let sink = AsyncDurableSink::new(
            config,
            Box::new(FieldsFormatter::default_line()),
            delegate.clone(),
        )
        .unwrap();
        for i in 0..150 {
            sink.record(&event(&format!("event-{i}")));
        }
        assert_eq!(sink.buffered_len(), 150);
        sink.flush_chunk();
        assert_eq!(delegate.discarded.load(Ordering::SeqCst), 50);
        assert_eq!(delegate.delivered.lock().unwrap().len(), 100);
        assert_eq!(sink.buffered_len(), 0);
    }

    /// A delegate that fails delivery only for events whose rendered payload
    /// contains a given marker string, accepting the rest of the chunk.
    struct FailMarkedEvents {
        marker: &'static str,
        delivered: StdMutex<Vec<Vec<u8>>>,
        sent_ids: StdMutex<Vec<EventId>>,
        retried_ids: StdMutex<Vec<EventId>>,
    }

    impl AsyncDurableDelegate for FailMarkedEvents {
        fn send(&self, chunk: &[(EventId, Vec<u8>)]) -> ChunkOutcome {
            let mut errors = HashMap::new();
            let mut delivered = self.delivered.lock().unwrap();
            for (id, payload) in chunk {
                if String::from_utf8_lossy(payload).contains(self.marker) {
                    errors.insert(*id, "marked as bad".to_string());
                } else {
                    delivered.push(payload.clone());
                }
            }
            if errors.is_empty() {
                ChunkOutcome::AllSent
            } else {
                ChunkOutcome::EventsFailed(errors)
            }
        }

        fn sent(&self, sent_ids: &[EventId]) {
            self.sent_ids.lock().unwrap().extend_from_slice(sent_ids);
        }

        fn finished_chunk(
            &self,
            _sent_ids: &[EventId],
            retry_ids_with_errors: &[(EventId, String)],
            _discarded_ids: &[EventId],
        ) {
            self.retried_ids
                .lock()
                .unwrap()
                .extend(retry_ids_with_errors.iter().map(|(id, _)| *id));
        }
    }

    #[test]
    fn a_single_bad_event_in_an_otherwise_good_chunk_only_retries_itself() {
        let delegate = Arc::new(FailMarkedEvents {
            marker: "BAD",
            delivered: StdMutex::new(Vec::new()),
            sent_ids: StdMutex::new(Vec::new()),
            retried_ids: StdMutex::new(Vec::new()),
        });
        let sink = AsyncDurableSink::new(
            AsyncDurableConfig::default(),
            Box::new(FieldsFormatter::default_line()),
            delegate.clone(),
        )
        .unwrap();
        sink.record(&event("good-1"));
        sink.record(&event("BAD-marker"));
        sink.record(&event("good-2"));
        assert_eq!(sink.buffered_len(), 3);

        sink.flush_chunk();

        // Only the marked event stays buffered for retry; the two good ones
        // were removed and reported delivered.
        assert_eq!(sink.buffered_len(), 1);
        assert_eq!(delegate.delivered.lock().unwrap().len(), 2);
        assert_eq!(delegate.sent_ids.lock().unwrap().len(), 2);
        assert_eq!(delegate.retried_ids.lock().unwrap().len(), 1);

        sink.flush_chunk();
        assert_eq!(delegate.delivered.lock().unwrap().len(), 2);
        assert_eq!(sink.buffered_len(), 1, "the bad event keeps retrying, never poisoning the rest");
    }
}
