//! Rotating file transport (component C8). Grounded on the teacher's
//! `SimpleRollingWriter`: the rotation timestamp is spliced before the file
//! extension, old segments beyond the retention count are pruned by mtime,
//! and a size limit rotates mid-period. Generalizes the teacher's hourly/
//! daily/minutely/never enum into an explicit byte interval and adds
//! optional gzip/zstd compression of archived segments.

use super::{LoggerMetrics, MetricsSnapshot, Transport};
use crate::event::Event;
use crate::format::Formatter;
use crate::levels::Severity;
use chrono::Utc;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationInterval {
    Never,
    Hourly,
    Daily,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Zstd,
}

pub struct RotatingFileConfig {
    pub path: PathBuf,
    pub interval: RotationInterval,
    pub max_file_size: Option<u64>,
    pub retention_count: Option<usize>,
    pub compression: Compression,
}

impl RotatingFileConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        RotatingFileConfig {
            path: path.into(),
            interval: RotationInterval::Never,
            max_file_size: None,
            retention_count: None,
            compression: Compression::None,
        }
    }

    /// Sets `max_file_size` from a human-readable string like `"10MB"` or
    /// `"1GiB"`, the form a config file would carry this value in. Returns
    /// `None` (leaving the config unchanged) if `size` isn't parseable.
    pub fn with_max_file_size_str(mut self, size: &str) -> Option<Self> {
        self.max_file_size = Some(crate::utils::size::parse_size(size)?);
        Some(self)
    }
}

/// A failure observed while writing or rotating. The sink degrades (keeps
/// accepting records, drops the write) rather than propagating (spec §7
/// "I/O errors surface via delegate, never by unwinding the caller").
pub trait FileSinkDelegate: Send + Sync {
    fn did_fail_with_error(&self, _message: &str) {}
    fn did_rotate(&self, _archived_path: &Path) {}
}

pub struct NoopDelegate;
impl FileSinkDelegate for NoopDelegate {}

struct RollingWriter {
    base_path: PathBuf,
    interval: RotationInterval,
    current_period: String,
    file: File,
    retention_count: Option<usize>,
    max_file_size: Option<u64>,
    current_size: u64,
    compression: Compression,
    delegate: std::sync::Arc<dyn FileSinkDelegate>,
}

impl RollingWriter {
    fn new(config: &RotatingFileConfig, delegate: std::sync::Arc<dyn FileSinkDelegate>) -> io::Result<Self> {
        let current_period = Self::period_string(config.interval);
        let file = Self::open_for_period(&config.path, &current_period)?;
        let current_size = file.metadata()?.len();
        Ok(RollingWriter {
            base_path: config.path.clone(),
            interval: config.interval,
            current_period,
            file,
            retention_count: config.retention_count,
            max_file_size: config.max_file_size,
            current_size,
            compression: config.compression,
            delegate,
        })
    }

    fn period_string(interval: RotationInterval) -> String {
        let now = Utc::now();
        match interval {
            RotationInterval::Never => String::new(),
            RotationInterval::Hourly => now.format("%Y-%m-%d_%H").to_string(),
            RotationInterval::Daily => now.format("%Y-%m-%d").to_string(),
        }
    }

    fn path_for_period(base: &Path, period: &str) -> PathBuf {
        if period.is_empty() {
            return base.to_path_buf();
        }
        let file_name = base.file_name().and_then(|s| s.to_str()).unwrap_or_default();
        match file_name.rfind('.') {
            Some(pos) => {
                let (stem, ext) = file_name.split_at(pos);
                base.with_file_name(format!("{stem}.{period}{ext}"))
            }
            None => base.with_file_name(format!("{file_name}.{period}")),
        }
    }

    fn open_for_period(base: &Path, period: &str) -> io::Result<File> {
        let p = Self::path_for_period(base, period);
        if let Some(parent) = p.parent() {
            fs::create_dir_all(parent)?;
        }
        OpenOptions::new().create(true).append(true).open(p)
    }

    /// Checked after every append, per spec §4.5: size is measured against
    /// `self.current_size` as it stands once the write has already landed,
    /// never pre-emptively against the size an upcoming write would produce.
    fn rotate_if_needed(&mut self) -> io::Result<()> {
        let new_period = Self::period_string(self.interval);
        let needs_time_rotation = self.interval != RotationInterval::Never && new_period != self.current_period;
        let needs_size_rotation = self.max_file_size.is_some_and(|limit| self.current_size > limit);

        if !needs_time_rotation && !needs_size_rotation {
            return Ok(());
        }

        let archived_path = Self::path_for_period(&self.base_path, &self.current_period);
        let actual_period = if needs_size_rotation && !needs_time_rotation {
            Utc::now().format("%Y-%m-%d_%H-%M-%S%.3f").to_string()
        } else {
            new_period
        };

        self.current_period = actual_period.clone();
        self.file = Self::open_for_period(&self.base_path, &actual_period)?;
        self.current_size = 0;

        if self.compression != Compression::None {
            if let Err(err) = compress_in_place(&archived_path, self.compression) {
                self.delegate
                    .did_fail_with_error(&format!("compression failed: {err}"));
            }
        }
        self.delegate.did_rotate(&archived_path);

        if let Some(keep) = self.retention_count {
            if let Some(dir) = self.base_path.parent().filter(|p| !p.as_os_str().is_empty()) {
                let _ = prune_old_files(dir, &self.base_path, keep);
            } else if let Err(err) = prune_old_files(Path::new("."), &self.base_path, keep) {
                self.delegate
                    .did_fail_with_error(&format!("pruning failed: {err}"));
            }
        }
        Ok(())
    }
}

impl Write for RollingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.file.write(buf)?;
        self.current_size += written as u64;
        let _ = self.rotate_if_needed();
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

fn compress_in_place(path: &Path, compression: Compression) -> io::Result<()> {
    let data = fs::read(path)?;
    match compression {
        Compression::None => Ok(()),
        Compression::Gzip => {
            let compressed_path = path.with_extension(format!(
                "{}.gz",
                path.extension().and_then(|e| e.to_str()).unwrap_or("log")
            ));
            let out = File::create(&compressed_path)?;
            let mut encoder = flate2::write::GzEncoder::new(out, flate2::Compression::default());
            encoder.write_all(&data)?;
            encoder.finish()?;
            fs::remove_file(path)?;
            Ok(())
        }
        Compression::Zstd => {
            let compressed_path = path.with_extension(format!(
                "{}.zst",
                path.extension().and_then(|e| e.to_str()).unwrap_or("log")
            ));
            let encoded = zstd::encode_all(data.as_slice(), 0)?;
            fs::write(&compressed_path, encoded)?;
            fs::remove_file(path)?;
            Ok(())
        }
    }
}

fn prune_old_files(dir: &Path, base_path: &Path, keep: usize) -> io::Result<()> {
    let stem = base_path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    let mut candidates: Vec<(std::time::SystemTime, PathBuf)> = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = path.file_name().and_then(|s| s.to_str()).unwrap_or_default();
        if name.starts_with(stem) {
            let modified = entry.metadata()?.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH);
            candidates.push((modified, path));
        }
    }
    candidates.sort_by(|a, b| b.0.cmp(&a.0));
    for (_, path) in candidates.into_iter().skip(keep) {
        let _ = fs::remove_file(path);
    }
    Ok(())
}

/// The rotating file sink (spec §4.6/C8). Owns a dedicated queue so file I/O
/// never blocks the calling thread in asynchronous mode.
pub struct RotatingFileSink {
    writer: Mutex<RollingWriter>,
    formatter: Box<dyn Formatter>,
    queue: super::TransportQueue,
    min_level: Option<Severity>,
    enabled: AtomicBool,
    metrics: LoggerMetrics,
    delegate: std::sync::Arc<dyn FileSinkDelegate>,
}

impl RotatingFileSink {
    /// Validates `config` and opens the current segment. Spec §7.1: an
    /// out-of-range `max_file_size` (zero would rotate on every single
    /// write) fails construction rather than producing a sink that thrashes.
    pub fn new(
        config: RotatingFileConfig,
        formatter: Box<dyn Formatter>,
        delegate: std::sync::Arc<dyn FileSinkDelegate>,
    ) -> crate::error::Result<Self> {
        if config.max_file_size == Some(0) {
            return Err(crate::error::LogCoreError::Configuration(
                "max_file_size must be greater than zero".to_string(),
            ));
        }
        let writer = RollingWriter::new(&config, delegate.clone())?;
        Ok(RotatingFileSink {
            writer: Mutex::new(writer),
            formatter,
            queue: super::TransportQueue::new("file"),
            min_level: None,
            enabled: AtomicBool::new(true),
            metrics: LoggerMetrics::default(),
            delegate,
        })
    }

    pub fn with_min_level(mut self, level: Severity) -> Self {
        self.min_level = Some(level);
        self
    }
}

impl Transport for RotatingFileSink {
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
        let mut bytes = formatted.as_bytes().to_vec();
        bytes.push(b'\n');
        let mut writer = self.writer.lock();
        match writer.write_all(&bytes).and_then(|_| writer.flush()) {
            Ok(()) => {
                self.metrics.record(bytes.len() as u64);
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
        let _ = self.writer.lock().flush();
    }

    fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
