//! Streaming scanner: walks the configured roots and yields bounded batches of
//! file records, checking cancellation and time limits on every file.

use crate::cache::{CacheKey, ScanCache};
use crate::error::ScanFailure;
use crate::guard::{CancellationToken, ScanGuard};
use crate::hashing;
use crate::models::{
    FileRecord, ProgressCallback, ProgressEvent, ProgressStats, ScanBatch, ScanError, ScanOptions,
};
use crate::textual;
use crate::walker::{DirectoryWalker, PathFilter, WalkEntry};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, warn};

/// Counters shared by progress events and batch snapshots.
struct ScanState {
    processed: u64,
    discovered: u64,
    skipped: u64,
    errors: u64,
    current_path: Option<PathBuf>,
    last_progress: Instant,
}

impl ScanState {
    fn snapshot(&self, started: Instant, now: Instant) -> ProgressStats {
        let elapsed = now.saturating_duration_since(started).as_secs_f64();
        let remaining = self.discovered.saturating_sub(self.processed);
        let eta_seconds = if self.processed == 0 {
            None
        } else if remaining == 0 {
            Some(0.0)
        } else {
            let rate = elapsed / self.processed as f64;
            Some(round2(rate * remaining as f64))
        };
        ProgressStats {
            processed: self.processed,
            discovered: self.discovered,
            skipped: self.skipped,
            elapsed_seconds: round2(elapsed),
            eta_seconds,
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn mtime_secs(meta: &fs::Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// Lazy sequence of scan batches. Once it yields an `Err`, it is finished.
pub struct ScanStream {
    options: ScanOptions,
    entries: Box<dyn Iterator<Item = WalkEntry> + Send>,
    guard: ScanGuard,
    state: ScanState,
    progress: Option<ProgressCallback>,
    cache: Option<Box<dyn ScanCache>>,
    batch: Vec<FileRecord>,
    errors: Vec<ScanError>,
    /// A batch went out; the throttle pause and per-batch clock reset are
    /// due when the consumer asks for the next one.
    batch_emitted: bool,
    finished: bool,
}

/// Starts a scan. Fails up front on invalid options, bad patterns or a
/// missing root; everything after that is reported through the stream.
pub fn scan(
    options: ScanOptions,
    progress: Option<ProgressCallback>,
    token: Option<CancellationToken>,
) -> Result<ScanStream, ScanFailure> {
    ScanStream::new(options, progress, token, None)
}

impl ScanStream {
    pub fn new(
        options: ScanOptions,
        progress: Option<ProgressCallback>,
        token: Option<CancellationToken>,
        cache: Option<Box<dyn ScanCache>>,
    ) -> Result<Self, ScanFailure> {
        if options.batch_size == 0 {
            return Err(ScanFailure::InvalidOptions(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if let Some(missing) = options.roots.iter().find(|r| !r.is_dir()) {
            return Err(ScanFailure::MissingRoot(missing.clone()));
        }
        let filter = PathFilter::new(&options.include, &options.exclude)?;
        let walker = DirectoryWalker::new(
            options.roots.clone(),
            filter,
            options.max_depth,
            options.follow_symlinks,
        );
        let guard = ScanGuard::new(token, options.overall_timeout, options.per_batch_timeout);
        let state = ScanState {
            processed: 0,
            discovered: 0,
            skipped: 0,
            errors: 0,
            current_path: None,
            last_progress: guard.started(),
        };
        Ok(Self {
            batch: Vec::with_capacity(options.batch_size),
            options,
            entries: Box::new(walker.into_entries()),
            guard,
            state,
            progress,
            cache,
            errors: Vec::new(),
            batch_emitted: false,
            finished: false,
        })
    }

    /// Total errors seen so far, including ones already handed out in batches.
    pub fn error_count(&self) -> u64 {
        self.state.errors
    }

    fn fail(&mut self, failure: ScanFailure) -> Option<Result<ScanBatch, ScanFailure>> {
        warn!(
            "Scan stopped after {} files: {}",
            self.state.processed, failure
        );
        self.finished = true;
        Some(Err(failure))
    }

    fn emit_progress(&mut self, now: Instant) {
        self.state.last_progress = now;
        let Some(callback) = self.progress.as_mut() else {
            return;
        };
        let event = ProgressEvent {
            stats: self.state.snapshot(self.guard.started(), now),
            current_path: self.state.current_path.clone(),
        };
        debug!(
            processed = event.stats.processed,
            discovered = event.stats.discovered,
            "scan progress"
        );
        callback(&event);
    }

    fn should_emit_progress(&self, now: Instant) -> bool {
        if self.progress.is_none() {
            return false;
        }
        let interval = self.options.throttle_interval;
        interval.is_zero() || now.saturating_duration_since(self.state.last_progress) >= interval
    }

    fn record_error(&mut self, path: PathBuf, message: String) {
        debug!("scan error at {:?}: {}", path, message);
        self.errors.push(ScanError { path, message });
        self.state.skipped += 1;
        self.state.errors += 1;
    }

    fn process_file(&mut self, path: PathBuf) {
        let meta = match fs::metadata(&path) {
            Ok(m) => m,
            Err(e) => return self.record_error(path, e.to_string()),
        };
        match self.build_record(&path, &meta) {
            Ok(record) => {
                self.batch.push(record);
                self.state.processed += 1;
            }
            Err(e) => self.record_error(path, e.to_string()),
        }
    }

    fn build_record(&mut self, path: &Path, meta: &fs::Metadata) -> std::io::Result<FileRecord> {
        let safe_id = hashing::safe_id(path);
        let key = CacheKey {
            safe_id: safe_id.clone(),
            mtime: mtime_secs(meta),
            size: meta.len(),
        };
        if let Some(hit) = self.cache.as_mut().and_then(|c| c.take(&key)) {
            if hit.path == path {
                return Ok(hit);
            }
        }
        let hint = if textual::is_textual(path) {
            Some(textual::read_text_hint(path, self.options.sample_bytes)?)
                .filter(|h| !h.is_empty())
        } else {
            None
        };
        Ok(FileRecord {
            path: path.to_path_buf(),
            safe_id,
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            ext: path
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
                .unwrap_or_default(),
            size: key.size,
            mtime: key.mtime,
            hint,
            bucket: None,
            error: None,
        })
    }

    fn take_batch(&mut self, now: Instant) -> ScanBatch {
        ScanBatch {
            records: std::mem::replace(
                &mut self.batch,
                Vec::with_capacity(self.options.batch_size),
            ),
            errors: std::mem::take(&mut self.errors),
            stats: self.state.snapshot(self.guard.started(), now),
        }
    }

    fn finish(&mut self) -> Option<Result<ScanBatch, ScanFailure>> {
        self.finished = true;
        let now = Instant::now();
        let last = if self.batch.is_empty() && self.errors.is_empty() {
            None
        } else {
            Some(self.take_batch(now))
        };
        self.state.current_path = None;
        self.emit_progress(now);
        debug!(
            "Scan finished: processed {}, discovered {}, errors {}",
            self.state.processed, self.state.discovered, self.state.errors
        );
        last.map(Ok)
    }
}

impl Iterator for ScanStream {
    type Item = Result<ScanBatch, ScanFailure>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        if self.batch_emitted {
            self.batch_emitted = false;
            if !self.options.throttle_interval.is_zero() {
                std::thread::sleep(self.options.throttle_interval);
            }
            self.guard.reset_batch(Instant::now());
        }
        loop {
            let Some(entry) = self.entries.next() else {
                return self.finish();
            };
            if let Err(failure) = self.guard.check(Instant::now()) {
                return self.fail(failure);
            }
            self.state.discovered += 1;
            let mut walk_error = false;
            match entry {
                WalkEntry::File(path) => {
                    self.state.current_path = Some(path.clone());
                    self.process_file(path);
                }
                WalkEntry::Error { path, message } => {
                    self.state.current_path = Some(path.clone());
                    self.record_error(path, message);
                    walk_error = true;
                }
            }
            let now = Instant::now();
            if let Err(failure) = self.guard.check(now) {
                return self.fail(failure);
            }
            // Walk errors are reported right away, throttle or not.
            if walk_error || self.should_emit_progress(now) {
                self.emit_progress(now);
            }
            if self.batch.len() >= self.options.batch_size {
                self.batch_emitted = true;
                return Some(Ok(self.take_batch(now)));
            }
        }
    }
}
