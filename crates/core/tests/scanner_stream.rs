use devsort_core::cache::{CacheKey, MemoryScanCache, ScanCache};
use devsort_core::models::ProgressCallback;
use devsort_core::{
    CancellationToken, FileRecord, ProgressEvent, ScanBatch, ScanFailure, ScanOptions, ScanStream,
    TimeoutKind,
};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn options(root: &Path) -> ScanOptions {
    let mut opts = ScanOptions::new(vec![root.to_path_buf()]);
    opts.throttle_interval = Duration::ZERO;
    opts
}

fn write_files(root: &Path, count: usize) {
    fs::create_dir_all(root.join("nested/deeper")).unwrap();
    for i in 0..count {
        let dir = match i % 3 {
            0 => root.to_path_buf(),
            1 => root.join("nested"),
            _ => root.join("nested/deeper"),
        };
        fs::write(dir.join(format!("file{i}.txt")), format!("content {i}")).unwrap();
    }
}

fn collect(stream: ScanStream) -> (Vec<ScanBatch>, Option<ScanFailure>) {
    let mut batches = Vec::new();
    for item in stream {
        match item {
            Ok(b) => batches.push(b),
            Err(e) => return (batches, Some(e)),
        }
    }
    (batches, None)
}

#[test]
fn batches_are_full_except_the_last() {
    let temp = tempfile::tempdir().unwrap();
    write_files(temp.path(), 23);
    let mut opts = options(temp.path());
    opts.batch_size = 5;
    let (batches, failure) = collect(ScanStream::new(opts, None, None, None).unwrap());
    assert!(failure.is_none());
    assert_eq!(batches.len(), 5);
    for batch in &batches[..4] {
        assert_eq!(batch.records.len(), 5);
    }
    assert_eq!(batches[4].records.len(), 3);
    let total: usize = batches.iter().map(|b| b.records.len()).sum();
    assert_eq!(total, 23);
    let last = batches.last().unwrap();
    assert_eq!(last.stats.processed, 23);
    assert_eq!(last.stats.discovered, 23);
    assert_eq!(last.stats.eta_seconds, Some(0.0));
}

#[cfg(unix)]
#[test]
fn unreadable_entry_becomes_an_error_not_a_record() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp.path();
    fs::write(root.join("a.py"), vec![b'x'; 100]).unwrap();
    fs::write(root.join("b.md"), vec![b'y'; 50]).unwrap();
    std::os::unix::fs::symlink(root.join("gone.bin"), root.join("locked.bin")).unwrap();

    let mut opts = options(root);
    opts.follow_symlinks = true;
    let (batches, failure) = collect(ScanStream::new(opts, None, None, None).unwrap());
    assert!(failure.is_none());

    let records: Vec<&FileRecord> = batches.iter().flat_map(|b| &b.records).collect();
    let errors: Vec<_> = batches.iter().flat_map(|b| &b.errors).collect();
    assert_eq!(records.len(), 2);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].path.ends_with("locked.bin"));

    let stats = &batches.last().unwrap().stats;
    assert_eq!(stats.discovered, 3);
    assert_eq!(stats.processed, 2);
    assert_eq!(stats.skipped, 1);
    assert_eq!(records.len() + errors.len(), stats.discovered as usize);

    let a = records.iter().find(|r| r.name == "a.py").unwrap();
    assert_eq!(a.size, 100);
    assert_eq!(a.ext, ".py");
    assert_eq!(a.hint.as_deref().map(str::len), Some(100));
    assert!(a.bucket.is_none());
}

#[test]
fn cancellation_stops_within_one_file() {
    let temp = tempfile::tempdir().unwrap();
    write_files(temp.path(), 20);
    let token = CancellationToken::new();
    let trigger = token.clone();
    let seen = Arc::new(Mutex::new(0u64));
    let seen_cb = Arc::clone(&seen);
    let progress: ProgressCallback = Box::new(move |event: &ProgressEvent| {
        *seen_cb.lock().unwrap() = event.stats.processed;
        if event.stats.processed == 4 {
            trigger.cancel();
        }
    });
    let mut opts = options(temp.path());
    opts.batch_size = 1;
    let (batches, failure) =
        collect(ScanStream::new(opts, Some(progress), Some(token), None).unwrap());
    assert!(matches!(failure, Some(ScanFailure::Cancelled)));
    assert!(batches.len() <= 5);
    assert!(*seen.lock().unwrap() <= 5);
}

#[test]
fn zero_per_batch_timeout_fails_the_call() {
    let temp = tempfile::tempdir().unwrap();
    write_files(temp.path(), 3);
    let mut opts = options(temp.path());
    opts.per_batch_timeout = Some(Duration::ZERO);
    let (batches, failure) = collect(ScanStream::new(opts, None, None, None).unwrap());
    assert!(batches.is_empty());
    assert!(matches!(
        failure,
        Some(ScanFailure::Timeout(TimeoutKind::PerBatch))
    ));
}

#[test]
fn overall_timeout_keeps_already_yielded_batches() {
    let temp = tempfile::tempdir().unwrap();
    write_files(temp.path(), 6);
    let progress: ProgressCallback = Box::new(|_event: &ProgressEvent| {
        std::thread::sleep(Duration::from_millis(30));
    });
    let mut opts = options(temp.path());
    opts.batch_size = 1;
    opts.overall_timeout = Some(Duration::from_millis(50));
    let (batches, failure) = collect(ScanStream::new(opts, Some(progress), None, None).unwrap());
    assert!(matches!(
        failure,
        Some(ScanFailure::Timeout(TimeoutKind::Overall))
    ));
    assert!(!batches.is_empty());
    assert!(batches.len() < 6);
    for batch in &batches {
        assert_eq!(batch.records.len(), 1);
    }
}

#[test]
fn final_progress_event_has_no_current_path() {
    let temp = tempfile::tempdir().unwrap();
    write_files(temp.path(), 4);
    let events: Arc<Mutex<Vec<ProgressEvent>>> = Arc::default();
    let sink = Arc::clone(&events);
    let progress: ProgressCallback = Box::new(move |event: &ProgressEvent| {
        sink.lock().unwrap().push(event.clone());
    });
    let (batches, failure) =
        collect(ScanStream::new(options(temp.path()), Some(progress), None, None).unwrap());
    assert!(failure.is_none());
    assert_eq!(batches.len(), 1);
    let events = events.lock().unwrap();
    // Throttle is zero: one event per file plus the completion event.
    assert_eq!(events.len(), 5);
    assert!(events[..4].iter().all(|e| e.current_path.is_some()));
    let last = events.last().unwrap();
    assert!(last.current_path.is_none());
    assert_eq!(last.stats.processed, 4);
}

#[test]
fn long_throttle_limits_progress_events() {
    let temp = tempfile::tempdir().unwrap();
    write_files(temp.path(), 10);
    let count = Arc::new(Mutex::new(0usize));
    let sink = Arc::clone(&count);
    let progress: ProgressCallback = Box::new(move |_event: &ProgressEvent| {
        *sink.lock().unwrap() += 1;
    });
    let mut opts = options(temp.path());
    opts.throttle_interval = Duration::from_secs(3600);
    let (_, failure) = collect(ScanStream::new(opts, Some(progress), None, None).unwrap());
    assert!(failure.is_none());
    // Only the completion event gets through.
    assert_eq!(*count.lock().unwrap(), 1);
}

#[test]
fn exclude_include_and_depth_are_honored() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp.path();
    fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
    fs::create_dir_all(root.join("src/inner")).unwrap();
    fs::write(root.join("node_modules/pkg/index.js"), "x").unwrap();
    fs::write(root.join("src/main.py"), "x").unwrap();
    fs::write(root.join("src/inner/util.py"), "x").unwrap();
    fs::write(root.join("src/readme.md"), "x").unwrap();

    let mut opts = options(root);
    opts.exclude = vec!["node_modules".to_string()];
    opts.include = vec!["*.py".to_string()];
    opts.max_depth = Some(1);
    let (batches, failure) = collect(ScanStream::new(opts, None, None, None).unwrap());
    assert!(failure.is_none());
    let names: Vec<String> = batches
        .iter()
        .flat_map(|b| &b.records)
        .map(|r| r.name.clone())
        .collect();
    assert_eq!(names, vec!["main.py"]);
}

#[test]
fn zero_batch_size_is_rejected() {
    let temp = tempfile::tempdir().unwrap();
    let mut opts = options(temp.path());
    opts.batch_size = 0;
    assert!(matches!(
        ScanStream::new(opts, None, None, None),
        Err(ScanFailure::InvalidOptions(_))
    ));
}

#[test]
fn cache_hit_reuses_stored_hint() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp.path();
    fs::write(root.join("notes.txt"), "fresh text").unwrap();

    let (first, _) = collect(ScanStream::new(options(root), None, None, None).unwrap());
    let mut cached = first[0].records[0].clone();
    cached.hint = Some("from cache".to_string());
    let mut cache = MemoryScanCache::new();
    cache.put(CacheKey::for_record(&cached), cached);

    let (second, _) =
        collect(ScanStream::new(options(root), None, None, Some(Box::new(cache))).unwrap());
    assert_eq!(second[0].records[0].hint.as_deref(), Some("from cache"));

    // A content change moves size/mtime and misses the cache.
    fs::write(root.join("notes.txt"), "fresh text, now longer").unwrap();
    let cache = MemoryScanCache::from_records(second[0].records.clone());
    let (third, _) =
        collect(ScanStream::new(options(root), None, None, Some(Box::new(cache))).unwrap());
    assert_eq!(
        third[0].records[0].hint.as_deref(),
        Some("fresh text, now longer")
    );
}

#[test]
fn slow_consumer_is_not_charged_to_the_next_batch() {
    let temp = tempfile::tempdir().unwrap();
    write_files(temp.path(), 3);
    let mut opts = options(temp.path());
    opts.batch_size = 1;
    opts.per_batch_timeout = Some(Duration::from_millis(50));
    let stream = ScanStream::new(opts, None, None, None).unwrap();
    let mut yielded = 0;
    for item in stream {
        item.unwrap();
        yielded += 1;
        std::thread::sleep(Duration::from_millis(100));
    }
    assert_eq!(yielded, 3);
}

#[test]
fn per_batch_budget_applies_to_each_batch_separately() {
    let temp = tempfile::tempdir().unwrap();
    write_files(temp.path(), 6);
    // Each file costs ~40ms through the progress callback; batches of two
    // stay under 200ms while the whole scan takes well over it.
    let progress: ProgressCallback = Box::new(|_event: &ProgressEvent| {
        std::thread::sleep(Duration::from_millis(40));
    });
    let mut opts = options(temp.path());
    opts.batch_size = 2;
    opts.per_batch_timeout = Some(Duration::from_millis(200));
    let started = std::time::Instant::now();
    let (batches, failure) = collect(ScanStream::new(opts, Some(progress), None, None).unwrap());
    assert!(failure.is_none(), "{failure:?}");
    assert_eq!(batches.len(), 3);
    assert!(started.elapsed() > Duration::from_millis(200));
}

struct CountingCache {
    inner: MemoryScanCache,
    puts: Arc<Mutex<usize>>,
    remaining: Arc<Mutex<usize>>,
}

impl ScanCache for CountingCache {
    fn take(&mut self, key: &CacheKey) -> Option<FileRecord> {
        let hit = self.inner.take(key);
        *self.remaining.lock().unwrap() = self.inner.len();
        hit
    }

    fn put(&mut self, key: CacheKey, record: FileRecord) {
        *self.puts.lock().unwrap() += 1;
        self.inner.put(key, record);
    }
}

#[test]
fn cache_does_not_grow_during_a_scan() {
    let temp = tempfile::tempdir().unwrap();
    write_files(temp.path(), 60);
    let mut opts = options(temp.path());
    opts.batch_size = 10;
    let (first, _) = collect(ScanStream::new(opts.clone(), None, None, None).unwrap());
    let seed: Vec<FileRecord> = first.iter().flat_map(|b| b.records.clone()).take(20).collect();

    let puts = Arc::new(Mutex::new(0usize));
    let remaining = Arc::new(Mutex::new(usize::MAX));
    let cache = CountingCache {
        inner: MemoryScanCache::from_records(seed),
        puts: Arc::clone(&puts),
        remaining: Arc::clone(&remaining),
    };
    let (batches, failure) =
        collect(ScanStream::new(opts, None, None, Some(Box::new(cache))).unwrap());
    assert!(failure.is_none());
    assert_eq!(batches.len(), 6);
    assert_eq!(*puts.lock().unwrap(), 0);
    // Every seeded entry was consumed by its hit.
    assert_eq!(*remaining.lock().unwrap(), 0);
}

#[cfg(unix)]
#[test]
fn walk_errors_are_reported_despite_the_throttle() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp.path();
    fs::write(root.join("a.txt"), "a").unwrap();
    std::os::unix::fs::symlink(root.join("gone.bin"), root.join("dangling.bin")).unwrap();

    let events: Arc<Mutex<Vec<ProgressEvent>>> = Arc::default();
    let sink = Arc::clone(&events);
    let progress: ProgressCallback = Box::new(move |event: &ProgressEvent| {
        sink.lock().unwrap().push(event.clone());
    });
    let mut opts = options(root);
    opts.follow_symlinks = true;
    opts.throttle_interval = Duration::from_secs(3600);
    let (_, failure) = collect(ScanStream::new(opts, Some(progress), None, None).unwrap());
    assert!(failure.is_none());

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 2);
    assert!(events[0]
        .current_path
        .as_deref()
        .map(|p| p.ends_with("dangling.bin"))
        .unwrap_or(false));
    assert_eq!(events[0].stats.skipped, 1);
    assert!(events[1].current_path.is_none());
}
