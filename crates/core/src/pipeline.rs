use crate::cache::ScanCache;
use crate::guard::CancellationToken;
use crate::json_stream::{JsonArrayWriter, SafeMapWriter};
use crate::models::{FileRecord, ProgressCallback, ScanError, ScanOptions, ScanStatistics};
use crate::safe_map::SafeMap;
use crate::scanner::ScanStream;
use anyhow::Context;
use std::fs;
use std::path::Path;
use tracing::info;

/// Scans into the output array and safe map files. On a fatal failure the
/// files stay unterminated and the failure is returned.
pub fn run_scan_to_files(
    options: ScanOptions,
    output_path: &Path,
    safe_map_path: &Path,
    progress: Option<ProgressCallback>,
    token: Option<CancellationToken>,
    cache: Option<Box<dyn ScanCache>>,
) -> anyhow::Result<ScanStatistics> {
    info!("Starting scan of {} root(s)...", options.roots.len());
    let stream = ScanStream::new(options, progress, token, cache)?;
    let mut writer = JsonArrayWriter::create(output_path)
        .with_context(|| format!("Failed to create scan output {:?}", output_path))?;
    let mut safe_writer = SafeMapWriter::create(safe_map_path)
        .with_context(|| format!("Failed to create safe map {:?}", safe_map_path))?;

    let mut stats = ScanStatistics::default();
    let mut total_errors = 0u64;
    for batch in stream {
        let batch = batch?;
        for record in &batch.records {
            writer.write(record)?;
            safe_writer.append(&record.safe_id, &record.path)?;
        }
        total_errors += batch.errors.len() as u64;
        stats = ScanStatistics {
            processed: batch.stats.processed,
            discovered: batch.stats.discovered,
            skipped: batch.stats.skipped,
            errors: total_errors,
            duration_seconds: batch.stats.elapsed_seconds,
        };
    }
    writer.finish()?;
    safe_writer.finish()?;
    info!(
        "Scan complete. Processed {} of {} discovered files, {} error(s).",
        stats.processed, stats.discovered, stats.errors
    );
    Ok(stats)
}

/// Everything a scan produced, held in memory.
#[derive(Debug, Default)]
pub struct ScanOutput {
    pub records: Vec<FileRecord>,
    pub errors: Vec<ScanError>,
    pub safe_map: SafeMap,
}

pub fn scan_records(
    options: ScanOptions,
    token: Option<CancellationToken>,
) -> anyhow::Result<ScanOutput> {
    let mut out = ScanOutput::default();
    for batch in ScanStream::new(options, None, token, None)? {
        let batch = batch?;
        for record in batch.records {
            out.safe_map.insert(record.safe_id.clone(), record.path.clone());
            out.records.push(record);
        }
        out.errors.extend(batch.errors);
    }
    Ok(out)
}

/// Loads a scan output file. An unterminated array means the scan that
/// wrote it did not finish, and is rejected.
pub fn load_records(path: &Path) -> anyhow::Result<Vec<FileRecord>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read scan output {:?}", path))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Scan output {:?} is incomplete or invalid", path))
}
