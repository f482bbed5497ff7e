use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use devsort::apply::{self, OrganizeConfig, OrganizeError};
use devsort::journal;
use devsort::undo;
use devsort_core::cache::{MemoryScanCache, ScanCache};
use devsort_core::clustering;
use devsort_core::config::{self, AppConfig, ConflictPolicy, TransferMode};
use devsort_core::models::ProgressCallback;
use devsort_core::pipeline;
use devsort_core::rules::{self, RuleTagger};
use devsort_core::safe_map::SafeMap;
use devsort_core::{CancellationToken, FileRecord, ProgressEvent, ProjectGroup};
use providers::{ClusterResponse, ClustererRegistry};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Scan {
            roots,
            output,
            safe_map,
            cache,
            include,
            exclude,
            max_depth,
            batch_size,
            overall_timeout,
            per_batch_timeout,
            json,
        } => {
            let mut scan = cfg.scan.clone();
            if !include.is_empty() {
                scan.include = include;
            }
            if !exclude.is_empty() {
                scan.exclude = exclude;
            }
            scan.max_depth = max_depth.or(scan.max_depth);
            scan.batch_size = batch_size.unwrap_or(scan.batch_size);
            scan.overall_timeout_secs = overall_timeout.or(scan.overall_timeout_secs);
            scan.per_batch_timeout_secs = per_batch_timeout.or(scan.per_batch_timeout_secs);
            let options = scan.to_options(roots)?;
            run_scan(options, output, safe_map, cache, json).await
        }
        Commands::Organize {
            records,
            safe_map,
            projects,
            target,
            mode,
            conflict,
            journal,
            rules,
            json,
        } => {
            run_organize(
                &cfg,
                OrganizeArgs {
                    records,
                    safe_map,
                    projects,
                    target,
                    mode,
                    conflict,
                    journal,
                    rules,
                },
                json,
            )
            .await
        }
        Commands::Rollback { journal, json } => {
            let summary = undo::rollback(&journal)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!(
                    "rollback: restored {}, removed copies {}, already restored {}, conflicts {}, failures {}, malformed lines {}",
                    summary.restored,
                    summary.removed_copies,
                    summary.already_restored,
                    summary.conflicts,
                    summary.failures,
                    summary.malformed
                );
            }
            Ok(())
        }
        Commands::Journal { journal, json } => print_journal(&journal, json),
    }
}

#[derive(Parser)]
#[command(name = "devsort")]
#[command(about = "Scan development folders and sort them into projects", long_about = None)]
struct Cli {
    /// Path to config file (TOML or YAML)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan roots into a record file and a safe id map
    Scan {
        /// Root directories; falls back to `scan.roots` from config
        roots: Vec<PathBuf>,
        #[arg(long, default_value = ".cache/scan.json")]
        output: PathBuf,
        #[arg(long, default_value = ".cache/safe_map.json")]
        safe_map: PathBuf,
        /// Previous scan output whose unchanged records are reused
        #[arg(long)]
        cache: Option<PathBuf>,
        /// Include globs (comma-separated), matched against files only
        #[arg(long, value_delimiter = ',', num_args = 1.., default_values_t = Vec::<String>::new())]
        include: Vec<String>,
        /// Exclude globs (comma-separated); an excluded directory is not entered
        #[arg(long, value_delimiter = ',', num_args = 1.., default_values_t = Vec::<String>::new())]
        exclude: Vec<String>,
        #[arg(long)]
        max_depth: Option<usize>,
        #[arg(long)]
        batch_size: Option<usize>,
        /// Seconds for the whole scan
        #[arg(long)]
        overall_timeout: Option<f64>,
        /// Seconds allowed between two batches
        #[arg(long)]
        per_batch_timeout: Option<f64>,
        /// Output JSON summary
        #[arg(long)]
        json: bool,
    },
    /// Move or copy files into project folders, journaling every action
    Organize {
        #[arg(long, default_value = ".cache/scan.json")]
        records: PathBuf,
        #[arg(long, default_value = ".cache/safe_map.json")]
        safe_map: PathBuf,
        /// Project groups as clusterer JSON; clusters on the fly when omitted
        #[arg(long)]
        projects: Option<PathBuf>,
        /// Target root; falls back to `organize.target_root` from config
        #[arg(long)]
        target: Option<PathBuf>,
        /// move|copy
        #[arg(long)]
        mode: Option<TransferMode>,
        /// version|skip|overwrite
        #[arg(long)]
        conflict: Option<ConflictPolicy>,
        #[arg(long, default_value = ".cache/journal.jsonl")]
        journal: PathBuf,
        /// Directory of TOML bucket rules; built-in rules when omitted
        #[arg(long)]
        rules: Option<PathBuf>,
        /// Output JSON summary
        #[arg(long)]
        json: bool,
    },
    /// Undo the transfers recorded in a journal
    Rollback {
        #[arg(long, default_value = ".cache/journal.jsonl")]
        journal: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Print journal records
    Journal {
        #[arg(long, default_value = ".cache/journal.jsonl")]
        journal: PathBuf,
        #[arg(long)]
        json: bool,
    },
}

async fn run_scan(
    options: devsort_core::ScanOptions,
    output: PathBuf,
    safe_map: PathBuf,
    cache: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let cache: Option<Box<dyn ScanCache>> = match cache {
        Some(path) if path.exists() => {
            let seeded = MemoryScanCache::from_records(pipeline::load_records(&path)?);
            info!("Loaded {} cached record(s) from {:?}", seeded.len(), path);
            Some(Box::new(seeded))
        }
        Some(path) => {
            warn!("Cache file {:?} not found, scanning without it", path);
            None
        }
        None => None,
    };

    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling scan");
            trigger.cancel();
        }
    });

    let progress: ProgressCallback = Box::new(|event: &ProgressEvent| match &event.current_path {
        Some(path) => info!(
            "processed {}/{} (skipped {}), eta {:?}s: {}",
            event.stats.processed,
            event.stats.discovered,
            event.stats.skipped,
            event.stats.eta_seconds,
            path.display()
        ),
        None => info!(
            "scan done: {} processed in {:.2}s",
            event.stats.processed, event.stats.elapsed_seconds
        ),
    });

    let stats = tokio::task::spawn_blocking(move || {
        pipeline::run_scan_to_files(options, &output, &safe_map, Some(progress), Some(token), cache)
    })
    .await
    .context("scan task panicked")??;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!(
            "scan: discovered {}, processed {}, skipped {}, errors {} in {:.2}s",
            stats.discovered, stats.processed, stats.skipped, stats.errors, stats.duration_seconds
        );
    }
    Ok(())
}

struct OrganizeArgs {
    records: PathBuf,
    safe_map: PathBuf,
    projects: Option<PathBuf>,
    target: Option<PathBuf>,
    mode: Option<TransferMode>,
    conflict: Option<ConflictPolicy>,
    journal: PathBuf,
    rules: Option<PathBuf>,
}

fn require_input(path: &Path) -> Result<(), OrganizeError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(OrganizeError::MissingInput(path.to_path_buf()))
    }
}

async fn run_organize(cfg: &AppConfig, args: OrganizeArgs, json: bool) -> Result<()> {
    require_input(&args.records)?;
    require_input(&args.safe_map)?;
    if let Some(projects) = &args.projects {
        require_input(projects)?;
    }

    let mut records = pipeline::load_records(&args.records)?;
    let safe_map = SafeMap::load(&args.safe_map)?;

    let rules_dir = args
        .rules
        .or_else(|| cfg.organize.rules_dir.as_ref().map(PathBuf::from));
    let tagger = match rules_dir {
        Some(dir) => RuleTagger::new(rules::load_rules_from_dir(&dir)?)?,
        None => RuleTagger::with_defaults()?,
    };
    let tagged = rules::apply_buckets(&mut records, &tagger);
    info!("Tagged {} of {} record(s) with a bucket", tagged, records.len());

    let groups = match &args.projects {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read projects {:?}", path))?;
            let response: ClusterResponse = serde_json::from_str(&raw)
                .with_context(|| format!("Invalid projects file {:?}", path))?;
            groups_from_file(&response, &safe_map)
        }
        None => cluster(cfg, &records, &safe_map).await?,
    };

    let target = args
        .target
        .or_else(|| cfg.organize.target_root.as_ref().map(PathBuf::from))
        .context("no target root: pass --target or set organize.target_root")?;
    let mut organize_cfg = OrganizeConfig::from_settings(&cfg.organize, target);
    if let Some(mode) = args.mode {
        organize_cfg.mode = mode;
    }
    if let Some(conflict) = args.conflict {
        organize_cfg.conflict = conflict;
    }

    let by_path: HashMap<PathBuf, FileRecord> =
        records.into_iter().map(|r| (r.path.clone(), r)).collect();
    let summary = apply::organize(&groups, &by_path, &organize_cfg, &args.journal)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "organize: {} project(s), {} transferred, {} skipped, {} missing, {} error(s); journal {}",
            summary.projects_count,
            summary.files_moved,
            summary.skipped,
            summary.missing,
            summary.errors,
            args.journal.display()
        );
    }
    Ok(())
}

/// Ids found in the safe map resolve to their path; anything else is taken
/// as a path, so hand-written project files work too.
fn groups_from_file(response: &ClusterResponse, safe_map: &SafeMap) -> Vec<ProjectGroup> {
    response
        .projects
        .iter()
        .map(|p| ProjectGroup {
            label: p.project_label.clone(),
            paths: p
                .doc_ids
                .iter()
                .map(|id| {
                    safe_map
                        .resolve(id)
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| PathBuf::from(id))
                })
                .collect(),
        })
        .collect()
}

async fn cluster(
    cfg: &AppConfig,
    records: &[FileRecord],
    safe_map: &SafeMap,
) -> Result<Vec<ProjectGroup>> {
    let registry = ClustererRegistry::with_builtins();
    let primary = registry.clusterer(Some(&cfg.cluster.provider))?;
    let fallback = if cfg.cluster.fallback.is_empty() || cfg.cluster.fallback == cfg.cluster.provider
    {
        None
    } else {
        Some(registry.clusterer(Some(&cfg.cluster.fallback))?)
    };
    let docs = clustering::lean_docs(records);
    let response = clustering::cluster_with_fallback(
        primary.as_ref(),
        fallback.as_deref(),
        &docs,
        cfg.cluster.max_retries,
    )
    .await?;
    info!(
        "Clusterer {} returned {} project(s)",
        cfg.cluster.provider,
        response.projects.len()
    );
    Ok(clustering::resolve_projects(&response, safe_map))
}

fn print_journal(path: &Path, json: bool) -> Result<()> {
    if !path.exists() {
        println!("no journal at {}", path.display());
        return Ok(());
    }
    let contents = journal::read_journal(path)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&contents.records)?);
    } else {
        let mut counts: HashMap<journal::JournalCode, usize> = HashMap::new();
        for record in &contents.records {
            *counts.entry(record.code).or_default() += 1;
            let dst = record
                .destination
                .as_ref()
                .map(|d| d.display().to_string())
                .unwrap_or_default();
            println!(
                "{:<11} {} -> {}",
                record.code.as_str(),
                record.source.display(),
                dst
            );
        }
        let mut codes: Vec<_> = counts.into_iter().collect();
        codes.sort_by_key(|(code, _)| code.as_str());
        let totals: Vec<String> = codes
            .iter()
            .map(|(code, n)| format!("{}={}", code, n))
            .collect();
        println!("totals: {}", totals.join(", "));
    }
    if contents.malformed > 0 {
        warn!("{} malformed line(s) skipped", contents.malformed);
    }
    Ok(())
}
