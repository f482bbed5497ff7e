//! Bucket rules: assign a coarse category (src, docs, tests, ...) to scanned
//! records before they are organized.

use crate::models::FileRecord;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    PathPrefix { prefix: String },
    Glob { pattern: String },
    Mime { mime: String },
    Extension { ext: String },
    /// Regex over `"{name} {ext} {hint}"`, lowercased.
    Pattern { pattern: String },
    And { all: Vec<Condition> },
    Or { any: Vec<Condition> },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Rule {
    pub name: String,
    pub priority: i32,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
    pub condition: Condition,
    pub bucket: String,
}

fn enabled_default() -> bool {
    true
}

#[derive(Debug, Clone)]
pub struct RuleContext<'a> {
    pub path: &'a Path,
    pub name: &'a str,
    pub ext: &'a str,
    pub mime: Option<String>,
    pub hint: &'a str,
}

impl<'a> RuleContext<'a> {
    pub fn for_record(record: &'a FileRecord) -> Self {
        let mime = mime_guess::from_path(&record.path)
            .first()
            .map(|m| m.essence_str().to_string());
        Self {
            path: &record.path,
            name: &record.name,
            ext: &record.ext,
            mime,
            hint: record.hint.as_deref().unwrap_or(""),
        }
    }
}

fn normalize_ext(ext: &str) -> String {
    ext.trim_start_matches('.').to_lowercase()
}

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("rule {rule:?} has an invalid glob: {source}")]
    Glob {
        rule: String,
        #[source]
        source: globset::Error,
    },
    #[error("rule {rule:?} has an invalid pattern: {source}")]
    Pattern {
        rule: String,
        #[source]
        source: regex::Error,
    },
}

/// A condition with its globs and regexes compiled.
#[derive(Debug, Clone)]
enum Matcher {
    PathPrefix(String),
    Glob(globset::GlobMatcher),
    Mime(String),
    Extension(String),
    Pattern(regex::Regex),
    All(Vec<Matcher>),
    Any(Vec<Matcher>),
}

impl Matcher {
    fn compile(rule: &str, condition: &Condition) -> Result<Self, RuleError> {
        Ok(match condition {
            Condition::PathPrefix { prefix } => Matcher::PathPrefix(prefix.clone()),
            Condition::Glob { pattern } => Matcher::Glob(
                globset::Glob::new(pattern)
                    .map_err(|source| RuleError::Glob {
                        rule: rule.to_string(),
                        source,
                    })?
                    .compile_matcher(),
            ),
            Condition::Mime { mime } => Matcher::Mime(mime.clone()),
            Condition::Extension { ext } => Matcher::Extension(normalize_ext(ext)),
            Condition::Pattern { pattern } => {
                Matcher::Pattern(regex::Regex::new(pattern).map_err(|source| {
                    RuleError::Pattern {
                        rule: rule.to_string(),
                        source,
                    }
                })?)
            }
            Condition::And { all } => Matcher::All(
                all.iter()
                    .map(|c| Matcher::compile(rule, c))
                    .collect::<Result<_, _>>()?,
            ),
            Condition::Or { any } => Matcher::Any(
                any.iter()
                    .map(|c| Matcher::compile(rule, c))
                    .collect::<Result<_, _>>()?,
            ),
        })
    }

    fn is_match(&self, ctx: &RuleContext<'_>) -> bool {
        match self {
            Matcher::PathPrefix(prefix) => ctx
                .path
                .to_str()
                .map(|p| p.starts_with(prefix.as_str()))
                .unwrap_or(false),
            Matcher::Glob(glob) => glob.is_match(ctx.path),
            Matcher::Mime(mime) => ctx.mime.as_deref() == Some(mime.as_str()),
            Matcher::Extension(ext) => normalize_ext(ctx.ext) == *ext,
            Matcher::Pattern(re) => {
                let text = format!("{} {} {}", ctx.name, ctx.ext, ctx.hint).to_lowercase();
                re.is_match(&text)
            }
            Matcher::All(all) => all.iter().all(|m| m.is_match(ctx)),
            Matcher::Any(any) => any.iter().any(|m| m.is_match(ctx)),
        }
    }
}

/// Pure `FileRecord → bucket` function consumed by the organizer.
pub trait BucketTagger {
    fn tag(&self, record: &FileRecord) -> Option<String>;
}

/// Enabled rules, compiled once and kept in priority order.
#[derive(Debug, Clone)]
pub struct RuleTagger {
    rules: Vec<(Rule, Matcher)>,
}

impl RuleTagger {
    pub fn new(rules: Vec<Rule>) -> Result<Self, RuleError> {
        let mut compiled = rules
            .into_iter()
            .filter(|r| r.enabled)
            .map(|r| Matcher::compile(&r.name, &r.condition).map(|m| (r, m)))
            .collect::<Result<Vec<_>, _>>()?;
        compiled.sort_by_key(|(r, _)| r.priority);
        Ok(Self { rules: compiled })
    }

    pub fn with_defaults() -> Result<Self, RuleError> {
        Self::new(default_rules())
    }

    /// Matching rules, highest priority (lowest number) first.
    pub fn evaluate<'a>(&'a self, ctx: &'a RuleContext<'_>) -> impl Iterator<Item = &'a Rule> + 'a {
        self.rules
            .iter()
            .filter(move |(_, m)| m.is_match(ctx))
            .map(|(r, _)| r)
    }
}

impl BucketTagger for RuleTagger {
    fn tag(&self, record: &FileRecord) -> Option<String> {
        let ctx = RuleContext::for_record(record);
        let bucket = self.evaluate(&ctx).next().map(|rule| rule.bucket.clone());
        bucket
    }
}

/// Fills in the bucket of every record that has none and no error.
pub fn apply_buckets(records: &mut [FileRecord], tagger: &dyn BucketTagger) -> usize {
    let mut tagged = 0;
    for record in records.iter_mut() {
        if record.bucket.is_some() || record.error.is_some() {
            continue;
        }
        if let Some(bucket) = tagger.tag(record) {
            record.bucket = Some(bucket);
            tagged += 1;
        }
    }
    tagged
}

fn ext_rule(name: &str, priority: i32, bucket: &str, exts: &[&str]) -> Rule {
    Rule {
        name: name.to_string(),
        priority,
        enabled: true,
        condition: Condition::Or {
            any: exts
                .iter()
                .map(|e| Condition::Extension { ext: e.to_string() })
                .collect(),
        },
        bucket: bucket.to_string(),
    }
}

pub fn default_rules() -> Vec<Rule> {
    vec![
        Rule {
            name: "tests".to_string(),
            priority: 0,
            enabled: true,
            condition: Condition::Or {
                any: vec![
                    Condition::Pattern {
                        pattern: r"^(test_|tests?\b)|_test\.|\.(test|spec)\.".to_string(),
                    },
                    Condition::Glob {
                        pattern: "**/tests/**".to_string(),
                    },
                ],
            },
            bucket: "tests".to_string(),
        },
        ext_rule(
            "source",
            10,
            "src",
            &[
                "py", "rs", "ts", "tsx", "js", "jsx", "java", "go", "c", "h", "cpp", "hpp", "cs",
                "rb", "sh", "ps1", "sql",
            ],
        ),
        ext_rule(
            "documents",
            20,
            "docs",
            &["md", "txt", "rst", "pdf", "doc", "docx", "ppt", "pptx", "html"],
        ),
        ext_rule(
            "data",
            30,
            "data",
            &[
                "csv", "json", "jsonl", "yaml", "yml", "toml", "xml", "xls", "xlsx", "parquet",
                "db", "sqlite",
            ],
        ),
        ext_rule(
            "images",
            40,
            "images",
            &["png", "jpg", "jpeg", "gif", "bmp", "svg", "webp", "tif", "tiff"],
        ),
    ]
}

pub fn load_rules_from_dir(dir: &Path) -> anyhow::Result<Vec<Rule>> {
    let mut rules = Vec::new();
    if !dir.exists() {
        return Ok(rules);
    }
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_file() && path.extension().and_then(|e| e.to_str()) == Some("toml")
        {
            paths.push(path);
        }
    }
    paths.sort();
    for path in paths {
        let content = fs::read_to_string(&path)?;
        let rule: Rule = toml::from_str(&content)
            .with_context(|| format!("Invalid rule file {:?}", path))?;
        Matcher::compile(&rule.name, &rule.condition)
            .with_context(|| format!("Invalid rule file {:?}", path))?;
        rules.push(rule);
    }
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn record(path: &str) -> FileRecord {
        let path = PathBuf::from(path);
        FileRecord {
            safe_id: crate::hashing::safe_id(&path),
            name: path.file_name().unwrap().to_string_lossy().into_owned(),
            ext: path
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
                .unwrap_or_default(),
            path,
            size: 1,
            mtime: 0,
            hint: None,
            bucket: None,
            error: None,
        }
    }

    #[test]
    fn default_rules_pick_expected_buckets() {
        let tagger = RuleTagger::with_defaults().unwrap();
        assert_eq!(tagger.tag(&record("/w/app/main.py")).as_deref(), Some("src"));
        assert_eq!(tagger.tag(&record("/w/app/test_main.py")).as_deref(), Some("tests"));
        assert_eq!(tagger.tag(&record("/w/app/README.md")).as_deref(), Some("docs"));
        assert_eq!(tagger.tag(&record("/w/app/rows.CSV")).as_deref(), Some("data"));
        assert_eq!(tagger.tag(&record("/w/app/logo.png")).as_deref(), Some("images"));
        assert_eq!(tagger.tag(&record("/w/app/blob.bin")), None);
    }

    #[test]
    fn apply_buckets_keeps_existing_labels() {
        let tagger = RuleTagger::with_defaults().unwrap();
        let mut records = vec![record("/w/a.py"), record("/w/b.md")];
        records[1].bucket = Some("custom".to_string());
        assert_eq!(apply_buckets(&mut records, &tagger), 1);
        assert_eq!(records[0].bucket.as_deref(), Some("src"));
        assert_eq!(records[1].bucket.as_deref(), Some("custom"));
    }

    #[test]
    fn rules_load_from_toml_files() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(
            temp.path().join("notebooks.toml"),
            r#"
            name = "notebooks"
            priority = 1
            bucket = "notebooks"

            [condition]
            type = "extension"
            ext = "ipynb"
            "#,
        )
        .unwrap();
        fs::write(temp.path().join("ignored.txt"), "not a rule").unwrap();
        let rules = load_rules_from_dir(temp.path()).unwrap();
        assert_eq!(rules.len(), 1);
        let tagger = RuleTagger::new(rules).unwrap();
        assert_eq!(
            tagger.tag(&record("/w/analysis.ipynb")).as_deref(),
            Some("notebooks")
        );
    }

    #[test]
    fn invalid_patterns_are_reported() {
        let bad_regex = Rule {
            name: "broken".to_string(),
            priority: 0,
            enabled: true,
            condition: Condition::Pattern {
                pattern: "(unclosed".to_string(),
            },
            bucket: "x".to_string(),
        };
        assert!(matches!(
            RuleTagger::new(vec![bad_regex]),
            Err(RuleError::Pattern { .. })
        ));

        let temp = tempfile::tempdir().unwrap();
        fs::write(
            temp.path().join("bad.toml"),
            r#"
            name = "bad_glob"
            priority = 1
            bucket = "x"

            [condition]
            type = "glob"
            pattern = "src/[a"
            "#,
        )
        .unwrap();
        let err = load_rules_from_dir(temp.path()).unwrap_err();
        assert!(format!("{err:#}").contains("bad_glob"), "{err:#}");
    }

    #[test]
    fn disabled_rules_never_match_and_priority_orders_hits() {
        let rule = |name: &str, priority, enabled| Rule {
            name: name.to_string(),
            priority,
            enabled,
            condition: Condition::Extension {
                ext: ".py".to_string(),
            },
            bucket: name.to_string(),
        };
        let tagger = RuleTagger::new(vec![
            rule("late", 5, true),
            rule("off", 0, false),
            rule("early", 1, true),
        ])
        .unwrap();
        let rec = record("/w/x.py");
        let ctx = RuleContext::for_record(&rec);
        let names: Vec<&str> = tagger.evaluate(&ctx).map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["early", "late"]);
    }
}
