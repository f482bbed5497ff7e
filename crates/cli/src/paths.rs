use std::path::{Component, Path, PathBuf};

pub const DEFAULT_BUCKET: &str = "misc";

/// Turns a project or bucket label into a single safe path component.
/// Separators become `_`; empty and dot-only labels become `misc`.
pub fn sanitize_label(label: &str) -> String {
    let cleaned: String = label
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c => c,
        })
        .collect();
    let mut components = Path::new(&cleaned).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => cleaned,
        _ => DEFAULT_BUCKET.to_string(),
    }
}

fn split_name(name: &str) -> (&str, &str) {
    let path = Path::new(name);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(name);
    let ext_len = name.len() - stem.len();
    (stem, &name[stem.len()..stem.len() + ext_len])
}

/// `stem__hash.ext`, then `stem__hash_1.ext`, `stem__hash_2.ext`, ... until
/// a free name is found.
pub fn versioned_name(dir: &Path, name: &str, suffix: &str) -> PathBuf {
    let (stem, ext) = split_name(name);
    let mut candidate = dir.join(format!("{stem}__{suffix}{ext}"));
    let mut counter = 1;
    while candidate.exists() {
        candidate = dir.join(format!("{stem}__{suffix}_{counter}{ext}"));
        counter += 1;
    }
    candidate
}
