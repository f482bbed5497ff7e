use std::fs;
use std::io::Read;
use std::path::Path;

const TEXT_EXTENSIONS: &[&str] = &[
    "md", "txt", "py", "json", "yml", "yaml", "cfg", "ini", "toml", "csv", "rs", "ts", "js",
    "java",
];

/// True when the extension is a known source/text type or guesses to a
/// `text/*` MIME type.
pub fn is_textual(path: &Path) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    let ext = ext.to_lowercase();
    if TEXT_EXTENSIONS.contains(&ext.as_str()) {
        return true;
    }
    mime_guess::from_ext(&ext)
        .first()
        .map(|m| m.type_() == mime_guess::mime::TEXT)
        .unwrap_or(false)
}

/// Reads at most `limit` bytes and decodes them as UTF-8, dropping invalid
/// sequences (including a code point cut off at the limit).
pub fn read_text_hint(path: &Path, limit: usize) -> std::io::Result<String> {
    let file = fs::File::open(path)?;
    let mut buf = Vec::with_capacity(limit.min(64 * 1024));
    file.take(limit as u64).read_to_end(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf)
        .chars()
        .filter(|c| *c != char::REPLACEMENT_CHARACTER)
        .collect())
}
