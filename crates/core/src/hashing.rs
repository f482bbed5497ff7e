use std::fs;
use std::io::Read;
use std::path::Path;

/// Length of the content hash used in versioned file names.
pub const VERSION_HASH_LEN: usize = 7;

/// Stable identifier for a path. Hashes the path string, never the content.
pub fn safe_id(path: &Path) -> String {
    blake3::hash(path.to_string_lossy().as_bytes())
        .to_hex()
        .to_string()
}

pub fn full_hash(path: &Path) -> std::io::Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// First seven hex digits of the content hash.
pub fn content_hash_prefix(path: &Path) -> std::io::Result<String> {
    let mut hex = full_hash(path)?;
    hex.truncate(VERSION_HASH_LEN);
    Ok(hex)
}
