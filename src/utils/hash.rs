use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

pub fn calculate_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    hex::encode(result)
}

/// Storage key for a new original: hash of upload time and client file name,
/// followed by the detected image extension.
///
/// No existence check is made; two uploads with the same name in the same
/// microsecond map to the same key.
pub fn storage_key(uploaded_at: &DateTime<Utc>, original_name: &str, extension: &str) -> String {
    let seed = format!("{}{}", uploaded_at.timestamp_micros(), original_name);
    format!("{}.{}", calculate_hash(seed.as_bytes()), extension.to_lowercase())
}

/// Name of the derivative stored next to `source_key`: the suffix goes
/// between the base name and the original extension.
pub fn derivative_name(source_key: &str, suffix: &str) -> String {
    match source_key.rsplit_once('.') {
        Some((base, ext)) if !base.is_empty() && !ext.is_empty() && !ext.contains('/') => {
            format!("{}{}.{}", base, suffix, ext)
        }
        _ => format!("{}{}", source_key, suffix),
    }
}
