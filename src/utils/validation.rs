use anyhow::{Result, anyhow};
use std::path::Path;

/// Longest original name kept for key derivation
const MAX_NAME_LEN: usize = 255;

/// Fallback for uploads that arrive without a usable name
pub const UNNAMED_UPLOAD: &str = "unnamed";

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validates upload size against the configured limit. Empty uploads pass;
/// submission rejects them as unreadable images.
pub fn validate_upload_size(size: usize, max_size: usize) -> Result<()> {
    if size > max_size {
        return Err(anyhow!(ValidationError {
            code: "FILE_TOO_LARGE",
            message: format!(
                "File size {} bytes exceeds maximum allowed {} bytes",
                size, max_size
            ),
        }));
    }
    Ok(())
}

/// Reduces a client-supplied file name to its last path component with
/// control and reserved characters replaced.
pub fn sanitize_original_name(filename: &str) -> String {
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    if filename.contains("..") {
        tracing::warn!("Path traversal attempt in upload name: {}", filename);
    }

    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | ';' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let sanitized = if sanitized.len() > MAX_NAME_LEN {
        let mut end = MAX_NAME_LEN;
        while !sanitized.is_char_boundary(end) {
            end -= 1;
        }
        sanitized[..end].to_string()
    } else {
        sanitized
    };

    if sanitized.trim().is_empty() {
        UNNAMED_UPLOAD.to_string()
    } else {
        sanitized
    }
}

/// Content type from magic bytes, if recognised
pub fn sniff_content_type(data: &[u8]) -> Option<&'static str> {
    infer::get(data).map(|kind| kind.mime_type())
}
