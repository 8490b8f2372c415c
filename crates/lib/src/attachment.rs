//! File attachments: reading, encoding, and rendering into message content.
//!
//! Image files are base64-encoded into data URIs at staging time; everything
//! else is read as UTF-8 text. Only text and image placeholders go on the
//! wire; encoded image payloads stay on the client.

use base64::Engine;
use std::path::{Path, PathBuf};

/// A file staged for the next submission. Transient: dropped once folded
/// into a message or removed by the user, never persisted.
#[derive(Debug, Clone)]
pub struct AttachedFile {
    /// File name without directory components.
    pub name: String,
    /// MIME type guessed from the file extension ("application/octet-stream" when unknown).
    pub media_type: String,
    /// Size in bytes.
    pub size: u64,
    /// Verbatim text, or a `data:<mime>;base64,<payload>` URI for images.
    pub content: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AttachmentError {
    #[error("reading {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl AttachedFile {
    /// True when the guessed MIME type is an image (content is a data URI).
    pub fn is_image(&self) -> bool {
        self.media_type.starts_with("image/")
    }

    /// Read one file from disk. Images are read as bytes and encoded into a
    /// data URI; other files must be valid UTF-8 text.
    pub async fn read(path: impl AsRef<Path>) -> Result<Self, AttachmentError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let media_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        if media_type.starts_with("image/") {
            let bytes = tokio::fs::read(path).await.map_err(|source| {
                AttachmentError::Read {
                    path: path.to_path_buf(),
                    source,
                }
            })?;
            let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
            Ok(Self {
                name,
                size: bytes.len() as u64,
                content: format!("data:{};base64,{}", media_type, encoded),
                media_type,
            })
        } else {
            let content = tokio::fs::read_to_string(path).await.map_err(|source| {
                AttachmentError::Read {
                    path: path.to_path_buf(),
                    source,
                }
            })?;
            Ok(Self {
                name,
                media_type,
                size: content.len() as u64,
                content,
            })
        }
    }
}

/// Read several files concurrently. Successful reads are returned in input
/// order; failures are reported per path and never block the successes.
pub async fn read_files(
    paths: &[PathBuf],
) -> (Vec<AttachedFile>, Vec<(PathBuf, AttachmentError)>) {
    let reads = paths.iter().map(AttachedFile::read);
    let results = futures_util::future::join_all(reads).await;

    let mut files = Vec::new();
    let mut failures = Vec::new();
    for (path, result) in paths.iter().zip(results) {
        match result {
            Ok(file) => files.push(file),
            Err(e) => failures.push((path.clone(), e)),
        }
    }
    (files, failures)
}

/// Build the outgoing message content: trimmed typed text first, then one
/// labeled block per attachment in staging order, all joined by blank lines.
/// Image attachments render as a placeholder; their payload is not sent.
pub fn render_content(text: &str, files: &[AttachedFile]) -> String {
    let text = text.trim();
    if files.is_empty() {
        return text.to_string();
    }

    let blocks: Vec<String> = files
        .iter()
        .map(|file| {
            if file.is_image() {
                format!("[Attached image: {}]", file.name)
            } else {
                format!("[Attached file: {}]\n```\n{}\n```", file.name, file.content)
            }
        })
        .collect();
    let blocks = blocks.join("\n\n");

    if text.is_empty() {
        blocks
    } else {
        format!("{}\n\n{}", text, blocks)
    }
}

/// Human-readable size for attachment rows ("512 B", "1.5 KB", "2.0 MB").
pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
