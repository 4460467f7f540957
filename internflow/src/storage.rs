//! Uploaded documents: validation and local-disk storage under the media root.

use std::path::{Path, PathBuf};

use uuid::Uuid;

/// Upload ceiling for every stored document.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

const DOCUMENT_TYPES: &[(&str, &str)] = &[
    (".pdf", "application/pdf"),
    (".doc", "application/msword"),
    (
        ".docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
];

/// Extensions a browser would render or execute; stored files lose them.
const ACTIVE_CONTENT: &[&str] = &[
    ".htm", ".html", ".shtml", ".xhtml", ".xht", ".svg", ".svgz", ".js", ".mjs", ".xml",
    ".xsl",
];

pub const CAHIERS_DIR: &str = "cahiers_de_charges";
pub const REPORTS_DIR: &str = "reports";

/// A file received in a multipart form.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("File size must be less than 10MB.")]
    TooLarge,
    #[error("Only PDF, DOC, and DOCX files are allowed.")]
    UnsupportedExtension,
    #[error("Invalid file type. Only PDF, DOC, and DOCX files are allowed.")]
    UnsupportedMimeType,
}

/// Size check shared by every upload.
pub fn check_size(upload: &Upload) -> Result<(), UploadError> {
    if upload.data.len() > MAX_UPLOAD_BYTES {
        return Err(UploadError::TooLarge);
    }
    Ok(())
}

/// Validate a "cahier de charges": size, extension, and, when the client sent
/// one, a MIME type from the allowed set.
pub fn validate_document(upload: &Upload) -> Result<(), UploadError> {
    check_size(upload)?;

    let ext = extension(&upload.file_name);
    if !DOCUMENT_TYPES.iter().any(|(e, _)| *e == ext) {
        return Err(UploadError::UnsupportedExtension);
    }

    if let Some(mime) = upload.content_type.as_deref()
        && !DOCUMENT_TYPES.iter().any(|(_, m)| *m == mime)
    {
        return Err(UploadError::UnsupportedMimeType);
    }
    Ok(())
}

/// Lower-cased extension including the leading dot, or "" when absent.
fn extension(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default()
}

#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write the upload under `subdir` with a collision-free name and return
    /// its path relative to the media root.
    pub async fn save(&self, subdir: &str, upload: &Upload) -> std::io::Result<String> {
        let dir = self.root.join(subdir);
        tokio::fs::create_dir_all(&dir).await?;

        let name = unique_name(&upload.file_name);
        tokio::fs::write(dir.join(&name), &upload.data).await?;

        let relative = format!("{subdir}/{name}");
        tracing::debug!(path = %relative, bytes = upload.data.len(), "stored upload");
        Ok(relative)
    }

    /// Delete a file written by `save` whose database row never landed.
    pub async fn discard(&self, relative: &str) {
        if let Err(e) = tokio::fs::remove_file(self.root.join(relative)).await {
            tracing::warn!(path = %relative, error = %e, "could not discard stored upload");
        }
    }
}

fn unique_name(original: &str) -> String {
    let path = Path::new(original);
    let stem: String = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("file")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .take(80)
        .collect();
    let stem = if stem.is_empty() { "file".to_string() } else { stem };
    let suffix = &Uuid::new_v4().simple().to_string()[..8];
    let ext = extension(original);
    if ACTIVE_CONTENT.contains(&ext.as_str()) {
        format!("{stem}_{suffix}")
    } else {
        format!("{stem}_{suffix}{ext}")
    }
}
