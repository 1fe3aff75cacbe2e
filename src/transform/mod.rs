//! File branding: deterministic renaming plus a format-specific banner
//!
//! The annotation strategy is chosen purely by extension:
//!
//! | extension      | strategy                               |
//! |----------------|----------------------------------------|
//! | `xlsx`, `xlsm` | banner row on top of every worksheet   |
//! | `pdf`          | diagonal translucent stamp on each page |
//! | `docx`, `docm` | banner paragraph at the top of the body |
//! | anything else  | rename only                            |

pub mod naming;
mod ooxml;
pub mod pdf;
pub mod spreadsheet;
pub mod template;
pub mod word;

use std::path::{Path, PathBuf};

use thiserror::Error;

pub use naming::rename;

/// Why a single file could not be branded
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("Document part missing: {0}")]
    MissingPart(String),

    #[error("Malformed document: {0}")]
    Malformed(String),

    #[error("Unsupported document: {0}")]
    Unsupported(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transform task failed: {0}")]
    Task(String),
}

/// Format-specific banner strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationKind {
    Spreadsheet,
    Pdf,
    WordDocument,
    None,
}

impl AnnotationKind {
    /// Strategy table, keyed by lowercase extension
    const TABLE: [(&'static str, AnnotationKind); 5] = [
        ("xlsx", AnnotationKind::Spreadsheet),
        ("xlsm", AnnotationKind::Spreadsheet),
        ("pdf", AnnotationKind::Pdf),
        ("docx", AnnotationKind::WordDocument),
        ("docm", AnnotationKind::WordDocument),
    ];

    pub fn for_extension(extension: &str) -> Self {
        let extension = extension.to_lowercase();
        Self::TABLE
            .iter()
            .find(|(ext, _)| *ext == extension)
            .map(|(_, kind)| *kind)
            .unwrap_or(AnnotationKind::None)
    }

    pub fn for_name(file_name: &str) -> Self {
        naming::extension_of(file_name)
            .map(|ext| Self::for_extension(&ext))
            .unwrap_or(AnnotationKind::None)
    }

    /// Applies the banner in place.
    pub fn apply(self, path: &Path, banner: &str) -> Result<(), TransformError> {
        match self {
            AnnotationKind::Spreadsheet => spreadsheet::annotate(path, banner),
            AnnotationKind::Pdf => pdf::annotate(path, banner),
            AnnotationKind::WordDocument => word::annotate(path, banner),
            AnnotationKind::None => Ok(()),
        }
    }
}

/// A branded file, ready to publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformedFile {
    pub path: PathBuf,
    /// File name as posted and cataloged
    pub display_name: String,
    pub annotation: AnnotationKind,
}

/// Banner text from the `watermark_text` setting.
///
/// `{channel}` expands to the channel username; an empty template falls back
/// to `@<channel>`.
pub fn render_banner(template: &str, channel_username: &str) -> String {
    let banner = template.replace("{channel}", channel_username);
    let banner = banner.trim();
    if banner.is_empty() {
        format!("@{}", channel_username)
    } else {
        banner.to_string()
    }
}

/// Renames `path` to its branded name (same directory) and stamps the banner.
///
/// Blocking; call through [`brand_file`] from async code.
pub fn brand_file_blocking(
    path: &Path,
    original_name: &str,
    brand_token: &str,
    banner: &str,
) -> Result<TransformedFile, TransformError> {
    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    let branded = naming::rename(original_name, brand_token);
    let target = naming::unique_target(dir, &branded, path);
    if target != path {
        std::fs::rename(path, &target)?;
    }

    let display_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or(branded);
    let annotation = AnnotationKind::for_name(&display_name);
    annotation.apply(&target, banner)?;

    log::info!("Branded {} -> {} ({:?})", original_name, display_name, annotation);
    Ok(TransformedFile {
        path: target,
        display_name,
        annotation,
    })
}

/// Async wrapper running [`brand_file_blocking`] on the blocking pool.
pub async fn brand_file(
    path: PathBuf,
    original_name: String,
    brand_token: String,
    banner: String,
) -> Result<TransformedFile, TransformError> {
    tokio::task::spawn_blocking(move || brand_file_blocking(&path, &original_name, &brand_token, &banner))
        .await
        .map_err(|e| TransformError::Task(e.to_string()))?
}
