//! Zip archive expansion for batch uploads

use std::fs::File;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use tempfile::TempDir;
use thiserror::Error;
use zip::ZipArchive;

use crate::transform::naming::extension_of;

/// Local file header signature
pub const ZIP_MAGIC: [u8; 4] = *b"PK\x03\x04";

/// Containers recognised but not expanded
const UNSUPPORTED_CONTAINERS: [&str; 7] = ["rar", "7z", "tar", "gz", "tgz", "bz2", "xz"];

/// Zip-based document formats; these are files, not archives
const ZIP_DOCUMENTS: [&str; 8] = ["docx", "docm", "xlsx", "xlsm", "pptx", "odt", "ods", "epub"];

/// OS-generated entries, matched case-insensitively against each path component
const SYSTEM_ENTRIES: [&str; 4] = ["__macosx", "thumbs.db", "desktop.ini", ".ds_store"];

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Unsupported archive format: {0}")]
    Unsupported(String),
}

/// One extracted file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveMember {
    pub path: PathBuf,
    /// File name inside the archive, without folders
    pub original_name: String,
}

/// Extracted archive contents. The directory is removed on drop.
#[derive(Debug)]
pub struct ExpandedArchive {
    temp_dir: TempDir,
    /// Extracted files, in archive order
    pub files: Vec<ArchiveMember>,
    /// Hidden, OS-metadata and unsafe entries that were not extracted
    pub skipped: usize,
}

impl ExpandedArchive {
    pub fn dir(&self) -> &Path {
        self.temp_dir.path()
    }
}

/// Container format recognised by extension but not supported, if any.
pub fn unsupported_container(name: &str) -> Option<String> {
    extension_of(name).filter(|ext| UNSUPPORTED_CONTAINERS.contains(&ext.as_str()))
}

fn has_zip_magic(path: &Path) -> bool {
    let mut magic = [0u8; 4];
    File::open(path)
        .and_then(|mut f| f.read_exact(&mut magic))
        .map(|_| magic == ZIP_MAGIC)
        .unwrap_or(false)
}

/// True for `.zip` uploads, and for zip data whose name is not a zip-based document.
pub fn is_archive(path: &Path, name: &str) -> bool {
    match extension_of(name).as_deref() {
        Some("zip") => true,
        Some(ext) if ZIP_DOCUMENTS.contains(&ext) => false,
        _ => has_zip_magic(path),
    }
}

/// Whether an entry must be left out: hidden or OS metadata anywhere in its path.
fn is_ignored(path: &Path) -> bool {
    path.components().any(|component| match component {
        Component::Normal(part) => {
            let part = part.to_string_lossy();
            part.starts_with('.') || SYSTEM_ENTRIES.contains(&part.to_lowercase().as_str())
        }
        _ => false,
    })
}

/// Extracts every usable file of `archive_path` into a fresh directory under `scratch_parent`.
///
/// Members are flattened into numbered subdirectories, so equal names from
/// different folders do not clash.
pub fn expand(archive_path: &Path, scratch_parent: &Path) -> Result<ExpandedArchive, ArchiveError> {
    let mut archive = ZipArchive::new(File::open(archive_path)?)?;
    let temp_dir = tempfile::Builder::new().prefix("archive-").tempdir_in(scratch_parent)?;

    let mut files = Vec::new();
    let mut skipped = 0;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }

        // Absolute paths and `..` traversal come back as None
        let Some(inner) = entry.enclosed_name() else {
            log::warn!("Skipping unsafe archive entry {:?}", entry.name());
            skipped += 1;
            continue;
        };
        if is_ignored(&inner) {
            log::debug!("Skipping hidden archive entry {}", inner.display());
            skipped += 1;
            continue;
        }
        let Some(original_name) = inner.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            skipped += 1;
            continue;
        };

        let slot = temp_dir.path().join(files.len().to_string());
        std::fs::create_dir_all(&slot)?;
        let dest = slot.join(&original_name);
        let mut out = File::create(&dest)?;
        io::copy(&mut entry, &mut out)?;

        files.push(ArchiveMember {
            path: dest,
            original_name,
        });
    }

    log::info!(
        "Expanded {}: {} file(s), {} skipped",
        archive_path.display(),
        files.len(),
        skipped
    );
    Ok(ExpandedArchive {
        temp_dir,
        files,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let mut writer = ZipWriter::new(File::create(path).unwrap());
        let options = SimpleFileOptions::default();
        for (name, data) in entries {
            if name.ends_with('/') {
                writer.add_directory(*name, options).unwrap();
            } else {
                writer.start_file(*name, options).unwrap();
                writer.write_all(data).unwrap();
            }
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_expand_filters_hidden_and_system_entries() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("batch.zip");
        write_zip(
            &zip_path,
            &[
                ("rejalar/", b""),
                ("rejalar/5-sinf tarix.pdf", b"a"),
                ("rejalar/.hidden.docx", b"b"),
                ("__MACOSX/rejalar/._5-sinf tarix.pdf", b"c"),
                ("Thumbs.db", b"d"),
                ("boshqa/5-sinf tarix.pdf", b"e"),
                ("matematika.xlsx", b"f"),
            ],
        );

        let expanded = expand(&zip_path, dir.path()).unwrap();

        let names: Vec<_> = expanded.files.iter().map(|f| f.original_name.as_str()).collect();
        assert_eq!(names, vec!["5-sinf tarix.pdf", "5-sinf tarix.pdf", "matematika.xlsx"]);
        assert_eq!(expanded.skipped, 3);
        assert_eq!(std::fs::read(&expanded.files[1].path).unwrap(), b"e");
    }

    #[test]
    fn test_temp_dir_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("batch.zip");
        write_zip(&zip_path, &[("a.pdf", b"a")]);

        let expanded = expand(&zip_path, dir.path()).unwrap();
        let extracted = expanded.dir().to_path_buf();
        assert!(extracted.exists());
        drop(expanded);
        assert!(!extracted.exists());
    }

    #[test]
    fn test_corrupt_archive_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("broken.zip");
        std::fs::write(&zip_path, b"PK\x03\x04 truncated").unwrap();

        assert!(matches!(expand(&zip_path, dir.path()), Err(ArchiveError::Zip(_))));
    }

    #[test]
    fn test_archive_detection() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("upload");
        write_zip(&zip_path, &[("a.pdf", b"a")]);
        let text_path = dir.path().join("notes");
        std::fs::write(&text_path, b"hello").unwrap();

        assert!(is_archive(&zip_path, "Rejalar.ZIP"));
        assert!(is_archive(&zip_path, "rejalar"));
        assert!(!is_archive(&zip_path, "jadval.xlsx"));
        assert!(!is_archive(&text_path, "notes"));
        assert_eq!(unsupported_container("rejalar.RAR").as_deref(), Some("rar"));
        assert_eq!(unsupported_container("rejalar.zip"), None);
    }
}
