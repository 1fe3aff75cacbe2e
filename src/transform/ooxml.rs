//! In-memory OOXML package (xlsx, docx): every zip entry read up front,
//! edited as text, then written back with deflate.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::TransformError;

pub(crate) struct Part {
    pub name: String,
    pub data: Vec<u8>,
    pub is_dir: bool,
}

pub(crate) struct Package {
    parts: Vec<Part>,
}

impl Package {
    pub fn open(path: &Path) -> Result<Self, TransformError> {
        let mut archive = ZipArchive::new(File::open(path)?)?;
        let mut parts = Vec::with_capacity(archive.len());

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            let mut data = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut data)?;
            parts.push(Part {
                name: entry.name().to_string(),
                data,
                is_dir: entry.is_dir(),
            });
        }

        Ok(Self { parts })
    }

    pub fn from_parts(parts: Vec<Part>) -> Self {
        Self { parts }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter(|p| !p.is_dir).map(|p| p.name.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.parts.iter().any(|p| p.name == name)
    }

    pub fn read_xml(&self, name: &str) -> Result<String, TransformError> {
        let part = self
            .parts
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| TransformError::MissingPart(name.to_string()))?;
        String::from_utf8(part.data.clone()).map_err(|_| TransformError::Malformed(format!("{} is not UTF-8", name)))
    }

    pub fn write_xml(&mut self, name: &str, xml: String) {
        match self.parts.iter_mut().find(|p| p.name == name) {
            Some(part) => part.data = xml.into_bytes(),
            None => self.parts.push(Part {
                name: name.to_string(),
                data: xml.into_bytes(),
                is_dir: false,
            }),
        }
    }

    /// Writes the package over `path`, atomically.
    pub fn save(&self, path: &Path) -> Result<(), TransformError> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let tmp = tempfile::NamedTempFile::new_in(dir)?;

        let mut writer = ZipWriter::new(tmp.reopen()?);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for part in &self.parts {
            if part.is_dir {
                writer.add_directory(part.name.as_str(), options)?;
            } else {
                writer.start_file(part.name.as_str(), options)?;
                writer.write_all(&part.data)?;
            }
        }
        writer.finish()?;

        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}

/// Escapes text for XML element content and attribute values.
pub(crate) fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Reverses the predefined XML entities.
pub(crate) fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_then_open_keeps_parts_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.docx");
        let package = Package::from_parts(vec![
            Part { name: "[Content_Types].xml".into(), data: b"<Types/>".to_vec(), is_dir: false },
            Part { name: "word/".into(), data: Vec::new(), is_dir: true },
            Part { name: "word/document.xml".into(), data: b"<w:document/>".to_vec(), is_dir: false },
        ]);
        package.save(&path).unwrap();

        let reopened = Package::open(&path).unwrap();
        let names: Vec<_> = reopened.names().collect();
        assert_eq!(names, vec!["[Content_Types].xml", "word/document.xml"]);
        assert_eq!(reopened.read_xml("word/document.xml").unwrap(), "<w:document/>");
        assert!(matches!(reopened.read_xml("word/styles.xml"), Err(TransformError::MissingPart(_))));
    }

    #[test]
    fn test_escape_round_trip() {
        let raw = r#"A & "B" <C>"#;
        assert_eq!(escape_xml(raw), "A &amp; &quot;B&quot; &lt;C&gt;");
        assert_eq!(unescape_xml(&escape_xml(raw)), raw);
    }
}
