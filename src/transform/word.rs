//! Word documents: a centered bold banner paragraph at the top of the body

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use super::ooxml::{escape_xml, Package};
use super::TransformError;

const DOCUMENT_PART: &str = "word/document.xml";

static BODY_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"<w:body(?:\s[^>]*)?>").expect("body regex"));

pub(crate) fn banner_paragraph(banner: &str) -> String {
    format!(
        concat!(
            r#"<w:p><w:pPr><w:jc w:val="center"/></w:pPr>"#,
            r#"<w:r><w:rPr><w:b/><w:color w:val="1F4E79"/><w:sz w:val="28"/></w:rPr>"#,
            r#"<w:t xml:space="preserve">{}</w:t></w:r></w:p>"#
        ),
        escape_xml(banner)
    )
}

/// Inserts the banner paragraph right after `<w:body>`.
pub(crate) fn insert_banner(document_xml: &str, banner: &str) -> Result<String, TransformError> {
    let open = BODY_OPEN
        .find(document_xml)
        .ok_or_else(|| TransformError::Malformed(format!("{} has no w:body", DOCUMENT_PART)))?;

    let paragraph = banner_paragraph(banner);
    let mut out = String::with_capacity(document_xml.len() + paragraph.len());
    out.push_str(&document_xml[..open.end()]);
    out.push_str(&paragraph);
    out.push_str(&document_xml[open.end()..]);
    Ok(out)
}

pub fn annotate(path: &Path, banner: &str) -> Result<(), TransformError> {
    let mut package = Package::open(path)?;
    let document = package.read_xml(DOCUMENT_PART)?;
    package.write_xml(DOCUMENT_PART, insert_banner(&document, banner)?);
    package.save(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_banner_becomes_first_body_element() {
        let xml = r#"<w:document xmlns:w="ns"><w:body><w:p><w:r><w:t>Reja</w:t></w:r></w:p></w:body></w:document>"#;

        let out = insert_banner(xml, "@kanal & co").unwrap();

        let body = out.split("<w:body>").nth(1).unwrap();
        assert!(body.starts_with("<w:p><w:pPr><w:jc w:val=\"center\"/>"));
        assert!(body.contains("@kanal &amp; co</w:t>"));
        assert!(body.contains("<w:t>Reja</w:t>"));
    }

    #[test]
    fn test_missing_body_is_malformed() {
        assert!(matches!(
            insert_banner("<w:document/>", "x"),
            Err(TransformError::Malformed(_))
        ));
    }
}
