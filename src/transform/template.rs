//! Blank lesson-plan (dars ishlanmasi) Word template

use std::path::{Path, PathBuf};

use super::ooxml::{escape_xml, Package, Part};
use super::TransformError;

/// Teacher, subject and grade parsed from `Name, Subject, Grade`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateRequest {
    pub teacher: String,
    pub subject: String,
    pub grade: String,
}

impl TemplateRequest {
    /// Parses `Anvar Valiyev, Matematika, 5-sinf`. Extra commas go to the grade.
    pub fn parse(input: &str) -> Option<Self> {
        let mut parts = input.splitn(3, ',').map(str::trim);
        let teacher = parts.next()?.to_string();
        let subject = parts.next()?.to_string();
        let grade = parts.next()?.to_string();
        if teacher.is_empty() || subject.is_empty() || grade.is_empty() {
            return None;
        }
        Some(Self { teacher, subject, grade })
    }

    /// `shablon_<teacher>.docx`, reduced to filesystem-safe characters
    pub fn file_name(&self) -> String {
        let safe: Vec<String> = self
            .teacher
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect();
        if safe.is_empty() {
            "shablon.docx".to_string()
        } else {
            format!("shablon_{}.docx", safe.join("_"))
        }
    }
}

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

fn paragraph(text: &str) -> String {
    format!(
        r#"<w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#,
        escape_xml(text)
    )
}

fn table_cell(text: &str, bold: bool) -> String {
    let run_props = if bold { "<w:rPr><w:b/></w:rPr>" } else { "" };
    format!(
        r#"<w:tc><w:tcPr><w:tcW w:w="4500" w:type="dxa"/></w:tcPr><w:p><w:r>{}<w:t xml:space="preserve">{}</w:t></w:r></w:p></w:tc>"#,
        run_props,
        escape_xml(text)
    )
}

/// Lesson stages with an empty content column
const STAGES: [&str; 5] = [
    "Tashkiliy qism",
    "Uy vazifasini tekshirish",
    "Yangi mavzu bayoni",
    "Mustahkamlash",
    "Uyga vazifa",
];

fn document_xml(request: &TemplateRequest) -> String {
    let title = format!(
        r#"<w:p><w:pPr><w:jc w:val="center"/></w:pPr><w:r><w:rPr><w:b/><w:sz w:val="28"/></w:rPr><w:t xml:space="preserve">{} FANIDAN DARS ISHLANMASI</w:t></w:r></w:p>"#,
        escape_xml(&request.subject.to_uppercase())
    );

    let border = r#"w:val="single" w:sz="4" w:space="0" w:color="000000""#;
    let mut table = format!(
        r#"<w:tbl><w:tblPr><w:tblW w:w="9000" w:type="dxa"/><w:tblBorders><w:top {b}/><w:left {b}/><w:bottom {b}/><w:right {b}/><w:insideH {b}/><w:insideV {b}/></w:tblBorders></w:tblPr><w:tblGrid><w:gridCol w:w="4500"/><w:gridCol w:w="4500"/></w:tblGrid>"#,
        b = border
    );
    table.push_str(&format!(
        "<w:tr>{}{}</w:tr>",
        table_cell("Dars bosqichi", true),
        table_cell("Mazmuni", true)
    ));
    for stage in STAGES {
        table.push_str(&format!("<w:tr>{}{}</w:tr>", table_cell(stage, false), table_cell("", false)));
    }
    table.push_str("</w:tbl>");

    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            "\n",
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#,
            "{title}{teacher}{grade}{topic}{table}",
            r#"<w:sectPr><w:pgSz w:w="11906" w:h="16838"/><w:pgMar w:top="1134" w:right="850" w:bottom="1134" w:left="1701" w:header="708" w:footer="708" w:gutter="0"/></w:sectPr>"#,
            "</w:body></w:document>"
        ),
        title = title,
        teacher = paragraph(&format!("O'qituvchi: {}", request.teacher)),
        grade = paragraph(&format!("Sinf: {}", request.grade)),
        topic = paragraph("Mavzu: __________________________"),
        table = table
    )
}

/// Writes a fresh lesson-plan template into `dir` and returns its path.
pub fn create_lesson_template(dir: &Path, request: &TemplateRequest) -> Result<PathBuf, TransformError> {
    let path = dir.join(request.file_name());
    let package = Package::from_parts(vec![
        Part {
            name: "[Content_Types].xml".to_string(),
            data: CONTENT_TYPES.as_bytes().to_vec(),
            is_dir: false,
        },
        Part {
            name: "_rels/.rels".to_string(),
            data: ROOT_RELS.as_bytes().to_vec(),
            is_dir: false,
        },
        Part {
            name: "word/document.xml".to_string(),
            data: document_xml(request).into_bytes(),
            is_dir: false,
        },
    ]);
    package.save(&path)?;
    Ok(path)
}
