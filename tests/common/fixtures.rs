//! Test fixtures: office documents built in memory and a pipeline environment
//!
//! `TestEnvironment` wires a migrated database in a temp directory, a
//! [`RecordingSink`] and an `AppContext` with no delay between posts.

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use lopdf::{dictionary, Document, Object, Stream};
use rejabot::{create_pool, AppContext, ChannelBrand, ChannelSink, DbPool};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use super::RecordingSink;

pub const CHANNEL_USERNAME: &str = "ish_reja_uz";
pub const CHANNEL_ID: &str = "-1001234567890";

/// Zip archive with the given entries, in order.
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, data) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Single-sheet workbook whose A1 holds `a1` and B1 a formula on it.
pub fn minimal_xlsx(a1: &str) -> Vec<u8> {
    let sheet = format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
            r#"<dimension ref="A1:B1"/>"#,
            r#"<sheetData><row r="1"><c r="A1" t="inlineStr"><is><t>{}</t></is></c><c r="B1"><f>LEN(A1)</f></c></row></sheetData>"#,
            r#"</worksheet>"#
        ),
        a1
    );
    zip_bytes(&[
        (
            "[Content_Types].xml",
            br#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#,
        ),
        (
            "xl/workbook.xml",
            br#"<?xml version="1.0" encoding="UTF-8"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheets><sheet name="Reja" sheetId="1"/></sheets></workbook>"#,
        ),
        ("xl/worksheets/sheet1.xml", sheet.as_bytes()),
    ])
}

/// Document with one paragraph of `text`.
pub fn minimal_docx(text: &str) -> Vec<u8> {
    let document = format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
            r#"<w:body><w:p><w:r><w:t>{}</w:t></w:r></w:p></w:body></w:document>"#
        ),
        text
    );
    zip_bytes(&[
        (
            "[Content_Types].xml",
            br#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#,
        ),
        ("word/document.xml", document.as_bytes()),
    ])
}

/// One-page PDF with a line of text.
pub fn minimal_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        b"BT /F1 18 Tf 72 720 Td (Dars rejasi) Tj ET".to_vec(),
    ));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
        "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(595), Object::Integer(842)],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

/// Everything a pipeline test needs
pub struct TestEnvironment {
    pub ctx: Arc<AppContext>,
    pub sink: Arc<RecordingSink>,
    pub db_pool: Arc<DbPool>,
    /// Holds the database and the working directory
    _dir: TempDir,
}

impl TestEnvironment {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("rejabot.db");
        let db_pool = Arc::new(create_pool(db_path.to_str().unwrap()).unwrap());
        let sink = Arc::new(RecordingSink::new());
        let dyn_sink: Arc<dyn ChannelSink> = sink.clone();

        let ctx = AppContext::new(
            Arc::clone(&db_pool),
            dyn_sink,
            ChannelBrand::new(CHANNEL_USERNAME, CHANNEL_ID),
            dir.path().join("downloads"),
        )
        .with_owner(1)
        .with_publish_delay(Duration::ZERO);
        ctx.prepare_dirs().unwrap();

        Self {
            ctx: Arc::new(ctx),
            sink,
            db_pool,
            _dir: dir,
        }
    }

    /// Writes an upload into a fresh scratch directory, as the bot does after download.
    ///
    /// Keep the returned guard alive until the pipeline finishes.
    pub fn stage(&self, file_name: &str, bytes: &[u8]) -> (TempDir, PathBuf) {
        let scratch = self.ctx.new_scratch_dir().unwrap();
        let path = scratch.path().join(file_name);
        std::fs::write(&path, bytes).unwrap();
        (scratch, path)
    }

    pub fn conn(&self) -> rejabot::DbConnection {
        rejabot::get_connection(&self.db_pool).unwrap()
    }
}

impl Default for TestEnvironment {
    fn default() -> Self {
        Self::new()
    }
}
