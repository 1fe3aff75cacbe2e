//! PDF banner: a translucent diagonal stamp composited onto every page
//!
//! One Form XObject is built per distinct page size and drawn after the
//! page's own content, which is wrapped in `q … Q` so its graphics state
//! cannot leak into the stamp.

use std::collections::HashMap;
use std::path::Path;

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

use super::TransformError;

const XOBJECT_NAME: &str = "RjWatermark";
/// Opacity for both fill and stroke
const STAMP_ALPHA: f32 = 0.25;
/// Average Helvetica-Bold glyph width, in ems
const GLYPH_WIDTH: f32 = 0.6;
/// Parent chain depth limit; malformed files can loop
const MAX_TREE_DEPTH: usize = 32;
/// US Letter, used when no MediaBox is found anywhere in the tree
const DEFAULT_MEDIA_BOX: PageBox = PageBox { llx: 0.0, lly: 0.0, urx: 612.0, ury: 792.0 };

#[derive(Debug, Clone, Copy, PartialEq)]
struct PageBox {
    llx: f32,
    lly: f32,
    urx: f32,
    ury: f32,
}

impl PageBox {
    fn width(&self) -> f32 {
        self.urx - self.llx
    }

    fn height(&self) -> f32 {
        self.ury - self.lly
    }

    /// Page size rounded to whole points, used to share stamps between pages
    fn size_key(&self) -> (i64, i64) {
        (self.width().round() as i64, self.height().round() as i64)
    }
}

/// Looks a page attribute up, following `Parent` links for inherited values.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = node.get(key) {
            return Some(value);
        }
        let parent = node.get(b"Parent").and_then(Object::as_reference).ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(object),
        other => other,
    }
}

fn media_box(doc: &Document, page_id: ObjectId) -> Result<PageBox, TransformError> {
    let Some(object) = inherited(doc, page_id, b"MediaBox") else {
        return Ok(DEFAULT_MEDIA_BOX);
    };
    let values = resolve(doc, object)
        .as_array()?
        .iter()
        .map(|v| resolve(doc, v).as_float())
        .collect::<Result<Vec<f32>, _>>()?;

    match values.as_slice() {
        [x0, y0, x1, y1] => Ok(PageBox {
            llx: x0.min(*x1),
            lly: y0.min(*y1),
            urx: x0.max(*x1),
            ury: y0.max(*y1),
        }),
        _ => Err(TransformError::Malformed(format!("MediaBox has {} values", values.len()))),
    }
}

/// Owned copy of a dictionary-valued entry, resolving one level of indirection.
fn owned_dict(doc: &Document, object: Option<&Object>) -> Dictionary {
    object
        .map(|o| resolve(doc, o))
        .and_then(|o| o.as_dict().ok())
        .cloned()
        .unwrap_or_else(Dictionary::new)
}

/// Banner as a PDF literal string body. The standard Helvetica encoding only
/// covers ASCII, so anything else becomes `?`.
fn pdf_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            ' '..='~' => out.push(c),
            _ => out.push('?'),
        }
    }
    if out.is_empty() {
        out.push('?');
    }
    out
}

/// Drawing operators for a stamp centered on a `width` x `height` box.
fn stamp_content(width: f32, height: f32, literal: &str) -> Vec<u8> {
    let glyphs = literal.chars().filter(|c| *c != '\\').count().max(1) as f32;
    let diagonal = (width * width + height * height).sqrt();
    let size = (diagonal * 0.7 / (glyphs * GLYPH_WIDTH)).clamp(12.0, 96.0);
    let half_width = glyphs * GLYPH_WIDTH * size / 2.0;
    let (sin, cos) = std::f32::consts::FRAC_PI_4.sin_cos();

    format!(
        "q\n/RjGs gs\n0.45 0.45 0.45 rg\nBT\n/RjF {size:.2} Tf\n{cos:.4} {sin:.4} {nsin:.4} {cos:.4} {cx:.2} {cy:.2} Tm\n{dx:.2} {dy:.2} Td\n({text}) Tj\nET\nQ\n",
        size = size,
        cos = cos,
        sin = sin,
        nsin = -sin,
        cx = width / 2.0,
        cy = height / 2.0,
        dx = -half_width,
        dy = -size * 0.35,
        text = literal
    )
    .into_bytes()
}

fn add_stamp(doc: &mut Document, (width, height): (i64, i64), literal: &str, font_id: ObjectId) -> ObjectId {
    let resources = dictionary! {
        "Font" => dictionary! { "RjF" => font_id },
        "ExtGState" => dictionary! {
            "RjGs" => dictionary! {
                "Type" => "ExtGState",
                "ca" => Object::Real(STAMP_ALPHA),
                "CA" => Object::Real(STAMP_ALPHA),
            },
        },
    };
    let form = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Form",
        "FormType" => 1,
        "BBox" => vec![0.into(), 0.into(), width.into(), height.into()],
        "Resources" => resources,
    };
    doc.add_object(Stream::new(form, stamp_content(width as f32, height as f32, literal)))
}

/// Current content stream references of a page, in drawing order.
fn content_refs(doc: &Document, page: &Dictionary) -> Vec<Object> {
    match page.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    }
}

fn stamp_page(
    doc: &mut Document,
    page_id: ObjectId,
    stamp_id: ObjectId,
    open_id: ObjectId,
    media: &PageBox,
) -> Result<(), TransformError> {
    let mut resources = owned_dict(doc, inherited(doc, page_id, b"Resources"));
    let mut xobjects = owned_dict(doc, resources.get(b"XObject").ok());

    let mut name = XOBJECT_NAME.to_string();
    let mut n = 1;
    while xobjects.has(name.as_bytes()) {
        n += 1;
        name = format!("{}{}", XOBJECT_NAME, n);
    }
    xobjects.set(name.clone(), Object::Reference(stamp_id));
    resources.set("XObject", xobjects);

    let page = doc.get_dictionary(page_id)?;
    let mut contents = vec![Object::Reference(open_id)];
    contents.extend(content_refs(doc, page));

    let close = format!(
        "\nQ\nq 1 0 0 1 {:.2} {:.2} cm /{} Do Q\n",
        media.llx, media.lly, name
    );
    let close_id = doc.add_object(Stream::new(dictionary! {}, close.into_bytes()));
    contents.push(Object::Reference(close_id));

    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    page.set("Contents", contents);
    page.set("Resources", resources);
    Ok(())
}

/// Stamps `banner` diagonally across every page of the PDF at `path`.
pub fn annotate(path: &Path, banner: &str) -> Result<(), TransformError> {
    let mut doc = Document::load(path)?;
    if doc.trailer.has(b"Encrypt") {
        return Err(TransformError::Unsupported("encrypted PDF".to_string()));
    }

    let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
    if pages.is_empty() {
        return Err(TransformError::Malformed("PDF has no pages".to_string()));
    }

    let literal = pdf_literal(banner);
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let open_id = doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));

    let mut stamps: HashMap<(i64, i64), ObjectId> = HashMap::new();
    for page_id in &pages {
        let media = media_box(&doc, *page_id)?;
        let key = media.size_key();
        let stamp_id = match stamps.get(&key) {
            Some(id) => *id,
            None => {
                let id = add_stamp(&mut doc, key, &literal, font_id);
                stamps.insert(key, id);
                id
            }
        };
        stamp_page(&mut doc, *page_id, stamp_id, open_id, &media)?;
    }

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let tmp = tempfile::NamedTempFile::new_in(dir)?;
    doc.save(tmp.path())?;
    tmp.persist(path).map_err(|e| e.error)?;

    log::debug!(
        "Stamped {} page(s) of {} with {} overlay(s)",
        pages.len(),
        path.display(),
        stamps.len()
    );
    Ok(())
}
