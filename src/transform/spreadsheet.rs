//! Spreadsheet banner: a new first row on every worksheet
//!
//! Inserting a row means every row number below it moves down by one, so
//! besides the cells themselves this rewrites formulas, merged and table
//! ranges, defined names, chart series, drawing anchors and the calc chain.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::{Captures, NoExpand, Regex};

use super::ooxml::{escape_xml, unescape_xml, Package};
use super::TransformError;

const STYLES_PART: &str = "xl/styles.xml";

/// `A1`, `$B$12`; boundaries are checked by the caller
static CELL_REF: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\$?)([A-Z]{1,3})(\$?)([0-9]+)").expect("cell ref regex"));

/// Whole-row ranges: `1:1`, `$2:$5`
static ROW_RANGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\$?)([0-9]+):(\$?)([0-9]+)").expect("row range regex"));

/// Elements whose text is a formula
static FORMULA_ELEMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(<(?:\w+:)?(?:f|formula|formula1|formula2|definedName)(?:\s[^>]*)?>)([^<]*)(</)")
        .expect("formula element regex")
});

/// Attributes holding cell ranges
static RANGE_ATTRIBUTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\b(ref|sqref|activeCell|topLeftCell)="([^"]*)""#).expect("range attribute regex"));

static ROW_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(<(?:\w+:)?row\b[^>]*?\br=")([0-9]+)(")"#).expect("row number regex"));

static CELL_ADDRESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(<(?:\w+:)?c\s[^>]*?\br=")([A-Z]{1,3})([0-9]+)(")"#).expect("cell address regex"));

static FROZEN_ROWS: Lazy<Regex> = Lazy::new(|| Regex::new(r#"\bySplit="([0-9]+)""#).expect("ySplit regex"));

static DRAWING_ROW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(<xdr:row>)([0-9]+)(</xdr:row>)").expect("drawing row regex"));

static CHART_FORMULA: Lazy<Regex> = Lazy::new(|| Regex::new(r"(<c:f>)([^<]*)(</c:f>)").expect("chart formula regex"));

static DIMENSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(<(?:\w+:)?dimension\s+ref=")([^"]*)(")"#).expect("dimension regex"));

static SHEET_DATA_EMPTY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<((?:\w+:)?)sheetData\s*/>").expect("empty sheetData regex"));

static COUNT_ATTRIBUTE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"count="[0-9]+""#).expect("count regex"));

static SHEET_DATA_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<((?:\w+:)?)sheetData(?:\s[^>/]*)?>").expect("sheetData regex"));

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

/// Shifts every row reference in an unquoted formula fragment.
fn shift_unquoted(fragment: &str, by: u32) -> String {
    let rows_shifted = replace_bounded(fragment, &ROW_RANGE, |caps| {
        let first: u64 = caps[2].parse().unwrap_or(0);
        let last: u64 = caps[4].parse().unwrap_or(0);
        format!("{}{}:{}{}", &caps[1], first + by as u64, &caps[3], last + by as u64)
    });
    replace_bounded(&rows_shifted, &CELL_REF, |caps| {
        let row: u64 = caps[4].parse().unwrap_or(0);
        format!("{}{}{}{}", &caps[1], &caps[2], &caps[3], row + by as u64)
    })
}

/// Like `Regex::replace_all`, but skips matches glued to identifier characters
/// or followed by `(` (function names such as `LOG10(`).
fn replace_bounded(text: &str, re: &Regex, rewrite: impl Fn(&Captures<'_>) -> String) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut last = 0;
    for caps in re.captures_iter(text) {
        let Some(m) = caps.get(0) else { continue };
        let before = text[..m.start()].chars().next_back();
        let after = text[m.end()..].chars().next();
        let glued_before = before.is_some_and(|c| is_name_char(c) || c == '$');
        let glued_after = after.is_some_and(|c| is_name_char(c) || c == '(' || c == '$');
        if glued_before || glued_after {
            continue;
        }
        out.push_str(&text[last..m.start()]);
        out.push_str(&rewrite(&caps));
        last = m.end();
    }
    out.push_str(&text[last..]);
    out
}

/// Shifts row references in a formula, leaving string literals and quoted
/// sheet names alone.
pub fn shift_formula(formula: &str, by: u32) -> String {
    let mut out = String::with_capacity(formula.len() + 8);
    let mut segment = String::new();
    let mut quote: Option<char> = None;

    for c in formula.chars() {
        match quote {
            Some(q) => {
                out.push(c);
                if c == q {
                    quote = None;
                }
            }
            None if c == '"' || c == '\'' => {
                out.push_str(&shift_unquoted(&segment, by));
                segment.clear();
                out.push(c);
                quote = Some(c);
            }
            None => segment.push(c),
        }
    }
    out.push_str(&shift_unquoted(&segment, by));
    out
}

/// Formula text as stored in XML: unescape, shift, escape again.
fn shift_xml_formula(text: &str, by: u32) -> String {
    escape_xml(&shift_formula(&unescape_xml(text), by)).replace("&quot;", "\"")
}

fn shift_formula_elements(xml: &str, re: &Regex) -> String {
    re.replace_all(xml, |caps: &Captures<'_>| {
        format!("{}{}{}", &caps[1], shift_xml_formula(&caps[2], 1), &caps[3])
    })
    .into_owned()
}

fn shift_range_attributes(xml: &str) -> String {
    RANGE_ATTRIBUTE
        .replace_all(xml, |caps: &Captures<'_>| format!("{}=\"{}\"", &caps[1], shift_formula(&caps[2], 1)))
        .into_owned()
}

fn shift_cells(xml: &str) -> String {
    let rows = ROW_NUMBER.replace_all(xml, |caps: &Captures<'_>| {
        let row: u64 = caps[2].parse().unwrap_or(0);
        format!("{}{}{}", &caps[1], row + 1, &caps[3])
    });
    CELL_ADDRESS
        .replace_all(&rows, |caps: &Captures<'_>| {
            let row: u64 = caps[3].parse().unwrap_or(0);
            format!("{}{}{}{}", &caps[1], &caps[2], row + 1, &caps[4])
        })
        .into_owned()
}

/// Which rewrites a package part needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PartKind {
    Worksheet,
    CalcChain,
    Workbook,
    Chart,
    Drawing,
    /// Tables, pivots, comments: only range attributes
    RangeOwner,
}

fn part_kind(name: &str) -> Option<PartKind> {
    if !name.ends_with(".xml") || name.contains("/_rels/") {
        return None;
    }
    let kind = if name.starts_with("xl/worksheets/") {
        PartKind::Worksheet
    } else if name == "xl/calcChain.xml" {
        PartKind::CalcChain
    } else if name == "xl/workbook.xml" {
        PartKind::Workbook
    } else if name.starts_with("xl/charts/chart") {
        PartKind::Chart
    } else if name.starts_with("xl/drawings/drawing") {
        PartKind::Drawing
    } else if name.starts_with("xl/tables/")
        || name.starts_with("xl/pivotCache/")
        || name.starts_with("xl/pivotTables/")
        || name.starts_with("xl/threadedComments/")
        || name.starts_with("xl/comments")
    {
        PartKind::RangeOwner
    } else {
        return None;
    };
    Some(kind)
}

fn shift_part(xml: &str, kind: PartKind) -> String {
    match kind {
        PartKind::Worksheet => {
            let xml = shift_formula_elements(xml, &FORMULA_ELEMENT);
            let xml = shift_range_attributes(&xml);
            let xml = shift_cells(&xml);
            FROZEN_ROWS
                .replace_all(&xml, |caps: &Captures<'_>| {
                    let rows: u64 = caps[1].parse().unwrap_or(0);
                    format!("ySplit=\"{}\"", rows + 1)
                })
                .into_owned()
        }
        PartKind::CalcChain => shift_cells(xml),
        PartKind::Workbook => shift_formula_elements(xml, &FORMULA_ELEMENT),
        PartKind::Chart => shift_formula_elements(xml, &CHART_FORMULA),
        PartKind::Drawing => DRAWING_ROW
            .replace_all(xml, |caps: &Captures<'_>| {
                let row: u64 = caps[2].parse().unwrap_or(0);
                format!("{}{}{}", &caps[1], row + 1, &caps[3])
            })
            .into_owned(),
        PartKind::RangeOwner => shift_range_attributes(xml),
    }
}

/// Makes the sheet dimension start at `A1`, where the banner now lives.
fn widen_dimension(xml: &str) -> String {
    DIMENSION
        .replace(xml, |caps: &Captures<'_>| {
            let end = caps[2].rsplit(':').next().unwrap_or("A1").to_string();
            format!("{}A1:{}{}", &caps[1], end, &caps[3])
        })
        .into_owned()
}

fn banner_row(prefix: &str, banner: &str, style: Option<usize>) -> String {
    let style_attr = style.map(|s| format!(" s=\"{}\"", s)).unwrap_or_default();
    format!(
        "<{p}row r=\"1\" ht=\"24\" customHeight=\"1\"><{p}c r=\"A1\" t=\"inlineStr\"{s}><{p}is><{p}t>{text}</{p}t></{p}is></{p}c></{p}row>",
        p = prefix,
        s = style_attr,
        text = escape_xml(banner)
    )
}

/// Inserts the banner row as the first child of `<sheetData>`.
fn insert_banner_row(xml: &str, banner: &str, style: Option<usize>) -> Result<String, TransformError> {
    if let Some(caps) = SHEET_DATA_EMPTY.captures(xml) {
        let prefix = &caps[1];
        let replacement = format!(
            "<{p}sheetData>{row}</{p}sheetData>",
            p = prefix,
            row = banner_row(prefix, banner, style)
        );
        return Ok(SHEET_DATA_EMPTY.replace(xml, NoExpand(&replacement)).into_owned());
    }

    let caps = SHEET_DATA_OPEN
        .captures(xml)
        .ok_or_else(|| TransformError::Malformed("worksheet has no sheetData".to_string()))?;
    let Some(open) = caps.get(0) else {
        return Err(TransformError::Malformed("worksheet has no sheetData".to_string()));
    };
    let row = banner_row(&caps[1], banner, style);

    let mut out = String::with_capacity(xml.len() + row.len());
    out.push_str(&xml[..open.end()]);
    out.push_str(&row);
    out.push_str(&xml[open.end()..]);
    Ok(out)
}

/// Byte range from `<section ...>` up to its closing tag.
fn section_bounds(xml: &str, section: &str) -> Option<(usize, usize)> {
    let open = format!("<{}", section);
    let close = format!("</{}>", section);
    let mut search = 0;
    // `<fonts` must not match `<fontsX`; the next char ends the tag name
    let start = loop {
        let idx = xml[search..].find(&open)? + search;
        let next = xml[idx + open.len()..].chars().next();
        if matches!(next, Some(' ') | Some('>') | Some('\t') | Some('\n') | Some('\r')) {
            break idx;
        }
        search = idx + open.len();
    };
    let end = xml[start..].find(&close)? + start;
    Some((start, end))
}

fn count_children(section_xml: &str, tag: &str) -> usize {
    let open = format!("<{}", tag);
    section_xml
        .match_indices(&open)
        .filter(|(idx, _)| {
            matches!(
                section_xml[idx + open.len()..].chars().next(),
                Some('>') | Some(' ') | Some('/')
            )
        })
        .count()
}

/// Appends `child` to a styles collection and fixes its `count`.
///
/// Returns the index of the new child.
fn append_style(xml: &str, section: &str, tag: &str, child: &str) -> Option<(String, usize)> {
    let (start, end) = section_bounds(xml, section)?;
    let index = count_children(&xml[start..end], tag);

    let head_end = xml[start..].find('>')? + start;
    let head = &xml[start..=head_end];
    let new_count = format!("count=\"{}\"", index + 1);
    let new_head = if COUNT_ATTRIBUTE.is_match(head) {
        COUNT_ATTRIBUTE.replace(head, NoExpand(&new_count)).into_owned()
    } else {
        head.to_string()
    };

    let mut out = String::with_capacity(xml.len() + child.len());
    out.push_str(&xml[..start]);
    out.push_str(&new_head);
    out.push_str(&xml[head_end + 1..end]);
    out.push_str(child);
    out.push_str(&xml[end..]);
    Some((out, index))
}

/// Adds a bold white font on a dark fill and returns the cell format index.
fn add_banner_style(styles: &str) -> Option<(String, usize)> {
    let (styles, font_id) = append_style(
        styles,
        "fonts",
        "font",
        r#"<font><b/><sz val="14"/><color rgb="FFFFFFFF"/><name val="Calibri"/></font>"#,
    )?;
    let (styles, fill_id) = append_style(
        &styles,
        "fills",
        "fill",
        r#"<fill><patternFill patternType="solid"><fgColor rgb="FF1F4E79"/><bgColor indexed="64"/></patternFill></fill>"#,
    )?;
    let xf = format!(
        r#"<xf numFmtId="0" fontId="{}" fillId="{}" borderId="0" xfId="0" applyFont="1" applyFill="1" applyAlignment="1"><alignment vertical="center"/></xf>"#,
        font_id, fill_id
    );
    append_style(&styles, "cellXfs", "xf", &xf)
}

/// Stamps `banner` into cell A1 of every worksheet, shifting existing content down.
pub fn annotate(path: &Path, banner: &str) -> Result<(), TransformError> {
    let mut package = Package::open(path)?;

    let style = if package.contains(STYLES_PART) {
        match add_banner_style(&package.read_xml(STYLES_PART)?) {
            Some((styles, xf)) => {
                package.write_xml(STYLES_PART, styles);
                Some(xf)
            }
            None => {
                log::warn!("{}: unrecognised styles part, banner left unstyled", path.display());
                None
            }
        }
    } else {
        None
    };

    let targets: Vec<(String, PartKind)> = package
        .names()
        .filter_map(|name| part_kind(name).map(|kind| (name.to_string(), kind)))
        .collect();

    let sheets = targets.iter().filter(|(_, kind)| *kind == PartKind::Worksheet).count();
    if sheets == 0 {
        return Err(TransformError::MissingPart("xl/worksheets/*.xml".to_string()));
    }

    for (name, kind) in &targets {
        let xml = package.read_xml(name)?;
        let mut shifted = shift_part(&xml, *kind);
        if *kind == PartKind::Worksheet {
            shifted = insert_banner_row(&widen_dimension(&shifted), banner, style)?;
        }
        package.write_xml(name, shifted);
    }

    package.save(path)?;
    log::debug!("Stamped banner into {} worksheet(s) of {}", sheets, path.display());
    Ok(())
}
