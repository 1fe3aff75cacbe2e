//! Catalog buckets and catalog message rendering
//!
//! `classify` maps a file name to exactly one `Category`. The rules are a
//! precedence-ordered table: assessment keywords win over grade tokens, and
//! anything unmatched is a primary-school file.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::core::config::publish::MESSAGE_LIMIT;
use crate::storage::catalog::CatalogEntry;

/// Catalog bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Category {
    /// Grades 1-4, and the default bucket
    #[serde(rename = "Boshlang'ich")]
    Primary,
    /// Grades 5-11
    #[serde(rename = "Yuqori")]
    Upper,
    /// BSB / CHSB assessment papers
    #[serde(rename = "BSB_CHSB")]
    Assessment,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Primary, Category::Upper, Category::Assessment];

    /// Tag stored in the `catalog.category` column
    pub fn tag(&self) -> &'static str {
        match self {
            Category::Primary => "Boshlang'ich",
            Category::Upper => "Yuqori",
            Category::Assessment => "BSB_CHSB",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Category> {
        Category::ALL.into_iter().find(|c| c.tag() == tag)
    }

    /// Reply-keyboard button text
    pub fn button_label(&self) -> &'static str {
        match self {
            Category::Primary => "📚 Boshlang'ich (1-4)",
            Category::Upper => "🎓 Yuqori (5-11)",
            Category::Assessment => "📝 BSB va CHSB",
        }
    }

    pub fn from_button(text: &str) -> Option<Category> {
        Category::ALL.into_iter().find(|c| c.button_label() == text)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\p{L}\p{N}]+").expect("separator regex"));

static ASSESSMENT_KEYWORDS: Lazy<Regex> = Lazy::new(|| Regex::new(r"bsb|chsb|imtihon").expect("assessment regex"));

/// `5_sinf`, `11sinf`; a preceding digit rules the token out (`15_sinf`)
static UPPER_GRADE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^0-9])(?:5|6|7|8|9|10|11)_?sinf").expect("grade regex"));

/// Classification rules, highest precedence first
static RULES: Lazy<[(&'static Regex, Category); 2]> = Lazy::new(|| {
    [
        (&*ASSESSMENT_KEYWORDS, Category::Assessment),
        (&*UPPER_GRADE, Category::Upper),
    ]
});

/// Lowercases and collapses every separator run into `_`.
fn fold(name: &str) -> String {
    NON_ALNUM.replace_all(&name.to_lowercase(), "_").into_owned()
}

/// Picks the catalog bucket for a file name.
pub fn classify(name: &str) -> Category {
    let folded = fold(name);
    RULES
        .iter()
        .find(|(rule, _)| rule.is_match(&folded))
        .map(|(_, category)| *category)
        .unwrap_or(Category::Primary)
}

/// Substitutes `{quarter}` in the catalog header template.
pub fn render_header(template: &str, quarter: &str) -> String {
    template.replace("{quarter}", quarter)
}

/// Shown instead of entries while a bucket is still empty
const FALLBACK_SUBJECTS: [&str; 12] = [
    "Alifbe 1-sinf",
    "Yozuv 1-sinf",
    "Oʻqish savodxonligi 1-4-sinf",
    "Adabiyot 5-11-sinf",
    "Biologiya 7-11-sinf",
    "Fizika 7-11-sinf",
    "Informatika 1-11-sinf",
    "Ingliz tili 1-11-sinf",
    "Matematika 1-7-sinf",
    "Ona tili 2-11-sinf",
    "Tarix 5-11-sinf",
    "Kelajak soati 1-11-sinf",
];

/// Minimal escaping for text placed inside Telegram HTML
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\'', "&#39;")
        .replace('"', "&quot;")
}

/// Renders the catalog message for one bucket.
///
/// The result is split on line boundaries into chunks Telegram accepts.
pub fn render_catalog(header: &str, entries: &[CatalogEntry], channel_username: &str) -> Vec<String> {
    let mut text = String::new();
    text.push_str(header);
    text.push_str("\n\n✅Oʻzingizga kerakli boʻlgan reja ustiga bosing va yuklab oling. ");
    text.push_str("Boshqalarga ham ulashishni unutmang.\n\n");

    if entries.is_empty() {
        for subject in FALLBACK_SUBJECTS {
            text.push_str(&format!("📚 {}\n", subject));
        }
        text.push_str("\n<i>Hozircha yuklash uchun linklar tayyorlanmoqda...</i>");
    } else {
        for entry in entries {
            text.push_str(&format!(
                "📚 {} — <a href='{}'>YUKLAB OLISH</a>\n",
                escape_html(&entry.display_name),
                escape_html(&entry.link)
            ));
        }
    }

    text.push_str("\n\n❗️OʻQITUVCHILARGA JOʻNATISHNI UNUTMANG❗️\n\n");
    text.push_str("#taqvim_mavzu_reja\n");
    text.push_str("✅Kanalga obuna bo‘lish:👇👇👇\n");
    text.push_str(&format!("https://t.me/{}", channel_username));

    split_message(&text, MESSAGE_LIMIT)
}

/// Splits text into chunks of at most `limit` characters, preferring line breaks.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();
        if current_len + line_len > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if line_len > limit {
            // A single oversized line is cut at character boundaries
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(limit) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }
        current.push_str(line);
        current_len += line_len;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
