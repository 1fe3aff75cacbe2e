//! Branded file names

use std::path::{Path, PathBuf};

/// Stem used when the original name has no usable characters
const EMPTY_STEM: &str = "file";

/// Splits `name` into its alphanumeric words, lowercased.
fn words(name: &str) -> Vec<String> {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Splits off the extension. A leading dot does not start an extension.
fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < name.len() => (&name[..idx], Some(&name[idx + 1..])),
        _ => (name, None),
    }
}

/// Builds the branded name for an uploaded file.
///
/// `5-sinf_BSB matematika.XLSX` with brand `@ish_reja_uz` becomes
/// `@ish_reja_uz_5_sinf_bsb_matematika.xlsx`. Names that already carry the
/// brand are returned unchanged.
pub fn rename(original_name: &str, brand_token: &str) -> String {
    // Only the last path component is a name
    let base = original_name.rsplit(['/', '\\']).next().unwrap_or(original_name);
    let (stem, extension) = split_extension(base);

    let brand_words = words(brand_token);
    let mut stem_words = words(stem);
    if !brand_words.is_empty() && stem_words.starts_with(&brand_words) {
        stem_words.drain(..brand_words.len());
    }

    let stem = if stem_words.is_empty() {
        EMPTY_STEM.to_string()
    } else {
        stem_words.join("_")
    };
    let prefix = format!("@{}", brand_words.join("_"));

    let extension: String = extension
        .map(|ext| ext.chars().filter(|c| c.is_alphanumeric()).collect::<String>().to_lowercase())
        .unwrap_or_default();

    if extension.is_empty() {
        format!("{}_{}", prefix, stem)
    } else {
        format!("{}_{}.{}", prefix, stem, extension)
    }
}

/// Lowercased extension of a file name, without the dot.
pub fn extension_of(name: &str) -> Option<String> {
    split_extension(name).1.map(str::to_lowercase)
}

/// Picks a free path for `file_name` in `dir`.
///
/// `current` is the file being renamed; it never counts as a collision with
/// itself. Taken names get `_2`, `_3`, … before the extension.
pub fn unique_target(dir: &Path, file_name: &str, current: &Path) -> PathBuf {
    let candidate = dir.join(file_name);
    if candidate == current || !candidate.exists() {
        return candidate;
    }

    let (stem, extension) = split_extension(file_name);
    (2u32..)
        .map(|n| match extension {
            Some(ext) => dir.join(format!("{}_{}.{}", stem, n, ext)),
            None => dir.join(format!("{}_{}", stem, n)),
        })
        .find(|path| path == current || !path.exists())
        .unwrap_or(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const BRAND: &str = "@ish_reja_uz";

    #[test]
    fn test_rename_normalizes_and_prefixes() {
        assert_eq!(
            rename("5-sinf_bsb_matematika.xlsx", BRAND),
            "@ish_reja_uz_5_sinf_bsb_matematika.xlsx"
        );
        assert_eq!(
            rename("Ona tili (2-chorak) 7-SINF.DOCX", BRAND),
            "@ish_reja_uz_ona_tili_2_chorak_7_sinf.docx"
        );
    }

    #[test]
    fn test_rename_is_idempotent() {
        for name in ["5-sinf_bsb_matematika.xlsx", "reja", "@ish_reja_uz.pdf", "Tarix 9.sinf.pdf"] {
            let once = rename(name, BRAND);
            assert_eq!(rename(&once, BRAND), once, "{}", name);
        }
    }

    #[test]
    fn test_rename_edge_cases() {
        assert_eq!(rename("!!!.pdf", BRAND), "@ish_reja_uz_file.pdf");
        assert_eq!(rename(".hidden", BRAND), "@ish_reja_uz_hidden");
        assert_eq!(rename("../../etc/passwd", BRAND), "@ish_reja_uz_passwd");
        assert_eq!(rename("folder\\Fizika.PDF", BRAND), "@ish_reja_uz_fizika.pdf");
        assert_eq!(rename("Oʻqish 3-sinf.docx", BRAND), "@ish_reja_uz_oʻqish_3_sinf.docx");
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("a.B.XLSX").as_deref(), Some("xlsx"));
        assert_eq!(extension_of("noext"), None);
        assert_eq!(extension_of(".env"), None);
    }

    #[test]
    fn test_unique_target_appends_counter() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("upload.pdf");
        std::fs::write(&source, b"x").unwrap();
        std::fs::write(dir.path().join("@k_a.pdf"), b"taken").unwrap();
        std::fs::write(dir.path().join("@k_a_2.pdf"), b"taken").unwrap();

        assert_eq!(unique_target(dir.path(), "@k_a.pdf", &source), dir.path().join("@k_a_3.pdf"));
        assert_eq!(unique_target(dir.path(), "@k_b.pdf", &source), dir.path().join("@k_b.pdf"));
        // Renaming a file onto its own name is not a collision
        let own = dir.path().join("@k_a.pdf");
        assert_eq!(unique_target(dir.path(), "@k_a.pdf", &own), own);
    }
}
