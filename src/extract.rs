//! Page text from a schedule export.
//!
//! PDFs go through [`pdf_extract`], which can panic on malformed input, so the
//! call sits behind [`std::panic::catch_unwind`]. Plain `.txt` files (e.g. the
//! output of `pdftotext`) are accepted too, with form feeds as page breaks.

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use tracing::debug;

use crate::error::ExtractionError;

pub fn page_text(path: &Path, page_index: usize) -> Result<String, ExtractionError> {
    let data = std::fs::read(path).map_err(|source| ExtractionError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let pages = if is_text_file(path) {
        text_pages(&String::from_utf8_lossy(&data))
    } else {
        pdf_pages(&data)?
    };
    debug!(path = %path.display(), pages = pages.len(), "extracted pages");

    // A single-page text file is used whatever page is configured.
    let page_index = if is_text_file(path) && pages.len() == 1 {
        0
    } else {
        page_index
    };
    let raw = pages.get(page_index).ok_or(ExtractionError::PageOutOfRange {
        page: page_index,
        pages: pages.len(),
    })?;

    let text = clean_page(raw);
    if text.is_empty() {
        return Err(ExtractionError::EmptyPage { page: page_index });
    }
    Ok(text)
}

fn is_text_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("txt"))
}

fn text_pages(text: &str) -> Vec<String> {
    text.split('\x0c').map(str::to_string).collect()
}

fn pdf_pages(data: &[u8]) -> Result<Vec<String>, ExtractionError> {
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(data)
    }));
    match result {
        Ok(Ok(pages)) => Ok(pages),
        Ok(Err(e)) => Err(ExtractionError::Malformed(e.to_string())),
        Err(_) => Err(ExtractionError::Malformed(
            "extractor panicked on a malformed document".into(),
        )),
    }
}

/// One table row per line: whitespace runs collapsed, blank lines dropped.
fn clean_page(raw: &str) -> String {
    raw.lines()
        .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_file(name: &str, contents: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("sched2cal-{}-{}", std::process::id(), name));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn clean_page_collapses_whitespace() {
        let raw = "  Course   Section\t Location \n\n\nCSCI  360   F24N02  \n";
        assert_eq!(clean_page(raw), "Course Section Location\nCSCI 360 F24N02");
    }

    #[test]
    fn fixture_text_file() {
        let text = page_text(Path::new("tests/fixtures/schedule.txt"), 1).unwrap();
        assert!(text.lines().any(|l| l.starts_with("Course Section")));
        assert!(!text.contains("\n\n"));
    }

    #[test]
    fn text_file_pages_split_on_form_feed() {
        let path = temp_file("pages.txt", b"cover page\x0cCourse Section\nCSCI 360\x0c\n");
        assert_eq!(page_text(&path, 1).unwrap(), "Course Section\nCSCI 360");
        assert!(matches!(
            page_text(&path, 2),
            Err(ExtractionError::EmptyPage { page: 2 })
        ));
        assert!(matches!(
            page_text(&path, 7),
            Err(ExtractionError::PageOutOfRange { page: 7, pages: 3 })
        ));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn missing_file() {
        let err = page_text(Path::new("tests/fixtures/missing.pdf"), 1).unwrap_err();
        assert!(matches!(err, ExtractionError::Io { .. }));
    }

    #[test]
    fn garbage_pdf_is_malformed() {
        let path = temp_file("garbage.pdf", b"definitely not a pdf");
        let err = page_text(&path, 1).unwrap_err();
        assert!(matches!(err, ExtractionError::Malformed(_)));
        std::fs::remove_file(path).ok();
    }
}
