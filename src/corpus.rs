//! Corpus-wide text search over a folder of PDFs.
//!
//! Every search re-walks the corpus; nothing is indexed between calls.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use mupdf::Document;
use walkdir::WalkDir;

/// One page of one document whose text contains the query
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PdfMatch {
    /// Full path of the source document
    pub source_path: PathBuf,
    /// File name shown to the user (with extension)
    pub display_name: String,
    /// Page number (0-indexed)
    pub page_index: usize,
    /// Full extracted text of the page
    pub page_text: String,
}

#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    #[error("search term is empty")]
    EmptyQuery,

    #[error("cannot read corpus directory {path:?}: {source}")]
    RootUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Why a single document was left out of a search
#[derive(Debug, thiserror::Error)]
pub enum DocumentFault {
    #[error("PDF engine: {0}")]
    Pdf(#[from] mupdf::error::Error),

    #[error("document reports a negative page count ({0})")]
    BadPageCount(i32),
}

/// Search every PDF under `root` for pages containing `query`.
///
/// Matching is case-insensitive substring containment. Documents that fail to
/// open or decode are logged and skipped; they never fail the whole search.
pub fn search(root: &Path, query: &str) -> Result<Vec<PdfMatch>, CorpusError> {
    if query.trim().is_empty() {
        return Err(CorpusError::EmptyQuery);
    }

    fs::read_dir(root).map_err(|source| CorpusError::RootUnreadable {
        path: root.to_path_buf(),
        source,
    })?;

    let needle = query.to_lowercase();
    let mut matches = Vec::new();
    let mut scanned = 0usize;

    for path in pdf_files(root) {
        scanned += 1;
        match search_document(&path, &needle) {
            Ok(found) => matches.extend(found),
            Err(e) => warn!("Skipping {path:?}: {e}"),
        }
    }

    debug!(
        "Search for {query:?} scanned {scanned} documents, {} matching pages",
        matches.len()
    );
    Ok(matches)
}

/// All PDF files below `root`, in walk order.
pub fn pdf_files(root: &Path) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable corpus entry: {e}");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && is_pdf(entry.path()))
        .map(walkdir::DirEntry::into_path)
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// Name a document is presented under
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string()
}

fn search_document(path: &Path, needle: &str) -> Result<Vec<PdfMatch>, DocumentFault> {
    let doc = Document::open(path.to_string_lossy().as_ref())?;
    let page_count = doc.page_count()?;
    let page_count = usize::try_from(page_count).map_err(|_| DocumentFault::BadPageCount(page_count))?;
    let name = display_name(path);

    let mut found = Vec::new();
    for page_index in 0..page_count {
        let text = match doc.load_page(page_index as i32).and_then(|page| page.to_text()) {
            Ok(text) => text,
            Err(e) => {
                warn!("Skipping page {} of {path:?}: {e}", page_index + 1);
                continue;
            }
        };

        if text.to_lowercase().contains(needle) {
            found.push(PdfMatch {
                source_path: path.to_path_buf(),
                display_name: name.clone(),
                page_index,
                page_text: text,
            });
        }
    }

    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::write_pdf;
    use tempfile::TempDir;

    #[test]
    fn finds_term_on_third_page_only() {
        let tmp = TempDir::new().unwrap();
        write_pdf(
            &tmp.path().join("A.pdf"),
            &["cover letter", "terms and conditions", "Invoice number 42"],
        );

        let matches = search(tmp.path(), "invoice").unwrap();

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].page_index, 2);
        assert_eq!(matches[0].display_name, "A.pdf");
    }

    #[test]
    fn no_matches_gives_empty_result() {
        let tmp = TempDir::new().unwrap();
        write_pdf(&tmp.path().join("one.pdf"), &["alpha", "beta"]);
        write_pdf(&tmp.path().join("nested/two.pdf"), &["gamma"]);

        assert!(search(tmp.path(), "delta").unwrap().is_empty());
    }

    #[test]
    fn every_match_contains_query_case_insensitively() {
        let tmp = TempDir::new().unwrap();
        write_pdf(&tmp.path().join("x.pdf"), &["TOTAL due", "subtotal", "nothing"]);
        write_pdf(&tmp.path().join("deep/er/y.pdf"), &["Grand Total"]);

        let matches = search(tmp.path(), "ToTaL").unwrap();

        assert_eq!(matches.len(), 3);
        for m in &matches {
            assert!(m.page_text.to_lowercase().contains("total"));
        }
    }

    #[test]
    fn corrupt_documents_are_skipped() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("broken.pdf"), b"definitely not a pdf").unwrap();
        write_pdf(&tmp.path().join("good.pdf"), &["needle here"]);

        let matches = search(tmp.path(), "needle").unwrap();

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].display_name, "good.pdf");
    }

    #[test]
    fn non_pdf_files_are_ignored() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("notes.txt"), "needle").unwrap();

        assert!(search(tmp.path(), "needle").unwrap().is_empty());
    }

    #[test]
    fn uppercase_extension_counts_as_pdf() {
        assert!(is_pdf(Path::new("/a/REPORT.PDF")));
        assert!(!is_pdf(Path::new("/a/report.pdf.bak")));
    }

    #[test]
    fn empty_query_is_rejected() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(search(tmp.path(), "  "), Err(CorpusError::EmptyQuery)));
    }

    #[test]
    fn missing_root_is_reported() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope");
        assert!(matches!(
            search(&missing, "x"),
            Err(CorpusError::RootUnreadable { .. })
        ));
    }
}
