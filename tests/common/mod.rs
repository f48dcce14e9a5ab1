#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use pagefinder::clock::ManualClock;
use pagefinder::session::{SessionRegistry, Timeouts};
use pagefinder::test_utils::{write_pdf, write_pdf_with_size};
use pagefinder::Lookup;
use tempfile::TempDir;

/// Corpus and output directories plus a lookup driven by a manual clock.
pub struct Fixture {
    pub tmp: TempDir,
    pub clock: Arc<ManualClock>,
    pub lookup: Lookup,
}

impl Fixture {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("pdfs")).unwrap();
        fs::create_dir_all(tmp.path().join("out")).unwrap();

        let clock = Arc::new(ManualClock::new());
        let registry = SessionRegistry::new(clock.clone(), Timeouts::default());
        let lookup = Lookup::new(
            tmp.path().join("pdfs"),
            tmp.path().join("out"),
            registry,
        );
        Self { tmp, clock, lookup }
    }

    pub fn corpus(&self) -> PathBuf {
        self.tmp.path().join("pdfs")
    }

    pub fn output(&self) -> PathBuf {
        self.tmp.path().join("out")
    }

    /// Write a letter-sized PDF at `relative` inside the corpus.
    pub fn add_pdf(&self, relative: &str, pages: &[&str]) -> PathBuf {
        let path = self.corpus().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        write_pdf(&path, pages);
        path
    }

    pub fn add_tall_pdf(&self, relative: &str, pages: &[&str], height_pt: u32) -> PathBuf {
        let path = self.corpus().join(relative);
        write_pdf_with_size(&path, pages, (612, height_pt));
        path
    }

    /// Session directories currently present under the output root.
    pub fn session_dirs(&self) -> Vec<PathBuf> {
        list_dir(&self.output())
    }
}

pub fn list_dir(dir: &Path) -> Vec<PathBuf> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    entries.sort();
    entries
}
