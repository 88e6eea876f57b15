//! Shared test utilities for the chapterwiki test suite.
//!
//! Provides a small on-disk book fixture and lookup helpers for the
//! pipeline-level tests.
//!
//! # Usage
//!
//! ```ignore
//! use crate::test_helpers::*;
//!
//! let book = sample_book();
//! book.write("processes.md", "# Processes\n");
//! let report = build(&BuildRequest::new(book.manifest(), book.output()), ...)?;
//! assert_eq!(corpus_ids(&report.corpus), vec!["intro", "processes", "memory"]);
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::manifest::MANIFEST_FILENAME;
use crate::types::DocumentRecord;

// =========================================================================
// Fixture setup
// =========================================================================

/// A book living in its own temp directory.
pub struct Book {
    dir: TempDir,
}

impl Book {
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn manifest(&self) -> PathBuf {
        self.root().join(MANIFEST_FILENAME)
    }

    /// Output directory. Not created until a build writes to it.
    pub fn output(&self) -> PathBuf {
        self.root().join("out")
    }

    /// Write (or overwrite) a file relative to the book root.
    pub fn write(&self, rel: &str, content: &str) {
        let path = self.root().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    pub fn read_output(&self, file: &str) -> String {
        fs::read_to_string(self.output().join(file))
            .unwrap_or_else(|e| panic!("cannot read output {file}: {e}"))
    }
}

/// Three chapters with every kind of structural node:
///
/// - `intro`: title, two sections, an external link, a fragment link, math
/// - `processes`: title and one section
/// - `memory`: front matter bibliography and a relative `.eps` image whose
///   `.png` rendition exists
pub fn sample_book() -> Book {
    let book = Book {
        dir: TempDir::new().unwrap(),
    };
    book.write(
        MANIFEST_FILENAME,
        "chapters = [\"intro\", \"processes\", \"memory\"]\n",
    );
    book.write(
        "intro.md",
        "# Introduction\n\n\
         ## Hello World\n\n\
         See [the docs](https://example.com/) and [compiling](#compiling).\n\n\
         ## Compiling\n\n\
         Registers $r_1$ through $r_{15}$.\n",
    );
    book.write("processes.md", "# Processes\n\n## Fork\n\nA new process.\n");
    book.write(
        "memory.md",
        "+++\nbibliography = \"memory.bib\"\n+++\n\n\
         # Memory\n\n\
         ## Paging\n\n\
         ![Page table diagram](img/paging.eps)\n",
    );
    book.write("img/paging.png", "png");
    book
}

// =========================================================================
// Lookups
// =========================================================================

/// Source ids of a corpus, in order.
pub fn corpus_ids(records: &[DocumentRecord]) -> Vec<&str> {
    records.iter().map(|r| r.source_id.as_str()).collect()
}
