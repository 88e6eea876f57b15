//! Chapter manifest.
//!
//! The manifest is a TOML file listing chapter identifiers in book order:
//!
//! ```toml
//! chapters = ["intro", "processes", "memory/virtual-memory"]
//! ```
//!
//! An identifier plus the configured source suffix (default `.md`) names the
//! chapter source relative to the manifest's directory. The list order is the
//! book order and is never changed.

use crate::naming::{self, ChapterName};
use crate::types::Violation;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Conventional manifest file name.
pub const MANIFEST_FILENAME: &str = "chapters.toml";

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("manifest lists no chapters")]
    Empty,
    #[error("chapters {first:?} and {second:?} would produce the same page")]
    Duplicate { first: String, second: String },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestFile {
    chapters: Vec<String>,
}

/// One manifest entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    /// Identifier exactly as listed.
    pub id: String,
    pub name: ChapterName,
}

/// Ordered chapter list plus the directory the identifiers resolve against.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub root: PathBuf,
    pub chapters: Vec<Chapter>,
}

impl Manifest {
    /// Load a manifest file. Identifiers resolve against its directory.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = fs::read_to_string(path)?;
        let root = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        Self::parse(&content, root)
    }

    pub fn parse(content: &str, root: &Path) -> Result<Self, ManifestError> {
        let file: ManifestFile = toml::from_str(content)?;
        if file.chapters.is_empty() {
            return Err(ManifestError::Empty);
        }
        let chapters: Vec<Chapter> = file
            .chapters
            .into_iter()
            .map(|id| Chapter {
                name: naming::parse_chapter_id(&id),
                id: id.trim().to_string(),
            })
            .collect();

        for (i, a) in chapters.iter().enumerate() {
            if let Some(b) = chapters[..i]
                .iter()
                .find(|b| b.name.key == a.name.key || b.name.page_name == a.name.page_name)
            {
                return Err(ManifestError::Duplicate {
                    first: b.id.clone(),
                    second: a.id.clone(),
                });
            }
        }

        Ok(Self {
            root: root.to_path_buf(),
            chapters,
        })
    }

    /// Chapters to build: all of them, or the single one whose normalized
    /// identifier equals `filter`.
    pub fn select(&self, filter: Option<&str>) -> Result<Vec<&Chapter>, Violation> {
        let Some(filter) = filter else {
            return Ok(self.chapters.iter().collect());
        };
        let key = naming::normalize_key(filter);
        self.chapters
            .iter()
            .find(|c| c.name.key == key)
            .map(|c| vec![c])
            .ok_or_else(|| Violation::ChapterNotFound(filter.to_string()))
    }

    /// Source file of `chapter`.
    pub fn source_path(&self, chapter: &Chapter, suffix: &str) -> PathBuf {
        self.root.join(format!("{}{}", chapter.id, suffix))
    }

    /// Source files under the root that carry `suffix` but are neither a
    /// listed chapter nor one of `ignored` (relative paths). Hidden
    /// directories and files are skipped.
    pub fn unlisted_sources(&self, suffix: &str, ignored: &[String]) -> Vec<PathBuf> {
        let listed: HashSet<PathBuf> = self
            .chapters
            .iter()
            .map(|c| self.source_path(c, suffix))
            .chain(ignored.iter().map(|p| self.root.join(p)))
            .collect();

        let mut unlisted: Vec<PathBuf> = WalkDir::new(&self.root)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| p.to_string_lossy().ends_with(suffix) && !listed.contains(p))
            .collect();
        unlisted.sort();
        unlisted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manifest(ids: &[&str]) -> Manifest {
        let list: Vec<String> = ids.iter().map(|id| format!("{id:?}")).collect();
        Manifest::parse(&format!("chapters = [{}]", list.join(", ")), Path::new("/book")).unwrap()
    }

    #[test]
    fn parse_preserves_order() {
        let m = manifest(&["c", "a", "b"]);
        let ids: Vec<&str> = m.chapters.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn empty_manifest_rejected() {
        assert!(matches!(
            Manifest::parse("chapters = []", Path::new(".")),
            Err(ManifestError::Empty)
        ));
    }

    #[test]
    fn colliding_pages_rejected() {
        let err = Manifest::parse(r#"chapters = ["intro", "old/Intro"]"#, Path::new(".")).unwrap_err();
        assert!(matches!(err, ManifestError::Duplicate { .. }));
    }

    #[test]
    fn unknown_key_rejected() {
        assert!(Manifest::parse("chapters = [\"a\"]\nextra = 1", Path::new(".")).is_err());
    }

    // =========================================================================
    // Selection
    // =========================================================================

    #[test]
    fn select_all_without_filter() {
        let m = manifest(&["intro", "ipc"]);
        assert_eq!(m.select(None).unwrap().len(), 2);
    }

    #[test]
    fn select_matches_case_insensitively() {
        let m = manifest(&["chapters/Intro_To_C", "ipc"]);
        let selected = m.select(Some("intro-to-c")).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, "chapters/Intro_To_C");
    }

    #[test]
    fn select_unknown_is_chapter_not_found() {
        let m = manifest(&["processes"]);
        assert_eq!(
            m.select(Some("intro")).unwrap_err(),
            Violation::ChapterNotFound("intro".into())
        );
    }

    // =========================================================================
    // Files
    // =========================================================================

    #[test]
    fn source_path_joins_root_and_suffix() {
        let m = manifest(&["memory/paging"]);
        assert_eq!(
            m.source_path(&m.chapters[0], ".md"),
            PathBuf::from("/book/memory/paging.md")
        );
    }

    #[test]
    fn load_resolves_against_manifest_dir() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(MANIFEST_FILENAME);
        fs::write(&path, "chapters = [\"intro\"]\n").unwrap();
        let m = Manifest::load(&path).unwrap();
        assert_eq!(m.root, tmp.path());
    }

    #[test]
    fn unlisted_sources_found() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("drafts")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        for file in ["intro.md", "prelude.md", "drafts/scratch.md", ".git/x.md", "notes.txt"] {
            fs::write(root.join(file), "x").unwrap();
        }
        let m = Manifest::parse("chapters = [\"intro\"]", root).unwrap();
        let unlisted = m.unlisted_sources(".md", &["prelude.md".to_string()]);
        assert_eq!(unlisted, vec![root.join("drafts/scratch.md")]);
    }
}
