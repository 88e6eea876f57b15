//! Corpus orchestration.
//!
//! Drives the two passes over the chapters listed in a manifest:
//!
//! ```text
//! manifest ──► select ──► validation pass (sequential, manifest order)
//!                              │  DocumentRecord per chapter → metadata sidecar
//!                              │  verified links → link cache
//!                              ▼
//!                         transform pass (rayon pool, one page per chapter)
//!                              ▼
//!                         Home + Sidebar (full builds only)
//! ```
//!
//! The validation pass is sequential so the cache and sidecar have a single
//! writer. The link cache is saved once when the phase ends, including when
//! it ends in a violation, so links verified before the failure are not
//! probed again next run.
//!
//! Every error is fatal. Home and the sidebar are written only after every
//! selected chapter validated and transformed; a filtered build never
//! writes them.

use crate::cache::{CACHE_FILENAME, CacheError, LinkCache, LinkStats};
use crate::config::{self, CONFIG_FILENAME, ConfigError, WikiConfig};
use crate::converter::Converter;
use crate::generate::{self, GenerateError, HOME_FILE, SIDEBAR_FILE};
use crate::manifest::{Chapter, Manifest, ManifestError};
use crate::metadata::{METADATA_FILENAME, MetadataError, MetadataStore};
use crate::probe::{LinkProbe, ProbeError};
use crate::transform::Transformer;
use crate::types::{DocumentRecord, Violation};
use crate::validate::{ValidationSettings, Validator};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Violation(#[from] Violation),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("config: {0}")]
    Config(#[from] ConfigError),
    #[error("link cache: {0}")]
    Cache(#[from] CacheError),
    #[error("manifest: {0}")]
    Manifest(#[from] ManifestError),
    #[error("metadata: {0}")]
    Metadata(#[from] MetadataError),
    #[error("page generation: {0}")]
    Generate(#[from] GenerateError),
    #[error("link probe: {0}")]
    Probe(#[from] ProbeError),
    #[error("thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl BuildError {
    /// The content violation behind this error, if that is what it is.
    pub fn violation(&self) -> Option<&Violation> {
        match self {
            BuildError::Violation(v) => Some(v),
            _ => None,
        }
    }
}

/// Where a run reads and writes. Unset paths default to files next to the
/// manifest.
#[derive(Debug, Clone, Default)]
pub struct BuildRequest {
    pub manifest: PathBuf,
    pub output: PathBuf,
    /// Build only the chapter whose identifier matches.
    pub chapter: Option<String>,
    pub config: Option<PathBuf>,
    pub cache: Option<PathBuf>,
    pub metadata: Option<PathBuf>,
}

impl BuildRequest {
    pub fn new(manifest: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            manifest: manifest.into(),
            output: output.into(),
            ..Self::default()
        }
    }

    fn manifest_dir(&self) -> &Path {
        self.manifest
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }

    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| self.manifest_dir().join(CONFIG_FILENAME))
    }

    pub fn cache_path(&self) -> PathBuf {
        self.cache
            .clone()
            .unwrap_or_else(|| self.manifest_dir().join(CACHE_FILENAME))
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.metadata
            .clone()
            .unwrap_or_else(|| self.manifest_dir().join(METADATA_FILENAME))
    }
}

/// One generated chapter page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageReport {
    pub source_id: String,
    pub title: String,
    pub file: String,
}

/// Result of [`build`].
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub output: PathBuf,
    pub pages: Vec<PageReport>,
    /// Corpus in manifest order, as written to the sidecar.
    pub corpus: Vec<DocumentRecord>,
    pub links: LinkStats,
    pub workers: usize,
    /// Whether Home and the sidebar were written.
    pub index_written: bool,
}

/// Result of [`check`].
#[derive(Debug, Clone)]
pub struct CheckReport {
    pub corpus: Vec<DocumentRecord>,
    pub links: LinkStats,
    /// Source files on disk that the manifest does not list.
    pub unlisted: Vec<PathBuf>,
}

/// Loaded inputs shared by every operation.
struct Project {
    config: WikiConfig,
    manifest: Manifest,
    prelude: String,
}

impl Project {
    fn open(request: &BuildRequest) -> Result<Self, BuildError> {
        let config = config::load_config(&request.config_path())?;
        if !config.hosts_absolute_urls() {
            warn!(
                base_url = %config.base_url,
                "base_url is not an absolute http(s) URL; images will be root-relative"
            );
        }
        let manifest = Manifest::load(&request.manifest)?;
        let mut prelude = String::new();
        for file in &config.sources.prelude {
            prelude.push_str(&fs::read_to_string(manifest.root.join(file))?);
            prelude.push_str("\n\n");
        }
        Ok(Self {
            config,
            manifest,
            prelude,
        })
    }

    fn load_cache(&self, path: &Path) -> LinkCache {
        LinkCache::load(path).with_window_days(self.config.links.freshness_days)
    }

    /// Chapter source with the prelude spliced in after any front matter.
    fn read_source(&self, chapter: &Chapter) -> Result<String, Violation> {
        let path = self
            .manifest
            .source_path(chapter, &self.config.sources.suffix);
        let text = fs::read_to_string(&path).map_err(|e| Violation::ExternalTool {
            document: chapter.id.clone(),
            message: format!("cannot read {}: {e}", path.display()),
        })?;
        Ok(assemble_source(&self.prelude, &text))
    }

    fn settings(&self) -> ValidationSettings {
        ValidationSettings::from_config(&self.config, &self.manifest.root)
    }
}

/// A chapter that passed validation, ready for the transform pass.
struct Validated<'m> {
    chapter: &'m Chapter,
    source: String,
    record: DocumentRecord,
}

/// Validation pass over `chapters` in order. Each record is appended to
/// `store` as soon as its chapter passes.
fn validation_phase<'m>(
    project: &Project,
    chapters: &[&'m Chapter],
    converter: &dyn Converter,
    probe: &dyn LinkProbe,
    cache: &mut LinkCache,
    store: &mut MetadataStore,
) -> Result<(Vec<Validated<'m>>, LinkStats), BuildError> {
    let settings = project.settings();
    let mut links = LinkStats::default();
    let mut validated = Vec::with_capacity(chapters.len());

    for &chapter in chapters {
        let source = project.read_source(chapter)?;
        let events = converter.walk(&chapter.id, &source)?;
        let mut validator = Validator::new(&chapter.id, &settings);
        for event in &events {
            validator.observe(event, cache, probe)?;
        }
        let (record, stats) = validator.finish();
        debug!(chapter = %chapter.id, title = %record.title, links = %stats, "validated");
        links.absorb(stats);
        store.append(record.clone())?;
        validated.push(Validated {
            chapter,
            source,
            record,
        });
    }
    Ok((validated, links))
}

/// Run validation with the cache saved afterwards whatever the outcome.
fn validate_and_save<'m>(
    project: &Project,
    chapters: &[&'m Chapter],
    converter: &dyn Converter,
    probe: &dyn LinkProbe,
    cache_path: &Path,
    store: &mut MetadataStore,
) -> Result<(Vec<Validated<'m>>, LinkStats), BuildError> {
    let mut cache = project.load_cache(cache_path);
    let result = validation_phase(project, chapters, converter, probe, &mut cache, store);
    if let Err(e) = cache.save(cache_path) {
        // Don't mask the validation outcome with a cache write failure.
        if result.is_ok() {
            return Err(e.into());
        }
        warn!(error = %e, "could not save link cache");
    }
    result
}

/// Full pipeline: validate, transform, and (without a chapter filter)
/// render Home and the sidebar.
pub fn build(
    request: &BuildRequest,
    converter: &dyn Converter,
    probe: &dyn LinkProbe,
) -> Result<BuildReport, BuildError> {
    let project = Project::open(request)?;
    let selected = project.manifest.select(request.chapter.as_deref())?;
    let full = request.chapter.is_none();

    let metadata_path = request.metadata_path();
    let mut store = if full {
        MetadataStore::reset(&metadata_path)?
    } else {
        MetadataStore::open(&metadata_path)?
    };

    info!(chapters = selected.len(), "validation pass");
    let (validated, links) = validate_and_save(
        &project,
        &selected,
        converter,
        probe,
        &request.cache_path(),
        &mut store,
    )?;
    info!(%links, "validation pass complete");

    let workers = config::effective_workers(&project.config.processing);
    info!(workers, output = %request.output.display(), "transform pass");
    fs::create_dir_all(&request.output)?;
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()?;
    let pages = pool.install(|| {
        validated
            .par_iter()
            .map(|v| transform_chapter(&project, v, converter, &request.output))
            .collect::<Result<Vec<_>, BuildError>>()
    })?;

    if full {
        let corpus = store.records();
        generate::write_page(
            &request.output,
            HOME_FILE,
            generate::render_home(&project.config.site, corpus),
        )?;
        generate::write_page(
            &request.output,
            SIDEBAR_FILE,
            generate::render_sidebar(corpus),
        )?;
        info!("wrote {} and {}", HOME_FILE, SIDEBAR_FILE);
    }

    Ok(BuildReport {
        output: request.output.clone(),
        pages,
        corpus: store.into_records(),
        links,
        workers,
        index_written: full,
    })
}

fn transform_chapter(
    project: &Project,
    validated: &Validated<'_>,
    converter: &dyn Converter,
    output: &Path,
) -> Result<PageReport, BuildError> {
    let chapter = validated.chapter;
    let filter = Transformer::new(&chapter.id, &project.config);
    let document = converter.convert(&chapter.id, &validated.source, &filter)?;
    let page = generate::render_chapter_page(
        &project.config.site,
        &project.config.headers,
        &validated.record,
        &document,
    );
    let file = chapter.name.page_file();
    generate::write_page(output, &file, page)?;
    debug!(chapter = %chapter.id, %file, "page written");
    Ok(PageReport {
        source_id: chapter.id.clone(),
        title: validated.record.title.clone(),
        file,
    })
}

/// Validation pass only, over every chapter. Writes the link cache but no
/// pages and no sidecar.
pub fn check(
    request: &BuildRequest,
    converter: &dyn Converter,
    probe: &dyn LinkProbe,
) -> Result<CheckReport, BuildError> {
    let project = Project::open(request)?;
    let selected = project.manifest.select(None)?;

    // Scratch sidecar so `check` never disturbs the real one.
    let scratch = tempfile::tempdir()?;
    let mut store = MetadataStore::reset(&scratch.path().join(METADATA_FILENAME))?;

    let (_, links) = validate_and_save(
        &project,
        &selected,
        converter,
        probe,
        &request.cache_path(),
        &mut store,
    )?;

    let unlisted = project
        .manifest
        .unlisted_sources(&project.config.sources.suffix, &project.config.sources.prelude);
    for path in &unlisted {
        warn!(path = %path.display(), "source file not listed in manifest");
    }

    Ok(CheckReport {
        corpus: store.into_records(),
        links,
        unlisted,
    })
}

/// Validation pass for one chapter, appending its record to the sidecar.
///
/// Separate invocations over different chapters accumulate one corpus in
/// the sidecar; re-validating a chapter replaces its record in place.
pub fn validate_one(
    request: &BuildRequest,
    chapter: &str,
    converter: &dyn Converter,
    probe: &dyn LinkProbe,
) -> Result<(DocumentRecord, LinkStats), BuildError> {
    let project = Project::open(request)?;
    let selected = project.manifest.select(Some(chapter))?;
    let mut store = MetadataStore::open(&request.metadata_path())?;
    let (mut validated, links) = validate_and_save(
        &project,
        &selected,
        converter,
        probe,
        &request.cache_path(),
        &mut store,
    )?;
    let record = validated
        .pop()
        .map(|v| v.record)
        .ok_or_else(|| Violation::ChapterNotFound(chapter.to_string()))?;
    Ok((record, links))
}

/// Insert `prelude` after a leading `+++` front matter block, or at the top
/// when there is none.
fn assemble_source(prelude: &str, text: &str) -> String {
    if prelude.is_empty() {
        return text.to_string();
    }
    if let Some(rest) = text.strip_prefix("+++\n")
        && let Some(end) = rest.find("\n+++\n")
    {
        let split = "+++\n".len() + end + "\n+++\n".len();
        let (front, body) = text.split_at(split);
        return format!("{front}\n{prelude}{body}");
    }
    format!("{prelude}{text}")
}
