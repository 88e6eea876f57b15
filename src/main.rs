use chapterwiki::config;
use chapterwiki::converter::MarkdownConverter;
use chapterwiki::output;
use chapterwiki::pipeline::{self, BuildError, BuildRequest};
use chapterwiki::probe::HttpProbe;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn version_string() -> &'static str {
    let on_tag = env!("CHAPTERWIKI_ON_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("CHAPTERWIKI_GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "chapterwiki")]
#[command(about = "Build a validated wiki from an ordered set of markdown chapters")]
#[command(long_about = "\
Build a validated wiki from an ordered set of markdown chapters

Every chapter is checked before anything is written: images need real alt
text, relative images must exist, and external links must resolve. Links
verified in the last 30 days are trusted without a network call.

Book layout:

  book/
  ├── chapters.toml          # chapters = [\"intro\", \"processes\", ...]
  ├── wiki.toml              # Optional config (see gen-config)
  ├── intro.md               # One markdown file per chapter
  ├── processes.md
  ├── img/                   # Relative images, rewritten onto base_url
  ├── .link-cache.json       # Link freshness cache (written by the tool)
  └── .wiki-metadata.json    # Chapter records (written by the tool)

Output:

  wiki/
  ├── Home.html              # Chapters with numbered section links
  ├── _Sidebar.html          # Chapter list fragment
  ├── Intro.html
  └── Processes.html

Log verbosity follows CHAPTERWIKI_LOG (e.g. CHAPTERWIKI_LOG=debug).
Run 'chapterwiki gen-config' to generate a documented wiki.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Config file (default: wiki.toml next to the manifest)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Link cache file (default: .link-cache.json next to the manifest)
    #[arg(long, global = true)]
    cache: Option<PathBuf>,

    /// Log progress at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate and generate the wiki
    Build {
        /// Chapter manifest (chapters.toml)
        manifest: PathBuf,
        /// Output directory
        output: PathBuf,
        /// Build only this chapter; Home and Sidebar are skipped
        #[arg(long)]
        chapter: Option<String>,
        /// Metadata sidecar (default: .wiki-metadata.json next to the manifest)
        #[arg(long)]
        metadata: Option<PathBuf>,
    },
    /// Validate every chapter without writing pages
    Check {
        /// Chapter manifest (chapters.toml)
        manifest: PathBuf,
    },
    /// Validate one chapter and record it in the metadata sidecar
    Validate {
        /// Chapter manifest (chapters.toml)
        manifest: PathBuf,
        /// Chapter identifier
        chapter: String,
        /// Metadata sidecar (default: .wiki-metadata.json next to the manifest)
        #[arg(long)]
        metadata: Option<PathBuf>,
    },
    /// Print a stock wiki.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Err(BuildError::Violation(violation)) => {
            eprintln!("{}", output::format_violation(&violation));
            std::process::exit(1);
        }
        other => other.map_err(Into::into),
    }
}

fn run(cli: Cli) -> Result<(), BuildError> {
    let converter = MarkdownConverter::new();

    match cli.command {
        Command::Build {
            manifest,
            output: out_dir,
            chapter,
            metadata,
        } => {
            let request = BuildRequest {
                manifest,
                output: out_dir,
                chapter,
                config: cli.config,
                cache: cli.cache,
                metadata,
            };
            let probe = http_probe(&request)?;
            println!("==> Building {}", request.manifest.display());
            let report = pipeline::build(&request, &converter, &probe)?;
            output::print_build_output(&report);
            println!("==> Build complete: {}", report.output.display());
        }
        Command::Check { manifest } => {
            let request = BuildRequest {
                manifest,
                config: cli.config,
                cache: cli.cache,
                ..BuildRequest::default()
            };
            let probe = http_probe(&request)?;
            println!("==> Checking {}", request.manifest.display());
            let report = pipeline::check(&request, &converter, &probe)?;
            let root = request
                .manifest
                .parent()
                .map(PathBuf::from)
                .unwrap_or_default();
            output::print_check_output(&report, &root);
            println!("==> Content is valid");
        }
        Command::Validate {
            manifest,
            chapter,
            metadata,
        } => {
            let request = BuildRequest {
                manifest,
                config: cli.config,
                cache: cli.cache,
                metadata,
                ..BuildRequest::default()
            };
            let probe = http_probe(&request)?;
            let (record, links) = pipeline::validate_one(&request, &chapter, &converter, &probe)?;
            output::print_validate_output(&record, &links, &request.metadata_path());
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// HTTP probe configured from the `[links]` section of the request's config.
fn http_probe(request: &BuildRequest) -> Result<HttpProbe, BuildError> {
    let config = config::load_config(&request.config_path())?;
    Ok(HttpProbe::new(&config.links)?)
}

/// Log to stderr; `CHAPTERWIKI_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_env("CHAPTERWIKI_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}
