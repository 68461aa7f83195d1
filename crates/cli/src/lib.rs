use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use doc_model::RunId;
use inkpatch_core::{EditScript, EditSession, ExportConfig, ExportReport, ScriptSummary, UreqFontFetcher};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use storage::SessionStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "inkpatch")]
#[command(about = "Edit the text of existing PDFs")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable PDF metadata.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// List the text runs found on each page.
    Runs {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// 1-based page number; all pages when omitted
        #[arg(long)]
        page: Option<u32>,
    },
    /// Print the colors sampled around one run.
    Sample {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, value_name = "RUN_ID")]
        run: String,
    },
    /// Apply an edit script and write the reconciled PDF.
    Apply {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, value_name = "SCRIPT")]
        edits: PathBuf,
        /// Defaults to `edited_<name>` next to the input
        #[arg(long)]
        output: Option<PathBuf>,
        /// Export configuration (JSON); environment settings otherwise
        #[arg(long)]
        config: Option<PathBuf>,
        /// Never download web fonts
        #[arg(long)]
        offline: bool,
        /// Also save the edit session to this directory
        #[arg(long)]
        session_dir: Option<PathBuf>,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    page_count: u32,
    pages: Vec<PageOutput>,
}

#[derive(Debug, Serialize)]
struct PageOutput {
    index: u32,
    width: f32,
    height: f32,
    runs: usize,
}

#[derive(Debug, Serialize)]
struct RunOutput {
    id: String,
    page: u32,
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    text: String,
    font: String,
}

#[derive(Debug, Serialize)]
struct SampleOutput {
    run: String,
    background: String,
    foreground: String,
}

#[derive(Debug, Serialize)]
struct ApplyOutput {
    output: String,
    script: ScriptSummary,
    report: ExportReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    session: Option<String>,
}

/// Logs go to stderr so stdout stays machine-readable. `INKPATCH_LOG`
/// takes an `EnvFilter` directive; the default is `warn`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("INKPATCH_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    match cli.command {
        Commands::Info { file } => run_info(&file),
        Commands::Runs { file, page } => run_runs(&file, page),
        Commands::Sample { file, run } => run_sample(&file, &run),
        Commands::Apply { file, edits, output, config, offline, session_dir } => run_apply(ApplyArgs {
            file: &file,
            edits: &edits,
            output: output.as_deref(),
            config: config.as_deref(),
            offline,
            session_dir: session_dir.as_deref(),
        }),
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn open_session(file: &Path, config: ExportConfig) -> Result<EditSession> {
    ensure_pdf_exists(file)?;
    EditSession::open_path(file, config).context("failed to open PDF")
}

fn print_json<T: Serialize>(payload: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(payload)?;
    println!("{json}");
    Ok(())
}

fn run_info(file: &Path) -> Result<()> {
    let session = open_session(file, ExportConfig::default())?;

    let pages = session
        .geometry()
        .pages()
        .iter()
        .map(|page| PageOutput {
            index: page.index,
            width: page.size.width_pt,
            height: page.size.height_pt,
            runs: page.runs.len(),
        })
        .collect();

    print_json(&InfoOutput {
        path: file.display().to_string(),
        page_count: session.geometry().page_count(),
        pages,
    })
}

fn run_runs(file: &Path, page: Option<u32>) -> Result<()> {
    let session = open_session(file, ExportConfig::default())?;
    let geometry = session.geometry();

    let pages: Vec<u32> = match page {
        Some(0) => anyhow::bail!("--page is 1-based and must be >= 1"),
        Some(number) => {
            let index = number - 1;
            if index >= geometry.page_count() {
                anyhow::bail!("page {number} out of range (page_count={})", geometry.page_count());
            }
            vec![index]
        }
        None => (0..geometry.page_count()).collect(),
    };

    let runs: Vec<RunOutput> = pages
        .into_iter()
        .flat_map(|index| geometry.runs_on(index))
        .map(|run| RunOutput {
            id: run.id.to_string(),
            page: run.page_index,
            x: run.x,
            y: run.y,
            width: run.width,
            height: run.height,
            text: run.text.clone(),
            font: run.font_name.clone(),
        })
        .collect();

    print_json(&runs)
}

fn run_sample(file: &Path, run: &str) -> Result<()> {
    let id: RunId = run.parse()?;
    let config = ExportConfig::from_env().context("invalid export configuration")?;
    let mut session = open_session(file, config)?;

    let sampled = session.sample_run(&id)?;

    print_json(&SampleOutput {
        run: id.to_string(),
        background: sampled.background.to_hex(),
        foreground: sampled.foreground.to_hex(),
    })
}

struct ApplyArgs<'a> {
    file: &'a Path,
    edits: &'a Path,
    output: Option<&'a Path>,
    config: Option<&'a Path>,
    offline: bool,
    session_dir: Option<&'a Path>,
}

fn run_apply(args: ApplyArgs<'_>) -> Result<()> {
    let mut config = match args.config {
        Some(path) => ExportConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ExportConfig::from_env().context("invalid export configuration")?,
    };
    if args.offline {
        config = config.with_web_fonts(false);
    }

    let script = EditScript::from_file(args.edits)
        .with_context(|| format!("failed to read edit script {}", args.edits.display()))?;

    let mut session = open_session(args.file, config)?;
    let summary = script.apply(&mut session).context("failed to apply edit script")?;

    let fetcher = UreqFontFetcher::new(session.config().font_fetch_timeout());
    let exported = session.export(Some(&fetcher)).context("export failed")?;

    let output = args
        .output
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| args.file.with_file_name(&exported.file_name));
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(&output, &exported.bytes)
        .with_context(|| format!("failed to write output to {}", output.display()))?;
    info!(output = %output.display(), bytes = exported.bytes.len(), "wrote edited document");

    let saved = match args.session_dir {
        Some(dir) => {
            let path = SessionStore::with_root(dir)
                .save(session.source_name(), session.ledger())
                .context("failed to save session")?;
            Some(path.display().to_string())
        }
        None => None,
    };

    print_json(&ApplyOutput {
        output: output.display().to_string(),
        script: summary,
        report: exported.report,
        session: saved,
    })
}

fn ensure_pdf_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}
