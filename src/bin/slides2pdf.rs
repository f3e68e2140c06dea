//! CLI binary for slides2pdf.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `DownloadConfig`, wires Ctrl-C to the run's cancellation token and writes
//! the resulting PDFs into the output directory.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use slides2pdf::pipeline::input::{is_slide_url, is_url};
use slides2pdf::{
    generate_to_dir, CancellationToken, DownloadConfig, DownloadProgressCallback, ProgressCallback,
    Segment, SlideSetInfo, SplitMode,
};
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar across the whole run plus a log line
/// per finished part and per skipped slide.
struct CliProgressCallback {
    bar: ProgressBar,
    skipped: AtomicUsize,
    /// Whether `confirm_split` may prompt on stdin.
    interactive: bool,
    /// Whether anything besides the prompt is drawn.
    visible: bool,
}

impl CliProgressCallback {
    fn new(interactive: bool, visible: bool) -> Arc<Self> {
        let bar = if visible {
            let bar = ProgressBar::new(0);
            let spinner_style =
                ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner())
                    .tick_strings(TICKS);
            bar.set_style(spinner_style);
            bar.set_prefix("Preparing");
            bar.enable_steady_tick(Duration::from_millis(80));
            bar
        } else {
            ProgressBar::hidden()
        };

        Arc::new(Self {
            bar,
            skipped: AtomicUsize::new(0),
            interactive,
            visible,
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} slides  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Downloading");
        self.bar.reset_eta();
    }

    /// Stop the bar when the run ends without `on_run_complete`.
    fn abandon(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

impl DownloadProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_pages: usize, parts: usize) {
        self.activate_bar(total_pages);
        let what = if parts > 1 {
            format!("{total_pages} slides into {parts} PDFs…")
        } else {
            format!("{total_pages} slides…")
        };
        self.bar
            .println(format!("{} {}", cyan("◆"), bold(&format!("Downloading {what}"))));
    }

    fn confirm_split(&self, total_pages: usize, parts: usize) -> bool {
        if !self.interactive {
            return true;
        }
        self.bar.suspend(|| {
            tokio::task::block_in_place(|| ask_split(total_pages, parts)).unwrap_or(true)
        })
    }

    fn on_segment_start(&self, part: usize, parts: usize, segment: Segment) {
        if parts > 1 {
            self.bar.set_message(format!("part {part}/{parts}"));
            self.bar.println(format!(
                "  {} Part {}/{}  {}",
                cyan("▸"),
                part,
                parts,
                dim(&format!("slides {segment}"))
            ));
        }
    }

    fn on_page_complete(&self, _page_num: usize, _total_pages: usize) {
        self.bar.inc(1);
    }

    fn on_page_skipped(&self, page_num: usize, total_pages: usize, error: &str) {
        self.skipped.fetch_add(1, Ordering::SeqCst);

        // Truncate very long error messages to keep output tidy.
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Slide {:>3}/{:<3}  {}",
            red("✗"),
            page_num,
            total_pages,
            red(&msg)
        ));
        self.bar.inc(1);
    }

    fn on_segment_complete(&self, part: usize, parts: usize, page_count: usize, bytes: usize) {
        self.bar.println(format!(
            "  {} Part {}/{}  {} pages  {}",
            green("✓"),
            part,
            parts,
            page_count,
            dim(&format!("{:.1} MB", bytes as f64 / 1_048_576.0))
        ));
    }

    fn on_run_complete(&self, total_pages: usize, added_pages: usize) {
        self.bar.finish_and_clear();
        if !self.visible {
            return;
        }
        let skipped = self.skipped.load(Ordering::SeqCst);
        if skipped == 0 {
            eprintln!(
                "{} {} slides downloaded",
                green("✔"),
                bold(&added_pages.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} slides downloaded  ({} skipped)",
                cyan("⚠"),
                bold(&added_pages.to_string()),
                total_pages,
                red(&skipped.to_string()),
            );
        }
    }
}

/// Ask on stdin whether an oversized run should be split. `None` when stdin
/// could not be read.
fn ask_split(total_pages: usize, parts: usize) -> Option<bool> {
    eprint!(
        "{} slides exceed the per-PDF limit. Split into {} PDFs? [Y/n] ",
        total_pages, parts
    );
    io::stderr().flush().ok()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer).ok()?;
    let answer = answer.trim().to_lowercase();
    Some(!(answer == "n" || answer == "no"))
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Any slide URL works; the base URL is derived from it
  slides2pdf https://cdn.example.com/ppt/abc123/1.png --pages 42

  # Explicit base URL and file name
  slides2pdf https://cdn.example.com/ppt/abc123/ --pages 42 --name "Week 3.pptx"

  # Large deck, always split into 100-slide PDFs, written to ./out
  slides2pdf https://cdn.example.com/ppt/abc123/ --pages 320 \
      --max-pages 100 --split always -o out

  # Keep the original PNGs instead of re-encoding to JPEG
  slides2pdf https://cdn.example.com/ppt/abc123/ --pages 12 --no-reencode

OUTPUT:
  A single PDF is named after --name (default download.pdf). When a deck
  is split, each part gets a _Part{N} suffix: lecture_Part1.pdf, ...
  Parts are written as soon as they are finished, so Ctrl-C keeps every
  part completed so far.

ENVIRONMENT VARIABLES:
  Every option can also be set through SLIDES2PDF_<OPTION>, for example
  SLIDES2PDF_MAX_PAGES=100 or SLIDES2PDF_SPLIT=never.
  RUST_LOG overrides the log filter.
"#;

/// Download slide images and assemble them into PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "slides2pdf",
    version,
    about = "Download numbered slide images and assemble them into PDFs",
    long_about = "Download a numbered set of slide images (<base>/1.png, <base>/2.png, ...) \
with bounded concurrency and assemble them into one PDF, or several when the deck exceeds \
the per-document page limit.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// URL of any slide image (…/3.png) or the base URL ending in '/'.
    source: String,

    /// Number of slides in the deck.
    #[arg(short = 'n', long, env = "SLIDES2PDF_PAGES",
          value_parser = clap::value_parser!(u64).range(1..))]
    pages: u64,

    /// Output file name; .ppt/.pptx are replaced with .pdf.
    #[arg(long, env = "SLIDES2PDF_NAME")]
    name: Option<String>,

    /// Directory the PDFs are written to.
    #[arg(short, long, env = "SLIDES2PDF_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Maximum slides per PDF before splitting.
    #[arg(long, env = "SLIDES2PDF_MAX_PAGES", default_value_t = 150)]
    max_pages: usize,

    /// Number of simultaneous downloads (also the batch size).
    #[arg(short, long, env = "SLIDES2PDF_CONCURRENCY", default_value_t = 10)]
    concurrency: usize,

    /// Pause after each batch, in milliseconds.
    #[arg(long, env = "SLIDES2PDF_COOLDOWN_MS", default_value_t = 50)]
    cooldown_ms: u64,

    /// Pause between two PDFs of a split run, in milliseconds.
    #[arg(long, env = "SLIDES2PDF_SEGMENT_PAUSE_MS", default_value_t = 1000)]
    segment_pause_ms: u64,

    /// JPEG quality for re-encoded slides (0.0–1.0].
    #[arg(long, env = "SLIDES2PDF_QUALITY", default_value_t = 0.8)]
    quality: f32,

    /// Embed the downloaded PNGs instead of re-encoding them to JPEG.
    #[arg(long, env = "SLIDES2PDF_NO_REENCODE")]
    no_reencode: bool,

    /// What to do when the deck exceeds --max-pages: ask, always, never.
    #[arg(long, env = "SLIDES2PDF_SPLIT", value_enum, default_value = "ask")]
    split: SplitArg,

    /// Per-request HTTP timeout in seconds.
    #[arg(long, env = "SLIDES2PDF_TIMEOUT", default_value_t = 60)]
    timeout: u64,

    /// HTTP User-Agent header.
    #[arg(long, env = "SLIDES2PDF_USER_AGENT")]
    user_agent: Option<String>,

    /// Print the run summary as JSON on stdout.
    #[arg(long, env = "SLIDES2PDF_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "SLIDES2PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "SLIDES2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "SLIDES2PDF_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum SplitArg {
    Ask,
    Always,
    Never,
}

impl From<SplitArg> for SplitMode {
    fn from(v: SplitArg) -> Self {
        match v {
            SplitArg::Ask => SplitMode::Ask,
            SplitArg::Always => SplitMode::Always,
            SplitArg::Never => SplitMode::Never,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Resolve input ────────────────────────────────────────────────────
    let info = resolve_input(&cli)?;

    // ── Build config ─────────────────────────────────────────────────────
    let interactive = io::stdin().is_terminal() && io::stderr().is_terminal();
    // Installed even without a bar: it also answers the split prompt.
    let cli_progress = CliProgressCallback::new(interactive, show_progress);
    let progress_cb: ProgressCallback = cli_progress.clone();
    let config = build_config(&cli, progress_cb)?;

    // ── Ctrl-C aborts the run ────────────────────────────────────────────
    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_token.abort("interrupted");
        }
    });

    // ── Run ──────────────────────────────────────────────────────────────
    let saved = match generate_to_dir(&info, &cli.output_dir, &config, &token).await {
        Ok(saved) => saved,
        Err(e) if e.is_aborted() => {
            cli_progress.abandon();
            if !cli.quiet {
                eprintln!("{} {}", cyan("■"), e);
            }
            std::process::exit(130);
        }
        Err(e) => {
            cli_progress.abandon();
            return Err(e).context("Download failed");
        }
    };

    if cli.json {
        let json = serde_json::to_string_pretty(&saved).context("Failed to serialise summary")?;
        println!("{json}");
    } else if !cli.quiet {
        for path in &saved.paths {
            eprintln!("   →  {}", bold(&path.display().to_string()));
        }
        eprintln!(
            "   {}/{} slides  {}  {}ms",
            saved.stats.added_pages,
            saved.stats.total_pages,
            dim(&format!("{} bytes", saved.stats.output_bytes)),
            saved.stats.total_duration_ms,
        );
    }

    Ok(())
}

/// Turn the positional source into a slide set.
fn resolve_input(cli: &Cli) -> Result<SlideSetInfo> {
    let name = cli.name.clone().unwrap_or_default();
    let pages = usize::try_from(cli.pages).context("--pages is too large")?;

    if is_slide_url(&cli.source) {
        SlideSetInfo::from_slide_url(&cli.source, pages, &name).context("Invalid slide URL")
    } else if is_url(&cli.source) {
        let mut base = cli.source.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        SlideSetInfo::new(base, pages, &name).context("Invalid base URL")
    } else {
        anyhow::bail!(
            "'{}' is not an http(s) URL; pass a slide image URL or the deck's base URL",
            cli.source
        )
    }
}

/// Map CLI args to `DownloadConfig`.
fn build_config(cli: &Cli, progress: ProgressCallback) -> Result<DownloadConfig> {
    let mut builder = DownloadConfig::builder()
        .max_pages_per_document(cli.max_pages)
        .batch_concurrency(cli.concurrency)
        .inter_batch_cooldown_ms(cli.cooldown_ms)
        .inter_segment_pause_ms(cli.segment_pause_ms)
        .image_quality(cli.quality)
        .reencode(!cli.no_reencode)
        .split_mode(cli.split.clone().into())
        .download_timeout_secs(cli.timeout)
        .progress_callback(progress);

    if let Some(ref ua) = cli.user_agent {
        builder = builder.user_agent(ua.clone());
    }

    builder.build().context("Invalid configuration")
}
