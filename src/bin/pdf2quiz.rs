//! CLI binary for pdf2quiz.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use pdf2quiz::{
    extract, extract_stream, extract_to_file, fingerprint_images, inspect, BodySeparator,
    ExtractionConfig, ExtractionOutput, ExtractionProgressCallback, NoiseProfile, PageSelection,
    ProgressCallback, Question,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
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

// ── CLI progress callback using indicatif ────────────────────────────────────

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// Terminal progress callback: a live bar plus one log line per page.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Per-page wall-clock start times for elapsed reporting.
    start_times: Mutex<HashMap<usize, Instant>>,
    /// Questions already reported, to print per-page deltas.
    last_count: AtomicUsize,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_extraction_start` tells us the page count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            last_count: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Extracting");
    }

    fn elapsed_secs(&self, page_num: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&page_num))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_extraction_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(page_num, Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, questions_so_far: usize) {
        let before = self.last_count.swap(questions_so_far, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<14}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("+{} questions", questions_so_far.saturating_sub(before))),
            dim(&format!("{:.2}s", self.elapsed_secs(page_num))),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{:.2}s", self.elapsed_secs(page_num))),
        ));
        self.bar.inc(1);
    }

    fn on_extraction_complete(&self, total_pages: usize, question_count: usize) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!(
                "{} {} questions from {} pages",
                green("✔"),
                bold(&question_count.to_string()),
                total_pages
            );
        } else {
            eprintln!(
                "{} {} questions from {} pages  ({} unreadable)",
                cyan("⚠"),
                bold(&question_count.to_string()),
                total_pages,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # All questions as JSON (stdout)
  pdf2quiz paper.pdf

  # One flattened line per question
  pdf2quiz --format text paper.pdf

  # JSON Lines, written as questions are finalized
  pdf2quiz --format jsonl paper.pdf -o questions.jsonl

  # Answer key per section, ordered by question number
  pdf2quiz --answer-key paper.pdf

  # Find the hash of a recurring banner, then suppress it
  pdf2quiz --fingerprint-images --pages 1 paper.pdf
  pdf2quiz --unwanted-hash 'AAAAAP8A/wA=' paper.pdf

  # Deck-specific noise settings from a file
  pdf2quiz --noise-profile testbook.json paper.pdf

  # Inspect PDF metadata only
  pdf2quiz --inspect-only paper.pdf

NOISE PROFILE (JSON):
  {
    "junk_patterns": ["Mock Test \\d+"],
    "unwanted_image_hashes": ["AAAAAP8A/wA="],
    "min_image_area": 2500,
    "similarity_threshold": 5
  }

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH         Path to libpdfium (default: ./ then system library)
  RUST_LOG                Override the log filter (e.g. pdf2quiz=trace)
"#;

/// Extract multiple-choice questions from exam-paper PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2quiz",
    version,
    about = "Extract multiple-choice questions from exam-paper PDFs",
    long_about = "Extract structured multiple-choice questions (number, body, options A-D, \
correct answer, section, diagrams) from answer-key style exam PDFs using layout rules. \
No OCR and no network access: the same PDF always gives the same output.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path.
    input: PathBuf,

    /// Write output to this file instead of stdout.
    #[arg(short, long, env = "PDF2QUIZ_OUTPUT")]
    output: Option<PathBuf>,

    /// Output format.
    #[arg(long, env = "PDF2QUIZ_FORMAT", value_enum, default_value = "json")]
    format: FormatArg,
    /// Page selection: all, 5, 3-15, or a list such as 1,4-6.
    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "PDF2QUIZ_PAGES", default_value = "all")]
    pages: String,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2QUIZ_PASSWORD")]
    password: Option<String>,

    /// Section for questions before the first section heading.
    #[arg(long, env = "PDF2QUIZ_FALLBACK_SECTION")]
    fallback_section: Option<String>,

    /// Drop images smaller than this many square points.
    #[arg(long, env = "PDF2QUIZ_MIN_IMAGE_AREA")]
    min_image_area: Option<f32>,

    /// Drop images within this many bits (exclusive) of an unwanted hash.
    #[arg(long, env = "PDF2QUIZ_SIMILARITY_THRESHOLD",
          value_parser = clap::value_parser!(u32).range(0..=64))]
    similarity_threshold: Option<u32>,

    /// JSON file with extra junk patterns and unwanted image hashes.
    #[arg(long, env = "PDF2QUIZ_NOISE_PROFILE")]
    noise_profile: Option<PathBuf>,

    /// Extra junk-line regex (repeatable).
    #[arg(long = "junk-pattern", value_name = "REGEX")]
    junk_patterns: Vec<String>,

    /// Base64 hash of an image to suppress (repeatable).
    #[arg(long = "unwanted-hash", value_name = "HASH")]
    unwanted_hashes: Vec<String>,

    /// Keep line breaks inside question bodies.
    #[arg(long, env = "PDF2QUIZ_NEWLINE_BODY")]
    newline_body: bool,

    /// Group questions by section and order each section by printed number.
    #[arg(long)]
    sort: bool,

    /// Print only the answer key, per section and by question number.
    #[arg(long)]
    answer_key: bool,

    /// Print the perceptual hash of every image, no extraction.
    #[arg(long, conflicts_with_all = ["inspect_only", "answer_key"])]
    fingerprint_images: bool,

    /// Print PDF metadata only, no extraction.
    #[arg(long)]
    inspect_only: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2QUIZ_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2QUIZ_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2QUIZ_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum FormatArg {
    /// Full output (questions, diagnostics, metadata, stats).
    Json,
    /// One question object per line.
    Jsonl,
    /// One flattened line per question.
    Text,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; diagnostics still surface as
    // WARN in verbose mode and in the JSON output.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.inspect_only && !cli.fingerprint_images;
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

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let meta = inspect(&cli.input, cli.password.as_deref())
            .await
            .context("Failed to inspect PDF")?;

        if cli.format == FormatArg::Text {
            println!("{}  {}", bold("File: "), cli.input.display());
            println!("{}  {}", bold("Title:"), meta.title.as_deref().unwrap_or("-"));
            println!("{}  {} (PDF {})", bold("Pages:"), meta.page_count, meta.pdf_version);
        } else {
            println!(
                "{}",
                serde_json::to_string_pretty(&meta).context("Failed to serialize metadata")?
            );
        }
        return Ok(());
    }

    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Fingerprint mode ─────────────────────────────────────────────────
    if cli.fingerprint_images {
        let prints = fingerprint_images(&cli.input, &config)
            .await
            .context("Failed to fingerprint images")?;
        let mut out = String::new();
        for p in &prints {
            match (&p.hash, &p.error) {
                (Some(hash), _) => out.push_str(&format!(
                    "page {:>3}  y={:<7.1} {:>4}x{:<4}  {}\n",
                    p.page + 1,
                    p.bbox.y0,
                    p.width,
                    p.height,
                    hash
                )),
                (None, error) => out.push_str(&format!(
                    "page {:>3}  y={:<7.1} {:>4}x{:<4}  <unhashable: {}>\n",
                    p.page + 1,
                    p.bbox.y0,
                    p.width,
                    p.height,
                    error.as_deref().unwrap_or("unknown")
                )),
            }
        }
        return emit(&cli, &out);
    }

    // ── JSON Lines: stream questions as they are finalized ──────────────
    if cli.format == FormatArg::Jsonl && !cli.sort && !cli.answer_key {
        let mut stream = extract_stream(&cli.input, &config)
            .await
            .context("Extraction failed")?;
        let mut sink: Box<dyn Write> = match cli.output {
            Some(ref path) => Box::new(io::BufWriter::new(
                std::fs::File::create(path)
                    .with_context(|| format!("Failed to create {}", path.display()))?,
            )),
            None => Box::new(io::stdout().lock()),
        };
        let mut count = 0usize;
        while let Some(question) = stream.next().await {
            let question = question.context("Extraction failed")?;
            serde_json::to_writer(&mut sink, &question).context("Failed to serialise question")?;
            sink.write_all(b"\n").context("Failed to write output")?;
            count += 1;
        }
        sink.flush().context("Failed to write output")?;
        if !cli.quiet && !show_progress {
            eprintln!("Extracted {count} questions");
        }
        return Ok(());
    }

    // ── Full JSON straight to a file ─────────────────────────────────────
    if cli.format == FormatArg::Json && !cli.sort && !cli.answer_key {
        if let Some(ref output_path) = cli.output {
            let stats = extract_to_file(&cli.input, output_path, &config)
                .await
                .context("Extraction failed")?;
            if !cli.quiet {
                eprintln!(
                    "{}  {} questions ({} without answer)  {}/{} pages  {}ms  →  {}",
                    if stats.failed_pages == 0 { green("✔") } else { cyan("⚠") },
                    stats.questions,
                    stats.unanswered,
                    stats.processed_pages,
                    stats.total_pages,
                    stats.total_duration_ms,
                    bold(&output_path.display().to_string()),
                );
            }
            return Ok(());
        }
    }

    // ── Everything else: extract, then render ────────────────────────────
    let output = extract(&cli.input, &config)
        .await
        .context("Extraction failed")?;
    let rendered = render(&cli, &config, &output)?;
    emit(&cli, &rendered)?;

    if !cli.quiet {
        if !show_progress {
            eprintln!(
                "Extracted {} questions from {}/{} pages in {}ms",
                output.stats.questions,
                output.stats.processed_pages,
                output.stats.total_pages,
                output.stats.total_duration_ms
            );
        }
        if !output.diagnostics.is_empty() {
            eprintln!(
                "   {} diagnostics (run with -v or --format json for details)",
                dim(&output.diagnostics.len().to_string())
            );
        }
    }

    Ok(())
}

/// Render an extraction in the requested format.
fn render(cli: &Cli, config: &ExtractionConfig, output: &ExtractionOutput) -> Result<String> {
    let questions: Vec<&Question> = if cli.sort {
        output.sorted_by_number()
    } else {
        output.questions.iter().collect()
    };

    if cli.answer_key {
        let key = output.answer_key();
        return Ok(match cli.format {
            FormatArg::Text => {
                let mut out = String::new();
                for group in &key {
                    out.push_str(&format!("{}\n", group.section));
                    for e in &group.answers {
                        let answer = e.correct.map(|c| c.to_string()).unwrap_or_else(|| "-".into());
                        out.push_str(&format!("  Q.{:<4} {}\n", e.number, answer));
                    }
                }
                out
            }
            FormatArg::Json => serde_json::to_string_pretty(&key)? + "\n",
            FormatArg::Jsonl => {
                let mut out = String::new();
                for group in &key {
                    out.push_str(&serde_json::to_string(group)?);
                    out.push('\n');
                }
                out
            }
        });
    }

    Ok(match cli.format {
        FormatArg::Text => {
            let opts = config.flatten_options();
            questions
                .iter()
                .map(|q| format!("{}\n", q.flatten(&opts)))
                .collect()
        }
        FormatArg::Jsonl => {
            let mut out = String::new();
            for q in questions {
                out.push_str(&serde_json::to_string(q)?);
                out.push('\n');
            }
            out
        }
        FormatArg::Json => {
            if cli.sort {
                let sorted = ExtractionOutput {
                    questions: questions.into_iter().cloned().collect(),
                    ..output.clone()
                };
                serde_json::to_string_pretty(&sorted)? + "\n"
            } else {
                serde_json::to_string_pretty(output)? + "\n"
            }
        }
    })
}

/// Write rendered output to `-o` or stdout.
fn emit(cli: &Cli, text: &str) -> Result<()> {
    match cli.output {
        Some(ref path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            std::fs::write(path, text)
                .with_context(|| format!("Failed to write {}", path.display()))
        }
        None => io::stdout()
            .lock()
            .write_all(text.as_bytes())
            .context("Failed to write to stdout"),
    }
}

/// Map CLI args to `ExtractionConfig`.
///
/// Precedence: defaults, then the noise profile, then explicit flags.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder().pages(parse_pages(&cli.pages)?);

    if let Some(ref path) = cli.noise_profile {
        let profile = NoiseProfile::from_json_file(path)?;
        builder = builder.noise_profile(profile);
    }
    for pattern in &cli.junk_patterns {
        builder = builder.junk_pattern(pattern);
    }
    for hash in &cli.unwanted_hashes {
        builder = builder.unwanted_image_hash(hash);
    }
    if let Some(area) = cli.min_image_area {
        builder = builder.min_image_area(area);
    }
    if let Some(threshold) = cli.similarity_threshold {
        builder = builder.similarity_threshold(threshold);
    }
    if let Some(ref section) = cli.fallback_section {
        builder = builder.fallback_section(section);
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password);
    }
    if cli.newline_body {
        builder = builder.body_separator(BodySeparator::Newline);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--pages`: `all`, a single page `5`, a range `3-15`, or a
/// comma-separated list whose items may themselves be ranges (`1,4-6`).
fn parse_pages(s: &str) -> Result<PageSelection> {
    let s = s.trim().to_lowercase();
    if s == "all" {
        return Ok(PageSelection::All);
    }

    let mut items = Vec::new();
    for item in s.split(',').map(str::trim) {
        items.push(match item.split_once('-') {
            Some((start, end)) => {
                let (start, end) = (page_number(start)?, page_number(end)?);
                if start > end {
                    anyhow::bail!("Invalid page range '{item}': start must be <= end");
                }
                (start, end)
            }
            None => {
                let page = page_number(item)?;
                (page, page)
            }
        });
    }

    Ok(match items.as_slice() {
        [(start, end)] if start == end => PageSelection::Single(*start),
        [(start, end)] => PageSelection::Range(*start, *end),
        _ => PageSelection::Set(items.iter().flat_map(|&(start, end)| start..=end).collect()),
    })
}

fn page_number(s: &str) -> Result<usize> {
    let page: usize = s
        .trim()
        .parse()
        .with_context(|| format!("Invalid page number: '{}'", s.trim()))?;
    if page < 1 {
        anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {page})");
    }
    Ok(page)
}
