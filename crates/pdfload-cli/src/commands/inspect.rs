//! Inspect command - load one document and report on it.

use std::collections::HashSet;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{debug, info};

use pdfload_core::{
    DocumentInfo, DocumentLoader, DocumentMetadata, DocumentSource, LoadError, LoadOptions,
    LoadState, OutputConfig, PasswordReason, PasswordResponder, PdfLoadConfig, Progress,
};

use super::config::load_config;

/// Default-mode retries when neither the config nor the command line sets a
/// limit. Without one a wrong `--password` would be resupplied forever.
const DEFAULT_PASSWORD_ATTEMPTS: u32 = 3;

/// Arguments for the inspect command.
#[derive(Args)]
pub struct InspectArgs {
    /// Document path or URL (http, https, file)
    #[arg(required = true)]
    source: String,

    /// Password resupplied whenever the document asks for one
    #[arg(short, long, conflicts_with = "ask_password")]
    password: Option<String>,

    /// Prompt for the password on every request
    #[arg(long)]
    ask_password: bool,

    /// Maximum password attempts before giving up
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Write embedded files into this directory
    #[arg(long, value_name = "DIR")]
    extract_attachments: Option<PathBuf>,

    /// Hide the progress bar
    #[arg(long)]
    no_progress: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Plain text summary
    Text,
}

pub async fn run(args: InspectArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    config.engine.max_password_attempts = args
        .max_attempts
        .or(config.engine.max_password_attempts)
        .or(Some(DEFAULT_PASSWORD_ATTEMPTS));

    let source = DocumentSource::parse(&args.source);
    info!("Inspecting {}", source.describe());

    let pb = progress_bar(args.no_progress)?;
    let failure: Arc<Mutex<Option<LoadError>>> = Arc::new(Mutex::new(None));

    let options = build_options(&args, &pb, failure.clone());
    let loader = DocumentLoader::from_config(&config);
    let view = loader.load(source, options);

    let state = view.settled().await;
    pb.finish_and_clear();

    let error = failure.lock().ok().and_then(|mut slot| slot.take());
    if let Some(error) = error {
        return Err(anyhow::Error::new(error).context(format!("could not load {}", args.source)));
    }

    let report = Report::from_state(&args.source, &state, &config.output)?;
    println!("{}", render(&report, args.format, &config.output)?);

    if let (Some(dir), Some(info)) = (&args.extract_attachments, &state.info) {
        let written = extract_attachments(info, dir)?;
        eprintln!(
            "{} Wrote {} attachment(s) to {}",
            style("✓").green(),
            written,
            dir.display()
        );
    }

    debug!("Total inspection time: {:?}", start.elapsed());

    Ok(())
}

fn progress_bar(hidden: bool) -> anyhow::Result<ProgressBar> {
    if hidden {
        return Ok(ProgressBar::hidden());
    }

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {bytes}/{total_bytes}")?
            .progress_chars("##-"),
    );
    Ok(pb)
}

fn build_options(
    args: &InspectArgs,
    pb: &ProgressBar,
    failure: Arc<Mutex<Option<LoadError>>>,
) -> LoadOptions {
    let bar = pb.clone();
    let mut options = LoadOptions::new()
        .on_progress(move |progress| show_progress(&bar, progress))
        .on_error(move |error| {
            if let Ok(mut slot) = failure.lock() {
                *slot = Some(error);
            }
        });

    if args.ask_password {
        let bar = pb.clone();
        options = options.on_password(move |responder, reason| prompt_password(&bar, responder, reason));
    } else if let Some(password) = &args.password {
        options = options.with_password(password.clone());
    }

    options
}

fn show_progress(pb: &ProgressBar, progress: Progress) {
    // Unknown totals keep the bar growing with the data.
    let total = if progress.total > 0 {
        progress.total
    } else {
        progress.loaded
    };
    pb.set_length(total);
    pb.set_position(progress.loaded);
}

/// Ask on stderr and read a line from stdin without blocking the runtime.
///
/// End of input leaves the request unanswered, which fails the load.
fn prompt_password(pb: &ProgressBar, responder: PasswordResponder, reason: PasswordReason) {
    let pb = pb.clone();
    tokio::task::spawn_blocking(move || {
        pb.suspend(|| {
            let prompt = match reason {
                PasswordReason::NeedPassword => "Password required:".to_string(),
                PasswordReason::IncorrectPassword => {
                    format!("{} Incorrect password, try again:", style("✗").red())
                }
            };
            eprint!("{} ", prompt);
            let _ = io::stderr().flush();

            let mut line = String::new();
            match io::stdin().lock().read_line(&mut line) {
                Ok(read) if read > 0 => {
                    responder.supply(line.trim_end_matches(['\r', '\n']));
                }
                _ => debug!("No password entered"),
            }
        });
    });
}

/// What gets printed for a loaded document.
#[derive(Debug, Serialize)]
struct Report {
    source: String,
    page_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    fingerprint: Option<String>,
    metadata: DocumentMetadata,
    attachments: Vec<AttachmentEntry>,
    attachments_size: usize,
    script_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    scripts: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct AttachmentEntry {
    name: String,
    filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    size: usize,
}

impl Report {
    fn from_state(source: &str, state: &LoadState, output: &OutputConfig) -> anyhow::Result<Self> {
        let (Some(document), Some(info)) = (&state.document, &state.info) else {
            anyhow::bail!("Load finished without a document");
        };

        let attachments = info
            .attachments
            .iter()
            .map(|(name, attachment)| AttachmentEntry {
                name: name.clone(),
                filename: attachment.filename.clone(),
                description: attachment.description.clone(),
                size: attachment.size(),
            })
            .collect();

        Ok(Self {
            source: source.to_string(),
            page_count: state.page_count,
            fingerprint: document.fingerprint(),
            metadata: info.metadata.clone(),
            attachments,
            attachments_size: info.attachments_size(),
            script_count: info.embedded_scripts.len(),
            scripts: output
                .include_scripts
                .then(|| info.embedded_scripts.clone()),
        })
    }
}

fn render(report: &Report, format: OutputFormat, output: &OutputConfig) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json if output.pretty => Ok(serde_json::to_string_pretty(report)?),
        OutputFormat::Json => Ok(serde_json::to_string(report)?),
        OutputFormat::Text => Ok(format_text(report)),
    }
}

fn format_text(report: &Report) -> String {
    let metadata = &report.metadata;
    let mut output = String::new();

    output.push_str(&format!("Source: {}\n", report.source));
    output.push_str(&format!("PDF version: {}\n", metadata.pdf_format_version));
    output.push_str(&format!("Pages: {}\n", report.page_count));
    if let Some(fingerprint) = &report.fingerprint {
        output.push_str(&format!("Fingerprint: {}\n", fingerprint));
    }
    output.push('\n');

    let fields = [
        ("Title", &metadata.title),
        ("Author", &metadata.author),
        ("Subject", &metadata.subject),
        ("Keywords", &metadata.keywords),
        ("Creator", &metadata.creator),
        ("Producer", &metadata.producer),
        ("Created", &metadata.creation_date),
        ("Modified", &metadata.modification_date),
    ];
    for (label, value) in fields {
        if let Some(value) = value {
            output.push_str(&format!("{}: {}\n", label, value));
        }
    }
    for (key, value) in &metadata.custom {
        output.push_str(&format!("{}: {}\n", key, value));
    }

    output.push_str(&format!("Encrypted: {}\n", yes_no(metadata.is_encrypted)));
    output.push_str(&format!("Linearized: {}\n", yes_no(metadata.is_linearized)));
    output.push_str(&format!("AcroForm: {}\n", yes_no(metadata.is_acroform_present)));
    output.push_str(&format!("XMP metadata: {}\n", yes_no(metadata.xmp.is_some())));

    if !report.attachments.is_empty() {
        output.push_str(&format!("\nAttachments ({} bytes):\n", report.attachments_size));
        for entry in &report.attachments {
            output.push_str(&format!("  {} ({} bytes)\n", entry.filename, entry.size));
            if let Some(description) = &entry.description {
                output.push_str(&format!("    {}\n", description));
            }
        }
    }

    output.push_str(&format!("\nScripts: {}\n", report.script_count));
    if let Some(scripts) = &report.scripts {
        for script in scripts {
            output.push_str(&format!("  {}\n", script));
        }
    }

    output
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

/// Write every attachment into `dir` and return how many were written.
///
/// Attachments sharing a file name get the name-tree key appended so none
/// of them overwrites another.
fn extract_attachments(info: &DocumentInfo, dir: &Path) -> anyhow::Result<usize> {
    fs::create_dir_all(dir)?;

    let mut used = HashSet::new();
    for (name, attachment) in &info.attachments {
        let file_name = unique_file_name(safe_file_name(&attachment.filename, name), name, &mut used);
        let target = dir.join(file_name);
        fs::write(&target, &attachment.content)?;
        debug!("Wrote {}", target.display());
    }

    Ok(used.len())
}

fn unique_file_name(file_name: String, key: &str, used: &mut HashSet<String>) -> String {
    if used.insert(file_name.clone()) {
        return file_name;
    }

    let key = key.replace(['/', '\\'], "_");
    let (stem, extension) = match file_name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => (stem, format!(".{extension}")),
        _ => (file_name.as_str(), String::new()),
    };

    let mut candidate = format!("{stem}-{key}{extension}");
    let mut counter = 2;
    while !used.insert(candidate.clone()) {
        candidate = format!("{stem}-{key}-{counter}{extension}");
        counter += 1;
    }
    candidate
}

/// Last path component of the embedded filename, falling back to the
/// name-tree key when the filename has none.
fn safe_file_name(filename: &str, key: &str) -> String {
    let candidate = filename
        .rsplit(['/', '\\'])
        .next()
        .filter(|name| !name.is_empty() && *name != "." && *name != "..");
    match candidate {
        Some(name) => name.to_string(),
        None => key.replace(['/', '\\'], "_"),
    }
}
