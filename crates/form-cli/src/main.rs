mod preview;
mod sinks;

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use form_spec::submission::timestamp_now;
use form_spec::{
    Document, ExportOptions, ExportSink, InstanceFidelity, PreviewSession, PreviewState,
    SubmissionSink, ValidationReport, document_schema, export_document, import_path,
    indexed_submission,
};
use sinks::{DirectorySink, JsonSink};
use tracing::debug;
use tracing_subscriber::EnvFilter;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

const OUTPUT_DIR_ENV: &str = "FORM_CLONE_OUTPUT_DIR";

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Preview, validate and export extracted form documents",
    long_about = "Imports a form document JSON, drives an interactive preview over it, and generates a self-contained static HTML clone"
)]
struct Cli {
    /// Log debug output to stderr (RUST_LOG takes precedence).
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum FidelityArg {
    /// Added instances use plain text inputs.
    GenericText,
    /// Added instances are cloned from a rendered template.
    Template,
}

impl From<FidelityArg> for InstanceFidelity {
    fn from(value: FidelityArg) -> Self {
        match value {
            FidelityArg::GenericText => InstanceFidelity::GenericText,
            FidelityArg::Template => InstanceFidelity::Template,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum SubmitFormat {
    /// Nested by page/section/group with slugified question keys.
    Interactive,
    /// Zero-based index paths, as posted by the static form.
    Indexed,
}

#[derive(Subcommand)]
enum Command {
    /// Summarize a form document.
    Inspect {
        /// Path to the form document JSON.
        #[arg(long, value_name = "DOCUMENT")]
        document: PathBuf,
    },
    /// Print the JSON schema of form documents.
    Schema {
        /// Write the schema to a file instead of stdout.
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Generate the static HTML clone of a document.
    Export {
        /// Path to the form document JSON.
        #[arg(long, value_name = "DOCUMENT")]
        document: PathBuf,
        /// Output directory (defaults to FORM_CLONE_OUTPUT_DIR or the current directory).
        #[arg(long, value_name = "DIR")]
        out: Option<PathBuf>,
        /// JSON file with export options; flags override it.
        #[arg(long, value_name = "CONFIG")]
        config: Option<PathBuf>,
        /// How dynamically added instances are rendered.
        #[arg(long, value_enum)]
        fidelity: Option<FidelityArg>,
        /// Page title (defaults to the document's source name).
        #[arg(long)]
        title: Option<String>,
        /// Overwrite an existing export.
        #[arg(long)]
        force: bool,
    },
    /// Validate saved answers against a document.
    Validate {
        /// Path to the form document JSON.
        #[arg(long, value_name = "DOCUMENT")]
        document: PathBuf,
        /// JSON file with `answers` and `instances`.
        #[arg(long, value_name = "ANSWERS")]
        answers: Option<PathBuf>,
    },
    /// Serialize saved answers into a submission.
    Submit {
        /// Path to the form document JSON.
        #[arg(long, value_name = "DOCUMENT")]
        document: PathBuf,
        /// JSON file with `answers` and `instances`.
        #[arg(long, value_name = "ANSWERS")]
        answers: PathBuf,
        /// Submission shape.
        #[arg(long, value_enum, default_value_t = SubmitFormat::Interactive)]
        format: SubmitFormat,
        /// Write the submission to a file instead of stdout.
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Fill in a document from a line-based shell on stdin.
    Preview {
        /// Path to the form document JSON.
        #[arg(long, value_name = "DOCUMENT")]
        document: PathBuf,
        /// Optional JSON file with initial `answers` and `instances`.
        #[arg(long, value_name = "ANSWERS")]
        answers: Option<PathBuf>,
    },
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Command::Inspect { document } => run_inspect(document),
        Command::Schema { out } => run_schema(out),
        Command::Export {
            document,
            out,
            config,
            fidelity,
            title,
            force,
        } => run_export(document, out, config, fidelity, title, force),
        Command::Validate { document, answers } => run_validate(document, answers),
        Command::Submit {
            document,
            answers,
            format,
            out,
        } => run_submit(document, answers, format, out),
        Command::Preview { document, answers } => run_preview(document, answers),
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn run_inspect(path: PathBuf) -> CliResult<()> {
    let document = import_path(&path)?;
    println!("Source: {}", document.source_name);
    println!(
        "Pages: {}, questions: {}",
        document.pages.len(),
        document.total_questions()
    );
    for page in &document.pages {
        println!("- Page {}: {}", page.page_number, page.title);
        for section in &page.sections {
            println!("  - Section: {}", section.title);
            for group in &section.groups {
                let conditional = group
                    .questions
                    .iter()
                    .filter(|question| question.is_conditional())
                    .count();
                println!(
                    "    - Group: {} ({} questions, {} conditional{})",
                    group.title,
                    group.questions.len(),
                    conditional,
                    if group.repeatable { ", repeatable" } else { "" }
                );
            }
        }
    }
    Ok(())
}

fn run_schema(out: Option<PathBuf>) -> CliResult<()> {
    let schema = serde_json::to_string_pretty(&document_schema())?;
    match out {
        Some(path) => {
            fs::write(&path, format!("{}\n", schema))?;
            println!("Schema written to {}", path.display());
        }
        None => println!("{}", schema),
    }
    Ok(())
}

fn run_export(
    path: PathBuf,
    out: Option<PathBuf>,
    config: Option<PathBuf>,
    fidelity: Option<FidelityArg>,
    title: Option<String>,
    force: bool,
) -> CliResult<()> {
    let document = import_path(&path)?;
    let mut options = match config {
        Some(config) => serde_json::from_str::<ExportOptions>(&fs::read_to_string(config)?)?,
        None => ExportOptions::default(),
    };
    if let Some(fidelity) = fidelity {
        options.fidelity = fidelity.into();
    }
    if title.is_some() {
        options.title = title;
    }
    debug!(?options, "resolved export options");

    let export = export_document(&document, &options)?;
    let mut sink = DirectorySink::new(resolve_output_root(out)?, force);
    sink.accept(&export.file_name, &export.html)?;
    for written in sink.written() {
        println!("Static form written to {}", written.display());
    }
    Ok(())
}

fn run_validate(path: PathBuf, answers: Option<PathBuf>) -> CliResult<()> {
    let session = load_session(&path, answers)?;
    let report = session.validate();
    println!(
        "Validation result: {}",
        if report.is_valid() { "valid" } else { "invalid" }
    );
    describe_validation(&report);

    if report.is_valid() {
        Ok(())
    } else {
        Err("validation failed".into())
    }
}

fn run_submit(
    path: PathBuf,
    answers: PathBuf,
    format: SubmitFormat,
    out: Option<PathBuf>,
) -> CliResult<()> {
    let session = load_session(&path, Some(answers))?;
    let report = session.validate();
    if !report.is_valid() {
        eprintln!("Submission rejected:");
        describe_validation(&report);
        return Err("validation failed".into());
    }

    let submission = match format {
        SubmitFormat::Interactive => serde_json::to_value(session.submission())?,
        SubmitFormat::Indexed => indexed_submission(
            session.document(),
            session.answers(),
            session.instances(),
            timestamp_now(),
        ),
    };
    JsonSink::new(out).submit(&submission)?;
    Ok(())
}

fn run_preview(path: PathBuf, answers: Option<PathBuf>) -> CliResult<()> {
    let mut session = load_session(&path, answers)?;
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    preview::run(&mut session, stdin.lock(), &mut stdout)
}

fn load_session(path: &Path, answers: Option<PathBuf>) -> CliResult<PreviewSession> {
    let document: Document = import_path(path)?;
    let state = match answers {
        Some(answers) => serde_json::from_str::<PreviewState>(&fs::read_to_string(answers)?)?,
        None => PreviewState::default(),
    };
    Ok(PreviewSession::with_state(document, state)?)
}

fn describe_validation(report: &ValidationReport) {
    if !report.is_empty() {
        println!("Errors:");
        for (key, message) in report.iter() {
            println!("  {} - {}", key, message);
        }
    }
}

fn resolve_output_root(out: Option<PathBuf>) -> CliResult<PathBuf> {
    let candidate = match out {
        Some(path) => path,
        None => env::var_os(OUTPUT_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    if candidate.as_os_str().is_empty() {
        return Err("output directory cannot be empty".into());
    }
    Ok(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_output_dir_is_rejected() {
        assert!(resolve_output_root(Some(PathBuf::new())).is_err());
        assert_eq!(
            resolve_output_root(Some(PathBuf::from("site"))).expect("explicit dir"),
            PathBuf::from("site")
        );
    }

    #[test]
    fn fidelity_flag_maps_onto_export_options() {
        assert_eq!(
            InstanceFidelity::from(FidelityArg::Template),
            InstanceFidelity::Template
        );
        assert_eq!(
            InstanceFidelity::from(FidelityArg::GenericText),
            InstanceFidelity::GenericText
        );
    }

    #[test]
    fn directory_sink_refuses_to_overwrite() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut sink = DirectorySink::new(dir.path(), false);
        sink.accept("a-form.html", "<html></html>").expect("first write");
        assert!(sink.accept("a-form.html", "<html></html>").is_err());

        let mut forced = DirectorySink::new(dir.path(), true);
        forced.accept("a-form.html", "<p>new</p>").expect("forced write");
        assert_eq!(forced.written().len(), 1);
        assert_eq!(
            fs::read_to_string(dir.path().join("a-form.html")).expect("read"),
            "<p>new</p>"
        );
    }
}
