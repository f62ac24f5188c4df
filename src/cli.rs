//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_document_adapter::JsonDocumentAdapter;
use crate::domain::error::{GenerationError, SignalsmithError};
use crate::domain::generator::{generate, GenerationResult};
use crate::domain::generator_config::GeneratorConfig;
use crate::domain::indicator::IndicatorRegistry;
use crate::domain::{limits, normalizer};
use crate::ports::document_port::DocumentPort;

#[derive(Parser, Debug)]
#[command(
    name = "signalsmith",
    about = "Compile visual strategy documents into freqtrade strategies"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a strategy class from a document
    Generate {
        #[arg(short, long)]
        document: PathBuf,
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Print the generation result as JSON instead of raw code
        #[arg(long)]
        json: bool,
    },
    /// Check that a document generates without writing code
    Validate {
        #[arg(short, long)]
        document: PathBuf,
        #[arg(short, long, default_value = "Strategy")]
        name: String,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print the canonical form of a document
    Normalize {
        #[arg(short, long)]
        document: PathBuf,
    },
    /// List the supported indicator types
    Indicators,
}

pub fn run(cli: Cli) -> ExitCode {
    match execute(&cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn execute(command: &Command) -> Result<(), SignalsmithError> {
    match command {
        Command::Generate {
            document,
            name,
            config,
            output,
            json,
        } => run_generate(document, name, config.as_deref(), output.as_deref(), *json),
        Command::Validate {
            document,
            name,
            config,
        } => run_validate(document, name, config.as_deref()),
        Command::Normalize { document } => run_normalize(document),
        Command::Indicators => {
            print!("{}", render_indicator_list());
            Ok(())
        }
    }
}

/// Generator configuration from an optional INI file; defaults when absent.
pub fn load_generator_config(path: Option<&Path>) -> Result<GeneratorConfig, SignalsmithError> {
    let Some(path) = path else {
        return Ok(GeneratorConfig::default());
    };
    let adapter = FileConfigAdapter::from_file(path).map_err(|e| SignalsmithError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })?;
    GeneratorConfig::from_config(&adapter)
}

pub fn run_generate(
    document_path: &Path,
    name: &str,
    config_path: Option<&Path>,
    output_path: Option<&Path>,
    json: bool,
) -> Result<(), SignalsmithError> {
    let config = load_generator_config(config_path)?;
    let source = JsonDocumentAdapter::new(document_path);
    let outcome = match source.load_document() {
        Ok(document) => generate(&document, name, &config),
        Err(SignalsmithError::Generation(e)) => Err(e),
        Err(e) => return Err(e),
    };

    if json {
        let result = GenerationResult::from(outcome.clone());
        let text = serde_json::to_string_pretty(&result)
            .map_err(|e| SignalsmithError::Generation(GenerationError::from(e)))?;
        println!("{text}");
    }

    let generated = outcome?;
    for warning in &generated.warnings {
        eprintln!("warning: {warning}");
    }
    match output_path {
        Some(path) => {
            fs::write(path, &generated.code)?;
            eprintln!("Wrote {} to {}", name, path.display());
        }
        None if !json => print!("{}", generated.code),
        None => {}
    }
    Ok(())
}

pub fn run_validate(
    document_path: &Path,
    name: &str,
    config_path: Option<&Path>,
) -> Result<(), SignalsmithError> {
    let config = load_generator_config(config_path)?;
    let source = JsonDocumentAdapter::new(document_path);
    let document = source.load_document()?;
    let generated = generate(&document, name, &config)?;
    for warning in &generated.warnings {
        eprintln!("warning: {warning}");
    }
    eprintln!(
        "{}: valid ({} lines, {} warning(s))",
        source.source_name(),
        generated.code.lines().count(),
        generated.warnings.len()
    );
    Ok(())
}

pub fn run_normalize(document_path: &Path) -> Result<(), SignalsmithError> {
    let source = JsonDocumentAdapter::new(document_path);
    let document = source.load_document()?;
    limits::check_document(&document, &limits::Limits::default())?;
    let canonical = normalizer::normalize(document)?;
    let text = serde_json::to_string_pretty(&canonical).map_err(GenerationError::from)?;
    println!("{text}");
    Ok(())
}

pub fn render_indicator_list() -> String {
    let mut output = String::new();
    for spec in IndicatorRegistry::builtin().specs() {
        output.push_str(&format!("{:<8} {}\n", spec.type_id, spec.description));
        output.push_str(&format!("         {}\n", spec));
    }
    output
}
