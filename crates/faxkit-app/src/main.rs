// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Faxkit — redaction-safe fax document assembly.
//
// Entry point. Initialises logging and configuration, then runs one command
// through an editing session and the document worker.

mod services;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use faxkit_core::error::{FaxkitError, Result};
use faxkit_core::human_errors::humanize_error;
use faxkit_core::{DocRect, FaxkitConfig};
use faxkit_document::assemble::write_atomic;
use faxkit_document::render::to_png_bytes;
use faxkit_document::{
    AssemblyInput, CoverPageProvider, CoverSheet, DocumentAssembler, PdfReader, PdfiumRasterizer,
    RetryConfig, TextCoverPage,
};
use faxkit_edit::{EditFile, Stroke};
use services::{data_dir, script};
use services::session::EditingSession;
use services::worker::DocumentWorker;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "faxkit", version, about = "Redaction-safe fax document assembly")]
struct Cli {
    /// Configuration file (JSON). Defaults to the per-user configuration.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Merge documents, with their saved edits, into one fax PDF.
    Assemble {
        /// Where to write the fax.
        #[arg(short, long)]
        output: PathBuf,
        /// Saved edit files; each names the document it belongs to.
        #[arg(long)]
        edits: Vec<PathBuf>,
        /// Pages to drop as INPUT:PAGE (both 0-based). Replaces the
        /// exclusions saved with that input's edits.
        #[arg(long, value_parser = parse_exclusion)]
        exclude: Vec<(usize, usize)>,
        /// Cover sheet (JSON) to generate and put first.
        #[arg(long)]
        cover: Option<PathBuf>,
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
    /// Check a combination without writing anything.
    Validate {
        #[arg(long)]
        edits: Vec<PathBuf>,
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
    /// Render one page, with its edits, to PNG.
    Render {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// 0-based page index.
        #[arg(long, default_value_t = 0)]
        page: usize,
        #[arg(long, default_value_t = 1.0)]
        zoom: f64,
        #[arg(long)]
        edits: Option<PathBuf>,
    },
    /// Replay editing actions (JSON) on a document and save the edits.
    Edit {
        input: PathBuf,
        /// Editing actions to replay, as a JSON list.
        #[arg(long)]
        script: PathBuf,
        /// Where to save the resulting edit file.
        #[arg(short, long)]
        output: PathBuf,
        /// Edits saved earlier, loaded before the script runs.
        #[arg(long)]
        edits: Option<PathBuf>,
        /// Also render the final view, with its edits, to this PNG.
        #[arg(long)]
        preview: Option<PathBuf>,
    },
    /// Show page count, size and metadata of documents.
    Info {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
    /// Write a copy of a document with regions redacted.
    Redact {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// PAGE:X0,Y0,X1,Y1 in points from the page's lower-left corner.
        #[arg(long, required = true, value_parser = parse_region)]
        region: Vec<(usize, DocRect)>,
    },
}

fn parse_exclusion(text: &str) -> std::result::Result<(usize, usize), String> {
    let (input, page) = text
        .split_once(':')
        .ok_or_else(|| format!("expected INPUT:PAGE, got {text:?}"))?;
    let number = |s: &str| s.trim().parse::<usize>().map_err(|err| format!("{s:?}: {err}"));
    Ok((number(input)?, number(page)?))
}

fn parse_region(text: &str) -> std::result::Result<(usize, DocRect), String> {
    let (page, coords) = text
        .split_once(':')
        .ok_or_else(|| format!("expected PAGE:X0,Y0,X1,Y1, got {text:?}"))?;
    let page = page.trim().parse::<usize>().map_err(|err| format!("page {page:?}: {err}"))?;
    let values = coords
        .split(',')
        .map(|v| v.trim().parse::<f64>().map_err(|err| format!("{v:?}: {err}")))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let [x0, y0, x1, y1] = values[..] else {
        return Err(format!("expected four coordinates, got {}", values.len()));
    };
    Ok((page, DocRect { x0, y0, x1, y1 }))
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            error!(error = %err, "command failed");
            let human = humanize_error(&err);
            eprintln!("{}\n{}", human.message, human.suggestion);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = match &cli.config {
        Some(path) => FaxkitConfig::load(path)?,
        None => FaxkitConfig::load_or_default(data_dir::config_path()),
    };
    let worker = DocumentWorker::new(DocumentAssembler::from_config(&config));

    match cli.command {
        Command::Assemble {
            output,
            edits,
            exclude,
            cover,
            inputs,
        } => {
            let mut session = open_session(&config, &inputs, &edits)?;
            let mut assembly = session.assembly_inputs();
            apply_exclusions(&mut assembly, &exclude)?;

            // Kept alive until the fax is written.
            let cover_dir = tempfile::tempdir()?;
            if let Some(cover) = cover {
                let mut sheet: CoverSheet = serde_json::from_str(&std::fs::read_to_string(&cover)?)?;
                if sheet.page_count_hint.is_none() {
                    let validation = worker.validate(assembly.clone(), session.snapshot()).await?;
                    sheet.page_count_hint = Some(validation.included_pages);
                }
                let path = TextCoverPage::default().render(&sheet, cover_dir.path())?;
                assembly.insert(0, AssemblyInput::new(path));
            }

            let report = worker.assemble(assembly, session.snapshot(), output).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            close_all(&mut session)?;
            Ok(ExitCode::SUCCESS)
        }

        Command::Validate { edits, inputs } => {
            // Missing files are reported by validation rather than failing here.
            let present: Vec<PathBuf> = inputs.iter().filter(|p| p.exists()).cloned().collect();
            let session = open_session(&config, &present, &edits)?;
            let assembly: Vec<AssemblyInput> = inputs
                .iter()
                .map(|path| AssemblyInput::new(path))
                .collect();
            let validation = worker.validate(assembly, session.snapshot()).await?;
            println!("{}", serde_json::to_string_pretty(&validation)?);
            Ok(if validation.is_valid() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }

        Command::Render {
            input,
            output,
            page,
            zoom,
            edits,
        } => {
            let mut session = open_session(&config, std::slice::from_ref(&input), edits.as_slice())?;
            session.go_to_page(page)?;
            let applied = session.set_zoom(zoom);
            let png = worker.render_png(session.render_job()?).await?;
            write_atomic(&output, &png, &RetryConfig::from(&config.lock_retry))?;
            info!(page, zoom = applied, output = %output.display(), "page rendered");
            Ok(ExitCode::SUCCESS)
        }

        Command::Edit {
            input,
            script: script_path,
            output,
            edits,
            preview,
        } => {
            let mut session = open_session(&config, std::slice::from_ref(&input), edits.as_slice())?;
            let actions = script::parse(&std::fs::read_to_string(&script_path)?)?;
            let summary = script::run(&mut session, &actions)?;
            session.save_edits(&summary.document, &output)?;
            if let Some(preview) = preview {
                let rendered = worker.render(session.render_job()?).await?;
                let png = to_png_bytes(&rendered.image)?;
                write_atomic(&preview, &png, &RetryConfig::from(&config.lock_retry))?;
            }
            info!(actions = actions.len(), output = %output.display(), "edits saved");
            println!("{}", serde_json::to_string_pretty(&summary)?);
            close_all(&mut session)?;
            Ok(ExitCode::SUCCESS)
        }

        Command::Info { inputs } => {
            let infos = inputs
                .iter()
                .map(PdfReader::open)
                .map(|reader| reader.map(|r| r.info()))
                .collect::<Result<Vec<_>>>()?;
            println!("{}", serde_json::to_string_pretty(&infos)?);
            Ok(ExitCode::SUCCESS)
        }

        Command::Redact {
            input,
            output,
            region,
        } => {
            let mut session = open_session(&config, std::slice::from_ref(&input), &[])?;
            for (page, rect) in region {
                session.go_to_page(page)?;
                session.add_stroke(Stroke::redact_rect(rect))?;
            }
            let report = worker
                .assemble(session.assembly_inputs(), session.snapshot(), output)
                .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Open `inputs` for editing and load every edit file into its document.
fn open_session(config: &FaxkitConfig, inputs: &[PathBuf], edits: &[PathBuf]) -> Result<EditingSession> {
    let rasterizer = Arc::new(PdfiumRasterizer::from_config(config));
    let mut session = EditingSession::new(config.clone(), rasterizer);
    for input in inputs {
        session.open(input)?;
    }
    for path in edits {
        let document = edit_file_document(path)?;
        if !session.documents().contains(&document) {
            return Err(FaxkitError::InvalidEdit(format!(
                "{} holds edits for {document}, which is not among the inputs",
                path.display()
            )));
        }
        session.load_edits(&document, path)?;
    }
    if let Some(first) = session.documents().first().cloned() {
        session.activate(&first)?;
    }
    Ok(session)
}

/// The document an edit file was saved for.
fn edit_file_document(path: &Path) -> Result<faxkit_core::DocumentId> {
    let file: EditFile = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    Ok(file.document)
}

fn apply_exclusions(assembly: &mut [AssemblyInput], exclude: &[(usize, usize)]) -> Result<()> {
    let mut by_input: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (input, page) in exclude {
        by_input.entry(*input).or_default().push(*page);
    }
    for (index, pages) in by_input {
        let count = assembly.len();
        let input = assembly.get_mut(index).ok_or_else(|| {
            FaxkitError::InvalidEdit(format!("--exclude names input {index}, but only {count} were given"))
        })?;
        *input = input.clone().excluding(pages);
    }
    Ok(())
}

fn close_all(session: &mut EditingSession) -> Result<()> {
    for id in session.documents().to_vec() {
        session.close(&id)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_regions_and_exclusions() {
        let (page, rect) = parse_region("0:100,700,250,715").expect("region");
        assert_eq!(page, 0);
        assert_eq!(rect, DocRect { x0: 100.0, y0: 700.0, x1: 250.0, y1: 715.0 });
        assert!(parse_region("0:1,2,3").is_err());
        assert!(parse_region("1,2,3,4").is_err());

        assert_eq!(parse_exclusion("2:5").expect("exclusion"), (2, 5));
        assert!(parse_exclusion("x:1").is_err());
    }

    #[test]
    fn exclusions_are_grouped_per_input() {
        let mut assembly = vec![AssemblyInput::new("a.pdf"), AssemblyInput::new("b.pdf")];
        apply_exclusions(&mut assembly, &[(1, 0), (1, 2)]).expect("apply");
        assert!(assembly[0].excluded_pages.is_none());
        assert_eq!(
            assembly[1].excluded_pages.as_ref().map(|p| p.iter().copied().collect::<Vec<_>>()),
            Some(vec![0, 2])
        );
        assert!(apply_exclusions(&mut assembly, &[(5, 0)]).is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
