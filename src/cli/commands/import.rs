//! `cadastro import` command - Import a spreadsheet into a cadastre

use console::{style, Term};
use dialoguer::{theme::ColorfulTheme, Confirm};
use miette::{IntoDiagnostic, Result};
use std::io;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cli::helpers::{open_backend, open_project, parse_module};
use crate::cli::table::{failures_table, preview_table};
use crate::cli::GlobalOpts;
use crate::core::Config;
use crate::entities::Module;
use crate::import::{
    write_template, write_template_csv, CommitOptions, CommitResult, ImportSchema,
    ImportSession, Preview, PreviewSummary, Progress, Sheet,
};

#[derive(clap::Args, Debug)]
pub struct ImportArgs {
    /// Module to import (juntas, valvulas, cabos, desenhos, equipamentos, luminarias)
    #[arg(value_parser = parse_module)]
    pub module: Module,

    /// Spreadsheet to import (.xlsx, .xlsm, .xls, .ods or .csv)
    pub file: Option<PathBuf>,

    /// Export the import template for the module instead of importing
    #[arg(long)]
    pub template: bool,

    /// Template output file (default: CSV on stdout)
    #[arg(long, short = 'o', requires = "template")]
    pub output: Option<PathBuf>,

    /// Validate and preview without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Exclude rows that only carry warnings
    #[arg(long, conflicts_with = "allow_warnings")]
    pub no_warnings: bool,

    /// Import rows that only carry warnings
    #[arg(long)]
    pub allow_warnings: bool,

    /// Rows per bulk insert
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Work-site code stamped on every imported row
    #[arg(long)]
    pub cca: Option<String>,

    /// Worksheet to read (default: first, or `default_sheet` from config)
    #[arg(long)]
    pub sheet: Option<String>,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,

    /// Stop after the first failed chunk
    #[arg(long)]
    pub fail_fast: bool,

    /// Write failed and skipped rows to this spreadsheet for a later retry
    #[arg(long)]
    pub failed_out: Option<PathBuf>,
}

pub fn run(args: ImportArgs, global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let config = Config::load_for(Some(&project));
    let mut backend = open_backend(&project)?;
    let schema = args.module.schema();

    if args.template {
        let session = ImportSession::open(&backend, &schema)?;
        return export_template(&schema, &session, args.output.as_deref(), global);
    }

    let file_path = args.file.clone().ok_or_else(|| {
        miette::miette!(
            "Spreadsheet required. Usage: cadastro import {} planilha.xlsx",
            schema.module
        )
    })?;
    if !file_path.exists() {
        return Err(miette::miette!("File not found: {}", file_path.display()));
    }

    let sheet_name = args.sheet.clone().or_else(|| config.default_sheet.clone());
    let sheet = Sheet::from_path(&file_path, sheet_name.as_deref())?;

    if !global.quiet {
        println!(
            "{} Importing {} from {}{}",
            style("→").blue(),
            style(&schema.label).cyan(),
            style(file_path.display()).yellow(),
            if args.dry_run {
                style(" (dry run)").dim().to_string()
            } else {
                String::new()
            }
        );
        report_headers(&schema, &sheet);
        println!();
    }

    let session = ImportSession::open(&backend, &schema)?;
    let allow_warnings = if args.no_warnings {
        false
    } else if args.allow_warnings {
        true
    } else {
        config.allow_warnings()
    };
    let preview = session.preview(sheet.rows(), allow_warnings);
    let summary = preview.summary();

    if !global.quiet {
        if let Some(table) = preview_table(&schema, &preview, global.verbose) {
            println!("{}", table);
            println!();
        }
    }
    print_preview_summary(&summary, allow_warnings);

    if args.dry_run {
        println!();
        println!("{}", style("Dry run complete. Nothing was written.").yellow());
        return Ok(());
    }

    let importable = summary.importable(allow_warnings);
    if importable == 0 {
        println!();
        println!("{} No rows to import.", style("!").yellow());
        if summary.total > 0 {
            return Err(miette::miette!(
                "No importable rows: {} error(s), {} warning(s)",
                summary.error,
                summary.warning
            ));
        }
        return Ok(());
    }

    if !args.yes && !confirm(importable, &schema)? {
        println!("Aborted.");
        return Ok(());
    }

    let options = CommitOptions {
        chunk_size: args.chunk_size.unwrap_or_else(|| config.chunk_size()),
        cca: args.cca.clone().or_else(|| config.cca.clone()),
    };
    let committer = session.committer(options)?;
    let cancel = CancellationToken::new();

    println!();
    let result = committer.commit_preview(&mut backend, &preview, &cancel, |progress| {
        if !global.quiet {
            print_progress(progress);
        }
        if args.fail_fast && progress.chunk_failed {
            cancel.cancel();
        }
    });
    info!(
        module = %schema.module,
        imported = result.imported(),
        failed = result.failed(),
        not_attempted = result.not_attempted(),
        "import finished"
    );

    print_commit_summary(&result);
    if let Some(table) = failures_table(&schema, &preview, &result) {
        println!();
        println!("{}", table);
    }

    if let Some(path) = &args.failed_out {
        write_retry_file(path, &schema, &preview, &result)?;
    }

    if result.failed() > 0 || result.cancelled() {
        return Err(miette::miette!(
            "Import completed with {} failed and {} skipped row(s)",
            result.failed(),
            result.not_attempted()
        ));
    }

    Ok(())
}

fn export_template(
    schema: &ImportSchema,
    session: &ImportSession<'_>,
    output: Option<&Path>,
    global: &GlobalOpts,
) -> Result<()> {
    match output {
        Some(path) => {
            write_template(path, schema, session.references())?;
            if !global.quiet {
                println!(
                    "{} Template for {} written to {}",
                    style("✓").green(),
                    style(&schema.module).cyan(),
                    style(path.display()).yellow()
                );
            }
        }
        None => {
            write_template_csv(io::stdout().lock(), schema, session.references())?;
            if !global.quiet {
                eprintln!();
                eprintln!(
                    "{} Template generated. Write a workbook with: cadastro import {} --template -o {}.xlsx",
                    style("→").blue(),
                    schema.module,
                    schema.module
                );
            }
        }
    }
    Ok(())
}

fn report_headers(schema: &ImportSchema, sheet: &Sheet) {
    let missing = sheet.missing_headers(schema);
    if !missing.is_empty() {
        println!(
            "{} Missing required columns: {}",
            style("!").yellow(),
            missing.join(", ")
        );
    }
    let unknown = sheet.unknown_headers(schema);
    if !unknown.is_empty() {
        println!(
            "{} Ignored columns: {}",
            style("!").yellow(),
            unknown.join(", ")
        );
    }
}

fn print_preview_summary(summary: &PreviewSummary, allow_warnings: bool) {
    println!("{}", style("─".repeat(50)).dim());
    println!("{}", style("Preview").bold());
    println!("{}", style("─".repeat(50)).dim());
    println!("  Rows:       {}", style(summary.total).cyan());
    println!("  OK:         {}", style(summary.ok).green());
    if summary.warning > 0 {
        println!(
            "  Warnings:   {}{}",
            style(summary.warning).yellow(),
            if allow_warnings {
                String::new()
            } else {
                style(" (excluded)").dim().to_string()
            }
        );
    }
    if summary.error > 0 {
        println!("  Errors:     {}", style(summary.error).red());
    }
    println!(
        "  Importable: {}",
        style(summary.importable(allow_warnings)).bold()
    );
}

fn confirm(rows: usize, schema: &ImportSchema) -> Result<bool> {
    if !Term::stderr().is_term() {
        return Err(miette::miette!(
            help = "pass --yes to import without a prompt",
            "Confirmation required but no terminal is attached"
        ));
    }
    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("Import {} row(s) into {}?", rows, schema.label))
        .default(false)
        .interact()
        .into_diagnostic()
}

fn print_progress(progress: &Progress) {
    let marker = if progress.chunk_failed {
        style("✗").red()
    } else {
        style("✓").green()
    };
    println!(
        "{} Chunk {}/{}: {}/{} rows ({:.0}%)",
        marker,
        progress.chunk,
        progress.chunks,
        progress.processed,
        progress.total,
        progress.percent()
    );
}

fn print_commit_summary(result: &CommitResult) {
    println!();
    println!("{}", style("─".repeat(50)).dim());
    println!("{}", style("Import Summary").bold());
    println!("{}", style("─".repeat(50)).dim());
    println!("  Rows submitted: {}", style(result.total()).cyan());
    println!("  Imported:       {}", style(result.imported()).green());
    if result.failed() > 0 {
        println!("  Failed:         {}", style(result.failed()).red());
    }
    if result.not_attempted() > 0 {
        println!("  Skipped:        {}", style(result.not_attempted()).dim());
    }
    if result.cancelled() {
        println!("  {}", style("Stopped after a failed chunk (--fail-fast)").yellow());
    }
}

/// Failed and skipped rows, with the original headers plus the failure reason
fn write_retry_file(
    path: &Path,
    schema: &ImportSchema,
    preview: &Preview,
    result: &CommitResult,
) -> Result<()> {
    let written = result.write_retry_file(path, schema, preview)?;
    println!(
        "{} {} row(s) to retry written to {}",
        style("→").blue(),
        written,
        style(path.display()).yellow()
    );
    Ok(())
}
