//! `cadastro ref` command - Reference table maintenance

use clap::Subcommand;
use console::style;
use miette::Result;
use tabled::{builder::Builder, settings::Style};
use tracing::debug;

use crate::cli::helpers::{open_backend, open_project, parse_reference};
use crate::cli::GlobalOpts;
use crate::core::backend::{fold_key, Backend, Query, Record, Value, ID_COLUMN};
use crate::core::Config;
use crate::entities::references::{self, is_standalone};
use crate::import::rules::CCA_COLUMN;
use crate::import::ReferenceDef;

#[derive(Subcommand, Debug)]
pub enum RefCommands {
    /// List the reference sets and their sizes
    Sets,

    /// List the active values of a set
    List(ListArgs),

    /// Add values to a set
    Add(AddArgs),

    /// Deactivate a value (soft delete)
    Remove(RemoveArgs),
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Reference set (linhas, fluidos, disciplinas, areas, desenhos)
    #[arg(value_parser = parse_reference)]
    pub set: ReferenceDef,
}

#[derive(clap::Args, Debug)]
pub struct AddArgs {
    /// Reference set (linhas, fluidos, disciplinas, areas)
    #[arg(value_parser = parse_reference)]
    pub set: ReferenceDef,

    /// Names to add
    #[arg(required = true)]
    pub names: Vec<String>,

    /// Description stored with every added value
    #[arg(long, short = 'd')]
    pub description: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct RemoveArgs {
    /// Reference set (linhas, fluidos, disciplinas, areas)
    #[arg(value_parser = parse_reference)]
    pub set: ReferenceDef,

    /// Name to deactivate
    pub name: String,
}

/// Run a ref subcommand
pub fn run(cmd: RefCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        RefCommands::Sets => run_sets(global),
        RefCommands::List(args) => run_list(args, global),
        RefCommands::Add(args) => run_add(args, global),
        RefCommands::Remove(args) => run_remove(args, global),
    }
}

fn run_sets(global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let backend = open_backend(&project)?;

    let mut builder = Builder::default();
    builder.push_record(["SET", "KEY", "ACTIVE", "MAINTAINED BY"]);
    for def in references::ALL {
        let count = backend.select(&Query::table(def.table).active())?.len();
        let owner = if is_standalone(&def) {
            "cadastro ref".to_string()
        } else {
            format!("cadastro import {}", def.table)
        };
        builder.push_record([
            def.set.to_string(),
            def.key_column.to_string(),
            count.to_string(),
            owner,
        ]);
    }
    println!("{}", builder.build().with(Style::rounded()));
    Ok(())
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let backend = open_backend(&project)?;
    let def = args.set;

    let records = backend.select(&Query::table(def.table).active().order_by(def.key_column))?;
    if records.is_empty() {
        println!("{} No active values in {}", style("!").yellow(), style(def.set).cyan());
        return Ok(());
    }

    let mut builder = Builder::default();
    builder.push_record(["ID", def.label, "DESCRIÇÃO"]);
    for record in &records {
        builder.push_record([
            text(record, ID_COLUMN),
            text(record, def.key_column),
            text(record, "descricao"),
        ]);
    }
    println!("{}", builder.build().with(Style::rounded()));
    if !global.quiet {
        println!(
            "{} {} value(s)",
            style("→").blue(),
            style(records.len()).cyan()
        );
    }
    Ok(())
}

fn run_add(args: AddArgs, global: &GlobalOpts) -> Result<()> {
    let def = args.set;
    ensure_standalone(&def)?;

    let project = open_project(global)?;
    let config = Config::load_for(Some(&project));
    let mut backend = open_backend(&project)?;

    let names: Vec<String> = args
        .names
        .iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect();
    let existing = backend.select(
        &Query::table(def.table)
            .active()
            .filter_in_ignore_case(def.key_column, names.clone()),
    )?;
    let mut taken: Vec<String> = existing
        .iter()
        .filter_map(|r| r.get(def.key_column).and_then(Value::as_str))
        .map(fold_key)
        .collect();

    let mut rows = Vec::new();
    let mut added = Vec::new();
    for name in names {
        let folded = fold_key(&name);
        if taken.contains(&folded) {
            println!(
                "{} {} already exists in {}",
                style("!").yellow(),
                style(&name).cyan(),
                def.set
            );
            continue;
        }
        taken.push(folded);

        let mut record = Record::new();
        record.insert(def.key_column.to_string(), Value::from(name.as_str()));
        record.insert("descricao".to_string(), Value::from(args.description.clone()));
        record.insert(CCA_COLUMN.to_string(), Value::from(config.cca.clone()));
        rows.push(record);
        added.push(name);
    }

    if rows.is_empty() {
        return Ok(());
    }
    let ids = backend.insert(def.table, &rows)?;
    debug!(set = def.set, added = ids.len(), "reference values added");

    for (name, id) in added.iter().zip(ids) {
        println!(
            "{} Added {} to {} (id {})",
            style("✓").green(),
            style(name).cyan(),
            def.set,
            id
        );
    }
    Ok(())
}

fn run_remove(args: RemoveArgs, global: &GlobalOpts) -> Result<()> {
    let def = args.set;
    ensure_standalone(&def)?;

    let project = open_project(global)?;
    let mut backend = open_backend(&project)?;

    let found = backend.select(
        &Query::table(def.table)
            .active()
            .filter_in_ignore_case(def.key_column, vec![args.name.clone()]),
    )?;
    let id = found
        .first()
        .and_then(|r| r.get(ID_COLUMN))
        .and_then(Value::as_i64)
        .ok_or_else(|| miette::miette!("'{}' not found in {}", args.name, def.set))?;

    backend.deactivate(def.table, id)?;
    println!(
        "{} Deactivated {} in {}",
        style("✓").green(),
        style(&args.name).cyan(),
        def.set
    );
    Ok(())
}

fn ensure_standalone(def: &ReferenceDef) -> Result<()> {
    if is_standalone(def) {
        Ok(())
    } else {
        Err(miette::miette!(
            help = format!("use `cadastro import {}` to maintain it", def.table),
            "Reference set '{}' is filled by its import module",
            def.set
        ))
    }
}

fn text(record: &Record, column: &str) -> String {
    record.get(column).map(Value::to_string).unwrap_or_default()
}
