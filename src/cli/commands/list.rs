//! `cadastro list` command - Show stored records of a cadastre

use console::style;
use miette::Result;
use std::collections::HashMap;

use crate::cli::helpers::{open_backend, open_project, parse_module};
use crate::cli::table::records_table;
use crate::cli::GlobalOpts;
use crate::core::backend::{Backend, Query, Value, ID_COLUMN};
use crate::entities::Module;

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Module to list
    #[arg(value_parser = parse_module)]
    pub module: Module,

    /// Include deactivated records
    #[arg(long)]
    pub all: bool,

    /// Show at most this many records
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,
}

pub fn run(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let backend = open_backend(&project)?;
    let schema = args.module.schema();

    let mut query = Query::table(schema.table.as_str());
    if !args.all {
        query = query.active();
    }
    if let Some(key) = schema.key_field() {
        query = query.order_by(key.column.as_str());
    }
    let mut records = backend.select(&query)?;
    let total = records.len();
    if let Some(limit) = args.limit {
        records.truncate(limit);
    }

    if records.is_empty() {
        println!(
            "{} No records in {}",
            style("!").yellow(),
            style(&schema.label).cyan()
        );
        return Ok(());
    }

    // id -> display name for every reference column
    let mut names: HashMap<String, HashMap<i64, String>> = HashMap::new();
    for field in &schema.fields {
        let Some((reference, _)) = field.reference_rule() else {
            continue;
        };
        let rows = backend.select(&Query::table(reference.table))?;
        let by_id = rows
            .iter()
            .filter_map(|r| {
                let id = r.get(ID_COLUMN).and_then(Value::as_i64)?;
                let name = r.get(reference.key_column).and_then(Value::as_str)?;
                Some((id, name.to_string()))
            })
            .collect();
        names.insert(field.column.clone(), by_id);
    }

    let table = records_table(&schema, &records, |column, value| {
        match (names.get(column), value.as_i64()) {
            (Some(by_id), Some(id)) => by_id.get(&id).cloned().unwrap_or_else(|| id.to_string()),
            _ => value.to_string(),
        }
    });
    println!("{}", table);

    if !global.quiet {
        let shown = if records.len() < total {
            format!("{} of {}", records.len(), total)
        } else {
            total.to_string()
        };
        println!(
            "{} {} record(s) in {}",
            style("→").blue(),
            style(shown).cyan(),
            schema.label
        );
    }
    Ok(())
}
