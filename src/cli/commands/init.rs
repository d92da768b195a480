//! `cadastro init` command - Initialize a new cadastro project

use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::GlobalOpts;
use crate::core::project::{Project, ProjectError};
use crate::entities::{references, Module};

#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Directory to initialize (default: current directory)
    #[arg(default_value = ".")]
    pub path: std::path::PathBuf,

    /// Reinitialize even if .cadastro/ already exists (data is kept)
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: InitArgs, global: &GlobalOpts) -> Result<()> {
    let path = if args.path.as_os_str() == "." {
        std::env::current_dir().into_diagnostic()?
    } else {
        args.path.clone()
    };

    if !path.exists() {
        std::fs::create_dir_all(&path).into_diagnostic()?;
        if !global.quiet {
            println!(
                "{} Created directory {}",
                style("✓").green(),
                style(path.display()).cyan()
            );
        }
    }

    let project = if args.force {
        Project::init_force(&path)
    } else {
        Project::init(&path)
    };

    match project {
        Ok(project) => {
            println!(
                "{} Initialized cadastro project at {}",
                style("✓").green(),
                style(project.root().display()).cyan()
            );
            if global.quiet {
                return Ok(());
            }
            println!();
            println!("Created:");
            println!("  {}", style(project.config_path().display()).dim());
            println!("  {}", style(project.database_path().display()).dim());
            println!();
            let modules: Vec<&str> = Module::ALL.iter().map(Module::as_str).collect();
            let sets: Vec<&str> = references::STANDALONE.iter().map(|r| r.set).collect();
            println!("Modules:    {}", modules.join(", "));
            println!("References: {}", sets.join(", "));
            println!();
            println!("Next steps:");
            println!(
                "  {} Register reference values",
                style("cadastro ref add linhas L-1001").yellow()
            );
            println!(
                "  {} Export an import template",
                style("cadastro import juntas --template -o juntas.xlsx").yellow()
            );
            println!(
                "  {} Preview and import a filled sheet",
                style("cadastro import juntas juntas.xlsx").yellow()
            );
            Ok(())
        }
        Err(ProjectError::AlreadyExists(path)) => {
            println!(
                "{} cadastro project already exists at {}",
                style("!").yellow(),
                style(path.display()).cyan()
            );
            println!();
            println!(
                "Use {} to reinitialize",
                style("cadastro init --force").yellow()
            );
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
