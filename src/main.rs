use clap::Parser;
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cadastro::cli::{Cli, Commands, GlobalOpts};

fn main() -> Result<()> {
    // Reset SIGPIPE to default behavior (terminate silently) for proper Unix piping.
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    let global = cli.global;
    init_tracing(&global);

    match cli.command {
        Commands::Init(args) => cadastro::cli::commands::init::run(args, &global),
        Commands::Import(args) => cadastro::cli::commands::import::run(args, &global),
        Commands::Ref(cmd) => cadastro::cli::commands::refs::run(cmd, &global),
        Commands::List(args) => cadastro::cli::commands::list::run(args, &global),
        Commands::Config(cmd) => cadastro::cli::commands::config::run(cmd, &global),
        Commands::Completions(args) => cadastro::cli::commands::completions::run(args),
    }
}

/// Logs go to stderr; `CADASTRO_LOG` overrides the level chosen by `-v`
fn init_tracing(global: &GlobalOpts) {
    let default = if global.verbose { "cadastro=debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("CADASTRO_LOG").unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}
