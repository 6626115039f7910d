mod commands;

use clap::{Parser, Subcommand};
use packwright_core::install_signal_handler;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "packwright",
    version,
    about = "Resolve, fetch, and garbage-collect buildpack dependency layers"
)]
struct Cli {
    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the best catalog entry for a dependency.
    Resolve {
        /// Buildpack directory containing buildpack.toml.
        #[arg(long, default_value = ".")]
        buildpack: PathBuf,
        /// Dependency id.
        #[arg(long)]
        id: String,
        /// Version constraint, e.g. "11.*". Empty matches any version.
        #[arg(long = "version", value_name = "CONSTRAINT", default_value = "")]
        constraint: String,
        /// Target stack (defaults to $CNB_STACK_ID).
        #[arg(long)]
        stack: Option<String>,
    },
    /// Download and verify a dependency's artifact into a layers directory.
    Fetch {
        /// Buildpack directory containing buildpack.toml.
        #[arg(long, default_value = ".")]
        buildpack: PathBuf,
        /// Layers directory the artifact is cached in.
        #[arg(long)]
        layers: PathBuf,
        /// Dependency id.
        #[arg(long)]
        id: String,
        /// Version constraint, e.g. "11.*". Empty matches any version.
        #[arg(long = "version", value_name = "CONSTRAINT", default_value = "")]
        constraint: String,
        /// Target stack (defaults to $CNB_STACK_ID).
        #[arg(long)]
        stack: Option<String>,
    },
    /// Remove layers that are not listed with --keep.
    Gc {
        /// Layers directory to clean.
        #[arg(long)]
        layers: PathBuf,
        /// Layer to keep; may be repeated.
        #[arg(long)]
        keep: Vec<String>,
        /// Only report what would be removed.
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("PACKWRIGHT_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    install_signal_handler();

    let json_output = cli.json;
    let result = match cli.command {
        Commands::Resolve {
            buildpack,
            id,
            constraint,
            stack,
        } => commands::resolve::run(&buildpack, &id, &constraint, stack.as_deref(), json_output),
        Commands::Fetch {
            buildpack,
            layers,
            id,
            constraint,
            stack,
        } => commands::fetch::run(
            &buildpack,
            &layers,
            &id,
            &constraint,
            stack.as_deref(),
            json_output,
        ),
        Commands::Gc {
            layers,
            keep,
            dry_run,
        } => commands::gc::run(&layers, &keep, dry_run, json_output),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(err.code)
        }
    }
}
