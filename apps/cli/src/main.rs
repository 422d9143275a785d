//! Tessera command line
//!
//! Usage:
//!   tessera render --template order.json --context data.yaml --resources templates/
//!   tessera check --template order.json
//!   tessera eval "items.size() * 2" --context data.json

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[clap(name = "tessera")]
#[clap(about = "Render declarative JSON templates against a data context")]
#[clap(version)]
struct Cli {
    /// Log engine activity to stderr (repeat for more detail)
    #[clap(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process a template and print the result
    Render(RenderArgs),

    /// Parse a template and summarize its directives
    Check {
        /// Template file (JSON, or YAML by extension)
        #[clap(short, long)]
        template: PathBuf,
    },

    /// Evaluate a single expression
    Eval {
        /// Expression text
        expression: String,

        /// Context file (JSON, or YAML by extension)
        #[clap(short, long)]
        context: Option<PathBuf>,

        /// How the expression is interpreted
        #[clap(short, long, value_enum, default_value = "value")]
        kind: EvalKind,
    },
}

#[derive(clap::Args, Debug)]
struct RenderArgs {
    /// Template file (JSON, or YAML by extension)
    #[clap(short, long)]
    template: PathBuf,

    /// Context file (JSON, or YAML by extension)
    #[clap(short, long)]
    context: Option<PathBuf>,

    /// Directory that `@include` and `@resource` ids resolve against
    /// (defaults to the template's directory)
    #[clap(short, long)]
    resources: Option<PathBuf>,

    /// Engine configuration file (YAML)
    #[clap(long)]
    config: Option<PathBuf>,

    /// Output format (overrides the configuration)
    #[clap(short, long)]
    format: Option<tessera_transform::OutputFormat>,

    /// Compact JSON or XML output
    #[clap(long)]
    compact: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum EvalKind {
    Value,
    Template,
    Path,
    PathMulti,
    Condition,
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "tessera_transform=debug,tessera_expr=debug,info",
        _ => "tessera_transform=trace,tessera_expr=trace,debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Render(args) => commands::render(args),
        Command::Check { template } => commands::check(&template),
        Command::Eval {
            expression,
            context,
            kind,
        } => commands::eval(&expression, context.as_deref(), kind),
    }
}
