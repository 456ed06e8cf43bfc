mod env_file;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use argbind::{App, BoundArguments, ParseOutcome};
use argbind_schema::AppSchema;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{EnvFilter, fmt};

use crate::env_file::DotenvEnv;

#[derive(Parser)]
#[command(name = "argbind")]
#[command(version, long_about = None)]
#[command(disable_help_subcommand = true)]
#[command(about = "Bind command-line tokens against a JSON app description")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Route and bind tokens, printing the bound arguments as JSON
    Bind(BindArgs),

    /// Print help for the app or one of its commands
    Help(HelpArgs),

    /// Validate an app description
    Check(CheckArgs),
}

#[derive(Parser)]
struct BindArgs {
    /// Path to the JSON app description
    #[arg(short, long, value_name = "FILE")]
    schema: PathBuf,

    /// Read fallback environment variables from a .env file
    #[arg(long, value_name = "FILE")]
    env_file: Option<PathBuf>,

    /// Return unknown options and surplus tokens instead of failing
    #[arg(long)]
    known: bool,

    /// Tokens to bind, as the app itself would receive them
    #[arg(value_name = "TOKENS", trailing_var_arg = true, allow_hyphen_values = true)]
    tokens: Vec<String>,
}

#[derive(Parser)]
struct HelpArgs {
    /// Path to the JSON app description
    #[arg(short, long, value_name = "FILE")]
    schema: PathBuf,

    /// Command path to describe (default: the app itself)
    #[arg(value_name = "COMMAND")]
    command: Vec<String>,
}

#[derive(Parser)]
struct CheckArgs {
    /// Path to the JSON app description
    #[arg(short, long, value_name = "FILE")]
    schema: PathBuf,
}

/// JSON report printed by `bind`.
#[derive(Serialize)]
struct BindReport<'a> {
    command: String,
    #[serde(flatten)]
    bound: &'a BoundArguments,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Bind(args) => bind_command(args),
        Commands::Help(args) => help_command(args),
        Commands::Check(args) => check_command(args),
    }
}

fn load_app(path: &Path) -> Result<App> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read app description: {}", path.display()))?;
    let schema = AppSchema::from_json(&text)?;
    let app = schema
        .build()
        .with_context(|| format!("invalid app description: {}", path.display()))?;
    Ok(app)
}

fn bind_command(args: BindArgs) -> Result<()> {
    tracing::debug!("executing bind command");

    let app = load_app(&args.schema)?;
    let env = match &args.env_file {
        Some(path) => DotenvEnv::from_path(path)?,
        None => DotenvEnv::default(),
    };

    let outcome = if args.known {
        app.parse_known_args_with_env(&args.tokens, &env)?
    } else {
        app.parse_args_with_env(&args.tokens, &env)?
    };

    match outcome {
        ParseOutcome::Bound(invocation) => {
            let report = BindReport {
                command: invocation.path(),
                bound: &invocation.arguments,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        ParseOutcome::Help(request) => print!("{}", request.render()?),
        ParseOutcome::Version(text) => println!("{text}"),
    }
    Ok(())
}

fn help_command(args: HelpArgs) -> Result<()> {
    tracing::debug!("executing help command");

    let app = load_app(&args.schema)?;
    let mut chain = vec![&app];
    for name in &args.command {
        let Some(current) = chain.last().copied() else {
            break;
        };
        let next = current
            .entry(name)
            .ok_or_else(|| argbind::Error::UnknownCommand {
                token: name.clone(),
                available: current.command_names(),
            })?;
        chain.push(next);
    }

    print!("{}", argbind::help::render(&chain, None)?);
    Ok(())
}

fn check_command(args: CheckArgs) -> Result<()> {
    tracing::debug!("executing check command");

    let app = load_app(&args.schema)?;
    let names = app.command_names();
    println!("{}: ok ({} commands)", app.name, names.len());
    for name in names {
        println!("  {name}");
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
