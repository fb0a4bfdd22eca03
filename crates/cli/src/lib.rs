pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "mabar",
    about = "MaBar operator CLI",
    long_about = "Operate MaBar runtime readiness, migrations, config inspection, demo data, and an interactive chat loop.",
    after_help = "Examples:\n  mabar doctor --json\n  mabar config\n  mabar seed\n  mabar chat --demo"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic demo dataset into the hosted match store")]
    Seed,
    #[command(about = "Run end-to-end readiness checks with per-check timing details")]
    Smoke,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, store credentials, and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Interactive chat loop against the configured assistant pipeline")]
    Chat {
        #[arg(long, help = "Use the in-memory demo store instead of the hosted service")]
        demo: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Smoke => commands::smoke::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Chat { demo } => commands::chat::run(demo),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
