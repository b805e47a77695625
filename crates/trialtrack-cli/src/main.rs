use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "trialtrack-cli", version, about = "TrialTrack CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Project management
    Project {
        #[command(subcommand)]
        action: commands::project::ProjectAction,
    },
    /// Group and variable management
    Group {
        #[command(subcommand)]
        action: commands::group::GroupAction,
    },
    /// Cycle reporting flow
    Report {
        #[command(subcommand)]
        action: commands::report::ReportAction,
    },
    /// Counter management
    Counter {
        #[command(subcommand)]
        action: commands::counter::CounterAction,
    },
}

fn main() {
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Project { action } => commands::project::run(action),
        Commands::Group { action } => commands::group::run(action),
        Commands::Report { action } => commands::report::run(action),
        Commands::Counter { action } => commands::counter::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
