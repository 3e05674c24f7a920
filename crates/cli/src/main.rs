//! CrewForge CLI: the main entry point.
//!
//! Commands:
//! - `orchestrate`: Run one demand through the full pipeline
//! - `history`    : Inspect and prune recorded runs
//! - `demand`     : List demand types or show the template for one
//! - `config`     : Validate, show, or initialize configuration

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "crewforge",
    about = "CrewForge: multi-agent content crews with focus-group validation",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "CREWFORGE_JSON_LOGS")]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a demand through analysis, crew execution and validation
    Orchestrate {
        /// Client whose brand context and history are used
        #[arg(short, long)]
        client: String,

        /// Demand type, e.g. instagram_post (see `crewforge demand list`)
        #[arg(short, long)]
        demand: String,

        /// What the deliverable is about
        #[arg(short, long)]
        topic: String,

        /// Business objective
        #[arg(short, long)]
        objective: Option<String>,

        /// Force the focus group on or off
        #[arg(long)]
        focus_group: Option<bool>,

        /// Minimum average focus-group score (0–10)
        #[arg(long)]
        min_score: Option<f32>,

        /// Print the full response as JSON
        #[arg(long)]
        json: bool,
    },

    /// Inspect recorded runs
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Demand types and their crew templates
    Demand {
        #[command(subcommand)]
        action: DemandAction,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum HistoryAction {
    /// Most recent runs for a client
    List {
        #[arg(short, long)]
        client: String,
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// Runs whose output or topic mentions a term
    Search {
        #[arg(short, long)]
        client: String,
        term: String,
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// Aggregated agent performance
    Stats {
        #[arg(short, long)]
        client: String,
        /// Narrow to one agent id
        #[arg(short, long)]
        agent: Option<String>,
    },
    /// Delete runs older than N days
    Prune {
        #[arg(short, long)]
        days: u32,
    },
}

#[derive(Subcommand)]
enum DemandAction {
    /// List known demand types
    List,
    /// Show the template chosen for a demand type
    Analyze { demand_type: String },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate the configuration file and environment
    Validate,
    /// Print the effective configuration
    Show,
    /// Print the configuration file path
    Path,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json_logs);

    match cli.command {
        Commands::Orchestrate {
            client,
            demand,
            topic,
            objective,
            focus_group,
            min_score,
            json,
        } => {
            let request = commands::orchestrate::request(
                client,
                demand,
                topic,
                objective,
                focus_group,
                min_score,
            );
            commands::orchestrate::run(request, json).await?
        }
        Commands::History { action } => match action {
            HistoryAction::List { client, limit } => commands::history::list(&client, limit).await?,
            HistoryAction::Search { client, term, limit } => {
                commands::history::search(&client, &term, limit).await?
            }
            HistoryAction::Stats { client, agent } => {
                commands::history::stats(&client, agent.as_deref()).await?
            }
            HistoryAction::Prune { days } => commands::history::prune(days).await?,
        },
        Commands::Demand { action } => match action {
            DemandAction::List => commands::demand::list(),
            DemandAction::Analyze { demand_type } => commands::demand::analyze(&demand_type)?,
        },
        Commands::Config { action } => match action {
            ConfigAction::Validate => commands::config_cmd::validate()?,
            ConfigAction::Show => commands::config_cmd::show()?,
            ConfigAction::Path => commands::config_cmd::path(),
            ConfigAction::Init { force } => commands::config_cmd::init(force)?,
        },
    }

    Ok(())
}

fn init_tracing(verbose: bool, json: bool) {
    let filter = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_orchestrate() {
        let cli = Cli::try_parse_from([
            "crewforge",
            "orchestrate",
            "--client",
            "acme",
            "--demand",
            "instagram_post",
            "--topic",
            "lançamento de produto",
            "--focus-group",
            "false",
        ])
        .unwrap();
        match cli.command {
            Commands::Orchestrate {
                client, focus_group, json, ..
            } => {
                assert_eq!(client, "acme");
                assert_eq!(focus_group, Some(false));
                assert!(!json);
            }
            _ => panic!("expected orchestrate"),
        }
    }

    #[test]
    fn parses_history_prune() {
        let cli =
            Cli::try_parse_from(["crewforge", "-v", "history", "prune", "--days", "30"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::History {
                action: HistoryAction::Prune { days: 30 }
            }
        ));
    }
}
