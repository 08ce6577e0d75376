mod commands;
mod logging;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use commands::GlobalArgs;
use lineage_migrate::MigrateError;

#[derive(Parser)]
#[command(name = "lineage")]
#[command(about = "Revision-graph schema migrations")]
#[command(version)]
struct Cli {
    /// YAML configuration file (defaults to ./lineage.yaml when present)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Directory containing revision files; repeat for several
    #[arg(long = "script-location", global = true)]
    script_locations: Vec<PathBuf>,

    /// Database connection string
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Emit logs and results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upgrade to a later revision
    Upgrade {
        /// Target revision, `heads`, a label, or `from:to` with --sql
        #[arg(default_value = "heads")]
        revision: String,

        /// Render SQL instead of running it
        #[arg(long)]
        sql: bool,

        /// Arbitrary value passed to revision scripts
        #[arg(long)]
        tag: Option<String>,
    },

    /// Revert to a previous revision (`-1` for one step, `base` for all)
    Downgrade {
        /// Target revision, or `from:to` with --sql
        #[arg(allow_hyphen_values = true)]
        revision: String,

        /// Render SQL instead of running it
        #[arg(long)]
        sql: bool,

        /// Arbitrary value passed to revision scripts
        #[arg(long)]
        tag: Option<String>,
    },

    /// Record revisions as applied without running them
    Stamp {
        /// Revisions to record
        #[arg(required = true)]
        revisions: Vec<String>,

        /// Replace every recorded head without checking it
        #[arg(long)]
        purge: bool,

        /// Render SQL instead of running it
        #[arg(long)]
        sql: bool,
    },

    /// List revisions in chronological order
    History {
        /// Range as `[start]:[end]`
        #[arg(default_value = ":", allow_hyphen_values = true)]
        range: String,

        /// Mark the revisions recorded in the database
        #[arg(long, short)]
        indicate_current: bool,
    },

    /// Show current heads of the revision graph
    Heads {
        /// Treat dependencies as down revisions
        #[arg(long)]
        resolve_dependencies: bool,
    },

    /// Show branch points
    Branches,

    /// Show the revisions recorded in the database
    Current,

    /// Show details of a revision
    Show {
        #[arg(allow_hyphen_values = true)]
        revision: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let kind = err
                .downcast_ref::<MigrateError>()
                .map(MigrateError::kind)
                .unwrap_or("Error");
            eprintln!("error[{}]: {}", kind, err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let args = GlobalArgs {
        config: cli.config,
        script_locations: cli.script_locations,
        database_url: cli.database_url,
        json: cli.json,
    };

    let config = commands::load_config(&args)?;
    logging::init_logging(&logging::LoggingConfig::from_config(&config, args.json))
        .map_err(|e| anyhow::anyhow!("failed to initialise logging: {}", e))?;

    let env = commands::environment(config)?;

    match cli.command {
        Commands::Upgrade { revision, sql, tag } => {
            commands::migrate::upgrade(&env, &args, &revision, sql, tag.as_deref()).await?;
        }
        Commands::Downgrade { revision, sql, tag } => {
            commands::migrate::downgrade(&env, &args, &revision, sql, tag.as_deref()).await?;
        }
        Commands::Stamp { revisions, purge, sql } => {
            commands::migrate::stamp(&env, &args, &revisions, purge, sql).await?;
        }
        Commands::History { range, indicate_current } => {
            commands::inspect::history(&env, &range, indicate_current).await?;
        }
        Commands::Heads { resolve_dependencies } => {
            commands::inspect::heads(&env, resolve_dependencies);
        }
        Commands::Branches => {
            commands::inspect::branches(&env);
        }
        Commands::Current => {
            commands::inspect::current(&env).await?;
        }
        Commands::Show { revision } => {
            commands::inspect::show(&env, &revision).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_downgrade_offset() {
        let cli = Cli::try_parse_from(["lineage", "downgrade", "-1", "--sql"]).unwrap();
        match cli.command {
            Commands::Downgrade { revision, sql, .. } => {
                assert_eq!(revision, "-1");
                assert!(sql);
            }
            _ => panic!("expected downgrade"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "lineage",
            "stamp",
            "a1",
            "b2",
            "--purge",
            "--script-location",
            "one",
            "--script-location",
            "two",
        ])
        .unwrap();

        assert_eq!(cli.script_locations, vec![PathBuf::from("one"), PathBuf::from("two")]);
        assert!(matches!(
            cli.command,
            Commands::Stamp { ref revisions, purge: true, .. } if revisions.len() == 2
        ));
    }

    #[test]
    fn test_stamp_takes_no_tag() {
        assert!(Cli::try_parse_from(["lineage", "stamp", "a1", "--tag", "x"]).is_err());
        assert!(Cli::try_parse_from(["lineage", "upgrade", "--tag", "x"]).is_ok());
    }
}
