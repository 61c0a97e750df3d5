use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use ytwatch_feed::DEFAULT_FEED_BASE_URL;
use ytwatch_sync::{
    ArchiverConfig, MonitorConfig, DEFAULT_CRON, DEFAULT_DB_DRIVER, DEFAULT_DSN, DEFAULT_TZ,
};

#[derive(Debug, Parser)]
#[command(name = "ytwatch")]
#[command(about = "YouTube channel archiver and monitor")]
struct Cli {
    /// Archiver config file (JSON, or YAML by extension).
    #[arg(long, global = true, env = "YTWATCH_CONFIG", default_value = "config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Archive new videos of every configured channel into monthly files.
    Archive,
    /// Poll channels on a cron schedule and record new videos in the database.
    Monitor(MonitorArgs),
    /// Create the video table if it does not exist.
    Migrate(DatabaseArgs),
}

#[derive(Debug, Args)]
struct DatabaseArgs {
    #[arg(long = "db-driver", env = "YTWATCH_DB_DRIVER", default_value = DEFAULT_DB_DRIVER)]
    db_driver: String,
    #[arg(long, env = "YTWATCH_DSN", default_value = DEFAULT_DSN)]
    dsn: String,
}

#[derive(Debug, Args)]
struct MonitorArgs {
    #[arg(long, env = "YTWATCH_PROXY")]
    proxy: Option<String>,
    #[arg(long = "channel", env = "YTWATCH_CHANNEL", value_delimiter = ',')]
    channels: Vec<String>,
    #[command(flatten)]
    db: DatabaseArgs,
    /// Five- or six-field cron schedule. When both day-of-month and day-of-week are
    /// restricted, a day must match both of them, not either.
    #[arg(long, env = "YTWATCH_CRON", default_value = DEFAULT_CRON)]
    cron: String,
    #[arg(long, env = "YTWATCH_TZ", default_value = DEFAULT_TZ)]
    tz: String,
    #[arg(long, env = "YTWATCH_FEED_BASE_URL", default_value = DEFAULT_FEED_BASE_URL)]
    feed_base_url: String,
    /// Run a single sweep and exit.
    #[arg(long)]
    once: bool,
}

impl From<MonitorArgs> for MonitorConfig {
    fn from(args: MonitorArgs) -> Self {
        Self {
            proxy: args.proxy.filter(|p| !p.trim().is_empty()),
            channels: args.channels,
            db_driver: args.db.db_driver,
            dsn: args.db.dsn,
            cron: args.cron,
            tz: args.tz,
            feed_base_url: args.feed_base_url,
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Archive) {
        Commands::Archive => {
            let config = ArchiverConfig::load(&cli.config).await?;
            let summary = ytwatch_sync::run_archive(config).await?;
            for report in &summary.channels {
                println!("{}", report.summary_line());
            }
        }
        Commands::Monitor(args) => {
            let once = args.once;
            ytwatch_sync::run_monitor(args.into(), once).await?;
        }
        Commands::Migrate(db) => {
            ytwatch_sync::run_migrate(&db.db_driver, &db.dsn).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn monitor_flags_map_onto_config() {
        let cli = Cli::try_parse_from([
            "ytwatch",
            "monitor",
            "--channel",
            "UC1,UC2",
            "--channel",
            "UC3",
            "--db-driver",
            "sqlite",
            "--dsn",
            "sqlite://ledger.db",
            "--tz",
            "Asia/Tokyo",
            "--once",
        ])
        .expect("parse");
        let Some(Commands::Monitor(args)) = cli.command else {
            panic!("expected monitor");
        };
        assert!(args.once);
        let config: MonitorConfig = args.into();
        assert_eq!(config.channels, vec!["UC1", "UC2", "UC3"]);
        assert_eq!(config.db_driver, "sqlite");
        assert_eq!(config.tz, "Asia/Tokyo");
    }

    #[test]
    fn archive_is_the_default_command() {
        let cli = Cli::try_parse_from(["ytwatch", "--config", "channels.yaml"]).expect("parse");
        assert!(cli.command.is_none());
        assert_eq!(cli.config, PathBuf::from("channels.yaml"));
    }
}
