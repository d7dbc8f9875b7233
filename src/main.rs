use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use longterm::core::log::init_logging;
use longterm::core::projection::{MAX_LOOKBACK_DAYS, ProjectionRequest};
use longterm::core::simulator::{Cadence, Resolution};

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum InvestmentType {
    Single,
    Recurring,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// List supported assets
    Assets {
        /// Language for asset names
        #[arg(long, default_value = "en")]
        lang: String,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show the daily price series for an asset
    Prices {
        #[arg(short, long)]
        asset: String,
        /// Lookback window in days (1-3650)
        #[arg(
            short,
            long,
            default_value_t = 365,
            value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_LOOKBACK_DAYS))
        )]
        days: u32,
        #[arg(long)]
        json: bool,
    },
    /// Project the growth of a historical investment
    Calculate {
        #[arg(short, long)]
        asset: String,
        /// How many years ago the investment started (1-10)
        #[arg(short, long)]
        years: u32,
        /// Total amount to invest
        #[arg(long)]
        amount: f64,
        #[arg(short = 't', long = "type", value_enum, default_value = "single")]
        investment_type: InvestmentType,
        /// Contribution cadence for recurring plans
        #[arg(short, long)]
        frequency: Option<Cadence>,
        /// Chart resolution (per_contribution or per_sample)
        #[arg(short, long)]
        resolution: Option<Resolution>,
        #[arg(long)]
        json: bool,
    },
    /// Show today's USD exchange rates
    Rates {
        #[arg(long)]
        json: bool,
    },
    /// Run the HTTP API
    Serve {
        /// Address to bind, overrides server.bind_addr
        #[arg(short, long)]
        bind: Option<String>,
    },
}

impl From<Commands> for longterm::AppCommand {
    fn from(cmd: Commands) -> longterm::AppCommand {
        match cmd {
            Commands::Assets { lang, json } => longterm::AppCommand::Assets { lang, json },
            Commands::Prices { asset, days, json } => {
                longterm::AppCommand::Prices { asset, days, json }
            }
            Commands::Calculate {
                asset,
                years,
                amount,
                investment_type,
                frequency,
                resolution,
                json,
            } => longterm::AppCommand::Calculate {
                request: ProjectionRequest {
                    asset,
                    years_ago: Some(years),
                    amount: Some(amount),
                    investment_type: Some(
                        match investment_type {
                            InvestmentType::Single => "single",
                            InvestmentType::Recurring => "recurring",
                        }
                        .to_string(),
                    ),
                    frequency: frequency.map(|f| f.to_string()),
                },
                resolution,
                json,
            },
            Commands::Rates { json } => longterm::AppCommand::Rates { json },
            Commands::Serve { bind } => longterm::AppCommand::Serve { bind_addr: bind },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => match cli.config_path.as_deref() {
            Some(path) => longterm::cli::setup::setup_at_path(path),
            None => longterm::cli::setup::setup(),
        },
        Some(cmd) => longterm::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
