use clap::{CommandFactory, Parser, Subcommand};
use streak_core::Config;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "streak-cli", version, about = "Streaks CLI")]
struct Cli {
    /// Act as this user instead of `cli.owner` from the config
    #[arg(long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Streak(commands::streak::StreakAction),
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Print shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

const DEFAULT_LOG_FILTER: &str = "info";

fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Streak(action) => {
            let config = Config::load()?;
            init_tracing(&config.log.filter);
            let owner = cli.user.unwrap_or_else(|| config.cli.owner.clone());
            commands::streak::run(action, &owner, &config)
        }
        // Must not load the config: `config reset` repairs a broken file.
        Commands::Config { action } => {
            init_tracing(DEFAULT_LOG_FILTER);
            commands::config::run(action)
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "streak-cli", &mut std::io::stdout());
            Ok(())
        }
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
