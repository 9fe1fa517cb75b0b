use anyhow::Result;
use clap::Parser;

mod commands;
mod config;
mod stdio;

use config::Config;

#[derive(Debug, Parser)]
#[command(name = "oplimit", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Read/write operations per second (default: from config, or 10)
    #[arg(long, global = true)]
    rate: Option<u32>,

    /// Operations allowed ahead of the pace (default: from config, or 0)
    #[arg(long, global = true)]
    burst: Option<usize>,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Copy stdin to stdout at a limited operation rate
    ///
    /// Every read from stdin and every write to stdout counts as one
    /// operation against the same limit. Byte volume is not limited: use
    /// --chunk-size to control how much each read may pick up.
    ///
    /// Pacing runs in cycles of floor(100 / rate) seconds, after each of
    /// which up to 100 operations are released. Rates that do not divide
    /// 100 are approximated, and rates above 100 are not paced at all.
    Relay {
        /// Bytes requested per read (default: from config, or 4096)
        #[arg(long)]
        chunk_size: Option<usize>,
    },
    /// Relay TCP connections to an upstream, limiting each client
    ///
    /// Each accepted connection is wrapped in its own limiter, so reads
    /// from and writes to the client are throttled independently of other
    /// clients. The upstream side is not throttled.
    Proxy {
        /// Address to listen on, e.g. 127.0.0.1:7000
        #[arg(long)]
        listen: String,

        /// Address to relay connections to, e.g. 127.0.0.1:8000
        #[arg(long)]
        upstream: String,

        /// Bytes requested per read (default: from config, or 4096)
        #[arg(long)]
        chunk_size: Option<usize>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, clap::Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Print the config file path
    Path,
    /// Print an example config file
    Example,
    /// Create the config file with defaults
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so that relayed data on stdout stays clean.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Relay { chunk_size } => {
            let config = Config::load()?.with_overrides(cli.rate, cli.burst);
            let chunk_size = chunk_size.unwrap_or(config.chunk_size);
            commands::run_relay(config.limits()?, chunk_size).await?;
        }
        Commands::Proxy {
            listen,
            upstream,
            chunk_size,
        } => {
            let config = Config::load()?.with_overrides(cli.rate, cli.burst);
            let chunk_size = chunk_size.unwrap_or(config.chunk_size);
            commands::run_proxy(listen, upstream, config.limits()?, chunk_size).await?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::show_config(cli.rate, cli.burst)?,
            ConfigAction::Path => commands::config::show_path()?,
            ConfigAction::Example => commands::config::show_example()?,
            ConfigAction::Init => commands::config::init_config()?,
        },
    }

    Ok(())
}
