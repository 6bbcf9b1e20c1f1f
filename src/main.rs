//! Binary entrypoint for the tcbbs CLI.
//!
//! Commands:
//! - `start` - run the BBS server over the JSON-lines stdio bridge
//! - `init` - create a starter `config.toml` and the data directory
//! - `status` - print store counts and configured peers
//!
//! Logs go to stderr (and the configured log file); stdout carries outgoing
//! messages for the radio bridge.
use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;
use std::str::FromStr;
use tokio::sync::mpsc;

use tcbbs::bbs::BbsServer;
use tcbbs::config::Config;
use tcbbs::mesh::stdio;

#[derive(Parser)]
#[command(name = "tcbbs")]
#[command(about = "A store-and-forward BBS for Meshtastic mesh networks")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the BBS server, reading packets from stdin and writing messages to stdout
    Start,
    /// Write a default configuration file and create the data directory
    Init,
    /// Show BBS status and statistics
    Status,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(run(cli));
    // A pending stdin read cannot be cancelled; don't wait for it
    runtime.shutdown_background();
    result
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Start => {
            let config = Config::load(&cli.config).await?;
            init_logging(&Some(config.clone()), cli.verbose);
            info!("Starting tcbbs v{}", env!("CARGO_PKG_VERSION"));

            let mut bbs = BbsServer::new(config).await?;
            let (event_tx, event_rx) = mpsc::unbounded_channel();
            let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
            let _reader = stdio::spawn_stdin_reader(event_tx);
            let writer = stdio::spawn_stdout_writer(outgoing_rx);
            bbs.attach_transport(event_rx, outgoing_tx);

            info!("BBS server starting...");
            bbs.run().await?;
            // Outgoing sender is gone after shutdown; let the writer drain
            drop(bbs);
            let _ = writer.await;
        }
        Commands::Init => {
            init_logging(&None, cli.verbose);
            info!("Initializing new BBS configuration");
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);
            let cfg = Config::default();
            tokio::fs::create_dir_all(&cfg.storage.data_dir).await?;
            info!("Created data directory {}", cfg.storage.data_dir);
        }
        Commands::Status => {
            let config = Config::load(&cli.config).await?;
            init_logging(&Some(config.clone()), cli.verbose);
            let bbs = BbsServer::new(config).await?;
            bbs.show_status().await?;
        }
    }

    Ok(())
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .and_then(|c| log::LevelFilter::from_str(&c.logging.level).ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);
    // sled is chatty at debug
    builder.filter_module("sled", log::LevelFilter::Warn);

    let log_file = config.as_ref().and_then(|cfg| {
        cfg.logging.file.as_ref().and_then(|file| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(file)
                .ok()
        })
    });
    let security_path = config.as_ref().and_then(|c| c.logging.security_file.clone());

    if let Some(f) = log_file {
        let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
        // Console output only when someone is watching stderr
        let is_tty = atty::is(atty::Stream::Stderr);
        builder.format(move |fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            let line = format!("{} [{}] {}", ts, record.level(), record.args());
            if let Ok(mut guard) = write_mutex.lock() {
                let _ = writeln!(guard, "{}", line);
            }
            if record.target() == "security" {
                if let Some(ref sec_path) = security_path {
                    if let Ok(mut sf) = std::fs::OpenOptions::new()
                        .create(true)
                        .append(true)
                        .open(sec_path)
                    {
                        let _ = writeln!(sf, "{}", line);
                    }
                }
            }
            if is_tty {
                writeln!(fmt, "{}", line)
            } else {
                Ok(())
            }
        });
    } else {
        builder.format(|fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
        });
    }
    let _ = builder.try_init();
}
