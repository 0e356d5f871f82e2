//! Binary entrypoint for the Kingpin CLI.
//!
//! Commands:
//! - `init` - write a starter `config.toml`
//! - `play [--account <0x..>]` - interactive console against the configured gateway
//! - `status` - print the configuration summary and counters
//!
//! See the library crate docs for module-level details: `kingpin::`.
use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use kingpin::config::Config;
use kingpin::console::{self, ConsoleCommand, HELP_TEXT};
use kingpin::game::types::Account;
use kingpin::game::{ClientSettings, GameClient};
use kingpin::gateway::local::LocalLedger;
use kingpin::gateway::Gateway;
use kingpin::metrics;
use kingpin::validation::parse_account;

#[derive(Parser)]
#[command(name = "kingpin")]
#[command(about = "Client for the Crypto Kingpin ledger trading game")]
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
    /// Write a default configuration file
    Init,
    /// Connect and play from an interactive console
    Play {
        /// Account to play as (defaults to client.account from the config)
        #[arg(short, long)]
        account: Option<String>,
    },
    /// Show configuration summary and counters
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            init_logging(&None, cli.verbose, true);
            if tokio::fs::metadata(&cli.config).await.is_ok() {
                return Err(anyhow!("{} already exists; not overwriting", cli.config));
            }
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);
        }
        Commands::Play { account } => {
            let config = Config::load(&cli.config).await?;
            init_logging(&Some(config.clone()), cli.verbose, false);
            config.validate()?;
            let account = match account.or_else(|| config.client.account.clone()) {
                Some(raw) => parse_account(&raw)
                    .map_err(|e| anyhow!("Invalid account {}: {}", raw, e))?,
                None => return Err(anyhow!("No account given and client.account is not set")),
            };
            let settings = ClientSettings::from_config(&config)?;
            info!(
                "Starting Kingpin v{} ({} gateway)",
                env!("CARGO_PKG_VERSION"),
                config.gateway.kind
            );

            match config.gateway.kind.as_str() {
                "local" => {
                    let local = &config.local;
                    let ledger = LocalLedger::builder(settings.spender.clone())
                        .config(local.clone())
                        .with_account(
                            account.clone(),
                            local.identity_tokens.clone(),
                            local.starting_balance(),
                        )
                        .build();
                    play(GameClient::new(Arc::new(ledger), settings), account).await?;
                }
                #[cfg(feature = "http-gateway")]
                "http" => {
                    let gateway = kingpin::gateway::http::HttpGateway::new(&config.gateway)?;
                    play(GameClient::new(Arc::new(gateway), settings), account).await?;
                }
                other => {
                    return Err(anyhow!(
                        "Gateway kind '{}' is not available in this build",
                        other
                    ))
                }
            }
        }
        Commands::Status => {
            let config = Config::load(&cli.config).await?;
            init_logging(&Some(config.clone()), cli.verbose, true);
            println!("Kingpin v{}", env!("CARGO_PKG_VERSION"));
            println!("Config: {}", cli.config);
            match config.validate() {
                Ok(()) => println!("Config check: ok"),
                Err(e) => println!("Config check: {}", e),
            }
            println!("Gateway: {} ({})", config.gateway.kind, config.gateway.endpoint);
            println!("Game address: {}", config.gateway.game_address);
            match config.gateway.confirmation_timeout() {
                Some(limit) => println!("Confirmation timeout: {:?}", limit),
                None => println!("Confirmation timeout: none"),
            }
            println!(
                "Default account: {}",
                config.client.account.as_deref().unwrap_or("(none)")
            );
            let m = metrics::snapshot();
            println!(
                "Transactions: {} submitted, {} confirmed, {} rejected",
                m.tx_submitted, m.tx_confirmed, m.tx_rejected
            );
        }
    }

    Ok(())
}

async fn play<G: Gateway>(mut client: GameClient<G>, account: Account) -> Result<()> {
    let mut status = client.status().subscribe();
    if client.connect(account).await.is_err() {
        println!("{}", client.status().current());
        return Ok(());
    }
    status.borrow_and_update();
    println!("{}", client.status().current());
    println!("Type 'help' for commands.");

    let mut seen = client.status().posted();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let outcome = run_command(&client, console::parse(&line)).await;
                if outcome == Outcome::Quit {
                    break;
                }
                status.borrow_and_update();
                let (mut messages, mark) = client.status().messages_since(seen);
                seen = mark;
                // The intent's own result is the newest message; anything
                // before it came from the encounter listener meanwhile.
                let own = match outcome {
                    Outcome::Intent { .. } => messages.pop(),
                    _ => None,
                };
                for message in messages {
                    println!("* {}", message);
                }
                match (outcome, own) {
                    (Outcome::Intent { failed: true }, Some(line)) => println!("! {}", line),
                    (_, Some(line)) => println!("{}", line),
                    _ => {}
                }
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                status.borrow_and_update();
                let (messages, mark) = client.status().messages_since(seen);
                seen = mark;
                for message in messages {
                    println!("* {}", message);
                }
            }
        }
    }
    client.disconnect();
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Quit,
    /// Handled locally; nothing posted.
    Shown,
    /// Ran a remote intent, which posted its result.
    Intent { failed: bool },
}

async fn run_command<G: Gateway>(client: &GameClient<G>, command: ConsoleCommand) -> Outcome {
    let result = match command {
        ConsoleCommand::Quit => return Outcome::Quit,
        ConsoleCommand::Empty => return Outcome::Shown,
        ConsoleCommand::Help => {
            println!("{}", HELP_TEXT);
            return Outcome::Shown;
        }
        ConsoleCommand::Unknown(word) => {
            println!("Unknown command '{}'. Type 'help'.", word);
            return Outcome::Shown;
        }
        ConsoleCommand::Invalid(reason) => {
            println!("{}", reason);
            return Outcome::Shown;
        }
        ConsoleCommand::Register => client.register().await,
        ConsoleCommand::Move(id) => client.move_to(id).await,
        ConsoleCommand::Goto(pos) => client.move_to_cell(pos).await,
        ConsoleCommand::Buy { asset, amount } => client.buy(asset, amount).await,
        ConsoleCommand::Sell { asset, amount } => client.sell(asset, amount).await,
        ConsoleCommand::Restore => client.restore_action_points().await,
        ConsoleCommand::Quote { asset, amount } => client.quote(asset, amount).await.map(|_| ()),
        ConsoleCommand::Map => {
            print!("{}", console::render_map(client.position()));
            return Outcome::Shown;
        }
        ConsoleCommand::Market => {
            match client.catalog() {
                Some(catalog) => {
                    let prices = if client.snapshot().is_some() {
                        client.market_prices().await.unwrap_or_else(|e| {
                            warn!("price lookup failed: {}", e);
                            BTreeMap::new()
                        })
                    } else {
                        BTreeMap::new()
                    };
                    let snapshot = client.snapshot();
                    print!(
                        "{}",
                        console::render_market(&catalog, snapshot.as_ref(), &prices)
                    );
                }
                None => println!("Game data not loaded"),
            }
            return Outcome::Shown;
        }
        ConsoleCommand::Status => {
            match client.player() {
                Some(view) => print!(
                    "{}",
                    console::render_player(client.catalog().as_deref(), &view.snapshot, view.position)
                ),
                None if client.is_registered() => println!("Player state not loaded"),
                None => println!("Not registered. Type 'register' to join."),
            }
            return Outcome::Shown;
        }
        ConsoleCommand::Messages => {
            for message in client.status().history() {
                println!("  {}", message);
            }
            return Outcome::Shown;
        }
    };
    Outcome::Intent {
        failed: result.is_err(),
    }
}

fn init_logging(config: &Option<Config>, verbosity: u8, echo_to_console: bool) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .and_then(|c| c.logging.level.parse().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let log_file = config.as_ref().and_then(|c| c.logging.file.clone());
    let opened = log_file.as_ref().and_then(|file| {
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(file)
            .ok()
    });
    match opened {
        Some(f) => {
            let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
            // Only echo to a terminal; the interactive console keeps its own output clean.
            let tee = echo_to_console && atty::is(atty::Stream::Stdout);
            builder.format(move |fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                let line = format!("{} [{}] {}", ts, record.level(), record.args());
                if let Ok(mut guard) = write_mutex.lock() {
                    let _ = writeln!(guard, "{}", line);
                }
                if tee {
                    writeln!(fmt, "{}", line)
                } else {
                    Ok(())
                }
            });
        }
        None => {
            if !echo_to_console {
                builder.filter_level(log::LevelFilter::Warn.min(base_level));
            }
            builder.format(|fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
            });
        }
    }
    let _ = builder.try_init();
}
