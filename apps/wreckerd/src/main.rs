//! wreckerd: the encounter-game daemon.
//!
//! Owns the game core (catalog, ledger, encounter slot, battles, spawn
//! scheduler) and exposes it to one chat-platform adapter over a TCP socket
//! speaking the `wreckproto` newline-delimited JSON gateway protocol. The
//! adapter owns the platform connection and all rich formatting; this process
//! owns every decision.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{info, warn, Level};
use wreckcore::catalog::Catalog;
use wreckcore::ledger::Ledger;
use wreckcore::{Game, GameConfig};
use wreckproto::gateway::{self, GatewayDown, GatewayUp};

fn usage_and_exit() -> ! {
    eprintln!(
        "wreckerd\n\n\
USAGE:\n  wreckerd [--bind HOST:PORT]\n\n\
ENV:\n  WRECK_BIND                default 127.0.0.1:4600\n  WRECK_CATALOG             default data/ships.json\n  WRECK_LEDGER              default var/ledger.json\n  WRECK_SPAWN_PERIOD_MS     default 60000\n  WRECK_ACTION_TIMEOUT_MS   default 30000\n  WRECK_BEG_COOLDOWN_S      default 3600\n  WRECK_START_BALANCE       default 30000\n  WRECK_BOSS_SHIPS          default Leviathan (comma-separated, never spawned)\n  WRECK_SEED                optional u64 (deterministic session)\n"
    );
    std::process::exit(2);
}

#[derive(Clone, Debug)]
struct Config {
    bind: SocketAddr,
    catalog_path: PathBuf,
    ledger_path: PathBuf,
    game: GameConfig,
}

fn parse_args() -> Config {
    let mut bind: SocketAddr = std::env::var("WRECK_BIND")
        .unwrap_or_else(|_| "127.0.0.1:4600".to_string())
        .parse()
        .unwrap_or_else(|_| usage_and_exit());

    let catalog_path: PathBuf = std::env::var("WRECK_CATALOG")
        .unwrap_or_else(|_| "data/ships.json".to_string())
        .into();
    let ledger_path: PathBuf = std::env::var("WRECK_LEDGER")
        .unwrap_or_else(|_| "var/ledger.json".to_string())
        .into();

    let spawn_period_ms: u64 = std::env::var("WRECK_SPAWN_PERIOD_MS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(60_000)
        .max(1_000);
    let action_timeout_ms: u64 = std::env::var("WRECK_ACTION_TIMEOUT_MS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(30_000)
        .max(100);
    let beg_cooldown_s: u64 = std::env::var("WRECK_BEG_COOLDOWN_S")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3_600);
    let starting_balance: i64 = std::env::var("WRECK_START_BALANCE")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(30_000)
        .max(0);
    let boss_ships: Vec<String> = std::env::var("WRECK_BOSS_SHIPS")
        .unwrap_or_else(|_| "Leviathan".to_string())
        .split(',')
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect();
    let seed: Option<u64> = std::env::var("WRECK_SEED")
        .ok()
        .and_then(|v| v.parse().ok());

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--bind" => {
                let v = it.next().unwrap_or_else(|| usage_and_exit());
                bind = v.parse().unwrap_or_else(|_| usage_and_exit());
            }
            "-h" | "--help" => usage_and_exit(),
            _ => usage_and_exit(),
        }
    }

    Config {
        bind,
        catalog_path,
        ledger_path,
        game: GameConfig {
            starting_balance,
            spawn_period: Duration::from_millis(spawn_period_ms),
            action_timeout: Duration::from_millis(action_timeout_ms),
            beg_cooldown: Duration::from_secs(beg_cooldown_s),
            boss_ships,
            seed,
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,wreckerd=info".into()),
        )
        .with_target(false)
        .with_max_level(Level::INFO)
        .init();

    let cfg = parse_args();

    // The catalog is the one load that may kill the process: nothing below
    // can function without it.
    let catalog = Catalog::load(&cfg.catalog_path)
        .with_context(|| format!("load catalog {}", cfg.catalog_path.display()))?;
    info!(ships = catalog.len(), path = %cfg.catalog_path.display(), "catalog loaded");

    if let Some(parent) = cfg.ledger_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create ledger dir {}", parent.display()))?;
    }
    let ledger = Ledger::load(cfg.ledger_path.clone())
        .with_context(|| format!("load ledger {}", cfg.ledger_path.display()))?;
    info!(participants = ledger.len(), path = %cfg.ledger_path.display(), "ledger loaded");

    let (out_tx, mut out_rx) = mpsc::channel::<GatewayDown>(1024);
    let game = Game::new(cfg.game.clone(), catalog, ledger, out_tx);

    tokio::spawn(Arc::clone(&game).run_spawn_scheduler());

    let listener = TcpListener::bind(cfg.bind).await?;
    info!(bind = %cfg.bind, "wreckerd listening for an adapter");

    // One adapter at a time; a dropped connection just waits for the next one.
    loop {
        let (stream, peer) = listener.accept().await?;
        info!(peer = %peer, "adapter connected");
        if let Err(e) = handle_adapter(stream, &game, &mut out_rx).await {
            warn!(peer = %peer, err = %e, "adapter connection ended with error");
        } else {
            info!(peer = %peer, "adapter disconnected");
        }
    }
}

async fn handle_adapter(
    stream: TcpStream,
    game: &Arc<Game>,
    out_rx: &mut mpsc::Receiver<GatewayDown>,
) -> anyhow::Result<()> {
    let (rd, mut wr) = stream.into_split();
    let mut lines = BufReader::new(rd).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    return Ok(());
                };
                if line.trim().is_empty() {
                    continue;
                }
                match gateway::decode_up(&line) {
                    Ok(GatewayUp::Hello { channels }) => {
                        game.set_channels(channels).await;
                    }
                    Ok(GatewayUp::Directive { user, channel, text }) => {
                        game.handle_directive(user, channel, text).await;
                    }
                    Err(e) => {
                        warn!(err = %e, "ignoring bad gateway line");
                    }
                }
            }
            msg = out_rx.recv() => {
                // The out channel lives as long as the game; recv only yields
                // None at shutdown.
                let Some(msg) = msg else {
                    return Ok(());
                };
                let mut payload = gateway::encode_down(&msg);
                payload.push('\n');
                wr.write_all(payload.as_bytes()).await?;
            }
        }
    }
}
