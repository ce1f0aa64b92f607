//! wreck_probe: a terminal stand-in for the chat-platform adapter.
//!
//! Connects to a running `wreckerd`, announces one probe channel, forwards
//! stdin lines as directives from a single fake participant, and pretty-prints
//! the render cards that come back. Handy for poking the game without any
//! chat platform in the loop.

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use wreckproto::gateway::{self, Card, ChannelRef, GatewayDown, GatewayUp};
use wreckproto::{ChannelId, UserId};

const PROBE_CHANNEL: ChannelId = ChannelId(1);

fn usage_and_exit() -> ! {
    eprintln!(
        "wreck_probe\n\n\
USAGE:\n  wreck_probe [--addr HOST:PORT] [--user NAME]\n\n\
ENV:\n  WRECK_ADDR   default 127.0.0.1:4600\n  WRECK_USER   default probe\n"
    );
    std::process::exit(2);
}

#[derive(Clone, Debug)]
struct Config {
    addr: String,
    user: UserId,
}

fn parse_args() -> Config {
    let mut addr = std::env::var("WRECK_ADDR").unwrap_or_else(|_| "127.0.0.1:4600".to_string());
    let mut user = UserId::new(std::env::var("WRECK_USER").unwrap_or_else(|_| "probe".to_string()));

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--addr" => addr = it.next().unwrap_or_else(|| usage_and_exit()),
            "--user" => user = UserId::new(it.next().unwrap_or_else(|| usage_and_exit())),
            "-h" | "--help" => usage_and_exit(),
            _ => usage_and_exit(),
        }
    }

    Config { addr, user }
}

fn print_card(card: &Card) {
    println!("== {} ==", card.title);
    if !card.description.is_empty() {
        println!("{}", card.description);
    }
    for (name, value) in &card.fields {
        println!("  {name}: {value}");
    }
    if let Some(url) = &card.image {
        println!("  [image] {url}");
    }
    println!();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = parse_args();

    let stream = TcpStream::connect(&cfg.addr)
        .await
        .with_context(|| format!("connect {}", cfg.addr))?;
    let (rd, mut wr) = stream.into_split();
    let mut server_lines = BufReader::new(rd).lines();

    let hello = gateway::encode_up(&GatewayUp::Hello {
        channels: vec![ChannelRef {
            id: PROBE_CHANNEL,
            name: "#probe".to_string(),
        }],
    });
    wr.write_all(format!("{hello}\n").as_bytes()).await?;

    println!("connected to {} as {}; type commands:", cfg.addr, cfg.user);
    let mut stdin_lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = stdin_lines.next_line() => {
                let Some(line) = line? else {
                    return Ok(());
                };
                if line.trim().is_empty() {
                    continue;
                }
                let msg = gateway::encode_up(&GatewayUp::Directive {
                    user: cfg.user.clone(),
                    channel: PROBE_CHANNEL,
                    text: line,
                });
                wr.write_all(format!("{msg}\n").as_bytes()).await?;
            }
            line = server_lines.next_line() => {
                let Some(line) = line? else {
                    println!("server closed the connection");
                    return Ok(());
                };
                match gateway::decode_down(&line) {
                    Ok(GatewayDown::Render { card, .. }) => print_card(&card),
                    Err(e) => eprintln!("bad line from server: {e}"),
                }
            }
        }
    }
}
