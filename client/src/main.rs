use clap::Parser;
use client::game::Intent;
use client::network::{Client, Command};
use log::warn;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Display name, at least 3 characters
    #[arg(short, long)]
    name: String,
}

/// Maps one input line to a command. Line-based stdin stands in for a real
/// input frontend; the mapping mirrors the usual key bindings.
fn parse_line(line: &str) -> Option<Command> {
    match line.trim() {
        "a" => Some(Command::Intent(Intent::MoveLeft)),
        "d" => Some(Command::Intent(Intent::MoveRight)),
        "w" => Some(Command::Intent(Intent::Rotate)),
        "s" => Some(Command::Intent(Intent::SoftDrop)),
        "" => Some(Command::Intent(Intent::HardDrop)),
        "start" => Some(Command::StartGame),
        _ => None,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    if args.name.trim().len() < 3 {
        return Err("name must be at least 3 characters".into());
    }

    let (command_tx, command_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if let Some(command) = parse_line(&line) {
                        if command_tx.send(command).is_err() {
                            break;
                        }
                    } else {
                        warn!("unrecognized input: {:?}", line.trim());
                    }
                }
                Ok(None) | Err(_) => break,
            }
        }
    });

    let client = Client::connect(&args.server, args.name.trim().to_string(), command_rx).await?;
    client.run().await
}
