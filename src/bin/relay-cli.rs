use alloy::primitives::hex;
use clap::{Parser, Subcommand};
use serde_json::Value;

use block_relay::consumer::{BlockConsumer, ConsumerConfig};

#[derive(Parser)]
#[command(name = "relay-cli")]
#[command(about = "Inspect and consume a running block relay", long_about = None)]
struct Cli {
    /// Relay address as host:port.
    #[arg(short, long, default_value = "127.0.0.1:21111")]
    addr: String,

    /// Use https/wss instead of http/ws.
    #[arg(long)]
    tls: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show connection and delivery state
    Status {
        #[arg(long, default_value = "/status")]
        route: String,
    },
    /// Connect as the consumer and print every block received
    Consume {
        /// Stop after this many blocks.
        #[arg(short = 'n', long)]
        max_blocks: Option<u64>,

        #[arg(long, default_value = "/block")]
        send_route: String,

        #[arg(long, default_value = "/acknowledge")]
        ack_route: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Status { route } => {
            let scheme = if cli.tls { "https" } else { "http" };
            let res = reqwest::Client::new()
                .get(format!("{}://{}{}", scheme, cli.addr, route))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Consume {
            max_blocks,
            send_route,
            ack_route,
        } => {
            let scheme = if cli.tls { "wss" } else { "ws" };
            let mut config = ConsumerConfig::new(format!("{}://{}", scheme, cli.addr));
            config.send_route = send_route;
            config.ack_route = ack_route;
            config.max_blocks = max_blocks;

            let consumer = BlockConsumer::new(config);
            let run = consumer.run(|record| {
                println!(
                    "block {} {} txs={} gas_used={}",
                    record.block.number,
                    hex::encode(&record.block.hash),
                    record.block.tx_count,
                    record.block.gas_used
                );
            });

            tokio::select! {
                result = run => {
                    let delivered = result?;
                    eprintln!("Received {} blocks", delivered);
                }
                _ = tokio::signal::ctrl_c() => {
                    eprintln!("Interrupted");
                }
            }
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: relay returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
