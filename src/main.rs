//! Telepath CLI - pair with a wallet and call its capabilities.
//!
//! This is the main binary entry point. See the `telepath` library for the
//! channel, correlation and signing proxy implementation.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use telepath::constants::DEFAULT_CONNECT_URL;
use telepath::{
    qr, Config, EncryptedChannel, HttpProvider, PairingSecret, Provider, QueuingServiceClient,
    RequestCorrelator, SigningProvider,
};

#[derive(Parser)]
#[command(name = "telepath")]
#[command(version)]
#[command(about = "Encrypted relay channel to a mobile identity wallet")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new channel and print its pairing link.
    NewChannel {
        /// Base URL the pairing fragment is appended to.
        #[arg(long, default_value = DEFAULT_CONNECT_URL)]
        base_url: String,
        /// Also print the link as a QR code.
        #[arg(long)]
        qr: bool,
    },
    /// Send one JSON-RPC request to the wallet and print the result.
    Call {
        /// Pairing link of the channel.
        #[arg(long)]
        link: String,
        /// Method name.
        method: String,
        /// Parameters as JSON.
        params: Option<String>,
    },
    /// Sign a transaction with the wallet and submit it to a node.
    SendTransaction {
        /// Pairing link of the channel.
        #[arg(long)]
        link: String,
        /// Node JSON-RPC URL (defaults to `node_url` from the config).
        #[arg(long)]
        node: Option<String>,
        /// Transaction object as JSON.
        transaction: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::NewChannel { base_url, qr } => {
            let link = PairingSecret::generate().connect_url(&base_url);
            if qr {
                for line in qr::render_lines(&link) {
                    println!("{line}");
                }
                println!();
            }
            println!("{link}");
        }
        Commands::Call {
            link,
            method,
            params,
        } => {
            let params = params
                .map(|p| parse_json(&p, "params"))
                .transpose()?;
            let correlator = open_correlator(&config, &link)?;
            let result = correlator.call(&method, params).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::SendTransaction {
            link,
            node,
            transaction,
        } => {
            let transaction = parse_json(&transaction, "transaction")?;
            let node_url = node
                .or_else(|| config.node_url.clone())
                .context("No node URL: pass --node or set node_url in the config")?;

            let node = Arc::new(HttpProvider::with_timeout(
                &node_url,
                config.request_timeout(),
            ));
            let wallet = Arc::new(open_correlator(&config, &link)?);
            let provider = SigningProvider::new(node, wallet);

            let hash = provider
                .request("eth_sendTransaction", Value::Array(vec![transaction]))
                .await?;
            println!("{}", serde_json::to_string_pretty(&hash)?);
        }
    }

    Ok(())
}

fn open_correlator(config: &Config, link: &str) -> Result<RequestCorrelator> {
    let queuing = Arc::new(QueuingServiceClient::with_timeout(
        &config.queuing_url,
        config.request_timeout(),
    ));
    let channel = EncryptedChannel::from_link(link, queuing).context("Invalid pairing link")?;
    Ok(RequestCorrelator::with_config(
        Arc::new(channel),
        config.poller_config(),
    ))
}

fn parse_json(text: &str, what: &str) -> Result<Value> {
    serde_json::from_str(text).with_context(|| format!("{what} is not valid JSON"))
}
