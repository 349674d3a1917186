//! Initialize harness
//!
//! Invokes the hotel program's `initialize` instruction with fresh `hotel`
//! and `room_mint` accounts, waits for the configured finality and prints
//! the transaction signature. Any failure exits non-zero.

mod config;

use anyhow::{Context, Result};
use config::{Config, LedgerMode};
use hotel_runtime::{
    program::{self, initialize_accounts, initialize_args, HotelOperation},
    Descriptor, HotelProgram, LedgerClient, LocalLedger, ProgramClient, RpcLedger,
};
use solana_sdk::signature::{Keypair, Signature, Signer};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let payer = Arc::new(config.load_keypair()?);

    let descriptor = Arc::new(match &config.idl_path {
        Some(path) => Descriptor::from_file(path)?,
        None => program::descriptor()?,
    });

    info!(
        "Initializing hotel on program {} via {:?} ledger (payer {})",
        descriptor.program_id(),
        config.ledger,
        payer.pubkey()
    );

    let signature = match config.ledger {
        LedgerMode::Local => {
            let ledger = Arc::new(LocalLedger::default().with_processor(descriptor.program_id(), HotelProgram));
            let client = ProgramClient::new(descriptor, ledger, payer, config.runtime.clone());
            initialize(&client, &config).await?
        }
        LedgerMode::Rpc => {
            let ledger = Arc::new(RpcLedger::new(
                config.runtime.rpc_url.clone(),
                config.runtime.target_finality,
            ));
            let client = ProgramClient::new(descriptor, ledger, payer, config.runtime.clone());
            initialize(&client, &config).await?
        }
    };

    println!("Your transaction signature {signature}");
    Ok(())
}

async fn initialize<L: LedgerClient>(client: &ProgramClient<L, HotelOperation>, config: &Config) -> Result<Signature> {
    let hotel = Keypair::new();
    let room_mint = Keypair::new();

    info!("Hotel account {}, room mint {}", hotel.pubkey(), room_mint.pubkey());

    let signature = client
        .invoke(
            HotelOperation::Initialize,
            &initialize_args(config.room_count, config.transfer_fee_basis_points),
            &initialize_accounts(hotel.pubkey(), client.payer().pubkey(), room_mint.pubkey()),
            &[&hotel, &room_mint],
        )
        .await
        .context("initialize failed")?;

    info!("Initialized hotel {} in {}", hotel.pubkey(), signature);
    Ok(signature)
}
