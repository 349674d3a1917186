//! Harness configuration

use anyhow::{anyhow, Context, Result};
use hotel_runtime::RuntimeConfig;
use solana_sdk::signature::{read_keypair_file, Keypair};
use std::{env, path::PathBuf, str::FromStr};

const DEFAULT_KEYPAIR: &str = "~/.config/solana/id.json";

/// Which ledger the harness talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerMode {
    /// A JSON-RPC node at `HOTEL_RPC_URL`
    Rpc,
    /// The in-memory ledger running the hotel program simulator
    Local,
}

impl FromStr for LedgerMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rpc" => Ok(LedgerMode::Rpc),
            "local" => Ok(LedgerMode::Local),
            other => Err(anyhow!("unknown ledger mode `{other}` (expected `rpc` or `local`)")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Submission and confirmation settings
    pub runtime: RuntimeConfig,

    /// Fee payer keypair file; generated in local mode when unset
    pub keypair_path: Option<String>,

    /// Interface description to load instead of the bundled one
    pub idl_path: Option<PathBuf>,

    pub ledger: LedgerMode,

    /// `initialize` arguments
    pub room_count: u64,
    pub transfer_fee_basis_points: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let runtime = RuntimeConfig::from_env().context("Invalid runtime configuration")?;

        let ledger = env::var("HOTEL_LEDGER")
            .unwrap_or_else(|_| "rpc".to_string())
            .parse()?;

        Ok(Config {
            runtime,
            keypair_path: env::var("HOTEL_KEYPAIR").ok(),
            idl_path: env::var("HOTEL_IDL").ok().map(PathBuf::from),
            ledger,
            room_count: env::var("HOTEL_ROOM_COUNT")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("Invalid HOTEL_ROOM_COUNT")?,
            transfer_fee_basis_points: env::var("HOTEL_TRANSFER_FEE_BPS")
                .unwrap_or_else(|_| "100".to_string())
                .parse()
                .context("Invalid HOTEL_TRANSFER_FEE_BPS")?,
        })
    }

    /// Load the fee payer, generating a throwaway one for the local ledger
    pub fn load_keypair(&self) -> Result<Keypair> {
        let path = match (&self.keypair_path, self.ledger) {
            (Some(path), _) => path.as_str(),
            (None, LedgerMode::Local) => return Ok(Keypair::new()),
            (None, LedgerMode::Rpc) => DEFAULT_KEYPAIR,
        };

        let path = shellexpand::tilde(path).to_string();
        read_keypair_file(&path).map_err(|e| anyhow!("Failed to read keypair from {}: {}", path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::signature::{write_keypair_file, Signer};

    fn config(ledger: LedgerMode, keypair_path: Option<String>) -> Config {
        Config {
            runtime: RuntimeConfig::default(),
            keypair_path,
            idl_path: None,
            ledger,
            room_count: 10,
            transfer_fee_basis_points: 100,
        }
    }

    #[test]
    fn test_ledger_mode() {
        assert_eq!("local".parse::<LedgerMode>().unwrap(), LedgerMode::Local);
        assert_eq!(" RPC ".parse::<LedgerMode>().unwrap(), LedgerMode::Rpc);
        assert!("devnet".parse::<LedgerMode>().is_err());
    }

    #[test]
    fn test_load_keypair_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payer.json");
        let keypair = Keypair::new();
        write_keypair_file(&keypair, &path).unwrap();

        let loaded = config(LedgerMode::Rpc, Some(path.display().to_string()))
            .load_keypair()
            .unwrap();
        assert_eq!(loaded.pubkey(), keypair.pubkey());

        let missing = config(LedgerMode::Local, Some(dir.path().join("missing.json").display().to_string()));
        assert!(missing.load_keypair().is_err());
    }

    #[test]
    fn test_local_mode_generates_payer() {
        assert!(config(LedgerMode::Local, None).load_keypair().is_ok());
    }
}
