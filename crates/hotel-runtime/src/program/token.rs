//! Token accounts as the simulators see them
//!
//! Mints and token accounts are reduced to supply and balance. The layouts are
//! Borsh, not the Token-2022 ones.

use super::{custom, overflow, TOKEN_2022_PROGRAM_ID};
use crate::ledger::{AccountStore, StoredAccount};
use borsh::{BorshDeserialize, BorshSerialize};
use solana_sdk::pubkey::Pubkey;

/// Token program `InsufficientFunds`
pub(crate) const INSUFFICIENT_FUNDS: u32 = 1;

/// Token program `OwnerMismatch`
pub(crate) const OWNER_MISMATCH: u32 = 4;

/// Mint with a transfer fee extension
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct TokenMint {
    pub supply: u64,
    pub transfer_fee_basis_points: u16,
    pub maximum_fee: u64,
}

impl TokenMint {
    pub fn with_fee(transfer_fee_basis_points: u16) -> Self {
        Self {
            supply: 0,
            transfer_fee_basis_points,
            maximum_fee: u64::MAX,
        }
    }
}

/// Balance of a token account
#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct TokenBalance {
    pub amount: u64,
}

impl TokenBalance {
    /// Token account holding `amount`, for seeding the local ledger
    pub fn account(amount: u64) -> StoredAccount {
        StoredAccount {
            owner: TOKEN_2022_PROGRAM_ID,
            // Borsh layout of a lone u64
            data: amount.to_le_bytes().to_vec(),
        }
    }
}

pub(crate) fn load_mint(accounts: &AccountStore, address: &Pubkey) -> Result<TokenMint, String> {
    accounts
        .get(address)
        .filter(|a| a.owner == TOKEN_2022_PROGRAM_ID)
        .and_then(|a| TokenMint::try_from_slice(&a.data).ok())
        .ok_or_else(|| "invalid account data for instruction".to_string())
}

pub(crate) fn store_mint(accounts: &mut AccountStore, address: Pubkey, mint: &TokenMint) -> Result<(), String> {
    accounts.insert(
        address,
        StoredAccount {
            owner: TOKEN_2022_PROGRAM_ID,
            data: mint.try_to_vec().map_err(|e| e.to_string())?,
        },
    );
    Ok(())
}

pub(crate) fn balance(accounts: &AccountStore, address: &Pubkey) -> u64 {
    accounts
        .get(address)
        .and_then(|a| TokenBalance::try_from_slice(&a.data).ok())
        .map_or(0, |b| b.amount)
}

pub(crate) fn transfer(accounts: &mut AccountStore, from: Pubkey, to: Pubkey, amount: u64) -> Result<(), String> {
    let available = balance(accounts, &from);
    if available < amount {
        return Err(custom(INSUFFICIENT_FUNDS));
    }
    accounts.insert(from, TokenBalance::account(available - amount));

    let received = balance(accounts, &to).checked_add(amount).ok_or_else(overflow)?;
    accounts.insert(to, TokenBalance::account(received));
    Ok(())
}

/// Mint `amount` new tokens of `mint` into `to`
pub(crate) fn mint_to(accounts: &mut AccountStore, mint_key: Pubkey, to: Pubkey, amount: u64) -> Result<(), String> {
    let mut mint = load_mint(accounts, &mint_key)?;
    mint.supply = mint.supply.checked_add(amount).ok_or_else(overflow)?;
    let held = balance(accounts, &to).checked_add(amount).ok_or_else(overflow)?;

    store_mint(accounts, mint_key, &mint)?;
    accounts.insert(to, TokenBalance::account(held));
    Ok(())
}

/// Burn `amount` tokens of `mint` held by `from`
pub(crate) fn burn(accounts: &mut AccountStore, mint_key: Pubkey, from: Pubkey, amount: u64) -> Result<(), String> {
    let held = balance(accounts, &from);
    if held < amount {
        return Err(custom(INSUFFICIENT_FUNDS));
    }
    let mut mint = load_mint(accounts, &mint_key)?;
    mint.supply = mint.supply.checked_sub(amount).ok_or_else(overflow)?;

    store_mint(accounts, mint_key, &mint)?;
    accounts.insert(from, TokenBalance::account(held - amount));
    Ok(())
}
