//! Liquidity pool program
//!
//! Users deposit USDC and receive LP tokens one for one; burning LP tokens
//! returns the same amount of USDC. The LP mint carries a transfer fee set
//! when the pool is created.

use super::{
    custom, decode_args, decode_operation, meta, overflow,
    token::{burn, load_mint, mint_to, store_mint, transfer, TokenMint, OWNER_MISMATCH},
    ACCOUNT_DISCRIMINATOR_MISMATCH, ACCOUNT_NOT_INITIALIZED, ASSOCIATED_TOKEN_PROGRAM_ID, TOKEN_2022_PROGRAM_ID,
};
use crate::{
    descriptor::{Descriptor, DescriptorError, Operation},
    ledger::{AccountStore, ProgramProcessor, StoredAccount},
    transaction::instructions::ArgValue,
};
use borsh::{BorshDeserialize, BorshSerialize};
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey,
    pubkey::Pubkey,
    system_program, sysvar,
};
use tracing::debug;

/// Address the pool program is deployed at
pub const LIQUIDITY_POOL_PROGRAM_ID: Pubkey = pubkey!("Fg6PaFpoGXkYsidMpWTK6W2BeZ7FEfcYsg476zPFsLnS");

pub const POOL_IDL: &str = include_str!("../../../../idl/liquidity_pool.json");

/// First 8 bytes of `sha256("account:Pool")`
pub const POOL_ACCOUNT_DISCRIMINATOR: [u8; 8] = [241, 154, 109, 4, 17, 177, 109, 188];

const INSUFFICIENT_LIQUIDITY: u32 = 6000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolOperation {
    InitializePool,
    ProvideLiquidity,
    WithdrawLiquidity,
}

impl Operation for PoolOperation {
    const ALL: &'static [Self] = &[
        PoolOperation::InitializePool,
        PoolOperation::ProvideLiquidity,
        PoolOperation::WithdrawLiquidity,
    ];

    fn name(self) -> &'static str {
        match self {
            PoolOperation::InitializePool => "initialize_pool",
            PoolOperation::ProvideLiquidity => "provide_liquidity",
            PoolOperation::WithdrawLiquidity => "withdraw_liquidity",
        }
    }
}

pub fn descriptor() -> Result<Descriptor<PoolOperation>, DescriptorError> {
    Descriptor::from_json(POOL_IDL)
}

// ================================
// Account lists and arguments
// ================================

/// `pool` and `lp_token_mint` are fresh keypairs that sign their own creation
pub fn initialize_pool_accounts(pool: Pubkey, authority: Pubkey, usdc_mint: Pubkey, lp_token_mint: Pubkey) -> Vec<AccountMeta> {
    vec![
        AccountMeta::new(pool, true),
        AccountMeta::new(authority, true),
        AccountMeta::new_readonly(usdc_mint, false),
        AccountMeta::new(lp_token_mint, true),
        AccountMeta::new_readonly(TOKEN_2022_PROGRAM_ID, false),
        AccountMeta::new_readonly(system_program::ID, false),
        AccountMeta::new_readonly(sysvar::rent::ID, false),
    ]
}

/// Token accounts touched by a deposit or a withdrawal
#[derive(Debug, Clone, Copy)]
pub struct LiquidityAccounts {
    pub pool: Pubkey,
    pub user: Pubkey,
    pub user_usdc_account: Pubkey,
    pub pool_usdc_account: Pubkey,
    pub lp_token_mint: Pubkey,
    pub user_lp_token_account: Pubkey,
}

impl LiquidityAccounts {
    fn metas(&self) -> Vec<AccountMeta> {
        vec![
            AccountMeta::new(self.pool, false),
            AccountMeta::new(self.user, true),
            AccountMeta::new(self.user_usdc_account, false),
            AccountMeta::new(self.pool_usdc_account, false),
            AccountMeta::new(self.lp_token_mint, false),
            AccountMeta::new(self.user_lp_token_account, false),
            AccountMeta::new_readonly(TOKEN_2022_PROGRAM_ID, false),
        ]
    }
}

pub fn provide_liquidity_accounts(accounts: &LiquidityAccounts) -> Vec<AccountMeta> {
    let mut metas = accounts.metas();
    metas.extend([
        AccountMeta::new_readonly(ASSOCIATED_TOKEN_PROGRAM_ID, false),
        AccountMeta::new_readonly(system_program::ID, false),
        AccountMeta::new_readonly(sysvar::rent::ID, false),
    ]);
    metas
}

pub fn withdraw_liquidity_accounts(accounts: &LiquidityAccounts) -> Vec<AccountMeta> {
    accounts.metas()
}

pub fn initialize_pool_args(fee_basis_points: u16) -> Vec<ArgValue> {
    vec![ArgValue::U16(fee_basis_points)]
}

pub fn provide_liquidity_args(usdc_amount: u64) -> Vec<ArgValue> {
    vec![ArgValue::U64(usdc_amount)]
}

pub fn withdraw_liquidity_args(lp_token_amount: u64) -> Vec<ArgValue> {
    vec![ArgValue::U64(lp_token_amount)]
}

// ================================
// Account state
// ================================

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct PoolAccount {
    pub authority: [u8; 32],
    pub usdc_mint: [u8; 32],
    pub lp_token_mint: [u8; 32],
    pub total_liquidity: u64,
}

impl PoolAccount {
    pub fn lp_token_mint(&self) -> Pubkey {
        Pubkey::new_from_array(self.lp_token_mint)
    }

    pub fn decode(data: &[u8]) -> Option<Self> {
        let body = data.strip_prefix(POOL_ACCOUNT_DISCRIMINATOR.as_slice())?;
        Self::try_from_slice(body).ok()
    }

    pub fn encode(&self) -> Result<Vec<u8>, String> {
        let mut data = POOL_ACCOUNT_DISCRIMINATOR.to_vec();
        self.serialize(&mut data).map_err(|e| e.to_string())?;
        Ok(data)
    }
}

fn load_pool(accounts: &AccountStore, address: &Pubkey) -> Result<PoolAccount, String> {
    let account = accounts
        .get(address)
        .filter(|a| a.owner == LIQUIDITY_POOL_PROGRAM_ID)
        .ok_or_else(|| custom(ACCOUNT_NOT_INITIALIZED))?;
    PoolAccount::decode(&account.data).ok_or_else(|| custom(ACCOUNT_DISCRIMINATOR_MISMATCH))
}

fn store_pool(accounts: &mut AccountStore, address: Pubkey, pool: &PoolAccount) -> Result<(), String> {
    accounts.insert(
        address,
        StoredAccount {
            owner: LIQUIDITY_POOL_PROGRAM_ID,
            data: pool.encode()?,
        },
    );
    Ok(())
}

// ================================
// Processor
// ================================

#[derive(BorshDeserialize)]
struct InitializePoolArgs {
    fee_basis_points: u16,
}

#[derive(BorshDeserialize)]
struct AmountArgs {
    amount: u64,
}

/// [`ProgramProcessor`] for the liquidity pool
#[derive(Debug, Clone, Copy, Default)]
pub struct PoolProgram;

impl ProgramProcessor for PoolProgram {
    fn process(&self, instruction: &Instruction, accounts: &mut AccountStore) -> Result<(), String> {
        let (operation, data) = decode_operation::<PoolOperation>(instruction)?;
        debug!("Pool program executing {:?}", operation);

        match operation {
            PoolOperation::InitializePool => initialize_pool(instruction, decode_args(data)?, accounts),
            PoolOperation::ProvideLiquidity => provide_liquidity(instruction, decode_args(data)?, accounts),
            PoolOperation::WithdrawLiquidity => withdraw_liquidity(instruction, decode_args(data)?, accounts),
        }
    }
}

fn initialize_pool(instruction: &Instruction, args: InitializePoolArgs, accounts: &mut AccountStore) -> Result<(), String> {
    let pool = meta(instruction, 0)?;
    let authority = meta(instruction, 1)?;
    let usdc_mint = meta(instruction, 2)?;
    let lp_token_mint = meta(instruction, 3)?;

    for created in [pool, lp_token_mint] {
        if !created.is_signer {
            return Err("missing required signature for instruction".to_string());
        }
        if accounts.contains_key(&created.pubkey) {
            return Err(format!("account {} already initialized", created.pubkey));
        }
    }

    store_pool(
        accounts,
        pool.pubkey,
        &PoolAccount {
            authority: authority.pubkey.to_bytes(),
            usdc_mint: usdc_mint.pubkey.to_bytes(),
            lp_token_mint: lp_token_mint.pubkey.to_bytes(),
            total_liquidity: 0,
        },
    )?;
    store_mint(accounts, lp_token_mint.pubkey, &TokenMint::with_fee(args.fee_basis_points))
}

/// Accounts shared by deposits and withdrawals, with the pool loaded
fn liquidity_accounts(
    instruction: &Instruction,
    accounts: &AccountStore,
) -> Result<(LiquidityAccounts, PoolAccount), String> {
    let keys = LiquidityAccounts {
        pool: meta(instruction, 0)?.pubkey,
        user: meta(instruction, 1)?.pubkey,
        user_usdc_account: meta(instruction, 2)?.pubkey,
        pool_usdc_account: meta(instruction, 3)?.pubkey,
        lp_token_mint: meta(instruction, 4)?.pubkey,
        user_lp_token_account: meta(instruction, 5)?.pubkey,
    };

    let pool = load_pool(accounts, &keys.pool)?;
    // Only the pool may mint or burn against its LP mint.
    if pool.lp_token_mint() != keys.lp_token_mint {
        return Err(custom(OWNER_MISMATCH));
    }
    load_mint(accounts, &keys.lp_token_mint)?;
    Ok((keys, pool))
}

fn provide_liquidity(instruction: &Instruction, args: AmountArgs, accounts: &mut AccountStore) -> Result<(), String> {
    let (keys, mut pool) = liquidity_accounts(instruction, accounts)?;

    transfer(accounts, keys.user_usdc_account, keys.pool_usdc_account, args.amount)?;
    mint_to(accounts, keys.lp_token_mint, keys.user_lp_token_account, args.amount)?;
    pool.total_liquidity = pool.total_liquidity.checked_add(args.amount).ok_or_else(overflow)?;

    debug!("{} provided {} USDC", keys.user, args.amount);
    store_pool(accounts, keys.pool, &pool)
}

fn withdraw_liquidity(instruction: &Instruction, args: AmountArgs, accounts: &mut AccountStore) -> Result<(), String> {
    let (keys, mut pool) = liquidity_accounts(instruction, accounts)?;

    if pool.total_liquidity < args.amount {
        return Err(custom(INSUFFICIENT_LIQUIDITY));
    }

    burn(accounts, keys.lp_token_mint, keys.user_lp_token_account, args.amount)?;
    transfer(accounts, keys.pool_usdc_account, keys.user_usdc_account, args.amount)?;
    pool.total_liquidity -= args.amount;

    debug!("{} withdrew {} USDC", keys.user, args.amount);
    store_pool(accounts, keys.pool, &pool)
}
