//! Programs known to the runtime
//!
//! Typed operations, account list helpers and bundled interface descriptions
//! for `hotel_tokenization` and its liquidity pool. [`HotelProgram`] and
//! [`PoolProgram`] simulate the programs' state transitions for the
//! in-memory ledger.

pub mod hotel;
pub mod liquidity_pool;
pub mod token;

pub use hotel::{HotelAccount, HotelProgram};
pub use liquidity_pool::{PoolAccount, PoolOperation, PoolProgram, LIQUIDITY_POOL_PROGRAM_ID};
pub use token::{TokenBalance, TokenMint};

use crate::{
    descriptor::{sighash, Descriptor, DescriptorError, Operation},
    transaction::instructions::ArgValue,
};
use borsh::BorshDeserialize;
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey,
    pubkey::Pubkey,
    system_program, sysvar,
};

/// Address the hotel program is deployed at
pub const HOTEL_PROGRAM_ID: Pubkey = pubkey!("Fg6PaFpoGXkYsidMpWTK6W2BeZ7FEfcYkg476zPFsLnS");

/// Token-2022 program
pub const TOKEN_2022_PROGRAM_ID: Pubkey = pubkey!("TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb");

/// Associated token account program
pub const ASSOCIATED_TOKEN_PROGRAM_ID: Pubkey = pubkey!("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");

/// Interface description shipped with the crate
pub const HOTEL_IDL: &str = include_str!("../../../../idl/hotel_tokenization.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HotelOperation {
    Initialize,
    MintRoomToken,
    BookRoom,
    DistributeProfits,
}

impl Operation for HotelOperation {
    const ALL: &'static [Self] = &[
        HotelOperation::Initialize,
        HotelOperation::MintRoomToken,
        HotelOperation::BookRoom,
        HotelOperation::DistributeProfits,
    ];

    fn name(self) -> &'static str {
        match self {
            HotelOperation::Initialize => "initialize",
            HotelOperation::MintRoomToken => "mint_room_token",
            HotelOperation::BookRoom => "book_room",
            HotelOperation::DistributeProfits => "distribute_profits",
        }
    }
}

/// Parse the bundled interface description
pub fn descriptor() -> Result<Descriptor<HotelOperation>, DescriptorError> {
    Descriptor::from_json(HOTEL_IDL)
}

// ================================
// Processor helpers
// ================================

pub(crate) const INSTRUCTION_FALLBACK_NOT_FOUND: u32 = 101;
pub(crate) const INSTRUCTION_DID_NOT_DESERIALIZE: u32 = 102;
pub(crate) const ACCOUNT_DISCRIMINATOR_MISMATCH: u32 = 3002;
pub(crate) const ACCOUNT_NOT_INITIALIZED: u32 = 3012;

/// Failure reason for a program error code, as a node reports it
pub(crate) fn custom(code: u32) -> String {
    format!("custom program error: {code:#x}")
}

pub(crate) fn overflow() -> String {
    "arithmetic overflow".to_string()
}

pub(crate) fn meta(instruction: &Instruction, index: usize) -> Result<&AccountMeta, String> {
    instruction
        .accounts
        .get(index)
        .ok_or_else(|| "insufficient account keys for instruction".to_string())
}

pub(crate) fn decode_args<T: BorshDeserialize>(data: &[u8]) -> Result<T, String> {
    T::try_from_slice(data).map_err(|_| custom(INSTRUCTION_DID_NOT_DESERIALIZE))
}

/// Match the instruction discriminator against `O`, returning the argument bytes
pub(crate) fn decode_operation<O: Operation>(instruction: &Instruction) -> Result<(O, &[u8]), String> {
    if instruction.data.len() < 8 {
        return Err(custom(INSTRUCTION_FALLBACK_NOT_FOUND));
    }
    let (discriminator, data) = instruction.data.split_at(8);
    O::ALL
        .iter()
        .copied()
        .find(|op| sighash(op.name()) == discriminator)
        .map(|op| (op, data))
        .ok_or_else(|| custom(INSTRUCTION_FALLBACK_NOT_FOUND))
}

// ================================
// Account lists
// ================================

/// `hotel` and `room_mint` are fresh keypairs that sign their own creation
pub fn initialize_accounts(hotel: Pubkey, authority: Pubkey, room_mint: Pubkey) -> Vec<AccountMeta> {
    vec![
        AccountMeta::new(hotel, true),
        AccountMeta::new(authority, true),
        AccountMeta::new_readonly(TOKEN_2022_PROGRAM_ID, false),
        AccountMeta::new(room_mint, true),
        AccountMeta::new_readonly(system_program::ID, false),
        AccountMeta::new_readonly(sysvar::rent::ID, false),
    ]
}

pub fn mint_room_token_accounts(hotel: Pubkey, room_mint: Pubkey, user_room_ata: Pubkey, user: Pubkey) -> Vec<AccountMeta> {
    vec![
        AccountMeta::new(hotel, false),
        AccountMeta::new(room_mint, false),
        AccountMeta::new(user_room_ata, false),
        AccountMeta::new(user, true),
        AccountMeta::new_readonly(TOKEN_2022_PROGRAM_ID, false),
        AccountMeta::new_readonly(ASSOCIATED_TOKEN_PROGRAM_ID, false),
        AccountMeta::new_readonly(system_program::ID, false),
        AccountMeta::new_readonly(sysvar::rent::ID, false),
    ]
}

pub fn book_room_accounts(
    hotel: Pubkey,
    tourist: Pubkey,
    tourist_usdc_account: Pubkey,
    hotel_usdc_vault: Pubkey,
) -> Vec<AccountMeta> {
    vec![
        AccountMeta::new(hotel, false),
        AccountMeta::new(tourist, true),
        AccountMeta::new(tourist_usdc_account, false),
        AccountMeta::new(hotel_usdc_vault, false),
        AccountMeta::new_readonly(TOKEN_2022_PROGRAM_ID, false),
    ]
}

pub fn distribute_profits_accounts(
    hotel: Pubkey,
    room_mint: Pubkey,
    user: Pubkey,
    user_room_ata: Pubkey,
    user_usdc_account: Pubkey,
    hotel_usdc_vault: Pubkey,
) -> Vec<AccountMeta> {
    vec![
        AccountMeta::new(hotel, false),
        AccountMeta::new(room_mint, false),
        AccountMeta::new(user, true),
        AccountMeta::new(user_room_ata, false),
        AccountMeta::new(user_usdc_account, false),
        AccountMeta::new(hotel_usdc_vault, false),
        AccountMeta::new_readonly(TOKEN_2022_PROGRAM_ID, false),
    ]
}

// ================================
// Arguments
// ================================

pub fn initialize_args(room_count: u64, transfer_fee_basis_points: u16) -> Vec<ArgValue> {
    vec![ArgValue::U64(room_count), ArgValue::U16(transfer_fee_basis_points)]
}

pub fn mint_room_token_args(room_number: u64) -> Vec<ArgValue> {
    vec![ArgValue::U64(room_number)]
}

pub fn book_room_args(room_number: u64, booking_price: u64) -> Vec<ArgValue> {
    vec![ArgValue::U64(room_number), ArgValue::U64(booking_price)]
}
