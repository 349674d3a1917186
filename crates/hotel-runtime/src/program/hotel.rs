//! Hotel program simulator
//!
//! Reproduces the observable state transitions of `hotel_tokenization` on
//! top of the in-memory ledger.

use super::{
    custom, decode_args, decode_operation, meta, overflow,
    token::{balance, load_mint, mint_to, store_mint, transfer, TokenMint},
    HotelOperation, ACCOUNT_DISCRIMINATOR_MISMATCH, ACCOUNT_NOT_INITIALIZED, HOTEL_PROGRAM_ID,
};
use crate::ledger::{AccountStore, ProgramProcessor, StoredAccount};
use borsh::{BorshDeserialize, BorshSerialize};
use solana_sdk::{instruction::Instruction, pubkey::Pubkey};
use tracing::debug;

/// First 8 bytes of `sha256("account:Hotel")`
pub const HOTEL_ACCOUNT_DISCRIMINATOR: [u8; 8] = [106, 159, 170, 202, 103, 172, 199, 81];

const INVALID_ROOM_NUMBER: u32 = 6000;
const ALL_ROOMS_MINTED: u32 = 6001;
const NO_PROFIT_TO_DISTRIBUTE: u32 = 6002;

// ================================
// Account state
// ================================

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct HotelAccount {
    pub authority: [u8; 32],
    pub room_count: u64,
    pub rooms_minted: u64,
    pub total_profit: u64,
}

impl HotelAccount {
    pub fn authority(&self) -> Pubkey {
        Pubkey::new_from_array(self.authority)
    }

    /// Decode discriminator-prefixed account data
    pub fn decode(data: &[u8]) -> Option<Self> {
        let body = data.strip_prefix(HOTEL_ACCOUNT_DISCRIMINATOR.as_slice())?;
        Self::try_from_slice(body).ok()
    }

    pub fn encode(&self) -> Result<Vec<u8>, String> {
        let mut data = HOTEL_ACCOUNT_DISCRIMINATOR.to_vec();
        self.serialize(&mut data).map_err(|e| e.to_string())?;
        Ok(data)
    }
}

// ================================
// Instruction arguments
// ================================

#[derive(BorshDeserialize)]
struct InitializeArgs {
    room_count: u64,
    transfer_fee_basis_points: u16,
}

#[derive(BorshDeserialize)]
struct MintRoomTokenArgs {
    room_number: u64,
}

#[derive(BorshDeserialize)]
struct BookRoomArgs {
    room_number: u64,
    booking_price: u64,
}

// ================================
// Account access
// ================================

fn load_hotel(accounts: &AccountStore, address: &Pubkey) -> Result<HotelAccount, String> {
    let account = accounts
        .get(address)
        .filter(|a| a.owner == HOTEL_PROGRAM_ID)
        .ok_or_else(|| custom(ACCOUNT_NOT_INITIALIZED))?;
    HotelAccount::decode(&account.data).ok_or_else(|| custom(ACCOUNT_DISCRIMINATOR_MISMATCH))
}

fn store_hotel(accounts: &mut AccountStore, address: Pubkey, hotel: &HotelAccount) -> Result<(), String> {
    accounts.insert(
        address,
        StoredAccount {
            owner: HOTEL_PROGRAM_ID,
            data: hotel.encode()?,
        },
    );
    Ok(())
}

// ================================
// Processor
// ================================

/// [`ProgramProcessor`] for the hotel program
#[derive(Debug, Clone, Copy, Default)]
pub struct HotelProgram;

impl ProgramProcessor for HotelProgram {
    fn process(&self, instruction: &Instruction, accounts: &mut AccountStore) -> Result<(), String> {
        let (operation, data) = decode_operation::<HotelOperation>(instruction)?;
        debug!("Hotel program executing {:?}", operation);

        match operation {
            HotelOperation::Initialize => initialize(instruction, decode_args(data)?, accounts),
            HotelOperation::MintRoomToken => mint_room_token(instruction, decode_args(data)?, accounts),
            HotelOperation::BookRoom => book_room(instruction, decode_args(data)?, accounts),
            HotelOperation::DistributeProfits => distribute_profits(instruction, accounts),
        }
    }
}

fn initialize(instruction: &Instruction, args: InitializeArgs, accounts: &mut AccountStore) -> Result<(), String> {
    let hotel = meta(instruction, 0)?;
    let authority = meta(instruction, 1)?;
    let room_mint = meta(instruction, 3)?;

    for created in [hotel, room_mint] {
        if !created.is_signer {
            return Err("missing required signature for instruction".to_string());
        }
        if accounts.contains_key(&created.pubkey) {
            return Err(format!("account {} already initialized", created.pubkey));
        }
    }

    store_hotel(
        accounts,
        hotel.pubkey,
        &HotelAccount {
            authority: authority.pubkey.to_bytes(),
            room_count: args.room_count,
            rooms_minted: 0,
            total_profit: 0,
        },
    )?;
    store_mint(accounts, room_mint.pubkey, &TokenMint::with_fee(args.transfer_fee_basis_points))
}

fn mint_room_token(instruction: &Instruction, args: MintRoomTokenArgs, accounts: &mut AccountStore) -> Result<(), String> {
    let hotel_key = meta(instruction, 0)?.pubkey;
    let mint_key = meta(instruction, 1)?.pubkey;
    let ata_key = meta(instruction, 2)?.pubkey;

    let mut hotel = load_hotel(accounts, &hotel_key)?;
    if args.room_number > hotel.room_count {
        return Err(custom(INVALID_ROOM_NUMBER));
    }
    if hotel.rooms_minted >= hotel.room_count {
        return Err(custom(ALL_ROOMS_MINTED));
    }

    hotel.rooms_minted = hotel.rooms_minted.checked_add(1).ok_or_else(overflow)?;
    mint_to(accounts, mint_key, ata_key, 1)?;
    store_hotel(accounts, hotel_key, &hotel)
}

fn book_room(instruction: &Instruction, args: BookRoomArgs, accounts: &mut AccountStore) -> Result<(), String> {
    let hotel_key = meta(instruction, 0)?.pubkey;
    let tourist_usdc = meta(instruction, 2)?.pubkey;
    let vault = meta(instruction, 3)?.pubkey;

    let mut hotel = load_hotel(accounts, &hotel_key)?;
    if args.room_number > hotel.room_count {
        return Err(custom(INVALID_ROOM_NUMBER));
    }

    transfer(accounts, tourist_usdc, vault, args.booking_price)?;
    hotel.total_profit = hotel
        .total_profit
        .checked_add(args.booking_price)
        .ok_or_else(overflow)?;

    debug!("Room {} booked for {}", args.room_number, args.booking_price);
    store_hotel(accounts, hotel_key, &hotel)
}

fn distribute_profits(instruction: &Instruction, accounts: &mut AccountStore) -> Result<(), String> {
    let hotel_key = meta(instruction, 0)?.pubkey;
    let mint_key = meta(instruction, 1)?.pubkey;
    let user_room_ata = meta(instruction, 3)?.pubkey;
    let user_usdc = meta(instruction, 4)?.pubkey;
    let vault = meta(instruction, 5)?.pubkey;

    let mut hotel = load_hotel(accounts, &hotel_key)?;
    if hotel.total_profit == 0 {
        return Err(custom(NO_PROFIT_TO_DISTRIBUTE));
    }

    let mint = load_mint(accounts, &mint_key)?;
    let per_token = hotel
        .total_profit
        .checked_div(mint.supply)
        .ok_or_else(|| "division by zero".to_string())?;
    let share = per_token
        .checked_mul(balance(accounts, &user_room_ata))
        .ok_or_else(overflow)?;

    transfer(accounts, vault, user_usdc, share)?;
    hotel.total_profit = hotel.total_profit.checked_sub(share).ok_or_else(overflow)?;

    debug!("Distributed {} to {}", share, user_usdc);
    store_hotel(accounts, hotel_key, &hotel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{
        book_room_accounts, book_room_args, descriptor, distribute_profits_accounts, initialize_accounts,
        initialize_args, mint_room_token_accounts, mint_room_token_args, token::TokenBalance,
    };
    use crate::transaction::instructions::build;
    use solana_sdk::instruction::AccountMeta;

    struct Fixture {
        hotel: Pubkey,
        mint: Pubkey,
        authority: Pubkey,
        accounts: AccountStore,
    }

    impl Fixture {
        fn new(room_count: u64) -> Self {
            let mut fixture = Self {
                hotel: Pubkey::new_unique(),
                mint: Pubkey::new_unique(),
                authority: Pubkey::new_unique(),
                accounts: AccountStore::new(),
            };
            let accounts = initialize_accounts(fixture.hotel, fixture.authority, fixture.mint);
            fixture
                .run(HotelOperation::Initialize, &initialize_args(room_count, 25), accounts)
                .unwrap();
            fixture
        }

        fn run(&mut self, op: HotelOperation, args: &[crate::ArgValue], accounts: Vec<AccountMeta>) -> Result<(), String> {
            let descriptor = descriptor().unwrap();
            let ix = build(&descriptor, op, args, &accounts).unwrap();
            HotelProgram.process(&ix, &mut self.accounts)
        }

        fn hotel(&self) -> HotelAccount {
            load_hotel(&self.accounts, &self.hotel).unwrap()
        }
    }

    #[test]
    fn test_initialize_once() {
        let mut fixture = Fixture::new(3);
        let hotel = fixture.hotel();
        assert_eq!(hotel.authority(), fixture.authority);
        assert_eq!(hotel.room_count, 3);
        assert_eq!(load_mint(&fixture.accounts, &fixture.mint).unwrap().transfer_fee_basis_points, 25);

        let accounts = initialize_accounts(fixture.hotel, fixture.authority, Pubkey::new_unique());
        let err = fixture.run(HotelOperation::Initialize, &initialize_args(3, 25), accounts).unwrap_err();
        assert!(err.contains("already initialized"));
    }

    #[test]
    fn test_mint_until_sold_out() {
        let mut fixture = Fixture::new(2);
        let user = Pubkey::new_unique();
        let ata = Pubkey::new_unique();
        let (hotel, mint) = (fixture.hotel, fixture.mint);
        let accounts = || mint_room_token_accounts(hotel, mint, ata, user);

        let err = fixture.run(HotelOperation::MintRoomToken, &mint_room_token_args(9), accounts()).unwrap_err();
        assert_eq!(err, "custom program error: 0x1770");

        fixture.run(HotelOperation::MintRoomToken, &mint_room_token_args(1), accounts()).unwrap();
        fixture.run(HotelOperation::MintRoomToken, &mint_room_token_args(2), accounts()).unwrap();
        let err = fixture.run(HotelOperation::MintRoomToken, &mint_room_token_args(2), accounts()).unwrap_err();
        assert_eq!(err, "custom program error: 0x1771");

        assert_eq!(fixture.hotel().rooms_minted, 2);
        assert_eq!(balance(&fixture.accounts, &ata), 2);
        assert_eq!(load_mint(&fixture.accounts, &mint).unwrap().supply, 2);
    }

    #[test]
    fn test_mint_rejects_supply_overflow() {
        let mut fixture = Fixture::new(2);
        let (hotel, mint) = (fixture.hotel, fixture.mint);
        let mut saturated = load_mint(&fixture.accounts, &mint).unwrap();
        saturated.supply = u64::MAX;
        store_mint(&mut fixture.accounts, mint, &saturated).unwrap();

        let accounts = mint_room_token_accounts(hotel, mint, Pubkey::new_unique(), Pubkey::new_unique());
        let err = fixture.run(HotelOperation::MintRoomToken, &mint_room_token_args(1), accounts).unwrap_err();
        assert_eq!(err, "arithmetic overflow");
        assert_eq!(fixture.hotel().rooms_minted, 0);
    }

    #[test]
    fn test_book_and_distribute() {
        let mut fixture = Fixture::new(4);
        let (hotel, mint) = (fixture.hotel, fixture.mint);
        let owner = Pubkey::new_unique();
        let owner_ata = Pubkey::new_unique();
        let owner_usdc = Pubkey::new_unique();
        let tourist = Pubkey::new_unique();
        let tourist_usdc = Pubkey::new_unique();
        let vault = Pubkey::new_unique();

        let distribute = || distribute_profits_accounts(hotel, mint, owner, owner_ata, owner_usdc, vault);
        let err = fixture.run(HotelOperation::DistributeProfits, &[], distribute()).unwrap_err();
        assert_eq!(err, "custom program error: 0x1772");

        fixture
            .run(HotelOperation::MintRoomToken, &mint_room_token_args(1), mint_room_token_accounts(hotel, mint, owner_ata, owner))
            .unwrap();
        fixture
            .run(HotelOperation::MintRoomToken, &mint_room_token_args(2), mint_room_token_accounts(hotel, mint, Pubkey::new_unique(), tourist))
            .unwrap();

        let booking = book_room_accounts(hotel, tourist, tourist_usdc, vault);
        let err = fixture.run(HotelOperation::BookRoom, &book_room_args(1, 100), booking.clone()).unwrap_err();
        assert_eq!(err, "custom program error: 0x1");

        fixture.accounts.insert(tourist_usdc, TokenBalance::account(150));
        fixture.run(HotelOperation::BookRoom, &book_room_args(1, 100), booking).unwrap();
        assert_eq!(fixture.hotel().total_profit, 100);
        assert_eq!(balance(&fixture.accounts, &vault), 100);

        fixture.run(HotelOperation::DistributeProfits, &[], distribute()).unwrap();
        assert_eq!(balance(&fixture.accounts, &owner_usdc), 50);
        assert_eq!(fixture.hotel().total_profit, 50);
    }

    #[test]
    fn test_unknown_instruction() {
        let mut accounts = AccountStore::new();
        let ix = Instruction {
            program_id: HOTEL_PROGRAM_ID,
            accounts: vec![],
            data: vec![0; 8],
        };
        assert_eq!(HotelProgram.process(&ix, &mut accounts).unwrap_err(), "custom program error: 0x65");
    }
}
