//! Descriptor-driven instruction builders

use crate::{
    descriptor::{AccountSchema, ArgType, Descriptor, Operation, OperationSchema},
    Result, RuntimeError,
};
use borsh::BorshSerialize;
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};
use std::io::Write;
use tracing::debug;

/// Logical argument value passed to an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    U128(u128),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    I128(i128),
    String(String),
    Pubkey(Pubkey),
    Bytes(Vec<u8>),
    Option(Option<Box<ArgValue>>),
    Vec(Vec<ArgValue>),
    Array(Vec<ArgValue>),
}

impl ArgValue {
    /// Whether this value can be encoded as `ty`
    pub fn matches(&self, ty: &ArgType) -> bool {
        match (self, ty) {
            (ArgValue::Bool(_), ArgType::Bool)
            | (ArgValue::U8(_), ArgType::U8)
            | (ArgValue::U16(_), ArgType::U16)
            | (ArgValue::U32(_), ArgType::U32)
            | (ArgValue::U64(_), ArgType::U64)
            | (ArgValue::U128(_), ArgType::U128)
            | (ArgValue::I8(_), ArgType::I8)
            | (ArgValue::I16(_), ArgType::I16)
            | (ArgValue::I32(_), ArgType::I32)
            | (ArgValue::I64(_), ArgType::I64)
            | (ArgValue::I128(_), ArgType::I128)
            | (ArgValue::String(_), ArgType::String)
            | (ArgValue::Pubkey(_), ArgType::Pubkey)
            | (ArgValue::Bytes(_), ArgType::Bytes) => true,
            (ArgValue::Option(None), ArgType::Option(_)) => true,
            (ArgValue::Option(Some(value)), ArgType::Option(inner)) => value.matches(inner),
            (ArgValue::Vec(items), ArgType::Vec(inner)) => items.iter().all(|v| v.matches(inner)),
            (ArgValue::Array(items), ArgType::Array(inner, len)) => {
                items.len() == *len && items.iter().all(|v| v.matches(inner))
            }
            _ => false,
        }
    }

    /// Borsh encoding of the value
    pub fn encode<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        match self {
            ArgValue::Bool(v) => v.serialize(writer),
            ArgValue::U8(v) => v.serialize(writer),
            ArgValue::U16(v) => v.serialize(writer),
            ArgValue::U32(v) => v.serialize(writer),
            ArgValue::U64(v) => v.serialize(writer),
            ArgValue::U128(v) => v.serialize(writer),
            ArgValue::I8(v) => v.serialize(writer),
            ArgValue::I16(v) => v.serialize(writer),
            ArgValue::I32(v) => v.serialize(writer),
            ArgValue::I64(v) => v.serialize(writer),
            ArgValue::I128(v) => v.serialize(writer),
            ArgValue::String(v) => v.serialize(writer),
            ArgValue::Pubkey(v) => writer.write_all(&v.to_bytes()),
            ArgValue::Bytes(v) => v.serialize(writer),
            ArgValue::Option(None) => 0u8.serialize(writer),
            ArgValue::Option(Some(value)) => {
                1u8.serialize(writer)?;
                value.encode(writer)
            }
            ArgValue::Vec(items) => {
                let len = u32::try_from(items.len()).map_err(|_| {
                    std::io::Error::new(std::io::ErrorKind::InvalidInput, "vector too long")
                })?;
                len.serialize(writer)?;
                items.iter().try_for_each(|item| item.encode(writer))
            }
            ArgValue::Array(items) => items.iter().try_for_each(|item| item.encode(writer)),
        }
    }
}

/// Builds instructions for the operations of one descriptor
pub struct InstructionBuilder<'a, O: Operation> {
    descriptor: &'a Descriptor<O>,
}

impl<'a, O: Operation> InstructionBuilder<'a, O> {
    pub fn new(descriptor: &'a Descriptor<O>) -> Self {
        Self { descriptor }
    }

    /// Validate and encode one call.
    ///
    /// Accounts are matched positionally against the declared account list.
    /// Identical inputs always produce byte-identical instruction data.
    pub fn build(&self, operation: O, args: &[ArgValue], accounts: &[AccountMeta]) -> Result<Instruction> {
        let schema = self
            .descriptor
            .operation(operation)
            .ok_or_else(|| RuntimeError::UnknownOperation(operation.name().to_string()))?;

        check_args(schema, args)?;
        check_accounts(schema, accounts)?;

        let mut data = Vec::with_capacity(8 + args.len() * 8);
        data.extend_from_slice(&schema.discriminator);
        for arg in args {
            arg.encode(&mut data)?;
        }

        debug!(
            "Built `{}` instruction: {} bytes, {} accounts",
            schema.name,
            data.len(),
            accounts.len()
        );

        Ok(Instruction {
            program_id: self.descriptor.program_id(),
            accounts: accounts.to_vec(),
            data,
        })
    }

    /// Resolve an operation by its declared name and build it
    pub fn build_named(&self, name: &str, args: &[ArgValue], accounts: &[AccountMeta]) -> Result<Instruction> {
        let operation = O::from_name(name).ok_or_else(|| RuntimeError::UnknownOperation(name.to_string()))?;
        self.build(operation, args, accounts)
    }
}

/// Shorthand for [`InstructionBuilder::build`]
pub fn build<O: Operation>(
    descriptor: &Descriptor<O>,
    operation: O,
    args: &[ArgValue],
    accounts: &[AccountMeta],
) -> Result<Instruction> {
    InstructionBuilder::new(descriptor).build(operation, args, accounts)
}

fn check_args(schema: &OperationSchema, args: &[ArgValue]) -> Result<()> {
    if args.len() != schema.args.len() {
        return Err(RuntimeError::ArgumentMismatch {
            operation: schema.name.clone(),
            reason: format!("expected {} arguments, got {}", schema.args.len(), args.len()),
        });
    }

    for (declared, value) in schema.args.iter().zip(args) {
        if !value.matches(&declared.ty) {
            return Err(RuntimeError::ArgumentMismatch {
                operation: schema.name.clone(),
                reason: format!("argument `{}` expects {}, got {:?}", declared.name, declared.ty, value),
            });
        }
    }

    Ok(())
}

fn check_accounts(schema: &OperationSchema, accounts: &[AccountMeta]) -> Result<()> {
    let violation = |reason: String| RuntimeError::AccountConstraintViolation {
        operation: schema.name.clone(),
        reason,
    };

    if accounts.len() != schema.accounts.len() {
        return Err(violation(format!(
            "expected {} accounts, got {}",
            schema.accounts.len(),
            accounts.len()
        )));
    }

    for (declared, meta) in schema.accounts.iter().zip(accounts) {
        check_account(declared, meta).map_err(&violation)?;
    }

    Ok(())
}

fn check_account(declared: &AccountSchema, meta: &AccountMeta) -> std::result::Result<(), String> {
    if declared.signer && !meta.is_signer {
        return Err(format!("`{}` must be a signer", declared.name));
    }
    if declared.writable && !meta.is_writable {
        return Err(format!("`{}` must be writable", declared.name));
    }
    if let Some(address) = declared.address {
        if address != meta.pubkey {
            return Err(format!("`{}` must be {}, got {}", declared.name, address, meta.pubkey));
        }
    }
    Ok(())
}
