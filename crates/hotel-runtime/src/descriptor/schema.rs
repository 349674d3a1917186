//! Operation schemas resolved from an interface description

use serde_json::Value;
use solana_sdk::pubkey::Pubkey;
use std::fmt;

/// Argument type accepted by the instruction encoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgType {
    Bool,
    U8,
    U16,
    U32,
    U64,
    U128,
    I8,
    I16,
    I32,
    I64,
    I128,
    String,
    Pubkey,
    Bytes,
    Option(Box<ArgType>),
    Vec(Box<ArgType>),
    Array(Box<ArgType>, usize),
}

impl ArgType {
    /// Parse an interface type expression; `None` for unsupported types
    pub fn parse(value: &Value) -> Option<Self> {
        match value {
            Value::String(name) => Self::primitive(name),
            Value::Object(map) if map.len() == 1 => {
                if let Some(inner) = map.get("vec") {
                    return Self::parse(inner).map(|ty| ArgType::Vec(Box::new(ty)));
                }
                if let Some(inner) = map.get("option") {
                    return Self::parse(inner).map(|ty| ArgType::Option(Box::new(ty)));
                }
                match map.get("array") {
                    Some(Value::Array(parts)) if parts.len() == 2 => {
                        let len = usize::try_from(parts[1].as_u64()?).ok()?;
                        Self::parse(&parts[0]).map(|ty| ArgType::Array(Box::new(ty), len))
                    }
                    _ => None,
                }
            }
            _ => None,
        }
    }

    fn primitive(name: &str) -> Option<Self> {
        let ty = match name {
            "bool" => ArgType::Bool,
            "u8" => ArgType::U8,
            "u16" => ArgType::U16,
            "u32" => ArgType::U32,
            "u64" => ArgType::U64,
            "u128" => ArgType::U128,
            "i8" => ArgType::I8,
            "i16" => ArgType::I16,
            "i32" => ArgType::I32,
            "i64" => ArgType::I64,
            "i128" => ArgType::I128,
            "string" => ArgType::String,
            "pubkey" | "publicKey" => ArgType::Pubkey,
            "bytes" => ArgType::Bytes,
            _ => return None,
        };
        Some(ty)
    }
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgType::Bool => write!(f, "bool"),
            ArgType::U8 => write!(f, "u8"),
            ArgType::U16 => write!(f, "u16"),
            ArgType::U32 => write!(f, "u32"),
            ArgType::U64 => write!(f, "u64"),
            ArgType::U128 => write!(f, "u128"),
            ArgType::I8 => write!(f, "i8"),
            ArgType::I16 => write!(f, "i16"),
            ArgType::I32 => write!(f, "i32"),
            ArgType::I64 => write!(f, "i64"),
            ArgType::I128 => write!(f, "i128"),
            ArgType::String => write!(f, "string"),
            ArgType::Pubkey => write!(f, "pubkey"),
            ArgType::Bytes => write!(f, "bytes"),
            ArgType::Option(inner) => write!(f, "option<{inner}>"),
            ArgType::Vec(inner) => write!(f, "vec<{inner}>"),
            ArgType::Array(inner, len) => write!(f, "[{inner}; {len}]"),
        }
    }
}

/// Declared argument of an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgSchema {
    pub name: String,
    pub ty: ArgType,
}

/// Declared account of an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSchema {
    pub name: String,
    pub writable: bool,
    pub signer: bool,
    /// Fixed address, when the interface pins one (programs, sysvars)
    pub address: Option<Pubkey>,
}

/// Everything needed to encode one operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationSchema {
    pub name: String,
    pub discriminator: [u8; 8],
    pub accounts: Vec<AccountSchema>,
    pub args: Vec<ArgSchema>,
}

/// Program error declared by the interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramErrorDef {
    pub code: u32,
    pub name: String,
    pub msg: Option<String>,
}
