//! Interface descriptor loading
//!
//! A descriptor is parsed once from the program's JSON interface description
//! and shared read-only (usually behind an `Arc`) by every call that builds
//! instructions for that program. Operations are keyed by a per-program enum
//! implementing [`Operation`], so call sites never dispatch on strings.

pub mod schema;

pub use schema::{AccountSchema, ArgSchema, ArgType, OperationSchema, ProgramErrorDef};

use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use solana_sdk::pubkey::Pubkey;
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    fmt,
    hash::Hash,
    io::Read,
    path::Path,
    str::FromStr,
};
use thiserror::Error;
use tracing::{debug, info};

// ================================
// Errors
// ================================

#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("Malformed interface description: {0}")]
    Malformed(String),

    #[error("Invalid program address `{0}`")]
    InvalidProgramId(String),

    #[error("Unsupported type `{ty}` for argument `{arg}` of `{operation}`")]
    UnsupportedType {
        operation: String,
        arg: String,
        ty: String,
    },

    #[error("Operation `{0}` is declared more than once")]
    DuplicateOperation(String),

    #[error("Failed to read interface description: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for DescriptorError {
    fn from(err: serde_json::Error) -> Self {
        DescriptorError::Malformed(err.to_string())
    }
}

// ================================
// Operation dispatch
// ================================

/// Closed set of operations a client knows how to call on one program
pub trait Operation: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static {
    /// Every variant, in declaration order
    const ALL: &'static [Self];

    /// Snake-case instruction name as declared by the program
    fn name(self) -> &'static str;

    fn from_name(name: &str) -> Option<Self> {
        let name = to_snake_case(name);
        Self::ALL.iter().copied().find(|op| op.name() == name)
    }
}

// ================================
// Raw interface format
// ================================

#[derive(Debug, Deserialize)]
struct RawInterface {
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    metadata: Option<RawMetadata>,
    instructions: Vec<RawInstruction>,
    #[serde(default)]
    errors: Vec<RawError>,
}

#[derive(Debug, Deserialize)]
struct RawMetadata {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawInstruction {
    name: String,
    #[serde(default)]
    discriminator: Option<Vec<u8>>,
    #[serde(default)]
    accounts: Vec<RawAccount>,
    #[serde(default)]
    args: Vec<RawArg>,
}

#[derive(Debug, Deserialize)]
struct RawAccount {
    name: String,
    #[serde(default, alias = "isMut")]
    writable: bool,
    #[serde(default, alias = "isSigner")]
    signer: bool,
    #[serde(default)]
    address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawArg {
    name: String,
    #[serde(rename = "type")]
    ty: Value,
}

#[derive(Debug, Deserialize)]
struct RawError {
    code: u32,
    name: String,
    #[serde(default)]
    msg: Option<String>,
}

// ================================
// Descriptor
// ================================

/// Read-only description of a deployed program's callable operations
#[derive(Debug, Clone)]
pub struct Descriptor<O: Operation> {
    name: String,
    version: Option<String>,
    program_id: Pubkey,
    operations: HashMap<O, OperationSchema>,
    errors: BTreeMap<u32, ProgramErrorDef>,
}

impl<O: Operation> Descriptor<O> {
    /// Parse a descriptor from JSON text
    pub fn from_json(source: &str) -> Result<Self, DescriptorError> {
        let raw: RawInterface = serde_json::from_str(source)?;
        Self::from_raw(raw)
    }

    /// Parse a descriptor from any reader
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, DescriptorError> {
        let raw: RawInterface = serde_json::from_reader(reader)?;
        Self::from_raw(raw)
    }

    /// Load a descriptor from a file on disk
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DescriptorError> {
        let path = path.as_ref();
        info!("Loading interface description from {}", path.display());
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    fn from_raw(raw: RawInterface) -> Result<Self, DescriptorError> {
        let metadata = raw.metadata.as_ref();
        let address = raw
            .address
            .clone()
            .or_else(|| metadata.and_then(|m| m.address.clone()))
            .ok_or_else(|| DescriptorError::Malformed("missing program address".to_string()))?;
        let program_id = Pubkey::from_str(&address)
            .map_err(|_| DescriptorError::InvalidProgramId(address.clone()))?;

        let name = metadata
            .and_then(|m| m.name.clone())
            .or(raw.name)
            .unwrap_or_default();
        let version = metadata.and_then(|m| m.version.clone()).or(raw.version);

        let mut seen = HashSet::new();
        let mut operations = HashMap::new();
        for instruction in raw.instructions {
            let schema = Self::resolve_instruction(instruction)?;
            if !seen.insert(schema.name.clone()) {
                return Err(DescriptorError::DuplicateOperation(schema.name));
            }

            match O::from_name(&schema.name) {
                Some(op) => {
                    operations.insert(op, schema);
                }
                None => debug!("Skipping instruction `{}` with no client operation", schema.name),
            }
        }

        let errors = raw
            .errors
            .into_iter()
            .map(|e| {
                (
                    e.code,
                    ProgramErrorDef {
                        code: e.code,
                        name: e.name,
                        msg: e.msg,
                    },
                )
            })
            .collect();

        info!(
            "Loaded interface `{}` for program {} with {} operations",
            name,
            program_id,
            operations.len()
        );

        Ok(Self {
            name,
            version,
            program_id,
            operations,
            errors,
        })
    }

    fn resolve_instruction(raw: RawInstruction) -> Result<OperationSchema, DescriptorError> {
        let name = to_snake_case(&raw.name);

        let discriminator = match raw.discriminator {
            Some(bytes) => <[u8; 8]>::try_from(bytes.as_slice()).map_err(|_| {
                DescriptorError::Malformed(format!(
                    "discriminator of `{name}` must be 8 bytes, got {}",
                    bytes.len()
                ))
            })?,
            None => sighash(&name),
        };

        let args = raw
            .args
            .into_iter()
            .map(|arg| {
                let ty = ArgType::parse(&arg.ty).ok_or_else(|| DescriptorError::UnsupportedType {
                    operation: name.clone(),
                    arg: arg.name.clone(),
                    ty: arg.ty.to_string(),
                })?;
                Ok(ArgSchema { name: arg.name, ty })
            })
            .collect::<Result<Vec<_>, DescriptorError>>()?;

        let accounts = raw
            .accounts
            .into_iter()
            .map(|account| {
                let address = account
                    .address
                    .map(|a| Pubkey::from_str(&a).map_err(|_| DescriptorError::InvalidProgramId(a)))
                    .transpose()?;
                Ok(AccountSchema {
                    name: account.name,
                    writable: account.writable,
                    signer: account.signer,
                    address,
                })
            })
            .collect::<Result<Vec<_>, DescriptorError>>()?;

        Ok(OperationSchema {
            name,
            discriminator,
            accounts,
            args,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn program_id(&self) -> Pubkey {
        self.program_id
    }

    /// Schema of an operation, if the interface declares it
    pub fn operation(&self, op: O) -> Option<&OperationSchema> {
        self.operations.get(&op)
    }

    /// Declared operations in enum order
    pub fn operations(&self) -> impl Iterator<Item = (O, &OperationSchema)> {
        O::ALL
            .iter()
            .filter_map(|op| self.operations.get(op).map(|schema| (*op, schema)))
    }

    pub fn error(&self, code: u32) -> Option<&ProgramErrorDef> {
        self.errors.get(&code)
    }

    /// Annotate a ledger failure reason with the program's error name
    pub fn describe_failure(&self, reason: &str) -> String {
        const MARKER: &str = "custom program error: 0x";

        let code = reason.find(MARKER).and_then(|start| {
            let hex: String = reason[start + MARKER.len()..]
                .chars()
                .take_while(char::is_ascii_hexdigit)
                .collect();
            u32::from_str_radix(&hex, 16).ok()
        });

        match code.and_then(|code| self.error(code)) {
            Some(def) => match &def.msg {
                Some(msg) => format!("{reason} ({}: {msg})", def.name),
                None => format!("{reason} ({})", def.name),
            },
            None => reason.to_string(),
        }
    }
}

/// Instruction discriminator: first 8 bytes of `sha256("global:<name>")`
pub fn sighash(name: &str) -> [u8; 8] {
    let digest = Sha256::digest(format!("global:{name}").as_bytes());
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

/// `mintRoomToken` -> `mint_room_token`; snake-case input is unchanged
pub fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Counter {
        Initialize,
        Increment,
    }

    impl Operation for Counter {
        const ALL: &'static [Self] = &[Counter::Initialize, Counter::Increment];

        fn name(self) -> &'static str {
            match self {
                Counter::Initialize => "initialize",
                Counter::Increment => "increment",
            }
        }
    }

    const COUNTER: &str = r#"{
        "address": "Fg6PaFpoGXkYsidMpWTK6W2BeZ7FEfcYkg476zPFsLnS",
        "metadata": { "name": "counter", "version": "0.1.0" },
        "instructions": [
            {
                "name": "initialize",
                "accounts": [
                    { "name": "counter", "writable": true, "signer": true },
                    { "name": "authority", "writable": true, "signer": true },
                    { "name": "system_program", "address": "11111111111111111111111111111111" }
                ],
                "args": []
            },
            {
                "name": "increment",
                "discriminator": [1, 2, 3, 4, 5, 6, 7, 8],
                "accounts": [{ "name": "counter", "writable": true }],
                "args": [{ "name": "by", "type": "u64" }]
            },
            { "name": "close", "accounts": [], "args": [] }
        ],
        "errors": [{ "code": 6000, "name": "Overflow", "msg": "Counter overflowed" }]
    }"#;

    #[test]
    fn test_load_descriptor() {
        let descriptor = Descriptor::<Counter>::from_json(COUNTER).unwrap();

        assert_eq!(descriptor.name(), "counter");
        assert_eq!(descriptor.version(), Some("0.1.0"));
        assert_eq!(
            descriptor.program_id().to_string(),
            "Fg6PaFpoGXkYsidMpWTK6W2BeZ7FEfcYkg476zPFsLnS"
        );
        assert_eq!(descriptor.operations().count(), 2);

        let init = descriptor.operation(Counter::Initialize).unwrap();
        assert_eq!(init.discriminator, sighash("initialize"));
        assert_eq!(init.accounts.len(), 3);
        assert!(init.accounts[0].signer && init.accounts[0].writable);
        assert_eq!(init.accounts[2].address, Some(solana_sdk::system_program::ID));

        let increment = descriptor.operation(Counter::Increment).unwrap();
        assert_eq!(increment.discriminator, [1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(increment.args[0].ty, ArgType::U64);
    }

    #[test]
    fn test_legacy_layout() {
        let legacy = r#"{
            "version": "0.1.0",
            "name": "counter",
            "instructions": [{
                "name": "initialize",
                "accounts": [{ "name": "counter", "isMut": true, "isSigner": false }],
                "args": []
            }],
            "metadata": { "address": "Fg6PaFpoGXkYsidMpWTK6W2BeZ7FEfcYkg476zPFsLnS" }
        }"#;

        let descriptor = Descriptor::<Counter>::from_json(legacy).unwrap();
        let init = descriptor.operation(Counter::Initialize).unwrap();
        assert!(init.accounts[0].writable);
        assert!(!init.accounts[0].signer);
        assert!(descriptor.operation(Counter::Increment).is_none());
    }

    #[test]
    fn test_unsupported_argument_type() {
        let source = COUNTER.replace(r#""type": "u64""#, r#""type": { "defined": "Amount" }"#);
        let err = Descriptor::<Counter>::from_json(&source).unwrap_err();
        assert!(matches!(
            err,
            DescriptorError::UnsupportedType { ref operation, ref arg, .. }
                if operation == "increment" && arg == "by"
        ));
    }

    #[test]
    fn test_malformed_sources() {
        assert!(matches!(
            Descriptor::<Counter>::from_json("{ not json"),
            Err(DescriptorError::Malformed(_))
        ));
        assert!(matches!(
            Descriptor::<Counter>::from_json(r#"{ "instructions": [] }"#),
            Err(DescriptorError::Malformed(_))
        ));
        assert!(matches!(
            Descriptor::<Counter>::from_json(r#"{ "address": "nope", "instructions": [] }"#),
            Err(DescriptorError::InvalidProgramId(_))
        ));

        let short = COUNTER.replace("[1, 2, 3, 4, 5, 6, 7, 8]", "[1, 2]");
        assert!(matches!(
            Descriptor::<Counter>::from_json(&short),
            Err(DescriptorError::Malformed(_))
        ));
    }

    #[test]
    fn test_duplicate_operation() {
        let source = COUNTER.replace(r#""name": "close""#, r#""name": "initialize""#);
        assert!(matches!(
            Descriptor::<Counter>::from_json(&source),
            Err(DescriptorError::DuplicateOperation(name)) if name == "initialize"
        ));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counter.json");
        std::fs::write(&path, COUNTER).unwrap();

        let descriptor = Descriptor::<Counter>::from_file(&path).unwrap();
        assert!(descriptor.operation(Counter::Initialize).is_some());

        let missing = Descriptor::<Counter>::from_file(dir.path().join("missing.json"));
        assert!(matches!(missing, Err(DescriptorError::Io(_))));
    }

    #[test]
    fn test_describe_failure() {
        let descriptor = Descriptor::<Counter>::from_json(COUNTER).unwrap();
        assert_eq!(
            descriptor.describe_failure("Error processing Instruction 0: custom program error: 0x1770"),
            "Error processing Instruction 0: custom program error: 0x1770 (Overflow: Counter overflowed)"
        );
        assert_eq!(descriptor.describe_failure("InsufficientFundsForFee"), "InsufficientFundsForFee");
    }

    #[test]
    fn test_operation_names() {
        assert_eq!(to_snake_case("mintRoomToken"), "mint_room_token");
        assert_eq!(to_snake_case("book_room"), "book_room");
        assert_eq!(Counter::from_name("Increment"), Some(Counter::Increment));
        assert_eq!(Counter::from_name("decrement"), None);
    }
}
