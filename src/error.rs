//! Error types for the seed phrase recovery engine

use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum RecoveryError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Checksum error: {0}")]
    Checksum(#[from] ChecksumError),

    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    #[error("Generator error: {0}")]
    Generator(#[from] GeneratorError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors, reported before any search starts
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid mnemonic length: {0}")]
    InvalidMnemonicLength(usize),

    #[error("Invalid derivation path: {0}")]
    InvalidDerivationPath(String),

    #[error("Unsupported wallet type: {0}")]
    UnsupportedWalletType(String),

    #[error("Unsupported extended key version bytes: {0}")]
    UnsupportedVersionBytes(String),

    #[error("Invalid address for the configured chain: {0}")]
    InvalidAddress(String),

    #[error("Malformed typo budget: {typos} typos with {big_typos} big typos")]
    MalformedTypoBudget { typos: u32, big_typos: u32 },

    #[error("Address set table length {0} is not a power of 256")]
    InvalidTableLength(u64),

    #[error("Empty word alternatives for position {0}")]
    EmptyWordAlternatives(usize),

    #[error("Invalid batch size: {0}. Must be greater than 0")]
    InvalidBatchSize(usize),

    #[error("No match target configured (expected an mpk, addresses, or an address database)")]
    MissingTarget,

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Checksum failures on decoded addresses or extended keys.
/// Fatal for that specific input, not for an in-progress search.
#[derive(Error, Debug)]
pub enum ChecksumError {
    #[error("base58check checksum failed for {0}")]
    Base58(String),

    #[error("bech32 decode failed for {0}")]
    Bech32(String),

    #[error("cash address checksum failed for {0}")]
    CashAddr(String),

    #[error("EIP-55 checksum failed for {0}")]
    Eip55(String),

    #[error("extended key checksum or structure invalid: {0}")]
    ExtendedKey(String),
}

/// Failures of external resources; abort the affected search, never silent
#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("Address set file missing or unreadable: {0}")]
    AddressSetFile(String),

    #[error("Address set file corrupt: {0}")]
    AddressSetCorrupt(String),

    #[error("Address set opened read-only; cannot add")]
    AddressSetReadOnly,

    #[error("Address set was created in memory and has no file to transfer")]
    AddressSetNotBacked,

    #[error("Accelerator dispatch failed: {0}")]
    Accelerator(String),

    #[error("No accelerator devices found")]
    NoDevicesFound,
}

/// Candidate generation errors
#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("Search space too large: {0} combinations")]
    SearchSpaceTooLarge(u64),

    #[error("Candidate list file is empty")]
    EmptyCandidateList,

    #[error("Unparsable candidate list line {0}: {1}")]
    BadListLine(usize, String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, RecoveryError>;

/// Convert bip32 errors into checksum/structure failures
impl From<bitcoin::bip32::Error> for RecoveryError {
    fn from(err: bitcoin::bip32::Error) -> Self {
        RecoveryError::Checksum(ChecksumError::ExtendedKey(err.to_string()))
    }
}

impl From<bitcoin::secp256k1::Error> for RecoveryError {
    fn from(err: bitcoin::secp256k1::Error) -> Self {
        RecoveryError::Internal(err.to_string())
    }
}

impl From<anyhow::Error> for RecoveryError {
    fn from(err: anyhow::Error) -> Self {
        RecoveryError::Internal(err.to_string())
    }
}
