//! Seed Phrase Recovery Engine
//!
//! Recovers partially-known mnemonic seed phrases by generating
//! candidate phrases, deriving keys for the configured wallet family
//! and chain, and matching the results against an extended public key,
//! explicit addresses, or an on-disk address database.

pub mod addressset;
pub mod config;
pub mod derivation;
pub mod encoding;
pub mod engine;
pub mod error;
pub mod generator;
pub mod wordlist;

pub use addressset::{AccessMode, AddressSet, AddressSetDescriptor};
pub use config::RecoveryConfig;
pub use derivation::{
    MatchInfo, MatchTarget, MnemonicIds, WalletBip39, WalletDerivation, WalletElectrum1,
    WalletElectrum2,
};
pub use engine::{
    BatchVerifier, CpuBatchVerifier, EnginePhase, SearchOutcome, VerificationEngine,
};
pub use error::*;
pub use generator::{PerformanceIterator, PhraseGenerator, StridedGenerator};
pub use wordlist::{WordId, Wordlist, INVALID_WORD_ID};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::addressset::{AccessMode, AddressSet, AddressSetDescriptor};
    pub use crate::config::RecoveryConfig;
    pub use crate::derivation::{MatchInfo, MatchTarget, MnemonicIds, WalletDerivation};
    pub use crate::engine::{
        BatchVerifier, CpuBatchVerifier, SearchOutcome, VerificationEngine,
    };
    pub use crate::error::*;
    pub use crate::generator::PhraseGenerator;
    pub use crate::wordlist::{WordId, Wordlist};
}


/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default batch size for candidate processing
pub const DEFAULT_BATCH_SIZE: usize = 1024;

/// Maximum supported mnemonic length
pub const MAX_MNEMONIC_LENGTH: usize = 24;

/// Minimum supported mnemonic length
pub const MIN_MNEMONIC_LENGTH: usize = 12;
