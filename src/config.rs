//! Configuration types and parsing for the recovery engine

use crate::addressset::{AccessMode, AddressSet};
use crate::derivation::{
    MatchTarget, MnemonicIds, WalletBip39, WalletDerivation, WalletElectrum1, WalletElectrum2,
};
use crate::error::{ConfigError, Result};
use crate::generator::PhraseGenerator;
use crate::wordlist::Wordlist;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure for a recovery run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// Wallet family: "bip39", "electrum1" or "electrum2"
    #[serde(default = "default_wallet_type")]
    pub wallet_type: String,

    /// Chain the target lives on (short name, e.g. "btc", "eth")
    #[serde(default = "default_chain")]
    pub chain: String,

    /// Best-guess seed phrase; typo mode mutates this
    #[serde(default)]
    pub mnemonic_guess: String,

    /// Word count of the correct phrase
    pub mnemonic_length: usize,

    /// Seed extension passphrases to try ("" is always implied when empty)
    #[serde(default)]
    pub passphrases: Vec<String>,

    /// Match target: an extended public key (or Electrum 1 hex mpk)
    #[serde(default)]
    pub mpk: Option<String>,

    /// Match target: explicit addresses
    #[serde(default)]
    pub addresses: Vec<String>,

    /// Match target: path to an on-disk address database
    #[serde(default)]
    pub address_db: Option<PathBuf>,

    /// Derivation paths to search; empty means the chain's defaults
    #[serde(default)]
    pub derivation_paths: Vec<String>,

    /// Addresses checked per branch, starting at address_start_index
    #[serde(default = "default_address_limit")]
    pub address_limit: u32,

    #[serde(default)]
    pub address_start_index: u32,

    /// Total edit budget for typo mode
    #[serde(default)]
    pub typos: u32,

    /// How many of those edits may be big (replace/insert/delete)
    #[serde(default)]
    pub big_typos: u32,

    /// One complete candidate phrase per line; overrides typo mode
    #[serde(default)]
    pub seedlist_file: Option<PathBuf>,

    /// Per-position word alternatives, one line per position
    #[serde(default)]
    pub tokenlist_file: Option<PathBuf>,

    /// Custom vocabulary, required for electrum1 (one word per line)
    #[serde(default)]
    pub wordlist_file: Option<PathBuf>,

    /// Candidates handed to the verifier at a time
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Worker threads; 0 selects one per logical CPU
    #[serde(default)]
    pub num_threads: usize,
}

/// Default functions for serde
fn default_wallet_type() -> String {
    "bip39".to_string()
}

fn default_chain() -> String {
    "btc".to_string()
}

fn default_address_limit() -> u32 {
    10
}

fn default_batch_size() -> usize {
    crate::DEFAULT_BATCH_SIZE
}

impl RecoveryConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Load configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let config: RecoveryConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.mnemonic_length < crate::MIN_MNEMONIC_LENGTH
            || self.mnemonic_length > crate::MAX_MNEMONIC_LENGTH
        {
            return Err(ConfigError::InvalidMnemonicLength(self.mnemonic_length).into());
        }

        match self.wallet_type.as_str() {
            "bip39" | "electrum2" => {}
            "electrum1" => {
                if self.wordlist_file.is_none() {
                    return Err(ConfigError::InvalidInput(
                        "electrum1 requires wordlist_file".to_string(),
                    )
                    .into());
                }
            }
            other => return Err(ConfigError::UnsupportedWalletType(other.to_string()).into()),
        }

        // Exactly one match target
        let targets = usize::from(self.mpk.is_some())
            + usize::from(!self.addresses.is_empty())
            + usize::from(self.address_db.is_some());
        match targets {
            0 => return Err(ConfigError::MissingTarget.into()),
            1 => {}
            _ => {
                return Err(ConfigError::InvalidInput(
                    "mpk, addresses and address_db are mutually exclusive".to_string(),
                )
                .into())
            }
        }

        if self.batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size).into());
        }
        if self.address_limit == 0 {
            return Err(ConfigError::InvalidInput("address_limit must be > 0".to_string()).into());
        }
        if self.big_typos > self.typos {
            return Err(ConfigError::MalformedTypoBudget {
                typos: self.typos,
                big_typos: self.big_typos,
            }
            .into());
        }
        if self.seedlist_file.is_none()
            && self.tokenlist_file.is_none()
            && self.mnemonic_guess.trim().is_empty()
        {
            return Err(ConfigError::InvalidInput(
                "no candidate source: set mnemonic_guess, seedlist_file or tokenlist_file"
                    .to_string(),
            )
            .into());
        }

        Ok(())
    }

    fn match_target(&self) -> Result<MatchTarget> {
        if let Some(mpk) = &self.mpk {
            return Ok(MatchTarget::Mpk(mpk.clone()));
        }
        if !self.addresses.is_empty() {
            return Ok(MatchTarget::Addresses(self.addresses.clone()));
        }
        let path = self.address_db.as_ref().ok_or(ConfigError::MissingTarget)?;
        let set = AddressSet::from_file(path, AccessMode::ReadOnly, false)?;
        Ok(MatchTarget::AddressSet(set))
    }

    /// Build the configured wallet and resolve the guess phrase
    pub fn build_wallet(&self) -> Result<(Box<dyn WalletDerivation>, MnemonicIds)> {
        let target = self.match_target()?;
        let paths = if self.derivation_paths.is_empty() {
            None
        } else {
            Some(self.derivation_paths.clone())
        };

        let mut wallet: Box<dyn WalletDerivation> = match self.wallet_type.as_str() {
            "bip39" => Box::new(WalletBip39::create_from_params(
                &self.chain,
                target,
                paths,
                self.address_limit,
                self.address_start_index,
            )?),
            "electrum1" => {
                let wordlist = self.load_wordlist()?;
                Box::new(WalletElectrum1::create_from_params(
                    wordlist,
                    target,
                    self.address_limit,
                    self.address_start_index,
                )?)
            }
            "electrum2" => Box::new(WalletElectrum2::create_from_params(
                &self.chain,
                target,
                self.address_limit,
                self.address_start_index,
            )?),
            other => return Err(ConfigError::UnsupportedWalletType(other.to_string()).into()),
        };

        let guess =
            wallet.config_mnemonic(&self.mnemonic_guess, &self.passphrases, self.mnemonic_length)?;
        Ok((wallet, guess))
    }

    /// Build the candidate generator for the configured search mode
    pub fn build_generator(&self, wallet: &dyn WalletDerivation) -> Result<PhraseGenerator> {
        if let Some(path) = &self.seedlist_file {
            let content = std::fs::read_to_string(path)?;
            let lines: Vec<&str> = content.lines().collect();
            return PhraseGenerator::from_literal_lines(&lines, wallet.wordlist());
        }
        if let Some(path) = &self.tokenlist_file {
            let content = std::fs::read_to_string(path)?;
            let lines: Vec<&str> = content.lines().collect();
            return PhraseGenerator::from_positional_lines(&lines, wallet.wordlist());
        }
        let guess_words: Vec<String> = self
            .mnemonic_guess
            .split_whitespace()
            .map(str::to_string)
            .collect();
        PhraseGenerator::from_typos(
            wallet.wordlist(),
            &guess_words,
            self.typos,
            self.big_typos,
            self.mnemonic_length,
        )
    }

    fn load_wordlist(&self) -> Result<Wordlist> {
        let path = self.wordlist_file.as_ref().ok_or_else(|| {
            ConfigError::InvalidInput("electrum1 requires wordlist_file".to_string())
        })?;
        let content = std::fs::read_to_string(path)?;
        let words: Vec<String> = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        if words.is_empty() {
            return Err(ConfigError::InvalidInput(format!(
                "wordlist file {} is empty",
                path.display()
            ))
            .into());
        }
        Ok(Wordlist::from_words(words))
    }

    /// Worker thread count after resolving the auto default
    pub fn worker_count(&self) -> usize {
        if self.num_threads == 0 {
            num_cpus::get()
        } else {
            self.num_threads
        }
    }
}
