//! Multi-chain HD wallet derivation and target matching
//!
//! Each supported wallet family implements `WalletDerivation`: it fixes
//! the id representation of the user's guess, then answers one question
//! per candidate: does any derived address (or the account-level
//! extended key) hit the configured target. Chains are described by a
//! static parameter table; wallet families differ in how a candidate
//! becomes key material, not in how matching works.

use crate::addressset::AddressSet;
use crate::encoding::{
    base58check_decode, base58check_encode, bech32_hash_decode, bech32_hash_encode,
    cashaddr_decode, cashaddr_encode, decode_extended_pubkey, eth_decode, eth_encode,
    keccak_address_hash, p2sh_p2wpkh_hash, pubkey_hash160, ripple_decode, ripple_encode,
    segwit_v0_decode, segwit_v0_encode, zilliqa_address_hash,
};
use crate::error::{ConfigError, RecoveryError, Result};
use crate::wordlist::{WordId, Wordlist};
use bitcoin::bip32::{ChildNumber, DerivationPath, Xpriv, Xpub};
use bitcoin::hashes::{sha256, sha256d, Hash};
use bitcoin::secp256k1::{All, PublicKey, Scalar, Secp256k1, SecretKey};
use bitcoin::Network;
use hmac::{Hmac, Mac};
use log::debug;
use pbkdf2::pbkdf2;
use sha2::Sha512;
use std::str::FromStr;
use unicode_normalization::UnicodeNormalization;

/// PBKDF2 rounds shared by BIP39 and Electrum 2 seed derivation
const PBKDF2_ROUNDS: u32 = 2048;

/// SHA256 rounds of the Electrum 1 key stretch
const ELECTRUM1_STRETCH_ROUNDS: u32 = 100_000;

/// An ordered sequence of word ids, immutable once produced
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MnemonicIds(pub Vec<WordId>);

impl MnemonicIds {
    pub fn new(ids: Vec<WordId>) -> Self {
        Self(ids)
    }

    pub fn ids(&self) -> &[WordId] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Render against a vocabulary; unresolved ids show as "?"
    pub fn phrase(&self, wordlist: &Wordlist) -> String {
        self.0
            .iter()
            .map(|&id| wordlist.word(id).unwrap_or("?"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// What a search is matching against; exactly one per wallet
#[derive(Debug)]
pub enum MatchTarget {
    /// Extended public key (xpub/ypub/zpub) or an Electrum 1 master
    /// public key as 128 hex chars
    Mpk(String),
    /// Small exact list of chain-encoded addresses
    Addresses(Vec<String>),
    /// Large probabilistic membership set of address hashes
    AddressSet(AddressSet),
}

/// Details of a successful match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchInfo {
    pub phrase: String,
    pub passphrase: String,
    pub path: String,
    pub index: u32,
    pub address: String,
}

/// Target after configuration-time parsing
enum Target {
    AccountXpub(Xpub),
    ElectrumMpk([u8; 64]),
    Hashes(Vec<[u8; 20]>),
    Set(AddressSet),
}

impl Target {
    fn contains(&self, hash: &[u8; 20]) -> bool {
        match self {
            Target::Hashes(hashes) => hashes.contains(hash),
            Target::Set(set) => set.contains(hash),
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Chain registry

/// Address construction family for a chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainKind {
    Utxo,
    Ethereum,
    Ripple,
    Zilliqa,
}

/// Static per-chain constants. Chains are data, not subclasses.
#[derive(Debug)]
pub struct ChainParams {
    pub name: &'static str,
    pub coin: u32,
    pub p2pkh_version: u8,
    pub p2sh_version: u8,
    pub bech32_hrp: Option<&'static str>,
    pub cashaddr_prefix: Option<&'static str>,
    pub kind: ChainKind,
    pub default_paths: &'static [&'static str],
}

pub static CHAINS: &[ChainParams] = &[
    ChainParams {
        name: "btc",
        coin: 0,
        p2pkh_version: 0x00,
        p2sh_version: 0x05,
        bech32_hrp: Some("bc"),
        cashaddr_prefix: None,
        kind: ChainKind::Utxo,
        default_paths: &["m/44'/0'/0'/0", "m/49'/0'/0'/0", "m/84'/0'/0'/0"],
    },
    ChainParams {
        name: "ltc",
        coin: 2,
        p2pkh_version: 0x30,
        p2sh_version: 0x32,
        bech32_hrp: Some("ltc"),
        cashaddr_prefix: None,
        kind: ChainKind::Utxo,
        default_paths: &["m/44'/2'/0'/0", "m/49'/2'/0'/0", "m/84'/2'/0'/0"],
    },
    ChainParams {
        name: "bch",
        coin: 145,
        p2pkh_version: 0x00,
        p2sh_version: 0x05,
        bech32_hrp: None,
        cashaddr_prefix: Some("bitcoincash"),
        kind: ChainKind::Utxo,
        default_paths: &["m/44'/145'/0'/0", "m/44'/0'/0'/0"],
    },
    ChainParams {
        name: "dash",
        coin: 5,
        p2pkh_version: 0x4C,
        p2sh_version: 0x10,
        bech32_hrp: None,
        cashaddr_prefix: None,
        kind: ChainKind::Utxo,
        default_paths: &["m/44'/5'/0'/0"],
    },
    ChainParams {
        name: "doge",
        coin: 3,
        p2pkh_version: 0x1E,
        p2sh_version: 0x16,
        bech32_hrp: None,
        cashaddr_prefix: None,
        kind: ChainKind::Utxo,
        default_paths: &["m/44'/3'/0'/0"],
    },
    ChainParams {
        name: "vtc",
        coin: 28,
        p2pkh_version: 0x47,
        p2sh_version: 0x05,
        bech32_hrp: Some("vtc"),
        cashaddr_prefix: None,
        kind: ChainKind::Utxo,
        default_paths: &["m/44'/28'/0'/0", "m/49'/28'/0'/0", "m/84'/28'/0'/0"],
    },
    ChainParams {
        name: "mona",
        coin: 22,
        p2pkh_version: 0x32,
        p2sh_version: 0x37,
        bech32_hrp: Some("monacoin"),
        cashaddr_prefix: None,
        kind: ChainKind::Utxo,
        default_paths: &["m/44'/22'/0'/0", "m/49'/22'/0'/0", "m/84'/22'/0'/0"],
    },
    ChainParams {
        name: "dgb",
        coin: 20,
        p2pkh_version: 0x1E,
        p2sh_version: 0x3F,
        bech32_hrp: Some("dgb"),
        cashaddr_prefix: None,
        kind: ChainKind::Utxo,
        default_paths: &["m/44'/20'/0'/0", "m/49'/20'/0'/0", "m/84'/20'/0'/0"],
    },
    ChainParams {
        name: "eth",
        coin: 60,
        p2pkh_version: 0x00,
        p2sh_version: 0x00,
        bech32_hrp: None,
        cashaddr_prefix: None,
        kind: ChainKind::Ethereum,
        default_paths: &["m/44'/60'/0'/0"],
    },
    ChainParams {
        name: "xrp",
        coin: 144,
        p2pkh_version: 0x00,
        p2sh_version: 0x00,
        bech32_hrp: None,
        cashaddr_prefix: None,
        kind: ChainKind::Ripple,
        default_paths: &["m/44'/144'/0'/0"],
    },
    ChainParams {
        name: "zil",
        coin: 313,
        p2pkh_version: 0x00,
        p2sh_version: 0x00,
        bech32_hrp: Some("zil"),
        cashaddr_prefix: None,
        kind: ChainKind::Zilliqa,
        default_paths: &["m/44'/313'/0'/0"],
    },
];

/// Look up chain constants by short name
pub fn chain_params(name: &str) -> Result<&'static ChainParams> {
    CHAINS
        .iter()
        .find(|c| c.name == name)
        .ok_or_else(|| ConfigError::UnsupportedWalletType(name.to_string()).into())
}

/// How a derived public key becomes an address, decided per path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AddressScheme {
    P2pkh,
    P2shP2wpkh,
    P2wpkh,
    CashAddr,
    Ethereum,
    Ripple,
    Zilliqa,
}

/// BIP49 paths wrap in p2sh, BIP84 paths are native segwit; anything
/// else falls back to the chain's own scheme.
fn scheme_for_path(params: &ChainParams, path: &DerivationPath) -> AddressScheme {
    let purpose = path.into_iter().next().and_then(|c| match c {
        ChildNumber::Hardened { index } => Some(*index),
        _ => None,
    });
    match purpose {
        Some(49) if params.kind == ChainKind::Utxo => AddressScheme::P2shP2wpkh,
        Some(84) if params.kind == ChainKind::Utxo => AddressScheme::P2wpkh,
        _ => match params.kind {
            ChainKind::Utxo if params.cashaddr_prefix.is_some() => AddressScheme::CashAddr,
            ChainKind::Utxo => AddressScheme::P2pkh,
            ChainKind::Ethereum => AddressScheme::Ethereum,
            ChainKind::Ripple => AddressScheme::Ripple,
            ChainKind::Zilliqa => AddressScheme::Zilliqa,
        },
    }
}

fn hash_for_scheme(
    secp: &Secp256k1<All>,
    scheme: AddressScheme,
    key: &SecretKey,
) -> [u8; 20] {
    let pubkey = PublicKey::from_secret_key(secp, key);
    match scheme {
        AddressScheme::P2pkh
        | AddressScheme::P2wpkh
        | AddressScheme::CashAddr
        | AddressScheme::Ripple => pubkey_hash160(&pubkey.serialize()),
        AddressScheme::P2shP2wpkh => p2sh_p2wpkh_hash(&pubkey.serialize()),
        AddressScheme::Ethereum => keccak_address_hash(&pubkey.serialize_uncompressed()),
        AddressScheme::Zilliqa => zilliqa_address_hash(&pubkey.serialize()),
    }
}

fn encode_for_scheme(params: &ChainParams, scheme: AddressScheme, hash: &[u8; 20]) -> Result<String> {
    match scheme {
        AddressScheme::P2pkh => Ok(base58check_encode(params.p2pkh_version, hash)),
        AddressScheme::P2shP2wpkh => Ok(base58check_encode(params.p2sh_version, hash)),
        AddressScheme::P2wpkh => {
            let hrp = params
                .bech32_hrp
                .ok_or_else(|| ConfigError::UnsupportedWalletType(params.name.to_string()))?;
            segwit_v0_encode(hrp, hash)
        }
        AddressScheme::CashAddr => {
            let prefix = params
                .cashaddr_prefix
                .ok_or_else(|| ConfigError::UnsupportedWalletType(params.name.to_string()))?;
            cashaddr_encode(prefix, hash)
        }
        AddressScheme::Ethereum => Ok(eth_encode(hash)),
        AddressScheme::Ripple => Ok(ripple_encode(hash)),
        AddressScheme::Zilliqa => {
            let hrp = params
                .bech32_hrp
                .ok_or_else(|| ConfigError::UnsupportedWalletType(params.name.to_string()))?;
            bech32_hash_encode(hrp, hash)
        }
    }
}

/// Decode a chain-encoded target address to its 20-byte hash, trying
/// the encodings the chain actually uses
pub fn decode_chain_address(params: &ChainParams, address: &str) -> Result<[u8; 20]> {
    match params.kind {
        ChainKind::Ethereum => eth_decode(address),
        ChainKind::Ripple => ripple_decode(address),
        ChainKind::Zilliqa => {
            if address.starts_with("zil1") {
                bech32_hash_decode("zil", address)
            } else {
                eth_decode(address)
            }
        }
        ChainKind::Utxo => {
            if let Some(hrp) = params.bech32_hrp {
                if address.starts_with(&format!("{}1", hrp)) {
                    return segwit_v0_decode(hrp, address);
                }
            }
            if let Some(prefix) = params.cashaddr_prefix {
                return cashaddr_decode(prefix, address);
            }
            base58check_decode(address, params.p2pkh_version)
                .or_else(|_| base58check_decode(address, params.p2sh_version))
        }
    }
}

fn resolve_target(params: Option<&ChainParams>, target: MatchTarget) -> Result<Target> {
    match target {
        MatchTarget::Mpk(text) => Ok(Target::AccountXpub(decode_extended_pubkey(&text)?)),
        MatchTarget::Addresses(addresses) => {
            if addresses.is_empty() {
                return Err(ConfigError::MissingTarget.into());
            }
            let params = params.ok_or(ConfigError::MissingTarget)?;
            let hashes = addresses
                .iter()
                .map(|a| decode_chain_address(params, a))
                .collect::<Result<Vec<_>>>()?;
            Ok(Target::Hashes(hashes))
        }
        MatchTarget::AddressSet(set) => Ok(Target::Set(set)),
    }
}

// ---------------------------------------------------------------------------
// Shared helpers

/// BIP39 checksum over raw word ids. Cheaper than parsing a phrase and
/// filters almost 1/16 of the 12-word space before any key stretching.
pub fn bip39_checksum_ok(ids: &[WordId]) -> bool {
    let word_count = ids.len();
    if !matches!(word_count, 12 | 15 | 18 | 21 | 24) {
        return false;
    }
    let total_bits = word_count * 11;
    let entropy_bits = total_bits * 32 / 33;

    let mut bits = Vec::with_capacity(total_bits);
    for &id in ids {
        if id >= 2048 {
            return false;
        }
        for shift in (0..11).rev() {
            bits.push((id >> shift) & 1 == 1);
        }
    }

    let mut entropy = vec![0u8; entropy_bits / 8];
    for (i, &bit) in bits[..entropy_bits].iter().enumerate() {
        if bit {
            entropy[i / 8] |= 1 << (7 - i % 8);
        }
    }

    let digest = sha256::Hash::hash(&entropy).to_byte_array();
    bits[entropy_bits..]
        .iter()
        .enumerate()
        .all(|(i, &bit)| bit == ((digest[i / 8] >> (7 - i % 8)) & 1 == 1))
}

fn pbkdf2_seed(data: &[u8], salt: &[u8]) -> Result<[u8; 64]> {
    let mut seed = [0u8; 64];
    pbkdf2::<Hmac<Sha512>>(data, salt, PBKDF2_ROUNDS, &mut seed)
        .map_err(|_| RecoveryError::Internal("PBKDF2 output length".to_string()))?;
    Ok(seed)
}

fn nfkd(text: &str) -> String {
    text.nfkd().collect()
}

/// UTF-16 code units encoded individually as UTF-8, so supplementary
/// characters become six bytes from their surrogate pair. This is how
/// narrow-Unicode builds of the emulated software encoded passphrases;
/// trying it keeps old wallets recoverable.
fn cesu8_bytes(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() * 2);
    for unit in text.encode_utf16() {
        let u = unit as u32;
        if u < 0x80 {
            out.push(u as u8);
        } else if u < 0x800 {
            out.push(0xC0 | (u >> 6) as u8);
            out.push(0x80 | (u & 0x3F) as u8);
        } else {
            out.push(0xE0 | (u >> 12) as u8);
            out.push(0x80 | ((u >> 6) & 0x3F) as u8);
            out.push(0x80 | (u & 0x3F) as u8);
        }
    }
    out
}

fn has_supplementary(text: &str) -> bool {
    text.chars().any(|c| c as u32 > 0xFFFF)
}

/// Apply a per-character normalization the way a narrow build would:
/// supplementary characters are opaque there and pass through, only the
/// BMP segments between them get normalized.
fn narrow_build_apply(text: &str, normalize: fn(&str) -> String) -> String {
    let mut out = String::with_capacity(text.len());
    let mut segment = String::new();
    for c in text.chars() {
        if c as u32 > 0xFFFF {
            out.push_str(&normalize(&segment));
            segment.clear();
            out.push(c);
        } else {
            segment.push(c);
        }
    }
    out.push_str(&normalize(&segment));
    out
}

/// The emulated software's seed/passphrase text normalization: NFKD,
/// lowercase, combining marks dropped, whitespace runs collapsed.
fn electrum_normalize(text: &str) -> String {
    let decomposed: String = text.nfkd().collect::<String>().to_lowercase();
    let stripped: String = decomposed
        .chars()
        .filter(|&c| !unicode_normalization::char::is_combining_mark(c))
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn narrow_electrum_normalize(text: &str) -> String {
    fn bmp(segment: &str) -> String {
        let decomposed: String = segment.nfkd().collect::<String>().to_lowercase();
        decomposed
            .chars()
            .filter(|&c| !unicode_normalization::char::is_combining_mark(c))
            .collect()
    }
    let kept = narrow_build_apply(text, bmp);
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn narrow_nfkd(text: &str) -> String {
    narrow_build_apply(text, nfkd)
}

/// Expand a passphrase list into labeled salt byte strings: the prefix
/// plus the normalized passphrase in UTF-8, and additionally the
/// narrow-build CESU-8 form when the passphrase leaves the BMP.
fn expand_salts(
    prefix: &[u8],
    passphrases: &[String],
    normalize: fn(&str) -> String,
    narrow_normalize: fn(&str) -> String,
) -> Vec<(String, Vec<u8>)> {
    let passphrases: Vec<String> = if passphrases.is_empty() {
        vec![String::new()]
    } else {
        passphrases.to_vec()
    };

    let mut salts = Vec::with_capacity(passphrases.len());
    for passphrase in &passphrases {
        let mut salt = prefix.to_vec();
        salt.extend_from_slice(normalize(passphrase).as_bytes());
        salts.push((passphrase.clone(), salt));

        if has_supplementary(passphrase) {
            let mut salt = prefix.to_vec();
            salt.extend_from_slice(&cesu8_bytes(&narrow_normalize(passphrase)));
            salts.push((passphrase.clone(), salt));
        }
    }
    salts
}

/// Leading run of hardened components, where account-level extended
/// keys live
fn hardened_prefix(path: &DerivationPath) -> DerivationPath {
    path.into_iter()
        .take_while(|c| c.is_hardened())
        .cloned()
        .collect::<Vec<_>>()
        .into()
}

fn xpub_matches(a: &Xpub, b: &Xpub) -> bool {
    a.public_key == b.public_key && a.chain_code == b.chain_code
}

/// Capability interface every wallet family implements
pub trait WalletDerivation: Send + Sync {
    /// Fix the id representation of the guess phrase and the passphrase
    /// expansion. Must be called before any derivation.
    fn config_mnemonic(
        &mut self,
        guess_phrase: &str,
        passphrases: &[String],
        expected_len: usize,
    ) -> Result<MnemonicIds>;

    /// Vocabulary candidates are expressed in
    fn wordlist(&self) -> &Wordlist;

    /// Candidate length fixed by `config_mnemonic`
    fn expected_len(&self) -> usize;

    /// One candidate in, a hit or a miss out. Errors abort the search;
    /// candidates that merely fail to derive are misses.
    fn derive_and_match(&self, candidate: &MnemonicIds) -> Result<Option<MatchInfo>>;
}

// ---------------------------------------------------------------------------
// BIP39 family

/// BIP39 + BIP32 derivation over any registered chain
pub struct WalletBip39 {
    params: &'static ChainParams,
    secp: Secp256k1<All>,
    wordlist: Wordlist,
    paths: Vec<DerivationPath>,
    address_limit: u32,
    address_start_index: u32,
    target: Target,
    salts: Vec<(String, Vec<u8>)>,
    expected_len: usize,
}

impl WalletBip39 {
    pub fn create_from_params(
        chain: &str,
        target: MatchTarget,
        paths: Option<Vec<String>>,
        address_limit: u32,
        address_start_index: u32,
    ) -> Result<Self> {
        let params = chain_params(chain)?;
        if address_limit == 0 {
            return Err(ConfigError::InvalidBatchSize(0).into());
        }
        let path_strings: Vec<String> = match paths {
            Some(p) if !p.is_empty() => p,
            _ => params.default_paths.iter().map(|p| p.to_string()).collect(),
        };
        let paths = path_strings
            .iter()
            .map(|p| {
                DerivationPath::from_str(p)
                    .map_err(|_| ConfigError::InvalidDerivationPath(p.clone()).into())
            })
            .collect::<Result<Vec<_>>>()?;
        let target = resolve_target(Some(params), target)?;

        Ok(Self {
            params,
            secp: Secp256k1::new(),
            wordlist: Wordlist::english(),
            paths,
            address_limit,
            address_start_index,
            target,
            salts: expand_salts(b"mnemonic", &[], nfkd, narrow_nfkd),
            expected_len: 0,
        })
    }

    fn match_account_xpub(
        &self,
        master: &Xpriv,
        path: &DerivationPath,
        expected: &Xpub,
        phrase: &str,
        passphrase: &str,
    ) -> Result<Option<MatchInfo>> {
        let account_path = hardened_prefix(path);
        let account = master.derive_priv(&self.secp, &account_path)?;
        let derived = Xpub::from_priv(&self.secp, &account);
        if xpub_matches(&derived, expected) {
            debug!("extended key match at {}", account_path);
            return Ok(Some(MatchInfo {
                phrase: phrase.to_string(),
                passphrase: passphrase.to_string(),
                path: account_path.to_string(),
                index: 0,
                address: derived.to_string(),
            }));
        }
        Ok(None)
    }

    fn match_addresses(
        &self,
        master: &Xpriv,
        path: &DerivationPath,
        phrase: &str,
        passphrase: &str,
    ) -> Result<Option<MatchInfo>> {
        let scheme = scheme_for_path(self.params, path);
        let branch = master.derive_priv(&self.secp, path)?;
        for index in self.address_start_index..self.address_start_index + self.address_limit {
            let child = branch.derive_priv(
                &self.secp,
                &[ChildNumber::from_normal_idx(index)
                    .map_err(|_| ConfigError::InvalidInput(format!("address index {}", index)))?],
            )?;
            let hash = hash_for_scheme(&self.secp, scheme, &child.private_key);
            if self.target.contains(&hash) {
                return Ok(Some(MatchInfo {
                    phrase: phrase.to_string(),
                    passphrase: passphrase.to_string(),
                    path: path.to_string(),
                    index,
                    address: encode_for_scheme(self.params, scheme, &hash)?,
                }));
            }
        }
        Ok(None)
    }
}

impl WalletDerivation for WalletBip39 {
    fn config_mnemonic(
        &mut self,
        guess_phrase: &str,
        passphrases: &[String],
        expected_len: usize,
    ) -> Result<MnemonicIds> {
        if !matches!(expected_len, 12 | 15 | 18 | 21 | 24) {
            return Err(ConfigError::InvalidMnemonicLength(expected_len).into());
        }
        self.expected_len = expected_len;
        self.salts = expand_salts(b"mnemonic", passphrases, nfkd, narrow_nfkd);
        let ids = guess_phrase
            .split_whitespace()
            .map(|w| self.wordlist.resolve(w))
            .collect();
        Ok(MnemonicIds::new(ids))
    }

    fn wordlist(&self) -> &Wordlist {
        &self.wordlist
    }

    fn expected_len(&self) -> usize {
        self.expected_len
    }

    fn derive_and_match(&self, candidate: &MnemonicIds) -> Result<Option<MatchInfo>> {
        if candidate.len() != self.expected_len
            || candidate.ids().iter().any(|&id| !self.wordlist.is_valid(id))
            || !bip39_checksum_ok(candidate.ids())
        {
            return Ok(None);
        }
        let phrase = candidate.phrase(&self.wordlist);

        for (passphrase, salt) in &self.salts {
            let seed = pbkdf2_seed(nfkd(&phrase).as_bytes(), salt)?;
            let master = Xpriv::new_master(Network::Bitcoin, &seed)?;
            for path in &self.paths {
                let hit = match &self.target {
                    Target::AccountXpub(expected) => {
                        self.match_account_xpub(&master, path, expected, &phrase, passphrase)?
                    }
                    _ => self.match_addresses(&master, path, &phrase, passphrase)?,
                };
                if hit.is_some() {
                    return Ok(hit);
                }
            }
        }
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// Electrum 1 (pre-2.0)

/// Legacy Electrum: 3 words encode 4 seed bytes over an arbitrary word
/// list, a 100k-round sha256 stretch produces the master secret, and
/// addresses come from uncompressed keys via non-BIP32 sequence tweaks.
pub struct WalletElectrum1 {
    secp: Secp256k1<All>,
    wordlist: Wordlist,
    address_limit: u32,
    address_start_index: u32,
    target: Target,
    expected_len: usize,
}

impl WalletElectrum1 {
    pub fn create_from_params(
        wordlist: Wordlist,
        target: MatchTarget,
        address_limit: u32,
        address_start_index: u32,
    ) -> Result<Self> {
        if wordlist.is_empty() {
            return Err(ConfigError::InvalidInput("empty word list".to_string()).into());
        }
        let target = match target {
            MatchTarget::Mpk(text) => {
                let bytes = hex::decode(&text)
                    .map_err(|_| ConfigError::InvalidInput(format!("mpk: {}", text)))?;
                if bytes.len() != 64 {
                    return Err(
                        ConfigError::InvalidInput(format!("mpk length {}", bytes.len())).into()
                    );
                }
                let mut mpk = [0u8; 64];
                mpk.copy_from_slice(&bytes);
                Target::ElectrumMpk(mpk)
            }
            MatchTarget::Addresses(addresses) => {
                if addresses.is_empty() {
                    return Err(ConfigError::MissingTarget.into());
                }
                let hashes = addresses
                    .iter()
                    .map(|a| base58check_decode(a, 0x00))
                    .collect::<Result<Vec<_>>>()?;
                Target::Hashes(hashes)
            }
            MatchTarget::AddressSet(set) => Target::Set(set),
        };
        Ok(Self {
            secp: Secp256k1::new(),
            wordlist,
            address_limit,
            address_start_index,
            target,
            expected_len: 0,
        })
    }

    /// 3 words to 8 hex digits, per the legacy encoding
    fn mn_decode(&self, ids: &[WordId]) -> String {
        let n = self.wordlist.len() as u64;
        let mut hex_seed = String::with_capacity(ids.len() / 3 * 8);
        for group in ids.chunks_exact(3) {
            let (w1, w2, w3) = (group[0] as u64, group[1] as u64, group[2] as u64);
            let value = w1
                .wrapping_add(n.wrapping_mul((w2 + n - w1 % n) % n))
                .wrapping_add(n.wrapping_mul(n).wrapping_mul((w3 + n - w2 % n) % n));
            hex_seed.push_str(&format!("{:08x}", value));
        }
        hex_seed
    }

    fn stretch(seed_hex: &str) -> [u8; 32] {
        let seed_bytes = seed_hex.as_bytes();
        let mut x = seed_bytes.to_vec();
        for _ in 0..ELECTRUM1_STRETCH_ROUNDS {
            let mut input = x;
            input.extend_from_slice(seed_bytes);
            x = sha256::Hash::hash(&input).to_byte_array().to_vec();
        }
        let mut out = [0u8; 32];
        out.copy_from_slice(&x);
        out
    }

    fn sequence_tweak(mpk: &[u8; 64], index: u32, change: u32) -> [u8; 32] {
        let mut input = format!("{}:{}:", index, change).into_bytes();
        input.extend_from_slice(mpk);
        sha256d::Hash::hash(&input).to_byte_array()
    }

    fn mpk_of(&self, master_secret: &SecretKey) -> [u8; 64] {
        let pubkey = PublicKey::from_secret_key(&self.secp, master_secret);
        let mut mpk = [0u8; 64];
        mpk.copy_from_slice(&pubkey.serialize_uncompressed()[1..]);
        mpk
    }

    /// Public-only derivation from a master public key, the path a
    /// watch-only wallet takes
    pub fn pubkey_from_mpk(&self, mpk: &[u8; 64], index: u32, change: u32) -> Result<PublicKey> {
        let mut uncompressed = [0u8; 65];
        uncompressed[0] = 0x04;
        uncompressed[1..].copy_from_slice(mpk);
        let point = PublicKey::from_slice(&uncompressed)?;
        let tweak = Scalar::from_be_bytes(Self::sequence_tweak(mpk, index, change))
            .map_err(|e| RecoveryError::Internal(e.to_string()))?;
        Ok(point.add_exp_tweak(&self.secp, &tweak)?)
    }
}

impl WalletDerivation for WalletElectrum1 {
    fn config_mnemonic(
        &mut self,
        guess_phrase: &str,
        passphrases: &[String],
        expected_len: usize,
    ) -> Result<MnemonicIds> {
        if expected_len == 0 || expected_len % 3 != 0 {
            return Err(ConfigError::InvalidMnemonicLength(expected_len).into());
        }
        if !passphrases.is_empty() {
            return Err(
                ConfigError::InvalidInput("passphrases are not part of this scheme".into()).into(),
            );
        }
        self.expected_len = expected_len;
        let ids = guess_phrase
            .split_whitespace()
            .map(|w| self.wordlist.resolve(w))
            .collect();
        Ok(MnemonicIds::new(ids))
    }

    fn wordlist(&self) -> &Wordlist {
        &self.wordlist
    }

    fn expected_len(&self) -> usize {
        self.expected_len
    }

    fn derive_and_match(&self, candidate: &MnemonicIds) -> Result<Option<MatchInfo>> {
        if candidate.len() != self.expected_len
            || candidate.ids().iter().any(|&id| !self.wordlist.is_valid(id))
        {
            return Ok(None);
        }
        let seed_hex = self.mn_decode(candidate.ids());
        let stretched = Self::stretch(&seed_hex);
        let master_secret = match SecretKey::from_slice(&stretched) {
            Ok(key) => key,
            Err(_) => return Ok(None), // not a valid scalar; a miss, not an error
        };
        let mpk = self.mpk_of(&master_secret);
        let phrase = candidate.phrase(&self.wordlist);

        if let Target::ElectrumMpk(expected) = &self.target {
            if &mpk == expected {
                return Ok(Some(MatchInfo {
                    phrase,
                    passphrase: String::new(),
                    path: "m".to_string(),
                    index: 0,
                    address: hex::encode(mpk),
                }));
            }
            return Ok(None);
        }

        for index in self.address_start_index..self.address_start_index + self.address_limit {
            let tweak = Scalar::from_be_bytes(Self::sequence_tweak(&mpk, index, 0))
                .map_err(|e| RecoveryError::Internal(e.to_string()))?;
            let child = master_secret
                .add_tweak(&tweak)
                .map_err(|e| RecoveryError::Internal(e.to_string()))?;
            let pubkey = PublicKey::from_secret_key(&self.secp, &child);
            let hash = pubkey_hash160(&pubkey.serialize_uncompressed());
            if self.target.contains(&hash) {
                return Ok(Some(MatchInfo {
                    phrase,
                    passphrase: String::new(),
                    path: format!("0/{}", index),
                    index,
                    address: base58check_encode(0x00, &hash),
                }));
            }
        }
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// Electrum 2 (seed-version seeds)

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Electrum2Kind {
    Standard,
    Segwit,
}

/// Modern Electrum seeds: validity comes from an HMAC version prefix
/// rather than a wordlist checksum, then BIP32 from a PBKDF2 seed with
/// the `electrum` salt.
pub struct WalletElectrum2 {
    params: &'static ChainParams,
    secp: Secp256k1<All>,
    wordlist: Wordlist,
    address_limit: u32,
    address_start_index: u32,
    target: Target,
    salts: Vec<(String, Vec<u8>)>,
    expected_len: usize,
}

impl WalletElectrum2 {
    pub fn create_from_params(
        chain: &str,
        target: MatchTarget,
        address_limit: u32,
        address_start_index: u32,
    ) -> Result<Self> {
        let params = chain_params(chain)?;
        let target = resolve_target(Some(params), target)?;
        Ok(Self {
            params,
            secp: Secp256k1::new(),
            wordlist: Wordlist::english(),
            address_limit,
            address_start_index,
            target,
            salts: expand_salts(b"electrum", &[], electrum_normalize, narrow_electrum_normalize),
            expected_len: 0,
        })
    }

    /// HMAC seed-version check; the prefix selects the derivation layout
    fn seed_kind(phrase: &str) -> Option<Electrum2Kind> {
        let mut mac = match Hmac::<Sha512>::new_from_slice(b"Seed version") {
            Ok(mac) => mac,
            Err(_) => return None,
        };
        mac.update(phrase.as_bytes());
        let digest = hex::encode(mac.finalize().into_bytes());
        if digest.starts_with("01") {
            Some(Electrum2Kind::Standard)
        } else if digest.starts_with("100") {
            Some(Electrum2Kind::Segwit)
        } else {
            None
        }
    }

    fn match_at(
        &self,
        master: &Xpriv,
        kind: Electrum2Kind,
        phrase: &str,
        passphrase: &str,
    ) -> Result<Option<MatchInfo>> {
        let (account_path, branch_path, scheme) = match kind {
            Electrum2Kind::Standard => ("m", "m/0", AddressScheme::P2pkh),
            Electrum2Kind::Segwit => ("m/0'", "m/0'/0", AddressScheme::P2wpkh),
        };
        // CashAddr chains keep legacy key derivation, only the encoding
        // differs
        let scheme = if self.params.cashaddr_prefix.is_some() && scheme == AddressScheme::P2pkh {
            AddressScheme::CashAddr
        } else {
            scheme
        };

        if let Target::AccountXpub(expected) = &self.target {
            let account_path = DerivationPath::from_str(account_path)
                .map_err(|_| ConfigError::InvalidDerivationPath(account_path.to_string()))?;
            let account = master.derive_priv(&self.secp, &account_path)?;
            let derived = Xpub::from_priv(&self.secp, &account);
            if xpub_matches(&derived, expected) {
                return Ok(Some(MatchInfo {
                    phrase: phrase.to_string(),
                    passphrase: passphrase.to_string(),
                    path: account_path.to_string(),
                    index: 0,
                    address: derived.to_string(),
                }));
            }
            return Ok(None);
        }

        let branch_path = DerivationPath::from_str(branch_path)
            .map_err(|_| ConfigError::InvalidDerivationPath(branch_path.to_string()))?;
        let branch = master.derive_priv(&self.secp, &branch_path)?;
        for index in self.address_start_index..self.address_start_index + self.address_limit {
            let child = branch.derive_priv(
                &self.secp,
                &[ChildNumber::from_normal_idx(index)
                    .map_err(|_| ConfigError::InvalidInput(format!("address index {}", index)))?],
            )?;
            let hash = hash_for_scheme(&self.secp, scheme, &child.private_key);
            if self.target.contains(&hash) {
                return Ok(Some(MatchInfo {
                    phrase: phrase.to_string(),
                    passphrase: passphrase.to_string(),
                    path: branch_path.to_string(),
                    index,
                    address: encode_for_scheme(self.params, scheme, &hash)?,
                }));
            }
        }
        Ok(None)
    }
}

impl WalletDerivation for WalletElectrum2 {
    fn config_mnemonic(
        &mut self,
        guess_phrase: &str,
        passphrases: &[String],
        expected_len: usize,
    ) -> Result<MnemonicIds> {
        // 13-word seeds exist from the 2.0 era
        if !(12..=24).contains(&expected_len) {
            return Err(ConfigError::InvalidMnemonicLength(expected_len).into());
        }
        self.expected_len = expected_len;
        self.salts = expand_salts(b"electrum", passphrases, electrum_normalize, narrow_electrum_normalize);
        let ids = guess_phrase
            .split_whitespace()
            .map(|w| self.wordlist.resolve(w))
            .collect();
        Ok(MnemonicIds::new(ids))
    }

    fn wordlist(&self) -> &Wordlist {
        &self.wordlist
    }

    fn expected_len(&self) -> usize {
        self.expected_len
    }

    fn derive_and_match(&self, candidate: &MnemonicIds) -> Result<Option<MatchInfo>> {
        if candidate.len() != self.expected_len
            || candidate.ids().iter().any(|&id| !self.wordlist.is_valid(id))
        {
            return Ok(None);
        }
        let phrase = candidate.phrase(&self.wordlist);
        let kind = match Self::seed_kind(&phrase) {
            Some(kind) => kind,
            None => return Ok(None), // not an Electrum seed of a supported kind
        };

        for (passphrase, salt) in &self.salts {
            let seed = pbkdf2_seed(phrase.as_bytes(), salt)?;
            let master = Xpriv::new_master(Network::Bitcoin, &seed)?;
            if let Some(info) = self.match_at(&master, kind, &phrase, passphrase)? {
                return Ok(Some(info));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addressset::AddressSet;
    use crate::wordlist::INVALID_WORD_ID;

    fn ids_of(wallet: &mut dyn WalletDerivation, phrase: &str, len: usize) -> MnemonicIds {
        wallet.config_mnemonic(phrase, &[], len).unwrap()
    }

    #[test]
    fn test_bip39_checksum() {
        let wl = Wordlist::english();
        let phrase = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
        let ids: Vec<WordId> = phrase.split_whitespace().map(|w| wl.resolve(w)).collect();
        assert!(bip39_checksum_ok(&ids));

        let mut wrong = ids.clone();
        wrong[11] = wl.resolve("zoo");
        assert!(!bip39_checksum_ok(&wrong));
        assert!(!bip39_checksum_ok(&ids[..11]));
    }

    #[test]
    fn test_bip39_seed_vector() {
        let phrase = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
        let seed = pbkdf2_seed(phrase.as_bytes(), b"mnemonic").unwrap();
        assert_eq!(
            hex::encode(seed),
            "5eb00bbddcf069084889a8ab9155568165f5c453ccb85e70811aaed6f6da5fc1\
             9a5ac40b389cd370d086206dec8aa6c43daea6690f20ad3d8d48b2d2ce9e38e4"
        );
    }

    #[test]
    fn test_bip44_btc_address() {
        let mut wallet = WalletBip39::create_from_params(
            "btc",
            MatchTarget::Addresses(vec!["1AiAYaVJ7SCkDeNqgFz7UDecycgzb6LoT3".to_string()]),
            None,
            2,
            0,
        )
        .unwrap();
        let ids = ids_of(
            &mut wallet,
            "certain come keen collect slab gauge photo inside mechanic deny leader drop",
            12,
        );
        let info = wallet.derive_and_match(&ids).unwrap().unwrap();
        assert_eq!(info.address, "1AiAYaVJ7SCkDeNqgFz7UDecycgzb6LoT3");
        assert_eq!(info.index, 1);
    }

    #[test]
    fn test_address_limit_boundary() {
        // The hit sits at index 1; a limit of 1 must turn it into a miss
        let mut wallet = WalletBip39::create_from_params(
            "btc",
            MatchTarget::Addresses(vec!["1AiAYaVJ7SCkDeNqgFz7UDecycgzb6LoT3".to_string()]),
            None,
            1,
            0,
        )
        .unwrap();
        let ids = ids_of(
            &mut wallet,
            "certain come keen collect slab gauge photo inside mechanic deny leader drop",
            12,
        );
        assert_eq!(wallet.derive_and_match(&ids).unwrap(), None);
    }

    #[test]
    fn test_bip39_xpub_target() {
        let mut wallet = WalletBip39::create_from_params(
            "btc",
            MatchTarget::Mpk(
                "xpub6BgCDhMefYxRS1gbVbxyokYzQji65v1eGJXGEiGdoobvFBShcNeJt97zoJBkNtbASLyTPYXJHRvkb3ahxaVVGEtC1AD4LyuBXULZcfCjBZx".to_string(),
            ),
            None,
            1,
            0,
        )
        .unwrap();
        let ids = ids_of(
            &mut wallet,
            "certain come keen collect slab gauge photo inside mechanic deny leader drop",
            12,
        );
        let info = wallet.derive_and_match(&ids).unwrap().unwrap();
        assert_eq!(info.path, "44'/0'/0'");

        let wrong = ids_of(
            &mut wallet,
            "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about",
            12,
        );
        assert_eq!(wallet.derive_and_match(&wrong).unwrap(), None);
    }

    #[test]
    fn test_bip39_firstfour_guess() {
        // The guess may use four-letter reductions; ids are identical
        let mut wallet = WalletBip39::create_from_params(
            "btc",
            MatchTarget::Mpk(
                "xpub6BgCDhMefYxRS1gbVbxyokYzQji65v1eGJXGEiGdoobvFBShcNeJt97zoJBkNtbASLyTPYXJHRvkb3ahxaVVGEtC1AD4LyuBXULZcfCjBZx".to_string(),
            ),
            None,
            1,
            0,
        )
        .unwrap();
        let ids = ids_of(
            &mut wallet,
            "cert come keen coll slab gaug phot insi mech deny lead drop",
            12,
        );
        assert!(wallet.derive_and_match(&ids).unwrap().is_some());
    }

    #[test]
    fn test_bip39_passphrase() {
        let mut wallet = WalletBip39::create_from_params(
            "btc",
            MatchTarget::Mpk(
                "xpub6D3uXJmdUg4xVnCUkNXJPCkk18gZAB8exGdQeb2rDwC5UJtraHHARSCc2Nz7rQ14godicjXiKxhUn39gbAw6Xb5eWb5srcbkhqPgAqoTMEY".to_string(),
            ),
            None,
            1,
            0,
        )
        .unwrap();
        let ids = wallet
            .config_mnemonic(
                "certain come keen collect slab gauge photo inside mechanic deny leader drop",
                &["btcr-test-password".to_string()],
                12,
            )
            .unwrap();
        let info = wallet.derive_and_match(&ids).unwrap().unwrap();
        assert_eq!(info.passphrase, "btcr-test-password");
    }

    #[test]
    fn test_bip39_passphrase_non_ascii() {
        let mut wallet = WalletBip39::create_from_params(
            "btc",
            MatchTarget::Mpk(
                "xpub6CZe1G1A1CaaSepbekLMSk1sBRNA9kHZzEQCedudHAQHHB21FW9fYpQWXBevrLVQfL8JFQVFWEw3aACdr6szksaGsLiHDKyRd1rPJ6ev5ig".to_string(),
            ),
            None,
            1,
            0,
        )
        .unwrap();
        let ids = wallet
            .config_mnemonic(
                "certain come keen collect slab gauge photo inside mechanic deny leader drop",
                &["btcr-тест-пароль".to_string()],
                12,
            )
            .unwrap();
        assert!(wallet.derive_and_match(&ids).unwrap().is_some());
    }

    #[test]
    fn test_bip49_and_bip84() {
        let phrase = "element entire sniff tired miracle solve shadow scatter hello never \
                      tank side sight isolate sister uniform advice pen praise soap lizard \
                      festival connect baby";
        for (path, address) in [
            ("m/49'/0'/0'/0", "3NiRFNztVLMZF21gx6eE1nL3Q57GMGuunG"),
            ("m/84'/0'/0'/0", "bc1qv87qf7prhjf2ld8vgm7l0mj59jggm6ae5jdkx2"),
        ] {
            let mut wallet = WalletBip39::create_from_params(
                "btc",
                MatchTarget::Addresses(vec![address.to_string()]),
                Some(vec![path.to_string()]),
                2,
                0,
            )
            .unwrap();
            let ids = ids_of(&mut wallet, phrase, 24);
            let info = wallet.derive_and_match(&ids).unwrap().unwrap();
            assert_eq!(info.address, address);
        }
    }

    #[test]
    fn test_address_start_index() {
        let phrase = "element entire sniff tired miracle solve shadow scatter hello never \
                      tank side sight isolate sister uniform advice pen praise soap lizard \
                      festival connect baby";
        let mut wallet = WalletBip39::create_from_params(
            "btc",
            MatchTarget::Addresses(vec!["3MtDzhXzsSSkn49WdYCno7o5ZqAVxsFmqj".to_string()]),
            Some(vec!["m/49'/0'/0'/0".to_string()]),
            2,
            18,
        )
        .unwrap();
        let ids = ids_of(&mut wallet, phrase, 24);
        assert!(wallet.derive_and_match(&ids).unwrap().is_some());
    }

    #[test]
    fn test_ethereum_address() {
        let mut wallet = WalletBip39::create_from_params(
            "eth",
            MatchTarget::Addresses(vec!["0x9544a5BD7D9AACDc0A12c360C1ec6182C84bab11".to_string()]),
            None,
            3,
            0,
        )
        .unwrap();
        let ids = ids_of(
            &mut wallet,
            "cable top mango offer mule air lounge refuse stove text cattle opera",
            12,
        );
        assert!(wallet.derive_and_match(&ids).unwrap().is_some());
    }

    #[test]
    fn test_ethereum_short_hex_target() {
        let mut wallet = WalletBip39::create_from_params(
            "eth",
            MatchTarget::Addresses(vec!["0xaeaa91ba7235dc2d90e28875d3e466aaa27e076d".to_string()]),
            None,
            2,
            0,
        )
        .unwrap();
        let ids = ids_of(
            &mut wallet,
            "appear section card oak mercy output person grab rotate sort where rural",
            12,
        );
        assert!(wallet.derive_and_match(&ids).unwrap().is_some());
    }

    #[test]
    fn test_ripple_address() {
        let mut wallet = WalletBip39::create_from_params(
            "xrp",
            MatchTarget::Addresses(vec!["rJGNUmwiYDwXEsLzUFV9njhP3syrDvA6hs".to_string()]),
            None,
            2,
            0,
        )
        .unwrap();
        let ids = ids_of(
            &mut wallet,
            "certain come keen collect slab gauge photo inside mechanic deny leader drop",
            12,
        );
        assert!(wallet.derive_and_match(&ids).unwrap().is_some());
    }

    #[test]
    fn test_bch_cashaddr() {
        let phrase = "element entire sniff tired miracle solve shadow scatter hello never \
                      tank side sight isolate sister uniform advice pen praise soap lizard \
                      festival connect baby";
        // With and without the human prefix
        for address in [
            "bitcoincash:qrdupm96x04u3ssjnuj7lpy7adt9y34p5vzh95y0y7",
            "qrdupm96x04u3ssjnuj7lpy7adt9y34p5vzh95y0y7",
        ] {
            let mut wallet = WalletBip39::create_from_params(
                "bch",
                MatchTarget::Addresses(vec![address.to_string()]),
                Some(vec!["m/44'/145'/0'/0".to_string()]),
                2,
                0,
            )
            .unwrap();
            let ids = ids_of(&mut wallet, phrase, 24);
            assert!(wallet.derive_and_match(&ids).unwrap().is_some());
        }
    }

    #[test]
    fn test_zilliqa_address_both_forms() {
        let phrase = "perfect pottery lens service hurry wood danger cannon empower know cloth buffalo";
        for address in [
            "zil1v89vx8mr07360easnp80aycvmheqwqt3880guh",
            "0x61cac31f637fa3a7e7b0984efe930cddf2070171",
        ] {
            let mut wallet = WalletBip39::create_from_params(
                "zil",
                MatchTarget::Addresses(vec![address.to_string()]),
                None,
                3,
                0,
            )
            .unwrap();
            let ids = ids_of(&mut wallet, phrase, 12);
            assert!(wallet.derive_and_match(&ids).unwrap().is_some());
        }
    }

    #[test]
    fn test_address_set_target() {
        let hash = base58check_decode("1AiAYaVJ7SCkDeNqgFz7UDecycgzb6LoT3", 0x00).unwrap();
        let mut set = AddressSet::new(65536, 8).unwrap();
        set.add(&hash).unwrap();

        let mut wallet = WalletBip39::create_from_params(
            "btc",
            MatchTarget::AddressSet(set),
            None,
            2,
            0,
        )
        .unwrap();
        let ids = ids_of(
            &mut wallet,
            "certain come keen collect slab gauge photo inside mechanic deny leader drop",
            12,
        );
        assert!(wallet.derive_and_match(&ids).unwrap().is_some());
    }

    #[test]
    fn test_checksum_failures_are_misses() {
        let mut wallet = WalletBip39::create_from_params(
            "btc",
            MatchTarget::Addresses(vec!["1AiAYaVJ7SCkDeNqgFz7UDecycgzb6LoT3".to_string()]),
            None,
            2,
            0,
        )
        .unwrap();
        wallet
            .config_mnemonic("certain come keen collect slab gauge photo inside mechanic deny leader drop", &[], 12)
            .unwrap();
        // Invalid checksum after a word swap: a cheap miss
        let wl = Wordlist::english();
        let mut ids: Vec<WordId> =
            "certain come keen collect slab gauge photo inside mechanic deny leader drop"
                .split_whitespace()
                .map(|w| wl.resolve(w))
                .collect();
        ids.swap(0, 1);
        assert_eq!(
            wallet.derive_and_match(&MnemonicIds::new(ids)).unwrap(),
            None
        );
        // An unresolved word id is likewise a miss
        assert_eq!(
            wallet
                .derive_and_match(&MnemonicIds::new(vec![INVALID_WORD_ID; 12]))
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_electrum1_private_and_public_paths_agree() {
        // A small synthetic word list stands in for the legacy 1626-word
        // table, which ships separately as data.
        let words: Vec<String> = (0..16).map(|i| format!("word{:02}", i)).collect();
        let wordlist = Wordlist::from_words(words);

        // First derive the mpk by the private-key path.
        let probe = WalletElectrum1::create_from_params(
            wordlist.clone(),
            MatchTarget::Mpk("00".repeat(64)),
            1,
            0,
        )
        .unwrap();
        let ids: Vec<WordId> = vec![3, 7, 1, 15, 0, 9, 4, 4, 2, 11, 8, 5];
        let seed_hex = probe.mn_decode(&ids);
        assert_eq!(seed_hex.len(), 32); // 4 groups of 8 hex digits
        let master_secret = SecretKey::from_slice(&WalletElectrum1::stretch(&seed_hex)).unwrap();
        let mpk = probe.mpk_of(&master_secret);

        // Watch-only derivation from the mpk must land on the same keys.
        let secp = Secp256k1::new();
        for index in 0..3 {
            let tweak =
                Scalar::from_be_bytes(WalletElectrum1::sequence_tweak(&mpk, index, 0)).unwrap();
            let private_side =
                PublicKey::from_secret_key(&secp, &master_secret.add_tweak(&tweak).unwrap());
            let public_side = probe.pubkey_from_mpk(&mpk, index, 0).unwrap();
            assert_eq!(private_side, public_side);
        }

        // And the mpk target must verify through the wallet interface.
        let mut wallet = WalletElectrum1::create_from_params(
            wordlist,
            MatchTarget::Mpk(hex::encode(mpk)),
            1,
            0,
        )
        .unwrap();
        let phrase = ids
            .iter()
            .map(|&id| format!("word{:02}", id))
            .collect::<Vec<_>>()
            .join(" ");
        let candidate = wallet.config_mnemonic(&phrase, &[], 12).unwrap();
        assert_eq!(candidate.ids(), &ids[..]);
        assert!(wallet.derive_and_match(&candidate).unwrap().is_some());
    }

    #[test]
    fn test_electrum2_standard_xpub() {
        let mut wallet = WalletElectrum2::create_from_params(
            "btc",
            MatchTarget::Mpk(
                "xpub661MyMwAqRbcGt6qtQ19Ttwvo5Dbf2cQdA2GMf9Xkjth8NqYXXordg3gLK1npATRm9Fr7d7fA5ziCwqEVMmzeRezofp8CEaru8pJ57zV8hN".to_string(),
            ),
            1,
            0,
        )
        .unwrap();
        let ids = ids_of(
            &mut wallet,
            "spot deputy pencil nasty fire boss moral rubber bacon thumb thumb icon",
            12,
        );
        assert!(wallet.derive_and_match(&ids).unwrap().is_some());
    }

    #[test]
    fn test_electrum2_standard_address() {
        let mut wallet = WalletElectrum2::create_from_params(
            "btc",
            MatchTarget::Addresses(vec!["1HQrNUBEsEqwEaZZzMqqLqCHSVCGF7dTVS".to_string()]),
            5,
            0,
        )
        .unwrap();
        let ids = ids_of(
            &mut wallet,
            "spot deputy pencil nasty fire boss moral rubber bacon thumb thumb icon",
            12,
        );
        assert!(wallet.derive_and_match(&ids).unwrap().is_some());
    }

    #[test]
    fn test_electrum2_thirteen_word_seed() {
        let mut wallet = WalletElectrum2::create_from_params(
            "btc",
            MatchTarget::Mpk(
                "xpub661MyMwAqRbcGsUXkGBkytQkYZ6M16bFWwTocQDdPSm6eJ1wUsxG5qty1kTCUq7EztwMscUstHVo1XCJMxWyLn4PP1asLjt4gPt3HkA81qe".to_string(),
            ),
            1,
            0,
        )
        .unwrap();
        let ids = ids_of(
            &mut wallet,
            "eagle pair eager human cage forget pony fall robot vague later bright acid",
            13,
        );
        assert!(wallet.derive_and_match(&ids).unwrap().is_some());
    }

    #[test]
    fn test_electrum2_segwit_address() {
        let mut wallet = WalletElectrum2::create_from_params(
            "btc",
            MatchTarget::Addresses(vec!["bc1qztc99re7ml7hv4q4ds3jv29w7u4evwqd6t76kz".to_string()]),
            5,
            0,
        )
        .unwrap();
        let ids = ids_of(
            &mut wallet,
            "first focus motor give search custom grocery suspect myth popular trigger praise",
            12,
        );
        assert!(wallet.derive_and_match(&ids).unwrap().is_some());
    }

    #[test]
    fn test_electrum2_rejects_foreign_seed() {
        // A BIP39 phrase fails the seed-version gate without deriving
        let mut wallet = WalletElectrum2::create_from_params(
            "btc",
            MatchTarget::Addresses(vec!["1HQrNUBEsEqwEaZZzMqqLqCHSVCGF7dTVS".to_string()]),
            5,
            0,
        )
        .unwrap();
        let ids = ids_of(
            &mut wallet,
            "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about",
            12,
        );
        assert_eq!(wallet.derive_and_match(&ids).unwrap(), None);
    }

    #[test]
    fn test_electrum2_passphrase() {
        let mut wallet = WalletElectrum2::create_from_params(
            "btc",
            MatchTarget::Mpk(
                "xpub661MyMwAqRbcEa7eRrwnfAmhDAKBzFiuNxjcUKhwk18J3z1muMxnm1AKYjUo3VEUfYBDshhyxcUqpvqJEgacEMYyGRa7TUNXbieqrKibhCg".to_string(),
            ),
            1,
            0,
        )
        .unwrap();
        let ids = wallet
            .config_mnemonic(
                "water wait table horse smooth birth identify food favorite depend brother hand",
                &["btcr-test-password".to_string()],
                12,
            )
            .unwrap();
        assert!(wallet.derive_and_match(&ids).unwrap().is_some());
    }

    #[test]
    fn test_electrum2_wide_passphrase_both_encodings() {
        // A passphrase outside the BMP is tried both as clean UTF-8 and
        // as the CESU-8 byte stream a narrow-Unicode build produced.
        let passphrase = "\u{1d505}tcr \u{1d517}est \u{1d513}assword 测试密码".to_string();
        for xpub in [
            // clean UTF-8 encoding
            "xpub661MyMwAqRbcG4s8buUEpDeeBMZeXxnroY3i9jZJNQuDrWQaCyR5Mvk9pmRK5q5WrEKTwSuYwBiSjcp3ZkM2ujhngFQXxvrTyv2uFCryyii",
            // narrow-build CESU-8 encoding
            "xpub661MyMwAqRbcGYwDPmhGppsmr2NxcoFNAzGy3qRcE9wrtQhF6tCjtitFnizWKHv684AfshexRAiByRFX3VHpugBcAMYpwQezeYroi53KEKM",
        ] {
            let mut wallet = WalletElectrum2::create_from_params(
                "btc",
                MatchTarget::Mpk(xpub.to_string()),
                1,
                0,
            )
            .unwrap();
            let ids = wallet
                .config_mnemonic(
                    "eagle pair eager human cage forget pony fall robot vague later bright acid",
                    std::slice::from_ref(&passphrase),
                    13,
                )
                .unwrap();
            assert!(
                wallet.derive_and_match(&ids).unwrap().is_some(),
                "no match for {}",
                xpub
            );
        }
    }

    #[test]
    fn test_unknown_chain_rejected() {
        let result = WalletBip39::create_from_params(
            "grs",
            MatchTarget::Addresses(vec!["FqGMQvKCb2idGbDd6SUBFuugynXRACEzuQ".to_string()]),
            None,
            2,
            0,
        );
        assert!(matches!(
            result,
            Err(RecoveryError::Config(ConfigError::UnsupportedWalletType(_)))
        ));
    }
}
