//! Per-chain address codecs and public-key hash schemes
//!
//! Everything here is a pure function over bytes. Checksum failures are
//! reported per input; they never abort an in-progress search.

use crate::error::{ChecksumError, ConfigError, Result};
use bech32::{FromBase32, ToBase32, Variant};
use bitcoin::base58;
use bitcoin::bip32::Xpub;
use bitcoin::hashes::{hash160, sha256, Hash};
use keccak_hash::keccak;

/// BIP32 mainnet public version bytes (xpub)
pub const VERSION_XPUB: [u8; 4] = [0x04, 0x88, 0xB2, 0x1E];
/// BIP49 (p2sh-p2wpkh) public version bytes (ypub)
pub const VERSION_YPUB: [u8; 4] = [0x04, 0x9D, 0x7C, 0xB2];
/// BIP84 (p2wpkh) public version bytes (zpub)
pub const VERSION_ZPUB: [u8; 4] = [0x04, 0xB2, 0x47, 0x46];

// ---------------------------------------------------------------------------
// Public-key hash schemes

/// HASH160 (sha256 then ripemd160) of a serialized public key
pub fn pubkey_hash160(pubkey: &[u8]) -> [u8; 20] {
    hash160::Hash::hash(pubkey).to_byte_array()
}

/// Script hash of the p2sh-wrapped p2wpkh redeem script (BIP49)
pub fn p2sh_p2wpkh_hash(compressed_pubkey: &[u8]) -> [u8; 20] {
    let pubkey_hash = pubkey_hash160(compressed_pubkey);
    let mut redeem_script = Vec::with_capacity(22);
    redeem_script.push(0x00); // OP_0
    redeem_script.push(0x14); // push 20 bytes
    redeem_script.extend_from_slice(&pubkey_hash);
    hash160::Hash::hash(&redeem_script).to_byte_array()
}

/// Ethereum address bytes: trailing 20 bytes of the keccak-256 of the
/// uncompressed public key without its 0x04 tag
pub fn keccak_address_hash(uncompressed_pubkey: &[u8; 65]) -> [u8; 20] {
    let digest = keccak(&uncompressed_pubkey[1..]);
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&digest.as_bytes()[12..]);
    hash
}

/// Zilliqa address bytes: trailing 20 bytes of the sha256 of the
/// compressed public key
pub fn zilliqa_address_hash(compressed_pubkey: &[u8]) -> [u8; 20] {
    let digest = sha256::Hash::hash(compressed_pubkey).to_byte_array();
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&digest[12..]);
    hash
}

// ---------------------------------------------------------------------------
// base58check

pub fn base58check_encode(version: u8, hash: &[u8; 20]) -> String {
    let mut payload = Vec::with_capacity(21);
    payload.push(version);
    payload.extend_from_slice(hash);
    base58::encode_check(&payload)
}

pub fn base58check_decode(address: &str, version: u8) -> Result<[u8; 20]> {
    let payload = base58::decode_check(address)
        .map_err(|_| ChecksumError::Base58(address.to_string()))?;
    if payload.len() != 21 || payload[0] != version {
        return Err(ConfigError::InvalidAddress(address.to_string()).into());
    }
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&payload[1..]);
    Ok(hash)
}

// ---------------------------------------------------------------------------
// segwit bech32 (witness v0, p2wpkh)

pub fn segwit_v0_encode(hrp: &str, program: &[u8; 20]) -> Result<String> {
    let version = bech32::u5::try_from_u8(0)
        .map_err(|e| ChecksumError::Bech32(e.to_string()))?;
    let mut data = vec![version];
    data.extend(program.to_base32());
    bech32::encode(hrp, data, Variant::Bech32)
        .map_err(|e| ChecksumError::Bech32(e.to_string()))
        .map_err(Into::into)
}

pub fn segwit_v0_decode(hrp: &str, address: &str) -> Result<[u8; 20]> {
    let (got_hrp, data, variant) =
        bech32::decode(address).map_err(|_| ChecksumError::Bech32(address.to_string()))?;
    if variant != Variant::Bech32 || got_hrp != hrp {
        return Err(ConfigError::InvalidAddress(address.to_string()).into());
    }
    let (version, program) = data
        .split_first()
        .ok_or_else(|| ChecksumError::Bech32(address.to_string()))?;
    if version.to_u8() != 0 {
        return Err(ConfigError::InvalidAddress(address.to_string()).into());
    }
    let bytes = Vec::<u8>::from_base32(program)
        .map_err(|_| ChecksumError::Bech32(address.to_string()))?;
    to_hash20(&bytes, address)
}

// ---------------------------------------------------------------------------
// custom-HRP bech32 (Zilliqa and friends): the 20 address bytes are the
// whole data part, no witness version

pub fn bech32_hash_encode(hrp: &str, hash: &[u8; 20]) -> Result<String> {
    bech32::encode(hrp, hash.to_base32(), Variant::Bech32)
        .map_err(|e| ChecksumError::Bech32(e.to_string()))
        .map_err(Into::into)
}

pub fn bech32_hash_decode(hrp: &str, address: &str) -> Result<[u8; 20]> {
    let (got_hrp, data, variant) =
        bech32::decode(address).map_err(|_| ChecksumError::Bech32(address.to_string()))?;
    if variant != Variant::Bech32 || got_hrp != hrp {
        return Err(ConfigError::InvalidAddress(address.to_string()).into());
    }
    let bytes = Vec::<u8>::from_base32(&data)
        .map_err(|_| ChecksumError::Bech32(address.to_string()))?;
    to_hash20(&bytes, address)
}

// ---------------------------------------------------------------------------
// cash address (Bitcoin Cash)

const CASHADDR_CHARSET: &[u8] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";

fn cashaddr_polymod(values: &[u8]) -> u64 {
    let mut c: u64 = 1;
    for &d in values {
        let c0 = (c >> 35) as u8;
        c = ((c & 0x0007_ffff_ffff) << 5) ^ d as u64;
        if c0 & 0x01 != 0 {
            c ^= 0x98_f2bc_8e61;
        }
        if c0 & 0x02 != 0 {
            c ^= 0x79_b76d_99e2;
        }
        if c0 & 0x04 != 0 {
            c ^= 0xf3_3e5f_b3c4;
        }
        if c0 & 0x08 != 0 {
            c ^= 0xae_2eab_e2a8;
        }
        if c0 & 0x10 != 0 {
            c ^= 0x1e_4f43_e470;
        }
    }
    c ^ 1
}

fn cashaddr_expand_prefix(prefix: &str) -> Vec<u8> {
    let mut out: Vec<u8> = prefix.bytes().map(|b| b & 0x1f).collect();
    out.push(0);
    out
}

/// Regroup a bit stream between group sizes. `pad` appends zero bits on
/// encode; decode rejects nonzero padding.
fn convert_bits(data: &[u8], from: u32, to: u32, pad: bool) -> Option<Vec<u8>> {
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let mut out = Vec::new();
    let maxv: u32 = (1 << to) - 1;
    for &value in data {
        if (value as u32) >> from != 0 {
            return None;
        }
        acc = (acc << from) | value as u32;
        bits += from;
        while bits >= to {
            bits -= to;
            out.push(((acc >> bits) & maxv) as u8);
        }
    }
    if pad {
        if bits > 0 {
            out.push(((acc << (to - bits)) & maxv) as u8);
        }
    } else if bits >= from || ((acc << (to - bits)) & maxv) != 0 {
        return None;
    }
    Some(out)
}

/// Encode a 20-byte hash as a p2pkh cash address, prefix included
pub fn cashaddr_encode(prefix: &str, hash: &[u8; 20]) -> Result<String> {
    let mut payload = Vec::with_capacity(21);
    payload.push(0x00); // p2pkh, 160-bit hash
    payload.extend_from_slice(hash);
    let data = convert_bits(&payload, 8, 5, true)
        .ok_or_else(|| ChecksumError::CashAddr(prefix.to_string()))?;

    let mut checksum_input = cashaddr_expand_prefix(prefix);
    checksum_input.extend_from_slice(&data);
    checksum_input.extend_from_slice(&[0u8; 8]);
    let polymod = cashaddr_polymod(&checksum_input);

    let mut address = String::with_capacity(prefix.len() + 1 + data.len() + 8);
    address.push_str(prefix);
    address.push(':');
    for &d in &data {
        address.push(CASHADDR_CHARSET[d as usize] as char);
    }
    for i in 0..8 {
        let d = ((polymod >> (5 * (7 - i))) & 0x1f) as usize;
        address.push(CASHADDR_CHARSET[d] as char);
    }
    Ok(address)
}

/// Decode a p2pkh cash address. The prefix part is optional in the
/// input; when absent, `prefix` is assumed for the checksum.
pub fn cashaddr_decode(prefix: &str, address: &str) -> Result<[u8; 20]> {
    let lowered = address.to_lowercase();
    let (got_prefix, body) = match lowered.split_once(':') {
        Some((p, b)) => (p.to_string(), b.to_string()),
        None => (prefix.to_string(), lowered),
    };

    let mut data = Vec::with_capacity(body.len());
    for ch in body.bytes() {
        let value = CASHADDR_CHARSET
            .iter()
            .position(|&c| c == ch)
            .ok_or_else(|| ChecksumError::CashAddr(address.to_string()))?;
        data.push(value as u8);
    }
    if data.len() < 9 {
        return Err(ChecksumError::CashAddr(address.to_string()).into());
    }

    let mut checksum_input = cashaddr_expand_prefix(&got_prefix);
    checksum_input.extend_from_slice(&data);
    if cashaddr_polymod(&checksum_input) != 0 {
        return Err(ChecksumError::CashAddr(address.to_string()).into());
    }

    let payload = convert_bits(&data[..data.len() - 8], 5, 8, false)
        .ok_or_else(|| ChecksumError::CashAddr(address.to_string()))?;
    if payload.len() != 21 || payload[0] != 0x00 {
        return Err(ConfigError::InvalidAddress(address.to_string()).into());
    }
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&payload[1..]);
    Ok(hash)
}

// ---------------------------------------------------------------------------
// Ethereum hex / EIP-55

/// Checksummed hex form of an Ethereum address
pub fn eth_encode(hash: &[u8; 20]) -> String {
    let lower = hex::encode(hash);
    let digest = keccak(lower.as_bytes());
    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, ch) in lower.chars().enumerate() {
        let nibble = (digest.as_bytes()[i / 2] >> (4 * (1 - i % 2))) & 0x0f;
        if ch.is_ascii_alphabetic() && nibble >= 8 {
            out.push(ch.to_ascii_uppercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Parse an Ethereum address. Short hex is left-padded with zeros to 40
/// digits, matching the lenient parser this engine emulates. Mixed-case
/// input must carry a valid EIP-55 checksum.
pub fn eth_decode(address: &str) -> Result<[u8; 20]> {
    let body = address.strip_prefix("0x").unwrap_or(address);
    if body.len() > 40 || !body.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ConfigError::InvalidAddress(address.to_string()).into());
    }
    let padded = format!("{:0>40}", body);

    let has_lower = padded.bytes().any(|b| b.is_ascii_lowercase());
    let has_upper = padded.bytes().any(|b| b.is_ascii_uppercase());
    if has_lower && has_upper {
        let mut hash = [0u8; 20];
        hex::decode_to_slice(padded.to_lowercase(), &mut hash)
            .map_err(|_| ConfigError::InvalidAddress(address.to_string()))?;
        let expected = eth_encode(&hash);
        if expected[2..] != padded {
            return Err(ChecksumError::Eip55(address.to_string()).into());
        }
        return Ok(hash);
    }

    let mut hash = [0u8; 20];
    hex::decode_to_slice(padded.to_lowercase(), &mut hash)
        .map_err(|_| ConfigError::InvalidAddress(address.to_string()))?;
    Ok(hash)
}

// ---------------------------------------------------------------------------
// Ripple base58

pub fn ripple_encode(hash: &[u8; 20]) -> String {
    let mut payload = Vec::with_capacity(21);
    payload.push(0x00);
    payload.extend_from_slice(hash);
    bs58::encode(payload)
        .with_alphabet(bs58::Alphabet::RIPPLE)
        .with_check()
        .into_string()
}

pub fn ripple_decode(address: &str) -> Result<[u8; 20]> {
    let payload = bs58::decode(address)
        .with_alphabet(bs58::Alphabet::RIPPLE)
        .with_check(None)
        .into_vec()
        .map_err(|_| ChecksumError::Base58(address.to_string()))?;
    if payload.len() != 21 || payload[0] != 0x00 {
        return Err(ConfigError::InvalidAddress(address.to_string()).into());
    }
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&payload[1..]);
    Ok(hash)
}

// ---------------------------------------------------------------------------
// Extended public keys

/// Decode an extended public key, accepting xpub, ypub and zpub version
/// bytes. The script-type hint the y/z versions carry is not needed for
/// matching, so they are normalized to the BIP32 mainnet version before
/// decoding. Unknown versions are configuration errors, not checksum
/// failures.
pub fn decode_extended_pubkey(text: &str) -> Result<Xpub> {
    let mut data = base58::decode_check(text)
        .map_err(|_| ChecksumError::ExtendedKey(text.to_string()))?;
    if data.len() != 78 {
        return Err(ChecksumError::ExtendedKey(text.to_string()).into());
    }
    let version = [data[0], data[1], data[2], data[3]];
    match version {
        VERSION_XPUB => {}
        VERSION_YPUB | VERSION_ZPUB => data[..4].copy_from_slice(&VERSION_XPUB),
        _ => {
            return Err(ConfigError::UnsupportedVersionBytes(hex::encode(version)).into());
        }
    }
    Ok(Xpub::decode(&data)?)
}

fn to_hash20(bytes: &[u8], address: &str) -> Result<[u8; 20]> {
    if bytes.len() != 20 {
        return Err(ConfigError::InvalidAddress(address.to_string()).into());
    }
    let mut hash = [0u8; 20];
    hash.copy_from_slice(bytes);
    Ok(hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash20(hex_str: &str) -> [u8; 20] {
        let mut h = [0u8; 20];
        hex::decode_to_slice(hex_str, &mut h).unwrap();
        h
    }

    #[test]
    fn test_base58check_roundtrip() {
        // Genesis-era p2pkh address
        let address = "1LqBGSKuX5yYUonjxT5qGfpUsXKYYWeabA";
        let hash = base58check_decode(address, 0x00).unwrap();
        assert_eq!(base58check_encode(0x00, &hash), address);
    }

    #[test]
    fn test_base58check_bad_checksum() {
        let result = base58check_decode("1LqBGSKuX5yYUonjxT5qGfpUsXKYYWeabB", 0x00);
        assert!(matches!(
            result,
            Err(crate::error::RecoveryError::Checksum(ChecksumError::Base58(_)))
        ));
    }

    #[test]
    fn test_segwit_bech32_vector() {
        // BIP173 p2wpkh test vector
        let program = hash20("751e76e8199196d454941c45d1b3a323f1433bd6");
        let address = segwit_v0_encode("bc", &program).unwrap();
        assert_eq!(address, "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4");
        assert_eq!(segwit_v0_decode("bc", &address).unwrap(), program);
    }

    #[test]
    fn test_segwit_wrong_hrp() {
        assert!(segwit_v0_decode("ltc", "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4").is_err());
    }

    #[test]
    fn test_cashaddr_vector() {
        // Published cashaddr p2pkh test vector
        let hash = hash20("f5bf48b397dae70be82b3cca4793f8eb2b6cdac9");
        let address = cashaddr_encode("bitcoincash", &hash).unwrap();
        assert_eq!(
            address,
            "bitcoincash:qr6m7j9njldwwzlg9v7v53unlr4jkmx6eylep8ekg2"
        );
        assert_eq!(cashaddr_decode("bitcoincash", &address).unwrap(), hash);
        // Prefixless form with assumed prefix
        assert_eq!(
            cashaddr_decode("bitcoincash", "qr6m7j9njldwwzlg9v7v53unlr4jkmx6eylep8ekg2").unwrap(),
            hash
        );
    }

    #[test]
    fn test_cashaddr_bad_checksum() {
        assert!(cashaddr_decode(
            "bitcoincash",
            "bitcoincash:qr6m7j9njldwwzlg9v7v53unlr4jkmx6eylep8ekg3"
        )
        .is_err());
    }

    #[test]
    fn test_eip55_encoding() {
        let hash = hash20("5aaeb6053f3e94c9b9a09f33669435e7ef1beaed");
        assert_eq!(eth_encode(&hash), "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed");
    }

    #[test]
    fn test_eth_decode_checksummed() {
        let hash = eth_decode("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed").unwrap();
        assert_eq!(hex::encode(hash), "5aaeb6053f3e94c9b9a09f33669435e7ef1beaed");
        // One flipped letter case breaks the checksum
        assert!(eth_decode("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1Beaed").is_err());
    }

    #[test]
    fn test_eth_decode_short_hex_padding() {
        // Lenient short-hex handling: missing leading zeros are restored
        let hash = eth_decode("0xaeb6053f3e94c9b9a09f33669435e7ef1beaed").unwrap();
        assert_eq!(hex::encode(hash), "00aeb6053f3e94c9b9a09f33669435e7ef1beaed");
    }

    #[test]
    fn test_ripple_vector() {
        // The XRP genesis account
        let hash = hash20("b5f762798a53d543a014caf8b297cff8f2f937e8");
        assert_eq!(ripple_encode(&hash), "rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh");
        assert_eq!(
            ripple_decode("rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh").unwrap(),
            hash
        );
    }

    #[test]
    fn test_bech32_hash_roundtrip() {
        let hash = hash20("f5bf48b397dae70be82b3cca4793f8eb2b6cdac9");
        let address = bech32_hash_encode("zil", &hash).unwrap();
        assert!(address.starts_with("zil1"));
        assert_eq!(bech32_hash_decode("zil", &address).unwrap(), hash);
    }

    #[test]
    fn test_decode_xpub() {
        let xpub = decode_extended_pubkey(
            "xpub6BgCDhMefYxRS1gbVbxyokYzQji65v1eGJXGEiGdoobvFBShcNeJt97zoJBkNtbASLyTPYXJHRvkb3ahxaVVGEtC1AD4LyuBXULZcfCjBZx",
        );
        assert!(xpub.is_ok());
    }

    #[test]
    fn test_unknown_version_bytes() {
        // tpub (testnet) carries version bytes this engine does not accept
        let result = decode_extended_pubkey(
            "tpubD6NzVbkrYhZ4XgiXtGrdW5XDAPFCL9h7we1vwNCpn8tGbBcgfVYjXyhWo4E1xkh56hjod1RhGjxbaTLV3X4FyWuejifB9jusQ46QzG87VKp",
        );
        assert!(matches!(
            result,
            Err(crate::error::RecoveryError::Config(
                ConfigError::UnsupportedVersionBytes(_)
            ))
        ));
    }

    #[test]
    fn test_p2sh_p2wpkh_hash_shape() {
        // Redeem script hash differs from the bare pubkey hash
        let pubkey = [0x02u8; 33];
        assert_ne!(p2sh_p2wpkh_hash(&pubkey), pubkey_hash160(&pubkey));
    }
}
