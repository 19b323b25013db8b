//! Probabilistic membership set for 20-byte address hashes
//!
//! Binary format:
//! Header (16 bytes):
//!   table_len: u64 (number of buckets, always a power of 256)
//!   hash_bytes: u8 (trailing bytes of the address hash selecting the bucket)
//!   bytes_per_addr: u8 (fingerprint bytes stored per bucket)
//!   padding: [u8; 6]
//!
//! Data:
//!   table: [u8; table_len * bytes_per_addr]
//!
//! The bucket index is the big-endian integer value of the last
//! `hash_bytes` bytes of the address hash; the stored fingerprint is the
//! `bytes_per_addr` bytes immediately preceding those. Bytes to the left
//! of the retained range never participate in membership decisions: two
//! addresses that agree on the trailing `hash_bytes + bytes_per_addr`
//! bytes are indistinguishable. That is the intended space/accuracy
//! trade-off, not a defect.

use crate::error::{ConfigError, ResourceError, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use memmap2::{Mmap, MmapMut, MmapOptions};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Length of an address hash (HASH160 / trailing keccak bytes)
pub const ADDRESS_HASH_LEN: usize = 20;

/// Fingerprint bytes retained per bucket by default
pub const DEFAULT_BYTES_PER_ADDR: usize = 8;

const HEADER_LEN: usize = 16;

/// How a file-backed set may be accessed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

/// Serializable handle for transferring a file-backed set between
/// processes. Only the path and access parameters travel; every
/// consumer opens its own mapped view of the same backing file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressSetDescriptor {
    pub path: PathBuf,
    pub mode: AccessMode,
    pub preload: bool,
}

enum Table {
    Heap(Vec<u8>),
    Map(Mmap),
    MapMut(MmapMut),
}

/// Fixed-capacity membership set over 20-byte address hashes
pub struct AddressSet {
    table: Table,
    table_len: u64,
    hash_bytes: usize,
    bytes_per_addr: usize,
    /// Byte offset of the table within the backing storage (header for maps)
    data_off: usize,
    len_cache: OnceLock<u64>,
    backing: Option<AddressSetDescriptor>,
}

impl AddressSet {
    /// Create an in-memory set with an explicit bucket count.
    /// `table_len` must be a power of 256.
    pub fn new(table_len: u64, bytes_per_addr: usize) -> Result<Self> {
        let hash_bytes = check_table_len(table_len)?;
        if bytes_per_addr == 0 || hash_bytes + bytes_per_addr > ADDRESS_HASH_LEN {
            return Err(ConfigError::InvalidInput(format!(
                "bytes_per_addr {} out of range for {} hash bytes",
                bytes_per_addr, hash_bytes
            ))
            .into());
        }
        let set = Self {
            table: Table::Heap(vec![0u8; (table_len as usize) * bytes_per_addr]),
            table_len,
            hash_bytes,
            bytes_per_addr,
            data_off: 0,
            len_cache: OnceLock::new(),
            backing: None,
        };
        let _ = set.len_cache.set(0);
        Ok(set)
    }

    /// Create an in-memory set sized for `capacity` entries.
    /// Picks the smallest table keeping the load factor at or below 25%,
    /// so random probes land in an empty bucket most of the time and the
    /// 8-byte fingerprint does the rest.
    pub fn with_capacity(capacity: u64) -> Result<Self> {
        let mut table_len: u64 = 256;
        while table_len < capacity.saturating_mul(4) {
            table_len = table_len
                .checked_mul(256)
                .ok_or_else(|| ConfigError::InvalidInput(format!("capacity {} too large", capacity)))?;
        }
        Self::new(table_len, DEFAULT_BYTES_PER_ADDR)
    }

    /// Number of trailing hash bytes used as the bucket selector
    pub fn hash_bytes(&self) -> usize {
        self.hash_bytes
    }

    /// Number of fingerprint bytes retained per bucket
    pub fn bytes_per_addr(&self) -> usize {
        self.bytes_per_addr
    }

    /// Number of buckets in the table
    pub fn table_len(&self) -> u64 {
        self.table_len
    }

    fn table(&self) -> &[u8] {
        match &self.table {
            Table::Heap(v) => &v[self.data_off..],
            Table::Map(m) => &m[self.data_off..],
            Table::MapMut(m) => &m[self.data_off..],
        }
    }

    fn bucket_range(&self, address_hash: &[u8; ADDRESS_HASH_LEN]) -> (usize, usize) {
        let mut index: u64 = 0;
        for &b in &address_hash[ADDRESS_HASH_LEN - self.hash_bytes..] {
            index = (index << 8) | b as u64;
        }
        let start = (index as usize) * self.bytes_per_addr;
        (start, start + self.bytes_per_addr)
    }

    fn fingerprint<'a>(&self, address_hash: &'a [u8; ADDRESS_HASH_LEN]) -> &'a [u8] {
        let end = ADDRESS_HASH_LEN - self.hash_bytes;
        &address_hash[end - self.bytes_per_addr..end]
    }

    /// Add an address hash. Overwrites any prior occupant of the bucket;
    /// the table never grows. Adding the all-zero address writes an
    /// all-zero fingerprint, which is indistinguishable from an empty
    /// bucket, so such an address is never reported as a member.
    pub fn add(&mut self, address_hash: &[u8; ADDRESS_HASH_LEN]) -> Result<()> {
        let (start, end) = self.bucket_range(address_hash);
        let len = self.len();
        let fp_off = ADDRESS_HASH_LEN - self.hash_bytes - self.bytes_per_addr;
        let fp: Vec<u8> = address_hash[fp_off..fp_off + self.bytes_per_addr].to_vec();
        let slot = match &mut self.table {
            Table::Heap(v) => &mut v[self.data_off + start..self.data_off + end],
            Table::MapMut(m) => &mut m[self.data_off + start..self.data_off + end],
            Table::Map(_) => return Err(ResourceError::AddressSetReadOnly.into()),
        };
        let was_filled = slot.iter().any(|&b| b != 0);
        slot.copy_from_slice(&fp);
        let now_filled = slot.iter().any(|&b| b != 0);
        let new_len = match (was_filled, now_filled) {
            (false, true) => len + 1,
            (true, false) => len - 1,
            _ => len,
        };
        self.len_cache = OnceLock::new();
        let _ = self.len_cache.set(new_len);
        Ok(())
    }

    /// Membership test: bucket lookup plus fingerprint comparison.
    /// The stored comparison is the sole authority; bytes outside the
    /// retained range never distinguish addresses.
    pub fn contains(&self, address_hash: &[u8; ADDRESS_HASH_LEN]) -> bool {
        let (start, end) = self.bucket_range(address_hash);
        let slot = &self.table()[start..end];
        if slot.iter().all(|&b| b == 0) {
            return false;
        }
        slot == self.fingerprint(address_hash)
    }

    /// Count of filled (non-zero) buckets. Computed on first use for
    /// lazily mapped tables and cached thereafter.
    pub fn len(&self) -> u64 {
        *self.len_cache.get_or_init(|| {
            self.table()
                .chunks_exact(self.bytes_per_addr)
                .filter(|slot| slot.iter().any(|&b| b != 0))
                .count() as u64
        })
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the set to a file, header first then the raw table
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .map_err(|e| ResourceError::AddressSetFile(format!("{}: {}", path.display(), e)))?;
        let mut writer = BufWriter::new(file);
        writer.write_u64::<LittleEndian>(self.table_len)?;
        writer.write_u8(self.hash_bytes as u8)?;
        writer.write_u8(self.bytes_per_addr as u8)?;
        writer.write_all(&[0u8; 6])?;
        writer.write_all(self.table())?;
        writer.flush()?;
        Ok(())
    }

    /// Open a set from a file. `preload` pulls the whole table into heap
    /// memory; otherwise the table is memory-mapped and pages are
    /// populated on first access, which keeps multi-gigabyte tables
    /// usable. Read-write access always maps.
    pub fn from_file(path: &Path, mode: AccessMode, preload: bool) -> Result<Self> {
        let mut file = match mode {
            AccessMode::ReadOnly => File::open(path),
            AccessMode::ReadWrite => OpenOptions::new().read(true).write(true).open(path),
        }
        .map_err(|e| ResourceError::AddressSetFile(format!("{}: {}", path.display(), e)))?;

        let table_len = file
            .read_u64::<LittleEndian>()
            .map_err(|e| ResourceError::AddressSetCorrupt(e.to_string()))?;
        let hash_bytes = file
            .read_u8()
            .map_err(|e| ResourceError::AddressSetCorrupt(e.to_string()))? as usize;
        let bytes_per_addr = file
            .read_u8()
            .map_err(|e| ResourceError::AddressSetCorrupt(e.to_string()))? as usize;
        let mut pad = [0u8; 6];
        file.read_exact(&mut pad)
            .map_err(|e| ResourceError::AddressSetCorrupt(e.to_string()))?;

        if check_table_len(table_len).map(|h| h != hash_bytes).unwrap_or(true) {
            return Err(ResourceError::AddressSetCorrupt(format!(
                "table length {} inconsistent with {} hash bytes",
                table_len, hash_bytes
            ))
            .into());
        }
        if bytes_per_addr == 0 || hash_bytes + bytes_per_addr > ADDRESS_HASH_LEN {
            return Err(ResourceError::AddressSetCorrupt(format!(
                "{} fingerprint bytes out of range",
                bytes_per_addr
            ))
            .into());
        }
        let table_bytes = (table_len as usize) * bytes_per_addr;
        let expected = (HEADER_LEN + table_bytes) as u64;
        let actual = file
            .metadata()
            .map_err(|e| ResourceError::AddressSetFile(e.to_string()))?
            .len();
        if actual != expected {
            return Err(ResourceError::AddressSetCorrupt(format!(
                "file is {} bytes, expected {}",
                actual, expected
            ))
            .into());
        }

        let (table, data_off) = match (mode, preload) {
            (AccessMode::ReadOnly, true) => {
                let mut buf = vec![0u8; table_bytes];
                file.read_exact(&mut buf)
                    .map_err(|e| ResourceError::AddressSetCorrupt(e.to_string()))?;
                (Table::Heap(buf), 0)
            }
            (AccessMode::ReadOnly, false) => {
                let map = unsafe { MmapOptions::new().map(&file) }
                    .map_err(|e| ResourceError::AddressSetFile(e.to_string()))?;
                (Table::Map(map), HEADER_LEN)
            }
            (AccessMode::ReadWrite, _) => {
                let map = unsafe { MmapOptions::new().map_mut(&file) }
                    .map_err(|e| ResourceError::AddressSetFile(e.to_string()))?;
                (Table::MapMut(map), HEADER_LEN)
            }
        };

        Ok(Self {
            table,
            table_len,
            hash_bytes,
            bytes_per_addr,
            data_off,
            len_cache: OnceLock::new(),
            backing: Some(AddressSetDescriptor {
                path: path.to_path_buf(),
                mode,
                preload,
            }),
        })
    }

    /// Flush pending writes of a read-write mapped set to its file
    pub fn flush(&self) -> Result<()> {
        if let Table::MapMut(m) = &self.table {
            m.flush()
                .map_err(|e| ResourceError::AddressSetFile(e.to_string()))?;
        }
        Ok(())
    }

    /// Flush and release the set. The mapping and its file handle are
    /// dropped here exactly once; a descriptor-reconstructed copy in
    /// another process owns its own handle and is unaffected.
    pub fn close(self) -> Result<()> {
        self.flush()
    }

    /// Handle for inter-process transfer. Never serializes mapped bytes.
    pub fn descriptor(&self) -> Result<AddressSetDescriptor> {
        self.backing
            .clone()
            .ok_or_else(|| ResourceError::AddressSetNotBacked.into())
    }

    /// Reconstruct an equivalent live view from a transferred descriptor
    pub fn from_descriptor(desc: &AddressSetDescriptor) -> Result<Self> {
        Self::from_file(&desc.path, desc.mode, desc.preload)
    }
}

impl std::fmt::Debug for AddressSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddressSet")
            .field("table_len", &self.table_len)
            .field("hash_bytes", &self.hash_bytes)
            .field("bytes_per_addr", &self.bytes_per_addr)
            .field("backing", &self.backing)
            .finish()
    }
}

/// Validate a bucket count and return the implied hash byte count
fn check_table_len(table_len: u64) -> Result<usize> {
    let mut n = table_len;
    let mut hash_bytes = 0usize;
    while n > 1 {
        if n % 256 != 0 {
            return Err(ConfigError::InvalidTableLength(table_len).into());
        }
        n /= 256;
        hash_bytes += 1;
    }
    if hash_bytes == 0 {
        return Err(ConfigError::InvalidTableLength(table_len).into());
    }
    Ok(hash_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TABLE_LEN: u64 = 256; // one hash byte
    const HASH_BYTES: usize = 1;

    fn seq_addr() -> [u8; 20] {
        let mut a = [0u8; 20];
        for (i, b) in a.iter_mut().enumerate() {
            *b = i as u8;
        }
        a
    }

    #[test]
    fn test_add() {
        let mut aset = AddressSet::new(TABLE_LEN, DEFAULT_BYTES_PER_ADDR).unwrap();
        let addr = seq_addr();
        assert!(!aset.contains(&addr));
        aset.add(&addr).unwrap();
        assert!(aset.contains(&addr));
        assert_eq!(aset.len(), 1);
    }

    #[test]
    fn test_collision() {
        // Changing a byte left of the retained range produces a
        // distinct address that is nevertheless indistinguishable from
        // the stored one. Documented behavior, not a defect.
        let mut aset = AddressSet::new(TABLE_LEN, DEFAULT_BYTES_PER_ADDR).unwrap();
        let addr1 = seq_addr();
        let mut addr2 = addr1;
        addr2[20 - HASH_BYTES - DEFAULT_BYTES_PER_ADDR - 1] = 0;
        aset.add(&addr1).unwrap();
        assert!(aset.contains(&addr1));
        assert!(aset.contains(&addr2));
        assert_eq!(aset.len(), 1);
    }

    #[test]
    fn test_collision_fail() {
        // Changing the leftmost retained byte changes the fingerprint;
        // the overwrite in the shared bucket evicts the first address.
        let mut aset = AddressSet::new(TABLE_LEN, DEFAULT_BYTES_PER_ADDR).unwrap();
        let addr1 = seq_addr();
        let mut addr2 = addr1;
        addr2[20 - HASH_BYTES - DEFAULT_BYTES_PER_ADDR] = 0;
        aset.add(&addr1).unwrap();
        assert!(aset.contains(&addr1));
        assert!(!aset.contains(&addr2));
        assert_eq!(aset.len(), 1);
        aset.add(&addr2).unwrap();
        assert!(!aset.contains(&addr1));
        assert!(aset.contains(&addr2));
        assert_eq!(aset.len(), 1);
    }

    #[test]
    fn test_null() {
        let mut aset = AddressSet::new(TABLE_LEN, DEFAULT_BYTES_PER_ADDR).unwrap();
        let addr = [0u8; 20];
        aset.add(&addr).unwrap();
        assert!(!aset.contains(&addr));
        assert_eq!(aset.len(), 0);
    }

    // Not deterministic, but the expected hit rate with an 8-byte
    // fingerprint is far below one in 8192 probes.
    #[test]
    fn test_false_positives() {
        use rand::RngCore;
        let mut rng = rand::thread_rng();
        let mut aset = AddressSet::new(65536, DEFAULT_BYTES_PER_ADDR).unwrap();
        let rand_bytes = aset.hash_bytes() + aset.bytes_per_addr();
        let mut rand_addr = |rng: &mut dyn rand::RngCore| {
            let mut a = [0u8; 20];
            rng.fill_bytes(&mut a[20 - rand_bytes..]);
            a
        };
        for _ in 0..8192 {
            let a = rand_addr(&mut rng);
            aset.add(&a).unwrap();
        }
        let mut false_positives = 0;
        for _ in 0..8192 {
            if aset.contains(&rand_addr(&mut rng)) {
                false_positives += 1;
            }
        }
        assert!(false_positives <= 2, "too many false positives: {}", false_positives);
    }

    #[test]
    fn test_file_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("addrs.db");
        let mut aset = AddressSet::new(TABLE_LEN, DEFAULT_BYTES_PER_ADDR).unwrap();
        let addr = seq_addr();
        aset.add(&addr).unwrap();
        aset.to_file(&path).unwrap();

        for preload in [true, false] {
            let reloaded = AddressSet::from_file(&path, AccessMode::ReadOnly, preload).unwrap();
            assert!(reloaded.contains(&addr));
            assert_eq!(reloaded.len(), 1);
        }
    }

    #[test]
    fn test_file_update() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("addrs.db");
        let aset = AddressSet::new(TABLE_LEN, DEFAULT_BYTES_PER_ADDR).unwrap();
        aset.to_file(&path).unwrap();

        let mut aset = AddressSet::from_file(&path, AccessMode::ReadWrite, false).unwrap();
        let addr = seq_addr();
        aset.add(&addr).unwrap();
        aset.close().unwrap();

        let aset = AddressSet::from_file(&path, AccessMode::ReadOnly, false).unwrap();
        assert!(aset.contains(&addr));
        assert_eq!(aset.len(), 1);
    }

    #[test]
    fn test_readonly_add_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("addrs.db");
        AddressSet::new(TABLE_LEN, DEFAULT_BYTES_PER_ADDR)
            .unwrap()
            .to_file(&path)
            .unwrap();
        let mut aset = AddressSet::from_file(&path, AccessMode::ReadOnly, false).unwrap();
        assert!(aset.add(&seq_addr()).is_err());
    }

    #[test]
    fn test_descriptor_transfer() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("addrs.db");
        let mut aset = AddressSet::new(TABLE_LEN, DEFAULT_BYTES_PER_ADDR).unwrap();
        let addr = seq_addr();
        aset.add(&addr).unwrap();
        aset.to_file(&path).unwrap();

        let aset = AddressSet::from_file(&path, AccessMode::ReadOnly, false).unwrap();
        let wire = serde_json::to_string(&aset.descriptor().unwrap()).unwrap();
        aset.close().unwrap();

        // Another consumer reconstructs its own view from the handle.
        let desc: AddressSetDescriptor = serde_json::from_str(&wire).unwrap();
        let rebuilt = AddressSet::from_descriptor(&desc).unwrap();
        assert!(rebuilt.contains(&addr));
        assert_eq!(rebuilt.len(), 1);
        rebuilt.close().unwrap();
    }

    #[test]
    fn test_in_memory_set_has_no_descriptor() {
        let aset = AddressSet::new(TABLE_LEN, DEFAULT_BYTES_PER_ADDR).unwrap();
        assert!(aset.descriptor().is_err());
    }

    #[test]
    fn test_corrupt_file_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("addrs.db");
        std::fs::write(&path, b"not an address set").unwrap();
        assert!(AddressSet::from_file(&path, AccessMode::ReadOnly, true).is_err());
    }

    #[test]
    fn test_capacity_sizing() {
        let aset = AddressSet::with_capacity(10_000).unwrap();
        assert_eq!(aset.table_len(), 256 * 256 * 256);
        assert_eq!(aset.hash_bytes(), 3);
    }
}
