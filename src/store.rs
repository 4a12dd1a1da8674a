//! In-memory backing store for an emulated disk

use crate::error::{EmulatorError, ScsiResult};

/// Logical block length in bytes
pub const BLOCK_LENGTH: u32 = 512;

/// Default disk capacity (20 MiB, as in the original sample)
pub const DEFAULT_DISK_SIZE: u64 = 20 * 1024 * 1024;

/// Fixed-size in-memory block store
///
/// Addressed by byte offset; zero-filled at creation. The store performs no
/// internal locking: it is exclusively owned by one command interpreter and
/// only ever touched from within a synchronous `interpret` call.
pub struct BlockStore {
    bytes: Vec<u8>,
}

impl BlockStore {
    /// Create a zero-filled store of `capacity` bytes
    ///
    /// The capacity must be a non-zero multiple of [`BLOCK_LENGTH`].
    pub fn new(capacity: u64) -> ScsiResult<Self> {
        if capacity == 0 || capacity % BLOCK_LENGTH as u64 != 0 {
            return Err(EmulatorError::Config(format!(
                "disk capacity must be a non-zero multiple of {} bytes, got {}",
                BLOCK_LENGTH, capacity
            )));
        }
        Ok(BlockStore {
            bytes: vec![0u8; capacity as usize],
        })
    }

    /// Total capacity in bytes
    pub fn capacity(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Highest valid logical block address
    pub fn max_lba(&self) -> u32 {
        (self.capacity() / BLOCK_LENGTH as u64 - 1) as u32
    }

    /// Copy `dst.len()` bytes starting at `offset` into `dst`
    pub fn read(&self, offset: u64, dst: &mut [u8]) -> ScsiResult<()> {
        let end = self.range_end(offset, dst.len())?;
        dst.copy_from_slice(&self.bytes[offset as usize..end]);
        Ok(())
    }

    /// Copy `src` into the store starting at `offset`
    pub fn write(&mut self, offset: u64, src: &[u8]) -> ScsiResult<()> {
        let end = self.range_end(offset, src.len())?;
        self.bytes[offset as usize..end].copy_from_slice(src);
        Ok(())
    }

    fn range_end(&self, offset: u64, len: usize) -> ScsiResult<usize> {
        let end = offset.checked_add(len as u64).ok_or_else(|| {
            EmulatorError::Store(format!("access overflows at offset {}", offset))
        })?;
        if end > self.capacity() {
            return Err(EmulatorError::Store(format!(
                "access of {} bytes at offset {} exceeds capacity {}",
                len,
                offset,
                self.capacity()
            )));
        }
        Ok(end as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_store_is_zero_filled() {
        let store = BlockStore::new(4096).unwrap();
        let mut buf = vec![0xAAu8; 4096];
        store.read(0, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_capacity_validation() {
        assert!(BlockStore::new(0).is_err());
        assert!(BlockStore::new(513).is_err());
        assert!(BlockStore::new(1024).is_ok());
    }

    #[test]
    fn test_write_read_round_trip() {
        let mut store = BlockStore::new(4096).unwrap();
        let pattern: Vec<u8> = (0..512).map(|i| (i % 251) as u8).collect();
        store.write(1024, &pattern).unwrap();

        let mut buf = vec![0u8; 512];
        store.read(1024, &mut buf).unwrap();
        assert_eq!(buf, pattern);
    }

    #[test]
    fn test_out_of_range_access() {
        let mut store = BlockStore::new(1024).unwrap();
        let mut buf = vec![0u8; 512];
        assert!(store.read(1024, &mut buf).is_err());
        assert!(store.write(513, &[0u8; 512]).is_err());
        assert!(store.read(u64::MAX, &mut buf).is_err());
    }

    #[test]
    fn test_max_lba() {
        let store = BlockStore::new(DEFAULT_DISK_SIZE).unwrap();
        assert_eq!(store.max_lba(), (DEFAULT_DISK_SIZE / 512 - 1) as u32);
    }
}
