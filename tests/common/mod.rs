//! Common utilities for tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, Once};

use blockfs::{BlockDevice, Error, FileSystem, SECTOR_SIZE};

static INIT: Once = Once::new();

/// Routes the crate's log output through the test harness.
pub fn init() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

pub struct RamDisk {
    inner: Mutex<Vec<u8>>,
    num_sectors: u32,
}

impl RamDisk {
    /// Creates a zeroed RamDisk of `num_sectors` sectors of SECTOR_SIZE bytes.
    pub fn new(num_sectors: u32) -> Self {
        Self::filled(num_sectors, 0)
    }

    pub fn filled(num_sectors: u32, byte: u8) -> Self {
        RamDisk {
            inner: Mutex::new(vec![byte; num_sectors as usize * SECTOR_SIZE]),
            num_sectors,
        }
    }
}

impl BlockDevice for RamDisk {
    fn sector_count(&self) -> u32 {
        self.num_sectors
    }

    fn read_sector(&self, addr: u32, buf: &mut [u8]) -> Result<(), Error> {
        if addr >= self.num_sectors || buf.len() != SECTOR_SIZE {
            return Err(Error::IoError);
        }
        let start = addr as usize * SECTOR_SIZE;
        let data = self.inner.lock().unwrap();
        buf.copy_from_slice(&data[start..start + SECTOR_SIZE]);
        Ok(())
    }

    fn write_sector(&self, addr: u32, buf: &[u8]) -> Result<(), Error> {
        if addr >= self.num_sectors || buf.len() != SECTOR_SIZE {
            return Err(Error::IoError);
        }
        let start = addr as usize * SECTOR_SIZE;
        let mut data = self.inner.lock().unwrap();
        data[start..start + SECTOR_SIZE].copy_from_slice(buf);
        Ok(())
    }
}

/// A RamDisk whose reads or writes can be made to fail, either from a given
/// sector upward or after a number of successful writes.
pub struct FaultyDisk {
    disk: RamDisk,
    fail_reads_from: AtomicU32,
    fail_writes_from: AtomicU32,
    writes_left: AtomicU32, // u32::MAX means unlimited
}

impl FaultyDisk {
    pub fn new(num_sectors: u32) -> Self {
        FaultyDisk {
            disk: RamDisk::new(num_sectors),
            fail_reads_from: AtomicU32::new(u32::MAX),
            fail_writes_from: AtomicU32::new(u32::MAX),
            writes_left: AtomicU32::new(u32::MAX),
        }
    }

    pub fn fail_reads_from(&self, sector: u32) {
        self.fail_reads_from.store(sector, Ordering::SeqCst);
    }

    pub fn fail_writes_from(&self, sector: u32) {
        self.fail_writes_from.store(sector, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes_from(if fail { 0 } else { u32::MAX });
    }

    /// Lets `n` more sector writes through, then fails every write.
    pub fn fail_writes_after(&self, n: u32) {
        self.writes_left.store(n, Ordering::SeqCst);
    }

    pub fn heal(&self) {
        self.fail_reads_from(u32::MAX);
        self.fail_writes(false);
        self.writes_left.store(u32::MAX, Ordering::SeqCst);
    }
}

impl BlockDevice for FaultyDisk {
    fn sector_count(&self) -> u32 {
        self.disk.sector_count()
    }

    fn read_sector(&self, addr: u32, buf: &mut [u8]) -> Result<(), Error> {
        if addr >= self.fail_reads_from.load(Ordering::SeqCst) {
            return Err(Error::IoError);
        }
        self.disk.read_sector(addr, buf)
    }

    fn write_sector(&self, addr: u32, buf: &[u8]) -> Result<(), Error> {
        if addr >= self.fail_writes_from.load(Ordering::SeqCst) {
            return Err(Error::IoError);
        }
        match self.writes_left.load(Ordering::SeqCst) {
            0 => return Err(Error::IoError),
            u32::MAX => {}
            n => self.writes_left.store(n - 1, Ordering::SeqCst),
        }
        self.disk.write_sector(addr, buf)
    }
}

/// Formats a fresh RamDisk and mounts it.
pub fn mounted(num_sectors: u32, block_size: u32) -> FileSystem<RamDisk> {
    init();
    let mut fs = FileSystem::new(Arc::new(RamDisk::new(num_sectors)));
    fs.format(block_size).unwrap();
    fs.mount().unwrap();
    fs
}

/// Deterministic, non-repeating-per-block test payload.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + i / 251) as u8).collect()
}
