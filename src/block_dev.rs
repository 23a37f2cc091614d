use crate::error::FsError;

/// Sector-addressed storage the filesystem is laid out on.
/// A single sector write is assumed atomic, nothing larger is.
pub trait BlockDevice: Send + Sync {
    /// Returns the number of sectors in the device.
    fn sector_count(&self) -> u32;

    /// Reads one sector. `buf.len()` must be equal to `SECTOR_SIZE`.
    fn read_sector(&self, addr: u32, buf: &mut [u8]) -> Result<(), FsError>;

    /// Writes one sector. `buf.len()` must be equal to `SECTOR_SIZE`.
    fn write_sector(&self, addr: u32, buf: &[u8]) -> Result<(), FsError>;

    /// Flushes any cached data to the device.
    fn flush(&self) -> Result<(), FsError> {
        Ok(())
    }
}
