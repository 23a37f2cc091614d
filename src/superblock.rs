use log::{debug, trace};

use crate::{error::FsError, BlockDevice, SuperBlock};
use crate::config::*;

/// Reads sector 0 and decodes the superblock.
/// The magic number is not checked here, mounting does that.
pub fn read_superblock<D: BlockDevice + ?Sized>(device: &D) -> Result<SuperBlock, FsError> {
    let mut buf = [0u8; SECTOR_SIZE];
    device.read_sector(SUPERBLOCK_SECTOR, &mut buf)?;
    let superblock = SuperBlock::decode(&buf)?;
    trace!("read superblock {:?}", superblock);
    Ok(superblock)
}

/// Encodes the superblock into a zero-padded sector and writes it to sector 0.
pub fn write_superblock<D: BlockDevice + ?Sized>(device: &D, superblock: &SuperBlock) -> Result<(), FsError> {
    let mut buf = [0u8; SECTOR_SIZE];
    superblock.encode(&mut buf)?;
    device.write_sector(SUPERBLOCK_SECTOR, &buf)?;
    Ok(())
}

/// Computes the volume layout for a device of `sector_count` sectors.
///
/// Sector 0 holds the superblock, the inode table follows, then the block
/// bitmap, then the data region. The bitmap is sized for the blocks that fit
/// in what is left, and the block count is then trimmed to what fits after
/// the bitmap.
pub fn plan_layout(sector_count: u32, block_size: u32) -> Result<SuperBlock, FsError> {
    if block_size == 0 || block_size as usize % SECTOR_SIZE != 0 {
        return Err(FsError::InvalidGeometry);
    }
    let sectors_per_block = block_size / SECTOR_SIZE as u32;

    let free_map_sector = INODE_TABLE_SECTOR + INODE_TABLE_SECTORS;
    // At least one bitmap sector and one block.
    if sector_count < free_map_sector + 1 + sectors_per_block {
        return Err(FsError::InvalidGeometry);
    }
    let remaining = sector_count - free_map_sector;

    let candidate_blocks = remaining / sectors_per_block;
    let free_map_size = candidate_blocks.div_ceil(BITS_PER_SECTOR).max(1);
    if free_map_size >= remaining {
        return Err(FsError::InvalidGeometry);
    }
    let num_blocks = ((remaining - free_map_size) / sectors_per_block)
        .min(free_map_size.saturating_mul(BITS_PER_SECTOR));
    if num_blocks == 0 {
        return Err(FsError::InvalidGeometry);
    }

    let superblock = SuperBlock {
        magic: MAGIC,
        block_size,
        num_blocks,
        free_map_sector,
        free_map_size,
        data_start_sector: free_map_sector + free_map_size,
        root_inode: ROOT_INODE,
    };
    debug!(
        "layout for {} sectors: block size {}, {} blocks, bitmap at {} ({} sectors), data at {}",
        sector_count,
        block_size,
        num_blocks,
        superblock.free_map_sector,
        free_map_size,
        superblock.data_start_sector
    );
    Ok(superblock)
}
