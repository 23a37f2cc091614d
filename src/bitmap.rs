//! Management of the block bitmap.
//! Bit i (LSB first within each byte) is set while block i of the data region
//! is owned by some inode, either as file content or as an index block.

use log::trace;

use crate::config::*;
use crate::{BlockDevice, Result, SuperBlock};

/// Sets the first clear bit in the bitmap and persists its sector.
/// Returns the item ID of the bit that was set, or None if all `total_items` are set.
fn set_first_fit_bit(
    device: &(impl BlockDevice + ?Sized),
    bitmap_start: u32,
    bitmap_sectors: u32,
    total_items: u32,
) -> Result<Option<u32>> {
    let mut buf = [0u8; SECTOR_SIZE];

    for i in 0..bitmap_sectors {
        let current_sector = bitmap_start + i;
        device.read_sector(current_sector, &mut buf)?;

        for j in 0..SECTOR_SIZE {
            if buf[j] == 0xFF {
                let next_item = (i * BITS_PER_SECTOR) + (j as u32 + 1) * 8;
                if next_item >= total_items {
                    return Ok(None);
                }
                continue;
            }
            for k in 0..8 {
                let current_item_id = i * BITS_PER_SECTOR + j as u32 * 8 + k;
                if current_item_id >= total_items {
                    return Ok(None);
                }
                if buf[j] & (1 << k) == 0 {
                    buf[j] |= 1 << k;
                    device.write_sector(current_sector, &buf)?;
                    return Ok(Some(current_item_id));
                }
            }
        }
    }

    Ok(None)
}

/// Clears every bitmap sector of a freshly formatted volume.
pub(crate) fn init_bitmap(device: &(impl BlockDevice + ?Sized), superblock: &SuperBlock) -> Result<()> {
    let zero_sector = [0u8; SECTOR_SIZE];
    for i in 0..superblock.free_map_size {
        device.write_sector(superblock.free_map_sector + i, &zero_sector)?;
    }
    Ok(())
}

/// Reads the bit of a single item.
fn test_bit(
    device: &(impl BlockDevice + ?Sized),
    bitmap_start: u32,
    item_id: u32,
) -> Result<bool> {
    let sector = bitmap_start + item_id / BITS_PER_SECTOR;
    let byte_offset = (item_id % BITS_PER_SECTOR) / 8;
    let bit_offset = item_id % 8;

    let mut buf = [0u8; SECTOR_SIZE];
    device.read_sector(sector, &mut buf)?;
    Ok(buf[byte_offset as usize] & (1 << bit_offset) != 0)
}

/// Allocates the first free block (first fit, always scanning from bit 0)
/// and zero-fills it.
/// Returns the physical address of its first sector, or None when the volume is full.
pub fn alloc_block(
    device: &(impl BlockDevice + ?Sized),
    superblock: &SuperBlock,
) -> Result<Option<u32>> {
    let Some(index) = set_first_fit_bit(
        device,
        superblock.free_map_sector,
        superblock.free_map_size,
        superblock.num_blocks,
    )?
    else {
        trace!("block bitmap exhausted ({} blocks)", superblock.num_blocks);
        return Ok(None);
    };

    let addr = superblock.block_addr(index);
    let zero_sector = [0u8; SECTOR_SIZE];
    for s in 0..superblock.sectors_per_block() {
        device.write_sector(addr + s, &zero_sector)?;
    }
    trace!("allocated block {} at sector {}", index, addr);

    Ok(Some(addr))
}

/// Whether the block starting at physical address `addr` is marked used.
/// Addresses outside the data region or not on a block boundary are never allocated.
pub fn is_allocated(
    device: &(impl BlockDevice + ?Sized),
    superblock: &SuperBlock,
    addr: u32,
) -> Result<bool> {
    if addr < superblock.data_start_sector {
        return Ok(false);
    }
    let offset = addr - superblock.data_start_sector;
    let spb = superblock.sectors_per_block();
    if offset % spb != 0 || offset / spb >= superblock.num_blocks {
        return Ok(false);
    }
    test_bit(device, superblock.free_map_sector, offset / spb)
}
