//! Management of reading and writing to inodes.
//!
//! The inode table starts at `INODE_TABLE_SECTOR` and holds `MAX_INODES`
//! fixed-size records. Inode numbers are 1-based, slot `n` is record `n - 1`.
//! Each record maps logical blocks to physical addresses through
//! `NUM_DIRECT_PTRS` direct pointers, one single indirect and one double
//! indirect index block. Index blocks are arrays of little-endian u32
//! addresses, 0 meaning unmapped.

use std::io::Cursor;

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use log::trace;

use crate::bitmap::alloc_block;
use crate::config::*;
use crate::error::FsError;
use crate::{BlockDevice, FileType, Inode, Result, SuperBlock};

/// Sector and in-sector byte offset of an inode record.
fn inode_pos(inode_id: u32) -> Result<(u32, usize)> {
    if inode_id == 0 || inode_id > MAX_INODES {
        return Err(FsError::NotFound);
    }
    let index = (inode_id - 1) as usize;
    let sector = INODE_TABLE_SECTOR + (index / INODES_PER_SECTOR) as u32;
    let offset = (index % INODES_PER_SECTOR) * INODE_SIZE;
    Ok((sector, offset))
}

fn ptrs_per_block(superblock: &SuperBlock) -> u32 {
    superblock.block_size / 4
}

/// Reads entry `index` of the index block starting at `block_addr`.
fn read_ptr(device: &(impl BlockDevice + ?Sized), block_addr: u32, index: u32) -> Result<u32> {
    let byte = index as usize * 4;
    let mut buf = [0u8; SECTOR_SIZE];
    device.read_sector(block_addr + (byte / SECTOR_SIZE) as u32, &mut buf)?;
    let offset = byte % SECTOR_SIZE;
    Ok(LittleEndian::read_u32(&buf[offset..offset + 4]))
}

fn write_ptr(
    device: &(impl BlockDevice + ?Sized),
    block_addr: u32,
    index: u32,
    value: u32,
) -> Result<()> {
    let byte = index as usize * 4;
    let sector = block_addr + (byte / SECTOR_SIZE) as u32;
    let mut buf = [0u8; SECTOR_SIZE];
    device.read_sector(sector, &mut buf)?;
    let offset = byte % SECTOR_SIZE;
    LittleEndian::write_u32(&mut buf[offset..offset + 4], value);
    device.write_sector(sector, &buf)
}

/// Returns the index block address stored in `slot`, allocating one if it is empty.
fn ensure_index_block(
    device: &(impl BlockDevice + ?Sized),
    superblock: &SuperBlock,
    slot: &mut u32,
) -> Result<Option<u32>> {
    if *slot == 0 {
        match alloc_block(device, superblock)? {
            Some(addr) => *slot = addr,
            None => return Ok(None),
        }
    }
    Ok(Some(*slot))
}

/// Lays down an empty inode table, each slot stamped with its own number.
pub(crate) fn init_inode_table(device: &(impl BlockDevice + ?Sized)) -> Result<()> {
    let mut buf = [0u8; SECTOR_SIZE];
    for i in 0..INODE_TABLE_SECTORS {
        for j in 0..INODES_PER_SECTOR {
            let inode_id = i * INODES_PER_SECTOR as u32 + j as u32 + 1;
            let slot = &mut buf[j * INODE_SIZE..(j + 1) * INODE_SIZE];
            if inode_id > MAX_INODES {
                slot.fill(0);
            } else {
                Inode::free_slot(inode_id).encode(slot)?;
            }
        }
        device.write_sector(INODE_TABLE_SECTOR + i, &buf)?;
    }
    Ok(())
}

impl Inode {
    pub fn new(number: u32, ftype: FileType, owner: u32) -> Self {
        Self {
            number,
            ftype,
            owner,
            size: 0,
            blocks: 0,
            direct_ptrs: [0; NUM_DIRECT_PTRS],
            indirect_ptr: 0,
            double_indirect_ptr: 0,
        }
    }

    /// A never-used slot stamped with its own number, as laid down by format.
    pub fn free_slot(number: u32) -> Self {
        Self::new(number, FileType::Free, 0)
    }

    pub fn is_dir(&self) -> bool {
        self.ftype == FileType::Directory
    }

    pub fn load(device: &(impl BlockDevice + ?Sized), inode_id: u32) -> Result<Inode> {
        let (sector, offset) = inode_pos(inode_id)?;
        let mut buf = [0u8; SECTOR_SIZE];
        device.read_sector(sector, &mut buf)?;
        let mut inode = Self::decode(&buf[offset..offset + INODE_SIZE])?;
        inode.number = inode_id;
        Ok(inode)
    }

    pub fn save(&self, device: &(impl BlockDevice + ?Sized)) -> Result<()> {
        let (sector, offset) = inode_pos(self.number)?;
        let mut buf = [0u8; SECTOR_SIZE];
        device.read_sector(sector, &mut buf)?;
        self.encode(&mut buf[offset..offset + INODE_SIZE])?;
        device.write_sector(sector, &buf)?;
        trace!("saved inode {} ({:?}, {} bytes)", self.number, self.ftype, self.size);
        Ok(())
    }

    /// Finds the lowest-numbered free inode slot.
    pub fn find_free(device: &(impl BlockDevice + ?Sized)) -> Result<Option<u32>> {
        let mut buf = [0u8; SECTOR_SIZE];
        for i in 0..INODE_TABLE_SECTORS {
            device.read_sector(INODE_TABLE_SECTOR + i, &mut buf)?;
            for j in 0..INODES_PER_SECTOR {
                let inode_id = i * INODES_PER_SECTOR as u32 + j as u32 + 1;
                if inode_id > MAX_INODES {
                    return Ok(None);
                }
                let raw_type = LittleEndian::read_u32(&buf[j * INODE_SIZE + 4..j * INODE_SIZE + 8]);
                if FileType::from_raw(raw_type) == FileType::Free {
                    return Ok(Some(inode_id));
                }
            }
        }
        Ok(None)
    }

    /// Maps a logical block to the physical address of its first sector.
    /// Returns None for blocks that were never appended.
    pub fn block_addr(
        &self,
        device: &(impl BlockDevice + ?Sized),
        superblock: &SuperBlock,
        logical: u32,
    ) -> Result<Option<u32>> {
        if logical >= self.blocks {
            return Ok(None);
        }
        let ppb = ptrs_per_block(superblock);

        // Direct blocks
        if (logical as usize) < NUM_DIRECT_PTRS {
            return Ok(non_zero(self.direct_ptrs[logical as usize]));
        }

        // Single indirect
        let l = logical - NUM_DIRECT_PTRS as u32;
        if l < ppb {
            if self.indirect_ptr == 0 {
                return Ok(None);
            }
            return Ok(non_zero(read_ptr(device, self.indirect_ptr, l)?));
        }

        // Double indirect
        let l = (l - ppb) as u64;
        if l >= ppb as u64 * ppb as u64 || self.double_indirect_ptr == 0 {
            return Ok(None);
        }
        let outer = read_ptr(device, self.double_indirect_ptr, (l / ppb as u64) as u32)?;
        if outer == 0 {
            return Ok(None);
        }
        Ok(non_zero(read_ptr(device, outer, (l % ppb as u64) as u32)?))
    }

    /// Appends one zero-filled block at logical index `self.blocks`.
    ///
    /// Index blocks are allocated before the data block, so a full volume
    /// never leaves an allocated data block unreferenced. The in-memory inode
    /// may change even when None is returned; the caller saves it.
    pub fn append_block(
        &mut self,
        device: &(impl BlockDevice + ?Sized),
        superblock: &SuperBlock,
    ) -> Result<Option<u32>> {
        let ppb = ptrs_per_block(superblock) as u64;
        let logical = self.blocks as u64;
        let direct = NUM_DIRECT_PTRS as u64;
        if logical >= direct + ppb + ppb * ppb {
            return Err(FsError::FileTooLarge);
        }

        let data = if logical < direct {
            let Some(addr) = alloc_block(device, superblock)? else {
                return Ok(None);
            };
            self.direct_ptrs[logical as usize] = addr;
            addr
        } else if logical < direct + ppb {
            let Some(index_block) = ensure_index_block(device, superblock, &mut self.indirect_ptr)? else {
                return Ok(None);
            };
            let Some(addr) = alloc_block(device, superblock)? else {
                return Ok(None);
            };
            write_ptr(device, index_block, (logical - direct) as u32, addr)?;
            addr
        } else {
            let l = logical - direct - ppb;
            let Some(top) = ensure_index_block(device, superblock, &mut self.double_indirect_ptr)? else {
                return Ok(None);
            };
            let outer_index = (l / ppb) as u32;
            let mut outer = read_ptr(device, top, outer_index)?;
            if outer == 0 {
                let Some(addr) = alloc_block(device, superblock)? else {
                    return Ok(None);
                };
                write_ptr(device, top, outer_index, addr)?;
                outer = addr;
            }
            let Some(addr) = alloc_block(device, superblock)? else {
                return Ok(None);
            };
            write_ptr(device, outer, (l % ppb) as u32, addr)?;
            addr
        };

        self.blocks += 1;
        trace!("inode {}: logical block {} -> sector {}", self.number, logical, data);
        Ok(Some(data))
    }

    fn encode(&self, buf: &mut [u8]) -> Result<()> {
        let mut cur = Cursor::new(buf);
        cur.write_u32::<LittleEndian>(self.number)?;
        cur.write_u32::<LittleEndian>(self.ftype as u32)?;
        cur.write_u32::<LittleEndian>(self.owner)?;
        cur.write_u32::<LittleEndian>(self.size)?;
        cur.write_u32::<LittleEndian>(self.blocks)?;
        for ptr in self.direct_ptrs {
            cur.write_u32::<LittleEndian>(ptr)?;
        }
        cur.write_u32::<LittleEndian>(self.indirect_ptr)?;
        cur.write_u32::<LittleEndian>(self.double_indirect_ptr)?;
        Ok(())
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        let mut cur = Cursor::new(buf);
        let number = cur.read_u32::<LittleEndian>()?;
        let ftype = FileType::from_raw(cur.read_u32::<LittleEndian>()?);
        let owner = cur.read_u32::<LittleEndian>()?;
        let size = cur.read_u32::<LittleEndian>()?;
        let blocks = cur.read_u32::<LittleEndian>()?;
        let mut direct_ptrs = [0; NUM_DIRECT_PTRS];
        for ptr in direct_ptrs.iter_mut() {
            *ptr = cur.read_u32::<LittleEndian>()?;
        }
        Ok(Self {
            number,
            ftype,
            owner,
            size,
            blocks,
            direct_ptrs,
            indirect_ptr: cur.read_u32::<LittleEndian>()?,
            double_indirect_ptr: cur.read_u32::<LittleEndian>()?,
        })
    }
}

fn non_zero(addr: u32) -> Option<u32> {
    (addr != 0).then_some(addr)
}
