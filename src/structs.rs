use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::config::*;
use crate::Error;
use crate::Result;

/// Volume geometry, stored in the first sector as seven little-endian u32 fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuperBlock {
    pub magic: u32,             // Magic number to identify the filesystem
    pub block_size: u32,        // Bytes per block, a multiple of SECTOR_SIZE
    pub num_blocks: u32,        // Number of allocatable blocks
    pub free_map_sector: u32,   // Sector where the block bitmap starts
    pub free_map_size: u32,     // Size of the block bitmap in sectors
    pub data_start_sector: u32, // Sector where block 0 starts
    pub root_inode: u32,        // Inode number of the root directory
}

impl SuperBlock {
    pub const ENCODED_SIZE: usize = 7 * 4;

    pub fn sectors_per_block(&self) -> u32 {
        self.block_size / SECTOR_SIZE as u32
    }

    /// Physical address of the first sector of block `index`.
    pub fn block_addr(&self, index: u32) -> u32 {
        self.data_start_sector + index * self.sectors_per_block()
    }

    /// Geometry checks done on mount, on top of the magic number.
    pub fn is_valid(&self, sector_count: u32) -> bool {
        if self.magic != MAGIC {
            return false;
        }
        if self.block_size == 0 || self.block_size as usize % SECTOR_SIZE != 0 {
            return false;
        }
        if self.root_inode == 0 || self.root_inode > MAX_INODES {
            return false;
        }
        // The bitmap sits between the inode table and the data region.
        if self.free_map_sector < INODE_TABLE_SECTOR + INODE_TABLE_SECTORS {
            return false;
        }
        if self.free_map_sector as u64 + self.free_map_size as u64 > self.data_start_sector as u64 {
            return false;
        }
        if (self.free_map_size as u64) * (BITS_PER_SECTOR as u64) < self.num_blocks as u64 {
            return false;
        }
        let end = self.data_start_sector as u64
            + self.num_blocks as u64 * self.sectors_per_block() as u64;
        end <= sector_count as u64
    }

    pub(crate) fn encode(&self, buf: &mut [u8]) -> Result<()> {
        let mut cur = Cursor::new(buf);
        for field in [
            self.magic,
            self.block_size,
            self.num_blocks,
            self.free_map_sector,
            self.free_map_size,
            self.data_start_sector,
            self.root_inode,
        ] {
            cur.write_u32::<LittleEndian>(field)?;
        }
        Ok(())
    }

    pub(crate) fn decode(buf: &[u8]) -> Result<Self> {
        let mut cur = Cursor::new(buf);
        Ok(Self {
            magic: cur.read_u32::<LittleEndian>()?,
            block_size: cur.read_u32::<LittleEndian>()?,
            num_blocks: cur.read_u32::<LittleEndian>()?,
            free_map_sector: cur.read_u32::<LittleEndian>()?,
            free_map_size: cur.read_u32::<LittleEndian>()?,
            data_start_sector: cur.read_u32::<LittleEndian>()?,
            root_inode: cur.read_u32::<LittleEndian>()?,
        })
    }
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Free = 0, // Unused inode slot
    Regular = 1,
    Directory = 2,
}

impl FileType {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => FileType::Regular,
            2 => FileType::Directory,
            _ => FileType::Free,
        }
    }
}

/// In-memory copy of an inode record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inode {
    pub number: u32,
    pub ftype: FileType,
    pub owner: u32,
    pub size: u32,
    pub blocks: u32, // Number of data blocks mapped, logical 0..blocks
    pub direct_ptrs: [u32; NUM_DIRECT_PTRS],
    pub indirect_ptr: u32,
    pub double_indirect_ptr: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    pub inode_id: u32,
    pub name: [u8; DIR_ENTRY_NAME_SIZE],
}

impl DirEntry {
    pub const NULL: Self = Self {
        inode_id: 0,
        name: [0; DIR_ENTRY_NAME_SIZE],
    };

    pub fn new(inode_id: u32, name: &[u8]) -> Result<Self> {
        validate_name(name)?;
        let mut arr = [0; DIR_ENTRY_NAME_SIZE];
        arr[..name.len()].copy_from_slice(name);
        Ok(Self { inode_id, name: arr })
    }
}

/// Names are 1..=255 bytes without '/' or NUL.
pub fn validate_name(name: &[u8]) -> Result<()> {
    if name.is_empty() || name.len() > MAX_FILE_NAME_LEN {
        return Err(Error::InvalidName);
    }
    if name.iter().any(|&c| c == b'/' || c == 0) {
        return Err(Error::InvalidName);
    }
    Ok(())
}
