pub const MAGIC: u32 = 0x1234_5678;
pub const FS_ID: u8 = 1;
pub const FS_NAME: &str = "blockfs";

pub const SECTOR_SIZE: usize = 512;
pub const SUPERBLOCK_SECTOR: u32 = 0; // Sector holding the superblock
pub const INODE_TABLE_SECTOR: u32 = 1; // First sector of the inode table

pub const MAX_INODES: u32 = 1024; // Inode numbers are 1..=MAX_INODES
pub const INODE_SIZE: usize = 64;
pub const INODES_PER_SECTOR: usize = SECTOR_SIZE / INODE_SIZE;
pub const INODE_TABLE_SECTORS: u32 = (MAX_INODES as usize * INODE_SIZE).div_ceil(SECTOR_SIZE) as u32;
pub const ROOT_INODE: u32 = 1;
pub const DEFAULT_OWNER: u32 = 1;

pub const NUM_DIRECT_PTRS: usize = 9; // Direct pointers in an inode, followed by single and double indirect
pub const BITS_PER_SECTOR: u32 = SECTOR_SIZE as u32 * 8;

pub const MAX_FILE_NAME_LEN: usize = 255;
pub const DIR_ENTRY_NAME_SIZE: usize = MAX_FILE_NAME_LEN + 1;
pub const DIR_ENTRY_SIZE: usize = 4 + DIR_ENTRY_NAME_SIZE; // inode number + null-padded name

pub const MAX_DESCRIPTORS: usize = 128;
