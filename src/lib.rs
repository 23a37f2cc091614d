//! Blockfs is a small disk filesystem laid out directly on a sector device.
//! No journaling, permissions, symlinks or link counts: an inode stores a type,
//! an owner id, a byte size and its block map.
//!
//! On-disk linear layout:
//! - Superblock (sector 0)
//! - Inode Table
//! - Block Bitmap
//! - Data Blocks (each a fixed multiple of the sector size)
//!
//! Layers (from bottom to top):
//! 1. Block Device: sector-level storage.                  | User implemented (hardware-specific)
//! 2. Superblock / Bitmap: volume geometry and allocation.  | Fs implemented
//! 3. Inode: file metadata and logical-to-physical mapping. | Fs implemented
//! 4. File: byte-range I/O over an inode's blocks.          | Fs implemented
//! 5. Directory/Path: entry codec and path walking.         | Fs implemented
//! 6. FileSystem: mount session with its handle table.      | Fs implemented
//! 7. FsDriver: entry points for a host VFS.                | Host registers it

mod config;
mod block_dev;
mod structs;
mod bitmap;
mod superblock;
mod inode;
mod file;
mod directory;
mod path;
mod descriptor;
mod fs;
mod vfs;
mod error;

pub use block_dev::BlockDevice;
pub use config::*;
pub use structs::*;
pub use superblock::*;
pub use bitmap::{alloc_block, is_allocated};
pub use file::{fread, fwrite};
pub use directory::*;
pub use path::*;
pub use descriptor::*;
pub use fs::*;
pub use vfs::FsDriver;
pub use error::FsError as Error;
pub use error::Result;
