//! Directory entries and their codec.
//!
//! A directory is an inode of type Directory whose byte stream is a plain
//! concatenation of `DIR_ENTRY_SIZE` records: a little-endian u32 inode
//! number followed by a null-padded name. Entries are only ever appended;
//! unlinking zeroes a record in place, leaving a tombstone that scans skip.

use byteorder::{ByteOrder, LittleEndian};
use log::{debug, trace};

use crate::config::*;
use crate::error::{FsError, Result};
use crate::file::{fread, fwrite};
use crate::structs::*;
use crate::BlockDevice;

pub fn trim_zero(name: &[u8]) -> &[u8] {
    let mut end = name.len();
    while end > 0 && name[end - 1] == 0 {
        end -= 1;
    }
    &name[..end]
}

fn name_cmp(n1: &[u8], n2: &[u8]) -> bool {
    trim_zero(n1) == trim_zero(n2)
}

impl DirEntry {
    /// Tombstones and never-written records both decode with inode 0.
    pub fn is_empty(&self) -> bool {
        self.inode_id == 0
    }

    pub fn name_bytes(&self) -> &[u8] {
        trim_zero(&self.name)
    }

    pub fn name_eq(&self, name: &[u8]) -> bool {
        name_cmp(&self.name, name)
    }

    pub fn name_eq_str(&self, name: &str) -> bool {
        name_cmp(&self.name, name.as_bytes())
    }

    pub fn to_bytes(&self) -> [u8; DIR_ENTRY_SIZE] {
        let mut buf = [0u8; DIR_ENTRY_SIZE];
        LittleEndian::write_u32(&mut buf[..4], self.inode_id);
        buf[4..].copy_from_slice(&self.name);
        buf
    }

    pub fn from_bytes(buf: &[u8; DIR_ENTRY_SIZE]) -> Self {
        let mut name = [0u8; DIR_ENTRY_NAME_SIZE];
        name.copy_from_slice(&buf[4..]);
        Self {
            inode_id: LittleEndian::read_u32(&buf[..4]),
            name,
        }
    }
}

fn entry_count(dir_inode: &Inode) -> u32 {
    dir_inode.size / DIR_ENTRY_SIZE as u32
}

/// Reads record `index` of a directory, tombstones included.
/// Returns None past the last record.
pub fn dir_read_entry(
    device: &(impl BlockDevice + ?Sized),
    superblock: &SuperBlock,
    dir_inode: &Inode,
    index: u32,
) -> Result<Option<DirEntry>> {
    if !dir_inode.is_dir() {
        return Err(FsError::WrongType);
    }
    if index >= entry_count(dir_inode) {
        return Ok(None);
    }

    let mut buf = [0u8; DIR_ENTRY_SIZE];
    let n = fread(device, superblock, dir_inode, index * DIR_ENTRY_SIZE as u32, &mut buf)?;
    // The record lies within the directory size, so a short read means the device failed.
    if n < DIR_ENTRY_SIZE {
        return Err(FsError::IoError);
    }
    Ok(Some(DirEntry::from_bytes(&buf)))
}

/// Scans a directory for `name`, returning the entry index and inode number.
fn dir_find(
    device: &(impl BlockDevice + ?Sized),
    superblock: &SuperBlock,
    dir_inode: &Inode,
    name: &[u8],
) -> Result<Option<(u32, u32)>> {
    for index in 0..entry_count(dir_inode) {
        let Some(entry) = dir_read_entry(device, superblock, dir_inode, index)? else {
            break;
        };
        if entry.is_empty() {
            continue;
        }
        if entry.name_eq(name) {
            return Ok(Some((index, entry.inode_id)));
        }
    }
    Ok(None)
}

/// Query inode id of a file by name in the parent directory inode.
/// Returns None when no live entry carries that name.
pub fn dir_lookup(
    device: &(impl BlockDevice + ?Sized),
    superblock: &SuperBlock,
    parent_inode: &Inode,
    name: &[u8],
) -> Result<Option<u32>> {
    if !parent_inode.is_dir() {
        return Err(FsError::WrongType);
    }
    validate_name(name)?;

    let found = dir_find(device, superblock, parent_inode, name)?.map(|(_, inode_id)| inode_id);
    trace!(
        "lookup {:?} in inode {}: {:?}",
        String::from_utf8_lossy(name),
        parent_inode.number,
        found
    );
    Ok(found)
}

/// Appends an entry at the end of a parent directory.
/// Does not check for duplicate names, callers do.
/// Either the whole record lands and the size grows by `DIR_ENTRY_SIZE`, or
/// the size is left as it was.
pub fn dir_add_entry(
    device: &(impl BlockDevice + ?Sized),
    superblock: &SuperBlock,
    parent_inode: &mut Inode,
    child_entry: &DirEntry,
) -> Result<()> {
    if !parent_inode.is_dir() {
        return Err(FsError::WrongType);
    }

    let prev_size = parent_inode.size;
    let written = fwrite(device, superblock, parent_inode, prev_size, &child_entry.to_bytes())?;
    if written < DIR_ENTRY_SIZE {
        parent_inode.size = prev_size;
        parent_inode.save(device)?;
        return Err(FsError::NoSpace);
    }

    debug!(
        "added entry {:?} -> inode {} to directory {}",
        String::from_utf8_lossy(child_entry.name_bytes()),
        child_entry.inode_id,
        parent_inode.number
    );
    Ok(())
}

/// Removes a directory entry by writing a tombstone over it.
/// Neither the child inode nor its blocks are reclaimed, and the directory size is unchanged.
/// Returns the inode ID the entry pointed to.
pub fn dir_rm_entry(
    device: &(impl BlockDevice + ?Sized),
    superblock: &SuperBlock,
    parent_inode: &mut Inode,
    name: &[u8],
) -> Result<u32> {
    if !parent_inode.is_dir() {
        return Err(FsError::WrongType);
    }
    validate_name(name)?;

    let Some((index, inode_id)) = dir_find(device, superblock, parent_inode, name)? else {
        return Err(FsError::NotFound);
    };
    let written = fwrite(
        device,
        superblock,
        parent_inode,
        index * DIR_ENTRY_SIZE as u32,
        &DirEntry::NULL.to_bytes(),
    )?;
    if written < DIR_ENTRY_SIZE {
        return Err(FsError::IoError);
    }

    debug!(
        "removed entry {:?} (inode {}) from directory {}",
        String::from_utf8_lossy(name),
        inode_id,
        parent_inode.number
    );
    Ok(inode_id)
}
