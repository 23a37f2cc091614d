//! Path resolution.

use log::{debug, warn};

use crate::config::DEFAULT_OWNER;
use crate::directory::{dir_add_entry, dir_lookup};
use crate::{BlockDevice, DirEntry, Error, FileType, Inode, Result, SuperBlock};

/// Splits a slash-separated path into its non-empty components.
pub fn components(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Creates a new inode of type `ftype` and links it into `parent_inode` under `name`.
fn create_child(
    device: &(impl BlockDevice + ?Sized),
    superblock: &SuperBlock,
    parent_inode: &mut Inode,
    name: &str,
    ftype: FileType,
) -> Result<Inode> {
    let entry_template = DirEntry::new(0, name.as_bytes())?;
    let Some(inode_id) = Inode::find_free(device)? else {
        return Err(Error::NoFreeInode);
    };

    let inode = Inode::new(inode_id, ftype, DEFAULT_OWNER);
    inode.save(device)?;
    let entry = DirEntry { inode_id, ..entry_template };
    if let Err(e) = dir_add_entry(device, superblock, parent_inode, &entry) {
        // Give the slot back, nothing refers to it.
        if let Err(rollback) = Inode::free_slot(inode_id).save(device) {
            warn!("inode {} stays allocated after failed create: {:?}", inode_id, rollback);
        }
        return Err(e);
    }

    debug!("created {:?} {:?} as inode {} in directory {}", ftype, name, inode_id, parent_inode.number);
    Ok(inode)
}

/// Walks `path` from the root directory and returns the inode it names.
///
/// Every component but the last must be an existing directory. A missing
/// last component is created as `create_as` when given, otherwise the walk
/// fails with NotFound. A path without components resolves to the root.
pub fn resolve(
    device: &(impl BlockDevice + ?Sized),
    superblock: &SuperBlock,
    path: &str,
    create_as: Option<FileType>,
) -> Result<Inode> {
    let components = components(path);
    let mut current_inode = Inode::load(device, superblock.root_inode)?;

    for (i, component) in components.iter().enumerate() {
        if !current_inode.is_dir() {
            return Err(Error::WrongType);
        }
        let is_last = i == components.len() - 1;
        match dir_lookup(device, superblock, &current_inode, component.as_bytes())? {
            Some(inode_id) => {
                current_inode = Inode::load(device, inode_id)?;
            }
            None if is_last => {
                let Some(ftype) = create_as else {
                    return Err(Error::NotFound);
                };
                current_inode = create_child(device, superblock, &mut current_inode, component, ftype)?;
            }
            None => return Err(Error::NotFound),
        }
    }

    Ok(current_inode)
}
