use std::sync::Arc;

use log::{debug, info, warn};

use crate::bitmap::init_bitmap;
use crate::config::*;
use crate::descriptor::{DescriptorTable, Handle, HandleKind};
use crate::directory::{dir_add_entry, dir_lookup, dir_read_entry, dir_rm_entry};
use crate::file::{fread, fwrite};
use crate::inode::init_inode_table;
use crate::path::{components, resolve};
use crate::structs::*;
use crate::superblock::{plan_layout, read_superblock, write_superblock};
use crate::{BlockDevice, Error, Result};

/// Metadata of an open handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub inode_id: u32,
    pub ftype: FileType,
    pub owner: u32,
    pub size: u32,
    pub blocks: u32,
    pub cursor: u32,
}

/// A filesystem session over one device.
///
/// The session owns the mounted superblock and the descriptor table. All
/// operations take `&mut self`, so one session serialises every call that
/// touches the bitmap or the inode table. Sessions on different devices are
/// independent.
#[derive(Debug)]
pub struct FileSystem<D: BlockDevice> {
    device: Arc<D>,
    superblock: Option<SuperBlock>, // Some while mounted
    descriptors: DescriptorTable,
}

impl<D: BlockDevice> FileSystem<D> {
    /// Creates an unmounted session.
    pub fn new(device: Arc<D>) -> Self {
        Self {
            device,
            superblock: None,
            descriptors: DescriptorTable::new(),
        }
    }

    /// True when no handle is open.
    pub fn is_idle(&self) -> bool {
        self.descriptors.is_idle()
    }

    /// Lays out an empty volume with blocks of `block_size` bytes.
    /// Returns the number of allocatable blocks. The session is left unmounted.
    pub fn format(&mut self, block_size: u32) -> Result<u32> {
        if !self.is_idle() {
            return Err(Error::Busy);
        }
        let device = &*self.device;
        let superblock = plan_layout(device.sector_count(), block_size)?;

        init_inode_table(device)?;
        init_bitmap(device, &superblock)?;
        write_superblock(device, &superblock)?;
        Inode::new(superblock.root_inode, FileType::Directory, DEFAULT_OWNER).save(device)?;
        device.flush()?;

        self.superblock = None;
        info!(
            "formatted {} sectors: {} blocks of {} bytes",
            device.sector_count(),
            superblock.num_blocks,
            block_size
        );
        Ok(superblock.num_blocks)
    }

    /// Loads and validates the superblock and resets the descriptor table.
    pub fn mount(&mut self) -> Result<()> {
        let device = &*self.device;
        let superblock = read_superblock(device)?;
        if !superblock.is_valid(device.sector_count()) {
            warn!("mount refused: no valid superblock (magic {:#x})", superblock.magic);
            return Err(Error::NotFormatted);
        }
        if !Inode::load(device, superblock.root_inode)?.is_dir() {
            warn!("mount refused: root inode {} is not a directory", superblock.root_inode);
            return Err(Error::NotFormatted);
        }

        self.descriptors.clear();
        self.superblock = Some(superblock);
        info!("mounted: {} blocks of {} bytes", superblock.num_blocks, superblock.block_size);
        Ok(())
    }

    /// Persists the superblock and flushes the device. Open handles are dropped.
    pub fn unmount(&mut self) -> Result<()> {
        let superblock = self.mounted()?;
        if !self.is_idle() {
            warn!("unmounting with {} open handles", self.descriptors.open_count());
        }
        write_superblock(&*self.device, &superblock)?;
        self.device.flush()?;

        self.descriptors.clear();
        self.superblock = None;
        info!("unmounted");
        Ok(())
    }

    /// Mounts when `mount` is true, unmounts otherwise.
    pub fn xmount(&mut self, mount: bool) -> Result<()> {
        if mount { self.mount() } else { self.unmount() }
    }

    pub fn is_mounted(&self) -> bool {
        self.superblock.is_some()
    }

    fn mounted(&self) -> Result<SuperBlock> {
        self.superblock.ok_or(Error::NotMounted)
    }

    fn open_kind(&mut self, path: &str, kind: HandleKind) -> Result<Handle> {
        let superblock = self.mounted()?;
        if !self.descriptors.has_free_slot() {
            return Err(Error::TableFull);
        }
        let ftype = match kind {
            HandleKind::File => FileType::Regular,
            HandleKind::Directory => FileType::Directory,
        };
        let inode = resolve(&*self.device, &superblock, path, Some(ftype))?;
        if inode.ftype != ftype {
            return Err(Error::WrongType);
        }
        let handle = self.descriptors.open(kind, inode.number)?;
        debug!("opened {:?} (inode {}) as {:?} handle {}", path, inode.number, kind, handle);
        Ok(handle)
    }

    /// Opens a regular file, creating it when the last component is missing.
    /// Intermediate directories must exist. Returns a 1-based handle with cursor 0.
    pub fn open(&mut self, path: &str) -> Result<Handle> {
        if components(path).is_empty() {
            return Err(Error::InvalidPath);
        }
        self.open_kind(path, HandleKind::File)
    }

    /// Reads from the cursor of a file handle and advances it by the count read.
    /// Returns 0 at end of file.
    pub fn read(&mut self, handle: Handle, buf: &mut [u8]) -> Result<usize> {
        let superblock = self.mounted()?;
        let descriptor = *self.descriptors.get(handle, HandleKind::File)?;
        let inode = Inode::load(&*self.device, descriptor.inode_id)?;
        if inode.ftype != FileType::Regular {
            return Err(Error::WrongType);
        }

        let n = fread(&*self.device, &superblock, &inode, descriptor.cursor, buf)?;
        self.descriptors.get_mut(handle, HandleKind::File)?.cursor += n as u32;
        Ok(n)
    }

    /// Writes at the cursor of a file handle, growing the file as needed,
    /// and advances the cursor by the count written.
    pub fn write(&mut self, handle: Handle, buf: &[u8]) -> Result<usize> {
        let superblock = self.mounted()?;
        let descriptor = *self.descriptors.get(handle, HandleKind::File)?;
        let mut inode = Inode::load(&*self.device, descriptor.inode_id)?;
        if inode.ftype != FileType::Regular {
            return Err(Error::WrongType);
        }

        let n = fwrite(&*self.device, &superblock, &mut inode, descriptor.cursor, buf)?;
        self.descriptors.get_mut(handle, HandleKind::File)?.cursor += n as u32;
        Ok(n)
    }

    pub fn close(&mut self, handle: Handle) -> Result<()> {
        self.descriptors.close(handle, HandleKind::File)
    }

    /// Opens a directory; `/` is the root. A missing last component is
    /// created as an empty directory.
    pub fn open_dir(&mut self, path: &str) -> Result<Handle> {
        self.open_kind(path, HandleKind::Directory)
    }

    /// Returns the next live entry at the cursor of a directory handle,
    /// or None at the end of the directory. Tombstones are skipped.
    pub fn read_dir(&mut self, handle: Handle) -> Result<Option<DirEntry>> {
        let superblock = self.mounted()?;
        let descriptor = *self.descriptors.get(handle, HandleKind::Directory)?;
        let dir_inode = Inode::load(&*self.device, descriptor.inode_id)?;

        let mut cursor = descriptor.cursor;
        let mut found = None;
        while let Some(entry) = dir_read_entry(
            &*self.device,
            &superblock,
            &dir_inode,
            cursor / DIR_ENTRY_SIZE as u32,
        )? {
            cursor += DIR_ENTRY_SIZE as u32;
            if !entry.is_empty() {
                found = Some(entry);
                break;
            }
        }

        self.descriptors.get_mut(handle, HandleKind::Directory)?.cursor = cursor;
        Ok(found)
    }

    /// Adds an entry `name` -> `inode_id` to an open directory.
    /// The inode must be in use and the name must not exist yet.
    pub fn link(&mut self, handle: Handle, name: &str, inode_id: u32) -> Result<()> {
        let superblock = self.mounted()?;
        let descriptor = *self.descriptors.get(handle, HandleKind::Directory)?;
        let entry = DirEntry::new(inode_id, name.as_bytes())?;
        if Inode::load(&*self.device, inode_id)?.ftype == FileType::Free {
            return Err(Error::NotFound);
        }

        let mut dir_inode = Inode::load(&*self.device, descriptor.inode_id)?;
        if dir_lookup(&*self.device, &superblock, &dir_inode, name.as_bytes())?.is_some() {
            return Err(Error::AlreadyExists);
        }
        dir_add_entry(&*self.device, &superblock, &mut dir_inode, &entry)
    }

    /// Removes the entry `name` from an open directory.
    /// The inode it referred to is left untouched.
    pub fn unlink(&mut self, handle: Handle, name: &str) -> Result<()> {
        let superblock = self.mounted()?;
        let descriptor = *self.descriptors.get(handle, HandleKind::Directory)?;
        let mut dir_inode = Inode::load(&*self.device, descriptor.inode_id)?;
        dir_rm_entry(&*self.device, &superblock, &mut dir_inode, name.as_bytes())?;
        Ok(())
    }

    pub fn close_dir(&mut self, handle: Handle) -> Result<()> {
        self.descriptors.close(handle, HandleKind::Directory)
    }

    /// Metadata of the inode behind an open handle of either kind.
    pub fn stat(&self, handle: Handle) -> Result<Stat> {
        self.mounted()?;
        let descriptor = self
            .descriptors
            .get(handle, HandleKind::File)
            .or_else(|_| self.descriptors.get(handle, HandleKind::Directory))?;
        let inode = Inode::load(&*self.device, descriptor.inode_id)?;
        Ok(Stat {
            inode_id: inode.number,
            ftype: inode.ftype,
            owner: inode.owner,
            size: inode.size,
            blocks: inode.blocks,
            cursor: descriptor.cursor,
        })
    }

    pub fn root_inode_id(&self) -> Result<u32> {
        Ok(self.mounted()?.root_inode)
    }

    pub fn superblock(&self) -> Option<&SuperBlock> {
        self.superblock.as_ref()
    }

    pub fn device(&self) -> Arc<D> {
        Arc::clone(&self.device)
    }
}
