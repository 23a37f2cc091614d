//! Entry points a host VFS layer dispatches to.

use crate::config::{FS_ID, FS_NAME};
use crate::{BlockDevice, DirEntry, FileSystem, Handle, Result};

/// The set of operations a filesystem registers with the host.
/// Object safe, so a registry can hold `Box<dyn FsDriver>`.
pub trait FsDriver {
    fn fs_id(&self) -> u8;

    fn fs_name(&self) -> &'static str;

    fn is_idle(&self) -> bool;

    /// Returns the number of allocatable blocks.
    fn format(&mut self, block_size: u32) -> Result<u32>;

    fn xmount(&mut self, mount: bool) -> Result<()>;

    fn open(&mut self, path: &str) -> Result<Handle>;

    fn read(&mut self, handle: Handle, buf: &mut [u8]) -> Result<usize>;

    fn write(&mut self, handle: Handle, buf: &[u8]) -> Result<usize>;

    fn close(&mut self, handle: Handle) -> Result<()>;

    fn open_dir(&mut self, path: &str) -> Result<Handle>;

    /// None at the end of the directory.
    fn read_dir(&mut self, handle: Handle) -> Result<Option<DirEntry>>;

    fn link(&mut self, handle: Handle, name: &str, inode_id: u32) -> Result<()>;

    fn unlink(&mut self, handle: Handle, name: &str) -> Result<()>;

    fn close_dir(&mut self, handle: Handle) -> Result<()>;
}

impl<D: BlockDevice> FsDriver for FileSystem<D> {
    fn fs_id(&self) -> u8 {
        FS_ID
    }

    fn fs_name(&self) -> &'static str {
        FS_NAME
    }

    fn is_idle(&self) -> bool {
        FileSystem::is_idle(self)
    }

    fn format(&mut self, block_size: u32) -> Result<u32> {
        FileSystem::format(self, block_size)
    }

    fn xmount(&mut self, mount: bool) -> Result<()> {
        FileSystem::xmount(self, mount)
    }

    fn open(&mut self, path: &str) -> Result<Handle> {
        FileSystem::open(self, path)
    }

    fn read(&mut self, handle: Handle, buf: &mut [u8]) -> Result<usize> {
        FileSystem::read(self, handle, buf)
    }

    fn write(&mut self, handle: Handle, buf: &[u8]) -> Result<usize> {
        FileSystem::write(self, handle, buf)
    }

    fn close(&mut self, handle: Handle) -> Result<()> {
        FileSystem::close(self, handle)
    }

    fn open_dir(&mut self, path: &str) -> Result<Handle> {
        FileSystem::open_dir(self, path)
    }

    fn read_dir(&mut self, handle: Handle) -> Result<Option<DirEntry>> {
        FileSystem::read_dir(self, handle)
    }

    fn link(&mut self, handle: Handle, name: &str, inode_id: u32) -> Result<()> {
        FileSystem::link(self, handle, name, inode_id)
    }

    fn unlink(&mut self, handle: Handle, name: &str) -> Result<()> {
        FileSystem::unlink(self, handle, name)
    }

    fn close_dir(&mut self, handle: Handle) -> Result<()> {
        FileSystem::close_dir(self, handle)
    }
}
