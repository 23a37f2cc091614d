//! Open-handle table of a mounted filesystem.

use crate::config::MAX_DESCRIPTORS;
use crate::{Error, Result};

/// 1-based index into the descriptor table; 0 is never handed out.
pub type Handle = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    File,
    Directory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor {
    pub kind: HandleKind,
    pub inode_id: u32,
    pub cursor: u32, // Byte offset into the file or directory stream
}

#[derive(Debug)]
pub struct DescriptorTable {
    slots: Vec<Option<Descriptor>>,
    open_count: usize,
}

impl Default for DescriptorTable {
    fn default() -> Self {
        Self::new()
    }
}

impl DescriptorTable {
    pub fn new() -> Self {
        Self {
            slots: vec![None; MAX_DESCRIPTORS],
            open_count: 0,
        }
    }

    /// Takes the first free slot, cursor at 0.
    pub fn open(&mut self, kind: HandleKind, inode_id: u32) -> Result<Handle> {
        let index = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(Error::TableFull)?;
        self.slots[index] = Some(Descriptor {
            kind,
            inode_id,
            cursor: 0,
        });
        self.open_count += 1;
        Ok(index as Handle + 1)
    }

    pub fn has_free_slot(&self) -> bool {
        self.slots.iter().any(Option::is_none)
    }

    fn index(handle: Handle) -> Result<usize> {
        if handle == 0 || handle as usize > MAX_DESCRIPTORS {
            return Err(Error::InvalidHandle);
        }
        Ok(handle as usize - 1)
    }

    pub fn get(&self, handle: Handle, kind: HandleKind) -> Result<&Descriptor> {
        let descriptor = self.slots[Self::index(handle)?]
            .as_ref()
            .ok_or(Error::InvalidHandle)?;
        if descriptor.kind != kind {
            return Err(Error::WrongType);
        }
        Ok(descriptor)
    }

    pub fn get_mut(&mut self, handle: Handle, kind: HandleKind) -> Result<&mut Descriptor> {
        let descriptor = self.slots[Self::index(handle)?]
            .as_mut()
            .ok_or(Error::InvalidHandle)?;
        if descriptor.kind != kind {
            return Err(Error::WrongType);
        }
        Ok(descriptor)
    }

    pub fn close(&mut self, handle: Handle, kind: HandleKind) -> Result<()> {
        self.get(handle, kind)?;
        self.slots[handle as usize - 1] = None;
        self.open_count = self.open_count.saturating_sub(1);
        Ok(())
    }

    /// Drops every open handle.
    pub fn clear(&mut self) {
        self.slots.fill(None);
        self.open_count = 0;
    }

    pub fn open_count(&self) -> usize {
        self.open_count
    }

    /// The counter and a full scan must agree that nothing is open.
    pub fn is_idle(&self) -> bool {
        self.open_count == 0 && self.slots.iter().all(Option::is_none)
    }
}
