//! Byte-range I/O on top of an inode's block map.
//!
//! A byte offset is split into (logical block, offset in block); the logical
//! block is resolved through the inode, and only the sectors of that block
//! overlapping the requested span are touched. Directories go through the
//! same path as regular files.

use log::{trace, warn};

use crate::config::SECTOR_SIZE;
use crate::{BlockDevice, Error, Inode, Result, SuperBlock};

/// Copies `out.len()` bytes starting at `offset` inside the block at `block_addr`.
fn read_span(
    device: &(impl BlockDevice + ?Sized),
    block_addr: u32,
    offset: usize,
    out: &mut [u8],
) -> Result<()> {
    let mut sector_buf = [0u8; SECTOR_SIZE];
    let mut copied = 0;
    while copied < out.len() {
        let pos = offset + copied;
        let in_sector = pos % SECTOR_SIZE;
        let n = (SECTOR_SIZE - in_sector).min(out.len() - copied);
        device.read_sector(block_addr + (pos / SECTOR_SIZE) as u32, &mut sector_buf)?;
        out[copied..copied + n].copy_from_slice(&sector_buf[in_sector..in_sector + n]);
        copied += n;
    }
    Ok(())
}

/// Splices `data` into the block at `block_addr` starting at `offset`.
/// Sectors covered entirely are written without reading them first.
fn write_span(
    device: &(impl BlockDevice + ?Sized),
    block_addr: u32,
    offset: usize,
    data: &[u8],
) -> Result<()> {
    let mut sector_buf = [0u8; SECTOR_SIZE];
    let mut written = 0;
    while written < data.len() {
        let pos = offset + written;
        let sector = block_addr + (pos / SECTOR_SIZE) as u32;
        let in_sector = pos % SECTOR_SIZE;
        let n = (SECTOR_SIZE - in_sector).min(data.len() - written);
        if n == SECTOR_SIZE {
            device.write_sector(sector, &data[written..written + n])?;
        } else {
            device.read_sector(sector, &mut sector_buf)?;
            sector_buf[in_sector..in_sector + n].copy_from_slice(&data[written..written + n]);
            device.write_sector(sector, &sector_buf)?;
        }
        written += n;
    }
    Ok(())
}

/// Appends blocks until `logical` is mapped and returns its address.
fn extend_to(
    device: &(impl BlockDevice + ?Sized),
    superblock: &SuperBlock,
    inode: &mut Inode,
    logical: u32,
) -> Result<u32> {
    if logical < inode.blocks {
        // Counted as mapped but the pointer is empty.
        return Err(Error::IoError);
    }
    loop {
        match inode.append_block(device, superblock)? {
            Some(addr) if inode.blocks > logical => return Ok(addr),
            Some(_) => continue,
            None => return Err(Error::NoSpace),
        }
    }
}

/// Reads from a file into the provided buffer, starting at `offset`.
///
/// The length is clamped to the file size; at or past the end nothing is read
/// and `Ok(0)` is returned. If the device fails or a block is missing midway,
/// the bytes copied so far are returned; with nothing copied the error is.
pub fn fread(
    device: &(impl BlockDevice + ?Sized),
    superblock: &SuperBlock,
    inode: &Inode,
    offset: u32,
    buffer: &mut [u8],
) -> Result<usize> {
    if offset >= inode.size {
        return Ok(0);
    }
    let to_read = buffer.len().min((inode.size - offset) as usize);
    let block_size = superblock.block_size as usize;

    let mut bytes_read = 0;
    let mut current_offset = offset as usize;
    while bytes_read < to_read {
        let logical = (current_offset / block_size) as u32;
        let in_block = current_offset % block_size;
        let n = (block_size - in_block).min(to_read - bytes_read);

        let copied = match inode.block_addr(device, superblock, logical) {
            Ok(Some(addr)) => read_span(device, addr, in_block, &mut buffer[bytes_read..bytes_read + n]),
            Ok(None) => Err(Error::IoError),
            Err(e) => Err(e),
        };
        if let Err(e) = copied {
            if bytes_read == 0 {
                return Err(e);
            }
            warn!(
                "inode {}: short read at logical block {} ({:?}), {} of {} bytes",
                inode.number, logical, e, bytes_read, to_read
            );
            break;
        }

        bytes_read += n;
        current_offset += n;
    }

    trace!("inode {}: read {} bytes at {}", inode.number, bytes_read, offset);
    Ok(bytes_read)
}

/// Writes data from the provided buffer to a file, starting at `offset`.
///
/// Missing blocks are allocated (zero-filled) on demand. The size is grown
/// and the inode persisted when the write ends past the old size. Running
/// out of blocks or a device error midway yields a short count; with
/// nothing written the error is returned.
pub fn fwrite(
    device: &(impl BlockDevice + ?Sized),
    superblock: &SuperBlock,
    inode: &mut Inode,
    offset: u32,
    buffer: &[u8],
) -> Result<usize> {
    if buffer.is_empty() {
        return Ok(0);
    }
    let to_write = buffer.len().min((u32::MAX - offset) as usize);
    if to_write == 0 {
        return Err(Error::FileTooLarge);
    }
    let block_size = superblock.block_size as usize;

    let mut bytes_written = 0;
    let mut current_offset = offset as usize;
    let mut dirty = false;
    let mut stopped = None;
    while bytes_written < to_write {
        let logical = (current_offset / block_size) as u32;
        let in_block = current_offset % block_size;
        let n = (block_size - in_block).min(to_write - bytes_written);

        let addr = match inode.block_addr(device, superblock, logical) {
            Ok(Some(addr)) => Ok(addr),
            Ok(None) => {
                dirty = true;
                extend_to(device, superblock, inode, logical)
            }
            Err(e) => Err(e),
        };
        let result = addr.and_then(|addr| {
            write_span(device, addr, in_block, &buffer[bytes_written..bytes_written + n])
        });
        if let Err(e) = result {
            stopped = Some(e);
            break;
        }

        bytes_written += n;
        current_offset += n;
    }

    let end = offset + bytes_written as u32;
    if end > inode.size {
        inode.size = end;
        dirty = true;
    }
    if dirty {
        inode.save(device)?;
    }

    match stopped {
        Some(e) if bytes_written == 0 => Err(e),
        Some(e) => {
            warn!(
                "inode {}: partial write ({:?}), {} of {} bytes",
                inode.number, e, bytes_written, buffer.len()
            );
            Ok(bytes_written)
        }
        None => {
            trace!("inode {}: wrote {} bytes at {}", inode.number, bytes_written, offset);
            Ok(bytes_written)
        }
    }
}
