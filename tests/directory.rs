use std::sync::Arc;

mod common;

use blockfs::{
    alloc_block, dir_add_entry, dir_lookup, is_allocated, DirEntry, Error, FileSystem, FileType,
    FsDriver, Inode, DIR_ENTRY_SIZE, FS_NAME, ROOT_INODE,
};
use common::{mounted, pattern, FaultyDisk, RamDisk};

fn list(fs: &mut FileSystem<RamDisk>, path: &str) -> Vec<(String, u32)> {
    let dir = fs.open_dir(path).unwrap();
    let mut names = Vec::new();
    while let Some(entry) = fs.read_dir(dir).unwrap() {
        names.push((String::from_utf8_lossy(entry.name_bytes()).into_owned(), entry.inode_id));
    }
    fs.close_dir(dir).unwrap();
    names
}

#[test]
fn nested_directories() {
    let mut fs = mounted(8192, 1024);
    assert_eq!(fs.open("/a/b.txt"), Err(Error::NotFound));

    let dir = fs.open_dir("/a").unwrap();
    assert_eq!(fs.stat(dir).unwrap().ftype, FileType::Directory);
    fs.close_dir(dir).unwrap();

    let fd = fs.open("/a/b.txt").unwrap();
    fs.write(fd, b"nested").unwrap();
    fs.close(fd).unwrap();

    // Missing intermediate directories are not created.
    assert_eq!(fs.open_dir("/x/y"), Err(Error::NotFound));

    assert_eq!(list(&mut fs, "/"), vec![("a".to_string(), 2)]);
    assert_eq!(list(&mut fs, "/a"), vec![("b.txt".to_string(), 3)]);

    let fd = fs.open("//a///b.txt").unwrap();
    let mut buf = [0u8; 6];
    assert_eq!(fs.read(fd, &mut buf).unwrap(), 6);
    assert_eq!(&buf, b"nested");
}

#[test]
fn handle_kinds_are_checked() {
    let mut fs = mounted(8192, 1024);
    let fd = fs.open("/file").unwrap();
    let dir = fs.open_dir("/dir").unwrap();

    assert_eq!(fs.open("/dir"), Err(Error::WrongType));
    assert_eq!(fs.open_dir("/file"), Err(Error::WrongType));
    assert_eq!(fs.read(dir, &mut [0u8; 4]), Err(Error::WrongType));
    assert_eq!(fs.read_dir(fd), Err(Error::WrongType));
    assert_eq!(fs.close(dir), Err(Error::WrongType));
    assert_eq!(fs.close_dir(fd), Err(Error::WrongType));

    fs.close(fd).unwrap();
    fs.close_dir(dir).unwrap();
    assert!(fs.is_idle());
}

#[test]
fn root_directory_spans_blocks() {
    // 260-byte entries straddle 512-byte blocks.
    let mut fs = mounted(8192, 512);
    let names: Vec<String> = (0..20).map(|i| format!("entry-{:02}", i)).collect();
    for name in &names {
        let fd = fs.open(&format!("/{}", name)).unwrap();
        fs.close(fd).unwrap();
    }

    let root = fs.open_dir("/").unwrap();
    assert_eq!(fs.stat(root).unwrap().size, 20 * DIR_ENTRY_SIZE as u32);
    fs.close_dir(root).unwrap();

    let listed = list(&mut fs, "/");
    assert_eq!(listed.len(), 20);
    for (i, (name, inode_id)) in listed.iter().enumerate() {
        assert_eq!(name, &names[i]);
        assert_eq!(*inode_id, i as u32 + 2);
    }

    // Reopening finds the existing inode instead of creating another.
    let fd = fs.open("/entry-13").unwrap();
    assert_eq!(fs.stat(fd).unwrap().inode_id, 15);
}

#[test]
fn link_and_unlink() {
    let mut fs = mounted(8192, 1024);
    let fd = fs.open("/original").unwrap();
    fs.write(fd, b"shared bytes").unwrap();
    let inode_id = fs.stat(fd).unwrap().inode_id;
    fs.close(fd).unwrap();

    let root = fs.open_dir("/").unwrap();
    fs.link(root, "alias", inode_id).unwrap();
    assert_eq!(fs.link(root, "alias", inode_id), Err(Error::AlreadyExists));
    assert_eq!(fs.link(root, "ghost", 500), Err(Error::NotFound));
    assert_eq!(fs.link(root, "bad/name", inode_id), Err(Error::InvalidName));

    let fd = fs.open("/alias").unwrap();
    let mut buf = [0u8; 12];
    fs.read(fd, &mut buf).unwrap();
    assert_eq!(&buf, b"shared bytes");
    fs.close(fd).unwrap();

    fs.unlink(root, "original").unwrap();
    assert_eq!(fs.unlink(root, "original"), Err(Error::NotFound));
    fs.close_dir(root).unwrap();

    // The tombstone is skipped and the inode stays reachable through the alias.
    assert_eq!(list(&mut fs, "/"), vec![("alias".to_string(), inode_id)]);
    let fd = fs.open("/alias").unwrap();
    assert_eq!(fs.stat(fd).unwrap().size, 12);
    fs.close(fd).unwrap();

    // The name is free again and refers to a brand-new empty file.
    let fd = fs.open("/original").unwrap();
    let stat = fs.stat(fd).unwrap();
    assert_ne!(stat.inode_id, inode_id);
    assert_eq!(stat.size, 0);

    // Tombstoned slots are not reused: the directory keeps growing.
    let root = fs.open_dir("/").unwrap();
    assert_eq!(fs.stat(root).unwrap().size, 3 * DIR_ENTRY_SIZE as u32);
}

#[test]
fn directory_append_is_all_or_nothing() {
    // 4 blocks of 512 bytes hold 7 whole entries; the 8th would straddle into a 5th block.
    let mut fs = mounted(134, 512);
    for i in 0..7 {
        let fd = fs.open(&format!("/n{}", i)).unwrap();
        fs.close(fd).unwrap();
    }
    assert_eq!(fs.open("/n7"), Err(Error::NoSpace));

    let root = fs.open_dir("/").unwrap();
    assert_eq!(fs.stat(root).unwrap().size, 7 * DIR_ENTRY_SIZE as u32);
    fs.close_dir(root).unwrap();
    assert_eq!(list(&mut fs, "/").len(), 7);

    // The inode reserved for the failed create was handed back.
    let disk = fs.device();
    assert_eq!(Inode::find_free(&*disk).unwrap(), Some(9));
}

#[test]
fn failed_create_reports_the_append_error() {
    common::init();
    let disk = Arc::new(FaultyDisk::new(134));
    let mut fs = FileSystem::new(Arc::clone(&disk));
    fs.format(512).unwrap();
    fs.mount().unwrap();
    for i in 0..7 {
        let fd = fs.open(&format!("/n{}", i)).unwrap();
        fs.close(fd).unwrap();
    }

    // The new inode, the partial entry, the grown size and its rollback get
    // through; handing the inode back does not.
    disk.fail_writes_after(4);
    assert_eq!(fs.open("/n7"), Err(Error::NoSpace));
    disk.heal();

    assert_eq!(Inode::load(&*disk, 9).unwrap().ftype, FileType::Regular);
    assert_eq!(Inode::load(&*disk, ROOT_INODE).unwrap().size, 7 * DIR_ENTRY_SIZE as u32);
}

#[test]
fn append_then_scan() {
    let mut fs = mounted(8192, 1024);
    let disk = fs.device();
    let sb = *fs.superblock().unwrap();
    let mut root = Inode::load(&*disk, ROOT_INODE).unwrap();

    for (i, name) in ["alpha", "beta", "gamma"].iter().enumerate() {
        let entry = DirEntry::new(10 + i as u32, name.as_bytes()).unwrap();
        dir_add_entry(&*disk, &sb, &mut root, &entry).unwrap();
        assert_eq!(dir_lookup(&*disk, &sb, &root, name.as_bytes()).unwrap(), Some(10 + i as u32));
    }
    assert_eq!(root.size, 3 * DIR_ENTRY_SIZE as u32);
    assert_eq!(dir_lookup(&*disk, &sb, &root, b"delta").unwrap(), None);

    // The size change was persisted.
    assert_eq!(Inode::load(&*disk, ROOT_INODE).unwrap().size, root.size);

    let file = Inode::new(40, FileType::Regular, 1);
    assert_eq!(dir_lookup(&*disk, &sb, &file, b"alpha"), Err(Error::WrongType));
    fs.unmount().unwrap();
}

#[test]
fn allocations_are_exclusive() {
    let mut fs = mounted(8192, 2048);
    let fd = fs.open("/owner").unwrap();
    fs.write(fd, &pattern(5000)).unwrap();
    fs.close(fd).unwrap();

    let disk = fs.device();
    let sb = *fs.superblock().unwrap();
    let root = Inode::load(&*disk, ROOT_INODE).unwrap();
    let file = Inode::load(&*disk, 2).unwrap();
    let mut owned = vec![root.block_addr(&*disk, &sb, 0).unwrap().unwrap()];
    for logical in 0..file.blocks {
        owned.push(file.block_addr(&*disk, &sb, logical).unwrap().unwrap());
    }
    for &addr in &owned {
        assert!(is_allocated(&*disk, &sb, addr).unwrap());
    }

    let a = alloc_block(&*disk, &sb).unwrap().unwrap();
    let b = alloc_block(&*disk, &sb).unwrap().unwrap();
    assert_ne!(a, b);
    assert!(!owned.contains(&a) && !owned.contains(&b));
    assert!(is_allocated(&*disk, &sb, a).unwrap());
    assert_eq!((b - sb.data_start_sector) % sb.sectors_per_block(), 0);
}

#[test]
fn driver_entry_points() {
    common::init();
    let mut driver: Box<dyn FsDriver> = Box::new(FileSystem::new(Arc::new(RamDisk::new(8192))));
    assert_eq!(driver.fs_name(), FS_NAME);
    assert!(driver.format(1024).unwrap() > 0);
    assert_eq!(driver.xmount(true), Ok(()));

    let fd = driver.open("/via-driver").unwrap();
    assert_eq!(driver.write(fd, b"dispatch").unwrap(), 8);
    driver.close(fd).unwrap();

    let dir = driver.open_dir("/").unwrap();
    let entry = driver.read_dir(dir).unwrap().unwrap();
    assert!(entry.name_eq_str("via-driver"));
    assert_eq!(driver.read_dir(dir).unwrap(), None);
    driver.link(dir, "second", entry.inode_id).unwrap();
    driver.unlink(dir, "via-driver").unwrap();
    driver.close_dir(dir).unwrap();

    let fd = driver.open("/second").unwrap();
    let mut buf = [0u8; 8];
    assert_eq!(driver.read(fd, &mut buf).unwrap(), 8);
    assert_eq!(&buf, b"dispatch");
    driver.close(fd).unwrap();

    assert!(driver.is_idle());
    assert_eq!(driver.xmount(false), Ok(()));
}
