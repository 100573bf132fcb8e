use std::mem;
use std::sync::{Arc, Mutex};

use block_dev::BlockDevice;
use chain_fs::{
    BlockId, BlockInfo, ChainFileSystem, DirEntry, DiskInode, Error, InodeKind, BLOCK_DATA_SIZE,
    BLOCK_SIZE, INODE_DATA_SIZE,
};

/// 测试用的内存块设备
struct MemDisk(Mutex<Vec<u8>>);

impl MemDisk {
    fn new(blocks: usize) -> Arc<Self> {
        Arc::new(Self(Mutex::new(vec![0; blocks * BLOCK_SIZE])))
    }
}

impl BlockDevice for MemDisk {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) {
        let data = self.0.lock().unwrap();
        buf.copy_from_slice(&data[block_id * BLOCK_SIZE..(block_id + 1) * BLOCK_SIZE]);
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) {
        let mut data = self.0.lock().unwrap();
        data[block_id * BLOCK_SIZE..(block_id + 1) * BLOCK_SIZE].copy_from_slice(buf);
    }
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 251) as u8).collect()
}

#[test]
fn block_layout() {
    assert_eq!(BLOCK_SIZE, mem::size_of::<DiskInode>());
    assert_eq!(DirEntry::SIZE, mem::size_of::<DirEntry>());
    assert_eq!(BLOCK_SIZE, 1 + BLOCK_DATA_SIZE + 4);
}

#[test]
fn resolve_returns_assigned_across_segments() {
    // 130 个 inode 号，跨进地址表链的第二段
    let cfs = ChainFileSystem::format(MemDisk::new(300), 300);
    let mut cfs = cfs.lock();

    let mut mapped = Vec::new();
    for expected in 1..131 {
        let ino = cfs.alloc_ino().unwrap();
        assert_eq!(ino, expected);
        let block = cfs.alloc_block().unwrap();
        cfs.assign(ino, block);
        cfs.write_inode(&DiskInode::new(ino, InodeKind::Regular, 0o644));
        mapped.push((ino, block));
    }

    for (ino, block) in mapped {
        assert_eq!(cfs.resolve(ino), block);
    }
}

#[test]
fn alloc_block_skips_claimed_blocks() {
    let cfs = ChainFileSystem::format(MemDisk::new(16), 16);
    let mut cfs = cfs.lock();

    let a = cfs.alloc_block().unwrap();
    assert!(matches!(cfs.inspect(a), BlockInfo::Empty));

    // 占用后不再被选中
    let ino = cfs.alloc_ino().unwrap();
    cfs.assign(ino, a);
    cfs.write_inode(&DiskInode::new(ino, InodeKind::Regular, 0o644));

    let b = cfs.alloc_block().unwrap();
    assert_ne!(a, b);
    assert!(matches!(cfs.inspect(b), BlockInfo::Empty));
}

fn roundtrip(len: usize) {
    let cfs = ChainFileSystem::format(MemDisk::new(64), 64);
    let root = ChainFileSystem::root_inode(&cfs);
    let file = root.create("blob").unwrap();

    let data = pattern(len);
    assert_eq!(file.write_at(0, &data), len);

    let mut back = vec![0u8; len];
    assert_eq!(file.read_at(0, &mut back), len);
    assert_eq!(back, data);
    assert_eq!(file.stat().size, len as u64);
}

#[test]
fn roundtrip_empty() {
    roundtrip(0);
}

#[test]
fn roundtrip_inline_exactly() {
    roundtrip(INODE_DATA_SIZE);
}

#[test]
fn roundtrip_one_overflow_block() {
    roundtrip(INODE_DATA_SIZE + BLOCK_DATA_SIZE);
}

#[test]
fn roundtrip_multi_block_chain() {
    roundtrip(INODE_DATA_SIZE + 3 * BLOCK_DATA_SIZE + 1);
}

#[test]
fn dealloc_chain_is_idempotent() {
    let cfs = ChainFileSystem::format(MemDisk::new(64), 64);
    let root = ChainFileSystem::root_inode(&cfs);

    let keep = root.create("keep").unwrap();
    assert_eq!(keep.write_at(0, &vec![0xAB; 600]), 600);

    let tmp = root.create("tmp").unwrap();
    assert_eq!(tmp.write_at(0, &vec![0xCD; 600]), 600);
    let head = cfs.lock().resolve(tmp.ino());

    root.unlink_at("tmp").unwrap();
    assert!(matches!(cfs.lock().inspect(head), BlockInfo::Empty));

    // 链头已经空了：重复回收不得殃及邻居
    cfs.lock().dealloc_chain(head);

    let mut back = vec![0u8; 600];
    assert_eq!(keep.read_at(0, &mut back), 600);
    assert!(back.iter().all(|&b| b == 0xAB));
}

#[test]
fn add_then_remove_restores_entry_count() {
    let cfs = ChainFileSystem::format(MemDisk::new(64), 64);
    let root = ChainFileSystem::root_inode(&cfs);

    root.create("a").unwrap();
    let before = root.entries().len();

    root.create("x").unwrap();
    assert_eq!(root.entries().len(), before + 1);

    root.unlink_at("x").unwrap();
    assert_eq!(root.entries().len(), before);
    assert!(root.find("x").is_none());
}

#[test]
fn remove_compacts_by_swapping_in_the_last_entry() {
    let cfs = ChainFileSystem::format(MemDisk::new(64), 64);
    let root = ChainFileSystem::root_inode(&cfs);

    root.create("A").unwrap();
    root.create("B").unwrap();
    root.create("C").unwrap();

    root.unlink_at("A").unwrap();

    let names: Vec<String> = root.ls();
    assert_eq!(names, ["C", "B"]);
}

#[test]
fn hard_links_share_content_and_count() {
    let cfs = ChainFileSystem::format(MemDisk::new(64), 64);
    let root = ChainFileSystem::root_inode(&cfs);

    let f = root.create("f").unwrap();
    assert_eq!(f.write_at(0, b"hello"), 5);

    root.link_at("f", "g").unwrap();
    let g = root.find("g").unwrap();
    assert_eq!(g.ino(), f.ino());
    assert_eq!(g.stat().links, 2);

    root.unlink_at("f").unwrap();
    assert!(root.find("f").is_none());

    let mut back = [0u8; 5];
    assert_eq!(g.read_at(0, &mut back), 5);
    assert_eq!(&back, b"hello");
    assert_eq!(g.stat().links, 1);
}

#[test]
fn directory_errors() {
    let cfs = ChainFileSystem::format(MemDisk::new(64), 64);
    let root = ChainFileSystem::root_inode(&cfs);

    root.create("f").unwrap();
    assert_eq!(root.create("f").unwrap_err(), Error::AlreadyExists);
    assert_eq!(root.unlink_at("nope").unwrap_err(), Error::NotFound);
    assert_eq!(root.rmdir("f").unwrap_err(), Error::NotADirectory);

    let d = root.mkdir("d").unwrap();
    assert_eq!(root.unlink_at("d").unwrap_err(), Error::IsADirectory);

    d.create("child").unwrap();
    assert_eq!(root.rmdir("d").unwrap_err(), Error::DirectoryNotEmpty);

    d.unlink_at("child").unwrap();
    root.rmdir("d").unwrap();
    assert!(root.find("d").is_none());
}

#[test]
fn write_truncates_silently_when_out_of_blocks() {
    // 4 块：表、根目录、inode 块，只剩 1 块给数据链
    let cfs = ChainFileSystem::format(MemDisk::new(4), 4);
    let root = ChainFileSystem::root_inode(&cfs);
    let file = root.create("big").unwrap();

    let data = vec![0x5A; 2000];
    let written = file.write_at(0, &data);
    assert_eq!(written, INODE_DATA_SIZE + BLOCK_DATA_SIZE);
    assert_eq!(file.stat().size, written as u64);

    let mut back = vec![0u8; 2000];
    assert_eq!(file.read_at(0, &mut back), written);
    assert_eq!(&back[..written], &data[..written]);
}

#[test]
fn exhaustion_errors_are_distinct() {
    // 目录项还放得下，但数据块耗尽：create 报 NoFreeBlocks
    let cfs = ChainFileSystem::format(MemDisk::new(4), 4);
    let root = ChainFileSystem::root_inode(&cfs);
    root.create("a").unwrap();
    root.create("b").unwrap();
    assert_eq!(root.create("c").unwrap_err(), Error::NoFreeBlocks);

    // 地址表占满且无块可扩链：报 NoFreeInodes
    let cfs = ChainFileSystem::format(MemDisk::new(3), 3);
    let mut cfs = cfs.lock();
    for ino in 1..125 {
        cfs.assign(ino, BlockId::new(2));
    }
    cfs.write_inode(&DiskInode::new(124, InodeKind::Regular, 0o644));
    assert_eq!(cfs.alloc_ino().unwrap_err(), Error::NoFreeInodes);
}

#[test]
fn end_to_end_sixteen_block_device() {
    let cfs = ChainFileSystem::format(MemDisk::new(16), 16);
    let root = ChainFileSystem::root_inode(&cfs);
    assert!(root.entries().is_empty());

    let file = root.create("foo.txt").unwrap();
    let data: Vec<u8> = (0..1000).map(|i| (i % 256) as u8).collect();
    assert_eq!(file.write_at(0, &data), 1000);

    let mut back = vec![0u8; 1000];
    assert_eq!(file.read_at(0, &mut back), 1000);
    assert_eq!(back, data);

    // 记下整条链（inode 块 + 两个数据块）
    let mut touched = vec![cfs.lock().resolve(file.ino())];
    loop {
        let next = match cfs.lock().inspect(*touched.last().unwrap()) {
            BlockInfo::Inode { next, .. } | BlockInfo::Data { next } => next,
            info => panic!("unexpected block in chain: {info:?}"),
        };
        match next.validate() {
            Some(id) => touched.push(id),
            None => break,
        }
    }
    assert_eq!(touched.len(), 3);

    root.unlink_at("foo.txt").unwrap();
    assert!(root.entries().is_empty());
    for id in touched {
        assert!(matches!(cfs.lock().inspect(id), BlockInfo::Empty));
    }
}
