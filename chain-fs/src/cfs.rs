//! # 磁盘块管理器层
//!
//! inode 地址表的寻址、空闲块/空闲 inode 号的分配、
//! 链式文件数据的整取整写与回收都在这里。
//!
//! 这些操作全是对共享磁盘结构的多步读改写序列，
//! 必须在同一把锁内完成，因此 [`ChainFileSystem`]
//! 总是包在 `Arc<Mutex<_>>` 里使用；"找到空块"与"占用它"
//! 由同一次持锁保证原子。

use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use core::cmp::min;

use block_dev::BlockDevice;
use enumflags2::BitFlags;
use spin::Mutex;

use crate::block_store::{BlockStore, RawBlock};
use crate::layout::{
    BlockId, BlockMode, Chained, DataBlock, DiskInode, InodeKind, TableBlock, BLOCK_DATA_SIZE,
    INODE_DATA_SIZE, TABLE_ENTRY_COUNT,
};
use crate::vfs::Inode;
use crate::Error;

/// 地址表链头的固定位置
pub const TABLE_BLOCK_ID: BlockId = BlockId::new(0);
/// 根目录 inode 块的固定位置（格式化约定）
pub const ROOT_DIR_BLOCK_ID: BlockId = BlockId::new(1);
/// 根目录的 inode 号
pub const ROOT_INO: u32 = 0;

pub struct ChainFileSystem {
    store: BlockStore,
    total_blocks: u32,
}

/// 诊断用的块概要，见 [`ChainFileSystem::inspect`]
#[derive(Debug)]
pub enum BlockInfo {
    Empty,
    Table {
        next: BlockId,
    },
    Inode {
        ino: u32,
        kind: BitFlags<InodeKind>,
        links: u8,
        size: u32,
        next: BlockId,
    },
    Data {
        next: BlockId,
    },
    Unknown,
}

impl ChainFileSystem {
    /// 在设备上写出一个空文件系统：
    /// 块 0 为地址表链头（条目 0 指向根目录），
    /// 块 1 为空的根目录 inode，其余全部置空。
    pub fn format(device: Arc<dyn BlockDevice>, total_blocks: u32) -> Arc<Mutex<Self>> {
        assert!(total_blocks >= 2, "device too small for table and root");
        log::debug!("formatting device with {total_blocks} blocks");
        let store = BlockStore::new(device);

        let mut table = TableBlock::zeroed();
        table.init(total_blocks);
        table.entries[0] = ROOT_DIR_BLOCK_ID;
        store.write(TABLE_BLOCK_ID, &table);

        let root = DiskInode::new(ROOT_INO, InodeKind::Directory, 0o755);
        store.write(ROOT_DIR_BLOCK_ID, &root);

        let mut empty = DataBlock::zeroed();
        empty.reset();
        for k in 2..total_blocks {
            store.write(BlockId::new(k), &empty);
        }

        Arc::new(Mutex::new(Self {
            store,
            total_blocks,
        }))
    }

    /// 挂载一个已格式化的设备，从链头读出设备总块数
    pub fn open(device: Arc<dyn BlockDevice>) -> Arc<Mutex<Self>> {
        let store = BlockStore::new(device);
        let head: TableBlock = store.read(TABLE_BLOCK_ID);
        assert!(
            head.mode().contains(BlockMode::Table),
            "block 0 is not a table block"
        );
        log::debug!("opened device with {} blocks", head.total_blocks);

        Arc::new(Mutex::new(Self {
            total_blocks: head.total_blocks,
            store,
        }))
    }

    pub fn root_inode(fs: &Arc<Mutex<Self>>) -> Inode {
        Inode::new(ROOT_INO, fs.clone())
    }

    #[inline]
    pub fn total_blocks(&self) -> u32 {
        self.total_blocks
    }
}

/* inode 地址表 */

impl ChainFileSystem {
    /// 查出 inode 号对应的 inode 块编号；未映射时返回哨兵
    pub fn resolve(&self, ino: u32) -> BlockId {
        let (table, _, entry) = self.walk_table(ino);
        table.entries[entry]
    }

    /// 改写 inode 号对应的条目，只落盘被改的那一个表块
    pub fn assign(&mut self, ino: u32, block: BlockId) {
        let (mut table, table_id, entry) = self.walk_table(ino);
        log::debug!("assigning ino {ino} -> {block:?}");
        table.entries[entry] = block;
        self.store.write(table_id, &table);
    }

    /// 沿表链走到 inode 号所在的段
    fn walk_table(&self, ino: u32) -> (TableBlock, BlockId, usize) {
        let mut hops = ino as usize / TABLE_ENTRY_COUNT;
        let entry = ino as usize % TABLE_ENTRY_COUNT;

        let mut table_id = TABLE_BLOCK_ID;
        let mut table: TableBlock = self.store.read(table_id);
        while hops > 0 {
            // 号码只出自分配器，链一定够长
            assert!(!table.next.is_sentinel(), "ino {ino} beyond the table chain");
            table_id = table.next;
            table = self.store.read(table_id);
            hops -= 1;
        }

        (table, table_id, entry)
    }

    pub fn read_inode(&self, ino: u32) -> DiskInode {
        let id = self.resolve(ino);
        assert!(!id.is_sentinel(), "ino {ino} is not mapped");
        self.store.read(id)
    }

    pub fn write_inode(&mut self, inode: &DiskInode) {
        let id = self.resolve(inode.ino);
        assert!(!id.is_sentinel(), "ino {} is not mapped", inode.ino);
        self.store.write(id, inode);
    }
}

/* 空闲空间分配 */

impl ChainFileSystem {
    /// 从块 0 起线性扫描，返回第一个空块。
    /// 调用方必须在同一次持锁内把块写成非空模式，否则会被再次选中。
    pub fn alloc_block(&mut self) -> Option<BlockId> {
        for k in 0..self.total_blocks {
            let id = BlockId::new(k);
            let block: DataBlock = self.store.read(id);
            if block.mode().contains(BlockMode::Empty) {
                log::debug!("block {k} is free");
                return Some(id);
            }
        }
        log::warn!("no empty blocks left");
        None
    }

    /// 找出第一个未分配的 inode 号。
    /// 表链全满时懒式挂一块新表到链尾；
    /// 连新表的块都领不到时报 [`Error::NoFreeInodes`]，
    /// 与数据块耗尽（静默截断）是两回事。
    pub fn alloc_ino(&mut self) -> Result<u32, Error> {
        let mut table_id = TABLE_BLOCK_ID;
        let mut table: TableBlock = self.store.read(table_id);
        let mut segment = 0;

        loop {
            if let Some(entry) = table.entries.iter().position(|e| e.is_sentinel()) {
                let ino = (segment * TABLE_ENTRY_COUNT + entry) as u32;
                log::debug!("ino {ino} is free");
                return Ok(ino);
            }
            match table.next.validate() {
                Some(next) => {
                    table_id = next;
                    table = self.store.read(table_id);
                    segment += 1;
                }
                None => break,
            }
        }

        log::debug!("table chain full, appending a new table block");
        let new_id = self.alloc_block().ok_or(Error::NoFreeInodes)?;
        table.next = new_id;
        self.store.write(table_id, &table);

        let mut new_table = TableBlock::zeroed();
        // 总块数字段只在链头有意义
        new_table.init(0);
        self.store.write(new_id, &new_table);

        Ok(((segment + 1) * TABLE_ENTRY_COUNT) as u32)
    }
}

/* 链式文件数据 */

impl ChainFileSystem {
    /// 把文件的全部字节（内联 + 数据链）整取进一块连续缓冲，
    /// 末尾附带 `extra` 字节的零填充供调用方追加。
    pub fn map_data(&self, inode: &DiskInode, extra: usize) -> Vec<u8> {
        let total = inode.size as usize + extra;
        log::debug!("mapping {}+{extra} bytes of ino {}", inode.size, inode.ino);
        let mut buf = vec![0u8; total];

        let n = min(INODE_DATA_SIZE, total);
        buf[..n].copy_from_slice(&inode.data[..n]);
        let mut pos = n;

        let mut next = inode.next;
        while let Some(id) = next.validate() {
            let block: DataBlock = self.store.read(id);
            let n = min(BLOCK_DATA_SIZE, total - pos);
            buf[pos..pos + n].copy_from_slice(&block.data[..n]);
            pos += n;
            next = block.next;
        }

        buf
    }

    /// 把 `buf` 的前 `target_size` 字节持久化为文件内容。
    ///
    /// 先按目标大小重推整条链的长度并补齐缺块；
    /// 途中领不到块就把有效 EOF 截到已保障的容量（静默截断，
    /// 不算错误）。然后从头重走一遍链，拷贝内联段和各块的载荷，
    /// 更新并落盘 inode 的大小。返回实际持久化的字节数。
    pub fn write_data(&mut self, inode: &mut DiskInode, buf: &[u8], target_size: usize) -> usize {
        debug_assert!(target_size <= buf.len());
        let inode_id = self.resolve(inode.ino);
        assert!(!inode_id.is_sentinel(), "ino {} is not mapped", inode.ino);
        log::debug!("writing {target_size} bytes to ino {}", inode.ino);

        let mut required = target_size
            .saturating_sub(INODE_DATA_SIZE)
            .div_ceil(BLOCK_DATA_SIZE);
        log::debug!("write needs {required} blocks beyond the inode block");

        let mut eof = target_size;
        if required > 0 {
            match self.alloc_next(inode, inode_id) {
                None => eof = INODE_DATA_SIZE,
                Some(first) => {
                    let mut covered = INODE_DATA_SIZE;
                    let mut cur_id = first;
                    let mut cur: DataBlock = self.store.read(cur_id);
                    required -= 1;

                    while required > 0 {
                        match self.alloc_next(&mut cur, cur_id) {
                            None => {
                                eof = covered + BLOCK_DATA_SIZE;
                                break;
                            }
                            Some(id) => {
                                covered += BLOCK_DATA_SIZE;
                                cur_id = id;
                                cur = self.store.read(cur_id);
                                required -= 1;
                            }
                        }
                    }
                }
            }
        }
        if eof < target_size {
            log::warn!("out of blocks, truncating write to {eof} bytes");
        }

        // 链已就位，从头拷贝数据
        let n = min(INODE_DATA_SIZE, eof);
        inode.data[..n].copy_from_slice(&buf[..n]);
        inode.size = eof as u32;
        self.store.write(inode_id, inode);
        let mut pos = n;

        if pos < eof {
            let mut cur_id = inode.next;
            let mut cur: DataBlock = self.store.read(cur_id);
            loop {
                let n = min(BLOCK_DATA_SIZE, eof - pos);
                cur.data[..n].copy_from_slice(&buf[pos..pos + n]);
                self.store.write(cur_id, &cur);
                pos += n;
                if pos == eof {
                    break;
                }
                cur_id = cur.next;
                cur = self.store.read(cur_id);
            }
        }

        pos
    }

    /// 取 `prev` 的后继：已有就直接复用，
    /// 没有就领一块空块，清零、标记为数据块并挂到 `prev` 之后。
    fn alloc_next<B: RawBlock + Chained>(&mut self, prev: &mut B, prev_id: BlockId) -> Option<BlockId> {
        if let Some(id) = prev.next().validate() {
            return Some(id);
        }

        let id = self.alloc_block()?;
        prev.set_next(id);
        self.store.write(prev_id, prev);

        let mut block = DataBlock::zeroed();
        block.init();
        self.store.write(id, &block);

        Some(id)
    }

    /// 回收从 `first` 起的整条链：逐块清零、标记为空，
    /// 直到某块回收前的 `next` 已是哨兵。
    /// 链头已经是空块（或 `first` 是哨兵）时按无操作处理，可重入。
    pub fn dealloc_chain(&mut self, first: BlockId) {
        log::debug!("deallocating chain from {first:?}");
        let mut cursor = first.validate();
        while let Some(id) = cursor {
            let mut block: DataBlock = self.store.read(id);
            if block.mode().contains(BlockMode::Empty) {
                break;
            }
            cursor = block.next.validate();
            block.reset();
            self.store.write(id, &block);
        }
    }
}

/* 诊断 */

impl ChainFileSystem {
    /// 按模式标签给出块的概要，供转储工具遍历设备用
    pub fn inspect(&self, id: BlockId) -> BlockInfo {
        let block: DataBlock = self.store.read(id);
        let mode = block.mode();

        if mode.contains(BlockMode::Empty) {
            BlockInfo::Empty
        } else if mode.contains(BlockMode::Table) {
            let table: TableBlock = self.store.read(id);
            BlockInfo::Table { next: table.next }
        } else if mode.contains(BlockMode::Inode) {
            let inode: DiskInode = self.store.read(id);
            BlockInfo::Inode {
                ino: inode.ino,
                kind: inode.kind(),
                links: inode.links,
                size: inode.size,
                next: inode.next,
            }
        } else if mode.contains(BlockMode::Data) {
            BlockInfo::Data { next: block.next }
        } else {
            BlockInfo::Unknown
        }
    }
}
