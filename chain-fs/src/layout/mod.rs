//! # 磁盘数据结构层
//!
//! 设备被视作定长块的数组，块之间的"指针"是普通的块编号，
//! 保留值 [`BlockId::SENTINEL`]（全 1）表示"未分配 / 链尾"。
//! 每个块首字节是模式标签，区分空块、表块、inode 块与数据块。
//!
//! 所有结构都是 `#[repr(C)]` 且恰好 [`BLOCK_SIZE`] 字节，
//! 多字节整数按小端序落盘（镜像不可跨字节序移植）。

mod data;
mod dir_entry;
mod inode;
mod table;

pub use self::{
    data::{DataBlock, BLOCK_DATA_SIZE},
    dir_entry::{DirEntry, NAME_MAX_LEN},
    inode::{DiskInode, InodeKind, INODE_DATA_SIZE},
    table::{TableBlock, TABLE_ENTRY_COUNT},
};

use enumflags2::bitflags;

use crate::BLOCK_SIZE;

/// 块编号
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct BlockId(u32);

/// 块模式标签
#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockMode {
    Empty = 0x01,
    Table = 0x02,
    Inode = 0x04,
    Data = 0x08,
}

impl BlockId {
    /// 未分配 / 链尾哨兵；合法设备上不会有这个编号的块
    pub const SENTINEL: Self = Self(u32::MAX);

    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn is_sentinel(&self) -> bool {
        *self == Self::SENTINEL
    }

    /// 筛掉哨兵，留下真实的块编号
    #[inline]
    pub fn validate(self) -> Option<Self> {
        (!self.is_sentinel()).then_some(self)
    }
}

impl From<BlockId> for u32 {
    #[inline]
    fn from(id: BlockId) -> Self {
        id.0
    }
}

impl From<BlockId> for usize {
    #[inline]
    fn from(id: BlockId) -> Self {
        id.0 as usize
    }
}

/// 由 `next` 字段串起来的块
pub(crate) trait Chained {
    fn next(&self) -> BlockId;
    fn set_next(&mut self, next: BlockId);
}

const _: () = assert!(core::mem::size_of::<TableBlock>() == BLOCK_SIZE);
const _: () = assert!(core::mem::size_of::<DiskInode>() == BLOCK_SIZE);
const _: () = assert!(core::mem::size_of::<DataBlock>() == BLOCK_SIZE);
const _: () = assert!(core::mem::size_of::<DirEntry>() == DirEntry::SIZE);
