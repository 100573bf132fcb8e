use core::mem;

use enumflags2::{bitflags, BitFlags};

use super::{BlockId, BlockMode, Chained};
use crate::block_store::RawBlock;

/// inode 块的内联数据容量
pub const INODE_DATA_SIZE: usize = 483;

/// inode 块：元信息 + 文件的前 [`INODE_DATA_SIZE`] 字节
///
/// 文件大小 = 实际用到的内联字节 + 数据链各块用到的载荷字节之和；
/// `next` 指向第一块溢出数据块，放得下内联时为哨兵。
#[repr(C)]
pub struct DiskInode {
    mode: u8,
    _pad0: [u8; 3],
    pub ino: u32,
    kind: u8,
    _pad1: u8,
    pub perm: u16,
    pub uid: u16,
    pub gid: u16,
    /// 硬链接个数；归零时 inode 被销毁
    pub links: u8,
    _pad2: [u8; 3],
    pub size: u32,
    pub(crate) data: [u8; INODE_DATA_SIZE],
    _pad3: u8,
    pub next: BlockId,
}

/// inode 类型
#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeKind {
    Regular = 0x1,
    Directory = 0x2,
}

impl DiskInode {
    pub fn new(ino: u32, kind: InodeKind, perm: u16) -> Self {
        let mut inode: Self = unsafe { mem::zeroed() };
        inode.init(ino, kind, perm);
        inode
    }

    pub fn init(&mut self, ino: u32, kind: InodeKind, perm: u16) {
        *self = unsafe { mem::zeroed() };
        self.mode = BlockMode::Inode as u8;
        self.ino = ino;
        self.kind = kind as u8;
        self.perm = perm;
        self.links = 1;
        self.next = BlockId::SENTINEL;
    }

    #[inline]
    pub fn mode(&self) -> BitFlags<BlockMode> {
        BitFlags::from_bits_truncate(self.mode)
    }

    #[inline]
    pub fn kind(&self) -> BitFlags<InodeKind> {
        BitFlags::from_bits_truncate(self.kind)
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.kind().contains(InodeKind::Directory)
    }
}

impl Chained for DiskInode {
    #[inline]
    fn next(&self) -> BlockId {
        self.next
    }

    #[inline]
    fn set_next(&mut self, next: BlockId) {
        self.next = next;
    }
}

unsafe impl RawBlock for DiskInode {}
