use enumflags2::BitFlags;

use super::{BlockId, BlockMode, Chained};
use crate::block_store::RawBlock;

/// 单个表块的条目容量
pub const TABLE_ENTRY_COUNT: usize = 125;

/// inode 地址表块
///
/// inode 号 `n` 落在第 `n / 125` 段的第 `n % 125` 个条目上；
/// 段与段之间由 `next` 链接，块 0 恒为第 0 段（链头）。
#[repr(C)]
pub struct TableBlock {
    mode: u8,
    _pad: [u8; 3],
    /// 设备总块数，只在链头（块 0）中有意义
    pub total_blocks: u32,
    pub entries: [BlockId; TABLE_ENTRY_COUNT],
    pub next: BlockId,
}

impl TableBlock {
    pub fn init(&mut self, total_blocks: u32) {
        self.mode = BlockMode::Table as u8;
        self._pad = [0; 3];
        self.total_blocks = total_blocks;
        self.entries = [BlockId::SENTINEL; TABLE_ENTRY_COUNT];
        self.next = BlockId::SENTINEL;
    }

    #[inline]
    pub fn mode(&self) -> BitFlags<BlockMode> {
        BitFlags::from_bits_truncate(self.mode)
    }
}

impl Chained for TableBlock {
    #[inline]
    fn next(&self) -> BlockId {
        self.next
    }

    #[inline]
    fn set_next(&mut self, next: BlockId) {
        self.next = next;
    }
}

unsafe impl RawBlock for TableBlock {}
