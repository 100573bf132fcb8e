use enumflags2::BitFlags;

use super::{BlockId, BlockMode, Chained};
use crate::block_store::RawBlock;

/// 单个数据块的载荷容量
pub const BLOCK_DATA_SIZE: usize = 507;

/// 数据块：文件超出内联容量的部分存放在数据块的单向链上
#[repr(C)]
pub struct DataBlock {
    mode: u8,
    pub(crate) data: [u8; BLOCK_DATA_SIZE],
    pub next: BlockId,
}

impl DataBlock {
    /// 初始化为载荷全零的链尾数据块
    pub fn init(&mut self) {
        self.mode = BlockMode::Data as u8;
        self.data = [0; BLOCK_DATA_SIZE];
        self.next = BlockId::SENTINEL;
    }

    /// 回收：清空载荷并标记为空块
    pub fn reset(&mut self) {
        self.mode = BlockMode::Empty as u8;
        self.data = [0; BLOCK_DATA_SIZE];
        self.next = BlockId::SENTINEL;
    }

    #[inline]
    pub fn mode(&self) -> BitFlags<BlockMode> {
        BitFlags::from_bits_truncate(self.mode)
    }
}

impl Chained for DataBlock {
    #[inline]
    fn next(&self) -> BlockId {
        self.next
    }

    #[inline]
    fn set_next(&mut self, next: BlockId) {
        self.next = next;
    }
}

unsafe impl RawBlock for DataBlock {}
