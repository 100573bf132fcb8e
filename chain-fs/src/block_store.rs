//! # 块存储层
//!
//! 不设缓存：每次读写都直达底层设备，
//! 按块整存整取 [`crate::layout`] 中的定长结构。

use alloc::sync::Arc;
use core::{mem, ptr, slice};

use block_dev::BlockDevice;

use crate::layout::BlockId;
use crate::BLOCK_SIZE;

/// 可整块读写的 512 字节结构
///
/// # Safety
///
/// 实现者必须是 `#[repr(C)]`、大小恰为 [`BLOCK_SIZE`]，
/// 且任意字节模式都是合法值。
pub(crate) unsafe trait RawBlock: Sized {
    fn zeroed() -> Self {
        unsafe { mem::zeroed() }
    }

    fn as_bytes(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(ptr::from_ref(self).cast(), BLOCK_SIZE) }
    }

    fn as_bytes_mut(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(ptr::from_mut(self).cast(), BLOCK_SIZE) }
    }
}

pub(crate) struct BlockStore {
    device: Arc<dyn BlockDevice>,
}

impl BlockStore {
    pub fn new(device: Arc<dyn BlockDevice>) -> Self {
        Self { device }
    }

    pub fn read<B: RawBlock>(&self, id: BlockId) -> B {
        log::trace!("readblock: {id:?}");
        let mut block = B::zeroed();
        self.device.read_block(id.into(), block.as_bytes_mut());
        block
    }

    pub fn write<B: RawBlock>(&self, id: BlockId, block: &B) {
        log::trace!("writeblock: {id:?}");
        self.device.write_block(id.into(), block.as_bytes());
    }
}
