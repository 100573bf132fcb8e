#![no_std]

extern crate alloc;

/* chain-fs 的整体架构，自上而下 */

// 索引节点层：文件与目录操作
mod vfs;
pub use vfs::Inode;
pub use vfs::{Stat, StatKind};

// 磁盘块管理器层：inode 地址表、空闲块分配与链式文件数据
mod cfs;
pub use cfs::{BlockInfo, ChainFileSystem, ROOT_INO};

// 磁盘数据结构层：表示磁盘文件系统的数据结构
mod layout;
pub use layout::{
    BlockId, DirEntry, DiskInode, InodeKind, BLOCK_DATA_SIZE, INODE_DATA_SIZE, NAME_MAX_LEN,
    TABLE_ENTRY_COUNT,
};

// 块存储层：不设缓存，每次访问都直达设备
mod block_store;

mod error;
pub use error::Error;

pub const BLOCK_SIZE: usize = 512;
