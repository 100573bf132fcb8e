//! # 索引节点层
//!
//! 目录也是文件：其字节内容就是一列定宽目录项。
//! 本层把目录操作（建档、查找、链接、删除、列举）
//! 落到磁盘块管理器的整取整写上。

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::cmp::min;

use enumflags2::bitflags;
use spin::Mutex;

use crate::cfs::ChainFileSystem;
use crate::layout::{BlockId, DirEntry, DiskInode, InodeKind};
use crate::Error;

pub struct Inode {
    ino: u32,
    fs: Arc<Mutex<ChainFileSystem>>,
}

impl core::fmt::Debug for Inode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Inode").field("ino", &self.ino).finish()
    }
}

#[derive(Debug, Default)]
pub struct Stat {
    pub ino: u64,
    pub kind: StatKind,
    pub links: u32,
    pub size: u64,
}

#[allow(clippy::upper_case_acronyms)]
#[bitflags]
#[repr(u32)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatKind {
    DIR = 0o040000,
    #[default]
    FILE = 0o100000,
}

impl Inode {
    #[inline]
    pub fn new(ino: u32, fs: Arc<Mutex<ChainFileSystem>>) -> Self {
        Self { ino, fs }
    }

    #[inline]
    pub fn ino(&self) -> u32 {
        self.ino
    }

    /// 在当前目录下创建普通文件
    pub fn create(&self, name: &str) -> Result<Arc<Self>, Error> {
        self.make_node(name, InodeKind::Regular, 0o644)
    }

    /// 在当前目录下创建子目录
    pub fn mkdir(&self, name: &str) -> Result<Arc<Self>, Error> {
        self.make_node(name, InodeKind::Directory, 0o755)
    }

    /// 按名字查找子项；查无此名是正常结果而非错误
    pub fn find(&self, name: &str) -> Option<Arc<Self>> {
        let fs = self.fs.lock();
        let dir = fs.read_inode(self.ino);
        assert!(dir.is_dir());

        Self::lookup(&fs, &dir, name).map(|ino| Arc::new(Self::new(ino, self.fs.clone())))
    }

    /// 给 `name` 指向的 inode 再挂一条名为 `new_name` 的硬链接
    pub fn link_at(&self, name: &str, new_name: &str) -> Result<(), Error> {
        let mut fs = self.fs.lock();
        let mut dir = fs.read_inode(self.ino);
        assert!(dir.is_dir());

        if Self::lookup(&fs, &dir, new_name).is_some() {
            return Err(Error::AlreadyExists);
        }
        let ino = Self::lookup(&fs, &dir, name).ok_or(Error::NotFound)?;

        Self::append_entry(&mut fs, &mut dir, new_name, ino)?;

        let mut inode = fs.read_inode(ino);
        inode.links += 1;
        fs.write_inode(&inode);
        Ok(())
    }

    /// 删除一条指向普通文件的目录项；
    /// 最后一条硬链接消失时销毁 inode 并回收整条数据链
    pub fn unlink_at(&self, name: &str) -> Result<(), Error> {
        let mut fs = self.fs.lock();
        let mut dir = fs.read_inode(self.ino);
        assert!(dir.is_dir());

        let ino = Self::lookup(&fs, &dir, name).ok_or(Error::NotFound)?;
        if fs.read_inode(ino).is_dir() {
            return Err(Error::IsADirectory);
        }

        Self::unlink_locked(&mut fs, &mut dir, name)
    }

    /// 删除一个空子目录
    pub fn rmdir(&self, name: &str) -> Result<(), Error> {
        let mut fs = self.fs.lock();
        let mut dir = fs.read_inode(self.ino);
        assert!(dir.is_dir());

        let ino = Self::lookup(&fs, &dir, name).ok_or(Error::NotFound)?;
        let target = fs.read_inode(ino);
        if !target.is_dir() {
            return Err(Error::NotADirectory);
        }
        if target.size != 0 {
            log::debug!("directory {name:?} still has {} entries", target.size as usize / DirEntry::SIZE);
            return Err(Error::DirectoryNotEmpty);
        }

        Self::unlink_locked(&mut fs, &mut dir, name)
    }

    /// 从指定偏移读出文件内容，返回读到的字节数
    pub fn read_at(&self, offset: usize, buf: &mut [u8]) -> usize {
        let fs = self.fs.lock();
        let inode = fs.read_inode(self.ino);
        if inode.is_dir() {
            log::warn!("refusing raw read of directory ino {}", self.ino);
            return 0;
        }

        let size = inode.size as usize;
        if offset >= size || buf.is_empty() {
            return 0;
        }

        let data = fs.map_data(&inode, 0);
        let n = min(size - offset, buf.len());
        buf[..n].copy_from_slice(&data[offset..offset + n]);
        n
    }

    /// 从指定偏移写入文件内容（只允许写在现有内容之内或紧随其后），
    /// 返回实际持久化的字节数；设备空间不足时会短写。
    pub fn write_at(&self, offset: usize, buf: &[u8]) -> usize {
        let mut fs = self.fs.lock();
        let mut inode = fs.read_inode(self.ino);
        if inode.is_dir() {
            log::warn!("refusing raw write of directory ino {}", self.ino);
            return 0;
        }

        let size = inode.size as usize;
        if offset > size || buf.is_empty() {
            return 0;
        }

        let extra = (offset + buf.len()).saturating_sub(size);
        let mut data = fs.map_data(&inode, extra);
        data[offset..offset + buf.len()].copy_from_slice(buf);

        let written = fs.write_data(&mut inode, &data, size + extra);
        min(written.saturating_sub(offset), buf.len())
    }

    /// 列举目录项（跳过洞），按槽位顺序给出 (名字, inode 号)
    pub fn entries(&self) -> Vec<(String, u32)> {
        let fs = self.fs.lock();
        let dir = fs.read_inode(self.ino);
        assert!(dir.is_dir());

        let data = fs.map_data(&dir, 0);
        let count = dir.size as usize / DirEntry::SIZE;
        let mut entry = DirEntry::default();
        let mut out = Vec::with_capacity(count);

        for k in 0..count {
            entry
                .as_bytes_mut()
                .copy_from_slice(&data[k * DirEntry::SIZE..(k + 1) * DirEntry::SIZE]);
            if !entry.is_hole() {
                out.push((String::from(entry.name()), entry.ino()));
            }
        }

        out
    }

    pub fn ls(&self) -> Vec<String> {
        self.entries().into_iter().map(|(name, _)| name).collect()
    }

    pub fn stat(&self) -> Stat {
        let fs = self.fs.lock();
        let inode = fs.read_inode(self.ino);
        Stat {
            ino: inode.ino as u64,
            kind: if inode.is_dir() {
                StatKind::DIR
            } else {
                StatKind::FILE
            },
            links: inode.links as u32,
            size: inode.size as u64,
        }
    }
}

impl Inode {
    fn make_node(&self, name: &str, kind: InodeKind, perm: u16) -> Result<Arc<Self>, Error> {
        let mut fs = self.fs.lock();
        let mut dir = fs.read_inode(self.ino);
        assert!(dir.is_dir());

        if Self::lookup(&fs, &dir, name).is_some() {
            return Err(Error::AlreadyExists);
        }

        let ino = fs.alloc_ino()?;
        let block = fs.alloc_block().ok_or(Error::NoFreeBlocks)?;
        fs.assign(ino, block);
        fs.write_inode(&DiskInode::new(ino, kind, perm));

        if let Err(e) = Self::append_entry(&mut fs, &mut dir, name, ino) {
            // 没地方放目录项：退掉刚分配的 inode
            fs.assign(ino, BlockId::SENTINEL);
            fs.dealloc_chain(block);
            return Err(e);
        }

        Ok(Arc::new(Self::new(ino, self.fs.clone())))
    }

    /// 在目录数据里线性扫描名字，返回命中的 inode 号
    fn lookup(fs: &ChainFileSystem, dir: &DiskInode, name: &str) -> Option<u32> {
        let data = fs.map_data(dir, 0);
        let count = dir.size as usize / DirEntry::SIZE;
        let mut entry = DirEntry::default();

        for k in 0..count {
            entry
                .as_bytes_mut()
                .copy_from_slice(&data[k * DirEntry::SIZE..(k + 1) * DirEntry::SIZE]);
            if !entry.is_hole() && entry.name() == name {
                return Some(entry.ino());
            }
        }

        None
    }

    /// 在目录末尾追加一条目录项并写回。
    /// 短写意味着设备装不下新目录项：退回原有条目数，
    /// 保证目录大小始终是条目宽度的整数倍。
    fn append_entry(
        fs: &mut ChainFileSystem,
        dir: &mut DiskInode,
        name: &str,
        ino: u32,
    ) -> Result<(), Error> {
        let count = dir.size as usize / DirEntry::SIZE;
        let mut data = fs.map_data(dir, DirEntry::SIZE);

        let entry = DirEntry::new(name, ino);
        data[count * DirEntry::SIZE..].copy_from_slice(entry.as_bytes());

        let target = (count + 1) * DirEntry::SIZE;
        if fs.write_data(dir, &data, target) < target {
            fs.write_data(dir, &data, count * DirEntry::SIZE);
            return Err(Error::NoFreeBlocks);
        }
        Ok(())
    }

    /// 末项换入被删槽位再清掉末槽（被删的就是末项时退化为清零），
    /// 目录大小缩一格；剩余条目的顺序不保持。
    fn remove_entry(fs: &mut ChainFileSystem, dir: &mut DiskInode, name: &str) -> Option<u32> {
        let count = dir.size as usize / DirEntry::SIZE;
        let mut data = fs.map_data(dir, 0);
        let mut entry = DirEntry::default();

        let slot = (0..count).find(|&k| {
            entry
                .as_bytes_mut()
                .copy_from_slice(&data[k * DirEntry::SIZE..(k + 1) * DirEntry::SIZE]);
            !entry.is_hole() && entry.name() == name
        })?;
        let ino = entry.ino();

        let last = count - 1;
        let last_bytes: Vec<u8> = data[last * DirEntry::SIZE..(last + 1) * DirEntry::SIZE].to_vec();
        data[slot * DirEntry::SIZE..(slot + 1) * DirEntry::SIZE].copy_from_slice(&last_bytes);
        data[last * DirEntry::SIZE..(last + 1) * DirEntry::SIZE].fill(0);

        fs.write_data(dir, &data, last * DirEntry::SIZE);
        Some(ino)
    }

    fn unlink_locked(
        fs: &mut ChainFileSystem,
        dir: &mut DiskInode,
        name: &str,
    ) -> Result<(), Error> {
        let ino = Self::remove_entry(fs, dir, name).ok_or(Error::NotFound)?;

        let mut inode = fs.read_inode(ino);
        inode.links -= 1;
        if inode.links == 0 {
            log::debug!("ino {ino} has no links left, destroying it");
            // 撤销地址表映射，连 inode 块自身一起回收整条链
            let head = fs.resolve(ino);
            fs.assign(ino, BlockId::SENTINEL);
            fs.dealloc_chain(head);
        } else {
            fs.write_inode(&inode);
        }
        Ok(())
    }
}
