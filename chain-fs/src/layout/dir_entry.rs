use core::{ptr, slice};

/// 目录项名字的最大长度
pub const NAME_MAX_LEN: usize = 40;

/// 目录项：定宽的 (名字, inode 号) 对
///
/// 目录的字节内容就是一列紧密排布的目录项，
/// inode 号为 0 的槽位是洞。
#[derive(Debug, Clone)]
#[repr(C)]
pub struct DirEntry {
    // 最后一字节留给 \0
    name: [u8; NAME_MAX_LEN + 1],
    _pad: [u8; 3],
    ino: u32,
}

impl DirEntry {
    /// 目录项宽度恒为 48 字节
    pub const SIZE: usize = 48;

    pub fn new(name: &str, ino: u32) -> Self {
        let bytes = name.as_bytes();
        assert!(bytes.len() <= NAME_MAX_LEN);
        let mut name = [0; NAME_MAX_LEN + 1];
        name[..bytes.len()].copy_from_slice(bytes);

        Self {
            name,
            _pad: [0; 3],
            ino,
        }
    }

    pub fn name(&self) -> &str {
        let len = self.name.iter().position(|&c| c == 0).unwrap();
        core::str::from_utf8(&self.name[..len]).unwrap()
    }

    #[inline]
    pub fn ino(&self) -> u32 {
        self.ino
    }

    #[inline]
    pub fn is_hole(&self) -> bool {
        self.ino == 0
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(ptr::from_ref(self).cast(), Self::SIZE) }
    }

    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(ptr::from_mut(self).cast(), Self::SIZE) }
    }
}

impl Default for DirEntry {
    fn default() -> Self {
        Self {
            name: [0; NAME_MAX_LEN + 1],
            _pad: [0; 3],
            ino: 0,
        }
    }
}
