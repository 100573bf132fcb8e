/// 操作层面的错误。
///
/// 设备 I/O 故障不在此列：那是致命错误，由块设备驱动就地终止。
/// 数据链写入途中的空间耗尽也不在此列：写入会静默截断，
/// 以实际写入的字节数报告给调用方。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    AlreadyExists,
    NotFound,
    IsADirectory,
    NotADirectory,
    DirectoryNotEmpty,
    /// 设备上已无空块
    NoFreeBlocks,
    /// inode 地址表已满，且没有空块可以扩链
    NoFreeInodes,
}
