mod cli;

use std::fs::OpenOptions;
use std::io;
use std::sync::Arc;
use std::sync::Mutex;

use chain_fs::{BlockId, BlockInfo, ChainFileSystem};
use chain_fs_fuse::BlockFile;
use clap::Parser;
use cli::Cli;

fn main() -> io::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let fd = OpenOptions::new().read(true).write(true).open(&cli.image)?;
    let cfs = ChainFileSystem::open(Arc::new(BlockFile(Mutex::new(fd))));
    let cfs = cfs.lock();

    println!("device has {} blocks", cfs.total_blocks());
    for k in 0..cfs.total_blocks() {
        match cfs.inspect(BlockId::new(k)) {
            BlockInfo::Empty => println!("{k:3}: empty block"),
            BlockInfo::Table { next } => {
                println!("{k:3}: inode table block : next is {}", fmt_next(next))
            }
            BlockInfo::Inode {
                ino,
                kind,
                links,
                size,
                next,
            } => println!(
                "{k:3}: inode {ino} : {kind:?} : {links} links : {size} bytes : next is {}",
                fmt_next(next)
            ),
            BlockInfo::Data { next } => {
                println!("{k:3}: data block : next is {}", fmt_next(next))
            }
            BlockInfo::Unknown => println!("{k:3}: unrecognized mode tag"),
        }
    }

    Ok(())
}

fn fmt_next(next: BlockId) -> String {
    match next.validate() {
        Some(id) => format!("{}", u32::from(id)),
        None => String::from("unallocated"),
    }
}
