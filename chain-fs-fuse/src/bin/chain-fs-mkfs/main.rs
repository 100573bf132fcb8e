mod cli;

use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Read;
use std::sync::Arc;
use std::sync::Mutex;

use chain_fs::ChainFileSystem;
use chain_fs::BLOCK_SIZE;
use chain_fs_fuse::BlockFile;
use clap::Parser;
use cli::Cli;

fn main() -> io::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    println!("image={:?} blocks={}", cli.image, cli.blocks);

    let block_file = Arc::new(BlockFile(Mutex::new({
        let fd = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&cli.image)?;
        fd.set_len(cli.blocks as u64 * BLOCK_SIZE as u64)?;

        fd
    })));

    let cfs = ChainFileSystem::format(block_file, cli.blocks);
    let root = Arc::new(ChainFileSystem::root_inode(&cfs));

    let Some(source) = &cli.source else {
        return Ok(());
    };

    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let name = entry
            .file_name()
            .into_string()
            .expect("source file name is not valid UTF-8");

        let mut host_file = File::open(entry.path())?;
        let mut data: Vec<u8> = Vec::new();
        host_file.read_to_end(&mut data)?;

        let inode = root.create(&name).expect("packing file");
        let written = inode.write_at(0, &data);
        assert_eq!(written, data.len(), "image too small to pack {name:?}");
        log::info!("packed {name:?} ({written} bytes)");
    }

    Ok(())
}
