use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
pub struct Cli {
    /// Image file to create
    #[arg(long, short = 'O')]
    pub image: PathBuf,

    /// Device size in blocks
    #[arg(long, short, default_value_t = 2048)]
    pub blocks: u32,

    /// Directory of files to pack into the root directory
    #[arg(long, short)]
    pub source: Option<PathBuf>,
}
