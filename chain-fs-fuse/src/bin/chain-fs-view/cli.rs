use clap::Parser;
use std::path::PathBuf;

/// Print a summary of every block in a chain-fs image
#[derive(Parser)]
pub struct Cli {
    /// Image file (or device) to inspect
    pub image: PathBuf,
}
