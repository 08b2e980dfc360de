use std::{fs::File, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;

use monofs::fs::Fs;
use monofs::storage::FileBackedStorage;

#[derive(Parser)]
struct Args {
    /// disk image file
    disk_file: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();

    let disk_file = File::options()
        .read(true)
        .open(&args.disk_file)
        .context("unable to open disk file")?;

    let fs = Fs::new(FileBackedStorage::new(disk_file))?;
    fs.check()?;

    println!("filesystem is consistent");

    Ok(())
}
