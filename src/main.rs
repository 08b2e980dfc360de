use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::path::PathBuf;

use monofs::disk_format::block::DISK_SIZE;
use monofs::fs::Fs;
use monofs::fuse::MonoFuse;
use monofs::storage::FileBackedStorage;

#[derive(Parser)]
struct Args {
    /// disk image file (created and formatted if absent)
    disk_file: PathBuf,
    /// FUSE mountpoint
    mountpoint: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();

    let disk_file = File::options()
        .read(true)
        .write(true)
        .create(true)
        .open(&args.disk_file)
        .context("unable to open disk file in read-write mode")?;

    if disk_file
        .metadata()
        .context("reading disk file metadata")?
        .len()
        < DISK_SIZE as u64
    {
        disk_file
            .set_len(DISK_SIZE as u64)
            .context("sizing disk file")?;
    }

    let fs = Fs::new(FileBackedStorage::new(disk_file))?;
    let fuse = MonoFuse::new(fs)?;

    fuser::mount2(fuse, &args.mountpoint, &[]).context("mounting filesystem")?;

    Ok(())
}
