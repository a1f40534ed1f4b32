use fallible_iterator::FallibleIterator;
use clap::{Parser, Subcommand};
use memmap2::Mmap;

use std::fs::{read_link, symlink_metadata, File};
use std::io::{self, BufWriter, Write};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::process::exit;

use chrono::DateTime;
use cpio_stream::{Checksum, ChecksumHasher, FileMode, Header, Reader, Writer};

type Result<T> = anyhow::Result<T>;

#[derive(Parser)]
struct CmdArgs {
    #[clap(subcommand)]
    commands: Commands
}

#[derive(Subcommand)]
enum Commands {
    /// Create a cpio archive from a directory
    Ar {
        /// Path to the directory to archive
        directory_path: PathBuf,

        /// Output path for created archive
        output_path: PathBuf,

        /// Use the SVR4 CRC format (default is no CRC)
        #[clap(short='c', long, action)]
        crc: bool,
    },
    /// Extract a single file from a cpio archive
    Cat {
        /// Path to the cpio archive to read
        archive_path: PathBuf,

        /// Path to the file to extract
        internal_path: String,

        /// Skip junk bytes between entries
        #[clap(short='r', long, action)]
        robust: bool,
    },
    /// List the files in a cpio archive
    Ls {
        /// Path to the cpio archive to inspect
        archive_path: PathBuf,

        /// Skip junk bytes between entries
        #[clap(short='r', long, action)]
        robust: bool,

        /// Check the body of CRC entries against their checksum
        #[clap(short='v', long, action)]
        verify: bool,
    },
}

fn collect_files(dir: &PathBuf) -> Vec<PathBuf> {
    walkdir::WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .collect()
}

fn checksum_file(fs_path: &Path) -> Result<Checksum> {
    let mut hasher = ChecksumHasher::new();
    io::copy(&mut File::open(fs_path)?, &mut hasher)?;
    Ok(hasher.sum())
}

/// Build the archive header for a file on disk, without following symlinks
fn header_for(fs_path: &Path, internal_path: &str, crc: bool) -> Result<Header> {
    let meta = symlink_metadata(fs_path)?;

    let mut hdr = Header::new(internal_path, FileMode(meta.mode()), 0);
    hdr.uid = meta.uid();
    hdr.gid = meta.gid();
    hdr.links = meta.nlink() as u32;
    hdr.mod_time = DateTime::from_timestamp(meta.mtime(), 0).unwrap_or_default();

    if meta.is_symlink() {
        // for symlinks the target path goes where the file content would
        hdr.linkname = read_link(fs_path)?.as_os_str().as_bytes().to_vec();
        if crc {
            hdr.checksum = Checksum::of(&hdr.linkname);
        }
    } else if meta.is_file() {
        hdr.size = meta.len();
        if crc {
            hdr.checksum = checksum_file(fs_path)?;
        }
    }

    Ok(hdr)
}

fn archive_directory(directory_path: &PathBuf, output_path: &Path, crc: bool) -> Result<()> {
    let out_fp = File::create(output_path)?;
    let mut writer = Writer::new(BufWriter::new(out_fp));

    let files = collect_files(directory_path);
    for file in files {
        let Some(file_str) = file.to_str() else { continue };
        let Some(directory_path_str) = directory_path.to_str() else { continue };

        let internal_path = file_str
            .trim_start_matches(directory_path_str)
            .trim_start_matches('/');
        let internal_path = if internal_path.is_empty() {
            "."
        } else {
            internal_path
        };
        println!("{}", &internal_path);

        let mut hdr = header_for(&file, internal_path, crc)?;
        writer.write_header(&mut hdr)?;

        if hdr.is_regular() {
            io::copy(&mut File::open(&file)?, &mut writer)?;
        }
    }

    writer.close()?;
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(io::stderr)
        .init();

    let args = CmdArgs::parse();
    match args.commands {
        Commands::Ar { directory_path, output_path, crc } => {
            archive_directory(&directory_path, &output_path, crc)?;
        },
        Commands::Ls { archive_path, robust, verify } => {
            let archive = File::open(archive_path)?;
            let mmap = unsafe { Mmap::map(&archive) }?;

            let mut reader = Reader::new(&mmap[..])
                .robust(robust)
                .verify_checksums(verify);

            while let Some(file) = reader.next()? {
                if file.is_symlink() {
                    println!(
                        "{} {:>2} {:>4} {:>4} {:>8} {} -> {}",
                        file.mode,
                        file.links,
                        file.uid,
                        file.gid,
                        file.linkname.len(),
                        file.name_lossy(),
                        file.linkname_lossy(),
                    );
                } else {
                    println!(
                        "{} {:>2} {:>4} {:>4} {:>8} {}",
                        file.mode,
                        file.links,
                        file.uid,
                        file.gid,
                        file.size,
                        file.name_lossy(),
                    );
                }
            }
        },
        Commands::Cat { archive_path, internal_path, robust } => {
            let archive = File::open(archive_path)?;
            let mmap = unsafe { Mmap::map(&archive) }?;

            let mut reader = Reader::new(&mmap[..]).robust(robust);
            while let Some(file) = reader.next()? {
                let name = file.name.strip_prefix(b"./").unwrap_or(&file.name[..]);
                if name != internal_path.as_bytes() {
                    continue;
                }

                if !file.is_regular() {
                    eprintln!("Cat is only supported for regular files!");
                    exit(1);
                }

                let mut stdout = io::stdout().lock();
                io::copy(&mut reader, &mut stdout)?;
                stdout.flush()?;
                return Ok(())
            }
            eprintln!("No file found in archive for path: '{internal_path}'");
            exit(1);
        },
    }

    Ok(())
}
