use std::borrow::Cow;

use chrono::{DateTime, Utc};

use crate::checksum::Checksum;
use crate::mode::FileMode;
use crate::Error;

/// Metadata of a single archive entry.
///
/// `size` is the number of body bytes that follow the header in the stream.
/// For decoded symlinks the body is consumed into `linkname` and `size` is 0.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Header {
    pub device_id: u32,

    /// Identifies a file within one archive, entries sharing an inode are
    /// hard links of each other. Assigned by the [`Writer`](crate::Writer).
    pub inode: u64,

    pub mode: FileMode,
    pub uid: u32,
    pub gid: u32,

    /// Number of hard links
    pub links: u32,

    /// Modification time, seconds resolution
    pub mod_time: DateTime<Utc>,

    pub size: u64,

    /// Path inside the archive, without the trailing NUL. Not necessarily
    /// UTF-8.
    pub name: Vec<u8>,

    /// Symlink target, only set when `mode` is a symlink
    pub linkname: Vec<u8>,

    /// Only meaningful for the CRC variant
    pub checksum: Checksum,
}

impl Header {
    pub fn new(name: impl Into<Vec<u8>>, mode: FileMode, size: u64) -> Self {
        Header {
            name: name.into(),
            mode,
            size,
            ..Default::default()
        }
    }

    /// The name, if it is valid UTF-8
    pub fn name_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.name).ok()
    }

    /// The name for display, invalid sequences replaced
    pub fn name_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.name)
    }

    pub fn linkname_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.linkname)
    }

    pub fn is_dir(&self) -> bool {
        self.mode.is_dir()
    }

    pub fn is_regular(&self) -> bool {
        self.mode.is_regular()
    }

    pub fn is_symlink(&self) -> bool {
        self.mode.is_symlink()
    }

    pub fn file_info(&self) -> FileInfo<'_> {
        FileInfo { header: self }
    }
}

/// A header as produced by one of the decoders
pub(crate) struct Decoded {
    pub header: Header,

    /// Filler bytes between the end of the body and the next header
    pub pad: u64,
}

pub(crate) fn timestamp(secs: u32) -> Result<DateTime<Utc>, Error> {
    DateTime::from_timestamp(i64::from(secs), 0).ok_or_else(||
        Error::InvalidHeader(format!("Modification time {secs} out of range"))
    )
}

/// `stat`-like view of a [`Header`] for code that walks or lists archives
#[derive(Clone, Copy, Debug)]
pub struct FileInfo<'a> {
    header: &'a Header,
}

impl<'a> FileInfo<'a> {
    /// Last path component of the entry name
    pub fn name(&self) -> &'a [u8] {
        base_name(&self.header.name)
    }

    pub fn size(&self) -> u64 {
        self.header.size
    }

    pub fn mode(&self) -> FileMode {
        self.header.mode
    }

    pub fn mod_time(&self) -> DateTime<Utc> {
        self.header.mod_time
    }

    pub fn is_dir(&self) -> bool {
        self.header.is_dir()
    }

    pub fn header(&self) -> &'a Header {
        self.header
    }
}

fn base_name(path: &[u8]) -> &[u8] {
    if path.is_empty() {
        return b".";
    }

    let end = path.iter().rposition(|&b| b != b'/').map_or(0, |idx| idx + 1);
    if end == 0 {
        return b"/";
    }

    let trimmed = &path[..end];
    match trimmed.iter().rposition(|&b| b == b'/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}
