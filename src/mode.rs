use std::fmt;

use crate::defs;

/// The type of file an entry describes, taken from the `S_IFMT` bits of its mode
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FileType {
    Socket,
    Symlink,
    Regular,
    BlockDevice,
    Dir,
    CharDevice,
    Fifo,
}

impl FileType {
    fn bits(self) -> u32 {
        match self {
            FileType::Socket      => defs::S_IFSOCK,
            FileType::Symlink     => defs::S_IFLNK,
            FileType::Regular     => defs::S_IFREG,
            FileType::BlockDevice => defs::S_IFBLK,
            FileType::Dir         => defs::S_IFDIR,
            FileType::CharDevice  => defs::S_IFCHR,
            FileType::Fifo        => defs::S_IFIFO,
        }
    }

    fn from_bits(bits: u32) -> Option<Self> {
        match bits & defs::S_IFMT {
            defs::S_IFSOCK => Some(FileType::Socket),
            defs::S_IFLNK  => Some(FileType::Symlink),
            defs::S_IFREG  => Some(FileType::Regular),
            defs::S_IFBLK  => Some(FileType::BlockDevice),
            defs::S_IFDIR  => Some(FileType::Dir),
            defs::S_IFCHR  => Some(FileType::CharDevice),
            defs::S_IFIFO  => Some(FileType::Fifo),
            _ => None,
        }
    }

    /// Leading character of an `ls -l` listing
    fn as_char(self) -> char {
        match self {
            FileType::Socket      => 's',
            FileType::Symlink     => 'l',
            FileType::Regular     => '-',
            FileType::BlockDevice => 'b',
            FileType::Dir         => 'd',
            FileType::CharDevice  => 'c',
            FileType::Fifo        => 'p',
        }
    }
}

/// A POSIX file mode as stored in a cpio header: permission bits in the low
/// twelve bits, file type in the `S_IFMT` field.
///
/// All queries are plain mask comparisons on the raw value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FileMode(pub u32);

impl FileMode {
    pub const TYPE_MASK: u32 = defs::S_IFMT;
    pub const PERM_MASK: u32 = defs::MODE_PERM;

    pub const SOCKET: u32       = defs::S_IFSOCK;
    pub const SYMLINK: u32      = defs::S_IFLNK;
    pub const REGULAR: u32      = defs::S_IFREG;
    pub const BLOCK_DEVICE: u32 = defs::S_IFBLK;
    pub const DIR: u32          = defs::S_IFDIR;
    pub const CHAR_DEVICE: u32  = defs::S_IFCHR;
    pub const FIFO: u32         = defs::S_IFIFO;

    pub const SETUID: u32 = defs::S_ISUID;
    pub const SETGID: u32 = defs::S_ISGID;
    pub const STICKY: u32 = defs::S_ISVTX;

    /// Build a mode from a file type and permission bits
    pub fn new(file_type: FileType, perm: u32) -> Self {
        FileMode(file_type.bits() | (perm & !defs::S_IFMT))
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    /// `None` when the type field holds no known file type
    pub fn file_type(self) -> Option<FileType> {
        FileType::from_bits(self.0)
    }

    /// The rwx bits for owner, group and other
    pub fn perm(self) -> u32 {
        self.0 & defs::MODE_PERM
    }

    pub fn is_dir(self) -> bool {
        self.0 & defs::S_IFMT == defs::S_IFDIR
    }

    pub fn is_regular(self) -> bool {
        self.0 & defs::S_IFMT == defs::S_IFREG
    }

    pub fn is_symlink(self) -> bool {
        self.0 & defs::S_IFMT == defs::S_IFLNK
    }
}

impl From<u32> for FileMode {
    fn from(mode: u32) -> Self {
        FileMode(mode)
    }
}

/// Convert the file permissions portion of a file mode to a representative string
fn push_perm(out: &mut String, mode: u32, shift: usize, special: u32, special_char: char) {
    let perm = (mode >> shift) & 0o7;

    out.push(if perm & defs::MODE_R != 0 { 'r' } else { '-' });
    out.push(if perm & defs::MODE_W != 0 { 'w' } else { '-' });

    let exec = perm & defs::MODE_X != 0;
    if mode & special != 0 {
        out.push(if exec { special_char } else { special_char.to_ascii_uppercase() });
    } else {
        out.push(if exec { 'x' } else { '-' });
    }
}

impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut mode_str = String::with_capacity(10);

        mode_str.push(self.file_type().map_or('?', FileType::as_char));
        push_perm(&mut mode_str, self.0, 6, defs::S_ISUID, 's');
        push_perm(&mut mode_str, self.0, 3, defs::S_ISGID, 's');
        push_perm(&mut mode_str, self.0, 0, defs::S_ISVTX, 't');

        f.write_str(&mode_str)
    }
}
