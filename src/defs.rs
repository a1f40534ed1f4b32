pub(crate) const BINARY_MAGIC: &[u8] = &[0xc7, 0x71]; // 070707, little-endian
pub(crate) const NEWC_MAGIC: &[u8]   = b"070701";
pub(crate) const CRC_MAGIC: &[u8]    = b"070702";

/// Name of the entry marking the end of an archive, without its NUL
pub(crate) const TRAILER_NAME: &str = "TRAILER!!!";

pub(crate) const BINARY_MAGIC_LEN: usize = 2;
pub(crate) const CPIO_MAGIC_LEN: usize   = 6;
pub(crate) const CPIO_FIELD_LEN: usize   = 8;

/// Fixed field block of a binary entry header, magic excluded
pub(crate) const BINARY_FIELDS_LEN: usize = 24;

/// Fixed field block of a NEWC/CRC entry header, magic excluded
pub(crate) const CPIO_FIELDS_LEN: usize = 13 * CPIO_FIELD_LEN;

/// Total size of a NEWC/CRC cpio entry header
pub(crate) const CPIO_HEADER_LEN: usize = CPIO_MAGIC_LEN + CPIO_FIELDS_LEN;

/// Longest name (NUL included) and longest symlink target accepted
pub(crate) const PATH_MAX: u64 = 4096;

/// POSIX file mode constants
pub(crate) const S_IFMT   : u32 = 0o170000; // bit mask file type bit field
pub(crate) const S_IFSOCK : u32 = 0o140000; // socket
pub(crate) const S_IFLNK  : u32 = 0o120000; // symbolic link
pub(crate) const S_IFREG  : u32 = 0o100000; // regular file
pub(crate) const S_IFBLK  : u32 = 0o060000; // block device
pub(crate) const S_IFDIR  : u32 = 0o040000; // directory
pub(crate) const S_IFCHR  : u32 = 0o020000; // character device
pub(crate) const S_IFIFO  : u32 = 0o010000; // FIFO
pub(crate) const S_ISUID  : u32 = 0o004000;
pub(crate) const S_ISGID  : u32 = 0o002000;
pub(crate) const S_ISVTX  : u32 = 0o001000;
pub(crate) const MODE_PERM: u32 = 0o777;
pub(crate) const MODE_R: u32 = 0o04;
pub(crate) const MODE_W: u32 = 0o02;
pub(crate) const MODE_X: u32 = 0o01;

/// Padding needed to bring `len` up to a multiple of `align`
pub(crate) fn pad_len(len: u64, align: u64) -> u64 {
    (align - len % align) % align
}
