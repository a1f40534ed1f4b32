use std::fmt;
use std::io;

/// The value of the `c_check` field of a CRC format entry.
///
/// Despite the format's name this is not a CRC: it is the sum of all bytes of
/// the entry's body, truncated to 32 bits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Checksum(pub u32);

impl Checksum {
    /// Sum of `data` in one go
    pub fn of(data: &[u8]) -> Self {
        let mut hasher = ChecksumHasher::new();
        hasher.update(data);
        hasher.sum()
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X}", self.0)
    }
}

/// Running byte sum over everything written to it
#[derive(Clone, Debug, Default)]
pub struct ChecksumHasher {
    sum: u32,
}

impl ChecksumHasher {
    pub fn new() -> Self {
        ChecksumHasher::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        for &byte in data {
            self.sum = self.sum.wrapping_add(u32::from(byte));
        }
    }

    pub fn sum(&self) -> Checksum {
        Checksum(self.sum)
    }

    /// Start over for the next entry
    pub fn reset(&mut self) {
        self.sum = 0;
    }
}

impl io::Write for ChecksumHasher {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn sums_bytes() {
        let mut hasher = ChecksumHasher::new();
        hasher.write_all(b"meow").unwrap();
        assert_eq!(hasher.sum(), Checksum(0x6d + 0x65 + 0x6f + 0x77));
        assert_eq!(Checksum::of(b"meow"), hasher.sum());
    }

    #[test]
    fn wraps_around() {
        let mut hasher = ChecksumHasher { sum: u32::MAX - 1 };
        hasher.update(&[3]);
        assert_eq!(hasher.sum(), Checksum(1));
    }

    #[test]
    fn reset_zeroes() {
        let mut hasher = ChecksumHasher::new();
        hasher.update(&[0xff; 16]);
        assert!(!hasher.sum().is_zero());
        hasher.reset();
        assert!(hasher.sum().is_zero());
        hasher.update(b"a");
        assert_eq!(hasher.sum(), Checksum(0x61));
    }

    #[test]
    fn display_is_zero_filled_hex() {
        assert_eq!(Checksum(0xbeef).to_string(), "0000BEEF");
    }
}
