//! Bounded big-endian reader over an untrusted byte slice.
//!
//! Every read checks the remaining length first and fails with a
//! [`ReadError`] instead of indexing past the end. Nested length-prefixed
//! structures are handled by splitting off a child cursor with
//! [`Cursor::sub`], so a field can never read beyond its enclosing scope.

use thiserror::Error;

/// A read asked for more bytes than the current scope holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("read of {needed} bytes with only {remaining} remaining")]
pub struct ReadError {
    pub needed: usize,
    pub remaining: usize,
}

#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Take the next `n` bytes, advancing past them.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], ReadError> {
        let remaining = self.remaining();
        if n > remaining {
            return Err(ReadError {
                needed: n,
                remaining,
            });
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    pub fn skip(&mut self, n: usize) -> Result<(), ReadError> {
        self.take(n).map(|_| ())
    }

    /// Split off the next `n` bytes as an independent cursor.
    pub fn sub(&mut self, n: usize) -> Result<Cursor<'a>, ReadError> {
        self.take(n).map(Cursor::new)
    }

    pub fn read_u8(&mut self) -> Result<u8, ReadError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, ReadError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_u24(&mut self) -> Result<u32, ReadError> {
        let b = self.take(3)?;
        Ok(u32::from_be_bytes([0, b[0], b[1], b[2]]))
    }

    /// Read a 1-byte length prefix and split off that many bytes.
    pub fn sub_u8(&mut self) -> Result<Cursor<'a>, ReadError> {
        let len = self.read_u8()? as usize;
        self.sub(len)
    }

    /// Read a 2-byte length prefix and split off that many bytes.
    pub fn sub_u16(&mut self) -> Result<Cursor<'a>, ReadError> {
        let len = self.read_u16()? as usize;
        self.sub(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_big_endian_integers() {
        let mut cursor = Cursor::new(&[0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);

        assert_eq!(cursor.read_u8(), Ok(0x01));
        assert_eq!(cursor.read_u16(), Ok(0x0203));
        assert_eq!(cursor.read_u24(), Ok(0x040506));
        assert!(cursor.is_empty());
    }

    #[test]
    fn overrun_leaves_position_untouched() {
        let mut cursor = Cursor::new(&[0xaa, 0xbb]);

        assert_eq!(
            cursor.take(3),
            Err(ReadError {
                needed: 3,
                remaining: 2
            })
        );
        assert_eq!(cursor.read_u16(), Ok(0xaabb));
    }

    #[test]
    fn sub_cursor_is_confined_to_its_scope() {
        let mut cursor = Cursor::new(&[0x02, 0x10, 0x20, 0x30]);

        let mut inner = cursor.sub_u8().unwrap();
        assert_eq!(inner.remaining(), 2);
        assert!(inner.read_u24().is_err());
        assert_eq!(inner.read_u16(), Ok(0x1020));
        assert_eq!(cursor.read_u8(), Ok(0x30));
    }

    #[test]
    fn sub_rejects_length_past_end() {
        let mut cursor = Cursor::new(&[0x00, 0x05, 0x01]);

        assert!(cursor.sub_u16().is_err());
    }

    #[test]
    fn empty_input() {
        let mut cursor = Cursor::new(&[]);

        assert!(cursor.is_empty());
        assert!(cursor.read_u8().is_err());
        assert_eq!(cursor.take(0), Ok(&[][..]));
    }
}
