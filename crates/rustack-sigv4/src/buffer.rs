//! Bounds-checked working buffer.
//!
//! [`WorkingBuffer`] wraps a caller-owned byte slice with a write cursor. Every
//! write checks the remaining capacity first and fails with
//! [`SigV4Error::InsufficientMemory`] instead of writing past the end, so a
//! failed write never leaves a partially copied chunk behind.
//!
//! The signing pipeline reuses one buffer across all of its phases; the
//! `truncate` and `reencode_tail` helpers exist for that reuse.

use std::ops::Range;

use crate::error::{SigV4Error, SigV4Result};

/// A fixed-capacity byte arena with a write cursor.
///
/// `len() + remaining() == capacity()` holds at all times.
#[derive(Debug)]
pub struct WorkingBuffer<'a> {
    buf: &'a mut [u8],
    cursor: usize,
}

impl<'a> WorkingBuffer<'a> {
    /// Wrap `buf`; writing starts at its first byte.
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, cursor: 0 }
    }

    /// Total capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Number of bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cursor
    }

    /// Whether nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cursor == 0
    }

    /// Bytes still available for writing.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.cursor
    }

    /// Everything written so far.
    #[must_use]
    pub fn written(&self) -> &[u8] {
        &self.buf[..self.cursor]
    }

    /// A previously written region. Ranges beyond the cursor yield an empty slice.
    #[must_use]
    pub fn slice(&self, range: Range<usize>) -> &[u8] {
        self.written().get(range).unwrap_or_default()
    }

    /// Move the cursor back to `len`, discarding what follows.
    ///
    /// Has no effect when `len` is past the cursor.
    pub fn truncate(&mut self, len: usize) {
        if len < self.cursor {
            self.cursor = len;
        }
    }

    /// Append a single byte.
    pub fn push(&mut self, byte: u8) -> SigV4Result<()> {
        self.ensure(1)?;
        self.buf[self.cursor] = byte;
        self.cursor += 1;
        Ok(())
    }

    /// Append `bytes` in full, or nothing at all.
    pub fn extend(&mut self, bytes: &[u8]) -> SigV4Result<()> {
        self.ensure(bytes.len())?;
        self.buf[self.cursor..self.cursor + bytes.len()].copy_from_slice(bytes);
        self.cursor += bytes.len();
        Ok(())
    }

    /// Append the lowercase hex encoding of `bytes`.
    pub fn extend_hex(&mut self, bytes: &[u8]) -> SigV4Result<()> {
        let required = bytes.len() * 2;
        self.ensure(required)?;
        let overflow = SigV4Error::InsufficientMemory {
            required,
            remaining: self.remaining(),
        };
        let out = &mut self.buf[self.cursor..self.cursor + required];
        hex::encode_to_slice(bytes, out).map_err(|_| overflow)?;
        self.cursor += required;
        Ok(())
    }

    /// Move the bytes written since `from` to the very end of the buffer, then
    /// let `f` rewrite them starting at `from`.
    ///
    /// `f` receives a window that ends where the staged copy begins, so it can
    /// never overwrite input it has not read yet.
    pub(crate) fn reencode_tail<F>(&mut self, from: usize, f: F) -> SigV4Result<()>
    where
        F: FnOnce(&mut WorkingBuffer<'_>, &[u8]) -> SigV4Result<()>,
    {
        let staged = self.cursor.saturating_sub(from);
        if staged > self.remaining() {
            return Err(SigV4Error::InsufficientMemory {
                required: staged,
                remaining: self.remaining(),
            });
        }

        let tail_start = self.buf.len() - staged;
        self.buf.copy_within(from..self.cursor, tail_start);

        let (head, tail) = self.buf.split_at_mut(tail_start);
        let mut window = WorkingBuffer {
            buf: head,
            cursor: from,
        };
        f(&mut window, tail)?;
        self.cursor = window.cursor;
        Ok(())
    }

    fn ensure(&self, required: usize) -> SigV4Result<()> {
        if required > self.remaining() {
            return Err(SigV4Error::InsufficientMemory {
                required,
                remaining: self.remaining(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_track_cursor_and_remaining() {
        let mut storage = [0u8; 8];
        let mut buf = WorkingBuffer::new(&mut storage);
        buf.extend(b"abc").unwrap();
        buf.push(b'd').unwrap();
        assert_eq!(buf.written(), b"abcd");
        assert_eq!(buf.len() + buf.remaining(), buf.capacity());
        assert_eq!(buf.remaining(), 4);
    }

    #[test]
    fn test_should_reject_write_past_capacity_without_writing() {
        let mut storage = [0u8; 4];
        let mut buf = WorkingBuffer::new(&mut storage);
        buf.extend(b"ab").unwrap();
        let err = buf.extend(b"cde").unwrap_err();
        assert_eq!(
            err,
            SigV4Error::InsufficientMemory {
                required: 3,
                remaining: 2,
            }
        );
        assert_eq!(buf.written(), b"ab");
        buf.extend(b"cd").unwrap();
        assert!(buf.push(b'e').is_err());
    }

    #[test]
    fn test_should_write_lowercase_hex() {
        let mut storage = [0u8; 4];
        let mut buf = WorkingBuffer::new(&mut storage);
        buf.extend_hex(&[0xAB, 0x01]).unwrap();
        assert_eq!(buf.written(), b"ab01");
        assert!(buf.extend_hex(&[0x00]).is_err());
    }

    #[test]
    fn test_should_truncate_only_backwards() {
        let mut storage = [0u8; 8];
        let mut buf = WorkingBuffer::new(&mut storage);
        buf.extend(b"abcdef").unwrap();
        buf.truncate(10);
        assert_eq!(buf.len(), 6);
        buf.truncate(2);
        assert_eq!(buf.written(), b"ab");
        assert_eq!(buf.slice(0..2), b"ab");
        assert_eq!(buf.slice(1..5), b"");
    }

    #[test]
    fn test_should_reencode_tail_in_place() {
        let mut storage = [0u8; 16];
        let mut buf = WorkingBuffer::new(&mut storage);
        buf.extend(b">ab").unwrap();
        buf.reencode_tail(1, |window, staged| {
            for &b in staged {
                window.push(b)?;
                window.push(b)?;
            }
            Ok(())
        })
        .unwrap();
        assert_eq!(buf.written(), b">aabb");
    }

    #[test]
    fn test_should_fail_reencode_when_tail_does_not_fit() {
        let mut storage = [0u8; 5];
        let mut buf = WorkingBuffer::new(&mut storage);
        buf.extend(b">abc").unwrap();
        let result = buf.reencode_tail(1, |_, _| Ok(()));
        assert!(matches!(result, Err(SigV4Error::InsufficientMemory { .. })));
    }
}
