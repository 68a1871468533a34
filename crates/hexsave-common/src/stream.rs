// stream.rs: Fixed byte order read/write primitives for save archives
//
// Every scalar goes to disk little-endian whatever the host order. Writing
// streams sequentially through a buffered sink; reading walks a cursor over
// one fully loaded file image.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use bytemuck::Pod;

use crate::errors::{ArchiveError, ArchiveResult};

// ============================================================
// Output stream
// ============================================================

/// Sequential archive writer. Never seeks.
pub struct StreamOut<W: Write> {
    inner: W,
    written: usize,
}

impl StreamOut<BufWriter<File>> {
    /// Open `path` for writing, truncating any previous file.
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl StreamOut<Vec<u8>> {
    /// In-memory writer, used for per-record buffers and tests.
    pub fn memory() -> Self {
        Self::new(Vec::new())
    }

    /// Bytes written so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.inner
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.inner
    }
}

impl<W: Write> StreamOut<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    /// Number of bytes handed to the sink.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Copy a block verbatim, no byte order conversion.
    pub fn write_buffer(&mut self, buf: &[u8]) -> io::Result<()> {
        self.inner.write_all(buf)?;
        self.written += buf.len();
        Ok(())
    }

    pub fn write_byte(&mut self, val: u8) -> io::Result<()> {
        self.write_buffer(&[val])
    }

    pub fn write_word(&mut self, val: i16) -> io::Result<()> {
        self.write_buffer(&val.to_le_bytes())
    }

    pub fn write_long(&mut self, val: i32) -> io::Result<()> {
        self.write_buffer(&val.to_le_bytes())
    }

    /// Write a link that cannot survive a reload. Only the low 32 bits are
    /// kept; readers must skip the value with [`SaveBuffer::skip_ptr`].
    pub fn write_ptr(&mut self, val: Option<usize>) -> io::Result<()> {
        let truncated = val.map_or(0, |v| (v & 0xffff_ffff) as u32);
        self.write_long(truncated as i32)
    }

    /// Write a fixed-size Pod image as a run of 32-bit words.
    pub fn write_pod<T: Pod>(&mut self, val: &T) -> io::Result<()> {
        self.write_words(bytemuck::bytes_of(val))
    }

    /// Write native-order bytes as 32-bit words in archive byte order.
    /// The slice length must be a multiple of four.
    pub fn write_words(&mut self, bytes: &[u8]) -> io::Result<()> {
        debug_assert_eq!(bytes.len() % 4, 0, "word image with ragged tail");
        for word in bytes.chunks_exact(4) {
            let v = i32::from_ne_bytes([word[0], word[1], word[2], word[3]]);
            self.write_long(v)?;
        }
        Ok(())
    }

    /// Flush and hand back the sink.
    pub fn finish(mut self) -> io::Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

// ============================================================
// Input image
// ============================================================

/// A whole archive file held in memory, read front to back.
#[derive(Debug, Clone)]
pub struct SaveBuffer {
    data: Vec<u8>,
    pos: usize,
}

impl SaveBuffer {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }

    /// Read the whole of `path` into a buffer.
    pub fn load<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Ok(Self::new(fs::read(path)?))
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Borrow the next `len` bytes and advance past them.
    pub fn get_buffer(&mut self, len: usize) -> ArchiveResult<&[u8]> {
        if self.remaining() < len {
            return Err(ArchiveError::Truncated { offset: self.pos, wanted: len });
        }
        let start = self.pos;
        self.pos += len;
        Ok(&self.data[start..self.pos])
    }

    /// Look at the next `len` bytes without consuming them.
    pub fn peek_buffer(&self, len: usize) -> ArchiveResult<&[u8]> {
        if self.remaining() < len {
            return Err(ArchiveError::Truncated { offset: self.pos, wanted: len });
        }
        Ok(&self.data[self.pos..self.pos + len])
    }

    pub fn skip(&mut self, len: usize) -> ArchiveResult<()> {
        self.get_buffer(len).map(|_| ())
    }

    pub fn get_byte(&mut self) -> ArchiveResult<u8> {
        Ok(self.get_buffer(1)?[0])
    }

    pub fn get_word(&mut self) -> ArchiveResult<i16> {
        let b = self.get_buffer(2)?;
        Ok(i16::from_le_bytes([b[0], b[1]]))
    }

    pub fn get_long(&mut self) -> ArchiveResult<i32> {
        let b = self.get_buffer(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Consume a link written by [`StreamOut::write_ptr`]. The value is
    /// never meaningful after a reload.
    pub fn skip_ptr(&mut self) -> ArchiveResult<()> {
        self.get_long().map(|_| ())
    }

    /// Read `len` bytes of 32-bit words back into native byte order.
    pub fn get_words(&mut self, len: usize) -> ArchiveResult<Vec<u8>> {
        debug_assert_eq!(len % 4, 0, "word image with ragged tail");
        let raw = self.get_buffer(len)?;
        let mut out = Vec::with_capacity(len);
        for word in raw.chunks_exact(4) {
            let v = i32::from_le_bytes([word[0], word[1], word[2], word[3]]);
            out.extend_from_slice(&v.to_ne_bytes());
        }
        Ok(out)
    }

    /// Read a Pod image written by [`StreamOut::write_pod`].
    pub fn get_pod<T: Pod>(&mut self) -> ArchiveResult<T> {
        let bytes = self.get_words(std::mem::size_of::<T>())?;
        Ok(bytemuck::pod_read_unaligned(&bytes))
    }
}
