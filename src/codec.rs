//! Binary stream framing for project save/load.
//!
//! A project stream is a flat sequence of bincode-encoded values. Counts are
//! `u32` length prefixes and nested opaque blocks carry their own byte length.
//! Readers consume values in exactly the order writers produced them; there is
//! no self-description, so a reader that loses its place cannot recover.

use crate::error::ProjectError;
use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Cursor;

/// Sequential writer over an in-memory buffer
#[derive(Debug, Default)]
pub struct StreamWriter {
    buf: Vec<u8>,
}

impl StreamWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one encoded value
    pub fn write<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), ProjectError> {
        bincode::serialize_into(&mut self.buf, value)?;
        Ok(())
    }

    /// Append a collection length prefix
    pub fn write_count(&mut self, count: usize) -> Result<(), ProjectError> {
        let count = u32::try_from(count)
            .map_err(|_| ProjectError::Codec(format!("count {} exceeds u32", count)))?;
        self.write(&count)
    }

    /// Append an opaque nested block
    pub fn write_block(&mut self, block: &[u8]) -> Result<(), ProjectError> {
        self.write_count(block.len())?;
        self.buf.extend_from_slice(block);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Sequential reader mirroring [`StreamWriter`]
#[derive(Debug)]
pub struct StreamReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> StreamReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(bytes),
        }
    }

    /// Decode the next value.
    ///
    /// Length prefixes inside the value are bounded by the unread bytes, so a
    /// corrupt prefix fails here instead of sizing an allocation.
    pub fn read<T: DeserializeOwned>(&mut self) -> Result<T, ProjectError> {
        let limit = self.remaining() as u64;
        Ok(bincode::DefaultOptions::new()
            .with_fixint_encoding()
            .allow_trailing_bytes()
            .with_limit(limit)
            .deserialize_from(&mut self.cursor)?)
    }

    pub fn read_count(&mut self) -> Result<usize, ProjectError> {
        let count: u32 = self.read()?;
        Ok(count as usize)
    }

    pub fn read_block(&mut self) -> Result<&'a [u8], ProjectError> {
        let len = self.read_count()?;
        let start = self.cursor.position() as usize;
        let bytes: &'a [u8] = *self.cursor.get_ref();
        let end = start
            .checked_add(len)
            .filter(|end| *end <= bytes.len())
            .ok_or_else(|| {
                ProjectError::Codec(format!(
                    "block of {} bytes at offset {} overruns stream of {} bytes",
                    len,
                    start,
                    bytes.len()
                ))
            })?;
        self.cursor.set_position(end as u64);
        Ok(&bytes[start..end])
    }

    pub fn remaining(&self) -> usize {
        self.cursor.get_ref().len() - self.cursor.position() as usize
    }

    /// Fail if anything is left unread
    pub fn finish(self) -> Result<(), ProjectError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(ProjectError::Codec(format!("{} trailing bytes", n))),
        }
    }
}
