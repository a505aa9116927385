//! File level framing: magic bytes, the legacy header and the v3 trailer.
//!
//! Legacy files (versions 1 and 2) carry a 40 byte header describing their
//! single two-dimensional array, immediately followed by the look-up table
//! and the chunk data. Version 3 files start with just the 3 magic bytes
//! and end in a 40 byte trailer pointing at the root variable.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::errors::OmError;

pub const MAGIC: [u8; 2] = [b'O', b'M'];
pub const VERSION: u8 = 3;

/// Size of the header read probe; 40 bytes cover the whole legacy header.
pub const HEADER_READ_SIZE: usize = 40;
/// Size of the v3 header actually written.
pub const HEADER_V3_SIZE: usize = 3;
/// Size of the trailer at the end of v3 files.
pub const TRAILER_SIZE: usize = 40;

/// A `(offset, size)` pair locating a variable inside the file.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct OmOffsetSize {
    pub offset: u64,
    pub size: u64,
}

impl OmOffsetSize {
    pub fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }
}

/// What the first bytes of a file identify it as.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OmHeaderType {
    /// Version 1 or 2: the header is the variable.
    Legacy,
    /// Version 3: the root variable is found through the trailer.
    Trailer,
}

/// Inspects the first bytes of a file. Needs at least 3 bytes.
pub fn header_type(bytes: &[u8]) -> Result<OmHeaderType, OmError> {
    if bytes.len() < HEADER_V3_SIZE {
        return Err(OmError::NotAnOmFile);
    }
    if bytes[0] != MAGIC[0] || bytes[1] != MAGIC[1] {
        return Err(OmError::NotAnOmFile);
    }
    match bytes[2] {
        1 | 2 => Ok(OmHeaderType::Legacy),
        3 => Ok(OmHeaderType::Trailer),
        _ => Err(OmError::NotAnOmFile),
    }
}

/// The header of a version 1 or 2 file: a single 2D array of floats.
#[derive(Debug, Clone, PartialEq)]
pub struct OmHeaderV1 {
    pub version: u8,
    pub compression_type: u8,
    pub scale_factor: f32,
    pub dim0: u64,
    pub dim1: u64,
    pub chunk0: u64,
    pub chunk1: u64,
}

impl OmHeaderV1 {
    pub fn read_from<R: Read>(mut src: R) -> Result<Self, OmError> {
        let mut magic = [0u8; 2];
        src.read_exact(&mut magic)?;
        let version = src.read_u8()?;
        if magic != MAGIC || version == 0 || version > 2 {
            return Err(OmError::NotAnOmFile);
        }
        let compression_type = src.read_u8()?;
        let scale_factor = src.read_f32::<LittleEndian>()?;
        let dim0 = src.read_u64::<LittleEndian>()?;
        let dim1 = src.read_u64::<LittleEndian>()?;
        let chunk0 = src.read_u64::<LittleEndian>()?;
        let chunk1 = src.read_u64::<LittleEndian>()?;
        Ok(Self {
            version,
            compression_type,
            scale_factor,
            dim0,
            dim1,
            chunk0,
            chunk1,
        })
    }

    pub fn write_to<W: Write>(&self, mut dst: W) -> std::io::Result<()> {
        dst.write_all(&MAGIC)?;
        dst.write_u8(self.version)?;
        dst.write_u8(self.compression_type)?;
        dst.write_f32::<LittleEndian>(self.scale_factor)?;
        dst.write_u64::<LittleEndian>(self.dim0)?;
        dst.write_u64::<LittleEndian>(self.dim1)?;
        dst.write_u64::<LittleEndian>(self.chunk0)?;
        dst.write_u64::<LittleEndian>(self.chunk1)?;
        Ok(())
    }
}

/// Writes the 3 byte header that starts every v3 file.
pub fn write_header_v3<W: Write>(mut dst: W) -> std::io::Result<()> {
    dst.write_all(&MAGIC)?;
    dst.write_u8(VERSION)
}

/// Reads the trailer from the last [`TRAILER_SIZE`] bytes of a file and
/// returns the root variable location.
pub fn read_trailer(bytes: &[u8]) -> Result<OmOffsetSize, OmError> {
    if bytes.len() < TRAILER_SIZE {
        return Err(OmError::NotAnOmFile);
    }
    let mut src = &bytes[..];
    let mut magic = [0u8; 2];
    src.read_exact(&mut magic)?;
    let version = src.read_u8()?;
    if magic != MAGIC || version != VERSION {
        return Err(OmError::NotAnOmFile);
    }
    let _reserved = src.read_u8()?;
    let _reserved2 = src.read_u32::<LittleEndian>()?;
    let offset = src.read_u64::<LittleEndian>()?;
    let size = src.read_u64::<LittleEndian>()?;
    Ok(OmOffsetSize::new(offset, size))
}

/// Writes the trailer, zero padding it to [`TRAILER_SIZE`] bytes.
pub fn write_trailer<W: Write>(mut dst: W, root: OmOffsetSize) -> std::io::Result<()> {
    dst.write_all(&MAGIC)?;
    dst.write_u8(VERSION)?;
    dst.write_u8(0)?;
    dst.write_u32::<LittleEndian>(0)?;
    dst.write_u64::<LittleEndian>(root.offset)?;
    dst.write_u64::<LittleEndian>(root.size)?;
    dst.write_all(&[0u8; TRAILER_SIZE - 24])?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_header_type_detection() {
        assert_eq!(header_type(&[b'O', b'M', 1]).unwrap(), OmHeaderType::Legacy);
        assert_eq!(header_type(&[b'O', b'M', 2]).unwrap(), OmHeaderType::Legacy);
        assert_eq!(header_type(&[b'O', b'M', 3]).unwrap(), OmHeaderType::Trailer);
        assert!(header_type(&[b'O', b'M', 0]).is_err());
        assert!(header_type(&[b'O', b'M', 4]).is_err());
        assert!(header_type(&[b'N', b'C', 3]).is_err());
        assert!(header_type(&[b'O']).is_err());
    }

    #[test]
    fn test_legacy_header_roundtrip() {
        let header = OmHeaderV1 {
            version: 2,
            compression_type: 0,
            scale_factor: 20.0,
            dim0: 5,
            dim1: 5,
            chunk0: 2,
            chunk1: 2,
        };
        let mut buf = Vec::new();
        header.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_READ_SIZE);

        let decoded = OmHeaderV1::read_from(&buf[..]).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_trailer_roundtrip() {
        let root = OmOffsetSize::new(1234, 567);
        let mut buf = Vec::new();
        write_trailer(&mut buf, root).unwrap();
        assert_eq!(buf.len(), TRAILER_SIZE);
        assert_eq!(read_trailer(&buf).unwrap(), root);
    }

    #[test]
    fn test_trailer_rejects_bad_magic() {
        let mut buf = Vec::new();
        write_trailer(&mut buf, OmOffsetSize::new(0, 0)).unwrap();
        buf[2] = 2;
        assert!(read_trailer(&buf).is_err());
    }
}
