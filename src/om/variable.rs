//! Variables: the nodes of the metadata graph stored inside a file.
//!
//! A variable is a packed, little-endian descriptor referenced by an
//! `(offset, size)` pair from the trailer or from a parent's children
//! table. The descriptor starts with
//! `{ data_type: u8, compression: u8, name_len: u16, n_children: u32 }`.
//! Array variables extend it with
//! `{ lut_size: u64, lut_offset: u64, dim_count: u64, scale_factor: f32,
//! add_offset: f32 }`. Then follow the children size and offset tables
//! (`u32` each), for arrays the dimension and chunk lengths (`u64` each),
//! for scalars the typed value, and the name always last.
//!
//! [`OmVariable`] is a view over borrowed file bytes and holds no
//! allocations; legacy headers surface through the same interface.

use std::io::Write;

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

use crate::errors::OmError;
use crate::om::data_type::{OmCompression, OmDataType};
use crate::om::header::{header_type, OmHeaderType, OmHeaderV1, OmOffsetSize};

/// Fixed part shared by every v3 descriptor.
const BASE_SIZE: usize = 8;
/// Fixed part of the array extension.
const ARRAY_EXT_SIZE: usize = 32;

/// The typed payload of a scalar variable.
#[derive(Debug, Clone, PartialEq)]
pub enum OmScalarValue<'a> {
    None,
    Int8(i8),
    Uint8(u8),
    Int16(i16),
    Uint16(u16),
    Int32(i32),
    Uint32(u32),
    Int64(i64),
    Uint64(u64),
    Float(f32),
    Double(f64),
    String(&'a str),
}

impl<'a> OmScalarValue<'a> {
    pub fn data_type(&self) -> OmDataType {
        match self {
            OmScalarValue::None => OmDataType::None,
            OmScalarValue::Int8(_) => OmDataType::Int8,
            OmScalarValue::Uint8(_) => OmDataType::Uint8,
            OmScalarValue::Int16(_) => OmDataType::Int16,
            OmScalarValue::Uint16(_) => OmDataType::Uint16,
            OmScalarValue::Int32(_) => OmDataType::Int32,
            OmScalarValue::Uint32(_) => OmDataType::Uint32,
            OmScalarValue::Int64(_) => OmDataType::Int64,
            OmScalarValue::Uint64(_) => OmDataType::Uint64,
            OmScalarValue::Float(_) => OmDataType::Float,
            OmScalarValue::Double(_) => OmDataType::Double,
            OmScalarValue::String(_) => OmDataType::String,
        }
    }

    fn payload_size(&self) -> usize {
        match self {
            OmScalarValue::String(s) => 8 + s.len(),
            other => other.data_type().scalar_size().unwrap_or(0),
        }
    }
}

/// A parsed variable view over borrowed file bytes.
#[derive(Debug, Clone)]
pub enum OmVariable<'a> {
    /// The whole 40 byte header of a version 1 or 2 file.
    Legacy(OmHeaderV1),
    Scalar(OmScalar<'a>),
    Array(OmArray<'a>),
}

#[derive(Debug, Clone)]
pub struct OmScalar<'a> {
    pub data_type: OmDataType,
    children: &'a [u8],
    n_children: usize,
    value: &'a [u8],
    name: &'a [u8],
}

#[derive(Debug, Clone)]
pub struct OmArray<'a> {
    pub data_type: OmDataType,
    pub compression: OmCompression,
    pub lut_size: u64,
    pub lut_offset: u64,
    pub scale_factor: f32,
    pub add_offset: f32,
    children: &'a [u8],
    n_children: usize,
    dims: &'a [u8],
    chunks: &'a [u8],
    name: &'a [u8],
}

impl<'a> OmVariable<'a> {
    /// Interprets `bytes` as one variable. Legacy headers are recognised
    /// by their magic bytes; everything else must be a v3 descriptor.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, OmError> {
        if bytes.len() >= 3 && header_type(bytes).ok() == Some(OmHeaderType::Legacy) {
            let header = OmHeaderV1::read_from(bytes)?;
            return Ok(OmVariable::Legacy(header));
        }
        if bytes.len() < BASE_SIZE {
            return Err(OmError::OutOfBoundRead);
        }
        let data_type = OmDataType::from_u8(bytes[0])?;
        let compression = OmCompression::from_u8(bytes[1])?;
        let name_len = LittleEndian::read_u16(&bytes[2..4]) as usize;
        let n_children = LittleEndian::read_u32(&bytes[4..8]) as usize;

        if data_type.is_array() {
            if bytes.len() < BASE_SIZE + ARRAY_EXT_SIZE {
                return Err(OmError::OutOfBoundRead);
            }
            let lut_size = LittleEndian::read_u64(&bytes[8..16]);
            let lut_offset = LittleEndian::read_u64(&bytes[16..24]);
            let dim_count = LittleEndian::read_u64(&bytes[24..32]) as usize;
            let scale_factor = LittleEndian::read_f32(&bytes[32..36]);
            let add_offset = LittleEndian::read_f32(&bytes[36..40]);

            let children_len = n_children
                .checked_mul(8)
                .ok_or(OmError::OutOfBoundRead)?;
            let dims_len = dim_count.checked_mul(8).ok_or(OmError::OutOfBoundRead)?;
            let children_start = BASE_SIZE + ARRAY_EXT_SIZE;
            let dims_start = children_start + children_len;
            let chunks_start = dims_start + dims_len;
            let name_start = chunks_start + dims_len;
            let end = name_start + name_len;
            if bytes.len() < end {
                return Err(OmError::OutOfBoundRead);
            }
            Ok(OmVariable::Array(OmArray {
                data_type,
                compression,
                lut_size,
                lut_offset,
                scale_factor,
                add_offset,
                children: &bytes[children_start..dims_start],
                n_children,
                dims: &bytes[dims_start..chunks_start],
                chunks: &bytes[chunks_start..name_start],
                name: &bytes[name_start..end],
            }))
        } else {
            let children_len = n_children
                .checked_mul(8)
                .ok_or(OmError::OutOfBoundRead)?;
            let children_start = BASE_SIZE;
            let value_start = children_start + children_len;
            if bytes.len() < value_start {
                return Err(OmError::OutOfBoundRead);
            }
            let value_len = if data_type == OmDataType::String {
                if bytes.len() < value_start + 8 {
                    return Err(OmError::OutOfBoundRead);
                }
                8 + LittleEndian::read_u64(&bytes[value_start..value_start + 8]) as usize
            } else {
                data_type
                    .scalar_size()
                    .ok_or(OmError::InvalidDataType(data_type as u8))?
            };
            let name_start = value_start + value_len;
            let end = name_start + name_len;
            if bytes.len() < end {
                return Err(OmError::OutOfBoundRead);
            }
            Ok(OmVariable::Scalar(OmScalar {
                data_type,
                children: &bytes[children_start..value_start],
                n_children,
                value: &bytes[value_start..name_start],
                name: &bytes[name_start..end],
            }))
        }
    }

    pub fn name(&self) -> &str {
        let raw = match self {
            OmVariable::Legacy(_) => &[][..],
            OmVariable::Scalar(s) => s.name,
            OmVariable::Array(a) => a.name,
        };
        std::str::from_utf8(raw).unwrap_or("")
    }

    pub fn data_type(&self) -> OmDataType {
        match self {
            OmVariable::Legacy(_) => OmDataType::FloatArray,
            OmVariable::Scalar(s) => s.data_type,
            OmVariable::Array(a) => a.data_type,
        }
    }

    pub fn number_of_children(&self) -> usize {
        match self {
            OmVariable::Legacy(_) => 0,
            OmVariable::Scalar(s) => s.n_children,
            OmVariable::Array(a) => a.n_children,
        }
    }

    /// Location of the n-th child variable.
    pub fn child(&self, n: usize) -> Option<OmOffsetSize> {
        let (table, count) = match self {
            OmVariable::Legacy(_) => return None,
            OmVariable::Scalar(s) => (s.children, s.n_children),
            OmVariable::Array(a) => (a.children, a.n_children),
        };
        if n >= count {
            return None;
        }
        let size = LittleEndian::read_u32(&table[n * 4..]) as u64;
        let offset = LittleEndian::read_u32(&table[(count + n) * 4..]) as u64;
        Some(OmOffsetSize::new(offset, size))
    }

    /// The typed payload of a scalar variable.
    pub fn scalar_value(&self) -> Result<OmScalarValue<'a>, OmError> {
        let scalar = match self {
            OmVariable::Scalar(s) => s,
            _ => return Err(OmError::InvalidDataType(self.data_type() as u8)),
        };
        let v = scalar.value;
        Ok(match scalar.data_type {
            OmDataType::None => OmScalarValue::None,
            OmDataType::Int8 => OmScalarValue::Int8(v[0] as i8),
            OmDataType::Uint8 => OmScalarValue::Uint8(v[0]),
            OmDataType::Int16 => OmScalarValue::Int16(LittleEndian::read_i16(v)),
            OmDataType::Uint16 => OmScalarValue::Uint16(LittleEndian::read_u16(v)),
            OmDataType::Int32 => OmScalarValue::Int32(LittleEndian::read_i32(v)),
            OmDataType::Uint32 => OmScalarValue::Uint32(LittleEndian::read_u32(v)),
            OmDataType::Int64 => OmScalarValue::Int64(LittleEndian::read_i64(v)),
            OmDataType::Uint64 => OmScalarValue::Uint64(LittleEndian::read_u64(v)),
            OmDataType::Float => OmScalarValue::Float(LittleEndian::read_f32(v)),
            OmDataType::Double => OmScalarValue::Double(LittleEndian::read_f64(v)),
            OmDataType::String => OmScalarValue::String(
                std::str::from_utf8(&v[8..]).map_err(|_| OmError::OutOfBoundRead)?,
            ),
            other => return Err(OmError::InvalidDataType(other as u8)),
        })
    }

    /// Dimension lengths of an array variable; legacy headers expose
    /// their two dimensions.
    pub fn dimensions(&self) -> Vec<u64> {
        match self {
            OmVariable::Legacy(h) => vec![h.dim0, h.dim1],
            OmVariable::Scalar(_) => Vec::new(),
            OmVariable::Array(a) => read_u64_table(a.dims),
        }
    }

    /// Chunk lengths of an array variable.
    pub fn chunk_dimensions(&self) -> Vec<u64> {
        match self {
            OmVariable::Legacy(h) => vec![h.chunk0, h.chunk1],
            OmVariable::Scalar(_) => Vec::new(),
            OmVariable::Array(a) => read_u64_table(a.chunks),
        }
    }
}

fn read_u64_table(bytes: &[u8]) -> Vec<u64> {
    bytes.chunks_exact(8).map(LittleEndian::read_u64).collect()
}

/// Size in bytes of a scalar descriptor once written.
pub fn scalar_descriptor_size(
    name: &str,
    n_children: usize,
    value: &OmScalarValue,
) -> usize {
    BASE_SIZE + n_children * 8 + value.payload_size() + name.len()
}

/// Writes a scalar variable. Returns the bytes written.
pub fn write_scalar<W: Write>(
    mut dst: W,
    name: &str,
    value: &OmScalarValue,
    children: &[OmOffsetSize],
) -> std::io::Result<usize> {
    debug_assert!(name.len() <= u16::MAX as usize);
    dst.write_u8(value.data_type() as u8)?;
    dst.write_u8(OmCompression::None as u8)?;
    dst.write_u16::<LittleEndian>(name.len() as u16)?;
    dst.write_u32::<LittleEndian>(children.len() as u32)?;
    write_children_tables(&mut dst, children)?;
    match value {
        OmScalarValue::None => {}
        OmScalarValue::Int8(v) => dst.write_i8(*v)?,
        OmScalarValue::Uint8(v) => dst.write_u8(*v)?,
        OmScalarValue::Int16(v) => dst.write_i16::<LittleEndian>(*v)?,
        OmScalarValue::Uint16(v) => dst.write_u16::<LittleEndian>(*v)?,
        OmScalarValue::Int32(v) => dst.write_i32::<LittleEndian>(*v)?,
        OmScalarValue::Uint32(v) => dst.write_u32::<LittleEndian>(*v)?,
        OmScalarValue::Int64(v) => dst.write_i64::<LittleEndian>(*v)?,
        OmScalarValue::Uint64(v) => dst.write_u64::<LittleEndian>(*v)?,
        OmScalarValue::Float(v) => dst.write_f32::<LittleEndian>(*v)?,
        OmScalarValue::Double(v) => dst.write_f64::<LittleEndian>(*v)?,
        OmScalarValue::String(s) => {
            dst.write_u64::<LittleEndian>(s.len() as u64)?;
            dst.write_all(s.as_bytes())?;
        }
    }
    dst.write_all(name.as_bytes())?;
    Ok(scalar_descriptor_size(name, children.len(), value))
}

/// Size in bytes of a numeric array descriptor once written.
pub fn array_descriptor_size(name: &str, n_children: usize, dim_count: usize) -> usize {
    BASE_SIZE + ARRAY_EXT_SIZE + n_children * 8 + dim_count * 16 + name.len()
}

/// Writes the metadata descriptor of a numeric array. The chunk data and
/// the compressed look-up table it points at are written separately.
pub fn write_numeric_array<W: Write>(
    mut dst: W,
    name: &str,
    data_type: OmDataType,
    compression: OmCompression,
    scale_factor: f32,
    add_offset: f32,
    dims: &[u64],
    chunks: &[u64],
    lut_offset: u64,
    lut_size: u64,
    children: &[OmOffsetSize],
) -> std::io::Result<usize> {
    debug_assert!(data_type.is_array());
    debug_assert_eq!(dims.len(), chunks.len());
    dst.write_u8(data_type as u8)?;
    dst.write_u8(compression as u8)?;
    dst.write_u16::<LittleEndian>(name.len() as u16)?;
    dst.write_u32::<LittleEndian>(children.len() as u32)?;
    dst.write_u64::<LittleEndian>(lut_size)?;
    dst.write_u64::<LittleEndian>(lut_offset)?;
    dst.write_u64::<LittleEndian>(dims.len() as u64)?;
    dst.write_f32::<LittleEndian>(scale_factor)?;
    dst.write_f32::<LittleEndian>(add_offset)?;
    write_children_tables(&mut dst, children)?;
    for &d in dims {
        dst.write_u64::<LittleEndian>(d)?;
    }
    for &c in chunks {
        dst.write_u64::<LittleEndian>(c)?;
    }
    dst.write_all(name.as_bytes())?;
    Ok(array_descriptor_size(name, children.len(), dims.len()))
}

fn write_children_tables<W: Write>(dst: &mut W, children: &[OmOffsetSize]) -> std::io::Result<()> {
    for child in children {
        dst.write_u32::<LittleEndian>(child.size as u32)?;
    }
    for child in children {
        dst.write_u32::<LittleEndian>(child.offset as u32)?;
    }
    Ok(())
}
