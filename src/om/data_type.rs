//! Numeric tags identifying payload types and codecs of a variable.

use crate::errors::OmError;

/// Type of the value stored by a variable, scalar or array.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum OmDataType {
    None = 0,
    Int8 = 1,
    Uint8 = 2,
    Int16 = 3,
    Uint16 = 4,
    Int32 = 5,
    Uint32 = 6,
    Int64 = 7,
    Uint64 = 8,
    Float = 9,
    Double = 10,
    String = 11,
    Int8Array = 12,
    Uint8Array = 13,
    Int16Array = 14,
    Uint16Array = 15,
    Int32Array = 16,
    Uint32Array = 17,
    Int64Array = 18,
    Uint64Array = 19,
    FloatArray = 20,
    DoubleArray = 21,
    StringArray = 22,
}

impl OmDataType {
    pub fn from_u8(value: u8) -> Result<Self, OmError> {
        Ok(match value {
            0 => OmDataType::None,
            1 => OmDataType::Int8,
            2 => OmDataType::Uint8,
            3 => OmDataType::Int16,
            4 => OmDataType::Uint16,
            5 => OmDataType::Int32,
            6 => OmDataType::Uint32,
            7 => OmDataType::Int64,
            8 => OmDataType::Uint64,
            9 => OmDataType::Float,
            10 => OmDataType::Double,
            11 => OmDataType::String,
            12 => OmDataType::Int8Array,
            13 => OmDataType::Uint8Array,
            14 => OmDataType::Int16Array,
            15 => OmDataType::Uint16Array,
            16 => OmDataType::Int32Array,
            17 => OmDataType::Uint32Array,
            18 => OmDataType::Int64Array,
            19 => OmDataType::Uint64Array,
            20 => OmDataType::FloatArray,
            21 => OmDataType::DoubleArray,
            22 => OmDataType::StringArray,
            other => return Err(OmError::InvalidDataType(other)),
        })
    }

    /// Whether the tag is one of the N-dimensional array variants.
    pub fn is_array(self) -> bool {
        (self as u8) >= OmDataType::Int8Array as u8
    }

    /// Size in bytes of one scalar value of this type, `None` for the
    /// string and array variants whose payloads are variable sized.
    pub fn scalar_size(self) -> Option<usize> {
        match self {
            OmDataType::Int8 | OmDataType::Uint8 => Some(1),
            OmDataType::Int16 | OmDataType::Uint16 => Some(2),
            OmDataType::Int32 | OmDataType::Uint32 | OmDataType::Float => Some(4),
            OmDataType::Int64 | OmDataType::Uint64 | OmDataType::Double => Some(8),
            OmDataType::None => Some(0),
            _ => None,
        }
    }

    /// Size in bytes of one decoded array element.
    pub fn array_element_size(self) -> Option<usize> {
        match self {
            OmDataType::Int8Array | OmDataType::Uint8Array => Some(1),
            OmDataType::Int16Array | OmDataType::Uint16Array => Some(2),
            OmDataType::Int32Array | OmDataType::Uint32Array | OmDataType::FloatArray => Some(4),
            OmDataType::Int64Array | OmDataType::Uint64Array | OmDataType::DoubleArray => Some(8),
            _ => None,
        }
    }
}

/// Codec applied to every chunk of an array variable.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum OmCompression {
    /// Lossy: floats are scaled to 16-bit integers, filtered with a 2D
    /// delta and compressed with the patched frame-of-reference codec.
    PforDelta2d = 0,
    /// Lossless float/double compression with a 2D xor filter and the
    /// floating-point xor predictor.
    FpxXor2d = 1,
    /// As [`OmCompression::PforDelta2d`] but applying `log10(1 + x)`
    /// before scaling.
    PforDelta2dLogarithmic = 3,
    None = 4,
}

impl OmCompression {
    pub fn from_u8(value: u8) -> Result<Self, OmError> {
        Ok(match value {
            0 => OmCompression::PforDelta2d,
            1 => OmCompression::FpxXor2d,
            3 => OmCompression::PforDelta2dLogarithmic,
            4 => OmCompression::None,
            other => return Err(OmError::InvalidCompressionType(other)),
        })
    }
}
