//! The om file format layer: framing, tags and the variable graph.

pub use data_type::{OmCompression, OmDataType};
pub use header::{
    header_type, read_trailer, write_header_v3, write_trailer, OmHeaderType, OmHeaderV1,
    OmOffsetSize, HEADER_READ_SIZE, HEADER_V3_SIZE, TRAILER_SIZE,
};
pub use variable::{
    array_descriptor_size, scalar_descriptor_size, write_numeric_array, write_scalar, OmArray,
    OmScalar, OmScalarValue, OmVariable,
};

pub(crate) mod copy;
mod data_type;
mod header;
mod variable;

/// Number of look-up-table entries one compressed group may hold.
pub const MAX_LUT_ELEMENTS: u64 = 256;

#[inline]
pub(crate) fn divide_rounded_up(dividend: u64, divisor: u64) -> u64 {
    (dividend + divisor - 1) / divisor
}
