use thiserror::Error;
use trellis_core::ComponentId;

/// Malformed batch buffer. Decoders assume producers are well behaved, so
/// these are reported and never recovered from.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Read of {needed} bytes at offset {offset} overruns a {len}-byte buffer")]
    Truncated {
        offset: usize,
        needed: usize,
        len: usize,
    },

    #[error("Invalid frame type {0}")]
    InvalidFrameType(i32),

    #[error("Invalid edit type {0}")]
    InvalidEditType(i32),

    #[error("String at offset {offset} is not valid UTF-8")]
    InvalidUtf8 { offset: usize },

    #[error("Null pointer where {0} was expected")]
    NullPointer(&'static str),

    #[error("LEB128 length at offset {offset} does not fit in 32 bits")]
    Leb128Overflow { offset: usize },

    #[error("{what} index {index} is outside 0..{count}")]
    IndexOutOfRange {
        what: &'static str,
        index: i64,
        count: usize,
    },

    #[error("Negative {what}: {value}")]
    Negative { what: &'static str, value: i64 },
}

pub type Result<T> = std::result::Result<T, DecodeError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("Value {0} exceeds the 32-bit range of the wire format")]
    TooLarge(usize),
}

/// Narrow a length, count or offset to a wire `i32`
pub(crate) fn wire_i32(value: usize) -> std::result::Result<i32, EncodeError> {
    i32::try_from(value).map_err(|_| EncodeError::TooLarge(value))
}

/// Narrow a byte length or address to a wire `u32`
pub(crate) fn wire_u32(value: usize) -> std::result::Result<u32, EncodeError> {
    u32::try_from(value).map_err(|_| EncodeError::TooLarge(value))
}

/// An edit script that does not fit the tree it is applied to
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    #[error("Sibling index {index} is outside a child list of length {len}")]
    SiblingOutOfRange { index: i32, len: usize },

    #[error("Node at sibling index {index} is not {expected}")]
    UnexpectedNode { index: i32, expected: &'static str },

    #[error("Reference frame {0} is not {1}")]
    UnexpectedFrame(i32, &'static str),

    #[error("Component frame was sent before its component existed")]
    UninitializedComponent,

    #[error("StepOut without a matching StepIn")]
    UnbalancedStepOut,

    #[error("Reference frame {0} does not exist")]
    MissingReferenceFrame(i32),

    #[error("Permutation list entries do not form a permutation")]
    InvalidPermutation,

    #[error("Component {0} has no rendered output")]
    UnknownComponent(ComponentId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_conversions_reject_out_of_range_values() {
        assert_eq!(wire_i32(7), Ok(7));
        assert_eq!(wire_i32(i32::MAX as usize), Ok(i32::MAX));
        assert_eq!(
            wire_i32(i32::MAX as usize + 1),
            Err(EncodeError::TooLarge(i32::MAX as usize + 1))
        );
        assert_eq!(wire_u32(u32::MAX as usize), Ok(u32::MAX));
        assert_eq!(
            wire_u32(u32::MAX as usize + 1),
            Err(EncodeError::TooLarge(u32::MAX as usize + 1))
        );
    }
}
