use std::path::PathBuf;
use std::{error, fmt, io};

use crate::record::ReadId;

/// The closed set of failure kinds for the binning pipeline.
///
/// Every fatal path inside the pipeline produces one of these variants and
/// bubbles it unchanged to the caller; nothing is caught and recovered on the
/// way up. `exit_code` realises the stable code table that downstream
/// scripts depend on.
#[derive(Debug)]
pub enum BinnieError {
    Args(String),
    InputOpen(PathBuf, io::Error),
    OutputOpen(PathBuf, io::Error),
    UidFormat(String),
    ReadOriginal(io::Error),
    ReadBridge(io::Error),
    SegmentIndex(ReadId),
    OrigTruncated(Option<ReadId>),
    UnexpectedMates(ReadId),
    NullWhereForbidden(&'static str),
    NotNullWhereRequired(&'static str),
    BufferNotEmpty(usize),
    BamUnsorted {
        id: ReadId,
        refid: i32,
        pos: i32,
        prev_refid: i32,
        prev_pos: i32,
    },
    InvalidBin(ReadId),
    Write(io::Error),
    BufferRemove(&'static str),
    BridgeSort { id: ReadId, refid: i32, pos: i32 },
}

impl BinnieError {
    pub fn exit_code(&self) -> i32 {
        match self {
            BinnieError::Args(_) => 1,
            BinnieError::InputOpen(_, _) => 2,
            BinnieError::OutputOpen(_, _) => 3,
            BinnieError::UidFormat(_) => 4,
            BinnieError::ReadOriginal(_) => 5,
            BinnieError::ReadBridge(_) => 6,
            BinnieError::SegmentIndex(_) => 7,
            BinnieError::OrigTruncated(_) => 8,
            BinnieError::UnexpectedMates(_) => 9,
            BinnieError::NullWhereForbidden(_) => 10,
            BinnieError::NotNullWhereRequired(_) => 11,
            BinnieError::BufferNotEmpty(_) => 12,
            BinnieError::BamUnsorted { .. } => 13,
            BinnieError::InvalidBin(_) => 14,
            BinnieError::Write(_) => 15,
            BinnieError::BufferRemove(_) => 16,
            BinnieError::BridgeSort { .. } => 17,
        }
    }
}

impl fmt::Display for BinnieError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BinnieError::Args(msg) => write!(f, "{}", msg),
            BinnieError::InputOpen(path, e) => {
                write!(f, "cannot open input alignment file {}: {}", path.display(), e)
            }
            BinnieError::OutputOpen(path, e) => {
                write!(f, "cannot open output alignment file {}: {}", path.display(), e)
            }
            BinnieError::UidFormat(name) => {
                write!(f, "read name or read group '{}' is not printable ASCII", name)
            }
            BinnieError::ReadOriginal(e) => write!(f, "failed reading the original stream: {}", e),
            BinnieError::ReadBridge(e) => write!(f, "failed reading the bridge stream: {}", e),
            BinnieError::SegmentIndex(id) => write!(
                f,
                "read {} has both first- and last-segment flags set but carries no FI or TC tag",
                id
            ),
            BinnieError::OrigTruncated(Some(id)) => write!(
                f,
                "bridge stream still has records (next is {}) after the original stream ended",
                id
            ),
            BinnieError::OrigTruncated(None) => write!(
                f,
                "bridge stream still has records after the original stream ended"
            ),
            BinnieError::UnexpectedMates(id) => write!(
                f,
                "read {} arrived for a template that declared no further segments",
                id
            ),
            BinnieError::NullWhereForbidden(what) => {
                write!(f, "internal error: missing value ({})", what)
            }
            BinnieError::NotNullWhereRequired(what) => {
                write!(f, "internal error: unexpected value ({})", what)
            }
            BinnieError::BufferNotEmpty(n) => write!(
                f,
                "internal error: {} reads left in the buffer after the final drain",
                n
            ),
            BinnieError::BamUnsorted {
                id,
                refid,
                pos,
                prev_refid,
                prev_pos,
            } => write!(
                f,
                "original stream is not sorted by coordinate: {} at {}:{} follows {}:{}",
                id, refid, pos, prev_refid, prev_pos
            ),
            BinnieError::InvalidBin(id) => write!(
                f,
                "internal error: mate chain for {} was left with disagreeing bins",
                id
            ),
            BinnieError::Write(e) => write!(f, "failed writing an output record: {}", e),
            BinnieError::BufferRemove(what) => {
                write!(f, "internal error: buffer removal failed ({})", what)
            }
            BinnieError::BridgeSort { id, refid, pos } => write!(
                f,
                "bridge stream is not sorted by coordinate: {} at {}:{}",
                id, refid, pos
            ),
        }
    }
}

impl error::Error for BinnieError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            BinnieError::InputOpen(_, e)
            | BinnieError::OutputOpen(_, e)
            | BinnieError::ReadOriginal(e)
            | BinnieError::ReadBridge(e)
            | BinnieError::Write(e) => Some(e),
            _ => None,
        }
    }
}
