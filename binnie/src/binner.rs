use std::fmt;

use log::trace;

use crate::config::BinnieConfig;
use crate::errors::BinnieError;
use crate::record::{self, MappingQuality, ReadId};
use crate::stats::BinStats;
use crate::stream_pair::PairedRecords;

/// Destination of a binned read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bin {
    Unchanged,
    Bridged,
    Remap,
}

impl fmt::Display for Bin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Bin::Unchanged => write!(f, "unchanged"),
            Bin::Bridged => write!(f, "bridged"),
            Bin::Remap => write!(f, "remap"),
        }
    }
}

/// A read carrying its tentative bin and the bookkeeping the template
/// buffer needs to keep mates in agreement.
///
/// `orig_refid`/`orig_pos` always hold the original alignment's coordinates,
/// also when the record itself is the bridge alignment; downstream ordering
/// is defined over original coordinates. `prev_mate`/`next_mate` are arena
/// handles linking buffered reads of the same template in insertion order.
#[derive(Debug)]
pub struct BinnedRead {
    pub rec: bam::Record,
    pub bin: Bin,
    pub id: ReadId,
    pub orig_refid: i32,
    pub orig_pos: i32,
    /// Remaining segments expected for this template; -1 when unknown.
    pub expected_mates: i32,
    pub observed_mates: i32,
    pub prev_mate: Option<usize>,
    pub next_mate: Option<usize>,
}

/// Decides the tentative bin for one original read and its optional bridge
/// re-alignment. Returns `None` for discarded (mapped secondary) reads.
pub fn bin_read(
    pair: PairedRecords,
    cfg: &BinnieConfig,
    stats: &mut BinStats,
) -> Result<Option<BinnedRead>, BinnieError> {
    let PairedRecords {
        id,
        original,
        bridge,
    } = pair;

    let oflag = original.flag();
    if oflag.is_mapped() && oflag.is_secondary() {
        trace!("{} is a mapped secondary alignment, dropping", id);
        return Ok(None);
    }

    if !cfg.ignore_rg && record::read_group(&original)?.is_none() {
        stats.update_missing_rg();
    }

    let orig_refid = original.ref_id();
    let orig_pos = original.start();

    let coords_deleted = match cfg.coord_deleted {
        Some(pred) => pred(&original),
        None => false,
    };

    let (bin, rec) = if coords_deleted {
        trace!("original coordinates of {} were deleted", id);
        (Bin::Remap, original)
    } else {
        let omq = MappingQuality::from_record(&original);
        let bmq = bridge.as_ref().map(MappingQuality::from_record);
        match decide(omq, bmq) {
            Bin::Bridged => {
                let mut brec = match bridge {
                    Some(b) => b,
                    None => {
                        return Err(BinnieError::NullWhereForbidden(
                            "bridged bin chosen without a bridge record",
                        ))
                    }
                };
                record::apply_bridge_fixups(&mut brec, &original, cfg.ignore_rg)?;
                (Bin::Bridged, brec)
            }
            bin => (bin, original),
        }
    };

    let expected_mates = expected_mates(&rec, &id, stats)?;

    if let Some(fi) = record::tag_int(&rec, b"FI") {
        let tc = record::tag_int(&rec, b"TC");
        if fi < 1 || tc.map_or(false, |tc| fi > tc) {
            stats.update_nonlinear_fi(&id, fi);
        }
    }

    trace!("{} binned as {}", id, bin);
    Ok(Some(BinnedRead {
        rec,
        bin,
        id,
        orig_refid,
        orig_pos,
        expected_mates,
        observed_mates: 0,
        prev_mate: None,
        next_mate: None,
    }))
}

/// The per-read decision table. The bridge alignment wins only when the
/// original gave no usable placement and the bridge did; an original with a
/// real placement that the bridge also places is ambiguous and goes to
/// remap.
fn decide(orig: MappingQuality, bridge: Option<MappingQuality>) -> Bin {
    use MappingQuality::*;
    match (orig, bridge) {
        (Unmapped, None) | (Unmapped, Some(Unmapped)) => Bin::Unchanged,
        (Unmapped, Some(_)) => Bin::Bridged,
        (Zero, Some(Positive(_))) => Bin::Remap,
        (Zero, _) => Bin::Unchanged,
        (Positive(_), None) | (Positive(_), Some(Unmapped)) => Bin::Unchanged,
        (Positive(_), Some(_)) => Bin::Remap,
    }
}

/// Number of further segments this template should produce, derived from the
/// chosen alignment: TC tag minus one when present, otherwise inferred from
/// the pairing flags; -1 when unknowable.
fn expected_mates(
    rec: &bam::Record,
    id: &ReadId,
    stats: &mut BinStats,
) -> Result<i32, BinnieError> {
    if let Some(tc) = record::tag_int(rec, b"TC") {
        return Ok(tc as i32 - 1);
    }
    let flag = rec.flag();
    if !flag.is_paired() {
        return Ok(0);
    }
    match (flag.first_in_pair(), flag.last_in_pair()) {
        (true, false) | (false, true) => Ok(1),
        (true, true) => {
            if record::tag_int(rec, b"FI").is_some() {
                stats.update_unknown_segments(id);
                Ok(-1)
            } else {
                Err(BinnieError::SegmentIndex(id.clone()))
            }
        }
        (false, false) => {
            stats.update_unknown_segments(id);
            Ok(-1)
        }
    }
}
