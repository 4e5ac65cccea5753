use std::io;

use log::trace;

use crate::errors::BinnieError;
use crate::record::ReadId;

/// One original record together with the bridge record sharing its template
/// identity, when the bridge stream produced one.
pub struct PairedRecords {
    pub id: ReadId,
    pub original: bam::Record,
    pub bridge: Option<bam::Record>,
}

/// Lock-step reader over the original and bridge streams.
///
/// Both streams are consumed exactly once. The bridge stream is assumed to
/// present its records in the stream order of the originals they were
/// re-aligned from, so a single-record look-ahead is enough to match them:
/// an original either claims the pending bridge record (same template
/// identity) or passes it by. A bridge stream that still holds records after
/// the originals ran out means the original input was truncated, which is
/// fatal.
pub struct StreamPair<O, B> {
    original: O,
    bridge: B,
    lookahead: Option<(ReadId, bam::Record)>,
    bridge_exhausted: bool,
    ignore_rg: bool,
    allow_sorted_unmapped: bool,
    prev_bridge: Option<(i32, i32)>,
    n_original: u64,
    n_bridge: u64,
    n_matched: u64,
}

impl<O, B> StreamPair<O, B>
where
    O: Iterator<Item = io::Result<bam::Record>>,
    B: Iterator<Item = io::Result<bam::Record>>,
{
    pub fn new(original: O, bridge: B, ignore_rg: bool, allow_sorted_unmapped: bool) -> StreamPair<O, B> {
        StreamPair {
            original,
            bridge,
            lookahead: None,
            bridge_exhausted: false,
            ignore_rg,
            allow_sorted_unmapped,
            prev_bridge: None,
            n_original: 0,
            n_bridge: 0,
            n_matched: 0,
        }
    }

    pub fn original_count(&self) -> u64 {
        self.n_original
    }

    pub fn bridge_count(&self) -> u64 {
        self.n_bridge
    }

    pub fn matched_count(&self) -> u64 {
        self.n_matched
    }

    pub fn next_pair(&mut self) -> Result<Option<PairedRecords>, BinnieError> {
        let original = match self.original.next() {
            None => return Ok(None),
            Some(Err(e)) => return Err(BinnieError::ReadOriginal(e)),
            Some(Ok(rec)) => rec,
        };
        self.n_original += 1;

        let id = ReadId::from_record(&original, self.ignore_rg)?;
        self.pull_bridge()?;

        let matched = match &self.lookahead {
            Some((bridge_id, _)) => *bridge_id == id,
            None => false,
        };

        let bridge = if matched {
            self.n_matched += 1;
            self.lookahead.take().map(|(_, rec)| rec)
        } else {
            trace!("no bridge record for {}", id);
            None
        };

        Ok(Some(PairedRecords {
            id,
            original,
            bridge,
        }))
    }

    /// Post-condition check once the original stream is fully consumed: the
    /// look-ahead and the bridge tail must both be empty.
    pub fn finish(&mut self) -> Result<(), BinnieError> {
        if let Some((id, _)) = &self.lookahead {
            return Err(BinnieError::OrigTruncated(Some(id.clone())));
        }
        if !self.bridge_exhausted {
            match self.bridge.next() {
                None => self.bridge_exhausted = true,
                Some(Err(e)) => return Err(BinnieError::ReadBridge(e)),
                Some(Ok(rec)) => {
                    let id = ReadId::from_record(&rec, self.ignore_rg).ok();
                    return Err(BinnieError::OrigTruncated(id));
                }
            }
        }
        Ok(())
    }

    fn pull_bridge(&mut self) -> Result<(), BinnieError> {
        if self.lookahead.is_some() || self.bridge_exhausted {
            return Ok(());
        }
        match self.bridge.next() {
            None => self.bridge_exhausted = true,
            Some(Err(e)) => return Err(BinnieError::ReadBridge(e)),
            Some(Ok(rec)) => {
                let id = ReadId::from_record(&rec, self.ignore_rg)?;
                self.check_bridge_sorted(&id, &rec)?;
                self.n_bridge += 1;
                self.lookahead = Some((id, rec));
            }
        }
        Ok(())
    }

    fn check_bridge_sorted(&mut self, id: &ReadId, rec: &bam::Record) -> Result<(), BinnieError> {
        let refid = rec.ref_id();
        let pos = rec.start();
        if let Some((prev_refid, prev_pos)) = self.prev_bridge {
            let unsorted = if refid != prev_refid {
                (refid != -1 && prev_refid != -1 && refid < prev_refid)
                    || (prev_refid == -1 && refid != -1 && !self.allow_sorted_unmapped)
            } else {
                pos < prev_pos
            };
            if unsorted {
                return Err(BinnieError::BridgeSort {
                    id: id.clone(),
                    refid,
                    pos,
                });
            }
        }
        self.prev_bridge = Some((refid, pos));
        Ok(())
    }
}
