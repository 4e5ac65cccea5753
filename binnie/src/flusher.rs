use std::io;

use log::trace;

use crate::binner::{Bin, BinnedRead};
use crate::buffer::TemplateBuffer;
use crate::config::BinnieConfig;
use crate::errors::BinnieError;
use crate::stats::BinStats;

/// Destination for emitted records. `bam::BamWriter` is the production
/// sink; tests collect records in memory.
pub trait BinSink {
    fn write_rec(&mut self, rec: &bam::Record) -> io::Result<()>;
    fn finish(&mut self) -> io::Result<()>;
}

impl<W: io::Write> BinSink for bam::BamWriter<W> {
    fn write_rec(&mut self, rec: &bam::Record) -> io::Result<()> {
        bam::RecordWriter::write(self, rec)
    }

    fn finish(&mut self) -> io::Result<()> {
        bam::RecordWriter::finish(self)
    }
}

/// Drains the template buffer into the three output sinks.
///
/// Each newly enqueued read is first checked against the input sort order
/// (refid ascending, pos ascending within refid, unmapped block last). The
/// flush loop then pops reads while the input is exhausted, the refid just
/// changed, or either bounded-memory trigger holds. Reads are pre-sorted by
/// position, so once the buffer spans more than the configured window any
/// missing mate of the head read could only sit further downstream; forcing
/// the head out keeps memory bounded and the read keeps its tentative bin.
pub struct Flusher<S: BinSink> {
    unchanged: S,
    bridged: S,
    remap: S,
    size_limit: u64,
    bases_limit: u64,
    allow_sorted_unmapped: bool,
    last: Option<(i32, i32)>,
    new_refid: bool,
    first_pos: i32,
    last_pos: i32,
}

impl<S: BinSink> Flusher<S> {
    pub fn new(unchanged: S, bridged: S, remap: S, cfg: &BinnieConfig) -> Flusher<S> {
        Flusher {
            unchanged,
            bridged,
            remap,
            size_limit: cfg.buffer_size_limit,
            bases_limit: cfg.buffer_bases_limit,
            allow_sorted_unmapped: cfg.allow_sorted_unmapped,
            last: None,
            new_refid: false,
            first_pos: 0,
            last_pos: 0,
        }
    }

    /// Sort-order invariant checks for a read about to enter the buffer,
    /// using its original (refid, pos). Also arms the refid-change drain and
    /// tracks the tail position of the buffered window.
    pub fn note_enqueue(&mut self, read: &BinnedRead) -> Result<(), BinnieError> {
        let refid = read.orig_refid;
        let pos = read.orig_pos;

        match self.last {
            None => self.new_refid = false,
            Some((prev_refid, prev_pos)) => {
                if refid != prev_refid {
                    let backwards = refid != -1 && prev_refid != -1 && refid < prev_refid;
                    let mapped_after_unmapped =
                        prev_refid == -1 && refid != -1 && !self.allow_sorted_unmapped;
                    if backwards || mapped_after_unmapped {
                        return Err(BinnieError::BamUnsorted {
                            id: read.id.clone(),
                            refid,
                            pos,
                            prev_refid,
                            prev_pos,
                        });
                    }
                    self.new_refid = true;
                } else {
                    self.new_refid = false;
                    if pos < prev_pos {
                        return Err(BinnieError::BamUnsorted {
                            id: read.id.clone(),
                            refid,
                            pos,
                            prev_refid,
                            prev_pos,
                        });
                    }
                }
            }
        }

        self.last = Some((refid, pos));
        self.last_pos = pos;
        Ok(())
    }

    /// Pops and emits reads while a flush condition holds; with `drain` the
    /// buffer is emptied unconditionally.
    pub fn flush(
        &mut self,
        buffer: &mut TemplateBuffer,
        drain: bool,
        stats: &mut BinStats,
    ) -> Result<(), BinnieError> {
        loop {
            match buffer.peek_front() {
                None => {
                    self.first_pos = 0;
                    self.last_pos = 0;
                    return Ok(());
                }
                Some(head) => self.first_pos = head.orig_pos,
            }

            let span = self.last_pos as i64 - self.first_pos as i64;
            let go = drain
                || self.new_refid
                || (self.size_limit > 0 && buffer.size() as u64 >= self.size_limit)
                || (self.bases_limit > 0 && span >= self.bases_limit as i64);
            if !go {
                return Ok(());
            }

            let read = buffer.pop_front()?.ok_or(BinnieError::NullWhereForbidden(
                "non-empty buffer yielded no head",
            ))?;
            self.emit(read, stats)?;
        }
    }

    pub fn finish(&mut self) -> Result<(), BinnieError> {
        self.unchanged.finish().map_err(BinnieError::Write)?;
        self.bridged.finish().map_err(BinnieError::Write)?;
        self.remap.finish().map_err(BinnieError::Write)?;
        Ok(())
    }

    fn emit(&mut self, read: BinnedRead, stats: &mut BinStats) -> Result<(), BinnieError> {
        trace!("emitting {} to the {} bin", read.id, read.bin);
        let sink = match read.bin {
            Bin::Unchanged => &mut self.unchanged,
            Bin::Bridged => &mut self.bridged,
            Bin::Remap => &mut self.remap,
        };
        sink.write_rec(&read.rec).map_err(BinnieError::Write)?;
        stats.update_bin_count(read.bin);
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::test_util::{positions, VecSink};
    use super::*;
    use crate::record::test_util::rec;
    use crate::record::ReadId;
    use ascii::AsciiString;
    use std::path::Path;

    fn binned(qname: &str, bin: Bin, refid: i32, pos: i32) -> BinnedRead {
        BinnedRead {
            rec: rec(qname, 0, refid, pos, 30),
            bin,
            id: ReadId {
                rg: AsciiString::new(),
                qname: AsciiString::from_ascii(qname).unwrap(),
            },
            orig_refid: refid,
            orig_pos: pos,
            expected_mates: 1,
            observed_mates: 0,
            prev_mate: None,
            next_mate: None,
        }
    }

    fn flusher(size: u64, bases: u64) -> (Flusher<VecSink>, VecSink, VecSink, VecSink) {
        let (u, b, r) = (VecSink::default(), VecSink::default(), VecSink::default());
        let cfg = BinnieConfig::new(Path::new("o.bam"), Path::new("b.bam"));
        let cfg = BinnieConfig::update_buffer_size(cfg, size);
        let cfg = BinnieConfig::update_buffer_bases(cfg, bases);
        (
            Flusher::new(u.clone(), b.clone(), r.clone(), &cfg),
            u,
            b,
            r,
        )
    }

    fn push(
        f: &mut Flusher<VecSink>,
        buf: &mut TemplateBuffer,
        stats: &mut BinStats,
        read: BinnedRead,
    ) -> Result<(), BinnieError> {
        f.note_enqueue(&read)?;
        buf.enqueue(read)?;
        f.flush(buf, false, stats)
    }

    #[test]
    fn reads_route_to_their_bin_sinks() {
        let (mut f, u, b, r) = flusher(0, 0);
        let mut buf = TemplateBuffer::new();
        let mut stats = BinStats::new();
        push(&mut f, &mut buf, &mut stats, binned("a", Bin::Unchanged, 0, 10)).unwrap();
        push(&mut f, &mut buf, &mut stats, binned("b", Bin::Bridged, 0, 20)).unwrap();
        push(&mut f, &mut buf, &mut stats, binned("c", Bin::Remap, 0, 30)).unwrap();
        f.flush(&mut buf, true, &mut stats).unwrap();

        assert_eq!(positions(&u), vec![10]);
        assert_eq!(positions(&b), vec![20]);
        assert_eq!(positions(&r), vec![30]);
        assert_eq!(stats.emitted_total(), 3);
    }

    #[test]
    fn size_limit_forces_the_head_out() {
        let (mut f, u, _b, _r) = flusher(2, 0);
        let mut buf = TemplateBuffer::new();
        let mut stats = BinStats::new();
        push(&mut f, &mut buf, &mut stats, binned("a", Bin::Unchanged, 0, 10)).unwrap();
        assert_eq!(buf.size(), 1);
        push(&mut f, &mut buf, &mut stats, binned("b", Bin::Unchanged, 0, 20)).unwrap();
        // hit the limit: pops down to one below it
        assert_eq!(buf.size(), 1);
        push(&mut f, &mut buf, &mut stats, binned("c", Bin::Unchanged, 0, 30)).unwrap();
        assert_eq!(buf.size(), 1);
        assert_eq!(positions(&u), vec![10, 20]);
    }

    #[test]
    fn bases_limit_bounds_the_window_span() {
        let (mut f, u, _b, _r) = flusher(0, 100);
        let mut buf = TemplateBuffer::new();
        let mut stats = BinStats::new();
        push(&mut f, &mut buf, &mut stats, binned("a", Bin::Unchanged, 0, 0)).unwrap();
        push(&mut f, &mut buf, &mut stats, binned("b", Bin::Unchanged, 0, 50)).unwrap();
        assert_eq!(buf.size(), 2);
        push(&mut f, &mut buf, &mut stats, binned("c", Bin::Unchanged, 0, 150)).unwrap();
        // span 150 >= 100 pops "a"; span 100 >= 100 pops "b"; span 0 stops
        assert_eq!(buf.size(), 1);
        assert_eq!(positions(&u), vec![0, 50]);
    }

    #[test]
    fn refid_change_drains_the_buffer() {
        let (mut f, u, _b, _r) = flusher(0, 0);
        let mut buf = TemplateBuffer::new();
        let mut stats = BinStats::new();
        push(&mut f, &mut buf, &mut stats, binned("a", Bin::Unchanged, 0, 10)).unwrap();
        push(&mut f, &mut buf, &mut stats, binned("b", Bin::Unchanged, 0, 20)).unwrap();
        assert_eq!(buf.size(), 2);
        push(&mut f, &mut buf, &mut stats, binned("c", Bin::Unchanged, 1, 5)).unwrap();
        assert!(buf.is_empty());
        assert_eq!(positions(&u), vec![10, 20, 5]);
    }

    #[test]
    fn decreasing_pos_within_refid_is_unsorted() {
        let (mut f, _u, _b, _r) = flusher(0, 0);
        let mut buf = TemplateBuffer::new();
        let mut stats = BinStats::new();
        push(&mut f, &mut buf, &mut stats, binned("a", Bin::Unchanged, 0, 100)).unwrap();
        let err = push(&mut f, &mut buf, &mut stats, binned("b", Bin::Unchanged, 0, 90))
            .unwrap_err();
        assert_eq!(err.exit_code(), 13);
    }

    #[test]
    fn decreasing_refid_is_unsorted() {
        let (mut f, _u, _b, _r) = flusher(0, 0);
        let mut buf = TemplateBuffer::new();
        let mut stats = BinStats::new();
        push(&mut f, &mut buf, &mut stats, binned("a", Bin::Unchanged, 1, 100)).unwrap();
        let err = push(&mut f, &mut buf, &mut stats, binned("b", Bin::Unchanged, 0, 10))
            .unwrap_err();
        assert_eq!(err.exit_code(), 13);
    }

    #[test]
    fn mapped_after_unmapped_block_is_unsorted() {
        let (mut f, _u, _b, _r) = flusher(0, 0);
        let mut buf = TemplateBuffer::new();
        let mut stats = BinStats::new();
        push(&mut f, &mut buf, &mut stats, binned("a", Bin::Unchanged, -1, -1)).unwrap();
        let err = push(&mut f, &mut buf, &mut stats, binned("b", Bin::Unchanged, 0, 10))
            .unwrap_err();
        assert_eq!(err.exit_code(), 13);
    }

    #[test]
    fn allow_sorted_unmapped_relaxes_the_tail_rule() {
        let (u, b, r) = (VecSink::default(), VecSink::default(), VecSink::default());
        let cfg = BinnieConfig::new(Path::new("o.bam"), Path::new("b.bam"));
        let cfg = BinnieConfig::update_allow_sorted_unmapped(cfg, true);
        let mut f = Flusher::new(u.clone(), b, r, &cfg);
        let mut buf = TemplateBuffer::new();
        let mut stats = BinStats::new();
        push(&mut f, &mut buf, &mut stats, binned("a", Bin::Unchanged, -1, -1)).unwrap();
        push(&mut f, &mut buf, &mut stats, binned("b", Bin::Unchanged, 0, 10)).unwrap();
        f.flush(&mut buf, true, &mut stats).unwrap();
        assert_eq!(positions(&u), vec![-1, 10]);
    }

    #[test]
    fn drain_preserves_original_order_within_a_sink() {
        let (mut f, u, _b, r) = flusher(0, 0);
        let mut buf = TemplateBuffer::new();
        let mut stats = BinStats::new();
        for (i, bin) in [Bin::Unchanged, Bin::Remap, Bin::Unchanged, Bin::Remap]
            .iter()
            .enumerate()
        {
            let read = binned(&format!("q{}", i), *bin, 0, (i as i32 + 1) * 10);
            push(&mut f, &mut buf, &mut stats, read).unwrap();
        }
        f.flush(&mut buf, true, &mut stats).unwrap();
        assert_eq!(positions(&u), vec![10, 30]);
        assert_eq!(positions(&r), vec![20, 40]);
    }

    #[test]
    fn finish_closes_all_sinks() {
        let (mut f, u, b, r) = flusher(0, 0);
        f.finish().unwrap();
        assert!(*u.finished.borrow());
        assert!(*b.finished.borrow());
        assert!(*r.finished.borrow());
    }
}
