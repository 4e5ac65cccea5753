use std::io;

use log::{debug, info};

use crate::binner;
use crate::buffer::TemplateBuffer;
use crate::config::BinnieConfig;
use crate::errors::BinnieError;
use crate::flusher::{BinSink, Flusher};
use crate::stats::BinStats;
use crate::stream_pair::StreamPair;

const PROGRESS_STEP: u64 = 1_000_000;

/// One pass over the paired streams: match, bin, buffer, flush.
///
/// A single-threaded loop; all mutable state (buffer, chain registry, sort
/// trackers, look-ahead) lives in the arguments and nothing is shared.
pub fn run_pipeline<O, B, S>(
    cfg: &BinnieConfig,
    stream: &mut StreamPair<O, B>,
    flusher: &mut Flusher<S>,
) -> Result<BinStats, BinnieError>
where
    O: Iterator<Item = io::Result<bam::Record>>,
    B: Iterator<Item = io::Result<bam::Record>>,
    S: BinSink,
{
    let mut buffer = TemplateBuffer::new();
    let mut stats = BinStats::new();

    while let Some(pair) = stream.next_pair()? {
        if stream.original_count() % PROGRESS_STEP == 0 {
            info!("{} original records were processed", stream.original_count());
        }

        match binner::bin_read(pair, cfg, &mut stats)? {
            None => stats.update_secondary_count(),
            Some(read) => {
                flusher.note_enqueue(&read)?;
                if buffer.enqueue(read)? {
                    stats.update_rewritten_chain_count();
                }
                flusher.flush(&mut buffer, false, &mut stats)?;
            }
        }
    }

    debug!("input exhausted, draining {} buffered reads", buffer.size());
    flusher.flush(&mut buffer, true, &mut stats)?;
    if !buffer.is_empty() {
        return Err(BinnieError::BufferNotEmpty(buffer.size()));
    }
    stream.finish()?;
    flusher.finish()?;

    stats.original_counter = stream.original_count();
    stats.bridge_counter = stream.bridge_count();
    stats.matched_counter = stream.matched_count();
    Ok(stats)
}
