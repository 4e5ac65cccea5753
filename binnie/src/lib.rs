use log::info;

pub mod binner;
pub mod buffer;
pub mod config;
pub mod errors;
pub mod flusher;
pub mod pipeline;
pub mod record;
pub mod stats;
pub mod stream_pair;

pub use self::config::BinnieConfig;
pub use self::errors::BinnieError;
pub use self::stats::BinStats;

/// Runs one binning pass: opens both alignment streams and the three sinks,
/// then drives the pipeline to completion.
pub fn bin_alignments(cfg: &BinnieConfig) -> Result<BinStats, BinnieError> {
    info!("Opening original stream {}...", cfg.original.display());
    let original = bam::BamReader::from_path(&cfg.original, 0)
        .map_err(|e| BinnieError::InputOpen(cfg.original.clone(), e))?;
    info!("Opening bridge stream {}...", cfg.bridge.display());
    let bridge = bam::BamReader::from_path(&cfg.bridge, 0)
        .map_err(|e| BinnieError::InputOpen(cfg.bridge.clone(), e))?;

    // unchanged and remap inherit the original's header, bridged the
    // bridge's; headers are written before any record
    let orig_header = original.header().clone();
    let bridge_header = bridge.header().clone();

    let unchanged = bam::BamWriter::from_path(&cfg.unchanged_out, orig_header.clone())
        .map_err(|e| BinnieError::OutputOpen(cfg.unchanged_out.clone(), e))?;
    let bridged = bam::BamWriter::from_path(&cfg.bridged_out, bridge_header)
        .map_err(|e| BinnieError::OutputOpen(cfg.bridged_out.clone(), e))?;
    let remap = bam::BamWriter::from_path(&cfg.remap_out, orig_header)
        .map_err(|e| BinnieError::OutputOpen(cfg.remap_out.clone(), e))?;

    let mut stream =
        stream_pair::StreamPair::new(original, bridge, cfg.ignore_rg, cfg.allow_sorted_unmapped);
    let mut flusher = flusher::Flusher::new(unchanged, bridged, remap, cfg);

    info!("Binning reads...");
    let stats = pipeline::run_pipeline(cfg, &mut stream, &mut flusher)?;
    stats.log_summary();

    if let Some(path) = &cfg.stats_out {
        stats
            .dump_stats_to_file(path)
            .map_err(BinnieError::Write)?;
    }
    info!("Binning is complete.");
    Ok(stats)
}
