use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use log::{info, warn};

use crate::binner::Bin;
use crate::record::ReadId;

/// Counters accumulated over one binning run.
#[derive(Debug)]
pub struct BinStats {
    pub original_counter: u64, // total original records read
    pub bridge_counter: u64,   // total bridge records consumed
    pub matched_counter: u64,  // originals matched to a bridge record

    pub unchanged_counter: u64,
    pub bridged_counter: u64,
    pub remap_counter: u64,
    pub secondary_counter: u64, // discarded, never written

    pub rewritten_chain_counter: u64, // mate chains demoted to remap

    // warnings; processing continues past all of these
    pub missing_rg_counter: u64,
    pub unknown_segment_counter: u64,
    pub nonlinear_fi_counter: u64,
}

impl BinStats {
    pub fn new() -> BinStats {
        BinStats {
            original_counter: 0,
            bridge_counter: 0,
            matched_counter: 0,
            unchanged_counter: 0,
            bridged_counter: 0,
            remap_counter: 0,
            secondary_counter: 0,
            rewritten_chain_counter: 0,
            missing_rg_counter: 0,
            unknown_segment_counter: 0,
            nonlinear_fi_counter: 0,
        }
    }

    pub fn update_bin_count(&mut self, bin: Bin) {
        match bin {
            Bin::Unchanged => self.unchanged_counter += 1,
            Bin::Bridged => self.bridged_counter += 1,
            Bin::Remap => self.remap_counter += 1,
        }
    }

    pub fn update_secondary_count(&mut self) {
        self.secondary_counter += 1;
    }

    pub fn update_rewritten_chain_count(&mut self) {
        self.rewritten_chain_counter += 1;
    }

    pub fn update_missing_rg(&mut self) {
        self.missing_rg_counter += 1;
        if self.missing_rg_counter == 1 {
            warn!(
                "RG tag is missing; templates are identified by qname with an empty \
                 read group (further occurrences are not reported)"
            );
        }
    }

    pub fn update_unknown_segments(&mut self, id: &ReadId) {
        self.unknown_segment_counter += 1;
        warn!("cannot determine the segment count of template {}", id);
    }

    pub fn update_nonlinear_fi(&mut self, id: &ReadId, fi: i64) {
        self.nonlinear_fi_counter += 1;
        warn!("template {} carries a non-linear segment index {}", id, fi);
    }

    pub fn emitted_total(&self) -> u64 {
        self.unchanged_counter + self.bridged_counter + self.remap_counter
    }

    pub fn log_summary(&self) {
        info!(
            "{} original records processed, {} bridge records consumed ({} matched)",
            self.original_counter, self.bridge_counter, self.matched_counter
        );
        info!(
            "{} unchanged, {} bridged, {} remap, {} secondary discarded",
            self.unchanged_counter, self.bridged_counter, self.remap_counter, self.secondary_counter
        );
        if self.rewritten_chain_counter > 0 {
            info!(
                "{} mate chains were demoted to remap on disagreement",
                self.rewritten_chain_counter
            );
        }
    }

    pub fn dump_stats_to_file(&self, file_path: &Path) -> io::Result<()> {
        let f = File::create(file_path)?;
        let mut f = BufWriter::new(f);

        writeln!(f, "Total original records {}", self.original_counter)?;
        writeln!(f, "Total bridge records {}", self.bridge_counter)?;
        writeln!(f, "Matched to a bridge record {}", self.matched_counter)?;

        writeln!(f, "\nBin Statistics")?;
        writeln!(f, "\tUnchanged {}", self.unchanged_counter)?;
        writeln!(f, "\tBridged {}", self.bridged_counter)?;
        writeln!(f, "\tRemap {}", self.remap_counter)?;
        writeln!(f, "\tSecondary (discarded) {}", self.secondary_counter)?;
        writeln!(
            f,
            "\tMate chains demoted to remap {}",
            self.rewritten_chain_counter
        )?;

        writeln!(f, "\nWarnings")?;
        writeln!(f, "\tMissing RG tags {}", self.missing_rg_counter)?;
        writeln!(f, "\tUnknown segment counts {}", self.unknown_segment_counter)?;
        writeln!(f, "\tNon-linear segment indices {}", self.nonlinear_fi_counter)?;

        f.flush()
    }
}
