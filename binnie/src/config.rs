use std::path::{Path, PathBuf};

const DEFAULT_BUFFER_SIZE: u64 = 100_000;

/// Configuration of a binning run. Built once by the caller and passed by
/// reference into the pipeline; there is no module-level mutable state.
#[derive(Debug, Clone)]
pub struct BinnieConfig {
    pub original: PathBuf,
    pub bridge: PathBuf,
    pub unchanged_out: PathBuf,
    pub bridged_out: PathBuf,
    pub remap_out: PathBuf,
    pub stats_out: Option<PathBuf>,
    /// Maximum buffered reads before a forced flush; 0 disables the trigger.
    pub buffer_size_limit: u64,
    /// Maximum position range spanned by the buffer; 0 disables the trigger.
    pub buffer_bases_limit: u64,
    /// Match templates by qname alone, ignoring the RG tag.
    pub ignore_rg: bool,
    /// Accept unmapped reads placed before the end of the stream.
    pub allow_sorted_unmapped: bool,
    /// Predicate marking reads whose original coordinates no longer exist.
    /// Left unset, the corresponding remap branch is unreachable.
    pub coord_deleted: Option<fn(&bam::Record) -> bool>,
}

impl BinnieConfig {
    pub fn new(original: &Path, bridge: &Path) -> BinnieConfig {
        BinnieConfig {
            original: original.to_path_buf(),
            bridge: bridge.to_path_buf(),
            unchanged_out: with_suffix(original, "_unchanged.bam"),
            bridged_out: with_suffix(original, "_bridged.bam"),
            remap_out: with_suffix(original, "_remap.bam"),
            stats_out: None,
            buffer_size_limit: DEFAULT_BUFFER_SIZE,
            buffer_bases_limit: 0,
            ignore_rg: false,
            allow_sorted_unmapped: false,
            coord_deleted: None,
        }
    }

    pub fn update_unchanged_out(mut cfg: BinnieConfig, path: &Path) -> BinnieConfig {
        cfg.unchanged_out = path.to_path_buf();
        cfg
    }

    pub fn update_bridged_out(mut cfg: BinnieConfig, path: &Path) -> BinnieConfig {
        cfg.bridged_out = path.to_path_buf();
        cfg
    }

    pub fn update_remap_out(mut cfg: BinnieConfig, path: &Path) -> BinnieConfig {
        cfg.remap_out = path.to_path_buf();
        cfg
    }

    pub fn update_stats_out(mut cfg: BinnieConfig, path: &Path) -> BinnieConfig {
        cfg.stats_out = Some(path.to_path_buf());
        cfg
    }

    pub fn update_buffer_size(mut cfg: BinnieConfig, reads: u64) -> BinnieConfig {
        cfg.buffer_size_limit = reads;
        cfg
    }

    pub fn update_buffer_bases(mut cfg: BinnieConfig, bases: u64) -> BinnieConfig {
        cfg.buffer_bases_limit = bases;
        cfg
    }

    pub fn update_ignore_rg(mut cfg: BinnieConfig, ignore_rg: bool) -> BinnieConfig {
        cfg.ignore_rg = ignore_rg;
        cfg
    }

    pub fn update_allow_sorted_unmapped(mut cfg: BinnieConfig, allow: bool) -> BinnieConfig {
        cfg.allow_sorted_unmapped = allow;
        cfg
    }

    pub fn update_coord_deleted(
        mut cfg: BinnieConfig,
        pred: fn(&bam::Record) -> bool,
    ) -> BinnieConfig {
        cfg.coord_deleted = Some(pred);
        cfg
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}
