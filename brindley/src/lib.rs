use std::error::Error;
use std::path::Path;

use log::info;

pub mod avl;
pub mod coord_map;

pub use self::coord_map::{CoordMap, MapSegment};

pub fn load_coord_map(map_file: &Path) -> Result<CoordMap, Box<dyn Error>> {
    info!("Loading liftover map from {}...", map_file.display());
    let map = CoordMap::from_path(map_file)?;
    info!(
        "Liftover map is ready ({} segments over {} chromosomes).",
        map.segment_count(),
        map.chrom_count()
    );
    Ok(map)
}
