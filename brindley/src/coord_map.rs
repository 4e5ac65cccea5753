use std::error::Error;
use std::fs::File;
use std::io;
use std::path::Path;

use ahash::AHashMap;
use log::debug;
use serde::Deserialize;

use crate::avl::IntervalTree;

/// One line of a liftover map file: an interval on the source reference and
/// the range it maps onto in the target reference.
#[derive(Debug, Clone, Deserialize)]
pub struct MapSegment {
    pub from_chrom: String,
    pub from_start: i64,
    pub from_end: i64,
    pub to_chrom: String,
    pub to_start: i64,
    pub to_end: i64,
}

/// Point-to-point coordinate translation between two references.
///
/// One balanced interval tree per source chromosome; built once from a
/// tab-separated map file and read-only afterwards. Intervals of a
/// chromosome are assumed non-overlapping.
pub struct CoordMap {
    trees: AHashMap<String, IntervalTree>,
    n_segments: u64,
}

impl CoordMap {
    pub fn new() -> CoordMap {
        CoordMap {
            trees: AHashMap::default(),
            n_segments: 0,
        }
    }

    /// Loads a map file: `from_chrom from_start from_end to_chrom to_start
    /// to_end`, tab-separated, first line a header.
    pub fn from_path(file_name: &Path) -> Result<CoordMap, Box<dyn Error>> {
        let file = File::open(file_name)?;
        CoordMap::from_reader(file)
    }

    pub fn from_reader<R: io::Read>(input: R) -> Result<CoordMap, Box<dyn Error>> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .from_reader(input);

        let mut map = CoordMap::new();
        let mut raw_record = csv::ByteRecord::new();
        while rdr.read_byte_record(&mut raw_record)? {
            let seg: MapSegment = raw_record.deserialize(None)?;
            map.insert(seg);
        }
        debug!(
            "loaded {} liftover segments over {} chromosomes",
            map.n_segments,
            map.trees.len()
        );
        Ok(map)
    }

    pub fn insert(&mut self, seg: MapSegment) {
        self.n_segments += 1;
        self.trees
            .entry(seg.from_chrom.clone())
            .or_insert_with(IntervalTree::new)
            .insert(seg);
    }

    pub fn segment_count(&self) -> u64 {
        self.n_segments
    }

    pub fn chrom_count(&self) -> usize {
        self.trees.len()
    }

    /// Translates a point, or `None` when no interval contains it. A target
    /// range stored end-before-start is swapped first; the mapping is a
    /// plain translation preserving the offset from the swapped start.
    pub fn map_point(&self, chrom: &str, pos: i64) -> Option<(&str, i64)> {
        let seg = self.trees.get(chrom)?.find(pos)?;
        let to_start = if seg.to_start > seg.to_end {
            seg.to_end
        } else {
            seg.to_start
        };
        Some((seg.to_chrom.as_str(), to_start + (pos - seg.from_start)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(chrom: &str, start: i64, end: i64, to_chrom: &str, to_start: i64, to_end: i64) -> MapSegment {
        MapSegment {
            from_chrom: chrom.to_string(),
            from_start: start,
            from_end: end,
            to_chrom: to_chrom.to_string(),
            to_start,
            to_end,
        }
    }

    #[test]
    fn parses_a_map_file_and_skips_the_header() {
        let text = "from_chrom\tfrom_start\tfrom_end\tto_chrom\tto_start\tto_end\n\
                    chr1\t100\t199\tbridge1\t0\t99\n\
                    chr1\t300\t399\tbridge1\t100\t199\n\
                    chr2\t0\t49\tbridge2\t0\t49\n";
        let map = CoordMap::from_reader(text.as_bytes()).unwrap();
        assert_eq!(map.segment_count(), 3);
        assert_eq!(map.chrom_count(), 2);
        assert_eq!(map.map_point("chr1", 150), Some(("bridge1", 50)));
        assert_eq!(map.map_point("chr1", 310), Some(("bridge1", 110)));
        assert_eq!(map.map_point("chr2", 7), Some(("bridge2", 7)));
    }

    #[test]
    fn malformed_rows_are_errors() {
        let text = "header line\nchr1\t100\tnot_a_number\tb\t0\t99\n";
        assert!(CoordMap::from_reader(text.as_bytes()).is_err());
    }

    #[test]
    fn unknown_chromosome_has_no_mapping() {
        let mut map = CoordMap::new();
        map.insert(seg("chr1", 0, 99, "b", 0, 99));
        assert_eq!(map.map_point("chrX", 10), None);
    }

    #[test]
    fn gaps_between_intervals_have_no_mapping() {
        let mut map = CoordMap::new();
        map.insert(seg("chr1", 0, 99, "b", 0, 99));
        map.insert(seg("chr1", 200, 299, "b", 100, 199));
        assert_eq!(map.map_point("chr1", 150), None);
        assert_eq!(map.map_point("chr1", 250), Some(("b", 150)));
    }

    #[test]
    fn identity_map_round_trips() {
        let mut map = CoordMap::new();
        for i in 0..50 {
            let start = i * 100;
            map.insert(seg("chr1", start, start + 99, "chr1", start, start + 99));
        }
        for &pos in &[0, 1, 99, 100, 2_550, 4_999] {
            assert_eq!(map.map_point("chr1", pos), Some(("chr1", pos)));
        }
    }

    #[test]
    fn reversed_target_range_is_swapped_not_inverted() {
        let mut map = CoordMap::new();
        map.insert(seg("chr1", 100, 200, "b", 500, 400));
        // offset 50 from the swapped start 400
        assert_eq!(map.map_point("chr1", 150), Some(("b", 450)));
        assert_eq!(map.map_point("chr1", 100), Some(("b", 400)));
        assert_eq!(map.map_point("chr1", 200), Some(("b", 500)));
    }

    #[test]
    fn lookup_descends_by_interval_bounds_not_by_end_comparison() {
        // a containing interval sitting left of later-inserted siblings
        // whose ends are larger; deciding the descent by comparing ends
        // would walk past it
        let mut map = CoordMap::new();
        map.insert(seg("chr1", 500, 599, "b", 0, 99));
        map.insert(seg("chr1", 100, 299, "b", 100, 299));
        map.insert(seg("chr1", 700, 999, "b", 300, 599));
        assert_eq!(map.map_point("chr1", 250), Some(("b", 250)));
        assert_eq!(map.map_point("chr1", 550), Some(("b", 50)));
        assert_eq!(map.map_point("chr1", 800), Some(("b", 400)));
        assert_eq!(map.map_point("chr1", 400), None);
    }
}
