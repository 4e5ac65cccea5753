use std::fmt;

use ascii::AsciiString;
use bam::record::tags::TagValue;

use crate::errors::BinnieError;

pub const FLAG_PAIRED: u16 = 0x1;
pub const FLAG_READ1: u16 = 0x40;
pub const FLAG_READ2: u16 = 0x80;

/// Normalised mapping-quality state of an alignment record.
///
/// A reported mapq of 255 means "unavailable" and is coerced to `Unmapped`
/// for binning purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MappingQuality {
    Unmapped,
    Zero,
    Positive(u8),
}

impl MappingQuality {
    pub fn from_record(rec: &bam::Record) -> MappingQuality {
        if !rec.flag().is_mapped() {
            return MappingQuality::Unmapped;
        }
        match rec.mapq() {
            0 => MappingQuality::Zero,
            255 => MappingQuality::Unmapped,
            q => MappingQuality::Positive(q),
        }
    }
}

/// Template identity: the pair (read group, qname).
///
/// The read group is the RG tag value, or empty when the tag is missing or
/// read groups are ignored. All reads of a template share this identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReadId {
    pub rg: AsciiString,
    pub qname: AsciiString,
}

impl ReadId {
    pub fn from_record(rec: &bam::Record, ignore_rg: bool) -> Result<ReadId, BinnieError> {
        let qname = AsciiString::from_ascii(rec.name().to_vec())
            .map_err(|_| BinnieError::UidFormat(String::from_utf8_lossy(rec.name()).into_owned()))?;
        let rg = if ignore_rg {
            AsciiString::new()
        } else {
            read_group(rec)?.unwrap_or_else(AsciiString::new)
        };
        Ok(ReadId { rg, qname })
    }
}

impl fmt::Display for ReadId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.rg.is_empty() {
            write!(f, "{}", self.qname)
        } else {
            write!(f, "{}:{}", self.rg, self.qname)
        }
    }
}

pub fn read_group(rec: &bam::Record) -> Result<Option<AsciiString>, BinnieError> {
    match rec.tags().get(b"RG") {
        Some(TagValue::String(s, _)) => AsciiString::from_ascii(s.to_vec())
            .map(Some)
            .map_err(|_| BinnieError::UidFormat(String::from_utf8_lossy(s).into_owned())),
        _ => Ok(None),
    }
}

pub fn tag_int(rec: &bam::Record, name: &[u8; 2]) -> Option<i64> {
    match rec.tags().get(name) {
        Some(TagValue::Int(v, _)) => Some(v),
        _ => None,
    }
}

/// Fix-ups applied to a bridge alignment before it replaces the original:
/// segment flags raised where the original carries them, the FI tag copied
/// over, and the RG tag copied when read groups were ignored for matching.
pub fn apply_bridge_fixups(
    bridge: &mut bam::Record,
    orig: &bam::Record,
    ignore_rg: bool,
) -> Result<(), BinnieError> {
    let oflag = orig.flag();
    let mut bits = 0u16;
    if oflag.is_paired() {
        bits |= FLAG_PAIRED;
    }
    if oflag.first_in_pair() {
        bits |= FLAG_READ1;
    }
    if oflag.last_in_pair() {
        bits |= FLAG_READ2;
    }
    bridge.flag_mut().0 |= bits;

    if let Some(fi) = tag_int(orig, b"FI") {
        bridge.tags_mut().remove(b"FI");
        bridge.tags_mut().push_num(b"FI", fi as i32);
    }

    if ignore_rg {
        if let Some(rg) = read_group(orig)? {
            bridge.tags_mut().remove(b"RG");
            bridge.tags_mut().push_string(b"RG", rg.as_bytes());
        }
    }
    Ok(())
}

#[cfg(test)]
pub mod test_util {
    /// Builds a synthetic alignment record for unit tests. Negative refid or
    /// pos are left at the record defaults (-1).
    pub fn rec(name: &str, flag: u16, refid: i32, pos: i32, mapq: u8) -> bam::Record {
        let mut r = bam::Record::new();
        r.set_name(name.bytes());
        r.flag_mut().0 = flag;
        if refid >= 0 {
            r.set_ref_id(refid);
        }
        if pos >= 0 {
            r.set_start(pos);
        }
        r.set_mapq(mapq);
        r
    }
}

#[cfg(test)]
mod tests {
    use super::test_util::rec;
    use super::*;

    const FLAG_UNMAP: u16 = 0x4;

    #[test]
    fn mapq_normalisation() {
        let unmapped = rec("r", FLAG_UNMAP, -1, -1, 0);
        assert_eq!(
            MappingQuality::from_record(&unmapped),
            MappingQuality::Unmapped
        );

        let zero = rec("r", 0, 0, 100, 0);
        assert_eq!(MappingQuality::from_record(&zero), MappingQuality::Zero);

        let positive = rec("r", 0, 0, 100, 37);
        assert_eq!(
            MappingQuality::from_record(&positive),
            MappingQuality::Positive(37)
        );
    }

    #[test]
    fn mapq_255_is_coerced_to_unmapped() {
        let unavailable = rec("r", 0, 0, 100, 255);
        assert_eq!(
            MappingQuality::from_record(&unavailable),
            MappingQuality::Unmapped
        );
    }

    #[test]
    fn identity_includes_read_group() {
        let mut a = rec("q1", 0, 0, 1, 30);
        a.tags_mut().push_string(b"RG", b"grp1");
        let mut b = rec("q1", 0, 0, 1, 30);
        b.tags_mut().push_string(b"RG", b"grp2");

        let ia = ReadId::from_record(&a, false).unwrap();
        let ib = ReadId::from_record(&b, false).unwrap();
        assert_ne!(ia, ib);

        let ia = ReadId::from_record(&a, true).unwrap();
        let ib = ReadId::from_record(&b, true).unwrap();
        assert_eq!(ia, ib);
    }

    #[test]
    fn missing_read_group_is_empty() {
        let a = rec("q1", 0, 0, 1, 30);
        let id = ReadId::from_record(&a, false).unwrap();
        assert!(id.rg.is_empty());
        assert_eq!(id.qname.as_str(), "q1");
        assert_eq!(format!("{}", id), "q1");
    }

    #[test]
    fn fixups_copy_segment_flags_and_fi() {
        let mut orig = rec("q1", FLAG_PAIRED | FLAG_READ1 | FLAG_UNMAP, -1, -1, 0);
        orig.tags_mut().push_num(b"FI", 1i32);

        let mut bridge = rec("q1", 0, 2, 500, 40);
        bridge.tags_mut().push_num(b"FI", 9i32);

        apply_bridge_fixups(&mut bridge, &orig, false).unwrap();
        let bflag = bridge.flag();
        assert!(bflag.is_paired());
        assert!(bflag.first_in_pair());
        assert!(!bflag.last_in_pair());
        assert_eq!(tag_int(&bridge, b"FI"), Some(1));
    }

    #[test]
    fn fixups_copy_rg_only_when_ignoring_read_groups() {
        let mut orig = rec("q1", FLAG_UNMAP, -1, -1, 0);
        orig.tags_mut().push_string(b"RG", b"grp1");

        let mut bridge = rec("q1", 0, 2, 500, 40);
        apply_bridge_fixups(&mut bridge, &orig, false).unwrap();
        assert!(read_group(&bridge).unwrap().is_none());

        let mut bridge = rec("q1", 0, 2, 500, 40);
        apply_bridge_fixups(&mut bridge, &orig, true).unwrap();
        assert_eq!(read_group(&bridge).unwrap().unwrap().as_str(), "grp1");
    }
}
