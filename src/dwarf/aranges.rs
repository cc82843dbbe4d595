// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Reader for the `.debug_aranges` address-range index.

use super::cursor::Cursor;
use super::{Error, Result};
use crate::{debug, trace, VirtAddr};
use std::collections::HashMap;

/// One contiguous address range belonging to a compilation unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeEntry {
    /// First address of the range.
    pub address: VirtAddr,

    /// Length of the range in bytes.
    pub length: u64,
}

impl RangeEntry {
    /// The range as a half-open interval.
    pub fn range(&self) -> std::ops::Range<VirtAddr> {
        self.address..self.address.saturating_add(self.length)
    }
}

/// Address ranges per compilation unit, keyed by the unit's header offset
/// in `.debug_info`.
#[derive(Debug, Default)]
pub struct ArangeTable {
    by_unit: HashMap<u64, Vec<RangeEntry>>,
}

impl ArangeTable {
    /// Parses all sub-tables of a `.debug_aranges` section.
    ///
    /// Each sub-table carries its own header padding: entries start at the
    /// next multiple of twice the address size, counted from the sub-table
    /// start, and an all-zero pair terminates the list.
    pub fn parse(section: &[u8]) -> Result<Self> {
        let mut cur = Cursor::new(section);
        let mut by_unit = HashMap::new();

        while !cur.is_empty() {
            let table_start = cur.pos();
            let (unit_length, format) = cur.initial_length()?;

            let after_length = cur.pos();
            let next_table = after_length
                .checked_add(usize::try_from(unit_length).map_err(|_| Error::Truncated)?)
                .ok_or(Error::Truncated)?;

            let version = cur.u16()?;
            let info_offset = cur.offset(format)?;
            let address_size = cur.u8()?;
            let segment_size = cur.u8()?;

            if segment_size != 0 {
                debug!(
                    "Skipping aranges sub-table at {table_start:#x} with \
                     segmented addresses (segment size {segment_size})"
                );
                cur.set_pos(next_table)?;
                continue;
            }

            if !matches!(address_size, 2 | 4 | 8) {
                return Err(Error::InconsistentLength);
            }

            // Pad to the next entry boundary.
            let tuple_size = 2 * address_size as usize;
            let misalign = (cur.pos() - table_start) % tuple_size;
            if misalign != 0 {
                cur.skip(tuple_size - misalign)?;
            }

            let mut entries = Vec::new();
            loop {
                // The terminating zero pair must appear before the declared
                // sub-table length runs out.
                if cur.pos() + tuple_size > next_table {
                    return Err(Error::Truncated);
                }

                let address = cur.uint(address_size as usize)?;
                let length = cur.uint(address_size as usize)?;
                if address == 0 && length == 0 {
                    break;
                }

                entries.push(RangeEntry { address, length });
            }

            trace!(
                "aranges: unit {info_offset:#x} v{version}: {} ranges",
                entries.len()
            );

            by_unit.insert(info_offset, entries);
            cur.set_pos(next_table)?;
        }

        Ok(Self { by_unit })
    }

    /// The ranges recorded for the unit at the given `.debug_info` offset.
    pub fn ranges_for(&self, unit_offset: u64) -> Option<&[RangeEntry]> {
        self.by_unit.get(&unit_offset).map(Vec::as_slice)
    }

    /// Number of units with recorded ranges.
    pub fn len(&self) -> usize {
        self.by_unit.len()
    }

    /// Whether any unit has recorded ranges.
    pub fn is_empty(&self) -> bool {
        self.by_unit.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub_table(info_offset: u32, address_size: u8, pairs: &[(u64, u64)]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&2u16.to_le_bytes());
        body.extend_from_slice(&info_offset.to_le_bytes());
        body.push(address_size);
        body.push(0); // segment size

        // Header padding: the length field itself counts toward alignment.
        let tuple = 2 * address_size as usize;
        while (4 + body.len()) % tuple != 0 {
            body.push(0);
        }

        for (addr, len) in pairs.iter().chain(&[(0, 0)]) {
            body.extend_from_slice(&addr.to_le_bytes()[..address_size as usize]);
            body.extend_from_slice(&len.to_le_bytes()[..address_size as usize]);
        }

        let mut out = (body.len() as u32).to_le_bytes().to_vec();
        out.extend_from_slice(&body);
        out
    }

    #[test]
    fn eight_byte_addresses() {
        let section = sub_table(0x40, 8, &[(0x1000, 0x20), (0x4000, 0x40)]);
        let table = ArangeTable::parse(&section).unwrap();

        assert_eq!(table.len(), 1);
        assert_eq!(
            table.ranges_for(0x40).unwrap(),
            &[
                RangeEntry { address: 0x1000, length: 0x20 },
                RangeEntry { address: 0x4000, length: 0x40 },
            ]
        );
        assert_eq!(table.ranges_for(0x40).unwrap()[0].range(), 0x1000..0x1020);
        assert!(table.ranges_for(0x41).is_none());
    }

    #[test]
    fn four_byte_addresses_and_multiple_tables() {
        let mut section = sub_table(0x0, 4, &[(0x8000, 0x10)]);
        section.extend_from_slice(&sub_table(0x90, 4, &[(0x9000, 0x08)]));

        let table = ArangeTable::parse(&section).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.ranges_for(0x0).unwrap(),
            &[RangeEntry { address: 0x8000, length: 0x10 }]
        );
        assert_eq!(
            table.ranges_for(0x90).unwrap(),
            &[RangeEntry { address: 0x9000, length: 0x08 }]
        );
    }

    #[test]
    fn segmented_sub_table_is_skipped() {
        let mut section = Vec::new();

        // Sub-table with a nonzero segment size; its body is opaque to us.
        let mut seg = Vec::new();
        seg.extend_from_slice(&2u16.to_le_bytes());
        seg.extend_from_slice(&0x10u32.to_le_bytes());
        seg.push(8);
        seg.push(4);
        section.extend_from_slice(&(seg.len() as u32).to_le_bytes());
        section.extend_from_slice(&seg);

        section.extend_from_slice(&sub_table(0x20, 8, &[(0x2000, 0x10)]));

        let table = ArangeTable::parse(&section).unwrap();
        assert_eq!(table.len(), 1);
        assert!(table.ranges_for(0x10).is_none());
        assert!(table.ranges_for(0x20).is_some());
    }

    #[test]
    fn missing_terminator() {
        let mut section = sub_table(0x0, 8, &[(0x1000, 0x20)]);

        // Chop off the terminating zero pair; the entry loop must then run
        // into the end of the declared length.
        section.truncate(section.len() - 16);
        let unit_length = (section.len() - 4) as u32;
        section[..4].copy_from_slice(&unit_length.to_le_bytes());

        assert!(matches!(
            ArangeTable::parse(&section),
            Err(Error::Truncated)
        ));
    }

    #[test]
    fn empty_section() {
        let table = ArangeTable::parse(&[]).unwrap();
        assert!(table.is_empty());
    }
}
