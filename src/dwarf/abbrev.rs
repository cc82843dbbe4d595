// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Reader for `.debug_abbrev` abbreviation tables.

use super::consts;
use super::cursor::Cursor;
use super::{Error, Result};
use lru::LruCache;
use smallvec::SmallVec;
use std::cell::RefCell;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::rc::Rc;

/// Maximum number of decoded abbreviation tables kept around.
///
/// Compilers commonly share one table between many units, so a small cache
/// removes almost all re-decoding.
const TABLE_CACHE_SIZE: usize = 64;

/// One attribute specification within an abbreviation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrSpec {
    /// Attribute code (`DW_AT_*`).
    pub attr: u64,

    /// Form code (`DW_FORM_*`) deciding the value encoding.
    pub form: u64,

    /// Constant value carried by `DW_FORM_implicit_const` specs.
    pub implicit_const: i64,
}

/// Declaration schema for a family of DIEs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Abbrev {
    /// Code DIEs use to select this abbreviation.
    pub code: u64,

    /// DIE tag (`DW_TAG_*`).
    pub tag: u64,

    /// Whether DIEs of this shape own a chain of child DIEs.
    pub has_children: bool,

    /// Attribute specifications, in declaration order.
    pub attrs: SmallVec<[AttrSpec; 8]>,
}

/// One abbreviation table, keyed by abbreviation code.
#[derive(Debug, Default)]
pub struct AbbrevTable {
    by_code: HashMap<u64, Abbrev>,
}

impl AbbrevTable {
    /// Parses the table starting at `offset` in `.debug_abbrev`.
    ///
    /// A code of zero terminates the table. Attribute order within each
    /// abbreviation is preserved; it dictates the byte layout of every DIE
    /// that references the abbreviation.
    pub fn parse(section: &[u8], offset: u64) -> Result<Self> {
        let pos = usize::try_from(offset).map_err(|_| Error::Truncated)?;
        let mut cur = Cursor::with_pos(section, pos).ok_or(Error::Truncated)?;
        let mut by_code = HashMap::new();

        loop {
            let code = cur.uleb()?;
            if code == 0 {
                break;
            }

            let tag = cur.uleb()?;
            let has_children = cur.u8()? == consts::DW_CHILDREN_yes;

            let mut attrs = SmallVec::new();
            loop {
                let attr = cur.uleb()?;
                let form = cur.uleb()?;
                if attr == 0 && form == 0 {
                    break;
                }

                let implicit_const = if form == consts::DW_FORM_implicit_const {
                    cur.sleb()?
                } else {
                    0
                };

                attrs.push(AttrSpec {
                    attr,
                    form,
                    implicit_const,
                });
            }

            by_code.insert(
                code,
                Abbrev {
                    code,
                    tag,
                    has_children,
                    attrs,
                },
            );
        }

        Ok(Self { by_code })
    }

    /// Looks up the abbreviation for the given code.
    pub fn get(&self, code: u64) -> Option<&Abbrev> {
        self.by_code.get(&code)
    }

    /// Number of abbreviations in this table.
    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }
}

/// Cache of decoded abbreviation tables, keyed by section offset.
pub struct AbbrevCache {
    cache: RefCell<LruCache<u64, Rc<AbbrevTable>>>,
}

impl AbbrevCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        let cache_size = NonZeroUsize::new(TABLE_CACHE_SIZE).expect("TABLE_CACHE_SIZE must be >0");

        Self {
            cache: RefCell::new(LruCache::new(cache_size)),
        }
    }

    /// Returns the table at `offset`, decoding it on first use.
    pub fn table_at(&self, section: &[u8], offset: u64) -> Result<Rc<AbbrevTable>> {
        let mut cache = self.cache.borrow_mut();

        if let Some(table) = cache.get(&offset) {
            return Ok(table.clone());
        }

        let table = Rc::new(AbbrevTable::parse(section, offset)?);
        cache.put(offset, table.clone());

        Ok(table)
    }
}

impl Default for AbbrevCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // code 1: compile_unit, children, [(name, string)]
    // code 2: subprogram, no children, [(low_pc, addr), (decl_file, implicit_const -9)]
    const TABLE: &[u8] = &[
        0x01, 0x11, 0x01, 0x03, 0x08, 0x00, 0x00, //
        0x02, 0x2e, 0x00, 0x11, 0x01, 0x3a, 0x21, 0x77, 0x00, 0x00, //
        0x00,
    ];

    #[test]
    fn parse_table() {
        let table = AbbrevTable::parse(TABLE, 0).unwrap();
        assert_eq!(table.len(), 2);

        let cu = table.get(1).unwrap();
        assert_eq!(cu.tag, consts::DW_TAG_compile_unit);
        assert!(cu.has_children);
        assert_eq!(&cu.attrs[..], &[AttrSpec {
            attr: consts::DW_AT_name,
            form: consts::DW_FORM_string,
            implicit_const: 0,
        }]);

        let sub = table.get(2).unwrap();
        assert_eq!(sub.tag, consts::DW_TAG_subprogram);
        assert!(!sub.has_children);
        assert_eq!(sub.attrs.len(), 2);
        assert_eq!(sub.attrs[1].form, consts::DW_FORM_implicit_const);
        assert_eq!(sub.attrs[1].implicit_const, -9);

        // Every referenced code resolves; code 0 and unknown codes don't.
        assert!(table.get(0).is_none());
        assert!(table.get(3).is_none());
    }

    #[test]
    fn tables_at_offsets() {
        // Two tables back to back; the second starts after the first's
        // zero terminator.
        let mut section = TABLE.to_vec();
        let second_offset = section.len() as u64;
        section.extend_from_slice(&[0x01, 0x2e, 0x00, 0x03, 0x0e, 0x00, 0x00, 0x00]);

        let second = AbbrevTable::parse(&section, second_offset).unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second.get(1).unwrap().tag, consts::DW_TAG_subprogram);
    }

    #[test]
    fn truncated_table() {
        // Ends in the middle of an attribute spec pair.
        let bytes = &[0x01, 0x11, 0x01, 0x03];
        assert!(matches!(
            AbbrevTable::parse(bytes, 0),
            Err(Error::Truncated)
        ));
    }

    #[test]
    fn cache_reuses_tables() {
        let cache = AbbrevCache::new();
        let a = cache.table_at(TABLE, 0).unwrap();
        let b = cache.table_at(TABLE, 0).unwrap();
        assert!(Rc::ptr_eq(&a, &b));
    }
}
