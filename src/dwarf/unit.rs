// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Compilation-unit headers and the DIE walker.
//!
//! [`UnitIter`] steps through `.debug_info` in file order. Every DIE's
//! attribute list is consumed form-by-form so the cursor always lands on
//! the next DIE, but only two shapes carry extraction semantics: the
//! `compile_unit` root fills the unit metadata and `subprogram` entries
//! become function records keyed by their entry address.

use super::abbrev::{Abbrev, AbbrevCache};
use super::cursor::Cursor;
use super::form::{self, FormValue};
use super::{consts, Encoding, Error, Format, Lang, Result, Sections};
use crate::{debug, trace, VirtAddr};
use fallible_iterator::FallibleIterator;
use std::collections::{BTreeMap, HashMap};

/// Decoded header of one compilation unit.
#[derive(Debug)]
pub struct UnitHeader {
    /// Section offset of the unit header.
    pub offset: u64,

    /// Length of the unit, excluding the initial-length field itself.
    pub unit_length: u64,

    /// 32-bit or 64-bit DWARF format.
    pub format: Format,

    /// DWARF version, 2 through 5.
    pub version: u16,

    /// Unit type; pre-v5 headers are always full compilation units.
    pub unit_type: u8,

    /// Offset of this unit's abbreviation table in `.debug_abbrev`.
    pub abbrev_offset: u64,

    /// Size of a target address in bytes.
    pub address_size: u8,

    /// Unit ID of skeleton and split units.
    pub unit_id: Option<u64>,

    /// Type signature of type units.
    pub type_signature: Option<u64>,

    /// Type DIE offset of type units.
    pub type_offset: Option<u64>,

    /// Section offset of the first DIE.
    pub dies_offset: u64,

    /// Section offset one past the unit; the next unit header starts here.
    pub end: u64,
}

impl UnitHeader {
    /// Parses a unit header, leaving the cursor at the first DIE.
    pub fn parse(cur: &mut Cursor<'_>, offset: u64) -> Result<Self> {
        let (unit_length, format) = cur.initial_length()?;
        let end = offset
            .checked_add(format.initial_length_size())
            .and_then(|x| x.checked_add(unit_length))
            .ok_or(Error::Truncated)?;

        let version = cur.u16()?;
        if !(2..=5).contains(&version) {
            return Err(Error::UnsupportedVersion(version));
        }

        let mut unit_type = consts::DW_UT_compile;
        let mut unit_id = None;
        let mut type_signature = None;
        let mut type_offset = None;

        let (abbrev_offset, address_size) = if version >= 5 {
            unit_type = cur.u8()?;
            let address_size = cur.u8()?;
            let abbrev_offset = cur.offset(format)?;

            match unit_type {
                consts::DW_UT_compile | consts::DW_UT_partial => {}
                consts::DW_UT_skeleton | consts::DW_UT_split_compile => {
                    unit_id = Some(cur.u64()?);
                }
                consts::DW_UT_type | consts::DW_UT_split_type => {
                    type_signature = Some(cur.u64()?);
                    type_offset = Some(cur.offset(format)?);
                }
                other => return Err(Error::UnsupportedUnitType(other)),
            }

            (abbrev_offset, address_size)
        } else {
            let abbrev_offset = cur.offset(format)?;
            let address_size = cur.u8()?;
            (abbrev_offset, address_size)
        };

        Ok(Self {
            offset,
            unit_length,
            format,
            version,
            unit_type,
            abbrev_offset,
            address_size,
            unit_id,
            type_signature,
            type_offset,
            dies_offset: cur.pos() as u64,
            end,
        })
    }

    /// Form-sizing parameters of this unit.
    pub fn encoding(&self) -> Encoding {
        Encoding {
            format: self.format,
            address_size: self.address_size,
            unit_start: self.offset,
        }
    }
}

/// One function extracted from a `subprogram` DIE.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FuncInfo {
    /// Source-level name.
    pub name: String,

    /// Mangled linkage name, when distinct from the source name.
    pub linkage_name: Option<String>,

    /// Entry address.
    pub low_pc: VirtAddr,

    /// Size of the function's machine code in bytes.
    pub size: u64,
}

/// Everything extracted from one compilation unit.
#[derive(Debug, Default)]
pub struct UnitInfo {
    /// Section offset of the unit header in `.debug_info`.
    pub offset: u64,

    /// Primary source file of the translation unit.
    pub file_name: String,

    /// Directory the unit was compiled in.
    pub comp_dir: String,

    /// Compiler identification string.
    pub producer: String,

    /// Source language.
    pub language: Lang,

    /// Offset of this unit's line program in `.debug_line`.
    pub stmt_list: Option<u64>,

    /// Functions with a known entry address, keyed by that address.
    pub funcs: BTreeMap<VirtAddr, FuncInfo>,
}

impl UnitInfo {
    /// The unit's source path, made absolute via the compilation directory
    /// when the file name itself is relative.
    pub fn file_path(&self) -> String {
        if self.file_name.starts_with('/') || self.comp_dir.is_empty() {
            self.file_name.clone()
        } else {
            format!("{}/{}", self.comp_dir.trim_end_matches('/'), self.file_name)
        }
    }
}

/// Outcome of decoding one compilation unit.
///
/// Units whose DIE stream references abbreviations or forms outside the
/// known sets are reported as [`Self::Skipped`] rather than failing the
/// whole decode; every fully decoded unit still comes through.
#[derive(Debug)]
pub enum UnitOutcome {
    /// The unit decoded completely.
    Decoded(UnitInfo),

    /// The unit was abandoned; the cursor moved on to the next unit.
    Skipped {
        /// Section offset of the skipped unit.
        offset: u64,

        /// What made the unit undecodable.
        reason: Error,
    },
}

/// Iterator over the compilation units of `.debug_info`.
///
/// Created via [`Sections::units`]. Yields units in file order.
pub struct UnitIter<'sec, 'obj> {
    sections: &'sec Sections<'obj>,
    abbrevs: AbbrevCache,
    pos: usize,
}

impl<'sec, 'obj> UnitIter<'sec, 'obj> {
    pub(crate) fn new(sections: &'sec Sections<'obj>) -> Self {
        Self {
            sections,
            abbrevs: AbbrevCache::new(),
            pos: 0,
        }
    }
}

impl FallibleIterator for UnitIter<'_, '_> {
    type Item = UnitOutcome;
    type Error = Error;

    fn next(&mut self) -> Result<Option<UnitOutcome>> {
        let info = self.sections.info_bytes();
        if self.pos >= info.len() {
            return Ok(None);
        }

        let offset = self.pos as u64;
        let mut cur = Cursor::with_pos(info, self.pos).ok_or(Error::Truncated)?;
        let header = UnitHeader::parse(&mut cur, offset)?;

        let end = usize::try_from(header.end).map_err(|_| Error::Truncated)?;
        if end > info.len() || end <= self.pos {
            return Err(Error::Truncated);
        }
        self.pos = end;

        match walk_dies(self.sections, &self.abbrevs, &header) {
            Ok(unit) => Ok(Some(UnitOutcome::Decoded(unit))),
            Err(reason) if reason.is_unit_recoverable() => {
                Ok(Some(UnitOutcome::Skipped { offset, reason }))
            }
            Err(fatal) => Err(fatal),
        }
    }
}

/// `DW_AT_high_pc` is an absolute end address when encoded as an address
/// and a size relative to `low_pc` when encoded as a constant.
enum HighPc {
    Address(u64),
    Size(u64),
}

/// Attribute bucket for one `subprogram` DIE.
#[derive(Default)]
struct SubprogramState {
    name: Option<String>,
    linkage_name: Option<String>,
    mips_linkage_name: Option<String>,
    low_pc: Option<u64>,
    high_pc: Option<HighPc>,
    specification: Option<u64>,
}

impl SubprogramState {
    fn absorb(&mut self, attr: u64, value: FormValue<'_>, sections: &Sections<'_>) {
        match attr {
            consts::DW_AT_name => self.name = value.to_string_in(sections).or(self.name.take()),
            consts::DW_AT_linkage_name => {
                self.linkage_name = value.to_string_in(sections).or(self.linkage_name.take())
            }
            consts::DW_AT_MIPS_linkage_name => {
                self.mips_linkage_name =
                    value.to_string_in(sections).or(self.mips_linkage_name.take())
            }
            consts::DW_AT_low_pc => {
                if let FormValue::Address(addr) = value {
                    self.low_pc = Some(addr);
                }
            }
            consts::DW_AT_high_pc => match value {
                FormValue::Address(end) => self.high_pc = Some(HighPc::Address(end)),
                ref v => {
                    if let Some(size) = v.unsigned() {
                        self.high_pc = Some(HighPc::Size(size));
                    }
                }
            },
            consts::DW_AT_specification => {
                if let FormValue::UnitRef(target) | FormValue::SectionRef(target) = value {
                    self.specification = Some(target);
                }
            }
            _ => {}
        }
    }

    /// Finalizes the DIE into either a function record or a cached
    /// declaration that later definitions can reference.
    fn close(
        self,
        die_offset: u64,
        unit: &mut UnitInfo,
        decls: &mut HashMap<u64, FuncInfo>,
    ) {
        let mut name = self.name.or(self.mips_linkage_name);
        let mut linkage_name = self.linkage_name;

        if let Some(target) = self.specification {
            match decls.get(&target) {
                Some(decl) => {
                    if name.is_none() && !decl.name.is_empty() {
                        name = Some(decl.name.clone());
                    }
                    if linkage_name.is_none() {
                        linkage_name = decl.linkage_name.clone();
                    }
                }
                None => {
                    debug!(
                        "subprogram at {die_offset:#x} references declaration \
                         {target:#x} which is not known (yet)"
                    );
                }
            }
        }

        let low_pc = self.low_pc.unwrap_or(0);
        let size = match self.high_pc {
            Some(HighPc::Address(end)) => end.saturating_sub(low_pc),
            Some(HighPc::Size(size)) => size,
            None => 0,
        };

        let info = FuncInfo {
            name: name.unwrap_or_default(),
            linkage_name,
            low_pc,
            size,
        };

        if low_pc != 0 {
            unit.funcs.insert(low_pc, info);
        } else if !info.name.is_empty() {
            // Address-less but named: a declaration that a definition may
            // later pull in via DW_AT_specification.
            decls.insert(die_offset, info);
        }
    }
}

fn walk_dies(
    sections: &Sections<'_>,
    abbrevs: &AbbrevCache,
    header: &UnitHeader,
) -> Result<UnitInfo> {
    let table = abbrevs.table_at(sections.abbrev_bytes(), header.abbrev_offset)?;
    let enc = header.encoding();

    let end = header.end as usize;
    let info_bytes = sections.info_bytes();
    let bounded = info_bytes.get(..end).ok_or(Error::Truncated)?;
    let mut cur =
        Cursor::with_pos(bounded, header.dies_offset as usize).ok_or(Error::Truncated)?;

    let mut unit = UnitInfo {
        offset: header.offset,
        ..UnitInfo::default()
    };
    let mut decls: HashMap<u64, FuncInfo> = HashMap::new();
    let mut depth = 0u64;

    while !cur.is_empty() {
        let die_offset = cur.pos() as u64;
        let code = cur.uleb()?;

        // Code 0 closes the current sibling chain.
        if code == 0 {
            depth = depth.saturating_sub(1);
            continue;
        }

        let abbrev = table.get(code).ok_or(Error::MissingAbbrev(code))?;
        trace!("[{die_offset:#08x}] abbrev {code} tag {:#04x} depth {depth}", abbrev.tag);

        match abbrev.tag {
            consts::DW_TAG_compile_unit => {
                absorb_compile_unit(sections, &mut cur, enc, abbrev, &mut unit)?;
            }
            consts::DW_TAG_subprogram => {
                let mut state = SubprogramState::default();
                for spec in &abbrev.attrs {
                    let value = form::consume(&mut cur, spec.form, enc, spec.implicit_const)?;
                    state.absorb(spec.attr, value, sections);
                }
                state.close(die_offset, &mut unit, &mut decls);
            }
            _ => {
                for spec in &abbrev.attrs {
                    form::consume(&mut cur, spec.form, enc, spec.implicit_const)?;
                }
            }
        }

        if abbrev.has_children {
            depth += 1;
        }
    }

    Ok(unit)
}

fn absorb_compile_unit(
    sections: &Sections<'_>,
    cur: &mut Cursor<'_>,
    enc: Encoding,
    abbrev: &Abbrev,
    unit: &mut UnitInfo,
) -> Result {
    for spec in &abbrev.attrs {
        let value = form::consume(cur, spec.form, enc, spec.implicit_const)?;

        match spec.attr {
            consts::DW_AT_name => {
                if let Some(name) = value.to_string_in(sections) {
                    unit.file_name = name;
                }
            }
            consts::DW_AT_comp_dir => {
                if let Some(dir) = value.to_string_in(sections) {
                    unit.comp_dir = dir;
                }
            }
            consts::DW_AT_producer => {
                if let Some(producer) = value.to_string_in(sections) {
                    unit.producer = producer;
                }
            }
            consts::DW_AT_language => {
                if let Some(code) = value.unsigned() {
                    unit.language = Lang(code);
                }
            }
            consts::DW_AT_stmt_list => match value {
                FormValue::SecOffset(offset) => unit.stmt_list = Some(offset),
                // DWARF 2 producers encode the line offset as a plain
                // constant.
                ref v => unit.stmt_list = v.unsigned().or(unit.stmt_list.take()),
            },
            _ => {}
        }
    }

    // rustc suffixes the unit name with a disambiguation hash. The language
    // attribute may come after the name, so the suffix is stripped only
    // once the whole DIE has been read.
    if unit.language.is_rust() || unit.producer.contains("rustc") {
        if let Some(at) = unit.file_name.rfind('@') {
            unit.file_name.truncate(at);
            while unit.file_name.ends_with(' ') {
                unit.file_name.pop();
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::cursor::tests::encode_uleb;
    use super::*;

    /// Builds a version-4, 32-bit format unit around raw DIE bytes.
    fn v4_cu(abbrev_offset: u32, dies: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&((2 + 4 + 1 + dies.len()) as u32).to_le_bytes());
        out.extend_from_slice(&4u16.to_le_bytes());
        out.extend_from_slice(&abbrev_offset.to_le_bytes());
        out.push(8); // address_size
        out.extend_from_slice(dies);
        out
    }

    /// Abbrev table: (code, tag, has_children, [(attr, form)]).
    fn abbrevs(entries: &[(u64, u64, bool, &[(u64, u64)])]) -> Vec<u8> {
        let mut out = Vec::new();
        for (code, tag, children, attrs) in entries {
            out.extend_from_slice(&encode_uleb(*code));
            out.extend_from_slice(&encode_uleb(*tag));
            out.push(u8::from(*children));
            for (attr, form) in *attrs {
                out.extend_from_slice(&encode_uleb(*attr));
                out.extend_from_slice(&encode_uleb(*form));
            }
            out.extend_from_slice(&[0, 0]);
        }
        out.push(0);
        out
    }

    fn decode_all(sections: &Sections<'_>) -> Vec<UnitOutcome> {
        let mut iter = sections.units();
        let mut out = Vec::new();
        while let Some(outcome) = iter.next().unwrap() {
            out.push(outcome);
        }
        out
    }

    fn decoded(outcome: &UnitOutcome) -> &UnitInfo {
        match outcome {
            UnitOutcome::Decoded(unit) => unit,
            UnitOutcome::Skipped { offset, reason } => {
                panic!("unit at {offset:#x} skipped: {reason}")
            }
        }
    }

    #[test]
    fn minimal_unit() {
        let abbrev = abbrevs(&[
            (
                1,
                consts::DW_TAG_compile_unit,
                true,
                &[
                    (consts::DW_AT_name, consts::DW_FORM_string),
                    (consts::DW_AT_comp_dir, consts::DW_FORM_string),
                    (consts::DW_AT_producer, consts::DW_FORM_string),
                    (consts::DW_AT_language, consts::DW_FORM_data2),
                    (consts::DW_AT_stmt_list, consts::DW_FORM_sec_offset),
                ],
            ),
            (
                2,
                consts::DW_TAG_subprogram,
                false,
                &[
                    (consts::DW_AT_name, consts::DW_FORM_string),
                    (consts::DW_AT_low_pc, consts::DW_FORM_addr),
                    (consts::DW_AT_high_pc, consts::DW_FORM_data4),
                ],
            ),
        ]);

        let mut dies = Vec::new();
        dies.push(1);
        dies.extend_from_slice(b"hello.c\0/tmp\0GNU C17 12.2.0\0");
        dies.extend_from_slice(&2u16.to_le_bytes()); // DW_LANG_C
        dies.extend_from_slice(&0u32.to_le_bytes()); // stmt_list
        dies.push(2);
        dies.extend_from_slice(b"main\0");
        dies.extend_from_slice(&0x1000u64.to_le_bytes());
        dies.extend_from_slice(&16u32.to_le_bytes());
        dies.push(0); // end of children

        let info = v4_cu(0, &dies);
        let sections = Sections::for_tests(&info, &abbrev, &[], &[], &[], &[]);

        let outcomes = decode_all(&sections);
        assert_eq!(outcomes.len(), 1);
        let unit = decoded(&outcomes[0]);

        assert_eq!(unit.file_name, "hello.c");
        assert_eq!(unit.comp_dir, "/tmp");
        assert_eq!(unit.producer, "GNU C17 12.2.0");
        assert_eq!(unit.language.to_string(), "C");
        assert_eq!(unit.stmt_list, Some(0));
        assert_eq!(unit.file_path(), "/tmp/hello.c");

        let main = &unit.funcs[&0x1000];
        assert_eq!(main.name, "main");
        assert_eq!(main.size, 16);
        assert_eq!(main.linkage_name, None);
    }

    #[test]
    fn strp_names_resolve_through_debug_str() {
        let abbrev = abbrevs(&[
            (
                1,
                consts::DW_TAG_compile_unit,
                true,
                &[(consts::DW_AT_name, consts::DW_FORM_strp)],
            ),
            (
                2,
                consts::DW_TAG_subprogram,
                false,
                &[
                    (consts::DW_AT_linkage_name, consts::DW_FORM_strp),
                    (consts::DW_AT_low_pc, consts::DW_FORM_addr),
                    (consts::DW_AT_high_pc, consts::DW_FORM_addr),
                ],
            ),
        ]);

        let debug_str = b"unit.cc\0_Z3foov\0";

        let mut dies = Vec::new();
        dies.push(1);
        dies.extend_from_slice(&0u32.to_le_bytes());
        dies.push(2);
        dies.extend_from_slice(&8u32.to_le_bytes());
        dies.extend_from_slice(&0x2000u64.to_le_bytes());
        dies.extend_from_slice(&0x2040u64.to_le_bytes()); // end address form
        dies.push(0);

        let info = v4_cu(0, &dies);
        let sections = Sections::for_tests(&info, &abbrev, &[], &[], debug_str, &[]);

        let outcomes = decode_all(&sections);
        let unit = decoded(&outcomes[0]);

        assert_eq!(unit.file_name, "unit.cc");
        let func = &unit.funcs[&0x2000];
        assert_eq!(func.name, "");
        assert_eq!(func.linkage_name.as_deref(), Some("_Z3foov"));

        // high_pc in address form is an absolute end address.
        assert_eq!(func.size, 0x40);
    }

    #[test]
    fn specification_pulls_name_from_declaration() {
        let abbrev = abbrevs(&[
            (
                1,
                consts::DW_TAG_compile_unit,
                true,
                &[(consts::DW_AT_name, consts::DW_FORM_string)],
            ),
            // Declaration: named, no address.
            (
                2,
                consts::DW_TAG_subprogram,
                false,
                &[
                    (consts::DW_AT_name, consts::DW_FORM_string),
                    (consts::DW_AT_declaration, consts::DW_FORM_flag_present),
                ],
            ),
            // Definition: address plus a back-reference.
            (
                3,
                consts::DW_TAG_subprogram,
                false,
                &[
                    (consts::DW_AT_specification, consts::DW_FORM_ref4),
                    (consts::DW_AT_low_pc, consts::DW_FORM_addr),
                    (consts::DW_AT_high_pc, consts::DW_FORM_data4),
                ],
            ),
        ]);

        let mut dies = Vec::new();
        dies.push(1);
        dies.extend_from_slice(b"spec.cc\0");

        // Offset of the declaration DIE within .debug_info: unit header
        // (11 bytes) + the DIEs before it.
        let decl_offset = 11 + dies.len() as u32;
        dies.push(2);
        dies.extend_from_slice(b"foo\0");

        dies.push(3);
        dies.extend_from_slice(&decl_offset.to_le_bytes());
        dies.extend_from_slice(&0x2000u64.to_le_bytes());
        dies.extend_from_slice(&0x10u32.to_le_bytes());
        dies.push(0);

        let info = v4_cu(0, &dies);
        let sections = Sections::for_tests(&info, &abbrev, &[], &[], &[], &[]);

        let outcomes = decode_all(&sections);
        let unit = decoded(&outcomes[0]);

        assert_eq!(unit.funcs.len(), 1);
        let func = &unit.funcs[&0x2000];
        assert_eq!(func.name, "foo");
        assert_eq!(func.size, 0x10);
    }

    #[test]
    fn rust_unit_name_hash_is_stripped() {
        let abbrev = abbrevs(&[(
            1,
            consts::DW_TAG_compile_unit,
            false,
            &[
                (consts::DW_AT_name, consts::DW_FORM_string),
                (consts::DW_AT_producer, consts::DW_FORM_string),
            ],
        )]);

        // The producer marks the unit as Rust even though no language
        // attribute is present, and it follows the name.
        let mut dies = Vec::new();
        dies.push(1);
        dies.extend_from_slice(b"src/lib.rs @abc1234\0");
        dies.extend_from_slice(b"rustc version 1.70.0\0");

        let info = v4_cu(0, &dies);
        let sections = Sections::for_tests(&info, &abbrev, &[], &[], &[], &[]);

        let outcomes = decode_all(&sections);
        assert_eq!(decoded(&outcomes[0]).file_name, "src/lib.rs");
    }

    #[test]
    fn non_rust_names_keep_at_signs() {
        let abbrev = abbrevs(&[(
            1,
            consts::DW_TAG_compile_unit,
            false,
            &[(consts::DW_AT_name, consts::DW_FORM_string)],
        )]);

        let mut dies = Vec::new();
        dies.push(1);
        dies.extend_from_slice(b"odd @name.c\0");

        let info = v4_cu(0, &dies);
        let sections = Sections::for_tests(&info, &abbrev, &[], &[], &[], &[]);

        let outcomes = decode_all(&sections);
        assert_eq!(decoded(&outcomes[0]).file_name, "odd @name.c");
    }

    #[test]
    fn v5_header_layout() {
        let abbrev = abbrevs(&[(
            1,
            consts::DW_TAG_compile_unit,
            false,
            &[(consts::DW_AT_name, consts::DW_FORM_string)],
        )]);

        // Version 5 swaps the abbrev-offset and address-size fields and
        // inserts the unit type.
        let mut dies = Vec::new();
        dies.push(1);
        dies.extend_from_slice(b"five.c\0");

        let mut info = Vec::new();
        info.extend_from_slice(&((2 + 1 + 1 + 4 + dies.len()) as u32).to_le_bytes());
        info.extend_from_slice(&5u16.to_le_bytes());
        info.push(consts::DW_UT_compile);
        info.push(8);
        info.extend_from_slice(&0u32.to_le_bytes());
        info.extend_from_slice(&dies);

        let sections = Sections::for_tests(&info, &abbrev, &[], &[], &[], &[]);
        let outcomes = decode_all(&sections);
        assert_eq!(decoded(&outcomes[0]).file_name, "five.c");
    }

    #[test]
    fn skeleton_unit_id_is_consumed() {
        let abbrev = abbrevs(&[(
            1,
            consts::DW_TAG_compile_unit,
            false,
            &[(consts::DW_AT_name, consts::DW_FORM_string)],
        )]);

        let mut dies = Vec::new();
        dies.push(1);
        dies.extend_from_slice(b"skel.c\0");

        let mut info = Vec::new();
        info.extend_from_slice(&((2 + 1 + 1 + 4 + 8 + dies.len()) as u32).to_le_bytes());
        info.extend_from_slice(&5u16.to_le_bytes());
        info.push(consts::DW_UT_skeleton);
        info.push(8);
        info.extend_from_slice(&0u32.to_le_bytes());
        info.extend_from_slice(&0xdead_beefu64.to_le_bytes());
        info.extend_from_slice(&dies);

        let mut cur = Cursor::new(&info);
        let header = UnitHeader::parse(&mut cur, 0).unwrap();
        assert_eq!(header.unit_id, Some(0xdead_beef));
        assert_eq!(header.dies_offset, 20);

        let sections = Sections::for_tests(&info, &abbrev, &[], &[], &[], &[]);
        let outcomes = decode_all(&sections);
        assert_eq!(decoded(&outcomes[0]).file_name, "skel.c");
    }

    #[test]
    fn dwarf64_format_unit() {
        let abbrev = abbrevs(&[(
            1,
            consts::DW_TAG_compile_unit,
            false,
            &[(consts::DW_AT_name, consts::DW_FORM_strp)],
        )]);

        let debug_str = b"sixtyfour.c\0";

        // 64-bit format: 0xffffffff escape, 8-byte length, 8-byte
        // abbrev offset, 8-byte strp.
        let mut dies = Vec::new();
        dies.push(1);
        dies.extend_from_slice(&0u64.to_le_bytes());

        let mut info = Vec::new();
        info.extend_from_slice(&0xffff_ffffu32.to_le_bytes());
        info.extend_from_slice(&((2 + 8 + 1 + dies.len()) as u64).to_le_bytes());
        info.extend_from_slice(&4u16.to_le_bytes());
        info.extend_from_slice(&0u64.to_le_bytes());
        info.push(8);
        info.extend_from_slice(&dies);

        let sections = Sections::for_tests(&info, &abbrev, &[], &[], debug_str, &[]);
        let outcomes = decode_all(&sections);
        assert_eq!(decoded(&outcomes[0]).file_name, "sixtyfour.c");
    }

    #[test]
    fn broken_unit_is_skipped_but_later_units_decode() {
        let abbrev = abbrevs(&[(
            1,
            consts::DW_TAG_compile_unit,
            false,
            &[(consts::DW_AT_name, consts::DW_FORM_string)],
        )]);

        // First unit references abbreviation code 9, which doesn't exist.
        let mut bad_dies = Vec::new();
        bad_dies.push(9);
        bad_dies.extend_from_slice(b"bad.c\0");

        let mut good_dies = Vec::new();
        good_dies.push(1);
        good_dies.extend_from_slice(b"good.c\0");

        let mut info = v4_cu(0, &bad_dies);
        info.extend_from_slice(&v4_cu(0, &good_dies));

        let sections = Sections::for_tests(&info, &abbrev, &[], &[], &[], &[]);
        let outcomes = decode_all(&sections);

        assert_eq!(outcomes.len(), 2);
        assert!(matches!(
            outcomes[0],
            UnitOutcome::Skipped {
                offset: 0,
                reason: Error::MissingAbbrev(9),
            }
        ));
        assert_eq!(decoded(&outcomes[1]).file_name, "good.c");
    }

    #[test]
    fn unknown_form_skips_unit() {
        let abbrev = abbrevs(&[(
            1,
            consts::DW_TAG_compile_unit,
            false,
            &[(consts::DW_AT_name, 0x6f)],
        )]);

        let info = v4_cu(0, &[1, 0xaa]);
        let sections = Sections::for_tests(&info, &abbrev, &[], &[], &[], &[]);
        let outcomes = decode_all(&sections);

        assert!(matches!(
            outcomes[0],
            UnitOutcome::Skipped {
                reason: Error::UnknownForm(0x6f),
                ..
            }
        ));
    }

    #[test]
    fn unsupported_version_is_fatal() {
        let mut info = Vec::new();
        info.extend_from_slice(&7u32.to_le_bytes());
        info.extend_from_slice(&9u16.to_le_bytes());
        info.extend_from_slice(&[0; 5]);

        let sections = Sections::for_tests(&info, &[], &[], &[], &[], &[]);
        let mut iter = sections.units();
        assert!(matches!(iter.next(), Err(Error::UnsupportedVersion(9))));
    }

    #[test]
    fn attribute_soup_is_consumed_exactly() {
        // A DIE carrying one attribute of every self-sized form class; the
        // walker must come out exactly at the trailing sibling terminator.
        let attrs: &[(u64, u64)] = &[
            (0x50, consts::DW_FORM_data1),
            (0x51, consts::DW_FORM_sdata),
            (0x52, consts::DW_FORM_block1),
            (0x53, consts::DW_FORM_flag_present),
            (0x54, consts::DW_FORM_exprloc),
            (0x55, consts::DW_FORM_ref_udata),
            (0x56, consts::DW_FORM_strx2),
            (0x57, consts::DW_FORM_data16),
        ];
        let abbrev = abbrevs(&[
            (1, consts::DW_TAG_compile_unit, true, &[(consts::DW_AT_name, consts::DW_FORM_string)]),
            (2, 0x0b /* lexical block */, false, attrs),
        ]);

        let mut dies = Vec::new();
        dies.push(1);
        dies.extend_from_slice(b"soup.c\0");
        dies.push(2);
        dies.push(0x7f); // data1
        dies.extend_from_slice(&[0x7e]); // sdata -2
        dies.extend_from_slice(&[0x02, 0xaa, 0xbb]); // block1
        dies.extend_from_slice(&[0x02, 0x30, 0x9f]); // exprloc: lit0 stack_value
        dies.extend_from_slice(&encode_uleb(0x20)); // ref_udata
        dies.extend_from_slice(&[0x11, 0x22]); // strx2
        dies.extend_from_slice(&[0u8; 16]); // data16
        dies.push(0);

        let info = v4_cu(0, &dies);
        let sections = Sections::for_tests(&info, &abbrev, &[], &[], &[], &[]);
        let outcomes = decode_all(&sections);

        assert_eq!(decoded(&outcomes[0]).file_name, "soup.c");
    }
}
