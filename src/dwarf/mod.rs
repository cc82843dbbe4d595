// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Self-contained reader for DWARF 2-5 debug information.
//!
//! The entry point is [`Sections`], created via [`Sections::load`]. It
//! bundles the debug section bytes of one object file; [`Sections::units`]
//! then iterates the compilation units in `.debug_info`, decoding each DIE
//! stream into a [`unit::UnitInfo`]. Line-number programs are executed
//! separately through [`line::LineHeader`] and [`line::execute`] so that
//! callers decide which rows they care about.
//!
//! Everything here operates on in-memory byte slices and is strictly
//! single-threaded; decoding the same input twice yields identical results.

pub mod abbrev;
pub mod aranges;
pub mod consts;
pub mod cursor;
pub mod expr;
pub mod form;
pub mod line;
pub mod unit;

use crate::objfile;
use std::borrow::Cow;
use std::fmt;

/// Result type shorthand.
pub type Result<T = (), E = Error> = std::result::Result<T, E>;

/// Errors that can occur during DWARF parsing.
#[non_exhaustive]
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Reader currently doesn't support big endian binaries")]
    BigEndian,

    #[error("A read crossed the end of its section")]
    Truncated,

    #[error("Unsupported DWARF version {}", .0)]
    UnsupportedVersion(u16),

    #[error("Unit length uses the reserved value {:#010x}", .0)]
    ReservedUnitLength(u64),

    #[error("Unit header has unsupported unit type {:#04x}", .0)]
    UnsupportedUnitType(u8),

    #[error("Abbreviation references a form outside the known set: {:#x}", .0)]
    UnknownForm(u64),

    #[error("Unknown opcode {:#04x}", .0)]
    UnknownOpcode(u8),

    #[error("DIE references abbreviation code `{}` missing from its table", .0)]
    MissingAbbrev(u64),

    #[error("Line program terminated without an end_sequence")]
    MissingEndSequence,

    #[error("Block decoded a number of bytes different from its declared length")]
    InconsistentLength,

    #[error("File contains an invalid file index value `{}`", .0)]
    InvalidFileIndex(u64),

    #[error("File contains an invalid directory index value `{}`", .0)]
    InvalidDirectoryIndex(u64),

    #[error("objfile error")]
    Objfile(#[from] objfile::Error),
}

impl Error {
    /// Whether this error poisons only the compilation unit it occurred in.
    ///
    /// Units failing with a recoverable error are skipped as a whole while
    /// the remainder of the file is still decoded.
    pub fn is_unit_recoverable(&self) -> bool {
        matches!(self, Error::UnknownForm(_) | Error::MissingAbbrev(_))
    }
}

/// 32-bit or 64-bit DWARF format.
///
/// Not to be confused with the target word size: the format is selected per
/// unit by a sentinel in the unit-length field and only affects the width of
/// section offset fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// Initial length below `0xffff_ff00`; offsets are 4 bytes.
    Dwarf32,

    /// Initial length escaped via `0xffff_ffff`; offsets are 8 bytes.
    Dwarf64,
}

impl Format {
    /// Width of a section offset field in this format.
    pub fn offset_size(self) -> usize {
        match self {
            Format::Dwarf32 => 4,
            Format::Dwarf64 => 8,
        }
    }

    /// Total size of the initial-length field itself.
    pub fn initial_length_size(self) -> u64 {
        match self {
            Format::Dwarf32 => 4,
            Format::Dwarf64 => 12,
        }
    }
}

/// Per-unit parameters that decide how attribute values are sized.
#[derive(Debug, Clone, Copy)]
pub struct Encoding {
    /// 32-bit or 64-bit DWARF format of the unit.
    pub format: Format,

    /// Size of a target address in bytes.
    pub address_size: u8,

    /// Section offset of the unit header, used to rebase unit-relative
    /// references.
    pub unit_start: u64,
}

/// DWARF source language code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Lang(pub u64);

impl Lang {
    /// The well-known name for this language code, if there is one.
    pub fn name(self) -> Option<&'static str> {
        consts::language_name(self.0)
    }

    /// Whether this unit was compiled from Rust.
    ///
    /// Rust units get their translation unit name suffixed with a
    /// disambiguation hash that we strip.
    pub fn is_rust(self) -> bool {
        self.0 == consts::DW_LANG_Rust
    }
}

/// Formats as the language name, falling back to the decimal code for
/// languages missing from the name table.
impl fmt::Display for Lang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{}", self.0),
        }
    }
}

/// Collection of DWARF sections of an object file.
///
/// Sections that are absent from the file behave like empty byte slices:
/// a file without `.debug_aranges` simply has no precomputed ranges, a file
/// without `.debug_info` has no units.
pub struct Sections<'obj> {
    info: Option<objfile::Section<'obj>>,
    abbrev: Option<objfile::Section<'obj>>,
    aranges: Option<objfile::Section<'obj>>,
    line: Option<objfile::Section<'obj>>,
    str_: Option<objfile::Section<'obj>>,
    line_str: Option<objfile::Section<'obj>>,
}

impl<'obj> Sections<'obj> {
    /// Reads the DWARF sections from the given object file.
    pub fn load(obj: &objfile::Reader<'obj>) -> Result<Self> {
        if !obj.is_little_endian() {
            return Err(Error::BigEndian);
        }

        Ok(Self {
            info: obj.load_section(b".debug_info")?,
            abbrev: obj.load_section(b".debug_abbrev")?,
            aranges: obj.load_section(b".debug_aranges")?,
            line: obj.load_section(b".debug_line")?,
            str_: obj.load_section(b".debug_str")?,
            line_str: obj.load_section(b".debug_line_str")?,
        })
    }

    /// Iterate over the compilation units in `.debug_info`.
    pub fn units<'sec>(&'sec self) -> unit::UnitIter<'sec, 'obj> {
        unit::UnitIter::new(self)
    }

    /// Parses the `.debug_aranges` section.
    pub fn aranges(&self) -> Result<aranges::ArangeTable> {
        aranges::ArangeTable::parse(self.aranges_bytes())
    }

    pub(crate) fn info_bytes(&self) -> &[u8] {
        section_bytes(&self.info)
    }

    pub(crate) fn abbrev_bytes(&self) -> &[u8] {
        section_bytes(&self.abbrev)
    }

    pub(crate) fn aranges_bytes(&self) -> &[u8] {
        section_bytes(&self.aranges)
    }

    pub(crate) fn line_bytes(&self) -> &[u8] {
        section_bytes(&self.line)
    }

    /// Reads the NUL-terminated string at `offset` in `.debug_str`.
    pub(crate) fn debug_str_at(&self, offset: u64) -> Option<Cow<'_, str>> {
        str_at(section_bytes(&self.str_), offset)
    }

    /// Reads the NUL-terminated string at `offset` in `.debug_line_str`.
    pub(crate) fn debug_line_str_at(&self, offset: u64) -> Option<Cow<'_, str>> {
        str_at(section_bytes(&self.line_str), offset)
    }

    /// Construction from raw slices, for decoder tests.
    #[cfg(test)]
    pub(crate) fn for_tests(
        info: &'obj [u8],
        abbrev: &'obj [u8],
        aranges: &'obj [u8],
        line: &'obj [u8],
        str_: &'obj [u8],
        line_str: &'obj [u8],
    ) -> Self {
        let wrap = |data: &'obj [u8]| Some(objfile::Section::from_bytes(data));

        Self {
            info: wrap(info),
            abbrev: wrap(abbrev),
            aranges: wrap(aranges),
            line: wrap(line),
            str_: wrap(str_),
            line_str: wrap(line_str),
        }
    }
}

fn section_bytes<'sec>(section: &'sec Option<objfile::Section<'_>>) -> &'sec [u8] {
    section.as_deref().unwrap_or(&[])
}

fn str_at(section: &[u8], offset: u64) -> Option<Cow<'_, str>> {
    let mut cur = cursor::Cursor::with_pos(section, usize::try_from(offset).ok()?)?;
    cur.cstr().ok()
}
