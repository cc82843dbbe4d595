// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Line-number program header parsing and state-machine execution.
//!
//! A `.debug_line` section holds one program per compilation unit. The
//! header layout changed incompatibly in DWARF 5 (entry-format driven
//! directory and file tables, strings moved to `.debug_line_str`); both
//! layouts decode into the same [`LineHeader`]. Executing the opcode stream
//! with [`execute`] hands every emitted row to a visitor callback.

use super::consts::*;
use super::cursor::Cursor;
use super::{form, Encoding, Error, Format, Result, Sections};
use crate::trace;
use smallvec::SmallVec;
use std::ops::Range;

/// One entry of the header's file-name table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileEntry {
    /// File name, possibly with a directory component.
    pub name: String,

    /// Index into the directory table.
    pub dir_index: u64,

    /// Modification time, if the producer recorded one.
    pub mtime: u64,

    /// File size in bytes, if the producer recorded one.
    pub size: u64,
}

/// Decoded header of one line-number program.
#[derive(Debug)]
pub struct LineHeader {
    /// Section offset this program was parsed from.
    pub offset: u64,

    /// 32-bit or 64-bit DWARF format.
    pub format: Format,

    /// Line-table version, 2 through 5.
    pub version: u16,

    /// Target address size; only recorded by version 5 headers.
    pub address_size: u8,

    /// Size in bytes of the smallest target instruction.
    pub min_inst_length: u8,

    /// Maximum operations per instruction (VLIW); 1 everywhere we care.
    pub max_ops_per_inst: u8,

    /// Initial value of the `is_stmt` register.
    pub default_is_stmt: bool,

    /// Smallest line advance a special opcode can encode.
    pub line_base: i8,

    /// Number of distinct line advances special opcodes encode.
    pub line_range: u8,

    /// First special opcode value.
    pub opcode_base: u8,

    /// Operand counts for the standard opcodes `1..opcode_base`.
    pub std_opcode_lengths: SmallVec<[u8; 12]>,

    /// Directory table. Version 5 indexes it from 0, earlier versions
    /// from 1 with index 0 meaning the compilation directory.
    pub include_dirs: Vec<String>,

    /// File-name table, with the same version-dependent index base.
    pub files: Vec<FileEntry>,

    program: Range<usize>,
}

impl LineHeader {
    /// Parses the program header at `offset` in `.debug_line`.
    pub fn parse(sections: &Sections<'_>, offset: u64) -> Result<Self> {
        let section = sections.line_bytes();
        let pos = usize::try_from(offset).map_err(|_| Error::Truncated)?;
        let mut cur = Cursor::with_pos(section, pos).ok_or(Error::Truncated)?;

        let (unit_length, format) = cur.initial_length()?;
        let program_end = cur
            .pos()
            .checked_add(usize::try_from(unit_length).map_err(|_| Error::Truncated)?)
            .filter(|&end| end <= section.len())
            .ok_or(Error::Truncated)?;

        let version = cur.u16()?;
        if !(2..=5).contains(&version) {
            return Err(Error::UnsupportedVersion(version));
        }

        let mut address_size = 8;
        if version >= 5 {
            address_size = cur.u8()?;
            let _segment_selector_size = cur.u8()?;
        }

        let header_length = cur.offset(format)?;
        let program_start = cur
            .pos()
            .checked_add(usize::try_from(header_length).map_err(|_| Error::Truncated)?)
            .filter(|&start| start <= program_end)
            .ok_or(Error::Truncated)?;

        let min_inst_length = cur.u8()?;
        let max_ops_per_inst = if version >= 4 { cur.u8()? } else { 1 };
        let default_is_stmt = cur.u8()? != 0;
        let line_base = cur.u8()? as i8;
        let line_range = cur.u8()?;
        let opcode_base = cur.u8()?;

        if line_range == 0 || opcode_base == 0 {
            return Err(Error::InconsistentLength);
        }

        let mut std_opcode_lengths = SmallVec::new();
        for _ in 1..opcode_base {
            std_opcode_lengths.push(cur.u8()?);
        }

        let mut header = LineHeader {
            offset,
            format,
            version,
            address_size,
            min_inst_length,
            max_ops_per_inst,
            default_is_stmt,
            line_base,
            line_range,
            opcode_base,
            std_opcode_lengths,
            include_dirs: Vec::new(),
            files: Vec::new(),
            program: program_start..program_end,
        };

        if version >= 5 {
            header.parse_entry_tables(sections, &mut cur)?;
        } else {
            header.parse_legacy_tables(&mut cur)?;
        }

        // The declared header length places the first opcode; running past
        // it means the tables above were not decoded consistently.
        if cur.pos() > program_start {
            return Err(Error::InconsistentLength);
        }

        Ok(header)
    }

    /// Directory and file lists as NUL-terminated sequences (version <= 4).
    fn parse_legacy_tables(&mut self, cur: &mut Cursor<'_>) -> Result {
        loop {
            let dir = cur.cstr()?;
            if dir.is_empty() {
                break;
            }
            self.include_dirs.push(dir.into_owned());
        }

        loop {
            let name = cur.cstr()?;
            if name.is_empty() {
                break;
            }

            self.files.push(FileEntry {
                name: name.into_owned(),
                dir_index: cur.uleb()?,
                mtime: cur.uleb()?,
                size: cur.uleb()?,
            });
        }

        Ok(())
    }

    /// Entry-format driven directory and file tables (version 5).
    fn parse_entry_tables(&mut self, sections: &Sections<'_>, cur: &mut Cursor<'_>) -> Result {
        let enc = Encoding {
            format: self.format,
            address_size: self.address_size,
            unit_start: 0,
        };

        let dir_formats = Self::parse_entry_formats(cur)?;
        let dir_count = cur.uleb()?;
        for _ in 0..dir_count {
            let mut dir = FileEntry::default();
            Self::parse_entry(sections, cur, enc, &dir_formats, &mut dir)?;
            self.include_dirs.push(dir.name);
        }

        let file_formats = Self::parse_entry_formats(cur)?;
        let file_count = cur.uleb()?;
        for _ in 0..file_count {
            let mut file = FileEntry::default();
            Self::parse_entry(sections, cur, enc, &file_formats, &mut file)?;
            self.files.push(file);
        }

        Ok(())
    }

    fn parse_entry_formats(cur: &mut Cursor<'_>) -> Result<SmallVec<[(u64, u64); 4]>> {
        let count = cur.u8()?;
        let mut formats = SmallVec::new();
        for _ in 0..count {
            let content_type = cur.uleb()?;
            let form = cur.uleb()?;
            formats.push((content_type, form));
        }

        Ok(formats)
    }

    fn parse_entry(
        sections: &Sections<'_>,
        cur: &mut Cursor<'_>,
        enc: Encoding,
        formats: &[(u64, u64)],
        entry: &mut FileEntry,
    ) -> Result {
        for &(content_type, form) in formats {
            let value = form::consume(cur, form, enc, 0)?;

            match content_type {
                DW_LNCT_path => {
                    if let Some(name) = value.to_string_in(sections) {
                        entry.name = name;
                    }
                }
                DW_LNCT_directory_index => {
                    // data1, data2 and udata are the encodings producers
                    // emit here; anything else has no index to offer.
                    entry.dir_index = value.unsigned().unwrap_or_default();
                }
                DW_LNCT_timestamp => entry.mtime = value.unsigned().unwrap_or(0),
                DW_LNCT_size => entry.size = value.unsigned().unwrap_or(0),
                // MD5 hashes and vendor content types are consumed for
                // sizing but not recorded.
                _ => {}
            }
        }

        Ok(())
    }

    /// Resolves a row's file register to a file table entry.
    ///
    /// Version 5 numbers files from 0; earlier versions from 1, where index
    /// 0 is reserved and invalid.
    pub fn file(&self, index: u64) -> Result<&FileEntry> {
        let slot = if self.version >= 5 {
            index
        } else {
            index.checked_sub(1).ok_or(Error::InvalidFileIndex(0))?
        };

        usize::try_from(slot)
            .ok()
            .and_then(|i| self.files.get(i))
            .ok_or(Error::InvalidFileIndex(index))
    }

    /// Resolves a file entry's directory index to a directory path.
    ///
    /// `Ok(None)` means the file lives in the compilation directory, which
    /// only the compilation unit itself knows.
    pub fn directory(&self, entry: &FileEntry) -> Result<Option<&str>> {
        let slot = if self.version >= 5 {
            entry.dir_index
        } else if entry.dir_index == 0 {
            return Ok(None);
        } else {
            entry.dir_index - 1
        };

        usize::try_from(slot)
            .ok()
            .and_then(|i| self.include_dirs.get(i))
            .map(|dir| Some(dir.as_str()))
            .ok_or(Error::InvalidDirectoryIndex(entry.dir_index))
    }

    /// Bounds of the opcode stream within `.debug_line`.
    pub fn program_range(&self) -> Range<usize> {
        self.program.clone()
    }

    /// Section offset one past this program; the next program starts here.
    pub fn end_offset(&self) -> u64 {
        self.program.end as u64
    }
}

/// Register file of the line-number state machine; one emitted row is a
/// snapshot of these registers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRow {
    /// Program-counter value of this row.
    pub address: u64,

    /// VLIW operation index; always 0 for the architectures we target.
    pub op_index: u64,

    /// File register; index base depends on the header version.
    pub file: u64,

    /// Source line, starting at 1. 0 means "no source line".
    pub line: u64,

    /// Source column, starting at 1. 0 means "left edge".
    pub column: u64,

    /// Recommended breakpoint location.
    pub is_stmt: bool,

    /// Start of a basic block.
    pub basic_block: bool,

    /// Suitable spot for a function-entry breakpoint.
    pub prologue_end: bool,

    /// Suitable spot for a function-exit breakpoint.
    pub epilogue_begin: bool,

    /// First byte past the end of a machine-instruction sequence.
    pub end_sequence: bool,

    /// Instruction-set architecture selector.
    pub isa: u64,

    /// Compiler-assigned block discriminator.
    pub discriminator: u64,
}

impl LineRow {
    fn initial(default_is_stmt: bool) -> Self {
        Self {
            address: 0,
            op_index: 0,
            file: 1,
            line: 1,
            column: 0,
            is_stmt: default_is_stmt,
            basic_block: false,
            prologue_end: false,
            epilogue_begin: false,
            end_sequence: false,
            isa: 0,
            discriminator: 0,
        }
    }
}

/// Executes a line-number program, handing each emitted row to `emit`.
///
/// `section` must be the full `.debug_line` section the header was parsed
/// from. The state machine resets after every sequence; a program whose
/// final sequence is not closed by an `end_sequence` opcode is malformed.
pub fn execute(
    header: &LineHeader,
    section: &[u8],
    mut emit: impl FnMut(&LineRow) -> Result,
) -> Result {
    let program = header.program_range();
    let bounded = section.get(..program.end).ok_or(Error::Truncated)?;
    let mut cur = Cursor::with_pos(bounded, program.start).ok_or(Error::Truncated)?;

    let mut regs = LineRow::initial(header.default_is_stmt);
    let mut terminated = true;

    while !cur.is_empty() {
        terminated = false;
        let opcode = cur.u8()?;

        // Special opcodes advance both address and line and emit a row.
        if opcode >= header.opcode_base {
            let adj = opcode - header.opcode_base;
            let addr_inc = u64::from(adj / header.line_range) * u64::from(header.min_inst_length);
            let line_inc =
                i64::from(header.line_base) + i64::from(adj % header.line_range);

            regs.address = regs.address.wrapping_add(addr_inc);
            regs.line = regs.line.wrapping_add_signed(line_inc);
            emit(&regs)?;
            regs.basic_block = false;
            regs.prologue_end = false;
            regs.epilogue_begin = false;
            continue;
        }

        match opcode {
            // Extended opcodes carry their own length so that unknown
            // vendor extensions can be stepped over exactly.
            0x00 => {
                let length = usize::try_from(cur.uleb()?).map_err(|_| Error::Truncated)?;
                if length == 0 {
                    return Err(Error::InconsistentLength);
                }
                let op_end = cur.pos().checked_add(length).ok_or(Error::Truncated)?;

                let sub = cur.u8()?;
                match sub {
                    DW_LNE_end_sequence => {
                        regs.end_sequence = true;
                        emit(&regs)?;
                        regs = LineRow::initial(header.default_is_stmt);
                        terminated = true;
                    }
                    DW_LNE_set_address => {
                        regs.address = cur.uint(length - 1)?;
                        regs.op_index = 0;
                    }
                    DW_LNE_define_file => {
                        // Pre-v5 leftover; the fixed file table is enough
                        // for every producer seen in practice.
                        trace!("line: ignoring define_file");
                    }
                    DW_LNE_set_discriminator => {
                        regs.discriminator = cur.uleb()?;
                    }
                    DW_LNE_lo_user..=DW_LNE_hi_user => {
                        trace!("line: skipping vendor opcode {sub:#04x}");
                    }
                    unknown => return Err(Error::UnknownOpcode(unknown)),
                }

                cur.set_pos(op_end)?;
            }

            DW_LNS_copy => {
                emit(&regs)?;
                regs.basic_block = false;
                regs.prologue_end = false;
                regs.epilogue_begin = false;
            }
            DW_LNS_advance_pc => {
                let inc = cur.uleb()?.wrapping_mul(u64::from(header.min_inst_length));
                regs.address = regs.address.wrapping_add(inc);
            }
            DW_LNS_advance_line => {
                regs.line = regs.line.wrapping_add_signed(cur.sleb()?);
            }
            DW_LNS_set_file => regs.file = cur.uleb()?,
            DW_LNS_set_column => regs.column = cur.uleb()?,
            DW_LNS_negate_stmt => regs.is_stmt = !regs.is_stmt,
            DW_LNS_set_basic_block => regs.basic_block = true,
            DW_LNS_const_add_pc => {
                let adj = 255 - header.opcode_base;
                let inc = u64::from(adj / header.line_range) * u64::from(header.min_inst_length);
                regs.address = regs.address.wrapping_add(inc);
            }
            DW_LNS_fixed_advance_pc => {
                regs.address = regs.address.wrapping_add(u64::from(cur.u16()?));
                regs.op_index = 0;
            }
            DW_LNS_set_prologue_end => regs.prologue_end = true,
            DW_LNS_set_epilogue_begin => regs.epilogue_begin = true,
            DW_LNS_set_isa => regs.isa = cur.uleb()?,

            unknown => return Err(Error::UnknownOpcode(unknown)),
        }
    }

    if !terminated {
        return Err(Error::MissingEndSequence);
    }

    Ok(())
}
