// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Joins DWARF units, address ranges and line rows with the function table.
//!
//! Control flow is strictly one-way: [`annotate`] reads the debug sections,
//! walks every compilation unit, executes each unit's line program and
//! writes source directories, file names, languages and per-line address
//! maps into the caller's [`objfile::FuncTable`]. Units that fail to decode
//! for unit-local reasons are skipped with a warning so that one rotten
//! unit doesn't take down the whole file.

use crate::dwarf::aranges::ArangeTable;
use crate::dwarf::line::{self, LineHeader, LineRow};
use crate::dwarf::unit::{UnitInfo, UnitOutcome};
use crate::dwarf::{self, Lang, Sections};
use crate::{debug, objfile, trace};
use fallible_iterator::FallibleIterator;

/// Result type shorthand.
pub type Result<T = (), E = Error> = std::result::Result<T, E>;

/// Errors that can occur during correlation.
#[non_exhaustive]
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("DWARF error: {}", .0)]
    Dwarf(#[from] dwarf::Error),
}

/// Correlation statistics.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Stats {
    /// Number of units that were successfully processed.
    pub units_ok: u64,

    /// Number of units that had to be skipped due to parsing issues.
    pub units_broken: u64,
}

/// Everything extracted from one object file's debug info.
#[derive(Debug)]
pub struct Provenance {
    /// Per-unit metadata and function maps, in file order.
    pub units: Vec<UnitInfo>,

    /// Decode statistics.
    pub stats: Stats,
}

/// Annotates the function table with source provenance from `sections`.
///
/// Every function whose address is hit by an `is_stmt` line row gains its
/// source file, directory, language and a line-to-address map; functions
/// inside a unit's address ranges gain the language even without line
/// rows. Rows pointing outside any known function are silently dropped:
/// they belong to library stubs or padding the symbol table doesn't cover.
pub fn annotate(dw: &Sections<'_>, table: &mut objfile::FuncTable) -> Result<Provenance> {
    let aranges = dw.aranges()?;
    let mut stats = Stats::default();
    let mut units = Vec::new();

    let mut unit_iter = dw.units();
    while let Some(outcome) = unit_iter.next()? {
        let unit = match outcome {
            UnitOutcome::Decoded(unit) => unit,
            UnitOutcome::Skipped { offset, reason } => {
                debug!("Skipping unit at {offset:#x}: {reason}");
                stats.units_broken += 1;
                continue;
            }
        };

        process_unit(dw, &aranges, &unit, table)?;
        stats.units_ok += 1;
        units.push(unit);
    }

    Ok(Provenance { units, stats })
}

fn process_unit(
    dw: &Sections<'_>,
    aranges: &ArangeTable,
    unit: &UnitInfo,
    table: &mut objfile::FuncTable,
) -> Result {
    // The precomputed ranges tell us which functions belong to this unit
    // even when no statement row lands inside them.
    if let Some(ranges) = aranges.ranges_for(unit.offset) {
        for entry in ranges {
            for idx in table.indices_overlapping(&entry.range()) {
                set_language(table.record_mut(idx), unit.language);
            }
        }
    }

    let Some(stmt_list) = unit.stmt_list else {
        trace!("unit {:#x} has no line program", unit.offset);
        return Ok(());
    };

    let header = LineHeader::parse(dw, stmt_list)?;
    line::execute(&header, dw.line_bytes(), |row| {
        attach_row(&header, unit, table, row)
    })?;

    Ok(())
}

/// Applies one emitted line row to the function containing its address.
fn attach_row(
    header: &LineHeader,
    unit: &UnitInfo,
    table: &mut objfile::FuncTable,
    row: &LineRow,
) -> dwarf::Result {
    // End-of-sequence rows mark the first address past the machine code
    // and carry no source position. Non-statement rows are of no use to a
    // breakpoint-planting consumer either.
    if row.end_sequence || !row.is_stmt {
        return Ok(());
    }

    let Some(idx) = table.index_for_addr(row.address) else {
        trace!("line row at {:#x} outside any known function", row.address);
        return Ok(());
    };

    let file = header.file(row.file)?;
    let dir = match header.directory(file)? {
        Some(dir) => dir.to_owned(),
        // Directory index 0 refers to the unit's compilation directory in
        // pre-v5 line tables.
        None => unit.comp_dir.clone(),
    };

    let record = table.record_mut(idx);
    record.source_file = Some(file.name.clone());
    record.source_dir = Some(dir);
    record.lines.insert(row.line, row.address);
    set_language(record, unit.language);

    Ok(())
}

fn set_language(record: &mut objfile::FuncRecord, language: Lang) {
    record.language = Some(language.to_string());
}
