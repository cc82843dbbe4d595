// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Form-driven consumption of attribute values.
//!
//! The form code alone determines how many bytes a value occupies, so a
//! single [`consume`] function can advance the cursor exactly for every
//! attribute, known or not. Semantics are applied afterwards by matching on
//! the returned [`FormValue`].

use super::consts::*;
use super::cursor::Cursor;
use super::{expr, Encoding, Error, Result};
use std::borrow::Cow;

/// An attribute value, tagged by its encoding class.
#[derive(Debug, Clone, PartialEq)]
pub enum FormValue<'a> {
    /// Absolute target address.
    Address(u64),

    /// Unsigned constant.
    Unsigned(u64),

    /// Signed constant.
    Signed(i64),

    /// Boolean flag.
    Flag(bool),

    /// String stored inline in the DIE.
    String(Cow<'a, str>),

    /// Offset into `.debug_str`.
    Strp(u64),

    /// Offset into `.debug_line_str`.
    LineStrp(u64),

    /// Index into the `.debug_str_offsets` table.
    ///
    /// Consumed for exact cursor advance; the indirection table itself is
    /// not resolved.
    StrIndex(u64),

    /// Index into the `.debug_addr` table. Like [`Self::StrIndex`], sizing
    /// only.
    AddrIndex(u64),

    /// Opaque byte block.
    Block(&'a [u8]),

    /// DWARF expression bytes, already walked for length consistency.
    Expression(&'a [u8]),

    /// Reference to a DIE in the current unit, rebased to a `.debug_info`
    /// section offset.
    UnitRef(u64),

    /// Section-relative reference (`ref_addr` and the supplementary-file
    /// reference forms).
    SectionRef(u64),

    /// Offset into another debug section (line, loc, ranges, ...).
    SecOffset(u64),

    /// Type-unit signature.
    TypeSignature(u64),
}

impl FormValue<'_> {
    /// The value as an unsigned constant, if it is one.
    pub fn unsigned(&self) -> Option<u64> {
        match *self {
            FormValue::Unsigned(x) => Some(x),
            FormValue::Signed(x) => u64::try_from(x).ok(),
            _ => None,
        }
    }

    /// Resolves the value to an owned string.
    ///
    /// Inline strings resolve directly; `strp`/`line_strp` offsets resolve
    /// through the respective string section. Indexed strings and
    /// non-string values yield `None`.
    pub fn to_string_in(&self, sections: &super::Sections<'_>) -> Option<String> {
        match self {
            FormValue::String(s) => Some(s.clone().into_owned()),
            FormValue::Strp(offset) => sections.debug_str_at(*offset).map(Cow::into_owned),
            FormValue::LineStrp(offset) => {
                sections.debug_line_str_at(*offset).map(Cow::into_owned)
            }
            _ => None,
        }
    }
}

/// Decodes one attribute value of the given form.
///
/// `implicit` carries the constant attached to `DW_FORM_implicit_const`
/// specs, which occupy no bytes in the DIE itself.
pub fn consume<'a>(
    cur: &mut Cursor<'a>,
    form: u64,
    enc: Encoding,
    implicit: i64,
) -> Result<FormValue<'a>> {
    let mut form = form;

    // `indirect` stores the real form ahead of the value. One level is all
    // the standard permits to be meaningful; a self-referencing chain is
    // malformed.
    if form == DW_FORM_indirect {
        form = cur.uleb()?;
        if form == DW_FORM_indirect {
            return Err(Error::UnknownForm(form));
        }
    }

    Ok(match form {
        DW_FORM_addr => FormValue::Address(cur.uint(enc.address_size as usize)?),

        DW_FORM_data1 => FormValue::Unsigned(u64::from(cur.u8()?)),
        DW_FORM_data2 => FormValue::Unsigned(u64::from(cur.u16()?)),
        DW_FORM_data4 => FormValue::Unsigned(u64::from(cur.u32()?)),
        DW_FORM_data8 => FormValue::Unsigned(cur.u64()?),
        DW_FORM_data16 => FormValue::Block(cur.take(16)?),
        DW_FORM_sdata => FormValue::Signed(cur.sleb()?),
        DW_FORM_udata => FormValue::Unsigned(cur.uleb()?),
        DW_FORM_implicit_const => FormValue::Signed(implicit),

        DW_FORM_string => FormValue::String(cur.cstr()?),
        DW_FORM_strp => FormValue::Strp(cur.offset(enc.format)?),
        DW_FORM_line_strp => FormValue::LineStrp(cur.offset(enc.format)?),
        DW_FORM_strp_sup => FormValue::SectionRef(cur.offset(enc.format)?),
        DW_FORM_strx => FormValue::StrIndex(cur.uleb()?),
        DW_FORM_strx1 => FormValue::StrIndex(cur.uint(1)?),
        DW_FORM_strx2 => FormValue::StrIndex(cur.uint(2)?),
        DW_FORM_strx3 => FormValue::StrIndex(cur.uint(3)?),
        DW_FORM_strx4 => FormValue::StrIndex(cur.uint(4)?),

        DW_FORM_addrx => FormValue::AddrIndex(cur.uleb()?),
        DW_FORM_addrx1 => FormValue::AddrIndex(cur.uint(1)?),
        DW_FORM_addrx2 => FormValue::AddrIndex(cur.uint(2)?),
        DW_FORM_addrx3 => FormValue::AddrIndex(cur.uint(3)?),
        DW_FORM_addrx4 => FormValue::AddrIndex(cur.uint(4)?),

        DW_FORM_block1 => {
            let len = usize::from(cur.u8()?);
            FormValue::Block(cur.take(len)?)
        }
        DW_FORM_block2 => {
            let len = usize::from(cur.u16()?);
            FormValue::Block(cur.take(len)?)
        }
        DW_FORM_block4 => {
            let len = cur.u32()?;
            FormValue::Block(cur.take(usize::try_from(len).map_err(|_| Error::Truncated)?)?)
        }
        DW_FORM_block => {
            let len = cur.uleb()?;
            FormValue::Block(cur.take(usize::try_from(len).map_err(|_| Error::Truncated)?)?)
        }

        DW_FORM_flag => FormValue::Flag(cur.u8()? != 0),
        DW_FORM_flag_present => FormValue::Flag(true),

        DW_FORM_ref1 => FormValue::UnitRef(enc.unit_start + u64::from(cur.u8()?)),
        DW_FORM_ref2 => FormValue::UnitRef(enc.unit_start + u64::from(cur.u16()?)),
        DW_FORM_ref4 => FormValue::UnitRef(enc.unit_start + u64::from(cur.u32()?)),
        DW_FORM_ref8 => FormValue::UnitRef(enc.unit_start + cur.u64()?),
        DW_FORM_ref_udata => FormValue::UnitRef(enc.unit_start + cur.uleb()?),
        DW_FORM_ref_addr => FormValue::SectionRef(cur.offset(enc.format)?),
        DW_FORM_ref_sup4 => FormValue::SectionRef(u64::from(cur.u32()?)),
        DW_FORM_ref_sup8 => FormValue::SectionRef(cur.u64()?),
        DW_FORM_ref_sig8 => FormValue::TypeSignature(cur.u64()?),

        DW_FORM_sec_offset => FormValue::SecOffset(cur.offset(enc.format)?),
        DW_FORM_loclistx | DW_FORM_rnglistx => FormValue::SecOffset(cur.uleb()?),

        DW_FORM_exprloc => {
            let len = cur.uleb()?;
            let data = cur.take(usize::try_from(len).map_err(|_| Error::Truncated)?)?;
            expr::skip(data, enc).map_err(|_| Error::InconsistentLength)?;
            FormValue::Expression(data)
        }

        other => return Err(Error::UnknownForm(other)),
    })
}
