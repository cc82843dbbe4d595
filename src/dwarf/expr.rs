// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Operand-exact skipping of DWARF expressions.
//!
//! Attribute semantics never look inside expressions here, but `exprloc`
//! blocks still get walked op-by-op so that a length that disagrees with
//! the ops it claims to contain is caught instead of silently accepted.

use super::consts::*;
use super::cursor::Cursor;
use super::{Encoding, Result};
use crate::debug;

/// Walks the expression in `data`, validating operand sizing.
///
/// Vendor ops (`DW_OP_lo_user..=DW_OP_hi_user`) carry operand encodings we
/// cannot introspect; they consume the rest of the expression. Ops outside
/// the known and vendor ranges are logged and likewise skip the remaining
/// bytes rather than failing the DIE.
pub fn skip(data: &[u8], enc: Encoding) -> Result {
    let mut cur = Cursor::new(data);

    while !cur.is_empty() {
        let op = cur.u8()?;

        if (DW_OP_lo_user..=DW_OP_hi_user).contains(&op) {
            cur.skip(cur.remaining())?;
            break;
        }

        match op {
            DW_OP_addr => cur.skip(enc.address_size as usize)?,

            DW_OP_const1u | DW_OP_const1s | DW_OP_pick | DW_OP_deref_size
            | DW_OP_xderef_size => cur.skip(1)?,

            DW_OP_const2u | DW_OP_const2s | DW_OP_bra | DW_OP_skip | DW_OP_call2 => cur.skip(2)?,

            DW_OP_const4u | DW_OP_const4s | DW_OP_call4 => cur.skip(4)?,

            DW_OP_const8u | DW_OP_const8s => cur.skip(8)?,

            DW_OP_constu | DW_OP_plus_uconst | DW_OP_regx | DW_OP_piece => {
                cur.uleb()?;
            }

            DW_OP_consts | DW_OP_fbreg => {
                cur.sleb()?;
            }

            DW_OP_breg0..=DW_OP_breg31 => {
                cur.sleb()?;
            }

            DW_OP_bregx => {
                cur.uleb()?;
                cur.sleb()?;
            }

            DW_OP_bit_piece => {
                cur.uleb()?;
                cur.uleb()?;
            }

            DW_OP_implicit_value => {
                let length = cur.uleb()?;
                cur.skip(usize::try_from(length).unwrap_or(usize::MAX))?;
            }

            DW_OP_call_ref => cur.skip(enc.format.offset_size())?,

            // Stack manipulation, arithmetic, comparisons, literals and
            // plain register ops take no operands.
            DW_OP_deref
            | DW_OP_xderef
            | DW_OP_dup..=DW_OP_rot
            | DW_OP_abs..=DW_OP_plus
            | DW_OP_eq..=DW_OP_ne
            | DW_OP_lit0..=DW_OP_reg31
            | DW_OP_nop
            | DW_OP_push_object_address
            | DW_OP_form_tls_address
            | DW_OP_call_frame_cfa
            | DW_OP_stack_value => {}

            _ => {
                debug!("Skipping expression tail after unknown op {op:#04x}");
                cur.skip(cur.remaining())?;
                break;
            }
        }
    }

    Ok(())
}
