// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Constant tables from the DWARF standard.
//!
//! Only the tags and attributes the extraction buckets act upon are named
//! here; everything else passes through the form-driven dispatch untouched.
//! The form and opcode tables are complete for DWARF 5 because they decide
//! how many bytes the cursor advances.

#![allow(missing_docs)]

// Unit types (DWARF 5, section 7.5.1).
pub const DW_UT_compile: u8 = 0x01;
pub const DW_UT_type: u8 = 0x02;
pub const DW_UT_partial: u8 = 0x03;
pub const DW_UT_skeleton: u8 = 0x04;
pub const DW_UT_split_compile: u8 = 0x05;
pub const DW_UT_split_type: u8 = 0x06;

// DIE tags.
pub const DW_TAG_compile_unit: u64 = 0x11;
pub const DW_TAG_subprogram: u64 = 0x2e;

pub const DW_CHILDREN_yes: u8 = 0x01;

// Attributes with extraction semantics.
pub const DW_AT_name: u64 = 0x03;
pub const DW_AT_stmt_list: u64 = 0x10;
pub const DW_AT_low_pc: u64 = 0x11;
pub const DW_AT_high_pc: u64 = 0x12;
pub const DW_AT_language: u64 = 0x13;
pub const DW_AT_comp_dir: u64 = 0x1b;
pub const DW_AT_producer: u64 = 0x25;
pub const DW_AT_declaration: u64 = 0x3c;
pub const DW_AT_specification: u64 = 0x47;
pub const DW_AT_linkage_name: u64 = 0x6e;

// Vendor attribute used by older GNU toolchains in place of linkage_name.
pub const DW_AT_MIPS_linkage_name: u64 = 0x2007;

// Attribute forms.
pub const DW_FORM_addr: u64 = 0x01;
pub const DW_FORM_block2: u64 = 0x03;
pub const DW_FORM_block4: u64 = 0x04;
pub const DW_FORM_data2: u64 = 0x05;
pub const DW_FORM_data4: u64 = 0x06;
pub const DW_FORM_data8: u64 = 0x07;
pub const DW_FORM_string: u64 = 0x08;
pub const DW_FORM_block: u64 = 0x09;
pub const DW_FORM_block1: u64 = 0x0a;
pub const DW_FORM_data1: u64 = 0x0b;
pub const DW_FORM_flag: u64 = 0x0c;
pub const DW_FORM_sdata: u64 = 0x0d;
pub const DW_FORM_strp: u64 = 0x0e;
pub const DW_FORM_udata: u64 = 0x0f;
pub const DW_FORM_ref_addr: u64 = 0x10;
pub const DW_FORM_ref1: u64 = 0x11;
pub const DW_FORM_ref2: u64 = 0x12;
pub const DW_FORM_ref4: u64 = 0x13;
pub const DW_FORM_ref8: u64 = 0x14;
pub const DW_FORM_ref_udata: u64 = 0x15;
pub const DW_FORM_indirect: u64 = 0x16;
pub const DW_FORM_sec_offset: u64 = 0x17;
pub const DW_FORM_exprloc: u64 = 0x18;
pub const DW_FORM_flag_present: u64 = 0x19;
pub const DW_FORM_strx: u64 = 0x1a;
pub const DW_FORM_addrx: u64 = 0x1b;
pub const DW_FORM_ref_sup4: u64 = 0x1c;
pub const DW_FORM_strp_sup: u64 = 0x1d;
pub const DW_FORM_data16: u64 = 0x1e;
pub const DW_FORM_line_strp: u64 = 0x1f;
pub const DW_FORM_ref_sig8: u64 = 0x20;
pub const DW_FORM_implicit_const: u64 = 0x21;
pub const DW_FORM_loclistx: u64 = 0x22;
pub const DW_FORM_rnglistx: u64 = 0x23;
pub const DW_FORM_ref_sup8: u64 = 0x24;
pub const DW_FORM_strx1: u64 = 0x25;
pub const DW_FORM_strx2: u64 = 0x26;
pub const DW_FORM_strx3: u64 = 0x27;
pub const DW_FORM_strx4: u64 = 0x28;
pub const DW_FORM_addrx1: u64 = 0x29;
pub const DW_FORM_addrx2: u64 = 0x2a;
pub const DW_FORM_addrx3: u64 = 0x2b;
pub const DW_FORM_addrx4: u64 = 0x2c;

// Line-number standard opcodes.
pub const DW_LNS_copy: u8 = 0x01;
pub const DW_LNS_advance_pc: u8 = 0x02;
pub const DW_LNS_advance_line: u8 = 0x03;
pub const DW_LNS_set_file: u8 = 0x04;
pub const DW_LNS_set_column: u8 = 0x05;
pub const DW_LNS_negate_stmt: u8 = 0x06;
pub const DW_LNS_set_basic_block: u8 = 0x07;
pub const DW_LNS_const_add_pc: u8 = 0x08;
pub const DW_LNS_fixed_advance_pc: u8 = 0x09;
pub const DW_LNS_set_prologue_end: u8 = 0x0a;
pub const DW_LNS_set_epilogue_begin: u8 = 0x0b;
pub const DW_LNS_set_isa: u8 = 0x0c;

// Line-number extended opcodes.
pub const DW_LNE_end_sequence: u8 = 0x01;
pub const DW_LNE_set_address: u8 = 0x02;
pub const DW_LNE_define_file: u8 = 0x03;
pub const DW_LNE_set_discriminator: u8 = 0x04;
pub const DW_LNE_lo_user: u8 = 0x80;
pub const DW_LNE_hi_user: u8 = 0xff;

// Line-header entry content types (DWARF 5, table 7.27).
pub const DW_LNCT_path: u64 = 0x1;
pub const DW_LNCT_directory_index: u64 = 0x2;
pub const DW_LNCT_timestamp: u64 = 0x3;
pub const DW_LNCT_size: u64 = 0x4;
pub const DW_LNCT_MD5: u64 = 0x5;

// Expression opcodes that carry operands, plus the range boundaries for the
// operand-free groups. Everything not named here either takes no operand or
// is outside the known set.
pub const DW_OP_addr: u8 = 0x03;
pub const DW_OP_deref: u8 = 0x06;
pub const DW_OP_const1u: u8 = 0x08;
pub const DW_OP_const1s: u8 = 0x09;
pub const DW_OP_const2u: u8 = 0x0a;
pub const DW_OP_const2s: u8 = 0x0b;
pub const DW_OP_const4u: u8 = 0x0c;
pub const DW_OP_const4s: u8 = 0x0d;
pub const DW_OP_const8u: u8 = 0x0e;
pub const DW_OP_const8s: u8 = 0x0f;
pub const DW_OP_constu: u8 = 0x10;
pub const DW_OP_consts: u8 = 0x11;
pub const DW_OP_dup: u8 = 0x12;
pub const DW_OP_pick: u8 = 0x15;
pub const DW_OP_rot: u8 = 0x17;
pub const DW_OP_xderef: u8 = 0x18;
pub const DW_OP_abs: u8 = 0x19;
pub const DW_OP_plus: u8 = 0x22;
pub const DW_OP_plus_uconst: u8 = 0x23;
pub const DW_OP_bra: u8 = 0x28;
pub const DW_OP_eq: u8 = 0x29;
pub const DW_OP_ne: u8 = 0x2e;
pub const DW_OP_skip: u8 = 0x2f;
pub const DW_OP_lit0: u8 = 0x30;
pub const DW_OP_lit31: u8 = 0x4f;
pub const DW_OP_reg0: u8 = 0x50;
pub const DW_OP_reg31: u8 = 0x6f;
pub const DW_OP_breg0: u8 = 0x70;
pub const DW_OP_breg31: u8 = 0x8f;
pub const DW_OP_regx: u8 = 0x90;
pub const DW_OP_fbreg: u8 = 0x91;
pub const DW_OP_bregx: u8 = 0x92;
pub const DW_OP_piece: u8 = 0x93;
pub const DW_OP_deref_size: u8 = 0x94;
pub const DW_OP_xderef_size: u8 = 0x95;
pub const DW_OP_nop: u8 = 0x96;
pub const DW_OP_push_object_address: u8 = 0x97;
pub const DW_OP_call2: u8 = 0x98;
pub const DW_OP_call4: u8 = 0x99;
pub const DW_OP_call_ref: u8 = 0x9a;
pub const DW_OP_form_tls_address: u8 = 0x9b;
pub const DW_OP_call_frame_cfa: u8 = 0x9c;
pub const DW_OP_bit_piece: u8 = 0x9d;
pub const DW_OP_implicit_value: u8 = 0x9e;
pub const DW_OP_stack_value: u8 = 0x9f;
pub const DW_OP_lo_user: u8 = 0xe0;
pub const DW_OP_hi_user: u8 = 0xff;

pub const DW_LANG_Rust: u64 = 0x001c;

/// The well-known name for a DWARF language code.
pub fn language_name(code: u64) -> Option<&'static str> {
    Some(match code {
        0x0001 => "C89",
        0x0002 => "C",
        0x0003 => "Ada83",
        0x0004 => "C++",
        0x0005 => "Cobol74",
        0x0006 => "Cobol85",
        0x0007 => "Fortran77",
        0x0008 => "Fortran90",
        0x0009 => "Pascal83",
        0x000a => "Modula2",
        0x000b => "Java",
        0x000c => "C99",
        0x000d => "Ada95",
        0x000e => "Fortran95",
        0x000f => "PLI",
        0x0010 => "Objective-C",
        0x0011 => "Objective-C++",
        0x0012 => "UPC",
        0x0013 => "D",
        0x0014 => "Python",
        0x0015 => "OpenCL",
        0x0016 => "Go",
        0x0017 => "Modula3",
        0x0018 => "Haskell",
        0x0019 => "C++03",
        0x001a => "C++11",
        0x001b => "OCaml",
        DW_LANG_Rust => "Rust",
        0x001d => "C11",
        0x001e => "Swift",
        0x001f => "Julia",
        0x0020 => "Dylan",
        0x0021 => "C++14",
        0x0022 => "Fortran03",
        0x0023 => "Fortran08",
        0x0024 => "RenderScript",
        0x0025 => "BLISS",
        _ => return None,
    })
}
