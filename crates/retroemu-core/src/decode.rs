//! Opcode classification: the 256-entry dispatch table mapping every opcode
//! byte to its mnemonic and addressing mode.

/// Instruction mnemonics of the documented 6502 set, plus [`Mnemonic::Unknown`]
/// for the undocumented bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[allow(missing_docs)]
pub enum Mnemonic {
    Adc, And, Asl, Bcc, Bcs, Beq, Bit, Bmi, Bne, Bpl, Brk, Bvc, Bvs, Clc,
    Cld, Cli, Clv, Cmp, Cpx, Cpy, Dec, Dex, Dey, Eor, Inc, Inx, Iny, Jmp,
    Jsr, Lda, Ldx, Ldy, Lsr, Nop, Ora, Pha, Php, Pla, Plp, Rol, Ror, Rti,
    Rts, Sbc, Sec, Sed, Sei, Sta, Stx, Sty, Tax, Tay, Tsx, Txa, Txs, Tya,
    /// Undocumented opcode byte.
    Unknown,
}

impl Mnemonic {
    /// Canonical assembler spelling.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Adc => "ADC",
            Self::And => "AND",
            Self::Asl => "ASL",
            Self::Bcc => "BCC",
            Self::Bcs => "BCS",
            Self::Beq => "BEQ",
            Self::Bit => "BIT",
            Self::Bmi => "BMI",
            Self::Bne => "BNE",
            Self::Bpl => "BPL",
            Self::Brk => "BRK",
            Self::Bvc => "BVC",
            Self::Bvs => "BVS",
            Self::Clc => "CLC",
            Self::Cld => "CLD",
            Self::Cli => "CLI",
            Self::Clv => "CLV",
            Self::Cmp => "CMP",
            Self::Cpx => "CPX",
            Self::Cpy => "CPY",
            Self::Dec => "DEC",
            Self::Dex => "DEX",
            Self::Dey => "DEY",
            Self::Eor => "EOR",
            Self::Inc => "INC",
            Self::Inx => "INX",
            Self::Iny => "INY",
            Self::Jmp => "JMP",
            Self::Jsr => "JSR",
            Self::Lda => "LDA",
            Self::Ldx => "LDX",
            Self::Ldy => "LDY",
            Self::Lsr => "LSR",
            Self::Nop => "NOP",
            Self::Ora => "ORA",
            Self::Pha => "PHA",
            Self::Php => "PHP",
            Self::Pla => "PLA",
            Self::Plp => "PLP",
            Self::Rol => "ROL",
            Self::Ror => "ROR",
            Self::Rti => "RTI",
            Self::Rts => "RTS",
            Self::Sbc => "SBC",
            Self::Sec => "SEC",
            Self::Sed => "SED",
            Self::Sei => "SEI",
            Self::Sta => "STA",
            Self::Stx => "STX",
            Self::Sty => "STY",
            Self::Tax => "TAX",
            Self::Tay => "TAY",
            Self::Tsx => "TSX",
            Self::Txa => "TXA",
            Self::Txs => "TXS",
            Self::Tya => "TYA",
            Self::Unknown => "???",
        }
    }
}

/// How an instruction's effective address or operand is derived from the
/// bytes following the opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum AddressingMode {
    /// No operand.
    Implied,
    /// The accumulator is the operand.
    Accumulator,
    /// Literal operand byte.
    Immediate,
    /// One-byte address in page zero.
    ZeroPage,
    /// Page-zero address plus X, wrapping within page zero.
    ZeroPageX,
    /// Page-zero address plus Y, wrapping within page zero.
    ZeroPageY,
    /// Signed offset applied to the program counter on a taken branch.
    Relative,
    /// Full 16-bit address.
    Absolute,
    /// 16-bit address plus X.
    AbsoluteX,
    /// 16-bit address plus Y.
    AbsoluteY,
    /// 16-bit pointer to the target address.
    Indirect,
    /// Page-zero pointer at operand plus X (wrapping), then indirection.
    IndexedIndirect,
    /// Indirection through a page-zero pointer, then plus Y.
    IndirectIndexed,
}

impl AddressingMode {
    /// Operand bytes following the opcode for this mode.
    #[must_use]
    pub const fn operand_len(self) -> u16 {
        match self {
            Self::Implied | Self::Accumulator => 0,
            Self::Immediate
            | Self::ZeroPage
            | Self::ZeroPageX
            | Self::ZeroPageY
            | Self::Relative
            | Self::IndexedIndirect
            | Self::IndirectIndexed => 1,
            Self::Absolute | Self::AbsoluteX | Self::AbsoluteY | Self::Indirect => 2,
        }
    }
}

/// One dispatch-table slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct OpcodeEntry {
    /// Decoded mnemonic.
    pub mnemonic: Mnemonic,
    /// Addressing mode governing operand fetch and resolution.
    pub mode: AddressingMode,
}

impl OpcodeEntry {
    /// Slot for an undocumented byte.
    pub const UNKNOWN: Self = Self {
        mnemonic: Mnemonic::Unknown,
        mode: AddressingMode::Implied,
    };

    const fn new(mnemonic: Mnemonic, mode: AddressingMode) -> Self {
        Self { mnemonic, mode }
    }
}

/// Number of documented opcode bytes in the legal instruction space.
pub const DOCUMENTED_OPCODE_COUNT: usize = 151;

/// Dispatch table indexed by opcode byte. Undocumented bytes hold
/// [`OpcodeEntry::UNKNOWN`]; addressing-mode variants of one mnemonic share
/// one execution handler, so the table is the only per-opcode state.
pub const OPCODE_TABLE: [OpcodeEntry; 256] = build_opcode_table();

#[allow(clippy::too_many_lines)]
const fn build_opcode_table() -> [OpcodeEntry; 256] {
    use AddressingMode::{
        Absolute, AbsoluteX, AbsoluteY, Accumulator, Immediate, Implied, IndexedIndirect,
        Indirect, IndirectIndexed, Relative, ZeroPage, ZeroPageX, ZeroPageY,
    };
    use Mnemonic::{
        Adc, And, Asl, Bcc, Bcs, Beq, Bit, Bmi, Bne, Bpl, Brk, Bvc, Bvs, Clc, Cld, Cli, Clv,
        Cmp, Cpx, Cpy, Dec, Dex, Dey, Eor, Inc, Inx, Iny, Jmp, Jsr, Lda, Ldx, Ldy, Lsr, Nop,
        Ora, Pha, Php, Pla, Plp, Rol, Ror, Rti, Rts, Sbc, Sec, Sed, Sei, Sta, Stx, Sty, Tax,
        Tay, Tsx, Txa, Txs, Tya,
    };

    let mut table = [OpcodeEntry::UNKNOWN; 256];

    table[0x69] = OpcodeEntry::new(Adc, Immediate);
    table[0x65] = OpcodeEntry::new(Adc, ZeroPage);
    table[0x75] = OpcodeEntry::new(Adc, ZeroPageX);
    table[0x6D] = OpcodeEntry::new(Adc, Absolute);
    table[0x7D] = OpcodeEntry::new(Adc, AbsoluteX);
    table[0x79] = OpcodeEntry::new(Adc, AbsoluteY);
    table[0x61] = OpcodeEntry::new(Adc, IndexedIndirect);
    table[0x71] = OpcodeEntry::new(Adc, IndirectIndexed);

    table[0x29] = OpcodeEntry::new(And, Immediate);
    table[0x25] = OpcodeEntry::new(And, ZeroPage);
    table[0x35] = OpcodeEntry::new(And, ZeroPageX);
    table[0x2D] = OpcodeEntry::new(And, Absolute);
    table[0x3D] = OpcodeEntry::new(And, AbsoluteX);
    table[0x39] = OpcodeEntry::new(And, AbsoluteY);
    table[0x21] = OpcodeEntry::new(And, IndexedIndirect);
    table[0x31] = OpcodeEntry::new(And, IndirectIndexed);

    table[0x0A] = OpcodeEntry::new(Asl, Accumulator);
    table[0x06] = OpcodeEntry::new(Asl, ZeroPage);
    table[0x16] = OpcodeEntry::new(Asl, ZeroPageX);
    table[0x0E] = OpcodeEntry::new(Asl, Absolute);
    table[0x1E] = OpcodeEntry::new(Asl, AbsoluteX);

    table[0x90] = OpcodeEntry::new(Bcc, Relative);
    table[0xB0] = OpcodeEntry::new(Bcs, Relative);
    table[0xF0] = OpcodeEntry::new(Beq, Relative);
    table[0x30] = OpcodeEntry::new(Bmi, Relative);
    table[0xD0] = OpcodeEntry::new(Bne, Relative);
    table[0x10] = OpcodeEntry::new(Bpl, Relative);
    table[0x50] = OpcodeEntry::new(Bvc, Relative);
    table[0x70] = OpcodeEntry::new(Bvs, Relative);

    table[0x24] = OpcodeEntry::new(Bit, ZeroPage);
    table[0x2C] = OpcodeEntry::new(Bit, Absolute);

    table[0x00] = OpcodeEntry::new(Brk, Implied);

    table[0x18] = OpcodeEntry::new(Clc, Implied);
    table[0xD8] = OpcodeEntry::new(Cld, Implied);
    table[0x58] = OpcodeEntry::new(Cli, Implied);
    table[0xB8] = OpcodeEntry::new(Clv, Implied);

    table[0xC9] = OpcodeEntry::new(Cmp, Immediate);
    table[0xC5] = OpcodeEntry::new(Cmp, ZeroPage);
    table[0xD5] = OpcodeEntry::new(Cmp, ZeroPageX);
    table[0xCD] = OpcodeEntry::new(Cmp, Absolute);
    table[0xDD] = OpcodeEntry::new(Cmp, AbsoluteX);
    table[0xD9] = OpcodeEntry::new(Cmp, AbsoluteY);
    table[0xC1] = OpcodeEntry::new(Cmp, IndexedIndirect);
    table[0xD1] = OpcodeEntry::new(Cmp, IndirectIndexed);

    table[0xE0] = OpcodeEntry::new(Cpx, Immediate);
    table[0xE4] = OpcodeEntry::new(Cpx, ZeroPage);
    table[0xEC] = OpcodeEntry::new(Cpx, Absolute);

    table[0xC0] = OpcodeEntry::new(Cpy, Immediate);
    table[0xC4] = OpcodeEntry::new(Cpy, ZeroPage);
    table[0xCC] = OpcodeEntry::new(Cpy, Absolute);

    table[0xC6] = OpcodeEntry::new(Dec, ZeroPage);
    table[0xD6] = OpcodeEntry::new(Dec, ZeroPageX);
    table[0xCE] = OpcodeEntry::new(Dec, Absolute);
    table[0xDE] = OpcodeEntry::new(Dec, AbsoluteX);

    table[0xCA] = OpcodeEntry::new(Dex, Implied);
    table[0x88] = OpcodeEntry::new(Dey, Implied);

    table[0x49] = OpcodeEntry::new(Eor, Immediate);
    table[0x45] = OpcodeEntry::new(Eor, ZeroPage);
    table[0x55] = OpcodeEntry::new(Eor, ZeroPageX);
    table[0x4D] = OpcodeEntry::new(Eor, Absolute);
    table[0x5D] = OpcodeEntry::new(Eor, AbsoluteX);
    table[0x59] = OpcodeEntry::new(Eor, AbsoluteY);
    table[0x41] = OpcodeEntry::new(Eor, IndexedIndirect);
    table[0x51] = OpcodeEntry::new(Eor, IndirectIndexed);

    table[0xE6] = OpcodeEntry::new(Inc, ZeroPage);
    table[0xF6] = OpcodeEntry::new(Inc, ZeroPageX);
    table[0xEE] = OpcodeEntry::new(Inc, Absolute);
    table[0xFE] = OpcodeEntry::new(Inc, AbsoluteX);

    table[0xE8] = OpcodeEntry::new(Inx, Implied);
    table[0xC8] = OpcodeEntry::new(Iny, Implied);

    table[0x4C] = OpcodeEntry::new(Jmp, Absolute);
    table[0x6C] = OpcodeEntry::new(Jmp, Indirect);
    table[0x20] = OpcodeEntry::new(Jsr, Absolute);

    table[0xA9] = OpcodeEntry::new(Lda, Immediate);
    table[0xA5] = OpcodeEntry::new(Lda, ZeroPage);
    table[0xB5] = OpcodeEntry::new(Lda, ZeroPageX);
    table[0xAD] = OpcodeEntry::new(Lda, Absolute);
    table[0xBD] = OpcodeEntry::new(Lda, AbsoluteX);
    table[0xB9] = OpcodeEntry::new(Lda, AbsoluteY);
    table[0xA1] = OpcodeEntry::new(Lda, IndexedIndirect);
    table[0xB1] = OpcodeEntry::new(Lda, IndirectIndexed);

    table[0xA2] = OpcodeEntry::new(Ldx, Immediate);
    table[0xA6] = OpcodeEntry::new(Ldx, ZeroPage);
    table[0xB6] = OpcodeEntry::new(Ldx, ZeroPageY);
    table[0xAE] = OpcodeEntry::new(Ldx, Absolute);
    table[0xBE] = OpcodeEntry::new(Ldx, AbsoluteY);

    table[0xA0] = OpcodeEntry::new(Ldy, Immediate);
    table[0xA4] = OpcodeEntry::new(Ldy, ZeroPage);
    table[0xB4] = OpcodeEntry::new(Ldy, ZeroPageX);
    table[0xAC] = OpcodeEntry::new(Ldy, Absolute);
    table[0xBC] = OpcodeEntry::new(Ldy, AbsoluteX);

    table[0x4A] = OpcodeEntry::new(Lsr, Accumulator);
    table[0x46] = OpcodeEntry::new(Lsr, ZeroPage);
    table[0x56] = OpcodeEntry::new(Lsr, ZeroPageX);
    table[0x4E] = OpcodeEntry::new(Lsr, Absolute);
    table[0x5E] = OpcodeEntry::new(Lsr, AbsoluteX);

    table[0xEA] = OpcodeEntry::new(Nop, Implied);

    table[0x09] = OpcodeEntry::new(Ora, Immediate);
    table[0x05] = OpcodeEntry::new(Ora, ZeroPage);
    table[0x15] = OpcodeEntry::new(Ora, ZeroPageX);
    table[0x0D] = OpcodeEntry::new(Ora, Absolute);
    table[0x1D] = OpcodeEntry::new(Ora, AbsoluteX);
    table[0x19] = OpcodeEntry::new(Ora, AbsoluteY);
    table[0x01] = OpcodeEntry::new(Ora, IndexedIndirect);
    table[0x11] = OpcodeEntry::new(Ora, IndirectIndexed);

    table[0x48] = OpcodeEntry::new(Pha, Implied);
    table[0x08] = OpcodeEntry::new(Php, Implied);
    table[0x68] = OpcodeEntry::new(Pla, Implied);
    table[0x28] = OpcodeEntry::new(Plp, Implied);

    table[0x2A] = OpcodeEntry::new(Rol, Accumulator);
    table[0x26] = OpcodeEntry::new(Rol, ZeroPage);
    table[0x36] = OpcodeEntry::new(Rol, ZeroPageX);
    table[0x2E] = OpcodeEntry::new(Rol, Absolute);
    table[0x3E] = OpcodeEntry::new(Rol, AbsoluteX);

    table[0x6A] = OpcodeEntry::new(Ror, Accumulator);
    table[0x66] = OpcodeEntry::new(Ror, ZeroPage);
    table[0x76] = OpcodeEntry::new(Ror, ZeroPageX);
    table[0x6E] = OpcodeEntry::new(Ror, Absolute);
    table[0x7E] = OpcodeEntry::new(Ror, AbsoluteX);

    table[0x40] = OpcodeEntry::new(Rti, Implied);
    table[0x60] = OpcodeEntry::new(Rts, Implied);

    table[0xE9] = OpcodeEntry::new(Sbc, Immediate);
    table[0xE5] = OpcodeEntry::new(Sbc, ZeroPage);
    table[0xF5] = OpcodeEntry::new(Sbc, ZeroPageX);
    table[0xED] = OpcodeEntry::new(Sbc, Absolute);
    table[0xFD] = OpcodeEntry::new(Sbc, AbsoluteX);
    table[0xF9] = OpcodeEntry::new(Sbc, AbsoluteY);
    table[0xE1] = OpcodeEntry::new(Sbc, IndexedIndirect);
    table[0xF1] = OpcodeEntry::new(Sbc, IndirectIndexed);

    table[0x38] = OpcodeEntry::new(Sec, Implied);
    table[0xF8] = OpcodeEntry::new(Sed, Implied);
    table[0x78] = OpcodeEntry::new(Sei, Implied);

    table[0x85] = OpcodeEntry::new(Sta, ZeroPage);
    table[0x95] = OpcodeEntry::new(Sta, ZeroPageX);
    table[0x8D] = OpcodeEntry::new(Sta, Absolute);
    table[0x9D] = OpcodeEntry::new(Sta, AbsoluteX);
    table[0x99] = OpcodeEntry::new(Sta, AbsoluteY);
    table[0x81] = OpcodeEntry::new(Sta, IndexedIndirect);
    table[0x91] = OpcodeEntry::new(Sta, IndirectIndexed);

    table[0x86] = OpcodeEntry::new(Stx, ZeroPage);
    table[0x96] = OpcodeEntry::new(Stx, ZeroPageY);
    table[0x8E] = OpcodeEntry::new(Stx, Absolute);

    table[0x84] = OpcodeEntry::new(Sty, ZeroPage);
    table[0x94] = OpcodeEntry::new(Sty, ZeroPageX);
    table[0x8C] = OpcodeEntry::new(Sty, Absolute);

    table[0xAA] = OpcodeEntry::new(Tax, Implied);
    table[0xA8] = OpcodeEntry::new(Tay, Implied);
    table[0xBA] = OpcodeEntry::new(Tsx, Implied);
    table[0x8A] = OpcodeEntry::new(Txa, Implied);
    table[0x9A] = OpcodeEntry::new(Txs, Implied);
    table[0x98] = OpcodeEntry::new(Tya, Implied);

    table
}

const _: () = {
    let mut documented = 0;
    let mut i = 0;
    while i < OPCODE_TABLE.len() {
        if !matches!(OPCODE_TABLE[i].mnemonic, Mnemonic::Unknown) {
            documented += 1;
        }
        i += 1;
    }
    assert!(
        documented == DOCUMENTED_OPCODE_COUNT,
        "dispatch table must cover exactly the documented opcode space"
    );
};

/// Looks up the dispatch entry for an opcode byte.
#[must_use]
pub const fn decode(opcode: u8) -> OpcodeEntry {
    OPCODE_TABLE[opcode as usize]
}

/// One decoded instruction, produced per step and discarded.
///
/// `bytes()` exposes the raw encoding for external disassemblers; the core
/// renders no text itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct DecodedInstruction {
    /// Address the opcode byte was fetched from.
    pub pc: u16,
    /// Raw opcode byte.
    pub opcode: u8,
    /// Decoded mnemonic.
    pub mnemonic: Mnemonic,
    /// Addressing mode.
    pub mode: AddressingMode,
    /// Raw operand value (zero-extended; zero when the mode takes none).
    pub operand: u16,
    /// Resolved effective address for memory-operand modes.
    pub effective_addr: Option<u16>,
    raw: [u8; 3],
    len: u8,
}

impl DecodedInstruction {
    pub(crate) const fn new(
        pc: u16,
        opcode: u8,
        entry: OpcodeEntry,
        operand: u16,
        effective_addr: Option<u16>,
    ) -> Self {
        let operand_len = entry.mode.operand_len();
        let [operand_low, operand_high] = operand.to_le_bytes();
        Self {
            pc,
            opcode,
            mnemonic: entry.mnemonic,
            mode: entry.mode,
            operand,
            effective_addr,
            raw: [opcode, operand_low, operand_high],
            len: 1 + operand_len as u8,
        }
    }

    /// Raw instruction bytes, opcode first.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.raw[..usize::from(self.len)]
    }
}
