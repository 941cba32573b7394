//! The 6502 instruction engine: fetch, decode, execute against a register
//! file and an address space.

use crate::decode::{decode, AddressingMode, DecodedInstruction, Mnemonic, OpcodeEntry};
use crate::flags::Flags;
use crate::memory::AddressSpace;
use crate::register::{DisplayMode, Register, RegisterFile};

/// Address of the 16-bit little-endian reset vector.
pub const RESET_VECTOR: u16 = 0xFFFC;
/// Address of the 16-bit little-endian IRQ/BRK vector.
pub const IRQ_VECTOR: u16 = 0xFFFE;
/// Base address of the hardware stack (page 1).
pub const STACK_BASE: u16 = 0x0100;

/// Names of the registers the engine installs in its [`RegisterFile`].
pub mod reg {
    /// Program counter, 16 bits.
    pub const PC: &str = "PC";
    /// Stack pointer, 8-bit offset into page 1.
    pub const SP: &str = "SP";
    /// Accumulator.
    pub const A: &str = "A";
    /// X index register.
    pub const X: &str = "X";
    /// Y index register.
    pub const Y: &str = "Y";
    /// Status register.
    pub const FLAGS: &str = "FLAGS";
}

/// Engine execution state.
///
/// A freshly built or reset engine is [`RunState::Uninitialized`]; the first
/// step loads the reset vector and enters [`RunState::Running`], which only
/// an explicit [`Mos6502::reset`] leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum RunState {
    /// Registers hold reset values; the reset vector has not been read.
    #[default]
    Uninitialized,
    /// Executing instructions.
    Running,
}

/// What one call to [`Mos6502::step`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum StepOutcome {
    /// First step after reset: the program counter was loaded from the
    /// reset vector and nothing executed.
    VectorLoaded {
        /// Value loaded into the program counter.
        pc: u16,
    },
    /// A documented instruction was executed.
    Executed(DecodedInstruction),
    /// An undocumented opcode byte was consumed and skipped; execution
    /// continues at the next byte.
    UnknownOpcode {
        /// The undocumented byte.
        opcode: u8,
        /// Address it was fetched from.
        pc: u16,
    },
}

/// Resolved operand of the current instruction.
///
/// Memory forms carry the effective address; read-modify-write handlers
/// reuse the same address for the write-back, so the read and write sides
/// can never disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operand {
    Implied,
    Accumulator,
    Immediate(u8),
    Memory(u16),
    Branch(i8),
}

impl Operand {
    const fn effective_addr(self) -> Option<u16> {
        match self {
            Self::Memory(addr) => Some(addr),
            Self::Implied | Self::Accumulator | Self::Immediate(_) | Self::Branch(_) => None,
        }
    }
}

/// MOS 6502 instruction engine.
///
/// Owns the register file it creates; memory is passed per step so one
/// address space can be shared with inspector-side readers between steps.
#[derive(Debug)]
pub struct Mos6502 {
    regs: RegisterFile,
    state: RunState,
    retired: u64,
    unknown: u64,
}

impl Default for Mos6502 {
    fn default() -> Self {
        Self::new()
    }
}

impl Mos6502 {
    /// Creates an engine in [`RunState::Uninitialized`] with the full 6502
    /// register set installed.
    #[must_use]
    pub fn new() -> Self {
        let mut regs = RegisterFile::new();
        let install = |regs: &mut RegisterFile, name, register| {
            // Fixed distinct names; add cannot fail.
            let _ = regs.add(name, register);
        };
        install(
            &mut regs,
            reg::PC,
            Register::new(16, 0x0000, DisplayMode::Hex).with_help("program counter"),
        );
        install(
            &mut regs,
            reg::SP,
            Register::new(8, 0xFD, DisplayMode::Hex).with_help("stack pointer, page 1 offset"),
        );
        install(
            &mut regs,
            reg::A,
            Register::new(8, 0x00, DisplayMode::Hex).with_help("accumulator"),
        );
        install(
            &mut regs,
            reg::X,
            Register::new(8, 0x00, DisplayMode::Hex).with_help("X index"),
        );
        install(
            &mut regs,
            reg::Y,
            Register::new(8, 0x00, DisplayMode::Hex).with_help("Y index"),
        );
        install(
            &mut regs,
            reg::FLAGS,
            Register::new(8, 0x04, DisplayMode::Bin)
                .with_masks(0x00, 0x20)
                .with_bit_labels(&["n", "v", "-", "b", "d", "i", "z", "c"])
                .with_help("status flags"),
        );
        Self {
            regs,
            state: RunState::Uninitialized,
            retired: 0,
            unknown: 0,
        }
    }

    /// Current execution state.
    #[must_use]
    pub const fn run_state(&self) -> RunState {
        self.state
    }

    /// The engine's register file, for display and inspection.
    #[must_use]
    pub const fn registers(&self) -> &RegisterFile {
        &self.regs
    }

    /// Mutable register access for inspector-side pokes. Callers must not
    /// mutate concurrently with [`Mos6502::step`].
    pub const fn registers_mut(&mut self) -> &mut RegisterFile {
        &mut self.regs
    }

    /// Instructions executed since construction.
    #[must_use]
    pub const fn instructions_retired(&self) -> u64 {
        self.retired
    }

    /// Undocumented opcode bytes skipped since construction.
    #[must_use]
    pub const fn unknown_opcodes(&self) -> u64 {
        self.unknown
    }

    /// Resets every register and returns to [`RunState::Uninitialized`].
    /// The program counter is reloaded from the reset vector on the next
    /// step, not here.
    pub fn reset(&mut self) {
        self.regs.reset_all();
        self.state = RunState::Uninitialized;
    }

    /// Runs one cycle of the engine state machine.
    ///
    /// From [`RunState::Uninitialized`] this loads the program counter from
    /// [`RESET_VECTOR`] and returns without executing. Otherwise it fetches,
    /// decodes and executes exactly one instruction; undocumented opcodes
    /// consume their byte and are skipped.
    pub fn step(&mut self, mem: &mut AddressSpace) -> StepOutcome {
        if self.state == RunState::Uninitialized {
            let pc = mem.read16(RESET_VECTOR);
            self.regs[reg::PC].set(u32::from(pc));
            self.state = RunState::Running;
            return StepOutcome::VectorLoaded { pc };
        }

        let pc = self.pc();
        let opcode = self.fetch8(mem);
        let entry = decode(opcode);

        if entry.mnemonic == Mnemonic::Unknown {
            log::error!("unknown opcode {opcode:#04x} at {pc:#06x}");
            self.unknown += 1;
            return StepOutcome::UnknownOpcode { opcode, pc };
        }

        let operand_raw = match entry.mode.operand_len() {
            1 => u16::from(self.fetch8(mem)),
            2 => self.fetch16(mem),
            _ => 0,
        };
        let operand = self.resolve(entry.mode, operand_raw, mem);

        self.execute(entry, operand, mem);
        self.retired += 1;

        StepOutcome::Executed(DecodedInstruction::new(
            pc,
            opcode,
            entry,
            operand_raw,
            operand.effective_addr(),
        ))
    }

    // -- register shorthand -------------------------------------------------

    fn pc(&self) -> u16 {
        self.regs[reg::PC].get() as u16
    }

    fn set_pc(&mut self, value: u16) {
        self.regs[reg::PC].set(u32::from(value));
    }

    fn get8(&self, name: &str) -> u8 {
        self.regs[name].get() as u8
    }

    fn set8(&mut self, name: &str, value: u8) {
        self.regs[name].set(u32::from(value));
    }

    fn flags(&self) -> Flags {
        Flags::from_bits(self.get8(reg::FLAGS))
    }

    fn set_flags(&mut self, flags: Flags) {
        self.set8(reg::FLAGS, flags.bits());
    }

    fn update_zero_negative(&mut self, result: u8) {
        let mut flags = self.flags();
        flags.set_zero_negative(result);
        self.set_flags(flags);
    }

    // -- fetch and addressing ----------------------------------------------

    fn fetch8(&mut self, mem: &AddressSpace) -> u8 {
        let value = mem.read(self.pc());
        let next = self.pc().wrapping_add(1);
        self.set_pc(next);
        value
    }

    fn fetch16(&mut self, mem: &AddressSpace) -> u16 {
        let low = self.fetch8(mem);
        let high = self.fetch8(mem);
        u16::from_le_bytes([low, high])
    }

    /// Reads a 16-bit pointer from page zero, wrapping within the page.
    fn zero_page_read16(mem: &AddressSpace, zp: u8) -> u16 {
        let low = mem.read(u16::from(zp));
        let high = mem.read(u16::from(zp.wrapping_add(1)));
        u16::from_le_bytes([low, high])
    }

    fn resolve(&self, mode: AddressingMode, operand: u16, mem: &AddressSpace) -> Operand {
        let x = self.get8(reg::X);
        let y = self.get8(reg::Y);
        match mode {
            AddressingMode::Implied => Operand::Implied,
            AddressingMode::Accumulator => Operand::Accumulator,
            AddressingMode::Immediate => Operand::Immediate(operand as u8),
            AddressingMode::ZeroPage => Operand::Memory(operand),
            AddressingMode::ZeroPageX => {
                Operand::Memory(u16::from((operand as u8).wrapping_add(x)))
            }
            AddressingMode::ZeroPageY => {
                Operand::Memory(u16::from((operand as u8).wrapping_add(y)))
            }
            AddressingMode::Relative => Operand::Branch(operand as u8 as i8),
            AddressingMode::Absolute => Operand::Memory(operand),
            AddressingMode::AbsoluteX => Operand::Memory(operand.wrapping_add(u16::from(x))),
            AddressingMode::AbsoluteY => Operand::Memory(operand.wrapping_add(u16::from(y))),
            AddressingMode::Indirect => Operand::Memory(mem.read16(operand)),
            AddressingMode::IndexedIndirect => {
                let pointer = (operand as u8).wrapping_add(x);
                Operand::Memory(Self::zero_page_read16(mem, pointer))
            }
            AddressingMode::IndirectIndexed => {
                let base = Self::zero_page_read16(mem, operand as u8);
                Operand::Memory(base.wrapping_add(u16::from(y)))
            }
        }
    }

    /// Operand value for read-style instructions.
    fn operand_value(&self, operand: Operand, mem: &AddressSpace) -> u8 {
        match operand {
            Operand::Accumulator => self.get8(reg::A),
            Operand::Immediate(value) => value,
            Operand::Memory(addr) => mem.read(addr),
            Operand::Implied | Operand::Branch(_) => 0,
        }
    }

    // -- stack --------------------------------------------------------------

    fn push(&mut self, mem: &mut AddressSpace, value: u8) {
        let sp = self.regs[reg::SP].decrement_post() as u16;
        mem.write(STACK_BASE + sp, value);
    }

    fn pop(&mut self, mem: &AddressSpace) -> u8 {
        let sp = self.regs[reg::SP].increment() as u16;
        mem.read(STACK_BASE + sp)
    }

    fn push16(&mut self, mem: &mut AddressSpace, value: u16) {
        let [low, high] = value.to_le_bytes();
        self.push(mem, high);
        self.push(mem, low);
    }

    fn pop16(&mut self, mem: &AddressSpace) -> u16 {
        let low = self.pop(mem);
        let high = self.pop(mem);
        u16::from_le_bytes([low, high])
    }

    // -- execution ----------------------------------------------------------

    fn execute(&mut self, entry: OpcodeEntry, operand: Operand, mem: &mut AddressSpace) {
        match entry.mnemonic {
            Mnemonic::Lda => self.op_load(reg::A, operand, mem),
            Mnemonic::Ldx => self.op_load(reg::X, operand, mem),
            Mnemonic::Ldy => self.op_load(reg::Y, operand, mem),
            Mnemonic::Sta => self.op_store(reg::A, operand, mem),
            Mnemonic::Stx => self.op_store(reg::X, operand, mem),
            Mnemonic::Sty => self.op_store(reg::Y, operand, mem),
            Mnemonic::Tax => self.op_transfer(reg::A, reg::X, true),
            Mnemonic::Tay => self.op_transfer(reg::A, reg::Y, true),
            Mnemonic::Txa => self.op_transfer(reg::X, reg::A, true),
            Mnemonic::Tya => self.op_transfer(reg::Y, reg::A, true),
            Mnemonic::Tsx => self.op_transfer(reg::SP, reg::X, true),
            Mnemonic::Txs => self.op_transfer(reg::X, reg::SP, false),
            Mnemonic::Adc => {
                let value = self.operand_value(operand, mem);
                self.op_adc(value);
            }
            Mnemonic::Sbc => {
                // Subtraction is addition of the one's complement; this also
                // yields the correct overflow rule for the subtract case.
                let value = self.operand_value(operand, mem);
                self.op_adc(value ^ 0xFF);
            }
            Mnemonic::And => self.op_logic(operand, mem, |a, v| a & v),
            Mnemonic::Ora => self.op_logic(operand, mem, |a, v| a | v),
            Mnemonic::Eor => self.op_logic(operand, mem, |a, v| a ^ v),
            Mnemonic::Cmp => self.op_compare(reg::A, operand, mem),
            Mnemonic::Cpx => self.op_compare(reg::X, operand, mem),
            Mnemonic::Cpy => self.op_compare(reg::Y, operand, mem),
            Mnemonic::Bit => self.op_bit(operand, mem),
            Mnemonic::Asl => self.op_shift(operand, mem, Shift::Asl),
            Mnemonic::Lsr => self.op_shift(operand, mem, Shift::Lsr),
            Mnemonic::Rol => self.op_shift(operand, mem, Shift::Rol),
            Mnemonic::Ror => self.op_shift(operand, mem, Shift::Ror),
            Mnemonic::Inc => self.op_rmw_step(operand, mem, 1),
            Mnemonic::Dec => self.op_rmw_step(operand, mem, u8::MAX),
            Mnemonic::Inx => {
                let value = self.regs[reg::X].increment() as u8;
                self.update_zero_negative(value);
            }
            Mnemonic::Iny => {
                let value = self.regs[reg::Y].increment() as u8;
                self.update_zero_negative(value);
            }
            Mnemonic::Dex => {
                let value = self.regs[reg::X].decrement() as u8;
                self.update_zero_negative(value);
            }
            Mnemonic::Dey => {
                let value = self.regs[reg::Y].decrement() as u8;
                self.update_zero_negative(value);
            }
            Mnemonic::Bcc => self.op_branch(operand, !self.flags().carry()),
            Mnemonic::Bcs => self.op_branch(operand, self.flags().carry()),
            Mnemonic::Bne => self.op_branch(operand, !self.flags().zero()),
            Mnemonic::Beq => self.op_branch(operand, self.flags().zero()),
            Mnemonic::Bpl => self.op_branch(operand, !self.flags().negative()),
            Mnemonic::Bmi => self.op_branch(operand, self.flags().negative()),
            Mnemonic::Bvc => self.op_branch(operand, !self.flags().overflow()),
            Mnemonic::Bvs => self.op_branch(operand, self.flags().overflow()),
            Mnemonic::Jmp => {
                if let Operand::Memory(addr) = operand {
                    self.set_pc(addr);
                }
            }
            Mnemonic::Jsr => {
                if let Operand::Memory(addr) = operand {
                    let return_addr = self.pc().wrapping_sub(1);
                    self.push16(mem, return_addr);
                    self.set_pc(addr);
                }
            }
            Mnemonic::Rts => {
                let addr = self.pop16(mem);
                self.set_pc(addr.wrapping_add(1));
            }
            Mnemonic::Brk => self.op_brk(mem),
            Mnemonic::Rti => self.op_rti(mem),
            Mnemonic::Pha => {
                let a = self.get8(reg::A);
                self.push(mem, a);
            }
            Mnemonic::Pla => {
                let value = self.pop(mem);
                self.set8(reg::A, value);
                self.update_zero_negative(value);
            }
            Mnemonic::Php => {
                let mut flags = self.flags();
                flags.set_break_flag(true);
                self.push(mem, flags.bits());
            }
            Mnemonic::Plp => {
                let mut flags = Flags::from_bits(self.pop(mem));
                flags.set_break_flag(false);
                self.set_flags(flags);
            }
            Mnemonic::Clc => self.with_flags(|f| f.set_carry(false)),
            Mnemonic::Sec => self.with_flags(|f| f.set_carry(true)),
            Mnemonic::Cld => self.with_flags(|f| f.set_decimal(false)),
            Mnemonic::Sed => self.with_flags(|f| f.set_decimal(true)),
            Mnemonic::Cli => self.with_flags(|f| f.set_irq_disable(false)),
            Mnemonic::Sei => self.with_flags(|f| f.set_irq_disable(true)),
            Mnemonic::Clv => self.with_flags(|f| f.set_overflow(false)),
            Mnemonic::Nop | Mnemonic::Unknown => {}
        }
    }

    fn with_flags(&mut self, f: impl FnOnce(&mut Flags)) {
        let mut flags = self.flags();
        f(&mut flags);
        self.set_flags(flags);
    }

    fn op_load(&mut self, target: &str, operand: Operand, mem: &AddressSpace) {
        let value = self.operand_value(operand, mem);
        self.set8(target, value);
        self.update_zero_negative(value);
    }

    fn op_store(&mut self, source: &str, operand: Operand, mem: &mut AddressSpace) {
        if let Operand::Memory(addr) = operand {
            let value = self.get8(source);
            mem.write(addr, value);
        }
    }

    fn op_transfer(&mut self, source: &str, target: &str, set_flags: bool) {
        let value = self.get8(source);
        self.set8(target, value);
        if set_flags {
            self.update_zero_negative(value);
        }
    }

    fn op_adc(&mut self, value: u8) {
        let a = self.get8(reg::A);
        let mut flags = self.flags();
        let sum = u16::from(a) + u16::from(value) + u16::from(flags.carry());
        let result = sum as u8;
        flags.set_carry(sum > 0xFF);
        flags.set_overflow((a ^ result) & (value ^ result) & 0x80 != 0);
        flags.set_zero_negative(result);
        self.set8(reg::A, result);
        self.set_flags(flags);
    }

    fn op_logic(&mut self, operand: Operand, mem: &AddressSpace, f: impl FnOnce(u8, u8) -> u8) {
        let value = self.operand_value(operand, mem);
        let result = f(self.get8(reg::A), value);
        self.set8(reg::A, result);
        self.update_zero_negative(result);
    }

    fn op_compare(&mut self, register: &str, operand: Operand, mem: &AddressSpace) {
        let lhs = self.get8(register);
        let rhs = self.operand_value(operand, mem);
        let diff = lhs.wrapping_sub(rhs);
        let mut flags = self.flags();
        flags.set_carry(lhs >= rhs);
        flags.set_zero_negative(diff);
        self.set_flags(flags);
    }

    fn op_bit(&mut self, operand: Operand, mem: &AddressSpace) {
        let value = self.operand_value(operand, mem);
        let mut flags = self.flags();
        flags.set_zero(self.get8(reg::A) & value == 0);
        flags.set_negative(value & 0x80 != 0);
        flags.set_overflow(value & 0x40 != 0);
        self.set_flags(flags);
    }

    /// Applies a shift to the accumulator or to memory, writing memory
    /// results back to the address the operand was read from.
    fn op_shift(&mut self, operand: Operand, mem: &mut AddressSpace, shift: Shift) {
        let carry_in = self.flags().carry();
        let apply = |value: u8| shift.apply(value, carry_in);
        match operand {
            Operand::Accumulator => {
                let (result, carry) = apply(self.get8(reg::A));
                self.set8(reg::A, result);
                self.finish_shift(result, carry);
            }
            Operand::Memory(addr) => {
                let (result, carry) = apply(mem.read(addr));
                mem.write(addr, result);
                self.finish_shift(result, carry);
            }
            Operand::Implied | Operand::Immediate(_) | Operand::Branch(_) => {}
        }
    }

    fn finish_shift(&mut self, result: u8, carry: bool) {
        let mut flags = self.flags();
        flags.set_carry(carry);
        flags.set_zero_negative(result);
        self.set_flags(flags);
    }

    /// INC/DEC: read, add `delta`, write back to the same effective address.
    fn op_rmw_step(&mut self, operand: Operand, mem: &mut AddressSpace, delta: u8) {
        if let Operand::Memory(addr) = operand {
            let result = mem.read(addr).wrapping_add(delta);
            mem.write(addr, result);
            self.update_zero_negative(result);
        }
    }

    fn op_branch(&mut self, operand: Operand, taken: bool) {
        if let Operand::Branch(offset) = operand {
            if taken {
                let target = self.pc().wrapping_add(offset as u16);
                self.set_pc(target);
            }
        }
    }

    fn op_brk(&mut self, mem: &mut AddressSpace) {
        let pc = self.pc();
        self.push16(mem, pc);
        let mut flags = self.flags();
        flags.set_break_flag(true);
        self.push(mem, flags.bits());
        self.with_flags(|f| {
            f.set_break_flag(true);
            f.set_irq_disable(true);
        });
        let target = mem.read16(IRQ_VECTOR);
        self.set_pc(target);
    }

    fn op_rti(&mut self, mem: &AddressSpace) {
        let mut flags = Flags::from_bits(self.pop(mem));
        flags.set_break_flag(false);
        self.set_flags(flags);
        let pc = self.pop16(mem);
        self.set_pc(pc);
    }
}

/// The four shift/rotate data paths, shared across accumulator and memory
/// addressing forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shift {
    Asl,
    Lsr,
    Rol,
    Ror,
}

impl Shift {
    /// Returns `(result, carry_out)`.
    const fn apply(self, value: u8, carry_in: bool) -> (u8, bool) {
        match self {
            Self::Asl => (value << 1, value & 0x80 != 0),
            Self::Lsr => (value >> 1, value & 0x01 != 0),
            Self::Rol => ((value << 1) | carry_in as u8, value & 0x80 != 0),
            Self::Ror => ((value >> 1) | ((carry_in as u8) << 7), value & 0x01 != 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{reg, Mos6502, RunState, Shift, StepOutcome, RESET_VECTOR, STACK_BASE};
    use crate::memory::AddressSpace;

    /// RAM over the full address space with the reset vector pointing at
    /// `origin` and `program` loaded there.
    fn machine_with(origin: u16, program: &[u8]) -> (Mos6502, AddressSpace) {
        let mut mem = AddressSpace::new();
        mem.map_zeroed("ram", 0x0000, 0x1_0000, true).expect("map");
        let [low, high] = origin.to_le_bytes();
        mem.write(RESET_VECTOR, low);
        mem.write(RESET_VECTOR + 1, high);
        for (i, byte) in program.iter().enumerate() {
            mem.write(origin.wrapping_add(i as u16), *byte);
        }
        let mut cpu = Mos6502::new();
        let outcome = cpu.step(&mut mem);
        assert_eq!(outcome, StepOutcome::VectorLoaded { pc: origin });
        (cpu, mem)
    }

    #[test]
    fn first_step_loads_reset_vector_and_executes_nothing() {
        let (cpu, _mem) = machine_with(0x0400, &[]);
        assert_eq!(cpu.run_state(), RunState::Running);
        assert_eq!(cpu.registers()[reg::PC].get(), 0x0400);
        assert_eq!(cpu.instructions_retired(), 0);
    }

    #[test]
    fn reset_returns_to_uninitialized() {
        let (mut cpu, mut mem) = machine_with(0x0400, &[0xEA]);
        cpu.step(&mut mem);
        cpu.reset();
        assert_eq!(cpu.run_state(), RunState::Uninitialized);
        assert_eq!(cpu.registers()[reg::PC].get(), 0x0000);
        assert_eq!(cpu.registers()[reg::SP].get(), 0xFD);
        assert_eq!(cpu.registers()[reg::FLAGS].get(), 0x04);
    }

    #[test]
    fn lda_immediate_sets_zero_and_negative() {
        let (mut cpu, mut mem) = machine_with(0x0400, &[0xA9, 0x00, 0xA9, 0x80]);
        cpu.step(&mut mem);
        assert_eq!(cpu.registers()[reg::A].get(), 0x00);
        assert!(cpu.flags().zero());
        assert!(!cpu.flags().negative());

        cpu.step(&mut mem);
        assert_eq!(cpu.registers()[reg::A].get(), 0x80);
        assert!(!cpu.flags().zero());
        assert!(cpu.flags().negative());
    }

    #[test]
    fn adc_50_plus_50_overflows() {
        // LDA #$50; ADC #$50 with carry clear.
        let (mut cpu, mut mem) = machine_with(0x0400, &[0xA9, 0x50, 0x69, 0x50]);
        cpu.step(&mut mem);
        cpu.step(&mut mem);
        assert_eq!(cpu.registers()[reg::A].get(), 0xA0);
        assert!(!cpu.flags().zero());
        assert!(cpu.flags().negative());
        assert!(cpu.flags().overflow());
        assert!(!cpu.flags().carry());
    }

    #[test]
    fn sbc_overflow_follows_subtraction_rule() {
        // SEC; LDA #$50; SBC #$B0 -> A=$A0, V set (positive - negative).
        let (mut cpu, mut mem) = machine_with(0x0400, &[0x38, 0xA9, 0x50, 0xE9, 0xB0]);
        for _ in 0..3 {
            cpu.step(&mut mem);
        }
        assert_eq!(cpu.registers()[reg::A].get(), 0xA0);
        assert!(cpu.flags().overflow());
        assert!(!cpu.flags().carry());

        // SEC; LDA #$50; SBC #$10 -> A=$40, V clear, carry set.
        let (mut cpu, mut mem) = machine_with(0x0400, &[0x38, 0xA9, 0x50, 0xE9, 0x10]);
        for _ in 0..3 {
            cpu.step(&mut mem);
        }
        assert_eq!(cpu.registers()[reg::A].get(), 0x40);
        assert!(!cpu.flags().overflow());
        assert!(cpu.flags().carry());
    }

    #[test]
    fn push_pop_round_trips_and_restores_sp() {
        let (mut cpu, mut mem) = machine_with(0x0400, &[]);
        let sp_before = cpu.registers()[reg::SP].get();
        cpu.push(&mut mem, 0x42);
        assert_eq!(cpu.pop(&mem), 0x42);
        assert_eq!(cpu.registers()[reg::SP].get(), sp_before);
    }

    #[test]
    fn stack_lives_in_page_one() {
        let (mut cpu, mut mem) = machine_with(0x0400, &[]);
        let sp = cpu.registers()[reg::SP].get() as u16;
        cpu.push(&mut mem, 0x99);
        assert_eq!(mem.read(STACK_BASE + sp), 0x99);
    }

    #[test]
    fn jsr_rts_round_trip() {
        // JSR $ABCD at $0400; RTS at $ABCD returns to $0403.
        let (mut cpu, mut mem) = machine_with(0x0400, &[0x20, 0xCD, 0xAB]);
        mem.write(0xABCD, 0x60);
        cpu.step(&mut mem);
        assert_eq!(cpu.registers()[reg::PC].get(), 0xABCD);
        cpu.step(&mut mem);
        assert_eq!(cpu.registers()[reg::PC].get(), 0x0403);
    }

    #[test]
    fn beq_moves_pc_only_when_zero_set() {
        // LDA #$00; BEQ +4.
        let (mut cpu, mut mem) = machine_with(0x0400, &[0xA9, 0x00, 0xF0, 0x04]);
        cpu.step(&mut mem);
        cpu.step(&mut mem);
        assert_eq!(cpu.registers()[reg::PC].get(), 0x0408);

        // LDA #$01; BEQ +4 falls through to the next instruction.
        let (mut cpu, mut mem) = machine_with(0x0400, &[0xA9, 0x01, 0xF0, 0x04]);
        cpu.step(&mut mem);
        cpu.step(&mut mem);
        assert_eq!(cpu.registers()[reg::PC].get(), 0x0404);
    }

    #[test]
    fn branch_accepts_negative_offsets() {
        // BNE -2 with zero clear loops back onto itself.
        let (mut cpu, mut mem) = machine_with(0x0400, &[0xA9, 0x01, 0xD0, 0xFE]);
        cpu.step(&mut mem);
        cpu.step(&mut mem);
        assert_eq!(cpu.registers()[reg::PC].get(), 0x0402);
    }

    #[test]
    fn unknown_opcode_is_skipped_and_execution_continues() {
        let (mut cpu, mut mem) = machine_with(0x0400, &[0x02, 0xA9, 0x7F]);
        let outcome = cpu.step(&mut mem);
        assert_eq!(
            outcome,
            StepOutcome::UnknownOpcode {
                opcode: 0x02,
                pc: 0x0400
            }
        );
        assert_eq!(cpu.registers()[reg::PC].get(), 0x0401);
        assert_eq!(cpu.unknown_opcodes(), 1);

        cpu.step(&mut mem);
        assert_eq!(cpu.registers()[reg::A].get(), 0x7F);
    }

    #[test]
    fn indexed_rmw_reads_and_writes_the_same_address() {
        // LDX #$05; INC $0240,X -> exactly $0245 is bumped.
        let (mut cpu, mut mem) = machine_with(0x0400, &[0xA2, 0x05, 0xFE, 0x40, 0x02]);
        mem.write(0x0245, 0x10);
        cpu.step(&mut mem);
        cpu.step(&mut mem);
        assert_eq!(mem.read(0x0245), 0x11);
        assert_eq!(mem.read(0x0240), 0x00);
    }

    #[test]
    fn zero_page_x_wraps_within_page_zero() {
        // LDX #$10; LDA $F8,X reads $08, not $0108.
        let (mut cpu, mut mem) = machine_with(0x0400, &[0xA2, 0x10, 0xB5, 0xF8]);
        mem.write(0x0008, 0x42);
        mem.write(0x0108, 0x99);
        cpu.step(&mut mem);
        cpu.step(&mut mem);
        assert_eq!(cpu.registers()[reg::A].get(), 0x42);
    }

    #[test]
    fn indirect_indexed_adds_y_after_indirection() {
        // LDY #$04; LDA ($20),Y with ($20) = $1234 reads $1238.
        let (mut cpu, mut mem) = machine_with(0x0400, &[0xA0, 0x04, 0xB1, 0x20]);
        mem.write(0x0020, 0x34);
        mem.write(0x0021, 0x12);
        mem.write(0x1238, 0x5A);
        cpu.step(&mut mem);
        cpu.step(&mut mem);
        assert_eq!(cpu.registers()[reg::A].get(), 0x5A);
    }

    #[test]
    fn indexed_indirect_pointer_wraps_in_page_zero() {
        // LDX #$06; LDA ($FF,X): pointer at $05/$06.
        let (mut cpu, mut mem) = machine_with(0x0400, &[0xA2, 0x06, 0xA1, 0xFF]);
        mem.write(0x0005, 0x00);
        mem.write(0x0006, 0x30);
        mem.write(0x3000, 0x77);
        cpu.step(&mut mem);
        cpu.step(&mut mem);
        assert_eq!(cpu.registers()[reg::A].get(), 0x77);
    }

    #[test]
    fn asl_memory_writes_back_and_sets_carry() {
        // ASL $42 with $42 = $81 -> $02, carry set.
        let (mut cpu, mut mem) = machine_with(0x0400, &[0x06, 0x42]);
        mem.write(0x0042, 0x81);
        cpu.step(&mut mem);
        assert_eq!(mem.read(0x0042), 0x02);
        assert!(cpu.flags().carry());
        assert!(!cpu.flags().zero());
    }

    #[test]
    fn ror_uses_incoming_carry() {
        assert_eq!(Shift::Ror.apply(0x02, true), (0x81, false));
        assert_eq!(Shift::Rol.apply(0x80, false), (0x00, true));
        assert_eq!(Shift::Lsr.apply(0x01, false), (0x00, true));
        assert_eq!(Shift::Asl.apply(0x40, false), (0x80, false));
    }

    #[test]
    fn brk_rti_round_trip_restores_pc_and_flags() {
        // SEC; BRK at $0401; handler at $2000 runs RTI.
        let (mut cpu, mut mem) = machine_with(0x0400, &[0x38, 0x00]);
        mem.write(super::IRQ_VECTOR, 0x00);
        mem.write(super::IRQ_VECTOR + 1, 0x20);
        mem.write(0x2000, 0x40);

        cpu.step(&mut mem);
        cpu.step(&mut mem);
        assert_eq!(cpu.registers()[reg::PC].get(), 0x2000);
        assert!(cpu.flags().irq_disable());

        cpu.step(&mut mem);
        assert_eq!(cpu.registers()[reg::PC].get(), 0x0402);
        assert!(cpu.flags().carry());
        assert!(!cpu.flags().break_flag());
    }

    #[test]
    fn compare_sets_carry_for_greater_or_equal() {
        // LDA #$40; CMP #$30 / CMP #$40 / CMP #$50.
        let (mut cpu, mut mem) =
            machine_with(0x0400, &[0xA9, 0x40, 0xC9, 0x30, 0xC9, 0x40, 0xC9, 0x50]);
        cpu.step(&mut mem);

        cpu.step(&mut mem);
        assert!(cpu.flags().carry());
        assert!(!cpu.flags().zero());

        cpu.step(&mut mem);
        assert!(cpu.flags().carry());
        assert!(cpu.flags().zero());

        cpu.step(&mut mem);
        assert!(!cpu.flags().carry());
        assert!(!cpu.flags().zero());
        assert!(cpu.flags().negative());
    }

    #[test]
    fn bit_copies_high_bits_into_flags() {
        // LDA #$FF; BIT $42 with $42 = $C0.
        let (mut cpu, mut mem) = machine_with(0x0400, &[0xA9, 0xFF, 0x24, 0x42]);
        mem.write(0x0042, 0xC0);
        cpu.step(&mut mem);
        cpu.step(&mut mem);
        assert!(!cpu.flags().zero());
        assert!(cpu.flags().negative());
        assert!(cpu.flags().overflow());
    }

    #[test]
    fn php_sets_break_in_pushed_copy_only() {
        let (mut cpu, mut mem) = machine_with(0x0400, &[0x08]);
        let sp = cpu.registers()[reg::SP].get() as u16;
        cpu.step(&mut mem);
        let pushed = mem.read(STACK_BASE + sp);
        assert_ne!(pushed & 0x10, 0);
        assert!(!cpu.flags().break_flag());
    }

    #[test]
    fn flags_register_bit_five_never_reads_set() {
        let (mut cpu, mut mem) = machine_with(0x0400, &[0x28]);
        cpu.registers_mut()[reg::FLAGS].set(0xFF);
        assert_eq!(cpu.registers()[reg::FLAGS].get() & 0x20, 0);

        // PLP of a pushed $FF must not smuggle the bit back in either.
        cpu.push(&mut mem, 0xFF);
        cpu.step(&mut mem);
        assert_eq!(cpu.registers()[reg::FLAGS].get() & 0x20, 0);
    }

    #[test]
    fn txs_does_not_touch_flags() {
        // LDA #$00 sets zero; LDX #$80; TXS must leave zero set and not
        // update negative from the transfer.
        let (mut cpu, mut mem) = machine_with(0x0400, &[0xA9, 0x00, 0xA2, 0x80, 0x9A]);
        cpu.step(&mut mem);
        cpu.step(&mut mem);
        let flags_before = cpu.registers()[reg::FLAGS].get();
        cpu.step(&mut mem);
        assert_eq!(cpu.registers()[reg::SP].get(), 0x80);
        assert_eq!(cpu.registers()[reg::FLAGS].get(), flags_before);
    }

    #[test]
    fn jmp_indirect_follows_pointer() {
        // JMP ($1000) with pointer $4321.
        let (mut cpu, mut mem) = machine_with(0x0400, &[0x6C, 0x00, 0x10]);
        mem.write(0x1000, 0x21);
        mem.write(0x1001, 0x43);
        cpu.step(&mut mem);
        assert_eq!(cpu.registers()[reg::PC].get(), 0x4321);
    }
}
