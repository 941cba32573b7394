//! Core machine-emulation crate for RetroEmu: a MOS 6502 instruction
//! engine and the layered memory subsystem of an Apple IIe-style machine.
//!
//! The crate emits diagnostics through the [`log`] facade and never
//! installs a logger; hosts pick their own. Presentation concerns
//! (register/memory inspectors, disassembly text) live outside this crate
//! and consume it through [`Machine`], [`RegisterFile`] and
//! [`AddressSpace`] read paths.

/// Masked fixed-width registers and the named register file.
pub mod register;
pub use register::{DisplayMode, Register, RegisterFile, RegisterFileError};

/// Fault taxonomy for access-policy violations and mapping errors.
pub mod fault;
pub use fault::{Fault, FaultKind, MapError};

/// Access-fault counters and last-fault record.
pub mod diag;
pub use diag::Diagnostics;

/// Layered address space with overlay-capable region mapping.
pub mod memory;
pub use memory::{AddressSpace, MemoryRegion, RegionSlice, RegionStorage, REGION_ID_MATCH_LEN};

/// Opcode dispatch table and decoded-instruction type.
pub mod decode;
pub use decode::{
    decode, AddressingMode, DecodedInstruction, Mnemonic, OpcodeEntry, DOCUMENTED_OPCODE_COUNT,
    OPCODE_TABLE,
};

/// Status-register bit layout and named accessors.
pub mod flags;
pub use flags::Flags;

/// The 6502 instruction engine.
pub mod cpu;
pub use cpu::{Mos6502, RunState, StepOutcome, IRQ_VECTOR, RESET_VECTOR, STACK_BASE};

/// Machine composition: RAM, firmware ROM, overlays, run loop.
pub mod machine;
pub use machine::{Machine, MachineConfig, OVERLAY_REGION, RAM_REGION, ROM_REGION};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
