//! An Apple IIe-style machine: RAM below a firmware ROM, an instruction
//! engine, and hot-loadable program overlays.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::cpu::{Mos6502, StepOutcome};
use crate::fault::{Fault, MapError};
use crate::memory::AddressSpace;
use crate::register::RegisterFile;

/// Region id of the base RAM mapping.
pub const RAM_REGION: &str = "ram";
/// Region id of the firmware ROM mapping.
pub const ROM_REGION: &str = "monitor";
/// Region id used for loaded program overlays.
pub const OVERLAY_REGION: &str = "overlay";

/// Machine construction parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct MachineConfig {
    /// Firmware image mapped read-only at [`MachineConfig::rom_base`].
    pub firmware: PathBuf,
    /// First ROM address; RAM covers everything below it.
    pub rom_base: u16,
    /// Target clock rate for [`Machine::run`], in kHz.
    pub clock_khz: u32,
}

impl MachineConfig {
    /// Configuration for `firmware` with the stock ROM base (`0xF800`) and
    /// clock rate (1023 kHz).
    pub fn new(firmware: impl Into<PathBuf>) -> Self {
        Self {
            firmware: firmware.into(),
            rom_base: 0xF800,
            clock_khz: 1023,
        }
    }
}

/// A composed machine: address space layout plus instruction engine.
#[derive(Debug)]
pub struct Machine {
    cpu: Mos6502,
    mem: AddressSpace,
    clock_khz: u32,
}

impl Machine {
    /// Builds the machine: writable RAM from `0x0000` up to the ROM base,
    /// then the firmware image mapped read-only above it. The firmware is a
    /// raw flat binary; its length fixes the ROM region size.
    ///
    /// # Errors
    ///
    /// Propagates [`MapError`] when the firmware cannot be read or a region
    /// is degenerate; no machine is constructed.
    pub fn new(config: &MachineConfig) -> Result<Self, MapError> {
        let mut mem = AddressSpace::new();
        mem.map_zeroed(RAM_REGION, 0x0000, u32::from(config.rom_base), true)?;
        mem.map_file(ROM_REGION, config.rom_base, 0, &config.firmware, false)?;
        Ok(Self {
            cpu: Mos6502::new(),
            mem,
            clock_khz: config.clock_khz,
        })
    }

    /// Executes one engine step.
    pub fn step(&mut self) -> StepOutcome {
        self.cpu.step(&mut self.mem)
    }

    /// Resets the engine; the next step reloads the reset vector.
    pub fn reset(&mut self) {
        self.cpu.reset();
    }

    /// Logs the engine state and every register in its display mode.
    pub fn print(&self) {
        log::info!("cpu: {:?}", self.cpu.run_state());
        for (name, register) in self.cpu.registers().iter() {
            match register.format_bits() {
                Some(bits) => log::info!("{name:>8}: {} {}", register.format_value(), bits),
                None => log::info!("{name:>8}: {}", register.format_value()),
            }
        }
    }

    /// Maps a writable file-backed overlay of `size` bytes at `base`,
    /// shadowing whatever was mapped there. Unloading reveals the prior
    /// contents unchanged.
    ///
    /// # Errors
    ///
    /// Propagates [`MapError`] when the file cannot be opened or sized; the
    /// overlay is not mapped.
    pub fn load_overlay(&mut self, path: &Path, base: u16, size: u32) -> Result<(), MapError> {
        self.mem.map_file(OVERLAY_REGION, base, size, path, true)
    }

    /// Unmaps the overlay, flushing its file.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::UnknownRegionId`] when no overlay is loaded.
    pub fn unload_overlay(&mut self) -> Result<(), Fault> {
        self.mem.unmap(OVERLAY_REGION)
    }

    /// Steps continuously until `halt` is raised, sleeping between batches
    /// to approximate the configured clock rate. One step is one
    /// instruction regardless of real hardware cycle counts, so this is a
    /// pacing aid, not cycle timing. The flag is checked once per batch and
    /// never pre-empts a step in progress.
    pub fn run(&mut self, halt: &AtomicBool) {
        // clock_khz instructions per millisecond of sleep.
        let batch = self.clock_khz.max(1);
        while !halt.load(Ordering::Relaxed) {
            for _ in 0..batch {
                self.step();
            }
            thread::sleep(Duration::from_millis(1));
        }
    }

    /// Engine registers, for display.
    #[must_use]
    pub const fn registers(&self) -> &RegisterFile {
        self.cpu.registers()
    }

    /// Mutable register access; do not use while [`Machine::run`] is live.
    pub const fn registers_mut(&mut self) -> &mut RegisterFile {
        self.cpu.registers_mut()
    }

    /// The machine's address space.
    #[must_use]
    pub const fn memory(&self) -> &AddressSpace {
        &self.mem
    }

    /// Mutable address-space access; do not use while [`Machine::run`] is
    /// live.
    pub const fn memory_mut(&mut self) -> &mut AddressSpace {
        &mut self.mem
    }

    /// The instruction engine.
    #[must_use]
    pub const fn cpu(&self) -> &Mos6502 {
        &self.cpu
    }
}
