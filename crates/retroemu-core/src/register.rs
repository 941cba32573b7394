//! Hardware register model: masked fixed-width values and the named
//! register file the CPU core operates on.

use thiserror::Error;

/// Radix used when rendering a register value for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum DisplayMode {
    /// Plain decimal.
    Dec,
    /// Zero-padded hexadecimal (default).
    #[default]
    Hex,
    /// Zero-padded octal.
    Oct,
    /// Zero-padded binary.
    Bin,
}

/// A fixed-width hardware register with a reset value and hard-wired bits.
///
/// `mask_on` bits read as one and `mask_off` bits read as zero no matter
/// what is stored; every mutation funnels through [`Register::set`], so no
/// code path can observe a value violating
/// `value == ((value & width_mask) | mask_on) & !mask_off`.
#[derive(Debug, Clone)]
pub struct Register {
    width: u8,
    value: u32,
    reset_value: u32,
    mask_on: u32,
    mask_off: u32,
    display: DisplayMode,
    bit_labels: Option<&'static [&'static str]>,
    help: &'static str,
}

impl Register {
    /// Creates a register of `width` bits holding `reset_value`.
    #[must_use]
    pub const fn new(width: u8, reset_value: u32, display: DisplayMode) -> Self {
        let mut reg = Self {
            width,
            value: 0,
            reset_value,
            mask_on: 0,
            mask_off: 0,
            display,
            bit_labels: None,
            help: "",
        };
        reg.value = reg.masked(reset_value);
        reg
    }

    /// Sets the hard-wired bit masks. `mask_off` wins over `mask_on`.
    #[must_use]
    pub const fn with_masks(mut self, mask_on: u32, mask_off: u32) -> Self {
        self.mask_on = mask_on;
        self.mask_off = mask_off;
        self.value = self.masked(self.value);
        self
    }

    /// Attaches per-bit labels, most-significant bit first. A `"-"` label
    /// marks a bit with no architectural meaning.
    #[must_use]
    pub const fn with_bit_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.bit_labels = Some(labels);
        self
    }

    /// Attaches a one-line description for inspector displays.
    #[must_use]
    pub const fn with_help(mut self, help: &'static str) -> Self {
        self.help = help;
        self
    }

    /// All-ones mask covering the register width.
    #[must_use]
    pub const fn width_mask(&self) -> u32 {
        if self.width >= 32 {
            u32::MAX
        } else {
            (1_u32 << self.width) - 1
        }
    }

    const fn masked(&self, value: u32) -> u32 {
        ((value & self.width_mask()) | self.mask_on) & !self.mask_off
    }

    /// Stores `value`, truncated to the register width and filtered through
    /// the hard-wired masks. Out-of-range input is masked, never rejected.
    pub const fn set(&mut self, value: u32) {
        self.value = self.masked(value);
    }

    /// Returns the current value.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.value
    }

    /// Restores the reset value.
    pub const fn reset(&mut self) {
        self.set(self.reset_value);
    }

    /// Adds one and returns the new value.
    pub const fn increment(&mut self) -> u32 {
        self.set(self.value.wrapping_add(1));
        self.value
    }

    /// Subtracts one and returns the new value.
    pub const fn decrement(&mut self) -> u32 {
        self.set(self.value.wrapping_sub(1));
        self.value
    }

    /// Adds one and returns the value prior to the increment.
    pub const fn increment_post(&mut self) -> u32 {
        let old = self.value;
        self.set(old.wrapping_add(1));
        old
    }

    /// Subtracts one and returns the value prior to the decrement.
    pub const fn decrement_post(&mut self) -> u32 {
        let old = self.value;
        self.set(old.wrapping_sub(1));
        old
    }

    /// Register width in bits.
    #[must_use]
    pub const fn width(&self) -> u8 {
        self.width
    }

    /// Display radix for this register.
    #[must_use]
    pub const fn display(&self) -> DisplayMode {
        self.display
    }

    /// Per-bit labels, when attached.
    #[must_use]
    pub const fn bit_labels(&self) -> Option<&'static [&'static str]> {
        self.bit_labels
    }

    /// One-line description, empty when none was attached.
    #[must_use]
    pub const fn help(&self) -> &'static str {
        self.help
    }

    /// Renders the current value in the register's display mode, zero-padded
    /// to the register width.
    #[must_use]
    pub fn format_value(&self) -> String {
        let width = usize::from(self.width);
        match self.display {
            DisplayMode::Dec => format!("{}", self.value),
            DisplayMode::Hex => format!("0x{:0w$x}", self.value, w = width.div_ceil(4)),
            DisplayMode::Oct => format!("0o{:0w$o}", self.value, w = width.div_ceil(3)),
            DisplayMode::Bin => format!("0b{:0w$b}", self.value, w = width),
        }
    }

    /// Renders the value bit-by-bit using the attached labels: set bits show
    /// their label uppercased, clear bits lowercased, `"-"` bits as `-`.
    /// Returns `None` when the register has no labels.
    #[must_use]
    pub fn format_bits(&self) -> Option<String> {
        let labels = self.bit_labels?;
        let mut out = String::with_capacity(labels.len());
        for (i, label) in labels.iter().enumerate() {
            let bit = labels.len() - 1 - i;
            let is_set = self.value & (1 << bit) != 0;
            if *label == "-" {
                out.push('-');
            } else if is_set {
                out.extend(label.chars().flat_map(char::to_uppercase));
            } else {
                out.extend(label.chars().flat_map(char::to_lowercase));
            }
        }
        Some(out)
    }
}

/// Errors reported by [`RegisterFile`] operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegisterFileError {
    /// A register with this name is already present.
    #[error("register `{name}` is already defined")]
    DuplicateRegister {
        /// The rejected name.
        name: String,
    },
    /// No register with this name exists.
    #[error("no register named `{name}`")]
    RegisterNotFound {
        /// The requested name.
        name: String,
    },
}

/// A named collection of [`Register`]s in insertion order.
///
/// The CPU core that creates the file owns it exclusively; display-side
/// consumers walk it through [`RegisterFile::iter`].
#[derive(Debug, Clone, Default)]
pub struct RegisterFile {
    registers: Vec<(String, Register)>,
}

impl RegisterFile {
    /// Creates an empty register file.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            registers: Vec::new(),
        }
    }

    /// Adds a register under `name`.
    ///
    /// # Errors
    ///
    /// Rejects a duplicate name with
    /// [`RegisterFileError::DuplicateRegister`]; the existing register is
    /// left untouched.
    pub fn add(&mut self, name: &str, register: Register) -> Result<(), RegisterFileError> {
        if self.registers.iter().any(|(n, _)| n == name) {
            return Err(RegisterFileError::DuplicateRegister {
                name: name.to_owned(),
            });
        }
        self.registers.push((name.to_owned(), register));
        Ok(())
    }

    /// Looks up a register by name.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterFileError::RegisterNotFound`] when absent.
    pub fn get(&self, name: &str) -> Result<&Register, RegisterFileError> {
        self.registers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, r)| r)
            .ok_or_else(|| RegisterFileError::RegisterNotFound {
                name: name.to_owned(),
            })
    }

    /// Looks up a register by name for mutation.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterFileError::RegisterNotFound`] when absent.
    pub fn get_mut(&mut self, name: &str) -> Result<&mut Register, RegisterFileError> {
        self.registers
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, r)| r)
            .ok_or_else(|| RegisterFileError::RegisterNotFound {
                name: name.to_owned(),
            })
    }

    /// Resets every register, in insertion order.
    pub fn reset_all(&mut self) {
        for (_, register) in &mut self.registers {
            register.reset();
        }
    }

    /// Lazily walks `(name, register)` pairs in insertion order. Restartable:
    /// each call yields a fresh pass.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Register)> {
        self.registers.iter().map(|(n, r)| (n.as_str(), r))
    }

    /// Number of registers in the file.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registers.len()
    }

    /// Returns `true` when the file holds no registers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }
}

impl std::ops::Index<&str> for RegisterFile {
    type Output = Register;

    /// # Panics
    ///
    /// Panics when `name` is absent, like the std map indexers. Intended for
    /// access to registers the caller installed itself; use
    /// [`RegisterFile::get`] for fallible lookup.
    fn index(&self, name: &str) -> &Register {
        match self.get(name) {
            Ok(register) => register,
            Err(err) => panic!("{err}"),
        }
    }
}

impl std::ops::IndexMut<&str> for RegisterFile {
    /// # Panics
    ///
    /// Panics when `name` is absent, like the std map indexers.
    fn index_mut(&mut self, name: &str) -> &mut Register {
        match self.get_mut(name) {
            Ok(register) => register,
            Err(err) => panic!("{err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DisplayMode, Register, RegisterFile, RegisterFileError};

    #[test]
    fn set_masks_to_width() {
        let mut reg = Register::new(8, 0, DisplayMode::Hex);
        reg.set(0x1FF);
        assert_eq!(reg.get(), 0xFF);
    }

    #[test]
    fn masks_apply_on_every_store() {
        let mut reg = Register::new(8, 0, DisplayMode::Hex).with_masks(0x04, 0x20);
        reg.set(0xFF);
        assert_eq!(reg.get(), 0xFF & !0x20);
        reg.set(0x00);
        assert_eq!(reg.get(), 0x04);
    }

    #[test]
    fn mask_off_wins_over_mask_on() {
        let mut reg = Register::new(8, 0, DisplayMode::Hex).with_masks(0x30, 0x20);
        reg.set(0x00);
        assert_eq!(reg.get(), 0x10);
    }

    #[test]
    fn reset_value_is_masked_too() {
        let reg = Register::new(4, 0xFF, DisplayMode::Hex);
        assert_eq!(reg.get(), 0x0F);
    }

    #[test]
    fn full_width_register_holds_all_bits() {
        let mut reg = Register::new(32, 0, DisplayMode::Hex);
        reg.set(u32::MAX);
        assert_eq!(reg.get(), u32::MAX);
    }

    #[test]
    fn increment_wraps_through_width() {
        let mut reg = Register::new(8, 0xFF, DisplayMode::Hex);
        assert_eq!(reg.increment(), 0x00);
        assert_eq!(reg.decrement(), 0xFF);
    }

    #[test]
    fn post_variants_return_old_value() {
        let mut reg = Register::new(8, 0x10, DisplayMode::Hex);
        assert_eq!(reg.increment_post(), 0x10);
        assert_eq!(reg.get(), 0x11);
        assert_eq!(reg.decrement_post(), 0x11);
        assert_eq!(reg.get(), 0x10);
    }

    #[test]
    fn format_value_pads_to_width() {
        let mut reg = Register::new(16, 0, DisplayMode::Hex);
        reg.set(0xAB);
        assert_eq!(reg.format_value(), "0x00ab");

        let mut bin = Register::new(8, 0, DisplayMode::Bin);
        bin.set(0b101);
        assert_eq!(bin.format_value(), "0b00000101");

        let mut dec = Register::new(8, 0, DisplayMode::Dec);
        dec.set(42);
        assert_eq!(dec.format_value(), "42");
    }

    #[test]
    fn format_bits_uses_case_for_state() {
        let mut reg = Register::new(8, 0, DisplayMode::Bin)
            .with_bit_labels(&["n", "v", "-", "b", "d", "i", "z", "c"]);
        reg.set(0x81);
        assert_eq!(reg.format_bits().as_deref(), Some("Nv-bdizC"));
    }

    #[test]
    fn file_rejects_duplicate_names() {
        let mut file = RegisterFile::new();
        file.add("A", Register::new(8, 0, DisplayMode::Hex))
            .expect("first add");
        let err = file
            .add("A", Register::new(8, 0, DisplayMode::Hex))
            .expect_err("duplicate must be rejected");
        assert_eq!(
            err,
            RegisterFileError::DuplicateRegister {
                name: "A".to_owned()
            }
        );
    }

    #[test]
    fn file_preserves_insertion_order() {
        let mut file = RegisterFile::new();
        for name in ["PC", "SP", "A", "X", "Y", "FLAGS"] {
            file.add(name, Register::new(8, 0, DisplayMode::Hex))
                .expect("unique names");
        }
        let names: Vec<&str> = file.iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["PC", "SP", "A", "X", "Y", "FLAGS"]);
    }

    #[test]
    fn iter_is_restartable() {
        let mut file = RegisterFile::new();
        file.add("A", Register::new(8, 0, DisplayMode::Hex))
            .expect("add");
        assert_eq!(file.iter().count(), 1);
        assert_eq!(file.iter().count(), 1);
    }

    #[test]
    fn reset_all_restores_every_register() {
        let mut file = RegisterFile::new();
        file.add("A", Register::new(8, 0x12, DisplayMode::Hex))
            .expect("add");
        file.add("X", Register::new(8, 0x34, DisplayMode::Hex))
            .expect("add");
        file["A"].set(0xFF);
        file["X"].set(0xFF);
        file.reset_all();
        assert_eq!(file["A"].get(), 0x12);
        assert_eq!(file["X"].get(), 0x34);
    }

    #[test]
    fn get_reports_missing_name() {
        let file = RegisterFile::new();
        assert_eq!(
            file.get("PC").expect_err("must be missing"),
            RegisterFileError::RegisterNotFound {
                name: "PC".to_owned()
            }
        );
    }
}
