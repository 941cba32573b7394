//! Property coverage for the register model and the engine stack
//! discipline.

use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;

use log as _;
use proptest::prelude::{any, proptest};

use retroemu_core::cpu::reg;
use retroemu_core::{AddressSpace, DisplayMode, Mos6502, Register, RESET_VECTOR};

proptest! {
    #[test]
    fn set_always_satisfies_the_mask_invariant(
        width in 1_u8..=32,
        mask_on in any::<u32>(),
        mask_off in any::<u32>(),
        value in any::<u32>(),
    ) {
        let mut register = Register::new(width, 0, DisplayMode::Hex)
            .with_masks(mask_on, mask_off);
        register.set(value);

        let expected = ((value & register.width_mask()) | mask_on) & !mask_off;
        assert_eq!(register.get(), expected);
    }

    #[test]
    fn increment_then_decrement_is_identity(
        width in 1_u8..=16,
        value in any::<u32>(),
    ) {
        let mut register = Register::new(width, 0, DisplayMode::Hex);
        register.set(value);
        let before = register.get();
        register.increment();
        register.decrement();
        assert_eq!(register.get(), before);
    }

    #[test]
    fn post_variants_report_the_prior_value(value in any::<u32>()) {
        let mut register = Register::new(32, 0, DisplayMode::Hex);
        register.set(value);
        assert_eq!(register.increment_post(), value);
        assert_eq!(register.decrement_post(), value.wrapping_add(1));
        assert_eq!(register.get(), value);
    }

    #[test]
    fn pushed_bytes_pop_in_reverse_order(values in proptest::collection::vec(any::<u8>(), 1..32)) {
        let mut mem = AddressSpace::new();
        mem.map_zeroed("ram", 0x0000, 0x1_0000, true).expect("map");
        mem.write(RESET_VECTOR, 0x00);
        mem.write(RESET_VECTOR.wrapping_add(1), 0x04);

        let mut cpu = Mos6502::new();
        cpu.step(&mut mem);
        let sp_before = cpu.registers()[reg::SP].get();

        // PHA per value, then PLA per value: LIFO restores in reverse.
        for value in &values {
            cpu.registers_mut()[reg::A].set(u32::from(*value));
            let pc = cpu.registers()[reg::PC].get() as u16;
            mem.write(pc, 0x48);
            cpu.step(&mut mem);
        }
        for value in values.iter().rev() {
            let pc = cpu.registers()[reg::PC].get() as u16;
            mem.write(pc, 0x68);
            cpu.step(&mut mem);
            assert_eq!(cpu.registers()[reg::A].get(), u32::from(*value));
        }
        assert_eq!(cpu.registers()[reg::SP].get(), sp_before);
    }
}
