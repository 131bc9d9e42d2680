// =============================================================================
// ferropi - Exception Handling
// =============================================================================
// The EL1 vector table and its Rust handlers. Exactly one entry is
// expected to fire in normal operation: IRQ at EL1 with SP_EL1, which is
// routed to the board's dispatcher. Every other entry reports its kind,
// syndrome and return address over the console and halts; there is no
// caller to propagate an error to, since the "caller" is the exception
// mechanism itself.
// =============================================================================

use crate::cpu;

#[cfg(target_arch = "aarch64")]
core::arch::global_asm!(include_str!("vectors.S"));

/// Point VBAR_EL1 at the vector table.
///
/// # Safety
/// Must be called once, at EL1, before interrupts are unmasked.
pub unsafe fn init() {
    #[cfg(target_arch = "aarch64")]
    {
        extern "C" {
            static vector_table: u8;
        }

        let addr = &vector_table as *const u8 as u64;
        core::arch::asm!("msr vbar_el1, {}", in(reg) addr);
    }
}

/// The sixteen vector-table entries, in table order: four exception types
/// for each of the four origin classes (EL1 with SP_EL0, EL1 with SP_EL1,
/// EL0 AArch64, EL0 AArch32).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum VectorEntry {
    SyncEl1SpEl0 = 0,
    IrqEl1SpEl0 = 1,
    FiqEl1SpEl0 = 2,
    SErrorEl1SpEl0 = 3,
    SyncEl1SpEl1 = 4,
    IrqEl1SpEl1 = 5,
    FiqEl1SpEl1 = 6,
    SErrorEl1SpEl1 = 7,
    SyncEl0Aarch64 = 8,
    IrqEl0Aarch64 = 9,
    FiqEl0Aarch64 = 10,
    SErrorEl0Aarch64 = 11,
    SyncEl0Aarch32 = 12,
    IrqEl0Aarch32 = 13,
    FiqEl0Aarch32 = 14,
    SErrorEl0Aarch32 = 15,
}

impl VectorEntry {
    pub fn from_index(index: u64) -> Option<VectorEntry> {
        use VectorEntry::*;
        Some(match index {
            0 => SyncEl1SpEl0,
            1 => IrqEl1SpEl0,
            2 => FiqEl1SpEl0,
            3 => SErrorEl1SpEl0,
            4 => SyncEl1SpEl1,
            5 => IrqEl1SpEl1,
            6 => FiqEl1SpEl1,
            7 => SErrorEl1SpEl1,
            8 => SyncEl0Aarch64,
            9 => IrqEl0Aarch64,
            10 => FiqEl0Aarch64,
            11 => SErrorEl0Aarch64,
            12 => SyncEl0Aarch32,
            13 => IrqEl0Aarch32,
            14 => FiqEl0Aarch32,
            15 => SErrorEl0Aarch32,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        use VectorEntry::*;
        match self {
            SyncEl1SpEl0 => "SYNC_EL1_SP_EL0",
            IrqEl1SpEl0 => "IRQ_EL1_SP_EL0",
            FiqEl1SpEl0 => "FIQ_EL1_SP_EL0",
            SErrorEl1SpEl0 => "SERROR_EL1_SP_EL0",
            SyncEl1SpEl1 => "SYNC_EL1_SP_EL1",
            IrqEl1SpEl1 => "IRQ_EL1_SP_EL1",
            FiqEl1SpEl1 => "FIQ_EL1_SP_EL1",
            SErrorEl1SpEl1 => "SERROR_EL1_SP_EL1",
            SyncEl0Aarch64 => "SYNC_EL0_AARCH64",
            IrqEl0Aarch64 => "IRQ_EL0_AARCH64",
            FiqEl0Aarch64 => "FIQ_EL0_AARCH64",
            SErrorEl0Aarch64 => "SERROR_EL0_AARCH64",
            SyncEl0Aarch32 => "SYNC_EL0_AARCH32",
            IrqEl0Aarch32 => "IRQ_EL0_AARCH32",
            FiqEl0Aarch32 => "FIQ_EL0_AARCH32",
            SErrorEl0Aarch32 => "SERROR_EL0_AARCH32",
        }
    }
}

/// The live IRQ path. Context is already saved by the vector stub;
/// interrupts stay masked until the stub's eret.
#[no_mangle]
extern "C" fn irq_vector_entry() {
    crate::board::dispatch_irq();
}

/// Any vector other than the EL1h IRQ entry landing here is fatal:
/// report entry kind, exception syndrome and return address, then halt.
///
/// The fault may have landed while the foreground held the console lock,
/// so the report goes through the lock-free path.
#[no_mangle]
extern "C" fn invalid_vector_entry(index: u64, esr: u64, elr: u64) -> ! {
    match VectorEntry::from_index(index) {
        Some(entry) => crate::irq_println!(
            "FATAL: unexpected exception {} ({}), ESR {:#018x}, ELR {:#018x}",
            entry.name(),
            index,
            esr,
            elr
        ),
        None => crate::irq_println!("FATAL: exception with bogus vector index {}", index),
    }
    cpu::halt();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_vector_index_maps_to_a_distinct_entry() {
        let mut names = Vec::new();
        for index in 0..16 {
            let entry = VectorEntry::from_index(index).expect("index in range");
            assert_eq!(entry as u64, index);
            names.push(entry.name());
        }
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 16);
    }

    #[test]
    fn out_of_range_indices_are_rejected() {
        assert_eq!(VectorEntry::from_index(16), None);
        assert_eq!(VectorEntry::from_index(u64::MAX), None);
    }

    #[test]
    fn the_live_irq_entry_is_el1h() {
        assert_eq!(VectorEntry::from_index(5), Some(VectorEntry::IrqEl1SpEl1));
    }
}
