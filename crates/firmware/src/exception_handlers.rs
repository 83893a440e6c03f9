//! Cortex-M exception handlers for the SynthCore firmware.
//!
//! - **HardFault**: bus/usage faults escalated by the Cortex-M4 (invalid
//!   address, undefined instruction, unaligned access with CCR.UNALIGN_TRP),
//!   or a stack that ran into `.bss`.
//! - **DefaultHandler**: an interrupt fired that has no handler. On this
//!   board that means an NVIC line was unmasked by mistake.
//!
//! Both log through defmt/RTT and halt. The `#[cortex_m_rt::exception]`
//! attribute needs ARM target intrinsics, so everything here is gated
//! behind `hardware`.

#![allow(clippy::doc_markdown)]

/// HardFault exception handler.
///
/// Prints the stacked PC and LR so the faulting instruction can be found
/// with `addr2line`, then halts. Returning from HardFault is undefined
/// behavior; the `-> !` return type enforces this.
#[cfg(feature = "hardware")]
#[cortex_m_rt::exception]
#[allow(unsafe_code)]
unsafe fn HardFault(ef: &cortex_m_rt::ExceptionFrame) -> ! {
    defmt::panic!(
        "HardFault: PC=0x{:08X} LR=0x{:08X} xPSR=0x{:08X}",
        ef.pc(),
        ef.lr(),
        ef.xpsr()
    );
}

/// Catch-all for interrupts without a handler.
#[cfg(feature = "hardware")]
#[cortex_m_rt::exception]
#[allow(unsafe_code)]
unsafe fn DefaultHandler(irqn: i16) {
    defmt::panic!("unhandled exception or interrupt: IRQn={=i16}", irqn);
}
