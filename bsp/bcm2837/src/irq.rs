// =============================================================================
// ferropi - IRQ Dispatch
// =============================================================================
// Routes pending interrupt sources to their service routines. Entered only
// from the vector table's IRQ entry; interrupts stay masked for the whole
// dispatch, so nothing here nests or races with itself.
// =============================================================================

use crate::intc::{InterruptController, IrqSources};
use crate::mmio::Bus;
use crate::system_timer::{Channel, SystemTimer};

/// Byte-stream console as seen from interrupt context.
pub trait Console {
    /// True while the receive side holds at least one unread byte.
    fn receive_ready(&self) -> bool;
    /// Read one byte, blocking on the hardware ready bit.
    fn receive_byte(&self) -> u8;
    /// Write one byte, blocking until the transmitter accepts it.
    fn send_byte(&self, byte: u8);
}

/// Board liveness LED.
pub trait StatusLed {
    fn toggle(&self);
}

/// Service routine for one interrupt source. Implementations must retire
/// the source's pending condition before returning, or the dispatch loop
/// will keep re-entering them.
pub trait IrqHandler: Sync {
    fn service(&self);
}

// =============================================================================
// Service Routines
// =============================================================================

/// Console service routine: drain every buffered byte, echoing each one,
/// until the receive-ready condition clears.
///
/// There is no software queue. Back-pressure lives entirely in the
/// hardware FIFO, and anything that arrives after this returns is picked
/// up by the dispatch loop's re-read or by the next interrupt.
pub struct ConsoleEcho<'a, C: Console> {
    console: &'a C,
}

impl<'a, C: Console> ConsoleEcho<'a, C> {
    pub const fn new(console: &'a C) -> Self {
        Self { console }
    }
}

impl<C: Console + Sync> IrqHandler for ConsoleEcho<'_, C> {
    fn service(&self) {
        while self.console.receive_ready() {
            let byte = self.console.receive_byte();
            self.console.send_byte(byte);
        }
    }
}

/// Timer service routine for the LED-bound channel: re-arm for the next
/// period from a freshly read counter, toggle the LED, then acknowledge.
///
/// Re-arming first, from a fresh counter value, guarantees the next match
/// point is in the future when it is written. Exactly one toggle happens
/// per acknowledged firing, so the LED period is twice the timer period.
pub struct LedBlink<'a, B: Bus, L: StatusLed> {
    timer: &'a SystemTimer<B>,
    channel: Channel,
    period_ticks: u32,
    led: &'a L,
}

impl<'a, B: Bus, L: StatusLed> LedBlink<'a, B, L> {
    pub const fn new(
        timer: &'a SystemTimer<B>,
        channel: Channel,
        period_ticks: u32,
        led: &'a L,
    ) -> Self {
        Self {
            timer,
            channel,
            period_ticks,
            led,
        }
    }
}

impl<B: Bus + Sync, L: StatusLed + Sync> IrqHandler for LedBlink<'_, B, L> {
    fn service(&self) {
        self.timer.arm(self.channel, self.period_ticks);
        self.led.toggle();
        self.timer.acknowledge(self.channel);
    }
}

/// Timer channel that is enabled but owns no action yet. It still has to
/// be acknowledged: a pending bit nobody clears would hold the dispatch
/// loop open forever.
pub struct IdleTimer<'a, B: Bus> {
    timer: &'a SystemTimer<B>,
    channel: Channel,
}

impl<'a, B: Bus> IdleTimer<'a, B> {
    pub const fn new(timer: &'a SystemTimer<B>, channel: Channel) -> Self {
        Self { timer, channel }
    }
}

impl<B: Bus + Sync> IrqHandler for IdleTimer<'_, B> {
    fn service(&self) {
        self.timer.acknowledge(self.channel);
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Walks the pending-source snapshot and invokes the owning service
/// routines.
///
/// The table fixes the priority: entries earlier in the slice are serviced
/// first within one snapshot, deterministically, regardless of bit order.
pub struct IrqDispatcher<'a, B: Bus> {
    intc: &'a InterruptController<B>,
    table: &'a [(IrqSources, &'a dyn IrqHandler)],
}

impl<'a, B: Bus> IrqDispatcher<'a, B> {
    pub const fn new(
        intc: &'a InterruptController<B>,
        table: &'a [(IrqSources, &'a dyn IrqHandler)],
    ) -> Self {
        Self { intc, table }
    }

    /// Service every pending source and return once none remain.
    ///
    /// Takes a snapshot of the pending register, clears each recognized
    /// bit locally as its routine runs, then re-reads the hardware:
    /// sources that became pending while others were serviced are picked
    /// up before returning, and a stale snapshot is never trusted twice.
    ///
    /// A pending bit with no table entry is a configuration defect. The
    /// policy here is to mask the offending sources at the controller and
    /// report them: there is no generic way to acknowledge an unknown
    /// peripheral, and leaving the bit enabled would spin this loop
    /// forever.
    pub fn dispatch(&self) {
        let mut pending = self.intc.pending();
        while !pending.is_empty() {
            for (source, handler) in self.table {
                if pending.contains(*source) {
                    pending.remove(*source);
                    handler.service();
                }
            }

            if !pending.is_empty() {
                // Interrupt context: the foreground may be suspended
                // holding the console lock, so the report must not wait
                // on it.
                crate::irq_println!(
                    "irq: masking sources with no service routine: {:#010x}",
                    pending.bits()
                );
                self.intc.disable(pending);
            }

            pending = self.intc.pending();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::rc::Rc;

    // -------------------------------------------------------------------------
    // Fakes
    // -------------------------------------------------------------------------

    /// Simulated timer + interrupt-controller hardware shared by the bus
    /// views below.
    struct Hw {
        counter: u64,
        compare1: u32,
        /// Write-one-to-clear match flags (CS).
        cs: u32,
        /// Enable mask of the controller's bank 1.
        enabled: u32,
        /// Extra pending bits injected by a test (sources with no driver).
        rogue_pending: u32,
    }

    impl Hw {
        fn new() -> Rc<RefCell<Hw>> {
            Rc::new(RefCell::new(Hw {
                counter: 0,
                compare1: 0,
                cs: 0,
                enabled: 0,
                rogue_pending: 0,
            }))
        }

        fn pending_1(&self) -> u32 {
            (self.cs | self.rogue_pending) & self.enabled
        }

        /// Advance the counter until channel 1 matches or `limit` ticks
        /// elapse. Returns the tick count at the match.
        fn run_until_match(&mut self, limit: u64) -> u64 {
            for _ in 0..limit {
                self.counter += 1;
                if self.counter as u32 == self.compare1 {
                    self.cs |= 1 << 1;
                    return self.counter;
                }
            }
            panic!("channel 1 never matched within {} ticks", limit);
        }
    }

    /// System-timer window onto the shared hardware.
    #[derive(Clone)]
    struct TimerBus(Rc<RefCell<Hw>>);

    impl Bus for TimerBus {
        fn read_reg(&self, offset: usize) -> u32 {
            let hw = self.0.borrow();
            match offset {
                0x00 => hw.cs,
                0x04 => hw.counter as u32,
                0x08 => (hw.counter >> 32) as u32,
                _ => 0,
            }
        }

        fn write_reg(&self, offset: usize, value: u32) {
            let mut hw = self.0.borrow_mut();
            match offset {
                // CS is write-one-to-clear.
                0x00 => hw.cs &= !value,
                // Compare 1.
                0x10 => hw.compare1 = value,
                _ => {}
            }
        }
    }

    /// Interrupt-controller window onto the shared hardware.
    #[derive(Clone)]
    struct IntcBus(Rc<RefCell<Hw>>);

    impl Bus for IntcBus {
        fn read_reg(&self, offset: usize) -> u32 {
            match offset {
                0x04 => self.0.borrow().pending_1(),
                _ => 0,
            }
        }

        fn write_reg(&self, offset: usize, value: u32) {
            let mut hw = self.0.borrow_mut();
            match offset {
                0x10 => hw.enabled |= value,
                0x1C => hw.enabled &= !value,
                _ => {}
            }
        }
    }

    /// Controller whose pending reads come from a scripted sequence.
    struct ScriptedIntc {
        script: RefCell<VecDeque<u32>>,
    }

    impl ScriptedIntc {
        fn new(reads: &[u32]) -> Self {
            Self {
                script: RefCell::new(reads.iter().copied().collect()),
            }
        }
    }

    impl Bus for ScriptedIntc {
        fn read_reg(&self, offset: usize) -> u32 {
            assert_eq!(offset, 0x04, "only pending-1 reads expected");
            self.script
                .borrow_mut()
                .pop_front()
                .expect("dispatch re-read the pending register after the script ended")
        }

        fn write_reg(&self, _offset: usize, _value: u32) {}
    }

    /// Handler that appends its name to a shared log.
    struct Recorder {
        name: &'static str,
        log: Rc<RefCell<Vec<&'static str>>>,
    }

    impl IrqHandler for Recorder {
        fn service(&self) {
            self.log.borrow_mut().push(self.name);
        }
    }

    // Rc is not Sync, but these tests are single-threaded; the bound on
    // IrqHandler exists for the static dispatch table on the real board.
    unsafe impl Sync for Recorder {}

    struct FakeConsole {
        rx: RefCell<VecDeque<u8>>,
        tx: RefCell<Vec<u8>>,
    }

    impl FakeConsole {
        fn with_input(bytes: &[u8]) -> Self {
            Self {
                rx: RefCell::new(bytes.iter().copied().collect()),
                tx: RefCell::new(Vec::new()),
            }
        }
    }

    impl Console for FakeConsole {
        fn receive_ready(&self) -> bool {
            !self.rx.borrow().is_empty()
        }

        fn receive_byte(&self) -> u8 {
            self.rx.borrow_mut().pop_front().expect("rx underrun")
        }

        fn send_byte(&self, byte: u8) {
            self.tx.borrow_mut().push(byte);
        }
    }

    unsafe impl Sync for FakeConsole {}

    struct FakeLed {
        on: Cell<bool>,
        toggles: Cell<u32>,
    }

    impl FakeLed {
        fn new() -> Self {
            Self {
                on: Cell::new(false),
                toggles: Cell::new(0),
            }
        }
    }

    impl StatusLed for FakeLed {
        fn toggle(&self) {
            self.on.set(!self.on.get());
            self.toggles.set(self.toggles.get() + 1);
        }
    }

    unsafe impl Sync for FakeLed {}

    unsafe impl Sync for TimerBus {}
    unsafe impl Sync for IntcBus {}

    const AUX: IrqSources = IrqSources::AUX;
    const T1: IrqSources = IrqSources::SYSTEM_TIMER_1;

    // -------------------------------------------------------------------------
    // Dispatch loop behavior
    // -------------------------------------------------------------------------

    #[test]
    fn dispatch_services_a_late_arrival_and_terminates() {
        // Snapshot sequence: AUX pending, then timer 1 appears while AUX
        // was being serviced, then quiet. Each source is serviced exactly
        // once and dispatch returns on the empty re-read.
        let intc = InterruptController::new(ScriptedIntc::new(&[
            AUX.bits(),
            T1.bits(),
            0,
        ]));

        let log = Rc::new(RefCell::new(Vec::new()));
        let aux = Recorder {
            name: "aux",
            log: Rc::clone(&log),
        };
        let t1 = Recorder {
            name: "timer1",
            log: Rc::clone(&log),
        };
        let table: [(IrqSources, &dyn IrqHandler); 2] = [(AUX, &aux), (T1, &t1)];

        IrqDispatcher::new(&intc, &table).dispatch();

        assert_eq!(*log.borrow(), vec!["aux", "timer1"]);
    }

    #[test]
    fn dispatch_returns_immediately_when_nothing_is_pending() {
        let intc = InterruptController::new(ScriptedIntc::new(&[0]));
        let table: [(IrqSources, &dyn IrqHandler); 0] = [];

        IrqDispatcher::new(&intc, &table).dispatch();
    }

    #[test]
    fn sources_in_one_snapshot_are_serviced_in_table_order() {
        // Both bits pending at once: the console entry precedes the timer
        // entry in the table, so it must run first even though its bit
        // position (29) is higher.
        let intc = InterruptController::new(ScriptedIntc::new(&[(AUX | T1).bits(), 0]));

        let log = Rc::new(RefCell::new(Vec::new()));
        let aux = Recorder {
            name: "aux",
            log: Rc::clone(&log),
        };
        let t1 = Recorder {
            name: "timer1",
            log: Rc::clone(&log),
        };
        let table: [(IrqSources, &dyn IrqHandler); 2] = [(AUX, &aux), (T1, &t1)];

        IrqDispatcher::new(&intc, &table).dispatch();

        assert_eq!(*log.borrow(), vec!["aux", "timer1"]);
    }

    #[test]
    fn unmapped_pending_source_is_masked_so_dispatch_terminates() {
        // Bit 7 is enabled and pending but owns no table entry. The
        // dispatcher must disable it at the controller and return instead
        // of spinning.
        let hw = Hw::new();
        hw.borrow_mut().enabled = 1 << 7;
        hw.borrow_mut().rogue_pending = 1 << 7;

        let intc = InterruptController::new(IntcBus(Rc::clone(&hw)));
        let table: [(IrqSources, &dyn IrqHandler); 0] = [];

        IrqDispatcher::new(&intc, &table).dispatch();

        assert_eq!(hw.borrow().enabled, 0);
    }

    #[test]
    fn unmapped_source_report_does_not_wait_on_the_console_lock() {
        // The dispatcher's diagnostic runs in interrupt context while the
        // foreground may be suspended mid-print holding the console lock.
        // Hold that lock here: dispatch must still mask the source and
        // return. A report routed through the locking printer would spin
        // forever on this guard.
        let _console = crate::mini_uart::console_lock();

        let hw = Hw::new();
        hw.borrow_mut().enabled = 1 << 7;
        hw.borrow_mut().rogue_pending = 1 << 7;

        let intc = InterruptController::new(IntcBus(Rc::clone(&hw)));
        let table: [(IrqSources, &dyn IrqHandler); 0] = [];

        IrqDispatcher::new(&intc, &table).dispatch();

        assert_eq!(hw.borrow().enabled, 0);
    }

    #[test]
    fn echo_drains_all_buffered_bytes_in_one_dispatch() {
        // 'A','B','C' arrive before the interrupt entry; all three must be
        // echoed in order within a single dispatch call.
        let console = FakeConsole::with_input(b"ABC");
        let echo = ConsoleEcho::new(&console);

        // AUX stays pending while the FIFO is non-empty; dispatch's
        // re-read sees it clear after the drain.
        let intc = InterruptController::new(ClosureIntc(RefCell::new(|| {
            if console.rx.borrow().is_empty() {
                0
            } else {
                AUX.bits()
            }
        })));

        let table: [(IrqSources, &dyn IrqHandler); 1] = [(AUX, &echo)];
        IrqDispatcher::new(&intc, &table).dispatch();

        assert_eq!(*console.tx.borrow(), b"ABC".to_vec());
    }

    struct ClosureIntc<F: FnMut() -> u32>(RefCell<F>);

    impl<F: FnMut() -> u32> Bus for ClosureIntc<F> {
        fn read_reg(&self, offset: usize) -> u32 {
            assert_eq!(offset, 0x04);
            (self.0.borrow_mut())()
        }

        fn write_reg(&self, _offset: usize, _value: u32) {}
    }

    // -------------------------------------------------------------------------
    // End-to-end: LED-bound periodic timer
    // -------------------------------------------------------------------------

    #[test]
    fn led_alternates_with_twice_the_timer_period() {
        const PERIOD: u32 = 1_000;

        let hw = Hw::new();
        hw.borrow_mut().enabled = T1.bits();

        let timer = SystemTimer::new(TimerBus(Rc::clone(&hw)));
        let intc = InterruptController::new(IntcBus(Rc::clone(&hw)));
        let led = FakeLed::new();

        let blink = LedBlink::new(&timer, Channel::C1, PERIOD, &led);
        let table: [(IrqSources, &dyn IrqHandler); 1] = [(T1, &blink)];
        let dispatcher = IrqDispatcher::new(&intc, &table);

        // Startup configuration: first match one period from tick 0.
        timer.arm(Channel::C1, PERIOD);
        assert!(!led.on.get());

        // First firing at tick P: LED turns on, channel re-armed for 2P.
        let t_first = hw.borrow_mut().run_until_match(10 * u64::from(PERIOD));
        assert_eq!(t_first, u64::from(PERIOD));
        dispatcher.dispatch();
        assert!(led.on.get());
        assert_eq!(hw.borrow().compare1, 2 * PERIOD);
        assert_eq!(hw.borrow().cs, 0, "firing was acknowledged");

        // Second firing at tick 2P: LED turns off again.
        let t_second = hw.borrow_mut().run_until_match(10 * u64::from(PERIOD));
        assert_eq!(t_second, 2 * u64::from(PERIOD));
        dispatcher.dispatch();
        assert!(!led.on.get());
        assert_eq!(led.toggles.get(), 2);

        // One toggle per firing: a full LED cycle spans two periods.
        assert_eq!(t_second - t_first, u64::from(PERIOD));
    }

    #[test]
    fn acknowledged_firing_does_not_service_twice() {
        const PERIOD: u32 = 500;

        let hw = Hw::new();
        hw.borrow_mut().enabled = T1.bits();

        let timer = SystemTimer::new(TimerBus(Rc::clone(&hw)));
        let intc = InterruptController::new(IntcBus(Rc::clone(&hw)));
        let led = FakeLed::new();

        let blink = LedBlink::new(&timer, Channel::C1, PERIOD, &led);
        let table: [(IrqSources, &dyn IrqHandler); 1] = [(T1, &blink)];
        let dispatcher = IrqDispatcher::new(&intc, &table);

        timer.arm(Channel::C1, PERIOD);
        hw.borrow_mut().run_until_match(10 * u64::from(PERIOD));
        dispatcher.dispatch();
        assert_eq!(led.toggles.get(), 1);

        // A redundant acknowledge and an immediate re-dispatch must not
        // produce a second service invocation.
        timer.acknowledge(Channel::C1);
        dispatcher.dispatch();
        assert_eq!(led.toggles.get(), 1);
    }

    #[test]
    fn idle_timer_acknowledges_and_nothing_else() {
        let hw = Hw::new();
        hw.borrow_mut().enabled = IrqSources::SYSTEM_TIMER_3.bits();
        hw.borrow_mut().cs = 1 << 3;

        let timer = SystemTimer::new(TimerBus(Rc::clone(&hw)));
        let intc = InterruptController::new(IntcBus(Rc::clone(&hw)));

        let spare = IdleTimer::new(&timer, Channel::C3);
        let table: [(IrqSources, &dyn IrqHandler); 1] =
            [(IrqSources::SYSTEM_TIMER_3, &spare)];

        IrqDispatcher::new(&intc, &table).dispatch();

        // Flag retired, channel left unarmed.
        assert_eq!(hw.borrow().cs, 0);
        assert_eq!(hw.borrow().compare1, 0);
    }
}
