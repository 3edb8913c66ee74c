//! Pass/fail status LEDs
//!
//! After the sequence finishes, the result is shown by blinking one of two
//! LEDs: green slowly on pass, red quickly on fail. On a board this is the
//! terminal state of the program.

use crate::board::{Board, Gpio, Pin, Port};

/// Green LED, lit on pass
pub const PASS_LED: Pin = Pin {
    port: Port::Port2,
    number: 0,
};

/// Red LED, lit on fail
pub const FAIL_LED: Pin = Pin {
    port: Port::Port1,
    number: 15,
};

/// Delay ticks per half period of the pass blink
pub const PASS_HALF_PERIOD: u32 = 0x2F_FFFF;

/// Delay ticks per half period of the fail blink
pub const FAIL_HALF_PERIOD: u32 = 0x2_FFFF;

/// What the LEDs should show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Sequence passed (or was skipped on purpose)
    Pass,
    /// Sequence failed
    Fail,
}

impl Signal {
    fn led_and_period(self) -> (Pin, u32) {
        match self {
            Self::Pass => (PASS_LED, PASS_HALF_PERIOD),
            Self::Fail => (FAIL_LED, FAIL_HALF_PERIOD),
        }
    }
}

/// Drive a single LED on or off
pub fn set_led<G: Gpio + ?Sized>(gpio: &mut G, pin: Pin, on: bool) {
    gpio.enable_output(pin);
    if on {
        gpio.set_high(pin);
    } else {
        gpio.set_low(pin);
    }
}

/// Switch both status LEDs off
pub fn clear_leds<B: Board + ?Sized>(board: &mut B) {
    set_led(board.gpio(), PASS_LED, false);
    set_led(board.gpio(), FAIL_LED, false);
}

/// Status LED driver
pub struct StatusIndicator<'a, B: Board> {
    board: &'a mut B,
}

impl<'a, B: Board> StatusIndicator<'a, B> {
    /// Borrow the board's GPIO and delay for signalling
    pub fn new(board: &'a mut B) -> Self {
        Self { board }
    }

    /// Blink the result `cycles` times, then leave both LEDs off
    pub fn signal_cycles(&mut self, signal: Signal, cycles: u32) {
        clear_leds(self.board);
        for _ in 0..cycles {
            self.blink_once(signal);
        }
    }

    /// Blink the result forever
    pub fn signal(&mut self, signal: Signal) -> ! {
        clear_leds(self.board);
        loop {
            self.blink_once(signal);
        }
    }

    fn blink_once(&mut self, signal: Signal) {
        let (led, half_period) = signal.led_and_period();
        set_led(self.board.gpio(), led, true);
        self.board.delay(half_period);
        set_led(self.board.gpio(), led, false);
        self.board.delay(half_period);
    }
}
