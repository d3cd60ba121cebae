use crate::interrupt::{self, Interrupts};

pub const DIV_ADDR: u16 = 0xFF04;
pub const TIMA_ADDR: u16 = 0xFF05;
pub const TMA_ADDR: u16 = 0xFF06;
pub const TAC_ADDR: u16 = 0xFF07;

const TAC_ENABLE: u8 = 0x04;
const TAC_SELECT: u8 = 0x03;

/// Divider bit watched for each TAC clock select (÷1024, ÷16, ÷64, ÷256).
const SELECT_BITS: [u8; 4] = [9, 3, 5, 7];

pub struct Timer {
    /// Free-running divider, incremented once per system tick. DIV is the
    /// upper 8 bits.
    pub div: u16,
    pub tima: u8,
    pub tma: u8,
    pub tac: u8,
    /// Selected divider bit ANDed with the enable bit, as of the last tick.
    last_signal: bool,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            div: 0,
            tima: 0,
            tma: 0,
            tac: 0,
            last_signal: false,
        }
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            DIV_ADDR => (self.div >> 8) as u8,
            TIMA_ADDR => self.tima,
            TMA_ADDR => self.tma,
            TAC_ADDR => self.tac | 0xF8,
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8, ints: &mut Interrupts) {
        match addr {
            DIV_ADDR => {
                self.div = 0;
                self.detect_edge(ints);
            }
            TIMA_ADDR => self.tima = val,
            TMA_ADDR => self.tma = val,
            TAC_ADDR => {
                self.tac = val & 0x07;
                self.detect_edge(ints);
            }
            _ => {}
        }
    }

    /// Advance one system tick.
    pub fn tick(&mut self, ints: &mut Interrupts) {
        self.div = self.div.wrapping_add(1);
        self.detect_edge(ints);
    }

    fn detect_edge(&mut self, ints: &mut Interrupts) {
        let signal = Self::signal_with(self.div, self.tac);
        if self.last_signal && !signal {
            self.increment(ints);
        }
        self.last_signal = signal;
    }

    fn increment(&mut self, ints: &mut Interrupts) {
        if self.tima == 0xFF {
            self.tima = self.tma;
            ints.request(interrupt::TIMER);
        } else {
            self.tima += 1;
        }
    }

    fn signal_with(div: u16, tac: u8) -> bool {
        if tac & TAC_ENABLE == 0 {
            return false;
        }
        let bit = SELECT_BITS[(tac & TAC_SELECT) as usize];
        (div >> bit) & 1 != 0
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
