// Interrupt sources (gbdev.io/pandocs/Interrupt_Sources.html)
pub const VBLANK: u8 = 0x01;
pub const STAT: u8 = 0x02;
pub const TIMER: u8 = 0x04;
pub const SERIAL: u8 = 0x08;
pub const JOYPAD: u8 = 0x10;

const USED_BITS: u8 = 0x1F;
const UNUSED_BITS: u8 = 0xE0;

pub const IF_ADDR: u16 = 0xFF0F;
pub const IE_ADDR: u16 = 0xFFFF;

/// Sources in priority order, highest first, with their vectors.
const VECTORS: [(u8, u16); 5] = [
    (VBLANK, 0x40),
    (STAT, 0x48),
    (TIMER, 0x50),
    (SERIAL, 0x58),
    (JOYPAD, 0x60),
];

/// Interrupt enable (IE) and request (IF) registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interrupts {
    ie: u8,
    if_reg: u8,
}

impl Interrupts {
    pub fn new() -> Self {
        Self {
            ie: UNUSED_BITS,
            if_reg: UNUSED_BITS,
        }
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            IE_ADDR => self.ie,
            IF_ADDR => self.if_reg,
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8) {
        match addr {
            IE_ADDR => self.ie = val | UNUSED_BITS,
            IF_ADDR => self.if_reg = val | UNUSED_BITS,
            _ => {}
        }
    }

    /// Raise one or more request bits.
    pub fn request(&mut self, mask: u8) {
        self.if_reg |= mask & USED_BITS;
    }

    pub fn acknowledge(&mut self, bit: u8) {
        self.if_reg &= !bit;
    }

    /// Sources that are both requested and enabled.
    pub fn pending(&self) -> u8 {
        self.ie & self.if_reg & USED_BITS
    }

    /// The highest-priority pending source and its vector.
    pub fn highest_pending(&self) -> Option<(u8, u16)> {
        let pending = self.pending();
        VECTORS
            .iter()
            .copied()
            .find(|&(bit, _)| pending & bit != 0)
    }
}

impl Default for Interrupts {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unused_bits_read_as_one() {
        let mut ints = Interrupts::new();
        ints.write(IE_ADDR, 0x00);
        ints.write(IF_ADDR, 0x01);
        assert_eq!(ints.read(IE_ADDR), 0xE0);
        assert_eq!(ints.read(IF_ADDR), 0xE1);
    }

    #[test]
    fn priority_prefers_lowest_bit() {
        let mut ints = Interrupts::new();
        ints.write(IE_ADDR, 0x1F);
        ints.request(JOYPAD | TIMER | STAT);
        assert_eq!(ints.highest_pending(), Some((STAT, 0x48)));
        ints.acknowledge(STAT);
        assert_eq!(ints.highest_pending(), Some((TIMER, 0x50)));
        ints.acknowledge(TIMER);
        assert_eq!(ints.highest_pending(), Some((JOYPAD, 0x60)));
    }

    #[test]
    fn disabled_sources_are_not_pending() {
        let mut ints = Interrupts::new();
        ints.write(IE_ADDR, VBLANK);
        ints.request(TIMER);
        assert_eq!(ints.pending(), 0);
        assert_eq!(ints.highest_pending(), None);
    }
}
