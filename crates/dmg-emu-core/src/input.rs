use crate::interrupt::{self, Interrupts};

pub const JOYP_ADDR: u16 = 0xFF00;

const SELECT_DPAD: u8 = 0x10;
const SELECT_BUTTONS: u8 = 0x20;
const SELECT_MASK: u8 = SELECT_DPAD | SELECT_BUTTONS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Right,
    Left,
    Up,
    Down,
    A,
    B,
    Select,
    Start,
}

impl Button {
    /// Bit in the packed key state: d-pad in the low nibble, buttons in the
    /// high nibble, each in P1 bit order.
    pub fn mask(self) -> u8 {
        match self {
            Button::Right => 0x01,
            Button::Left => 0x02,
            Button::Up => 0x04,
            Button::Down => 0x08,
            Button::A => 0x10,
            Button::B => 0x20,
            Button::Select => 0x40,
            Button::Start => 0x80,
        }
    }
}

/// P1/JOYP register. Key state is active-low: a cleared bit is a held key.
pub struct Input {
    select: u8,
    state: u8,
}

impl Input {
    pub fn new() -> Self {
        Self {
            select: SELECT_MASK,
            state: 0xFF,
        }
    }

    pub fn read(&self) -> u8 {
        let mut low = 0x0F;
        if self.select & SELECT_DPAD == 0 {
            low &= self.state & 0x0F;
        }
        if self.select & SELECT_BUTTONS == 0 {
            low &= self.state >> 4;
        }
        0xC0 | self.select | low
    }

    pub fn write(&mut self, val: u8) {
        self.select = val & SELECT_MASK;
    }

    /// Replace the whole key state, requesting a joypad interrupt when any key
    /// goes from released to held.
    pub fn update_state(&mut self, state: u8, ints: &mut Interrupts) {
        let newly_pressed = self.state & !state;
        self.state = state;
        if newly_pressed != 0 {
            ints.request(interrupt::JOYPAD);
        }
    }

    pub fn press(&mut self, button: Button, ints: &mut Interrupts) {
        self.update_state(self.state & !button.mask(), ints);
    }

    pub fn release(&mut self, button: Button) {
        self.state |= button.mask();
    }

    pub fn state(&self) -> u8 {
        self.state
    }
}

impl Default for Input {
    fn default() -> Self {
        Self::new()
    }
}
