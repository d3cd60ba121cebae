use log::warn;

use crate::{
    apu::Apu,
    cartridge::Cartridge,
    dma::{self, Dma},
    input::{self, Input},
    interrupt::{self, Interrupts},
    ppu::Ppu,
    timer::Timer,
};

const WRAM_SIZE: usize = 0x2000;
const EXT_RAM_SIZE: usize = 0x2000;

/// System ticks per bus access.
pub const DOTS_PER_M_CYCLE: u32 = 4;

/// Memory bus. Every CPU-visible access goes through `read`/`write`/`wait`,
/// which advance the peripherals one machine cycle before touching memory.
pub struct Mmu {
    pub wram: [u8; WRAM_SIZE],
    pub hram: [u8; 0x7F],
    /// Backing bytes for 0xFEA0-0xFEFF.
    unused: [u8; 0x60],
    /// IO addresses with no handler read back what was last written.
    io: [u8; 0x80],
    /// Stands in for cartridge RAM when no cartridge is inserted.
    ext_ram: [u8; EXT_RAM_SIZE],
    pub cart: Option<Cartridge>,
    pub ints: Interrupts,
    pub timer: Timer,
    pub dma: Dma,
    pub ppu: Ppu,
    pub apu: Apu,
    pub input: Input,
    /// Machine cycles elapsed since power on.
    pub cycles: u64,
}

impl Mmu {
    pub fn new() -> Self {
        Self {
            wram: [0; WRAM_SIZE],
            hram: [0; 0x7F],
            unused: [0; 0x60],
            io: [0xFF; 0x80],
            ext_ram: [0; EXT_RAM_SIZE],
            cart: None,
            ints: Interrupts::new(),
            timer: Timer::new(),
            dma: Dma::new(),
            ppu: Ppu::new(),
            apu: Apu::new(),
            input: Input::new(),
            cycles: 0,
        }
    }

    /// Registers as the boot ROM leaves them.
    pub fn apply_boot_state(&mut self) {
        self.ints.write(interrupt::IF_ADDR, 0xE1);
        self.ints.write(interrupt::IE_ADDR, 0x00);
        self.ppu.apply_boot_state();
        self.apu.apply_boot_state();
    }

    pub fn load_cart(&mut self, cart: Cartridge) {
        self.cart = Some(cart);
    }

    pub fn save_cart_ram(&mut self) {
        if let Some(cart) = &self.cart
            && let Err(e) = cart.save_ram()
        {
            warn!("Failed to save cartridge RAM: {e}");
        }
    }

    /// CPU read: one machine cycle, then the access.
    pub fn read(&mut self, addr: u16) -> u8 {
        self.tick_machine_cycle();
        self.read_byte(addr)
    }

    /// CPU write: one machine cycle, then the access.
    pub fn write(&mut self, addr: u16, val: u8) {
        self.tick_machine_cycle();
        self.write_byte(addr, val);
    }

    /// Internal CPU delay with no bus side effect.
    pub fn wait(&mut self) {
        self.tick_machine_cycle();
    }

    /// Untimed read.
    pub fn read_byte(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x7FFF => self.cart.as_ref().map(|c| c.read_rom(addr)).unwrap_or(0xFF),
            0x8000..=0x9FFF => self.ppu.vram[(addr - 0x8000) as usize],
            0xA000..=0xBFFF => match &self.cart {
                Some(cart) => cart.read_external_ram(addr),
                None => self.ext_ram[(addr - 0xA000) as usize],
            },
            0xC000..=0xDFFF => self.wram[(addr - 0xC000) as usize],
            0xE000..=0xFDFF => self.wram[(addr - 0xE000) as usize],
            0xFE00..=0xFE9F => self.ppu.oam[(addr - 0xFE00) as usize],
            0xFEA0..=0xFEFF => self.unused[(addr - 0xFEA0) as usize],
            0xFF00..=0xFF7F => self.read_io(addr),
            0xFF80..=0xFFFE => self.hram[(addr - 0xFF80) as usize],
            0xFFFF => self.ints.read(addr),
        }
    }

    fn read_io(&self, addr: u16) -> u8 {
        match addr {
            input::JOYP_ADDR => self.input.read(),
            0xFF04..=0xFF07 => self.timer.read(addr),
            interrupt::IF_ADDR => self.ints.read(addr),
            0xFF10..=0xFF26 | 0xFF30..=0xFF3F => self.apu.read_reg(addr),
            dma::DMA_ADDR => self.dma.read(),
            0xFF40..=0xFF4B => self.ppu.read_reg(addr),
            _ => self.io[(addr - 0xFF00) as usize],
        }
    }

    /// Untimed write.
    pub fn write_byte(&mut self, addr: u16, val: u8) {
        match addr {
            0x0000..=0x7FFF => {
                if let Some(cart) = self.cart.as_mut() {
                    cart.write_rom(addr, val);
                }
            }
            0x8000..=0x9FFF => self.ppu.vram[(addr - 0x8000) as usize] = val,
            0xA000..=0xBFFF => match self.cart.as_mut() {
                Some(cart) => cart.write_external_ram(addr, val),
                None => self.ext_ram[(addr - 0xA000) as usize] = val,
            },
            0xC000..=0xDFFF => self.wram[(addr - 0xC000) as usize] = val,
            0xE000..=0xFDFF => self.wram[(addr - 0xE000) as usize] = val,
            0xFE00..=0xFE9F => self.ppu.oam[(addr - 0xFE00) as usize] = val,
            0xFEA0..=0xFEFF => self.unused[(addr - 0xFEA0) as usize] = val,
            0xFF00..=0xFF7F => self.write_io(addr, val),
            0xFF80..=0xFFFE => self.hram[(addr - 0xFF80) as usize] = val,
            0xFFFF => self.ints.write(addr, val),
        }
    }

    fn write_io(&mut self, addr: u16, val: u8) {
        match addr {
            input::JOYP_ADDR => self.input.write(val),
            0xFF04..=0xFF07 => self.timer.write(addr, val, &mut self.ints),
            interrupt::IF_ADDR => self.ints.write(addr, val),
            0xFF10..=0xFF26 | 0xFF30..=0xFF3F => self.apu.write_reg(addr, val),
            dma::DMA_ADDR => self.dma.start(val),
            0xFF40..=0xFF4B => self.ppu.write_reg(addr, val),
            _ => self.io[(addr - 0xFF00) as usize] = val,
        }
    }

    /// Advance every peripheral by one machine cycle: four system ticks of
    /// timer, PPU and APU in that order, then one DMA step.
    pub fn tick_machine_cycle(&mut self) {
        for _ in 0..DOTS_PER_M_CYCLE {
            self.timer.tick(&mut self.ints);
            self.ppu.tick(&mut self.ints);
            self.apu.tick();
        }
        if let Some((src, dst)) = self.dma.step() {
            let val = self.read_byte(src);
            self.ppu.oam[dst] = val;
        }
        self.cycles += 1;
    }
}

impl Default for Mmu {
    fn default() -> Self {
        Self::new()
    }
}
