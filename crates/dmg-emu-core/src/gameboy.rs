use crate::{
    apu::SAMPLE_BUFFER_LEN,
    cartridge::Cartridge,
    cpu::Cpu,
    input::Button,
    mmu::{DOTS_PER_M_CYCLE, Mmu},
    ppu::{FRAME_DOTS, SCREEN_HEIGHT, SCREEN_WIDTH},
};

/// Upper bound on one `run_frame` call, for when the LCD is off and VBlank
/// never arrives.
const FRAME_CYCLE_LIMIT: u64 = (FRAME_DOTS / DOTS_PER_M_CYCLE) as u64 + 1;

pub struct GameBoy {
    pub cpu: Cpu,
    pub mmu: Mmu,
}

impl GameBoy {
    /// A machine in the state the boot ROM leaves behind, ready to run from
    /// 0x0100.
    pub fn new() -> Self {
        let mut mmu = Mmu::new();
        mmu.apply_boot_state();
        Self {
            cpu: Cpu::new(),
            mmu,
        }
    }

    pub fn load_cart(&mut self, cart: Cartridge) {
        self.mmu.load_cart(cart);
    }

    /// Reset to the post-boot state while preserving the loaded cartridge.
    pub fn reset(&mut self) {
        let cart = self.mmu.cart.take();
        *self = Self::new();
        if let Some(c) = cart {
            self.mmu.load_cart(c);
        }
    }

    /// Execute one instruction. Returns the machine cycles it took.
    pub fn step(&mut self) -> u32 {
        self.cpu.step(&mut self.mmu)
    }

    /// Run until the PPU finishes a frame. With the LCD off no frame ever
    /// completes, so this gives up after one frame's worth of cycles.
    pub fn run_frame(&mut self) {
        self.frame_loop(|_| {});
    }

    /// Like `run_frame`, but drains every sample block as soon as it fills
    /// and hands it to `on_samples`.
    pub fn run_frame_with<F>(&mut self, mut on_samples: F)
    where
        F: FnMut(&[i16; SAMPLE_BUFFER_LEN]),
    {
        self.frame_loop(|gb| {
            if let Some(block) = gb.take_samples() {
                on_samples(&block);
            }
        });
    }

    fn frame_loop<F: FnMut(&mut Self)>(&mut self, mut after_step: F) {
        let start = self.mmu.cycles;
        while !self.mmu.ppu.frame_ready() {
            self.step();
            after_step(self);
            if self.mmu.cycles - start >= FRAME_CYCLE_LIMIT {
                break;
            }
        }
        self.mmu.ppu.clear_frame_flag();
    }

    pub fn press(&mut self, button: Button) {
        self.mmu.input.press(button, &mut self.mmu.ints);
    }

    pub fn release(&mut self, button: Button) {
        self.mmu.input.release(button);
    }

    pub fn framebuffer(&self) -> &[u32; SCREEN_WIDTH * SCREEN_HEIGHT] {
        self.mmu.ppu.framebuffer()
    }

    /// A completed block of interleaved stereo samples, if one is waiting.
    pub fn take_samples(&mut self) -> Option<[i16; SAMPLE_BUFFER_LEN]> {
        self.mmu.apu.samples.take()
    }

    pub fn save_cart_ram(&mut self) {
        self.mmu.save_cart_ram();
    }
}

impl Default for GameBoy {
    fn default() -> Self {
        Self::new()
    }
}
