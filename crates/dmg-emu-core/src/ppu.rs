use crate::interrupt::{self, Interrupts};

#[cfg(feature = "ppu-trace")]
macro_rules! ppu_trace {
    ($($arg:tt)*) => {
        log::trace!($($arg)*);
    };
}
#[cfg(not(feature = "ppu-trace"))]
macro_rules! ppu_trace {
    ($($arg:tt)*) => {};
}

// Screen resolution
pub const SCREEN_WIDTH: usize = 160;
pub const SCREEN_HEIGHT: usize = 144;

// Timing in dots
const OAM_SCAN_DOTS: u16 = 80;
const DRAWING_DOTS: u16 = 172;
pub const LINE_DOTS: u16 = 456;
const LINES_PER_FRAME: u8 = 154;
pub const FRAME_DOTS: u32 = LINE_DOTS as u32 * LINES_PER_FRAME as u32;

// Sprite limits
const MAX_SPRITES_PER_LINE: usize = 10;
const TOTAL_SPRITES: usize = 40;

pub const VRAM_SIZE: usize = 0x2000;
pub const OAM_SIZE: usize = 0xA0;

// VRAM layout, relative to 0x8000
const BG_MAP_0_BASE: usize = 0x1800;
const BG_MAP_1_BASE: usize = 0x1C00;
const TILE_DATA_SIGNED_BASE: usize = 0x1000;

// LCDC bits
const LCDC_BG_ENABLE: u8 = 0x01;
const LCDC_OBJ_ENABLE: u8 = 0x02;
const LCDC_OBJ_SIZE: u8 = 0x04;
const LCDC_BG_MAP: u8 = 0x08;
const LCDC_TILE_DATA: u8 = 0x10;
const LCDC_WIN_ENABLE: u8 = 0x20;
const LCDC_WIN_MAP: u8 = 0x40;
const LCDC_LCD_ENABLE: u8 = 0x80;

// STAT interrupt selects
const STAT_HBLANK_SELECT: u8 = 0x08;
const STAT_VBLANK_SELECT: u8 = 0x10;
const STAT_OAM_SELECT: u8 = 0x20;
const STAT_LYC_SELECT: u8 = 0x40;
const STAT_SELECT_MASK: u8 = 0x78;

// OAM attribute bits
const ATTR_PALETTE: u8 = 0x10;
const ATTR_X_FLIP: u8 = 0x20;
const ATTR_Y_FLIP: u8 = 0x40;
const ATTR_BG_PRIORITY: u8 = 0x80;

/// DMG shades in 0xRRGGBBAA order, lightest first.
pub const DMG_PALETTE: [u32; 4] = [0x9BBC0FFF, 0x8BAC0FFF, 0x306230FF, 0x0F380FFF];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PpuMode {
    HBlank = 0,
    VBlank = 1,
    OamScan = 2,
    Drawing = 3,
}

#[derive(Copy, Clone, Default, Debug)]
struct Sprite {
    /// Raw OAM coordinates: screen position plus (8, 16).
    x: u8,
    y: u8,
    tile: u8,
    flags: u8,
    oam_index: usize,
}

pub struct Ppu {
    pub vram: [u8; VRAM_SIZE],
    pub oam: [u8; OAM_SIZE],

    lcdc: u8,
    /// Only the interrupt select bits (3-6) are stored.
    stat: u8,
    scy: u8,
    scx: u8,
    ly: u8,
    lyc: u8,
    lyc_eq_ly: bool,
    bgp: u8,
    obp0: u8,
    obp1: u8,
    wy: u8,
    wx: u8,

    mode: PpuMode,
    /// Dots elapsed on the current line.
    dots: u16,

    /// Latched sprites for the current scanline, sorted by X.
    line_sprites: [Sprite; MAX_SPRITES_PER_LINE],
    sprite_count: usize,
    /// Object height in effect when the line's sprites were selected.
    line_sprite_height: u8,

    /// Set once LY has matched WY this frame.
    window_in_frame: bool,
    window_drawn: bool,
    /// Internal window line counter
    win_line_counter: u8,

    pub framebuffer: [u32; SCREEN_WIDTH * SCREEN_HEIGHT],
    frame_ready: bool,
    stat_irq_line: bool,
    frame_counter: u64,
}

impl Ppu {
    pub fn new() -> Self {
        Self {
            vram: [0; VRAM_SIZE],
            oam: [0; OAM_SIZE],
            lcdc: 0,
            stat: 0,
            scy: 0,
            scx: 0,
            ly: 0,
            lyc: 0,
            lyc_eq_ly: true,
            bgp: 0,
            obp0: 0,
            obp1: 0,
            wy: 0,
            wx: 0,
            mode: PpuMode::OamScan,
            dots: 0,
            line_sprites: [Sprite::default(); MAX_SPRITES_PER_LINE],
            sprite_count: 0,
            line_sprite_height: 8,
            window_in_frame: false,
            window_drawn: false,
            win_line_counter: 0,
            framebuffer: [DMG_PALETTE[0]; SCREEN_WIDTH * SCREEN_HEIGHT],
            frame_ready: false,
            stat_irq_line: false,
            frame_counter: 0,
        }
    }

    /// Registers as left by the boot ROM.
    pub fn apply_boot_state(&mut self) {
        self.lcdc = 0x91;
        self.stat = 0;
        self.bgp = 0xFC;
        self.ly = 0;
        self.dots = 0;
        self.mode = PpuMode::OamScan;
        self.lyc_eq_ly = self.ly == self.lyc;
        self.window_in_frame = self.wy == self.ly;
        self.stat_irq_line = false;
    }

    pub fn frame_ready(&self) -> bool {
        self.frame_ready
    }

    pub fn clear_frame_flag(&mut self) {
        self.frame_ready = false;
    }

    pub fn framebuffer(&self) -> &[u32; SCREEN_WIDTH * SCREEN_HEIGHT] {
        &self.framebuffer
    }

    /// Frames completed since power on.
    pub fn frames(&self) -> u64 {
        self.frame_counter
    }

    pub fn ly(&self) -> u8 {
        self.ly
    }

    pub fn mode(&self) -> PpuMode {
        self.mode
    }

    pub fn dots(&self) -> u16 {
        self.dots
    }

    pub fn window_line_counter(&self) -> u8 {
        self.win_line_counter
    }

    fn lcd_enabled(&self) -> bool {
        self.lcdc & LCDC_LCD_ENABLE != 0
    }

    fn update_lyc_compare(&mut self) {
        self.lyc_eq_ly = self.ly == self.lyc;
    }

    pub fn read_reg(&self, addr: u16) -> u8 {
        match addr {
            0xFF40 => self.lcdc,
            0xFF41 => {
                0x80 | (self.stat & STAT_SELECT_MASK)
                    | if self.lyc_eq_ly { 0x04 } else { 0 }
                    | self.mode as u8
            }
            0xFF42 => self.scy,
            0xFF43 => self.scx,
            0xFF44 => self.ly,
            0xFF45 => self.lyc,
            0xFF47 => self.bgp,
            0xFF48 => self.obp0,
            0xFF49 => self.obp1,
            0xFF4A => self.wy,
            0xFF4B => self.wx,
            _ => 0xFF,
        }
    }

    pub fn write_reg(&mut self, addr: u16, val: u8) {
        match addr {
            0xFF40 => {
                let was_on = self.lcd_enabled();
                self.lcdc = val;
                if was_on && !self.lcd_enabled() {
                    self.mode = PpuMode::HBlank;
                    self.dots = 0;
                    self.ly = 0;
                    self.win_line_counter = 0;
                    self.window_in_frame = false;
                    self.window_drawn = false;
                } else if !was_on && self.lcd_enabled() {
                    self.mode = PpuMode::OamScan;
                    self.dots = 0;
                    self.window_in_frame = self.wy == self.ly;
                }
                self.update_lyc_compare();
            }
            0xFF41 => self.stat = val & STAT_SELECT_MASK,
            0xFF42 => self.scy = val,
            0xFF43 => self.scx = val,
            0xFF44 => {}
            0xFF45 => {
                self.lyc = val;
                self.update_lyc_compare();
            }
            0xFF47 => self.bgp = val,
            0xFF48 => self.obp0 = val,
            0xFF49 => self.obp1 = val,
            0xFF4A => {
                self.wy = val;
                if self.wy == self.ly {
                    self.window_in_frame = true;
                }
            }
            0xFF4B => self.wx = val,
            _ => {}
        }
    }

    fn sprite_height(&self) -> u8 {
        if self.lcdc & LCDC_OBJ_SIZE != 0 { 16 } else { 8 }
    }

    /// Collect up to 10 sprites covering the current line, in OAM order, then
    /// sort them by X keeping OAM order for ties.
    fn oam_scan(&mut self) {
        self.line_sprite_height = self.sprite_height();
        let height = self.line_sprite_height as u16;
        let line = self.ly as u16 + 16;
        self.sprite_count = 0;
        for i in 0..TOTAL_SPRITES {
            if self.sprite_count == MAX_SPRITES_PER_LINE {
                break;
            }
            let base = i * 4;
            let y = self.oam[base] as u16;
            if line >= y && line < y + height {
                self.line_sprites[self.sprite_count] = Sprite {
                    y: self.oam[base],
                    x: self.oam[base + 1],
                    tile: self.oam[base + 2],
                    flags: self.oam[base + 3],
                    oam_index: i,
                };
                self.sprite_count += 1;
            }
        }
        self.line_sprites[..self.sprite_count].sort_by_key(|s| (s.x, s.oam_index));
    }

    #[inline(always)]
    fn shade(palette: u8, color_id: u8) -> u32 {
        DMG_PALETTE[((palette >> (color_id * 2)) & 0x03) as usize]
    }

    #[inline(always)]
    fn tile_pixel(&self, tile_addr: usize, row: usize, bit: usize) -> u8 {
        let lo = self.vram[tile_addr + row * 2];
        let hi = self.vram[tile_addr + row * 2 + 1];
        (((hi >> bit) & 1) << 1) | ((lo >> bit) & 1)
    }

    /// Colour index of the background or window at `col` on the current line.
    fn bg_win_color_id(&mut self, col: usize) -> u8 {
        let window = self.lcdc & LCDC_WIN_ENABLE != 0
            && self.window_in_frame
            && col + 7 >= self.wx as usize;
        let (map_base, x, y) = if window {
            self.window_drawn = true;
            let map = if self.lcdc & LCDC_WIN_MAP != 0 {
                BG_MAP_1_BASE
            } else {
                BG_MAP_0_BASE
            };
            (map, col + 7 - self.wx as usize, self.win_line_counter as usize)
        } else {
            let map = if self.lcdc & LCDC_BG_MAP != 0 {
                BG_MAP_1_BASE
            } else {
                BG_MAP_0_BASE
            };
            let x = (col + self.scx as usize) & 0xFF;
            let y = (self.ly as usize + self.scy as usize) & 0xFF;
            (map, x, y)
        };

        let tile_index = self.vram[map_base + (((y / 8) * 32 + x / 8) & 0x3FF)];
        let tile_addr = if self.lcdc & LCDC_TILE_DATA != 0 {
            tile_index as usize * 16
        } else {
            (TILE_DATA_SIGNED_BASE as isize + tile_index as i8 as isize * 16) as usize
        };
        self.tile_pixel(tile_addr, y % 8, 7 - x % 8)
    }

    fn render_scanline(&mut self) {
        let row = self.ly as usize * SCREEN_WIDTH;
        let height = self.line_sprite_height;
        let bg_enabled = self.lcdc & LCDC_BG_ENABLE != 0;
        let obj_enabled = self.lcdc & LCDC_OBJ_ENABLE != 0;

        for col in 0..SCREEN_WIDTH {
            let (bg_id, mut color) = if bg_enabled {
                let id = self.bg_win_color_id(col);
                (id, Self::shade(self.bgp, id))
            } else {
                (0, DMG_PALETTE[0])
            };

            if obj_enabled {
                // Sorted by X then OAM index, so the first opaque pixel wins.
                for s in &self.line_sprites[..self.sprite_count] {
                    let screen_x = col + 8;
                    if screen_x < s.x as usize || screen_x >= s.x as usize + 8 {
                        continue;
                    }
                    let px = screen_x - s.x as usize;
                    let bit = if s.flags & ATTR_X_FLIP != 0 { px } else { 7 - px };
                    let mut line = self.ly + 16 - s.y;
                    if s.flags & ATTR_Y_FLIP != 0 {
                        line = height - 1 - line;
                    }
                    let tile = if height == 16 {
                        (s.tile & 0xFE) | (line >> 3)
                    } else {
                        s.tile
                    };
                    let id = self.tile_pixel(tile as usize * 16, (line & 7) as usize, bit);
                    if id == 0 {
                        continue;
                    }
                    if s.flags & ATTR_BG_PRIORITY == 0 || bg_id == 0 {
                        let palette = if s.flags & ATTR_PALETTE != 0 {
                            self.obp1
                        } else {
                            self.obp0
                        };
                        color = Self::shade(palette, id);
                    }
                    break;
                }
            }

            self.framebuffer[row + col] = color;
        }
    }

    fn end_of_line(&mut self, ints: &mut Interrupts) {
        self.ly += 1;
        self.update_lyc_compare();
        if self.ly as usize == SCREEN_HEIGHT {
            self.mode = PpuMode::VBlank;
            ints.request(interrupt::VBLANK);
            self.frame_ready = true;
            self.frame_counter = self.frame_counter.wrapping_add(1);
            self.win_line_counter = 0;
            self.window_drawn = false;
            self.window_in_frame = false;
            ppu_trace!("PPU: frame {} complete", self.frame_counter);
        } else {
            if self.wy == self.ly {
                self.window_in_frame = true;
            }
            if self.window_drawn {
                self.win_line_counter = self.win_line_counter.wrapping_add(1);
                self.window_drawn = false;
            }
            self.mode = PpuMode::OamScan;
        }
    }

    /// Advance one dot.
    pub fn tick(&mut self, ints: &mut Interrupts) {
        if !self.lcd_enabled() {
            return;
        }

        self.dots += 1;
        match self.mode {
            PpuMode::OamScan => {
                if self.dots == OAM_SCAN_DOTS {
                    self.oam_scan();
                    self.mode = PpuMode::Drawing;
                }
            }
            PpuMode::Drawing => {
                if self.dots == OAM_SCAN_DOTS + DRAWING_DOTS {
                    self.render_scanline();
                    self.mode = PpuMode::HBlank;
                }
            }
            PpuMode::HBlank => {
                if self.dots == LINE_DOTS {
                    self.dots = 0;
                    self.end_of_line(ints);
                }
            }
            PpuMode::VBlank => {
                if self.dots == LINE_DOTS {
                    self.dots = 0;
                    self.ly += 1;
                    if self.ly == LINES_PER_FRAME {
                        self.ly = 0;
                        self.window_in_frame = self.wy == 0;
                        self.mode = PpuMode::OamScan;
                    }
                    self.update_lyc_compare();
                }
            }
        }

        self.update_stat_irq(ints);
    }

    /// Request a STAT interrupt on the rising edge of the combined STAT line.
    fn update_stat_irq(&mut self, ints: &mut Interrupts) {
        let mode_signal = match self.mode {
            PpuMode::HBlank => self.stat & STAT_HBLANK_SELECT != 0,
            PpuMode::VBlank => self.stat & STAT_VBLANK_SELECT != 0,
            PpuMode::OamScan => self.stat & STAT_OAM_SELECT != 0,
            PpuMode::Drawing => false,
        };
        let line = mode_signal || (self.lyc_eq_ly && self.stat & STAT_LYC_SELECT != 0);
        if line && !self.stat_irq_line {
            ints.request(interrupt::STAT);
        }
        self.stat_irq_line = line;
    }
}

impl Default for Ppu {
    fn default() -> Self {
        Self::new()
    }
}
