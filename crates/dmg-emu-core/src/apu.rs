#[cfg(feature = "apu-trace")]
macro_rules! apu_trace {
    ($($arg:tt)*) => {
        log::trace!($($arg)*);
    };
}
#[cfg(not(feature = "apu-trace"))]
macro_rules! apu_trace {
    ($($arg:tt)*) => {};
}

pub const CPU_CLOCK_HZ: u32 = 4_194_304;
// 512 Hz frame sequencer tick
const FRAME_SEQUENCER_PERIOD: u32 = 8192;
/// System ticks between output samples, CPU_CLOCK_HZ / 44100 rounded down.
pub const SAMPLE_PERIOD: u32 = 95;
pub const SAMPLE_RATE: u32 = CPU_CLOCK_HZ / SAMPLE_PERIOD;
/// Interleaved stereo samples per buffer (512 frames).
pub const SAMPLE_BUFFER_LEN: usize = 1024;

const MAX_FREQUENCY: u16 = 2047;

// Registers left by the boot ROM, 0xFF10-0xFF26.
const POST_BOOT_REGS: [(u16, u8); 21] = [
    (0xFF10, 0x80),
    (0xFF11, 0xBF),
    (0xFF12, 0xF3),
    (0xFF13, 0xFF),
    (0xFF14, 0x3F),
    (0xFF16, 0x3F),
    (0xFF17, 0x00),
    (0xFF18, 0xFF),
    (0xFF19, 0x3F),
    (0xFF1A, 0x7F),
    (0xFF1B, 0xFF),
    (0xFF1C, 0x9F),
    (0xFF1D, 0xFF),
    (0xFF1E, 0x3F),
    (0xFF20, 0xFF),
    (0xFF21, 0x00),
    (0xFF22, 0x00),
    (0xFF23, 0x3F),
    (0xFF24, 0x77),
    (0xFF25, 0xF3),
    (0xFF26, 0x80),
];

// Duty table for pulse channels. Index (0..3) is the NRx1 duty selector:
// 0 -> 00000001 (12.5%)
// 1 -> 10000001 (25%)
// 2 -> 10000111 (50%)
// 3 -> 01111110 (75%)
const DUTY_TABLE: [[u8; 8]; 4] = [
    [0, 0, 0, 0, 0, 0, 0, 1],
    [1, 0, 0, 0, 0, 0, 0, 1],
    [1, 0, 0, 0, 0, 1, 1, 1],
    [0, 1, 1, 1, 1, 1, 1, 0],
];

const NOISE_DIVISORS: [u32; 8] = [8, 16, 32, 48, 64, 80, 96, 112];

/// Right shift applied to wave samples for each NR32 output level.
const WAVE_VOLUME_SHIFT: [u8; 4] = [4, 0, 1, 2];

#[derive(Default, Clone, Copy)]
struct Envelope {
    initial: u8,
    period: u8,
    add: bool,
    volume: u8,
    timer: u8,
    /// Cleared once an adjustment would leave 0..=15; restored on trigger.
    running: bool,
}

impl Envelope {
    fn set_params(&mut self, val: u8) {
        self.initial = val >> 4;
        self.add = val & 0x08 != 0;
        self.period = val & 0x07;
    }

    fn clock(&mut self) {
        if self.period == 0 || self.timer == 0 || !self.running {
            return;
        }
        self.timer -= 1;
        if self.timer == 0 {
            self.timer = self.period;
            let next = if self.add {
                self.volume as i8 + 1
            } else {
                self.volume as i8 - 1
            };
            if (0..=15).contains(&next) {
                self.volume = next as u8;
            } else {
                self.running = false;
            }
        }
    }

    fn reset(&mut self) {
        self.volume = self.initial;
        self.timer = self.period;
        self.running = true;
    }
}

#[derive(Default)]
struct Sweep {
    period: u8,
    negate: bool,
    shift: u8,
    timer: u8,
    shadow: u16,
    enabled: bool,
}

impl Sweep {
    fn set_params(&mut self, val: u8) {
        self.period = (val >> 4) & 0x07;
        self.negate = val & 0x08 != 0;
        self.shift = val & 0x07;
    }

    fn calculate(&self) -> u16 {
        let delta = self.shadow >> self.shift;
        if self.negate {
            self.shadow.wrapping_sub(delta)
        } else {
            self.shadow + delta
        }
    }

    fn reload_timer(&mut self) {
        self.timer = if self.period == 0 { 8 } else { self.period };
    }
}

#[derive(Default)]
struct SquareChannel {
    active: bool,
    dac_enabled: bool,
    length: u16,
    length_enable: bool,
    duty: u8,
    duty_pos: u8,
    frequency: u16,
    timer: u32,
    output: u8,
    envelope: Envelope,
    sweep: Option<Sweep>,
}

impl SquareChannel {
    fn new(with_sweep: bool) -> Self {
        Self {
            sweep: with_sweep.then(Sweep::default),
            ..Default::default()
        }
    }

    fn period(&self) -> u32 {
        (2048 - self.frequency as u32) * 4
    }

    fn step(&mut self) {
        if !self.active || !self.dac_enabled || self.timer == 0 {
            return;
        }
        self.timer -= 1;
        if self.timer == 0 {
            self.timer = self.period();
            self.output = DUTY_TABLE[self.duty as usize][self.duty_pos as usize];
            self.duty_pos = (self.duty_pos + 1) & 7;
        }
    }

    fn trigger(&mut self) {
        self.active = true;
        if self.length == 0 {
            self.length = 64;
        }
        self.timer = self.period();
        self.envelope.reset();

        let mut overflow = false;
        if let Some(sweep) = self.sweep.as_mut() {
            sweep.shadow = self.frequency;
            sweep.reload_timer();
            sweep.enabled = sweep.period != 0 || sweep.shift != 0;
            if sweep.shift != 0 {
                overflow = sweep.calculate() > MAX_FREQUENCY;
            }
        }
        if overflow || !self.dac_enabled {
            self.active = false;
        }
    }

    fn clock_length(&mut self) {
        if self.length_enable && self.length > 0 {
            self.length -= 1;
            if self.length == 0 {
                self.active = false;
            }
        }
    }

    /// Returns the new frequency when the sweep wrote one back.
    fn clock_sweep(&mut self) -> Option<u16> {
        let sweep = self.sweep.as_mut()?;
        if sweep.timer > 0 {
            sweep.timer -= 1;
        }
        if sweep.timer != 0 {
            return None;
        }
        sweep.reload_timer();
        if !sweep.enabled || sweep.period == 0 {
            return None;
        }

        let candidate = sweep.calculate();
        if candidate > MAX_FREQUENCY {
            self.active = false;
            return None;
        }
        if sweep.shift == 0 {
            return None;
        }
        sweep.shadow = candidate;
        self.frequency = candidate;
        if sweep.calculate() > MAX_FREQUENCY {
            self.active = false;
        }
        Some(candidate)
    }
}

#[derive(Default)]
struct WaveChannel {
    active: bool,
    dac_enabled: bool,
    length: u16,
    length_enable: bool,
    volume_code: u8,
    position: u8,
    frequency: u16,
    timer: u32,
    output: u8,
}

impl WaveChannel {
    fn period(&self) -> u32 {
        (2048 - self.frequency as u32) * 2
    }

    fn step(&mut self, wave_ram: &[u8; 0x10]) {
        if !self.active || !self.dac_enabled || self.timer == 0 {
            return;
        }
        self.timer -= 1;
        if self.timer == 0 {
            self.timer = self.period();
            let byte = wave_ram[(self.position / 2) as usize];
            let sample = if self.position & 1 == 0 {
                byte >> 4
            } else {
                byte & 0x0F
            };
            self.output = sample >> WAVE_VOLUME_SHIFT[self.volume_code as usize];
            self.position = (self.position + 1) & 0x1F;
        }
    }

    fn trigger(&mut self) {
        self.active = true;
        if self.length == 0 {
            self.length = 256;
        }
        self.timer = self.period();
        self.position = 0;
        if !self.dac_enabled {
            self.active = false;
        }
    }

    fn clock_length(&mut self) {
        if self.length_enable && self.length > 0 {
            self.length -= 1;
            if self.length == 0 {
                self.active = false;
            }
        }
    }
}

#[derive(Default)]
struct NoiseChannel {
    active: bool,
    dac_enabled: bool,
    length: u16,
    length_enable: bool,
    envelope: Envelope,
    clock_shift: u8,
    divisor: u32,
    width7: bool,
    lfsr: u16,
    timer: u32,
    output: u8,
}

impl NoiseChannel {
    fn new() -> Self {
        Self {
            divisor: NOISE_DIVISORS[0],
            ..Default::default()
        }
    }

    fn period(&self) -> u32 {
        self.divisor << self.clock_shift
    }

    fn step(&mut self) {
        if !self.active || !self.dac_enabled || self.timer == 0 {
            return;
        }
        self.timer -= 1;
        if self.timer == 0 {
            self.timer = self.period();
            let shifted_out = self.lfsr & 1;
            let feedback = (self.lfsr ^ (self.lfsr >> 1)) & 1;
            self.lfsr = (self.lfsr >> 1) | (feedback << 14);
            if self.width7 {
                self.lfsr = (self.lfsr & !0x40) | (feedback << 6);
            }
            self.output = (shifted_out ^ 1) as u8;
        }
    }

    fn trigger(&mut self) {
        self.active = true;
        if self.length == 0 {
            self.length = 64;
        }
        self.timer = self.period();
        self.envelope.reset();
        self.lfsr = 0x7FFF;
        if !self.dac_enabled {
            self.active = false;
        }
    }

    fn clock_length(&mut self) {
        if self.length_enable && self.length > 0 {
            self.length -= 1;
            if self.length == 0 {
                self.active = false;
            }
        }
    }
}

struct FrameSequencer {
    step: u8,
    timer: u32,
}

impl FrameSequencer {
    fn new() -> Self {
        Self { step: 0, timer: 0 }
    }

    /// Count one system tick; returns the step to clock when the period
    /// elapses.
    fn tick(&mut self) -> Option<u8> {
        self.timer += 1;
        if self.timer < FRAME_SEQUENCER_PERIOD {
            return None;
        }
        self.timer = 0;
        let s = self.step;
        self.step = (self.step + 1) & 7;
        Some(s)
    }
}

/// Interleaved stereo output handed to the host in fixed-size blocks. When
/// the buffer fills the write position wraps and older samples are
/// overwritten whether or not the host has drained them.
pub struct SampleBuffer {
    buf: [i16; SAMPLE_BUFFER_LEN],
    pos: usize,
    full: bool,
}

impl SampleBuffer {
    fn new() -> Self {
        Self {
            buf: [0; SAMPLE_BUFFER_LEN],
            pos: 0,
            full: false,
        }
    }

    fn push(&mut self, left: i16, right: i16) {
        self.buf[self.pos] = left;
        self.buf[self.pos + 1] = right;
        self.pos += 2;
        if self.pos == SAMPLE_BUFFER_LEN {
            self.pos = 0;
            self.full = true;
        }
    }

    pub fn is_full(&self) -> bool {
        self.full
    }

    pub fn samples(&self) -> &[i16; SAMPLE_BUFFER_LEN] {
        &self.buf
    }

    /// Position of the next sample to be written.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Copy out a completed block and clear the full flag.
    pub fn take(&mut self) -> Option<[i16; SAMPLE_BUFFER_LEN]> {
        if !self.full {
            return None;
        }
        self.full = false;
        Some(self.buf)
    }
}

pub struct Apu {
    ch1: SquareChannel,
    ch2: SquareChannel,
    ch3: WaveChannel,
    ch4: NoiseChannel,
    wave_ram: [u8; 0x10],
    /// Last written value of every register in 0xFF10-0xFF26.
    regs: [u8; 0x17],
    powered: bool,
    left_volume: u8,
    right_volume: u8,
    /// NR51 routing, bit n = channel n+1 right, bit n+4 = channel n+1 left.
    panning: u8,
    sequencer: FrameSequencer,
    sample_timer: u32,
    pub samples: SampleBuffer,
}

impl Apu {
    pub fn new() -> Self {
        Self {
            ch1: SquareChannel::new(true),
            ch2: SquareChannel::new(false),
            ch3: WaveChannel::default(),
            ch4: NoiseChannel::new(),
            wave_ram: [0; 0x10],
            regs: [0; 0x17],
            powered: false,
            left_volume: 0,
            right_volume: 0,
            panning: 0,
            sequencer: FrameSequencer::new(),
            sample_timer: 0,
            samples: SampleBuffer::new(),
        }
    }

    /// Registers as left by the boot ROM: powered, channel 1 still flagged
    /// active with its envelope decayed to silence.
    pub fn apply_boot_state(&mut self) {
        self.write_reg(0xFF26, 0x80);
        for &(addr, val) in POST_BOOT_REGS.iter() {
            self.write_reg(addr, val);
        }
        // Trigger bits are write-only; restore the mirror as software sees it.
        self.regs[0x04] = 0xBF;
        self.regs[0x09] = 0xBF;
        self.regs[0x0E] = 0xBF;
        self.regs[0x13] = 0xBF;
        self.ch1.active = true;
        self.ch1.timer = self.ch1.period();
        self.ch1.envelope.volume = 0;
        self.ch1.envelope.running = false;
    }

    fn read_mask(addr: u16) -> u8 {
        match addr {
            0xFF10 => 0x80,
            0xFF11 => 0x3F,
            0xFF12 => 0x00,
            0xFF13 => 0xFF,
            0xFF14 => 0xBF,
            0xFF16 => 0x3F,
            0xFF17 => 0x00,
            0xFF18 => 0xFF,
            0xFF19 => 0xBF,
            0xFF1A => 0x7F,
            0xFF1B => 0xFF,
            0xFF1C => 0x9F,
            0xFF1D => 0xFF,
            0xFF1E => 0xBF,
            0xFF20 => 0xFF,
            0xFF21 => 0x00,
            0xFF22 => 0x00,
            0xFF23 => 0xBF,
            0xFF24 => 0x00,
            0xFF25 => 0x00,
            0xFF26 => 0x70,
            0xFF30..=0xFF3F => 0x00,
            _ => 0xFF,
        }
    }

    pub fn read_reg(&self, addr: u16) -> u8 {
        match addr {
            0xFF26 => {
                let mut val = Apu::read_mask(addr);
                if self.powered {
                    val |= 0x80;
                }
                for (i, active) in self.channels_active().iter().enumerate() {
                    if *active {
                        val |= 1 << i;
                    }
                }
                val
            }
            0xFF30..=0xFF3F => self.wave_ram[(addr - 0xFF30) as usize],
            0xFF10..=0xFF25 => self.regs[(addr - 0xFF10) as usize] | Apu::read_mask(addr),
            _ => 0xFF,
        }
    }

    pub fn write_reg(&mut self, addr: u16, val: u8) {
        if (0xFF30..=0xFF3F).contains(&addr) {
            self.wave_ram[(addr - 0xFF30) as usize] = val;
            return;
        }
        if addr == 0xFF26 {
            self.write_power(val);
            return;
        }
        if !self.powered || !(0xFF10..=0xFF25).contains(&addr) {
            return;
        }

        self.regs[(addr - 0xFF10) as usize] = val;
        match addr {
            0xFF10 => {
                if let Some(s) = self.ch1.sweep.as_mut() {
                    s.set_params(val);
                }
            }
            0xFF11 => {
                self.ch1.duty = val >> 6;
                self.ch1.length = 64 - (val & 0x3F) as u16;
            }
            0xFF12 => {
                self.ch1.envelope.set_params(val);
                self.ch1.dac_enabled = val & 0xF8 != 0;
                if !self.ch1.dac_enabled {
                    self.ch1.active = false;
                }
            }
            0xFF13 => self.ch1.frequency = (self.ch1.frequency & 0x700) | val as u16,
            0xFF14 => {
                self.ch1.frequency = (self.ch1.frequency & 0xFF) | (((val & 0x07) as u16) << 8);
                self.ch1.length_enable = val & 0x40 != 0;
                if val & 0x80 != 0 {
                    self.ch1.trigger();
                    apu_trace!("APU: trigger ch1 freq {:03X}", self.ch1.frequency);
                }
            }
            0xFF16 => {
                self.ch2.duty = val >> 6;
                self.ch2.length = 64 - (val & 0x3F) as u16;
            }
            0xFF17 => {
                self.ch2.envelope.set_params(val);
                self.ch2.dac_enabled = val & 0xF8 != 0;
                if !self.ch2.dac_enabled {
                    self.ch2.active = false;
                }
            }
            0xFF18 => self.ch2.frequency = (self.ch2.frequency & 0x700) | val as u16,
            0xFF19 => {
                self.ch2.frequency = (self.ch2.frequency & 0xFF) | (((val & 0x07) as u16) << 8);
                self.ch2.length_enable = val & 0x40 != 0;
                if val & 0x80 != 0 {
                    self.ch2.trigger();
                    apu_trace!("APU: trigger ch2 freq {:03X}", self.ch2.frequency);
                }
            }
            0xFF1A => {
                self.ch3.dac_enabled = val & 0x80 != 0;
                if !self.ch3.dac_enabled {
                    self.ch3.active = false;
                }
            }
            0xFF1B => self.ch3.length = 256 - val as u16,
            0xFF1C => self.ch3.volume_code = (val >> 5) & 0x03,
            0xFF1D => self.ch3.frequency = (self.ch3.frequency & 0x700) | val as u16,
            0xFF1E => {
                self.ch3.frequency = (self.ch3.frequency & 0xFF) | (((val & 0x07) as u16) << 8);
                self.ch3.length_enable = val & 0x40 != 0;
                if val & 0x80 != 0 {
                    self.ch3.trigger();
                    apu_trace!("APU: trigger ch3 freq {:03X}", self.ch3.frequency);
                }
            }
            0xFF20 => self.ch4.length = 64 - (val & 0x3F) as u16,
            0xFF21 => {
                self.ch4.envelope.set_params(val);
                self.ch4.dac_enabled = val & 0xF8 != 0;
                if !self.ch4.dac_enabled {
                    self.ch4.active = false;
                }
            }
            0xFF22 => {
                self.ch4.clock_shift = val >> 4;
                self.ch4.width7 = val & 0x08 != 0;
                self.ch4.divisor = NOISE_DIVISORS[(val & 0x07) as usize];
            }
            0xFF23 => {
                self.ch4.length_enable = val & 0x40 != 0;
                if val & 0x80 != 0 {
                    self.ch4.trigger();
                    apu_trace!("APU: trigger ch4 period {}", self.ch4.period());
                }
            }
            0xFF24 => {
                self.left_volume = (val >> 4) & 0x07;
                self.right_volume = val & 0x07;
            }
            0xFF25 => self.panning = val,
            _ => {}
        }
    }

    fn write_power(&mut self, val: u8) {
        let on = val & 0x80 != 0;
        if self.powered && !on {
            self.power_off();
        } else if !self.powered && on {
            self.sequencer = FrameSequencer::new();
            self.sample_timer = 0;
        }
        self.powered = on;
    }

    /// Clear every register except wave RAM and silence all channels.
    fn power_off(&mut self) {
        self.ch1 = SquareChannel::new(true);
        self.ch2 = SquareChannel::new(false);
        self.ch3 = WaveChannel::default();
        self.ch4 = NoiseChannel::new();
        self.regs.fill(0);
        self.left_volume = 0;
        self.right_volume = 0;
        self.panning = 0;
        apu_trace!("APU: power off");
    }

    fn clock_frame_sequencer(&mut self, step: u8) {
        if matches!(step, 0 | 2 | 4 | 6) {
            self.ch1.clock_length();
            self.ch2.clock_length();
            self.ch3.clock_length();
            self.ch4.clock_length();
        }
        if (step == 2 || step == 6)
            && let Some(freq) = self.ch1.clock_sweep()
        {
            self.regs[0x03] = freq as u8;
            self.regs[0x04] = (self.regs[0x04] & 0xF8) | ((freq >> 8) as u8 & 0x07);
        }
        if step == 7 {
            self.ch1.envelope.clock();
            self.ch2.envelope.clock();
            self.ch4.envelope.clock();
        }
    }

    /// Advance one system tick.
    pub fn tick(&mut self) {
        if !self.powered {
            return;
        }
        self.ch1.step();
        self.ch2.step();
        self.ch3.step(&self.wave_ram);
        self.ch4.step();

        if let Some(step) = self.sequencer.tick() {
            self.clock_frame_sequencer(step);
        }

        self.sample_timer += 1;
        if self.sample_timer == SAMPLE_PERIOD {
            self.sample_timer = 0;
            let (left, right) = self.mix_output();
            self.samples.push(left, right);
        }
    }

    fn dac_output(input: u8, dac_enabled: bool, active: bool) -> f32 {
        if dac_enabled && active {
            input as f32 / 7.5 - 1.0
        } else {
            0.0
        }
    }

    fn channel_amplitudes(&self) -> [f32; 4] {
        [
            Self::dac_output(
                self.ch1.output * self.ch1.envelope.volume,
                self.ch1.dac_enabled,
                self.ch1.active,
            ),
            Self::dac_output(
                self.ch2.output * self.ch2.envelope.volume,
                self.ch2.dac_enabled,
                self.ch2.active,
            ),
            Self::dac_output(self.ch3.output, self.ch3.dac_enabled, self.ch3.active),
            Self::dac_output(
                self.ch4.output * self.ch4.envelope.volume,
                self.ch4.dac_enabled,
                self.ch4.active,
            ),
        ]
    }

    fn mix_output(&self) -> (i16, i16) {
        let amps = self.channel_amplitudes();
        let mut left = 0.0f32;
        let mut right = 0.0f32;
        for (i, amp) in amps.iter().enumerate() {
            if self.panning & (0x10 << i) != 0 {
                left += amp;
            }
            if self.panning & (0x01 << i) != 0 {
                right += amp;
            }
        }
        left = left / 4.0 * self.left_volume as f32 / 7.0;
        right = right / 4.0 * self.right_volume as f32 / 7.0;
        ((left * 32767.0) as i16, (right * 32767.0) as i16)
    }

    pub fn powered(&self) -> bool {
        self.powered
    }

    /// Active flags for channels 1-4, as reported in NR52.
    pub fn channels_active(&self) -> [bool; 4] {
        [
            self.ch1.active,
            self.ch2.active,
            self.ch3.active,
            self.ch4.active,
        ]
    }

    pub fn sequencer_step(&self) -> u8 {
        self.sequencer.step
    }

    pub fn ch1_frequency(&self) -> u16 {
        self.ch1.frequency
    }

    pub fn ch1_sweep_shadow(&self) -> u16 {
        self.ch1.sweep.as_ref().map(|s| s.shadow).unwrap_or(0)
    }

    pub fn ch1_length(&self) -> u16 {
        self.ch1.length
    }

    pub fn ch1_volume(&self) -> u8 {
        self.ch1.envelope.volume
    }

    pub fn ch2_volume(&self) -> u8 {
        self.ch2.envelope.volume
    }

    pub fn ch3_length(&self) -> u16 {
        self.ch3.length
    }

    pub fn ch3_position(&self) -> u8 {
        self.ch3.position
    }

    pub fn ch4_lfsr(&self) -> u16 {
        self.ch4.lfsr
    }

    pub fn ch4_volume(&self) -> u8 {
        self.ch4.envelope.volume
    }
}

impl Default for Apu {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_stops_at_bounds() {
        let mut env = Envelope::default();
        env.set_params(0xE9); // volume 14, add, period 1
        env.reset();
        env.clock();
        assert_eq!(env.volume, 15);
        env.clock();
        assert_eq!(env.volume, 15, "no wrap past 15");
        assert!(!env.running);
    }

    #[test]
    fn envelope_period_zero_is_static() {
        let mut env = Envelope::default();
        env.set_params(0x50);
        env.reset();
        for _ in 0..16 {
            env.clock();
        }
        assert_eq!(env.volume, 5);
    }

    #[test]
    fn lfsr_feedback_sets_bit_14_and_6() {
        let mut ch = NoiseChannel {
            active: true,
            dac_enabled: true,
            divisor: 8,
            lfsr: 0x0001,
            timer: 1,
            width7: true,
            ..Default::default()
        };
        ch.step();
        // bit0 ^ bit1 = 1 feeds bits 14 and 6; the shifted-out 1 yields 0.
        assert_eq!(ch.lfsr, 0x4040);
        assert_eq!(ch.output, 0);
        assert_eq!(ch.timer, 8);
    }

    #[test]
    fn sample_buffer_wraps_when_full() {
        let mut buf = SampleBuffer::new();
        for i in 0..(SAMPLE_BUFFER_LEN / 2) {
            buf.push(i as i16, -(i as i16));
        }
        assert!(buf.is_full());
        assert_eq!(buf.position(), 0);
        buf.push(7, 7);
        assert_eq!(buf.samples()[0], 7, "overwrites from the start");
        let block = buf.take().expect("full block");
        assert_eq!(block[3], -1);
        assert!(!buf.is_full());
        assert!(buf.take().is_none());
    }
}
