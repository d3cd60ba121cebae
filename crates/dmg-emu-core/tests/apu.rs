use dmg_emu_core::apu::{Apu, SAMPLE_BUFFER_LEN, SAMPLE_PERIOD};

const SEQUENCER_PERIOD: u32 = 8192;

fn powered_apu() -> Apu {
    let mut apu = Apu::new();
    apu.write_reg(0xFF26, 0x80);
    apu
}

fn tick_n(apu: &mut Apu, ticks: u32) {
    for _ in 0..ticks {
        apu.tick();
    }
}

#[test]
fn read_masks() {
    let mut apu = powered_apu();
    let cases = [
        (0xFF10, 0x80),
        (0xFF11, 0x3F),
        (0xFF12, 0x00),
        (0xFF13, 0xFF),
        (0xFF14, 0xBF),
        (0xFF16, 0x3F),
        (0xFF17, 0x00),
        (0xFF18, 0xFF),
        (0xFF19, 0xBF),
        (0xFF1A, 0x7F),
        (0xFF1B, 0xFF),
        (0xFF1C, 0x9F),
        (0xFF1D, 0xFF),
        (0xFF1E, 0xBF),
        (0xFF20, 0xFF),
        (0xFF21, 0x00),
        (0xFF22, 0x00),
        (0xFF23, 0xBF),
        (0xFF24, 0x00),
        (0xFF25, 0x00),
    ];
    for (addr, mask) in cases {
        apu.write_reg(addr, 0x00);
        assert_eq!(apu.read_reg(addr), mask, "register {addr:04X}");
    }
    assert_eq!(apu.read_reg(0xFF15), 0xFF);
    assert_eq!(apu.read_reg(0xFF1F), 0xFF);
    assert_eq!(apu.read_reg(0xFF27), 0xFF);
}

#[test]
fn register_write_read_fidelity() {
    let mut apu = powered_apu();
    apu.write_reg(0xFF10, 0x07);
    assert_eq!(apu.read_reg(0xFF10), 0x87);
    apu.write_reg(0xFF11, 0x9A);
    assert_eq!(apu.read_reg(0xFF11), 0xBF);
    apu.write_reg(0xFF12, 0x5B);
    assert_eq!(apu.read_reg(0xFF12), 0x5B);
    apu.write_reg(0xFF1C, 0x40);
    assert_eq!(apu.read_reg(0xFF1C), 0xDF);
    apu.write_reg(0xFF24, 0x35);
    assert_eq!(apu.read_reg(0xFF24), 0x35);
}

#[test]
fn nr52_reports_power_and_channels() {
    let mut apu = Apu::new();
    assert_eq!(apu.read_reg(0xFF26), 0x70);
    apu.write_reg(0xFF26, 0x80);
    assert_eq!(apu.read_reg(0xFF26), 0xF0);

    apu.write_reg(0xFF12, 0xF0);
    apu.write_reg(0xFF14, 0x80);
    apu.write_reg(0xFF21, 0xF0);
    apu.write_reg(0xFF23, 0x80);
    assert_eq!(apu.read_reg(0xFF26), 0xF9);
}

#[test]
fn writes_ignored_while_powered_off() {
    let mut apu = Apu::new();
    apu.write_reg(0xFF24, 0x77);
    apu.write_reg(0xFF30, 0x12);
    apu.write_reg(0xFF26, 0x80);
    assert_eq!(apu.read_reg(0xFF24), 0x00);
    assert_eq!(apu.read_reg(0xFF30), 0x12, "wave RAM is always writable");
}

#[test]
fn power_off_clears_registers_and_channels() {
    let mut apu = powered_apu();
    apu.write_reg(0xFF24, 0x77);
    apu.write_reg(0xFF25, 0xFF);
    apu.write_reg(0xFF12, 0xF0);
    apu.write_reg(0xFF14, 0x80);
    apu.write_reg(0xFF3F, 0xCD);
    apu.write_reg(0xFF26, 0x00);

    assert_eq!(apu.read_reg(0xFF26), 0x70);
    assert_eq!(apu.read_reg(0xFF24), 0x00);
    assert_eq!(apu.read_reg(0xFF25), 0x00);
    assert_eq!(apu.read_reg(0xFF12), 0x00);
    assert_eq!(apu.read_reg(0xFF3F), 0xCD);
    assert_eq!(apu.channels_active(), [false; 4]);

    tick_n(&mut apu, SEQUENCER_PERIOD * 2);
    assert_eq!(apu.sequencer_step(), 0, "frozen while powered off");
}

#[test]
fn frame_sequencer_steps_every_8192_ticks() {
    let mut apu = powered_apu();
    assert_eq!(apu.sequencer_step(), 0);
    tick_n(&mut apu, SEQUENCER_PERIOD - 1);
    assert_eq!(apu.sequencer_step(), 0);
    tick_n(&mut apu, 1);
    assert_eq!(apu.sequencer_step(), 1);
    tick_n(&mut apu, SEQUENCER_PERIOD * 7);
    assert_eq!(apu.sequencer_step(), 0, "wraps after eight steps");
}

#[test]
fn trigger_requires_dac() {
    let mut apu = powered_apu();
    apu.write_reg(0xFF12, 0x00);
    apu.write_reg(0xFF14, 0x80);
    assert!(!apu.channels_active()[0]);

    apu.write_reg(0xFF12, 0x08);
    apu.write_reg(0xFF14, 0x80);
    assert!(apu.channels_active()[0], "add mode at volume 0 keeps the DAC on");

    apu.write_reg(0xFF12, 0x00);
    assert!(!apu.channels_active()[0], "turning the DAC off disables the channel");
}

#[test]
fn length_counter_expires_on_sequencer_step() {
    let mut apu = powered_apu();
    apu.write_reg(0xFF11, 0x3F); // length 1
    apu.write_reg(0xFF12, 0xF0);
    apu.write_reg(0xFF14, 0xC0); // trigger, length enabled
    assert_eq!(apu.ch1_length(), 1);
    tick_n(&mut apu, SEQUENCER_PERIOD - 1);
    assert!(apu.channels_active()[0]);
    tick_n(&mut apu, 1);
    assert_eq!(apu.ch1_length(), 0);
    assert!(!apu.channels_active()[0]);
}

#[test]
fn length_counter_waits_for_enable() {
    let mut apu = powered_apu();
    apu.write_reg(0xFF11, 0x3F);
    apu.write_reg(0xFF12, 0xF0);
    apu.write_reg(0xFF14, 0x80); // length disabled
    tick_n(&mut apu, SEQUENCER_PERIOD * 8);
    assert!(apu.channels_active()[0]);
    assert_eq!(apu.ch1_length(), 1);
}

#[test]
fn length_reload_on_trigger() {
    let mut apu = powered_apu();
    apu.write_reg(0xFF12, 0xF0);
    apu.write_reg(0xFF14, 0x80);
    assert_eq!(apu.ch1_length(), 64, "zero length reloads to 64");

    apu.write_reg(0xFF1A, 0x80);
    apu.write_reg(0xFF1B, 0xFF);
    assert_eq!(apu.ch3_length(), 1, "wave length is 256 - L");
    apu.write_reg(0xFF1B, 0x00);
    apu.write_reg(0xFF1E, 0x80);
    assert_eq!(apu.ch3_length(), 256);
    assert_eq!(apu.ch3_position(), 0);
}

#[test]
fn sweep_writes_back_then_overflows() {
    let mut apu = powered_apu();
    apu.write_reg(0xFF10, 0x21); // period 2, add, shift 1
    apu.write_reg(0xFF12, 0xF0);
    apu.write_reg(0xFF13, 0x00);
    apu.write_reg(0xFF14, 0x84); // trigger, frequency 1024
    assert!(apu.channels_active()[0]);
    assert_eq!(apu.ch1_sweep_shadow(), 1024);

    // Sweep clocks on steps 2 and 6; the second one expires the timer.
    tick_n(&mut apu, SEQUENCER_PERIOD * 7 - 1);
    assert_eq!(apu.ch1_frequency(), 1024);
    assert!(apu.channels_active()[0]);

    tick_n(&mut apu, 1);
    assert_eq!(apu.ch1_frequency(), 1536);
    assert_eq!(apu.ch1_sweep_shadow(), 1536);
    assert!(
        !apu.channels_active()[0],
        "1536 + 768 overflows on the follow-up check"
    );
}

#[test]
fn sweep_overflow_on_trigger() {
    let mut apu = powered_apu();
    apu.write_reg(0xFF10, 0x11); // period 1, add, shift 1
    apu.write_reg(0xFF12, 0xF0);
    apu.write_reg(0xFF13, 0x00);
    apu.write_reg(0xFF14, 0x87); // frequency 0x700
    assert!(!apu.channels_active()[0]);
}

#[test]
fn sweep_negate_lowers_frequency() {
    let mut apu = powered_apu();
    apu.write_reg(0xFF10, 0x19); // period 1, subtract, shift 1
    apu.write_reg(0xFF12, 0xF0);
    apu.write_reg(0xFF13, 0x00);
    apu.write_reg(0xFF14, 0x84);
    tick_n(&mut apu, SEQUENCER_PERIOD * 3);
    assert_eq!(apu.ch1_frequency(), 512);
    assert!(apu.channels_active()[0]);
}

#[test]
fn envelope_clocks_on_step_seven() {
    let mut apu = powered_apu();
    apu.write_reg(0xFF12, 0xF1); // volume 15, subtract, period 1
    apu.write_reg(0xFF14, 0x80);
    apu.write_reg(0xFF17, 0x29); // volume 2, add, period 1
    apu.write_reg(0xFF19, 0x80);
    assert_eq!(apu.ch1_volume(), 15);

    tick_n(&mut apu, SEQUENCER_PERIOD * 8 - 1);
    assert_eq!(apu.ch1_volume(), 15);
    tick_n(&mut apu, 1);
    assert_eq!(apu.ch1_volume(), 14);
    assert_eq!(apu.ch2_volume(), 3);
}

#[test]
fn noise_trigger_seeds_lfsr() {
    let mut apu = powered_apu();
    apu.write_reg(0xFF21, 0xF0);
    apu.write_reg(0xFF22, 0x00); // divisor 8, shift 0
    apu.write_reg(0xFF23, 0x80);
    assert_eq!(apu.ch4_lfsr(), 0x7FFF);
    tick_n(&mut apu, 8);
    assert_eq!(apu.ch4_lfsr(), 0x3FFF);
}

#[test]
fn samples_fill_buffer_and_wrap() {
    let mut apu = powered_apu();
    apu.write_reg(0xFF24, 0x77);
    apu.write_reg(0xFF25, 0x22); // ch2 both sides
    apu.write_reg(0xFF16, 0x80);
    apu.write_reg(0xFF17, 0xF0);
    apu.write_reg(0xFF18, 0x00);
    apu.write_reg(0xFF19, 0x87);

    let frames = (SAMPLE_BUFFER_LEN / 2) as u32;
    tick_n(&mut apu, SAMPLE_PERIOD * frames - 1);
    assert!(!apu.samples.is_full());
    tick_n(&mut apu, 1);
    assert!(apu.samples.is_full());
    assert_eq!(apu.samples.position(), 0);

    let block = apu.samples.take().expect("full buffer");
    assert!(block.iter().any(|&s| s != 0));
    for pair in block.chunks(2) {
        assert_eq!(pair[0], pair[1], "equal master volumes");
    }
    assert!(apu.samples.take().is_none());
}

#[test]
fn master_volume_scales_each_side() {
    let mut apu = powered_apu();
    apu.write_reg(0xFF24, 0x70); // left 7, right 0
    apu.write_reg(0xFF25, 0x22);
    apu.write_reg(0xFF17, 0xF0);
    apu.write_reg(0xFF19, 0x87);

    tick_n(&mut apu, SAMPLE_PERIOD * (SAMPLE_BUFFER_LEN / 2) as u32);
    let block = apu.samples.take().expect("full buffer");
    assert!(block.iter().step_by(2).any(|&s| s != 0), "left audible");
    assert!(block.iter().skip(1).step_by(2).all(|&s| s == 0), "right muted");
}

#[test]
fn boot_state_leaves_channel_one_active() {
    let mut apu = Apu::new();
    apu.apply_boot_state();
    assert_eq!(apu.read_reg(0xFF26), 0xF1);
    assert_eq!(apu.read_reg(0xFF10), 0x80);
    assert_eq!(apu.read_reg(0xFF11), 0xBF);
    assert_eq!(apu.read_reg(0xFF12), 0xF3);
    assert_eq!(apu.read_reg(0xFF14), 0xBF);
    assert_eq!(apu.read_reg(0xFF1A), 0x7F);
    assert_eq!(apu.read_reg(0xFF1C), 0x9F);
    assert_eq!(apu.read_reg(0xFF24), 0x77);
    assert_eq!(apu.read_reg(0xFF25), 0xF3);
    assert_eq!(apu.channels_active(), [true, false, false, false]);
}
