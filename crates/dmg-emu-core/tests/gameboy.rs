mod common;

use common::gb_with_program;
use dmg_emu_core::{
    cpu::CpuMode,
    gameboy::GameBoy,
    input::Button,
    interrupt::{self, IF_ADDR},
    ppu::FRAME_DOTS,
};

// JR -2
const SPIN: [u8; 2] = [0x18, 0xFE];

const FRAME_M_CYCLES: i64 = FRAME_DOTS as i64 / 4;

#[test]
fn run_frame_stops_at_vblank() {
    let mut gb = gb_with_program(&SPIN);
    gb.run_frame();
    assert_eq!(gb.mmu.ppu.frames(), 1);
    assert_eq!(gb.mmu.ppu.ly(), 144);
    assert!(!gb.mmu.ppu.frame_ready(), "flag cleared for the next frame");

    let first = gb.mmu.cycles as i64;
    gb.run_frame();
    assert_eq!(gb.mmu.ppu.frames(), 2);
    let elapsed = gb.mmu.cycles as i64 - first;
    assert!(
        (elapsed - FRAME_M_CYCLES).abs() <= 3,
        "frame took {elapsed} cycles"
    );
}

#[test]
fn run_frame_returns_with_lcd_off() {
    let mut gb = gb_with_program(&[
        0xAF, // XOR A
        0xE0, 0x40, // LDH (0x40),A
        0x18, 0xFE, // JR -2
    ]);
    gb.run_frame();
    assert_eq!(gb.mmu.ppu.frames(), 0);
    assert_eq!(gb.mmu.ppu.ly(), 0);
    assert!(gb.mmu.cycles as i64 > FRAME_M_CYCLES);
}

#[test]
fn samples_available_after_a_frame() {
    let mut gb = gb_with_program(&SPIN);
    assert!(gb.take_samples().is_none());
    gb.run_frame();
    assert!(gb.take_samples().is_some());
    assert!(gb.take_samples().is_none(), "block handed out once");
}

#[test]
fn run_frame_with_drains_blocks() {
    let mut gb = gb_with_program(&SPIN);
    let mut blocks = 0;
    gb.run_frame_with(|_| blocks += 1);
    gb.run_frame_with(|_| blocks += 1);
    // About 34k cycles at 95 dots per stereo pair fills two 512-pair blocks.
    assert_eq!(blocks, 2);
    assert!(gb.take_samples().is_none());
}

#[test]
fn press_reaches_joypad_register() {
    let mut gb = gb_with_program(&SPIN);
    gb.mmu.write_byte(IF_ADDR, 0);
    gb.press(Button::A);
    assert_eq!(gb.mmu.read_byte(IF_ADDR) & interrupt::JOYPAD, interrupt::JOYPAD);

    gb.mmu.write_byte(0xFF00, 0x10);
    assert_eq!(gb.mmu.read_byte(0xFF00), 0xDE);

    gb.release(Button::A);
    assert_eq!(gb.mmu.read_byte(0xFF00), 0xDF);
}

#[test]
fn stop_waits_for_joypad() {
    let mut gb = gb_with_program(&[
        0x10, 0x00, // STOP
        0x3C, // INC A
    ]);
    gb.step();
    assert_eq!(gb.cpu.mode, CpuMode::Stopped);
    for _ in 0..10 {
        assert_eq!(gb.step(), 1);
    }
    assert_eq!(gb.cpu.mode, CpuMode::Stopped);

    gb.press(Button::Start);
    gb.step();
    assert_eq!(gb.cpu.mode, CpuMode::Normal);
    gb.step();
    assert_eq!(gb.cpu.a, 0x02);
}

#[test]
fn reset_keeps_cartridge() {
    let mut gb = gb_with_program(&[
        0x3E, 0x42, // LD A,0x42
        0x18, 0xFE, // JR -2
    ]);
    gb.run_frame();
    gb.reset();

    assert_eq!(gb.cpu.pc, 0x0100);
    assert_eq!(gb.cpu.a, 0x01);
    assert_eq!(gb.mmu.cycles, 0);
    assert!(gb.mmu.cart.is_some());
    assert_eq!(gb.mmu.read_byte(0x0101), 0x42);
}

#[test]
fn default_machine_has_no_cartridge() {
    let mut gb = GameBoy::default();
    assert!(gb.mmu.cart.is_none());
    assert_eq!(gb.mmu.read_byte(0x0100), 0xFF);
    assert_eq!(gb.step(), 4, "open bus executes as RST 38");
    assert_eq!(gb.cpu.pc, 0x0038);
}
