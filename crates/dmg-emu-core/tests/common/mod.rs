#![allow(dead_code)]

use dmg_emu_core::{cartridge::Cartridge, gameboy::GameBoy};

pub const ENTRY: usize = 0x0100;

/// A 32 KiB ROM-only image with `program` placed at the entry point.
pub fn rom_with_program(program: &[u8]) -> Vec<u8> {
    let mut rom = vec![0u8; 0x8000];
    rom[ENTRY..ENTRY + program.len()].copy_from_slice(program);
    rom
}

/// A post-boot machine running `program` from 0x0100.
pub fn gb_with_program(program: &[u8]) -> GameBoy {
    let mut gb = GameBoy::new();
    gb.load_cart(Cartridge::load(rom_with_program(program)));
    gb
}

/// Execute `count` instructions, returning the machine cycles each took.
pub fn step_n(gb: &mut GameBoy, count: usize) -> Vec<u32> {
    (0..count).map(|_| gb.step()).collect()
}
