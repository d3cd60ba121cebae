//! Cycle-accurate Game Boy (DMG) emulation core.
//!
//! This crate contains the platform-agnostic emulator logic (CPU/MMU/PPU/APU/etc).
//! Frontends drive the core through the [`gameboy`] facade and consume the
//! finished frame and sample buffers it exposes.

/// Audio Processing Unit (APU) emulation.
pub mod apu;

/// Cartridge header parsing, MBC1/MBC3 banking and battery saves.
pub mod cartridge;

/// SM83 CPU core.
pub mod cpu;

/// OAM DMA transfer unit.
pub mod dma;

/// High-level facade that wires the CPU and MMU into a single machine.
pub mod gameboy;

/// Joypad input register and edge-triggered interrupt behavior.
pub mod input;

/// Interrupt enable and request registers.
pub mod interrupt;

/// Memory map and hardware plumbing.
pub mod mmu;

/// Pixel Processing Unit (PPU) emulation.
pub mod ppu;

/// Divider/timer unit.
pub mod timer;
