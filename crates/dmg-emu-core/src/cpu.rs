use log::warn;

use crate::{interrupt, mmu::Mmu};

#[cfg(feature = "cpu-trace")]
macro_rules! cpu_trace {
    ($($arg:tt)*) => {
        log::trace!($($arg)*);
    };
}
#[cfg(not(feature = "cpu-trace"))]
macro_rules! cpu_trace {
    ($($arg:tt)*) => {};
}

// CPU flag bits as documented in gbdev.io/pandocs/The_CPU_Flags.html
const FLAG_Z: u8 = 0x80; // Zero
const FLAG_N: u8 = 0x40; // Subtract
const FLAG_H: u8 = 0x20; // Half Carry
const FLAG_C: u8 = 0x10; // Carry

// Post-boot CPU state from gbdev.io/pandocs/Power_Up_State.html
const BOOT_PC: u16 = 0x0100;
const BOOT_SP: u16 = 0xFFFE;
const BOOT_A: u8 = 0x01;
const BOOT_F: u8 = 0xB0;
const BOOT_B: u8 = 0x00;
const BOOT_C: u8 = 0x13;
const BOOT_D: u8 = 0x00;
const BOOT_E: u8 = 0xD8;
const BOOT_H: u8 = 0x01;
const BOOT_L: u8 = 0x4D;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuMode {
    Normal,
    Halted,
    Stopped,
    /// HALT ran with IME clear and an interrupt pending: the next opcode
    /// byte is read without advancing PC.
    HaltBug,
}

pub struct Cpu {
    pub a: u8,
    f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub pc: u16,
    pub sp: u16,
    /// Machine cycles executed.
    pub cycles: u64,
    pub ime: bool,
    /// Set by EI; IME turns on after the following instruction.
    ime_delay: bool,
    pub mode: CpuMode,
}

impl Cpu {
    /// CPU with the register values the DMG boot ROM hands over.
    pub fn new() -> Self {
        Self {
            a: BOOT_A,
            f: BOOT_F,
            b: BOOT_B,
            c: BOOT_C,
            d: BOOT_D,
            e: BOOT_E,
            h: BOOT_H,
            l: BOOT_L,
            pc: BOOT_PC,
            sp: BOOT_SP,
            cycles: 0,
            ime: false,
            ime_delay: false,
            mode: CpuMode::Normal,
        }
    }

    pub fn f(&self) -> u8 {
        self.f
    }

    /// The low nibble of F does not exist in hardware and always reads 0.
    pub fn set_f(&mut self, val: u8) {
        self.f = val & 0xF0;
    }

    pub fn get_af(&self) -> u16 {
        ((self.a as u16) << 8) | self.f as u16
    }

    fn set_af(&mut self, val: u16) {
        self.a = (val >> 8) as u8;
        self.set_f(val as u8);
    }

    pub fn get_bc(&self) -> u16 {
        ((self.b as u16) << 8) | self.c as u16
    }

    fn set_bc(&mut self, val: u16) {
        self.b = (val >> 8) as u8;
        self.c = val as u8;
    }

    pub fn get_de(&self) -> u16 {
        ((self.d as u16) << 8) | self.e as u16
    }

    fn set_de(&mut self, val: u16) {
        self.d = (val >> 8) as u8;
        self.e = val as u8;
    }

    pub fn get_hl(&self) -> u16 {
        ((self.h as u16) << 8) | self.l as u16
    }

    fn set_hl(&mut self, val: u16) {
        self.h = (val >> 8) as u8;
        self.l = val as u8;
    }

    fn flag(&self, mask: u8) -> bool {
        self.f & mask != 0
    }

    /// 16-bit register by opcode bits 4-5: BC, DE, HL, SP.
    fn get_rr(&self, index: u8) -> u16 {
        match index & 3 {
            0 => self.get_bc(),
            1 => self.get_de(),
            2 => self.get_hl(),
            _ => self.sp,
        }
    }

    fn set_rr(&mut self, index: u8, val: u16) {
        match index & 3 {
            0 => self.set_bc(val),
            1 => self.set_de(val),
            2 => self.set_hl(val),
            _ => self.sp = val,
        }
    }

    fn fetch8(&mut self, mmu: &mut Mmu) -> u8 {
        let val = mmu.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        val
    }

    fn fetch16(&mut self, mmu: &mut Mmu) -> u16 {
        let lo = self.fetch8(mmu) as u16;
        let hi = self.fetch8(mmu) as u16;
        (hi << 8) | lo
    }

    fn push_stack(&mut self, mmu: &mut Mmu, val: u16) {
        self.sp = self.sp.wrapping_sub(1);
        mmu.write(self.sp, (val >> 8) as u8);
        self.sp = self.sp.wrapping_sub(1);
        mmu.write(self.sp, val as u8);
    }

    fn pop_stack(&mut self, mmu: &mut Mmu) -> u16 {
        let lo = mmu.read(self.sp) as u16;
        self.sp = self.sp.wrapping_add(1);
        let hi = mmu.read(self.sp) as u16;
        self.sp = self.sp.wrapping_add(1);
        (hi << 8) | lo
    }

    /// 8-bit operand by index: B C D E H L (HL) A.
    fn read_reg(&mut self, mmu: &mut Mmu, index: u8) -> u8 {
        match index & 7 {
            0 => self.b,
            1 => self.c,
            2 => self.d,
            3 => self.e,
            4 => self.h,
            5 => self.l,
            6 => mmu.read(self.get_hl()),
            _ => self.a,
        }
    }

    fn write_reg(&mut self, mmu: &mut Mmu, index: u8, val: u8) {
        match index & 7 {
            0 => self.b = val,
            1 => self.c = val,
            2 => self.d = val,
            3 => self.e = val,
            4 => self.h = val,
            5 => self.l = val,
            6 => mmu.write(self.get_hl(), val),
            _ => self.a = val,
        }
    }

    /// Branch condition by opcode bits 3-4: NZ, Z, NC, C.
    fn condition(&self, cc: u8) -> bool {
        match cc & 3 {
            0 => !self.flag(FLAG_Z),
            1 => self.flag(FLAG_Z),
            2 => !self.flag(FLAG_C),
            _ => self.flag(FLAG_C),
        }
    }

    fn add8(&mut self, val: u8, carry_in: bool) -> u8 {
        let a = self.a as u16;
        let b = val as u16;
        let res = a + b + carry_in as u16;
        let carries = a ^ b ^ res;
        self.f = if res as u8 == 0 { FLAG_Z } else { 0 }
            | if carries & 0x010 != 0 { FLAG_H } else { 0 }
            | if carries & 0x100 != 0 { FLAG_C } else { 0 };
        res as u8
    }

    /// A - val - borrow, computed as A + !val + 1 - borrow with the carry
    /// bits inverted.
    fn sub8(&mut self, val: u8, borrow: bool) -> u8 {
        let a = self.a as u16;
        let b = (!val) as u16;
        let res = a + b + (!borrow) as u16;
        let carries = a ^ b ^ res;
        self.f = FLAG_N
            | if res as u8 == 0 { FLAG_Z } else { 0 }
            | if carries & 0x010 == 0 { FLAG_H } else { 0 }
            | if carries & 0x100 == 0 { FLAG_C } else { 0 };
        res as u8
    }

    /// ALU operation by opcode bits 3-5: ADD ADC SUB SBC AND XOR OR CP.
    fn alu(&mut self, op: u8, val: u8) {
        match op & 7 {
            0 => self.a = self.add8(val, false),
            1 => self.a = self.add8(val, self.flag(FLAG_C)),
            2 => self.a = self.sub8(val, false),
            3 => self.a = self.sub8(val, self.flag(FLAG_C)),
            4 => {
                self.a &= val;
                self.f = if self.a == 0 { FLAG_Z } else { 0 } | FLAG_H;
            }
            5 => {
                self.a ^= val;
                self.f = if self.a == 0 { FLAG_Z } else { 0 };
            }
            6 => {
                self.a |= val;
                self.f = if self.a == 0 { FLAG_Z } else { 0 };
            }
            _ => {
                self.sub8(val, false);
            }
        }
    }

    fn inc8(&mut self, val: u8) -> u8 {
        let res = val.wrapping_add(1);
        self.f = (self.f & FLAG_C)
            | if res == 0 { FLAG_Z } else { 0 }
            | if val & 0x0F == 0x0F { FLAG_H } else { 0 };
        res
    }

    fn dec8(&mut self, val: u8) -> u8 {
        let res = val.wrapping_sub(1);
        self.f = (self.f & FLAG_C)
            | FLAG_N
            | if res == 0 { FLAG_Z } else { 0 }
            | if val & 0x0F == 0 { FLAG_H } else { 0 };
        res
    }

    fn add_hl(&mut self, val: u16) {
        let hl = self.get_hl() as u32;
        let res = hl + val as u32;
        let carries = hl ^ val as u32 ^ res;
        self.f = (self.f & FLAG_Z)
            | if carries & 0x1000 != 0 { FLAG_H } else { 0 }
            | if carries & 0x10000 != 0 { FLAG_C } else { 0 };
        self.set_hl(res as u16);
    }

    /// SP plus a signed offset; H and C come from the unsigned low-byte add.
    fn sp_offset(&mut self, offset: u8) -> u16 {
        let sp = self.sp;
        let rhs = offset as i8 as i16 as u16;
        let res = sp.wrapping_add(rhs);
        let carries = sp ^ rhs ^ res;
        self.f = if carries & 0x010 != 0 { FLAG_H } else { 0 }
            | if carries & 0x100 != 0 { FLAG_C } else { 0 };
        res
    }

    fn daa(&mut self) {
        let mut correction = 0u8;
        let mut carry = false;
        if self.flag(FLAG_H) || (!self.flag(FLAG_N) && (self.a & 0x0F) > 9) {
            correction |= 0x06;
        }
        if self.flag(FLAG_C) || (!self.flag(FLAG_N) && self.a > 0x99) {
            correction |= 0x60;
            carry = true;
        }
        self.a = if self.flag(FLAG_N) {
            self.a.wrapping_sub(correction)
        } else {
            self.a.wrapping_add(correction)
        };
        self.f = if self.a == 0 { FLAG_Z } else { 0 }
            | (self.f & FLAG_N)
            | if carry { FLAG_C } else { 0 };
    }

    fn handle_cb(&mut self, opcode: u8, mmu: &mut Mmu) {
        let r = opcode & 0x07;
        let bit = (opcode >> 3) & 0x07;
        let val = self.read_reg(mmu, r);

        let res = match opcode {
            0x00..=0x3F => {
                let carry_in = self.flag(FLAG_C) as u8;
                let (res, carry_out) = match bit {
                    0 => (val.rotate_left(1), val & 0x80 != 0), // RLC
                    1 => (val.rotate_right(1), val & 0x01 != 0), // RRC
                    2 => ((val << 1) | carry_in, val & 0x80 != 0), // RL
                    3 => ((val >> 1) | (carry_in << 7), val & 0x01 != 0), // RR
                    4 => (val << 1, val & 0x80 != 0),            // SLA
                    5 => ((val >> 1) | (val & 0x80), val & 0x01 != 0), // SRA
                    6 => (val.rotate_left(4), false),            // SWAP
                    _ => (val >> 1, val & 0x01 != 0),            // SRL
                };
                self.f = if res == 0 { FLAG_Z } else { 0 } | if carry_out { FLAG_C } else { 0 };
                res
            }
            0x40..=0x7F => {
                self.f = (self.f & FLAG_C)
                    | FLAG_H
                    | if val & (1 << bit) == 0 { FLAG_Z } else { 0 };
                // BIT does not write back.
                return;
            }
            0x80..=0xBF => val & !(1 << bit),
            0xC0..=0xFF => val | (1 << bit),
        };
        self.write_reg(mmu, r, res);
    }

    /// Dispatch the highest-priority pending interrupt if IME allows it.
    fn handle_interrupts(&mut self, mmu: &mut Mmu) {
        if !self.ime {
            return;
        }
        let Some((bit, vector)) = mmu.ints.highest_pending() else {
            return;
        };
        cpu_trace!("CPU: interrupt {:02X} -> {:04X}", bit, vector);
        self.mode = CpuMode::Normal;
        self.ime = false;
        self.ime_delay = false;
        mmu.ints.acknowledge(bit);
        mmu.wait();
        mmu.wait();
        self.push_stack(mmu, self.pc);
        mmu.wait();
        self.pc = vector;
    }

    /// Run one instruction, or one idle machine cycle while halted or
    /// stopped, followed by any interrupt dispatch. Returns the machine
    /// cycles consumed.
    pub fn step(&mut self, mmu: &mut Mmu) -> u32 {
        let start = mmu.cycles;

        match self.mode {
            CpuMode::Stopped => {
                mmu.wait();
                if mmu.ints.read(interrupt::IF_ADDR) & interrupt::JOYPAD != 0 {
                    self.mode = CpuMode::Normal;
                }
            }
            CpuMode::Halted => {
                mmu.wait();
                if mmu.ints.pending() != 0 {
                    self.mode = CpuMode::Normal;
                }
            }
            CpuMode::Normal | CpuMode::HaltBug => {
                cpu_trace!("{}", self.debug_state());
                let enable_after = self.ime_delay;
                let opcode = if self.mode == CpuMode::HaltBug {
                    self.mode = CpuMode::Normal;
                    mmu.read(self.pc)
                } else {
                    self.fetch8(mmu)
                };
                self.execute(opcode, mmu);
                if enable_after && self.ime_delay {
                    self.ime = true;
                    self.ime_delay = false;
                }
            }
        }

        self.handle_interrupts(mmu);

        let elapsed = (mmu.cycles - start) as u32;
        self.cycles += elapsed as u64;
        elapsed
    }

    fn execute(&mut self, opcode: u8, mmu: &mut Mmu) {
        match opcode {
            0x00 => {}
            0x01 | 0x11 | 0x21 | 0x31 => {
                let val = self.fetch16(mmu);
                self.set_rr(opcode >> 4, val);
            }
            0x02 => mmu.write(self.get_bc(), self.a),
            0x12 => mmu.write(self.get_de(), self.a),
            0x22 => {
                let hl = self.get_hl();
                mmu.write(hl, self.a);
                self.set_hl(hl.wrapping_add(1));
            }
            0x32 => {
                let hl = self.get_hl();
                mmu.write(hl, self.a);
                self.set_hl(hl.wrapping_sub(1));
            }
            0x0A => self.a = mmu.read(self.get_bc()),
            0x1A => self.a = mmu.read(self.get_de()),
            0x2A => {
                let hl = self.get_hl();
                self.a = mmu.read(hl);
                self.set_hl(hl.wrapping_add(1));
            }
            0x3A => {
                let hl = self.get_hl();
                self.a = mmu.read(hl);
                self.set_hl(hl.wrapping_sub(1));
            }
            0x03 | 0x13 | 0x23 | 0x33 => {
                let idx = opcode >> 4;
                self.set_rr(idx, self.get_rr(idx).wrapping_add(1));
                mmu.wait();
            }
            0x0B | 0x1B | 0x2B | 0x3B => {
                let idx = opcode >> 4;
                self.set_rr(idx, self.get_rr(idx).wrapping_sub(1));
                mmu.wait();
            }
            0x09 | 0x19 | 0x29 | 0x39 => {
                self.add_hl(self.get_rr(opcode >> 4));
                mmu.wait();
            }
            op if op & 0xC7 == 0x04 => {
                let r = (op >> 3) & 7;
                let val = self.read_reg(mmu, r);
                let res = self.inc8(val);
                self.write_reg(mmu, r, res);
            }
            op if op & 0xC7 == 0x05 => {
                let r = (op >> 3) & 7;
                let val = self.read_reg(mmu, r);
                let res = self.dec8(val);
                self.write_reg(mmu, r, res);
            }
            op if op & 0xC7 == 0x06 => {
                let val = self.fetch8(mmu);
                self.write_reg(mmu, (op >> 3) & 7, val);
            }
            0x07 => {
                let carry = self.a & 0x80 != 0;
                self.a = self.a.rotate_left(1);
                self.f = if carry { FLAG_C } else { 0 };
            }
            0x0F => {
                let carry = self.a & 0x01 != 0;
                self.a = self.a.rotate_right(1);
                self.f = if carry { FLAG_C } else { 0 };
            }
            0x17 => {
                let carry = self.a & 0x80 != 0;
                self.a = (self.a << 1) | self.flag(FLAG_C) as u8;
                self.f = if carry { FLAG_C } else { 0 };
            }
            0x1F => {
                let carry = self.a & 0x01 != 0;
                self.a = (self.a >> 1) | ((self.flag(FLAG_C) as u8) << 7);
                self.f = if carry { FLAG_C } else { 0 };
            }
            0x08 => {
                let addr = self.fetch16(mmu);
                mmu.write(addr, self.sp as u8);
                mmu.write(addr.wrapping_add(1), (self.sp >> 8) as u8);
            }
            0x10 => {
                // STOP is two bytes; low-power mode is left on a joypad request.
                self.fetch8(mmu);
                self.mode = CpuMode::Stopped;
            }
            0x18 => {
                let offset = self.fetch8(mmu) as i8;
                self.pc = self.pc.wrapping_add(offset as u16);
                mmu.wait();
            }
            0x20 | 0x28 | 0x30 | 0x38 => {
                let offset = self.fetch8(mmu) as i8;
                if self.condition(opcode >> 3) {
                    self.pc = self.pc.wrapping_add(offset as u16);
                    mmu.wait();
                }
            }
            0x27 => self.daa(),
            0x2F => {
                self.a = !self.a;
                self.f = (self.f & (FLAG_Z | FLAG_C)) | FLAG_N | FLAG_H;
            }
            0x37 => self.f = (self.f & FLAG_Z) | FLAG_C,
            0x3F => {
                self.f = (self.f & FLAG_Z) | if self.flag(FLAG_C) { 0 } else { FLAG_C };
            }
            0x76 => {
                if !self.ime && mmu.ints.pending() != 0 {
                    self.mode = CpuMode::HaltBug;
                } else {
                    self.mode = CpuMode::Halted;
                }
            }
            0x40..=0x7F => {
                let val = self.read_reg(mmu, opcode);
                self.write_reg(mmu, opcode >> 3, val);
            }
            0x80..=0xBF => {
                let val = self.read_reg(mmu, opcode);
                self.alu(opcode >> 3, val);
            }
            op if op & 0xC7 == 0xC6 => {
                let val = self.fetch8(mmu);
                self.alu(op >> 3, val);
            }
            0xC0 | 0xC8 | 0xD0 | 0xD8 => {
                mmu.wait();
                if self.condition(opcode >> 3) {
                    self.pc = self.pop_stack(mmu);
                    mmu.wait();
                }
            }
            0xC9 => {
                self.pc = self.pop_stack(mmu);
                mmu.wait();
            }
            0xD9 => {
                self.pc = self.pop_stack(mmu);
                mmu.wait();
                self.ime = true;
            }
            0xC1 | 0xD1 | 0xE1 => {
                let val = self.pop_stack(mmu);
                self.set_rr(opcode >> 4, val);
            }
            0xF1 => {
                let val = self.pop_stack(mmu);
                self.set_af(val);
            }
            0xC5 | 0xD5 | 0xE5 => {
                mmu.wait();
                self.push_stack(mmu, self.get_rr(opcode >> 4));
            }
            0xF5 => {
                mmu.wait();
                self.push_stack(mmu, self.get_af());
            }
            0xC2 | 0xCA | 0xD2 | 0xDA => {
                let addr = self.fetch16(mmu);
                if self.condition(opcode >> 3) {
                    self.pc = addr;
                    mmu.wait();
                }
            }
            0xC3 => {
                self.pc = self.fetch16(mmu);
                mmu.wait();
            }
            0xE9 => self.pc = self.get_hl(),
            0xC4 | 0xCC | 0xD4 | 0xDC => {
                let addr = self.fetch16(mmu);
                if self.condition(opcode >> 3) {
                    mmu.wait();
                    self.push_stack(mmu, self.pc);
                    self.pc = addr;
                }
            }
            0xCD => {
                let addr = self.fetch16(mmu);
                mmu.wait();
                self.push_stack(mmu, self.pc);
                self.pc = addr;
            }
            op if op & 0xC7 == 0xC7 => {
                mmu.wait();
                self.push_stack(mmu, self.pc);
                self.pc = (op & 0x38) as u16;
            }
            0xCB => {
                let cb = self.fetch8(mmu);
                self.handle_cb(cb, mmu);
            }
            0xE0 => {
                let offset = self.fetch8(mmu);
                mmu.write(0xFF00 | offset as u16, self.a);
            }
            0xF0 => {
                let offset = self.fetch8(mmu);
                self.a = mmu.read(0xFF00 | offset as u16);
            }
            0xE2 => mmu.write(0xFF00 | self.c as u16, self.a),
            0xF2 => self.a = mmu.read(0xFF00 | self.c as u16),
            0xEA => {
                let addr = self.fetch16(mmu);
                mmu.write(addr, self.a);
            }
            0xFA => {
                let addr = self.fetch16(mmu);
                self.a = mmu.read(addr);
            }
            0xE8 => {
                let offset = self.fetch8(mmu);
                self.sp = self.sp_offset(offset);
                mmu.wait();
                mmu.wait();
            }
            0xF8 => {
                let offset = self.fetch8(mmu);
                let val = self.sp_offset(offset);
                self.set_hl(val);
                mmu.wait();
            }
            0xF9 => {
                self.sp = self.get_hl();
                mmu.wait();
            }
            0xF3 => {
                self.ime = false;
                self.ime_delay = false;
            }
            0xFB => self.ime_delay = true,
            _ => {
                warn!(
                    "Unknown opcode {:02X} at {:04X}",
                    opcode,
                    self.pc.wrapping_sub(1)
                );
            }
        }
    }

    /// Formatted CPU state string for debugging.
    pub fn debug_state(&self) -> String {
        format!(
            "AF:{:04X} BC:{:04X} DE:{:04X} HL:{:04X} PC:{:04X} SP:{:04X} CY:{}",
            self.get_af(),
            self.get_bc(),
            self.get_de(),
            self.get_hl(),
            self.pc,
            self.sp,
            self.cycles
        )
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}
