use log::{debug, info, warn};
use std::{
    fs, io,
    path::{Path, PathBuf},
};

const ROM_BANK_SIZE: usize = 0x4000;
const RAM_BANK_SIZE: usize = 0x2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MbcType {
    NoMbc,
    Mbc1,
    Mbc3,
    Unknown(u8),
}

/// Fields read from the cartridge header at 0x0134-0x014F.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub title: String,
    pub cart_type: u8,
    pub rom_size_code: u8,
    pub ram_size_code: u8,
}

impl Header {
    pub fn parse(data: &[u8]) -> Self {
        let byte = |addr: usize| data.get(addr).copied().unwrap_or(0);
        let start = 0x0134.min(data.len());
        let end = 0x0144.min(data.len());
        let mut title = &data[start..end];
        if let Some(pos) = title.iter().position(|&b| b == 0) {
            title = &title[..pos];
        }
        Self {
            title: String::from_utf8_lossy(title).trim().to_string(),
            cart_type: byte(0x0147),
            rom_size_code: byte(0x0148),
            ram_size_code: byte(0x0149),
        }
    }

    pub fn mbc_type(&self) -> MbcType {
        match self.cart_type {
            0x00 | 0x08 | 0x09 => MbcType::NoMbc,
            0x01..=0x03 => MbcType::Mbc1,
            0x0F..=0x13 => MbcType::Mbc3,
            other => MbcType::Unknown(other),
        }
    }

    pub fn rom_size(&self) -> usize {
        (32 * 1024) << self.rom_size_code.min(8)
    }

    pub fn ram_size(&self) -> usize {
        match self.ram_size_code {
            0x02 => 0x2000,
            0x03 => 0x8000,
            0x04 => 0x20000,
            0x05 => 0x10000,
            _ => 0,
        }
    }

    pub fn has_battery(&self) -> bool {
        matches!(self.cart_type, 0x03 | 0x09 | 0x0F | 0x10 | 0x13)
    }
}

#[derive(Debug)]
enum MbcState {
    NoMbc,
    Mbc1 {
        rom_bank: u8,
        ram_bank: u8,
        mode: u8,
        ram_enable: bool,
    },
    Mbc3 {
        rom_bank: u8,
        ram_bank: u8,
        ram_enable: bool,
    },
}

/// ROM image plus bank controller and external RAM.
#[derive(Debug)]
pub struct Cartridge {
    pub rom: Vec<u8>,
    pub ram: Vec<u8>,
    pub mbc: MbcType,
    pub title: String,
    header: Header,
    save_path: Option<PathBuf>,
    mbc_state: MbcState,
}

impl Cartridge {
    pub fn from_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let data = fs::read(&path)?;
        let mut cart = Self::load(data);

        if cart.header.has_battery() {
            let mut save = PathBuf::from(path.as_ref());
            save.set_extension("sav");
            if let Ok(bytes) = fs::read(&save) {
                if bytes.len() != cart.ram.len() {
                    warn!(
                        "Save file {} is {} bytes, expected {}",
                        save.display(),
                        bytes.len(),
                        cart.ram.len()
                    );
                }
                for (d, s) in cart.ram.iter_mut().zip(bytes.iter()) {
                    *d = *s;
                }
            }
            cart.save_path = Some(save);
        }

        info!("Loaded ROM: {} (MBC: {:?})", cart.title, cart.mbc);
        Ok(cart)
    }

    pub fn load(data: Vec<u8>) -> Self {
        let header = Header::parse(&data);
        debug!(
            "Cartridge header: type {:02X}, ROM code {:02X} ({} bytes), RAM code {:02X} ({} bytes)",
            header.cart_type,
            header.rom_size_code,
            header.rom_size(),
            header.ram_size_code,
            header.ram_size()
        );

        let mbc = header.mbc_type();
        let mbc_state = match mbc {
            MbcType::NoMbc => MbcState::NoMbc,
            MbcType::Mbc1 => MbcState::Mbc1 {
                rom_bank: 1,
                ram_bank: 0,
                mode: 0,
                ram_enable: false,
            },
            MbcType::Mbc3 => MbcState::Mbc3 {
                rom_bank: 1,
                ram_bank: 0,
                ram_enable: false,
            },
            MbcType::Unknown(code) => {
                warn!("Unsupported cartridge type {code:02X}, treating as ROM only");
                MbcState::NoMbc
            }
        };

        Self {
            rom: data,
            ram: vec![0; header.ram_size()],
            mbc,
            title: header.title.clone(),
            header,
            save_path: None,
            mbc_state,
        }
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    fn rom_bank_count(&self) -> usize {
        (self.rom.len() / ROM_BANK_SIZE).max(1)
    }

    fn rom_byte(&self, bank: usize, addr: u16) -> u8 {
        let bank = bank % self.rom_bank_count();
        let offset = bank * ROM_BANK_SIZE + (addr as usize & (ROM_BANK_SIZE - 1));
        self.rom.get(offset).copied().unwrap_or(0xFF)
    }

    /// Read from 0x0000-0x7FFF.
    pub fn read_rom(&self, addr: u16) -> u8 {
        let high = addr >= 0x4000;
        match &self.mbc_state {
            MbcState::NoMbc => self.rom.get(addr as usize).copied().unwrap_or(0xFF),
            MbcState::Mbc1 {
                rom_bank,
                ram_bank,
                mode,
                ..
            } => {
                let upper = ((*ram_bank & 0x03) as usize) << 5;
                let bank = match (high, *mode) {
                    (false, 0) => 0,
                    (false, _) => upper,
                    (true, _) => upper | (*rom_bank & 0x1F) as usize,
                };
                self.rom_byte(bank, addr)
            }
            MbcState::Mbc3 { rom_bank, .. } => {
                let bank = if high { *rom_bank as usize } else { 0 };
                self.rom_byte(bank, addr)
            }
        }
    }

    /// Writes to 0x0000-0x7FFF drive the bank controller registers.
    pub fn write_rom(&mut self, addr: u16, val: u8) {
        match (&mut self.mbc_state, addr) {
            (MbcState::NoMbc, _) => {}
            (MbcState::Mbc1 { ram_enable, .. }, 0x0000..=0x1FFF)
            | (MbcState::Mbc3 { ram_enable, .. }, 0x0000..=0x1FFF) => {
                *ram_enable = val & 0x0F == 0x0A;
            }
            (MbcState::Mbc1 { rom_bank, .. }, 0x2000..=0x3FFF) => {
                *rom_bank = (val & 0x1F).max(1);
            }
            (MbcState::Mbc1 { ram_bank, .. }, 0x4000..=0x5FFF) => {
                *ram_bank = val & 0x03;
            }
            (MbcState::Mbc1 { mode, .. }, 0x6000..=0x7FFF) => {
                *mode = val & 0x01;
            }
            (MbcState::Mbc3 { rom_bank, .. }, 0x2000..=0x3FFF) => {
                *rom_bank = (val & 0x7F).max(1);
            }
            (MbcState::Mbc3 { ram_bank, .. }, 0x4000..=0x5FFF) => {
                // 0x08-0x0C select RTC registers, which this cartridge lacks.
                *ram_bank = val;
            }
            _ => {}
        }
    }

    fn ram_index(&self, addr: u16) -> Option<usize> {
        if self.ram.is_empty() {
            return None;
        }
        let bank_count = self.ram.len().div_ceil(RAM_BANK_SIZE);
        let offset = addr as usize - 0xA000;
        let bank = match &self.mbc_state {
            MbcState::NoMbc => 0,
            MbcState::Mbc1 {
                ram_enable: false, ..
            }
            | MbcState::Mbc3 {
                ram_enable: false, ..
            } => return None,
            MbcState::Mbc1 { ram_bank, mode, .. } => {
                if *mode == 0 {
                    0
                } else {
                    *ram_bank as usize
                }
            }
            MbcState::Mbc3 { ram_bank, .. } => {
                if *ram_bank > 0x03 {
                    return None;
                }
                *ram_bank as usize
            }
        };
        let index = (bank % bank_count) * RAM_BANK_SIZE + offset;
        (index < self.ram.len()).then_some(index)
    }

    /// Read from 0xA000-0xBFFF. Disabled or absent RAM reads as 0xFF.
    pub fn read_external_ram(&self, addr: u16) -> u8 {
        self.ram_index(addr)
            .map(|idx| self.ram[idx])
            .unwrap_or(0xFF)
    }

    pub fn write_external_ram(&mut self, addr: u16, val: u8) {
        if let Some(idx) = self.ram_index(addr) {
            self.ram[idx] = val;
        }
    }

    /// Persist battery-backed RAM next to the ROM it was loaded from.
    pub fn save_ram(&self) -> io::Result<()> {
        if let (true, Some(path)) = (self.header.has_battery(), &self.save_path)
            && !self.ram.is_empty()
        {
            fs::write(path, &self.ram)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_stops_at_nul() {
        let mut rom = vec![0u8; 0x8000];
        rom[0x0134..0x0138].copy_from_slice(b"TEST");
        rom[0x0147] = 0x13;
        rom[0x0149] = 0x03;
        let header = Header::parse(&rom);
        assert_eq!(header.title, "TEST");
        assert_eq!(header.mbc_type(), MbcType::Mbc3);
        assert_eq!(header.ram_size(), 0x8000);
        assert!(header.has_battery());
    }

    #[test]
    fn short_image_parses_as_rom_only() {
        let header = Header::parse(&[0u8; 0x10]);
        assert_eq!(header.title, "");
        assert_eq!(header.mbc_type(), MbcType::NoMbc);
        assert_eq!(header.ram_size(), 0);
    }
}
