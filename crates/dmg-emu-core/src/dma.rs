pub const DMA_ADDR: u16 = 0xFF46;

/// Bytes copied by one OAM DMA transfer.
pub const TRANSFER_LEN: usize = 0xA0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaMode {
    Idle,
    /// One M-cycle delay between the register write and the first copy.
    Pending,
    Transferring,
}

/// OAM DMA unit. The bus performs the actual copy so source reads go through
/// the normal address decoding without ticking peripherals.
pub struct Dma {
    pub mode: DmaMode,
    reg: u8,
    source: u16,
    index: usize,
}

impl Dma {
    pub fn new() -> Self {
        Self {
            mode: DmaMode::Idle,
            reg: 0xFF,
            source: 0,
            index: 0,
        }
    }

    pub fn read(&self) -> u8 {
        self.reg
    }

    /// Latch a new source page and (re)start the transfer.
    pub fn start(&mut self, page: u8) {
        self.reg = page;
        self.source = (page as u16) << 8;
        self.index = 0;
        self.mode = DmaMode::Pending;
    }

    pub fn active(&self) -> bool {
        self.mode == DmaMode::Transferring
    }

    /// Advance one M-cycle. Returns the source address and OAM offset to copy
    /// this cycle, if any.
    pub fn step(&mut self) -> Option<(u16, usize)> {
        match self.mode {
            DmaMode::Idle => None,
            DmaMode::Pending => {
                self.mode = DmaMode::Transferring;
                None
            }
            DmaMode::Transferring => {
                let idx = self.index;
                let src = self.source.wrapping_add(idx as u16);
                self.index += 1;
                if self.index == TRANSFER_LEN {
                    self.index = 0;
                    self.mode = DmaMode::Idle;
                }
                Some((src, idx))
            }
        }
    }
}

impl Default for Dma {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_schedule() {
        let mut dma = Dma::new();
        dma.start(0xC1);
        assert_eq!(dma.read(), 0xC1);
        assert_eq!(dma.step(), None, "first cycle after the write is a delay");

        let mut copies = Vec::new();
        while let Some(copy) = dma.step() {
            copies.push(copy);
        }
        assert_eq!(copies.len(), TRANSFER_LEN);
        assert_eq!(copies[0], (0xC100, 0));
        assert_eq!(copies[159], (0xC19F, 159));
        assert_eq!(dma.mode, DmaMode::Idle);
    }

    #[test]
    fn restart_resets_index() {
        let mut dma = Dma::new();
        dma.start(0x80);
        dma.step();
        dma.step();
        dma.step();
        dma.start(0x90);
        assert_eq!(dma.mode, DmaMode::Pending);
        dma.step();
        assert_eq!(dma.step(), Some((0x9000, 0)));
    }
}
