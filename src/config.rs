//! Board configuration for the emulation layer.
//!
//! The board reserves a 16-byte flash block that fixes the logical size and
//! the two log area ranges at provisioning time:
//!
//! | bytes | field                                          |
//! |-------|------------------------------------------------|
//! | 0–3   | magic, u32 little-endian                       |
//! | 4–5   | logical size in bytes, u16 little-endian       |
//! | 6     | enable flags: bit 0 Frequent, bit 1 Fixed      |
//! | 7     | reserved, left erased                          |
//! | 8–11  | Frequent area start sector and sector count    |
//! | 12–15 | Fixed area start sector and sector count       |
//!
//! [`EepromConfig::read_from`] loads it once at startup; a disabled area is
//! absent from the parsed form rather than carried as a flag.

use crate::error::Error;
use crate::platform::Platform;
use crate::raw::{ERASED_BYTE, WORD_SIZE};

pub(crate) const CONFIG_MAGIC: u32 = 0x6B8F_2ED4;
pub(crate) const CONFIG_BLOCK_LEN: usize = 2 * WORD_SIZE;

const FLAG_FREQUENT: u8 = 0b01;
const FLAG_FIXED: u8 = 0b10;

/// Sector range of one log area, in units of the flash erase sector.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AreaConfig {
    /// Absolute index of the area's first sector on the device.
    pub start_sector: u16,
    /// Number of sectors in the circular log, at least 1.
    pub sector_count: u16,
}

/// Startup configuration: the logical store size and the two log areas.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EepromConfig {
    /// Logical address space size in bytes, 1..=4096.
    pub logical_size: u16,
    /// Hot log, fed directly by writes. `None` disables the emulation's
    /// write path entirely.
    pub frequent: Option<AreaConfig>,
    /// Retention log, fed only by compaction. `None` means rotated-out
    /// sectors are discarded without forwarding.
    pub fixed: Option<AreaConfig>,
}

impl EepromConfig {
    /// Reads and parses the reserved configuration block at `offset`.
    pub fn read_from<T: Platform>(hal: &mut T, offset: u32) -> Result<Self, Error> {
        let mut block = [0u8; CONFIG_BLOCK_LEN];
        hal.read(offset, &mut block).map_err(|_| Error::ReadFailure)?;
        Self::decode(&block)
    }

    pub(crate) fn decode(block: &[u8; CONFIG_BLOCK_LEN]) -> Result<Self, Error> {
        let magic = u32::from_le_bytes([block[0], block[1], block[2], block[3]]);
        if magic != CONFIG_MAGIC {
            return Err(Error::InvalidConfigBlock);
        }

        let area = |at: usize| AreaConfig {
            start_sector: u16::from_le_bytes([block[at], block[at + 1]]),
            sector_count: u16::from_le_bytes([block[at + 2], block[at + 3]]),
        };

        let flags = block[6];
        Ok(Self {
            logical_size: u16::from_le_bytes([block[4], block[5]]),
            frequent: (flags & FLAG_FREQUENT != 0).then(|| area(8)),
            fixed: (flags & FLAG_FIXED != 0).then(|| area(12)),
        })
    }

    /// Serializes the block for provisioning tools and tests. Fields of a
    /// disabled area are left at the erased-fill value.
    pub fn encode(&self) -> [u8; CONFIG_BLOCK_LEN] {
        let mut block = [ERASED_BYTE; CONFIG_BLOCK_LEN];
        block[..4].copy_from_slice(&CONFIG_MAGIC.to_le_bytes());
        block[4..6].copy_from_slice(&self.logical_size.to_le_bytes());

        let mut flags = 0u8;
        if let Some(area) = &self.frequent {
            flags |= FLAG_FREQUENT;
            block[8..10].copy_from_slice(&area.start_sector.to_le_bytes());
            block[10..12].copy_from_slice(&area.sector_count.to_le_bytes());
        }
        if let Some(area) = &self.fixed {
            flags |= FLAG_FIXED;
            block[12..14].copy_from_slice(&area.start_sector.to_le_bytes());
            block[14..16].copy_from_slice(&area.sector_count.to_le_bytes());
        }
        block[6] = flags;
        block
    }
}
