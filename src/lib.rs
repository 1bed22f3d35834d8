#![doc = include_str!("../README.md")]
#![cfg_attr(not(target_arch = "x86_64"), no_std)]

pub mod config;
pub mod error;
mod log;
pub mod platform;
mod raw;

extern crate alloc;

use alloc::vec;
use alloc::vec::Vec;

use crate::config::EepromConfig;
use crate::error::Error;
use crate::log::{Forwarding, LogArea};
use crate::platform::Platform;
use crate::raw::{DataBlock, LOGICAL_SIZE_MAX, MAX_PAYLOAD};

/// Selects one of the two log areas in diagnostic and restore calls.
#[derive(Copy, Clone, Debug, PartialEq, Eq, strum::Display)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Area {
    /// Hot log, fed directly by [`Eeprom::write`].
    Frequent,
    /// Retention log, fed only by compaction.
    Fixed,
}

/// Write position of one log area.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LogStatus {
    /// Absolute index of the sector currently accepting records.
    pub active_sector: u16,
    /// Next free byte offset within the active sector. Equals the sector
    /// size when the sector is full and the next write will rotate.
    pub next_free_offset: u32,
    /// Rotation generation stamped into the active sector's header.
    pub generation: u32,
}

/// EEPROM emulation context over a NOR flash device.
///
/// The scratch cache is the authoritative value of every logical address:
/// reads are served from it exclusively and writes mutate it before they
/// are persisted. The flash logs are a durability trail for the next cold
/// start, not the primary store.
///
/// Constructing the context recovers both areas' write cursors from flash
/// but leaves the cache zeroed; call [`Eeprom::restore_scratch`] to replay
/// persisted content into it.
pub struct Eeprom<T: Platform> {
    hal: T,
    scratch: Vec<u8>,
    frequent: Option<LogArea>,
    fixed: Option<LogArea>,
}

impl<T: Platform> Eeprom<T> {
    /// Validates `config` against the flash geometry and scans both log
    /// areas to recover their cursors and generation counters. The scan is
    /// read-only; a pristine area stays untouched until its first write.
    pub fn new(hal: T, config: EepromConfig) -> Result<Eeprom<T>, Error> {
        if !platform::geometry_supported::<T>() {
            return Err(Error::UnsupportedGeometry);
        }

        let logical_size = config.logical_size as usize;
        if logical_size == 0 || logical_size > LOGICAL_SIZE_MAX {
            return Err(Error::InvalidLogicalSize);
        }

        let capacity = hal.capacity();
        for area in [config.frequent.as_ref(), config.fixed.as_ref()]
            .into_iter()
            .flatten()
        {
            let end_sector = area.start_sector as usize + area.sector_count as usize;
            if area.sector_count == 0 || end_sector * T::ERASE_SIZE > capacity {
                return Err(Error::InvalidAreaRange);
            }
        }

        let area = |config: config::AreaConfig| {
            LogArea::new(config.start_sector, config.sector_count, T::ERASE_SIZE as u32)
        };
        let mut eeprom = Self {
            hal,
            scratch: vec![0u8; logical_size],
            frequent: config.frequent.map(area),
            fixed: config.fixed.map(area),
        };

        if let Some(log) = eeprom.frequent.as_mut() {
            log.recover(&mut eeprom.hal)?;
        }
        if let Some(log) = eeprom.fixed.as_mut() {
            log.recover(&mut eeprom.hal)?;
        }
        Ok(eeprom)
    }

    /// Writes `data` at logical address `addr`.
    ///
    /// The data is split into records of up to six bytes. Chunks whose
    /// bytes already match the scratch cache are skipped without touching
    /// flash; the rest update the cache and append to the Frequent log,
    /// which may rotate a sector and run a compaction pass into the Fixed
    /// log. There is no atomicity across the call: when a chunk fails,
    /// earlier chunks stay committed and the error is returned as-is.
    pub fn write(&mut self, addr: u32, data: &[u8]) -> Result<(), Error> {
        if self.frequent.is_none() {
            return Err(Error::FeatureDisabled);
        }
        let start = addr as usize;
        let end = start.checked_add(data.len()).ok_or(Error::OutOfRange)?;
        if end > self.scratch.len() {
            return Err(Error::OutOfRange);
        }

        let mut chunk_addr = start;
        for chunk in data.chunks(MAX_PAYLOAD) {
            let chunk_end = chunk_addr + chunk.len();
            if self.scratch[chunk_addr..chunk_end] != *chunk {
                self.scratch[chunk_addr..chunk_end].copy_from_slice(chunk);
                let block = DataBlock::new(chunk_addr as u16, chunk);
                self.append_frequent(&block)?;
            }
            chunk_addr = chunk_end;
        }
        Ok(())
    }

    /// Copies from the scratch cache into `buffer`. Flash is never read.
    pub fn read(&self, addr: u32, buffer: &mut [u8]) -> Result<(), Error> {
        let start = addr as usize;
        let end = start.checked_add(buffer.len()).ok_or(Error::OutOfRange)?;
        if end > self.scratch.len() {
            return Err(Error::OutOfRange);
        }
        buffer.copy_from_slice(&self.scratch[start..end]);
        Ok(())
    }

    /// Zeroes the scratch cache and erases both log areas, rewinding their
    /// cursors to (start sector, offset 8) and generations to 0.
    ///
    /// The cache is zeroed even when an erase fails. Erases run Frequent
    /// first, then Fixed; the first failure aborts the rest and is
    /// returned unchanged.
    pub fn clear(&mut self) -> Result<(), Error> {
        self.scratch.fill(0);
        if let Some(log) = self.frequent.as_mut() {
            log.clear(&mut self.hal)?;
        }
        if let Some(log) = self.fixed.as_mut() {
            log.clear(&mut self.hal)?;
        }
        Ok(())
    }

    /// Replays one area's persisted records into the scratch cache, oldest
    /// first, leaving the latest surviving value of each address in place.
    ///
    /// Recovery does not do this implicitly; call it after a cold start
    /// when the cache content was lost. Restoring Fixed before Frequent
    /// reproduces the pre-restart values, since the Frequent log always
    /// holds the newer records.
    pub fn restore_scratch(&mut self, area: Area) -> Result<(), Error> {
        let log = match area {
            Area::Frequent => self.frequent.as_ref(),
            Area::Fixed => self.fixed.as_ref(),
        }
        .ok_or(Error::FeatureDisabled)?;
        log.replay(&mut self.hal, &mut self.scratch)
    }

    /// Diagnostic view of one area's write position.
    pub fn log_status(&self, area: Area) -> Result<LogStatus, Error> {
        let log = match area {
            Area::Frequent => self.frequent.as_ref(),
            Area::Fixed => self.fixed.as_ref(),
        }
        .ok_or(Error::FeatureDisabled)?;
        Ok(log.status())
    }

    /// Configured logical size in bytes.
    pub fn logical_size(&self) -> usize {
        self.scratch.len()
    }

    fn append_frequent(&mut self, block: &DataBlock) -> Result<(), Error> {
        let Some(frequent) = self.frequent.as_mut() else {
            return Err(Error::FeatureDisabled);
        };
        let compact = self.fixed.as_mut().map(|target| Forwarding {
            target,
            scratch: &self.scratch,
        });
        frequent.append(&mut self.hal, block, compact)
    }
}
