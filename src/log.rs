//! Circular append log over a contiguous range of flash sectors.
//!
//! Each sector starts with a [`SectorHeader`] and fills up with 8-byte
//! records. Exactly one sector is active at a time; the others are either
//! full or erased. Rotation claims the next sector in ring order with a
//! generation one above the current one, which is how recovery finds the
//! active sector again after a restart.

use alloc::vec;
use alloc::vec::Vec;

use crate::LogStatus;
use crate::error::Error;
use crate::platform::Platform;
use crate::raw::{self, DataBlock, SectorHeader, WORD_SIZE};

#[cfg(feature = "defmt")]
use defmt::trace;
#[cfg(feature = "defmt")]
use defmt::warn;

/// Where the next record is programmed. `sector` is relative to the area
/// start; `offset` never goes below the header word.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct WriteCursor {
    pub(crate) sector: u16,
    pub(crate) offset: u32,
}

/// Destination for records evicted live out of a rotating sector. The
/// scratch slice decides liveness: only records still matching it are
/// forwarded.
pub(crate) struct Forwarding<'a> {
    pub(crate) target: &'a mut LogArea,
    pub(crate) scratch: &'a [u8],
}

pub(crate) struct LogArea {
    start_sector: u16,
    sector_count: u16,
    sector_size: u32,
    cursor: WriteCursor,
    generation: u32,
    // false until the first header of this session's lifecycle is on
    // flash; a pristine or cleared area claims its start sector lazily
    initialized: bool,
}

impl LogArea {
    pub(crate) fn new(start_sector: u16, sector_count: u16, sector_size: u32) -> Self {
        Self {
            start_sector,
            sector_count,
            sector_size,
            cursor: WriteCursor {
                sector: 0,
                offset: WORD_SIZE as u32,
            },
            generation: 0,
            initialized: false,
        }
    }

    pub(crate) fn status(&self) -> LogStatus {
        LogStatus {
            active_sector: self.start_sector + self.cursor.sector,
            next_free_offset: self.cursor.offset,
            generation: self.generation,
        }
    }

    fn sector_address(&self, sector: u16) -> u32 {
        (self.start_sector as u32 + sector as u32) * self.sector_size
    }

    fn is_full(&self) -> bool {
        self.cursor.offset == self.sector_size
    }

    /// Sector the next rotation will claim, wrapping at the area end.
    fn rotation_target(&self) -> u16 {
        (self.cursor.sector + 1) % self.sector_count
    }

    /// Rebuilds cursor and generation from flash. Read-only, so running it
    /// twice over an unmodified image yields identical state.
    pub(crate) fn recover<T: Platform>(&mut self, hal: &mut T) -> Result<(), Error> {
        let mut active: Option<(u32, u16)> = None;
        for sector in 0..self.sector_count {
            let mut word = [0u8; WORD_SIZE];
            hal.read(self.sector_address(sector), &mut word)
                .map_err(|_| Error::ReadFailure)?;
            let Some(header) = SectorHeader::decode(&word) else {
                continue;
            };
            if active.is_none_or(|(generation, _)| header.generation > generation) {
                active = Some((header.generation, sector));
            }
        }

        match active {
            None => {
                // pristine area: no sector claimed yet
                self.cursor = WriteCursor {
                    sector: 0,
                    offset: WORD_SIZE as u32,
                };
                self.generation = 0;
                self.initialized = false;
            }
            Some((generation, sector)) => {
                let mut buf = vec![0u8; self.sector_size as usize];
                hal.read(self.sector_address(sector), &mut buf)
                    .map_err(|_| Error::ReadFailure)?;

                let mut offset = self.sector_size;
                for word_start in (WORD_SIZE..buf.len()).step_by(WORD_SIZE) {
                    if raw::is_erased(&buf[word_start..word_start + WORD_SIZE]) {
                        offset = word_start as u32;
                        break;
                    }
                }

                self.cursor = WriteCursor { sector, offset };
                self.generation = generation;
                self.initialized = true;
            }
        }

        #[cfg(feature = "defmt")]
        trace!(
            "recover: sector {} offset {} generation {}",
            self.cursor.sector, self.cursor.offset, self.generation
        );

        #[cfg(feature = "debug-logs")]
        println!(
            "  LogArea: recover: sector {} offset {} generation {}",
            self.cursor.sector, self.cursor.offset, self.generation
        );

        Ok(())
    }

    /// Appends one record at the cursor, rotating first when the active
    /// sector is full. `compact` is consumed on rotation: records of the
    /// sector being reused that still match its scratch slice move to its
    /// target before the erase. Without it the sector's contents are
    /// discarded outright.
    pub(crate) fn append<T: Platform>(
        &mut self,
        hal: &mut T,
        block: &DataBlock,
        compact: Option<Forwarding<'_>>,
    ) -> Result<(), Error> {
        if self.is_full() {
            self.rotate(hal, compact)?;
        }

        if !self.initialized {
            // first record ever (or first after a clear): stamp the header
            let sector = self.cursor.sector;
            self.claim(hal, sector, 0)?;
        }

        let address = self.sector_address(self.cursor.sector) + self.cursor.offset;
        hal.write(address, block.as_bytes())
            .map_err(|_| Error::ProgramFailure)?;
        self.cursor.offset += WORD_SIZE as u32;
        Ok(())
    }

    fn rotate<T: Platform>(
        &mut self,
        hal: &mut T,
        compact: Option<Forwarding<'_>>,
    ) -> Result<(), Error> {
        let victim = self.rotation_target();
        let address = self.sector_address(victim);

        #[cfg(feature = "defmt")]
        trace!("rotate: sector {} generation {}", victim, self.generation + 1);

        #[cfg(feature = "debug-logs")]
        println!(
            "  LogArea: rotate: sector {} generation {}",
            victim,
            self.generation + 1
        );

        let mut sector = vec![0u8; self.sector_size as usize];
        hal.read(address, &mut sector).map_err(|_| Error::ReadFailure)?;
        if !raw::is_erased(&sector) {
            if let Some(forwarding) = compact {
                forward_live(hal, &sector, forwarding)?;
            }
            hal.erase(address, address + self.sector_size)
                .map_err(|_| Error::EraseFailure)?;
        }

        self.claim(hal, victim, self.generation + 1)
    }

    /// Programs a header into an erased sector and points the cursor at
    /// its first record slot.
    fn claim<T: Platform>(&mut self, hal: &mut T, sector: u16, generation: u32) -> Result<(), Error> {
        let header = SectorHeader { generation };
        hal.write(self.sector_address(sector), &header.encode())
            .map_err(|_| Error::ProgramFailure)?;
        self.cursor = WriteCursor {
            sector,
            offset: WORD_SIZE as u32,
        };
        self.generation = generation;
        self.initialized = true;
        Ok(())
    }

    /// Erases the whole area and rewinds it to the pristine state. The
    /// next append claims the start sector with generation 0 again.
    pub(crate) fn clear<T: Platform>(&mut self, hal: &mut T) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("clear: {} sectors from {}", self.sector_count, self.start_sector);

        let from = self.sector_address(0);
        hal.erase(from, from + self.sector_count as u32 * self.sector_size)
            .map_err(|_| Error::EraseFailure)?;
        self.cursor = WriteCursor {
            sector: 0,
            offset: WORD_SIZE as u32,
        };
        self.generation = 0;
        self.initialized = false;
        Ok(())
    }

    /// Replays every persisted record into `scratch`, oldest sector first
    /// and in stored order within a sector, so the latest surviving write
    /// for each address lands last.
    pub(crate) fn replay<T: Platform>(&self, hal: &mut T, scratch: &mut [u8]) -> Result<(), Error> {
        let mut claimed: Vec<(u32, u16)> = Vec::new();
        for sector in 0..self.sector_count {
            let mut word = [0u8; WORD_SIZE];
            hal.read(self.sector_address(sector), &mut word)
                .map_err(|_| Error::ReadFailure)?;
            if let Some(header) = SectorHeader::decode(&word) {
                claimed.push((header.generation, sector));
            }
        }
        claimed.sort_unstable();

        let mut buf = vec![0u8; self.sector_size as usize];
        for (_, sector) in claimed {
            hal.read(self.sector_address(sector), &mut buf)
                .map_err(|_| Error::ReadFailure)?;
            for word_start in (WORD_SIZE..buf.len()).step_by(WORD_SIZE) {
                let mut word = [0u8; WORD_SIZE];
                word.copy_from_slice(&buf[word_start..word_start + WORD_SIZE]);
                if raw::is_erased(&word) {
                    break;
                }
                let Some(block) = DataBlock::decode(word) else {
                    // torn program, e.g. power loss mid-write
                    #[cfg(feature = "defmt")]
                    warn!("replay: skipping malformed record at offset {}", word_start);
                    continue;
                };
                let addr = block.addr();
                let payload = block.payload();
                if addr + payload.len() <= scratch.len() {
                    scratch[addr..addr + payload.len()].copy_from_slice(payload);
                }
            }
        }
        Ok(())
    }
}

/// Single compaction pass over one sector image: every record that still
/// matches the scratch cache is appended to the forwarding target, anything
/// superseded is dropped. One live record yields exactly one append; the
/// target rotates without forwarding of its own when it fills up.
fn forward_live<T: Platform>(
    hal: &mut T,
    sector: &[u8],
    forwarding: Forwarding<'_>,
) -> Result<(), Error> {
    let Forwarding { target, scratch } = forwarding;

    for word_start in (WORD_SIZE..sector.len()).step_by(WORD_SIZE) {
        let mut word = [0u8; WORD_SIZE];
        word.copy_from_slice(&sector[word_start..word_start + WORD_SIZE]);
        if raw::is_erased(&word) {
            break;
        }
        let Some(block) = DataBlock::decode(word) else {
            #[cfg(feature = "defmt")]
            warn!("compaction: dropping malformed record at offset {}", word_start);
            continue;
        };
        if block.is_live(scratch) {
            #[cfg(feature = "debug-logs")]
            println!("  LogArea: forward live record @{}", block.addr());

            target.append(hal, &block, None)?;
        }
    }
    Ok(())
}
