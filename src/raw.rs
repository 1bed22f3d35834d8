//! On-flash layout: sector headers and data records.

/// Flash program granule. Sector headers and data records each occupy
/// exactly one word and are programmed with a single flash write.
pub(crate) const WORD_SIZE: usize = 8;

/// Every byte of an erased sector reads as this value.
pub(crate) const ERASED_BYTE: u8 = 0xFF;

/// Largest payload a single record can carry.
pub(crate) const MAX_PAYLOAD: usize = WORD_SIZE - 2;

/// Record addresses are 12 bits on flash, capping the logical store.
pub(crate) const LOGICAL_SIZE_MAX: usize = 1 << ADDR_BITS;

/// Stamped into the upper half of a claimed sector's header word. An
/// erased word can never match it.
pub(crate) const SECTOR_MAGIC: u32 = 0xA53C_9D71;

const ADDR_BITS: u16 = 12;
const ADDR_MASK: u16 = (1 << ADDR_BITS) - 1;

const _: () = assert!(2 + MAX_PAYLOAD == WORD_SIZE, "record tag and payload must fill one word");

/// First word of a claimed sector: the rotation generation. The magic
/// constant occupies the upper four bytes and is implied.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct SectorHeader {
    pub(crate) generation: u32,
}

impl SectorHeader {
    pub(crate) fn encode(&self) -> [u8; WORD_SIZE] {
        let mut word = [0u8; WORD_SIZE];
        word[..4].copy_from_slice(&self.generation.to_le_bytes());
        word[4..].copy_from_slice(&SECTOR_MAGIC.to_le_bytes());
        word
    }

    /// `None` for anything that is not a claimed header; erased words and
    /// foreign data both fail the magic check.
    pub(crate) fn decode(word: &[u8; WORD_SIZE]) -> Option<Self> {
        let magic = u32::from_le_bytes([word[4], word[5], word[6], word[7]]);
        if magic != SECTOR_MAGIC {
            return None;
        }
        Some(Self {
            generation: u32::from_le_bytes([word[0], word[1], word[2], word[3]]),
        })
    }
}

/// One persisted change, kept in its encoded form: a little-endian tag
/// (12-bit logical address, 4-bit payload length) followed by up to six
/// payload bytes, the unused tail left at the erased-fill value.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) struct DataBlock {
    word: [u8; WORD_SIZE],
}

impl DataBlock {
    pub(crate) fn new(addr: u16, payload: &[u8]) -> Self {
        debug_assert!(payload.len() <= MAX_PAYLOAD);
        debug_assert!(addr <= ADDR_MASK);
        let tag = addr | ((payload.len() as u16) << ADDR_BITS);
        let mut word = [ERASED_BYTE; WORD_SIZE];
        word[..2].copy_from_slice(&tag.to_le_bytes());
        word[2..2 + payload.len()].copy_from_slice(payload);
        Self { word }
    }

    /// `None` when the word cannot be a record (length nibble above 6).
    pub(crate) fn decode(word: [u8; WORD_SIZE]) -> Option<Self> {
        let tag = u16::from_le_bytes([word[0], word[1]]);
        if ((tag >> ADDR_BITS) as usize) > MAX_PAYLOAD {
            return None;
        }
        Some(Self { word })
    }

    pub(crate) fn addr(&self) -> usize {
        (u16::from_le_bytes([self.word[0], self.word[1]]) & ADDR_MASK) as usize
    }

    pub(crate) fn payload(&self) -> &[u8] {
        let len = (u16::from_le_bytes([self.word[0], self.word[1]]) >> ADDR_BITS) as usize;
        &self.word[2..2 + len]
    }

    pub(crate) fn as_bytes(&self) -> &[u8; WORD_SIZE] {
        &self.word
    }

    /// A record is live while the scratch cache still holds exactly the
    /// bytes it carries; superseded records compare unequal.
    pub(crate) fn is_live(&self, scratch: &[u8]) -> bool {
        let addr = self.addr();
        let payload = self.payload();
        !payload.is_empty()
            && addr + payload.len() <= scratch.len()
            && scratch[addr..addr + payload.len()] == *payload
    }
}

pub(crate) fn is_erased(bytes: &[u8]) -> bool {
    bytes.iter().all(|&b| b == ERASED_BYTE)
}
