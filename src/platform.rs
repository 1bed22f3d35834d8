use embedded_storage::nor_flash::NorFlash;

use crate::raw::WORD_SIZE;

/// Flash access contract for the emulation layer. Any [`NorFlash`] driver
/// qualifies, including `&mut` references to one. See README.md for an
/// example implementation.
pub trait Platform: NorFlash {}

impl<T: NorFlash> Platform for T {}

/// Both log areas program 8-byte words and erase whole sectors, so the
/// driver geometry has to divide evenly into that layout. A sector must
/// hold at least the header and one record.
pub(crate) fn geometry_supported<T: Platform>() -> bool {
    WORD_SIZE.is_multiple_of(T::WRITE_SIZE)
        && WORD_SIZE.is_multiple_of(T::READ_SIZE)
        && T::ERASE_SIZE.is_multiple_of(WORD_SIZE)
        && T::ERASE_SIZE >= 2 * WORD_SIZE
}

/// On the ESP32 family `esp_storage::FlashStorage` satisfies [`Platform`]
/// as-is; re-exported so callers only need this crate's chip feature.
#[cfg(any(
    feature = "esp32",
    feature = "esp32s2",
    feature = "esp32s3",
    feature = "esp32c2",
    feature = "esp32c3",
    feature = "esp32c6",
    feature = "esp32h2",
))]
pub use esp_storage::FlashStorage;
