use thiserror::Error;

/// Errors surfaced by the emulation layer.
///
/// Flash failures are propagated unchanged from the storage driver, which
/// is assumed to have exhausted its own retries already. This layer retries
/// nothing, rolls nothing back, and never latches a failure as fatal.
#[derive(Error, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// The addressed log area is not enabled by the board configuration.
    #[error("log area disabled by configuration")]
    FeatureDisabled,

    /// `addr + len` runs past the configured logical size.
    #[error("address out of range")]
    OutOfRange,

    /// A sector erase failed in the flash driver.
    #[error("sector erase failed")]
    EraseFailure,

    /// A word program failed in the flash driver.
    #[error("word program failed")]
    ProgramFailure,

    /// A flash read failed in the flash driver.
    #[error("flash read failed")]
    ReadFailure,

    /// The reserved configuration block is missing or malformed.
    #[error("invalid configuration block")]
    InvalidConfigBlock,

    /// The configured logical size must be between 1 and 4096 bytes.
    #[error("invalid logical size")]
    InvalidLogicalSize,

    /// A log area has no sectors or runs past the end of the flash device.
    #[error("invalid log area range")]
    InvalidAreaRange,

    /// The flash driver's word or sector geometry cannot hold this layout.
    #[error("unsupported flash geometry")]
    UnsupportedGeometry,
}
