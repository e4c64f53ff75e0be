//! Crate-wide error type.
//!
//! Fallible entry points return `Result<_, Error>` rather than the
//! null-pointer / -1 sentinels used by the nrfnet/Fortuna sources this
//! crate is modelled on.

/// Errors produced by the nRFNet protocol core and the Fortuna generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Frame too short, too long, or header failed validation.
    InvalidFrame,

    /// No free head or hole was available in the reassembly buffer.
    PoolExhausted,

    /// `hdr.to` does not match the local address and forwarding is disabled.
    NotForUs,

    /// Fortuna was read from before its first successful reseed.
    Unseeded,

    /// Fortuna read request exceeded 2^20 bytes.
    TooLarge,

    /// Entropy submitted to a Fortuna pool had an invalid length or pool index.
    BadEntropy,

    /// The underlying radio returned an error.
    Radio,
}

