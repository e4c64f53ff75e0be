//! A hierarchical mesh network stack for nRF24L01+ radios, plus a
//! standalone Fortuna CSPRNG used to seed link-layer identifiers and
//! (optionally) higher-layer cryptography.
//!
//! The crate is `no_std` by default; the test suite pulls in `std` via
//! `#[cfg(test)] extern crate std;`, matching the rest of this family of
//! crates.

#![no_std]

#[cfg(test)]
extern crate std;

pub mod addr;
pub mod error;
pub mod fortuna;
pub mod header;
pub mod prelude;
pub mod protocol;
pub mod rbuf;
pub mod timer;

pub use error::Error;

/// A radio capable of both receiving and transmitting, and of reporting
/// whether it is mid-operation. This is the minimal slice of the `radio`
/// crate's trait set [`Protocol::poll_radio`] needs -- unlike the
/// 802.15.4 stack this crate is descended from, nothing here depends on
/// `radio::State` or `radio::Rssi`.
pub trait Radio<I: radio::ReceiveInfo, E>:
    radio::Busy<Error = E> + radio::Transmit<Error = E> + radio::Receive<Info = I, Error = E>
{
}

impl<T, I: radio::ReceiveInfo, E> Radio<I, E> for T where
    T: radio::Busy<Error = E> + radio::Transmit<Error = E> + radio::Receive<Info = I, Error = E>
{
}
