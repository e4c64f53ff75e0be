//! Convenience re-exports of the crate's public surface.

pub use crate::addr::{Addr, AddrInfo, Pipe};
pub use crate::error::Error;
pub use crate::fortuna::{Fortuna, FortunaConfig, FortunaRng};
pub use crate::header::Header;
pub use crate::protocol::{Datagram, Protocol, ProtocolConfig};
pub use crate::rbuf::{Head, Rbuf};
pub use crate::timer::Timer;
pub use crate::Radio;
