//! The protocol event loop: a single logical task that drains inbound
//! frames from a bounded queue, validates and (if necessary) reassembles
//! them, and makes complete datagrams available to the caller.
//!
//! Modelled on the teacher crate's `SixLo::tick`/`Mac::tick` orchestration
//! and on the original nrfnet event loop's `_recv` handler, minus its
//! message-queue threading (there is no OS here) and minus the forwarding
//! branch's dangling "reversed packet" reference -- forwarding here simply
//! re-encodes the header unchanged and stops short of choosing an outbound
//! sink, which is left to a definitive routing policy (§9).

use crate::addr::Addr;
use crate::header::{Header, HEADER_SIZE, PHYSICAL_SIZE};
use crate::rbuf::Rbuf;
use crate::Error;

/// Recommended reassembly lifetime before an incomplete datagram is reclaimed.
pub const FRAG_EXPIRE_MS: u32 = 10_000;

/// Recommended head pool size: max concurrent in-flight inbound datagrams.
pub const FRAG_HEADS: usize = 16;

/// Recommended hole pool size: total fragment slots.
pub const FRAG_HOLES: usize = 32;

/// Recommended bound on the inbound frame queue.
pub const INBOUND_QUEUE_DEPTH: usize = 8;

/// One physical radio frame (header + up to 24 bytes of payload).
pub type Frame = heapless::Vec<u8, PHYSICAL_SIZE>;

/// A fully reassembled (or never-fragmented) datagram delivered upward.
#[derive(Debug, Clone, PartialEq)]
pub struct Datagram {
    pub header: Header,
    pub data: heapless::Vec<u8, 255>,
}

/// Runtime configuration for a [`Protocol`] instance.
#[derive(Clone, Debug, PartialEq)]
pub struct ProtocolConfig {
    /// This node's address; frames addressed elsewhere are dropped (or
    /// forwarded, if enabled).
    pub local_addr: Addr,
    /// Re-encode and hand back non-local frames instead of dropping them.
    pub forwarding: bool,
    /// `rbuf_gc` lifetime, in milliseconds.
    pub frag_expire_ms: u32,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            local_addr: Addr::ROOT,
            forwarding: false,
            frag_expire_ms: FRAG_EXPIRE_MS,
        }
    }
}

/// The protocol core: owns the reassembly buffer and the inbound frame
/// queue. `H`/`L` size the reassembly buffer's head/hole pools.
pub struct Protocol<const H: usize, const L: usize> {
    cfg: ProtocolConfig,
    rbuf: Rbuf<H, L>,
    inbound: heapless::Deque<Frame, INBOUND_QUEUE_DEPTH>,
}

impl<const H: usize, const L: usize> Protocol<H, L> {
    pub fn new(cfg: ProtocolConfig) -> Self {
        Protocol {
            cfg,
            rbuf: Rbuf::new(),
            inbound: heapless::Deque::new(),
        }
    }

    /// Enqueue one physical frame as received from the radio. Rejects
    /// frames outside `HEADER_SIZE..=PHYSICAL_SIZE` and a full queue.
    pub fn enqueue(&mut self, frame: &[u8]) -> Result<(), Error> {
        if frame.len() < HEADER_SIZE || frame.len() > PHYSICAL_SIZE {
            log::warn!("protocol: frame size {} out of range", frame.len());
            return Err(Error::InvalidFrame);
        }

        let mut buf = Frame::new();
        buf.extend_from_slice(frame)
            .map_err(|_| Error::InvalidFrame)?;

        self.inbound.push_back(buf).map_err(|_| {
            log::warn!("protocol: inbound queue full, dropping frame");
            Error::PoolExhausted
        })
    }

    /// Run garbage collection and process one queued frame, if any.
    pub fn tick(&mut self, now_ms: u32) -> Result<Option<Datagram>, Error> {
        self.rbuf.gc(now_ms, self.cfg.frag_expire_ms);

        let frame = match self.inbound.pop_front() {
            Some(f) => f,
            None => return Ok(None),
        };

        self.handle_frame(now_ms, &frame)
    }

    /// Poll a radio already in receive mode for one frame, enqueue it, and
    /// run one `tick`. The radio's `start_receive` is the caller's
    /// responsibility -- this only drains a completed reception.
    pub fn poll_radio<Rd, I, E>(&mut self, radio: &mut Rd, now_ms: u32) -> Result<Option<Datagram>, Error>
    where
        Rd: crate::Radio<I, E>,
        I: radio::ReceiveInfo + Default,
    {
        if radio.check_receive(true).map_err(|_| Error::Radio)? {
            let mut info = I::default();
            let mut buf = [0u8; PHYSICAL_SIZE];

            let n = radio
                .get_received(&mut info, &mut buf)
                .map_err(|_| Error::Radio)?;

            log::debug!("protocol: received {} bytes from radio", n);

            self.enqueue(&buf[..n])?;
        }

        self.tick(now_ms)
    }

    fn handle_frame(&mut self, now_ms: u32, frame: &[u8]) -> Result<Option<Datagram>, Error> {
        let mut hdr_bytes = [0u8; HEADER_SIZE];
        hdr_bytes.copy_from_slice(&frame[..HEADER_SIZE]);
        let hdr = Header::uncompress(&hdr_bytes);

        if !hdr.is_valid() {
            log::warn!("protocol: received invalid header");
            return Err(Error::InvalidFrame);
        }

        if hdr.to != self.cfg.local_addr {
            if !self.cfg.forwarding {
                log::trace!("protocol: frame for {:?}, not for us", hdr.to);
                return Err(Error::NotForUs);
            }

            log::debug!("protocol: forwarding frame for {:?}", hdr.to);
            return Ok(None);
        }

        let payload = &frame[HEADER_SIZE..];

        if hdr.is_fragmented() {
            let idx = self.rbuf.add(&hdr, payload, now_ms)?;

            if !self.rbuf.head(idx).is_complete() {
                return Ok(None);
            }

            let mut data: heapless::Vec<u8, 255> = heapless::Vec::new();
            data.resize(hdr.length as usize, 0).ok();

            let n = self.rbuf.copy_out(idx, &mut data)?;
            data.truncate(n);

            self.rbuf.free(idx);

            Ok(Some(Datagram { header: hdr, data }))
        } else {
            let n = payload.len().min(hdr.length as usize);

            let mut data: heapless::Vec<u8, 255> = heapless::Vec::new();
            data.extend_from_slice(&payload[..n])
                .map_err(|_| Error::InvalidFrame)?;

            Ok(Some(Datagram { header: hdr, data }))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::header::DATA_SIZE;

    fn frame(hdr: &Header, payload: &[u8]) -> heapless::Vec<u8, PHYSICAL_SIZE> {
        let mut f: heapless::Vec<u8, PHYSICAL_SIZE> = heapless::Vec::new();
        f.extend_from_slice(&hdr.compress()).unwrap();
        f.extend_from_slice(payload).unwrap();
        f
    }

    #[test]
    fn single_fragment_datagram_delivered_directly() {
        let cfg = ProtocolConfig {
            local_addr: Addr(0o2),
            ..Default::default()
        };
        let mut p: Protocol<4, 4> = Protocol::new(cfg);

        let hdr = Header {
            from: Addr(0o1),
            to: Addr(0o2),
            id: 1,
            length: 5,
            offset: 0,
            next: 0,
        };

        p.enqueue(&frame(&hdr, &[1, 2, 3, 4, 5])).unwrap();

        let datagram = p.tick(0).unwrap().expect("datagram delivered");
        assert_eq!(datagram.header, hdr);
        assert_eq!(&datagram.data[..], &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn fragmented_datagram_reassembled_across_ticks() {
        let cfg = ProtocolConfig {
            local_addr: Addr(0o2),
            ..Default::default()
        };
        let mut p: Protocol<4, 4> = Protocol::new(cfg);

        let total_len = 30u8;
        let mut payload = [0u8; 30];
        for (i, b) in payload.iter_mut().enumerate() {
            *b = i as u8;
        }

        let hdr0 = Header {
            from: Addr(0o1),
            to: Addr(0o2),
            id: 9,
            length: total_len,
            offset: 0,
            next: 0,
        };
        let hdr1 = Header {
            offset: 1,
            ..hdr0
        };

        p.enqueue(&frame(&hdr0, &payload[..DATA_SIZE])).unwrap();
        assert!(p.tick(0).unwrap().is_none(), "not complete yet");

        p.enqueue(&frame(&hdr1, &payload[DATA_SIZE..])).unwrap();
        let datagram = p.tick(1).unwrap().expect("datagram now complete");

        assert_eq!(&datagram.data[..], &payload[..]);
    }

    #[test]
    fn frame_not_for_us_is_dropped() {
        let cfg = ProtocolConfig {
            local_addr: Addr(0o3),
            ..Default::default()
        };
        let mut p: Protocol<4, 4> = Protocol::new(cfg);

        let hdr = Header {
            from: Addr(0o1),
            to: Addr(0o2),
            id: 1,
            length: 1,
            offset: 0,
            next: 0,
        };

        p.enqueue(&frame(&hdr, &[9])).unwrap();
        assert_eq!(p.tick(0), Err(Error::NotForUs));
    }

    #[test]
    fn undersized_frame_rejected_at_enqueue() {
        let mut p: Protocol<4, 4> = Protocol::new(ProtocolConfig::default());
        assert_eq!(p.enqueue(&[0u8; 4]), Err(Error::InvalidFrame));
    }

    #[test]
    fn poll_radio_drains_one_frame() {
        use radio::mock::{MockRadio, Transaction};
        use radio::BasicInfo;

        let cfg = ProtocolConfig {
            local_addr: Addr(0o2),
            ..Default::default()
        };
        let mut p: Protocol<4, 4> = Protocol::new(cfg);

        let hdr = Header {
            from: Addr(0o1),
            to: Addr(0o2),
            id: 1,
            length: 3,
            offset: 0,
            next: 0,
        };
        let f = frame(&hdr, &[1, 2, 3]);

        let mut radio = MockRadio::new(&[
            Transaction::check_receive(true, Ok(true)),
            Transaction::get_received(Ok((f.to_vec(), BasicInfo::default()))),
        ]);

        let datagram = p.poll_radio(&mut radio, 0).unwrap().expect("datagram delivered");
        assert_eq!(&datagram.data[..], &[1, 2, 3]);

        radio.done();
    }

    #[test]
    fn inbound_queue_is_bounded() {
        let mut p: Protocol<4, 4> = Protocol::new(ProtocolConfig::default());

        let hdr = Header {
            from: Addr(0o1),
            to: Addr(0o0),
            id: 1,
            length: 1,
            offset: 0,
            next: 0,
        };
        let f = frame(&hdr, &[1]);

        for _ in 0..INBOUND_QUEUE_DEPTH {
            p.enqueue(&f).unwrap();
        }

        assert_eq!(p.enqueue(&f), Err(Error::PoolExhausted));
    }
}
