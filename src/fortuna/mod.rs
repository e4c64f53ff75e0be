//! Fortuna CSPRNG (Schneier-Ferguson-Kohno, sections 9.4-9.5): a bank of
//! SHA-256 entropy pools feeding an AES-CTR generator, with a reseed
//! policy gated on pool 0's accumulated byte count and (optionally) a
//! minimum time between reseeds.

pub mod generator;
pub mod pool;

use crate::timer::Timer;
use crate::Error;
use generator::Generator;
use pool::Pool;

/// Hard ceiling on the number of pools a [`Fortuna`] instance may use.
pub const MAX_POOLS: usize = 32;

/// Default pool count, matching `FORTUNA_POOLS` in §6.
pub const DEFAULT_POOLS: usize = 16;

/// Pool 0 must accumulate at least this many bytes before a reseed may occur.
pub const RESEED_MIN_POOL0_BYTES: u32 = 64;

/// Default `FORTUNA_RESEED_TIMEOUT_US`; zero disables the timing gate.
pub const DEFAULT_RESEED_TIMEOUT_US: u64 = 100_000;

/// Runtime configuration for a [`Fortuna`] instance.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FortunaConfig {
    /// Minimum microseconds between reseeds; `0` disables the gate.
    pub reseed_timeout_us: u64,
}

impl Default for FortunaConfig {
    fn default() -> Self {
        Self {
            reseed_timeout_us: DEFAULT_RESEED_TIMEOUT_US,
        }
    }
}

/// Fortuna state: `P` entropy pools (`P <= MAX_POOLS`) plus the AES-CTR
/// generator they reseed.
pub struct Fortuna<const P: usize> {
    cfg: FortunaConfig,
    pools: [Pool; P],
    gen: Generator,
    reseed_count: u32,
    last_reseed_us: u64,
}

impl<const P: usize> Fortuna<P> {
    /// Create a new, unseeded instance. Panics if `P` exceeds [`MAX_POOLS`]
    /// -- this is a compile-time sizing mistake, not a runtime condition.
    pub fn new(cfg: FortunaConfig) -> Self {
        assert!(P <= MAX_POOLS, "Fortuna: pool count exceeds MAX_POOLS");

        Fortuna {
            cfg,
            pools: core::array::from_fn(|_| Pool::new()),
            gen: Generator::new(),
            reseed_count: 0,
            last_reseed_us: 0,
        }
    }

    /// `true` once the generator has been seeded at least once.
    pub fn is_seeded(&self) -> bool {
        self.gen.is_seeded()
    }

    /// Mix entropy into `pool_idx`. Rejects `data` outside `1..=32` bytes
    /// or a pool index `>= P`, leaving state unchanged.
    pub fn add_entropy(&mut self, source_id: u8, pool_idx: usize, data: &[u8]) -> Result<(), Error> {
        if data.is_empty() || data.len() > 32 || pool_idx >= P {
            return Err(Error::BadEntropy);
        }

        self.pools[pool_idx].add_entropy(source_id, data);
        Ok(())
    }

    /// Apply the reseed policy (if its gate is open) and fill `out` with
    /// fresh keystream bytes.
    pub fn read(&mut self, now_us: u64, out: &mut [u8]) -> Result<(), Error> {
        let timing_gate_open = self.cfg.reseed_timeout_us == 0
            || now_us.saturating_sub(self.last_reseed_us) > self.cfg.reseed_timeout_us;

        if self.pools[0].len() >= RESEED_MIN_POOL0_BYTES && timing_gate_open {
            self.reseed_count = self.reseed_count.wrapping_add(1);
            self.last_reseed_us = now_us;

            let mut digests = [0u8; 32 * MAX_POOLS];
            let mut n = 0usize;

            for i in 0..P {
                if self.reseed_count % (1u32 << i) == 0 {
                    let digest = self.pools[i].finalize_and_reset();
                    digests[n..n + 32].copy_from_slice(&digest);
                    n += 32;
                }
            }

            self.gen.reseed(&digests[..n]);

            log::debug!(
                "fortuna: reseed #{} mixed {} pool digests",
                self.reseed_count,
                n / 32
            );
        }

        if !self.gen.is_seeded() {
            return Err(Error::Unseeded);
        }

        self.gen.generate_data(out)
    }
}

/// Adapts a [`Fortuna`] instance and a [`Timer`] into `rand_core::RngCore`,
/// so the generator composes with the wider `rand` ecosystem.
pub struct FortunaRng<'a, T: Timer, const P: usize> {
    pub fortuna: &'a mut Fortuna<P>,
    pub timer: &'a T,
}

impl<'a, T: Timer, const P: usize> rand_core::RngCore for FortunaRng<'a, T, P> {
    fn next_u32(&mut self) -> u32 {
        let mut buf = [0u8; 4];
        self.fill_bytes(&mut buf);
        u32::from_le_bytes(buf)
    }

    fn next_u64(&mut self) -> u64 {
        let mut buf = [0u8; 8];
        self.fill_bytes(&mut buf);
        u64::from_le_bytes(buf)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.try_fill_bytes(dest)
            .expect("fortuna: read via RngCore failed (unseeded or oversized request)");
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        let now_us = self.timer.time_us() as u64;

        self.fortuna.read(now_us, dest).map_err(|_| {
            // rand_core has no no_std-friendly way to carry our richer
            // Error enum, so collapse to a single nonzero code.
            rand_core::Error::from(core::num::NonZeroU32::new(1).unwrap())
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn seed_all_pools(f: &mut Fortuna<4>) {
        for pool in 0..4 {
            f.add_entropy(0, pool, &[0x42; 32]).unwrap();
            f.add_entropy(0, pool, &[0x43; 32]).unwrap();
        }
    }

    #[test]
    fn property_9_unseeded_read_fails() {
        let mut f: Fortuna<4> = Fortuna::new(FortunaConfig::default());
        let mut out = [0u8; 16];
        assert_eq!(f.read(0, &mut out), Err(Error::Unseeded));
    }

    #[test]
    fn add_entropy_rejects_bad_length_and_index() {
        let mut f: Fortuna<4> = Fortuna::new(FortunaConfig::default());
        assert_eq!(f.add_entropy(0, 0, &[]), Err(Error::BadEntropy));
        assert_eq!(f.add_entropy(0, 0, &[0u8; 33]), Err(Error::BadEntropy));
        assert_eq!(f.add_entropy(0, 4, &[1u8; 4]), Err(Error::BadEntropy));
    }

    #[test]
    fn s8_fortuna_seed_and_forward_secrecy() {
        let cfg = FortunaConfig {
            reseed_timeout_us: 0,
        };
        let mut f: Fortuna<16> = Fortuna::new(cfg);

        let mut out = [0u8; 16];
        assert_eq!(f.read(1, &mut out), Err(Error::Unseeded));

        for pool in 0..16 {
            f.add_entropy(0, pool, &[0xAA; 32]).unwrap();
            f.add_entropy(0, pool, &[0xBB; 32]).unwrap();
        }

        let mut first = [0u8; 16];
        f.read(2, &mut first).unwrap();
        assert!(f.is_seeded());

        let mut second = [0u8; 16];
        f.read(3, &mut second).unwrap();

        assert_ne!(first, second);
    }

    #[test]
    fn reseed_timing_gate_defers_reseed() {
        let cfg = FortunaConfig {
            reseed_timeout_us: 100_000,
        };
        let mut f: Fortuna<4> = Fortuna::new(cfg);
        seed_all_pools(&mut f);

        // last_reseed_us starts at 0; now_us=50 doesn't clear the gate.
        let mut out = [0u8; 4];
        assert_eq!(f.read(50, &mut out), Err(Error::Unseeded));

        assert!(f.read(200_000, &mut out).is_ok());
        assert!(f.is_seeded());
    }

    #[test]
    fn rng_core_adapter_draws_bytes() {
        use crate::timer::mock::MockTimer;
        use rand_core::RngCore;

        let cfg = FortunaConfig {
            reseed_timeout_us: 0,
        };
        let mut f: Fortuna<4> = Fortuna::new(cfg);
        seed_all_pools(&mut f);

        let timer = MockTimer(1);
        let mut rng = FortunaRng {
            fortuna: &mut f,
            timer: &timer,
        };

        let mut buf = [0u8; 8];
        rng.fill_bytes(&mut buf);
        assert!(buf.iter().any(|&b| b != 0));
    }
}
