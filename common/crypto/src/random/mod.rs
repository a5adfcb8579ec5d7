// Copyright 2024 - Shroud Network <dev@shroud.network>
// SPDX-License-Identifier: Apache-2.0

//! The process-wide seeded CSPRNG and the sampling helpers built on it.
//!
//! The generator must be seeded (normally by [`crate::initialize`]) before
//! any bytes can be drawn; using it earlier reports [`RandomError::NotSeeded`].

use rand::rngs::OsRng;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::encoding::base32;

/// How much entropy we pull from the platform when (re)seeding.
const SEED_LEN: usize = 32;

/// Entropy devices to try, in order of preference.
#[cfg(unix)]
const ENTROPY_SOURCES: &[&str] = &["/dev/srandom", "/dev/urandom", "/dev/random"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RandomError {
    #[error("the random generator has not been seeded")]
    NotSeeded,

    #[error("no entropy source could be opened")]
    NoEntropySource,

    #[error("entropy source delivered only {read} of {SEED_LEN} bytes")]
    ShortEntropyRead { read: usize },

    #[error("cannot choose from an empty sequence")]
    EmptySequence,
}

/// Seeded-or-unseeded state of one generator. The process-wide instance
/// lives in [`GLOBAL_RNG`]; keeping the logic on a plain struct keeps it
/// testable without touching global state.
struct RngState {
    rng: Option<ChaCha20Rng>,
}

impl RngState {
    const fn new() -> Self {
        RngState { rng: None }
    }

    fn install_seed(&mut self, seed: [u8; SEED_LEN]) {
        self.rng = Some(ChaCha20Rng::from_seed(seed));
    }

    fn fill(&mut self, out: &mut [u8]) -> Result<(), RandomError> {
        match self.rng.as_mut() {
            Some(rng) => {
                rng.fill_bytes(out);
                Ok(())
            }
            None => Err(RandomError::NotSeeded),
        }
    }

    fn wipe(&mut self) {
        self.rng = None;
    }
}

static GLOBAL_RNG: Mutex<RngState> = Mutex::new(RngState::new());

/// Seed (or reseed) the process generator from the operating system.
///
/// `startup` marks the very first seeding, before the process has opened
/// file descriptors in any number; it only affects logging. The platform
/// generator is polled first and acts as a fallback: if it produced bytes,
/// the complete absence of an entropy device is not fatal. A device that
/// opens but comes up short *is* fatal.
pub fn seed_rng(startup: bool) -> Result<(), RandomError> {
    let mut seed = Zeroizing::new([0u8; SEED_LEN]);

    let poll_ok = OsRng.try_fill_bytes(&mut *seed).is_ok();
    if !poll_ok {
        warn!("platform RNG poll failed");
    }
    if startup && poll_ok {
        info!("performed startup entropy poll");
    }

    match mix_in_entropy_device(&mut seed) {
        Ok(()) => {}
        Err(RandomError::NoEntropySource) if poll_ok => {
            info!("seeding RNG from the platform generator only");
        }
        Err(err) => return Err(err),
    }

    GLOBAL_RNG
        .lock()
        .expect("rng lock poisoned")
        .install_seed(*seed);
    Ok(())
}

/// XOR 32 bytes from the first entropy device that opens into `seed`.
#[cfg(unix)]
fn mix_in_entropy_device(seed: &mut [u8; SEED_LEN]) -> Result<(), RandomError> {
    use std::fs::File;
    use std::io::Read;

    for path in ENTROPY_SOURCES {
        let Ok(mut device) = File::open(path) else {
            continue;
        };
        info!("Seeding RNG from {path:?}");

        let mut buf = Zeroizing::new([0u8; SEED_LEN]);
        let mut read = 0;
        while read < SEED_LEN {
            match device.read(&mut buf[read..]) {
                Ok(0) => break,
                Ok(n) => read += n,
                Err(_) => break,
            }
        }
        if read != SEED_LEN {
            warn!("Error reading from entropy source (read only {read} bytes).");
            return Err(RandomError::ShortEntropyRead { read });
        }

        for (s, b) in seed.iter_mut().zip(buf.iter()) {
            *s ^= b;
        }
        return Ok(());
    }

    warn!("Cannot seed RNG -- no entropy source found.");
    Err(RandomError::NoEntropySource)
}

/// On this family of platforms the crypto provider handle behind `OsRng`
/// is the entropy device; the poll already read from it.
#[cfg(not(unix))]
fn mix_in_entropy_device(_seed: &mut [u8; SEED_LEN]) -> Result<(), RandomError> {
    Err(RandomError::NoEntropySource)
}

/// Drop the seeded generator; later draws report [`RandomError::NotSeeded`].
pub(crate) fn unseed() {
    GLOBAL_RNG.lock().expect("rng lock poisoned").wipe();
}

/// Fill `out` with cryptographically strong random bytes.
pub fn random_bytes(out: &mut [u8]) -> Result<(), RandomError> {
    GLOBAL_RNG.lock().expect("rng lock poisoned").fill(out)
}

/// Run `f` against the seeded generator, for callers that need to hand a
/// `CryptoRng` to another library.
pub(crate) fn with_rng<T>(f: impl FnOnce(&mut ChaCha20Rng) -> T) -> Result<T, RandomError> {
    let mut state = GLOBAL_RNG.lock().expect("rng lock poisoned");
    match state.rng.as_mut() {
        Some(rng) => Ok(f(rng)),
        None => Err(RandomError::NotSeeded),
    }
}

/// Uniform integer in `[0, max)` for `0 < max < u32::MAX`.
///
/// Values in the biased tail of the generator's range are redrawn rather
/// than reduced, so the result carries no modulo bias.
pub fn random_int(max: u32) -> Result<u32, RandomError> {
    sample_u32(max, || {
        let mut buf = [0u8; 4];
        random_bytes(&mut buf)?;
        Ok(u32::from_ne_bytes(buf))
    })
}

/// Uniform integer in `[0, max)` for `0 < max < u64::MAX`.
pub fn random_u64(max: u64) -> Result<u64, RandomError> {
    sample_u64(max, || {
        let mut buf = [0u8; 8];
        random_bytes(&mut buf)?;
        Ok(u64::from_ne_bytes(buf))
    })
}

fn sample_u32(
    max: u32,
    mut draw: impl FnMut() -> Result<u32, RandomError>,
) -> Result<u32, RandomError> {
    assert!(max > 0);
    assert!(max < u32::MAX);

    // Ignore draws at or above the cutoff so the reduction stays uniform.
    let cutoff = u32::MAX - (u32::MAX % max);
    loop {
        let val = draw()?;
        if val < cutoff {
            return Ok(val % max);
        }
    }
}

fn sample_u64(
    max: u64,
    mut draw: impl FnMut() -> Result<u64, RandomError>,
) -> Result<u64, RandomError> {
    assert!(max > 0);
    assert!(max < u64::MAX);

    let cutoff = u64::MAX - (u64::MAX % max);
    loop {
        let val = draw()?;
        if val < cutoff {
            return Ok(val % max);
        }
    }
}

/// Scramble `seq` into a random order.
///
/// Fisher-Yates from the end; each step draws from `[0, i]` inclusive, so
/// "no swap" is exactly as likely as any particular swap.
pub fn shuffle<T>(seq: &mut [T]) -> Result<(), RandomError> {
    for i in (1..seq.len()).rev() {
        let j = random_int(i as u32 + 1)? as usize;
        seq.swap(i, j);
    }
    Ok(())
}

/// A uniformly chosen element of `seq`.
pub fn choose<T>(seq: &[T]) -> Result<&T, RandomError> {
    if seq.is_empty() {
        return Err(RandomError::EmptySequence);
    }
    let idx = random_int(seq.len() as u32)? as usize;
    Ok(&seq[idx])
}

/// `prefix || r || suffix` where `r` is between `min_rand_len` and
/// `max_rand_len` random base32 characters.
pub fn random_hostname(
    min_rand_len: usize,
    max_rand_len: usize,
    prefix: &str,
    suffix: &str,
) -> Result<String, RandomError> {
    assert!(max_rand_len >= min_rand_len);
    let rand_len = min_rand_len + random_int((max_rand_len - min_rand_len + 1) as u32)? as usize;

    // Enough bytes to cover rand_len characters, rounded up to the 5-byte
    // granularity the encoder requires.
    let mut rand_bytes_len = (rand_len * 5 + 7) / 8;
    if rand_bytes_len % 5 != 0 {
        rand_bytes_len += 5 - rand_bytes_len % 5;
    }

    let mut rand_bytes = vec![0u8; rand_bytes_len];
    random_bytes(&mut rand_bytes)?;
    let encoded =
        base32::base32_encode(&rand_bytes).expect("length was rounded to a multiple of five");

    let mut result = String::with_capacity(prefix.len() + rand_len + suffix.len());
    result.push_str(prefix);
    result.push_str(&encoded[..rand_len]);
    result.push_str(suffix);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn seeded() {
        seed_rng(true).expect("an entropy source should be available in tests");
    }

    #[test]
    fn unseeded_state_refuses_to_fill() {
        let mut state = RngState::new();
        let mut buf = [0u8; 8];
        assert_eq!(state.fill(&mut buf), Err(RandomError::NotSeeded));

        state.install_seed([7u8; SEED_LEN]);
        assert!(state.fill(&mut buf).is_ok());

        state.wipe();
        assert_eq!(state.fill(&mut buf), Err(RandomError::NotSeeded));
    }

    #[test]
    fn seeded_state_is_deterministic_per_seed() {
        let mut a = RngState::new();
        let mut b = RngState::new();
        a.install_seed([1u8; SEED_LEN]);
        b.install_seed([1u8; SEED_LEN]);

        let (mut x, mut y) = ([0u8; 16], [0u8; 16]);
        a.fill(&mut x).unwrap();
        b.fill(&mut y).unwrap();
        assert_eq!(x, y);
    }

    #[test]
    fn random_bytes_vary() {
        seeded();
        let (mut a, mut b) = ([0u8; 32], [0u8; 32]);
        random_bytes(&mut a).unwrap();
        random_bytes(&mut b).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn sampler_redraws_at_the_cutoff_instead_of_reducing() {
        // For max = 3 the cutoff is u32::MAX, so a draw of u32::MAX must be
        // rejected and the next draw used instead.
        let mut draws = [u32::MAX, 5].into_iter();
        let out = sample_u32(3, || Ok(draws.next().expect("sampler gave up early"))).unwrap();
        assert_eq!(out, 5 % 3);
        assert_eq!(draws.next(), None);
    }

    #[test]
    fn sampler_redraws_u64_tail() {
        let max = (1u64 << 63) + 1;
        let cutoff = u64::MAX - (u64::MAX % max);
        let mut draws = [cutoff, u64::MAX, 42].into_iter();
        let out = sample_u64(max, || Ok(draws.next().unwrap())).unwrap();
        assert_eq!(out, 42);
    }

    #[test]
    fn bounded_ints_stay_in_range() {
        seeded();
        for max in [2u32, 7, 257, (1 << 31) - 1] {
            for _ in 0..200 {
                assert!(random_int(max).unwrap() < max);
            }
        }
        for _ in 0..200 {
            assert!(random_u64(10_000_000_000).unwrap() < 10_000_000_000);
        }
    }

    #[test]
    fn small_ranges_are_covered() {
        seeded();
        for max in [2u32, 7] {
            let mut seen = HashSet::new();
            for _ in 0..1000 {
                seen.insert(random_int(max).unwrap());
            }
            assert_eq!(seen.len(), max as usize);
        }
    }

    #[test]
    fn random_int_of_one_is_zero() {
        seeded();
        for _ in 0..10 {
            assert_eq!(random_int(1).unwrap(), 0);
        }
    }

    #[test]
    fn shuffle_preserves_elements() {
        seeded();
        let mut seq: Vec<u32> = (0..50).collect();
        shuffle(&mut seq).unwrap();
        let mut sorted = seq.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn choose_is_uniformish_and_rejects_empty() {
        seeded();
        let empty: [u8; 0] = [];
        assert_eq!(choose(&empty), Err(RandomError::EmptySequence));

        let seq = [1u8, 2, 3];
        let mut seen = HashSet::new();
        for _ in 0..200 {
            seen.insert(*choose(&seq).unwrap());
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn hostnames_have_the_requested_shape() {
        seeded();
        for _ in 0..50 {
            let name = random_hostname(8, 16, "www.", ".example").unwrap();
            assert!(name.starts_with("www."));
            assert!(name.ends_with(".example"));
            let rand_part = &name["www.".len()..name.len() - ".example".len()];
            assert!((8..=16).contains(&rand_part.len()));
            assert!(rand_part
                .bytes()
                .all(|c| base32::BASE32_ALPHABET.contains(&c)));
        }
    }
}
