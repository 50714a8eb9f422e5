//! Deterministic salt, decoy and shuffle sources shared by the integration
//! tests. Reproducible inputs keep issued credentials byte-stable without
//! weakening the uniqueness guarantees the factory checks.
#![allow(dead_code)]

use base64::{prelude::BASE64_URL_SAFE_NO_PAD, Engine};
use rand::{CryptoRng, Error, RngCore};
use sd_jwt_core::{DecoySource, SaltSource, SdAlg, SdJwtFactory};

/// Counter-based salt source: unique, readable salts.
#[derive(Debug, Default)]
pub struct CounterSalts(u32);

impl SaltSource for CounterSalts {
    fn next_salt(&mut self) -> String {
        self.0 += 1;
        format!("salt-{:04}", self.0)
    }
}

/// Salt source that always returns the same salt, standing in for a broken
/// RNG.
#[derive(Debug)]
pub struct ConstSalts(pub &'static str);

impl SaltSource for ConstSalts {
    fn next_salt(&mut self) -> String {
        self.0.to_owned()
    }
}

/// Counter-based decoy source: digest-shaped, pairwise distinct values.
#[derive(Debug, Default)]
pub struct CounterDecoys(u32);

impl DecoySource for CounterDecoys {
    fn decoy_digest(&mut self, alg: SdAlg) -> String {
        self.0 += 1;
        BASE64_URL_SAFE_NO_PAD.encode(alg.hash_bytes(format!("decoy-{}", self.0).as_bytes()))
    }
}

/// Decoy source that always returns the same digest, standing in for a broken
/// RNG.
#[derive(Debug)]
pub struct ConstDecoys(pub &'static str);

impl DecoySource for ConstDecoys {
    fn decoy_digest(&mut self, _alg: SdAlg) -> String {
        self.0.to_owned()
    }
}

/// Seeded PCG-style generator. Only used to make the `_sd` shuffle
/// reproducible; it is not a cryptographic RNG, which is exactly why tests
/// inject it explicitly.
pub struct TestRng(pub u64);

impl RngCore for TestRng {
    fn next_u32(&mut self) -> u32 {
        self.next_u64() as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(8) {
            let bytes = self.next_u64().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl CryptoRng for TestRng {}

/// A factory over fully deterministic sources.
pub fn deterministic_factory(
    alg: SdAlg,
) -> SdJwtFactory<CounterSalts, CounterDecoys, TestRng> {
    SdJwtFactory::with_sources(
        alg,
        CounterSalts::default(),
        CounterDecoys::default(),
        TestRng(0x5eed),
    )
}
