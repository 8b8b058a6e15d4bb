//! Name generation: random suffixes and pod template hashes

use k8s_openapi::api::core::v1::PodTemplateSpec;
use rand::Rng;

use crate::Result;

/// Alphabet without vowels or look-alike characters, so generated names never spell words
pub const SAFE_ALPHANUMS: &[u8] = b"bcdfghjklmnpqrstvwxz2456789";

const FNV32_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV32_PRIME: u32 = 0x0100_0193;

/// Random string of `n` characters from [`SAFE_ALPHANUMS`]
pub fn rand_string(n: usize) -> String {
    let mut rng = rand::rng();
    (0..n)
        .map(|_| char::from(SAFE_ALPHANUMS[rng.random_range(0..SAFE_ALPHANUMS.len())]))
        .collect()
}

/// Map every byte of `s` onto [`SAFE_ALPHANUMS`]
pub fn safe_encode_string(s: &str) -> String {
    s.bytes()
        .map(|b| char::from(SAFE_ALPHANUMS[usize::from(b) % SAFE_ALPHANUMS.len()]))
        .collect()
}

/// 32-bit FNV-1a
#[derive(Clone, Copy, Debug)]
pub struct Fnv32a(u32);

impl Default for Fnv32a {
    fn default() -> Self {
        Self(FNV32_OFFSET_BASIS)
    }
}

impl Fnv32a {
    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= u32::from(b);
            self.0 = self.0.wrapping_mul(FNV32_PRIME);
        }
    }

    pub fn sum32(&self) -> u32 {
        self.0
    }
}

/// Revision hash for a pod template, as used in ControllerRevision names and
/// the `controller-revision-hash` label
///
/// A collision count, when present, is folded in as eight little-endian bytes
/// so that bumping it yields a fresh name for the same template.
pub fn compute_hash(template: &PodTemplateSpec, collision_count: Option<i32>) -> Result<String> {
    let mut hasher = Fnv32a::default();
    hasher.write(&serde_json::to_vec(template)?);

    if let Some(count) = collision_count {
        hasher.write(&u64::from(count as u32).to_le_bytes());
    }

    Ok(safe_encode_string(&hasher.sum32().to_string()))
}
