use std::sync::Mutex;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::value_objects::OrderReference;
use crate::store::StoreError;

// ============================================================================
// Order Reference Generation
// ============================================================================
//
// Codes are 4 symbols drawn independently and uniformly from an alphabet
// without the look-alikes 0/O and 1/I. Each candidate is checked against
// the order store with a short standalone read; collisions simply draw again.
//
// ============================================================================

pub const REFERENCE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const REFERENCE_LENGTH: usize = 4;

/// Uniqueness lookup for candidate references.
#[async_trait]
pub trait ReferenceRegistry: Send + Sync {
    async fn reference_exists(&self, code: &str) -> Result<bool, StoreError>;
}

/// A freshly generated reference and how many candidates were rejected first.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedReference {
    pub reference: OrderReference,
    pub collisions: u32,
}

pub struct ReferenceGenerator {
    rng: Mutex<StdRng>,
}

impl ReferenceGenerator {
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Deterministic sequence of candidates, for tests and reproducible runs.
    pub fn seeded(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self { rng: Mutex::new(rng) }
    }

    /// Draw one candidate. The lock is released before any store access.
    pub fn candidate(&self) -> OrderReference {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let code: String = (0..REFERENCE_LENGTH)
            .map(|_| REFERENCE_ALPHABET[rng.gen_range(0..REFERENCE_ALPHABET.len())] as char)
            .collect();
        OrderReference::new(code)
    }

    /// Draw candidates until one is not yet taken.
    pub async fn generate<R>(&self, registry: &R) -> Result<GeneratedReference, StoreError>
    where
        R: ReferenceRegistry + ?Sized,
    {
        let mut collisions = 0;

        loop {
            let candidate = self.candidate();

            if !registry.reference_exists(candidate.as_str()).await? {
                return Ok(GeneratedReference {
                    reference: candidate,
                    collisions,
                });
            }

            collisions += 1;
            tracing::debug!(
                reference = %candidate,
                collisions = collisions,
                "Order reference already taken, drawing again"
            );
        }
    }
}

impl Default for ReferenceGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct TakenSet(HashSet<String>);

    #[async_trait]
    impl ReferenceRegistry for TakenSet {
        async fn reference_exists(&self, code: &str) -> Result<bool, StoreError> {
            Ok(self.0.contains(code))
        }
    }

    #[test]
    fn test_candidate_shape() {
        let generator = ReferenceGenerator::new();

        for _ in 0..500 {
            let code = generator.candidate();
            assert_eq!(code.as_str().len(), REFERENCE_LENGTH);
            assert!(code.as_str().bytes().all(|b| REFERENCE_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn test_alphabet_excludes_confusable_symbols() {
        for confusable in [b'0', b'O', b'1', b'I'] {
            assert!(!REFERENCE_ALPHABET.contains(&confusable));
        }
        assert_eq!(REFERENCE_ALPHABET.len(), 32);
    }

    #[test]
    fn test_seeded_generators_repeat() {
        let a = ReferenceGenerator::seeded(7);
        let b = ReferenceGenerator::seeded(7);

        for _ in 0..10 {
            assert_eq!(a.candidate(), b.candidate());
        }
    }

    #[tokio::test]
    async fn test_generate_without_collision() {
        let generator = ReferenceGenerator::seeded(1);
        let expected = ReferenceGenerator::seeded(1).candidate();

        let generated = generator.generate(&TakenSet(HashSet::new())).await.unwrap();

        assert_eq!(generated.reference, expected);
        assert_eq!(generated.collisions, 0);
    }

    #[tokio::test]
    async fn test_generate_retries_after_forced_collision() {
        let probe = ReferenceGenerator::seeded(42);
        let first = probe.candidate();
        let second = probe.candidate();
        assert_ne!(first, second);

        let taken = TakenSet(HashSet::from([first.as_str().to_string()]));
        let generated = ReferenceGenerator::seeded(42).generate(&taken).await.unwrap();

        assert_eq!(generated.reference, second);
        assert_eq!(generated.collisions, 1);
    }
}
