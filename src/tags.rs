use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Marker prepended to tags when the caller does not pick one.
pub const DEFAULT_TAG_PREFIX: &str = ":";

const ALPHA: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const ALPHA_LEN: usize = 12;

struct AllocatorState {
    rng: ChaCha8Rng,
    issued: HashSet<String>,
}

/// Issues opaque placeholder tags that are unique for the allocator's lifetime.
///
/// A tag is `prefix` + 12 ASCII letters + a number in `1000..=9999`; every tag of a
/// given prefix has the same length, so no tag is a prefix of another. Clones share
/// state, so handing a clone to each injector keeps uniqueness across all of them.
#[derive(Clone)]
pub struct TagAllocator {
    state: Arc<Mutex<AllocatorState>>,
}

impl TagAllocator {
    /// Allocator seeded from the thread RNG.
    #[must_use]
    pub fn new() -> Self {
        Self::from_rng(ChaCha8Rng::seed_from_u64(rand::random()))
    }

    /// Deterministic allocator, for reproducible tests.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self::from_rng(ChaCha8Rng::seed_from_u64(seed))
    }

    fn from_rng(rng: ChaCha8Rng) -> Self {
        Self {
            state: Arc::new(Mutex::new(AllocatorState {
                rng,
                issued: HashSet::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AllocatorState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Issue a fresh tag. `None` uses [`DEFAULT_TAG_PREFIX`].
    pub fn next_tag(&self, prefix: Option<&str>) -> String {
        let prefix = prefix.unwrap_or(DEFAULT_TAG_PREFIX);
        let mut state = self.lock();
        loop {
            let mut candidate = String::with_capacity(prefix.len() + ALPHA_LEN + 4);
            candidate.push_str(prefix);
            for _ in 0..ALPHA_LEN {
                let idx = state.rng.random_range(0..ALPHA.len());
                candidate.push(char::from(ALPHA[idx]));
            }
            let suffix: u16 = state.rng.random_range(1000..=9999);
            candidate.push_str(&suffix.to_string());

            if state.issued.insert(candidate.clone()) {
                return candidate;
            }
            tracing::trace!(tag = %candidate, "tag collision, retrying");
        }
    }

    /// Number of tags issued so far.
    #[must_use]
    pub fn issued(&self) -> usize {
        self.lock().issued.len()
    }
}

impl Default for TagAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TagAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagAllocator")
            .field("issued", &self.issued())
            .finish()
    }
}
