//! Worker identifier allocation.

use std::collections::BTreeSet;
use std::fmt;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Small non-negative worker identifier. Identifiers are recycled after retirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorkerUid(pub usize);

impl fmt::Display for WorkerUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Allocates and recycles worker identifiers.
pub trait UidGenerator: Send + Sync {
    /// Reserve an identifier.
    fn generate(&self) -> WorkerUid;
    /// Release an identifier for reuse.
    fn collect(&self, uid: WorkerUid);
}

/// Hands out the smallest identifier not currently in use.
#[derive(Debug, Default)]
pub struct Generator {
    in_use: Mutex<BTreeSet<usize>>,
}

impl Generator {
    /// Create a generator with no identifiers reserved.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of identifiers currently reserved.
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.in_use.lock().len()
    }
}

impl UidGenerator for Generator {
    fn generate(&self) -> WorkerUid {
        let mut in_use = self.in_use.lock();
        // `in_use` holds n ids, so a gap exists in 0..=n.
        let uid = (0..=in_use.len())
            .find(|candidate| !in_use.contains(candidate))
            .unwrap_or(in_use.len());
        in_use.insert(uid);
        WorkerUid(uid)
    }

    fn collect(&self, uid: WorkerUid) {
        self.in_use.lock().remove(&uid.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_generate_sequential() {
        let generator = Generator::new();
        assert_eq!(generator.generate(), WorkerUid(0));
        assert_eq!(generator.generate(), WorkerUid(1));
        assert_eq!(generator.generate(), WorkerUid(2));
        assert_eq!(generator.in_use(), 3);
    }

    #[test]
    fn test_collected_uid_is_reused_first() {
        let generator = Generator::new();
        for _ in 0..4 {
            generator.generate();
        }
        generator.collect(WorkerUid(1));
        generator.collect(WorkerUid(3));
        assert_eq!(generator.generate(), WorkerUid(1));
        assert_eq!(generator.generate(), WorkerUid(3));
        assert_eq!(generator.generate(), WorkerUid(4));
    }

    #[test]
    fn test_concurrent_generate_is_unique() {
        let generator = Arc::new(Generator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let generator = Arc::clone(&generator);
                thread::spawn(move || (0..50).map(|_| generator.generate()).collect::<Vec<_>>())
            })
            .collect();

        let mut all: Vec<_> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 400);
        assert_eq!(all.last(), Some(&WorkerUid(399)));
    }
}
