// Reachability Prober Port
// reason: async-trait (probes shell out to the OS echo facility)
use async_trait::async_trait;
use std::time::Duration;

use crate::domain::Reachability;

/// Echo-probe port used by the connectivity monitor
///
/// Implementations never fail: any fault while probing (missing facility,
/// permission, spawn error) is logged and reported as `Unreachable`.
#[async_trait]
pub trait ReachabilityProber: Send + Sync {
    /// Send a batch of `attempts` echo requests to `target`
    ///
    /// # Returns
    /// `Reachable` if at least one reply arrived
    async fn probe(&self, target: &str, attempts: u32, per_attempt_timeout: Duration)
        -> Reachability;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex};

    /// One recorded probe call
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct ProbeCall {
        pub target: String,
        pub attempts: u32,
    }

    /// Prober answering from per-target scripted queues
    ///
    /// When a target's queue is empty the fallback result is returned.
    #[derive(Clone)]
    pub struct ScriptedProber {
        scripts: Arc<Mutex<HashMap<String, VecDeque<Reachability>>>>,
        fallback: Reachability,
        calls: Arc<Mutex<Vec<ProbeCall>>>,
    }

    impl ScriptedProber {
        pub fn new(fallback: Reachability) -> Self {
            Self {
                scripts: Arc::new(Mutex::new(HashMap::new())),
                fallback,
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        /// Queue results for a target (consumed in order)
        pub fn push(&self, target: &str, results: &[Reachability]) {
            let mut scripts = self.scripts.lock().unwrap();
            scripts
                .entry(target.to_string())
                .or_default()
                .extend(results.iter().copied());
        }

        pub fn calls(&self) -> Vec<ProbeCall> {
            self.calls.lock().unwrap().clone()
        }

        pub fn calls_for(&self, target: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.target == target)
                .count()
        }
    }

    #[async_trait]
    impl ReachabilityProber for ScriptedProber {
        async fn probe(
            &self,
            target: &str,
            attempts: u32,
            _per_attempt_timeout: Duration,
        ) -> Reachability {
            self.calls.lock().unwrap().push(ProbeCall {
                target: target.to_string(),
                attempts,
            });
            self.scripts
                .lock()
                .unwrap()
                .get_mut(target)
                .and_then(|q| q.pop_front())
                .unwrap_or(self.fallback)
        }
    }
}
