//! Ping failure backoff and banning.
//!
//! A failure that arrives while the node is still suspect from a previous
//! failure doubles the counter instead of incrementing it, so bursts of
//! failures inside one suspect window reach the ban threshold quickly while
//! isolated failures only creep up.

use super::Registry;
use crate::config::RegistryConfig;
use crate::error::{display_id, Result};
use crate::storage::Storage;
use crate::types::{Node, Role};
use log::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingPolicy {
    pub suspect_interval: u64,
    pub max_failed_pings: u64,
}

impl From<&RegistryConfig> for PingPolicy {
    fn from(config: &RegistryConfig) -> Self {
        Self {
            suspect_interval: config.suspect_interval_secs,
            max_failed_pings: config.max_failed_pings,
        }
    }
}

impl PingPolicy {
    fn is_suspect(&self, node: &Node, now: u64) -> bool {
        node.last_failure
            .map_or(false, |at| now.saturating_sub(at) < self.suspect_interval)
    }

    /// Apply one ping result to `node`. Returns whether the failure counter
    /// is over the threshold. The `Banned` role, once set, stays set even
    /// when the counter later recovers.
    pub fn apply(&self, node: &mut Node, alive: bool, now: u64) -> bool {
        let suspect = self.is_suspect(node, now);
        if alive {
            if suspect {
                node.fping = node.fping.saturating_sub(1);
            } else {
                node.fping = 0;
                node.last_failure = None;
            }
        } else {
            if node.fping != 0 && suspect {
                node.fping = node.fping.saturating_mul(2);
            } else {
                node.fping = node.fping.saturating_add(1);
            }
            node.last_failure = Some(now);
        }

        let over = node.fping > self.max_failed_pings;
        if over {
            node.role = Role::Banned;
        }
        over
    }
}

impl<S: Storage> Registry<S> {
    /// Record the outcome of a health check on `node_id` at time `now`.
    /// Returns whether the node is over the failure threshold.
    pub fn record_ping_result(&mut self, node_id: &[u8], alive: bool, now: u64) -> Result<bool> {
        let mut node = self.load_node(node_id)?;
        let was_banned = node.is_banned();
        let over = PingPolicy::from(self.config()).apply(&mut node, alive, now);
        self.save_node(node_id, &node)?;

        if node.is_banned() && !was_banned {
            warn!(
                "Provider {} banned after {} failed pings",
                display_id(node_id),
                node.fping
            );
        } else {
            debug!(
                "Ping of {} alive={} fping={}",
                display_id(node_id),
                alive,
                node.fping
            );
        }
        Ok(over)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::error::RegistryError;
    use num_bigint::BigUint;

    const HOUR: u64 = 3600;

    fn policy() -> PingPolicy {
        PingPolicy::from(&RegistryConfig::default())
    }

    fn node() -> Node {
        Node::new(1, BigUint::from(1u8), vec![], vec![], vec![], vec![])
    }

    #[test]
    fn test_isolated_failures_increment() {
        let policy = policy();
        let mut node = node();
        let t0 = 1_000_000;
        for i in 1..=5u64 {
            assert!(!policy.apply(&mut node, false, t0 + i * (HOUR + 1)));
            assert_eq!(node.fping, i);
        }
        assert!(policy.apply(&mut node, false, t0 + 6 * (HOUR + 1)));
        assert_eq!(node.fping, 6);
        assert_eq!(node.role, Role::Banned);
    }

    #[test]
    fn test_failures_within_window_double() {
        let policy = policy();
        let mut node = node();
        let t0 = 1_000_000;
        policy.apply(&mut node, false, t0);
        assert_eq!(node.fping, 1);
        policy.apply(&mut node, false, t0 + 10);
        assert_eq!(node.fping, 2);
        policy.apply(&mut node, false, t0 + 20);
        assert_eq!(node.fping, 4);
        assert!(policy.apply(&mut node, false, t0 + 30));
        assert_eq!(node.fping, 8);
    }

    #[test]
    fn test_recovery_inside_window_decrements() {
        let policy = policy();
        let mut node = node();
        let t0 = 1_000_000;
        policy.apply(&mut node, false, t0);
        policy.apply(&mut node, false, t0 + 1);
        assert_eq!(node.fping, 2);

        policy.apply(&mut node, true, t0 + 2);
        assert_eq!(node.fping, 1);
        policy.apply(&mut node, true, t0 + 3);
        policy.apply(&mut node, true, t0 + 4);
        assert_eq!(node.fping, 0);
        assert_eq!(node.last_failure, Some(t0 + 1));
    }

    #[test]
    fn test_recovery_after_window_resets() {
        let policy = policy();
        let mut node = node();
        let t0 = 1_000_000;
        policy.apply(&mut node, false, t0);
        policy.apply(&mut node, false, t0 + 1);
        policy.apply(&mut node, true, t0 + 1 + HOUR);
        assert_eq!(node.fping, 0);
        assert_eq!(node.last_failure, None);
    }

    #[test]
    fn test_first_failure_never_suspect() {
        // a node that never failed is not inside any window, even at t=0
        let policy = policy();
        let mut node = node();
        policy.apply(&mut node, true, 0);
        assert_eq!(node.fping, 0);
        policy.apply(&mut node, false, 0);
        assert_eq!(node.fping, 1);
    }

    #[test]
    fn test_ban_is_sticky() {
        let policy = policy();
        let mut node = node();
        for t in 0..4 {
            policy.apply(&mut node, false, 1_000 + t);
        }
        assert!(node.is_banned());
        // a recovery past the window clears the counter, so the result is
        // false, but the role keeps the ban
        assert!(!policy.apply(&mut node, true, 1_000 + HOUR * 10));
        assert_eq!(node.fping, 0);
        assert!(node.is_banned());
    }

    #[test]
    fn test_recovered_node_reports_not_over_threshold() {
        let (mut registry, _) = registry();
        register(&mut registry, "n1", 1000);
        for t in 1_000..1_004 {
            registry.record_ping_result(b"n1", false, t).unwrap();
        }
        assert_eq!(registry.load_node(b"n1").unwrap().fping, 8);

        assert!(!registry.record_ping_result(b"n1", true, 101_000).unwrap());
        assert_eq!(registry.get_info(b"n1").unwrap().role, Role::Banned);
    }

    #[test]
    fn test_counter_saturates() {
        let policy = policy();
        let mut node = node();
        node.fping = u64::MAX / 2 + 1;
        node.last_failure = Some(10);
        policy.apply(&mut node, false, 11);
        assert_eq!(node.fping, u64::MAX);
    }

    #[test]
    fn test_six_failures_ban_through_registry() {
        let config = RegistryConfig {
            suspect_interval_secs: 0,
            ..Default::default()
        };
        let (mut registry, _) = registry_with(config);
        register(&mut registry, "n1", 1000);

        let t = 1_700_000_000;
        for i in 0..5 {
            assert!(!registry.record_ping_result(b"n1", false, t + i).unwrap());
        }
        assert!(registry.record_ping_result(b"n1", false, t + 5).unwrap());
        assert_eq!(registry.load_node(b"n1").unwrap().fping, 6);
        assert_eq!(registry.get_info(b"n1").unwrap().role, Role::Banned);

        assert!(registry.record_ping_result(b"n1", false, t + 6).unwrap());
        assert!(matches!(
            registry.record_ping_result(b"ghost", true, t),
            Err(RegistryError::NotFound(_))
        ));
    }
}
