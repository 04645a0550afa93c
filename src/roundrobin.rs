use std::sync::atomic::{AtomicUsize, Ordering};

/// Process-wide rotating cursor over the upstream roster. Unweighted — the
/// data model carries no per-upstream weight, so a plain modular counter
/// gives the fairness property directly instead of degenerating to it from
/// weighted prefix sums.
pub struct RoundRobin {
    upstreams: Vec<String>,
    cursor: AtomicUsize,
}

impl RoundRobin {
    pub fn new(upstreams: Vec<String>) -> Self {
        Self {
            upstreams,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Select the next upstream, advancing the cursor atomically. Returns
    /// `None` if the roster is empty.
    pub fn next(&self) -> Option<&str> {
        if self.upstreams.is_empty() {
            return None;
        }
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % self.upstreams.len();
        Some(self.upstreams[idx].as_str())
    }

    pub fn upstreams(&self) -> &[String] {
        &self.upstreams
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_empty_roster() {
        let rr = RoundRobin::new(vec![]);
        assert_eq!(rr.next(), None);
    }

    #[test]
    fn test_single_upstream_always_selected() {
        let rr = RoundRobin::new(vec!["http://a".to_string()]);
        for _ in 0..10 {
            assert_eq!(rr.next(), Some("http://a"));
        }
    }

    #[test]
    fn test_fairness_each_upstream_gets_k_requests() {
        let upstreams = vec!["http://a", "http://b", "http://c"];
        let rr = RoundRobin::new(upstreams.iter().map(|s| s.to_string()).collect());
        let k = 100;
        let mut counts: HashMap<&str, u32> = HashMap::new();
        for _ in 0..(k * upstreams.len()) {
            *counts.entry(rr.next().unwrap()).or_insert(0) += 1;
        }
        for u in upstreams {
            assert_eq!(counts[u], k as u32);
        }
    }

    #[test]
    fn test_rotates_in_order() {
        let rr = RoundRobin::new(vec!["http://a".into(), "http://b".into()]);
        assert_eq!(rr.next(), Some("http://a"));
        assert_eq!(rr.next(), Some("http://b"));
        assert_eq!(rr.next(), Some("http://a"));
    }
}
