//! Disposition counters.
//!
//! Tags carry a numeric prefix (`01_total`, `02_language`, …) so that
//! reports come out in chain order. Counters form a monoid under
//! element-wise addition; aggregation across shards is
//! order-independent.
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Tag every record is accounted under before the chain runs.
pub const TOTAL_TAG: &str = "01_total";

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterCounter {
    counts: BTreeMap<String, u64>,
}

impl FilterCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, tag: &str) {
        self.add_n(tag, 1);
    }

    pub fn add_n(&mut self, tag: &str, n: u64) {
        *self.counts.entry(tag.to_string()).or_insert(0) += n;
    }

    pub fn get(&self, tag: &str) -> u64 {
        self.counts.get(tag).copied().unwrap_or(0)
    }

    /// Element-wise sum. Commutative: merge order does not matter.
    pub fn merge(&mut self, other: FilterCounter) {
        for (tag, count) in other.counts {
            *self.counts.entry(tag).or_insert(0) += count;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(tag, count)| (tag.as_str(), *count))
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

impl fmt::Display for FilterCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.get(TOTAL_TAG);
        for (tag, count) in self.iter() {
            if total > 0 {
                writeln!(
                    f,
                    "{}: {} ({:.2}%)",
                    tag,
                    count,
                    (count as f64) / (total as f64) * 100.0
                )?;
            } else {
                writeln!(f, "{}: {}", tag, count)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{FilterCounter, TOTAL_TAG};

    #[test]
    fn test_merge_is_elementwise() {
        let mut a = FilterCounter::new();
        a.add(TOTAL_TAG);
        a.add(TOTAL_TAG);
        a.add("02_language");

        let mut b = FilterCounter::new();
        b.add(TOTAL_TAG);
        b.add("03_passed");

        a.merge(b);
        assert_eq!(a.get(TOTAL_TAG), 3);
        assert_eq!(a.get("02_language"), 1);
        assert_eq!(a.get("03_passed"), 1);
    }

    #[test]
    fn test_merge_commutes() {
        let mut a = FilterCounter::new();
        a.add_n(TOTAL_TAG, 5);
        a.add_n("02_language", 2);

        let mut b = FilterCounter::new();
        b.add_n(TOTAL_TAG, 7);
        b.add_n("03_passed", 4);

        let mut ab = a.clone();
        ab.merge(b.clone());
        let mut ba = b;
        ba.merge(a);

        assert_eq!(ab, ba);
    }

    #[test]
    fn test_report_order_follows_tags() {
        let mut c = FilterCounter::new();
        c.add_n("04_passed", 1);
        c.add_n(TOTAL_TAG, 4);
        c.add_n("03_quality_too_short", 2);
        c.add_n("02_language", 1);

        let tags: Vec<&str> = c.iter().map(|(tag, _)| tag).collect();
        assert_eq!(
            tags,
            vec![TOTAL_TAG, "02_language", "03_quality_too_short", "04_passed"]
        );
    }
}
