//! Scalar resource matching for offers.
//!
//! The matcher answers one question: does an offer carry at least the
//! required amount of every named resource? When it does, it hands back
//! exactly the required amounts, so the rest of the offer stays unclaimed.
//!
//! # Invariants
//!
//! - Only `cpus` and `mem` are read from an offer; everything else is ignored
//! - Matching is pure and deterministic
//! - A match never allocates more than the requirement asks for

use std::collections::BTreeMap;

use mesos_solr_protocol::ResourceEntry;

/// Resource names the matcher reads from offers.
pub const RECOGNIZED_RESOURCES: [&str; 2] = ["cpus", "mem"];

/// Minimum scalar amounts keyed by resource name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceRequirement {
    minimums: BTreeMap<String, f64>,
}

impl ResourceRequirement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the minimum for a resource.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, minimum: f64) -> Self {
        self.minimums.insert(name.into(), minimum);
        self
    }

    /// One cpu and 1 GiB of memory.
    pub fn default_profile() -> Self {
        Self::new().with("cpus", 1.0).with("mem", 1024.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.minimums.iter().map(|(name, min)| (name.as_str(), *min))
    }

    pub fn is_empty(&self) -> bool {
        self.minimums.is_empty()
    }
}

/// Outcome of matching an offer against a requirement.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchResult {
    /// Every requirement is met; carries the allocation to request.
    Matched(Vec<ResourceEntry>),
    /// The first requirement that could not be met.
    Insufficient {
        name: String,
        offered: Option<f64>,
        required: f64,
    },
}

impl MatchResult {
    pub fn is_match(&self) -> bool {
        matches!(self, MatchResult::Matched(_))
    }

    /// The allocation, if the match succeeded.
    pub fn into_allocation(self) -> Option<Vec<ResourceEntry>> {
        match self {
            MatchResult::Matched(resources) => Some(resources),
            MatchResult::Insufficient { .. } => None,
        }
    }
}

/// Collect the recognized scalar values from an offer. Later entries win.
fn recognized(resources: &[ResourceEntry]) -> BTreeMap<&str, f64> {
    resources
        .iter()
        .filter(|entry| RECOGNIZED_RESOURCES.contains(&entry.name.as_str()))
        .map(|entry| (entry.name.as_str(), entry.value))
        .collect()
}

/// Match offered resources against a requirement.
///
/// Fails on the first required resource that is missing or below its
/// minimum. On success returns one entry per requirement carrying the
/// required minimum, in requirement order.
pub fn match_resources(
    resources: &[ResourceEntry],
    requirement: &ResourceRequirement,
) -> MatchResult {
    let offered = recognized(resources);
    let mut allocation = Vec::with_capacity(requirement.minimums.len());

    for (name, required) in requirement.iter() {
        match offered.get(name) {
            Some(&value) if value >= required => {
                allocation.push(ResourceEntry::scalar(name, required));
            }
            other => {
                return MatchResult::Insufficient {
                    name: name.to_string(),
                    offered: other.copied(),
                    required,
                };
            }
        }
    }

    MatchResult::Matched(allocation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn cpus_mem(cpus: f64, mem: f64) -> Vec<ResourceEntry> {
        vec![
            ResourceEntry::scalar("cpus", cpus),
            ResourceEntry::scalar("mem", mem),
        ]
    }

    #[test]
    fn test_match_allocates_exact_minimums() {
        let result = match_resources(&cpus_mem(4.0, 2048.0), &ResourceRequirement::default_profile());

        assert_eq!(
            result,
            MatchResult::Matched(vec![
                ResourceEntry::scalar("cpus", 1.0),
                ResourceEntry::scalar("mem", 1024.0),
            ])
        );
    }

    #[test]
    fn test_insufficient_cpus() {
        let offered = vec![ResourceEntry::scalar("cpus", 0.5)];
        let requirement = ResourceRequirement::new().with("cpus", 1.0);

        assert_eq!(
            match_resources(&offered, &requirement),
            MatchResult::Insufficient {
                name: "cpus".to_string(),
                offered: Some(0.5),
                required: 1.0,
            }
        );
    }

    #[test]
    fn test_missing_resource() {
        let offered = vec![ResourceEntry::scalar("cpus", 8.0)];

        let result = match_resources(&offered, &ResourceRequirement::default_profile());
        assert_eq!(
            result,
            MatchResult::Insufficient {
                name: "mem".to_string(),
                offered: None,
                required: 1024.0,
            }
        );
    }

    #[rstest]
    #[case::exact(1.0, 1024.0, true)]
    #[case::surplus(16.0, 65536.0, true)]
    #[case::short_on_mem(2.0, 1023.9, false)]
    #[case::short_on_cpus(0.99, 4096.0, false)]
    fn test_default_profile(#[case] cpus: f64, #[case] mem: f64, #[case] expected: bool) {
        let result = match_resources(&cpus_mem(cpus, mem), &ResourceRequirement::default_profile());
        assert_eq!(result.is_match(), expected);
    }

    #[test]
    fn test_unrecognized_resources_are_ignored() {
        let mut offered = cpus_mem(2.0, 2048.0);
        offered.push(ResourceEntry::scalar("disk", 10_000.0));

        assert!(match_resources(&offered, &ResourceRequirement::default_profile()).is_match());

        // A requirement on an unrecognized name can never be satisfied.
        let disk = ResourceRequirement::new().with("disk", 1.0);
        assert!(!match_resources(&offered, &disk).is_match());
    }

    #[test]
    fn test_later_duplicate_wins() {
        let offered = vec![
            ResourceEntry::scalar("cpus", 4.0),
            ResourceEntry::scalar("cpus", 0.5),
        ];
        let requirement = ResourceRequirement::new().with("cpus", 1.0);
        assert!(!match_resources(&offered, &requirement).is_match());
    }

    #[test]
    fn test_empty_requirement_always_matches() {
        let result = match_resources(&[], &ResourceRequirement::new());
        assert_eq!(result, MatchResult::Matched(vec![]));
    }

    proptest! {
        #[test]
        fn prop_match_iff_every_minimum_met(
            cpus in 0.0f64..16.0,
            mem in 0.0f64..8192.0,
            need_cpus in 0.0f64..16.0,
            need_mem in 0.0f64..8192.0,
        ) {
            let requirement = ResourceRequirement::new()
                .with("cpus", need_cpus)
                .with("mem", need_mem);
            let result = match_resources(&cpus_mem(cpus, mem), &requirement);

            prop_assert_eq!(result.is_match(), cpus >= need_cpus && mem >= need_mem);

            if let Some(allocation) = result.into_allocation() {
                prop_assert_eq!(
                    allocation,
                    vec![
                        ResourceEntry::scalar("cpus", need_cpus),
                        ResourceEntry::scalar("mem", need_mem),
                    ]
                );
            }
        }

        #[test]
        fn prop_match_is_deterministic(cpus in 0.0f64..8.0, mem in 0.0f64..4096.0) {
            let offered = cpus_mem(cpus, mem);
            let requirement = ResourceRequirement::default_profile();

            prop_assert_eq!(
                match_resources(&offered, &requirement),
                match_resources(&offered, &requirement)
            );
        }
    }
}
