//! Escalation graph keyed by flag id
//!
//! Flags are nodes; an escalation link `from -> to` records that `from` was
//! folded into the newer flag `to`. Each node keeps its ancestor ids
//! (`escalated_from`) in link order and its successor ids (`escalated_to`).
//!
//! Two ways to add links:
//! - [`EscalationGraph::link`] enforces the write-path policy: no self links,
//!   no cycles, at most one escalation target per flag.
//! - [`EscalationGraph::restore_link`] only de-duplicates. It is used when
//!   loading stored or externally supplied data, where the read path must
//!   never fail.

use std::collections::{hash_map::Entry, HashMap, HashSet};

use thiserror::Error;
use tracing::warn;

use super::aggregate::FlagCounts;
use super::model::{Flag, FlagColor, FlagId, RequirementOrigin};

/// Reasons the graph refuses a change
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EscalationError {
    #[error("flag id must not be empty")]
    EmptyId,

    #[error("unknown flag: {0}")]
    UnknownFlag(FlagId),

    #[error("flag {0} cannot be escalated into itself")]
    SelfLink(FlagId),

    #[error("linking {from} -> {to} would make {to} its own ancestor")]
    Cycle { from: FlagId, to: FlagId },

    #[error("flag {flag} was already escalated into {target}")]
    AlreadySuperseded { flag: FlagId, target: FlagId },
}

#[derive(Debug, Clone)]
struct Node {
    flag: Flag,
    escalated_from: Vec<FlagId>,
    escalated_to: Vec<FlagId>,
}

impl Node {
    fn new(flag: Flag) -> Self {
        Self {
            flag,
            escalated_from: Vec::new(),
            escalated_to: Vec::new(),
        }
    }
}

/// In-memory snapshot of one collection of flags and their escalation links
///
/// `members` is the collection the caller asked about (e.g. one customer's
/// flags). Flags that are only known because a member links to them are kept
/// as nodes for traversal but are not counted.
///
/// A member added with [`EscalationGraph::insert_declared`] carries its own
/// superseded status, which takes precedence over links other records add.
#[derive(Debug, Clone, Default)]
pub struct EscalationGraph {
    nodes: HashMap<FlagId, Node>,
    members: Vec<FlagId>,
    member_ids: HashSet<FlagId>,
    declared_superseded: HashMap<FlagId, bool>,
}

impl EscalationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a flag to the counted collection
    ///
    /// If a flag with the same id is already known, the first record is kept
    /// (see [`EscalationGraph::insert_reference`]) and only membership is
    /// updated.
    pub fn insert(&mut self, flag: Flag) -> Result<(), EscalationError> {
        let id = flag.id.clone();
        self.insert_reference(flag)?;
        if self.member_ids.insert(id.clone()) {
            self.members.push(id);
        }
        Ok(())
    }

    /// Add a member whose superseded status is stated by the record itself
    pub fn insert_declared(&mut self, flag: Flag, superseded: bool) -> Result<(), EscalationError> {
        let id = flag.id.clone();
        self.insert(flag)?;
        self.declared_superseded.entry(id).or_insert(superseded);
        Ok(())
    }

    /// Make a flag known for traversal without counting it
    ///
    /// For a known id the first record wins, except that a requirement or
    /// comment missing from it is taken from the later copy.
    pub fn insert_reference(&mut self, flag: Flag) -> Result<(), EscalationError> {
        if flag.id.is_empty() {
            return Err(EscalationError::EmptyId);
        }
        match self.nodes.entry(flag.id.clone()) {
            Entry::Occupied(mut entry) => {
                let known = &mut entry.get_mut().flag;
                if known.requirement.is_none() {
                    known.requirement = flag.requirement;
                }
                if known.comment.is_none() {
                    known.comment = flag.comment;
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(Node::new(flag));
            }
        }
        Ok(())
    }

    /// Record that `from` was escalated into `to`, enforcing graph policy
    pub fn link(&mut self, from: &FlagId, to: &FlagId) -> Result<(), EscalationError> {
        if !self.nodes.contains_key(from) {
            return Err(EscalationError::UnknownFlag(from.clone()));
        }
        if !self.nodes.contains_key(to) {
            return Err(EscalationError::UnknownFlag(to.clone()));
        }
        if from == to {
            return Err(EscalationError::SelfLink(from.clone()));
        }

        let existing = &self.nodes[from].escalated_to;
        if existing.contains(to) {
            return Ok(());
        }
        if let Some(target) = existing.first() {
            return Err(EscalationError::AlreadySuperseded {
                flag: from.clone(),
                target: target.clone(),
            });
        }

        // `to` already being an ancestor of `from` would close a loop
        if self.has_ancestor(from, to) {
            return Err(EscalationError::Cycle {
                from: from.clone(),
                to: to.clone(),
            });
        }

        self.connect(from, to);
        Ok(())
    }

    /// Record a stored link without policy checks
    ///
    /// Unknown endpoints are ignored. Duplicate links are collapsed.
    pub fn restore_link(&mut self, from: &FlagId, to: &FlagId) {
        if !self.nodes.contains_key(from) || !self.nodes.contains_key(to) {
            warn!("Ignoring escalation link {} -> {}: endpoint not loaded", from, to);
            return;
        }
        if self.nodes[from].escalated_to.contains(to) {
            return;
        }
        self.connect(from, to);
    }

    fn connect(&mut self, from: &FlagId, to: &FlagId) {
        if let Some(node) = self.nodes.get_mut(from) {
            node.escalated_to.push(to.clone());
        }
        if let Some(node) = self.nodes.get_mut(to) {
            node.escalated_from.push(from.clone());
        }
    }

    /// Whether `candidate` is reachable by following `escalated_from` from `id`
    pub fn has_ancestor(&self, id: &FlagId, candidate: &FlagId) -> bool {
        let mut stack: Vec<&FlagId> = vec![id];
        let mut seen: HashSet<&FlagId> = HashSet::new();

        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            let Some(node) = self.nodes.get(current) else {
                continue;
            };
            for parent in &node.escalated_from {
                if parent == candidate {
                    return true;
                }
                stack.push(parent);
            }
        }
        false
    }

    /// Leaf origins of a flag, depth first, in link order
    ///
    /// A leaf is a flag without ancestors. Each leaf with a requirement yields
    /// one `{title, date}` pair; requirement-less leaves yield nothing. A
    /// shared ancestor reached through two links is reported once per link.
    /// Unknown ids yield an empty list.
    ///
    /// The walk keeps its own frame stack, so chain length is bounded by
    /// memory rather than by the thread's stack.
    pub fn collect_ancestors(&self, id: &FlagId) -> Vec<RequirementOrigin> {
        let mut origins = Vec::new();
        let Some(node) = self.nodes.get(id) else {
            return origins;
        };
        if node.escalated_from.is_empty() {
            origins.extend(Self::leaf_origin(node));
            return origins;
        }

        // (flag, index of the next ancestor to visit)
        let mut stack: Vec<(&FlagId, usize)> = vec![(id, 0)];
        let mut path: HashSet<&FlagId> = HashSet::from([id]);

        while let Some(frame) = stack.last_mut() {
            let current = frame.0;
            let Some(parent) = self.escalated_from(current).get(frame.1) else {
                path.remove(current);
                stack.pop();
                continue;
            };
            frame.1 += 1;

            if path.contains(parent) {
                warn!("Skipping cyclic escalation link {} -> {}", parent, current);
                continue;
            }
            let Some(parent_node) = self.nodes.get(parent) else {
                continue;
            };
            if parent_node.escalated_from.is_empty() {
                origins.extend(Self::leaf_origin(parent_node));
            } else {
                path.insert(parent);
                stack.push((parent, 0));
            }
        }

        origins
    }

    fn leaf_origin(node: &Node) -> Option<RequirementOrigin> {
        node.flag
            .requirement
            .as_ref()
            .map(|requirement| RequirementOrigin {
                title: requirement.title.clone(),
                date: node.flag.created_at,
            })
    }

    pub fn get(&self, id: &FlagId) -> Option<&Flag> {
        self.nodes.get(id).map(|node| &node.flag)
    }

    pub fn escalated_from(&self, id: &FlagId) -> &[FlagId] {
        self.nodes
            .get(id)
            .map(|node| node.escalated_from.as_slice())
            .unwrap_or(&[])
    }

    pub fn escalated_to(&self, id: &FlagId) -> &[FlagId] {
        self.nodes
            .get(id)
            .map(|node| node.escalated_to.as_slice())
            .unwrap_or(&[])
    }

    /// A superseded flag has been escalated into a newer one
    ///
    /// A declared status wins over links; otherwise any outgoing link counts.
    pub fn is_superseded(&self, id: &FlagId) -> bool {
        match self.declared_superseded.get(id) {
            Some(declared) => *declared,
            None => !self.escalated_to(id).is_empty(),
        }
    }

    /// Counted flags in insertion order
    pub fn members(&self) -> impl Iterator<Item = &Flag> + '_ {
        self.members.iter().filter_map(|id| self.get(id))
    }

    /// Current-state counts over the counted flags
    pub fn counts(&self) -> FlagCounts {
        FlagCounts::tally(
            self.members()
                .map(|flag| (flag.color, self.is_superseded(&flag.id))),
        )
    }

    /// Number of RED flags accumulated in the collection, superseded or not
    pub fn red_total(&self) -> u32 {
        self.members()
            .filter(|flag| flag.color == FlagColor::Red)
            .count() as u32
    }

    /// Number of counted flags
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn flag(id: &str, color: FlagColor, day: u32) -> Flag {
        Flag::new(id, color, Utc.with_ymd_and_hms(2024, 3, day, 9, 0, 0).unwrap())
    }

    fn id(s: &str) -> FlagId {
        FlagId::new(s)
    }

    #[test]
    fn test_leaf_with_requirement_reports_itself() {
        let mut graph = EscalationGraph::new();
        let leaf = flag("y1", FlagColor::Yellow, 1).with_requirement("Weekly check-in");
        let created = leaf.created_at;
        graph.insert(leaf).unwrap();

        let origins = graph.collect_ancestors(&id("y1"));
        assert_eq!(
            origins,
            vec![RequirementOrigin {
                title: "Weekly check-in".to_string(),
                date: created,
            }]
        );
    }

    #[test]
    fn test_leaf_without_requirement_reports_nothing() {
        let mut graph = EscalationGraph::new();
        graph.insert(flag("y1", FlagColor::Yellow, 1)).unwrap();

        assert!(graph.collect_ancestors(&id("y1")).is_empty());
    }

    #[test]
    fn test_ancestors_follow_link_order() {
        let mut graph = EscalationGraph::new();
        graph.insert(flag("a1", FlagColor::Yellow, 1).with_requirement("Q1")).unwrap();
        graph.insert(flag("a2", FlagColor::Yellow, 2).with_requirement("Q2")).unwrap();
        graph.insert(flag("r", FlagColor::Red, 3).with_requirement("Escalated")).unwrap();
        graph.link(&id("a1"), &id("r")).unwrap();
        graph.link(&id("a2"), &id("r")).unwrap();

        let titles: Vec<_> = graph
            .collect_ancestors(&id("r"))
            .into_iter()
            .map(|o| o.title)
            .collect();
        assert_eq!(titles, vec!["Q1", "Q2"]);
    }

    #[test]
    fn test_multi_level_chain_reaches_leaves_only() {
        let mut graph = EscalationGraph::new();
        graph.insert(flag("g", FlagColor::Green, 1).with_requirement("Diet log")).unwrap();
        graph.insert(flag("y", FlagColor::Yellow, 2).with_requirement("Middle")).unwrap();
        graph.insert(flag("r", FlagColor::Red, 3).with_requirement("Top")).unwrap();
        graph.link(&id("g"), &id("y")).unwrap();
        graph.link(&id("y"), &id("r")).unwrap();

        let origins = graph.collect_ancestors(&id("r"));
        assert_eq!(origins.len(), 1);
        assert_eq!(origins[0].title, "Diet log");
    }

    #[test]
    fn test_requirement_less_branch_contributes_nothing() {
        let mut graph = EscalationGraph::new();
        graph.insert(flag("a1", FlagColor::Yellow, 1)).unwrap();
        graph.insert(flag("a2", FlagColor::Yellow, 2).with_requirement("Q2")).unwrap();
        graph.insert(flag("r", FlagColor::Red, 3)).unwrap();
        graph.link(&id("a1"), &id("r")).unwrap();
        graph.link(&id("a2"), &id("r")).unwrap();

        let titles: Vec<_> = graph
            .collect_ancestors(&id("r"))
            .into_iter()
            .map(|o| o.title)
            .collect();
        assert_eq!(titles, vec!["Q2"]);
    }

    #[test]
    fn test_collect_is_repeatable() {
        let mut graph = EscalationGraph::new();
        graph.insert(flag("a1", FlagColor::Yellow, 1).with_requirement("Q1")).unwrap();
        graph.insert(flag("r", FlagColor::Red, 2)).unwrap();
        graph.link(&id("a1"), &id("r")).unwrap();

        assert_eq!(
            graph.collect_ancestors(&id("r")),
            graph.collect_ancestors(&id("r"))
        );
    }

    #[test]
    fn test_unknown_flag_has_no_ancestors() {
        let graph = EscalationGraph::new();
        assert!(graph.collect_ancestors(&id("missing")).is_empty());
    }

    #[test]
    fn test_link_rejects_self_link() {
        let mut graph = EscalationGraph::new();
        graph.insert(flag("a", FlagColor::Yellow, 1)).unwrap();

        assert_eq!(
            graph.link(&id("a"), &id("a")),
            Err(EscalationError::SelfLink(id("a")))
        );
    }

    #[test]
    fn test_link_rejects_cycle() {
        let mut graph = EscalationGraph::new();
        graph.insert(flag("a", FlagColor::Green, 1)).unwrap();
        graph.insert(flag("b", FlagColor::Yellow, 2)).unwrap();
        graph.insert(flag("c", FlagColor::Red, 3)).unwrap();
        graph.link(&id("a"), &id("b")).unwrap();
        graph.link(&id("b"), &id("c")).unwrap();

        // c -> a would make a its own ancestor through b and c
        let result = graph.link(&id("c"), &id("a"));
        assert_eq!(
            result,
            Err(EscalationError::Cycle {
                from: id("c"),
                to: id("a"),
            })
        );
        assert!(graph.escalated_to(&id("c")).is_empty());
    }

    #[test]
    fn test_link_rejects_second_target() {
        let mut graph = EscalationGraph::new();
        graph.insert(flag("a", FlagColor::Yellow, 1)).unwrap();
        graph.insert(flag("r1", FlagColor::Red, 2)).unwrap();
        graph.insert(flag("r2", FlagColor::Red, 3)).unwrap();
        graph.link(&id("a"), &id("r1")).unwrap();

        assert_eq!(
            graph.link(&id("a"), &id("r2")),
            Err(EscalationError::AlreadySuperseded {
                flag: id("a"),
                target: id("r1"),
            })
        );
    }

    #[test]
    fn test_link_is_idempotent() {
        let mut graph = EscalationGraph::new();
        graph.insert(flag("a", FlagColor::Yellow, 1)).unwrap();
        graph.insert(flag("r", FlagColor::Red, 2)).unwrap();
        graph.link(&id("a"), &id("r")).unwrap();
        graph.link(&id("a"), &id("r")).unwrap();

        assert_eq!(graph.escalated_from(&id("r")), &[id("a")]);
    }

    #[test]
    fn test_link_requires_known_flags() {
        let mut graph = EscalationGraph::new();
        graph.insert(flag("a", FlagColor::Yellow, 1)).unwrap();

        assert_eq!(
            graph.link(&id("a"), &id("nope")),
            Err(EscalationError::UnknownFlag(id("nope")))
        );
    }

    #[test]
    fn test_restored_cycle_still_terminates() {
        let mut graph = EscalationGraph::new();
        graph.insert(flag("a", FlagColor::Yellow, 1).with_requirement("A")).unwrap();
        graph.insert(flag("b", FlagColor::Yellow, 2).with_requirement("B")).unwrap();
        graph.restore_link(&id("a"), &id("b"));
        graph.restore_link(&id("b"), &id("a"));

        // Neither node is a leaf, so nothing is reported, but the walk ends
        assert!(graph.collect_ancestors(&id("a")).is_empty());
    }

    #[test]
    fn test_diamond_reports_shared_leaf_per_path() {
        let mut graph = EscalationGraph::new();
        graph.insert(flag("leaf", FlagColor::Green, 1).with_requirement("Sleep")).unwrap();
        graph.insert(flag("y1", FlagColor::Yellow, 2)).unwrap();
        graph.insert(flag("y2", FlagColor::Yellow, 3)).unwrap();
        graph.insert(flag("r", FlagColor::Red, 4)).unwrap();
        graph.restore_link(&id("leaf"), &id("y1"));
        graph.restore_link(&id("leaf"), &id("y2"));
        graph.link(&id("y1"), &id("r")).unwrap();
        graph.link(&id("y2"), &id("r")).unwrap();

        assert_eq!(graph.collect_ancestors(&id("r")).len(), 2);
    }

    #[test]
    fn test_insert_rejects_empty_id() {
        let mut graph = EscalationGraph::new();
        assert_eq!(
            graph.insert(flag("", FlagColor::Red, 1)),
            Err(EscalationError::EmptyId)
        );
    }

    #[test]
    fn test_duplicate_insert_keeps_first_record() {
        let mut graph = EscalationGraph::new();
        graph.insert(flag("a", FlagColor::Yellow, 1)).unwrap();
        graph.insert(flag("a", FlagColor::Red, 2)).unwrap();

        assert_eq!(graph.len(), 1);
        assert_eq!(graph.get(&id("a")).unwrap().color, FlagColor::Yellow);
    }

    #[test]
    fn test_later_copy_fills_missing_requirement() {
        let mut graph = EscalationGraph::new();
        graph.insert(flag("a", FlagColor::Yellow, 1)).unwrap();
        graph
            .insert_reference(flag("a", FlagColor::Red, 2).with_requirement("Q1"))
            .unwrap();

        let known = graph.get(&id("a")).unwrap();
        assert_eq!(known.color, FlagColor::Yellow);
        assert_eq!(known.requirement.as_ref().unwrap().title, "Q1");
    }

    #[test]
    fn test_declared_status_wins_over_links() {
        let mut graph = EscalationGraph::new();
        graph.insert_declared(flag("y", FlagColor::Yellow, 1), false).unwrap();
        graph.insert_declared(flag("r", FlagColor::Red, 2), false).unwrap();
        graph.restore_link(&id("y"), &id("r"));

        assert!(!graph.is_superseded(&id("y")));
        assert_eq!(graph.counts().total, 2);
        assert_eq!(graph.escalated_from(&id("r")), &[id("y")]);
    }

    #[test]
    fn test_long_chain_walks_on_small_stack() {
        const CHAIN: usize = 100_000;

        let mut graph = EscalationGraph::new();
        graph
            .insert(flag("f0", FlagColor::Green, 1).with_requirement("Root"))
            .unwrap();
        for i in 1..CHAIN {
            graph.insert(flag(&format!("f{}", i), FlagColor::Yellow, 2)).unwrap();
            graph.restore_link(&FlagId::new(format!("f{}", i - 1)), &FlagId::new(format!("f{}", i)));
        }
        assert_eq!(graph.len(), CHAIN);

        // Same stack size as a tokio worker thread
        let origins = std::thread::Builder::new()
            .stack_size(2 * 1024 * 1024)
            .spawn(move || graph.collect_ancestors(&FlagId::new(format!("f{}", CHAIN - 1))))
            .unwrap()
            .join()
            .unwrap();

        assert_eq!(origins.len(), 1);
        assert_eq!(origins[0].title, "Root");
    }

    #[test]
    fn test_references_are_not_counted() {
        let mut graph = EscalationGraph::new();
        graph.insert(flag("a", FlagColor::Yellow, 1)).unwrap();
        graph.insert_reference(flag("r", FlagColor::Red, 2)).unwrap();
        graph.link(&id("a"), &id("r")).unwrap();

        let counts = graph.counts();
        assert_eq!(counts.total, 0);
        assert_eq!(graph.red_total(), 0);
    }
}
