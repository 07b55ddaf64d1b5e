//! Mapping resolver
//!
//! Turns slider declarations plus a live session snapshot into the
//! index→target table the dispatcher works from. A declared target with no
//! live match is not an error; its index is simply left unbound.

use super::ControllableTarget;
use crate::config::{Config, SliderDeclaration, TargetSpec};
use crate::sessions::{ProcessId, SessionSnapshot};
use std::collections::{BTreeMap, HashSet};

/// Names with a fixed meaning; never valid group members.
const RESERVED_NAMES: [&str; 3] = ["master", "system", "unmapped"];

fn is_reserved(id: &ProcessId) -> bool {
    RESERVED_NAMES.contains(&id.as_str())
}

/// An immutable index→target table from one resolution pass.
///
/// Built fresh each pass and swapped wholesale; an index that resolved to
/// nothing is absent, and its readings are ignored.
#[derive(Debug, Clone, Default)]
pub struct ResolvedMapping {
    targets: BTreeMap<usize, ControllableTarget>,
}

impl ResolvedMapping {
    pub fn get(&self, index: usize) -> Option<&ControllableTarget> {
        self.targets.get(&index)
    }

    /// Bound entries in ascending index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &ControllableTarget)> {
        self.targets.iter().map(|(index, target)| (*index, target))
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Resolve declarations against a snapshot.
///
/// Explicit targets resolve in ascending index order and claim their
/// sessions; `unmapped` resolves last, over whatever is left unclaimed.
/// Resolving twice against the same snapshot yields an identical table.
pub fn resolve(config: &Config, snapshot: &SessionSnapshot) -> ResolvedMapping {
    let mut targets: BTreeMap<usize, ControllableTarget> = BTreeMap::new();
    let mut claimed: HashSet<ProcessId> = HashSet::new();
    let mut unmapped_indices: Vec<usize> = Vec::new();

    for SliderDeclaration { index, target } in &config.declarations {
        match target {
            TargetSpec::Master => {
                targets.insert(*index, ControllableTarget::Master(snapshot.master()));
            }
            TargetSpec::System => {
                let system = snapshot.system().clone();
                claimed.insert(system.id.clone());
                targets.insert(*index, ControllableTarget::System(system));
            }
            TargetSpec::Process(id) => {
                if let Some(session) = snapshot.get(id) {
                    claimed.insert(session.id.clone());
                    targets.insert(*index, ControllableTarget::Process(session.clone()));
                }
            }
            TargetSpec::Group(ids) => {
                let members: Vec<_> = ids
                    .iter()
                    .filter(|id| !is_reserved(id))
                    .filter_map(|id| snapshot.get(id))
                    .cloned()
                    .collect();
                if !members.is_empty() {
                    for member in &members {
                        claimed.insert(member.id.clone());
                    }
                    targets.insert(*index, ControllableTarget::Group(members));
                }
            }
            TargetSpec::Unmapped => {
                unmapped_indices.push(*index);
            }
        }
    }

    if !unmapped_indices.is_empty() {
        let system_id = &snapshot.system().id;
        let leftovers: Vec<_> = snapshot
            .sessions()
            .filter(|session| !claimed.contains(&session.id))
            .filter(|session| config.settings.system_in_unmapped || session.id != *system_id)
            .cloned()
            .collect();

        // An empty leftover set still binds: a legal no-op target.
        for index in unmapped_indices {
            targets.insert(index, ControllableTarget::Group(leftovers.clone()));
        }
    }

    ResolvedMapping { targets }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::sessions::{MemoryDirectory, SessionDirectory};

    fn parse(text: &str) -> Config {
        Config::parse(text).unwrap()
    }

    fn ids(target: &ControllableTarget) -> Vec<String> {
        target
            .member_ids()
            .iter()
            .map(|id| id.as_str().to_string())
            .collect()
    }

    #[test]
    fn test_full_board_resolution() {
        // chrome is explicitly mapped, firefox is not, system is claimed at
        // index 1 and therefore stays out of unmapped.
        let config = parse(
            "0: master\n1: system\n2: chrome.exe\n3: unmapped\nsliders: 4\n",
        );
        let dir = MemoryDirectory::new(&["chrome.exe", "firefox.exe"]);
        let snapshot = dir.snapshot().unwrap();

        let mapping = resolve(&config, &snapshot);

        assert_eq!(mapping.len(), 4);
        assert!(matches!(mapping.get(0), Some(ControllableTarget::Master(_))));
        assert!(matches!(mapping.get(1), Some(ControllableTarget::System(_))));
        match mapping.get(2) {
            Some(ControllableTarget::Process(session)) => {
                assert_eq!(session.id, ProcessId::new("chrome.exe"));
            }
            other => panic!("expected Process(chrome.exe), got {other:?}"),
        }
        match mapping.get(3) {
            Some(group @ ControllableTarget::Group(_)) => {
                assert_eq!(ids(group), vec!["firefox.exe"]);
            }
            other => panic!("expected Group, got {other:?}"),
        }
    }

    #[test]
    fn test_group_with_one_member_running() {
        let config = parse("0: chrome.exe, discord.exe\nsliders: 1\n");
        let dir = MemoryDirectory::new(&["chrome.exe"]);
        let snapshot = dir.snapshot().unwrap();

        let mapping = resolve(&config, &snapshot);

        match mapping.get(0) {
            Some(group @ ControllableTarget::Group(_)) => {
                assert_eq!(ids(group), vec!["chrome.exe"]);
            }
            other => panic!("expected Group, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_process_leaves_index_unbound() {
        let config = parse("0: notrunning.exe\n1: master\nsliders: 2\n");
        let dir = MemoryDirectory::new(&["chrome.exe"]);
        let snapshot = dir.snapshot().unwrap();

        let mapping = resolve(&config, &snapshot);

        assert!(mapping.get(0).is_none());
        assert!(mapping.get(1).is_some());
    }

    #[test]
    fn test_group_with_no_members_leaves_index_unbound() {
        let config = parse("0: a.exe, b.exe\nsliders: 1\n");
        let dir = MemoryDirectory::new(&[]);
        let snapshot = dir.snapshot().unwrap();

        assert!(resolve(&config, &snapshot).get(0).is_none());
    }

    #[test]
    fn test_reserved_names_skipped_in_groups() {
        let config = parse("0: master, chrome.exe\nsliders: 1\n");
        let dir = MemoryDirectory::new(&["chrome.exe"]);
        let snapshot = dir.snapshot().unwrap();

        let mapping = resolve(&config, &snapshot);
        match mapping.get(0) {
            Some(group @ ControllableTarget::Group(_)) => {
                assert_eq!(ids(group), vec!["chrome.exe"]);
            }
            other => panic!("expected Group, got {other:?}"),
        }
    }

    #[test]
    fn test_claimed_sessions_stay_out_of_unmapped() {
        let config = parse("0: chrome.exe\n1: spotify.exe, discord.exe\n2: unmapped\nsliders: 3\n");
        let dir = MemoryDirectory::new(&["chrome.exe", "spotify.exe", "discord.exe", "mpv"]);
        let snapshot = dir.snapshot().unwrap();

        let mapping = resolve(&config, &snapshot);

        match mapping.get(2) {
            Some(group @ ControllableTarget::Group(_)) => {
                // system is unclaimed and included by default.
                assert_eq!(ids(group), vec!["mpv", "system"]);
            }
            other => panic!("expected Group, got {other:?}"),
        }
    }

    #[test]
    fn test_system_exclusion_toggle() {
        // System never explicitly claimed, but excluded from unmapped.
        let config = parse("0: unmapped\nsliders: 1\nsystem in unmapped: false\n");
        let dir = MemoryDirectory::new(&["chrome.exe"]);
        let snapshot = dir.snapshot().unwrap();

        let mapping = resolve(&config, &snapshot);
        match mapping.get(0) {
            Some(group @ ControllableTarget::Group(_)) => {
                assert_eq!(ids(group), vec!["chrome.exe"]);
            }
            other => panic!("expected Group, got {other:?}"),
        }
    }

    #[test]
    fn test_system_included_in_unmapped_by_default() {
        let config = parse("0: unmapped\nsliders: 1\n");
        let dir = MemoryDirectory::new(&[]);
        let snapshot = dir.snapshot().unwrap();

        let mapping = resolve(&config, &snapshot);
        match mapping.get(0) {
            Some(group @ ControllableTarget::Group(_)) => {
                assert_eq!(ids(group), vec!["system"]);
            }
            other => panic!("expected Group, got {other:?}"),
        }
    }

    #[test]
    fn test_unmapped_binds_even_when_empty() {
        let config = parse("0: chrome.exe\n1: unmapped\nsliders: 2\nsystem in unmapped: false\n");
        let dir = MemoryDirectory::new(&["chrome.exe"]);
        let snapshot = dir.snapshot().unwrap();

        let mapping = resolve(&config, &snapshot);
        match mapping.get(1) {
            Some(group @ ControllableTarget::Group(_)) => {
                assert!(ids(group).is_empty());
            }
            other => panic!("expected Group, got {other:?}"),
        }
    }

    #[test]
    fn test_no_index_outside_slider_range() {
        let config = parse("0: master\n1: unmapped\nsliders: 2\n");
        let dir = MemoryDirectory::new(&["chrome.exe"]);
        let snapshot = dir.snapshot().unwrap();

        let mapping = resolve(&config, &snapshot);
        assert!(mapping.iter().all(|(index, _)| index < 2));
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let config = parse(
            "0: master\n1: system\n2: chrome.exe\n3: spotify.exe, discord.exe\n4: unmapped\nsliders: 5\n",
        );
        let dir = MemoryDirectory::new(&["chrome.exe", "spotify.exe", "mpv", "firefox"]);
        let snapshot = dir.snapshot().unwrap();

        let first = resolve(&config, &snapshot);
        let second = resolve(&config, &snapshot);

        let describe = |mapping: &ResolvedMapping| {
            mapping
                .iter()
                .map(|(index, target)| (index, format!("{target:?}")))
                .collect::<Vec<_>>()
        };
        assert_eq!(describe(&first), describe(&second));
    }
}
