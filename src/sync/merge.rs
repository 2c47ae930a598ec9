//! Conflict resolution between a local array and an incoming one.
//!
//! Live sync and backup import share this single function. Items are keyed
//! by `id` only; there are no timestamps or version vectors to consult.

use std::collections::{HashMap, HashSet};

use crate::model::{sort_for_display, Item};
use crate::sync::hash::{content_hash, has_changed};
use crate::sync::types::{MergePolicy, MergeStats};

/// Combine `local` and `incoming` under `policy`.
///
/// - `Replace`: the result is `incoming` verbatim.
/// - `PreferIncoming` / `PreferLocal`: union keyed by id, the preferred side
///   wins on collisions, and the result is in display order. Entries from
///   the preferred side come first before sorting, so ties keep that order.
///   Duplicate ids within one side collapse to the last entry, kept at the
///   first entry's position.
#[must_use]
pub fn resolve(
    local: Vec<Item>,
    incoming: Vec<Item>,
    policy: MergePolicy,
) -> (Vec<Item>, MergeStats) {
    let local_hashes: HashMap<String, String> = local
        .iter()
        .map(|i| (i.id.clone(), content_hash(i)))
        .collect();
    let mut stats = MergeStats::default();

    if policy == MergePolicy::Replace {
        let mut seen = HashSet::new();
        for item in &incoming {
            if !seen.insert(item.id.as_str()) {
                continue;
            }
            classify(item, &local_hashes, &mut stats);
        }
        stats.removed = local_hashes.keys().filter(|id| !seen.contains(id.as_str())).count();
        return (incoming, stats);
    }

    let mut merged: Vec<Item> = Vec::with_capacity(local.len() + incoming.len());
    let mut index: HashMap<String, usize> = HashMap::new();

    if policy == MergePolicy::PreferIncoming {
        for item in incoming {
            if !index.contains_key(&item.id) {
                classify(&item, &local_hashes, &mut stats);
            }
            upsert(&mut merged, &mut index, item);
        }
        for item in local {
            if index.contains_key(&item.id) {
                continue;
            }
            stats.kept += 1;
            upsert(&mut merged, &mut index, item);
        }
    } else {
        for item in local {
            upsert(&mut merged, &mut index, item);
        }
        stats.kept = merged.len();

        let mut collided = HashSet::new();
        for item in incoming {
            if let Some(&pos) = index.get(&item.id) {
                if let Some(hash) = local_hashes.get(&item.id) {
                    if collided.insert(item.id.clone()) {
                        if *hash == content_hash(&item) {
                            stats.unchanged += 1;
                        } else {
                            stats.skipped += 1;
                        }
                    }
                } else {
                    // repeated incoming id: later entry wins
                    merged[pos] = item;
                }
                continue;
            }
            stats.created += 1;
            upsert(&mut merged, &mut index, item);
        }
    }

    sort_for_display(&mut merged);
    (merged, stats)
}

fn classify(item: &Item, local_hashes: &HashMap<String, String>, stats: &mut MergeStats) {
    match local_hashes.get(&item.id) {
        None => stats.created += 1,
        Some(h) if has_changed(&content_hash(item), Some(h)) => stats.updated += 1,
        Some(_) => stats.unchanged += 1,
    }
}

fn upsert(merged: &mut Vec<Item>, index: &mut HashMap<String, usize>, item: Item) {
    match index.get(&item.id) {
        Some(&pos) => merged[pos] = item,
        None => {
            index.insert(item.id.clone(), merged.len());
            merged.push(item);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, created_at: i64, title: &str) -> Item {
        let mut item = Item::new("https://example.com", title);
        item.id = id.to_string();
        item.created_at = created_at;
        item
    }

    fn ids(items: &[Item]) -> Vec<&str> {
        items.iter().map(|i| i.id.as_str()).collect()
    }

    #[test]
    fn test_replace_is_exact() {
        let local = vec![item("a", 1, "A"), item("b", 2, "B")];
        let incoming = vec![item("b", 2, "B2"), item("c", 3, "C")];
        let (merged, stats) = resolve(local, incoming.clone(), MergePolicy::Replace);
        assert_eq!(merged, incoming);
        assert_eq!(stats.created, 1);
        assert_eq!(stats.updated, 1);
        assert_eq!(stats.removed, 1);
    }

    #[test]
    fn test_replace_with_empty_clears() {
        let (merged, stats) = resolve(vec![item("a", 1, "A")], Vec::new(), MergePolicy::Replace);
        assert!(merged.is_empty());
        assert_eq!(stats.removed, 1);
    }

    #[test]
    fn test_prefer_incoming_wins_on_collision() {
        let local = vec![item("a", 1, "local"), item("b", 2, "B")];
        let incoming = vec![item("a", 1, "incoming"), item("c", 3, "C")];
        let (merged, stats) = resolve(local, incoming, MergePolicy::PreferIncoming);

        assert_eq!(ids(&merged), ["c", "b", "a"]);
        let a = merged.iter().find(|i| i.id == "a").unwrap();
        assert_eq!(a.title, "incoming");
        assert_eq!(stats.created, 1);
        assert_eq!(stats.updated, 1);
        assert_eq!(stats.kept, 1);
    }

    #[test]
    fn test_prefer_local_keeps_local_on_collision() {
        let local = vec![item("a", 1, "local")];
        let incoming = vec![item("a", 1, "incoming"), item("c", 3, "C")];
        let (merged, stats) = resolve(local, incoming, MergePolicy::PreferLocal);

        let a = merged.iter().find(|i| i.id == "a").unwrap();
        assert_eq!(a.title, "local");
        assert_eq!(merged.len(), 2);
        assert_eq!(stats.created, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.kept, 1);
    }

    #[test]
    fn test_identical_items_count_unchanged() {
        let a = item("a", 1, "A");
        let (_, stats) = resolve(vec![a.clone()], vec![a], MergePolicy::PreferIncoming);
        assert_eq!(stats.unchanged, 1);
        assert!(stats.is_noop());
    }

    #[test]
    fn test_merge_sorts_pinned_first() {
        let mut pinned = item("old-pinned", 1, "P");
        pinned.pinned = true;
        let (merged, _) = resolve(
            vec![pinned],
            vec![item("new", 10, "N")],
            MergePolicy::PreferIncoming,
        );
        assert_eq!(ids(&merged), ["old-pinned", "new"]);
    }

    #[test]
    fn test_duplicate_incoming_ids_collapse() {
        let incoming = vec![item("a", 1, "first"), item("a", 1, "second")];
        let (merged, stats) = resolve(Vec::new(), incoming, MergePolicy::PreferIncoming);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].title, "second");
        assert_eq!(stats.created, 1);
    }
}
