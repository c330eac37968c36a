use crate::timetable::block::TimeBlock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum EventKind {
    // Declaration order is the sort order: ends release before starts at the same instant.
    End,
    Start,
}

#[derive(Debug, Clone, Copy)]
struct Event {
    time: u32,
    kind: EventKind,
    index: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct ClusterMember<'a> {
    /// Position of the block in the caller's input slice.
    pub index: usize,
    pub block: &'a TimeBlock,
}

/// One connected overlap component of a single day, members in start order.
#[derive(Debug, Clone)]
pub struct Cluster<'a> {
    pub members: Vec<ClusterMember<'a>>,
}

/// Partitions the blocks of one day into maximal overlap clusters, ordered by start.
///
/// All blocks are expected to share a day.
pub fn cluster_day(blocks: &[TimeBlock]) -> Vec<Cluster<'_>> {
    let mut events: Vec<Event> = Vec::with_capacity(blocks.len() * 2);
    for (index, b) in blocks.iter().enumerate() {
        debug_assert!(b.start < b.end);
        events.push(Event {
            time: b.start,
            kind: EventKind::Start,
            index,
        });
        events.push(Event {
            time: b.end,
            kind: EventKind::End,
            index,
        });
    }
    events.sort_by_key(|e| (e.time, e.kind, e.index));

    let mut out: Vec<Cluster<'_>> = Vec::new();
    let mut active: usize = 0;
    let mut current: Vec<ClusterMember<'_>> = Vec::new();
    for e in events {
        match e.kind {
            EventKind::Start => {
                active += 1;
                current.push(ClusterMember {
                    index: e.index,
                    block: &blocks[e.index],
                });
            }
            EventKind::End => {
                active -= 1;
                if active == 0 {
                    out.push(Cluster {
                        members: std::mem::take(&mut current),
                    });
                }
            }
        }
    }
    debug_assert!(current.is_empty());
    out
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::timetable::block::{DayOfWeek, DisplayMeta, ResourceKeys};
    use crate::timetable::time::overlaps;
    use proptest::prelude::*;

    pub(crate) fn block(id: &str, day: DayOfWeek, start: u32, end: u32) -> TimeBlock {
        TimeBlock {
            id: id.to_string(),
            day,
            start,
            end,
            title: id.to_string(),
            owners: ResourceKeys::default(),
            display: DisplayMeta::default(),
        }
    }

    fn ids<'a>(c: &'a Cluster<'a>) -> Vec<&'a str> {
        c.members.iter().map(|m| m.block.id.as_str()).collect()
    }

    fn span(c: &Cluster<'_>) -> (u32, u32) {
        let start = c.members.iter().map(|m| m.block.start).min().unwrap_or(0);
        let end = c.members.iter().map(|m| m.block.end).max().unwrap_or(0);
        (start, end)
    }

    #[test]
    fn back_to_back_blocks_form_separate_clusters() {
        let blocks = vec![
            block("a", DayOfWeek::Monday, 540, 600),
            block("b", DayOfWeek::Monday, 600, 660),
        ];
        let clusters = cluster_day(&blocks);
        assert_eq!(clusters.len(), 2);
        assert_eq!(ids(&clusters[0]), vec!["a"]);
        assert_eq!(ids(&clusters[1]), vec!["b"]);
    }

    #[test]
    fn transitive_chain_forms_one_cluster() {
        let blocks = vec![
            block("c", DayOfWeek::Monday, 615, 645),
            block("a", DayOfWeek::Monday, 540, 600),
            block("b", DayOfWeek::Monday, 570, 630),
        ];
        let clusters = cluster_day(&blocks);
        assert_eq!(clusters.len(), 1);
        assert_eq!(ids(&clusters[0]), vec!["a", "b", "c"]);
        assert_eq!(span(&clusters[0]), (540, 645));
    }

    #[test]
    fn identical_starts_keep_input_order() {
        let blocks = vec![
            block("x", DayOfWeek::Friday, 600, 700),
            block("y", DayOfWeek::Friday, 600, 650),
        ];
        let clusters = cluster_day(&blocks);
        assert_eq!(ids(&clusters[0]), vec!["x", "y"]);
        assert_eq!(clusters[0].members[1].index, 1);
    }

    #[test]
    fn empty_day_has_no_clusters() {
        assert!(cluster_day(&[]).is_empty());
    }

    pub(crate) fn arb_day_blocks() -> impl Strategy<Value = Vec<TimeBlock>> {
        prop::collection::vec((0u32..1380, 1u32..180), 0..24).prop_map(|spans| {
            spans
                .into_iter()
                .enumerate()
                .map(|(i, (s, len))| {
                    block(&format!("b{i}"), DayOfWeek::Monday, s, (s + len).min(1439))
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn clusters_partition_and_are_disjoint(blocks in arb_day_blocks()) {
            let clusters = cluster_day(&blocks);
            let total: usize = clusters.iter().map(|c| c.members.len()).sum();
            prop_assert_eq!(total, blocks.len());
            for pair in clusters.windows(2) {
                prop_assert!(span(&pair[0]).1 <= span(&pair[1]).0);
            }
        }

        #[test]
        fn cluster_members_are_transitively_connected(blocks in arb_day_blocks()) {
            for c in cluster_day(&blocks) {
                let n = c.members.len();
                let mut seen = vec![false; n];
                let mut stack = vec![0usize];
                seen[0] = true;
                while let Some(i) = stack.pop() {
                    for j in 0..n {
                        let (a, b) = (c.members[i].block, c.members[j].block);
                        if !seen[j] && overlaps(a.start, a.end, b.start, b.end) {
                            seen[j] = true;
                            stack.push(j);
                        }
                    }
                }
                prop_assert!(seen.iter().all(|s| *s));
            }
        }
    }
}
