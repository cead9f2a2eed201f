// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::event::Event;
use interval_heap::IntervalHeap as Heap;

#[derive(Debug)]
struct HeapItem(usize, Event);

impl Eq for HeapItem {}

impl PartialEq for HeapItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Ord for HeapItem {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Ties across files break by file order, so the merged
        // stream is deterministic
        (self.1.timestamp, self.0).cmp(&(other.1.timestamp, other.0))
    }
}

impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Merges the pre-sorted event streams of multiple hourly files
/// into one globally timestamp-ordered stream
pub struct Merger {
    iterators: Vec<std::vec::IntoIter<Event>>,
    heap: Heap<HeapItem>,

    initialized: bool,
}

impl Merger {
    #[must_use]
    pub fn new(streams: Vec<Vec<Event>>) -> Self {
        let heap = Heap::with_capacity(streams.len());

        let iterators = streams.into_iter().map(Vec::into_iter).collect::<Vec<_>>();

        Self {
            iterators,
            heap,
            initialized: false,
        }
    }

    fn initialize(&mut self) {
        for (idx, iterator) in self.iterators.iter_mut().enumerate() {
            if let Some(event) = iterator.next() {
                self.heap.push(HeapItem(idx, event));
            }
        }
        self.initialized = true;
    }
}

impl Iterator for Merger {
    type Item = Event;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.initialized {
            self.initialize();
        }

        let min_item = self.heap.pop_min()?;

        if let Some(next_event) = self.iterators.get_mut(min_item.0).and_then(Iterator::next) {
            self.heap.push(HeapItem(min_item.0, next_event));
        }

        Some(min_item.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventType, ResourceRef};
    use test_log::test;

    fn event(id: &str, timestamp: i64) -> Event {
        Event {
            id: id.into(),
            timestamp,
            event_type: EventType::Create,
            resource: ResourceRef {
                group: String::new(),
                version: "v1".into(),
                kind: "Pod".into(),
                namespace: "default".into(),
                name: String::new(),
                uid: String::new(),
                involved_object_uid: String::new(),
            },
            data: vec![],
            data_size: 0,
            compressed_size: 0,
        }
    }

    fn ids(merger: Merger) -> Vec<String> {
        merger.map(|e| e.id).collect()
    }

    #[test]
    fn merge_interleaved() {
        let merger = Merger::new(vec![
            vec![event("a", 1), event("c", 3), event("e", 5)],
            vec![event("b", 2), event("d", 4)],
        ]);

        assert_eq!(vec!["a", "b", "c", "d", "e"], ids(merger));
    }

    #[test]
    fn merge_ties_break_by_stream_order() {
        let merger = Merger::new(vec![
            vec![event("first", 7)],
            vec![event("second", 7)],
            vec![event("third", 7)],
        ]);

        assert_eq!(vec!["first", "second", "third"], ids(merger));
    }

    #[test]
    fn merge_empty_streams() {
        let merger = Merger::new(vec![vec![], vec![event("only", 1)], vec![]]);

        assert_eq!(vec!["only"], ids(merger));
    }

    #[test]
    fn merge_no_streams() {
        let merger = Merger::new(vec![]);

        assert!(ids(merger).is_empty());
    }

    #[test]
    fn merge_is_ordered() {
        let merger = Merger::new(vec![
            (0..100).map(|i| event("x", i * 2)).collect(),
            (0..100).map(|i| event("y", i * 3)).collect(),
            (0..100).map(|i| event("z", 50 + i)).collect(),
        ]);

        let timestamps: Vec<i64> = merger.map(|e| e.timestamp).collect();
        assert_eq!(300, timestamps.len());
        assert!(timestamps.is_sorted());
    }
}
