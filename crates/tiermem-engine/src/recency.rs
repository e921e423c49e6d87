//! Recency-ordered index over fast-resident pages.

use crate::page_table::PageIdx;

#[derive(Debug, Clone, Copy, Default)]
struct Link {
    prev: Option<PageIdx>,
    next: Option<PageIdx>,
    linked: bool,
}

/// Doubly-linked list of page indices.
///
/// Links are stored in a side table indexed by [`PageIdx`], so membership
/// tests, unlinking and moves are O(1) without holding references into the
/// page table. Front is the favored end; back is the eviction candidate.
#[derive(Debug, Default)]
pub struct RecencyList {
    links: Vec<Link>,
    head: Option<PageIdx>,
    tail: Option<PageIdx>,
    len: usize,
}

impl RecencyList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn front(&self) -> Option<PageIdx> {
        self.head
    }

    pub fn back(&self) -> Option<PageIdx> {
        self.tail
    }

    /// Returns true if `idx` is in the list.
    pub fn contains(&self, idx: PageIdx) -> bool {
        self.links
            .get(idx.as_usize())
            .is_some_and(|link| link.linked)
    }

    fn link_mut(&mut self, idx: PageIdx) -> &mut Link {
        let slot = idx.as_usize();
        if slot >= self.links.len() {
            self.links.resize(slot + 1, Link::default());
        }
        &mut self.links[slot]
    }

    /// Inserts `idx` at the front. Does nothing if it is already linked.
    pub fn push_front(&mut self, idx: PageIdx) {
        if self.contains(idx) {
            return;
        }
        let old_head = self.head;
        *self.link_mut(idx) = Link {
            prev: None,
            next: old_head,
            linked: true,
        };
        match old_head {
            Some(h) => self.links[h.as_usize()].prev = Some(idx),
            None => self.tail = Some(idx),
        }
        self.head = Some(idx);
        self.len += 1;
    }

    /// Inserts `idx` at the back. Does nothing if it is already linked.
    pub fn push_back(&mut self, idx: PageIdx) {
        if self.contains(idx) {
            return;
        }
        let old_tail = self.tail;
        *self.link_mut(idx) = Link {
            prev: old_tail,
            next: None,
            linked: true,
        };
        match old_tail {
            Some(t) => self.links[t.as_usize()].next = Some(idx),
            None => self.head = Some(idx),
        }
        self.tail = Some(idx);
        self.len += 1;
    }

    /// Unlinks `idx`. Returns false if it was not in the list.
    pub fn remove(&mut self, idx: PageIdx) -> bool {
        if !self.contains(idx) {
            return false;
        }
        let Link { prev, next, .. } = self.links[idx.as_usize()];
        match prev {
            Some(p) => self.links[p.as_usize()].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.links[n.as_usize()].prev = prev,
            None => self.tail = prev,
        }
        self.links[idx.as_usize()] = Link::default();
        self.len -= 1;
        true
    }

    /// Moves a linked `idx` to the front.
    pub fn move_to_front(&mut self, idx: PageIdx) {
        if self.head == Some(idx) {
            return;
        }
        if self.remove(idx) {
            self.push_front(idx);
        }
    }

    /// Iterates from front to back.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            list: self,
            cursor: self.head,
        }
    }

    /// Iterates from back to front.
    pub fn iter_rev(&self) -> RevIter<'_> {
        RevIter {
            list: self,
            cursor: self.tail,
        }
    }
}

pub struct Iter<'a> {
    list: &'a RecencyList,
    cursor: Option<PageIdx>,
}

impl Iterator for Iter<'_> {
    type Item = PageIdx;

    fn next(&mut self) -> Option<PageIdx> {
        let idx = self.cursor?;
        self.cursor = self.list.links[idx.as_usize()].next;
        Some(idx)
    }
}

pub struct RevIter<'a> {
    list: &'a RecencyList,
    cursor: Option<PageIdx>,
}

impl Iterator for RevIter<'_> {
    type Item = PageIdx;

    fn next(&mut self) -> Option<PageIdx> {
        let idx = self.cursor?;
        self.cursor = self.list.links[idx.as_usize()].prev;
        Some(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(list: &RecencyList) -> Vec<u32> {
        list.iter().map(|idx| idx.0).collect()
    }

    #[test]
    fn test_push_front_and_back() {
        let mut list = RecencyList::new();
        list.push_front(PageIdx(1));
        list.push_front(PageIdx(2));
        list.push_back(PageIdx(3));

        assert_eq!(order(&list), vec![2, 1, 3]);
        assert_eq!(list.front(), Some(PageIdx(2)));
        assert_eq!(list.back(), Some(PageIdx(3)));
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_push_is_idempotent() {
        let mut list = RecencyList::new();
        list.push_front(PageIdx(5));
        list.push_front(PageIdx(5));
        list.push_back(PageIdx(5));
        assert_eq!(list.len(), 1);
        assert_eq!(order(&list), vec![5]);
    }

    #[test]
    fn test_remove_middle_and_ends() {
        let mut list = RecencyList::new();
        for i in 0..5 {
            list.push_back(PageIdx(i));
        }

        assert!(list.remove(PageIdx(2)));
        assert_eq!(order(&list), vec![0, 1, 3, 4]);
        assert!(list.remove(PageIdx(0)));
        assert!(list.remove(PageIdx(4)));
        assert_eq!(order(&list), vec![1, 3]);
        assert_eq!(list.front(), Some(PageIdx(1)));
        assert_eq!(list.back(), Some(PageIdx(3)));
        assert!(!list.remove(PageIdx(4)));
        assert!(!list.contains(PageIdx(4)));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_remove_last_element_empties() {
        let mut list = RecencyList::new();
        list.push_front(PageIdx(9));
        assert!(list.remove(PageIdx(9)));
        assert!(list.is_empty());
        assert_eq!(list.front(), None);
        assert_eq!(list.back(), None);
    }

    #[test]
    fn test_move_to_front() {
        let mut list = RecencyList::new();
        for i in 0..4 {
            list.push_back(PageIdx(i));
        }

        list.move_to_front(PageIdx(3));
        assert_eq!(order(&list), vec![3, 0, 1, 2]);
        list.move_to_front(PageIdx(1));
        assert_eq!(order(&list), vec![1, 3, 0, 2]);
        list.move_to_front(PageIdx(1));
        assert_eq!(order(&list), vec![1, 3, 0, 2]);
        assert_eq!(list.back(), Some(PageIdx(2)));
        assert_eq!(list.len(), 4);
    }

    #[test]
    fn test_move_unlinked_is_noop() {
        let mut list = RecencyList::new();
        list.push_back(PageIdx(0));
        list.move_to_front(PageIdx(7));
        assert_eq!(order(&list), vec![0]);
        assert!(!list.contains(PageIdx(7)));
    }

    #[test]
    fn test_iter_rev() {
        let mut list = RecencyList::new();
        for i in 0..3 {
            list.push_back(PageIdx(i));
        }
        let rev: Vec<_> = list.iter_rev().map(|idx| idx.0).collect();
        assert_eq!(rev, vec![2, 1, 0]);
    }

    #[test]
    fn test_reinsert_after_remove() {
        let mut list = RecencyList::new();
        list.push_back(PageIdx(0));
        list.push_back(PageIdx(1));
        list.remove(PageIdx(0));
        list.push_back(PageIdx(0));
        assert_eq!(order(&list), vec![1, 0]);
    }
}
