//! Interval set — compact ordered set of non-negative integers
//!
//! Elements are stored as inclusive intervals `[start, end]` in a circular
//! singly-linked list kept inside a block arena. `tail` points at the last
//! interval and `tail.next` is the head. The intervals are strictly
//! ascending, non-overlapping and non-adjacent: inserting an element next
//! to an interval extends it, and touching intervals are merged.
//!
//! Blocks released by removals and clears go onto a free-list and are
//! reused before the arena grows, so a set that is repeatedly filled and
//! drained stops allocating once it reaches its high-water mark.
//!
//! The resolution layer uses these sets to index a shared action pool, where
//! indices handed out together tend to be contiguous.

use std::fmt;

/// Terminator of the free-list chain.
const NIL: usize = usize::MAX;

#[derive(Debug, Clone, Copy)]
struct Block {
    start: usize,
    end: usize,
    next: usize,
}

/// Ordered set of integers stored as merged intervals.
#[derive(Debug, Clone, Default)]
pub struct IntervalSet {
    blocks: Vec<Block>,
    tail: Option<usize>,
    unused: Option<usize>,
}

impl IntervalSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// A set holding exactly the elements of `items`.
    pub fn from_elements<I: IntoIterator<Item = usize>>(items: I) -> Self {
        let mut s = Self::new();
        for i in items {
            s.insert(i);
        }
        s
    }

    // ─── Arena management ───────────────────────────────────────────

    fn alloc(&mut self, start: usize, end: usize) -> usize {
        match self.unused {
            Some(idx) => {
                let next_free = self.blocks[idx].next;
                self.unused = if next_free == NIL { None } else { Some(next_free) };
                self.blocks[idx] = Block { start, end, next: idx };
                idx
            }
            None => {
                let idx = self.blocks.len();
                self.blocks.push(Block { start, end, next: idx });
                idx
            }
        }
    }

    fn release(&mut self, idx: usize) {
        self.blocks[idx].next = self.unused.unwrap_or(NIL);
        self.unused = Some(idx);
    }

    fn head(&self) -> Option<usize> {
        self.tail.map(|t| self.blocks[t].next)
    }

    /// Unlink `idx`, whose predecessor in the ring is `prev`.
    fn unlink(&mut self, prev: usize, idx: usize) {
        if prev == idx {
            self.tail = None;
        } else {
            self.blocks[prev].next = self.blocks[idx].next;
            if self.tail == Some(idx) {
                self.tail = Some(prev);
            }
        }
        self.release(idx);
    }

    /// Block indices in ascending order.
    fn block_order(&self) -> BlockIter<'_> {
        BlockIter {
            set: self,
            cursor: self.head(),
        }
    }

    // ─── Mutation ───────────────────────────────────────────────────

    /// Add `i`. Returns whether the set grew.
    pub fn insert(&mut self, i: usize) -> bool {
        self.insert_interval(i, i)
    }

    /// Add every element of `[start, end]`. Returns whether the set grew.
    pub fn insert_interval(&mut self, start: usize, end: usize) -> bool {
        assert!(start <= end, "invalid interval [{}, {}]", start, end);

        let tail = match self.tail {
            None => {
                let b = self.alloc(start, end);
                self.tail = Some(b);
                return true;
            }
            Some(t) => t,
        };

        // Find the first block that overlaps, touches or follows `start`.
        let head = self.blocks[tail].next;
        let mut prev: Option<usize> = None;
        let mut cur = head;
        let found = loop {
            if self.blocks[cur].end.saturating_add(1) >= start {
                break true;
            }
            if cur == tail {
                break false;
            }
            prev = Some(cur);
            cur = self.blocks[cur].next;
        };

        if !found {
            // Everything precedes the new interval: append as new tail.
            let b = self.alloc(start, end);
            self.blocks[b].next = head;
            self.blocks[tail].next = b;
            self.tail = Some(b);
            return true;
        }

        if self.blocks[cur].start > end.saturating_add(1) {
            // Strictly between `prev` and `cur`.
            let b = self.alloc(start, end);
            self.blocks[b].next = cur;
            match prev {
                Some(p) => self.blocks[p].next = b,
                None => self.blocks[tail].next = b,
            }
            return true;
        }

        let mut grew = false;
        if start < self.blocks[cur].start {
            self.blocks[cur].start = start;
            grew = true;
        }
        if end > self.blocks[cur].end {
            self.blocks[cur].end = end;
            grew = true;
            self.merge_following(cur);
        }
        grew
    }

    /// Absorb the blocks after `idx` that now overlap or touch it.
    fn merge_following(&mut self, idx: usize) {
        while Some(idx) != self.tail {
            let next = self.blocks[idx].next;
            if self.blocks[next].start > self.blocks[idx].end.saturating_add(1) {
                break;
            }
            self.blocks[idx].end = self.blocks[idx].end.max(self.blocks[next].end);
            self.unlink(idx, next);
        }
    }

    /// Remove `i`. Returns whether the set shrank.
    pub fn remove(&mut self, i: usize) -> bool {
        self.remove_interval(i, i)
    }

    /// Remove every element of `[start, end]`. Returns whether the set shrank.
    pub fn remove_interval(&mut self, start: usize, end: usize) -> bool {
        assert!(start <= end, "invalid interval [{}, {}]", start, end);

        let Some(mut tail) = self.tail else {
            return false;
        };
        let mut prev = tail;
        let mut cur = self.blocks[tail].next;
        let mut shrank = false;

        loop {
            let Block { start: bs, end: be, next } = self.blocks[cur];
            if bs > end {
                break;
            }
            let was_tail = cur == tail;

            if be >= start {
                shrank = true;
                if start <= bs && end >= be {
                    // Fully covered: drop the block.
                    self.unlink(prev, cur);
                    match self.tail {
                        None => break,
                        Some(t) => tail = t,
                    }
                    if was_tail {
                        break;
                    }
                    cur = next;
                    continue;
                }
                if start > bs && end < be {
                    // Strictly inside: split in two.
                    let b = self.alloc(end + 1, be);
                    self.blocks[b].next = next;
                    self.blocks[cur].end = start - 1;
                    self.blocks[cur].next = b;
                    if was_tail {
                        self.tail = Some(b);
                    }
                    break;
                }
                if start <= bs {
                    self.blocks[cur].start = end + 1;
                } else {
                    self.blocks[cur].end = start - 1;
                }
            }

            if was_tail {
                break;
            }
            prev = cur;
            cur = next;
        }
        shrank
    }

    /// Remove and return the smallest element.
    pub fn take_min(&mut self) -> Option<usize> {
        let tail = self.tail?;
        let head = self.blocks[tail].next;
        let min = self.blocks[head].start;
        if self.blocks[head].start == self.blocks[head].end {
            self.unlink(tail, head);
        } else {
            self.blocks[head].start += 1;
        }
        Some(min)
    }

    /// Add every element of `other`.
    pub fn union_with(&mut self, other: &IntervalSet) {
        for (start, end) in other.intervals() {
            self.insert_interval(start, end);
        }
    }

    /// Remove every element of `other`.
    pub fn difference_with(&mut self, other: &IntervalSet) {
        for (start, end) in other.intervals() {
            if self.is_empty() {
                break;
            }
            self.remove_interval(start, end);
        }
    }

    /// Empty the set, keeping its blocks on the free-list.
    pub fn clear(&mut self) {
        let Some(tail) = self.tail.take() else {
            return;
        };
        let head = self.blocks[tail].next;
        let mut cur = head;
        loop {
            let next = self.blocks[cur].next;
            self.release(cur);
            if cur == tail {
                break;
            }
            cur = next;
        }
    }

    /// Make `out` equal to this set, reusing `out`'s blocks.
    pub fn copy_into(&self, out: &mut IntervalSet) {
        out.clear();
        for (start, end) in self.intervals() {
            out.insert_interval(start, end);
        }
    }

    // ─── Queries ────────────────────────────────────────────────────

    pub fn has(&self, i: usize) -> bool {
        for b in self.block_order() {
            let Block { start, end, .. } = self.blocks[b];
            if i < start {
                return false;
            }
            if i <= end {
                return true;
            }
        }
        false
    }

    pub fn is_empty(&self) -> bool {
        self.tail.is_none()
    }

    pub fn len(&self) -> usize {
        self.intervals().map(|(s, e)| e - s + 1).sum()
    }

    /// The first element, in ascending order, satisfying `matches`.
    pub fn find_first<F: FnMut(usize) -> bool>(&self, mut matches: F) -> Option<usize> {
        self.iter().find(|&i| matches(i))
    }

    pub fn visit_all<F: FnMut(usize)>(&self, visit: F) {
        self.iter().for_each(visit);
    }

    pub fn visit_intervals<F: FnMut(usize, usize)>(&self, mut visit: F) {
        for (start, end) in self.intervals() {
            visit(start, end);
        }
    }

    /// Elements in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.intervals().flat_map(|(s, e)| s..=e)
    }

    /// Intervals in ascending order.
    pub fn intervals(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.block_order().map(move |b| (self.blocks[b].start, self.blocks[b].end))
    }

    /// Number of blocks waiting on the free-list.
    pub fn free_blocks(&self) -> usize {
        let mut n = 0;
        let mut cur = self.unused;
        while let Some(idx) = cur {
            n += 1;
            let next = self.blocks[idx].next;
            cur = if next == NIL { None } else { Some(next) };
        }
        n
    }

    pub fn is_equal(&self, other: &IntervalSet) -> bool {
        self.intervals().eq(other.intervals())
    }
}

struct BlockIter<'a> {
    set: &'a IntervalSet,
    cursor: Option<usize>,
}

impl Iterator for BlockIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let idx = self.cursor?;
        self.cursor = if Some(idx) == self.set.tail {
            None
        } else {
            Some(self.set.blocks[idx].next)
        };
        Some(idx)
    }
}

impl PartialEq for IntervalSet {
    fn eq(&self, other: &Self) -> bool {
        self.is_equal(other)
    }
}

impl Eq for IntervalSet {}

impl FromIterator<usize> for IntervalSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Self::from_elements(iter)
    }
}

impl fmt::Display for IntervalSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (n, (start, end)) in self.intervals().enumerate() {
            if n > 0 {
                f.write_str(", ")?;
            }
            write!(f, "[{}, {}]", start, end)?;
        }
        f.write_str("}")
    }
}
