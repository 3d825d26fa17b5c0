use tracing::debug;

use crate::error::CoreError;
use crate::view::ViewParameters;

/// One slot of the history arena.
#[derive(Debug, Clone)]
struct Node {
    params: ViewParameters,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Bounded undo/redo history of view parameters.
///
/// Entries form a doubly-linked list stored in an arena (`Vec` of nodes
/// addressed by index, with a free list for recycled slots). The cursor
/// points at the entry currently on screen.
///
/// * Pushing while the cursor is not at the tail discards the redo branch.
/// * The list never holds more than `capacity` entries; the oldest entry is
///   evicted from the head regardless of where the cursor is.
#[derive(Debug, Clone)]
pub struct ViewHistory {
    nodes: Vec<Option<Node>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    cursor: Option<usize>,
    len: usize,
    capacity: usize,
}

impl ViewHistory {
    pub const DEFAULT_CAPACITY: usize = 200;

    pub fn new(capacity: usize) -> crate::Result<Self> {
        if capacity == 0 {
            return Err(CoreError::invalid("history capacity must be >= 1"));
        }
        Ok(Self {
            nodes: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            cursor: None,
            len: 0,
            capacity,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The entry under the cursor.
    pub fn current(&self) -> Option<ViewParameters> {
        self.cursor.map(|i| self.node(i).params)
    }

    /// Record a new view. Any redo entries are dropped first.
    pub fn push(&mut self, params: ViewParameters) {
        self.truncate_after_cursor();

        let index = self.alloc(Node {
            params,
            prev: self.tail,
            next: None,
        });
        match self.tail {
            Some(tail) => self.node_mut(tail).next = Some(index),
            None => self.head = Some(index),
        }
        self.tail = Some(index);
        self.cursor = Some(index);
        self.len += 1;

        if self.len > self.capacity {
            self.evict_head();
        }
    }

    /// Step back one entry and return it.
    pub fn undo(&mut self) -> Option<ViewParameters> {
        let prev = self.node(self.cursor?).prev?;
        self.cursor = Some(prev);
        Some(self.node(prev).params)
    }

    /// Step forward one entry and return it.
    pub fn redo(&mut self) -> Option<ViewParameters> {
        let next = self.node(self.cursor?).next?;
        self.cursor = Some(next);
        Some(self.node(next).params)
    }

    pub fn can_undo(&self) -> bool {
        self.cursor.is_some_and(|i| self.node(i).prev.is_some())
    }

    pub fn can_redo(&self) -> bool {
        self.cursor.is_some_and(|i| self.node(i).next.is_some())
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
        self.cursor = None;
        self.len = 0;
    }

    /// Entries from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = ViewParameters> + '_ {
        std::iter::successors(self.head, move |&i| self.node(i).next)
            .map(move |i| self.node(i).params)
    }

    fn truncate_after_cursor(&mut self) {
        let Some(cursor) = self.cursor else {
            return;
        };
        let mut next = self.node_mut(cursor).next.take();
        let mut dropped = 0usize;
        while let Some(i) = next {
            next = self.release(i).next;
            dropped += 1;
        }
        self.tail = Some(cursor);
        self.len -= dropped;
        if dropped > 0 {
            debug!(dropped, "Discarded redo branch");
        }
    }

    fn evict_head(&mut self) {
        let Some(head) = self.head else {
            return;
        };
        let node = self.release(head);
        self.head = node.next;
        if let Some(new_head) = node.next {
            self.node_mut(new_head).prev = None;
        }
        self.len -= 1;
        // `push` always leaves the cursor on the tail, which survives
        // eviction whenever capacity >= 1.
        debug_assert_ne!(self.cursor, Some(head));
    }

    fn alloc(&mut self, node: Node) -> usize {
        match self.free.pop() {
            Some(i) => {
                self.nodes[i] = Some(node);
                i
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        }
    }

    fn release(&mut self, index: usize) -> Node {
        self.free.push(index);
        self.nodes[index]
            .take()
            .unwrap_or_else(|| unreachable!("released a free history slot"))
    }

    fn node(&self, index: usize) -> &Node {
        self.nodes[index]
            .as_ref()
            .unwrap_or_else(|| unreachable!("dangling history index"))
    }

    fn node_mut(&mut self, index: usize) -> &mut Node {
        self.nodes[index]
            .as_mut()
            .unwrap_or_else(|| unreachable!("dangling history index"))
    }
}

impl Default for ViewHistory {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            cursor: None,
            len: 0,
            capacity: Self::DEFAULT_CAPACITY,
        }
    }
}
