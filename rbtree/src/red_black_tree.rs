use core::fmt;
use std::borrow::Borrow;
use std::iter::FusedIterator;
use std::mem;

use crate::error::{InvariantViolation, TreeError};
use crate::handle::{Handle, TreeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    Red,
    Black,
}

impl Color {
    /// Returns `true` if the color is [`Red`].
    ///
    /// [`Red`]: Color::Red
    #[must_use]
    fn is_red(&self) -> bool {
        matches!(self, Self::Red)
    }

    /// Returns `true` if the color is [`Black`].
    ///
    /// [`Black`]: Color::Black
    #[must_use]
    fn is_black(&self) -> bool {
        matches!(self, Self::Black)
    }
}

/// Index of a node in the slot table. [`NodeId::NIL`] names the sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
struct NodeId(u32);

impl NodeId {
    const NIL: NodeId = NodeId(u32::MAX);

    /// Number of addressable slots, the sentinel's id is reserved.
    const MAX_SLOTS: usize = u32::MAX as usize;

    #[inline]
    fn is_nil(self) -> bool {
        self == Self::NIL
    }

    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy)]
struct Links {
    color: Color,
    parent: NodeId,
    left: NodeId,
    right: NodeId,
}

impl Links {
    const SENTINEL: Links = Links {
        color: Color::Black,
        parent: NodeId::NIL,
        left: NodeId::NIL,
        right: NodeId::NIL,
    };
}

struct Node<K> {
    key: K,
    links: Links,
}

enum Entry<K> {
    Occupied(Node<K>),
    // next free slot
    Vacant(NodeId),
}

struct Slot<K> {
    // bumped every time the slot is freed so stale handles stop matching
    generation: u32,
    entry: Entry<K>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodePos {
    Root,
    Left,
    Right,
}

/// An ordered collection of keys kept in a red-black tree.
///
/// Duplicate keys are allowed. A key that compares equal to a stored key is
/// placed after it, so equal keys keep their insertion order in
/// [`iter`](Self::iter) and [`to_ordered_sequence`](Self::to_ordered_sequence).
pub struct RedBlackTree<K> {
    // INVARIANTS:
    //  * `root.is_nil()` iff `len == 0`
    //  * every id reachable from `root` names an occupied slot
    //  * `sentinel` is black with nil children, its parent is only
    //    meaningful during a delete
    //  * `free` heads a list of vacant slots linked through `Entry::Vacant`
    slots: Vec<Slot<K>>,
    free: NodeId,
    root: NodeId,
    len: usize,
    sentinel: Links,
    id: TreeId,
}

impl<K> Default for RedBlackTree<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> fmt::Debug for RedBlackTree<K>
where
    K: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        struct NodeDebug<'a, K> {
            tree: &'a RedBlackTree<K>,
            id: NodeId,
        }

        impl<K> fmt::Debug for NodeDebug<'_, K>
        where
            K: fmt::Debug,
        {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let tree = self.tree;
                let links = tree.links(self.id);
                let neighbour = |id: NodeId| (!id.is_nil()).then(|| tree.key(id));
                f.debug_struct("Node")
                    .field("key", tree.key(self.id))
                    .field("color", &links.color)
                    .field("parent", &neighbour(links.parent))
                    .field("left", &neighbour(links.left))
                    .field("right", &neighbour(links.right))
                    .finish()
            }
        }

        struct TreeDebug<'a, K> {
            tree: &'a RedBlackTree<K>,
        }

        impl<K> fmt::Debug for TreeDebug<'_, K>
        where
            K: fmt::Debug,
        {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let mut f = f.debug_list();
                let mut ids = self.tree.ids();
                while let Some(id) = ids.next_id_in(self.tree) {
                    f.entry(&NodeDebug {
                        tree: self.tree,
                        id,
                    });
                }
                f.finish()
            }
        }

        let mut f = f.debug_struct("RedBlackTree");
        f.field("len", &self.len);
        match self.len {
            0 => {
                f.field("root", &None::<K>);
                let nodes: &[K] = &[];
                f.field("nodes", &nodes);
            }
            _ => {
                f.field("root", &Some(self.key(self.root)));
                f.field("nodes", &TreeDebug { tree: self });
            }
        }

        f.finish()
    }
}

impl<K> RedBlackTree<K> {
    /// Creates an empty tree whose root is the sentinel.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: NodeId::NIL,
            root: NodeId::NIL,
            len: 0,
            sentinel: Links::SENTINEL,
            id: TreeId::next(),
        }
    }

    /// Creates an empty tree with room for `cap` nodes before reallocating.
    pub fn with_capacity(cap: usize) -> Self {
        let mut s = Self::new();
        s.slots.reserve(cap.min(NodeId::MAX_SLOTS));
        s
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of nodes the tree can hold without reallocating.
    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    /// Drops every key. All outstanding handles become invalid.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free = NodeId::NIL;
        self.root = NodeId::NIL;
        self.len = 0;
        self.sentinel = Links::SENTINEL;
        // slot generations restart from zero, so old handles must not match
        self.id = TreeId::next();
    }

    #[inline]
    fn node(&self, id: NodeId) -> &Node<K> {
        match &self.slots[id.index()].entry {
            Entry::Occupied(node) => node,
            Entry::Vacant(_) => unreachable!("link to vacant slot {}", id.0),
        }
    }

    #[inline]
    fn links(&self, id: NodeId) -> &Links {
        if id.is_nil() {
            &self.sentinel
        } else {
            &self.node(id).links
        }
    }

    #[inline]
    fn links_mut(&mut self, id: NodeId) -> &mut Links {
        if id.is_nil() {
            return &mut self.sentinel;
        }
        match &mut self.slots[id.index()].entry {
            Entry::Occupied(node) => &mut node.links,
            Entry::Vacant(_) => unreachable!("link to vacant slot {}", id.0),
        }
    }

    #[inline]
    fn key(&self, id: NodeId) -> &K {
        &self.node(id).key
    }

    #[inline]
    fn parent(&self, id: NodeId) -> NodeId {
        self.links(id).parent
    }

    #[inline]
    fn set_parent(&mut self, id: NodeId, new_parent: NodeId) {
        self.links_mut(id).parent = new_parent;
    }

    #[inline]
    fn left(&self, id: NodeId) -> NodeId {
        self.links(id).left
    }

    #[inline]
    fn set_left(&mut self, id: NodeId, new_left: NodeId) {
        debug_assert!(!id.is_nil(), "sentinel children are fixed");
        self.links_mut(id).left = new_left;
    }

    #[inline]
    fn right(&self, id: NodeId) -> NodeId {
        self.links(id).right
    }

    #[inline]
    fn set_right(&mut self, id: NodeId, new_right: NodeId) {
        debug_assert!(!id.is_nil(), "sentinel children are fixed");
        self.links_mut(id).right = new_right;
    }

    #[inline]
    fn color(&self, id: NodeId) -> Color {
        self.links(id).color
    }

    #[inline]
    fn set_color(&mut self, id: NodeId, new_color: Color) {
        debug_assert!(
            !(id.is_nil() && new_color.is_red()),
            "sentinel must stay black"
        );
        self.links_mut(id).color = new_color;
    }

    /// Which child slot of its parent `id` occupies.
    ///
    /// For the sentinel this is the slot it was last transplanted into, as
    /// long as its parent's other child is a real node.
    #[inline]
    fn pos(&self, id: NodeId) -> NodePos {
        let parent = self.parent(id);
        if parent.is_nil() {
            NodePos::Root
        } else if self.left(parent) == id {
            NodePos::Left
        } else {
            debug_assert_eq!(self.right(parent), id);
            NodePos::Right
        }
    }

    fn alloc(&mut self, node: Node<K>) -> NodeId {
        if self.free.is_nil() {
            assert!(self.slots.len() < NodeId::MAX_SLOTS, "rbtree capacity overflow");
            let id = NodeId(self.slots.len() as u32);
            self.slots.push(Slot {
                generation: 0,
                entry: Entry::Occupied(node),
            });
            id
        } else {
            let id = self.free;
            let slot = &mut self.slots[id.index()];
            self.free = match mem::replace(&mut slot.entry, Entry::Occupied(node)) {
                Entry::Vacant(next) => next,
                Entry::Occupied(_) => unreachable!("free list points at occupied slot {}", id.0),
            };
            id
        }
    }

    /// Makes sure the next `alloc` will not need to grow the slot table.
    fn try_reserve_slot(&mut self) -> Result<(), TreeError> {
        if !self.free.is_nil() {
            return Ok(());
        }
        if self.slots.len() >= NodeId::MAX_SLOTS {
            return Err(TreeError::CapacityOverflow {
                max: NodeId::MAX_SLOTS,
            });
        }
        self.slots.try_reserve(1).map_err(|source| {
            log::debug!("node allocation failed: {source}");
            TreeError::AllocFailed { source }
        })
    }

    fn free_slot(&mut self, id: NodeId) -> K {
        let slot = &mut self.slots[id.index()];
        let entry = mem::replace(&mut slot.entry, Entry::Vacant(self.free));
        slot.generation = slot.generation.wrapping_add(1);
        self.free = id;
        match entry {
            Entry::Occupied(node) => node.key,
            Entry::Vacant(_) => unreachable!("double free of slot {}", id.0),
        }
    }

    fn handle(&self, id: NodeId) -> Handle {
        Handle {
            tree: self.id,
            index: id.0,
            generation: self.slots[id.index()].generation,
        }
    }

    fn resolve(&self, handle: Handle) -> Option<NodeId> {
        if handle.tree != self.id {
            return None;
        }
        match self.slots.get(handle.index as usize) {
            Some(Slot {
                generation,
                entry: Entry::Occupied(_),
            }) if *generation == handle.generation => Some(NodeId(handle.index)),
            _ => None,
        }
    }

    /// Returns the key of the node named by `handle`, or `None` if the handle
    /// is not live in this tree.
    pub fn key_of(&self, handle: Handle) -> Option<&K> {
        self.resolve(handle).map(|id| self.key(id))
    }

    /// Returns `true` if `handle` names a live node of this tree.
    pub fn contains_handle(&self, handle: Handle) -> bool {
        self.resolve(handle).is_some()
    }

    /// Finds a node with a key equal to `key`.
    ///
    /// With duplicates this is the first match met on the way down from the
    /// root, not necessarily the first in order.
    pub fn find<Q>(&self, key: &Q) -> Option<Handle>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.find_raw(key).map(|id| self.handle(id))
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.find_raw(key).is_some()
    }

    fn find_raw<Q>(&self, key: &Q) -> Option<NodeId>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut x = self.root;
        while !x.is_nil() {
            match key.cmp(self.key(x).borrow()) {
                std::cmp::Ordering::Less => x = self.left(x),
                std::cmp::Ordering::Equal => return Some(x),
                std::cmp::Ordering::Greater => x = self.right(x),
            }
        }

        None
    }

    /// Handle of the smallest key, `None` if the tree is empty.
    pub fn min(&self) -> Option<Handle> {
        if self.is_empty() {
            return None;
        }
        Some(self.handle(self.min_of(self.root)))
    }

    fn min_of(&self, root: NodeId) -> NodeId {
        let mut x = root;
        while !self.left(x).is_nil() {
            x = self.left(x);
        }

        x
    }

    /// Handle of the largest key, `None` if the tree is empty.
    pub fn max(&self) -> Option<Handle> {
        if self.is_empty() {
            return None;
        }
        Some(self.handle(self.max_of(self.root)))
    }

    fn max_of(&self, root: NodeId) -> NodeId {
        let mut x = root;
        while !self.right(x).is_nil() {
            x = self.right(x);
        }

        x
    }

    /// Handle of the node that follows `handle` in order.
    ///
    /// Returns `None` for the last node or for a handle that is not live.
    pub fn successor(&self, handle: Handle) -> Option<Handle> {
        let node = self.resolve(handle)?;
        let next = self.successor_core(node);
        (!next.is_nil()).then(|| self.handle(next))
    }

    fn successor_core(&self, mut node: NodeId) -> NodeId {
        //       +---------- 34 ---------+
        //       |                       |
        // +---- 2 ----+                 58 ----+
        // |           |                        |
        // 1      +--- 9 ----+              +-- 77 --+
        //        |          |              |        |
        //     +- 6       +- 20 -+      +- 71 -+     82
        //     |          |      |      |      |
        //     5         12 -+   24    67      75
        //                   |
        //                   13

        let right = self.right(node);
        if !right.is_nil() {
            // 9 -> 12, 2 -> 5, 58 -> 67 ...
            // Everything in the right subtree is larger than node but smaller
            // than any larger ancestor, so the successor is its minimum.
            return self.min_of(right);
        }

        // 6 -> 9, 1 -> 2, 13 -> 20, 24 -> 34 ...
        // Move up until we leave a left subtree, that parent is the successor.
        let mut parent = self.parent(node);
        while !parent.is_nil() && self.right(parent) == node {
            node = parent;
            parent = self.parent(node);
        }

        parent
    }

    /// Handle of the node that precedes `handle` in order.
    ///
    /// Returns `None` for the first node or for a handle that is not live.
    pub fn predecessor(&self, handle: Handle) -> Option<Handle> {
        let node = self.resolve(handle)?;
        let prev = self.predecessor_core(node);
        (!prev.is_nil()).then(|| self.handle(prev))
    }

    fn predecessor_core(&self, mut node: NodeId) -> NodeId {
        // 2 -> 1, 9 -> 6, 20 -> 13, 77 -> 75
        let left = self.left(node);
        if !left.is_nil() {
            return self.max_of(left);
        }

        // 12 -> 9, 58 -> 34, 67 -> 58
        let mut parent = self.parent(node);
        while !parent.is_nil() && self.left(parent) == node {
            node = parent;
            parent = self.parent(node);
        }

        parent
    }

    /// Iterates over the keys in ascending order.
    pub fn iter(&self) -> Iter<'_, K> {
        Iter {
            ids: self.ids(),
            tree: self,
        }
    }

    fn ids(&self) -> InorderIds {
        let mut ids = InorderIds {
            stack: Vec::new(),
            remaining: self.len,
        };
        ids.push_left_spine(self, self.root);
        ids
    }

    /// Returns all keys in ascending order.
    pub fn to_ordered_sequence(&self) -> Vec<K>
    where
        K: Clone,
    {
        let mut keys = Vec::with_capacity(self.len);
        keys.extend(self.iter().cloned());
        keys
    }

    /// Writes the smallest `buf.len()` keys into `buf` in ascending order and
    /// returns how many were written.
    pub fn copy_to_slice(&self, buf: &mut [K]) -> usize
    where
        K: Clone,
    {
        let mut written = 0;
        for (dst, key) in buf.iter_mut().zip(self.iter()) {
            dst.clone_from(key);
            written += 1;
        }
        written
    }

    fn rotate_left(&mut self, node: NodeId) {
        //    p                       p
        //    |                       |
        // +-node-+               +-right-+
        // |      |      -->      |       |
        // a  +-right-+       +-node-+    c
        //    |       |       |      |
        //    b       c       a      b
        // where a, b, c can be any subtrees
        let right = self.right(node);
        debug_assert!(!right.is_nil(), "cannot rotate left through the sentinel");

        // attach b to node
        let b = self.left(right);
        self.set_right(node, b);
        if !b.is_nil() {
            self.set_parent(b, node);
        }

        // attach right to parent
        let parent = self.parent(node);
        self.set_parent(right, parent);
        match self.pos(node) {
            NodePos::Root => self.root = right,
            NodePos::Left => self.set_left(parent, right),
            NodePos::Right => self.set_right(parent, right),
        }

        // attach node to right
        self.set_left(right, node);
        self.set_parent(node, right);
    }

    fn rotate_right(&mut self, node: NodeId) {
        //         p              p
        //         |              |
        //     +-node-+       +-left-+
        //     |      |       |      |
        // +-left-+   c  -->  a  +-node-+
        // |      |              |      |
        // a      b              b      c
        // where a, b, c can be any subtrees
        let left = self.left(node);
        debug_assert!(!left.is_nil(), "cannot rotate right through the sentinel");

        // attach b to node
        let b = self.right(left);
        self.set_left(node, b);
        if !b.is_nil() {
            self.set_parent(b, node);
        }

        // attach left to parent
        let parent = self.parent(node);
        self.set_parent(left, parent);
        match self.pos(node) {
            NodePos::Root => self.root = left,
            NodePos::Left => self.set_left(parent, left),
            NodePos::Right => self.set_right(parent, left),
        }

        // attach node to left
        self.set_right(left, node);
        self.set_parent(node, left);
    }

    /// Inserts `key` and returns a handle to its node.
    ///
    /// Never rejects a key. Aborts like the std collections if the node
    /// table cannot grow, see [`try_insert`](Self::try_insert).
    pub fn insert(&mut self, key: K) -> Handle
    where
        K: Ord,
    {
        let id = self.insert_core(key);
        self.handle(id)
    }

    /// Like [`insert`](Self::insert) but reports allocation failure instead
    /// of aborting. On error the tree is unchanged and `key` is dropped.
    pub fn try_insert(&mut self, key: K) -> Result<Handle, TreeError>
    where
        K: Ord,
    {
        self.try_reserve_slot()?;
        let id = self.insert_core(key);
        Ok(self.handle(id))
    }

    fn insert_core(&mut self, key: K) -> NodeId
    where
        K: Ord,
    {
        // Move left/right down the tree until we hit the sentinel.
        // Keys that are not less than the visited key go right, so equal keys
        // end up after the ones already stored.
        let mut parent = NodeId::NIL;
        let mut goes_left = false;
        let mut x = self.root;
        while !x.is_nil() {
            parent = x;
            goes_left = key < *self.key(x);
            x = if goes_left { self.left(x) } else { self.right(x) };
        }

        // new node is a leaf, both children are the sentinel
        let new_node = self.alloc(Node {
            key,
            links: Links {
                color: Color::Red,
                parent,
                left: NodeId::NIL,
                right: NodeId::NIL,
            },
        });
        if parent.is_nil() {
            self.root = new_node;
        } else if goes_left {
            self.set_left(parent, new_node);
        } else {
            self.set_right(parent, new_node);
        }

        self.len += 1;
        self.insert_fixup(new_node);
        new_node
    }

    fn insert_fixup(&mut self, new_node: NodeId) {
        let mut node = new_node;
        loop {
            let mut parent = self.parent(node);
            if self.color(parent).is_black() {
                // also covers the root, whose parent is the sentinel
                break;
            }
            debug_assert!(self.color(node).is_red());
            // Red parent with a red child. There is exactly one such violation:
            // first between new_node and its parent, after a recolor between
            // the grand parent and its parent.

            // grand_parent is a real node because a red parent is never the root
            let grand_parent = self.parent(parent);
            debug_assert!(self.color(grand_parent).is_black());

            match self.pos(parent) {
                NodePos::Root => unreachable!("red node at the root"),
                NodePos::Left => {
                    let uncle = self.right(grand_parent);
                    if self.color(uncle).is_red() {
                        //     +--- gp:b ---+               +--- gp:r ---+
                        //     |            |               |            |
                        //  + p:r +      + u:r +   -->   + p:b +      + u:b +
                        //  |     |      |     |         |     |      |     |
                        // n:r   a:b    b:b   c:b       n:r   a:b    b:b   c:b
                        //
                        // Black height is unchanged, but gp may now have a red
                        // parent. Repeat with gp as the new node.
                        log::trace!("insert fixup: red uncle, recolor (left)");
                        self.set_color(parent, Color::Black);
                        self.set_color(uncle, Color::Black);
                        self.set_color(grand_parent, Color::Red);
                        node = grand_parent;
                    } else {
                        if let NodePos::Right = self.pos(node) {
                            //       +-- gp:b --+                 +-- gp:b --+
                            //       |          |                 |          |
                            //  +-- p:r --+    u:b  -->       +- n:r --+    u:b
                            //  |         |                   |        |
                            // a:b    +- n:r -+           +- p:r -+   c:b
                            //        |       |           |       |
                            //       b:b     c:b         a:b     b:b
                            //
                            // left rotate parent and swap node and parent so we match the line case
                            log::trace!("insert fixup: black uncle, triangle (left)");
                            self.rotate_left(parent);
                            mem::swap(&mut parent, &mut node);
                        }

                        //           +-- gp:b --+            +----- p:b -----+
                        //           |          |            |               |
                        //      +-- p:r --+    u:b  -->   +- n:r -+     +- gp:r -+
                        //      |         |               |       |     |        |
                        //  +- n:r -+    c:b             a:b     b:b   c:b      u:b
                        //  |       |
                        // a:b     b:b
                        //
                        // parent is black now, the loop ends on the next check
                        log::trace!("insert fixup: black uncle, line (left)");
                        self.set_color(parent, Color::Black);
                        self.set_color(grand_parent, Color::Red);
                        self.rotate_right(grand_parent);
                    }
                }
                NodePos::Right => {
                    // same as Left branch but left/right are switched
                    let uncle = self.left(grand_parent);
                    if self.color(uncle).is_red() {
                        log::trace!("insert fixup: red uncle, recolor (right)");
                        self.set_color(parent, Color::Black);
                        self.set_color(uncle, Color::Black);
                        self.set_color(grand_parent, Color::Red);
                        node = grand_parent;
                    } else {
                        if let NodePos::Left = self.pos(node) {
                            log::trace!("insert fixup: black uncle, triangle (right)");
                            self.rotate_right(parent);
                            mem::swap(&mut parent, &mut node);
                        }

                        log::trace!("insert fixup: black uncle, line (right)");
                        self.set_color(parent, Color::Black);
                        self.set_color(grand_parent, Color::Red);
                        self.rotate_left(grand_parent);
                    }
                }
            }
        }

        let root = self.root;
        self.set_color(root, Color::Black);
    }

    /// Removes the node named by `handle` and returns its key.
    ///
    /// Fails with [`TreeError::InvalidHandle`] if the handle comes from
    /// another tree or its node was already erased. The tree is not touched
    /// in that case.
    pub fn erase(&mut self, handle: Handle) -> Result<K, TreeError> {
        match self.resolve(handle) {
            Some(node) => Ok(self.delete_core(node)),
            None => {
                log::debug!("rejected erase of {handle:?}");
                Err(TreeError::InvalidHandle)
            }
        }
    }

    /// Removes one node whose key equals `key`, the one [`find`](Self::find)
    /// would return.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<K>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.find_raw(key).map(|node| self.delete_core(node))
    }

    fn delete_core(&mut self, node: NodeId) -> K {
        //       ┌────────── 34 ─────────┐
        //       │                       │
        // ┌──── 2 ────┐                 58 ────┐
        // │           │                        │
        // 1      ┌─── 9 ────┐              ┌── 77 ──┐
        //        │          │              │        │
        //     ┌─ 6       ┌─ 20 ─┐      ┌─ 71 ─┐     82
        //     │          │      │      │      │
        //     5         12 ─┐   24    67      75
        //                   │
        //                   13

        let left = self.left(node);
        let right = self.right(node);
        let mut removed_color = self.color(node);
        // node that takes the place of the one spliced out, may be the sentinel
        let replacement;

        if left.is_nil() || right.is_nil() {
            // `node` has at most one child, replace it by that child or the sentinel.
            // For example remove 1, 6, 12, 58 from tree above
            replacement = if left.is_nil() { right } else { left };
            self.replace_subtree(node, replacement);
        } else {
            // Replace `node` with its successor, the minimum of its right subtree.
            // The successor is relinked rather than its key moved into `node`,
            // so handles to it stay valid.
            let successor = self.min_of(right);
            removed_color = self.color(successor);
            replacement = self.right(successor);

            // Two cases:
            //  a) successor is the right child of `node`: it keeps its right
            //     subtree, for example remove 20, 75, 77 from tree above
            //  b) otherwise first replace the successor by its right child,
            //     then give it `node`'s right subtree,
            //     for example remove 9 from tree above, successor is 12
            if successor == right {
                // the sentinel too, delete_fixup walks up from it
                self.set_parent(replacement, successor);
            } else {
                self.replace_subtree(successor, replacement);
                self.set_right(successor, right);
                self.set_parent(right, successor);
            }
            self.replace_subtree(node, successor);
            self.set_left(successor, left);
            self.set_parent(left, successor);
            let color = self.color(node);
            self.set_color(successor, color);
        }

        if removed_color.is_black() {
            self.delete_fixup(replacement);
        }
        self.sentinel = Links::SENTINEL;

        self.len -= 1;
        self.free_slot(node)
    }

    fn delete_fixup(&mut self, mut x: NodeId) {
        // x sits where a black node was removed, every path through x is one
        // black node short.
        //
        // If x is red we color it black after the loop and are done.
        // If x is the root the whole tree lost one black level, which is fine.
        while x != self.root && self.color(x).is_black() {
            // x is "doubly black" and has a real sibling: the removed black
            // node gave the sibling's side a black height of at least one.
            let parent = self.parent(x);

            match self.pos(x) {
                NodePos::Root => unreachable!("fixup cursor reached the root"),
                NodePos::Left => {
                    let mut sibling = self.right(parent);
                    debug_assert!(!sibling.is_nil(), "doubly black node without a sibling");

                    if self.color(sibling).is_red() {
                        //     ┌─── p:b ───┐                ┌─── p:r ───┐                    ┌─── s:b ───┐
                        //     │           │                │           │                    │           │
                        // ┌─ x:b ─┐   ┌─ s:r ─┐   ──►  ┌─ x:b ─┐   ┌─ s:b ─┐   ──►      ┌─ p:r ─┐      d:b
                        // │       │   │       │        │       │   │       │            │       │
                        // a       b  c:b     d:b       a       b  c:b     d:b       ┌─ x:b ─┐  c:b
                        //                                                           │       │
                        //                                                           a       b
                        // x gains a red parent, continue with case 2, 3 or 4.
                        log::trace!("delete fixup: case 1, red sibling (left)");
                        self.set_color(sibling, Color::Black);
                        self.set_color(parent, Color::Red);
                        self.rotate_left(parent);
                        sibling = self.right(parent);
                    }

                    let near = self.left(sibling);
                    let far = self.right(sibling);
                    if self.color(near).is_black() && self.color(far).is_black() {
                        //     ┌─── p:c ───┐                ┌─── p:c ───┐
                        //     │           │                │           │
                        // ┌─ x:b ─┐   ┌─ s:b ─┐   ──►  ┌─ x:b ─┐   ┌─ s:r ─┐
                        // │       │   │       │        │       │   │       │
                        // a       b  c:b     d:b       a       b  c:b     d:b
                        //
                        // Move the missing black up to the parent. Coming from
                        // case 1 the parent is red and the loop ends.
                        log::trace!("delete fixup: case 2, black nephews (left)");
                        self.set_color(sibling, Color::Red);
                        x = parent;
                    } else {
                        if self.color(far).is_black() {
                            //    ┌───── p:c ─────┐                ┌─── p:c ───┐
                            //    │               │                │           │
                            // ┌─ x:b ─┐      ┌─ s:b ─┐   ──►  ┌─ x:b ─┐   ┌─ c:b ─┐
                            // │       │      │       │        │       │   │       │
                            // a       b  ┌─ c:r ─┐  d:b       a       b   e   ┌─ s:r ─┐
                            //            │       │                            │       │
                            //            e       f                            f      d:b
                            //
                            // turns into case 4
                            log::trace!("delete fixup: case 3, red near nephew (left)");
                            self.set_color(near, Color::Black);
                            self.set_color(sibling, Color::Red);
                            self.rotate_right(sibling);
                            sibling = self.right(parent);
                        }

                        //     ┌─── p:c ───┐                     ┌── s:c ──┐
                        //     │           │                     │         │
                        // ┌─ x:b ─┐   ┌─ s:b ─┐   ──►       ┌─ p:b ─┐    d:b
                        // │       │   │       │             │       │
                        // a       b  c:b     d:r       ┌─ x:b ─┐   c:b
                        //                              │       │
                        //                              a       b
                        //
                        // Paths through x gain the missing black node, paths
                        // through d keep theirs by recoloring d.
                        log::trace!("delete fixup: case 4, red far nephew (left)");
                        let parent_color = self.color(parent);
                        self.set_color(sibling, parent_color);
                        self.set_color(parent, Color::Black);
                        let far = self.right(sibling);
                        self.set_color(far, Color::Black);
                        self.rotate_left(parent);
                        x = self.root;
                    }
                }
                NodePos::Right => {
                    // same as Left branch but left/right are switched
                    let mut sibling = self.left(parent);
                    debug_assert!(!sibling.is_nil(), "doubly black node without a sibling");

                    if self.color(sibling).is_red() {
                        log::trace!("delete fixup: case 1, red sibling (right)");
                        self.set_color(sibling, Color::Black);
                        self.set_color(parent, Color::Red);
                        self.rotate_right(parent);
                        sibling = self.left(parent);
                    }

                    let near = self.right(sibling);
                    let far = self.left(sibling);
                    if self.color(near).is_black() && self.color(far).is_black() {
                        log::trace!("delete fixup: case 2, black nephews (right)");
                        self.set_color(sibling, Color::Red);
                        x = parent;
                    } else {
                        if self.color(far).is_black() {
                            log::trace!("delete fixup: case 3, red near nephew (right)");
                            self.set_color(near, Color::Black);
                            self.set_color(sibling, Color::Red);
                            self.rotate_left(sibling);
                            sibling = self.left(parent);
                        }

                        log::trace!("delete fixup: case 4, red far nephew (right)");
                        let parent_color = self.color(parent);
                        self.set_color(sibling, parent_color);
                        self.set_color(parent, Color::Black);
                        let far = self.left(sibling);
                        self.set_color(far, Color::Black);
                        self.rotate_right(parent);
                        x = self.root;
                    }
                }
            }
        }

        self.set_color(x, Color::Black);
    }

    /// Replaces subtree `old` with subtree `new`, which may be the sentinel.
    fn replace_subtree(&mut self, old: NodeId, new: NodeId) {
        // a) make the parent of `old` point to `new`, if `old` was the root
        //    `new` becomes the root
        // b) make `new` point to the parent of `old`, for the sentinel this
        //    records where delete_fixup has to start
        let parent = self.parent(old);
        match self.pos(old) {
            NodePos::Root => self.root = new,
            NodePos::Left => self.set_left(parent, new),
            NodePos::Right => self.set_right(parent, new),
        }
        self.set_parent(new, parent);
    }

    /// Checks the search order, the red-black properties, parent links and
    /// the length counter.
    pub fn validate(&self) -> Result<(), InvariantViolation>
    where
        K: Ord,
    {
        let sentinel = &self.sentinel;
        if sentinel.color.is_red() || !sentinel.left.is_nil() || !sentinel.right.is_nil() {
            return Err(InvariantViolation::BadSentinel);
        }
        if self.color(self.root).is_red() {
            return Err(InvariantViolation::RedRoot);
        }
        if !self.root.is_nil() && !self.parent(self.root).is_nil() {
            return Err(InvariantViolation::BrokenParentLink { index: self.root.0 });
        }

        let mut counted = 0;
        self.validate_subtree(self.root, None, None, &mut counted)?;
        if counted != self.len {
            return Err(InvariantViolation::LengthMismatch {
                counted,
                len: self.len,
            });
        }
        Ok(())
    }

    /// Returns the black height of `node`, counting the sentinel leaf.
    fn validate_subtree(
        &self,
        node: NodeId,
        lower: Option<&K>,
        upper: Option<&K>,
        counted: &mut usize,
    ) -> Result<usize, InvariantViolation>
    where
        K: Ord,
    {
        if node.is_nil() {
            return Ok(1);
        }
        *counted += 1;

        let key = self.key(node);
        if lower.is_some_and(|lower| key < lower) || upper.is_some_and(|upper| key > upper) {
            return Err(InvariantViolation::OutOfOrder { index: node.0 });
        }

        let (left, right) = (self.left(node), self.right(node));
        for child in [left, right] {
            if child.is_nil() {
                continue;
            }
            if self.parent(child) != node {
                return Err(InvariantViolation::BrokenParentLink { index: child.0 });
            }
            if self.color(node).is_red() && self.color(child).is_red() {
                return Err(InvariantViolation::RedChild { index: node.0 });
            }
        }

        let left_height = self.validate_subtree(left, lower, Some(key), counted)?;
        let right_height = self.validate_subtree(right, Some(key), upper, counted)?;
        if left_height != right_height {
            return Err(InvariantViolation::BlackHeight {
                index: node.0,
                left: left_height,
                right: right_height,
            });
        }

        Ok(left_height + self.color(node).is_black() as usize)
    }
}

impl<K: Ord> Extend<K> for RedBlackTree<K> {
    fn extend<I: IntoIterator<Item = K>>(&mut self, iter: I) {
        for key in iter {
            self.insert(key);
        }
    }
}

impl<K: Ord> FromIterator<K> for RedBlackTree<K> {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut tree = Self::with_capacity(iter.size_hint().0);
        tree.extend(iter);
        tree
    }
}

impl<'a, K> IntoIterator for &'a RedBlackTree<K> {
    type Item = &'a K;
    type IntoIter = Iter<'a, K>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// In-order walk over node ids with an explicit stack.
struct InorderIds {
    stack: Vec<NodeId>,
    remaining: usize,
}

impl InorderIds {
    fn push_left_spine<K>(&mut self, tree: &RedBlackTree<K>, mut node: NodeId) {
        while !node.is_nil() {
            self.stack.push(node);
            node = tree.left(node);
        }
    }

    fn next_id_in<K>(&mut self, tree: &RedBlackTree<K>) -> Option<NodeId> {
        let node = self.stack.pop()?;
        self.push_left_spine(tree, tree.right(node));
        self.remaining -= 1;
        Some(node)
    }
}

/// Iterator over the keys of a [`RedBlackTree`] in ascending order.
///
/// Created by [`RedBlackTree::iter`].
pub struct Iter<'a, K> {
    tree: &'a RedBlackTree<K>,
    ids: InorderIds,
}

impl<'a, K> Iterator for Iter<'a, K> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        let tree = self.tree;
        self.ids.next_id_in(tree).map(|id| tree.key(id))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.ids.remaining, Some(self.ids.remaining))
    }
}

impl<K> ExactSizeIterator for Iter<'_, K> {}

impl<K> FusedIterator for Iter<'_, K> {}

impl<K> fmt::Debug for Iter<'_, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Iter")
            .field("remaining", &self.ids.remaining)
            .finish()
    }
}
