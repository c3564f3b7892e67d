/*
 * Created on Wed Oct 12 2022
 *
 * This file is a part of Skytable
 * Skytable (formerly known as TerrabaseDB or Skybase) is a free and open-source
 * NoSQL database written by Sayan Nandan ("the Author") with the
 * vision to provide flexibility in data modelling without compromising
 * on performance, queryability or scalability.
 *
 * Copyright (c) 2022, Sayan Nandan <ohsayan@outlook.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! The flat ordered map: a weak-AVL (WAVL / rank-balanced) tree stored in a
//! contiguous [`RawBuf`], nodes addressed by index rather than pointer so the
//! whole container is one `memcpy` from being relocated.
//!
//! Index `0` is the sentinel (NIL); real nodes live at indices `1..`. Dead
//! slots left behind by `remove` are threaded onto a free list through the
//! `left` field of the dead [`Slot::Free`] entry, the same "recycle storage
//! through a spare node field" idiom `engine/idx/stord/mod.rs`'s
//! `LiberalStrategy` free list uses for its own linked index.
//!
//! Ranks are stored as a small integer per node rather than a bare parity
//! bit (see `DESIGN.md`): a one-bit encoding is sufficient in principle for
//! WAVL's rank-difference invariants, but the deletion-side case table is
//! easy to get subtly wrong when derived from parity alone with no reference
//! implementation to check against. A node's rank is one `u32`; parity, where
//! it matters, is still trivially `rank & 1`.

use crate::alloc::{Global, RawAlloc};
use crate::buffer::RawBuf;
use crate::entry::EntryStatus;
use crate::error::Status;
use core::cmp::Ordering;
use core::mem;

const NIL: u32 = 0;

/// A total three-way key comparator. The default, [`OrdCmp`], defers to `K:
/// Ord`; callers with an external sort order (case-insensitive strings, a
/// schema-driven collation) may supply their own.
pub trait KeyCmp<K: ?Sized> {
    fn compare(&self, lhs: &K, rhs: &K) -> Ordering;
}

/// The default comparator: plain `Ord`.
#[derive(Debug, Default, Clone, Copy)]
pub struct OrdCmp;

impl<K: Ord + ?Sized> KeyCmp<K> for OrdCmp {
    fn compare(&self, lhs: &K, rhs: &K) -> Ordering {
        lhs.cmp(rhs)
    }
}

struct Node<K, V> {
    key: K,
    value: V,
    left: u32,
    right: u32,
    parent: u32,
    rank: u32,
}

enum Slot<K, V> {
    Free { next_free: u32 },
    Used(Node<K, V>),
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Side {
    Left,
    Right,
}

impl Side {
    const fn opposite(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

#[cfg(all(debug_assertions, feature = "metrics"))]
#[derive(Default)]
struct Metrics {
    rotations: usize,
    fixups: usize,
}

/// An index-addressed, rank-balanced (WAVL) ordered map. See the module docs
/// for the storage layout.
pub struct FlatOrdMap<K, V, C = OrdCmp, A: RawAlloc = Global> {
    buf: RawBuf<Slot<K, V>, A>,
    root: u32,
    free_head: u32,
    len: usize,
    cmp: C,
    #[cfg(all(debug_assertions, feature = "metrics"))]
    metrics: Metrics,
}

impl<K, V> Default for FlatOrdMap<K, V, OrdCmp, Global> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> FlatOrdMap<K, V, OrdCmp, Global> {
    pub fn new() -> Self {
        Self::with_cmp_in(OrdCmp, Global)
    }
}

impl<K, V, C, A: RawAlloc> FlatOrdMap<K, V, C, A> {
    pub fn with_cmp_in(cmp: C, alloc: A) -> Self {
        Self {
            buf: RawBuf::new_in(alloc),
            root: NIL,
            free_head: NIL,
            len: 0,
            cmp,
            #[cfg(all(debug_assertions, feature = "metrics"))]
            metrics: Metrics::default(),
        }
    }

    pub const fn count(&self) -> usize {
        self.len
    }
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
    pub const fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    fn node(&self, idx: u32) -> &Node<K, V> {
        match self.buf.at(idx as usize - 1) {
            Some(Slot::Used(n)) => n,
            _ => unreachable!("dangling ordmap index"),
        }
    }
    fn node_mut(&mut self, idx: u32) -> &mut Node<K, V> {
        match self.buf.at_mut(idx as usize - 1) {
            Some(Slot::Used(n)) => n,
            _ => unreachable!("dangling ordmap index"),
        }
    }

    fn rank_of(&self, idx: u32) -> i64 {
        if idx == NIL {
            -1
        } else {
            self.node(idx).rank as i64
        }
    }
    fn diff(&self, parent: u32, child: u32) -> i64 {
        self.rank_of(parent) - self.rank_of(child)
    }
    fn set_rank(&mut self, idx: u32, rank: i64) {
        debug_assert!(rank >= 0);
        self.node_mut(idx).rank = rank as u32;
    }
    /// `rank(n) = 1 + max(rank(left), rank(right))`, used to recompute the
    /// rank of a node whose children are known-valid after a rotation.
    fn fixup_rank(&mut self, idx: u32) {
        if idx == NIL {
            return;
        }
        let (l, r) = (self.node(idx).left, self.node(idx).right);
        let new_rank = 1 + self.rank_of(l).max(self.rank_of(r));
        self.set_rank(idx, new_rank);
    }

    fn side_of(&self, parent: u32, child: u32) -> Side {
        if self.node(parent).left == child {
            Side::Left
        } else {
            debug_assert_eq!(self.node(parent).right, child);
            Side::Right
        }
    }
    fn child(&self, idx: u32, side: Side) -> u32 {
        match side {
            Side::Left => self.node(idx).left,
            Side::Right => self.node(idx).right,
        }
    }
    fn set_child(&mut self, idx: u32, side: Side, value: u32) {
        match side {
            Side::Left => self.node_mut(idx).left = value,
            Side::Right => self.node_mut(idx).right = value,
        }
    }
    fn sibling(&self, parent: u32, child: u32) -> u32 {
        match self.side_of(parent, child) {
            Side::Left => self.node(parent).right,
            Side::Right => self.node(parent).left,
        }
    }
    fn parent_of(&self, idx: u32) -> u32 {
        self.node(idx).parent
    }
    fn is_leaf(&self, idx: u32) -> bool {
        self.node(idx).left == NIL && self.node(idx).right == NIL
    }

    /// Rotates `p`'s `side` child up to replace `p`. Returns the new subtree
    /// root (the former `side` child).
    fn rotate(&mut self, p: u32, side: Side) -> u32 {
        #[cfg(all(debug_assertions, feature = "metrics"))]
        {
            self.metrics.rotations += 1;
        }
        let c = self.child(p, side);
        debug_assert_ne!(c, NIL);
        let swing = self.child(c, side.opposite());
        self.set_child(p, side, swing);
        if swing != NIL {
            self.node_mut(swing).parent = p;
        }
        let gp = self.node(p).parent;
        self.node_mut(c).parent = gp;
        if gp == NIL {
            self.root = c;
        } else if self.node(gp).left == p {
            self.node_mut(gp).left = c;
        } else {
            self.node_mut(gp).right = c;
        }
        self.set_child(c, side.opposite(), p);
        self.node_mut(p).parent = c;
        c
    }

    fn alloc_node(&mut self, key: K, value: V, parent: u32) -> Result<u32, Status> {
        let node = Node {
            key,
            value,
            left: NIL,
            right: NIL,
            parent,
            rank: 0,
        };
        if self.free_head != NIL {
            let idx = self.free_head;
            self.free_head = match self.buf.at(idx as usize - 1) {
                Some(Slot::Free { next_free }) => *next_free,
                _ => unreachable!(),
            };
            self.buf.write(idx as usize - 1, Slot::Used(node));
            return Ok(idx);
        }
        self.buf
            .push_back(Slot::Used(node))
            .map_err(|_| Status::NoAlloc)?;
        Ok(self.buf.count() as u32)
    }

    fn free_node(&mut self, idx: u32) -> (K, V) {
        let physical = idx as usize - 1;
        let old = mem::replace(
            self.buf.at_mut(physical).unwrap(),
            Slot::Free {
                next_free: self.free_head,
            },
        );
        self.free_head = idx;
        match old {
            Slot::Used(Node { key, value, .. }) => (key, value),
            Slot::Free { .. } => unreachable!(),
        }
    }

    /// Walks from the root comparing against `key`; returns `Ok(index)` if
    /// found, or `Err((parent, side))` naming where an insert would land
    /// (`Err(None)` if the tree is empty).
    fn search(&self, key: &K) -> Result<u32, Option<(u32, Side)>>
    where
        C: KeyCmp<K>,
    {
        if self.root == NIL {
            return Err(None);
        }
        let mut cur = self.root;
        loop {
            match self.cmp.compare(key, &self.node(cur).key) {
                Ordering::Equal => return Ok(cur),
                Ordering::Less => {
                    let l = self.node(cur).left;
                    if l == NIL {
                        return Err(Some((cur, Side::Left)));
                    }
                    cur = l;
                }
                Ordering::Greater => {
                    let r = self.node(cur).right;
                    if r == NIL {
                        return Err(Some((cur, Side::Right)));
                    }
                    cur = r;
                }
            }
        }
    }

    pub fn get(&self, key: &K) -> Option<&V>
    where
        C: KeyCmp<K>,
    {
        self.search(key).ok().map(|i| &self.node(i).value)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V>
    where
        C: KeyCmp<K>,
    {
        match self.search(key) {
            Ok(i) => Some(&mut self.node_mut(i).value),
            Err(_) => None,
        }
    }

    pub fn contains_key(&self, key: &K) -> bool
    where
        C: KeyCmp<K>,
    {
        self.search(key).is_ok()
    }

    pub fn insert(&mut self, key: K, value: V) -> Result<Option<V>, Status>
    where
        C: KeyCmp<K>,
    {
        match self.search(&key) {
            Ok(i) => Ok(Some(mem::replace(&mut self.node_mut(i).value, value))),
            Err(None) => {
                let idx = self.alloc_node(key, value, NIL)?;
                self.root = idx;
                self.len += 1;
                Ok(None)
            }
            Err(Some((parent, side))) => {
                let was_leaf = self.is_leaf(parent);
                let idx = self.alloc_node(key, value, parent)?;
                self.set_child(parent, side, idx);
                self.len += 1;
                if was_leaf {
                    self.insert_fixup(parent);
                }
                Ok(None)
            }
        }
    }

    /// Convenience: `entry(&key).or_insert(key, value)` without the caller
    /// cloning `key` themselves. Returns `None` if insertion was needed but
    /// growth failed.
    pub fn try_insert(&mut self, key: K, value: V) -> Option<&mut V>
    where
        C: KeyCmp<K>,
        K: Clone,
    {
        self.entry(&key.clone()).or_insert(key, value)
    }

    /// Convenience: unconditionally places `value` at `key`'s position,
    /// equivalent to [`insert`](Self::insert) but discarding the evicted
    /// value.
    pub fn insert_or_assign(&mut self, key: K, value: V) -> Result<(), Status>
    where
        C: KeyCmp<K>,
    {
        self.insert(key, value).map(|_| ())
    }

    /// Atomic exchange: if `key` is occupied, the old value is moved into
    /// `value` and the slot keeps what `value` held; otherwise `value`'s
    /// content is moved into a freshly inserted slot for `key`, leaving
    /// `value` holding `V::default()`.
    pub fn swap_entry(&mut self, key: K, value: &mut V) -> Result<(), Status>
    where
        C: KeyCmp<K>,
        V: Default,
    {
        match self.get_mut(&key) {
            Some(slot) => {
                mem::swap(slot, value);
                Ok(())
            }
            None => {
                let incoming = mem::take(value);
                self.insert(key, incoming).map(|_| ())
            }
        }
    }

    /// `x` is a node that just gained a rank-0 child while itself being a
    /// rank-0 leaf, i.e. `(x, new child)` is currently a `0,1`-parent.
    fn insert_fixup(&mut self, mut x: u32) {
        #[cfg(all(debug_assertions, feature = "metrics"))]
        {
            self.metrics.fixups += 1;
        }
        loop {
            self.set_rank(x, self.rank_of(x) + 1);
            let p = self.parent_of(x);
            if p == NIL {
                return;
            }
            let diff = self.diff(p, x);
            if diff == 1 {
                return;
            }
            debug_assert_eq!(diff, 0);
            let sib = self.sibling(p, x);
            let sib_diff = self.diff(p, sib);
            if sib_diff == 1 {
                x = p;
                continue;
            }
            debug_assert_eq!(sib_diff, 2);
            self.restructure_insert(p, x);
            return;
        }
    }

    /// `x` is a `0`-child of `p`; `p`'s other child is a `2`-child.
    fn restructure_insert(&mut self, p: u32, x: u32) {
        let side = self.side_of(p, x);
        let near = self.child(x, side.opposite());
        if self.diff(x, near) == 1 {
            // near is a 1-child of x: double rotation through `near`.
            self.rotate(x, side.opposite());
            self.rotate(p, side);
            self.fixup_rank(p);
            self.fixup_rank(x);
            self.fixup_rank(near);
        } else {
            debug_assert_eq!(self.diff(x, near), 2);
            self.rotate(p, side);
            self.fixup_rank(p);
        }
    }

    pub fn remove(&mut self, key: &K) -> Option<V>
    where
        C: KeyCmp<K>,
    {
        let found = self.search(key).ok()?;
        Some(self.remove_at(found))
    }

    fn remove_at(&mut self, mut z: u32) -> V {
        // reduce the two-child case to a <=1-child case via the inorder successor
        if self.node(z).left != NIL && self.node(z).right != NIL {
            let mut succ = self.node(z).right;
            while self.node(succ).left != NIL {
                succ = self.node(succ).left;
            }
            // swap key/value with the successor, then physically remove `succ`
            // instead (it has no left child, so it's a <=1-child splice).
            let z_physical = z as usize - 1;
            let s_physical = succ as usize - 1;
            // SAFETY: z_physical != s_physical (succ is strictly in z's right
            // subtree), both in-bounds; disjoint mutable borrows via raw index math.
            debug_assert_ne!(z_physical, s_physical);
            let buf_ptr = &mut self.buf as *mut RawBuf<Slot<K, V>, A>;
            unsafe {
                let z_slot = (*buf_ptr).at_mut(z_physical).unwrap();
                let Slot::Used(z_node) = z_slot else {
                    unreachable!()
                };
                let s_slot = (*buf_ptr).at_mut(s_physical).unwrap();
                let Slot::Used(s_node) = s_slot else {
                    unreachable!()
                };
                mem::swap(&mut z_node.key, &mut s_node.key);
                mem::swap(&mut z_node.value, &mut s_node.value);
            }
            z = succ;
        }

        let p = self.parent_of(z);
        let child = if self.node(z).left != NIL {
            self.node(z).left
        } else {
            self.node(z).right
        };
        let old_diff = if p == NIL { -1 } else { self.diff(p, z) };
        if child != NIL {
            self.node_mut(child).parent = p;
        }
        if p == NIL {
            self.root = child;
        } else if self.node(p).left == z {
            self.node_mut(p).left = child;
        } else {
            self.node_mut(p).right = child;
        }
        self.len -= 1;
        let (_, value) = self.free_node(z);

        if p != NIL {
            if child == NIL && self.is_leaf(p) {
                // `z` was `p`'s only child; `p` is now a leaf. A unary node's
                // rank is always exactly one above its sole child's rank, so
                // `p`'s rank is forced to 1 here, one too many for a leaf
                // (which must be rank 0). A single demote restores that
                // invariant; if it leaves `p` a 3-child of its own parent,
                // hand off to the normal fix-up from there.
                self.set_rank(p, self.rank_of(p) - 1);
                let gp = self.parent_of(p);
                if gp != NIL && self.diff(gp, p) == 3 {
                    self.delete_fixup(gp, p);
                }
            } else if old_diff == 2 {
                self.delete_fixup(p, child);
            }
        }
        value
    }

    /// `x` is confirmed a 3-child of `p` (rank(p) - rank(x) == 3).
    fn delete_fixup(&mut self, mut p: u32, mut x: u32) {
        #[cfg(all(debug_assertions, feature = "metrics"))]
        {
            self.metrics.fixups += 1;
        }
        loop {
            if self.is_leaf(p) {
                // a "2,2-leaf": both of p's children sit one rank lower than
                // WAVL allows for a leaf; demote p by 2 and keep propagating.
                self.set_rank(p, self.rank_of(p) - 2);
                let gp = self.parent_of(p);
                if gp == NIL {
                    return;
                }
                x = p;
                p = gp;
                continue;
            }
            let sib = self.sibling(p, x);
            let sib_diff = self.diff(p, sib);
            if sib_diff == 2 {
                self.set_rank(p, self.rank_of(p) - 1);
                let gp = self.parent_of(p);
                if gp == NIL || self.diff(gp, p) != 3 {
                    return;
                }
                x = p;
                p = gp;
                continue;
            }
            debug_assert_eq!(sib_diff, 1);
            if let Some((new_root, gp)) = self.restructure_delete(p, x, sib) {
                x = new_root;
                p = gp;
                continue;
            }
            return;
        }
    }

    /// `y` is a 1-child of `p`; `x` is `p`'s 3-child. Returns `Some((new_root,
    /// grandparent))` if the fix-up must keep propagating upward (the `y` is
    /// a `2,2`-node case), `None` if the restructuring is terminal.
    fn restructure_delete(&mut self, p: u32, x: u32, y: u32) -> Option<(u32, u32)> {
        let _ = x;
        let side = self.side_of(p, y);
        let near = self.child(y, side.opposite());
        let far = self.child(y, side);
        let near_is_two = self.diff(y, near) == 2;
        let far_is_two = self.diff(y, far) == 2;
        if near_is_two && far_is_two {
            log::trace!("ordmap: delete fix-up hit the 2,2-node case at node {y}, continuing upward");
            self.rotate(p, side);
            self.fixup_rank(p);
            self.fixup_rank(y);
            let gp = self.parent_of(y);
            return if gp == NIL { None } else { Some((y, gp)) };
        }
        if near_is_two {
            self.rotate(p, side);
            self.fixup_rank(p);
            self.fixup_rank(y);
        } else {
            self.rotate(y, side.opposite());
            self.rotate(p, side);
            self.fixup_rank(p);
            self.fixup_rank(y);
            self.fixup_rank(near);
        }
        None
    }

    fn leftmost(&self, mut idx: u32) -> u32 {
        if idx == NIL {
            return NIL;
        }
        while self.node(idx).left != NIL {
            idx = self.node(idx).left;
        }
        idx
    }

    pub fn first_key_value(&self) -> Option<(&K, &V)> {
        let i = self.leftmost(self.root);
        (i != NIL).then(|| {
            let n = self.node(i);
            (&n.key, &n.value)
        })
    }

    pub fn iter(&self) -> Iter<'_, K, V, C, A> {
        let mut stack = Vec::new();
        let mut cur = self.root;
        while cur != NIL {
            stack.push(cur);
            cur = self.node(cur).left;
        }
        Iter { map: self, stack }
    }
}

/// In-order iterator over `(&K, &V)`. Keys are yielded in strictly increasing
/// order (property 4, ordered-map inorder).
pub struct Iter<'a, K, V, C, A: RawAlloc> {
    map: &'a FlatOrdMap<K, V, C, A>,
    stack: Vec<u32>,
}

impl<'a, K, V, C, A: RawAlloc> Iterator for Iter<'a, K, V, C, A> {
    type Item = (&'a K, &'a V);
    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.stack.pop()?;
        let n = self.map.node(idx);
        let mut cur = n.right;
        while cur != NIL {
            self.stack.push(cur);
            cur = self.map.node(cur).left;
        }
        Some((&n.key, &n.value))
    }
}

/// A position an [`FlatOrdMap::entry`] call may later insert at, or found
/// occupied by a matching key.
pub struct Entry<'a, K, V, C = OrdCmp, A: RawAlloc = Global> {
    map: &'a mut FlatOrdMap<K, V, C, A>,
    status: EntryStatus,
    target: EntryTarget,
}

enum EntryTarget {
    Occupied(u32),
    VacantRoot,
    VacantChild(u32, Side),
}

impl<K, V, C: KeyCmp<K>, A: RawAlloc> FlatOrdMap<K, V, C, A> {
    pub fn entry(&mut self, key: &K) -> Entry<'_, K, V, C, A> {
        match self.search(key) {
            Ok(idx) => Entry {
                status: EntryStatus::OCCUPIED,
                target: EntryTarget::Occupied(idx),
                map: self,
            },
            Err(None) => Entry {
                status: EntryStatus::VACANT,
                target: EntryTarget::VacantRoot,
                map: self,
            },
            Err(Some((parent, side))) => Entry {
                status: EntryStatus::VACANT,
                target: EntryTarget::VacantChild(parent, side),
                map: self,
            },
        }
    }
}

impl<'a, K, V, C, A: RawAlloc> Entry<'a, K, V, C, A> {
    pub fn status(&self) -> EntryStatus {
        self.status
    }
    pub fn occupied(&self) -> bool {
        self.status.is_occupied()
    }
    pub fn insert_error(&self) -> bool {
        self.status.insert_failed()
    }

    pub fn and_modify<F: FnOnce(&mut V)>(self, f: F) -> Self {
        if let EntryTarget::Occupied(idx) = self.target {
            f(&mut self.map.node_mut(idx).value);
        }
        self
    }

    /// Returns the existing value if occupied, otherwise inserts `(key,
    /// value)` and returns a reference to it. Returns `None` if insertion
    /// was needed but the allocator refused to grow.
    pub fn or_insert(self, key: K, value: V) -> Option<&'a mut V> {
        match self.target {
            EntryTarget::Occupied(idx) => Some(&mut self.map.node_mut(idx).value),
            EntryTarget::VacantRoot => {
                let idx = self.map.alloc_node(key, value, NIL).ok()?;
                self.map.root = idx;
                self.map.len += 1;
                Some(&mut self.map.node_mut(idx).value)
            }
            EntryTarget::VacantChild(parent, side) => {
                let was_leaf = self.map.is_leaf(parent);
                let idx = self.map.alloc_node(key, value, parent).ok()?;
                self.map.set_child(parent, side, idx);
                self.map.len += 1;
                if was_leaf {
                    self.map.insert_fixup(parent);
                }
                Some(&mut self.map.node_mut(idx).value)
            }
        }
    }

    pub fn remove_entry(self) -> Option<V> {
        match self.target {
            EntryTarget::Occupied(idx) => Some(self.map.remove_at(idx)),
            _ => None,
        }
    }

    /// Returns the occupied slot's value.
    ///
    /// # Panics
    /// Panics if this entry is not occupied.
    pub fn unwrap(self) -> &'a mut V {
        assert!(
            self.status.is_occupied() && self.status.can_unwrap(),
            "called `Entry::unwrap()` on a vacant entry"
        );
        match self.target {
            EntryTarget::Occupied(idx) => &mut self.map.node_mut(idx).value,
            _ => unreachable!("status says occupied but target is vacant"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Property 5 (WAVL rank invariant): every node's rank difference with
    /// each child (sentinel rank -1) lies in `{1, 2}`, and leaves have rank 0.
    fn assert_wavl_invariant<K, V, C, A: RawAlloc>(m: &FlatOrdMap<K, V, C, A>) {
        fn walk<K, V, C, A: RawAlloc>(m: &FlatOrdMap<K, V, C, A>, idx: u32) {
            if idx == NIL {
                return;
            }
            if m.is_leaf(idx) {
                assert_eq!(m.node(idx).rank, 0, "leaf at index {idx} must have rank 0");
            }
            let (l, r) = (m.node(idx).left, m.node(idx).right);
            let dl = m.diff(idx, l);
            let dr = m.diff(idx, r);
            assert!((1..=2).contains(&dl), "left rank diff {dl} at node {idx} out of range");
            assert!((1..=2).contains(&dr), "right rank diff {dr} at node {idx} out of range");
            walk(m, l);
            walk(m, r);
        }
        walk(m, m.root);
    }

    #[test]
    fn s3_ordered_map_basic() {
        let mut m: FlatOrdMap<i32, i32> = FlatOrdMap::new();
        for k in [5, 3, 8, 1, 4, 7, 9, 2, 6] {
            m.insert(k, k * 10).unwrap();
        }
        let keys: Vec<_> = m.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, (1..=9).collect::<Vec<_>>());
        m.remove(&5);
        let keys: Vec<_> = m.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, [1, 2, 3, 4, 6, 7, 8, 9]);
        assert_eq!(m.count(), 8);
    }

    #[test]
    fn s4_ascending_inserts_stay_inorder_and_bounded() {
        let mut m: FlatOrdMap<i32, i32> = FlatOrdMap::new();
        for k in 1..64 {
            m.insert(k, k).unwrap();
        }
        let keys: Vec<_> = m.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, (1..64).collect::<Vec<_>>());
        assert_eq!(m.count(), 63);
    }

    #[test]
    fn insert_overwrites_existing_key() {
        let mut m: FlatOrdMap<&str, i32> = FlatOrdMap::new();
        m.insert("a", 1).unwrap();
        assert_eq!(m.insert("a", 2).unwrap(), Some(1));
        assert_eq!(m.get(&"a"), Some(&2));
    }

    #[test]
    fn entry_or_insert_roundtrip() {
        let mut m: FlatOrdMap<i32, i32> = FlatOrdMap::new();
        *m.entry(&1).or_insert(1, 10).unwrap() += 1;
        assert_eq!(m.get(&1), Some(&11));
        *m.entry(&1).or_insert(1, 0).unwrap() += 1;
        assert_eq!(m.get(&1), Some(&12));
    }

    #[test]
    fn try_insert_insert_or_assign_swap_entry() {
        let mut m: FlatOrdMap<&str, i32> = FlatOrdMap::new();
        assert_eq!(m.try_insert("a", 1), Some(&mut 1));
        assert_eq!(m.try_insert("a", 999), Some(&mut 1));
        m.insert_or_assign("a", 2).unwrap();
        assert_eq!(m.get(&"a"), Some(&2));

        let mut buf = 42;
        m.swap_entry("a", &mut buf).unwrap();
        assert_eq!(buf, 2);
        assert_eq!(m.get(&"a"), Some(&42));

        let mut buf2 = 7;
        m.swap_entry("b", &mut buf2).unwrap();
        assert_eq!(buf2, 0);
        assert_eq!(m.get(&"b"), Some(&7));
    }

    #[test]
    fn remove_every_key_in_random_order_stays_sorted() {
        use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
        let _ = env_logger::try_init();
        let mut rng = StdRng::seed_from_u64(0xBADC0DE);
        let mut m: FlatOrdMap<i32, i32> = FlatOrdMap::new();
        let mut keys: Vec<i32> = (0..200).collect();
        keys.shuffle(&mut rng);
        for &k in &keys {
            m.insert(k, k).unwrap();
            assert_wavl_invariant(&m);
        }
        keys.shuffle(&mut rng);
        for &k in &keys {
            assert_eq!(m.remove(&k), Some(k));
            assert_wavl_invariant(&m);
            let got: Vec<_> = m.iter().map(|(k, _)| *k).collect();
            let mut expect = got.clone();
            expect.sort_unstable();
            assert_eq!(got, expect);
        }
        assert_eq!(m.count(), 0);
    }

    proptest! {
        /// Properties 4, 5: a random mix of inserts and removes keeps the
        /// tree in strictly increasing inorder and WAVL-rank-balanced.
        #[test]
        fn stays_sorted_and_wavl_balanced(
            ops in prop::collection::vec((0i32..64, prop::bool::ANY), 1..300)
        ) {
            use std::collections::BTreeMap;
            let mut m: FlatOrdMap<i32, i32> = FlatOrdMap::new();
            let mut model: BTreeMap<i32, i32> = BTreeMap::new();
            for (k, do_insert) in ops {
                if do_insert {
                    model.insert(k, k);
                    m.insert(k, k).unwrap();
                } else {
                    prop_assert_eq!(m.remove(&k), model.remove(&k));
                }
                assert_wavl_invariant(&m);
            }
            let got: Vec<_> = m.iter().map(|(k, v)| (*k, *v)).collect();
            let expect: Vec<_> = model.into_iter().collect();
            prop_assert_eq!(got, expect);
        }
    }
}
