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

//! A splay-tree-backed multimap: one BST node per distinct key, with extra
//! values for that key threaded onto a circular duplicate list off of it
//! rather than inserted as separate, equal-comparing tree nodes.
//!
//! A node is tagged with a [`NodeKind`] rather than distinguished by pointer
//! shape: `Tree` nodes participate in the BST alone, `DupHead` is a BST node
//! that also owns a non-empty duplicate ring, and `DupMember` nodes sit only
//! on that ring (`left`/`right`/`parent` unused). [`pop_min`](SplayMultimap::pop_min)
//! and [`pop_max`](SplayMultimap::pop_max) serve a `DupHead`'s values in
//! insertion order before touching the next key, by rotating the oldest ring
//! member's value into the head and discarding that member.

use super::OrdCmp;
use crate::ordmap::KeyCmp;
use core::cmp::Ordering;
use core::ptr::NonNull;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum NodeKind {
    Tree,
    DupHead,
    DupMember,
}

struct Node<K, V> {
    key: Option<K>,
    value: V,
    left: Link<K, V>,
    right: Link<K, V>,
    parent: Link<K, V>,
    dup_next: Link<K, V>,
    dup_prev: Link<K, V>,
    kind: NodeKind,
}

type Link<K, V> = Option<NonNull<Node<K, V>>>;

impl<K, V> Node<K, V> {
    fn new_tree(key: K, value: V) -> NonNull<Self> {
        let node = Box::new(Node {
            key: Some(key),
            value,
            left: None,
            right: None,
            parent: None,
            dup_next: None,
            dup_prev: None,
            kind: NodeKind::Tree,
        });
        unsafe { NonNull::new_unchecked(Box::into_raw(node)) }
    }

    fn new_member(value: V) -> NonNull<Self> {
        let node = Box::new(Node {
            key: None,
            value,
            left: None,
            right: None,
            parent: None,
            dup_next: None,
            dup_prev: None,
            kind: NodeKind::DupMember,
        });
        unsafe { NonNull::new_unchecked(Box::into_raw(node)) }
    }
}

/// A multimap built on the same splay-tree machinery as [`super::SplayMap`].
pub struct SplayMultimap<K, V, C = OrdCmp> {
    root: Link<K, V>,
    len: usize,
    cmp: C,
}

impl<K, V> Default for SplayMultimap<K, V, OrdCmp> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> SplayMultimap<K, V, OrdCmp> {
    pub fn new() -> Self {
        Self::with_cmp(OrdCmp)
    }
}

impl<K, V, C> SplayMultimap<K, V, C> {
    pub fn with_cmp(cmp: C) -> Self {
        Self {
            root: None,
            len: 0,
            cmp,
        }
    }

    pub const fn count(&self) -> usize {
        self.len
    }
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn splay(&mut self, key: &K)
    where
        C: KeyCmp<K>,
    {
        let Some(mut t) = self.root else { return };
        let mut left_top: Link<K, V> = None;
        let mut left_tail: Link<K, V> = None;
        let mut right_top: Link<K, V> = None;
        let mut right_tail: Link<K, V> = None;

        loop {
            let tkey = unsafe { t.as_ref().key.as_ref().unwrap() };
            match self.cmp.compare(key, tkey) {
                Ordering::Less => {
                    let Some(mut tl) = (unsafe { t.as_ref().left }) else {
                        break;
                    };
                    let tlkey = unsafe { tl.as_ref().key.as_ref().unwrap() };
                    if self.cmp.compare(key, tlkey) == Ordering::Less {
                        unsafe {
                            let inner = tl.as_ref().right;
                            t.as_mut().left = inner;
                            if let Some(mut c) = inner {
                                c.as_mut().parent = Some(t);
                            }
                            tl.as_mut().right = Some(t);
                            t.as_mut().parent = Some(tl);
                        }
                        t = tl;
                        let Some(new_tl) = (unsafe { t.as_ref().left }) else {
                            break;
                        };
                        tl = new_tl;
                    }
                    match right_tail {
                        None => right_top = Some(t),
                        Some(mut rt) => unsafe {
                            rt.as_mut().left = Some(t);
                            t.as_mut().parent = Some(rt);
                        },
                    }
                    right_tail = Some(t);
                    t = tl;
                }
                Ordering::Greater => {
                    let Some(mut tr) = (unsafe { t.as_ref().right }) else {
                        break;
                    };
                    let trkey = unsafe { tr.as_ref().key.as_ref().unwrap() };
                    if self.cmp.compare(key, trkey) == Ordering::Greater {
                        unsafe {
                            let inner = tr.as_ref().left;
                            t.as_mut().right = inner;
                            if let Some(mut c) = inner {
                                c.as_mut().parent = Some(t);
                            }
                            tr.as_mut().left = Some(t);
                            t.as_mut().parent = Some(tr);
                        }
                        t = tr;
                        let Some(new_tr) = (unsafe { t.as_ref().right }) else {
                            break;
                        };
                        tr = new_tr;
                    }
                    match left_tail {
                        None => left_top = Some(t),
                        Some(mut lt) => unsafe {
                            lt.as_mut().right = Some(t);
                            t.as_mut().parent = Some(lt);
                        },
                    }
                    left_tail = Some(t);
                    t = tr;
                }
                Ordering::Equal => break,
            }
        }

        unsafe {
            let t_left = t.as_ref().left;
            let t_right = t.as_ref().right;
            if let Some(mut lt) = left_tail {
                lt.as_mut().right = t_left;
                if let Some(mut c) = t_left {
                    c.as_mut().parent = Some(lt);
                }
            }
            if let Some(mut rt) = right_tail {
                rt.as_mut().left = t_right;
                if let Some(mut c) = t_right {
                    c.as_mut().parent = Some(rt);
                }
            }
            t.as_mut().left = left_top;
            t.as_mut().right = right_top;
            if let Some(mut lp) = left_top {
                lp.as_mut().parent = Some(t);
            }
            if let Some(mut rp) = right_top {
                rp.as_mut().parent = Some(t);
            }
            t.as_mut().parent = None;
        }
        self.root = Some(t);
    }

    fn splay_subtree_extreme(mut t: NonNull<Node<K, V>>, side: bool) -> NonNull<Node<K, V>> {
        // side: true => descend/collect via `right` (finds max), false => `left` (finds min)
        let mut acc_top: Link<K, V> = None;
        let mut acc_tail: Link<K, V> = None;
        loop {
            let next = if side {
                unsafe { t.as_ref().right }
            } else {
                unsafe { t.as_ref().left }
            };
            let Some(mut nx) = next else { break };
            let nx_next = if side {
                unsafe { nx.as_ref().right }
            } else {
                unsafe { nx.as_ref().left }
            };
            if nx_next.is_some() {
                unsafe {
                    if side {
                        let inner = nx.as_ref().left;
                        t.as_mut().right = inner;
                        if let Some(mut c) = inner {
                            c.as_mut().parent = Some(t);
                        }
                        nx.as_mut().left = Some(t);
                    } else {
                        let inner = nx.as_ref().right;
                        t.as_mut().left = inner;
                        if let Some(mut c) = inner {
                            c.as_mut().parent = Some(t);
                        }
                        nx.as_mut().right = Some(t);
                    }
                    t.as_mut().parent = Some(nx);
                }
                t = nx;
                nx = if side {
                    unsafe { t.as_ref().right }.unwrap()
                } else {
                    unsafe { t.as_ref().left }.unwrap()
                };
            }
            unsafe {
                if side {
                    t.as_mut().right = None;
                } else {
                    t.as_mut().left = None;
                }
            }
            match acc_tail {
                None => acc_top = Some(t),
                Some(mut at) => unsafe {
                    if side {
                        at.as_mut().right = Some(t);
                    } else {
                        at.as_mut().left = Some(t);
                    }
                    t.as_mut().parent = Some(at);
                },
            }
            acc_tail = Some(t);
            t = nx;
        }
        unsafe {
            let t_other = if side { t.as_ref().left } else { t.as_ref().right };
            if let Some(mut at) = acc_tail {
                if side {
                    at.as_mut().left = t_other;
                } else {
                    at.as_mut().right = t_other;
                }
                if let Some(mut c) = t_other {
                    c.as_mut().parent = Some(at);
                }
                if side {
                    t.as_mut().right = acc_top;
                } else {
                    t.as_mut().left = acc_top;
                }
                if let Some(mut ap) = acc_top {
                    ap.as_mut().parent = Some(t);
                }
            }
            t.as_mut().parent = None;
        }
        t
    }

    fn push_duplicate(&mut self, mut head: NonNull<Node<K, V>>, value: V) {
        let mut new = Node::new_member(value);
        unsafe {
            if head.as_ref().kind == NodeKind::Tree {
                head.as_mut().kind = NodeKind::DupHead;
                head.as_mut().dup_next = Some(head);
                head.as_mut().dup_prev = Some(head);
            }
            let mut tail = head.as_ref().dup_prev.unwrap();
            tail.as_mut().dup_next = Some(new);
            new.as_mut().dup_prev = Some(tail);
            new.as_mut().dup_next = Some(head);
            head.as_mut().dup_prev = Some(new);
        }
    }

    pub fn insert(&mut self, key: K, value: V)
    where
        C: KeyCmp<K>,
    {
        match self.root {
            None => {
                self.root = Some(Node::new_tree(key, value));
                self.len = 1;
            }
            Some(_) => {
                self.splay(&key);
                let mut r = self.root.unwrap();
                let ord = self.cmp.compare(&key, unsafe { r.as_ref().key.as_ref().unwrap() });
                match ord {
                    Ordering::Equal => {
                        self.push_duplicate(r, value);
                        self.len += 1;
                    }
                    Ordering::Less => {
                        let mut new = Node::new_tree(key, value);
                        unsafe {
                            let left = r.as_ref().left;
                            new.as_mut().left = left;
                            if let Some(mut l) = left {
                                l.as_mut().parent = Some(new);
                            }
                            new.as_mut().right = Some(r);
                            r.as_mut().left = None;
                            r.as_mut().parent = Some(new);
                        }
                        self.root = Some(new);
                        self.len += 1;
                    }
                    Ordering::Greater => {
                        let mut new = Node::new_tree(key, value);
                        unsafe {
                            let right = r.as_ref().right;
                            new.as_mut().right = right;
                            if let Some(mut rr) = right {
                                rr.as_mut().parent = Some(new);
                            }
                            new.as_mut().left = Some(r);
                            r.as_mut().right = None;
                            r.as_mut().parent = Some(new);
                        }
                        self.root = Some(new);
                        self.len += 1;
                    }
                }
            }
        }
    }

    pub fn peek(&self, key: &K) -> Option<&V>
    where
        C: KeyCmp<K>,
    {
        let mut cur = self.root;
        while let Some(n) = cur {
            match self.cmp.compare(key, unsafe { n.as_ref().key.as_ref().unwrap() }) {
                Ordering::Equal => return Some(unsafe { &n.as_ref().value }),
                Ordering::Less => cur = unsafe { n.as_ref().left },
                Ordering::Greater => cur = unsafe { n.as_ref().right },
            }
        }
        None
    }

    pub fn contains_key(&self, key: &K) -> bool
    where
        C: KeyCmp<K>,
    {
        self.peek(key).is_some()
    }

    /// The number of values stored under `key` (0 if absent).
    pub fn count_for(&self, key: &K) -> usize
    where
        C: KeyCmp<K>,
    {
        let mut cur = self.root;
        while let Some(n) = cur {
            match self.cmp.compare(key, unsafe { n.as_ref().key.as_ref().unwrap() }) {
                Ordering::Equal => {
                    return match unsafe { n.as_ref().kind } {
                        NodeKind::Tree => 1,
                        NodeKind::DupHead => {
                            let mut count = 1;
                            let mut cur = unsafe { n.as_ref().dup_next.unwrap() };
                            while cur != n {
                                count += 1;
                                cur = unsafe { cur.as_ref().dup_next.unwrap() };
                            }
                            count
                        }
                        NodeKind::DupMember => unreachable!(),
                    };
                }
                Ordering::Less => cur = unsafe { n.as_ref().left },
                Ordering::Greater => cur = unsafe { n.as_ref().right },
            }
        }
        0
    }

    fn splice_out_root(&mut self, r: NonNull<Node<K, V>>) {
        let (left, right) = unsafe { (r.as_ref().left, r.as_ref().right) };
        self.root = match left {
            None => right,
            Some(mut lsub) => {
                unsafe {
                    lsub.as_mut().parent = None;
                }
                let mut new_top = Self::splay_subtree_extreme(lsub, true);
                unsafe {
                    new_top.as_mut().right = right;
                    if let Some(mut rc) = right {
                        rc.as_mut().parent = Some(new_top);
                    }
                }
                Some(new_top)
            }
        };
        if let Some(mut rt) = self.root {
            unsafe { rt.as_mut().parent = None };
        }
    }

    fn pop_from_node(&mut self, head: NonNull<Node<K, V>>) -> Option<(K, V)>
    where
        K: Clone,
    {
        let key = unsafe { head.as_ref().key.as_ref().unwrap().clone() };
        match unsafe { head.as_ref().kind } {
            NodeKind::Tree => {
                self.splice_out_root(head);
                self.len -= 1;
                let boxed = unsafe { Box::from_raw(head.as_ptr()) };
                Some((key, boxed.value))
            }
            NodeKind::DupHead => {
                let mut head = head;
                let mut oldest = unsafe { head.as_ref().dup_next.unwrap() };
                debug_assert!(
                    unsafe { oldest.as_ref().dup_prev } == Some(head),
                    "duplicate list corruption: oldest member does not link back to head"
                );
                if oldest == head {
                    log::error!("splay multimap: DupHead with an empty duplicate ring");
                }
                unsafe { core::mem::swap(&mut head.as_mut().value, &mut oldest.as_mut().value) };
                let (prev, next) =
                    unsafe { (oldest.as_ref().dup_prev.unwrap(), oldest.as_ref().dup_next.unwrap()) };
                unsafe {
                    let mut prev = prev;
                    let mut next = next;
                    prev.as_mut().dup_next = Some(next);
                    next.as_mut().dup_prev = Some(prev);
                }
                if next == head && prev == head {
                    unsafe {
                        head.as_mut().kind = NodeKind::Tree;
                        head.as_mut().dup_next = None;
                        head.as_mut().dup_prev = None;
                    }
                }
                self.len -= 1;
                let boxed = unsafe { Box::from_raw(oldest.as_ptr()) };
                Some((key, boxed.value))
            }
            NodeKind::DupMember => unreachable!("dup members are never tree roots"),
        }
    }

    /// Removes and returns the smallest key's oldest still-present value. If
    /// that key has further duplicates, they remain (and become the new
    /// oldest) for the next call.
    pub fn pop_min(&mut self) -> Option<(K, V)>
    where
        K: Clone,
    {
        let root = self.root?;
        let m = Self::splay_subtree_extreme(root, false);
        self.root = Some(m);
        self.pop_from_node(m)
    }

    /// Symmetric to [`pop_min`](Self::pop_min) over the largest key.
    pub fn pop_max(&mut self) -> Option<(K, V)>
    where
        K: Clone,
    {
        let root = self.root?;
        let m = Self::splay_subtree_extreme(root, true);
        self.root = Some(m);
        self.pop_from_node(m)
    }

    /// Removes `key` and every value stored under it.
    pub fn remove_all(&mut self, key: &K) -> Vec<V>
    where
        C: KeyCmp<K>,
    {
        self.splay(key);
        let Some(r) = self.root else { return Vec::new() };
        if self.cmp.compare(key, unsafe { r.as_ref().key.as_ref().unwrap() }) != Ordering::Equal {
            return Vec::new();
        }
        let mut values = Vec::new();
        unsafe {
            if r.as_ref().kind == NodeKind::DupHead {
                let mut cur = r.as_ref().dup_next.unwrap();
                while cur != r {
                    let next = cur.as_ref().dup_next.unwrap();
                    let boxed = Box::from_raw(cur.as_ptr());
                    values.push(boxed.value);
                    self.len -= 1;
                    cur = next;
                }
            }
        }
        self.splice_out_root(r);
        self.len -= 1;
        let boxed = unsafe { Box::from_raw(r.as_ptr()) };
        values.insert(0, boxed.value);
        values
    }
}

impl<K, V, C> Drop for SplayMultimap<K, V, C> {
    fn drop(&mut self) {
        let mut stack = Vec::new();
        if let Some(r) = self.root.take() {
            stack.push(r);
        }
        while let Some(n) = stack.pop() {
            unsafe {
                if n.as_ref().kind == NodeKind::DupHead {
                    let mut cur = n.as_ref().dup_next.unwrap();
                    while cur != n {
                        let next = cur.as_ref().dup_next.unwrap();
                        drop(Box::from_raw(cur.as_ptr()));
                        cur = next;
                    }
                }
            }
            let boxed = unsafe { Box::from_raw(n.as_ptr()) };
            if let Some(l) = boxed.left {
                stack.push(l);
            }
            if let Some(r) = boxed.right {
                stack.push(r);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn duplicates_round_robin_in_insertion_order() {
        let _ = env_logger::try_init();
        let mut m: SplayMultimap<i32, i32> = SplayMultimap::new();
        m.insert(1, 100);
        m.insert(1, 101);
        m.insert(1, 102);
        assert_eq!(m.count_for(&1), 3);
        assert_eq!(m.pop_min(), Some((1, 100)));
        assert_eq!(m.pop_min(), Some((1, 101)));
        assert_eq!(m.count_for(&1), 1);
        assert_eq!(m.pop_min(), Some((1, 102)));
        assert_eq!(m.count_for(&1), 0);
        assert!(m.is_empty());
    }

    #[test]
    fn pop_min_and_max_drain_distinct_keys_in_order() {
        let mut m: SplayMultimap<i32, i32> = SplayMultimap::new();
        for k in [5, 3, 8, 1, 9] {
            m.insert(k, k * 10);
        }
        assert_eq!(m.pop_min(), Some((1, 10)));
        assert_eq!(m.pop_max(), Some((9, 90)));
        assert_eq!(m.pop_min(), Some((3, 30)));
        assert_eq!(m.count(), 2);
    }

    #[test]
    fn remove_all_drops_every_duplicate() {
        let mut m: SplayMultimap<&str, i32> = SplayMultimap::new();
        m.insert("a", 1);
        m.insert("a", 2);
        m.insert("b", 3);
        let mut got = m.remove_all(&"a");
        got.sort_unstable();
        assert_eq!(got, vec![1, 2]);
        assert_eq!(m.count(), 1);
        assert!(!m.contains_key(&"a"));
    }

    proptest! {
        /// Property 7 (multimap fairness): with every value pushed under
        /// the same key, successive `pop_min` calls return them in the
        /// exact order they were inserted.
        #[test]
        fn pop_min_drains_duplicates_in_insertion_order(
            values in prop::collection::vec(0i32..10_000, 1..100)
        ) {
            let mut m: SplayMultimap<i32, i32> = SplayMultimap::new();
            for &v in &values {
                m.insert(0, v);
            }
            prop_assert_eq!(m.count(), values.len());
            let mut drained = Vec::with_capacity(values.len());
            while let Some((_, v)) = m.pop_min() {
                drained.push(v);
            }
            prop_assert_eq!(drained, values);
            prop_assert!(m.is_empty());
        }
    }
}
