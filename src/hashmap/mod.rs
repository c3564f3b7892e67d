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

//! The flat hash map: open addressing, 7-bit tag fingerprints, SIMD group
//! probing with a portable fallback, tombstone-free deletion via in-place
//! rehash.
//!
//! ## Acknowledgements
//!
//! The group-probing scheme (tag bytes, SIMD compare/movemask, the portable
//! `(x - 0x0101…) & !x & 0x8080…` bit trick, triangular group probing,
//! tombstone-free deletion via in-place rehash) is the Abseil/SwissTable design
//! as popularized by the Rust standard library's `hashbrown`.

mod bitmask;
mod control_bytes;
mod generic;
#[cfg(all(
    feature = "simd",
    target_feature = "sse2",
    any(target_arch = "x86", target_arch = "x86_64")
))]
mod sse2;

cfg_if::cfg_if! {
    if #[cfg(all(
        feature = "simd",
        target_feature = "sse2",
        any(target_arch = "x86", target_arch = "x86_64")
    ))] {
        use self::sse2 as imp;
    } else {
        use self::generic as imp;
    }
}

use self::control_bytes::{is_full, DELETED, EMPTY};
use self::imp::Group;
use crate::alloc::{Global, RawAlloc};
use crate::entry::EntryStatus;
use crate::error::Status;
use core::{
    alloc::Layout,
    borrow::Borrow,
    hash::{BuildHasher, Hash, Hasher},
    marker::PhantomData,
    mem,
    ptr::{self, NonNull},
};
use std::collections::hash_map::RandomState;

const LOAD_FACTOR_NUMERATOR: usize = 7;
const LOAD_FACTOR_DENOMINATOR: usize = 8;

fn h1(hash: u64) -> usize {
    hash as usize
}

fn h2(hash: u64) -> u8 {
    (hash >> (64 - 7)) as u8 & 0x7f
}

fn capacity_to_buckets(cap: usize) -> Option<usize> {
    if cap < 4 {
        return Some(4);
    }
    if cap < 8 {
        return Some(8);
    }
    let adjusted = cap.checked_mul(LOAD_FACTOR_DENOMINATOR)? / LOAD_FACTOR_NUMERATOR;
    Some(adjusted.next_power_of_two())
}

fn bucket_mask_to_capacity(bucket_mask: usize) -> usize {
    if bucket_mask < 8 {
        bucket_mask
    } else {
        ((bucket_mask + 1) / LOAD_FACTOR_DENOMINATOR) * LOAD_FACTOR_NUMERATOR
    }
}

struct ProbeSeq {
    pos: usize,
    stride: usize,
}

impl ProbeSeq {
    fn move_to_next(&mut self, bucket_mask: usize) {
        self.stride += Group::WIDTH;
        self.pos += self.stride;
        self.pos &= bucket_mask;
    }
}

/// A position an [`entry`](FlatHashMap::entry) call may later insert at or
/// found occupied by a matching key.
pub struct Entry<'a, K, V, S = RandomState, A: RawAlloc = Global> {
    map: &'a mut FlatHashMap<K, V, S, A>,
    hash: u64,
    status: EntryStatus,
    /// index of the matching slot (occupied) or the first empty-or-deleted
    /// slot found during the probe (vacant)
    index: usize,
}

impl<'a, K, V, S, A: RawAlloc> Entry<'a, K, V, S, A> {
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
        if self.status.is_occupied() {
            unsafe { f(&mut (*self.map.slot_mut_ptr(self.index)).1) };
        }
        self
    }
}

impl<'a, K, V, S: BuildHasher, A: RawAlloc> Entry<'a, K, V, S, A> {
    /// Returns the existing value if occupied, otherwise inserts `value` for
    /// the searched key and returns a reference to it. Returns `None` if a
    /// preceding growth attempt failed.
    pub fn or_insert(self, key: K, value: V) -> Option<&'a mut V>
    where
        K: Hash + Eq,
    {
        if self.status.insert_failed() {
            return None;
        }
        if self.status.is_occupied() {
            return Some(unsafe { &mut (*self.map.slot_mut_ptr(self.index)).1 });
        }
        let index = self.index;
        self.map.insert_at(index, self.hash, key, value);
        Some(unsafe { &mut (*self.map.slot_mut_ptr(index)).1 })
    }

    /// Places `(key, value)` at this entry's position unconditionally,
    /// overwriting any previous value.
    pub fn insert_entry(self, key: K, value: V) -> Option<&'a mut V>
    where
        K: Hash + Eq,
    {
        if self.status.insert_failed() {
            return None;
        }
        let index = self.index;
        if self.status.is_occupied() {
            unsafe { (*self.map.slot_mut_ptr(index)).1 = value };
        } else {
            self.map.insert_at(index, self.hash, key, value);
        }
        Some(unsafe { &mut (*self.map.slot_mut_ptr(index)).1 })
    }

    /// Returns the evicted `(key, value)` pair if this entry was occupied.
    pub fn remove_entry(self) -> Option<(K, V)> {
        if !self.status.is_occupied() {
            return None;
        }
        Some(self.map.erase_at(self.index))
    }

    /// Returns the occupied slot's value.
    ///
    /// # Panics
    /// Panics if this entry is not occupied, or if `NO_UNWRAP` is set.
    pub fn unwrap(self) -> &'a mut V {
        assert!(
            self.status.is_occupied() && self.status.can_unwrap(),
            "called `Entry::unwrap()` on a vacant entry"
        );
        unsafe { &mut (*self.map.slot_mut_ptr(self.index)).1 }
    }
}

/// Open-addressed hash map with 7-bit tag fingerprints and SIMD (or portable)
/// group probing. The `K`/`V` storage and the tag array are two independent
/// allocations sized together (see `DESIGN.md` for why this departs from the
/// single-allocation layout of the lineage this is grounded on).
pub struct FlatHashMap<K, V, S = RandomState, A: RawAlloc = Global> {
    ctrl: NonNull<u8>,
    slots: NonNull<(K, V)>,
    bucket_mask: usize,
    growth_left: usize,
    len: usize,
    hash_builder: S,
    alloc: A,
    _marker: PhantomData<(K, V)>,
}

impl<K, V> Default for FlatHashMap<K, V, RandomState, Global> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> FlatHashMap<K, V, RandomState, Global> {
    pub fn new() -> Self {
        Self::with_hasher_in(RandomState::new(), Global)
    }
}

impl<K, V, S: BuildHasher, A: RawAlloc> FlatHashMap<K, V, S, A> {
    pub fn with_hasher_in(hash_builder: S, alloc: A) -> Self {
        Self {
            ctrl: unsafe { NonNull::new_unchecked(Group::empty_static() as *const _ as *mut u8) },
            slots: NonNull::dangling(),
            bucket_mask: 0,
            growth_left: 0,
            len: 0,
            hash_builder,
            alloc,
            _marker: PhantomData,
        }
    }

    pub fn with_capacity_and_hasher_in(capacity: usize, hash_builder: S, alloc: A) -> Result<Self, Status> {
        let mut map = Self::with_hasher_in(hash_builder, alloc);
        if capacity != 0 {
            map.allocate_buckets(capacity_to_buckets(capacity).ok_or(Status::MemError)?)
                .map_err(|_| Status::MemError)?;
        }
        Ok(map)
    }

    pub const fn count(&self) -> usize {
        self.len
    }
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
    pub const fn capacity(&self) -> usize {
        bucket_mask_to_capacity(self.bucket_mask)
    }

    fn buckets(&self) -> usize {
        self.bucket_mask + 1
    }
    fn is_empty_singleton(&self) -> bool {
        self.bucket_mask == 0
    }

    unsafe fn ctrl_ptr(&self, index: usize) -> *mut u8 {
        self.ctrl.as_ptr().add(index)
    }
    unsafe fn slot_ptr(&self, index: usize) -> *const (K, V) {
        self.slots.as_ptr().add(index)
    }
    unsafe fn slot_mut_ptr(&self, index: usize) -> *mut (K, V) {
        self.slots.as_ptr().add(index)
    }

    unsafe fn set_ctrl(&self, index: usize, value: u8) {
        let mirror = ((index.wrapping_sub(Group::WIDTH)) & self.bucket_mask) + Group::WIDTH;
        *self.ctrl_ptr(index) = value;
        *self.ctrl_ptr(mirror) = value;
    }
    unsafe fn set_ctrl_h2(&self, index: usize, hash: u64) {
        self.set_ctrl(index, h2(hash))
    }

    fn hash_of<Q: Hash + ?Sized>(&self, key: &Q) -> u64 {
        let mut hasher = self.hash_builder.build_hasher();
        key.hash(&mut hasher);
        hasher.finish()
    }

    fn probe_seq(&self, hash: u64) -> ProbeSeq {
        ProbeSeq {
            pos: h1(hash) & self.bucket_mask,
            stride: 0,
        }
    }

    /// Finds the first empty-or-deleted slot for `hash`, following the exact
    /// "second scan from zero" correction that handles tables smaller than
    /// one group.
    fn find_insert_slot(&self, hash: u64) -> usize {
        let mut seq = self.probe_seq(hash);
        loop {
            unsafe {
                let group = Group::load_unaligned(self.ctrl_ptr(seq.pos));
                if let Some(bit) = group.match_empty_or_deleted().lowest_set_bit() {
                    let result = (seq.pos + bit) & self.bucket_mask;
                    if is_full(*self.ctrl_ptr(result)) {
                        debug_assert!(self.buckets() < Group::WIDTH);
                        return Group::load_aligned(self.ctrl_ptr(0))
                            .match_empty_or_deleted()
                            .lowest_set_bit_nonzero();
                    }
                    return result;
                }
            }
            seq.move_to_next(self.bucket_mask);
        }
    }

    fn is_in_same_group(&self, i: usize, new_i: usize, hash: u64) -> bool {
        let probe_pos = self.probe_seq(hash).pos;
        let group_of = |pos: usize| (pos.wrapping_sub(probe_pos) & self.bucket_mask) / Group::WIDTH;
        group_of(i) == group_of(new_i)
    }

    fn find_key<Q>(&self, hash: u64, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        if self.bucket_mask == 0 {
            return None;
        }
        let mut seq = self.probe_seq(hash);
        loop {
            unsafe {
                let group = Group::load_unaligned(self.ctrl_ptr(seq.pos));
                for bit in group.match_byte(h2(hash)) {
                    let index = (seq.pos + bit) & self.bucket_mask;
                    let slot = &*self.slot_ptr(index);
                    if slot.0.borrow() == key {
                        return Some(index);
                    }
                }
                if group.match_empty().any_bit_set() {
                    return None;
                }
            }
            seq.move_to_next(self.bucket_mask);
        }
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q> + Hash,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hash_of(key);
        self.find_key(hash, key)
            .map(|i| unsafe { &(*self.slot_ptr(i)).1 })
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q> + Hash,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hash_of(key);
        self.find_key(hash, key)
            .map(|i| unsafe { &mut (*self.slot_mut_ptr(i)).1 })
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q> + Hash,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).is_some()
    }

    /// Produces an `Entry` for `key`: `OCCUPIED` if present, otherwise
    /// `VACANT` (carrying the slot a later insert would use), or
    /// `VACANT | INSERT_ERROR` if headroom ran out and growth failed.
    pub fn entry(&mut self, key: K) -> Entry<'_, K, V, S, A>
    where
        K: Hash + Eq,
    {
        let hash = self.hash_of(&key);
        if let Some(index) = self.find_key(hash, &key) {
            return Entry {
                map: self,
                hash,
                status: EntryStatus::OCCUPIED,
                index,
            };
        }
        let status = if self.growth_left == 0 && self.reserve_for_insert().is_err() {
            EntryStatus::VACANT | EntryStatus::INSERT_ERROR | EntryStatus::NO_UNWRAP
        } else {
            EntryStatus::VACANT
        };
        let index = if status.insert_failed() {
            0
        } else {
            self.find_insert_slot(hash)
        };
        Entry {
            map: self,
            hash,
            status,
            index,
        }
    }

    /// Convenience: `entry(key).or_insert(key, value)` without the caller
    /// having to clone `key` themselves.
    pub fn try_insert(&mut self, key: K, value: V) -> Option<&mut V>
    where
        K: Hash + Eq + Clone,
    {
        self.entry(key.clone()).or_insert(key, value)
    }

    /// Convenience: `entry(key).insert_entry(key, value)`.
    pub fn insert_or_assign(&mut self, key: K, value: V) -> Option<&mut V>
    where
        K: Hash + Eq + Clone,
    {
        self.entry(key.clone()).insert_entry(key, value)
    }

    /// Atomic exchange: if `key` is occupied, the old value is moved into
    /// `value` and the slot keeps what `value` held; otherwise `value`'s
    /// content is moved into a freshly inserted slot for `key`, leaving
    /// `value` holding `V::default()`. Returns `Err(Status::NoAlloc)`
    /// without touching `value` if insertion was needed and growth failed.
    pub fn swap_entry(&mut self, key: K, value: &mut V) -> Result<(), Status>
    where
        K: Hash + Eq + Clone,
        V: Default,
    {
        let entry = self.entry(key.clone());
        if entry.insert_error() {
            return Err(Status::NoAlloc);
        }
        if entry.occupied() {
            mem::swap(unsafe { &mut (*entry.map.slot_mut_ptr(entry.index)).1 }, value);
        } else {
            let incoming = mem::take(value);
            entry.or_insert(key, incoming);
        }
        Ok(())
    }

    pub fn insert(&mut self, key: K, value: V) -> Option<V>
    where
        K: Hash + Eq,
    {
        let hash = self.hash_of(&key);
        if let Some(index) = self.find_key(hash, &key) {
            let old = mem::replace(unsafe { &mut (*self.slot_mut_ptr(index)).1 }, value);
            return Some(old);
        }
        if self.growth_left == 0 {
            // caller chose the infallible API; panics mirror std::HashMap's own
            // "allocation failure" behavior when growth genuinely cannot happen
            self.reserve_for_insert()
                .expect("flat hash map: growth required but allocator rejected it");
        }
        let index = self.find_insert_slot(hash);
        self.insert_at(index, hash, key, value);
        None
    }

    fn insert_at(&mut self, index: usize, hash: u64, key: K, value: V) {
        unsafe {
            let old_ctrl = *self.ctrl_ptr(index);
            self.set_ctrl_h2(index, hash);
            self.slot_mut_ptr(index).write((key, value));
            if old_ctrl == EMPTY {
                self.growth_left -= 1;
            }
            self.len += 1;
        }
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q> + Hash,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hash_of(key);
        let index = self.find_key(hash, key)?;
        Some(self.erase_at(index).1)
    }

    fn erase_at(&mut self, index: usize) -> (K, V) {
        unsafe {
            let index_before = index.wrapping_sub(Group::WIDTH) & self.bucket_mask;
            let empty_before = Group::load_unaligned(self.ctrl_ptr(index_before)).match_empty();
            let empty_after = Group::load_unaligned(self.ctrl_ptr(index)).match_empty();
            let tag = if empty_before.leading_zeros() + empty_after.trailing_zeros() >= Group::WIDTH {
                self.growth_left += 1;
                EMPTY
            } else {
                DELETED
            };
            self.set_ctrl(index, tag);
            self.len -= 1;
            self.slot_mut_ptr(index).read()
        }
    }

    /// Ensures at least one empty-or-deleted slot is available, growing (if an
    /// allocator is bound and worthwhile) or performing an in-place rehash
    /// otherwise.
    fn reserve_for_insert(&mut self) -> Result<(), Status> {
        if self.growth_left > 0 {
            return Ok(());
        }
        let full_capacity = bucket_mask_to_capacity(self.bucket_mask);
        let prefers_grow = self.len > full_capacity / 2;
        if prefers_grow && self.try_grow().is_ok() {
            return Ok(());
        }
        if !self.is_empty_singleton() {
            self.rehash_in_place();
            if self.growth_left > 0 {
                return Ok(());
            }
        }
        self.try_grow().map_err(|_| Status::NoAlloc)
    }

    fn layout_for(buckets: usize) -> (Layout, Layout) {
        (
            Layout::array::<(K, V)>(buckets).expect("capacity overflow"),
            Layout::array::<u8>(buckets + Group::WIDTH).expect("capacity overflow"),
        )
    }

    fn allocate_buckets(&mut self, buckets: usize) -> Result<(), ()> {
        let (slot_layout, ctrl_layout) = Self::layout_for(buckets);
        let slots = self.alloc.allocate(slot_layout)?.cast();
        let ctrl = match self.alloc.allocate(ctrl_layout) {
            Ok(p) => p,
            Err(()) => {
                unsafe { self.alloc.deallocate(slots.cast(), slot_layout) };
                return Err(());
            }
        };
        unsafe { ptr::write_bytes(ctrl.as_ptr(), EMPTY, ctrl_layout.size()) };
        self.slots = slots;
        self.ctrl = ctrl;
        self.bucket_mask = buckets - 1;
        self.growth_left = bucket_mask_to_capacity(self.bucket_mask) - self.len;
        Ok(())
    }

    fn try_grow(&mut self) -> Result<(), ()> {
        let new_buckets = capacity_to_buckets((self.len + 1).max(self.buckets() * 2)).ok_or(())?;
        let old_ctrl = self.ctrl;
        let old_slots = self.slots;
        let old_buckets = self.buckets();
        let old_bucket_mask = self.bucket_mask;
        let was_singleton = self.is_empty_singleton();

        log::debug!(
            "hashmap: growing table from {} to {} buckets ({} live entries)",
            old_buckets,
            new_buckets,
            self.len
        );

        self.allocate_buckets(new_buckets)?;
        self.len = 0; // re-accumulated below by insert_at

        if !was_singleton {
            for i in 0..old_buckets {
                unsafe {
                    if is_full(*old_ctrl.as_ptr().add(i)) {
                        let (k, v) = old_slots.as_ptr().add(i).read();
                        let hash = self.hash_of(&k);
                        let dst = self.find_insert_slot(hash);
                        self.insert_at(dst, hash, k, v);
                    }
                }
            }
            let (slot_layout, ctrl_layout) = Self::layout_for(old_buckets);
            unsafe {
                self.alloc.deallocate(old_slots.cast(), slot_layout);
                self.alloc.deallocate(old_ctrl.cast(), ctrl_layout);
            }
        }
        Ok(())
    }

    /// Runs `convert_special` over every group, then walks the table moving
    /// displaced entries into their true homes, freeing tombstones without
    /// allocating.
    fn rehash_in_place(&mut self) {
        log::debug!(
            "hashmap: in-place rehash at {} buckets ({} live entries)",
            self.buckets(),
            self.len
        );
        unsafe {
            for i in (0..self.buckets()).step_by(Group::WIDTH) {
                let group = Group::load_aligned(self.ctrl_ptr(i));
                let group = group.convert_special_to_empty_and_full_to_deleted();
                group.store_aligned(self.ctrl_ptr(i));
            }
            if self.buckets() < Group::WIDTH {
                ptr::copy(self.ctrl_ptr(0), self.ctrl_ptr(self.buckets()), self.buckets());
            } else {
                ptr::copy(self.ctrl_ptr(0), self.ctrl_ptr(self.buckets()), Group::WIDTH);
            }

            let mut i = 0;
            while i < self.buckets() {
                if *self.ctrl_ptr(i) != DELETED {
                    i += 1;
                    continue;
                }
                loop {
                    let hash = self.hash_of(&(*self.slot_ptr(i)).0);
                    let new_i = self.find_insert_slot(hash);
                    if self.is_in_same_group(i, new_i, hash) {
                        self.set_ctrl_h2(i, hash);
                        break;
                    }
                    let prev_ctrl = *self.ctrl_ptr(new_i);
                    self.set_ctrl_h2(new_i, hash);
                    if prev_ctrl == EMPTY {
                        self.set_ctrl(i, EMPTY);
                        ptr::copy_nonoverlapping(self.slot_ptr(i), self.slot_mut_ptr(new_i), 1);
                        break;
                    } else {
                        debug_assert_eq!(prev_ctrl, DELETED);
                        ptr::swap(self.slot_mut_ptr(i), self.slot_mut_ptr(new_i));
                        // the item swapped into `i` must be re-examined
                    }
                }
                i += 1;
            }
            self.growth_left = bucket_mask_to_capacity(self.bucket_mask) - self.len;
        }
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            map_ctrl: self.ctrl,
            map_slots: self.slots,
            buckets: self.buckets(),
            pos: 0,
            _marker: PhantomData,
        }
    }

    pub fn clear(&mut self) {
        for i in 0..self.buckets() {
            unsafe {
                if is_full(*self.ctrl_ptr(i)) {
                    ptr::drop_in_place(self.slot_mut_ptr(i));
                    self.set_ctrl(i, EMPTY);
                }
            }
        }
        self.len = 0;
        self.growth_left = bucket_mask_to_capacity(self.bucket_mask);
    }
}

/// A forward iterator over `(&K, &V)` pairs. Iteration order is unspecified
/// and may differ across equivalent maps (hash map iteration order is
/// explicitly out of scope for stability).
pub struct Iter<'a, K, V> {
    map_ctrl: NonNull<u8>,
    map_slots: NonNull<(K, V)>,
    buckets: usize,
    pos: usize,
    _marker: PhantomData<&'a (K, V)>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);
    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.buckets {
            let i = self.pos;
            self.pos += 1;
            unsafe {
                if is_full(*self.map_ctrl.as_ptr().add(i)) {
                    let (k, v) = &*self.map_slots.as_ptr().add(i);
                    return Some((k, v));
                }
            }
        }
        None
    }
}

impl<K, V, S, A: RawAlloc> Drop for FlatHashMap<K, V, S, A> {
    fn drop(&mut self) {
        if self.is_empty_singleton() {
            return;
        }
        for i in 0..self.buckets() {
            unsafe {
                if is_full(*self.ctrl_ptr(i)) {
                    ptr::drop_in_place(self.slot_mut_ptr(i));
                }
            }
        }
        let (slot_layout, ctrl_layout) = Self::layout_for(self.buckets());
        unsafe {
            self.alloc.deallocate(self.slots.cast(), slot_layout);
            self.alloc.deallocate(self.ctrl.cast(), ctrl_layout);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::NullAlloc;
    use proptest::prelude::*;

    /// Property 6 (hash-map probe invariant): for every full slot at index
    /// `i` with hash `h`, triangular-group probing from `h & mask` must reach
    /// `i`'s group before any group containing an `EMPTY` tag.
    fn assert_probe_invariant<K: Hash, V, S: BuildHasher, A: RawAlloc>(map: &FlatHashMap<K, V, S, A>) {
        if map.is_empty_singleton() {
            return;
        }
        for i in 0..map.buckets() {
            let tag = unsafe { *map.ctrl_ptr(i) };
            if !is_full(tag) {
                continue;
            }
            let (key, _) = unsafe { &*map.slot_ptr(i) };
            let hash = map.hash_of(key);
            let mut seq = map.probe_seq(hash);
            loop {
                let group_positions: Vec<usize> =
                    (0..Group::WIDTH).map(|o| (seq.pos + o) & map.bucket_mask).collect();
                if group_positions.contains(&i) {
                    break;
                }
                for &pos in &group_positions {
                    assert_ne!(
                        unsafe { *map.ctrl_ptr(pos) },
                        EMPTY,
                        "probe invariant violated: reached an empty tag before bucket {i}"
                    );
                }
                seq.move_to_next(map.bucket_mask);
            }
        }
    }

    #[test]
    fn s1_hash_map_basic() {
        let _ = env_logger::try_init();
        let mut map: FlatHashMap<i32, i32> =
            FlatHashMap::with_capacity_and_hasher_in(16, RandomState::new(), Global).unwrap();
        for k in 1..100 {
            map.insert(k, k * 10);
        }
        assert_eq!(map.get(&42), Some(&420));
        assert_eq!(map.remove(&42), Some(420));
        assert_eq!(map.get(&42), None);
        assert_eq!(map.count(), 98);
    }

    #[test]
    fn entry_or_insert_and_modify() {
        let mut map: FlatHashMap<&str, i32> = FlatHashMap::new();
        map.entry("a").or_insert("a", 1);
        map.entry("a").and_modify(|v| *v += 1).or_insert("a", 100);
        assert_eq!(map.get("a"), Some(&2));
    }

    #[test]
    fn try_insert_insert_or_assign_swap_entry() {
        let mut map: FlatHashMap<&str, i32> = FlatHashMap::new();
        assert_eq!(map.try_insert("a", 1), Some(&mut 1));
        assert_eq!(map.try_insert("a", 999), Some(&mut 1));
        assert_eq!(map.insert_or_assign("a", 2), Some(&mut 2));
        assert_eq!(map.get("a"), Some(&2));

        let mut buf = 42;
        map.swap_entry("a", &mut buf).unwrap();
        assert_eq!(buf, 2);
        assert_eq!(map.get("a"), Some(&42));

        let mut buf2 = 7;
        map.swap_entry("b", &mut buf2).unwrap();
        assert_eq!(buf2, 0);
        assert_eq!(map.get("b"), Some(&7));
    }

    #[test]
    fn s6_insert_error_with_no_allocator() {
        let mut map: FlatHashMap<i32, i32, RandomState, NullAlloc> =
            FlatHashMap::with_capacity_and_hasher_in(4, RandomState::new(), NullAlloc).unwrap();
        for k in 0..map.capacity() as i32 {
            map.entry(k).or_insert(k, k);
        }
        let e = map.entry(9999);
        assert!(e.status().is_vacant());
        assert!(e.insert_error());
        assert!(e.or_insert(9999, 9999).is_none());
    }

    #[test]
    fn s2_in_place_rehash_recovers_headroom() {
        let _ = env_logger::try_init();
        let mut map: FlatHashMap<i32, i32, RandomState, NullAlloc> =
            FlatHashMap::with_capacity_and_hasher_in(64, RandomState::new(), NullAlloc).unwrap();
        for k in 0..56 {
            assert!(map.entry(k).or_insert(k, k).is_some());
        }
        for k in 0..28 {
            map.remove(&k);
        }
        for k in 100..128 {
            assert!(
                map.entry(k).or_insert(k, k).is_some(),
                "insert {k} should succeed via in-place rehash"
            );
        }
        let overflow = map.entry(999_999);
        assert!(overflow.insert_error());
    }

    #[test]
    fn removing_every_key_empties_the_map() {
        let mut map: FlatHashMap<i32, i32> = FlatHashMap::new();
        for k in 0..500 {
            map.insert(k, k);
        }
        for k in 0..500 {
            assert_eq!(map.remove(&k), Some(k));
        }
        assert_eq!(map.count(), 0);
        assert!(map.iter().next().is_none());
    }

    #[test]
    fn randomized_insert_remove_lookup_matches_model() {
        use rand::{rngs::StdRng, Rng, SeedableRng};
        use std::collections::HashMap as Model;

        let mut rng = StdRng::seed_from_u64(0xC0FFEE);
        let mut map: FlatHashMap<i32, i32> = FlatHashMap::new();
        let mut model: Model<i32, i32> = Model::new();
        for _ in 0..5_000 {
            let key = rng.gen_range(0..500);
            match rng.gen_range(0..3) {
                0 | 1 => {
                    let value = rng.gen_range(0..1_000_000);
                    assert_eq!(map.insert(key, value), model.insert(key, value));
                }
                _ => {
                    assert_eq!(map.remove(&key), model.remove(&key));
                }
            }
            assert_eq!(map.count(), model.len());
        }
        for (k, v) in &model {
            assert_eq!(map.get(k), Some(v));
        }
        assert_probe_invariant(&map);
    }

    proptest! {
        /// Properties 1, 3, 6: the map tracks a `std::collections::HashMap`
        /// model through a random sequence of inserts/removes (associative
        /// array law, count conservation) while the probe invariant holds
        /// after every mutation.
        #[test]
        fn matches_model_and_keeps_probe_invariant(
            ops in prop::collection::vec((0i32..64, 0i32..10_000, prop::bool::ANY), 1..300)
        ) {
            use std::collections::HashMap as Model;
            let mut map: FlatHashMap<i32, i32> = FlatHashMap::new();
            let mut model: Model<i32, i32> = Model::new();
            for (k, v, do_insert) in ops {
                if do_insert {
                    let before = model.insert(k, v);
                    prop_assert_eq!(map.insert(k, v), before);
                } else {
                    prop_assert_eq!(map.remove(&k), model.remove(&k));
                }
                prop_assert_eq!(map.count(), model.len());
            }
            for (k, v) in &model {
                prop_assert_eq!(map.get(k), Some(v));
            }
            assert_probe_invariant(&map);
        }
    }
}
