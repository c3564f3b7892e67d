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

//! Generic in-memory associative containers, each trading a different set of
//! guarantees for its performance profile:
//!
//! - [`hashmap::FlatHashMap`]: open-addressed, SIMD-group-probed, no stable
//!   iteration order, O(1) amortized.
//! - [`ordmap::FlatOrdMap`]: a rank-balanced (WAVL) tree stored flat in one
//!   buffer, ordered iteration, O(log n) worst case.
//! - [`splay::SplayMap`] / [`splay::multi::SplayMultimap`]: pointer-stable,
//!   self-adjusting, ordered, O(log n) amortized.
//!
//! All three share the same shape of API: `get`/`get_mut`/`insert`/`remove`
//! plus an `entry()` occupied-or-vacant handle. [`alloc::RawAlloc`] lets the
//! buffer-backed containers (hash map, ordered map) be bound to a fixed-size
//! arena via [`alloc::NullAlloc`] instead of the default [`alloc::Global`];
//! the splay containers allocate a node at a time through the global
//! allocator and have no such ceiling.

#[macro_use]
mod macros;

pub mod alloc;
pub mod buffer;
pub mod entry;
pub mod error;
pub mod hashmap;
pub mod ordmap;
pub mod splay;

pub use alloc::{Global, NullAlloc, RawAlloc};
pub use buffer::RawBuf;
pub use entry::EntryStatus;
pub use error::{ContainerResult, Status, TriBool};
pub use hashmap::FlatHashMap;
pub use ordmap::{FlatOrdMap, KeyCmp, OrdCmp};
pub use splay::{multi::SplayMultimap, SplayMap};
