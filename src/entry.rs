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

//! The status bitset shared by every container's `Entry` type. Each container
//! (`hashmap::Entry`, `ordmap::Entry`, `splay::Entry`) owns its own positional
//! data (a tag + slot index, a comparison + parent index, a splayed root +
//! side) but all of them carry one of these as their status word.

constgrp! {
    /// Bits describing the disposition of an [`Entry`](crate::hashmap::Entry)-shaped value.
    #[derive(Default)]
    pub struct EntryStatus: u8 {
        VACANT = 0,
        OCCUPIED = 1,
        INSERT_ERROR = 2,
        ARG_ERROR = 4,
        NO_UNWRAP = 8,
    }
}

impl EntryStatus {
    pub const fn is_occupied(&self) -> bool {
        self.contains(Self::OCCUPIED)
    }
    pub const fn is_vacant(&self) -> bool {
        !self.is_occupied()
    }
    pub const fn insert_failed(&self) -> bool {
        self.contains(Self::INSERT_ERROR)
    }
    pub const fn can_unwrap(&self) -> bool {
        !self.contains(Self::NO_UNWRAP)
    }
}

#[cfg(test)]
mod tests {
    use super::EntryStatus;

    #[test]
    fn status_combines() {
        let s = EntryStatus::VACANT | EntryStatus::INSERT_ERROR | EntryStatus::NO_UNWRAP;
        assert!(s.is_vacant());
        assert!(s.insert_failed());
        assert!(!s.can_unwrap());
    }

    #[test]
    fn occupied_is_not_vacant() {
        assert!(EntryStatus::OCCUPIED.is_occupied());
        assert!(!EntryStatus::OCCUPIED.is_vacant());
    }
}
