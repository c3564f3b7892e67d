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

//! Crate-wide status codes. No `thiserror`, no `anyhow`: plain `#[repr(u8)]` enums,
//! same as the rest of this lineage.

pub type ContainerResult<T> = Result<T, Status>;

/// A stable, integral status code a caller may test against without matching on
/// a larger enum of container-specific errors.
#[repr(u8)]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Status {
    /// The operation completed normally
    Ok = 0,
    /// Null container, null key, or an out-of-range index was supplied
    ArgError = 1,
    /// The operation would have required growth, but no allocator is bound
    NoAlloc = 2,
    /// The bound allocator returned null, or the requested size overflowed
    MemError = 3,
}

impl Status {
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// A fallible predicate result that distinguishes "definitely false" from
/// "could not be determined" (e.g. querying a fixed-capacity container in a way
/// that would need to consult an allocator that isn't bound).
#[repr(i8)]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TriBool {
    False = 0,
    True = 1,
    Error = -1,
}

impl From<bool> for TriBool {
    fn from(b: bool) -> Self {
        if b {
            Self::True
        } else {
            Self::False
        }
    }
}
