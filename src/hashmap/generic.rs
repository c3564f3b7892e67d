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

//! Portable group implementation: an 8-lane (64-bit) or 4-lane (32-bit) group
//! processed with the classic zero-byte-finding bit trick rather than SIMD
//! compare/movemask. Must stay bit-for-bit equivalent to [`super::sse2`].

use super::control_bytes::EMPTY;
use core::mem;

#[cfg(target_pointer_width = "64")]
type GroupWord = u64;
#[cfg(not(target_pointer_width = "64"))]
type GroupWord = u32;

pub type BitmaskWord = GroupWord;
pub const BITMASK_STRIDE: usize = 8;
pub const BITMASK_MASK: BitmaskWord = 0x8080_8080_8080_8080_u64 as BitmaskWord;

fn repeat(byte: u8) -> GroupWord {
    GroupWord::from_ne_bytes([byte; mem::size_of::<GroupWord>()])
}

/// A group of control bytes scanned together via word-sized arithmetic.
#[derive(Clone, Copy)]
pub struct Group(GroupWord);

impl Group {
    pub const WIDTH: usize = mem::size_of::<Self>();

    pub const fn empty_static() -> &'static [u8; Group::WIDTH] {
        #[repr(C)]
        struct AlignedBytes {
            _align: [Group; 0],
            bytes: [u8; Group::WIDTH],
        }
        const ALIGNED_BYTES: AlignedBytes = AlignedBytes {
            _align: [],
            bytes: [EMPTY; Group::WIDTH],
        };
        &ALIGNED_BYTES.bytes
    }

    /// # Safety
    /// `ptr` must be valid to read `Self::WIDTH` bytes from.
    pub unsafe fn load_unaligned(ptr: *const u8) -> Self {
        Group(core::ptr::read_unaligned(ptr.cast()))
    }

    /// # Safety
    /// `ptr` must be valid to read `Self::WIDTH` aligned bytes from.
    pub unsafe fn load_aligned(ptr: *const u8) -> Self {
        Group(core::ptr::read(ptr.cast()))
    }

    /// # Safety
    /// `ptr` must be valid to write `Self::WIDTH` aligned bytes to.
    pub unsafe fn store_aligned(self, ptr: *mut u8) {
        core::ptr::write(ptr.cast(), self.0)
    }

    pub fn match_byte(self, byte: u8) -> super::bitmask::Bitmask {
        let cmp = self.0 ^ repeat(byte);
        super::bitmask::Bitmask(cmp.wrapping_sub(repeat(0x01)) & !cmp & repeat(0x80))
    }

    pub fn match_empty(self) -> super::bitmask::Bitmask {
        super::bitmask::Bitmask((self.0 & (self.0 << 1)) & repeat(0x80))
    }

    pub fn match_empty_or_deleted(self) -> super::bitmask::Bitmask {
        super::bitmask::Bitmask(self.0 & repeat(0x80))
    }

    pub fn match_full(self) -> super::bitmask::Bitmask {
        self.match_empty_or_deleted().invert()
    }

    /// Replaces `DELETED` with `EMPTY` and `FULL` with `DELETED`, in place.
    pub fn convert_special_to_empty_and_full_to_deleted(self) -> Self {
        let full = !self.0 & repeat(0x80);
        Group(!full + (full >> 7))
    }
}
