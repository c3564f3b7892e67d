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

//! SSE2 group implementation: 16 lanes, compared with `pcmpeqb`/`pmovmskb`. Must
//! stay bit-for-bit equivalent to [`super::generic`].

use super::control_bytes::EMPTY;
#[cfg(target_arch = "x86")]
use core::arch::x86;
#[cfg(target_arch = "x86_64")]
use core::arch::x86_64 as x86;
use core::mem;

pub type BitmaskWord = u16;
pub const BITMASK_STRIDE: usize = 1;
pub const BITMASK_MASK: BitmaskWord = 0xffff;

/// A 128-bit (16-lane) group of control bytes.
pub struct Group(x86::__m128i);

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
        Group(x86::_mm_loadu_si128(ptr.cast()))
    }

    /// # Safety
    /// `ptr` must be valid to read `Self::WIDTH` bytes from, 16-byte aligned.
    pub unsafe fn load_aligned(ptr: *const u8) -> Self {
        Group(x86::_mm_load_si128(ptr.cast()))
    }

    /// # Safety
    /// `ptr` must be valid to write `Self::WIDTH` bytes to, 16-byte aligned.
    pub unsafe fn store_aligned(self, ptr: *mut u8) {
        x86::_mm_store_si128(ptr.cast(), self.0)
    }

    pub fn match_byte(self, byte: u8) -> super::bitmask::Bitmask {
        unsafe {
            let cmp = x86::_mm_cmpeq_epi8(self.0, x86::_mm_set1_epi8(byte as i8));
            super::bitmask::Bitmask(x86::_mm_movemask_epi8(cmp) as u16)
        }
    }

    pub fn match_empty(self) -> super::bitmask::Bitmask {
        self.match_byte(EMPTY)
    }

    pub fn match_empty_or_deleted(self) -> super::bitmask::Bitmask {
        unsafe { super::bitmask::Bitmask(x86::_mm_movemask_epi8(self.0) as u16) }
    }

    pub fn match_full(self) -> super::bitmask::Bitmask {
        self.match_empty_or_deleted().invert()
    }

    /// Replaces `DELETED` with `EMPTY` and `FULL` with `DELETED`, in place.
    pub fn convert_special_to_empty_and_full_to_deleted(self) -> Self {
        unsafe {
            let zero = x86::_mm_setzero_si128();
            let special = x86::_mm_cmpgt_epi8(zero, self.0);
            Group(x86::_mm_or_si128(special, x86::_mm_set1_epi8(0x80u8 as i8)))
        }
    }
}
