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

//! The allocation-function collaborator. A container bound to [`Global`] may grow
//! without bound (subject to the real allocator); a container bound to
//! [`NullAlloc`] is fixed-capacity and any growth request fails with
//! [`Status::NoAlloc`](crate::error::Status::NoAlloc).

use core::{alloc::Layout, ptr::NonNull};

/// A source of memory for a container. `allocate`/`grow`/`deallocate` mirror the
/// realloc-style single-function contract named by the original design: the
/// default method bodies here are free to no-op growth and simply allocate anew.
///
/// # Safety
/// Implementors must return pointers that are valid for `layout` until
/// `deallocate` (or a successful `grow`) is called on them.
pub unsafe trait RawAlloc {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, ()>;

    /// Grow a previous allocation of `old_layout` to `new_layout`. The default
    /// implementation allocates fresh and copies; allocators that can extend in
    /// place should override this.
    ///
    /// # Safety
    /// `ptr` must have been returned by a prior `allocate`/`grow` call on `self`
    /// with `old_layout`, and must not have been deallocated since.
    unsafe fn grow(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_layout: Layout,
    ) -> Result<NonNull<u8>, ()> {
        debug_assert!(new_layout.size() >= old_layout.size());
        let new_ptr = self.allocate(new_layout)?;
        core::ptr::copy_nonoverlapping(ptr.as_ptr(), new_ptr.as_ptr(), old_layout.size());
        self.deallocate(ptr, old_layout);
        Ok(new_ptr)
    }

    /// # Safety
    /// `ptr` must have been returned by a prior `allocate`/`grow` call on `self`
    /// with exactly `layout`, and must not have been deallocated since.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);

    /// Whether this allocator currently permits growth at all. Containers use
    /// this as a cheap policy gate before attempting a real grow; the default
    /// probes with a throwaway one-byte allocation.
    fn permits_growth(&self) -> bool {
        match self.allocate(Layout::new::<u8>()) {
            Ok(ptr) => {
                unsafe { self.deallocate(ptr, Layout::new::<u8>()) };
                true
            }
            Err(()) => false,
        }
    }
}

/// The host allocator (`std::alloc`). Containers bound to `Global` grow without
/// a fixed ceiling.
#[derive(Debug, Default, Clone, Copy)]
pub struct Global;

unsafe impl RawAlloc for Global {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, ()> {
        if layout.size() == 0 {
            return Ok(NonNull::dangling());
        }
        // SAFETY: non-zero-size layout, checked above
        let ptr = unsafe { std::alloc::alloc(layout) };
        NonNull::new(ptr).ok_or(())
    }

    unsafe fn grow(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_layout: Layout,
    ) -> Result<NonNull<u8>, ()> {
        debug_assert_eq!(old_layout.align(), new_layout.align());
        if old_layout.size() == 0 {
            return self.allocate(new_layout);
        }
        let raw = std::alloc::realloc(ptr.as_ptr(), old_layout, new_layout.size());
        NonNull::new(raw).ok_or(())
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() != 0 {
            std::alloc::dealloc(ptr.as_ptr(), layout)
        }
    }

    fn permits_growth(&self) -> bool {
        true
    }
}

/// The "no allocator bound" allocator. Every request fails; a container bound to
/// this is fixed-capacity and must be pre-sized with `reserve` (or constructed
/// `with_capacity`) before use.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAlloc;

unsafe impl RawAlloc for NullAlloc {
    fn allocate(&self, _layout: Layout) -> Result<NonNull<u8>, ()> {
        Err(())
    }
    unsafe fn grow(
        &self,
        _ptr: NonNull<u8>,
        _old_layout: Layout,
        _new_layout: Layout,
    ) -> Result<NonNull<u8>, ()> {
        Err(())
    }
    unsafe fn deallocate(&self, _ptr: NonNull<u8>, _layout: Layout) {
        // nothing was ever allocated through us
    }

    fn permits_growth(&self) -> bool {
        false
    }
}
