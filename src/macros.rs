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

macro_rules! constgrp {
    ($(#[$attr:meta])* $vis:vis struct $group:ident: $ty:ty { $($const:ident = $expr:expr),* $(,)?}) => (
        $(#[$attr])* $vis struct $group(pub(crate) $ty);
        impl $group {
            $(pub const $const: Self = Self($expr);)*
            #[inline(always)] pub const fn bits(&self) -> $ty { self.0 }
            #[inline(always)] pub const fn from_bits(v: $ty) -> Self { Self(v) }
            #[inline(always)] pub const fn contains(&self, other: Self) -> bool { self.0 & other.0 == other.0 }
            #[inline(always)] pub const fn name(&self) -> &'static str {
                match self.0 {$(capture if capture == $expr => ::core::stringify!($const),)* _ => "<combined>"}
            }
        }
        impl ::core::ops::BitOr for $group {
            type Output = Self;
            #[inline(always)] fn bitor(self, rhs: Self) -> Self { Self(self.0 | rhs.0) }
        }
        impl ::core::ops::BitOrAssign for $group {
            #[inline(always)] fn bitor_assign(&mut self, rhs: Self) { self.0 |= rhs.0 }
        }
        impl ::core::cmp::PartialEq for $group {
            #[inline(always)] fn eq(&self, rhs: &Self) -> bool { self.0 == rhs.0 }
        }
        impl ::core::clone::Clone for $group { fn clone(&self) -> Self { Self(self.0) } }
        impl ::core::marker::Copy for $group {}
        impl ::core::fmt::Debug for $group {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                ::core::write!(f, "{}::{}", ::core::stringify!($group), Self::name(self))
            }
        }
    );
}
