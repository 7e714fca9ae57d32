// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A macro to define named bitflag sets.
//!
//! Besides the usual set operations, every generated type carries a table of its
//! named flags so that sets can be enumerated (`iter_names`) and parsed back from
//! configuration strings (`from_name`).

/// Defines a bitflag set type with named constants.
#[macro_export]
macro_rules! prism_bitflags {
    (
        $(#[$attr:meta])*
        $vis:vis struct $name:ident: $ty:ty {
            $(
                $(#[$flag_attr:meta])*
                const $flag_name:ident = $flag_value:expr;
            )*
        }
    ) => {
        $(#[$attr])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
        $vis struct $name {
            bits: $ty,
        }

        impl $name {
            /// An empty set of flags.
            pub const EMPTY: Self = Self { bits: 0 };

            $(
                $(#[$flag_attr])*
                pub const $flag_name: Self = Self { bits: $flag_value };
            )*

            /// Every named flag, in declaration order.
            pub const NAMED: &'static [(&'static str, Self)] = &[
                $((stringify!($flag_name), Self { bits: $flag_value }),)*
            ];

            /// Creates a set from raw bits. Unknown bits are kept.
            pub const fn from_bits_truncate(bits: $ty) -> Self {
                Self { bits }
            }

            /// Returns the raw value of the set.
            pub const fn bits(&self) -> $ty {
                self.bits
            }

            /// Returns `true` if no bit is set.
            pub const fn is_empty(&self) -> bool {
                self.bits == 0
            }

            /// Returns `true` if all flags in `other` are contained within `self`.
            pub const fn contains(&self, other: Self) -> bool {
                (self.bits & other.bits) == other.bits
            }

            /// Returns `true` if any flag in `other` is contained within `self`.
            pub const fn intersects(&self, other: Self) -> bool {
                (self.bits & other.bits) != 0
            }

            /// Inserts the flags in `other` into `self`.
            pub fn insert(&mut self, other: Self) {
                self.bits |= other.bits;
            }

            /// Removes the flags in `other` from `self`.
            pub fn remove(&mut self, other: Self) {
                self.bits &= !other.bits;
            }

            /// Inserts or removes `other` depending on `value`.
            pub fn set(&mut self, other: Self, value: bool) {
                if value {
                    self.insert(other);
                } else {
                    self.remove(other);
                }
            }

            /// Returns a new set with `other` flags inserted.
            #[must_use]
            pub const fn with(mut self, other: Self) -> Self {
                self.bits |= other.bits;
                self
            }

            /// Returns a new set with `other` flags removed.
            #[must_use]
            pub const fn without(mut self, other: Self) -> Self {
                self.bits &= !other.bits;
                self
            }

            /// Looks up a named flag, ignoring ASCII case.
            pub fn from_name(name: &str) -> Option<Self> {
                Self::NAMED
                    .iter()
                    .find(|(flag_name, _)| flag_name.eq_ignore_ascii_case(name))
                    .map(|(_, flag)| *flag)
            }

            /// Iterates over the named, non-zero flags fully contained in `self`.
            pub fn iter_names(&self) -> impl Iterator<Item = (&'static str, Self)> + '_ {
                Self::NAMED
                    .iter()
                    .filter(move |(_, flag)| flag.bits != 0 && self.contains(*flag))
                    .copied()
            }
        }

        impl core::ops::BitOr for $name {
            type Output = Self;
            fn bitor(self, other: Self) -> Self {
                Self { bits: self.bits | other.bits }
            }
        }

        impl core::ops::BitAnd for $name {
            type Output = Self;
            fn bitand(self, other: Self) -> Self {
                Self { bits: self.bits & other.bits }
            }
        }

        impl core::ops::Not for $name {
            type Output = Self;
            fn not(self) -> Self {
                Self { bits: !self.bits }
            }
        }

        impl core::ops::BitOrAssign for $name {
            fn bitor_assign(&mut self, other: Self) {
                self.bits |= other.bits;
            }
        }

        impl core::ops::BitAndAssign for $name {
            fn bitand_assign(&mut self, other: Self) {
                self.bits &= other.bits;
            }
        }

        impl core::fmt::Debug for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                let mut remaining = self.bits;
                let mut first = true;

                write!(f, "{} {{ ", stringify!($name))?;
                for (flag_name, flag) in Self::NAMED {
                    // Composite constants are skipped once their parts are printed.
                    if flag.bits != 0 && (remaining & flag.bits) == flag.bits {
                        if !first {
                            write!(f, " | ")?;
                        }
                        write!(f, "{flag_name}")?;
                        remaining &= !flag.bits;
                        first = false;
                    }
                }
                if remaining != 0 {
                    if !first {
                        write!(f, " | ")?;
                    }
                    write!(f, "UNKNOWN({:#x})", remaining)?;
                    first = false;
                }
                if first {
                    write!(f, "EMPTY")?;
                }
                write!(f, " }}")
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::prism_bitflags;

    prism_bitflags! {
        /// Flags used to exercise the macro.
        pub struct Channels: u32 {
            const RED = 1 << 0;
            const GREEN = 1 << 1;
            const BLUE = 1 << 2;
            const RGB = 0b111;
            const ALPHA = 1 << 8;
        }
    }

    #[test]
    fn empty_set_debug_and_default() {
        assert!(Channels::default().is_empty());
        assert_eq!(format!("{:?}", Channels::EMPTY), "Channels { EMPTY }");
    }

    #[test]
    fn debug_lists_flags_and_unknown_bits() {
        let flags = Channels::RED | Channels::GREEN;
        assert_eq!(format!("{flags:?}"), "Channels { RED | GREEN }");
        assert_eq!(
            format!("{:?}", Channels::from_bits_truncate(0x1000 | 0x1)),
            "Channels { RED | UNKNOWN(0x1000) }"
        );
    }

    #[test]
    fn contains_and_intersects() {
        let flags = Channels::RGB;
        assert!(flags.contains(Channels::RED | Channels::BLUE));
        assert!(!flags.contains(Channels::ALPHA));
        assert!(flags.intersects(Channels::BLUE | Channels::ALPHA));
        assert!(!flags.intersects(Channels::EMPTY));
    }

    #[test]
    fn set_insert_remove() {
        let mut flags = Channels::RED;
        flags.set(Channels::ALPHA, true);
        flags.insert(Channels::GREEN);
        flags.remove(Channels::RED);
        assert_eq!(flags, Channels::GREEN | Channels::ALPHA);
        flags.set(Channels::ALPHA, false);
        assert_eq!(flags, Channels::GREEN);
        assert_eq!(flags.with(Channels::BLUE).without(Channels::GREEN), Channels::BLUE);
    }

    #[test]
    fn from_name_ignores_case() {
        assert_eq!(Channels::from_name("alpha"), Some(Channels::ALPHA));
        assert_eq!(Channels::from_name("Rgb"), Some(Channels::RGB));
        assert_eq!(Channels::from_name("depth"), None);
    }

    #[test]
    fn iter_names_lists_contained_flags() {
        let names: Vec<_> = (Channels::RED | Channels::ALPHA)
            .iter_names()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["RED", "ALPHA"]);
    }
}
