#![forbid(unsafe_code)]

//! The required unlock alphabet and the discovery set built over it.
//!
//! The unlock code is the four letters `m`, `i`, `d`, `a`. Tokens carry a
//! free-form label in markup; [`Letter::parse`] decides whether a label names
//! one of the required letters. [`Discovered`] is a bitset over those four
//! letters, so its size is bounded by construction.

use bitflags::bitflags;

/// One letter of the required unlock code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Letter {
    M,
    I,
    D,
    A,
}

impl Letter {
    /// The full required alphabet, in code order.
    pub const REQUIRED: [Letter; 4] = [Letter::M, Letter::I, Letter::D, Letter::A];

    /// Parse a token label.
    ///
    /// The label is lowercased first. Only a single required character is
    /// accepted; empty labels, other characters, and multi-character labels
    /// yield `None`.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        let mut chars = label.chars().flat_map(char::to_lowercase);
        let first = chars.next()?;
        if chars.next().is_some() {
            return None;
        }
        match first {
            'm' => Some(Self::M),
            'i' => Some(Self::I),
            'd' => Some(Self::D),
            'a' => Some(Self::A),
            _ => None,
        }
    }

    /// Lowercase character for this letter.
    #[must_use]
    pub const fn as_char(self) -> char {
        match self {
            Self::M => 'm',
            Self::I => 'i',
            Self::D => 'd',
            Self::A => 'a',
        }
    }

    const fn flag(self) -> Discovered {
        match self {
            Self::M => Discovered::M,
            Self::I => Discovered::I,
            Self::D => Discovered::D,
            Self::A => Discovered::A,
        }
    }
}

impl core::fmt::Display for Letter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

bitflags! {
    /// Set of required letters currently toggled "found".
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Discovered: u8 {
        const M = 0b0001;
        const I = 0b0010;
        const D = 0b0100;
        const A = 0b1000;
    }
}

/// Result of [`Discovered::flip`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    /// The letter was absent and is now discovered.
    Added,
    /// The letter was discovered and has been removed.
    Removed,
}

impl Discovered {
    /// Number of discovered letters, always in `[0, 4]`.
    #[must_use]
    pub const fn len(self) -> usize {
        self.bits().count_ones() as usize
    }

    /// Whether every required letter is discovered.
    #[must_use]
    pub fn is_complete(self) -> bool {
        self == Self::all()
    }

    #[must_use]
    pub const fn has(self, letter: Letter) -> bool {
        self.contains(letter.flag())
    }

    /// Flip membership of `letter`.
    pub fn flip(&mut self, letter: Letter) -> Toggle {
        let flag = letter.flag();
        if self.contains(flag) {
            self.remove(flag);
            Toggle::Removed
        } else {
            self.insert(flag);
            Toggle::Added
        }
    }

    /// Discovered letters in code order.
    pub fn letters(self) -> impl Iterator<Item = Letter> {
        Letter::REQUIRED
            .into_iter()
            .filter(move |letter| self.has(*letter))
    }
}
