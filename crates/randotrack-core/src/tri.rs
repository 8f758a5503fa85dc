//! Three-valued (Kleene) logic.
//!
//! Rules evaluated against the live engine always produce a definite answer.
//! Rules evaluated against a frozen [`WorldSnapshot`](crate::query::WorldSnapshot)
//! may not have enough information, in which case the answer is
//! [`Tri::Unknown`]. Composite operators propagate `Unknown` conservatively:
//! a definite `False` dominates `and`, a definite `True` dominates `or`, and
//! `Unknown` is never coerced to a definite value.

use serde::{Deserialize, Serialize};
use std::ops::{BitAnd, BitOr, Not};

/// A truth value that may be unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tri {
    True,
    False,
    Unknown,
}

impl Tri {
    /// Kleene conjunction.
    pub fn and(self, other: Tri) -> Tri {
        match (self, other) {
            (Tri::False, _) | (_, Tri::False) => Tri::False,
            (Tri::True, Tri::True) => Tri::True,
            _ => Tri::Unknown,
        }
    }

    /// Kleene disjunction.
    pub fn or(self, other: Tri) -> Tri {
        match (self, other) {
            (Tri::True, _) | (_, Tri::True) => Tri::True,
            (Tri::False, Tri::False) => Tri::False,
            _ => Tri::Unknown,
        }
    }

    /// Kleene negation. `Unknown` stays `Unknown`.
    pub fn negate(self) -> Tri {
        match self {
            Tri::True => Tri::False,
            Tri::False => Tri::True,
            Tri::Unknown => Tri::Unknown,
        }
    }

    /// Conjunction over a lazily evaluated sequence. Stops at the first
    /// definite `False`; an empty sequence is `True`.
    pub fn all<I>(values: I) -> Tri
    where
        I: IntoIterator<Item = Tri>,
    {
        let mut acc = Tri::True;
        for value in values {
            match value {
                Tri::False => return Tri::False,
                Tri::Unknown => acc = Tri::Unknown,
                Tri::True => {}
            }
        }
        acc
    }

    /// Disjunction over a lazily evaluated sequence. Stops at the first
    /// definite `True`; an empty sequence is `False`.
    pub fn any<I>(values: I) -> Tri
    where
        I: IntoIterator<Item = Tri>,
    {
        let mut acc = Tri::False;
        for value in values {
            match value {
                Tri::True => return Tri::True,
                Tri::Unknown => acc = Tri::Unknown,
                Tri::False => {}
            }
        }
        acc
    }

    pub fn is_true(self) -> bool {
        self == Tri::True
    }

    pub fn is_unknown(self) -> bool {
        self == Tri::Unknown
    }

    /// `Some(bool)` when definite, `None` when unknown.
    pub fn definite(self) -> Option<bool> {
        match self {
            Tri::True => Some(true),
            Tri::False => Some(false),
            Tri::Unknown => None,
        }
    }
}

impl From<bool> for Tri {
    fn from(value: bool) -> Self {
        if value { Tri::True } else { Tri::False }
    }
}

impl From<Option<bool>> for Tri {
    fn from(value: Option<bool>) -> Self {
        value.map_or(Tri::Unknown, Tri::from)
    }
}

impl BitAnd for Tri {
    type Output = Tri;

    fn bitand(self, rhs: Tri) -> Tri {
        self.and(rhs)
    }
}

impl BitOr for Tri {
    type Output = Tri;

    fn bitor(self, rhs: Tri) -> Tri {
        self.or(rhs)
    }
}

impl Not for Tri {
    type Output = Tri;

    fn not(self) -> Tri {
        self.negate()
    }
}
