//! Identifiers, change flags and assignment results shared across the engine.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

/// Identity of a field within one manager; keys memo tables.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldId(pub u64);

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Bit set describing how a managed field changed since the last message.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeFlags(u32);

impl ChangeFlags {
    pub const NONE: ChangeFlags = ChangeFlags(0);
    pub const ADD: ChangeFlags = ChangeFlags(1);
    pub const REMOVE: ChangeFlags = ChangeFlags(2);
    pub const IDENTIFIER: ChangeFlags = ChangeFlags(4);
    pub const DEFINITION: ChangeFlags = ChangeFlags(8);
    pub const FULL_RESULT: ChangeFlags = ChangeFlags(16);
    pub const PARTIAL_RESULT: ChangeFlags = ChangeFlags(32);

    /// Definition changed, which always changes every result.
    pub const OBJECT_NOT_IDENTIFIER: ChangeFlags =
        ChangeFlags(Self::DEFINITION.0 | Self::FULL_RESULT.0);
    pub const RESULT: ChangeFlags = ChangeFlags(Self::FULL_RESULT.0 | Self::PARTIAL_RESULT.0);

    const NAMES: [(ChangeFlags, &'static str); 6] = [
        (Self::ADD, "ADD"),
        (Self::REMOVE, "REMOVE"),
        (Self::IDENTIFIER, "IDENTIFIER"),
        (Self::DEFINITION, "DEFINITION"),
        (Self::FULL_RESULT, "FULL_RESULT"),
        (Self::PARTIAL_RESULT, "PARTIAL_RESULT"),
    ];

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// All bits of `other` are set.
    #[inline]
    pub fn contains(self, other: ChangeFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Any bit of `other` is set.
    #[inline]
    pub fn intersects(self, other: ChangeFlags) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for ChangeFlags {
    type Output = ChangeFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        ChangeFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for ChangeFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for ChangeFlags {
    type Output = ChangeFlags;

    fn bitand(self, rhs: Self) -> Self::Output {
        ChangeFlags(self.0 & rhs.0)
    }
}

impl fmt::Display for ChangeFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("NONE");
        }
        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        f.write_str(&names.join("|"))
    }
}

/// Outcome of a successful assignment. Failure is reported as an error.
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AssignmentResult {
    AllValuesSet,
    PartialValuesSet,
}

impl AssignmentResult {
    /// Combine results from several sources; the worst one wins.
    #[inline]
    pub fn worst(self, other: AssignmentResult) -> AssignmentResult {
        self.max(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_flags_cover_their_parts() {
        assert!(ChangeFlags::OBJECT_NOT_IDENTIFIER.contains(ChangeFlags::DEFINITION));
        assert!(ChangeFlags::OBJECT_NOT_IDENTIFIER.contains(ChangeFlags::FULL_RESULT));
        assert!(!ChangeFlags::OBJECT_NOT_IDENTIFIER.intersects(ChangeFlags::IDENTIFIER));
        assert!(ChangeFlags::RESULT.intersects(ChangeFlags::PARTIAL_RESULT));
    }

    #[test]
    fn flags_display_as_names() {
        let flags = ChangeFlags::ADD | ChangeFlags::FULL_RESULT;
        assert_eq!(flags.to_string(), "ADD|FULL_RESULT");
        assert_eq!(ChangeFlags::NONE.to_string(), "NONE");
    }

    #[test]
    fn worst_assignment_result_wins() {
        use AssignmentResult::*;
        assert_eq!(AllValuesSet.worst(PartialValuesSet), PartialValuesSet);
        assert_eq!(PartialValuesSet.worst(AllValuesSet), PartialValuesSet);
        assert_eq!(AllValuesSet.worst(AllValuesSet), AllValuesSet);
    }
}
