//! License condition algebra — the fixed condition vocabulary and its bitset
//!
//! Every metadata record declares a handful of license conditions
//! (`notice`, `restricted`, `proprietary`, ...). Resolution only ever
//! combines, filters and compares them, so a condition is a bit position
//! and a [`ConditionSet`] is a 16-bit mask. Bit positions are stable API:
//! they define the canonical list order and must never be renumbered.
//!
//! The `IMPLIES_*` constants are the policy-defined predicate groups used
//! to select conditions by meaning rather than by name.

pub mod classifier;

pub use classifier::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ─── Conditions ─────────────────────────────────────────────────────

/// A single license condition. The discriminant is its bit in a [`ConditionSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u16)]
pub enum LicenseCondition {
    /// Public domain or equivalent; nothing owed
    Unencumbered = 0x0001,
    /// Permissive with no notice requirement
    Permissive = 0x0002,
    /// Attribution / notice must accompany distribution
    Notice = 0x0004,
    /// Modified files of the licensed work must be shared (MPL-style)
    Reciprocal = 0x0008,
    /// The whole derived work must be shared (GPL-style)
    Restricted = 0x0010,
    /// Restricted, but linking from independent modules is excepted
    RestrictedWithClasspathException = 0x0020,
    /// Restricted, but dynamic linking does not propagate (LGPL-style)
    RestrictedAllowsDynamicLinking = 0x0040,
    /// Source must not be shared
    Proprietary = 0x0080,
    /// Usable only with an explicit exception
    ByExceptionOnly = 0x0100,
    /// Must not be used at all
    NotAllowed = 0x0200,
}

/// All conditions in canonical (bit-ascending) order.
pub const ALL_CONDITIONS: [LicenseCondition; 10] = [
    LicenseCondition::Unencumbered,
    LicenseCondition::Permissive,
    LicenseCondition::Notice,
    LicenseCondition::Reciprocal,
    LicenseCondition::Restricted,
    LicenseCondition::RestrictedWithClasspathException,
    LicenseCondition::RestrictedAllowsDynamicLinking,
    LicenseCondition::Proprietary,
    LicenseCondition::ByExceptionOnly,
    LicenseCondition::NotAllowed,
];

/// Mask covering every recognized condition bit.
pub const LICENSE_CONDITION_MASK: u16 = 0x3ff;

impl LicenseCondition {
    /// The condition's bit.
    pub const fn bit(self) -> u16 {
        self as u16
    }

    /// The metadata spelling of the condition.
    pub fn name(self) -> &'static str {
        match self {
            Self::Unencumbered => "unencumbered",
            Self::Permissive => "permissive",
            Self::Notice => "notice",
            Self::Reciprocal => "reciprocal",
            Self::Restricted => "restricted",
            Self::RestrictedWithClasspathException => "restricted_with_classpath_exception",
            Self::RestrictedAllowsDynamicLinking => "restricted_allows_dynamic_linking",
            Self::Proprietary => "proprietary",
            Self::ByExceptionOnly => "by_exception_only",
            Self::NotAllowed => "not_allowed",
        }
    }

    /// Look up a condition by its metadata spelling.
    pub fn from_name(name: &str) -> Option<Self> {
        ALL_CONDITIONS.iter().copied().find(|c| c.name() == name)
    }

    /// Look up a condition by its single bit.
    pub fn from_bit(bit: u16) -> Option<Self> {
        ALL_CONDITIONS.iter().copied().find(|c| c.bit() == bit)
    }
}

impl fmt::Display for LicenseCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ─── Condition Sets ─────────────────────────────────────────────────

/// A set of license conditions stored as a bitmask.
///
/// Ordering is by the raw mask, which is what resolution actions sort by
/// after their target name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConditionSet(u16);

impl ConditionSet {
    /// The empty set.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Build a set from its conditions.
    pub const fn of(conditions: &[LicenseCondition]) -> Self {
        let mut bits = 0u16;
        let mut i = 0;
        while i < conditions.len() {
            bits |= conditions[i] as u16;
            i += 1;
        }
        Self(bits)
    }

    /// Build a set from raw bits. Bits outside the vocabulary are kept, so
    /// that asking for their names fails loudly instead of silently.
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Copy of the set with `conditions` added.
    pub fn plus(self, conditions: &[LicenseCondition]) -> Self {
        self.union(Self::of(conditions))
    }

    /// Copy of the set with `conditions` removed.
    pub fn minus(self, conditions: &[LicenseCondition]) -> Self {
        self.difference(Self::of(conditions))
    }

    pub fn insert(&mut self, condition: LicenseCondition) {
        self.0 |= condition.bit();
    }

    /// Remove `condition`, which must be present.
    pub fn remove(&mut self, condition: LicenseCondition) {
        assert!(
            self.contains(condition),
            "cannot remove condition {} not present in {}",
            condition,
            self
        );
        self.0 &= !condition.bit();
    }

    pub const fn contains(self, condition: LicenseCondition) -> bool {
        self.0 & (condition as u16) != 0
    }

    /// True when every condition of `other` is in this set.
    pub const fn contains_all(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn has_any(self, conditions: &[LicenseCondition]) -> bool {
        !self.matching_any(conditions).is_empty()
    }

    /// The subset of this set limited to `conditions`.
    pub fn matching_any(self, conditions: &[LicenseCondition]) -> Self {
        self.intersection(Self::of(conditions))
    }

    /// True when at least one of `sets` shares a condition with this set.
    pub fn matches_any_set(self, sets: &[ConditionSet]) -> bool {
        sets.iter().any(|s| !self.intersection(*s).is_empty())
    }

    /// The subset of this set whose conditions appear in any of `sets`.
    pub fn matching_any_set(self, sets: &[ConditionSet]) -> Self {
        let universe = sets.iter().fold(Self::empty(), |acc, s| acc.union(*s));
        self.intersection(universe)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// The conditions in canonical (bit-ascending) order.
    pub fn as_list(self) -> Vec<LicenseCondition> {
        self.iter().collect()
    }

    /// Iterate the conditions in canonical order.
    ///
    /// Panics on a bit outside the vocabulary.
    pub fn iter(self) -> impl Iterator<Item = LicenseCondition> {
        (0..16u16).filter_map(move |shift| {
            let bit = 1u16 << shift;
            if self.0 & bit == 0 {
                return None;
            }
            match LicenseCondition::from_bit(bit) {
                Some(c) => Some(c),
                None => panic!("unrecognized license condition bit {:#06x}", bit),
            }
        })
    }

    /// Condition names in canonical order, for diagnostics and output.
    pub fn names(self) -> Vec<&'static str> {
        self.iter().map(LicenseCondition::name).collect()
    }
}

impl From<LicenseCondition> for ConditionSet {
    fn from(c: LicenseCondition) -> Self {
        Self(c.bit())
    }
}

impl FromIterator<LicenseCondition> for ConditionSet {
    fn from_iter<I: IntoIterator<Item = LicenseCondition>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), |acc, c| acc.plus(&[c]))
    }
}

impl std::ops::BitOr for ConditionSet {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl std::ops::BitOrAssign for ConditionSet {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl std::ops::BitAnd for ConditionSet {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        self.intersection(rhs)
    }
}

impl std::ops::Sub for ConditionSet {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        self.difference(rhs)
    }
}

impl fmt::Display for ConditionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.names().join(", "))
    }
}

// ─── Predicate Groups ───────────────────────────────────────────────

use LicenseCondition::*;

pub const IMPLIES_UNENCUMBERED: ConditionSet = ConditionSet::of(&[Unencumbered]);

pub const IMPLIES_PERMISSIVE: ConditionSet = ConditionSet::of(&[Permissive]);

/// Every condition that still requires shipping a notice.
pub const IMPLIES_NOTICE: ConditionSet = ConditionSet::of(&[
    Unencumbered,
    Permissive,
    Notice,
    Reciprocal,
    Restricted,
    RestrictedWithClasspathException,
    RestrictedAllowsDynamicLinking,
    Proprietary,
    ByExceptionOnly,
]);

pub const IMPLIES_RECIPROCAL: ConditionSet = ConditionSet::of(&[Reciprocal]);

/// The three restricted variants.
pub const IMPLIES_RESTRICTED: ConditionSet = ConditionSet::of(&[
    Restricted,
    RestrictedWithClasspathException,
    RestrictedAllowsDynamicLinking,
]);

/// Conditions requiring some source to be shared.
pub const IMPLIES_SHARED: ConditionSet = IMPLIES_RESTRICTED.union(IMPLIES_RECIPROCAL);

pub const IMPLIES_PROPRIETARY: ConditionSet = ConditionSet::of(&[Proprietary]);

/// Conditions requiring source to stay private.
pub const IMPLIES_PRIVATE: ConditionSet = ConditionSet::of(&[Proprietary]);

pub const IMPLIES_BY_EXCEPTION_ONLY: ConditionSet = ConditionSet::of(&[Proprietary, ByExceptionOnly]);

#[cfg(test)]
mod tests {
    use super::*;
    use LicenseCondition::*;

    fn every_subset() -> impl Iterator<Item = ConditionSet> {
        (0..=LICENSE_CONDITION_MASK).map(ConditionSet::from_bits)
    }

    #[test]
    fn test_bits_match_vocabulary() {
        assert_eq!(LicenseCondition::Unencumbered.bit(), 0x0001);
        assert_eq!(LicenseCondition::Restricted.bit(), 0x0010);
        assert_eq!(LicenseCondition::RestrictedAllowsDynamicLinking.bit(), 0x0040);
        assert_eq!(LicenseCondition::NotAllowed.bit(), 0x0200);
        let all: ConditionSet = ALL_CONDITIONS.iter().copied().collect();
        assert_eq!(all.bits(), LICENSE_CONDITION_MASK);
    }

    #[test]
    fn test_single_bit_names_round_trip() {
        for c in ALL_CONDITIONS {
            assert_eq!(ConditionSet::from(c).names(), vec![c.name()]);
            assert_eq!(LicenseCondition::from_name(c.name()), Some(c));
        }
        assert_eq!(LicenseCondition::from_name("gpl"), None);
    }

    #[test]
    fn test_set_operations_idempotent() {
        for a in every_subset() {
            assert_eq!(a | a, a);
            assert_eq!(a & a, a);
            assert!((a - a).is_empty());
        }
    }

    #[test]
    fn test_canonical_order() {
        let cs = ConditionSet::of(&[Proprietary, Notice, Restricted]);
        assert_eq!(cs.names(), vec!["notice", "restricted", "proprietary"]);
        assert_eq!(cs.to_string(), "{notice, restricted, proprietary}");
        assert_eq!(cs.count(), 3);
    }

    #[test]
    fn test_matching() {
        let cs = ConditionSet::of(&[Notice, RestrictedAllowsDynamicLinking]);
        assert!(cs.has_any(&[Restricted, RestrictedAllowsDynamicLinking]));
        assert!(!cs.has_any(&[Proprietary]));
        assert_eq!(cs.matching_any(&[Notice, Proprietary]), ConditionSet::of(&[Notice]));
        assert!(cs.matches_any_set(&[IMPLIES_PRIVATE, IMPLIES_RESTRICTED]));
        assert!(!cs.matches_any_set(&[IMPLIES_PRIVATE]));
        assert_eq!(
            cs.matching_any_set(&[IMPLIES_SHARED]),
            ConditionSet::of(&[RestrictedAllowsDynamicLinking])
        );
    }

    #[test]
    fn test_plus_minus() {
        let cs = ConditionSet::empty().plus(&[Notice, Reciprocal]);
        assert_eq!(cs.minus(&[Notice]), ConditionSet::of(&[Reciprocal]));
        assert_eq!(cs.minus(&[Proprietary]), cs);
    }

    #[test]
    #[should_panic(expected = "cannot remove condition")]
    fn test_remove_absent_condition_panics() {
        let mut cs = ConditionSet::of(&[Notice]);
        cs.remove(Restricted);
    }

    #[test]
    #[should_panic(expected = "unrecognized license condition bit")]
    fn test_unknown_bit_cannot_be_named() {
        ConditionSet::from_bits(0x0400).names();
    }

    #[test]
    fn test_predicate_groups() {
        assert!(!IMPLIES_NOTICE.contains(NotAllowed));
        assert_eq!(IMPLIES_NOTICE.count(), 9);
        assert_eq!(IMPLIES_SHARED.count(), 4);
        assert_eq!(IMPLIES_BY_EXCEPTION_ONLY, ConditionSet::of(&[Proprietary, ByExceptionOnly]));
    }
}
