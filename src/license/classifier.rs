//! Condition-name classifier
//!
//! Turns the condition names written in a metadata record into a
//! [`ConditionSet`]. Every name maps directly except `"restricted"`, which
//! is refined against the record's license kinds: LGPL becomes
//! `restricted_allows_dynamic_linking`, classpath-exception kinds become
//! `restricted_with_classpath_exception`, everything else stays plain
//! `restricted`.

use super::{ConditionSet, LicenseCondition};
use once_cell::sync::Lazy;
use regex::Regex;

static LGPL_KIND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^SPDX-license-identifier-LGPL.*").expect("valid LGPL kind pattern")
});

static VERSIONED_GPL_KIND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^SPDX-license-identifier-GPL-\p{N}.*").expect("valid GPL kind pattern")
});

static GENERIC_GPL_KIND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^SPDX-license-identifier-GPL$").expect("valid generic GPL kind pattern")
});

const CLASSPATH_EXCEPTION_SUFFIX: &str = "-with-classpath-exception";

/// Build the condition set for a node with `license_kinds` declaring the
/// condition `names`. Unrecognized names are dropped.
pub fn conditions_from_names<K: AsRef<str>, N: AsRef<str>>(license_kinds: &[K], names: &[N]) -> ConditionSet {
    let mut cs = ConditionSet::empty();
    for name in names {
        let name = name.as_ref();
        if name == "restricted" {
            cs |= restricted_variants(license_kinds);
            continue;
        }
        if let Some(condition) = LicenseCondition::from_name(name) {
            cs.insert(condition);
        }
    }
    cs
}

/// Refine a bare `"restricted"` declaration by the kinds that declared it.
fn restricted_variants<K: AsRef<str>>(license_kinds: &[K]) -> ConditionSet {
    if license_kinds.is_empty() {
        return LicenseCondition::Restricted.into();
    }

    let mut cs = ConditionSet::empty();
    let mut generic_gpl = false;
    let mut saw_lgpl = false;
    let mut saw_classpath = false;

    for kind in license_kinds {
        let kind = kind.as_ref();
        if kind.ends_with(CLASSPATH_EXCEPTION_SUFFIX) {
            cs.insert(LicenseCondition::RestrictedWithClasspathException);
            saw_classpath = true;
        } else if LGPL_KIND.is_match(kind) {
            cs.insert(LicenseCondition::RestrictedAllowsDynamicLinking);
            saw_lgpl = true;
        } else if VERSIONED_GPL_KIND.is_match(kind) {
            cs.insert(LicenseCondition::Restricted);
        } else if GENERIC_GPL_KIND.is_match(kind) {
            generic_gpl = true;
        } else {
            // legacy_restricted, CC-BY-SA and unrecognized kinds
            cs.insert(LicenseCondition::Restricted);
        }
    }

    if generic_gpl && !saw_lgpl && !saw_classpath {
        cs.insert(LicenseCondition::Restricted);
    }
    cs
}
