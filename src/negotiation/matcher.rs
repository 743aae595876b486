// Copyright (c) 2026 Hopwire
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! How a registered protocol id is compared with a proposal.

use std::fmt;
use std::sync::Arc;

use semver::{Version, VersionReq};

/// Custom predicate: `(registered, proposal) -> matches`.
pub type MatchFn = dyn Fn(&str, &str) -> bool + Send + Sync;

/// Protocol matcher.
#[derive(Clone, Default)]
pub enum Matcher {
    /// Byte-for-byte equality.
    #[default]
    Exact,
    /// `name/version` where the proposal carries a version or a range.
    Semver,
    /// Caller-supplied predicate.
    Custom(Arc<MatchFn>),
}

impl Matcher {
    /// Wrap a closure.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&str, &str) -> bool + Send + Sync + 'static,
    {
        Matcher::Custom(Arc::new(f))
    }

    /// Does `proposal` select the handler registered as `registered`?
    pub fn matches(&self, registered: &str, proposal: &str) -> bool {
        match self {
            Matcher::Exact => registered == proposal,
            Matcher::Semver => semver_match(registered, proposal),
            Matcher::Custom(f) => f(registered, proposal),
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Exact => f.write_str("Exact"),
            Matcher::Semver => f.write_str("Semver"),
            Matcher::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

fn split_version(id: &str) -> Option<(&str, &str)> {
    let i = id.rfind('/')?;
    Some((&id[..i], &id[i + 1..]))
}

/// Semver protocol matching.
///
/// Both ids are `name/version`. Names must be equal. A bare version in the
/// proposal (`/proto/1.0.0`) only selects that exact registered version; any
/// other version text (`/proto/^1.0.0`, `/proto/>=1.2, <2`) is a range the
/// registered version must satisfy.
pub fn semver_match(registered: &str, proposal: &str) -> bool {
    let (Some((reg_name, reg_ver)), Some((prop_name, prop_ver))) =
        (split_version(registered), split_version(proposal))
    else {
        return false;
    };
    if reg_name != prop_name {
        return false;
    }
    let Ok(have) = Version::parse(reg_ver) else {
        return false;
    };
    if let Ok(want) = Version::parse(prop_ver) {
        return have == want;
    }
    VersionReq::parse(prop_ver).map(|req| req.matches(&have)).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_version_is_exact() {
        assert!(semver_match("/monkey/1.0.0", "/monkey/1.0.0"));
        assert!(!semver_match("/monkey/1.1.0", "/monkey/2.0.0"));
        assert!(!semver_match("/monkey/1.2.0", "/monkey/1.0.0"));
    }

    #[test]
    fn range_proposal() {
        assert!(semver_match("/proto/1.2.0", "/proto/^1.0.0"));
        assert!(semver_match("/proto/1.2.0", "/proto/>=1.2, <2"));
        assert!(!semver_match("/proto/2.0.0", "/proto/^1.0.0"));
        assert!(!semver_match("/other/1.2.0", "/proto/^1.0.0"));
    }

    #[test]
    fn custom_matcher() {
        let m = Matcher::custom(|_, p| p.starts_with("/any"));
        assert!(m.matches("/x", "/anything"));
        assert!(!m.matches("/x", "/x"));
    }
}
