//! Locally persisted overrides: review links, relocations and ignored reviews.
//!
//! This is the frozen, in-memory view used for one resolution pass. Persistence lives in
//! `submirror-store`.

use crate::ids::ReviewId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overrides {
    /// Task key (id or display path) -> canonical repository subpath.
    #[serde(default)]
    pub links: BTreeMap<String, String>,

    /// Student login -> repository name.
    #[serde(default)]
    pub relocations: BTreeMap<String, String>,

    #[serde(default)]
    pub ignored: BTreeSet<ReviewId>,
}

impl Overrides {
    pub fn link(&self, key: &str) -> Option<&str> {
        self.links.get(key).map(String::as_str)
    }

    /// Effective repository name for a login.
    pub fn repository_for<'a>(&'a self, login: &'a str) -> &'a str {
        self.relocations
            .get(login)
            .map(String::as_str)
            .unwrap_or(login)
    }

    pub fn is_ignored(&self, review: &ReviewId) -> bool {
        self.ignored.contains(review)
    }
}
