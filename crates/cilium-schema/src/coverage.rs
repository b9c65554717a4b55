//! Label coverage predicates.
//!
//! A `Coverage` maps exact label keys to unanchored regex patterns over the
//! label value. It covers a label set when at least one pair matches. Patterns
//! are compiled on first use and the compiled set is shared by every clone, so
//! policies held by `MemoryStore` compile once per process. Decoded copies
//! start uncompiled. A pattern that fails to compile never matches.

use crate::Labels;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, OnceLock};

type Patterns = Vec<(String, Option<Regex>)>;

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Coverage {
    #[serde(default)]
    labels: Labels,
    #[serde(skip)]
    compiled: Arc<OnceLock<Patterns>>,
}

impl Coverage {
    pub fn new(labels: Labels) -> Self {
        Self {
            labels,
            compiled: Arc::default(),
        }
    }

    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    fn patterns(&self) -> &[(String, Option<Regex>)] {
        self.compiled.get_or_init(|| {
            self.labels
                .iter()
                .map(|(key, pattern)| (key.clone(), Regex::new(pattern).ok()))
                .collect()
        })
    }

    /// Returns true when some coverage key equals a label key and its pattern
    /// matches that label's value.
    pub fn covers(&self, labels: &Labels) -> bool {
        if labels.is_empty() {
            return false;
        }
        self.patterns().iter().any(|(key, regex)| {
            let Some(regex) = regex else {
                return false;
            };
            labels.get(key).is_some_and(|value| regex.is_match(value))
        })
    }
}

impl PartialEq for Coverage {
    fn eq(&self, other: &Self) -> bool {
        self.labels == other.labels
    }
}

impl Eq for Coverage {}

impl fmt::Debug for Coverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coverage")
            .field("labels", &self.labels)
            .finish()
    }
}

impl FromIterator<(String, String)> for Coverage {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> Labels {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    fn coverage(pairs: &[(&str, &str)]) -> Coverage {
        Coverage::new(labels(pairs))
    }

    #[test]
    fn exact_key_and_value_matches() {
        let c = coverage(&[("com.intent.service", "svc_dns")]);
        assert!(c.covers(&labels(&[("com.intent.service", "svc_dns")])));
    }

    #[test]
    fn value_pattern_is_unanchored() {
        let c = coverage(&[("com.intent.service", "svc_dns")]);
        assert!(c.covers(&labels(&[("com.intent.service", "foo_svc_dns_bar")])));
    }

    #[test]
    fn keys_are_not_regex_matched() {
        let c = coverage(&[("com.intent.*", ".*")]);
        assert!(!c.covers(&labels(&[("com.intent.service", "svc_dns")])));
    }

    #[test]
    fn any_single_pair_is_enough() {
        let c = coverage(&[("a", "^1$"), ("b", "^2$")]);
        assert!(c.covers(&labels(&[("b", "2"), ("c", "3")])));
        assert!(!c.covers(&labels(&[("a", "2"), ("b", "1")])));
    }

    #[test]
    fn empty_sides_never_match() {
        assert!(!Coverage::default().covers(&labels(&[("a", "1")])));
        assert!(!coverage(&[("a", ".*")]).covers(&Labels::new()));
    }

    #[test]
    fn malformed_regex_never_matches() {
        let c = coverage(&[("a", "(unclosed"), ("b", "ok")]);
        assert!(!c.covers(&labels(&[("a", "(unclosed")])));
        assert!(c.covers(&labels(&[("b", "ok")])));
    }

    #[test]
    fn repeated_calls_agree() {
        let c = coverage(&[("com.docker.swarm.id", "123456")]);
        let l = labels(&[("com.docker.swarm.id", "123456")]);
        let first = c.covers(&l);
        for _ in 0..5 {
            assert_eq!(c.covers(&l), first);
        }
    }

    #[test]
    fn deserializes_from_labels_key() {
        let c: Coverage = serde_json::from_str(r#"{"labels":{"app":"web.*"}}"#).unwrap();
        assert!(c.covers(&labels(&[("app", "web-1")])));
        assert_eq!(c.clone(), c);
    }

    #[test]
    fn clones_share_compiled_patterns() {
        let c = coverage(&[("app", "web")]);
        assert!(c.covers(&labels(&[("app", "web")])));
        let copy = c.clone();
        assert!(Arc::ptr_eq(&c.compiled, &copy.compiled));
        assert!(copy.compiled.get().is_some());

        let decoded: Coverage = serde_json::from_str(&serde_json::to_string(&c).unwrap()).unwrap();
        assert!(decoded.compiled.get().is_none());
    }
}
