//! Blocking policy backed by an EasyList-syntax filter list.
//!
//! Uses the `adblock` engine to answer the two questions the simulated
//! environment asks: would a cosmetic rule hide this element, and would a
//! network rule block this request. Useful for checking that bait markup still
//! trips the lists real blockers ship.

use crate::environment::BaitElement;
use crate::simulated::BlockingPolicy;
use adblock::{request::Request, Engine, FilterSet};
use std::collections::HashSet;
use std::sync::Mutex;

/// Page URL used as the request source when none is configured.
const DEFAULT_SOURCE_URL: &str = "https://example.com/";

/// [`BlockingPolicy`] evaluated by the `adblock` engine.
pub struct FilterListPolicy {
    engine: Mutex<Engine>,
    source_url: String,
    rule_count: usize,
}

impl FilterListPolicy {
    /// Compile filter rules, one per entry.
    pub fn from_rules<I, S>(rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let rules: Vec<String> = rules
            .into_iter()
            .map(|r| r.as_ref().trim().to_string())
            .filter(|r| !r.is_empty() && !r.starts_with('!'))
            .collect();

        let mut filter_set = FilterSet::new(true);
        filter_set.add_filters(&rules, Default::default());
        let engine = Engine::from_filter_set(filter_set, true);

        tracing::debug!(rules = rules.len(), "compiled filter list");

        Self {
            engine: Mutex::new(engine),
            source_url: DEFAULT_SOURCE_URL.to_string(),
            rule_count: rules.len(),
        }
    }

    /// Compile a filter list file's contents.
    #[must_use]
    pub fn from_list(contents: &str) -> Self {
        Self::from_rules(contents.lines())
    }

    /// Page URL requests are attributed to.
    #[must_use]
    pub fn with_source_url(mut self, source_url: impl Into<String>) -> Self {
        self.source_url = source_url.into();
        self
    }

    /// Number of rules handed to the engine (comments and blanks excluded).
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.rule_count
    }
}

impl BlockingPolicy for FilterListPolicy {
    fn hides(&self, element: &BaitElement) -> bool {
        let Ok(engine) = self.engine.lock() else {
            return false;
        };
        let ids = [element.id.as_str()];
        !engine
            .hidden_class_id_selectors(&element.classes, ids, &HashSet::new())
            .is_empty()
    }

    fn blocks_request(&self, url: &str) -> bool {
        let Ok(request) = Request::new(url, &self.source_url, "script") else {
            return false;
        };
        self.engine
            .lock()
            .map(|engine| engine.check_network_request(&request).matched)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIST: &str = "\
! Title: test list
##.adsbox
##.pub_300x250
||pagead2.googlesyndication.com^
";

    #[test]
    fn test_comments_are_skipped() {
        let policy = FilterListPolicy::from_list(LIST);
        assert_eq!(policy.rule_count(), 3);
    }

    #[test]
    fn test_cosmetic_rules_hide_bait() {
        let policy = FilterListPolicy::from_list(LIST);
        let bait = BaitElement::new("div", "bait-1").classes(["adsbox", "ads"]);
        assert!(policy.hides(&bait));

        let plain = BaitElement::new("div", "content-1").class("article-body");
        assert!(!policy.hides(&plain));
    }

    #[test]
    fn test_network_rules_block_ad_script() {
        let policy = FilterListPolicy::from_list(LIST);
        assert!(policy.blocks_request(
            "https://pagead2.googlesyndication.com/pagead/js/adsbygoogle.js"
        ));
        assert!(!policy.blocks_request("https://cdn.example.com/app.js"));
        assert!(!policy.blocks_request("not a url"));
    }
}
