//! Public Suffix List (PSL) utilities for eTLD+1 extraction.
//!
//! Wraps the `publicsuffix` crate's [`List`] / [`Psl`] trait. Loading the
//! actual PSL data file is an ambient-configuration concern (out of scope
//! per the core's purpose — see crate root docs), so [`PslEngine::parse`]
//! accepts the raw PSL text from whatever loaded it, while
//! [`PslEngine::fallback`] gives callers a working (if less precise) engine
//! with no data at all, using the same two-part-TLD heuristic the engine
//! falls back to when a suffix isn't covered by the loaded list.
//!
//! # Examples
//!
//! ```
//! use warden_core::psl::PslEngine;
//!
//! let psl = PslEngine::fallback();
//! assert_eq!(psl.etld1("sub.example.com"), "example.com");
//! assert_eq!(psl.etld1("sub.example.co.uk"), "example.co.uk");
//! ```

use publicsuffix::{List, Psl};
use std::str::FromStr;

/// Common two-part TLDs used when no PSL data is loaded.
const COMMON_TWO_PART_TLDS: &[&str] = &[
    "co.uk", "co.jp", "co.nz", "co.za", "co.in", "co.kr", "com.au", "com.br", "com.cn", "com.mx",
    "com.tw", "com.hk", "net.au", "net.nz", "org.uk", "org.au", "gov.uk", "gov.au", "ac.uk",
    "ac.jp", "ne.jp", "or.jp",
];

/// eTLD+1 extraction engine.
pub enum PslEngine {
    /// Backed by a parsed Public Suffix List.
    Full(List),
    /// No PSL data loaded; uses the two-part-TLD heuristic for every host.
    Fallback,
}

impl PslEngine {
    /// Parse PSL data (the raw `public_suffix_list.dat` text).
    pub fn parse(psl_text: &str) -> Result<Self, PslError> {
        let list = List::from_str(psl_text).map_err(|e| PslError::Parse(e.to_string()))?;
        Ok(Self::Full(list))
    }

    /// An engine with no PSL data loaded, using the fallback heuristic only.
    pub fn fallback() -> Self {
        Self::Fallback
    }

    /// Compute the eTLD+1 (registrable domain) for a hostname.
    pub fn etld1(&self, host: &str) -> String {
        let host = host.trim_end_matches('.').to_ascii_lowercase();

        match self {
            PslEngine::Full(list) => match list.domain(host.as_bytes()) {
                Some(domain) => String::from_utf8_lossy(domain.as_bytes()).into_owned(),
                None => fallback_etld1(&host),
            },
            PslEngine::Fallback => fallback_etld1(&host),
        }
    }

    /// Whether two hosts share the same eTLD+1.
    pub fn is_same_site(&self, host1: &str, host2: &str) -> bool {
        self.etld1(host1) == self.etld1(host2)
    }

    /// Whether a request to `req_host` from a page on `site_host` is
    /// third-party (different eTLD+1).
    pub fn is_third_party(&self, site_host: &str, req_host: &str) -> bool {
        self.etld1(site_host) != self.etld1(req_host)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PslError {
    #[error("failed to parse public suffix list: {0}")]
    Parse(String),
}

fn fallback_etld1(host: &str) -> String {
    let labels: Vec<&str> = host.split('.').collect();
    let n = labels.len();
    if n <= 2 {
        return labels.join(".");
    }

    let last_two = format!("{}.{}", labels[n - 2], labels[n - 1]);
    if COMMON_TWO_PART_TLDS.contains(&last_two.as_str()) {
        if n >= 3 {
            return labels[n - 3..].join(".");
        }
        return last_two;
    }

    labels[n - 2..].join(".")
}

/// Strip the leftmost label of a hostname (the parent domain), if any.
pub fn get_parent_domain(host: &str) -> Option<&str> {
    match host.find('.') {
        Some(idx) if idx < host.len() - 1 => Some(&host[idx + 1..]),
        _ => None,
    }
}

/// Walks a hostname from most specific to its eTLD+1, inclusive.
pub struct HostSuffixIter<'a> {
    current: &'a str,
    etld1_len: usize,
}

impl<'a> HostSuffixIter<'a> {
    pub fn new(psl: &PslEngine, host: &'a str) -> Self {
        let etld1_len = psl.etld1(host).len();
        Self {
            current: host,
            etld1_len,
        }
    }
}

impl<'a> Iterator for HostSuffixIter<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current.len() < self.etld1_len {
            return None;
        }
        let result = self.current;
        self.current = match get_parent_domain(self.current) {
            Some(parent) if parent.len() >= self.etld1_len => parent,
            _ => "",
        };
        Some(result)
    }
}

/// Walk host suffixes from most specific label down to the eTLD+1.
pub fn walk_host_suffixes<'a>(psl: &PslEngine, host: &'a str) -> HostSuffixIter<'a> {
    HostSuffixIter::new(psl, host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_etld1_simple() {
        assert_eq!(fallback_etld1("example.com"), "example.com");
        assert_eq!(fallback_etld1("sub.example.com"), "example.com");
    }

    #[test]
    fn test_fallback_etld1_two_part() {
        assert_eq!(fallback_etld1("sub.example.co.uk"), "example.co.uk");
        assert_eq!(fallback_etld1("example.co.uk"), "example.co.uk");
    }

    #[test]
    fn test_get_parent_domain() {
        assert_eq!(get_parent_domain("sub.example.com"), Some("example.com"));
        assert_eq!(get_parent_domain("example.com"), Some("com"));
        assert_eq!(get_parent_domain("com"), None);
        assert_eq!(get_parent_domain(""), None);
    }

    #[test]
    fn test_engine_fallback_third_party() {
        let psl = PslEngine::fallback();
        assert!(!psl.is_third_party("www.example.com", "cdn.example.com"));
        assert!(psl.is_third_party("example.com", "tracker.net"));
    }

    #[test]
    fn test_walk_host_suffixes() {
        let psl = PslEngine::fallback();
        let walked: Vec<&str> = walk_host_suffixes(&psl, "a.b.example.com").collect();
        assert_eq!(walked, vec!["a.b.example.com", "b.example.com", "example.com"]);
    }
}
