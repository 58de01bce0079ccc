//! Warden Core Library
//!
//! The filtering core of a TLS-intercepting desktop proxy: rule storage and
//! matching, the modifier engine, response synthesis, and body rewriting.
//! The proxy front-end (connection handling, certificate generation,
//! platform integration) lives outside this crate; this crate only answers
//! "what should happen to this request/response" and does the mechanical
//! work of making it happen to an in-memory request/response value.
//!
//! # Modules
//!
//! - `token`/`tree`: pattern tokenizer and the anchor-class radix rule tree
//! - `hostmatch`: reverse-label hostname trie for cosmetic/scriptlet rules
//! - `cosmetic`: host-scoped scriptlet/JS-rule/extended-CSS/JSON-prune stores
//! - `modifiers`/`jsonprune`/`jsconst`: the `$modifier` catalog
//! - `csp`: CSP nonce injection for rewritten content
//! - `response`: block/redirect response synthesis
//! - `rewrite`: content-encoding decode, streaming HTML splice injection,
//!   and the bounded-channel pipe used to overlap read/rewrite work
//! - `endpoints`: the loopback `/allow-rule` and `/unblock` helper routes
//! - `decision`: wires everything above into `handle_request`/`handle_response`
//! - `psl`/`url`/`types`/`error`: shared utilities and type definitions

pub mod cosmetic;
pub mod csp;
pub mod decision;
pub mod endpoints;
pub mod error;
pub mod hostmatch;
pub mod jsconst;
pub mod jsonprune;
pub mod modifiers;
pub mod psl;
pub mod response;
pub mod rewrite;
pub mod token;
pub mod tree;
pub mod types;
pub mod url;

pub use decision::{handle_request, handle_response, RuleStore};
pub use error::{Result, WardenError};
pub use psl::PslEngine;
pub use types::{
    HeaderMap, HostsMap, HttpRequest, HttpResponse, ListId, ListNames, RequestContext,
    RequestOutcome, RequestType, ResponseOutcome, Rule, RuleFlags, RuleKind, RuleOrigin,
    RuleProvenance, SchemeMask,
};
