//! Warden Filter List Compiler
//!
//! Parses ABP/uBO-flavored filter lists and hosts-format block lists into a
//! `warden_core::decision::RuleStore`, ready for `handle_request`/
//! `handle_response`. No binary snapshot format — the built store lives
//! in-process for the lifetime of the proxy; see the workspace `DESIGN.md`
//! for why.

pub mod builder;
pub mod parser;

pub use builder::{ListStats, RuleSetBuilder};
pub use parser::{parse_line, HostPatternList, NetworkLine, ParsedLine};
