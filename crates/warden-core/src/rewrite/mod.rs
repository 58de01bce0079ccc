//! Response body rewriting (§4.6-§4.8): content-encoding/charset decode,
//! streaming HTML splice injection, and the bounded-channel pipe that lets
//! a producer thread and a rewriting consumer thread overlap without an
//! async runtime.

pub mod compress;
pub mod html;
pub mod pipe;
