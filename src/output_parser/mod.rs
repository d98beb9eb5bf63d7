//! # Reply Parser
//!
//! Extracts the structured payload a model embeds in its free-text reply.
//! The reply is expected to carry one fenced block tagged `json` holding a
//! JSON object. Fences inside `<think>` blocks ahead of it are skipped.
//!
//! | Function | Purpose |
//! |----------|---------|
//! | [`parse_json_block`] | Extract the JSON object from a ```` ```json ```` fence |
//! | [`find_fence_content`] | Locate where a fenced block's content starts |

pub mod error;
pub mod extract;
pub mod json;

pub use error::ParseError;
pub use extract::find_fence_content;
pub use json::parse_json_block;
