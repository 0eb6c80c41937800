//! Session document store boundary
//!
//! Sessions and their utterances persist through the `SessionRepository`
//! trait, treated as an external document-style store. A JSON-file
//! implementation ships in-crate for the demo binary and tests; writes are
//! atomic (temp file + rename) so a crash never leaves a torn document.

mod json;
mod records;
mod repository;

pub use json::JsonFileRepository;
pub use records::{SessionRecord, Utterance};
pub use repository::SessionRepository;
