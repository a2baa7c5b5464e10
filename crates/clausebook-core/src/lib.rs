//! Clause, version and policy types, the [`ClauseStore`](store::ClauseStore)
//! backend trait, and the pure pieces built on them: import classification,
//! line diffs, ETag fingerprints, CSV and Markdown rendering, and the
//! per-policy [`Session`](session::Session).

pub mod clause;
pub mod diff;
pub mod error;
pub mod fingerprint;
pub mod import;
pub mod policy;
pub mod render;
pub mod session;
pub mod store;
pub mod tabular;

pub use error::{Classify, Error, ErrorKind, Result};
