//! Typed records the lifecycle logic works on, plus the codecs for their
//! persisted delimited-string encodings.

pub mod pet;
pub mod relation;
pub mod user_app;
pub mod walk;
