//! CLI command implementations.

pub mod fingerprint;
pub mod import_kotatsu;
pub mod inspect;
pub mod io;
pub mod merge;
pub mod patch;
pub mod timeline;
