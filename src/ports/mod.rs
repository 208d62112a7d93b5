pub mod fs;
pub mod time;
pub mod vcs;

#[cfg(test)]
pub(crate) mod fake;

// Re-exports
pub use fs::*;
pub use time::*;
pub use vcs::*;
