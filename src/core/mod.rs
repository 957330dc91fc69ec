/// The `config` module provides site configuration loading
pub mod config;

/// The `context` module provides the run-scoped generation context
pub mod context;

/// The `error` module provides error handling
pub mod error;

/// The `traits` module provides the processor and renderer seams
pub mod traits;
