// === PUBLIC CONTRACT ===
pub mod contract;
pub use contract::model;

// === MODULE DEFINITION ===
pub mod module;
pub use module::UsersModule;

// === INTERNAL MODULES ===
// Exposed for the server binary and for integration tests.
#[doc(hidden)]
pub mod api;
#[doc(hidden)]
pub mod config;
#[doc(hidden)]
pub mod domain;
#[doc(hidden)]
pub mod infra;
