//! Matter entity bridge library.
//!
//! Presents the devices behind commissioned Matter bridges as entities of a
//! remote controller: classification, attribute conversion, subscription-scoped
//! change listeners and inventory reconciliation on topology changes.

pub mod bridge;
pub mod config;
pub mod driver;
pub mod entity;
pub mod error;
pub mod matter;
pub mod registry;
pub mod simulation;
