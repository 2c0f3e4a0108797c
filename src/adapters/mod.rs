// Adapters layer: concrete implementations for external systems (browser,
// carrier portals, storage).

pub mod browser;
pub mod clickpost;
pub mod store;
pub mod yamato;
