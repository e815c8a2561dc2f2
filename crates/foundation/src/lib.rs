pub mod bounds;
pub mod geodesy;

// Foundation crate: small, well-tested primitives only.
pub use bounds::*;
pub use geodesy::*;
