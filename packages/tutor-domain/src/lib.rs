pub mod classify;
pub mod normalize;
pub mod source;

pub use classify::{Classification, Intent, LookupDirection, classify};
pub use normalize::normalize;
pub use source::{SourceKind, SourceTierTable};
