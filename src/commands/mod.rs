pub mod assign;
#[cfg(feature = "fetch")]
pub mod fetch;
pub mod harmonize;
pub mod hotspot;
