mod huc;

pub use huc::{HucCode, HucLevel};
