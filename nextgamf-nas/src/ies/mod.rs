//! NAS Information Elements (TS 24.501 §9.11)
//!
//! - Type 1: half octet - [`ie1`]
//! - Type 3: fixed length - [`ie3`]
//! - Type 4: one-octet length (LV / TLV) - [`ie4`]
//! - Type 6: two-octet length (LV-E / TLV-E) - [`ie6`]

pub mod ie1;
pub mod ie3;
pub mod ie4;
pub mod ie6;

pub use ie1::*;
pub use ie3::*;
pub use ie4::*;
pub use ie6::*;
