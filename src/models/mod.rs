pub mod access;
pub mod common;
pub mod deal;
pub mod deal_code;
pub mod pagination;
pub mod redemption;

pub use access::*;
pub use common::*;
pub use deal::*;
pub use deal_code::*;
pub use pagination::*;
pub use redemption::*;
