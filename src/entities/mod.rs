pub mod deal_codes;
pub mod deals;
pub mod redemptions;

pub use deal_codes as deal_code_entity;
pub use deals as deal_entity;
pub use redemptions as redemption_entity;

pub use deal_codes::DealCodeStatus;
pub use deals::{CouponFlow, RedemptionFrequency, ReservationTimeout};
pub use redemptions::RedemptionStatus;
