pub mod access;
pub mod button_service;
pub mod code_service;
pub mod deal_service;
pub mod policy;
pub mod pool_service;

pub use button_service::*;
pub use code_service::*;
pub use deal_service::*;
pub use policy::{PolicyService, evaluate_issue_policy};
pub use pool_service::*;
