pub mod deal;
pub mod pool;
pub mod redemption;

pub use deal::deal_config;
pub use pool::pool_config;
pub use redemption::redemption_config;

use crate::error::AppError;
use crate::middlewares::AuthContext;
use actix_web::{HttpMessage, HttpRequest};

/// 中间件塞进来的调用方上下文
pub(crate) fn auth_context(req: &HttpRequest) -> Result<AuthContext, AppError> {
    req.extensions()
        .get::<AuthContext>()
        .cloned()
        .ok_or_else(|| AppError::AuthError("Missing authentication context".to_string()))
}

/// 商家端接口要求带 vendor_id 的令牌
pub(crate) fn require_vendor(req: &HttpRequest) -> Result<(AuthContext, i64), AppError> {
    let ctx = auth_context(req)?;
    let vendor_id = ctx
        .vendor_id
        .ok_or_else(|| AppError::Unauthorized("Vendor token required".to_string()))?;
    Ok((ctx, vendor_id))
}
