use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::DbErr),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Auth error: {0}")]
    AuthError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Deal is not active")]
    InactiveDeal,

    #[error("Deal is outside its availability window")]
    OutsideWindow,

    #[error("Redemption limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("Cooldown active: {0}")]
    CooldownActive(String),

    #[error("Redemption frequency window active: {0}")]
    FrequencyWindowActive(String),

    #[error("Could not generate a unique redemption code")]
    CodeGenerationExhausted,

    #[error("Code has already been used")]
    AlreadyConsumed,

    #[error("Code has expired")]
    Expired,

    #[error("JWT error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl AppError {
    /// 稳定的机器可读错误码，供响应体与 can-redeem 探测接口共用
    pub fn code(&self) -> &'static str {
        match self {
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::AuthError(_) => "AUTH_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::InactiveDeal => "INACTIVE_DEAL",
            AppError::OutsideWindow => "OUTSIDE_WINDOW",
            AppError::LimitExceeded(_) => "LIMIT_EXCEEDED",
            AppError::CooldownActive(_) => "COOLDOWN_ACTIVE",
            AppError::FrequencyWindowActive(_) => "FREQUENCY_WINDOW_ACTIVE",
            AppError::CodeGenerationExhausted => "CODE_GENERATION_EXHAUSTED",
            AppError::AlreadyConsumed => "ALREADY_CONSUMED",
            AppError::Expired => "EXPIRED",
            AppError::JwtError(_) => "AUTH_ERROR",
            AppError::InternalError(_) => "INTERNAL_ERROR",
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        use actix_web::http::StatusCode;

        let (status_code, message) = match self {
            AppError::ValidationError(msg) => {
                log::warn!("Validation error: {msg}");
                (StatusCode::BAD_REQUEST, msg.clone())
            }
            AppError::AuthError(msg) => {
                log::warn!("Authentication error: {msg}");
                (StatusCode::UNAUTHORIZED, msg.clone())
            }
            AppError::JwtError(err) => {
                log::warn!("JWT error: {err}");
                (StatusCode::UNAUTHORIZED, "Invalid token".to_string())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Unauthorized(msg) => {
                log::warn!("Unauthorized: {msg}");
                (StatusCode::FORBIDDEN, msg.clone())
            }
            AppError::InactiveDeal | AppError::OutsideWindow => {
                (StatusCode::UNPROCESSABLE_ENTITY, self.to_string())
            }
            AppError::LimitExceeded(_)
            | AppError::CooldownActive(_)
            | AppError::FrequencyWindowActive(_) => {
                (StatusCode::TOO_MANY_REQUESTS, self.to_string())
            }
            // 并发核销输家的正常结局，不按服务端错误处理
            AppError::AlreadyConsumed => (StatusCode::CONFLICT, self.to_string()),
            AppError::Expired => (StatusCode::GONE, self.to_string()),
            AppError::CodeGenerationExhausted => {
                log::error!("Code generation exhausted");
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            AppError::DatabaseError(err) => {
                // 行级细节只进日志，不回给调用方
                log::error!("Database error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
            AppError::InternalError(msg) => {
                log::error!("Internal error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        HttpResponse::build(status_code).json(json!({
            "success": false,
            "error": {
                "code": self.code(),
                "message": message
            }
        }))
    }
}
