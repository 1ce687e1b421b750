use crate::handlers::{auth_context, require_vendor};
use crate::models::*;
use crate::services::{ButtonRedemptionService, CodeRedemptionService};
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    post,
    path = "/deals/{id}/issue",
    tag = "redemption",
    params(
        ("id" = i64, Path, description = "优惠ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "签发兑换码成功", body = IssueCodeResponse),
        (status = 404, description = "优惠不存在"),
        (status = 422, description = "优惠未激活"),
        (status = 429, description = "触发限额或冷却")
    )
)]
pub async fn issue_code(
    code_service: web::Data<CodeRedemptionService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let ctx = match auth_context(&req) {
        Ok(ctx) => ctx,
        Err(e) => return Ok(e.error_response()),
    };

    match code_service
        .issue_code(path.into_inner(), ctx.user_id)
        .await
    {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/redemptions/verify",
    tag = "redemption",
    request_body = VerifyRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "核销成功", body = RedemptionResponse),
        (status = 404, description = "兑换码不存在"),
        (status = 409, description = "兑换码已被使用"),
        (status = 410, description = "兑换码已过期")
    )
)]
pub async fn verify(
    code_service: web::Data<CodeRedemptionService>,
    req: HttpRequest,
    request: web::Json<VerifyRequest>,
) -> Result<HttpResponse> {
    let (_, vendor_id) = match require_vendor(&req) {
        Ok(v) => v,
        Err(e) => return Ok(e.error_response()),
    };

    match code_service.verify(&request.code, vendor_id).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/redemptions/{id}/void",
    tag = "redemption",
    params(
        ("id" = i64, Path, description = "兑换记录ID")
    ),
    request_body = VoidRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "作废成功（幂等）", body = RedemptionResponse),
        (status = 403, description = "无权操作该记录"),
        (status = 404, description = "记录不存在")
    )
)]
pub async fn void(
    code_service: web::Data<CodeRedemptionService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<VoidRequest>,
) -> Result<HttpResponse> {
    let (_, vendor_id) = match require_vendor(&req) {
        Ok(v) => v,
        Err(e) => return Ok(e.error_response()),
    };

    match code_service
        .void(path.into_inner(), vendor_id, request.into_inner().reason)
        .await
    {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/deals/{id}/redeem",
    tag = "redemption",
    params(
        ("id" = i64, Path, description = "优惠ID")
    ),
    request_body = ButtonRedeemRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "兑换成功", body = RedemptionResponse),
        (status = 422, description = "优惠未激活或不在可用窗口"),
        (status = 429, description = "频率窗口或全局限额")
    )
)]
pub async fn redeem(
    button_service: web::Data<ButtonRedemptionService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<ButtonRedeemRequest>,
) -> Result<HttpResponse> {
    let ctx = match auth_context(&req) {
        Ok(ctx) => ctx,
        Err(e) => return Ok(e.error_response()),
    };

    match button_service
        .redeem(path.into_inner(), ctx.user_id, request.into_inner().source)
        .await
    {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/deals/{id}/can-redeem",
    tag = "redemption",
    params(
        ("id" = i64, Path, description = "优惠ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "探测结果", body = CanRedeemResponse),
        (status = 404, description = "优惠不存在")
    )
)]
pub async fn can_redeem(
    button_service: web::Data<ButtonRedemptionService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let ctx = match auth_context(&req) {
        Ok(ctx) => ctx,
        Err(e) => return Ok(e.error_response()),
    };

    match button_service
        .can_redeem(path.into_inner(), ctx.user_id)
        .await
    {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/redemptions",
    tag = "redemption",
    params(
        ("page" = Option<u32>, Query, description = "页码"),
        ("per_page" = Option<u32>, Query, description = "每页数量"),
        ("status" = Option<String>, Query, description = "状态: issued/verified/redeemed/expired/voided")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "获取本人兑换历史成功"),
        (status = 401, description = "未授权")
    )
)]
pub async fn my_history(
    code_service: web::Data<CodeRedemptionService>,
    req: HttpRequest,
    query: web::Query<RedemptionQuery>,
) -> Result<HttpResponse> {
    let ctx = match auth_context(&req) {
        Ok(ctx) => ctx,
        Err(e) => return Ok(e.error_response()),
    };

    match code_service.list_for_user(ctx.user_id, &query).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/redemptions/vendor",
    tag = "redemption",
    params(
        ("page" = Option<u32>, Query, description = "页码"),
        ("per_page" = Option<u32>, Query, description = "每页数量"),
        ("status" = Option<String>, Query, description = "状态过滤")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "获取商家兑换历史成功"),
        (status = 403, description = "需要商家令牌")
    )
)]
pub async fn vendor_history(
    code_service: web::Data<CodeRedemptionService>,
    req: HttpRequest,
    query: web::Query<RedemptionQuery>,
) -> Result<HttpResponse> {
    let (_, vendor_id) = match require_vendor(&req) {
        Ok(v) => v,
        Err(e) => return Ok(e.error_response()),
    };

    match code_service.list_for_vendor(vendor_id, &query).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn redemption_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/redemptions")
            .route("", web::get().to(my_history))
            .route("/vendor", web::get().to(vendor_history))
            .route("/verify", web::post().to(verify))
            .route("/{id}/void", web::post().to(void)),
    );
}
