use crate::handlers::{auth_context, require_vendor};
use crate::models::*;
use crate::services::DealCodePoolService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    post,
    path = "/deals/{id}/codes",
    tag = "coupon",
    params(
        ("id" = i64, Path, description = "优惠ID")
    ),
    request_body = SeedCodesRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "灌码成功", body = SeedCodesResponse),
        (status = 400, description = "码列表为空或重复"),
        (status = 403, description = "无权操作该优惠")
    )
)]
pub async fn seed_deal_codes(
    pool_service: web::Data<DealCodePoolService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<SeedCodesRequest>,
) -> Result<HttpResponse> {
    let (_, vendor_id) = match require_vendor(&req) {
        Ok(v) => v,
        Err(e) => return Ok(e.error_response()),
    };

    match pool_service
        .seed_codes(path.into_inner(), vendor_id, request.into_inner().codes)
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
    path = "/deals/{id}/coupon/claim",
    tag = "coupon",
    params(
        ("id" = i64, Path, description = "优惠ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "领码成功", body = ClaimCodeResponse),
        (status = 403, description = "会员锁定且无有效通行证"),
        (status = 429, description = "码池已空")
    )
)]
pub async fn claim_coupon(
    pool_service: web::Data<DealCodePoolService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let ctx = match auth_context(&req) {
        Ok(ctx) => ctx,
        Err(e) => return Ok(e.error_response()),
    };

    match pool_service
        .claim(path.into_inner(), &ctx.membership)
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
    path = "/codes/{code}/redeem",
    tag = "coupon",
    params(
        ("code" = String, Path, description = "券码")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "券码核销成功", body = DealCodeResponse),
        (status = 404, description = "券码不存在"),
        (status = 409, description = "券码已被使用"),
        (status = 410, description = "预留已超时")
    )
)]
pub async fn redeem_coupon_code(
    pool_service: web::Data<DealCodePoolService>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let (_, vendor_id) = match require_vendor(&req) {
        Ok(v) => v,
        Err(e) => return Ok(e.error_response()),
    };

    match pool_service.redeem_code(&path.into_inner(), vendor_id).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn pool_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/codes").route("/{code}/redeem", web::post().to(redeem_coupon_code)),
    );
}
