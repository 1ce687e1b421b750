use crate::handlers::{auth_context, require_vendor};
use crate::models::*;
use crate::services::DealService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/deals",
    tag = "deal",
    params(
        ("page" = Option<u32>, Query, description = "页码"),
        ("per_page" = Option<u32>, Query, description = "每页数量")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "获取优惠列表成功"),
        (status = 401, description = "未授权")
    )
)]
pub async fn list_deals(
    deal_service: web::Data<DealService>,
    req: HttpRequest,
    query: web::Query<DealQuery>,
) -> Result<HttpResponse> {
    let user = auth_context(&req).ok().map(|ctx| ctx.membership);

    match deal_service.list_active(&query, user.as_ref()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/deals/{id}",
    tag = "deal",
    params(
        ("id" = i64, Path, description = "优惠ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "获取优惠详情成功", body = DealResponse),
        (status = 404, description = "优惠不存在")
    )
)]
pub async fn get_deal(
    deal_service: web::Data<DealService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let user = auth_context(&req).ok().map(|ctx| ctx.membership);

    match deal_service
        .get_deal(path.into_inner(), user.as_ref())
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
    path = "/deals",
    tag = "deal",
    request_body = CreateDealRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "创建优惠成功", body = DealResponse),
        (status = 400, description = "请求参数错误"),
        (status = 403, description = "需要商家令牌")
    )
)]
pub async fn create_deal(
    deal_service: web::Data<DealService>,
    req: HttpRequest,
    request: web::Json<CreateDealRequest>,
) -> Result<HttpResponse> {
    let (_, vendor_id) = match require_vendor(&req) {
        Ok(v) => v,
        Err(e) => return Ok(e.error_response()),
    };

    match deal_service
        .create_deal(vendor_id, request.into_inner())
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
    patch,
    path = "/deals/{id}",
    tag = "deal",
    params(
        ("id" = i64, Path, description = "优惠ID")
    ),
    request_body = UpdateDealRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "更新优惠成功", body = DealResponse),
        (status = 403, description = "无权操作该优惠"),
        (status = 404, description = "优惠不存在")
    )
)]
pub async fn update_deal(
    deal_service: web::Data<DealService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<UpdateDealRequest>,
) -> Result<HttpResponse> {
    let (_, vendor_id) = match require_vendor(&req) {
        Ok(v) => v,
        Err(e) => return Ok(e.error_response()),
    };

    match deal_service
        .update_deal(path.into_inner(), vendor_id, request.into_inner())
        .await
    {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn deal_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/deals")
            .route("", web::get().to(list_deals))
            .route("", web::post().to(create_deal))
            .route("/{id}", web::get().to(get_deal))
            .route("/{id}", web::patch().to(update_deal))
            .route("/{id}/codes", web::post().to(super::pool::seed_deal_codes))
            .route("/{id}/issue", web::post().to(super::redemption::issue_code))
            .route("/{id}/redeem", web::post().to(super::redemption::redeem))
            .route(
                "/{id}/can-redeem",
                web::get().to(super::redemption::can_redeem),
            )
            .route(
                "/{id}/coupon/claim",
                web::post().to(super::pool::claim_coupon),
            ),
    );
}
