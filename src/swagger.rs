use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    Modify,
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::entities::{
    CouponFlow, DealCodeStatus, RedemptionFrequency, RedemptionStatus, ReservationTimeout,
};
use crate::handlers;
use crate::models::*;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.as_mut().unwrap();
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        )
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::deal::list_deals,
        handlers::deal::get_deal,
        handlers::deal::create_deal,
        handlers::deal::update_deal,
        handlers::redemption::issue_code,
        handlers::redemption::verify,
        handlers::redemption::void,
        handlers::redemption::redeem,
        handlers::redemption::can_redeem,
        handlers::redemption::my_history,
        handlers::redemption::vendor_history,
        handlers::pool::seed_deal_codes,
        handlers::pool::claim_coupon,
        handlers::pool::redeem_coupon_code,
    ),
    components(
        schemas(
            DealResponse,
            CreateDealRequest,
            UpdateDealRequest,
            DealQuery,
            RedemptionResponse,
            RedemptionState,
            RedemptionQuery,
            IssueCodeResponse,
            VerifyRequest,
            VoidRequest,
            ButtonRedeemRequest,
            CanRedeemResponse,
            SeedCodesRequest,
            SeedCodesResponse,
            ClaimCodeResponse,
            DealCodeResponse,
            AccessInfo,
            AccessReason,
            RedemptionStatus,
            RedemptionFrequency,
            CouponFlow,
            ReservationTimeout,
            DealCodeStatus,
            ApiError,
            PaginationInfo,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "deal", description = "Deal management API"),
        (name = "redemption", description = "Redemption issue/verify API"),
        (name = "coupon", description = "Coupon code pool API"),
    ),
    info(
        title = "DealPass Backend API",
        version = "1.0.0",
        description = "Deal redemption & access engine REST API documentation",
    ),
    servers(
        (url = "/api/v1", description = "Local server")
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}
