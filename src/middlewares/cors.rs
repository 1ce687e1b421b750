use actix_cors::Cors;

pub fn create_cors(allowed_origin: Option<&str>) -> Cors {
    let cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "PATCH", "DELETE", "OPTIONS"])
        // 前端自定义 Header 较多，预检直接放宽
        .allow_any_header()
        .supports_credentials()
        .max_age(3600);

    match allowed_origin {
        Some(origin) => cors.allowed_origin(origin),
        // 未配置时放开，部署环境应通过配置收紧
        None => cors.allowed_origin_fn(|_, _req_head| true),
    }
}
