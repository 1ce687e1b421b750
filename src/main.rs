use actix_web::{App, HttpServer, middleware::Logger, web};
use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter

use dealpass_backend::{
    config::Config,
    database::{create_pool, run_migrations},
    external::NotifierService,
    handlers,
    middlewares::{AuthMiddleware, create_cors},
    services::*,
    swagger::swagger_config,
    tasks,
    utils::JwtService,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    // 加载配置
    let config = Config::from_toml().expect("Failed to load configuration file");

    // 创建数据库连接池
    let pool = std::sync::Arc::new(
        create_pool(&config.database)
            .await
            .expect("Failed to create database connection pool"),
    );

    // 运行数据库迁移
    run_migrations(pool.as_ref())
        .await
        .expect("Failed to run database migrations");

    // 创建JWT服务
    let jwt_service = JwtService::new(&config.jwt.secret, config.jwt.access_token_expires_in);

    // 创建服务
    let notifier = NotifierService::new(config.notifier.clone());
    let policy = PolicyService::new();

    let deal_service = DealService::new(pool.clone());
    let code_service = CodeRedemptionService::new(
        pool.clone(),
        policy.clone(),
        notifier.clone(),
        config.redemption.clone(),
    );
    let button_service =
        ButtonRedemptionService::new(pool.clone(), policy.clone(), notifier.clone());
    let pool_service = DealCodePoolService::new(pool.clone());

    // 启动后台清扫任务（过期 issued 码与预留超时）
    tasks::spawn_all(
        code_service.clone(),
        pool_service.clone(),
        config.redemption.sweep_interval_secs,
    );

    // 启动HTTP服务器
    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    let allowed_origin = config.server.allowed_origin.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(create_cors(allowed_origin.as_deref()))
            .wrap(AuthMiddleware::new(jwt_service.clone()))
            .app_data(web::Data::new(deal_service.clone()))
            .app_data(web::Data::new(code_service.clone()))
            .app_data(web::Data::new(button_service.clone()))
            .app_data(web::Data::new(pool_service.clone()))
            .configure(swagger_config)
            .service(
                web::scope("/api/v1")
                    .configure(handlers::deal_config)
                    .configure(handlers::redemption_config)
                    .configure(handlers::pool_config),
            )
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}
