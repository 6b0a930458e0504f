use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use dotenv::dotenv;

use taskengine::auth::TokenService;
use taskengine::config::Config;
use taskengine::middleware::{RateLimit, RequestLogger};
use taskengine::{db, routes};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = Config::from_env();

    let pool = db::init_pool(&config)
        .await
        .expect("Failed to connect to database");
    db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");

    let tokens = TokenService::new(config.jwt_secret.clone(), config.token_ttl);
    let limiter = RateLimit::per_minute(config.rate_limit_per_minute);
    let bind_addr = (config.server_host.clone(), config.server_port);

    log::info!("Starting taskengine server at {}", config.server_url());

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(tokens.clone()))
            .app_data(web::Data::new(config.clone()))
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .wrap(limiter.clone())
            // Registered last so it runs first: the correlation id must
            // exist before anything else on the request path logs.
            .wrap(RequestLogger)
            .service(routes::health::health)
            .service(web::scope("/v1").configure(routes::config))
    })
    .bind(bind_addr)?
    .run()
    .await
}
