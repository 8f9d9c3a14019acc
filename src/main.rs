use std::env;
use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use dotenv::dotenv;
use log::info;

use volunteer_hub::handlers;
use volunteer_hub::handlers::middleware::AuthMiddleware;
use volunteer_hub::service::log::{init_logger, LoggerMiddleware};
use volunteer_hub::service::notification::LogNotifier;
use volunteer_hub::service::registration::ConfirmationScheduler;
use volunteer_hub::service::AppContext;
use volunteer_hub::store::{Store, StoreConfig};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    init_logger();

    let config = StoreConfig::from_env();
    let store = Store::open(&config)
        .await
        .unwrap_or_else(|err| panic!("failed to open any storage backend: {err:?}"));
    let ctx = AppContext::new(
        Arc::new(store),
        Arc::new(ConfirmationScheduler::from_env()),
        Arc::new(LogNotifier::from_env()),
    );

    let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    info!("listening on {bind_addr}");

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(ctx.clone()))
            .wrap(LoggerMiddleware)
            .service(web::scope("/auth").configure(handlers::auth::init_routes))
            .service(
                web::scope("/users")
                    .wrap(AuthMiddleware)
                    .configure(handlers::user::init_routes),
            )
            .service(
                web::scope("/events")
                    .wrap(AuthMiddleware)
                    .configure(handlers::event::init_routes),
            )
            .service(
                web::scope("/registrations")
                    .wrap(AuthMiddleware)
                    .configure(handlers::registration::init_routes),
            )
            .service(
                web::scope("/posts")
                    .wrap(AuthMiddleware)
                    .configure(handlers::post::init_routes),
            )
            .service(
                web::scope("/notifications")
                    .wrap(AuthMiddleware)
                    .configure(handlers::notification::init_routes),
            )
            .service(
                web::scope("/admin")
                    .wrap(AuthMiddleware)
                    .configure(handlers::admin::init_routes),
            )
    })
    .bind(bind_addr)?
    .run()
    .await
}
