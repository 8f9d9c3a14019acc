use actix_web::{post, web, HttpResponse};
use log::error;

use crate::dto::{LoginRequest, NewUserDto};
use crate::errors::AppError;
use crate::service::{self, AppContext};

#[post("/login")]
pub async fn login(
    dto: web::Json<LoginRequest>,
    ctx: web::Data<AppContext>,
) -> Result<HttpResponse, AppError> {
    let response = service::auth::login(&ctx.store, dto.into_inner())
        .await
        .map_err(|err| {
            error!("[auth] login failed: {err}");
            err
        })?;
    Ok(HttpResponse::Ok().json(response))
}

#[post("/register")]
pub async fn register(
    dto: web::Json<NewUserDto>,
    ctx: web::Data<AppContext>,
) -> Result<HttpResponse, AppError> {
    let response = service::auth::register(&ctx.store, dto.into_inner()).await?;
    Ok(HttpResponse::Created().json(response))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(login);
    cfg.service(register);
}
