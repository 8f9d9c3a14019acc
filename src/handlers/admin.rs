use actix_web::{get, post, web, HttpRequest, HttpResponse};
use log::warn;

use crate::errors::AppError;
use crate::handlers::middleware::{auth_data, require_role};
use crate::models::UserRole;
use crate::service::backup::Backup;
use crate::service::{self, AppContext};

#[get("/stats")]
pub async fn stats(req: HttpRequest, ctx: web::Data<AppContext>) -> Result<HttpResponse, AppError> {
    let auth = auth_data(&req)?;
    require_role(&auth, UserRole::Admin)?;
    let stats = ctx.store.stats().await?;
    Ok(HttpResponse::Ok().json(stats))
}

#[get("/export")]
pub async fn export(
    req: HttpRequest,
    ctx: web::Data<AppContext>,
) -> Result<HttpResponse, AppError> {
    let auth = auth_data(&req)?;
    require_role(&auth, UserRole::Admin)?;
    let backup = service::backup::export(&ctx.store).await?;
    Ok(HttpResponse::Ok().json(backup))
}

#[post("/import")]
pub async fn import(
    req: HttpRequest,
    backup: web::Json<Backup>,
    ctx: web::Data<AppContext>,
) -> Result<HttpResponse, AppError> {
    let auth = auth_data(&req)?;
    require_role(&auth, UserRole::Admin)?;
    let import_stats = service::backup::import(&ctx.store, &backup.into_inner()).await?;
    Ok(HttpResponse::Ok().json(import_stats))
}

#[post("/clear")]
pub async fn clear(req: HttpRequest, ctx: web::Data<AppContext>) -> Result<HttpResponse, AppError> {
    let auth = auth_data(&req)?;
    require_role(&auth, UserRole::Admin)?;
    warn!("[admin] {} wiped all collections", auth.email);
    ctx.store.clear_all().await?;
    Ok(HttpResponse::Ok().json("all collections cleared"))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(stats);
    cfg.service(export);
    cfg.service(import);
    cfg.service(clear);
}
