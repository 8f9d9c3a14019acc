use actix_web::{get, put, web, HttpRequest, HttpResponse};
use serde_json::json;

use crate::errors::AppError;
use crate::handlers::middleware::auth_data;
use crate::service::{self, AppContext};

#[get("")]
pub async fn mine(req: HttpRequest, ctx: web::Data<AppContext>) -> Result<HttpResponse, AppError> {
    let auth = auth_data(&req)?;
    let notifications = service::notification::for_user(&ctx.store, auth.user_id).await?;
    Ok(HttpResponse::Ok().json(notifications))
}

#[get("/unread-count")]
pub async fn unread_count(
    req: HttpRequest,
    ctx: web::Data<AppContext>,
) -> Result<HttpResponse, AppError> {
    let auth = auth_data(&req)?;
    let count = service::notification::unread_count(&ctx.store, auth.user_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "count": count })))
}

#[put("/{id}/read")]
pub async fn mark_read(
    req: HttpRequest,
    id: web::Path<i64>,
    ctx: web::Data<AppContext>,
) -> Result<HttpResponse, AppError> {
    let auth = auth_data(&req)?;
    let id = id.into_inner();
    let notification = ctx
        .store
        .get_notification(id)
        .await?
        .ok_or(AppError::NotFound)?;
    if notification.user_id != auth.user_id {
        return Err(AppError::Unauthorized);
    }
    let notification = service::notification::mark_read(&ctx.store, id).await?;
    Ok(HttpResponse::Ok().json(notification))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(unread_count);
    cfg.service(mine);
    cfg.service(mark_read);
}
