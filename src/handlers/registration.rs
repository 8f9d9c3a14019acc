use actix_web::{get, post, put, web, HttpRequest, HttpResponse};

use crate::dto::{NewRegistrationDto, UpdateRegistrationStatusDto};
use crate::errors::AppError;
use crate::handlers::middleware::auth_data;
use crate::models::UserRole;
use crate::service::{self, AppContext};

#[post("")]
pub async fn register(
    req: HttpRequest,
    dto: web::Json<NewRegistrationDto>,
    ctx: web::Data<AppContext>,
) -> Result<HttpResponse, AppError> {
    let auth = auth_data(&req)?;
    let registration = service::registration::register(&ctx, auth.user_id, dto.event_id).await?;
    Ok(HttpResponse::Created().json(registration))
}

#[get("/mine")]
pub async fn mine(req: HttpRequest, ctx: web::Data<AppContext>) -> Result<HttpResponse, AppError> {
    let auth = auth_data(&req)?;
    let registrations = service::registration::by_user(&ctx.store, auth.user_id).await?;
    Ok(HttpResponse::Ok().json(registrations))
}

#[get("/event/{event_id}/mine")]
pub async fn for_event_mine(
    req: HttpRequest,
    event_id: web::Path<i64>,
    ctx: web::Data<AppContext>,
) -> Result<HttpResponse, AppError> {
    let auth = auth_data(&req)?;
    let registration =
        service::registration::for_pair(&ctx.store, auth.user_id, event_id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(registration))
}

#[get("/event/{event_id}")]
pub async fn by_event(
    event_id: web::Path<i64>,
    ctx: web::Data<AppContext>,
) -> Result<HttpResponse, AppError> {
    let registrations =
        service::registration::by_event(&ctx.store, event_id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(registrations))
}

#[put("/{id}/cancel")]
pub async fn cancel(
    req: HttpRequest,
    id: web::Path<i64>,
    ctx: web::Data<AppContext>,
) -> Result<HttpResponse, AppError> {
    let auth = auth_data(&req)?;
    let registration =
        service::registration::cancel(&ctx, id.into_inner(), auth.user_id, auth.role).await?;
    Ok(HttpResponse::Ok().json(registration))
}

#[put("/{id}/status")]
pub async fn update_status(
    req: HttpRequest,
    id: web::Path<i64>,
    dto: web::Json<UpdateRegistrationStatusDto>,
    ctx: web::Data<AppContext>,
) -> Result<HttpResponse, AppError> {
    let auth = auth_data(&req)?;
    if auth.role == UserRole::Volunteer {
        return Err(AppError::Unauthorized);
    }
    let registration =
        service::registration::update_status(&ctx, id.into_inner(), dto.status).await?;
    Ok(HttpResponse::Ok().json(registration))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(register);
    cfg.service(mine);
    cfg.service(for_event_mine);
    cfg.service(by_event);
    cfg.service(cancel);
    cfg.service(update_status);
}
