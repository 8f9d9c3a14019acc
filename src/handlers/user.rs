use actix_web::{get, put, web, HttpRequest, HttpResponse};

use crate::dto::{ChangePasswordDto, UpdateProfileDto, UpdateUserStatusDto};
use crate::errors::AppError;
use crate::handlers::middleware::{auth_data, require_role};
use crate::models::UserRole;
use crate::service::{self, AppContext};

#[get("")]
pub async fn get_all(ctx: web::Data<AppContext>) -> Result<HttpResponse, AppError> {
    let users = service::user::get_all(&ctx.store).await?;
    Ok(HttpResponse::Ok().json(users))
}

#[get("/me")]
pub async fn me(req: HttpRequest, ctx: web::Data<AppContext>) -> Result<HttpResponse, AppError> {
    let auth = auth_data(&req)?;
    let user = service::user::get_by_id(&ctx.store, auth.user_id).await?;
    Ok(HttpResponse::Ok().json(user))
}

#[put("/profile")]
pub async fn update_profile(
    req: HttpRequest,
    dto: web::Json<UpdateProfileDto>,
    ctx: web::Data<AppContext>,
) -> Result<HttpResponse, AppError> {
    let auth = auth_data(&req)?;
    let user = service::auth::update_profile(&ctx.store, auth.user_id, dto.into_inner()).await?;
    Ok(HttpResponse::Ok().json(user))
}

#[put("/password")]
pub async fn change_password(
    req: HttpRequest,
    dto: web::Json<ChangePasswordDto>,
    ctx: web::Data<AppContext>,
) -> Result<HttpResponse, AppError> {
    let auth = auth_data(&req)?;
    let dto = dto.into_inner();
    service::auth::change_password(&ctx.store, auth.user_id, &dto.old_password, &dto.new_password)
        .await?;
    Ok(HttpResponse::Ok().json("password changed"))
}

#[get("/{id}")]
pub async fn get_by_id(
    id: web::Path<i64>,
    ctx: web::Data<AppContext>,
) -> Result<HttpResponse, AppError> {
    let user = service::user::get_by_id(&ctx.store, id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(user))
}

#[put("/{id}/status")]
pub async fn update_status(
    req: HttpRequest,
    id: web::Path<i64>,
    dto: web::Json<UpdateUserStatusDto>,
    ctx: web::Data<AppContext>,
) -> Result<HttpResponse, AppError> {
    let auth = auth_data(&req)?;
    require_role(&auth, UserRole::Admin)?;
    let user = service::user::update_status(&ctx.store, id.into_inner(), dto.status).await?;
    Ok(HttpResponse::Ok().json(user))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(get_all);
    cfg.service(me);
    cfg.service(update_profile);
    cfg.service(change_password);
    cfg.service(get_by_id);
    cfg.service(update_status);
}
