use actix_web::{delete, get, post, web, HttpRequest, HttpResponse};

use crate::dto::{NewCommentDto, NewPostDto, RecentPostsQuery};
use crate::errors::AppError;
use crate::handlers::middleware::auth_data;
use crate::models::UserRole;
use crate::service::{self, AppContext};

#[get("/recent")]
pub async fn recent(
    query: web::Query<RecentPostsQuery>,
    ctx: web::Data<AppContext>,
) -> Result<HttpResponse, AppError> {
    let posts = service::post::recent_posts(&ctx.store, query.limit).await?;
    Ok(HttpResponse::Ok().json(posts))
}

#[get("/event/{event_id}")]
pub async fn by_event(
    event_id: web::Path<i64>,
    ctx: web::Data<AppContext>,
) -> Result<HttpResponse, AppError> {
    let posts = service::post::posts_for_event(&ctx.store, event_id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(posts))
}

#[post("")]
pub async fn create(
    req: HttpRequest,
    dto: web::Json<NewPostDto>,
    ctx: web::Data<AppContext>,
) -> Result<HttpResponse, AppError> {
    let auth = auth_data(&req)?;
    let dto = dto.into_inner();
    let post =
        service::post::create_post(&ctx.store, auth.user_id, dto.event_id, dto.content, dto.image_url)
            .await?;
    Ok(HttpResponse::Created().json(post))
}

#[post("/{id}/like")]
pub async fn toggle_like(
    id: web::Path<i64>,
    ctx: web::Data<AppContext>,
) -> Result<HttpResponse, AppError> {
    let post = service::post::toggle_like(&ctx.store, id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(post))
}

#[delete("/{id}")]
pub async fn remove(
    req: HttpRequest,
    id: web::Path<i64>,
    ctx: web::Data<AppContext>,
) -> Result<HttpResponse, AppError> {
    let auth = auth_data(&req)?;
    let id = id.into_inner();
    let post = ctx.store.get_post(id).await?.ok_or(AppError::NotFound)?;
    if auth.user_id != post.user_id && auth.role != UserRole::Admin {
        return Err(AppError::Unauthorized);
    }
    service::post::delete_post(&ctx.store, id).await?;
    Ok(HttpResponse::Ok().json("post deleted"))
}

#[get("/{id}/comments")]
pub async fn comments(
    id: web::Path<i64>,
    ctx: web::Data<AppContext>,
) -> Result<HttpResponse, AppError> {
    let comments = service::post::comments_for_post(&ctx.store, id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(comments))
}

#[post("/{id}/comments")]
pub async fn create_comment(
    req: HttpRequest,
    id: web::Path<i64>,
    dto: web::Json<NewCommentDto>,
    ctx: web::Data<AppContext>,
) -> Result<HttpResponse, AppError> {
    let auth = auth_data(&req)?;
    let comment = service::post::create_comment(
        &ctx.store,
        auth.user_id,
        id.into_inner(),
        dto.into_inner().content,
    )
    .await?;
    Ok(HttpResponse::Created().json(comment))
}

#[delete("/comments/{id}")]
pub async fn remove_comment(
    req: HttpRequest,
    id: web::Path<i64>,
    ctx: web::Data<AppContext>,
) -> Result<HttpResponse, AppError> {
    let auth = auth_data(&req)?;
    let id = id.into_inner();
    let comment = ctx.store.get_comment(id).await?.ok_or(AppError::NotFound)?;
    if auth.user_id != comment.user_id && auth.role != UserRole::Admin {
        return Err(AppError::Unauthorized);
    }
    service::post::delete_comment(&ctx.store, id).await?;
    Ok(HttpResponse::Ok().json("comment deleted"))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(recent);
    cfg.service(by_event);
    cfg.service(create);
    cfg.service(remove_comment);
    cfg.service(toggle_like);
    cfg.service(comments);
    cfg.service(create_comment);
    cfg.service(remove);
}
