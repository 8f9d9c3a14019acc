use actix_web::{delete, get, post, put, web, HttpRequest, HttpResponse};

use crate::dto::{ListEventsQuery, NewEventDto, UpdateEventDto, UpdateEventStatusDto};
use crate::errors::AppError;
use crate::handlers::middleware::{auth_data, require_role};
use crate::models::UserRole;
use crate::service::event::{EventFilter, DEFAULT_PAGE_SIZE};
use crate::service::{self, AppContext};

#[get("")]
pub async fn list(
    query: web::Query<ListEventsQuery>,
    ctx: web::Data<AppContext>,
) -> Result<HttpResponse, AppError> {
    let query = query.into_inner();
    let filter = EventFilter {
        search: query.search,
        category: query.category,
        start_date: query.start_date,
    };
    let page = service::event::list(
        &ctx.store,
        query.page.unwrap_or(1),
        query.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        &filter,
    )
    .await?;
    Ok(HttpResponse::Ok().json(page))
}

#[get("/highlights")]
pub async fn highlights(ctx: web::Data<AppContext>) -> Result<HttpResponse, AppError> {
    let highlights = service::event::highlights(&ctx.store).await?;
    Ok(HttpResponse::Ok().json(highlights))
}

#[get("/mine")]
pub async fn mine(req: HttpRequest, ctx: web::Data<AppContext>) -> Result<HttpResponse, AppError> {
    let auth = auth_data(&req)?;
    let events = service::event::by_creator(&ctx.store, auth.user_id).await?;
    Ok(HttpResponse::Ok().json(events))
}

#[get("/{id}")]
pub async fn get_by_id(
    id: web::Path<i64>,
    ctx: web::Data<AppContext>,
) -> Result<HttpResponse, AppError> {
    let event = service::event::get_by_id(&ctx.store, id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(event))
}

#[post("")]
pub async fn create(
    req: HttpRequest,
    dto: web::Json<NewEventDto>,
    ctx: web::Data<AppContext>,
) -> Result<HttpResponse, AppError> {
    let auth = auth_data(&req)?;
    let event = service::event::create(&ctx.store, auth.user_id, dto.into_inner()).await?;
    Ok(HttpResponse::Created().json(event))
}

#[put("/{id}")]
pub async fn update(
    req: HttpRequest,
    id: web::Path<i64>,
    dto: web::Json<UpdateEventDto>,
    ctx: web::Data<AppContext>,
) -> Result<HttpResponse, AppError> {
    let auth = auth_data(&req)?;
    let event = service::event::update(
        &ctx.store,
        id.into_inner(),
        dto.into_inner(),
        auth.user_id,
        auth.role,
    )
    .await?;
    Ok(HttpResponse::Ok().json(event))
}

#[put("/{id}/status")]
pub async fn update_status(
    req: HttpRequest,
    id: web::Path<i64>,
    dto: web::Json<UpdateEventStatusDto>,
    ctx: web::Data<AppContext>,
) -> Result<HttpResponse, AppError> {
    let auth = auth_data(&req)?;
    require_role(&auth, UserRole::Admin)?;
    let event = service::event::set_status(&ctx.store, id.into_inner(), dto.status).await?;
    Ok(HttpResponse::Ok().json(event))
}

#[delete("/{id}")]
pub async fn remove(
    req: HttpRequest,
    id: web::Path<i64>,
    ctx: web::Data<AppContext>,
) -> Result<HttpResponse, AppError> {
    let auth = auth_data(&req)?;
    let id = id.into_inner();
    let event = ctx.store.get_event(id).await?.ok_or(AppError::NotFound)?;
    if auth.user_id != event.created_by && auth.role != UserRole::Admin {
        return Err(AppError::Unauthorized);
    }
    service::event::delete(&ctx.store, id).await?;
    Ok(HttpResponse::Ok().json("event deleted"))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    // literal paths must register before `{id}`
    cfg.service(highlights);
    cfg.service(mine);
    cfg.service(list);
    cfg.service(create);
    cfg.service(update_status);
    cfg.service(get_by_id);
    cfg.service(update);
    cfg.service(remove);
}
