use std::sync::Arc;
use std::time::Duration;

use actix_web::{http::StatusCode, test, web, App};
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::{json, Value};
use tempfile::TempDir;

use volunteer_hub::handlers;
use volunteer_hub::handlers::middleware::AuthMiddleware;
use volunteer_hub::service::notification::LogNotifier;
use volunteer_hub::service::registration::ConfirmationScheduler;
use volunteer_hub::service::AppContext;
use volunteer_hub::store::{Store, StoreConfig};

async fn open_context(dir: &TempDir) -> AppContext {
    let config = StoreConfig {
        database_url: format!("sqlite://{}?mode=rwc", dir.path().join("hub.db").display()),
        data_dir: dir.path().join("data"),
    };
    let store = Store::open(&config).await.expect("store");
    AppContext::new(
        Arc::new(store),
        Arc::new(ConfirmationScheduler::new(Duration::from_millis(20))),
        Arc::new(LogNotifier::from_env()),
    )
}

macro_rules! app {
    ($ctx:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($ctx.clone()))
                .service(web::scope("/auth").configure(handlers::auth::init_routes))
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
                    web::scope("/admin")
                        .wrap(AuthMiddleware)
                        .configure(handlers::admin::init_routes),
                ),
        )
        .await
    };
}

macro_rules! register {
    ($app:expr, $email:expr, $role:expr) => {{
        let req = test::TestRequest::post()
            .uri("/auth/register")
            .set_json(json!({
                "email": $email,
                "password": "Str0ngPass",
                "full_name": "Test Person",
                "role": $role,
            }))
            .to_request();
        let res = test::call_service($app, req).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(res).await;
        body["token"].as_str().expect("token").to_string()
    }};
}

#[actix_rt::test]
async fn auth_gates_the_protected_scopes() {
    let dir = TempDir::new().unwrap();
    let ctx = open_context(&dir).await;
    let app = app!(ctx);

    // middleware rejections surface as service-level errors, not responses
    let req = test::TestRequest::get().uri("/events").to_request();
    let err = test::try_call_service(&app, req).await.unwrap_err();
    assert_eq!(
        err.as_response_error().status_code(),
        StatusCode::UNAUTHORIZED
    );

    let req = test::TestRequest::get()
        .uri("/events")
        .insert_header(("Authorization", "Bearer not-a-token"))
        .to_request();
    let err = test::try_call_service(&app, req).await.unwrap_err();
    assert_eq!(
        err.as_response_error().status_code(),
        StatusCode::UNAUTHORIZED
    );
}

#[actix_rt::test]
async fn event_lifecycle_over_http() {
    let dir = TempDir::new().unwrap();
    let ctx = open_context(&dir).await;
    let app = app!(ctx);

    let manager = register!(&app, "manager@example.org", "manager");
    let admin = register!(&app, "admin@example.org", "admin");
    let volunteer = register!(&app, "volunteer@example.org", "volunteer");

    let start = Utc::now() + ChronoDuration::days(2);
    let req = test::TestRequest::post()
        .uri("/events")
        .insert_header(("Authorization", format!("Bearer {manager}")))
        .set_json(json!({
            "title": "Library Book Sorting",
            "description": "Sorting donated books at the city library",
            "location": "City Library",
            "category": "Education",
            "startDate": start,
            "endDate": start + ChronoDuration::hours(3),
        }))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let event: Value = test::read_body_json(res).await;
    let event_id = event["id"].as_i64().unwrap();
    assert_eq!(event["status"], "pending");

    // pending events are not listed
    let req = test::TestRequest::get()
        .uri("/events")
        .insert_header(("Authorization", format!("Bearer {manager}")))
        .to_request();
    let page: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(page["total"], 0);

    // approval requires the admin role
    let req = test::TestRequest::put()
        .uri(&format!("/events/{event_id}/status"))
        .insert_header(("Authorization", format!("Bearer {manager}")))
        .set_json(json!({ "status": "approved" }))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::put()
        .uri(&format!("/events/{event_id}/status"))
        .insert_header(("Authorization", format!("Bearer {admin}")))
        .set_json(json!({ "status": "approved" }))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);

    let req = test::TestRequest::get()
        .uri("/events")
        .insert_header(("Authorization", format!("Bearer {manager}")))
        .to_request();
    let page: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["participantCount"], 0);

    // volunteer registers and hits the duplicate guard
    let req = test::TestRequest::post()
        .uri("/registrations")
        .insert_header(("Authorization", format!("Bearer {volunteer}")))
        .set_json(json!({ "eventId": event_id }))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let req = test::TestRequest::post()
        .uri("/registrations")
        .insert_header(("Authorization", format!("Bearer {volunteer}")))
        .set_json(json!({ "eventId": event_id }))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    // admin-only surface
    let req = test::TestRequest::get()
        .uri("/admin/stats")
        .insert_header(("Authorization", format!("Bearer {volunteer}")))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::get()
        .uri("/admin/stats")
        .insert_header(("Authorization", format!("Bearer {admin}")))
        .to_request();
    let stats: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(stats["collections"]["users"], 3);
    assert_eq!(stats["collections"]["registrations"], 1);
}

#[actix_rt::test]
async fn backup_round_trips_over_the_admin_api() {
    let dir = TempDir::new().unwrap();
    let ctx = open_context(&dir).await;
    let app = app!(ctx);

    let admin = register!(&app, "admin@example.org", "admin");
    register!(&app, "volunteer@example.org", "volunteer");

    let req = test::TestRequest::get()
        .uri("/admin/export")
        .insert_header(("Authorization", format!("Bearer {admin}")))
        .to_request();
    let backup: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(backup["databaseName"], "VolunteerHubDB");
    assert_eq!(backup["statistics"]["users"], 2);

    let req = test::TestRequest::post()
        .uri("/admin/clear")
        .insert_header(("Authorization", format!("Bearer {admin}")))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);

    let req = test::TestRequest::post()
        .uri("/admin/import")
        .insert_header(("Authorization", format!("Bearer {admin}")))
        .set_json(&backup)
        .to_request();
    let report: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(report["failed"], 0);
    assert_eq!(report["imported"], report["total"]);

    let req = test::TestRequest::get()
        .uri("/admin/stats")
        .insert_header(("Authorization", format!("Bearer {admin}")))
        .to_request();
    let after: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(after["collections"]["users"], 2);
    assert_eq!(after["collections"]["password_hashes"], 2);
}
