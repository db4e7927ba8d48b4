use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, create_security_headers_layer};
use crate::handlers::{
    admin, auth, availability, campaigns, cron, health_check, lessons, payments, profiles,
};
use crate::state::AppState;

fn api_routes() -> Router<AppState> {
    Router::new()
        // auth
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        // profiles
        .route("/profiles/me", get(profiles::get_my_profile))
        .route("/profiles/student", put(profiles::update_student_profile))
        .route("/profiles/teacher", put(profiles::update_teacher_profile))
        .route("/teachers", get(profiles::list_teachers))
        .route("/teachers/:id", get(profiles::get_teacher))
        .route("/teachers/:id/availability", get(availability::list_open_slots))
        // availability
        .route(
            "/availability",
            get(availability::list_my_slots).post(availability::create_slot),
        )
        .route("/availability/:id", delete(availability::delete_slot))
        // lessons
        .route("/lessons", get(lessons::list_lessons))
        .route("/lessons/:id", get(lessons::get_lesson))
        .route("/lessons/:id/cancel", post(lessons::cancel_lesson))
        .route("/lessons/:id/complete", post(lessons::complete_lesson))
        .route("/lessons/:id/meeting", get(lessons::meeting_link))
        // payments
        .route("/payments/lesson", post(payments::initiate_lesson))
        .route("/payments/package", post(payments::initiate_package))
        .route("/payments/featured", post(payments::initiate_featured))
        .route("/payments/callback", post(payments::callback))
        .route("/packages", get(payments::list_packages))
        .route("/packages/:id/book", post(payments::book_with_package))
        // campaigns
        .route("/campaigns/offers", get(campaigns::list_offers))
        .route(
            "/admin/campaigns",
            get(campaigns::list_campaigns).post(campaigns::create_campaign),
        )
        .route(
            "/admin/campaigns/:id",
            put(campaigns::update_campaign).delete(campaigns::delete_campaign),
        )
        // admin
        .route("/admin/stats", get(admin::stats))
        .route("/admin/payments", get(admin::list_payments))
        .route(
            "/admin/payments/:kind/:id/refunded",
            post(admin::mark_refunded),
        )
        .route("/admin/teachers/pending", get(admin::pending_teachers))
        .route("/admin/teachers/:id/approve", post(admin::approve_teacher))
        // scheduler hooks
        .route("/cron/:job", post(cron::run_job))
}

pub fn create_routes(state: AppState) -> Router {
    let is_production = state.config.is_production;
    let cors = create_cors_layer(&state.config.cors_origins);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(create_security_headers_layer(is_production))
        .layer(cors)
}
