use crate::registry::SessionRegistry;
use crate::session::SessionStatus;
use actix_web::{web, HttpResponse, Responder};

pub fn configure_admin_handlers(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin").service(
            web::resource("/sessions")
                .name("admin_sessions")
                .route(web::get().to(list_sessions)),
        ),
    );
}

async fn list_sessions(registry: web::Data<SessionRegistry>) -> impl Responder {
    let mut statuses = registry
        .sessions()
        .iter()
        .map(|session| session.status())
        .collect::<Vec<SessionStatus>>();
    statuses.sort_by(|a, b| a.id.cmp(&b.id));
    HttpResponse::Ok().json(statuses)
}
