use actix_web::{web, HttpResponse, Responder};
use serde_json::json;

pub fn configure_health_handlers(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/ping").route(web::get().to(ping)));
}

async fn ping() -> impl Responder {
    HttpResponse::Ok().json(json!({ "message": "pong" }))
}
