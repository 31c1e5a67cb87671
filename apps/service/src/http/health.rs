use actix_web::{HttpResponse, Responder, get, web};

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health_route);
}

/// Health check route
/// This route returns no content, the response status is enough.
#[get("/")]
pub async fn health_route() -> impl Responder {
    HttpResponse::Ok()
}
