//! Device lookups, served under both of the historical paths.

use actix_web::{HttpResponse, web};

use crate::error::AppError;
use crate::http::AppState;

const PREFIXES: [&str; 2] = ["/nmf/search_device", "/nmf/mng/device"];

pub fn routes(cfg: &mut web::ServiceConfig) {
    for prefix in PREFIXES {
        cfg.route(prefix, web::get().to(all_devices))
            .route(&format!("{prefix}/{{value}}"), web::get().to(find_device));
    }
}

async fn all_devices(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let everything = state.resolver.resolve::<&str>(&[])?;
    Ok(HttpResponse::Ok().json(everything))
}

async fn find_device(
    state: web::Data<AppState>,
    value: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let found = state.resolver.resolve(&[Some(value.as_str())])?;
    Ok(HttpResponse::Ok().json(found))
}
