//! Read-only HTTP surface over the aggregate store.

use std::net::SocketAddr;
use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use netpulse::{Orchestrator, QueryResolver};
use tracing::info;

use crate::error::AppError;

mod devices;
mod health;
mod query;
mod workers;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub resolver: QueryResolver,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        let resolver = QueryResolver::new(orchestrator.store().clone());
        Self { orchestrator, resolver }
    }
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.configure(health::routes).service(
        web::scope("/api")
            .configure(devices::routes)
            .configure(query::routes)
            .configure(workers::routes),
    );
}

pub async fn run_server(bind: &str, port: u16, state: AppState) -> Result<(), AppError> {
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    let data = web::Data::new(state);
    info!(%addr, "http server listening");
    HttpServer::new(move || App::new().app_data(data.clone()).configure(routes))
        .bind(addr)?
        .run()
        .await?;

    Ok(())
}
