use actix_web::{HttpResponse, Responder, get, web};
use netpulse::{LifecycleState, PollWorker, WorkerStats};
use serde::Serialize;

use crate::http::AppState;

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(workers_route);
}

#[derive(Debug, Serialize)]
struct WorkerView {
    name: String,
    state: LifecycleState,
    devices: usize,
    interval_seconds: f64,
    stats: WorkerStats,
}

impl From<&PollWorker> for WorkerView {
    fn from(worker: &PollWorker) -> Self {
        Self {
            name: worker.name().to_string(),
            state: worker.state(),
            devices: worker.device_count(),
            interval_seconds: worker.interval().as_secs_f64(),
            stats: worker.stats(),
        }
    }
}

/// State and counters of every worker, in registration order.
#[get("/workers")]
async fn workers_route(state: web::Data<AppState>) -> impl Responder {
    let workers: Vec<WorkerView> =
        state.orchestrator.workers().iter().map(|worker| WorkerView::from(worker.as_ref())).collect();
    HttpResponse::Ok().json(workers)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::{App, test};
    use anyhow::Result;
    use async_trait::async_trait;
    use netpulse::{AggregateStore, Device, Orchestrator, PingReply, Pinger};
    use serde_json::{Value, json};

    use super::*;

    struct Silent;

    #[async_trait]
    impl Pinger for Silent {
        async fn ping_batch(&self, addresses: &[Device]) -> Result<Vec<PingReply>> {
            Ok(addresses.iter().cloned().map(PingReply::dead).collect())
        }
    }

    #[actix_web::test]
    async fn lists_workers_with_their_share() {
        let mut orchestrator = Orchestrator::new(AggregateStore::shared());
        for name in ["W0", "W1"] {
            orchestrator.add_worker(
                PollWorker::builder(name).pinger(Arc::new(Silent)).interval_secs(2.5).build().unwrap(),
            );
        }
        orchestrator.add_devices((1..=5).map(|i| Device::new(format!("10.0.0.{i}"))));
        orchestrator.assign_devices().unwrap();

        let state = AppState::new(Arc::new(orchestrator));
        let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(routes)).await;
        let body: Value =
            test::call_and_read_body_json(&app, test::TestRequest::get().uri("/workers").to_request()).await;

        assert_eq!(body.as_array().map(Vec::len), Some(2));
        assert_eq!(body[0]["name"], json!("W0"));
        assert_eq!(body[0]["state"], json!("stopped"));
        assert_eq!(body[0]["devices"], json!(2));
        assert_eq!(body[1]["interval_seconds"], json!(2.5));
        assert_eq!(body[1]["stats"]["cycles"], json!(0));
    }
}
