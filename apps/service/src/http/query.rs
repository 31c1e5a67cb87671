//! `/api/query/{segments...}`: least specific segment first, the last
//! non-empty one is looked up.

use actix_web::{HttpResponse, get, web};

use crate::error::AppError;
use crate::http::AppState;

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(query_route).route("/query", web::get().to(query_root));
}

#[get("/query/{segments:.*}")]
async fn query_route(
    state: web::Data<AppState>,
    segments: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let found = state.resolver.resolve_path(&segments)?;
    Ok(HttpResponse::Ok().json(found))
}

async fn query_root(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.resolver.resolve::<&str>(&[])?))
}

#[cfg(test)]
mod tests {
    use actix_web::{App, http::StatusCode, test};
    use serde_json::{Value, json};

    use super::*;
    use crate::http::testing;

    macro_rules! app {
        () => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new(testing::state()))
                    .service(web::scope("/api").configure(routes)),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn most_specific_segment_wins() {
        let app = app!();
        let req = test::TestRequest::get().uri("/api/query/anything/W1/10.0.0.2").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, json!(false));

        let req = test::TestRequest::get().uri("/api/query/5.3.2024%209.7/W1").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, json!({ "10.0.0.1": true, "10.0.0.2": false }));
    }

    #[actix_web::test]
    async fn no_segments_returns_everything() {
        let app = app!();
        for uri in ["/api/query", "/api/query/"] {
            let body: Value = test::call_and_read_body_json(&app, test::TestRequest::get().uri(uri).to_request()).await;
            assert!(body.get("5.3.2024 9.7").is_some(), "{uri}");
        }
    }

    #[actix_web::test]
    async fn more_than_five_segments_is_rejected() {
        let app = app!();
        let req = test::TestRequest::get().uri("/api/query/a/b/c/d/e/f").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::get().uri("/api/query/a/b/c/d/W1/").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn missing_key_is_null() {
        let app = app!();
        let req = test::TestRequest::get().uri("/api/query/W9").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(test::read_body_json::<Value, _>(resp).await, Value::Null);
    }
}
