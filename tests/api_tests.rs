//! Integration tests for the HTTP surface.
//!
//! Requests are driven through the axum router with `tower::ServiceExt::oneshot`
//! against an in-memory database.

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use serde_json::{Value, json};
use std::sync::Arc;
use task_tracker::dashboard::{DashboardServer, build_router};
use task_tracker::db::Database;
use tower::ServiceExt;

fn setup_app() -> Router {
    let db = Database::open_in_memory().expect("Failed to create in-memory database");
    build_router(DashboardServer::new(Arc::new(db)))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn create(app: &Router, body: Value) -> Value {
    let (status, task) = send(app, Method::POST, "/tasks", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    task
}

mod task_routes {
    use super::*;

    #[tokio::test]
    async fn create_returns_201_with_defaults() {
        let app = setup_app();

        let task = create(&app, json!({ "title": "Buy milk", "due_date": "2024-06-15" })).await;

        assert!(task["id"].as_i64().unwrap() > 0);
        assert_eq!(task["title"], "Buy milk");
        assert_eq!(task["description"], "");
        assert_eq!(task["priority"], "Medium");
        assert_eq!(task["status"], "Open");
        assert_eq!(task["due_date"], "2024-06-15");
        assert!(task["created_at"].as_i64().is_some());
    }

    #[tokio::test]
    async fn create_without_required_fields_is_400() {
        let app = setup_app();

        let (status, body) =
            send(&app, Method::POST, "/tasks", Some(json!({ "title": "No date" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "title and due_date are required");
        assert_eq!(body["code"], "MISSING_REQUIRED_FIELD");

        let (status, _) =
            send(&app, Method::POST, "/tasks", Some(json!({ "due_date": "2024-06-15" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, list) = send(&app, Method::GET, "/tasks", None).await;
        assert_eq!(list, json!([]));
    }

    #[tokio::test]
    async fn create_with_invalid_enum_is_400() {
        let app = setup_app();

        let (status, body) = send(
            &app,
            Method::POST,
            "/tasks",
            Some(json!({ "title": "x", "due_date": "2024-06-15", "status": "Blocked" })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_FIELD_VALUE");
        assert_eq!(body["field"], "status");
    }

    #[tokio::test]
    async fn malformed_json_is_400() {
        let app = setup_app();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/tasks")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let app = setup_app();
        let created = create(
            &app,
            json!({
                "title": "File taxes",
                "description": "Federal",
                "priority": "High",
                "due_date": "2024-04-15",
                "status": "In Progress"
            }),
        )
        .await;

        let uri = format!("/tasks/{}", created["id"]);
        let (status, fetched) = send(&app, Method::GET, &uri, None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn title_and_date_are_stored_as_sent() {
        let app = setup_app();
        let created = create(&app, json!({ "title": "  Pay rent ", "due_date": "2024-06-05" })).await;
        assert_eq!(created["title"], "  Pay rent ");

        let uri = format!("/tasks/{}", created["id"]);
        let (_, fetched) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(fetched["title"], "  Pay rent ");
        assert_eq!(fetched["due_date"], "2024-06-05");

        let (_, patched) = send(&app, Method::PATCH, &uri, Some(json!({ "title": " Rent\t" }))).await;
        assert_eq!(patched["title"], " Rent\t");
    }

    #[tokio::test]
    async fn unpadded_due_date_is_400() {
        let app = setup_app();

        let (status, body) = send(
            &app,
            Method::POST,
            "/tasks",
            Some(json!({ "title": "Pay rent", "due_date": "2024-6-5" })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["field"], "due_date");
    }

    #[tokio::test]
    async fn list_filters_and_sorts() {
        let app = setup_app();
        create(&app, json!({ "title": "a", "due_date": "2024-06-20", "priority": "High" })).await;
        create(&app, json!({ "title": "b", "due_date": "2024-06-11", "priority": "Low" })).await;
        create(
            &app,
            json!({ "title": "c", "due_date": "2024-06-01", "priority": "High", "status": "Done" }),
        )
        .await;

        let (_, all) = send(&app, Method::GET, "/tasks", None).await;
        let titles: Vec<&str> = all
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["title"].as_str().unwrap())
            .collect();
        assert_eq!(titles, vec!["c", "b", "a"]);

        let (_, open_high) = send(&app, Method::GET, "/tasks?status=Open&priority=High", None).await;
        assert_eq!(open_high.as_array().unwrap().len(), 1);
        assert_eq!(open_high[0]["title"], "a");

        let (_, by_due) = send(&app, Method::GET, "/tasks?sort=due_date", None).await;
        assert_eq!(by_due[0]["title"], "c");
        assert_eq!(by_due[2]["title"], "a");

        let (_, in_progress) =
            send(&app, Method::GET, "/tasks?status=In%20Progress", None).await;
        assert_eq!(in_progress, json!([]));
    }

    #[tokio::test]
    async fn list_filters_are_exact_match() {
        let app = setup_app();
        create(&app, json!({ "title": "a", "due_date": "2024-06-15", "priority": "High" })).await;

        for uri in [
            "/tasks?status=open",
            "/tasks?priority=high",
            "/tasks?priority=Urgent",
            "/tasks?status=in_progress",
        ] {
            let (status, body) = send(&app, Method::GET, uri, None).await;
            assert_eq!(status, StatusCode::OK, "{uri}");
            assert_eq!(body, json!([]), "{uri}");
        }

        let (_, body) = send(&app, Method::GET, "/tasks?status=Open&priority=High", None).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn patch_updates_fields() {
        let app = setup_app();
        let created = create(&app, json!({ "title": "Draft", "due_date": "2024-06-15" })).await;
        let uri = format!("/tasks/{}", created["id"]);

        let (status, updated) =
            send(&app, Method::PATCH, &uri, Some(json!({ "status": "Done" }))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["status"], "Done");
        assert_eq!(updated["title"], "Draft");
        assert_eq!(updated["created_at"], created["created_at"]);
    }

    #[tokio::test]
    async fn patch_with_no_fields_is_distinct_from_not_found() {
        let app = setup_app();
        let created = create(&app, json!({ "title": "Keep", "due_date": "2024-06-15" })).await;
        let uri = format!("/tasks/{}", created["id"]);

        let (status, body) = send(&app, Method::PATCH, &uri, Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "NO_UPDATABLE_FIELDS");
        assert_eq!(body["error"], "no updatable fields provided");

        let (status, body) = send(&app, Method::PATCH, &uri, Some(json!({ "id": 99 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "NO_UPDATABLE_FIELDS");

        let (_, unchanged) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(unchanged, created);

        let (status, body) = send(
            &app,
            Method::PATCH,
            "/tasks/9999",
            Some(json!({ "title": "ghost" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "TASK_NOT_FOUND");
    }

    #[tokio::test]
    async fn blank_priority_means_unchanged_on_patch() {
        let app = setup_app();
        let created = create(
            &app,
            json!({ "title": "Keep", "due_date": "2024-06-15", "priority": "" }),
        )
        .await;
        assert_eq!(created["priority"], "Medium");
        let uri = format!("/tasks/{}", created["id"]);

        let (status, body) = send(&app, Method::PATCH, &uri, Some(json!({ "priority": "" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "NO_UPDATABLE_FIELDS");

        let (status, body) = send(
            &app,
            Method::PATCH,
            &uri,
            Some(json!({ "priority": "", "status": "Done" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["priority"], "Medium");
        assert_eq!(body["status"], "Done");
    }

    #[tokio::test]
    async fn delete_then_delete_again() {
        let app = setup_app();
        let created = create(&app, json!({ "title": "Temp", "due_date": "2024-06-15" })).await;
        let uri = format!("/tasks/{}", created["id"]);

        let (status, body) = send(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "success": true }));

        let (status, body) = send(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "TASK_NOT_FOUND");

        let (status, _) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn non_numeric_id_is_404() {
        let app = setup_app();
        let (status, _) = send(&app, Method::DELETE, "/tasks/abc", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

mod insights_route {
    use super::*;

    #[tokio::test]
    async fn insights_for_reference_date() {
        let app = setup_app();
        create(&app, json!({ "title": "a", "due_date": "2024-06-15", "priority": "High" })).await;
        create(&app, json!({ "title": "b", "due_date": "2024-06-17", "priority": "High" })).await;
        create(&app, json!({ "title": "c", "due_date": "2024-06-12", "priority": "Low" })).await;
        create(
            &app,
            json!({ "title": "d", "due_date": "2024-06-12", "priority": "Medium", "status": "Done" }),
        )
        .await;

        let (status, body) = send(&app, Method::GET, "/insights?date=2024-06-10", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totalOpen"], 3);
        assert_eq!(
            body["priorityDistribution"],
            json!({ "Low": 1, "Medium": 0, "High": 2 })
        );
        assert_eq!(body["dueSoonCount"], 2);
        assert_eq!(
            body["insight"],
            "You have 3 open tasks. 2 are due in the next 7 days. \
             Most of your open tasks are High priority. \
             Priority breakdown \u{2014} High: 2, Medium: 0, Low: 1."
        );
    }

    #[tokio::test]
    async fn insights_on_empty_store() {
        let app = setup_app();

        let (status, body) = send(&app, Method::GET, "/insights", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totalOpen"], 0);
        assert_eq!(body["dueSoonCount"], 0);
        assert_eq!(
            body["priorityDistribution"],
            json!({ "Low": 0, "Medium": 0, "High": 0 })
        );
        assert!(
            body["insight"]
                .as_str()
                .unwrap()
                .starts_with("You have 0 open tasks.")
        );
    }

    #[tokio::test]
    async fn insights_with_bad_date_is_400() {
        let app = setup_app();
        let (status, body) = send(&app, Method::GET, "/insights?date=soon", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["field"], "date");
    }
}

mod static_routes {
    use super::*;

    #[tokio::test]
    async fn serves_client_and_health() {
        let app = setup_app();

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&html).contains("/app.js"));

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/app.js").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            response.headers()["content-type"]
                .to_str()
                .unwrap()
                .starts_with("application/javascript")
        );

        let (status, body) = send(&app, Method::GET, "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }
}
