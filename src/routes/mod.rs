use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, create_security_header_layers};
use crate::handlers::{attendees, health_check, meetings, tags};
use crate::state::AppState;

pub fn create_routes(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route("/health", get(health_check))
        .route("/meetings", get(meetings::list_meetings))
        .route("/tags", get(tags::list_tags))
        .route("/meeting", post(meetings::create_meeting))
        .route(
            "/meeting/:id",
            get(meetings::get_meeting)
                .put(meetings::update_meeting)
                .delete(meetings::delete_meeting),
        )
        .route("/meeting/:id/calendar", get(meetings::get_calendar))
        .route("/meeting/:id/comment", post(meetings::add_comment))
        .route("/meeting/:id/image", post(meetings::attach_image))
        .route("/meeting/:id/attendees", get(attendees::list_attendees))
        .route(
            "/meeting/:id/attendees/csv",
            get(attendees::export_attendees),
        )
        .route("/meeting/:id/bookings", get(attendees::list_bookings))
        .route(
            "/meeting/:id/attendee/:username/attend",
            put(attendees::attend).delete(attendees::leave),
        )
        .route(
            "/meeting/:id/attendee/:username/confirm",
            put(attendees::confirm).delete(attendees::reject),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    for layer in create_security_header_layers() {
        router = router.layer(layer);
    }

    router.layer(create_cors_layer())
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::calendar::CalendarSettings;
    use crate::images::testing::MemoryImageStore;
    use crate::notifications::dispatcher::testing::store_with_users;
    use crate::notifications::outbox::testing::RecordingOutbox;
    use crate::notifications::NotificationKind;

    struct TestApp {
        router: Router,
        outbox: Arc<RecordingOutbox>,
    }

    async fn app() -> TestApp {
        let store = store_with_users(&["alice", "bob"]).await;
        let outbox = Arc::new(RecordingOutbox::default());
        let state = AppState::new(
            store,
            outbox.clone(),
            Arc::new(MemoryImageStore::default()),
            CalendarSettings {
                domain: "evendemy.test".into(),
                organizer: "noreply@evendemy.test".into(),
            },
        );
        TestApp {
            router: create_routes(state),
            outbox,
        }
    }

    impl TestApp {
        async fn call(
            &self,
            method: Method,
            uri: &str,
            user: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Vec<u8>) {
            let mut request = Request::builder().method(method).uri(uri);
            if let Some(user) = user {
                request = request.header("X-Username", user);
            }
            let body = match body {
                Some(json) => {
                    request = request.header(header::CONTENT_TYPE, "application/json");
                    Body::from(json.to_string())
                }
                None => Body::empty(),
            };

            let response = self
                .router
                .clone()
                .oneshot(request.body(body).unwrap())
                .await
                .unwrap();
            let status = response.status();
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            (status, bytes.to_vec())
        }

        async fn json(
            &self,
            method: Method,
            uri: &str,
            user: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let (status, bytes) = self.call(method, uri, user, body).await;
            (status, serde_json::from_slice(&bytes).unwrap())
        }

        async fn create(&self, owner: &str) -> i64 {
            let (status, meeting) = self
                .json(
                    Method::POST,
                    "/meeting",
                    Some(owner),
                    Some(json!({
                        "title": "Rust 101",
                        "startTime": "2099-05-11T12:00:00Z",
                        "endTime": "2099-05-11T14:00:00Z",
                        "location": "Room 1",
                        "numberOfAllowedExternals": 1,
                        "tags": ["ignored"]
                    })),
                )
                .await;
            assert_eq!(status, StatusCode::OK);
            meeting["mid"].as_i64().unwrap()
        }
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = app().await;

        let (status, body) = app.json(Method::GET, "/health", None, None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_create_requires_username_header() {
        let app = app().await;

        let (status, body) = app
            .json(Method::POST, "/meeting", None, Some(json!({"title": "x"})))
            .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_create_and_fetch_meeting() {
        let app = app().await;
        let mid = app.create("alice").await;

        let (status, meeting) = app
            .json(Method::GET, &format!("/meeting/{mid}"), None, None)
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(meeting["username"], "alice");
        assert_eq!(meeting["tags"], json!([]));
        let kinds: Vec<_> = app.outbox.take().iter().map(|n| n.kind).collect();
        assert_eq!(kinds, vec![NotificationKind::NewMeeting]);
    }

    #[tokio::test]
    async fn test_missing_meeting_is_404_with_error_body() {
        let app = app().await;

        let (status, body) = app.json(Method::GET, "/meeting/77", None, None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "No meeting found with id 77");
    }

    #[tokio::test]
    async fn test_update_by_non_owner_is_403() {
        let app = app().await;
        let mid = app.create("alice").await;

        let (status, _) = app
            .json(
                Method::PUT,
                &format!("/meeting/{mid}"),
                Some("bob"),
                Some(json!({"location": "Room 2"})),
            )
            .await;

        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_delete_hides_meeting_from_listing() {
        let app = app().await;
        let mid = app.create("alice").await;

        let (status, deleted) = app
            .json(Method::DELETE, &format!("/meeting/{mid}"), Some("alice"), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(deleted["deleted"], true);

        let (_, listed) = app.json(Method::GET, "/meetings", None, None).await;
        assert_eq!(listed, json!([]));
        let (status, _) = app
            .json(Method::GET, &format!("/meeting/{mid}"), None, None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_listing_applies_query_filter() {
        let app = app().await;
        app.create("alice").await;
        app.create("bob").await;

        let (_, mine) = app
            .json(Method::GET, "/meetings?username=bob&showNew=true", None, None)
            .await;
        let (_, old) = app
            .json(Method::GET, "/meetings?showOld=true", None, None)
            .await;

        assert_eq!(mine.as_array().unwrap().len(), 1);
        assert_eq!(mine[0]["username"], "bob");
        assert_eq!(old, json!([]));
    }

    #[tokio::test]
    async fn test_attend_and_list_attendees() {
        let app = app().await;
        let mid = app.create("alice").await;

        let (status, attendance) = app
            .json(
                Method::PUT,
                &format!("/meeting/{mid}/attendee/bob/attend"),
                Some("bob"),
                Some(json!({"externals": 1})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(attendance["externals"], 1);

        let (_, attendees) = app
            .json(Method::GET, &format!("/meeting/{mid}/attendees"), None, None)
            .await;
        assert_eq!(attendees[0]["username"], "bob");

        let (_, bookings) = app
            .json(Method::GET, &format!("/meeting/{mid}/bookings"), None, None)
            .await;
        assert_eq!(bookings[0]["user"]["email"], "bob@example.com");
    }

    #[tokio::test]
    async fn test_attend_without_body_registers_no_guests() {
        let app = app().await;
        let mid = app.create("alice").await;

        let (status, attendance) = app
            .json(
                Method::PUT,
                &format!("/meeting/{mid}/attendee/bob/attend"),
                Some("bob"),
                None,
            )
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(attendance["externals"], 0);
    }

    #[tokio::test]
    async fn test_comment_on_missing_meeting_is_404() {
        let app = app().await;

        let (status, _) = app
            .json(
                Method::POST,
                "/meeting/5/comment",
                Some("bob"),
                Some(json!({"text": "hello"})),
            )
            .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(app.outbox.take().is_empty());
    }

    #[tokio::test]
    async fn test_calendar_and_csv_downloads() {
        let app = app().await;
        let mid = app.create("alice").await;
        app.call(
            Method::PUT,
            &format!("/meeting/{mid}/attendee/bob/attend"),
            Some("bob"),
            None,
        )
        .await;

        let (status, ics) = app
            .call(Method::GET, &format!("/meeting/{mid}/calendar"), None, None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(String::from_utf8(ics).unwrap().starts_with("BEGIN:VCALENDAR"));

        let (status, csv) = app
            .call(
                Method::GET,
                &format!("/meeting/{mid}/attendees/csv"),
                Some("alice"),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(String::from_utf8(csv).unwrap().starts_with("username,"));
    }

    #[tokio::test]
    async fn test_security_headers_are_set() {
        let app = app().await;

        let response = app
            .router
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.headers()["x-content-type-options"], "nosniff");
        assert_eq!(response.headers()["x-frame-options"], "DENY");
    }
}
