use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Duration, Utc};
use http_body_util::BodyExt;
use tower::ServiceExt;

use crate::audit::testing::RecordingAuditLog;
use crate::audit::AuditLog;
use crate::db::memory::MemoryRepository;
use crate::db::schema::{Account, Choice, Question};
use crate::db::Repository;
use crate::handler::AppData;
use crate::routes;
use crate::session::DEFAULT_SESSION_TTL_MINUTES;
use crate::support::password::hash_password_with;

pub const PASSWORD: &str = "correct horse";

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn location(&self) -> Option<&str> {
        self.headers.get(header::LOCATION).and_then(|v| v.to_str().ok())
    }
}

pub struct TestApp {
    pub repo: Arc<MemoryRepository>,
    pub audit: Arc<RecordingAuditLog>,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        let repo = Arc::new(MemoryRepository::new());
        let audit = Arc::new(RecordingAuditLog::default());
        let data = AppData::new(
            repo.clone() as Arc<dyn Repository>,
            audit.clone() as Arc<dyn AuditLog>,
            Duration::minutes(DEFAULT_SESSION_TTL_MINUTES),
        );
        let router = routes::router(data)
            .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 5555))));

        Self { repo, audit, router }
    }

    /// Question whose dates are offset from now by whole days.
    pub async fn question(&self, text: &str, pub_days: i64, end_days: i64, choices: &[&str]) -> (Question, Vec<Choice>) {
        let now = Utc::now();
        self.question_at(text, now + Duration::days(pub_days), now + Duration::days(end_days), choices).await
    }

    pub async fn question_at(&self, text: &str, pub_date: DateTime<Utc>, end_date: DateTime<Utc>, choices: &[&str]) -> (Question, Vec<Choice>) {
        let choices = choices.iter().map(|v| v.to_string()).collect::<Vec<_>>();
        self.repo.add_question(text, pub_date, end_date, &choices).await.unwrap()
    }

    pub async fn account(&self, username: &str) -> Account {
        self.repo.add_account(username, &hash_password_with(PASSWORD, 2)).await.unwrap()
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();

        TestResponse {
            status,
            headers,
            body: String::from_utf8(bytes.to_vec()).unwrap(),
        }
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> TestResponse {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(v) = cookie {
            builder = builder.header(header::COOKIE, v);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn post_form(&self, uri: &str, form: &str, cookie: Option<&str>, headers: &[(&str, &str)]) -> TestResponse {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(v) = cookie {
            builder = builder.header(header::COOKIE, v);
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        self.send(builder.body(Body::from(form.to_owned())).unwrap()).await
    }

    /// Creates the account and logs in, returning the `Cookie` header value.
    pub async fn login(&self, username: &str) -> String {
        self.account(username).await;

        let response = self.post_form(
            "/accounts/login/",
            &format!("username={}&password=correct+horse", username),
            None,
            &[],
        ).await;
        assert_eq!(response.status, StatusCode::SEE_OTHER);

        let set_cookie = response.headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
        set_cookie.split(';').next().unwrap().to_owned()
    }
}
