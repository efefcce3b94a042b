#![allow(dead_code)]

use async_trait::async_trait;
use hostel_analytics::{
    AppState,
    bridge::{AnalysisResult, AnalyticsEngine},
    identity::{IdentityClaims, IdentityError, IdentityProvider, SignedIn},
    models::{EngineHealth, NewProfile, ProfileData},
    router,
};
use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

pub const ADMIN_TOKEN: &str = "admin-token";
pub const STUDENT_TOKEN: &str = "student-token";

type Reply = Box<dyn Fn(&str) -> AnalysisResult + Send + Sync>;

/// Engine double that counts calls and answers from a closure.
pub struct MockEngine {
    calls: AtomicUsize,
    reply: Reply,
}

impl MockEngine {
    pub fn new(reply: impl Fn(&str) -> AnalysisResult + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            reply: Box::new(reply),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalyticsEngine for MockEngine {
    fn mode(&self) -> &'static str {
        "mock"
    }

    async fn fetch_daily_analysis(&self, date: &str) -> AnalysisResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.reply)(date)
    }

    async fn check_health(&self) -> EngineHealth {
        EngineHealth {
            available: true,
            details: Some(serde_json::json!({ "status": "healthy" })),
            error: None,
        }
    }
}

struct Account {
    uid: String,
    email: String,
    password: String,
    name: Option<String>,
}

/// In-memory identity provider: tokens are `token-<uid>` unless seeded.
#[derive(Default)]
pub struct MockIdentity {
    tokens: Mutex<HashMap<String, Account>>,
    deleted: Mutex<Vec<String>>,
}

impl MockIdentity {
    pub fn with_token(self, token: &str, uid: &str, email: &str, name: Option<&str>) -> Self {
        self.tokens.lock().unwrap().insert(
            token.to_string(),
            Account {
                uid: uid.to_string(),
                email: email.to_string(),
                password: "password1".to_string(),
                name: name.map(str::to_string),
            },
        );
        self
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdentityProvider for MockIdentity {
    async fn verify_token(&self, id_token: &str) -> Result<IdentityClaims, IdentityError> {
        let tokens = self.tokens.lock().unwrap();
        let account = tokens.get(id_token).ok_or(IdentityError::InvalidToken)?;
        Ok(IdentityClaims {
            uid: account.uid.clone(),
            email: Some(account.email.clone()),
            email_verified: true,
            name: account.name.clone(),
        })
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<SignedIn, IdentityError> {
        let mut tokens = self.tokens.lock().unwrap();
        if tokens.values().any(|account| account.email == email) {
            return Err(IdentityError::Rejected("Email is already registered".into()));
        }
        let uid = format!("uid-{email}");
        let token = format!("token-{uid}");
        tokens.insert(
            token.clone(),
            Account {
                uid: uid.clone(),
                email: email.to_string(),
                password: password.to_string(),
                name: Some(display_name.to_string()),
            },
        );
        Ok(SignedIn {
            uid,
            id_token: token,
            refresh_token: Some("refresh".into()),
        })
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<SignedIn, IdentityError> {
        let tokens = self.tokens.lock().unwrap();
        tokens
            .iter()
            .find(|(_, account)| account.email == email && account.password == password)
            .map(|(token, account)| SignedIn {
                uid: account.uid.clone(),
                id_token: token.clone(),
                refresh_token: Some("refresh".into()),
            })
            .ok_or(IdentityError::InvalidCredentials)
    }

    async fn delete_account(&self, id_token: &str) -> Result<(), IdentityError> {
        self.tokens.lock().unwrap().remove(id_token);
        self.deleted.lock().unwrap().push(id_token.to_string());
        Ok(())
    }
}

pub fn unique_data_path() -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let mut path = std::env::temp_dir();
    path.push(format!("hostel_analytics_{}_{}.json", std::process::id(), nanos));
    path
}

/// Store with one admin and one student whose tokens the default identity
/// double recognizes.
pub fn seeded_profiles() -> ProfileData {
    let mut data = ProfileData::default();
    data.insert(NewProfile {
        name: "Mess Warden".into(),
        email: "warden@hostel.edu".into(),
        roll_number: "STAFF-01".into(),
        hostel_room: "A-001".into(),
        firebase_uid: "admin-uid".into(),
        last_login: None,
    });
    data.by_uid_mut("admin-uid").unwrap().is_admin = true;
    data.insert(NewProfile {
        name: "Asha Rao".into(),
        email: "asha@hostel.edu".into(),
        roll_number: "21CS001".into(),
        hostel_room: "B-205".into(),
        firebase_uid: "student-uid".into(),
        last_login: None,
    });
    data
}

pub fn seeded_identity() -> MockIdentity {
    MockIdentity::default()
        .with_token(ADMIN_TOKEN, "admin-uid", "warden@hostel.edu", Some("Mess Warden"))
        .with_token(STUDENT_TOKEN, "student-uid", "asha@hostel.edu", Some("Asha Rao"))
}

pub struct TestApp {
    pub base_url: String,
    pub data_path: PathBuf,
    pub client: reqwest::Client,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.data_path);
    }
}

pub async fn spawn_app(
    engine: Arc<dyn AnalyticsEngine>,
    identity: Arc<dyn IdentityProvider>,
) -> TestApp {
    let data_path = unique_data_path();
    let state = AppState::new(data_path.clone(), seeded_profiles(), engine, identity);
    let base_url = serve(router(state)).await;
    TestApp {
        base_url,
        data_path,
        client: reqwest::Client::new(),
    }
}

/// Binds `router` to a random local port and serves it in the background.
pub async fn serve(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind random port");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// A local address nothing is listening on.
pub fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind random port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}

pub fn without_timestamp(mut body: serde_json::Value) -> serde_json::Value {
    if let Some(map) = body.as_object_mut() {
        map.remove("timestamp");
    }
    body
}

pub const SHORT_CEILING: Duration = Duration::from_millis(300);
