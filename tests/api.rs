//! In-process HTTP tests for the Temple API.
//!
//! Each test builds the full router (middleware included) over an in-memory
//! store, a recording SMS gateway and a manual clock, then drives it with
//! `tower::ServiceExt::oneshot`.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use secrecy::SecretString;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use temple::{
    api::{self, state::AppState},
    clock::{Clock, ManualClock},
    identity::MemoryStore,
    otp::OtpEngine,
    session::SessionIssuer,
    sms::DeliveryGateway,
};
use tower::ServiceExt;

const ADMIN_SECRET: &str = "temple-admin-secret";
const MOBILE: &str = "+919876543210";

#[derive(Default)]
struct RecordingGateway {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingGateway {
    fn last_code(&self) -> Option<String> {
        self.sent
            .lock()
            .ok()
            .and_then(|sent| sent.last().map(|(_, code)| code.clone()))
    }
}

#[async_trait]
impl DeliveryGateway for RecordingGateway {
    async fn send(&self, mobile_number: &str, code: &str) -> bool {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((mobile_number.to_string(), code.to_string()));
        }
        true
    }
}

struct TestApp {
    router: Router,
    gateway: Arc<RecordingGateway>,
    clock: Arc<ManualClock>,
}

impl TestApp {
    fn new() -> Result<Self> {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(RecordingGateway::default());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let shared_clock: Arc<dyn Clock> = clock.clone();

        let sessions = SessionIssuer::new(
            &SecretString::from("integration-secret".to_string()),
            shared_clock.clone(),
        );
        let engine = OtpEngine::new(
            store.clone(),
            gateway.clone(),
            sessions,
            shared_clock.clone(),
        );
        let state = AppState::new(store, engine, shared_clock)
            .with_admin_secret(Some(SecretString::from(ADMIN_SECRET.to_string())));

        Ok(Self {
            router: api::app(Arc::new(state), None)?,
            gateway,
            clock,
        })
    }

    async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        self.call_with_headers(method, uri, token, &[], body).await
    }

    async fn call_with_headers(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        headers: &[(&str, &str)],
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body)?))?,
            None => request.body(Body::empty())?,
        };

        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        Ok((status, value))
    }

    async fn request_code(&self, mobile: &str) -> Result<String> {
        let (status, _) = self
            .call(
                Method::POST,
                "/api/otp-auth/request-otp",
                None,
                Some(json!({ "mobileNumber": mobile })),
            )
            .await?;
        assert_eq!(status, StatusCode::OK);
        self.gateway.last_code().context("no code was sent")
    }

    /// Run the full first-time flow and return the member's token.
    async fn register_member(&self, mobile: &str, name: &str, email: &str) -> Result<String> {
        let code = self.request_code(mobile).await?;
        let (status, body) = self
            .call(
                Method::POST,
                "/api/otp-auth/verify-otp",
                None,
                Some(json!({
                    "mobileNumber": mobile,
                    "otp": code,
                    "userData": { "name": name, "email": email }
                })),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED);
        token_of(&body)
    }

    async fn register_admin(&self) -> Result<String> {
        let (status, body) = self
            .call_with_headers(
                Method::POST,
                "/api/auth/register/admin",
                None,
                &[("admin-secret-key", ADMIN_SECRET)],
                Some(json!({ "mobileNumber": "+910000000001", "name": "Head Priest" })),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED);
        token_of(&body)
    }

    async fn own_devotee_id(&self, token: &str) -> Result<String> {
        let (status, body) = self
            .call(Method::GET, "/api/auth/profile", Some(token), None)
            .await?;
        assert_eq!(status, StatusCode::OK);
        body["devotee"]["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("profile has no devotee: {body}"))
    }
}

fn token_of(body: &Value) -> Result<String> {
    body["token"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("response has no token: {body}"))
}

fn wrong_code(code: &str) -> &'static str {
    if code == "000000" {
        "111111"
    } else {
        "000000"
    }
}

#[tokio::test]
async fn request_otp_requires_mobile_number() -> Result<()> {
    let app = TestApp::new()?;

    let (status, body) = app
        .call(Method::POST, "/api/otp-auth/request-otp", None, Some(json!({})))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());

    let (status, _) = app
        .call(Method::POST, "/api/otp-auth/request-otp", None, None)
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn first_login_registers_then_returning_login() -> Result<()> {
    let app = TestApp::new()?;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/otp-auth/request-otp",
            None,
            Some(json!({ "mobileNumber": MOBILE })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["userExists"], json!(false));
    let code = app.gateway.last_code().context("no code was sent")?;
    assert_eq!(code.len(), 6);

    // Unknown number.
    let (status, body) = app
        .call(
            Method::POST,
            "/api/otp-auth/verify-otp",
            None,
            Some(json!({ "mobileNumber": "+910000000000", "otp": code })),
        )
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], json!("User not found"));

    // Wrong code.
    let (status, body) = app
        .call(
            Method::POST,
            "/api/otp-auth/verify-otp",
            None,
            Some(json!({ "mobileNumber": MOBILE, "otp": wrong_code(&code) })),
        )
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], json!("Invalid OTP"));

    // Right code, no profile yet.
    let (status, body) = app
        .call(
            Method::POST,
            "/api/otp-auth/verify-otp",
            None,
            Some(json!({ "mobileNumber": MOBILE, "otp": code })),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["requiresRegistration"], json!(true));

    // Same code again, now with profile data.
    let (status, body) = app
        .call(
            Method::POST,
            "/api/otp-auth/verify-otp",
            None,
            Some(json!({
                "mobileNumber": MOBILE,
                "otp": code,
                "userData": { "name": "Asha", "email": "Asha@Example.com", "city": "Pune" }
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["isNewUser"], json!(true));
    assert_eq!(body["user"]["role"], json!("user"));
    assert_eq!(body["user"]["email"], json!("asha@example.com"));
    let token = token_of(&body)?;

    // The code is single use.
    let (status, _) = app
        .call(
            Method::POST,
            "/api/otp-auth/verify-otp",
            None,
            Some(json!({ "mobileNumber": MOBILE, "otp": code })),
        )
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .call(Method::GET, "/api/auth/profile", Some(&token), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["mobileNumber"], json!(MOBILE));
    assert_eq!(body["devotee"]["name"], json!("Asha"));
    assert_eq!(body["devotee"]["city"], json!("Pune"));
    assert_eq!(body["devotee"]["country"], json!("India"));

    // Returning member.
    let (status, body) = app
        .call(
            Method::POST,
            "/api/otp-auth/request-otp",
            None,
            Some(json!({ "mobileNumber": MOBILE })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["userExists"], json!(true));
    let code = app.gateway.last_code().context("no code was sent")?;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/otp-auth/verify-otp",
            None,
            Some(json!({ "mobileNumber": MOBILE, "otp": code })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isNewUser"], json!(false));
    assert_eq!(body["message"], json!("Login successful"));
    Ok(())
}

#[tokio::test]
async fn expired_code_is_rejected() -> Result<()> {
    let app = TestApp::new()?;
    let code = app.request_code(MOBILE).await?;

    app.clock.advance(Duration::minutes(11));

    let (status, body) = app
        .call(
            Method::POST,
            "/api/otp-auth/verify-otp",
            None,
            Some(json!({ "mobileNumber": MOBILE, "otp": code })),
        )
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], json!("OTP expired"));
    Ok(())
}

#[tokio::test]
async fn profile_requires_valid_unexpired_token() -> Result<()> {
    let app = TestApp::new()?;

    let (status, body) = app
        .call(Method::GET, "/api/auth/profile", None, None)
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        body["message"],
        json!("No token provided, authorization denied")
    );

    let (status, _) = app
        .call(Method::GET, "/api/auth/profile", Some("not-a-token"), None)
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = app
        .register_member(MOBILE, "Asha", "asha@example.com")
        .await?;
    app.clock.advance(Duration::hours(25));
    let (status, _) = app
        .call(Method::GET, "/api/auth/profile", Some(&token), None)
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn admin_registration_needs_secret() -> Result<()> {
    let app = TestApp::new()?;
    let payload = json!({ "mobileNumber": "+910000000001", "name": "Head Priest" });

    let (status, _) = app
        .call(
            Method::POST,
            "/api/auth/register/admin",
            None,
            Some(payload.clone()),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .call_with_headers(
            Method::POST,
            "/api/auth/register/admin",
            None,
            &[("admin-secret-key", "guess")],
            Some(payload.clone()),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .call_with_headers(
            Method::POST,
            "/api/auth/register/admin",
            None,
            &[("admin-secret-key", ADMIN_SECRET)],
            Some(payload.clone()),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["role"], json!("admin"));

    // The number is now taken.
    let (status, _) = app
        .call_with_headers(
            Method::POST,
            "/api/auth/register/admin",
            None,
            &[("admin-secret-key", ADMIN_SECRET)],
            Some(payload),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn password_endpoints_redirect_to_otp() -> Result<()> {
    let app = TestApp::new()?;
    for uri in ["/api/auth/login", "/api/auth/register"] {
        let (status, body) = app.call(Method::POST, uri, None, None).await?;
        assert_eq!(status, StatusCode::PERMANENT_REDIRECT);
        assert!(body["redirectTo"].is_string());
    }
    Ok(())
}

#[tokio::test]
async fn members_only_reach_their_own_devotee() -> Result<()> {
    let app = TestApp::new()?;
    let admin = app.register_admin().await?;
    let member = app
        .register_member(MOBILE, "Asha", "asha@example.com")
        .await?;
    let own_id = app.own_devotee_id(&member).await?;

    let (status, _) = app
        .call(Method::GET, "/api/devotees", Some(&member), None)
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .call(
            Method::POST,
            "/api/devotees",
            Some(&admin),
            Some(json!({ "name": "Ravi", "membershipType": "lifetime" })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    let other_id = body["id"].as_str().context("devotee id")?.to_string();

    let (status, _) = app
        .call(
            Method::GET,
            &format!("/api/devotees/{other_id}"),
            Some(&member),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .call(
            Method::GET,
            &format!("/api/devotees/{own_id}"),
            Some(&member),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], json!("Asha"));

    let (status, body) = app
        .call(
            Method::PATCH,
            &format!("/api/devotees/{own_id}"),
            Some(&member),
            Some(json!({ "phone": "020-1234567" })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phone"], json!("020-1234567"));

    let (status, _) = app
        .call(
            Method::PATCH,
            &format!("/api/devotees/{own_id}"),
            Some(&member),
            Some(json!({ "membershipType": "trustee" })),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .call(Method::GET, "/api/devotees", Some(&admin), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(3));
    Ok(())
}

#[tokio::test]
async fn admin_manages_donations_and_deletes() -> Result<()> {
    let app = TestApp::new()?;
    let admin = app.register_admin().await?;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/devotees",
            Some(&admin),
            Some(json!({ "name": "Ravi" })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["membershipType"], json!("regular"));
    let id = body["id"].as_str().context("devotee id")?.to_string();

    let (status, _) = app
        .call(
            Method::POST,
            &format!("/api/devotees/{id}/donations"),
            Some(&admin),
            Some(json!({ "amount": -5.0 })),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .call(
            Method::POST,
            &format!("/api/devotees/{id}/donations"),
            Some(&admin),
            Some(json!({ "amount": 501.0, "purpose": "Annadanam", "paymentMethod": "online" })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["donationHistory"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["donationHistory"][0]["paymentMethod"], json!("online"));

    let (status, _) = app
        .call(
            Method::DELETE,
            &format!("/api/devotees/{id}"),
            Some(&admin),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .call(
            Method::DELETE,
            &format!("/api/devotees/{id}"),
            Some(&admin),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn announcements_are_public_but_admin_managed() -> Result<()> {
    let app = TestApp::new()?;
    let admin = app.register_admin().await?;
    let member = app
        .register_member(MOBILE, "Asha", "asha@example.com")
        .await?;
    let start = Utc::now();
    let announcement = json!({
        "title": "Diwali Celebration",
        "dateRange": "Nov 1 - Nov 3",
        "description": "Lamps and prasad for all",
        "startDate": start.to_rfc3339(),
        "endDate": (start + Duration::days(2)).to_rfc3339(),
    });

    let (status, _) = app
        .call(
            Method::POST,
            "/api/announcements",
            Some(&member),
            Some(announcement.clone()),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .call(
            Method::POST,
            "/api/announcements",
            Some(&admin),
            Some(announcement),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["isActive"], json!(true));

    let (status, body) = app
        .call(Method::GET, "/api/announcements", None, None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["title"], json!("Diwali Celebration"));
    Ok(())
}

#[tokio::test]
async fn health_status_and_banner() -> Result<()> {
    let app = TestApp::new()?;

    let (status, body) = app.call(Method::GET, "/health", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], json!("ok"));
    assert_eq!(body["name"], json!(env!("CARGO_PKG_NAME")));

    let (status, body) = app.call(Method::OPTIONS, "/health", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::Null);

    let (status, body) = app.call(Method::GET, "/api/status", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("online"));

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    assert_eq!(&bytes[..], b"Temple Management API is running");
    Ok(())
}

fn id_of(body: &Value) -> Result<String> {
    body["id"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("response has no id: {body}"))
}

#[tokio::test]
async fn event_sign_ups_respect_capacity() -> Result<()> {
    let app = TestApp::new()?;
    let admin = app.register_admin().await?;
    let asha = app
        .register_member(MOBILE, "Asha", "asha@example.com")
        .await?;
    let ravi = app
        .register_member("+919812345678", "Ravi", "ravi@example.com")
        .await?;
    let now = Utc::now();
    let event = |title: &str, date: chrono::DateTime<Utc>, required: bool| {
        json!({
            "title": title,
            "description": "All are welcome",
            "date": date.to_rfc3339(),
            "startTime": "18:00",
            "endTime": "20:00",
            "location": "Main hall",
            "eventType": "festival",
            "registrationRequired": required,
            "maxAttendees": 1,
        })
    };

    let (status, _) = app
        .call(
            Method::POST,
            "/api/events",
            Some(&asha),
            Some(event("Aarti", now + Duration::days(2), true)),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .call(
            Method::POST,
            "/api/events",
            Some(&admin),
            Some(event("Aarti", now + Duration::days(2), true)),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    let aarti = id_of(&body)?;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/events",
            Some(&admin),
            Some(event("Satsang", now + Duration::days(3), false)),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    let satsang = id_of(&body)?;

    let (status, _) = app
        .call(
            Method::POST,
            "/api/events",
            Some(&admin),
            Some(event("Last year", now - Duration::days(3), false)),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);

    let register = format!("/api/events/{aarti}/register");
    let (status, body) = app.call(Method::POST, &register, Some(&asha), None).await?;
    assert_eq!(status, StatusCode::OK);
    let asha_devotee = app.own_devotee_id(&asha).await?;
    assert_eq!(body["registeredDevotees"], json!([asha_devotee]));

    let (status, body) = app.call(Method::POST, &register, Some(&asha), None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        json!("You are already registered for this event")
    );

    let (status, body) = app.call(Method::POST, &register, Some(&ravi), None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], json!("Event is full"));

    let (status, body) = app
        .call(
            Method::POST,
            &format!("/api/events/{satsang}/register"),
            Some(&ravi),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        json!("Registration is not required for this event")
    );

    let (status, body) = app.call(Method::GET, "/api/events", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(3));

    let (status, body) = app
        .call(Method::GET, "/api/events/upcoming", None, None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    let titles: Vec<&str> = body
        .as_array()
        .map(|events| events.iter().filter_map(|e| e["title"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(titles, ["Aarti", "Satsang"]);
    Ok(())
}

#[tokio::test]
async fn puja_bookings_are_owned_and_priced_by_the_catalogue() -> Result<()> {
    let app = TestApp::new()?;
    let admin = app.register_admin().await?;
    let asha = app
        .register_member(MOBILE, "Asha", "asha@example.com")
        .await?;
    let ravi = app
        .register_member("+919812345678", "Ravi", "ravi@example.com")
        .await?;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/pujas",
            Some(&admin),
            Some(json!({
                "name": "Satyanarayan Puja",
                "description": "Full moon puja",
                "category": "regular",
                "duration": "2 hours",
                "cost": 1100.0,
                "requirements": ["flowers", "fruits"],
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    let puja = id_of(&body)?;

    let (status, body) = app.call(Method::GET, "/api/pujas", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["name"], json!("Satyanarayan Puja"));

    let (status, body) = app
        .call(
            Method::POST,
            "/api/pujas/book",
            Some(&asha),
            Some(json!({
                "pujaId": puja,
                "date": (Utc::now() + Duration::days(7)).to_rfc3339(),
                "time": "09:00",
                "location": "temple",
                "paymentMethod": "offline",
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["paymentAmount"], json!(1100.0));
    assert_eq!(body["status"], json!("pending"));
    let booking = id_of(&body)?;

    let (status, body) = app
        .call(Method::GET, "/api/pujas/bookings", Some(&asha), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(1));

    let (status, body) = app
        .call(Method::GET, "/api/pujas/bookings", Some(&ravi), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    let cancel = format!("/api/pujas/bookings/{booking}");
    let (status, _) = app.call(Method::DELETE, &cancel, Some(&ravi), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .call(Method::GET, "/api/pujas/admin/bookings", Some(&asha), None)
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .call(Method::GET, "/api/pujas/admin/bookings", Some(&admin), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["id"], json!(booking));

    let (status, body) = app
        .call(
            Method::PATCH,
            &format!("/api/pujas/admin/bookings/{booking}"),
            Some(&admin),
            Some(json!({ "status": "completed" })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("completed"));

    let (status, body) = app.call(Method::DELETE, &cancel, Some(&asha), None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], json!("Cannot cancel a completed booking"));
    Ok(())
}

#[tokio::test]
async fn members_cancel_their_pending_bookings() -> Result<()> {
    let app = TestApp::new()?;
    let admin = app.register_admin().await?;
    let asha = app
        .register_member(MOBILE, "Asha", "asha@example.com")
        .await?;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/pujas",
            Some(&admin),
            Some(json!({
                "name": "Griha Pravesh",
                "description": "House warming",
                "category": "lifeEvents",
                "duration": "3 hours",
                "cost": 2100.0,
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    let puja = id_of(&body)?;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/pujas/book",
            Some(&asha),
            Some(json!({
                "pujaId": puja,
                "date": (Utc::now() + Duration::days(14)).to_rfc3339(),
                "time": "07:30",
                "location": "residence",
                "instructions": "Second floor",
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    let booking = id_of(&body)?;

    let (status, body) = app
        .call(
            Method::DELETE,
            &format!("/api/pujas/bookings/{booking}"),
            Some(&asha),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], json!("Booking cancelled successfully"));

    let (status, body) = app
        .call(Method::GET, "/api/pujas/bookings", Some(&asha), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["status"], json!("cancelled"));

    let (status, body) = app
        .call(
            Method::POST,
            "/api/pujas/book",
            Some(&asha),
            Some(json!({
                "pujaId": uuid::Uuid::new_v4(),
                "date": Utc::now().to_rfc3339(),
                "time": "07:30",
                "location": "temple",
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], json!("Puja not found"));
    Ok(())
}

#[tokio::test]
async fn payments_are_visible_to_their_owner_and_admins() -> Result<()> {
    let app = TestApp::new()?;
    let admin = app.register_admin().await?;
    let asha = app
        .register_member(MOBILE, "Asha", "asha@example.com")
        .await?;
    let ravi = app
        .register_member("+919812345678", "Ravi", "ravi@example.com")
        .await?;

    let (status, _) = app
        .call(
            Method::POST,
            "/api/payments",
            Some(&asha),
            Some(json!({ "amount": 0, "paymentType": "online" })),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .call(
            Method::POST,
            "/api/payments",
            Some(&asha),
            Some(json!({
                "amount": 501.0,
                "paymentType": "online",
                "description": "Annadanam",
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], json!("pending"));
    let payment = id_of(&body)?;
    let uri = format!("/api/payments/{payment}");

    let (status, body) = app
        .call(Method::GET, "/api/payments/my-payments", Some(&asha), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["id"], json!(payment));

    let (status, body) = app
        .call(Method::GET, "/api/payments/my-payments", Some(&ravi), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    let (status, body) = app.call(Method::GET, &uri, Some(&ravi), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], json!("Not authorized"));

    let (status, _) = app.call(Method::GET, &uri, Some(&asha), None).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .call(Method::GET, "/api/payments/all", Some(&asha), None)
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .call(Method::GET, "/api/payments/all", Some(&admin), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(1));

    let (status, body) = app
        .call(
            Method::PATCH,
            &uri,
            Some(&admin),
            Some(json!({ "amount": 1.0 })),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], json!("Invalid updates"));

    let (status, body) = app
        .call(
            Method::PATCH,
            &uri,
            Some(&admin),
            Some(json!({ "status": "completed" })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("completed"));
    assert_eq!(body["amount"], json!(501.0));

    let (status, body) = app.call(Method::DELETE, &uri, Some(&admin), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], json!("Payment deleted successfully"));

    let (status, _) = app.call(Method::GET, &uri, Some(&admin), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}
