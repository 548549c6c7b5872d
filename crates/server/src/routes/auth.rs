use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::cookie::{Cookie, SameSite, SignedCookieJar};
use chrono::Utc;
use shared::{
    normalize_email, rsvp::validate_email, AdminInfo, CreateAdminRequest, LoginRequest,
    LoginResponse, SessionInfo,
};

use crate::{
    auth::{check_password, generate_session_token, hash_password, AuthAdmin, PasswordCheck, SESSION_COOKIE},
    error::{AppError, Result},
    state::AppState,
};

const MIN_PASSWORD_LEN: usize = 8;

fn invalid_credentials() -> AppError {
    AppError::Unauthorized("Invalid email or password".to_string())
}

/// POST /api/admin/login
pub async fn login(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<(SignedCookieJar, Json<LoginResponse>)> {
    let email = normalize_email(&req.email);
    state.login_throttle.check(&email)?;

    let Some(admin) = state.db.get_admin(&email).await? else {
        state.login_throttle.record_failure(&email);
        tracing::info!("Login attempt for unknown admin {}", email);
        return Err(invalid_credentials());
    };

    let check = check_password(&admin, &req.password, state.config.auth.admin_password.as_deref())?;
    let Some(check) = check else {
        state.login_throttle.record_failure(&email);
        tracing::info!("Wrong password for admin {}", email);
        return Err(invalid_credentials());
    };
    if check == PasswordCheck::DevBypass {
        tracing::warn!(
            "Admin {} logged in without a password check: set ADMIN_PASSWORD or a personal password",
            email
        );
    }
    state.login_throttle.reset(&email);

    let token = generate_session_token();
    let now = Utc::now();
    let purged = state.db.purge_expired_sessions(&now.to_rfc3339()).await?;
    if purged > 0 {
        tracing::debug!("Removed {} expired admin sessions", purged);
    }
    let expires_at = (now + state.config.auth.session_ttl()).to_rfc3339();
    state.db.create_admin_session(&token, &admin.email, &expires_at).await?;
    tracing::info!("Admin {} logged in", admin.email);

    let cookie = Cookie::build((SESSION_COOKIE, token.clone()))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/");
    Ok((
        jar.add(cookie),
        Json(LoginResponse {
            token,
            email: admin.email,
            name: admin.name,
            expires_at,
        }),
    ))
}

/// POST /api/admin/logout
pub async fn logout(
    State(state): State<AppState>,
    admin: AuthAdmin,
    jar: SignedCookieJar,
) -> Result<(SignedCookieJar, StatusCode)> {
    state.db.delete_admin_session(&admin.token).await?;
    tracing::info!("Admin {} logged out", admin.email);
    Ok((
        jar.remove(Cookie::build(SESSION_COOKIE).path("/")),
        StatusCode::NO_CONTENT,
    ))
}

/// GET /api/admin/session
pub async fn session(admin: AuthAdmin) -> Json<SessionInfo> {
    Json(SessionInfo {
        email: admin.email,
        name: admin.name,
        expires_at: admin.expires_at,
    })
}

/// POST /api/admin/admins
pub async fn create_admin(
    State(state): State<AppState>,
    admin: AuthAdmin,
    Json(req): Json<CreateAdminRequest>,
) -> Result<(StatusCode, Json<AdminInfo>)> {
    validate_email(&req.email)?;
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::validation("name", "Name is required"));
    }

    let password_hash = match req.password.as_deref().filter(|p| !p.is_empty()) {
        Some(password) if password.len() < MIN_PASSWORD_LEN => {
            return Err(AppError::validation(
                "password",
                format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
            ));
        }
        Some(password) => hash_password(password)?,
        None => String::new(),
    };

    let created = state
        .db
        .create_admin(&normalize_email(&req.email), name, &password_hash)
        .await?;
    tracing::info!("Admin {} created by {}", created.email, admin.email);
    Ok((StatusCode::CREATED, Json(created.into())))
}

/// GET /api/admin/admins
pub async fn list_admins(State(state): State<AppState>, _admin: AuthAdmin) -> Result<Json<Vec<AdminInfo>>> {
    let admins = state.db.list_admins().await?;
    Ok(Json(admins.into_iter().map(AdminInfo::from).collect()))
}

#[cfg(test)]
mod tests {
    use crate::test_support::{authed, get, json_request, read_json, TestApp, ADMIN_EMAIL};
    use axum::http::{header, Method, Request, StatusCode};
    use axum::body::Body;
    use serde_json::json;

    fn login_request(email: &str, password: &str) -> Request<Body> {
        json_request(
            Method::POST,
            "/api/admin/login",
            &json!({ "email": email, "password": password }),
        )
    }

    #[tokio::test]
    async fn test_dev_bypass_accepts_any_password() {
        let app = TestApp::new().await;
        let response = app.call(login_request(ADMIN_EMAIL, "whatever")).await;
        assert_eq!(response.status(), StatusCode::OK);

        let cookie = response.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap().to_string();
        assert!(cookie.starts_with("wedding_session="));
        assert!(cookie.contains("HttpOnly"));
        let json = read_json(response).await;
        assert_eq!(json["email"], ADMIN_EMAIL);
        assert_eq!(json["token"].as_str().unwrap().len(), 48);
    }

    #[tokio::test]
    async fn test_login_purges_expired_sessions() {
        let app = TestApp::new().await;
        app.state
            .db
            .create_admin_session("stale", ADMIN_EMAIL, "2020-01-01T00:00:00Z")
            .await
            .unwrap();

        let token = app.login("x").await;
        assert!(app.state.db.get_admin_session("stale").await.unwrap().is_none());
        assert!(app.state.db.get_admin_session(&token).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_shared_password_is_enforced() {
        let app = TestApp::with_admin_password("s3cret-pass").await;
        let response = app.call(login_request(ADMIN_EMAIL, "wrong")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app.call(login_request("ADMIN@example.com", "s3cret-pass")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_admin_is_rejected() {
        let app = TestApp::new().await;
        let response = app.call(login_request("stranger@example.com", "x")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_repeated_failures_are_throttled() {
        let app = TestApp::with_admin_password("s3cret-pass").await;
        for _ in 0..5 {
            let response = app.call(login_request(ADMIN_EMAIL, "wrong")).await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }
        let response = app.call(login_request(ADMIN_EMAIL, "s3cret-pass")).await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_session_then_logout_invalidates_token() {
        let app = TestApp::new().await;
        let token = app.login("anything").await;

        let response = app.call(authed(get("/api/admin/session"), &token)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_json(response).await["name"], "Admin");

        let logout = authed(json_request(Method::POST, "/api/admin/logout", &json!({})), &token);
        assert_eq!(app.call(logout).await.status(), StatusCode::NO_CONTENT);

        let response = app.call(authed(get("/api/admin/session"), &token)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_signed_cookie_authenticates() {
        let app = TestApp::new().await;
        let response = app.call(login_request(ADMIN_EMAIL, "x")).await;
        let set_cookie = response.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
        let pair = set_cookie.split(';').next().unwrap().to_string();

        let request = Request::builder()
            .uri("/api/admin/session")
            .header(header::COOKIE, pair)
            .body(Body::empty())
            .unwrap();
        assert_eq!(app.call(request).await.status(), StatusCode::OK);

        let forged = Request::builder()
            .uri("/api/admin/session")
            .header(header::COOKIE, "wedding_session=not-signed")
            .body(Body::empty())
            .unwrap();
        assert_eq!(app.call(forged).await.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_expired_session_is_rejected_and_removed() {
        let app = TestApp::new().await;
        app.state
            .db
            .create_admin_session("stale", ADMIN_EMAIL, "2000-01-01T00:00:00+00:00")
            .await
            .unwrap();
        let response = app.call(authed(get("/api/admin/session"), "stale")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(app.state.db.get_admin_session("stale").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_admin_routes_require_session() {
        let app = TestApp::new().await;
        for uri in ["/api/admin/guests", "/api/admin/admins", "/api/admin/templates", "/api/admin/messages"] {
            assert_eq!(app.call(get(uri)).await.status(), StatusCode::UNAUTHORIZED, "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_create_admin_with_personal_password() {
        let app = TestApp::new().await;
        let token = app.login("x").await;

        let create = json!({ "email": "Bea@Example.com", "name": "Bea", "password": "longenough" });
        let response = app
            .call(authed(json_request(Method::POST, "/api/admin/admins", &create), &token))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let json = read_json(response).await;
        assert_eq!(json["email"], "bea@example.com");
        assert_eq!(json["has_password"], true);

        // Personal hash applies even though no shared password is set
        assert_eq!(app.call(login_request("bea@example.com", "wrong-one")).await.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(app.call(login_request("bea@example.com", "longenough")).await.status(), StatusCode::OK);

        let response = app
            .call(authed(json_request(Method::POST, "/api/admin/admins", &create), &token))
            .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = app.call(authed(get("/api/admin/admins"), &token)).await;
        assert_eq!(read_json(response).await.as_array().unwrap().len(), 2);
    }
}
