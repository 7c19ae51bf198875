//! Authentication API Endpoints
//! Mission: Login, signup, account approval and password management under /user

use crate::api::{run_blocking, AppState};
use crate::auth::{
    identity::Identity,
    models::{
        ChangePasswordRequest, ForgotPasswordRequest, LoginRequest, LoginResponse, SignupRequest,
        StatusUpdateRequest, UserResponse,
    },
    user_store::{LoginCheck, StoreError},
};
use crate::error::{message, ApiError, INVALID_DATA};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{info, warn};

pub const MIN_PASSWORD_LEN: usize = 8;

fn looks_like_email(email: &str) -> bool {
    let email = email.trim();
    matches!(email.split_once('@'), Some((local, domain)) if !local.is_empty() && domain.contains('.'))
}

/// POST /user/signup
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<Response, ApiError> {
    if payload.name.trim().is_empty()
        || !looks_like_email(&payload.email)
        || payload.password.len() < MIN_PASSWORD_LEN
    {
        return Err(ApiError::BadRequest(INVALID_DATA.to_string()));
    }

    let users = state.users.clone();
    run_blocking(move || {
        users.sign_up(
            payload.name.trim(),
            payload.contact_number.trim(),
            payload.email.trim(),
            &payload.password,
        )
    })
    .await?;

    Ok(message(StatusCode::OK, "Successfully Registered."))
}

/// POST /user/login
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let email = payload.email.trim().to_string();
    info!(email = %email, "🔐 Login attempt");

    let users = state.users.clone();
    let lookup = email.clone();
    let check = run_blocking(move || users.check_login(&lookup, &payload.password)).await?;

    match check {
        LoginCheck::Approved(user) => {
            let issued = state
                .codec
                .issue(&user.email, user.role)
                .map_err(|e| ApiError::Internal(e.to_string()))?;
            info!(email = %user.email, role = user.role.as_str(), "✅ Login successful");
            Ok(Json(LoginResponse {
                token: issued.token,
            })
            .into_response())
        }
        LoginCheck::PendingApproval => {
            warn!(email = %email, "Login blocked: awaiting approval");
            Ok(message(StatusCode::BAD_REQUEST, "Wait for admin approval."))
        }
        LoginCheck::BadCredentials => {
            warn!(email = %email, "❌ Failed login attempt");
            Ok(message(StatusCode::BAD_REQUEST, "Bad Credential."))
        }
    }
}

/// GET /user/get (admin)
pub async fn list_users(
    State(state): State<AppState>,
    _admin: Identity,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users = state.users.clone();
    let list = run_blocking(move || users.list_users()).await?;
    Ok(Json(list.iter().map(UserResponse::from_user).collect()))
}

/// POST /user/update (admin): approve or disable an account.
pub async fn update_status(
    State(state): State<AppState>,
    admin: Identity,
    Json(payload): Json<StatusUpdateRequest>,
) -> Result<Response, ApiError> {
    let users = state.users.clone();
    let (user, admins) = run_blocking(move || {
        let user = users.update_status(payload.id, payload.status)?;
        let admins = users.admin_emails()?;
        Ok::<_, StoreError>((user, admins))
    })
    .await?;

    let recipients: Vec<String> = admins
        .into_iter()
        .filter(|email| email != admin.current_user())
        .collect();
    let (subject, verb) = if user.approved {
        ("Account Approved", "approved")
    } else {
        ("Account Disabled", "disabled")
    };
    let body = format!(
        "USER:- {} is {} by ADMIN:- {}",
        user.email,
        verb,
        admin.current_user()
    );
    state
        .notifier
        .notify_admins(admin.current_user(), subject, &body, &recipients)
        .await;

    Ok(message(StatusCode::OK, "User Status Updated Successfully"))
}

/// GET /user/checkToken: reaching the handler means the gate accepted the token.
pub async fn check_token(_identity: Identity) -> Response {
    message(StatusCode::OK, "true")
}

/// POST /user/changePassword
pub async fn change_password(
    State(state): State<AppState>,
    identity: Identity,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Response, ApiError> {
    if payload.new_password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(INVALID_DATA.to_string()));
    }

    let users = state.users.clone();
    let email = identity.subject.clone();
    let changed = run_blocking(move || {
        users.change_password(&email, &payload.old_password, &payload.new_password)
    })
    .await?;

    if changed {
        Ok(message(StatusCode::OK, "Password Updated Successfully"))
    } else {
        Ok(message(StatusCode::BAD_REQUEST, "Incorrect Old Password"))
    }
}

/// POST /user/forgotPassword: same answer whether or not the account exists.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Response, ApiError> {
    let users = state.users.clone();
    let email = payload.email.trim().to_string();
    let lookup = email.clone();
    let known = run_blocking(move || users.find_by_email(&lookup)).await?;

    if known.is_some() {
        state.notifier.send_password_reset(&email).await;
    }
    Ok(message(StatusCode::OK, "Check your mail for Credentials"))
}

/// POST /user/logout: the presented token stops working on admin and
/// session paths.
pub async fn logout(State(state): State<AppState>, identity: Identity) -> Response {
    state
        .revocations
        .revoke(&identity.token_id, identity.expires_at, state.codec.now());
    info!(subject = %identity.subject, "Token revoked");
    message(StatusCode::OK, "Logged out")
}
