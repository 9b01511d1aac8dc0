use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::{borrow::Cow, future::Future};
use thiserror::Error;
use tracing::{error, warn};

use sb_common::api::ValidationError;
use sb_common::db::{
    ApplicationStorageError, DbPoolError, IndustryStorageError, MatchingStorageError,
    OrganizationStorageError, OwnershipError, PositionStorageError, PostingStorageError,
    RelationshipStorageError, ShiftStorageError, UserStorageError, WorkerStorageError,
};
use sb_common::schedule::{AdmissionError, TransitionError};

tokio::task_local! {
    static REQUEST_ID: String;
}

fn sanitize_message(message: &str) -> String {
    const MAX_LEN: usize = 240;

    let mut cleaned = message
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .replace(['\n', '\r'], " ");

    cleaned = cleaned
        .split_whitespace()
        .map(|token| {
            if token.contains("://") {
                "[redacted-url]".to_string()
            } else if let Some((base, _)) = token.split_once('?') {
                if base.is_empty() {
                    "[redacted-query]".to_string()
                } else {
                    format!("{base}?[redacted]")
                }
            } else if token.starts_with('/') || token.contains('\\') {
                "[redacted-path]".to_string()
            } else {
                token.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ");

    if cleaned.len() > MAX_LEN {
        let cut = (0..=MAX_LEN).rev().find(|i| cleaned.is_char_boundary(*i)).unwrap_or(0);
        cleaned.truncate(cut);
        cleaned.push_str("...");
    }

    if cleaned.trim().is_empty() {
        "unexpected error".to_string()
    } else {
        cleaned
    }
}

pub async fn with_request_id<Fut, T>(request_id: Option<String>, fut: Fut) -> T
where
    Fut: Future<Output = T>,
{
    if let Some(request_id) = request_id {
        REQUEST_ID.scope(request_id, fut).await
    } else {
        fut.await
    }
}

pub fn current_request_id() -> Option<String> {
    REQUEST_ID.try_with(|value| value.clone()).ok()
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("database error: {0}")]
    Database(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("unprocessable: {0}")]
    Unprocessable(String),
    #[error("too many requests: {0}")]
    TooManyRequests(String),
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("internal server error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    code: &'static str,
    message: String,
    request_id: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let code = self.code();
        let request_id = current_request_id();

        if status.is_server_error() {
            error!(
                code,
                status = %status,
                request_id = request_id.as_deref().unwrap_or(""),
                error = %self,
                "api_error"
            );
        } else {
            warn!(
                code,
                status = %status,
                request_id = request_id.as_deref().unwrap_or(""),
                error = %self,
                "api_error"
            );
        }

        let body = Json(ErrorResponse {
            code,
            message: self.public_message().into_owned(),
            request_id,
        });

        (status, body).into_response()
    }
}

impl ApiError {
    fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::Unprocessable(_) => "unprocessable",
            ApiError::TooManyRequests(_) => "too_many_requests",
            ApiError::ServiceUnavailable(_) => "service_unavailable",
            ApiError::Database(_) => "database_error",
            ApiError::Internal(_) => "internal_error",
        }
    }

    fn public_message(&self) -> Cow<'static, str> {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::Unprocessable(msg)
            | ApiError::Forbidden(msg) => Cow::Owned(sanitize_message(msg)),
            ApiError::Unauthorized(_) => Cow::Borrowed("unauthorized"),
            ApiError::TooManyRequests(_) => Cow::Borrowed("too many requests"),
            ApiError::ServiceUnavailable(_) => Cow::Borrowed("service unavailable"),
            ApiError::Database(_) | ApiError::Internal(_) => Cow::Borrowed("internal server error"),
        }
    }

    pub(crate) fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(value: ValidationError) -> Self {
        ApiError::Unprocessable(value.0)
    }
}

impl From<DbPoolError> for ApiError {
    fn from(value: DbPoolError) -> Self {
        match value {
            DbPoolError::Unreachable(err) => ApiError::ServiceUnavailable(err.to_string()),
            other => ApiError::Database(other.to_string()),
        }
    }
}

impl From<OwnershipError> for ApiError {
    fn from(value: OwnershipError) -> Self {
        match value {
            OwnershipError::NotFound(resource) => ApiError::NotFound(format!("{resource} not found")),
            other => ApiError::Database(other.to_string()),
        }
    }
}

impl From<UserStorageError> for ApiError {
    fn from(value: UserStorageError) -> Self {
        match value {
            UserStorageError::NotFound(id) => ApiError::NotFound(format!("user {id} not found")),
            err @ (UserStorageError::EmailTaken | UserStorageError::PhoneTaken) => {
                ApiError::Conflict(err.to_string())
            }
            other => ApiError::Database(other.to_string()),
        }
    }
}

impl From<IndustryStorageError> for ApiError {
    fn from(value: IndustryStorageError) -> Self {
        match value {
            IndustryStorageError::NotFound(id) => {
                ApiError::NotFound(format!("industry {id} not found"))
            }
            err @ IndustryStorageError::DuplicateCode(_) => ApiError::Conflict(err.to_string()),
            other => ApiError::Database(other.to_string()),
        }
    }
}

impl From<PositionStorageError> for ApiError {
    fn from(value: PositionStorageError) -> Self {
        match value {
            PositionStorageError::NotFound(id) => {
                ApiError::NotFound(format!("position {id} not found"))
            }
            err @ PositionStorageError::DuplicateCode(_) => ApiError::Conflict(err.to_string()),
            err @ PositionStorageError::UnknownIndustry(_) => {
                ApiError::Unprocessable(err.to_string())
            }
            other => ApiError::Database(other.to_string()),
        }
    }
}

impl From<OrganizationStorageError> for ApiError {
    fn from(value: OrganizationStorageError) -> Self {
        use OrganizationStorageError as E;
        match value {
            err @ (E::NotFound(_) | E::MemberNotFound(_)) => ApiError::NotFound(err.to_string()),
            err @ (E::SlugTaken(_) | E::AlreadyVerified | E::NotPending | E::CannotRemoveOwner) => {
                ApiError::Conflict(err.to_string())
            }
            err @ (E::UnknownIndustry(_) | E::NotEmployer(_)) => {
                ApiError::Unprocessable(err.to_string())
            }
            other => ApiError::Database(other.to_string()),
        }
    }
}

impl From<WorkerStorageError> for ApiError {
    fn from(value: WorkerStorageError) -> Self {
        use WorkerStorageError as E;
        match value {
            err @ E::NotFound(_) => ApiError::NotFound(err.to_string()),
            err @ (E::AlreadyExists(_) | E::IdentityAlreadyVerified | E::NoPendingIdentity) => {
                ApiError::Conflict(err.to_string())
            }
            err @ E::NotAWorker(_) => ApiError::Forbidden(err.to_string()),
            err @ E::InvalidAvailability(_) => ApiError::Unprocessable(err.to_string()),
            other => ApiError::Database(other.to_string()),
        }
    }
}

impl From<PostingStorageError> for ApiError {
    fn from(value: PostingStorageError) -> Self {
        use PostingStorageError as E;
        match value {
            err @ E::NotFound(_) => ApiError::NotFound(err.to_string()),
            err @ (E::InvalidStatus { .. }
            | E::NotEditable(_)
            | E::WindowExcludesShifts { .. }
            | E::QuotaReached { .. }
            | E::OrganizationUnavailable(_)) => ApiError::Conflict(err.to_string()),
            err @ (E::Invalid(_) | E::NoUpcomingShifts | E::UnknownPosition(_)) => {
                ApiError::Unprocessable(err.to_string())
            }
            other => ApiError::Database(other.to_string()),
        }
    }
}

impl From<ShiftStorageError> for ApiError {
    fn from(value: ShiftStorageError) -> Self {
        use ShiftStorageError as E;
        match value {
            err @ (E::JobNotFound(_) | E::TemplateNotFound(_) | E::ShiftNotFound(_)) => {
                ApiError::NotFound(err.to_string())
            }
            err @ E::Expansion(_) => ApiError::Unprocessable(err.to_string()),
            err @ (E::QuantityBelowAccepted { .. } | E::HasApplications(_) | E::PostingClosed(_)) => {
                ApiError::Conflict(err.to_string())
            }
            other => ApiError::Database(other.to_string()),
        }
    }
}

impl From<AdmissionError> for ApiError {
    fn from(value: AdmissionError) -> Self {
        match value {
            err @ (AdmissionError::Blocked
            | AdmissionError::Suspended
            | AdmissionError::InactiveUser) => ApiError::Forbidden(err.to_string()),
            err @ AdmissionError::Ineligible(_) => ApiError::Unprocessable(err.to_string()),
            other => ApiError::Conflict(other.to_string()),
        }
    }
}

impl From<TransitionError> for ApiError {
    fn from(value: TransitionError) -> Self {
        match value {
            err @ TransitionError::NotPermitted { .. } => ApiError::Forbidden(err.to_string()),
            other => ApiError::Conflict(other.to_string()),
        }
    }
}

impl From<ApplicationStorageError> for ApiError {
    fn from(value: ApplicationStorageError) -> Self {
        use ApplicationStorageError as E;
        match value {
            err @ (E::NotFound(_) | E::ShiftNotFound(_) | E::WorkerNotFound(_)) => {
                ApiError::NotFound(err.to_string())
            }
            E::Admission(err) => err.into(),
            E::Transition(err) => err.into(),
            err @ E::DoubleBooked { .. } => ApiError::Conflict(err.to_string()),
            other => ApiError::Database(other.to_string()),
        }
    }
}

impl From<RelationshipStorageError> for ApiError {
    fn from(value: RelationshipStorageError) -> Self {
        match value {
            err @ RelationshipStorageError::NotFound(_) => ApiError::NotFound(err.to_string()),
            err @ RelationshipStorageError::NotAWorker(_) => {
                ApiError::Unprocessable(err.to_string())
            }
            other => ApiError::Database(other.to_string()),
        }
    }
}

impl From<MatchingStorageError> for ApiError {
    fn from(value: MatchingStorageError) -> Self {
        match value {
            err @ (MatchingStorageError::ShiftNotFound(_) | MatchingStorageError::WorkerNotFound(_)) => {
                ApiError::NotFound(err.to_string())
            }
            other => ApiError::Database(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;
    use serde_json::Value;
    use sb_common::schedule::{ApplicationAction, ApplicationStatus, Actor, ShiftCapacity};

    use super::*;

    #[tokio::test]
    async fn includes_request_id_in_response_body_when_present() {
        let err = ApiError::Internal("boom".into());
        let response = with_request_id(Some("req-123".into()), async { err.into_response() }).await;

        let (parts, body) = response.into_parts();
        assert_eq!(parts.status, StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = body.collect().await.unwrap().to_bytes();
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["request_id"], "req-123");
        assert_eq!(json["message"], "internal server error");
    }

    #[test]
    fn public_messages_redact_urls_and_paths() {
        let msg = sanitize_message("failed at postgres://u:p@db/x reading /etc/passwd now");
        assert_eq!(msg, "failed at [redacted-url] reading [redacted-path] now");
        assert_eq!(sanitize_message("\n\r"), "unexpected error");
    }

    #[test]
    fn application_errors_map_to_client_statuses() {
        let forbidden: ApiError = ApplicationStorageError::Transition(TransitionError::NotPermitted {
            actor: Actor::Worker,
            action: ApplicationAction::Accept,
        })
        .into();
        assert_eq!(forbidden.status_code(), StatusCode::FORBIDDEN);

        let full: ApiError = ApplicationStorageError::Transition(TransitionError::CapacityReached(
            ShiftCapacity { quantity: 2, accepted: 2 },
        ))
        .into();
        assert_eq!(full.status_code(), StatusCode::CONFLICT);

        let blocked: ApiError = ApplicationStorageError::Admission(AdmissionError::Blocked).into();
        assert_eq!(blocked.status_code(), StatusCode::FORBIDDEN);

        let ineligible: ApiError =
            ApplicationStorageError::Admission(AdmissionError::Ineligible(vec!["gender".into()])).into();
        assert_eq!(ineligible.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

        let invalid: ApiError = TransitionError::InvalidTransition {
            status: ApplicationStatus::Rejected,
            action: ApplicationAction::Accept,
        }
        .into();
        assert_eq!(invalid.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn validation_errors_are_unprocessable() {
        let err: ApiError = ValidationError::new("title must not be empty").into();
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.public_message(), "title must not be empty");
    }

    #[test]
    fn posting_window_errors_map_to_client_statuses() {
        let inverted: ApiError = PostingStorageError::from(ValidationError::new(
            "active window [2030-03-20, 2030-03-10] ends before it starts",
        ))
        .into();
        assert_eq!(inverted.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

        let day = |d: u32| chrono::NaiveDate::from_ymd_opt(2030, 3, d).unwrap();
        let excludes: ApiError =
            PostingStorageError::WindowExcludesShifts { first: day(2), last: day(12) }.into();
        assert_eq!(excludes.status_code(), StatusCode::CONFLICT);
    }
}
