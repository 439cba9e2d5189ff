use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::content::ContentError;
use crate::services::filter::FilterError;
use crate::services::question::GenerateError;

#[derive(Debug)]
pub enum AppError {
    BadRequest(&'static str),
    Unauthorized,
    InvalidQuestion,
    SessionExpired,
    NotFound,
    ServiceUnavailable,
    Internal(&'static str),
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: &'static str,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::InvalidQuestion => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::SessionExpired => StatusCode::GONE,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::InvalidQuestion => "INVALID_QUESTION",
            AppError::SessionExpired => "SESSION_EXPIRED",
            AppError::NotFound => "NOT_FOUND",
            AppError::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            AppError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    fn message(&self) -> &'static str {
        match self {
            AppError::BadRequest(msg) | AppError::Internal(msg) => *msg,
            AppError::Unauthorized => "sign in required",
            AppError::InvalidQuestion => "question does not belong to this session",
            AppError::SessionExpired => "session has ended, start a new one",
            AppError::NotFound => "not found",
            AppError::ServiceUnavailable => "verse content is unavailable, try again",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.code(),
            message: self.message(),
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<color_eyre::Report> for AppError {
    fn from(report: color_eyre::Report) -> Self {
        if let Some(err) = content_error(&report) {
            tracing::warn!("content provider failed: {report:?}");
            return err.into();
        }
        tracing::error!("request failed: {report:?}");
        AppError::Internal("internal error")
    }
}

impl From<GenerateError> for AppError {
    fn from(err: GenerateError) -> Self {
        match err {
            GenerateError::Content(err) => err.into(),
            GenerateError::InsufficientOptions { .. } | GenerateError::NoStartingVerse => {
                tracing::error!("corpus cannot produce a question: {err}");
                AppError::Internal("could not build a question")
            }
        }
    }
}

impl From<&ContentError> for AppError {
    fn from(err: &ContentError) -> Self {
        match err {
            ContentError::UnknownVerse(_) => AppError::BadRequest("unknown verse"),
            ContentError::Unavailable(_) | ContentError::Malformed(_) => {
                AppError::ServiceUnavailable
            }
        }
    }
}

impl From<ContentError> for AppError {
    fn from(err: ContentError) -> Self {
        tracing::warn!("content provider failed: {err}");
        AppError::from(&err)
    }
}

impl From<FilterError> for AppError {
    fn from(err: FilterError) -> Self {
        tracing::debug!("rejected verse filter: {err}");
        match err {
            FilterError::InvalidJuz(_) => AppError::BadRequest("juz must be between 1 and 30"),
            FilterError::InvalidSurah(_) => {
                AppError::BadRequest("surah must be between 1 and 114")
            }
        }
    }
}

fn content_error(report: &color_eyre::Report) -> Option<&ContentError> {
    report.chain().find_map(|e| e.downcast_ref::<ContentError>())
}

pub trait ResultExt<T> {
    /// Internal error with `msg`, unless the failure came from the content
    /// provider.
    fn reject(self, msg: &'static str) -> Result<T, AppError>;
}

impl<T, E: Into<color_eyre::Report>> ResultExt<T> for Result<T, E> {
    fn reject(self, msg: &'static str) -> Result<T, AppError> {
        self.map_err(|e| {
            let report: color_eyre::Report = e.into();
            if let Some(err) = content_error(&report) {
                tracing::warn!("{msg}: {report:?}");
                return err.into();
            }
            tracing::error!("{msg}: {report:?}");
            AppError::Internal(msg)
        })
    }
}
