use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use common::{StorageError, WorkspaceError};
use sea_orm::DbErr;
use serde::Serialize;

/// Structured error response returned by all endpoints on failure.
///
/// `errno` is stable across releases; operators grep for it.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Machine-readable error code, e.g. `INVALID_BIN`, `CONTENT_BLOCKED`.
    #[schema(example = "INVALID_BIN")]
    pub code: &'static str,
    /// Stable numeric error identifier for operator support.
    #[schema(example = 101)]
    pub errno: u16,
    /// Human-readable error description.
    #[schema(example = "Bin id must be 8-60 characters")]
    pub message: String,
}

/// Application-level error type.
#[derive(Debug)]
pub enum AppError {
    InvalidBin(String),
    InvalidFilename(String),
    ChecksumMismatch(String),
    EmptyBody,
    SizeExceeded(String),
    Validation(String),
    Unauthorized,
    Banned,
    ContentBlocked,
    ExtensionRejected(String),
    NotApproved,
    DownloadLimitReached,
    VerificationRequired,
    NotFound(String),
    BinNotWritable,
    Conflict(String),
    NoCapacity,
    StorageLimitExceeded,
    Database(String),
    Storage(String),
    Internal(String),
}

impl AppError {
    fn status_and_body(self) -> (StatusCode, ErrorBody) {
        match self {
            AppError::InvalidBin(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "INVALID_BIN",
                    errno: 101,
                    message: msg,
                },
            ),
            AppError::InvalidFilename(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "INVALID_FILENAME",
                    errno: 102,
                    message: msg,
                },
            ),
            AppError::ChecksumMismatch(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "CHECKSUM_MISMATCH",
                    errno: 103,
                    message: msg,
                },
            ),
            AppError::EmptyBody => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "EMPTY_BODY",
                    errno: 104,
                    message: "Upload body must not be empty".into(),
                },
            ),
            AppError::SizeExceeded(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "SIZE_EXCEEDED",
                    errno: 105,
                    message: msg,
                },
            ),
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "VALIDATION_ERROR",
                    errno: 100,
                    message: msg,
                },
            ),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "UNAUTHORIZED",
                    errno: 170,
                    message: "Authentication required".into(),
                },
            ),
            AppError::Banned => (
                StatusCode::FORBIDDEN,
                ErrorBody {
                    code: "CLIENT_BANNED",
                    errno: 110,
                    message: "This client has been banned".into(),
                },
            ),
            AppError::ContentBlocked => (
                StatusCode::FORBIDDEN,
                ErrorBody {
                    code: "CONTENT_BLOCKED",
                    errno: 111,
                    message: "This content has been blocked".into(),
                },
            ),
            AppError::ExtensionRejected(ext) => (
                StatusCode::FORBIDDEN,
                ErrorBody {
                    code: "EXTENSION_REJECTED",
                    errno: 112,
                    message: format!("Files with the .{ext} extension are not accepted"),
                },
            ),
            AppError::NotApproved => (
                StatusCode::FORBIDDEN,
                ErrorBody {
                    code: "BIN_NOT_APPROVED",
                    errno: 113,
                    message: "This bin is awaiting approval".into(),
                },
            ),
            AppError::DownloadLimitReached => (
                StatusCode::FORBIDDEN,
                ErrorBody {
                    code: "DOWNLOAD_LIMIT",
                    errno: 114,
                    message: "The download limit for this file has been reached".into(),
                },
            ),
            AppError::VerificationRequired => (
                StatusCode::FORBIDDEN,
                ErrorBody {
                    code: "VERIFICATION_REQUIRED",
                    errno: 115,
                    message: "Downloads require the verification cookie".into(),
                },
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    code: "NOT_FOUND",
                    errno: 140,
                    message: msg,
                },
            ),
            AppError::BinNotWritable => (
                StatusCode::METHOD_NOT_ALLOWED,
                ErrorBody {
                    code: "BIN_NOT_WRITABLE",
                    errno: 120,
                    message: "This bin is locked, deleted, or expired".into(),
                },
            ),
            AppError::Conflict(msg) => (
                StatusCode::CONFLICT,
                ErrorBody {
                    code: "CONFLICT",
                    errno: 130,
                    message: msg,
                },
            ),
            AppError::NoCapacity => (
                StatusCode::INSUFFICIENT_STORAGE,
                ErrorBody {
                    code: "NO_CAPACITY",
                    errno: 150,
                    message: "No scratch capacity for this upload".into(),
                },
            ),
            AppError::StorageLimitExceeded => (
                StatusCode::INSUFFICIENT_STORAGE,
                ErrorBody {
                    code: "STORAGE_LIMIT",
                    errno: 151,
                    message: "The storage limit has been reached".into(),
                },
            ),
            AppError::Database(detail) => {
                tracing::error!("Database error: {detail}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        code: "DATABASE_ERROR",
                        errno: 160,
                        message: "A database error occurred".into(),
                    },
                )
            }
            AppError::Storage(detail) => {
                tracing::error!("Object store error: {detail}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        code: "STORAGE_ERROR",
                        errno: 161,
                        message: "An object storage error occurred".into(),
                    },
                )
            }
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {detail}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        code: "INTERNAL_ERROR",
                        errno: 162,
                        message: "An unexpected error occurred".into(),
                    },
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let challenge = matches!(self, AppError::Unauthorized);
        let (status, body) = self.status_and_body();

        if challenge {
            (
                status,
                [(header::WWW_AUTHENTICATE, "Basic realm=\"admin\"")],
                Json(body),
            )
                .into_response()
        } else {
            (status, Json(body)).into_response()
        }
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => AppError::NotFound(format!("Object {key} not found")),
            other => AppError::Storage(other.to_string()),
        }
    }
}

impl From<WorkspaceError> for AppError {
    fn from(err: WorkspaceError) -> Self {
        match err {
            WorkspaceError::NoCapacity { .. } | WorkspaceError::NoScratchDirs => {
                AppError::NoCapacity
            }
            WorkspaceError::SizeExceeded { expected } => AppError::SizeExceeded(format!(
                "Request body exceeds the advertised length of {expected} bytes"
            )),
            WorkspaceError::Io(e) if e.kind() == std::io::ErrorKind::StorageFull => {
                AppError::NoCapacity
            }
            WorkspaceError::Io(e) => AppError::Internal(format!("scratch IO error: {e}")),
        }
    }
}
