//! Error taxonomy shared by every engine operation and endpoint.

use rocket::http::{Header, Status as HttpStatus};
use rocket::request::Request;
use rocket::response::{self, Responder, Response};
use rocket_okapi::gen::OpenApiGenerator;
use rocket_okapi::okapi::openapi3::Responses;
use rocket_okapi::response::OpenApiResponderInner;
use rocket_okapi::util::add_schema_response;

use crate::player::repository::RepositoryError;
use crate::status_messages::{new_status, Status};

/// Every way an engine operation can fail.
///
/// Only `Unavailable` is worth retrying; all other kinds are terminal for the request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    InsufficientResource(String),
    #[error("{0}")]
    ResourceAtCapacity(String),
    #[error("Corrupted reference data: {0}")]
    DataIntegrity(String),
    #[error("Store unavailable, outcome unknown: {0}")]
    Unavailable(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    pub fn http_status(&self) -> HttpStatus {
        match self {
            EngineError::InvalidArgument(_)
            | EngineError::InsufficientResource(_)
            | EngineError::ResourceAtCapacity(_) => HttpStatus::BadRequest,
            EngineError::NotFound(_) => HttpStatus::NotFound,
            EngineError::DataIntegrity(_) | EngineError::Unavailable(_) => {
                HttpStatus::InternalServerError
            }
            EngineError::Unauthorized(_) => HttpStatus::Unauthorized,
            EngineError::Forbidden(_) => HttpStatus::Forbidden,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Unavailable(_))
    }
}

impl From<RepositoryError> for EngineError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound(player_id) => {
                EngineError::NotFound(format!("Player {player_id} not found"))
            }
            RepositoryError::Conflict { .. } | RepositoryError::Io(_) => {
                EngineError::Unavailable(e.to_string())
            }
        }
    }
}

impl<'r> Responder<'r, 'static> for EngineError {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
        let status = self.http_status();
        let retryable = self.is_retryable();
        let mut response = Response::build_from(new_status(self.to_string()).respond_to(request)?);
        response.status(status);
        if retryable {
            response.header(Header::new("Retry-After", "1"));
        }
        response.ok()
    }
}

impl OpenApiResponderInner for EngineError {
    fn responses(gen: &mut OpenApiGenerator) -> rocket_okapi::Result<Responses> {
        let mut responses = Responses::default();
        let schema = gen.json_schema::<Status>();
        for code in [400, 401, 403, 404, 500] {
            add_schema_response(&mut responses, code, "application/json", schema.clone())?;
        }
        Ok(responses)
    }
}
