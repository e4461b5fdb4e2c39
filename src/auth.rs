//! Bearer credential check in front of every player-scoped endpoint.
//!
//! Token issuance lives outside this service; here a token only has to map to
//! a player id, and that id must match the player the request acts on.

use std::collections::HashMap;
use std::sync::Arc;

use log::{info, warn};
use rocket::http::Status;
use rocket::request::{self, FromRequest, Outcome, Request};
use rocket_okapi::gen::OpenApiGenerator;
use rocket_okapi::okapi::openapi3::{Object, SecurityRequirement, SecurityScheme, SecuritySchemeData};
use rocket_okapi::request::{OpenApiFromRequest, RequestHeaderInput};

use crate::error::{EngineError, EngineResult};

pub trait TokenVerifier: Send + Sync {
    /// The player id a valid token was issued to.
    fn verify(&self, token: &str) -> Option<String>;
}

/// Fixed token table, read from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, String>,
}

impl StaticTokenVerifier {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        StaticTokenVerifier { tokens }
    }
}

impl TokenVerifier for StaticTokenVerifier {
    fn verify(&self, token: &str) -> Option<String> {
        self.tokens.get(token).cloned()
    }
}

/// A request whose bearer token was verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedPlayer {
    player_id: String,
}

impl AuthenticatedPlayer {
    /// Reject requests acting on anyone but the token's owner.
    pub fn authorize(&self, player_id: &str) -> EngineResult<()> {
        if self.player_id == player_id {
            Ok(())
        } else {
            warn!(
                "Token for {} used to act on player {}",
                self.player_id, player_id
            );
            Err(EngineError::Forbidden(format!(
                "Not allowed to act on player {player_id}"
            )))
        }
    }
}

/// Why the guard turned a request away; the 401 catcher reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRejection(pub String);

impl AuthRejection {
    pub const MISSING: &'static str = "Authorization token required";

    /// The rejection recorded for `request`, defaulting to a missing token.
    pub fn of(request: &Request<'_>) -> String {
        request
            .local_cache(|| AuthRejection(Self::MISSING.to_string()))
            .0
            .clone()
    }
}

fn unauthorized(
    request: &Request<'_>,
    message: &str,
) -> request::Outcome<AuthenticatedPlayer, EngineError> {
    request.local_cache(|| AuthRejection(message.to_string()));
    Outcome::Error((
        Status::Unauthorized,
        EngineError::Unauthorized(message.to_string()),
    ))
}

fn bearer_token<'a>(request: &'a Request<'_>) -> Option<&'a str> {
    request
        .headers()
        .get_one("Authorization")
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthenticatedPlayer {
    type Error = EngineError;

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let verifier = match request.rocket().state::<Arc<dyn TokenVerifier>>() {
            Some(v) => v,
            None => {
                return Outcome::Error((
                    Status::InternalServerError,
                    EngineError::DataIntegrity("No token verifier configured".to_string()),
                ))
            }
        };
        let token = match bearer_token(request) {
            Some(t) => t,
            None => {
                warn!("Authorization token missing in request to {}", request.uri());
                return unauthorized(request, AuthRejection::MISSING);
            }
        };
        match verifier.verify(token) {
            Some(player_id) => {
                info!("Token validated for player {}", player_id);
                Outcome::Success(AuthenticatedPlayer { player_id })
            }
            None => {
                warn!("Rejected unknown token on {}", request.uri());
                unauthorized(request, "Invalid authorization token")
            }
        }
    }
}

impl<'r> OpenApiFromRequest<'r> for AuthenticatedPlayer {
    fn from_request_input(
        _gen: &mut OpenApiGenerator,
        _name: String,
        _required: bool,
    ) -> rocket_okapi::Result<RequestHeaderInput> {
        let security_scheme = SecurityScheme {
            description: Some("Session token issued by the account service.".to_owned()),
            data: SecuritySchemeData::Http {
                scheme: "bearer".to_owned(),
                bearer_format: Some("opaque".to_owned()),
            },
            extensions: Object::default(),
        };
        let mut security_req = SecurityRequirement::new();
        security_req.insert("BearerAuth".to_owned(), Vec::new());
        Ok(RequestHeaderInput::Security(
            "BearerAuth".to_owned(),
            security_scheme,
            security_req,
        ))
    }
}
