//! Authentication against Docker registries
//!
//! Registries answer unauthenticated requests with `401` and a `WWW-Authenticate`
//! challenge. A `Basic` challenge is answered with the user's credentials directly; a
//! `Bearer` challenge is answered by exchanging the credentials for a token at the
//! challenge's realm. Identity tokens are OAuth2 refresh tokens and go through a
//! `POST` to the realm with `grant_type=refresh_token`.

use crate::error::handlers::{HttpErrorHandler, NetworkErrorHandler};
use crate::error::{ResolverError, Result};
use crate::logging::Logger;
use crate::registry::credentials::Credentials;
use base64::Engine;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use std::collections::HashMap;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallenge {
    pub realm: String,
    pub service: Option<String>,
    pub scope: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Challenge {
    Basic,
    Bearer(AuthChallenge),
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
    access_token: Option<String>,
    expires_in: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct Auth {
    client: Client,
    output: Logger,
}

impl Auth {
    pub fn new(client: Client, output: Logger) -> Self {
        Self { client, output }
    }

    /// Produce the `Authorization` header value answering `www_authenticate` for `scope`.
    pub async fn authorize(
        &self,
        www_authenticate: &str,
        scope: &str,
        credentials: &Credentials,
    ) -> Result<String> {
        match parse_challenge(www_authenticate)? {
            Challenge::Basic => match credentials {
                Credentials::Basic { username, password } => Ok(basic_header(username, password)),
                Credentials::Bearer { token } => Ok(format!("Bearer {}", token)),
                Credentials::IdentityToken { .. } => Err(ResolverError::Auth(
                    "registry requires basic authentication but only an identity token was found"
                        .to_string(),
                )),
                Credentials::Anonymous => Err(ResolverError::Auth(
                    "registry requires basic authentication but no credentials were found"
                        .to_string(),
                )),
            },
            Challenge::Bearer(challenge) => {
                let token = self.get_token(&challenge, scope, credentials).await?;
                Ok(format!("Bearer {}", token))
            }
        }
    }

    async fn get_token(
        &self,
        challenge: &AuthChallenge,
        scope: &str,
        credentials: &Credentials,
    ) -> Result<String> {
        let scope = challenge.scope.as_deref().unwrap_or(scope);
        let request = match credentials {
            Credentials::IdentityToken { token } => self.refresh_request(challenge, scope, token)?,
            _ => self.token_request(challenge, scope, credentials)?,
        };

        let response = request
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "token request"))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(HttpErrorHandler::handle_auth_error(status, &error_text));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| ResolverError::Parse(format!("Failed to parse token response: {}", e)))?;

        if let Some(expires_in) = token_response.expires_in {
            self.output
                .detail(&format!("Token expires in {} seconds", expires_in));
        }

        token_response
            .token
            .or(token_response.access_token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ResolverError::Auth("token response contained no token".to_string()))
    }

    fn token_request(
        &self,
        challenge: &AuthChallenge,
        scope: &str,
        credentials: &Credentials,
    ) -> Result<RequestBuilder> {
        let mut url = Url::parse(&challenge.realm)?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(service) = &challenge.service {
                query.append_pair("service", service);
            }
            query.append_pair("scope", scope);
        }

        self.output.detail(&format!("Requesting token from: {}", url));

        let request = self.client.get(url);
        Ok(match credentials {
            Credentials::Basic { username, password } => request.basic_auth(username, Some(password)),
            Credentials::Bearer { token } => request.bearer_auth(token),
            Credentials::IdentityToken { .. } | Credentials::Anonymous => request,
        })
    }

    fn refresh_request(
        &self,
        challenge: &AuthChallenge,
        scope: &str,
        refresh_token: &str,
    ) -> Result<RequestBuilder> {
        let url = Url::parse(&challenge.realm)?;
        let mut form = url::form_urlencoded::Serializer::new(String::new());
        form.append_pair("grant_type", "refresh_token")
            .append_pair("refresh_token", refresh_token)
            .append_pair("client_id", env!("CARGO_PKG_NAME"))
            .append_pair("scope", scope);
        if let Some(service) = &challenge.service {
            form.append_pair("service", service);
        }

        self.output
            .detail(&format!("Exchanging identity token at: {}", url));

        Ok(self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(form.finish()))
    }
}

/// Parse a `WWW-Authenticate` header value.
pub fn parse_challenge(header: &str) -> Result<Challenge> {
    let header = header.trim();
    let (scheme, params) = header.split_once(' ').unwrap_or((header, ""));

    if scheme.eq_ignore_ascii_case("basic") {
        return Ok(Challenge::Basic);
    }
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(ResolverError::Auth(format!(
            "unsupported authentication scheme {:?}",
            scheme
        )));
    }

    let params = parse_params(params);
    let realm = params
        .get("realm")
        .filter(|r| !r.is_empty())
        .ok_or_else(|| ResolverError::Auth("bearer challenge is missing a realm".to_string()))?;

    Ok(Challenge::Bearer(AuthChallenge {
        realm: realm.clone(),
        service: params.get("service").cloned(),
        scope: params.get("scope").cloned(),
    }))
}

// Values may be quoted and contain commas (scope="repository:a:pull,push").
fn parse_params(input: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let mut rest = input.trim();

    while !rest.is_empty() {
        let Some((key, after)) = rest.split_once('=') else {
            break;
        };
        let key = key.trim().trim_start_matches(',').trim().to_ascii_lowercase();
        let after = after.trim_start();

        let (value, remaining) = if let Some(quoted) = after.strip_prefix('"') {
            match quoted.find('"') {
                Some(end) => (&quoted[..end], &quoted[end + 1..]),
                None => (quoted, ""),
            }
        } else {
            match after.find(',') {
                Some(end) => (after[..end].trim(), &after[end..]),
                None => (after.trim(), ""),
            }
        };

        params.insert(key, value.to_string());
        rest = remaining.trim_start().trim_start_matches(',').trim_start();
    }

    params
}

pub fn basic_header(username: &str, password: &str) -> String {
    let encoded =
        base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", username, password));
    format!("Basic {}", encoded)
}
