//! Authenticated request transport
//!
//! Every registry request goes through [`Transport::send`], which attaches a cached
//! authorization header when one exists and answers a `401` challenge once before giving
//! the response back to the caller.

use crate::error::handlers::NetworkErrorHandler;
use crate::error::Result;
use crate::logging::Logger;
use crate::registry::auth::Auth;
use crate::registry::credentials::Credentials;
use crate::registry::reference::Reference;
use crate::registry::token_manager::TokenManager;
use reqwest::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use reqwest::{Client, RequestBuilder, Response, StatusCode};

pub const PULL: &str = "pull";
pub const PUSH_PULL: &str = "pull,push";

#[derive(Debug, Clone)]
pub struct Transport {
    client: Client,
    auth: Auth,
    tokens: TokenManager,
    output: Logger,
}

impl Transport {
    pub fn new(client: Client, output: Logger) -> Self {
        Self {
            auth: Auth::new(client.clone(), output.clone()),
            client,
            tokens: TokenManager::new(),
            output,
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Send the request built by `make`, authenticating for `actions` on the reference's
    /// repository. `make` is called again if the first attempt is challenged.
    pub async fn send<F>(
        &self,
        reference: &Reference,
        credentials: &Credentials,
        actions: &str,
        operation: &str,
        make: F,
    ) -> Result<Response>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let scope = format!("repository:{}:{}", reference.repository_str(), actions);
        let key = TokenManager::key(reference.registry_str(), &scope);

        let header = self.tokens.get(&key).or_else(|| initial_header(credentials));
        let response = self.dispatch(&make, header.as_deref(), operation).await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }
        let Some(challenge) = response
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
        else {
            return Ok(response);
        };

        self.tokens.invalidate(&key);
        self.output
            .detail(&format!("Authenticating {} for {}", scope, reference.registry_str()));
        let header = self.auth.authorize(&challenge, &scope, credentials).await?;
        self.tokens.store(key, header.clone());

        self.dispatch(&make, Some(&header), operation).await
    }

    async fn dispatch<F>(&self, make: &F, header: Option<&str>, operation: &str) -> Result<Response>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let mut request = make(&self.client);
        if let Some(header) = header {
            request = request.header(AUTHORIZATION, header);
        }
        request
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, operation))
    }
}

// Registry tokens go out with the first request; everything else waits for a challenge.
fn initial_header(credentials: &Credentials) -> Option<String> {
    match credentials {
        Credentials::Bearer { token } => Some(format!("Bearer {}", token)),
        Credentials::Basic { .. } | Credentials::IdentityToken { .. } | Credentials::Anonymous => {
            None
        }
    }
}

