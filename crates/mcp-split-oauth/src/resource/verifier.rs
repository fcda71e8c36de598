//! Bearer token verification by remote introspection (RFC 7662).
//!
//! The resource server holds no signing keys and no token state. Every
//! request's bearer token is posted to the authorization server's
//! introspection endpoint, and any failure along the way, network included,
//! rejects the request.

use chrono::{DateTime, Utc};

use crate::config::{ResourceConfig, defaults};
use crate::error::{VerifyError, VerifyResult};
use crate::metadata::IntrospectionResponse;

/// The authenticated caller attached to a request after verification.
#[derive(Debug, Clone)]
pub struct Principal {
    /// The verified bearer token.
    pub token: String,

    /// Client the token was issued to.
    pub client_id: String,

    /// Scopes granted to the token.
    pub scopes: Vec<String>,

    /// Token expiry, if the introspection response carried one.
    pub expires_at: Option<DateTime<Utc>>,

    /// Audience entries from the introspection response.
    pub audience: Option<Vec<String>>,
}

impl Principal {
    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }
}

/// Verifies bearer tokens against the authorization server.
#[derive(Debug, Clone)]
pub struct IntrospectionVerifier {
    http: reqwest::Client,
    introspection_endpoint: String,
    resource_url: String,
    required_scopes: Vec<String>,
    validate_resource: bool,
}

impl IntrospectionVerifier {
    /// Build a verifier from the resource server configuration.
    ///
    /// Refuses plain-HTTP introspection endpoints that are not loopback,
    /// since the token travels in the request body.
    pub fn new(config: &ResourceConfig) -> anyhow::Result<Self> {
        let endpoint = config.introspection_endpoint();
        let parsed = url::Url::parse(&endpoint)?;
        match parsed.scheme() {
            "https" => {}
            "http" => {
                let loopback = match parsed.host() {
                    Some(url::Host::Domain(host)) => host == "localhost",
                    Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
                    Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
                    None => false,
                };
                if !loopback {
                    anyhow::bail!(
                        "refusing plain-HTTP introspection endpoint {endpoint}: use https or loopback"
                    );
                }
            }
            other => anyhow::bail!("unsupported introspection endpoint scheme: {other}"),
        }

        let http = reqwest::Client::builder()
            .timeout(defaults::INTROSPECTION_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            introspection_endpoint: endpoint,
            resource_url: config.resource_url.clone(),
            required_scopes: config.required_scopes.clone(),
            validate_resource: config.oauth_strict,
        })
    }

    /// Verify a bearer token, returning the caller it represents.
    ///
    /// Fails closed: transport errors, non-2xx answers, and malformed
    /// bodies all reject the token rather than letting it through.
    pub async fn verify(&self, token: &str) -> VerifyResult<Principal> {
        let response = match self
            .http
            .post(&self.introspection_endpoint)
            .form(&[("token", token)])
            .send()
            .await
        {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(%error, "Introspection request failed");
                return Err(VerifyError::unauthenticated("introspection unreachable"));
            }
        };

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "Introspection returned an error status");
            return Err(VerifyError::unauthenticated("introspection failed"));
        }

        let introspection: IntrospectionResponse = match response.json().await {
            Ok(body) => body,
            Err(error) => {
                tracing::warn!(%error, "Introspection response was not valid JSON");
                return Err(VerifyError::unauthenticated("malformed introspection response"));
            }
        };

        if !introspection.active {
            return Err(VerifyError::unauthenticated("token is not active"));
        }

        let scopes: Vec<String> = introspection
            .scope
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
            .map(ToOwned::to_owned)
            .collect();
        if let Some(missing) = self.required_scopes.iter().find(|s| !scopes.contains(s)) {
            tracing::debug!(scope = %missing, "Token missing required scope");
            return Err(VerifyError::insufficient_scope(self.required_scopes.join(" ")));
        }

        let audience: Option<Vec<String>> =
            introspection.aud.as_ref().map(|aud| aud.entries().map(ToOwned::to_owned).collect());
        if self.validate_resource {
            self.check_audience(audience.as_deref())?;
        }

        Ok(Principal {
            token: token.to_owned(),
            client_id: introspection.client_id.unwrap_or_default(),
            scopes,
            expires_at: introspection.exp.and_then(|exp| DateTime::<Utc>::from_timestamp(exp, 0)),
            audience,
        })
    }

    fn check_audience(&self, audience: Option<&[String]>) -> VerifyResult<()> {
        let Some(entries) = audience else {
            return Err(VerifyError::audience_mismatch("<none>"));
        };
        if entries.iter().any(|entry| audience_covers(entry, &self.resource_url)) {
            Ok(())
        } else {
            Err(VerifyError::audience_mismatch(entries.join(", ")))
        }
    }
}

/// Whether an audience entry covers this resource.
///
/// Trailing slashes are ignored, and an entry covers any resource nested
/// under it at a path boundary, so `https://rs.example` covers
/// `https://rs.example/mcp` but not `https://rs.example.evil`.
fn audience_covers(entry: &str, resource: &str) -> bool {
    let entry = entry.trim_end_matches('/');
    let resource = resource.trim_end_matches('/');
    resource == entry || resource.starts_with(&format!("{entry}/"))
}
