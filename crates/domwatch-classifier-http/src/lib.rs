// # HTTP Classifier
//
// This crate provides an HTTP-based block-status classifier for the domain
// monitoring system.
//
// ## Protocol
//
// One GET per domain:
//
// ```text
// GET {endpoint}?domains=example.com
//
// 200 OK
// {"example.com": {"blocked": false}}
// ```
//
// A response without an entry for the requested domain is an error, never
// a status: the engine must not mistake "no answer" for "not blocked".
//
// ## Timeouts
//
// Only the TCP connect timeout is set here. The per-call deadline is owned
// by the engine, which wraps every call in its own timeout.

use async_trait::async_trait;
use domwatch_core::ComponentRegistry;
use domwatch_core::config::ClassifierConfig;
use domwatch_core::traits::{Classifier, ClassifierFactory, DomainStatus};
use domwatch_core::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Per-domain entry of the classifier response
#[derive(Debug, Deserialize)]
struct DomainVerdict {
    blocked: bool,
}

/// HTTP JSON classifier
pub struct HttpClassifier {
    /// Lookup endpoint
    endpoint: String,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpClassifier {
    /// Create a new HTTP classifier
    ///
    /// # Parameters
    ///
    /// - `endpoint`: Lookup URL (e.g., "https://check.skiddle.id/")
    /// - `connect_timeout`: TCP connect timeout
    pub fn new(endpoint: impl Into<String>, connect_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(concat!("domwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }

    /// The configured endpoint
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Extract the status of `domain` from a classifier response body
///
/// # Returns
///
/// - `Ok(DomainStatus)`: The body has a verdict for `domain`
/// - `Err(Error::Classifier)`: Malformed body or no verdict for `domain`
pub fn parse_response(domain: &str, body: &str) -> Result<DomainStatus> {
    let verdicts: HashMap<String, DomainVerdict> = serde_json::from_str(body)
        .map_err(|e| Error::classifier(format!("Malformed response for {}: {}", domain, e)))?;

    let verdict = verdicts
        .get(domain)
        .or_else(|| {
            verdicts
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(domain))
                .map(|(_, verdict)| verdict)
        })
        .ok_or_else(|| Error::classifier(format!("No verdict for {} in response", domain)))?;

    Ok(DomainStatus::from_blocked(verdict.blocked))
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(&self, domain: &str) -> Result<DomainStatus> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("domains", domain)])
            .send()
            .await
            .map_err(|e| Error::classifier(format!("Request failed for {}: {}", domain, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::classifier(format!(
                "HTTP error for {}: {}",
                domain, status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::classifier(format!("Failed to read response: {}", e)))?;

        let verdict = parse_response(domain, &body)?;
        tracing::debug!("{} classified as {}", domain, verdict);
        Ok(verdict)
    }

    fn classifier_name(&self) -> &'static str {
        "http"
    }
}

/// Factory for creating HTTP classifiers
pub struct HttpClassifierFactory;

impl ClassifierFactory for HttpClassifierFactory {
    fn create(&self, config: &ClassifierConfig) -> Result<Box<dyn Classifier>> {
        match config {
            ClassifierConfig::Http {
                endpoint,
                connect_timeout_secs,
            } => Ok(Box::new(HttpClassifier::new(
                endpoint.clone(),
                Duration::from_secs(*connect_timeout_secs),
            )?)),
            _ => Err(Error::config("Invalid config for HTTP classifier")),
        }
    }
}

/// Register the HTTP classifier with a registry
pub fn register(registry: &ComponentRegistry) {
    registry.register_classifier("http", Box::new(HttpClassifierFactory));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_blocked_and_not_blocked() {
        assert_eq!(
            parse_response("example.com", r#"{"example.com": {"blocked": true}}"#).unwrap(),
            DomainStatus::Blocked
        );
        assert_eq!(
            parse_response("example.com", r#"{"example.com": {"blocked": false}}"#).unwrap(),
            DomainStatus::NotBlocked
        );
    }

    #[test]
    fn test_parse_ignores_extra_fields_and_case() {
        let body = r#"{"Example.COM": {"blocked": true, "source": "list-a"}}"#;
        assert_eq!(
            parse_response("example.com", body).unwrap(),
            DomainStatus::Blocked
        );
    }

    #[test]
    fn test_missing_entry_is_an_error() {
        let err = parse_response("example.com", r#"{}"#).unwrap_err();
        assert!(matches!(err, Error::Classifier(_)));

        let err = parse_response("example.com", r#"{"other.com": {"blocked": false}}"#).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_malformed_body_is_an_error() {
        for body in ["", "not json", r#"{"example.com": {}}"#, r#"{"example.com": true}"#] {
            assert!(
                matches!(parse_response("example.com", body), Err(Error::Classifier(_))),
                "body {:?}",
                body
            );
        }
    }

    #[test]
    fn test_factory_creation() {
        let factory = HttpClassifierFactory;
        let classifier = factory.create(&ClassifierConfig::default()).unwrap();
        assert_eq!(classifier.classifier_name(), "http");

        let custom = ClassifierConfig::Custom {
            factory: "other".to_string(),
            config: serde_json::json!({}),
        };
        assert!(factory.create(&custom).is_err());
    }

    #[test]
    fn test_register() {
        let registry = ComponentRegistry::new();
        register(&registry);
        assert!(registry.has_classifier("http"));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_classifier_error() {
        let classifier = HttpClassifier::new("http://127.0.0.1:9/", Duration::from_millis(200)).unwrap();
        let err = classifier.classify("example.com").await.unwrap_err();
        assert!(matches!(err, Error::Classifier(_)));
    }
}
