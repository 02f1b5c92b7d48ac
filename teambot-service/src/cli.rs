//! Operator commands: configuration check, smoke test and secret store management.

use anyhow::{bail, Context, Result};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;

use crate::provider::AzureOpenAiProvider;
use teambot_common::config::Config;
use teambot_common::secrets::{self, SecretStore};
use teambot_common::util::generate_conversation_id;

/// Outcome of `check-config`.
#[derive(Debug, Default)]
pub struct ConfigReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub deployments: Option<Vec<String>>,
    pub probe_error: Option<String>,
}

impl ConfigReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty() && self.probe_error.is_none()
    }
}

/// Validate configuration and, when it is usable, list the Azure deployments.
pub async fn check_config(config: &Config) -> ConfigReport {
    let mut report = ConfigReport {
        warnings: config.warnings(),
        ..Default::default()
    };

    if let Err(e) = config.validate() {
        report.errors = e.into_errors().iter().map(ToString::to_string).collect();
        return report;
    }

    probe_deployments(config, &mut report).await;
    report
}

async fn probe_deployments(config: &Config, report: &mut ConfigReport) {
    let provider = AzureOpenAiProvider::new(
        &config.azure_openai,
        Duration::from_secs(config.conversation.request_timeout_secs),
    );
    match provider.list_deployments().await {
        Ok(deployments) => {
            let ids: Vec<String> = deployments.into_iter().map(|d| d.id).collect();
            if !ids.iter().any(|id| *id == config.azure_openai.deployment_name) {
                report.warnings.push(format!(
                    "deployment {:?} not found; available: {}",
                    config.azure_openai.deployment_name,
                    ids.join(", ")
                ));
            }
            report.deployments = Some(ids);
        }
        Err(e) => report.probe_error = Some(e.to_string()),
    }
}

/// Print a report to stdout and fail when it has errors.
pub fn print_report(report: &ConfigReport) -> Result<()> {
    for error in &report.errors {
        println!("✗ {error}");
    }
    for warning in &report.warnings {
        println!("! {warning}");
    }
    if let Some(deployments) = &report.deployments {
        println!("✓ Azure OpenAI reachable ({} deployments)", deployments.len());
    }
    if let Some(probe_error) = &report.probe_error {
        println!("✗ Azure OpenAI probe failed: {probe_error}");
    }

    if !report.is_ok() {
        bail!("configuration check failed");
    }
    println!("✓ Configuration OK");
    Ok(())
}

// ============================================================================
// Smoke test
// ============================================================================

/// Exercise a running instance: health, one chat turn, summary and clear.
pub async fn smoke(base_url: &str) -> Result<()> {
    let base = base_url.trim_end_matches('/');
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(90))
        .build()?;
    let conversation_id = generate_conversation_id("smoke");

    let health = client
        .get(format!("{base}/health"))
        .send()
        .await
        .context("health request failed")?;
    let status = health.status();
    let body: Value = health.json().await.context("health response is not JSON")?;
    println!("health: {status} {}", body["status"]);
    if status.is_server_error() && body["status"] != "degraded" {
        bail!("health check failed with {status}");
    }

    let chat: Value = expect_ok(
        client
            .post(format!("{base}/api/chat"))
            .json(&json!({
                "message": "Reply with the single word: pong",
                "conversation_id": conversation_id,
                "user_name": "Smoke Test",
            }))
            .send()
            .await
            .context("chat request failed")?,
    )
    .await?;
    println!("chat: {}", chat["response"]);

    let summary: Value = expect_ok(
        client
            .get(format!("{base}/api/conversation/{conversation_id}/summary"))
            .send()
            .await
            .context("summary request failed")?,
    )
    .await?;
    if summary["message_count"] != 2 {
        bail!("expected 2 messages after one turn, summary was {summary}");
    }
    println!("summary: {} messages", summary["message_count"]);

    expect_ok(
        client
            .post(format!("{base}/api/conversation/{conversation_id}/clear"))
            .send()
            .await
            .context("clear request failed")?,
    )
    .await?;
    println!("clear: ok");

    println!("✓ Smoke test passed against {base}");
    Ok(())
}

async fn expect_ok(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let url = response.url().clone();
    let body: Value = response.json().await.unwrap_or(Value::Null);
    if !status.is_success() {
        bail!("{url} returned {status}: {body}");
    }
    Ok(body)
}

// ============================================================================
// Secret store
// ============================================================================

/// Create an empty store at `path` and return the encoded key for it.
pub fn secrets_init(path: PathBuf) -> Result<String> {
    if path.exists() {
        bail!("secret store already exists at {}", path.display());
    }
    let key = secrets::generate_key();
    SecretStore::open(path, &key)?.save()?;
    Ok(secrets::encode_key(&key))
}

fn open_store() -> Result<SecretStore> {
    SecretStore::from_env()?.with_context(|| {
        format!(
            "{} and {} must be set",
            secrets::SECRETS_PATH_ENV,
            secrets::SECRETS_KEY_ENV
        )
    })
}

pub fn secrets_set(key: &str, value: &str) -> Result<()> {
    let mut store = open_store()?;
    store.set(key, value);
    store.save()?;
    Ok(())
}

pub fn secrets_remove(key: &str) -> Result<bool> {
    let mut store = open_store()?;
    let removed = store.remove(key).is_some();
    if removed {
        store.save()?;
    }
    Ok(removed)
}

pub fn secrets_list() -> Result<Vec<String>> {
    let store = open_store()?;
    let mut keys: Vec<String> = store.keys().map(String::from).collect();
    keys.sort();
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> Config {
        let mut config = Config::default();
        config.azure_openai.endpoint = server.uri();
        config.azure_openai.api_key = "key".into();
        config
    }

    #[tokio::test]
    async fn test_check_config_reports_validation_errors() {
        let report = check_config(&Config::default()).await;
        assert!(!report.is_ok());
        assert!(report
            .errors
            .iter()
            .any(|e| e.contains("AZURE_OPENAI_ENDPOINT")));
        assert!(report.deployments.is_none());
        assert!(print_report(&report).is_err());
    }

    #[tokio::test]
    async fn test_deployment_check_warns_on_missing_deployment() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/openai/deployments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"id": "gpt-4o", "model": "gpt-4o", "status": "succeeded"}]
            })))
            .mount(&server)
            .await;

        let mut report = ConfigReport::default();
        probe_deployments(&config_for(&server), &mut report).await;

        assert!(report.is_ok());
        assert_eq!(report.deployments, Some(vec!["gpt-4o".to_string()]));
        assert!(report.warnings[0].contains("gpt-35-turbo"));
    }

    #[tokio::test]
    async fn test_deployment_check_records_auth_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/openai/deployments"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
            .mount(&server)
            .await;

        let mut report = ConfigReport::default();
        probe_deployments(&config_for(&server), &mut report).await;

        assert!(!report.is_ok());
        assert!(report.probe_error.unwrap().contains("401"));
    }

    #[tokio::test]
    async fn test_smoke_against_stub() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "healthy"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": "pong",
                "conversation_id": "smoke-1"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/api/conversation/smoke-[0-9a-f]{8}/summary$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message_count": 2})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path_regex(r"^/api/conversation/smoke-[0-9a-f]{8}/clear$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "cleared"})))
            .expect(1)
            .mount(&server)
            .await;

        smoke(&format!("{}/", server.uri())).await.unwrap();
    }

    #[tokio::test]
    async fn test_smoke_fails_on_chat_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "healthy"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "boom"})))
            .mount(&server)
            .await;

        let err = smoke(&server.uri()).await.unwrap_err();
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn test_secrets_init_refuses_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.json");

        let key = secrets_init(path.clone()).unwrap();
        assert!(path.exists());
        assert!(secrets::decode_key(&key).is_ok());
        assert!(secrets_init(path).is_err());
    }
}
