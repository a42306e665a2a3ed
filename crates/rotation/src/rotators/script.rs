//! Rotator delegating to a local executable.
//!
//! The script receives the rotation context twice: as JSON on stdin and
//! as flat `DSOPS_*` environment variables. Stdout must be a single JSON
//! object in the [`ProtocolResponse`](crate::protocol::ProtocolResponse)
//! shape; anything else (empty output, invalid JSON, non-zero exit,
//! missing file) is a failure carrying the captured stderr.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dsops_catalog::{Capability, CredentialKindDef, ServiceCatalog};
use dsops_core::{
    DsopsError, Result, RotationRequest, RotationResult, RotationStatus, RotationStatusInfo,
    SecretInfo, SecretReference, VerificationResult, VerificationTest,
};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::protocol::{ProtocolRequest, ProtocolResponse, SchemaMetadata};
use crate::rotator::Rotator;

/// How long a script may run before it is killed
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const COMPONENT: &str = "script_rotator";

/// Subprocess-delegating rotator
#[derive(Default)]
pub struct ScriptRotator {
    catalog: Option<Arc<ServiceCatalog>>,
}

impl ScriptRotator {
    /// Rotator without schema checks
    pub fn new() -> Self {
        Self::default()
    }

    /// The credential-kind definition for a secret, when resolvable
    fn kind_def(&self, secret: &SecretInfo) -> Option<(String, String, CredentialKindDef)> {
        let catalog = self.catalog.as_ref()?;
        let service_name = secret.meta("service_type")?;
        let service = catalog.get_service_type(service_name)?;
        let kind_name = secret
            .meta("credential_kind")
            .unwrap_or_else(|| secret.kind.as_str());
        let def = service.kind(kind_name)?;
        Some((service_name.to_string(), kind_name.to_string(), def.clone()))
    }

    /// Schema check: with a catalog attached, the kind must declare the
    /// capability; with none, checks are skipped.
    fn require_capability(&self, secret: &SecretInfo, capability: Capability) -> Result<()> {
        if let Some((service, kind, def)) = self.kind_def(secret) {
            if !def.can(capability) {
                return Err(DsopsError::configuration(
                    "capabilities",
                    format!("{service}/{kind}"),
                    format!("credential kind `{kind}` does not declare the `{capability}` capability"),
                ));
            }
        }
        Ok(())
    }

    /// Expand environment variables in the configured script path and
    /// resolve it relative to the current working directory.
    fn script_path(secret: &SecretInfo) -> Result<PathBuf> {
        let raw = secret.meta("script_path").ok_or_else(|| {
            DsopsError::configuration(
                "script_path",
                secret.key.clone(),
                "no `script_path` metadata entry",
            )
        })?;
        let expanded = shellexpand::env(raw).map_err(|e| {
            DsopsError::configuration("script_path", raw, format!("cannot expand path: {e}"))
        })?;
        let mut path = PathBuf::from(expanded.as_ref());
        if path.is_relative() {
            path = std::env::current_dir()?.join(path);
        }
        if !path.exists() {
            return Err(DsopsError::configuration(
                "script_path",
                path.display().to_string(),
                format!("script file not found: {}", path.display()),
            ));
        }
        Ok(path)
    }

    /// `DSOPS_<PREFIX>_<KEY>` with the key uppercased and `-` mapped to `_`
    fn env_key(prefix: &str, key: &str) -> String {
        let key: String = key
            .chars()
            .map(|c| match c {
                '-' => '_',
                other => other.to_ascii_uppercase(),
            })
            .collect();
        format!("DSOPS_{prefix}_{key}")
    }

    fn apply_environment(command: &mut Command, action: &str, request: &RotationRequest) {
        command
            .env("DSOPS_ACTION", action)
            .env("DSOPS_SECRET_KEY", &request.secret.key)
            .env("DSOPS_SECRET_PROVIDER", &request.secret.provider)
            .env("DSOPS_SECRET_TYPE", request.secret.kind.as_str())
            .env("DSOPS_DRY_RUN", request.dry_run.to_string())
            .env("DSOPS_FORCE", request.force.to_string());
        for (key, value) in &request.secret.metadata {
            command.env(Self::env_key("META", key), value);
        }
        for (key, value) in &request.config {
            let value = match value {
                Value::String(s) => s.clone(),
                Value::Bool(b) => b.to_string(),
                Value::Number(n) => n.to_string(),
                _ => continue,
            };
            command.env(Self::env_key("CONFIG", key), value);
        }
    }

    async fn run(&self, action: &str, request: &RotationRequest) -> Result<ProtocolResponse> {
        let path = Self::script_path(&request.secret)?;

        let mut payload = ProtocolRequest::for_action(action, request);
        payload.environment = request
            .config_str("environment")
            .or_else(|| request.secret.meta("environment"))
            .map(str::to_string);
        payload.schema_metadata =
            self.kind_def(&request.secret)
                .map(|(service_type, credential_kind, def)| SchemaMetadata {
                    service_type,
                    credential_kind,
                    capabilities: def.capabilities.iter().map(|c| c.as_str().to_string()).collect(),
                    constraints: def.constraints,
                });

        let mut command = Command::new(&path);
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        Self::apply_environment(&mut command, action, request);

        let mut child = command.spawn().map_err(|e| DsopsError::Process {
            message: format!("cannot execute {}: {e}", path.display()),
            stderr: String::new(),
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            let json = serde_json::to_vec(&payload)?;
            stdin.write_all(&json).await.map_err(|e| DsopsError::Process {
                message: format!("cannot write script stdin: {e}"),
                stderr: String::new(),
            })?;
        }

        let output = tokio::time::timeout(DEFAULT_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| DsopsError::Process {
                message: format!("script timeout after {}s", DEFAULT_TIMEOUT.as_secs()),
                stderr: String::new(),
            })?
            .map_err(|e| DsopsError::Process {
                message: format!("script execution failed: {e}"),
                stderr: String::new(),
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !output.status.success() {
            return Err(DsopsError::Process {
                message: format!("script exited with {}", output.status),
                stderr,
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if stdout.is_empty() {
            return Err(DsopsError::Process {
                message: "script produced no output".to_string(),
                stderr,
            });
        }

        serde_json::from_str(&stdout).map_err(|e| DsopsError::Process {
            message: format!("script output is not valid JSON: {e}"),
            stderr,
        })
    }
}

#[async_trait]
impl Rotator for ScriptRotator {
    fn name(&self) -> &str {
        "script"
    }

    fn supports_secret(&self, secret: &SecretInfo) -> bool {
        secret.meta("script_path").is_some()
    }

    async fn rotate(&self, request: &RotationRequest) -> Result<RotationResult> {
        let mut result = RotationResult::new(request.secret.clone());
        result.audit(
            "rotation_started",
            COMPONENT,
            "started",
            format!("delegating rotation of `{}` to script", request.secret.key),
        );

        if let Err(e) = self.require_capability(&request.secret, Capability::Rotate) {
            result.audit("schema_check", COMPONENT, "failed", e.to_string());
            result.fail(e.to_string());
            return Ok(result);
        }

        let response = match self.run("rotate", request).await {
            Ok(response) => response,
            Err(e) => {
                let message = match &e {
                    DsopsError::Process { message, stderr } if !stderr.is_empty() => {
                        format!("{message}: {stderr}")
                    }
                    _ => e.to_string(),
                };
                result.audit("script_run", COMPONENT, "failed", message.clone());
                result.fail(message);
                return Ok(result);
            }
        };

        if !response.success {
            result.audit("script_run", COMPONENT, "failed", response.failure_message());
            result.fail(response.failure_message());
            return Ok(result);
        }

        result.warnings.extend(response.warnings.clone());

        if request.dry_run {
            result.audit(
                "dry_run",
                COMPONENT,
                "completed",
                "script acknowledged simulated rotation",
            );
            result.status = RotationStatus::Pending;
            return Ok(result);
        }

        let mut reference = response
            .new_secret_ref
            .unwrap_or_else(|| SecretReference::for_secret(&request.secret));
        reference.metadata.extend(response.metadata);
        result.complete(reference);
        result.audit(
            "rotation_completed",
            COMPONENT,
            "completed",
            response
                .message
                .unwrap_or_else(|| "script completed rotation".to_string()),
        );
        Ok(result)
    }

    async fn verify(
        &self,
        secret: &SecretInfo,
        reference: &SecretReference,
        tests: &[VerificationTest],
    ) -> Result<Vec<VerificationResult>> {
        self.require_capability(secret, Capability::Verify)?;

        let mut request = RotationRequest::new(secret.clone());
        request
            .config
            .insert("tests".into(), serde_json::to_value(tests)?);
        request
            .config
            .insert("reference".into(), serde_json::to_value(reference)?);

        let response = self.run("verify", &request).await?;
        let message = if response.success {
            response
                .message
                .clone()
                .unwrap_or_else(|| "script verified credential".to_string())
        } else {
            response.failure_message()
        };
        Ok(tests
            .iter()
            .map(|test| {
                if response.success {
                    VerificationResult::pass(test, message.clone())
                } else {
                    VerificationResult::fail(test, message.clone())
                }
            })
            .collect())
    }

    async fn rollback(&self, secret: &SecretInfo, previous: &SecretReference) -> Result<()> {
        // `revoke` stands in for rollback: a target that can revoke can
        // restore the previous credential's standing.
        self.require_capability(secret, Capability::Revoke)?;

        let mut request = RotationRequest::new(secret.clone());
        request
            .config
            .insert("previous".into(), serde_json::to_value(previous)?);

        let response = self.run("rollback", &request).await?;
        if response.success {
            Ok(())
        } else {
            Err(DsopsError::Other(format!(
                "script rollback failed: {}",
                response.failure_message()
            )))
        }
    }

    async fn get_status(&self, _secret: &SecretInfo) -> Result<RotationStatusInfo> {
        Ok(RotationStatusInfo {
            status: RotationStatus::Pending,
            last_rotated: None,
            next_rotation: None,
            can_rotate: true,
            reason: "scripts do not expose rotation state".to_string(),
        })
    }

    fn set_repository(&mut self, catalog: Arc<ServiceCatalog>) {
        self.catalog = Some(catalog);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use dsops_core::SecretKind;
    use dsops_catalog::ServiceType;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn write_script(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        let mut permissions = std::fs::metadata(&path).unwrap().permissions();
        permissions.set_mode(0o755);
        std::fs::set_permissions(&path, permissions).unwrap();
        path
    }

    fn secret_with_script(path: &PathBuf) -> SecretInfo {
        SecretInfo::new("vault", "db/password", SecretKind::Password)
            .with_metadata("script_path", path.display().to_string())
            .with_metadata("service-tier", "gold")
    }

    #[tokio::test]
    async fn successful_script_rotation() {
        let dir = TempDir::new().unwrap();
        let path = write_script(
            &dir,
            "rotate.sh",
            r#"printf '{"success": true, "new_secret_ref": {"provider": "vault", "key": "db/password", "version": "9"}}'"#,
        );

        let rotator = ScriptRotator::new();
        let request = RotationRequest::new(secret_with_script(&path));
        let result = rotator.rotate(&request).await.unwrap();

        assert_eq!(result.status, RotationStatus::Completed);
        assert_eq!(
            result.new_secret_ref.unwrap().version.as_deref(),
            Some("9")
        );
    }

    #[tokio::test]
    async fn environment_variables_reach_the_script() {
        let dir = TempDir::new().unwrap();
        let path = write_script(
            &dir,
            "env.sh",
            r#"printf '{"success": true, "metadata": {"action": "%s", "key": "%s", "tier": "%s"}}' "$DSOPS_ACTION" "$DSOPS_SECRET_KEY" "$DSOPS_META_SERVICE_TIER""#,
        );

        let rotator = ScriptRotator::new();
        let request = RotationRequest::new(secret_with_script(&path));
        let result = rotator.rotate(&request).await.unwrap();

        let metadata = result.new_secret_ref.unwrap().metadata;
        assert_eq!(metadata["action"], "rotate");
        assert_eq!(metadata["key"], "db/password");
        assert_eq!(metadata["tier"], "gold");
    }

    #[tokio::test]
    async fn stdin_carries_the_json_payload() {
        let dir = TempDir::new().unwrap();
        // The script answers with the action it read from stdin.
        let path = write_script(
            &dir,
            "stdin.sh",
            r#"input=$(cat)
case "$input" in
  *'"action":"rotate"'*) printf '{"success": true}' ;;
  *) printf '{"success": false, "error": "unexpected payload"}' ;;
esac"#,
        );

        let rotator = ScriptRotator::new();
        let request = RotationRequest::new(secret_with_script(&path));
        let result = rotator.rotate(&request).await.unwrap();
        assert_eq!(result.status, RotationStatus::Completed);
    }

    #[tokio::test]
    async fn nonzero_exit_surfaces_stderr() {
        let dir = TempDir::new().unwrap();
        let path = write_script(&dir, "fail.sh", "echo 'target unreachable' >&2\nexit 3");

        let rotator = ScriptRotator::new();
        let request = RotationRequest::new(secret_with_script(&path));
        let result = rotator.rotate(&request).await.unwrap();

        assert_eq!(result.status, RotationStatus::Failed);
        let error = result.error.unwrap();
        assert!(error.contains("exited"));
        assert!(error.contains("target unreachable"));
    }

    #[tokio::test]
    async fn empty_stdout_is_a_failure() {
        let dir = TempDir::new().unwrap();
        let path = write_script(&dir, "silent.sh", "exit 0");

        let rotator = ScriptRotator::new();
        let request = RotationRequest::new(secret_with_script(&path));
        let result = rotator.rotate(&request).await.unwrap();

        assert_eq!(result.status, RotationStatus::Failed);
        assert!(result.error.unwrap().contains("no output"));
    }

    #[tokio::test]
    async fn invalid_json_is_a_failure() {
        let dir = TempDir::new().unwrap();
        let path = write_script(&dir, "garbage.sh", "echo done");

        let rotator = ScriptRotator::new();
        let request = RotationRequest::new(secret_with_script(&path));
        let result = rotator.rotate(&request).await.unwrap();

        assert_eq!(result.status, RotationStatus::Failed);
        assert!(result.error.unwrap().contains("not valid JSON"));
    }

    #[tokio::test]
    async fn missing_script_is_a_failure() {
        let rotator = ScriptRotator::new();
        let secret = SecretInfo::new("vault", "k", SecretKind::Generic)
            .with_metadata("script_path", "/nonexistent/rotate.sh");
        let request = RotationRequest::new(secret);
        let result = rotator.rotate(&request).await.unwrap();

        assert_eq!(result.status, RotationStatus::Failed);
        assert!(result.error.unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn catalog_gates_the_rotate_capability() {
        let dir = TempDir::new().unwrap();
        let path = write_script(&dir, "rotate.sh", r#"printf '{"success": true}'"#);

        let catalog = ServiceCatalog::builder()
            .service_type(ServiceType::new("redis", "database").with_kind(
                "password",
                CredentialKindDef::with_capabilities([Capability::Verify]),
            ))
            .build();

        let mut rotator = ScriptRotator::new();
        rotator.set_repository(Arc::new(catalog));

        let secret = secret_with_script(&path).with_metadata("service_type", "redis");
        let request = RotationRequest::new(secret);
        let result = rotator.rotate(&request).await.unwrap();

        assert_eq!(result.status, RotationStatus::Failed);
        assert!(result.error.unwrap().contains("`rotate` capability"));
    }

    #[tokio::test]
    async fn env_vars_in_script_path_are_expanded() {
        let dir = TempDir::new().unwrap();
        let path = write_script(&dir, "rotate.sh", r#"printf '{"success": true}'"#);
        std::env::set_var("DSOPS_TEST_SCRIPT_DIR", dir.path());

        let rotator = ScriptRotator::new();
        let secret = SecretInfo::new("vault", "k", SecretKind::Generic)
            .with_metadata("script_path", "${DSOPS_TEST_SCRIPT_DIR}/rotate.sh");
        let request = RotationRequest::new(secret);
        let result = rotator.rotate(&request).await.unwrap();

        assert_eq!(result.status, RotationStatus::Completed);
        drop(path);
    }

    #[test]
    fn env_key_uppercases_and_maps_dashes() {
        assert_eq!(ScriptRotator::env_key("META", "service-tier"), "DSOPS_META_SERVICE_TIER");
        assert_eq!(ScriptRotator::env_key("CONFIG", "retry_count"), "DSOPS_CONFIG_RETRY_COUNT");
    }
}
