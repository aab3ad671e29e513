// ABOUTME: Runs build commands in order and verifies the artifact afterwards.
// ABOUTME: Fails fast on the first non-zero exit; never retries.

use super::artifact::BuildArtifact;
use super::error::BuildError;
use super::runner::CommandRunner;
use crate::config::{Config, resolve_env_map};
use crate::error::Error;
use nonempty::NonEmpty;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Fully resolved build inputs.
#[derive(Debug, Clone)]
pub struct BuildSpec {
    pub commands: NonEmpty<String>,
    pub working_dir: PathBuf,
    pub artifact_dir: PathBuf,
    pub env: HashMap<String, String>,
}

impl BuildSpec {
    /// Resolve the build section of the config, including environment values.
    pub fn from_config(config: &Config) -> Result<Self, BuildError> {
        let env = resolve_env_map(&config.build.env).map_err(|e| match e {
            Error::MissingEnvVar(var) => BuildError::MissingEnvVar(var),
            other => BuildError::Environment(other.to_string()),
        })?;

        Ok(Self {
            commands: config.build.commands.clone(),
            working_dir: config.build_dir(),
            artifact_dir: config.artifact_dir(),
            env,
        })
    }
}

/// Executes a [`BuildSpec`] through a [`CommandRunner`].
#[derive(Clone)]
pub struct Builder {
    runner: Arc<dyn CommandRunner>,
}

impl Builder {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    pub async fn build(&self, spec: &BuildSpec) -> Result<BuildArtifact, BuildError> {
        for command in spec.commands.iter() {
            let outcome = self
                .runner
                .run(command, &spec.working_dir, &spec.env)
                .await
                .map_err(|e| BuildError::Spawn {
                    stage: command.clone(),
                    reason: e.to_string(),
                })?;

            if !outcome.success() {
                tracing::warn!(
                    target: "ferry::build",
                    "Build command `{}` failed with exit code {:?}",
                    command,
                    outcome.exit_code
                );
                return Err(BuildError::CommandFailed {
                    stage: command.clone(),
                    exit_code: outcome.exit_code,
                    output: outcome.combined_output(),
                });
            }
        }

        self.verify(spec).await
    }

    async fn verify(&self, spec: &BuildSpec) -> Result<BuildArtifact, BuildError> {
        let dir = spec.artifact_dir.clone();
        if !dir.is_dir() {
            return Err(BuildError::Verify {
                reason: format!("artifact directory not found: {}", dir.display()),
            });
        }

        let scanned = tokio::task::spawn_blocking(move || BuildArtifact::scan(&dir))
            .await
            .map_err(|e| BuildError::Verify {
                reason: format!("artifact scan aborted: {}", e),
            })?
            .map_err(|e| BuildError::Verify {
                reason: format!("failed to read artifact: {}", e),
            })?;

        let artifact = scanned.ok_or_else(BuildError::empty_artifact)?;
        tracing::info!(
            target: "ferry::build",
            "Artifact {} ready: {} files, {} bytes, {}",
            artifact.path.display(),
            artifact.file_count,
            artifact.total_size,
            artifact.hash
        );
        Ok(artifact)
    }
}

impl std::fmt::Debug for Builder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builder").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::ShellRunner;

    fn spec(dir: &std::path::Path, commands: &[&str]) -> BuildSpec {
        BuildSpec {
            commands: NonEmpty::from_vec(commands.iter().map(|c| c.to_string()).collect())
                .unwrap(),
            working_dir: dir.to_path_buf(),
            artifact_dir: dir.join("dist"),
            env: HashMap::new(),
        }
    }

    #[test]
    fn unset_env_var_without_default_is_missing() {
        let config = Config::from_yaml(
            r#"
build:
  commands: ["npm run build"]
  artifact: dist
  env:
    API_URL:
      env: FERRY_TEST_UNSET_API_URL
targets:
  prod:
    host: example.com
"#,
        )
        .unwrap();

        let err = temp_env::with_var_unset("FERRY_TEST_UNSET_API_URL", || {
            BuildSpec::from_config(&config).unwrap_err()
        });
        assert!(matches!(
            err,
            BuildError::MissingEnvVar(ref var) if var == "FERRY_TEST_UNSET_API_URL"
        ));
        assert_eq!(
            err.to_string(),
            "missing build environment variable: FERRY_TEST_UNSET_API_URL"
        );
    }

    #[tokio::test]
    async fn successful_build_produces_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let builder = Builder::new(Arc::new(ShellRunner));
        let artifact = builder
            .build(&spec(
                dir.path(),
                &["mkdir -p dist", "echo hi > dist/index.html"],
            ))
            .await
            .unwrap();

        assert_eq!(artifact.file_count, 1);
    }

    #[tokio::test]
    async fn stops_at_first_failing_command() {
        let dir = tempfile::tempdir().unwrap();
        let builder = Builder::new(Arc::new(ShellRunner));
        let err = builder
            .build(&spec(
                dir.path(),
                &["echo broken >&2; exit 1", "touch should-not-exist"],
            ))
            .await
            .unwrap_err();

        match err {
            BuildError::CommandFailed {
                stage,
                exit_code,
                output,
            } => {
                assert_eq!(stage, "echo broken >&2; exit 1");
                assert_eq!(exit_code, Some(1));
                assert_eq!(output, "broken");
            }
            other => panic!("expected CommandFailed, got {:?}", other),
        }
        assert!(!dir.path().join("should-not-exist").exists());
    }

    #[tokio::test]
    async fn empty_artifact_fails_verification() {
        let dir = tempfile::tempdir().unwrap();
        let builder = Builder::new(Arc::new(ShellRunner));
        let err = builder
            .build(&spec(dir.path(), &["mkdir -p dist"]))
            .await
            .unwrap_err();

        assert_eq!(err.stage(), "verify");
        assert!(err.to_string().contains("empty artifact"));
    }

    #[tokio::test]
    async fn missing_artifact_dir_fails_verification() {
        let dir = tempfile::tempdir().unwrap();
        let builder = Builder::new(Arc::new(ShellRunner));
        let err = builder.build(&spec(dir.path(), &["true"])).await.unwrap_err();

        assert_eq!(err.stage(), "verify");
        assert!(err.to_string().contains("not found"));
    }
}
