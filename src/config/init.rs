// ABOUTME: Config scaffolding for new projects.
// ABOUTME: Writes a commented ferry.yml template.

use std::path::Path;

use crate::error::{Error, Result};
use crate::types::TargetId;

use super::CONFIG_FILENAME;

pub fn init_config(dir: &Path, target: Option<&str>, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let target = match target {
        Some(t) => TargetId::new(t).map_err(|e| Error::InvalidConfig(e.to_string()))?,
        None => TargetId::new("prod").map_err(|e| Error::InvalidConfig(e.to_string()))?,
    };

    std::fs::write(&config_path, template_yaml(&target))?;

    Ok(())
}

fn template_yaml(target: &TargetId) -> String {
    format!(
        r#"build:
  commands:
    - npm install
    - npm test
    - npm run build
  artifact: ./dist

defaults:
  retries: 3
  timeout: 5m
  # known_hosts: accept-new   # strict | accept-new | insecure-skip

targets:
  {target}:
    host: server.example.com
    user: deploy
    # env:NAME reads the key from an environment variable, file:PATH from a file
    secret: env:DEPLOY_SSH_KEY
    remote_path: /var/www/html
    restart: sudo systemctl restart apache2
"#
    )
}
