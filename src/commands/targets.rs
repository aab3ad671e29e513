// ABOUTME: Targets command implementation.
// ABOUTME: Lists configured targets with their address and remote path.

use ferry::config::Config;
use ferry::error::Result;
use ferry::output::{Output, OutputMode};
use serde::Serialize;

#[derive(Serialize)]
struct TargetRow<'a> {
    id: &'a str,
    host: Option<&'a str>,
    user: Option<&'a str>,
    remote_path: Option<&'a str>,
}

pub fn targets(config: &Config, output: &Output) -> Result<()> {
    for (id, target) in &config.targets {
        let row = TargetRow {
            id: id.as_str(),
            host: target.host.as_deref(),
            user: target.user.as_deref(),
            remote_path: target.remote_path.as_deref(),
        };

        match output.mode() {
            OutputMode::Json => {
                if let Ok(json) = serde_json::to_string(&row) {
                    println!("{json}");
                }
            }
            OutputMode::Quiet => println!("{}", row.id),
            OutputMode::Normal => {
                let login = match row.user {
                    Some(user) => format!("{}@{}", user, row.host.unwrap_or("?")),
                    None => row.host.unwrap_or("?").to_string(),
                };
                println!(
                    "{:<16} {:<32} {}",
                    row.id,
                    login,
                    row.remote_path.unwrap_or("-")
                );
            }
        }
    }
    Ok(())
}
