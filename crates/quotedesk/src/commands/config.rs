//! The `config` command.

use quotedesk_core::Config;
use std::collections::HashMap;
use std::path::Path;

/// Print the config sources and the merged configuration.
pub async fn show_config(cwd: &Path) -> anyhow::Result<()> {
    let (config, sources) = Config::load(Some(cwd)).await?;

    println!("Configuration sources:");
    if sources.is_empty() {
        println!("  (none)");
    } else {
        for source in &sources {
            println!("  {}", source.display());
        }
    }
    println!();

    println!("Current configuration:");
    println!("{}", serde_json::to_string_pretty(&redacted(config))?);

    Ok(())
}

/// Replace token values with placeholders so they never reach the terminal.
fn redacted(mut config: Config) -> Config {
    if let Some(tokens) = config.auth.as_mut().and_then(|auth| auth.tokens.as_mut()) {
        let mut entries: Vec<_> = tokens.drain().map(|(_, principal)| principal).collect();
        entries.sort_by(|a, b| a.user.cmp(&b.user));
        *tokens = entries
            .into_iter()
            .enumerate()
            .map(|(n, principal)| (format!("<redacted-{}>", n + 1), principal))
            .collect::<HashMap<_, _>>();
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacted_hides_token_values() {
        let config = Config::parse_jsonc(
            r#"{ "auth": { "tokens": {
                "s3cret": { "user": "root", "role": "admin" },
                "other": { "user": "user1", "role": "medical_writer" }
            } } }"#,
            "test",
        )
        .unwrap();

        let json = serde_json::to_string(&redacted(config)).unwrap();
        assert!(!json.contains("s3cret"));
        assert!(json.contains("<redacted-1>"));
        assert!(json.contains("root"));
        assert!(json.contains("user1"));
    }

    #[test]
    fn test_redacted_without_auth_is_unchanged() {
        let config = Config::default();
        assert_eq!(redacted(config.clone()), config);
    }
}
