//! Google OAuth client secrets for an installed application.

use crate::error::ChattoError;
use eyre::Context;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// The name of the file, next to the secrets file, that OAuth tokens are persisted in.
const TOKENS_FILE_NAME: &str = "tokens.json";

/// The `installed` section of a client secrets file as downloaded from the Google Cloud console.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secrets {
    pub client_id: String,
    pub project_id: String,
    pub auth_uri: String,
    pub token_uri: String,
    pub auth_provider_x509_cert_url: String,
    pub client_secret: String,
    pub redirect_uris: Vec<String>,
    /// Where the secrets were loaded from.
    #[serde(skip)]
    pub path: PathBuf,
}

#[derive(Deserialize)]
struct SecretsFile {
    installed: Secrets,
}

impl Secrets {
    /// Loads the secrets file at `path`.
    pub fn from_file(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ChattoError::NoSecrets(
                "you must provide a valid path to a secrets file".to_string(),
            )
            .into());
        }

        tracing::info!(path = %path.display(), "loading secrets");
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("read secrets file {}", path.display()))?;
        Self::from_json(&data, path)
    }

    /// Parses the contents of a secrets file that lives at `path`.
    pub fn from_json(data: &str, path: impl Into<PathBuf>) -> eyre::Result<Self> {
        let SecretsFile { mut installed } =
            serde_json::from_str(data).context("parse secrets file as installed-app secrets")?;
        installed.path = path.into();
        tracing::debug!(project = %installed.project_id, "loaded secrets");
        Ok(installed)
    }

    /// Where OAuth tokens obtained with these secrets are persisted.
    pub fn tokens_path(&self) -> PathBuf {
        self.path
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(TOKENS_FILE_NAME)
    }
}

impl fmt::Display for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.project_id)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    pub(crate) fn secrets_json(token_uri: &str) -> String {
        serde_json::json!({
            "installed": {
                "client_id": "4398t34t89.apps.googleusercontent.com",
                "project_id": "chatto-test",
                "auth_uri": "https://accounts.google.com/o/oauth2/auth",
                "token_uri": token_uri,
                "auth_provider_x509_cert_url": "https://www.googleapis.com/oauth2/v1/certs",
                "client_secret": "GOCSPX-t4398g43h9g84",
                "redirect_uris": ["http://localhost"]
            }
        })
        .to_string()
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client_secrets.json");
        std::fs::write(&path, secrets_json("https://oauth2.googleapis.com/token")).unwrap();

        let secrets = Secrets::from_file(&path).unwrap();
        assert_eq!(secrets.client_id, "4398t34t89.apps.googleusercontent.com");
        assert_eq!(secrets.project_id, "chatto-test");
        assert_eq!(secrets.token_uri, "https://oauth2.googleapis.com/token");
        assert_eq!(secrets.redirect_uris, vec!["http://localhost".to_string()]);
        assert_eq!(secrets.path, path);
        assert_eq!(secrets.to_string(), "chatto-test");
        assert_eq!(secrets.tokens_path(), dir.path().join("tokens.json"));
    }

    #[test]
    fn missing_file() {
        let err = Secrets::from_file("/definitely/not/here.json").unwrap_err();
        insta::assert_snapshot!(err, @"you must provide a valid path to a secrets file");
        assert!(matches!(
            ChattoError::find(&err),
            Some(ChattoError::NoSecrets(_))
        ));
    }

    #[test]
    fn not_installed_app() {
        let err = Secrets::from_json(r#"{"web": {}}"#, "client.json").unwrap_err();
        insta::assert_snapshot!(err, @"parse secrets file as installed-app secrets");
    }

    #[test]
    fn bare_file_name_tokens_path() {
        let secrets = Secrets::from_json(&secrets_json("https://example.com"), "client.json").unwrap();
        assert_eq!(secrets.tokens_path(), PathBuf::from("tokens.json"));
    }
}
