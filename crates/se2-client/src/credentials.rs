//! Session cookie storage.

use std::path::PathBuf;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::Se2Error;

/// Where the session cookie lives between refreshes.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Current cookie header value.
    async fn load(&self) -> Result<SecretString, Se2Error>;

    /// Replace the stored cookie header value.
    async fn persist(&self, cookie: SecretString) -> Result<(), Se2Error>;
}

/// Cookie kept in a plain text file.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<SecretString, Se2Error> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Se2Error::MissingCookie);
            }
            Err(e) => {
                return Err(Se2Error::Credential(format!(
                    "failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        let cookie = contents.trim();
        if cookie.is_empty() {
            return Err(Se2Error::MissingCookie);
        }
        Ok(SecretString::from(cookie.to_string()))
    }

    async fn persist(&self, cookie: SecretString) -> Result<(), Se2Error> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Se2Error::Credential(e.to_string()))?;
        }
        tokio::fs::write(&self.path, cookie.expose_secret())
            .await
            .map_err(|e| {
                Se2Error::Credential(format!("failed to write {}: {}", self.path.display(), e))
            })?;
        debug!(path = %self.path.display(), "Session cookie saved");
        Ok(())
    }
}

/// Cookie kept in memory; for tests and one-shot tools.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    cookie: RwLock<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new(cookie: impl Into<String>) -> Self {
        Self {
            cookie: RwLock::new(Some(cookie.into())),
        }
    }

    /// Current cookie in clear text.
    pub async fn current(&self) -> Option<String> {
        self.cookie.read().await.clone()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self) -> Result<SecretString, Se2Error> {
        match self.cookie.read().await.as_deref() {
            Some(cookie) if !cookie.is_empty() => Ok(SecretString::from(cookie.to_string())),
            _ => Err(Se2Error::MissingCookie),
        }
    }

    async fn persist(&self, cookie: SecretString) -> Result<(), Se2Error> {
        *self.cookie.write().await = Some(cookie.expose_secret().to_string());
        Ok(())
    }
}

/// Extract the named cookies from `Set-Cookie` header values and join them
/// into a `Cookie` header value (`name=value; name=value`), in `names` order.
///
/// Header values may hold several cookies joined by commas.
pub fn parse_set_cookies<'a, I>(headers: I, names: &[String]) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut found: Vec<Option<String>> = vec![None; names.len()];

    for header in headers {
        for part in header.split([';', ',']) {
            let Some((name, value)) = part.trim().split_once('=') else {
                continue;
            };
            if let Some(index) = names.iter().position(|n| n == name.trim()) {
                let value = value.trim();
                if !value.is_empty() {
                    found[index] = Some(format!("{}={}", names[index], value));
                }
            }
        }
    }

    let cookies: Vec<String> = found.into_iter().flatten().collect();
    if cookies.is_empty() {
        None
    } else {
        Some(cookies.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Vec<String> {
        vec!["type1".into(), "type2".into(), "type3".into()]
    }

    #[test]
    fn test_parse_set_cookies_separate_headers() {
        let headers = [
            "type2=access.jwt; Path=/; HttpOnly",
            "type1=refresh.jwt; Path=/; HttpOnly; Secure",
            "lang=zh-TW; Path=/",
            "type3=\"eyJuYW1l==\"; Path=/",
        ];
        assert_eq!(
            parse_set_cookies(headers, &names()).as_deref(),
            Some("type1=refresh.jwt; type2=access.jwt; type3=\"eyJuYW1l==\"")
        );
    }

    #[test]
    fn test_parse_set_cookies_comma_joined() {
        let headers = ["type1=a; Path=/, type2=b; Path=/"];
        assert_eq!(
            parse_set_cookies(headers, &names()).as_deref(),
            Some("type1=a; type2=b")
        );
    }

    #[test]
    fn test_parse_set_cookies_none_wanted() {
        assert_eq!(parse_set_cookies(["lang=en; Path=/"], &names()), None);
        assert_eq!(parse_set_cookies(std::iter::empty(), &names()), None);
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryCredentialStore::default();
        assert!(matches!(store.load().await, Err(Se2Error::MissingCookie)));

        store.persist(SecretString::from("type1=x".to_string())).await.unwrap();
        assert_eq!(store.load().await.unwrap().expose_secret(), "type1=x");
    }

    #[tokio::test]
    async fn test_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("certs").join("cookie.txt"));
        assert!(matches!(store.load().await, Err(Se2Error::MissingCookie)));

        store.persist(SecretString::from("type1=a; type2=b".to_string())).await.unwrap();
        assert_eq!(store.load().await.unwrap().expose_secret(), "type1=a; type2=b");
    }
}
