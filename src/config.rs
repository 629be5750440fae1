use std::env;
use std::path::PathBuf;

use thiserror::Error;

const DEFAULT_AUTH_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const DEFAULT_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1";
const DEFAULT_FIRESTORE_URL: &str = "https://firestore.googleapis.com/v1";

/// 設定の読み込みエラー。
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    MissingVar(&'static str),
    #[error("Could not determine the config directory; set STUDYLOG_SESSION_FILE")]
    NoConfigDir,
}

/// Firebaseへの接続設定。
#[derive(Clone, Debug)]
pub struct FirebaseConfig {
    pub api_key: String,
    pub project_id: String,
    /// Identity ToolkitのベースURL。
    pub auth_url: String,
    /// Secure TokenのベースURL。
    pub token_url: String,
    /// FirestoreのベースURL。
    pub firestore_url: String,
}

impl FirebaseConfig {
    /// 環境変数から設定を読み込む。
    ///
    /// `FIREBASE_API_KEY`と`FIREBASE_PROJECT_ID`が設定されていない場合はエラーを返す。
    /// 各エンドポイントは`FIREBASE_AUTH_URL`, `FIREBASE_TOKEN_URL`, `FIRESTORE_URL`で上書きできる。
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key =
            env::var("FIREBASE_API_KEY").map_err(|_| ConfigError::MissingVar("FIREBASE_API_KEY"))?;
        let project_id = env::var("FIREBASE_PROJECT_ID")
            .map_err(|_| ConfigError::MissingVar("FIREBASE_PROJECT_ID"))?;

        Ok(Self {
            api_key,
            project_id,
            auth_url: env::var("FIREBASE_AUTH_URL").unwrap_or_else(|_| DEFAULT_AUTH_URL.to_string()),
            token_url: env::var("FIREBASE_TOKEN_URL")
                .unwrap_or_else(|_| DEFAULT_TOKEN_URL.to_string()),
            firestore_url: env::var("FIRESTORE_URL")
                .unwrap_or_else(|_| DEFAULT_FIRESTORE_URL.to_string()),
        })
    }

    /// 全エンドポイントを同じベースURLに向けた設定を返す。テストで利用する。
    #[cfg(test)]
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            api_key: "test-key".to_string(),
            project_id: "test-project".to_string(),
            auth_url: format!("{}/v1", base_url),
            token_url: format!("{}/v1", base_url),
            firestore_url: format!("{}/v1", base_url),
        }
    }
}

/// セッションファイルのパスを返す。
///
/// `STUDYLOG_SESSION_FILE`が設定されていればそれを使い、なければ設定ディレクトリ配下に置く。
pub fn session_file() -> Result<PathBuf, ConfigError> {
    if let Ok(path) = env::var("STUDYLOG_SESSION_FILE") {
        return Ok(PathBuf::from(path));
    }
    let dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;

    Ok(dir.join("studylog").join("session.json"))
}
