use std::fs::{self, OpenOptions};
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// ログイン中のユーザーの認証情報。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub local_id: String,
    pub email: String,
    pub id_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// `now`の時点でIDトークンの有効期限が切れているか。
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

type SessionObserver = Box<dyn Fn(Option<&Session>)>;

/// セッションをファイルに保存するストア。
///
/// セッションを保存、または削除するたびに登録されたobserverへ通知する。
pub struct SessionStore {
    path: PathBuf,
    observers: Vec<SessionObserver>,
}

impl SessionStore {
    /// 新しい`SessionStore`を返す。
    ///
    /// # Arguments
    ///
    /// * `path` - セッションを保存するJSONファイルのパス
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            observers: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// セッションの変化を通知するcallbackを登録する。
    pub fn on_session_change(&mut self, callback: impl Fn(Option<&Session>) + 'static) {
        self.observers.push(Box::new(callback));
    }

    /// 保存されたセッションを読み込む。ファイルがなければ`None`を返す。
    pub fn load(&self) -> Result<Option<Session>> {
        if !self.path.exists() {
            debug!("No session file at {}", self.path.display());
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read session file: {}", self.path.display()))?;
        let session = serde_json::from_str::<Session>(&content)
            .with_context(|| format!("Failed to parse session file: {}", self.path.display()))?;

        Ok(Some(session))
    }

    /// セッションを保存する。
    ///
    /// リフレッシュトークンを含むため、Unixでは所有者のみ読み書きできるファイルにする。
    pub fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(session).context("Failed to serialize session")?;
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);
        let mut file = options
            .open(&self.path)
            .with_context(|| format!("Failed to open session file: {}", self.path.display()))?;
        // modeは新規作成時にしか効かないため、既存のファイルも絞り直す
        #[cfg(unix)]
        file.set_permissions(fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to restrict session file: {}", self.path.display()))?;
        file.write_all(content.as_bytes())
            .with_context(|| format!("Failed to write session file: {}", self.path.display()))?;
        info!("Session saved for {}", session.email);

        self.notify(Some(session));
        Ok(())
    }

    /// セッションを削除する。保存されていなくてもエラーにはしない。
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).with_context(|| {
                format!("Failed to remove session file: {}", self.path.display())
            })?;
            info!("Session cleared");
        }

        self.notify(None);
        Ok(())
    }

    fn notify(&self, session: Option<&Session>) {
        self.observers.iter().for_each(|observer| observer(session));
    }
}
