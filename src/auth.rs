use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use log::info;
#[cfg(test)]
use mockall::automock;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::api_error::check_status;
use crate::config::FirebaseConfig;
use crate::session::Session;

/// 認証サービスとやり取りするためのtrait。
#[cfg_attr(test, automock)]
#[async_trait]
pub trait IdentityProvider {
    /// メールアドレスとパスワードでログインする。
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session>;

    /// ユーザーを新規作成し、そのままログインする。
    async fn sign_up(&self, email: &str, password: &str) -> Result<Session>;

    /// パスワード再設定メールを送信する。
    async fn send_password_reset(&self, email: &str) -> Result<()>;

    /// 現在のパスワードで再認証してからパスワードを変更する。
    ///
    /// 変更後はトークンが再発行されるため、新しいセッションを返す。
    async fn reauthenticate_and_change_password(
        &self,
        session: &Session,
        current_password: &str,
        new_password: &str,
    ) -> Result<Session>;

    /// リフレッシュトークンでIDトークンを再発行する。
    async fn refresh(&self, session: &Session) -> Result<Session>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OobCodeRequest<'a> {
    request_type: &'a str,
    email: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdatePasswordRequest<'a> {
    id_token: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

/// signInWithPassword, signUp, updateのレスポンス。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    local_id: String,
    email: String,
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

/// Secure Tokenのレスポンス。
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    user_id: String,
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

/// IDトークンの有効期間(秒)を期限の日時に変換する。
fn expires_at(expires_in: &str) -> Result<chrono::DateTime<Utc>> {
    let seconds = expires_in
        .parse::<i64>()
        .with_context(|| format!("Invalid expiresIn: {}", expires_in))?;

    Ok(Utc::now() + Duration::seconds(seconds))
}

impl AuthResponse {
    fn into_session(self) -> Result<Session> {
        Ok(Session {
            expires_at: expires_at(&self.expires_in)?,
            local_id: self.local_id,
            email: self.email,
            id_token: self.id_token,
            refresh_token: self.refresh_token,
        })
    }
}

/// Firebase Authentication(Identity Toolkit REST API)のクライアント。
///
/// # Examples
///
/// ```
/// let client = FirebaseAuthClient::new(&config);
/// let session = client.sign_in("user@example.com", "password").await?;
/// ```
pub struct FirebaseAuthClient {
    client: Client,
    auth_url: String,
    token_url: String,
    api_key: String,
}

impl FirebaseAuthClient {
    /// 新しい`FirebaseAuthClient`を返す。
    pub fn new(config: &FirebaseConfig) -> Self {
        Self {
            client: Client::new(),
            auth_url: config.auth_url.clone(),
            token_url: config.token_url.clone(),
            api_key: config.api_key.clone(),
        }
    }

    /// `accounts:{method}`にJSONをPOSTする。
    async fn post_accounts<B: Serialize + ?Sized>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<reqwest::Response> {
        let url = format!("{}/accounts:{}", self.auth_url, method);
        let response = self
            .client
            .post(&url)
            .query(&[("key", &self.api_key)])
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;

        check_status(response).await
    }

    async fn password_auth(&self, method: &str, email: &str, password: &str) -> Result<Session> {
        let body = PasswordRequest {
            email,
            password,
            return_secure_token: true,
        };
        self.post_accounts(method, &body)
            .await?
            .json::<AuthResponse>()
            .await
            .context("Failed to deserialize response")?
            .into_session()
    }
}

#[async_trait]
impl IdentityProvider for FirebaseAuthClient {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let session = self
            .password_auth("signInWithPassword", email, password)
            .await
            .context("ログインに失敗しました")?;
        info!("Signed in as {}", session.email);

        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Session> {
        let session = self
            .password_auth("signUp", email, password)
            .await
            .context("サインアップに失敗しました")?;
        info!("Signed up as {}", session.email);

        Ok(session)
    }

    async fn send_password_reset(&self, email: &str) -> Result<()> {
        let body = OobCodeRequest {
            request_type: "PASSWORD_RESET",
            email,
        };
        self.post_accounts("sendOobCode", &body)
            .await
            .context("パスワード再設定メールの送信に失敗しました")?;
        info!("Password reset email sent to {}", email);

        Ok(())
    }

    async fn reauthenticate_and_change_password(
        &self,
        session: &Session,
        current_password: &str,
        new_password: &str,
    ) -> Result<Session> {
        let reauthenticated = self
            .password_auth("signInWithPassword", &session.email, current_password)
            .await
            .context("パスワード更新に失敗しました (再認証)")?;

        let body = UpdatePasswordRequest {
            id_token: &reauthenticated.id_token,
            password: new_password,
            return_secure_token: true,
        };
        let updated = self
            .post_accounts("update", &body)
            .await
            .context("パスワード更新に失敗しました")?
            .json::<AuthResponse>()
            .await
            .context("Failed to deserialize response")?
            .into_session()?;
        info!("Password updated for {}", updated.email);

        Ok(updated)
    }

    async fn refresh(&self, session: &Session) -> Result<Session> {
        let url = format!("{}/token", self.token_url);
        let response = self
            .client
            .post(&url)
            .query(&[("key", &self.api_key)])
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", session.refresh_token.as_str()),
            ])
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;
        let refreshed = check_status(response)
            .await
            .context("セッションの更新に失敗しました")?
            .json::<RefreshResponse>()
            .await
            .context("Failed to deserialize response")?;
        info!("Session refreshed for {}", session.email);

        Ok(Session {
            expires_at: expires_at(&refreshed.expires_in)?,
            local_id: refreshed.user_id,
            email: session.email.clone(),
            id_token: refreshed.id_token,
            refresh_token: refreshed.refresh_token,
        })
    }
}
