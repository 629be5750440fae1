use anyhow::{Context, Result};
use chrono::Utc;
use log::info;

use crate::auth::IdentityProvider;
use crate::console::ConsolePresenter;
use crate::inflight::{Operation, RequestGate};
use crate::session::{Session, SessionStore};
use crate::validation::validate_new_password;

/// `login`サブコマンドの引数。
#[derive(Debug, clap::Args)]
pub struct LoginArgs {
    #[clap(short = 'e', long = "email")]
    pub email: String,

    #[clap(short = 'p', long = "password")]
    pub password: String,
}

/// `signup`サブコマンドの引数。
#[derive(Debug, clap::Args)]
pub struct SignupArgs {
    #[clap(short = 'e', long = "email")]
    pub email: String,

    #[clap(short = 'p', long = "password")]
    pub password: String,

    #[clap(short = 'c', long = "password-confirmation")]
    pub password_confirmation: String,
}

/// `reset-password`サブコマンドの引数。
#[derive(Debug, clap::Args)]
pub struct ResetPasswordArgs {
    #[clap(short = 'e', long = "email")]
    pub email: String,
}

/// `change-password`サブコマンドの引数。
#[derive(Debug, clap::Args)]
pub struct ChangePasswordArgs {
    #[clap(long = "current-password")]
    pub current_password: String,

    #[clap(short = 'p', long = "password", help = "New password")]
    pub password: String,

    #[clap(short = 'c', long = "password-confirmation")]
    pub password_confirmation: String,
}

/// 認証に関わるサブコマンド。
pub struct AuthCommand<'a, T: IdentityProvider> {
    provider: &'a T,
    sessions: &'a SessionStore,
    gate: RequestGate,
}

impl<'a, T: IdentityProvider> AuthCommand<'a, T> {
    /// 新しい`AuthCommand`を返す。
    ///
    /// # Arguments
    /// * `provider` - 認証サービスと通信するためのクライアント
    /// * `sessions` - セッションの保存先
    /// * `gate` - セッション全体で共有する実行中フラグ
    pub fn new(provider: &'a T, sessions: &'a SessionStore, gate: RequestGate) -> Self {
        Self {
            provider,
            sessions,
            gate,
        }
    }

    /// 保存されたセッションを返す。期限切れの場合は更新してから返す。
    pub async fn current_session(&self) -> Result<Option<Session>> {
        let session = match self.sessions.load()? {
            Some(session) => session,
            None => return Ok(None),
        };
        if !session.is_expired_at(Utc::now()) {
            return Ok(Some(session));
        }

        info!("Session expired at {}, refreshing", session.expires_at);
        let refreshed = {
            let _inflight = self.gate.begin(Operation::RefreshSession)?;
            self.provider.refresh(&session).await?
        };
        self.sessions.save(&refreshed)?;

        Ok(Some(refreshed))
    }

    /// `login`サブコマンドの処理を行う。
    pub async fn login<P: ConsolePresenter>(
        &self,
        args: LoginArgs,
        presenter: &mut P,
    ) -> Result<()> {
        let session = {
            let _inflight = self.gate.begin(Operation::SignIn)?;
            self.provider.sign_in(&args.email, &args.password).await?
        };
        self.sessions.save(&session)?;

        presenter.show_message("ログインしました")
    }

    /// `signup`サブコマンドの処理を行う。
    ///
    /// パスワードの一致と文字数を確認してから登録する。
    pub async fn signup<P: ConsolePresenter>(
        &self,
        args: SignupArgs,
        presenter: &mut P,
    ) -> Result<()> {
        validate_new_password(&args.password, &args.password_confirmation)?;

        let session = {
            let _inflight = self.gate.begin(Operation::SignUp)?;
            self.provider.sign_up(&args.email, &args.password).await?
        };
        self.sessions.save(&session)?;

        presenter.show_message("ユーザー登録が完了しました")
    }

    /// `logout`サブコマンドの処理を行う。
    pub fn logout<P: ConsolePresenter>(&self, presenter: &mut P) -> Result<()> {
        self.sessions.clear().context("ログアウトに失敗しました")?;

        presenter.show_message("ログアウトしました")
    }

    /// `reset-password`サブコマンドの処理を行う。
    pub async fn reset_password<P: ConsolePresenter>(
        &self,
        args: ResetPasswordArgs,
        presenter: &mut P,
    ) -> Result<()> {
        {
            let _inflight = self.gate.begin(Operation::SendPasswordReset)?;
            self.provider.send_password_reset(&args.email).await?;
        }

        presenter.show_message("パスワード設定メールを確認してください")
    }

    /// `change-password`サブコマンドの処理を行う。
    ///
    /// 成功した場合は再発行されたトークンでセッションを更新する。
    pub async fn change_password<P: ConsolePresenter>(
        &self,
        session: &Session,
        args: ChangePasswordArgs,
        presenter: &mut P,
    ) -> Result<()> {
        validate_new_password(&args.password, &args.password_confirmation)?;

        let updated = {
            let _inflight = self.gate.begin(Operation::ChangePassword)?;
            self.provider
                .reauthenticate_and_change_password(
                    session,
                    &args.current_password,
                    &args.password,
                )
                .await?
        };
        self.sessions.save(&updated)?;

        presenter.show_message("パスワード更新が完了しました")
    }
}
