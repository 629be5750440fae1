use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{debug, info};

mod api_error;
mod auth;
mod auth_command;
mod config;
mod console;
mod firestore;
mod inflight;
mod learning_record;
mod logger;
mod reconcile;
mod record_command;
mod record_service;
mod route_guard;
mod session;
mod validation;

use auth::FirebaseAuthClient;
use auth_command::{AuthCommand, ChangePasswordArgs, LoginArgs, ResetPasswordArgs, SignupArgs};
use config::FirebaseConfig;
use console::ConsoleMarkdownList;
use firestore::FirestoreClient;
use inflight::RequestGate;
use record_command::{DeleteArgs, EditArgs, EntryArgs, RecordCommand};
use route_guard::{guard, Decision, Route};
use session::SessionStore;

/// 学習時間を記録するためのCLIアプリケーション。
///
/// # Examples
/// ```
/// $ cargo run -- login --email user@example.com --password secret
/// $ cargo run -- entry --title Math --time 30
/// $ cargo run -- list
/// ```
#[derive(Debug, Parser)]
#[clap(version, about)]
struct Args {
    #[clap(short = 'v', long = "verbose", global = true, help = "Show debug logs")]
    verbose: bool,

    #[clap(subcommand)]
    subcommand: SubCommands,
}

/// サブコマンドを表す列挙型。
#[derive(Debug, Subcommand)]
enum SubCommands {
    /// 学習記録と合計時間を表示する
    List,
    /// 合計学習時間を表示する
    Total,
    /// 学習記録を登録する。同じ学習内容があれば時間を加算する
    Entry(EntryArgs),
    /// 学習記録を編集する
    Edit(EditArgs),
    /// 学習記録を削除する
    Delete(DeleteArgs),
    /// ログインする
    Login(LoginArgs),
    /// ユーザーを登録する
    Signup(SignupArgs),
    /// ログアウトする
    Logout,
    /// パスワード再設定メールを送信する
    ResetPassword(ResetPasswordArgs),
    /// パスワードを変更する
    ChangePassword(ChangePasswordArgs),
}

impl SubCommands {
    fn route(&self) -> Route {
        match self {
            SubCommands::List
            | SubCommands::Total
            | SubCommands::Entry(_)
            | SubCommands::Edit(_)
            | SubCommands::Delete(_) => Route::Home,
            SubCommands::Logout => Route::Logout,
            SubCommands::Login(_) => Route::Login,
            SubCommands::Signup(_) => Route::Register,
            SubCommands::ResetPassword(_) => Route::SendReset,
            SubCommands::ChangePassword(_) => Route::UpdatePassword,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    logger::setup(args.verbose)?;

    let config = FirebaseConfig::from_env().context("Failed to load configuration")?;
    let mut sessions = SessionStore::new(config::session_file()?);
    debug!("Session file: {}", sessions.path().display());
    sessions.on_session_change(|session| match session {
        Some(session) => info!("Session active for {}", session.email),
        None => info!("No active session"),
    });

    let gate = RequestGate::new();
    let auth_client = FirebaseAuthClient::new(&config);
    let auth = AuthCommand::new(&auth_client, &sessions, gate.clone());

    let route = args.subcommand.route();
    let session = if route.is_public() {
        None
    } else {
        auth.current_session().await?
    };
    if guard(session.as_ref(), route) == Decision::RedirectToLogin {
        bail!("ログインしてください: studylog login --email <EMAIL> --password <PASSWORD>");
    }

    let mut stdout = std::io::stdout();
    let mut presenter = ConsoleMarkdownList::new(&mut stdout);

    match args.subcommand {
        SubCommands::Login(login) => auth.login(login, &mut presenter).await?,
        SubCommands::Signup(signup) => auth.signup(signup, &mut presenter).await?,
        SubCommands::ResetPassword(reset) => auth.reset_password(reset, &mut presenter).await?,
        SubCommands::Logout => auth.logout(&mut presenter)?,
        SubCommands::ChangePassword(change) => {
            let session = session.context("No active session")?;
            auth.change_password(&session, change, &mut presenter).await?
        }
        home => {
            let session = session.context("No active session")?;
            let store = FirestoreClient::new(&config, &session.id_token);
            let mut records = RecordCommand::new(&store, &session.email, gate.clone());
            match home {
                SubCommands::List => records.list(&mut presenter).await?,
                SubCommands::Total => records.total(&mut presenter).await?,
                SubCommands::Entry(entry) => records.entry(entry, &mut presenter).await?,
                SubCommands::Edit(edit) => records.edit(edit, &mut presenter).await?,
                SubCommands::Delete(delete) => records.delete(delete, &mut presenter).await?,
                other => bail!("Unexpected subcommand: {:?}", other),
            }
        }
    }

    Ok(())
}
