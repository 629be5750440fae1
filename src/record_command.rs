use anyhow::{Context, Result};
use log::info;

use crate::console::ConsolePresenter;
use crate::firestore::RecordStore;
use crate::inflight::RequestGate;
use crate::learning_record::{LearningRecord, NewEntry};
use crate::reconcile::Effect;
use crate::record_service::LearningService;

/// `entry`サブコマンドの引数。
#[derive(Debug, clap::Args)]
pub struct EntryArgs {
    #[clap(short = 't', long = "title", help = "What you studied")]
    pub title: String,

    #[clap(
        short = 'm',
        long = "time",
        help = "Minutes spent",
        allow_hyphen_values = true
    )]
    pub time: i64,
}

/// `edit`サブコマンドの引数。省略した項目は現在の値のままとする。
#[derive(Debug, clap::Args)]
pub struct EditArgs {
    #[clap(help = "ID of the record to edit")]
    pub id: String,

    #[clap(short = 't', long = "title", help = "New title")]
    pub title: Option<String>,

    #[clap(
        short = 'm',
        long = "time",
        help = "New minutes",
        allow_hyphen_values = true
    )]
    pub time: Option<i64>,
}

/// `delete`サブコマンドの引数。
#[derive(Debug, clap::Args)]
pub struct DeleteArgs {
    #[clap(help = "ID of the record to delete")]
    pub id: String,
}

/// ホーム画面に相当する学習記録の操作。
pub struct RecordCommand<'a, S: RecordStore> {
    service: LearningService<'a, S>,
}

impl<'a, S: RecordStore> RecordCommand<'a, S> {
    /// 新しい`RecordCommand`を返す。
    ///
    /// # Arguments
    /// * `store` - 学習記録のストア
    /// * `owner_email` - ログイン中のユーザーのメールアドレス
    /// * `gate` - セッション全体で共有する実行中フラグ
    pub fn new(store: &'a S, owner_email: &str, gate: RequestGate) -> Self {
        Self {
            service: LearningService::new(store, owner_email, gate),
        }
    }

    /// `list`サブコマンドの処理を行う。
    pub async fn list<P: ConsolePresenter>(&mut self, presenter: &mut P) -> Result<()> {
        self.load().await?;
        self.show(presenter)
    }

    /// `total`サブコマンドの処理を行う。
    pub async fn total<P: ConsolePresenter>(&mut self, presenter: &mut P) -> Result<()> {
        self.load().await?;
        presenter.show_total(self.service.total_time())
    }

    /// `entry`サブコマンドの処理を行う。
    ///
    /// 同じ学習内容の記録があれば時間を加算し、なければ新規登録する。
    pub async fn entry<P: ConsolePresenter>(
        &mut self,
        args: EntryArgs,
        presenter: &mut P,
    ) -> Result<()> {
        self.load().await?;
        let effect = self
            .service
            .entry(&NewEntry::new(args.title, args.time))
            .await?;
        info!("Applied {:?}", effect);

        presenter.show_message(completion_message(&effect))?;
        self.show(presenter)
    }

    /// `edit`サブコマンドの処理を行う。
    pub async fn edit<P: ConsolePresenter>(
        &mut self,
        args: EditArgs,
        presenter: &mut P,
    ) -> Result<()> {
        self.load().await?;
        let current = self.service.find(&args.id)?;
        let edited = LearningRecord {
            id: current.id.clone(),
            title: args.title.unwrap_or_else(|| current.title.clone()),
            time: args.time.unwrap_or(current.time),
        };
        let effect = self.service.edit(&edited).await?;
        info!("Applied {:?}", effect);

        presenter.show_message(completion_message(&effect))?;
        self.show(presenter)
    }

    /// `delete`サブコマンドの処理を行う。
    pub async fn delete<P: ConsolePresenter>(
        &mut self,
        args: DeleteArgs,
        presenter: &mut P,
    ) -> Result<()> {
        self.load().await?;
        let effect = self.service.delete(&args.id).await?;
        info!("Applied {:?}", effect);

        presenter.show_message(completion_message(&effect))?;
        self.show(presenter)
    }

    async fn load(&mut self) -> Result<()> {
        self.service
            .refresh()
            .await
            .context("Failed to retrieve learning records")
    }

    fn show<P: ConsolePresenter>(&self, presenter: &mut P) -> Result<()> {
        if self.service.is_stale() {
            presenter.show_message(STALE_MESSAGE)?;
        }
        presenter.show_records(
            self.service.owner_email(),
            self.service.records(),
            self.service.total_time(),
        )
    }
}

const STALE_MESSAGE: &str = "学習記録を再取得できませんでした。以下は変更前の内容です";

fn completion_message(effect: &Effect) -> &'static str {
    match effect {
        Effect::Create { .. } => "データ登録が完了しました",
        Effect::Update { .. } => "データ更新が完了しました",
        Effect::Delete { .. } => "データを削除しました",
    }
}
