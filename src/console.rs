use std::io::Write;

use anyhow::{Context, Result};

use crate::learning_record::LearningRecord;

/// Consoleに学習記録を表示するためのtrait。
pub trait ConsolePresenter {
    /// 学習記録の一覧と合計時間を表示する。
    ///
    /// # Arguments
    ///
    /// * `email` - ログイン中のユーザーのメールアドレス
    /// * `records` - 表示する学習記録
    /// * `total` - 学習時間の合計(分)
    fn show_records(
        &mut self,
        email: &str,
        records: &[LearningRecord],
        total: i64,
    ) -> Result<()>;

    /// 合計時間のみを表示する。
    fn show_total(&mut self, total: i64) -> Result<()>;

    /// 処理結果のメッセージを表示する。
    fn show_message(&mut self, message: &str) -> Result<()>;
}

/// 学習記録をMarkdownのlist形式で表示する。
pub struct ConsoleMarkdownList<'a, W: Write> {
    writer: &'a mut W,
}

impl<'a, W: Write> ConsoleMarkdownList<'a, W> {
    /// 新しい`ConsoleMarkdownList`を返す。
    pub fn new(writer: &'a mut W) -> Self {
        Self { writer }
    }
}

impl<'a, W: Write> ConsolePresenter for ConsoleMarkdownList<'a, W> {
    // ストアから取得した順で表示する。
    fn show_records(
        &mut self,
        email: &str,
        records: &[LearningRecord],
        total: i64,
    ) -> Result<()> {
        writeln!(self.writer, "ようこそ!{}さん", email).context("Failed to write greeting")?;
        writeln!(self.writer, "## 学習記録").context("Failed to write heading")?;
        for record in records {
            writeln!(
                self.writer,
                "- {}: {}分 ({})",
                record.title, record.time, record.id
            )
            .with_context(|| format!("Failed to write learning record: {:?}", record))?;
        }
        self.show_total(total)
    }

    fn show_total(&mut self, total: i64) -> Result<()> {
        writeln!(self.writer, "合計学習時間: {}分", total).context("Failed to write total")?;

        Ok(())
    }

    fn show_message(&mut self, message: &str) -> Result<()> {
        writeln!(self.writer, "{}", message).context("Failed to write message")?;

        Ok(())
    }
}
