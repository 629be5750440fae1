use log::{info, warn};
use thiserror::Error;

use crate::firestore::RecordStore;
use crate::inflight::{BusyError, Operation, RequestGate};
use crate::learning_record::{LearningRecord, NewEntry};
use crate::reconcile::{self, Effect};
use crate::validation::ValidationError;

/// 学習記録の操作で発生するエラー。
#[derive(Debug, Error)]
pub enum RecordError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Busy(#[from] BusyError),
    #[error("学習記録が見つかりません: {0}")]
    NotFound(String),
    /// ストアが返したエラー。
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// ログイン中のユーザーの学習記録を扱うサービス。
///
/// 手元の記録は変更のたびに全件取得し直したものに置き換え、ローカルでは書き換えない。
pub struct LearningService<'a, S: RecordStore> {
    store: &'a S,
    owner_email: String,
    gate: RequestGate,
    records: Vec<LearningRecord>,
    stale: bool,
}

impl<'a, S: RecordStore> LearningService<'a, S> {
    /// 新しい`LearningService`を返す。記録は`refresh`を呼ぶまで空である。
    ///
    /// # Arguments
    ///
    /// * `store` - 学習記録のストア
    /// * `owner_email` - ログイン中のユーザーのメールアドレス
    /// * `gate` - セッション全体で共有する実行中フラグ
    pub fn new(store: &'a S, owner_email: &str, gate: RequestGate) -> Self {
        Self {
            store,
            owner_email: owner_email.to_string(),
            gate,
            records: Vec::new(),
            stale: false,
        }
    }

    pub fn owner_email(&self) -> &str {
        &self.owner_email
    }

    /// 最後に取得した学習記録。
    pub fn records(&self) -> &[LearningRecord] {
        &self.records
    }

    /// 変更は保存できたが、その後の再取得に失敗したか。
    ///
    /// `true`の間、`records`は変更前の内容を返す。
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// 学習時間の合計(分)。
    pub fn total_time(&self) -> i64 {
        reconcile::total_time(&self.records)
    }

    /// 学習記録を全件取得し直す。失敗した場合は手元の記録を変更しない。
    pub async fn refresh(&mut self) -> Result<(), RecordError> {
        let _inflight = self.gate.begin(Operation::Fetch)?;
        let records = self.store.query(&self.owner_email).await?;
        info!("Fetched {} learning records", records.len());
        self.records = records;
        self.stale = false;

        Ok(())
    }

    /// 新規入力を登録、または同じ学習内容の記録に加算する。
    pub async fn entry(&mut self, candidate: &NewEntry) -> Result<Effect, RecordError> {
        let effect = reconcile::submit_entry(&self.records, candidate)?;
        self.apply(&effect).await?;

        Ok(effect)
    }

    /// 記録を編集内容で上書きする。
    ///
    /// 編集対象は現在の記録に含まれている必要がある。
    pub async fn edit(&mut self, edited: &LearningRecord) -> Result<Effect, RecordError> {
        self.find(&edited.id)?;
        let effect = reconcile::submit_edit(edited)?;
        self.apply(&effect).await?;

        Ok(effect)
    }

    /// 記録を削除する。
    pub async fn delete(&mut self, id: &str) -> Result<Effect, RecordError> {
        let effect = reconcile::submit_delete(self.find(id)?);
        self.apply(&effect).await?;

        Ok(effect)
    }

    /// IDで現在の記録を探す。
    pub fn find(&self, id: &str) -> Result<&LearningRecord, RecordError> {
        self.records
            .iter()
            .find(|r| r.id == id)
            .ok_or_else(|| RecordError::NotFound(id.to_string()))
    }

    /// Effectをストアで実行し、成功したら記録を取得し直す。
    ///
    /// 書き込みが成功した後の再取得の失敗はエラーにせず、手元の記録を古いものとして扱う。
    async fn apply(&mut self, effect: &Effect) -> Result<(), RecordError> {
        {
            let _inflight = self.gate.begin(operation_of(effect))?;
            match effect {
                Effect::Create { title, time } => {
                    self.store.create(&self.owner_email, title, *time).await?;
                }
                Effect::Update { id, title, time } => {
                    self.store.update(id, title, *time).await?;
                }
                Effect::Delete { id } => {
                    self.store.delete(id).await?;
                }
            }
        }

        self.invalidate_and_refetch().await;
        Ok(())
    }

    async fn invalidate_and_refetch(&mut self) {
        self.stale = true;
        if let Err(e) = self.refresh().await {
            warn!("The change was saved but refetching failed: {:#}", e);
        }
    }
}

fn operation_of(effect: &Effect) -> Operation {
    match effect {
        Effect::Create { .. } => Operation::Create,
        Effect::Update { .. } => Operation::Update,
        Effect::Delete { .. } => Operation::Delete,
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use mockall::predicate::eq;
    use mockall::Sequence;

    use super::{LearningService, RecordError};
    use crate::firestore::MockRecordStore;
    use crate::inflight::{Operation, RequestGate};
    use crate::learning_record::{LearningRecord, NewEntry};
    use crate::reconcile::Effect;
    use crate::validation::ValidationError;

    const OWNER: &str = "user@example.com";

    fn record(id: &str, title: &str, time: i64) -> LearningRecord {
        LearningRecord {
            id: id.to_string(),
            title: title.to_string(),
            time,
        }
    }

    /// 最初の取得で`initial`を返すストア。
    fn store_with(seq: &mut Sequence, initial: Vec<LearningRecord>) -> MockRecordStore {
        let mut store = MockRecordStore::new();
        store
            .expect_query()
            .with(eq(OWNER))
            .times(1)
            .in_sequence(seq)
            .returning(move |_| Ok(initial.clone()));
        store
    }

    #[tokio::test]
    async fn test_refresh_and_total() {
        let store = store_with(
            &mut Sequence::new(),
            vec![record("a1", "Math", 30), record("b2", "Reading", 20)],
        );
        let mut service = LearningService::new(&store, OWNER, RequestGate::new());

        service.refresh().await.unwrap();

        assert_eq!(service.records().len(), 2);
        assert_eq!(service.total_time(), 50);
    }

    #[tokio::test]
    async fn test_entry_creates_then_refetches() {
        let mut seq = Sequence::new();
        let mut store = MockRecordStore::new();
        store
            .expect_query()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![]));
        store
            .expect_create()
            .with(eq(OWNER), eq("Reading"), eq(20))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok("new1".to_string()));
        store
            .expect_query()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![record("new1", "Reading", 20)]));
        let mut service = LearningService::new(&store, OWNER, RequestGate::new());
        service.refresh().await.unwrap();

        let effect = service.entry(&NewEntry::new("Reading", 20)).await.unwrap();

        assert_eq!(
            effect,
            Effect::Create {
                title: "Reading".to_string(),
                time: 20
            }
        );
        assert_eq!(service.records(), &[record("new1", "Reading", 20)]);
    }

    #[tokio::test]
    async fn test_entry_merges_into_existing() {
        let mut seq = Sequence::new();
        let mut store = store_with(&mut seq, vec![record("a1", "Math", 30)]);
        store
            .expect_update()
            .with(eq("a1"), eq("Math"), eq(45))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));
        store
            .expect_query()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![record("a1", "Math", 45)]));
        let mut service = LearningService::new(&store, OWNER, RequestGate::new());
        service.refresh().await.unwrap();

        service.entry(&NewEntry::new("Math", 15)).await.unwrap();

        assert_eq!(service.total_time(), 45);
        assert!(!service.is_stale());
    }

    #[tokio::test]
    async fn test_refetch_failure_after_saved_write_is_not_an_error() {
        let mut seq = Sequence::new();
        let mut store = store_with(&mut seq, vec![record("a1", "Math", 30)]);
        store
            .expect_update()
            .with(eq("a1"), eq("Math"), eq(45))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));
        store
            .expect_query()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(anyhow!("UNAVAILABLE")));
        let gate = RequestGate::new();
        let mut service = LearningService::new(&store, OWNER, gate.clone());
        service.refresh().await.unwrap();

        let effect = service.entry(&NewEntry::new("Math", 15)).await.unwrap();

        assert_eq!(
            effect,
            Effect::Update {
                id: "a1".to_string(),
                title: "Math".to_string(),
                time: 45
            }
        );
        // 保存済みの変更は手元に反映せず、古い記録として扱う
        assert!(service.is_stale());
        assert_eq!(service.records(), &[record("a1", "Math", 30)]);
        assert_eq!(gate.pending(), None);
    }

    #[tokio::test]
    async fn test_entry_validation_error_skips_store() {
        let store = store_with(&mut Sequence::new(), vec![record("a1", "Math", 30)]);
        let mut service = LearningService::new(&store, OWNER, RequestGate::new());
        service.refresh().await.unwrap();

        let result = service.entry(&NewEntry::new("", 10)).await;

        assert!(matches!(
            result,
            Err(RecordError::Validation(ValidationError::EmptyTitle))
        ));
    }

    #[tokio::test]
    async fn test_store_failure_keeps_snapshot() {
        let mut store = store_with(&mut Sequence::new(), vec![record("a1", "Math", 30)]);
        store
            .expect_delete()
            .times(1)
            .returning(|_| Err(anyhow!("PERMISSION_DENIED")));
        let gate = RequestGate::new();
        let mut service = LearningService::new(&store, OWNER, gate.clone());
        service.refresh().await.unwrap();

        let result = service.delete("a1").await;

        match result {
            Err(RecordError::Store(e)) => assert_eq!(e.to_string(), "PERMISSION_DENIED"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(service.records(), &[record("a1", "Math", 30)]);
        assert_eq!(gate.pending(), None);
    }

    #[tokio::test]
    async fn test_edit_overwrites_without_merge() {
        let mut seq = Sequence::new();
        let mut store = store_with(
            &mut seq,
            vec![record("a1", "Math", 30), record("b2", "Reading", 20)],
        );
        store
            .expect_update()
            .with(eq("b2"), eq("Math"), eq(5))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));
        store
            .expect_query()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![record("a1", "Math", 30), record("b2", "Math", 5)]));
        let mut service = LearningService::new(&store, OWNER, RequestGate::new());
        service.refresh().await.unwrap();

        let effect = service.edit(&record("b2", "Math", 5)).await.unwrap();

        assert_eq!(
            effect,
            Effect::Update {
                id: "b2".to_string(),
                title: "Math".to_string(),
                time: 5
            }
        );
        assert_eq!(service.records().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_unknown_id() {
        let store = store_with(&mut Sequence::new(), vec![record("a1", "Math", 30)]);
        let mut service = LearningService::new(&store, OWNER, RequestGate::new());
        service.refresh().await.unwrap();

        let result = service.delete("zz").await;

        assert!(matches!(result, Err(RecordError::NotFound(id)) if id == "zz"));
    }

    #[tokio::test]
    async fn test_rejected_while_another_operation_is_pending() {
        let store = MockRecordStore::new();
        let gate = RequestGate::new();
        let mut service = LearningService::new(&store, OWNER, gate.clone());
        let _pending = gate.begin(Operation::SignIn).unwrap();

        let result = service.refresh().await;

        assert!(matches!(result, Err(RecordError::Busy(e)) if e.pending == Operation::SignIn));
    }
}
