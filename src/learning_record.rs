/// ストアに保存済みの学習記録。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LearningRecord {
    /// ストアが採番したドキュメントID。
    pub id: String,
    /// 学習内容。
    pub title: String,
    /// 学習時間(分)。
    pub time: i64,
}

/// まだ保存されていない新規入力。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewEntry {
    pub title: String,
    pub time: i64,
}

impl NewEntry {
    /// 新しい`NewEntry`を返す。
    pub fn new(title: impl Into<String>, time: i64) -> Self {
        Self {
            title: title.into(),
            time,
        }
    }
}
