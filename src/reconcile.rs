use log::warn;

use crate::learning_record::{LearningRecord, NewEntry};
use crate::validation::{validate_entry, ValidationError};

/// ストアに対して実行する変更。
///
/// エンジン自体はI/Oを行わず、この値を返すだけである。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    /// 新規登録。所有者はEffectを実行する側が設定する。
    Create { title: String, time: i64 },
    /// `id`のドキュメントを上書きする。
    Update { id: String, title: String, time: i64 },
    /// `id`のドキュメントを削除する。
    Delete { id: String },
}

/// 新規入力を登録するか、既存の記録に加算するかを決める。
///
/// 学習内容が完全一致(大文字小文字を区別)する記録があれば、その記録の時間に加算する。
/// 一致する記録が複数ある場合は最初に見つかったものだけを対象とする。
///
/// # Arguments
///
/// * `current` - 現在の学習記録
/// * `candidate` - 新規入力
pub fn submit_entry(
    current: &[LearningRecord],
    candidate: &NewEntry,
) -> Result<Effect, ValidationError> {
    validate_entry(&candidate.title, candidate.time)?;

    let mut matches = current.iter().filter(|r| r.title == candidate.title);
    let effect = match matches.next() {
        Some(existing) => {
            let duplicates = matches.count();
            if duplicates > 0 {
                warn!(
                    "{} other records share the title {:?}; merging into {}",
                    duplicates, existing.title, existing.id
                );
            }
            let time = existing.time.checked_add(candidate.time).ok_or(
                ValidationError::TimeOverflow {
                    existing: existing.time,
                    added: candidate.time,
                },
            )?;
            Effect::Update {
                id: existing.id.clone(),
                title: existing.title.clone(),
                time,
            }
        }
        None => Effect::Create {
            title: candidate.title.clone(),
            time: candidate.time,
        },
    };

    Ok(effect)
}

/// 編集内容でそのまま上書きする。他の記録との統合は行わない。
pub fn submit_edit(record: &LearningRecord) -> Result<Effect, ValidationError> {
    validate_entry(&record.title, record.time)?;

    Ok(Effect::Update {
        id: record.id.clone(),
        title: record.title.clone(),
        time: record.time,
    })
}

/// 記録を削除する。確認は呼び出し側で済ませておくこと。
pub fn submit_delete(record: &LearningRecord) -> Effect {
    Effect::Delete {
        id: record.id.clone(),
    }
}

/// 学習時間の合計(分)。`i64`の上限を超える場合は上限で止める。
pub fn total_time(current: &[LearningRecord]) -> i64 {
    current
        .iter()
        .fold(0i64, |total, r| total.saturating_add(r.time))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{submit_delete, submit_edit, submit_entry, total_time, Effect};
    use crate::learning_record::{LearningRecord, NewEntry};
    use crate::validation::ValidationError;

    fn record(id: &str, title: &str, time: i64) -> LearningRecord {
        LearningRecord {
            id: id.to_string(),
            title: title.to_string(),
            time,
        }
    }

    #[rstest]
    #[case::reading("Reading", 20)]
    #[case::single_minute("Math", 1)]
    #[case::multibyte("英単語", 45)]
    fn test_submit_entry_empty_set_creates(#[case] title: &str, #[case] time: i64) {
        let effect = submit_entry(&[], &NewEntry::new(title, time)).unwrap();

        assert_eq!(
            effect,
            Effect::Create {
                title: title.to_string(),
                time
            }
        );
    }

    #[test]
    fn test_submit_entry_merges_matching_title() {
        let current = vec![record("a1", "Math", 30)];

        let effect = submit_entry(&current, &NewEntry::new("Math", 15)).unwrap();

        assert_eq!(
            effect,
            Effect::Update {
                id: "a1".to_string(),
                title: "Math".to_string(),
                time: 45
            }
        );
        // スナップショットは変更しない
        assert_eq!(current[0].time, 30);
    }

    #[rstest]
    #[case::case_differs("math")]
    #[case::trailing_space("Math ")]
    #[case::other("Reading")]
    fn test_submit_entry_exact_match_only(#[case] title: &str) {
        let current = vec![record("a1", "Math", 30)];

        let effect = submit_entry(&current, &NewEntry::new(title, 10)).unwrap();

        assert_eq!(
            effect,
            Effect::Create {
                title: title.to_string(),
                time: 10
            }
        );
    }

    #[test]
    fn test_submit_entry_duplicate_titles_merge_into_first() {
        let current = vec![
            record("a1", "Reading", 5),
            record("b2", "Math", 30),
            record("c3", "Math", 100),
        ];

        let effect = submit_entry(&current, &NewEntry::new("Math", 10)).unwrap();

        assert_eq!(
            effect,
            Effect::Update {
                id: "b2".to_string(),
                title: "Math".to_string(),
                time: 40
            }
        );
    }

    #[rstest]
    #[case::empty_title("", 10, ValidationError::EmptyTitle)]
    #[case::zero_time("Math", 0, ValidationError::NonPositiveTime(0))]
    #[case::negative_time("Math", -1, ValidationError::NonPositiveTime(-1))]
    #[case::merged_time_overflows(
        "Math",
        i64::MAX,
        ValidationError::TimeOverflow { existing: 30, added: i64::MAX },
    )]
    fn test_submit_entry_rejects_invalid(
        #[case] title: &str,
        #[case] time: i64,
        #[case] expected: ValidationError,
    ) {
        let current = vec![record("a1", "Math", 30)];

        let result = submit_entry(&current, &NewEntry::new(title, time));

        assert_eq!(result, Err(expected));
    }

    #[test]
    fn test_submit_edit_overwrites_without_merge() {
        // 他の記録と同じ学習内容に変更しても統合しない
        let edited = record("b2", "Math", 12);

        let effect = submit_edit(&edited).unwrap();

        assert_eq!(
            effect,
            Effect::Update {
                id: "b2".to_string(),
                title: "Math".to_string(),
                time: 12
            }
        );
    }

    #[rstest]
    #[case::empty_title("", 10, ValidationError::EmptyTitle)]
    #[case::zero_time("Math", 0, ValidationError::NonPositiveTime(0))]
    fn test_submit_edit_rejects_invalid(
        #[case] title: &str,
        #[case] time: i64,
        #[case] expected: ValidationError,
    ) {
        assert_eq!(submit_edit(&record("a1", title, time)), Err(expected));
    }

    #[rstest]
    #[case::normal(record("a1", "Math", 30))]
    #[case::zero_time(record("z9", "", 0))]
    fn test_submit_delete_references_id(#[case] target: LearningRecord) {
        assert_eq!(
            submit_delete(&target),
            Effect::Delete {
                id: target.id.clone()
            }
        );
    }

    #[rstest]
    #[case::empty(vec![], 0)]
    #[case::two(vec![record("a1", "Math", 30), record("b2", "Reading", 20)], 50)]
    #[case::permuted(vec![record("b2", "Reading", 20), record("a1", "Math", 30)], 50)]
    #[case::saturates(vec![record("a1", "Math", i64::MAX), record("b2", "Reading", 1)], i64::MAX)]
    fn test_total_time(#[case] current: Vec<LearningRecord>, #[case] expected: i64) {
        assert_eq!(total_time(&current), expected);
    }
}
