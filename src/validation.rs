use thiserror::Error;

/// パスワードの最小文字数。
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// 入力値の検証エラー。
///
/// 外部サービスへ問い合わせる前に検出され、そのまま利用者に表示される。
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("学習内容と時間を入力してください")]
    EmptyTitle,
    #[error("学習内容と時間を入力してください (時間は1分以上: {0})")]
    NonPositiveTime(i64),
    #[error("学習時間が大きすぎます (合計: {existing} + {added}分)")]
    TimeOverflow { existing: i64, added: i64 },
    #[error("パスワードが一致しません")]
    PasswordMismatch,
    #[error("パスワードは6文字以上にしてください")]
    PasswordTooShort,
}

/// 学習内容と学習時間を検証する。
pub fn validate_entry(title: &str, time: i64) -> Result<(), ValidationError> {
    if title.is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    if time <= 0 {
        return Err(ValidationError::NonPositiveTime(time));
    }
    Ok(())
}

/// 新しいパスワードを検証する。
///
/// 確認用パスワードとの一致を先に確認し、その後に文字数を確認する。
/// 文字数はFirebaseのクライアントと同じくUTF-16のコード単位で数える。
pub fn validate_new_password(password: &str, confirmation: &str) -> Result<(), ValidationError> {
    if password != confirmation {
        return Err(ValidationError::PasswordMismatch);
    }
    if password.encode_utf16().count() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::PasswordTooShort);
    }
    Ok(())
}
