use anyhow::Result;
use reqwest::Response;
use serde::Deserialize;
use thiserror::Error;

/// 外部サービスが返したエラー。メッセージは加工せずに保持する。
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct CollaboratorError {
    pub status: u16,
    pub message: String,
}

/// Google APIのエラーレスポンス。
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// ステータスが成功以外の場合は、レスポンス中のメッセージを持つ`CollaboratorError`を返す。
pub async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(CollaboratorError {
        status: status.as_u16(),
        message: error_message(&body),
    }
    .into())
}

/// エラーレスポンスからメッセージを取り出す。
///
/// FirestoreのrunQueryは配列でエラーを返すため、その形式にも対応する。
/// どちらにも当てはまらない場合は本文をそのまま返す。
fn error_message(body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        return parsed.error.message;
    }
    if let Ok(mut parsed) = serde_json::from_str::<Vec<ErrorBody>>(body) {
        if !parsed.is_empty() {
            return parsed.swap_remove(0).error.message;
        }
    }
    body.to_string()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::error_message;

    #[rstest]
    #[case::identity_toolkit(
        r#"{"error":{"code":400,"message":"INVALID_LOGIN_CREDENTIALS","errors":[]}}"#,
        "INVALID_LOGIN_CREDENTIALS"
    )]
    #[case::run_query(
        r#"[{"error":{"code":403,"message":"Missing or insufficient permissions.","status":"PERMISSION_DENIED"}}]"#,
        "Missing or insufficient permissions."
    )]
    #[case::plain_text("Bad Gateway", "Bad Gateway")]
    #[case::empty("", "")]
    fn test_error_message(#[case] body: &str, #[case] expected: &str) {
        assert_eq!(error_message(body), expected);
    }
}
