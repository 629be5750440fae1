use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use log::{debug, info};
#[cfg(test)]
use mockall::automock;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api_error::check_status;
use crate::config::FirebaseConfig;
use crate::learning_record::LearningRecord;

/// 学習記録を保存するコレクション名。
const COLLECTION: &str = "users_learnings";

/// 学習記録を保存するストアとやり取りするためのtrait。
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RecordStore {
    /// `owner_email`が所有する学習記録を全て取得する。
    async fn query(&self, owner_email: &str) -> Result<Vec<LearningRecord>>;

    /// 学習記録を登録し、採番されたIDを返す。
    async fn create(&self, owner_email: &str, title: &str, time: i64) -> Result<String>;

    /// 学習記録の学習内容と時間を上書きする。
    async fn update(&self, id: &str, title: &str, time: i64) -> Result<()>;

    /// 学習記録を削除する。
    async fn delete(&self, id: &str) -> Result<()>;
}

/// Firestoreのドキュメント。
#[derive(Debug, Deserialize)]
struct FirestoreDocument {
    name: String,
    #[serde(default)]
    fields: serde_json::Map<String, Value>,
}

/// runQueryのレスポンスの1要素。該当なしの場合は`document`を持たない。
#[derive(Debug, Deserialize)]
struct RunQueryItem {
    document: Option<FirestoreDocument>,
}

impl FirestoreDocument {
    /// ドキュメント名の末尾をIDとして取り出す。
    fn id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or_default()
    }

    fn into_record(self) -> Result<LearningRecord> {
        let title = self
            .fields
            .get("title")
            .and_then(|v| v.get("stringValue"))
            .and_then(Value::as_str)
            .with_context(|| format!("Document {} has no title", self.name))?
            .to_string();
        let time = self
            .fields
            .get("time")
            .map(integer_value)
            .transpose()?
            .with_context(|| format!("Document {} has no time", self.name))?;

        Ok(LearningRecord {
            id: self.id().to_string(),
            title,
            time,
        })
    }
}

/// Firestoreの数値フィールドを整数として読む。
///
/// `integerValue`は文字列で返される。Webクライアントから書き込まれた値は`doubleValue`の場合もある。
fn integer_value(value: &Value) -> Result<i64> {
    if let Some(integer) = value.get("integerValue") {
        return match integer {
            Value::String(s) => s
                .parse::<i64>()
                .with_context(|| format!("Invalid integerValue: {}", s)),
            Value::Number(n) => n.as_i64().context("integerValue out of range"),
            other => bail!("Invalid integerValue: {}", other),
        };
    }
    if let Some(double) = value.get("doubleValue").and_then(Value::as_f64) {
        return Ok(double.round() as i64);
    }

    bail!("Unsupported number field: {}", value)
}

/// 学習記録のフィールドを組み立てる。
fn record_fields(title: &str, time: i64) -> serde_json::Map<String, Value> {
    let mut fields = serde_json::Map::new();
    fields.insert("title".to_string(), json!({ "stringValue": title }));
    fields.insert("time".to_string(), json!({ "integerValue": time.to_string() }));
    fields
}

/// Cloud Firestore REST APIのクライアント。
///
/// ログイン中のユーザーのIDトークンで認可する。
pub struct FirestoreClient {
    client: Client,
    documents_url: String,
    id_token: String,
}

impl FirestoreClient {
    /// 新しい`FirestoreClient`を返す。
    ///
    /// # Arguments
    ///
    /// * `config` - Firebaseの接続設定
    /// * `id_token` - ログイン中のユーザーのIDトークン
    pub fn new(config: &FirebaseConfig, id_token: &str) -> Self {
        Self {
            client: Client::new(),
            documents_url: format!(
                "{}/projects/{}/databases/(default)/documents",
                config.firestore_url, config.project_id
            ),
            id_token: id_token.to_string(),
        }
    }

    fn document_url(&self, id: &str) -> String {
        format!("{}/{}/{}", self.documents_url, COLLECTION, id)
    }
}

#[async_trait]
impl RecordStore for FirestoreClient {
    async fn query(&self, owner_email: &str) -> Result<Vec<LearningRecord>> {
        let url = format!("{}:runQuery", self.documents_url);
        let body = json!({
            "structuredQuery": {
                "from": [{ "collectionId": COLLECTION }],
                "where": {
                    "fieldFilter": {
                        "field": { "fieldPath": "email" },
                        "op": "EQUAL",
                        "value": { "stringValue": owner_email },
                    }
                }
            }
        });
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.id_token)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to send request to Firestore at {}", url))?;
        let items = check_status(response)
            .await
            .context("データ取得に失敗しました")?
            .json::<Vec<RunQueryItem>>()
            .await
            .context("Failed to deserialize response")?;

        let records = items
            .into_iter()
            .filter_map(|item| item.document)
            .map(FirestoreDocument::into_record)
            .collect::<Result<Vec<_>>>()?;
        debug!("length of learning records: {}", records.len());

        Ok(records)
    }

    async fn create(&self, owner_email: &str, title: &str, time: i64) -> Result<String> {
        let url = format!("{}/{}", self.documents_url, COLLECTION);
        let mut fields = record_fields(title, time);
        fields.insert("email".to_string(), json!({ "stringValue": owner_email }));
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.id_token)
            .json(&json!({ "fields": fields }))
            .send()
            .await
            .with_context(|| format!("Failed to send request to Firestore at {}", url))?;
        let document = check_status(response)
            .await
            .context("データ登録に失敗しました")?
            .json::<FirestoreDocument>()
            .await
            .context("Failed to deserialize response")?;
        info!("Created learning record {}", document.id());

        Ok(document.id().to_string())
    }

    async fn update(&self, id: &str, title: &str, time: i64) -> Result<()> {
        let url = self.document_url(id);
        let response = self
            .client
            .patch(&url)
            .bearer_auth(&self.id_token)
            .query(&[
                ("updateMask.fieldPaths", "title"),
                ("updateMask.fieldPaths", "time"),
                ("currentDocument.exists", "true"),
            ])
            .json(&json!({ "fields": record_fields(title, time) }))
            .send()
            .await
            .with_context(|| format!("Failed to send request to Firestore at {}", url))?;
        check_status(response)
            .await
            .context("データ更新に失敗しました")?;
        info!("Updated learning record {}", id);

        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let url = self.document_url(id);
        let response = self
            .client
            .delete(&url)
            .bearer_auth(&self.id_token)
            .send()
            .await
            .with_context(|| format!("Failed to send request to Firestore at {}", url))?;
        check_status(response)
            .await
            .context("データ削除に失敗しました")?;
        info!("Deleted learning record {}", id);

        Ok(())
    }
}
