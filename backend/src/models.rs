use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

use crate::alerts::AlertOutcome;
use crate::risk::{RiskLevel, Solution};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

// Fields are optional so that a missing one yields the API's own 400
// instead of a generic JSON rejection.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SignupRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserProfile,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PromptRequest {
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub message: Option<String>,
}

/// Numbers and booleans are taken as their text; `null` is absent.
fn scalar_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(text)) => Some(text),
        Some(other) => Some(other.to_string()),
    })
}

/// Where an assessment came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum AssessmentSource {
    Ai,
    Demo,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
    pub source: AssessmentSource,
    pub provider: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResponse {
    pub id: Uuid,
    pub result: String,
    pub score: i64,
    pub risk_level: RiskLevel,
    pub confidence: i64,
    pub drivers: Vec<String>,
    pub solutions: Vec<Solution>,
    pub source: AssessmentSource,
    pub provider: Option<String>,
    pub alert: AlertOutcome,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateAlertRequest {
    /// Accepts numbers or numeric strings.
    #[serde(default)]
    pub risk_score: serde_json::Value,
    pub risk_level: Option<String>,
    pub explanation: Option<String>,
}

/// A stored assessment in a user's history.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRecord {
    pub id: Uuid,
    #[serde(skip)]
    pub user_id: Uuid,
    pub prompt: String,
    pub score: i64,
    pub risk_level: RiskLevel,
    pub summary: String,
    pub explanation: String,
    pub source: AssessmentSource,
    pub provider: Option<String>,
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub predictions: Vec<PredictionRecord>,
    pub count: usize,
}
