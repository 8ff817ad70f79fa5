use crate::{
    alerts::{AlertOutcome, AlertRecipient},
    api::extract::AppJson,
    auth::AuthUser,
    database::NewPrediction,
    error::{AppError, Result},
    models::*,
    risk::{self, RiskLevel},
    AppState,
};
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

const CHAT_SYSTEM_PROMPT: &str =
    "You are InnoVest analyst assistant. Answer with direct decision-support bullets.";
const PREDICT_SUFFIX: &str =
    "Return: risk level, short rationale, key drivers, and recommended actions.";
const DEFAULT_HISTORY: i64 = 12;
const MAX_HISTORY: i64 = 50;

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Scores arrive as JSON numbers or numeric strings.
fn parse_score(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

fn demo_allowed(state: &AppState, error: &crate::ai::AiError) -> bool {
    state.config.ai.demo_fallback && error.warrants_demo()
}

pub async fn health_check(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let db_healthy = state.database.health_check().await.unwrap_or(false);

    let status = if db_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "ok": db_healthy,
        "service": "InnoVest Backend",
        "timestamp": Utc::now(),
        "aiModel": state.config.ai.openai.model,
        "aiProviders": state.config.ai.provider_order(),
        "alertsEnabled": state.services.alerts.enabled(),
        "alertThreshold": state.services.alerts.threshold(),
        "database": db_healthy,
    });

    Ok((status, Json(response)))
}

pub async fn signup(
    State(state): State<AppState>,
    AppJson(payload): AppJson<SignupRequest>,
) -> Result<impl IntoResponse> {
    let (Some(name), Some(email), Some(password)) = (
        non_blank(payload.name),
        non_blank(payload.email),
        payload.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(AppError::Validation(
            "Name, email, and password are required".to_string(),
        ));
    };

    let email = email.trim().to_lowercase();
    if state.database.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict("Email already registered".to_string()));
    }

    let password_hash = state.services.auth.hash_password(&password)?;
    let user = state
        .database
        .create_user(name.trim(), &email, &password_hash)
        .await?;

    info!(user = %user.id, "User signed up");
    Ok((StatusCode::CREATED, Json(UserProfile::from(user))))
}

pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<impl IntoResponse> {
    let (Some(email), Some(password)) = (
        non_blank(payload.email),
        payload.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(AppError::Validation(
            "Email and password are required".to_string(),
        ));
    };

    let user = state
        .database
        .find_user_by_email(&email.trim().to_lowercase())
        .await?
        .ok_or_else(|| AppError::Validation("User not found".to_string()))?;

    if !state
        .services
        .auth
        .verify_password(&password, &user.password_hash)?
    {
        return Err(AppError::Validation("Wrong Password".to_string()));
    }

    let token = state.services.auth.generate_token(user.id, &user.email)?;

    Ok(Json(LoginResponse {
        token,
        user: UserProfile::from(user),
    }))
}

pub async fn me(State(state): State<AppState>, user: AuthUser) -> Result<impl IntoResponse> {
    let user = state
        .database
        .find_user_by_id(user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(UserProfile::from(user)))
}

pub async fn dashboard(_user: AuthUser) -> impl IntoResponse {
    Json("Welcome Manager")
}

pub async fn chat(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<PromptRequest>,
) -> Result<impl IntoResponse> {
    let message = non_blank(payload.message)
        .ok_or_else(|| AppError::Validation("Chat message is required".to_string()))?;

    let response = match state.services.ai.ask(&message, Some(CHAT_SYSTEM_PROMPT)).await {
        Ok(reply) => ChatResponse {
            reply: reply.text,
            source: AssessmentSource::Ai,
            provider: Some(reply.provider),
        },
        Err(error) if demo_allowed(&state, &error) => {
            warn!(user = %user.id, "Chat served by demo engine: {}", error);
            ChatResponse {
                reply: risk::chat_demo(&message),
                source: AssessmentSource::Demo,
                provider: None,
            }
        }
        Err(error) => return Err(AppError::ai("AI Error", error)),
    };

    Ok(Json(response))
}

pub async fn predict(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<PromptRequest>,
) -> Result<impl IntoResponse> {
    let message = non_blank(payload.message)
        .ok_or_else(|| AppError::Validation("Prediction prompt is required".to_string()))?;

    let prompt = format!("{}\n\n{}", message, PREDICT_SUFFIX);

    let (explanation, score, source, provider) = match state.services.ai.ask(&prompt, None).await {
        Ok(reply) => {
            let score = risk::infer_score(&reply.text);
            (reply.text, score, AssessmentSource::Ai, Some(reply.provider))
        }
        Err(error) if demo_allowed(&state, &error) => {
            warn!(user = %user.id, "Prediction served by demo engine: {}", error);
            let demo = risk::predict_demo(&message);
            (demo.explanation, demo.score, AssessmentSource::Demo, None)
        }
        Err(error) => return Err(AppError::ai("Prediction failed", error)),
    };

    let risk_level = RiskLevel::from_score(score);
    let drivers = risk::pick_drivers(&explanation);
    let solutions = risk::build_solutions(risk_level, score, &drivers, &explanation);

    let record = state
        .database
        .insert_prediction(NewPrediction {
            user_id: user.id,
            prompt: &message,
            score,
            risk_level,
            explanation: &explanation,
            source,
            provider: provider.as_deref(),
        })
        .await?;
    info!(user = %user.email, score, "Prediction stored");

    let alert = match source {
        AssessmentSource::Ai => {
            evaluate_alert(&state, user.id, score as f64, risk_level.as_str(), Some(&explanation))
                .await
                .unwrap_or_else(|e| {
                    warn!(user = %user.id, "Alert evaluation failed: {}", e);
                    AlertOutcome::skipped(format!("Alert evaluation failed: {}", e))
                })
        }
        AssessmentSource::Demo => {
            AlertOutcome::skipped("Demo mode: email alerts need an AI assessment.")
        }
    };

    Ok(Json(PredictionResponse {
        id: record.id,
        result: explanation,
        score,
        risk_level,
        confidence: risk::confidence(score),
        drivers,
        solutions,
        source,
        provider,
        alert,
    }))
}

async fn evaluate_alert(
    state: &AppState,
    user_id: Uuid,
    score: f64,
    risk_level: &str,
    explanation: Option<&str>,
) -> Result<AlertOutcome> {
    if let Some(outcome) = state.services.alerts.below_threshold(score) {
        return Ok(outcome);
    }

    let user = state
        .database
        .find_user_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found for alerting".to_string()))?;

    let recipient = AlertRecipient {
        name: &user.name,
        email: &user.email,
    };
    state
        .services
        .alerts
        .dispatch(&recipient, risk_level, score, explanation)
        .await
}

pub async fn evaluate_alert_email(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<EvaluateAlertRequest>,
) -> Result<impl IntoResponse> {
    let score = parse_score(&payload.risk_score)
        .ok_or_else(|| AppError::Validation("riskScore must be a valid number".to_string()))?;

    let risk_level = non_blank(payload.risk_level).unwrap_or_else(|| "HIGH".to_string());

    let outcome = evaluate_alert(
        &state,
        user.id,
        score,
        &risk_level,
        payload.explanation.as_deref(),
    )
    .await?;

    Ok(Json(outcome))
}

pub async fn list_predictions(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse> {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY).clamp(1, MAX_HISTORY);
    let predictions = state.database.list_predictions(user.id, limit).await?;

    Ok(Json(HistoryResponse {
        count: predictions.len(),
        predictions,
    }))
}

pub async fn export_predictions(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse> {
    let predictions = state.database.list_predictions(user.id, MAX_HISTORY).await?;
    let body = serde_json::to_string_pretty(&predictions)
        .map_err(|e| AppError::Internal(format!("Serialization error: {}", e)))?;

    let disposition = format!(
        "attachment; filename=\"innovest-risk-history-{}.json\"",
        Utc::now().format("%Y-%m-%d")
    );

    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}

pub async fn clear_predictions(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse> {
    let deleted = state.database.clear_predictions(user.id).await?;
    info!(user = %user.id, deleted, "Prediction history cleared");
    Ok(Json(json!({ "deleted": deleted })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scores_accept_numbers_and_numeric_strings() {
        assert_eq!(parse_score(&json!(85)), Some(85.0));
        assert_eq!(parse_score(&json!(" 72.5 ")), Some(72.5));
        assert_eq!(parse_score(&json!("high")), None);
        assert_eq!(parse_score(&json!(null)), None);
        assert_eq!(parse_score(&json!(true)), None);
    }

    #[test]
    fn blank_strings_are_missing() {
        assert_eq!(non_blank(Some("  ".into())), None);
        assert_eq!(non_blank(Some(" x ".into())), Some(" x ".into()));
        assert_eq!(non_blank(None), None);
    }
}
