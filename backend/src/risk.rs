//! Keyword heuristics for risk assessments.
//!
//! Two scorers live here. `demo_score` rates a raw user prompt and backs the
//! local demo engine served when no AI provider answers. `infer_score` reads
//! an AI-written assessment and turns its wording back into a number so
//! that every stored prediction carries a comparable 0..100 score.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_score(score: i64) -> Self {
        if score >= 70 {
            RiskLevel::High
        } else if score >= 40 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemoPrediction {
    pub score: i64,
    pub level: RiskLevel,
    pub drivers: Vec<String>,
    pub explanation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    Critical,
    High,
    Moderate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Solution {
    pub driver: String,
    pub action: String,
    pub owner: String,
    pub timeline: String,
    pub priority: Priority,
}

fn contains_any(text: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| text.contains(needle))
}

pub fn demo_score(prompt: &str) -> i64 {
    let text = prompt.to_lowercase();
    let mut score: i64 = 45;

    if text.contains("debt") {
        score += 15;
    }
    if contains_any(&text, &["loss", "declining"]) {
        score += 12;
    }
    if contains_any(&text, &["delay", "deadline"]) {
        score += 8;
    }
    if contains_any(&text, &["fraud", "compliance"]) {
        score += 14;
    }
    if contains_any(&text, &["low revenue", "cash burn"]) {
        score += 10;
    }
    if contains_any(&text, &["steady growth", "stable"]) {
        score -= 14;
    }
    if text.contains("low debt") {
        score -= 12;
    }

    score.clamp(8, 92)
}

pub fn demo_drivers(prompt: &str) -> Vec<String> {
    let text = prompt.to_lowercase();
    let rules: [(&[&str], &str); 5] = [
        (&["debt"], "Leverage pressure"),
        (&["loss", "declining"], "Profitability deterioration"),
        (&["cash"], "Liquidity stress"),
        (&["delay"], "Execution timeline risk"),
        (&["fraud", "compliance"], "Control and compliance exposure"),
    ];

    let mut drivers: Vec<String> = rules
        .iter()
        .filter(|(keywords, _)| contains_any(&text, keywords))
        .map(|(_, driver)| driver.to_string())
        .collect();

    if drivers.is_empty() {
        drivers.push("Baseline market uncertainty".to_string());
    }
    drivers
}

fn recommended_action(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::High => "Activate contingency plan and weekly cash governance.",
        RiskLevel::Medium => "Tighten monitoring and implement early mitigation actions.",
        RiskLevel::Low => "Maintain controls and monitor leading indicators monthly.",
    }
}

pub fn predict_demo(prompt: &str) -> DemoPrediction {
    let score = demo_score(prompt);
    let level = RiskLevel::from_score(score);
    let drivers = demo_drivers(prompt);

    let explanation = [
        format!("Risk Level: {}", level),
        format!("Estimated Score: {}", score),
        format!("Key Drivers: {}", drivers.join(", ")),
        format!("Recommended Action: {}", recommended_action(level)),
        "Source: Demo mode (local fallback when the AI providers are unavailable).".to_string(),
    ]
    .join("\n");

    DemoPrediction {
        score,
        level,
        drivers,
        explanation,
    }
}

pub fn chat_demo(message: &str) -> String {
    let prediction = predict_demo(message);
    [
        "Demo Copilot Response".to_string(),
        format!(
            "Based on your input, current risk is {} ({}/100).",
            prediction.level, prediction.score
        ),
        "Top focus areas:".to_string(),
        format!("- {}", prediction.drivers.join("\n- ")),
        "- Build 30-60-90 day mitigation plan with owner and due date.".to_string(),
        "- Review triggers weekly and escalate if score rises above 70.".to_string(),
        "This response is generated locally because the AI providers are offline.".to_string(),
    ]
    .join("\n")
}

/// Score an AI-written assessment. Explicit severity words win over the
/// keyword tally.
pub fn infer_score(text: &str) -> i64 {
    let lower = text.to_lowercase();

    if contains_any(&lower, &["critical", "severe"]) {
        return 88;
    }
    if lower.contains("high") {
        return 78;
    }
    if contains_any(&lower, &["medium", "moderate"]) {
        return 56;
    }
    if lower.contains("low") {
        return 26;
    }

    let mut score: i64 = 50;
    if lower.contains("debt") {
        score += 10;
    }
    if lower.contains("delay") {
        score += 7;
    }
    if contains_any(&lower, &["cash flow", "burn"]) {
        score += 8;
    }
    if contains_any(&lower, &["compliance", "fraud"]) {
        score += 12;
    }
    if contains_any(&lower, &["strong", "stable"]) {
        score -= 10;
    }

    score.clamp(5, 95)
}

const BASELINE_DRIVER: &str = "Baseline operational uncertainty";

const DRIVER_KEYWORDS: &[(&str, &[&str])] = &[
    ("Debt pressure", &["debt", "leverage", "liability"]),
    ("Cash flow stress", &["cash", "burn", "liquidity"]),
    ("Delivery timeline risk", &["delay", "deadline", "schedule"]),
    ("Compliance exposure", &["compliance", "regulatory", "fraud"]),
    ("Market uncertainty", &["market", "demand", "competition"]),
];

/// (driver, action, owner, timeline)
const MITIGATIONS: &[(&str, &str, &str, &str)] = &[
    (
        "Debt pressure",
        "Refinance expensive debt and freeze new non-critical borrowing.",
        "Finance Lead",
        "7-14 days",
    ),
    (
        "Cash flow stress",
        "Run 13-week cash forecast and cut low-ROI spend immediately.",
        "CFO Office",
        "48 hours",
    ),
    (
        "Delivery timeline risk",
        "Re-baseline milestones and secure backup suppliers for critical path items.",
        "Operations Head",
        "5-10 days",
    ),
    (
        "Compliance exposure",
        "Launch compliance audit and enforce approval workflow for sensitive transactions.",
        "Compliance Officer",
        "3-7 days",
    ),
    (
        "Market uncertainty",
        "Create downside demand scenario and shift budget to resilient channels.",
        "Strategy Team",
        "7 days",
    ),
    (
        BASELINE_DRIVER,
        "Set weekly risk review with quantified KPIs and escalation triggers.",
        "PMO",
        "Immediate",
    ),
];

const MAX_SOLUTIONS: usize = 6;

pub fn pick_drivers(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let matched: Vec<String> = DRIVER_KEYWORDS
        .iter()
        .filter(|(_, keywords)| contains_any(&lower, keywords))
        .map(|(driver, _)| driver.to_string())
        .collect();

    if matched.is_empty() {
        vec![BASELINE_DRIVER.to_string()]
    } else {
        matched
    }
}

pub fn build_solutions(level: RiskLevel, score: i64, drivers: &[String], text: &str) -> Vec<Solution> {
    let priority = if level == RiskLevel::High || score >= 70 {
        Priority::Critical
    } else if level == RiskLevel::Medium {
        Priority::High
    } else {
        Priority::Moderate
    };

    let lookup = |driver: &str| {
        MITIGATIONS
            .iter()
            .find(|(name, ..)| *name == driver)
            .or_else(|| MITIGATIONS.iter().find(|(name, ..)| *name == BASELINE_DRIVER))
            .copied()
    };

    let mut solutions: Vec<Solution> = drivers
        .iter()
        .filter_map(|driver| {
            lookup(driver).map(|(_, action, owner, timeline)| Solution {
                driver: driver.clone(),
                action: action.to_string(),
                owner: owner.to_string(),
                timeline: timeline.to_string(),
                priority,
            })
        })
        .collect();

    let lower = text.to_lowercase();
    if contains_any(&lower, &["fraud", "compliance", "regulatory"]) {
        solutions.push(Solution {
            driver: "Control monitoring".to_string(),
            action: "Enable anomaly alerts and dual-approval checks for high-value transactions."
                .to_string(),
            owner: "Risk Control Team".to_string(),
            timeline: "72 hours".to_string(),
            priority: Priority::Critical,
        });
    }

    solutions.truncate(MAX_SOLUTIONS);
    solutions
}

/// Confidence peaks at the extremes of the scale and never drops below 35.
pub fn confidence(score: i64) -> i64 {
    (100 - (50 - score).abs()).max(35)
}
