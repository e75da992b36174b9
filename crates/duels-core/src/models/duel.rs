//! Duels as listed by the API, and parameters for wallet-mediated duel
//! actions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Server-side lifecycle of a duel, stored as a small integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum DuelStatus {
    InReview,
    AutoCancelled,
    AdminCancelled,
    InProcess,
    Resolved,
    Refund,
    Other(u8),
}

impl DuelStatus {
    /// Resolved and refunded duels need nothing further from their owner.
    pub fn is_settled(self) -> bool {
        matches!(self, DuelStatus::Resolved | DuelStatus::Refund)
    }
}

impl From<u8> for DuelStatus {
    fn from(value: u8) -> Self {
        match value {
            1 => DuelStatus::InReview,
            2 => DuelStatus::AutoCancelled,
            3 => DuelStatus::AdminCancelled,
            4 => DuelStatus::InProcess,
            5 => DuelStatus::Resolved,
            6 => DuelStatus::Refund,
            other => DuelStatus::Other(other),
        }
    }
}

impl From<DuelStatus> for u8 {
    fn from(status: DuelStatus) -> Self {
        match status {
            DuelStatus::InReview => 1,
            DuelStatus::AutoCancelled => 2,
            DuelStatus::AdminCancelled => 3,
            DuelStatus::InProcess => 4,
            DuelStatus::Resolved => 5,
            DuelStatus::Refund => 6,
            DuelStatus::Other(value) => value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Duel {
    pub id: String,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub room_number: Option<u64>,
    #[serde(default)]
    pub players_count: u64,
    #[serde(default)]
    pub winners_count: u64,
    #[serde(default)]
    pub username: String,
    pub status: DuelStatus,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub duel_price: f64,
    #[serde(default)]
    pub commission: u64,
    #[serde(default)]
    pub event_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub final_result: Option<u8>,
    #[serde(default)]
    pub cancellation_reason: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// `duel/{id}`: the duel plus its players as the server reports them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DuelDetail {
    pub duel: Duel,
    #[serde(default)]
    pub players: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateDuelParams {
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub bg_url: String,
    pub question: String,
    pub duel_price: f64,
    pub commission: u64,
    #[serde(default)]
    pub duel_info: Map<String, Value>,
    pub event_date: DateTime<Utc>,
    pub answer: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinDuelParams {
    pub duel_id: String,
    pub answer: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invited_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolveDuelParams {
    pub duel_id: String,
    pub answer: u8,
}

/// An action that needs a transaction signed by the user's wallet.
#[derive(Debug, Clone, PartialEq)]
pub enum WalletAction {
    CreateDuel(CreateDuelParams),
    JoinDuel(JoinDuelParams),
}

impl WalletAction {
    pub fn name(&self) -> &'static str {
        match self {
            WalletAction::CreateDuel(_) => "create-duel",
            WalletAction::JoinDuel(_) => "join-duel",
        }
    }

    /// Body for the unsigned-transaction request.
    pub fn sign_body(&self) -> Value {
        match self {
            WalletAction::CreateDuel(params) => to_object(params),
            WalletAction::JoinDuel(params) => serde_json::json!({
                "duel_id": params.duel_id,
                "answer": params.answer,
            }),
        }
    }

    /// Body for the finalize request: the full params plus `tx_hash`.
    pub fn finalize_body(&self, tx_hash: &str) -> Value {
        let mut body = match self {
            WalletAction::CreateDuel(params) => to_object(params),
            WalletAction::JoinDuel(params) => to_object(params),
        };
        if let Value::Object(ref mut map) = body {
            map.insert("tx_hash".to_string(), Value::String(tx_hash.to_string()));
        }
        body
    }
}

fn to_object<T: Serialize>(params: &T) -> Value {
    // Derived Serialize on plain structs cannot fail.
    serde_json::to_value(params).unwrap_or_else(|_| Value::Object(Map::new()))
}
