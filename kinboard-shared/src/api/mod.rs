//! Request/response DTOs for the REST surface and the server-push event.
//!
//! The wire format is camelCase JSON. Stored JSON sub-documents (schedules,
//! photo lists, attachments, jar breakdowns) are surfaced as
//! `serde_json::Value`: structured when the stored text parses, the raw
//! string otherwise, so a corrupt row never fails a read.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::Role;
use crate::domain::{Cents, Difficulty, JarBalances, JarSplit, MessageKind, Schedule};

// Auth

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterFamilyReq {
    pub family_name: Option<String>,
    pub pin: Option<String>,
    pub parent_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterFamilyResp {
    pub token: String,
    pub refresh_token: String,
    pub family: FamilyDto,
    pub user: UserDto,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginReq {
    pub family_code: Option<String>,
    pub pin: Option<String>,
    pub user_id: Option<String>,
}

/// Token fields are present only when a concrete user was selected;
/// a family-only login returns the member list and no credentials.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResp {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub family: FamilyDto,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserDto>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshReq {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResp {
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MeResp {
    pub user: UserDto,
    pub family: FamilyDto,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterMemberReq {
    pub name: Option<String>,
    pub role: Option<Role>,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyDto {
    pub id: String,
    pub name: String,
    pub family_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<UserDto>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: String,
    pub family_id: String,
    pub name: String,
    pub role: Role,
    pub avatar: String,
    pub points: i32,
    pub streak: i32,
    pub jars: JarBalances,
    pub created_at: String,
}

// Chores

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChoreReq {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub points: i32,
    pub schedule: Schedule,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub photos: Option<Vec<String>>,
    #[serde(default)]
    pub assignees: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoreDto {
    pub id: String,
    pub family_id: String,
    pub title: String,
    pub description: String,
    pub points: i32,
    pub schedule: Value,
    pub difficulty: String,
    pub photos: Value,
    pub is_active: bool,
    pub created_at: String,
    pub assignments: Vec<AssignmentDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentDto {
    pub id: String,
    pub chore_id: String,
    pub user_id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    pub user: UserDto,
    pub completions: Vec<CompletionDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionDto {
    pub id: String,
    pub assignment_id: String,
    pub user_id: String,
    pub status: String,
    pub before_photos: Value,
    pub after_photos: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_spent: Option<i32>,
    pub submitted_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitCompletionReq {
    #[serde(default)]
    pub before_photos: Option<Vec<String>>,
    #[serde(default)]
    pub after_photos: Option<Vec<String>>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub time_spent: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewCompletionReq {
    pub completion_id: Option<String>,
    #[serde(default)]
    pub approved: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReviewCompletionResp {
    pub success: bool,
    pub status: String,
}

// Allowance

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributeReq {
    /// Deposit amount in minor currency units.
    pub amount: Option<Cents>,
    pub distribution: Option<JarSplit>,
    pub user_ids: Option<Vec<String>>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DistributeResp {
    pub success: bool,
    pub transactions: Vec<TransactionDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDto {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub amount: Cents,
    pub jar_distribution: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserDto>,
}

// Rewards

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRewardReq {
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub point_cost: Option<i32>,
    #[serde(default)]
    pub photos: Option<Vec<String>>,
    #[serde(default)]
    pub stock: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardDto {
    pub id: String,
    pub family_id: String,
    pub title: String,
    pub description: String,
    pub point_cost: i32,
    pub photos: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock: Option<i32>,
    pub is_active: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionDto {
    pub id: String,
    pub reward_id: String,
    pub user_id: String,
    pub status: String,
    pub created_at: String,
}

// Chat

#[derive(Debug, Serialize, Deserialize)]
pub struct SendMessageReq {
    pub content: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<MessageKind>,
    #[serde(default)]
    pub attachments: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageDto {
    pub id: String,
    pub family_id: String,
    pub user_id: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub attachments: Value,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserDto>,
}

/// Event pushed to connected family members over the real-time channel.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    Message(ChatMessageDto),
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Message(_) => "message",
        }
    }

    pub fn payload_json(&self) -> serde_json::Result<String> {
        match self {
            ServerEvent::Message(msg) => serde_json::to_string(msg),
        }
    }
}
