use crate::storage::schema::{
    allowance_transactions, chat_messages, chore_assignments, chore_completions, chores, families,
    reward_redemptions, rewards, users,
};
use chrono::NaiveDateTime;
use diesel::prelude::*;

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = families)]
pub struct Family {
    pub id: String,
    pub name: String,
    pub family_code: String,
    pub pin_hash: String,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = families)]
pub struct NewFamily<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub family_code: &'a str,
    pub pin_hash: &'a str,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable)]
#[diesel(table_name = users)]
#[diesel(belongs_to(Family, foreign_key = family_id))]
pub struct User {
    pub id: String,
    pub family_id: String,
    pub name: String,
    pub role: String,
    pub avatar: String,
    pub points: i32,
    pub streak: i32,
    pub jars: String,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub id: &'a str,
    pub family_id: &'a str,
    pub name: &'a str,
    pub role: &'a str,
    pub avatar: &'a str,
    pub points: i32,
    pub streak: i32,
    pub jars: &'a str,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable)]
#[diesel(table_name = chores)]
#[diesel(belongs_to(Family, foreign_key = family_id))]
pub struct Chore {
    pub id: String,
    pub family_id: String,
    pub title: String,
    pub description: String,
    pub points: i32,
    pub schedule: String,
    pub difficulty: String,
    pub photos: String,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = chores)]
pub struct NewChore<'a> {
    pub id: &'a str,
    pub family_id: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub points: i32,
    pub schedule: &'a str,
    pub difficulty: &'a str,
    pub photos: &'a str,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable)]
#[diesel(table_name = chore_assignments)]
#[diesel(belongs_to(Chore, foreign_key = chore_id))]
#[diesel(belongs_to(User, foreign_key = user_id))]
pub struct ChoreAssignment {
    pub id: String,
    pub chore_id: String,
    pub user_id: String,
    pub status: String,
    pub due_date: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = chore_assignments)]
pub struct NewChoreAssignment<'a> {
    pub id: &'a str,
    pub chore_id: &'a str,
    pub user_id: &'a str,
    pub status: &'a str,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable)]
#[diesel(table_name = chore_completions)]
#[diesel(belongs_to(ChoreAssignment, foreign_key = assignment_id))]
pub struct ChoreCompletion {
    pub id: String,
    pub assignment_id: String,
    pub user_id: String,
    pub status: String,
    pub before_photos: String,
    pub after_photos: String,
    pub notes: Option<String>,
    pub time_spent: Option<i32>,
    pub submitted_at: NaiveDateTime,
    pub approved_at: Option<NaiveDateTime>,
}

#[derive(Insertable)]
#[diesel(table_name = chore_completions)]
pub struct NewChoreCompletion<'a> {
    pub id: &'a str,
    pub assignment_id: &'a str,
    pub user_id: &'a str,
    pub status: &'a str,
    pub before_photos: &'a str,
    pub after_photos: &'a str,
    pub notes: Option<&'a str>,
    pub time_spent: Option<i32>,
    pub submitted_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable)]
#[diesel(table_name = rewards)]
#[diesel(belongs_to(Family, foreign_key = family_id))]
pub struct Reward {
    pub id: String,
    pub family_id: String,
    pub title: String,
    pub description: String,
    pub point_cost: i32,
    pub photos: String,
    pub stock: Option<i32>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = rewards)]
pub struct NewReward<'a> {
    pub id: &'a str,
    pub family_id: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub point_cost: i32,
    pub photos: &'a str,
    pub stock: Option<i32>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable)]
#[diesel(table_name = reward_redemptions)]
#[diesel(belongs_to(Reward, foreign_key = reward_id))]
#[diesel(belongs_to(User, foreign_key = user_id))]
pub struct RewardRedemption {
    pub id: String,
    pub reward_id: String,
    pub user_id: String,
    pub status: String,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = reward_redemptions)]
pub struct NewRewardRedemption<'a> {
    pub id: &'a str,
    pub reward_id: &'a str,
    pub user_id: &'a str,
    pub status: &'a str,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable)]
#[diesel(table_name = allowance_transactions)]
#[diesel(belongs_to(User, foreign_key = user_id))]
pub struct AllowanceTransaction {
    pub id: String,
    pub user_id: String,
    pub kind: String,
    pub amount_cents: i64,
    pub jar_distribution: String,
    pub source: Option<String>,
    pub note: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = allowance_transactions)]
pub struct NewAllowanceTransaction<'a> {
    pub id: &'a str,
    pub user_id: &'a str,
    pub kind: &'a str,
    pub amount_cents: i64,
    pub jar_distribution: &'a str,
    pub source: Option<&'a str>,
    pub note: Option<&'a str>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable)]
#[diesel(table_name = chat_messages)]
#[diesel(belongs_to(Family, foreign_key = family_id))]
#[diesel(belongs_to(User, foreign_key = user_id))]
pub struct ChatMessage {
    pub id: String,
    pub family_id: String,
    pub user_id: String,
    pub content: String,
    pub kind: String,
    pub attachments: String,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = chat_messages)]
pub struct NewChatMessage<'a> {
    pub id: &'a str,
    pub family_id: &'a str,
    pub user_id: &'a str,
    pub content: &'a str,
    pub kind: &'a str,
    pub attachments: &'a str,
    pub created_at: NaiveDateTime,
}
