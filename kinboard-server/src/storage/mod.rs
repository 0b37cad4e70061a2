pub mod codec;
pub mod models;
pub mod schema;

use chrono::Utc;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use kinboard_shared::auth::Role;
use kinboard_shared::domain::{
    AssignmentStatus, Cents, CompletionStatus, JarBalances, JarSplit, RedemptionStatus, Schedule,
    TransactionKind,
};
use models::{
    AllowanceTransaction, ChatMessage, Chore, ChoreAssignment, ChoreCompletion, Family, NewChore,
    NewChoreAssignment, NewChoreCompletion, NewFamily, NewReward, NewRewardRedemption, NewUser,
    Reward, RewardRedemption, User,
};
use uuid::Uuid;

/// Structured error type for all storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A Diesel ORM error (query failure, constraint violation, etc.)
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    /// Failed to acquire or build a connection from the pool.
    #[error("pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    /// A `spawn_blocking` task panicked or was cancelled.
    #[error("task error: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// A database migration failed to apply.
    #[error("migration error: {0}")]
    Migration(String),

    /// A JSON-text column failed to encode or (on a strict path) decode.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// The caller supplied invalid input.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Everything needed to persist a new chore definition.
pub struct ChoreDraft {
    pub title: String,
    pub description: String,
    pub points: i32,
    pub schedule: Schedule,
    pub difficulty: String,
    pub photos: Option<Vec<String>>,
}

/// Everything needed to persist a submitted completion.
#[derive(Default)]
pub struct CompletionDraft {
    pub before_photos: Option<Vec<String>>,
    pub after_photos: Option<Vec<String>>,
    pub notes: Option<String>,
    pub time_spent: Option<i32>,
}

pub struct RewardDraft {
    pub title: String,
    pub description: String,
    pub point_cost: i32,
    pub photos: Option<Vec<String>>,
    pub stock: Option<i32>,
}

/// An assignment with its assignee and submitted completions.
pub struct AssignmentDetail {
    pub assignment: ChoreAssignment,
    pub user: User,
    pub completions: Vec<ChoreCompletion>,
}

/// A chore with its full assignment graph, as served by the chore listings.
pub struct ChoreDetail {
    pub chore: Chore,
    pub assignments: Vec<AssignmentDetail>,
}

pub enum CreateChoreOutcome {
    Created(Chore),
    AssigneeNotFound,
}

pub enum ReviewOutcome {
    NotFound,
    /// The completion was already approved or rejected; reviewing it again
    /// would double-award points.
    AlreadyReviewed,
    Reviewed {
        status: CompletionStatus,
    },
}

pub enum RedeemOutcome {
    RewardNotFound,
    UserNotFound,
    OutOfStock,
    InsufficientPoints,
    Redeemed(RewardRedemption),
}

#[derive(Clone)]
pub struct Store {
    pool: Pool<ConnectionManager<SqliteConnection>>,
}

impl Store {
    pub async fn connect_sqlite(path: &str) -> Result<Self, StorageError> {
        let url = path.to_string();
        let manager = ConnectionManager::<SqliteConnection>::new(url);
        let pool = Pool::builder().max_size(8).build(manager)?;

        // Run pending Diesel migrations on startup (auto-init empty DBs)
        {
            let pool_clone = pool.clone();
            tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
                const MIGRATIONS: EmbeddedMigrations = embed_migrations!();
                let mut conn = pool_clone.get()?;
                configure_sqlite_conn(&mut conn)?;
                conn.run_pending_migrations(MIGRATIONS)
                    .map_err(|e| StorageError::Migration(e.to_string()))?;
                Ok(())
            })
            .await??;
        }

        Ok(Store { pool })
    }

    // Families and members

    pub async fn create_family_with_parent(
        &self,
        name: &str,
        family_code: &str,
        pin_hash: &str,
        parent_name: &str,
        parent_avatar: &str,
    ) -> Result<(Family, User), StorageError> {
        use schema::{families, users};
        let pool = self.pool.clone();
        let name = name.to_string();
        let code = family_code.to_string();
        let pin_hash = pin_hash.to_string();
        let parent_name = parent_name.to_string();
        let parent_avatar = parent_avatar.to_string();
        tokio::task::spawn_blocking(move || -> Result<(Family, User), StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let now = Utc::now().naive_utc();
            let family_id = Uuid::new_v4().to_string();
            let user_id = Uuid::new_v4().to_string();
            let jars = codec::to_text(&JarBalances::default())?;
            conn.immediate_transaction(|conn| -> Result<(), StorageError> {
                diesel::insert_into(families::table)
                    .values(&NewFamily {
                        id: &family_id,
                        name: &name,
                        family_code: &code,
                        pin_hash: &pin_hash,
                        created_at: now,
                    })
                    .execute(conn)?;
                diesel::insert_into(users::table)
                    .values(&NewUser {
                        id: &user_id,
                        family_id: &family_id,
                        name: &parent_name,
                        role: Role::Parent.as_str(),
                        avatar: &parent_avatar,
                        points: 0,
                        streak: 0,
                        jars: &jars,
                        created_at: now,
                    })
                    .execute(conn)?;
                Ok(())
            })?;
            let family = families::table.find(&family_id).first::<Family>(&mut conn)?;
            let user = users::table.find(&user_id).first::<User>(&mut conn)?;
            Ok((family, user))
        })
        .await?
    }

    pub async fn family_by_code(&self, code: &str) -> Result<Option<Family>, StorageError> {
        use schema::families::dsl::*;
        let pool = self.pool.clone();
        let code = code.to_string();
        tokio::task::spawn_blocking(move || -> Result<Option<Family>, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            Ok(families
                .filter(family_code.eq(&code))
                .first::<Family>(&mut conn)
                .optional()?)
        })
        .await?
    }

    pub async fn family_by_id(&self, family_id: &str) -> Result<Option<Family>, StorageError> {
        use schema::families::dsl::*;
        let pool = self.pool.clone();
        let fid = family_id.to_string();
        tokio::task::spawn_blocking(move || -> Result<Option<Family>, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            Ok(families
                .filter(id.eq(&fid))
                .first::<Family>(&mut conn)
                .optional()?)
        })
        .await?
    }

    pub async fn list_members(&self, family_id: &str) -> Result<Vec<User>, StorageError> {
        use schema::users::dsl as u;
        let pool = self.pool.clone();
        let fid = family_id.to_string();
        tokio::task::spawn_blocking(move || -> Result<Vec<User>, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            Ok(u::users
                .filter(u::family_id.eq(&fid))
                .order(u::created_at.asc())
                .load::<User>(&mut conn)?)
        })
        .await?
    }

    pub async fn user_in_family(
        &self,
        user_id: &str,
        family_id: &str,
    ) -> Result<Option<User>, StorageError> {
        use schema::users::dsl as u;
        let pool = self.pool.clone();
        let uid = user_id.to_string();
        let fid = family_id.to_string();
        tokio::task::spawn_blocking(move || -> Result<Option<User>, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            Ok(u::users
                .filter(u::id.eq(&uid))
                .filter(u::family_id.eq(&fid))
                .first::<User>(&mut conn)
                .optional()?)
        })
        .await?
    }

    pub async fn create_member(
        &self,
        family_id: &str,
        name: &str,
        role: Role,
        avatar: &str,
    ) -> Result<User, StorageError> {
        use schema::users;
        let pool = self.pool.clone();
        let fid = family_id.to_string();
        let name = name.to_string();
        let avatar = avatar.to_string();
        tokio::task::spawn_blocking(move || -> Result<User, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let user_id = Uuid::new_v4().to_string();
            let jars = codec::to_text(&JarBalances::default())?;
            diesel::insert_into(users::table)
                .values(&NewUser {
                    id: &user_id,
                    family_id: &fid,
                    name: &name,
                    role: role.as_str(),
                    avatar: &avatar,
                    points: 0,
                    streak: 0,
                    jars: &jars,
                    created_at: Utc::now().naive_utc(),
                })
                .execute(&mut conn)?;
            Ok(users::table.find(&user_id).first::<User>(&mut conn)?)
        })
        .await?
    }

    // Chore workflow

    /// Persists the chore and one pending assignment per assignee as a single
    /// all-or-nothing transaction.
    pub async fn create_chore(
        &self,
        family_id: &str,
        draft: ChoreDraft,
        assignees: Vec<String>,
    ) -> Result<CreateChoreOutcome, StorageError> {
        use schema::{chore_assignments, chores, users};
        let pool = self.pool.clone();
        let fid = family_id.to_string();
        tokio::task::spawn_blocking(move || -> Result<CreateChoreOutcome, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let now = Utc::now().naive_utc();
            let chore_id = Uuid::new_v4().to_string();
            let schedule = codec::to_text(&draft.schedule)?;
            let photos = codec::string_list(draft.photos.as_deref())?;
            let created = conn.immediate_transaction(
                |conn| -> Result<CreateChoreOutcome, StorageError> {
                    let known: i64 = users::table
                        .filter(users::id.eq_any(&assignees))
                        .filter(users::family_id.eq(&fid))
                        .count()
                        .get_result(conn)?;
                    if known != assignees.len() as i64 {
                        return Ok(CreateChoreOutcome::AssigneeNotFound);
                    }
                    diesel::insert_into(chores::table)
                        .values(&NewChore {
                            id: &chore_id,
                            family_id: &fid,
                            title: &draft.title,
                            description: &draft.description,
                            points: draft.points,
                            schedule: &schedule,
                            difficulty: &draft.difficulty,
                            photos: &photos,
                            is_active: true,
                            created_at: now,
                        })
                        .execute(conn)?;
                    for assignee in &assignees {
                        let assignment_id = Uuid::new_v4().to_string();
                        diesel::insert_into(chore_assignments::table)
                            .values(&NewChoreAssignment {
                                id: &assignment_id,
                                chore_id: &chore_id,
                                user_id: assignee,
                                status: AssignmentStatus::Pending.as_str(),
                                created_at: now,
                            })
                            .execute(conn)?;
                    }
                    let chore = chores::table.find(&chore_id).first::<Chore>(conn)?;
                    Ok(CreateChoreOutcome::Created(chore))
                },
            )?;
            Ok(created)
        })
        .await?
    }

    pub async fn list_chores(&self, family_id: &str) -> Result<Vec<ChoreDetail>, StorageError> {
        use schema::chores;
        let pool = self.pool.clone();
        let fid = family_id.to_string();
        tokio::task::spawn_blocking(move || -> Result<Vec<ChoreDetail>, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let rows = chores::table
                .filter(chores::family_id.eq(&fid))
                .order(chores::created_at.asc())
                .load::<Chore>(&mut conn)?;
            load_chore_graph(&mut conn, rows)
        })
        .await?
    }

    pub async fn chore_detail(
        &self,
        chore_id: &str,
        family_id: &str,
    ) -> Result<Option<ChoreDetail>, StorageError> {
        use schema::chores;
        let pool = self.pool.clone();
        let cid = chore_id.to_string();
        let fid = family_id.to_string();
        tokio::task::spawn_blocking(move || -> Result<Option<ChoreDetail>, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let row = chores::table
                .filter(chores::id.eq(&cid))
                .filter(chores::family_id.eq(&fid))
                .first::<Chore>(&mut conn)
                .optional()?;
            let Some(chore) = row else {
                return Ok(None);
            };
            Ok(load_chore_graph(&mut conn, vec![chore])?.pop())
        })
        .await?
    }

    /// Records a completion for the caller's own assignment and moves the
    /// assignment to `completed`. Returns `None` when the user holds no
    /// assignment for the chore; nothing is persisted in that case.
    pub async fn submit_completion(
        &self,
        chore_id: &str,
        user_id: &str,
        draft: CompletionDraft,
    ) -> Result<Option<ChoreCompletion>, StorageError> {
        use schema::{chore_assignments, chore_completions};
        let pool = self.pool.clone();
        let cid = chore_id.to_string();
        let uid = user_id.to_string();
        tokio::task::spawn_blocking(move || -> Result<Option<ChoreCompletion>, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let now = Utc::now().naive_utc();
            let before = codec::string_list(draft.before_photos.as_deref())?;
            let after = codec::string_list(draft.after_photos.as_deref())?;
            conn.immediate_transaction(|conn| -> Result<Option<ChoreCompletion>, StorageError> {
                let assignment = chore_assignments::table
                    .filter(chore_assignments::chore_id.eq(&cid))
                    .filter(chore_assignments::user_id.eq(&uid))
                    .first::<ChoreAssignment>(conn)
                    .optional()?;
                let Some(assignment) = assignment else {
                    return Ok(None);
                };
                let completion_id = Uuid::new_v4().to_string();
                diesel::insert_into(chore_completions::table)
                    .values(&NewChoreCompletion {
                        id: &completion_id,
                        assignment_id: &assignment.id,
                        user_id: &uid,
                        status: CompletionStatus::Pending.as_str(),
                        before_photos: &before,
                        after_photos: &after,
                        notes: draft.notes.as_deref(),
                        time_spent: draft.time_spent,
                        submitted_at: now,
                    })
                    .execute(conn)?;
                diesel::update(chore_assignments::table.find(&assignment.id))
                    .set(chore_assignments::status.eq(AssignmentStatus::Completed.as_str()))
                    .execute(conn)?;
                Ok(Some(
                    chore_completions::table
                        .find(&completion_id)
                        .first::<ChoreCompletion>(conn)?,
                ))
            })
        })
        .await?
    }

    /// Reviews a pending completion. On approval the completion, its
    /// assignment, and the submitter's points/streak are updated in one
    /// transaction; a completion that was already reviewed is refused so
    /// points can never be awarded twice.
    pub async fn review_completion(
        &self,
        completion_id: &str,
        family_id: &str,
        approve: bool,
    ) -> Result<ReviewOutcome, StorageError> {
        use schema::{chore_assignments, chore_completions, chores, users};
        let pool = self.pool.clone();
        let cid = completion_id.to_string();
        let fid = family_id.to_string();
        tokio::task::spawn_blocking(move || -> Result<ReviewOutcome, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            conn.immediate_transaction(|conn| -> Result<ReviewOutcome, StorageError> {
                let row = chore_completions::table
                    .inner_join(chore_assignments::table.inner_join(chores::table))
                    .filter(chore_completions::id.eq(&cid))
                    .filter(chores::family_id.eq(&fid))
                    .select((
                        ChoreCompletion::as_select(),
                        ChoreAssignment::as_select(),
                        Chore::as_select(),
                    ))
                    .first::<(ChoreCompletion, ChoreAssignment, Chore)>(conn)
                    .optional()?;
                let Some((completion, assignment, chore)) = row else {
                    return Ok(ReviewOutcome::NotFound);
                };
                if completion.status != CompletionStatus::Pending.as_str() {
                    return Ok(ReviewOutcome::AlreadyReviewed);
                }
                let status = if approve {
                    CompletionStatus::Approved
                } else {
                    CompletionStatus::Rejected
                };
                let approved_at = approve.then(|| Utc::now().naive_utc());
                diesel::update(chore_completions::table.find(&completion.id))
                    .set((
                        chore_completions::status.eq(status.as_str()),
                        chore_completions::approved_at.eq(approved_at),
                    ))
                    .execute(conn)?;
                diesel::update(chore_assignments::table.find(&assignment.id))
                    .set(chore_assignments::status.eq(status.as_str()))
                    .execute(conn)?;
                if approve {
                    diesel::update(users::table.find(&completion.user_id))
                        .set((
                            users::points.eq(users::points + chore.points),
                            users::streak.eq(users::streak + 1),
                        ))
                        .execute(conn)?;
                }
                Ok(ReviewOutcome::Reviewed { status })
            })
        })
        .await?
    }

    // Allowance ledger

    pub async fn list_transactions(
        &self,
        family_id: &str,
        only_user: Option<&str>,
    ) -> Result<Vec<(AllowanceTransaction, User)>, StorageError> {
        use schema::{allowance_transactions as tx, users};
        let pool = self.pool.clone();
        let fid = family_id.to_string();
        let only_user = only_user.map(|s| s.to_string());
        tokio::task::spawn_blocking(
            move || -> Result<Vec<(AllowanceTransaction, User)>, StorageError> {
                let mut conn = pool.get()?;
                configure_sqlite_conn(&mut conn)?;
                let mut query = tx::table
                    .inner_join(users::table)
                    .filter(users::family_id.eq(&fid))
                    .into_boxed();
                if let Some(uid) = &only_user {
                    query = query.filter(tx::user_id.eq(uid.clone()));
                }
                Ok(query
                    .order(tx::created_at.desc())
                    .select((AllowanceTransaction::as_select(), User::as_select()))
                    .load::<(AllowanceTransaction, User)>(&mut conn)?)
            },
        )
        .await?
    }

    /// Deposits `amount` to each target user: one ledger row plus the jar
    /// read-modify-write per user, each pair in its own transaction so
    /// concurrent distributions to the same user cannot lose updates.
    pub async fn distribute_allowance(
        &self,
        family_id: &str,
        user_ids: Vec<String>,
        amount: Cents,
        split: JarSplit,
        note: Option<String>,
    ) -> Result<Vec<AllowanceTransaction>, StorageError> {
        use schema::{allowance_transactions, users};
        let pool = self.pool.clone();
        let fid = family_id.to_string();
        tokio::task::spawn_blocking(move || -> Result<Vec<AllowanceTransaction>, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let mut created = Vec::with_capacity(user_ids.len());
            for target in &user_ids {
                let txn =
                    conn.immediate_transaction(|conn| -> Result<AllowanceTransaction, StorageError> {
                        let user = users::table
                            .filter(users::id.eq(target))
                            .filter(users::family_id.eq(&fid))
                            .first::<User>(conn)
                            .optional()?
                            .ok_or_else(|| {
                                StorageError::InvalidInput(format!("user not found: {target}"))
                            })?;
                        let parts = split.breakdown(amount);
                        let breakdown = codec::to_text(&parts)?;
                        let txn_id = Uuid::new_v4().to_string();
                        diesel::insert_into(allowance_transactions::table)
                            .values(&models::NewAllowanceTransaction {
                                id: &txn_id,
                                user_id: &user.id,
                                kind: TransactionKind::Deposit.as_str(),
                                amount_cents: amount.0,
                                jar_distribution: &breakdown,
                                source: Some("allowance"),
                                note: note.as_deref(),
                                created_at: Utc::now().naive_utc(),
                            })
                            .execute(conn)?;
                        let mut jars = codec::jars_from_text(&user.jars)?;
                        jars.credit(&parts);
                        diesel::update(users::table.find(&user.id))
                            .set(users::jars.eq(codec::to_text(&jars)?))
                            .execute(conn)?;
                        Ok(allowance_transactions::table
                            .find(&txn_id)
                            .first::<AllowanceTransaction>(conn)?)
                    })?;
                created.push(txn);
            }
            Ok(created)
        })
        .await?
    }

    // Rewards

    pub async fn create_reward(
        &self,
        family_id: &str,
        draft: RewardDraft,
    ) -> Result<Reward, StorageError> {
        use schema::rewards;
        let pool = self.pool.clone();
        let fid = family_id.to_string();
        tokio::task::spawn_blocking(move || -> Result<Reward, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let reward_id = Uuid::new_v4().to_string();
            let photos = codec::string_list(draft.photos.as_deref())?;
            diesel::insert_into(rewards::table)
                .values(&NewReward {
                    id: &reward_id,
                    family_id: &fid,
                    title: &draft.title,
                    description: &draft.description,
                    point_cost: draft.point_cost,
                    photos: &photos,
                    stock: draft.stock,
                    is_active: true,
                    created_at: Utc::now().naive_utc(),
                })
                .execute(&mut conn)?;
            Ok(rewards::table.find(&reward_id).first::<Reward>(&mut conn)?)
        })
        .await?
    }

    pub async fn list_active_rewards(&self, family_id: &str) -> Result<Vec<Reward>, StorageError> {
        use schema::rewards::dsl as r;
        let pool = self.pool.clone();
        let fid = family_id.to_string();
        tokio::task::spawn_blocking(move || -> Result<Vec<Reward>, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            Ok(r::rewards
                .filter(r::family_id.eq(&fid))
                .filter(r::is_active.eq(true))
                .order(r::created_at.desc())
                .load::<Reward>(&mut conn)?)
        })
        .await?
    }

    /// Redeems a reward for a user as one immediate transaction. The point
    /// debit and the stock decrement are conditional updates checked by
    /// affected-row count, so two redemptions racing for the last unit (or
    /// the last sufficient balance) cannot both succeed.
    pub async fn redeem_reward(
        &self,
        reward_id: &str,
        user_id: &str,
        family_id: &str,
    ) -> Result<RedeemOutcome, StorageError> {
        use schema::{reward_redemptions, rewards, users};
        let pool = self.pool.clone();
        let rid = reward_id.to_string();
        let uid = user_id.to_string();
        let fid = family_id.to_string();
        tokio::task::spawn_blocking(move || -> Result<RedeemOutcome, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let result = conn.immediate_transaction(|conn| -> Result<RedeemOutcome, StorageError> {
                let reward = rewards::table
                    .filter(rewards::id.eq(&rid))
                    .filter(rewards::family_id.eq(&fid))
                    .first::<Reward>(conn)
                    .optional()?;
                let Some(reward) = reward else {
                    return Ok(RedeemOutcome::RewardNotFound);
                };
                if matches!(reward.stock, Some(stock) if stock <= 0) {
                    return Ok(RedeemOutcome::OutOfStock);
                }
                let user = users::table
                    .filter(users::id.eq(&uid))
                    .filter(users::family_id.eq(&fid))
                    .first::<User>(conn)
                    .optional()?;
                if user.is_none() {
                    return Ok(RedeemOutcome::UserNotFound);
                }
                let debited = diesel::update(
                    users::table
                        .filter(users::id.eq(&uid))
                        .filter(users::points.ge(reward.point_cost)),
                )
                .set(users::points.eq(users::points - reward.point_cost))
                .execute(conn)?;
                if debited == 0 {
                    // No writes have happened yet; committing is a no-op.
                    return Ok(RedeemOutcome::InsufficientPoints);
                }
                if reward.stock.is_some() {
                    let taken = diesel::update(
                        rewards::table
                            .filter(rewards::id.eq(&rid))
                            .filter(rewards::stock.gt(0)),
                    )
                    .set(rewards::stock.eq(rewards::stock - 1))
                    .execute(conn)?;
                    if taken == 0 {
                        // The point debit above must not survive.
                        return Err(diesel::result::Error::RollbackTransaction.into());
                    }
                }
                let redemption_id = Uuid::new_v4().to_string();
                diesel::insert_into(reward_redemptions::table)
                    .values(&NewRewardRedemption {
                        id: &redemption_id,
                        reward_id: &rid,
                        user_id: &uid,
                        status: RedemptionStatus::Pending.as_str(),
                        created_at: Utc::now().naive_utc(),
                    })
                    .execute(conn)?;
                Ok(RedeemOutcome::Redeemed(
                    reward_redemptions::table
                        .find(&redemption_id)
                        .first::<RewardRedemption>(conn)?,
                ))
            });
            match result {
                Err(StorageError::Database(diesel::result::Error::RollbackTransaction)) => {
                    Ok(RedeemOutcome::OutOfStock)
                }
                other => other,
            }
        })
        .await?
    }

    // Chat

    pub async fn create_chat_message(
        &self,
        family_id: &str,
        user_id: &str,
        content: &str,
        kind: &str,
        attachments: Option<Vec<String>>,
    ) -> Result<Option<(ChatMessage, User)>, StorageError> {
        use schema::{chat_messages, users};
        let pool = self.pool.clone();
        let fid = family_id.to_string();
        let uid = user_id.to_string();
        let content = content.to_string();
        let kind = kind.to_string();
        tokio::task::spawn_blocking(
            move || -> Result<Option<(ChatMessage, User)>, StorageError> {
                let mut conn = pool.get()?;
                configure_sqlite_conn(&mut conn)?;
                let author = users::table
                    .filter(users::id.eq(&uid))
                    .filter(users::family_id.eq(&fid))
                    .first::<User>(&mut conn)
                    .optional()?;
                let Some(author) = author else {
                    return Ok(None);
                };
                let message_id = Uuid::new_v4().to_string();
                let attachments = codec::string_list(attachments.as_deref())?;
                diesel::insert_into(chat_messages::table)
                    .values(&models::NewChatMessage {
                        id: &message_id,
                        family_id: &fid,
                        user_id: &uid,
                        content: &content,
                        kind: &kind,
                        attachments: &attachments,
                        created_at: Utc::now().naive_utc(),
                    })
                    .execute(&mut conn)?;
                let message = chat_messages::table
                    .find(&message_id)
                    .first::<ChatMessage>(&mut conn)?;
                Ok(Some((message, author)))
            },
        )
        .await?
    }

    /// Returns the `limit` most recent messages in chronological order.
    pub async fn list_chat_messages(
        &self,
        family_id: &str,
        limit: i64,
    ) -> Result<Vec<(ChatMessage, User)>, StorageError> {
        use schema::{chat_messages as cm, users};
        let pool = self.pool.clone();
        let fid = family_id.to_string();
        tokio::task::spawn_blocking(move || -> Result<Vec<(ChatMessage, User)>, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let mut rows = cm::table
                .inner_join(users::table)
                .filter(cm::family_id.eq(&fid))
                .order(cm::created_at.desc())
                .limit(limit)
                .select((ChatMessage::as_select(), User::as_select()))
                .load::<(ChatMessage, User)>(&mut conn)?;
            rows.reverse();
            Ok(rows)
        })
        .await?
    }
}

/// Loads assignments (with assignees) and completions for a page of chores
/// and stitches the graph together in memory.
fn load_chore_graph(
    conn: &mut SqliteConnection,
    chores: Vec<Chore>,
) -> Result<Vec<ChoreDetail>, StorageError> {
    use schema::{chore_assignments, chore_completions, users};

    let chore_ids: Vec<&str> = chores.iter().map(|c| c.id.as_str()).collect();
    let assignment_rows = chore_assignments::table
        .inner_join(users::table)
        .filter(chore_assignments::chore_id.eq_any(&chore_ids))
        .order(chore_assignments::created_at.asc())
        .select((ChoreAssignment::as_select(), User::as_select()))
        .load::<(ChoreAssignment, User)>(conn)?;

    let assignment_ids: Vec<&str> = assignment_rows
        .iter()
        .map(|(a, _)| a.id.as_str())
        .collect();
    let completion_rows = chore_completions::table
        .filter(chore_completions::assignment_id.eq_any(&assignment_ids))
        .order(chore_completions::submitted_at.asc())
        .load::<ChoreCompletion>(conn)?;

    let mut completions_by_assignment: std::collections::HashMap<String, Vec<ChoreCompletion>> =
        std::collections::HashMap::new();
    for completion in completion_rows {
        completions_by_assignment
            .entry(completion.assignment_id.clone())
            .or_default()
            .push(completion);
    }

    let mut assignments_by_chore: std::collections::HashMap<String, Vec<AssignmentDetail>> =
        std::collections::HashMap::new();
    for (assignment, user) in assignment_rows {
        let completions = completions_by_assignment
            .remove(&assignment.id)
            .unwrap_or_default();
        assignments_by_chore
            .entry(assignment.chore_id.clone())
            .or_default()
            .push(AssignmentDetail {
                assignment,
                user,
                completions,
            });
    }

    Ok(chores
        .into_iter()
        .map(|chore| {
            let assignments = assignments_by_chore.remove(&chore.id).unwrap_or_default();
            ChoreDetail { chore, assignments }
        })
        .collect())
}

fn configure_sqlite_conn(conn: &mut SqliteConnection) -> Result<(), diesel::result::Error> {
    // Enable WAL for better read/write concurrency and set a busy timeout
    // Ignore the result rows; Diesel's execute is fine for PRAGMAs
    diesel::sql_query("PRAGMA journal_mode=WAL;").execute(conn)?;
    diesel::sql_query("PRAGMA synchronous=NORMAL;").execute(conn)?;
    diesel::sql_query("PRAGMA busy_timeout=5000;").execute(conn)?;
    diesel::sql_query("PRAGMA foreign_keys=ON;").execute(conn)?;
    Ok(())
}
