use std::fmt;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A money amount in minor currency units (cents). All allowance arithmetic
/// is integer arithmetic so jar balances never drift.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cents(pub i64);

impl Cents {
    pub fn zero() -> Self {
        Cents(0)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

impl Add for Cents {
    type Output = Cents;

    fn add(self, rhs: Cents) -> Cents {
        Cents(self.0 + rhs.0)
    }
}

impl AddAssign for Cents {
    fn add_assign(&mut self, rhs: Cents) {
        self.0 += rhs.0;
    }
}

impl fmt::Display for Cents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A user's three named sub-balances. Also used as the per-deposit breakdown
/// recorded on every allowance transaction.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JarBalances {
    pub spend: Cents,
    pub save: Cents,
    pub give: Cents,
}

impl JarBalances {
    pub fn credit(&mut self, deposit: &JarBalances) {
        self.spend += deposit.spend;
        self.save += deposit.save;
        self.give += deposit.give;
    }

    pub fn total(&self) -> Cents {
        self.spend + self.save + self.give
    }
}

/// Percentage split of an allowance deposit across the three jars.
/// Valid only when the three parts sum to exactly 100.
#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
pub struct JarSplit {
    pub spend: u32,
    pub save: u32,
    pub give: u32,
}

impl JarSplit {
    pub fn is_valid(&self) -> bool {
        self.spend <= 100
            && self.save <= 100
            && self.give <= 100
            && self.spend + self.save + self.give == 100
    }

    /// Splits `amount` by percentage. Spend and save round down; give
    /// absorbs the remainder, so the parts always sum to `amount`.
    pub fn breakdown(&self, amount: Cents) -> JarBalances {
        let spend = amount.0 * i64::from(self.spend) / 100;
        let save = amount.0 * i64::from(self.save) / 100;
        let give = amount.0 - spend - save;
        JarBalances {
            spend: Cents(spend),
            save: Cents(save),
            give: Cents(give),
        }
    }
}

/// Recurrence descriptor for a chore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub frequency: Frequency,
    /// Weekday numbers 0-6, present for weekly schedules.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days: Option<Vec<u8>>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Frequency {
    Daily,
    Weekly,
    OneTime,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

/// Lifecycle of a chore assignment. `InProgress` is reserved; no transition
/// currently produces it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Pending,
    InProgress,
    Completed,
    Approved,
    Rejected,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Pending => "pending",
            AssignmentStatus::InProgress => "in_progress",
            AssignmentStatus::Completed => "completed",
            AssignmentStatus::Approved => "approved",
            AssignmentStatus::Rejected => "rejected",
        }
    }
}

/// Lifecycle of a submitted completion: pending until a parent reviews it,
/// then approved or rejected exactly once.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    Pending,
    Approved,
    Rejected,
}

impl CompletionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionStatus::Pending => "pending",
            CompletionStatus::Approved => "approved",
            CompletionStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for CompletionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CompletionStatus::Pending),
            "approved" => Ok(CompletionStatus::Approved),
            "rejected" => Ok(CompletionStatus::Rejected),
            other => Err(format!("unknown completion status: {other}")),
        }
    }
}

/// Redemptions are created `pending`; fulfillment is a separate parent
/// action outside the current scope.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedemptionStatus {
    Pending,
    Fulfilled,
    Rejected,
}

impl RedemptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RedemptionStatus::Pending => "pending",
            RedemptionStatus::Fulfilled => "fulfilled",
            RedemptionStatus::Rejected => "rejected",
        }
    }
}

/// Ledger entry kind. Only deposits are produced today; the ledger schema
/// reserves the other kinds.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    Transfer,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdrawal => "withdrawal",
            TransactionKind::Transfer => "transfer",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    System,
}

impl Default for MessageKind {
    fn default() -> Self {
        MessageKind::Text
    }
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
            MessageKind::System => "system",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_is_exact_for_round_amounts() {
        let split = JarSplit {
            spend: 50,
            save: 30,
            give: 20,
        };
        let parts = split.breakdown(Cents(10_000));
        assert_eq!(parts.spend, Cents(5_000));
        assert_eq!(parts.save, Cents(3_000));
        assert_eq!(parts.give, Cents(2_000));
        assert_eq!(parts.total(), Cents(10_000));
    }

    #[test]
    fn give_absorbs_rounding_remainder() {
        let split = JarSplit {
            spend: 33,
            save: 33,
            give: 34,
        };
        let amount = Cents(999);
        let parts = split.breakdown(amount);
        assert_eq!(parts.spend, Cents(329));
        assert_eq!(parts.save, Cents(329));
        assert_eq!(parts.give, Cents(341));
        assert_eq!(parts.total(), amount);
    }

    #[test]
    fn split_sum_is_validated() {
        assert!(
            JarSplit {
                spend: 50,
                save: 30,
                give: 20
            }
            .is_valid()
        );
        assert!(
            !JarSplit {
                spend: 50,
                save: 30,
                give: 30
            }
            .is_valid()
        );
        assert!(
            !JarSplit {
                spend: 100,
                save: 0,
                give: 1
            }
            .is_valid()
        );
    }

    #[test]
    fn crediting_jars_accumulates() {
        let mut jars = JarBalances::default();
        let split = JarSplit {
            spend: 50,
            save: 30,
            give: 20,
        };
        jars.credit(&split.breakdown(Cents(1_000)));
        jars.credit(&split.breakdown(Cents(1_000)));
        assert_eq!(jars.spend, Cents(1_000));
        assert_eq!(jars.save, Cents(600));
        assert_eq!(jars.give, Cents(400));
    }

    #[test]
    fn schedule_serializes_structurally() {
        let schedule = Schedule {
            frequency: Frequency::Weekly,
            days: Some(vec![1, 3, 5]),
        };
        let json = serde_json::to_value(&schedule).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"frequency": "weekly", "days": [1, 3, 5]})
        );
        let back: Schedule = serde_json::from_value(json).unwrap();
        assert_eq!(back, schedule);
    }
}
