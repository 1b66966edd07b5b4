//! Authenticated caller of the engine
//!
//! Authorization is decided inside the engine from this explicit capability
//! object rather than by a surrounding framework guard.

use super::account::{Account, OwnerId};

/// Role of the authenticated user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Customer,
    Admin,
}

/// The authenticated user submitting an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: OwnerId,
    pub role: Role,
}

impl Actor {
    pub fn customer(id: OwnerId) -> Self {
        Self {
            id,
            role: Role::Customer,
        }
    }

    pub fn admin(id: OwnerId) -> Self {
        Self {
            id,
            role: Role::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Owners may act on their own accounts; administrators on any account
    pub fn can_access(&self, account: &Account) -> bool {
        self.is_admin() || account.owner == self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccountLimits, AccountType};
    use chrono::Utc;
    use rstest::rstest;
    use rust_decimal::Decimal;

    #[rstest]
    #[case::owner(Actor::customer(10), true)]
    #[case::stranger(Actor::customer(11), false)]
    #[case::admin(Actor::admin(99), true)]
    fn test_can_access(#[case] actor: Actor, #[case] expected: bool) {
        let limits = AccountLimits {
            daily_withdrawal_limit: 3,
            special_withdrawal_limit: Decimal::ZERO,
        };
        let account = Account::open(1, 10, AccountType::Savings, limits, Utc::now());

        assert_eq!(actor.can_access(&account), expected);
    }
}
