//! # Loyalty Ledger
//!
//! Sole owner of customer point balances.
//!
//! ## Operations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  lookup_or_create(name, phone)                                          │
//! │     phone known? ── yes ──► existing customer (name untouched)          │
//! │          └──────── no ───► INSERT with 0.00 points                      │
//! │                                                                         │
//! │  accrue(customer, total)                                                │
//! │     points += total / accrual_unit            (2 decimals, truncated)   │
//! │                                                                         │
//! │  redeem(customer, requested, cap)                                       │
//! │     UPDATE ... SET points = points - consumed                           │
//! │     WHERE id = ? AND points >= requested                                │
//! │     no row ──► CustomerNotFound | InsufficientPoints                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use cafe_core::validation::{validate_customer_name, validate_phone};
use cafe_core::{Customer, CustomerInput, LoyaltyPolicy, Money, Points};

use crate::error::{DbResult, LedgerError, LedgerResult};

/// Outcome of an accrual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accrual {
    pub points_accrued: Points,
    pub balance_after: Points,
}

/// Outcome of a redemption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redemption {
    pub points_consumed: Points,
    pub discount: Money,
    pub balance_after: Points,
}

/// Handle to the Loyalty Ledger.
///
/// Mutations come in two forms: `*_in` joins the caller's open transaction,
/// the plain form runs in a transaction of its own.
#[derive(Debug, Clone)]
pub struct LoyaltyLedger {
    pool: SqlitePool,
    policy: LoyaltyPolicy,
}

impl LoyaltyLedger {
    pub fn new(pool: SqlitePool, policy: LoyaltyPolicy) -> Self {
        LoyaltyLedger { pool, policy }
    }

    pub fn policy(&self) -> &LoyaltyPolicy {
        &self.policy
    }

    // =========================================================================
    // Customers
    // =========================================================================

    /// Finds the customer with this phone, creating one with zero points if
    /// none exists.
    pub async fn lookup_or_create(&self, input: &CustomerInput) -> LedgerResult<Customer> {
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;
        let customer = self.lookup_or_create_in(&mut tx, input).await?;
        tx.commit().await?;
        Ok(customer)
    }

    /// [`lookup_or_create`](Self::lookup_or_create) inside the caller's
    /// transaction.
    ///
    /// A known phone keeps its stored name; the typed name only names new
    /// customers, falling back to the phone when blank.
    pub async fn lookup_or_create_in(
        &self,
        conn: &mut SqliteConnection,
        input: &CustomerInput,
    ) -> LedgerResult<Customer> {
        if input.is_anonymous() {
            return Err(LedgerError::MissingPhone);
        }
        validate_phone(input.phone_key())?;
        validate_customer_name(&input.name)?;

        let phone = input.phone_key();
        if let Some(existing) = find_by_phone_in(conn, phone).await? {
            debug!(customer_id = existing.id, "Customer found by phone");
            return Ok(existing);
        }

        let now = Utc::now();
        let created = sqlx::query_as::<_, Customer>(
            r#"
            INSERT INTO customers (name, phone, points_hundredths, created_at, updated_at)
            VALUES (?1, ?2, 0, ?3, ?3)
            RETURNING id, name, phone, points_hundredths, created_at, updated_at
            "#,
        )
        .bind(input.display_name())
        .bind(phone)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;

        info!(customer_id = created.id, "Loyalty customer created");
        Ok(created)
    }

    pub async fn find_by_phone(&self, phone: &str) -> DbResult<Option<Customer>> {
        let mut conn = self.pool.acquire().await?;
        find_by_phone_in(&mut conn, phone.trim()).await
    }

    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(
            r#"
            SELECT id, name, phone, points_hundredths, created_at, updated_at
            FROM customers
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(customer)
    }

    /// Current balance, or `None` for an unknown customer.
    pub async fn balance(&self, customer_id: i64) -> DbResult<Option<Points>> {
        let mut conn = self.pool.acquire().await?;
        balance_in(&mut conn, customer_id).await
    }

    // =========================================================================
    // Accrual
    // =========================================================================

    /// Credits the points earned by a sale of `sale_total`.
    pub async fn accrue(&self, customer_id: i64, sale_total: Money) -> LedgerResult<Accrual> {
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;
        let accrual = self.accrue_in(&mut tx, customer_id, sale_total).await?;
        tx.commit().await?;
        Ok(accrual)
    }

    /// [`accrue`](Self::accrue) inside the caller's transaction.
    pub async fn accrue_in(
        &self,
        conn: &mut SqliteConnection,
        customer_id: i64,
        sale_total: Money,
    ) -> LedgerResult<Accrual> {
        let earned = self.policy.accrual_for(sale_total);

        let balance: i64 = sqlx::query_scalar(
            r#"
            UPDATE customers
            SET points_hundredths = points_hundredths + ?2, updated_at = ?3
            WHERE id = ?1
            RETURNING points_hundredths
            "#,
        )
        .bind(customer_id)
        .bind(earned.hundredths())
        .bind(Utc::now())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(LedgerError::CustomerNotFound(customer_id))?;

        let accrual = Accrual {
            points_accrued: earned,
            balance_after: Points::from_hundredths(balance),
        };
        debug!(
            customer_id,
            earned = %accrual.points_accrued,
            balance = %accrual.balance_after,
            "Points accrued"
        );
        Ok(accrual)
    }

    // =========================================================================
    // Redemption
    // =========================================================================

    /// Spends points for a discount.
    ///
    /// Without a cap this is the customer screen's "redeem for a voucher";
    /// checkout passes the sale subtotal as the cap.
    pub async fn redeem(
        &self,
        customer_id: i64,
        requested: Points,
        cap: Option<Money>,
    ) -> LedgerResult<Redemption> {
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;
        let redemption = self.redeem_in(&mut tx, customer_id, requested, cap).await?;
        tx.commit().await?;
        Ok(redemption)
    }

    /// [`redeem`](Self::redeem) inside the caller's transaction.
    ///
    /// `requested` must not exceed the balance even when the cap means fewer
    /// points are actually consumed.
    pub async fn redeem_in(
        &self,
        conn: &mut SqliteConnection,
        customer_id: i64,
        requested: Points,
        cap: Option<Money>,
    ) -> LedgerResult<Redemption> {
        let requested = if requested.is_positive() {
            requested
        } else {
            Points::zero()
        };
        let quote = self.policy.quote_redemption(requested, cap);

        let balance: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE customers
            SET points_hundredths = points_hundredths - ?2, updated_at = ?4
            WHERE id = ?1 AND points_hundredths >= ?3
            RETURNING points_hundredths
            "#,
        )
        .bind(customer_id)
        .bind(quote.points_consumed.hundredths())
        .bind(requested.hundredths())
        .bind(Utc::now())
        .fetch_optional(&mut *conn)
        .await?;

        let Some(balance) = balance else {
            return Err(match balance_in(conn, customer_id).await? {
                None => LedgerError::CustomerNotFound(customer_id),
                Some(available) => LedgerError::InsufficientPoints {
                    requested,
                    available,
                },
            });
        };

        let redemption = Redemption {
            points_consumed: quote.points_consumed,
            discount: quote.discount,
            balance_after: Points::from_hundredths(balance),
        };
        debug!(
            customer_id,
            consumed = %redemption.points_consumed,
            discount = %redemption.discount,
            balance = %redemption.balance_after,
            "Points redeemed"
        );
        Ok(redemption)
    }
}

async fn find_by_phone_in(conn: &mut SqliteConnection, phone: &str) -> DbResult<Option<Customer>> {
    let customer = sqlx::query_as::<_, Customer>(
        r#"
        SELECT id, name, phone, points_hundredths, created_at, updated_at
        FROM customers
        WHERE phone = ?1
        "#,
    )
    .bind(phone)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(customer)
}

async fn balance_in(conn: &mut SqliteConnection, customer_id: i64) -> DbResult<Option<Points>> {
    let balance: Option<i64> =
        sqlx::query_scalar("SELECT points_hundredths FROM customers WHERE id = ?1")
            .bind(customer_id)
            .fetch_optional(&mut *conn)
            .await?;

    Ok(balance.map(Points::from_hundredths))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_lookup_or_create_is_keyed_by_phone() {
        let db = setup().await;
        let ledger = db.loyalty();

        let first = ledger
            .lookup_or_create(&CustomerInput::new("Lan", "0900000000"))
            .await
            .unwrap();
        assert_eq!(first.points(), Points::zero());
        assert_eq!(first.name, "Lan");

        let again = ledger
            .lookup_or_create(&CustomerInput::new("Someone Else", " 0900000000 "))
            .await
            .unwrap();
        assert_eq!(again.id, first.id);
        assert_eq!(again.name, "Lan");
    }

    #[tokio::test]
    async fn test_blank_name_falls_back_to_phone() {
        let db = setup().await;
        let customer = db
            .loyalty()
            .lookup_or_create(&CustomerInput::new("", "0911111111"))
            .await
            .unwrap();
        assert_eq!(customer.name, "0911111111");
    }

    #[tokio::test]
    async fn test_blank_or_malformed_phone_rejected() {
        let db = setup().await;
        let ledger = db.loyalty();

        let err = ledger
            .lookup_or_create(&CustomerInput::new("Lan", "  "))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::MissingPhone));

        let err = ledger
            .lookup_or_create(&CustomerInput::new("Lan", "not a phone"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidCustomer(_)));
        assert!(ledger.find_by_phone("not a phone").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_accrue_fractional_points() {
        let db = setup().await;
        let ledger = db.loyalty();
        let customer = ledger
            .lookup_or_create(&CustomerInput::new("Lan", "0900000000"))
            .await
            .unwrap();

        let accrual = ledger
            .accrue(customer.id, Money::from_major(100_000))
            .await
            .unwrap();
        assert_eq!(accrual.points_accrued, Points::from_hundredths(50));
        assert_eq!(accrual.balance_after, Points::from_hundredths(50));
        assert_eq!(
            ledger.balance(customer.id).await.unwrap(),
            Some(Points::from_hundredths(50))
        );
    }

    #[tokio::test]
    async fn test_accrue_unknown_customer() {
        let db = setup().await;
        let err = db
            .loyalty()
            .accrue(42, Money::from_major(200_000))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::CustomerNotFound(42)));
    }

    #[tokio::test]
    async fn test_redeem_uncapped_voucher() {
        let db = setup().await;
        let ledger = db.loyalty();
        let customer = ledger
            .lookup_or_create(&CustomerInput::new("Lan", "0900000000"))
            .await
            .unwrap();
        ledger
            .accrue(customer.id, Money::from_major(1_000_000))
            .await
            .unwrap();

        let redemption = ledger.redeem(customer.id, Points::whole(3), None).await.unwrap();
        assert_eq!(redemption.points_consumed, Points::whole(3));
        assert_eq!(redemption.discount, Money::from_major(30_000));
        assert_eq!(redemption.balance_after, Points::whole(2));
    }

    #[tokio::test]
    async fn test_redeem_capped_consumes_only_what_covers_cap() {
        let db = setup().await;
        let ledger = db.loyalty();
        let customer = ledger
            .lookup_or_create(&CustomerInput::new("Lan", "0900000000"))
            .await
            .unwrap();
        ledger
            .accrue(customer.id, Money::from_major(2_000_000))
            .await
            .unwrap();

        let redemption = ledger
            .redeem(customer.id, Points::whole(10), Some(Money::from_major(40_000)))
            .await
            .unwrap();
        assert_eq!(redemption.points_consumed, Points::whole(4));
        assert_eq!(redemption.discount, Money::from_major(40_000));
        assert_eq!(redemption.balance_after, Points::whole(6));
    }

    #[tokio::test]
    async fn test_redeem_more_than_balance_fails_without_mutation() {
        let db = setup().await;
        let ledger = db.loyalty();
        let customer = ledger
            .lookup_or_create(&CustomerInput::new("Lan", "0900000000"))
            .await
            .unwrap();
        ledger
            .accrue(customer.id, Money::from_major(600_000))
            .await
            .unwrap();

        let err = ledger
            .redeem(customer.id, Points::whole(5), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientPoints { requested, available }
                if requested == Points::whole(5) && available == Points::whole(3)
        ));
        assert_eq!(ledger.balance(customer.id).await.unwrap(), Some(Points::whole(3)));

        let err = ledger.redeem(77, Points::whole(1), None).await.unwrap_err();
        assert!(matches!(err, LedgerError::CustomerNotFound(77)));
    }
}
