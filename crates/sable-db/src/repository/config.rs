//! # Configuration Repository
//!
//! Reference data the checkout loads ONCE per transaction: active tax rules,
//! the active loyalty program, and the payment-method allow-list.
//!
//! Missing or malformed configuration means "feature inactive", never a
//! failed sale: no tax rows → no tax, no active program → no loyalty, empty
//! allow-list → only the built-in payment methods.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::warn;
use uuid::Uuid;

use crate::error::DbResult;
use sable_core::loyalty::{AccrualRule, LoyaltyProgram, RedemptionPolicy};
use sable_core::money::{Money, Rate};
use sable_core::tax::{TaxCharge, TaxKind, TaxMethod, TaxRule};

/// Repository for configuration reads and administration.
#[derive(Debug, Clone)]
pub struct ConfigRepository {
    pool: SqlitePool,
}

// =============================================================================
// Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct TaxRow {
    code: String,
    name: String,
    tax_type: TaxKind,
    method: TaxMethod,
    rate: i64,
}

impl TaxRow {
    fn into_rule(self) -> TaxRule {
        let charge = match self.tax_type {
            TaxKind::Percentage => TaxCharge::Percentage(Rate::from_bps(self.rate.max(0) as u32)),
            TaxKind::Fixed => TaxCharge::Fixed(Money::from_kobo(self.rate)),
        };
        TaxRule {
            code: self.code,
            name: self.name,
            charge,
            method: self.method,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LoyaltyProgramRow {
    id: String,
    name: String,
    is_active: bool,
    rule: String,
    points_per_transaction: i64,
    points_per_unit: i64,
    unit_value_kobo: i64,
    rate_per_point_kobo: i64,
    minimum_points: i64,
    max_discount_bps: i64,
    required_transaction_count: i64,
    transaction_discount_bps: i64,
    required_item_count: i64,
    item_discount_bps: i64,
}

impl LoyaltyProgramRow {
    fn into_program(self) -> Option<LoyaltyProgram> {
        let rule = match self.rule.as_str() {
            "per_transaction" => AccrualRule::PerTransaction {
                points: self.points_per_transaction,
            },
            "per_amount" => AccrualRule::PerAmount {
                points_per_unit: self.points_per_unit,
                unit_value_kobo: self.unit_value_kobo,
            },
            "combined" => AccrualRule::Combined {
                points: self.points_per_transaction,
                points_per_unit: self.points_per_unit,
                unit_value_kobo: self.unit_value_kobo,
            },
            "transaction_count_discount" => AccrualRule::TransactionCount {
                required: self.required_transaction_count,
                discount: Rate::from_bps(self.transaction_discount_bps.max(0) as u32),
            },
            "item_count_discount" => AccrualRule::ItemCount {
                required: self.required_item_count,
                discount_per_multiple: Rate::from_bps(self.item_discount_bps.max(0) as u32),
            },
            other => {
                // Operator-fixable: the program is treated as inactive.
                warn!(rule = %other, program = %self.id, "Unknown loyalty rule; treating program as inactive");
                return None;
            }
        };

        Some(LoyaltyProgram {
            id: self.id,
            name: self.name,
            is_active: self.is_active,
            rule,
            redemption: RedemptionPolicy {
                rate_per_point_kobo: self.rate_per_point_kobo,
                minimum_points: self.minimum_points,
                max_discount: Rate::from_bps(self.max_discount_bps.max(0) as u32),
            },
        })
    }
}

// =============================================================================
// Reads
// =============================================================================

impl ConfigRepository {
    /// Creates a new ConfigRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ConfigRepository { pool }
    }

    /// Active tax rules in display order.
    pub async fn active_taxes(conn: &mut SqliteConnection) -> DbResult<Vec<TaxRule>> {
        let rows = sqlx::query_as::<_, TaxRow>(
            "SELECT code, name, tax_type, method, rate FROM tax_configurations \
             WHERE is_active = 1 ORDER BY sort_order, name",
        )
        .fetch_all(conn)
        .await?;

        Ok(rows.into_iter().map(TaxRow::into_rule).collect())
    }

    /// The active loyalty program, if any. At most one row is active; a row
    /// with an unknown rule string is treated as no program.
    pub async fn active_loyalty_program(
        conn: &mut SqliteConnection,
    ) -> DbResult<Option<LoyaltyProgram>> {
        let row = sqlx::query_as::<_, LoyaltyProgramRow>(
            "SELECT id, name, is_active, rule, points_per_transaction, points_per_unit,
                    unit_value_kobo, rate_per_point_kobo, minimum_points, max_discount_bps,
                    required_transaction_count, transaction_discount_bps,
                    required_item_count, item_discount_bps
             FROM loyalty_programs WHERE is_active = 1
             ORDER BY created_at DESC LIMIT 1",
        )
        .fetch_optional(conn)
        .await?;

        Ok(row.and_then(LoyaltyProgramRow::into_program))
    }

    /// Custom payment-method codes beyond the built-in kinds.
    pub async fn payment_method_allowlist(conn: &mut SqliteConnection) -> DbResult<Vec<String>> {
        let codes: Vec<String> = sqlx::query_scalar(
            "SELECT code FROM payment_method_configs WHERE is_active = 1 ORDER BY sort_order, code",
        )
        .fetch_all(conn)
        .await?;

        Ok(codes)
    }

    // =========================================================================
    // Administration (seeding, tests, back-office screens)
    // =========================================================================

    /// Inserts a tax rule. Deactivates nothing; multiple taxes can be live.
    pub async fn insert_tax(
        &self,
        rule: &TaxRule,
        is_active: bool,
        sort_order: i64,
    ) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO tax_configurations (id, code, name, tax_type, method, rate, is_active, sort_order, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&rule.code)
        .bind(&rule.name)
        .bind(rule.charge.kind())
        .bind(rule.method)
        .bind(rule.charge.raw_value())
        .bind(is_active)
        .bind(sort_order)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Inserts a loyalty program, deactivating any currently active one
    /// (only one active configuration at a time).
    pub async fn insert_loyalty_program(&self, program: &LoyaltyProgram) -> DbResult<()> {
        if program.is_active {
            sqlx::query("UPDATE loyalty_programs SET is_active = 0 WHERE is_active = 1")
                .execute(&self.pool)
                .await?;
        }

        let (rule, ppt, ppu, unit, req_txn, txn_bps, req_items, item_bps) = match program.rule {
            AccrualRule::PerTransaction { points } => {
                ("per_transaction", points, 0, 0, 0, 0, 0, 0)
            }
            AccrualRule::PerAmount {
                points_per_unit,
                unit_value_kobo,
            } => ("per_amount", 0, points_per_unit, unit_value_kobo, 0, 0, 0, 0),
            AccrualRule::Combined {
                points,
                points_per_unit,
                unit_value_kobo,
            } => ("combined", points, points_per_unit, unit_value_kobo, 0, 0, 0, 0),
            AccrualRule::TransactionCount { required, discount } => (
                "transaction_count_discount",
                0,
                0,
                0,
                required,
                discount.bps() as i64,
                0,
                0,
            ),
            AccrualRule::ItemCount {
                required,
                discount_per_multiple,
            } => (
                "item_count_discount",
                0,
                0,
                0,
                0,
                0,
                required,
                discount_per_multiple.bps() as i64,
            ),
        };

        sqlx::query(
            "INSERT INTO loyalty_programs (
                id, name, is_active, rule, points_per_transaction, points_per_unit,
                unit_value_kobo, rate_per_point_kobo, minimum_points, max_discount_bps,
                required_transaction_count, transaction_discount_bps,
                required_item_count, item_discount_bps, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        )
        .bind(&program.id)
        .bind(&program.name)
        .bind(program.is_active)
        .bind(rule)
        .bind(ppt)
        .bind(ppu)
        .bind(unit)
        .bind(program.redemption.rate_per_point_kobo)
        .bind(program.redemption.minimum_points)
        .bind(program.redemption.max_discount.bps() as i64)
        .bind(req_txn)
        .bind(txn_bps)
        .bind(req_items)
        .bind(item_bps)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Registers a custom payment method code.
    pub async fn insert_payment_method(
        &self,
        code: &str,
        display_name: &str,
        sort_order: i64,
    ) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO payment_method_configs (code, display_name, is_active, sort_order)
             VALUES (?1, ?2, 1, ?3)",
        )
        .bind(code)
        .bind(display_name)
        .bind(sort_order)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn vat() -> TaxRule {
        TaxRule {
            code: "VAT".into(),
            name: "Value Added Tax".into(),
            charge: TaxCharge::Percentage(Rate::from_bps(750)),
            method: TaxMethod::Exclusive,
        }
    }

    #[tokio::test]
    async fn test_tax_round_trip() {
        let db = db().await;
        db.config().insert_tax(&vat(), true, 0).await.unwrap();
        db.config()
            .insert_tax(
                &TaxRule {
                    code: "LVY".into(),
                    name: "Fixed Levy".into(),
                    charge: TaxCharge::Fixed(Money::from_naira(200)),
                    method: TaxMethod::Inclusive,
                },
                true,
                1,
            )
            .await
            .unwrap();
        // Inactive rules are not loaded
        db.config()
            .insert_tax(
                &TaxRule {
                    code: "OLD".into(),
                    name: "Old Tax".into(),
                    charge: TaxCharge::Percentage(Rate::from_bps(500)),
                    method: TaxMethod::Exclusive,
                },
                false,
                2,
            )
            .await
            .unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let rules = ConfigRepository::active_taxes(&mut conn).await.unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0], vat());
        assert_eq!(
            rules[1].charge,
            TaxCharge::Fixed(Money::from_naira(200))
        );
    }

    #[tokio::test]
    async fn test_loyalty_program_round_trip_and_single_active() {
        let db = db().await;
        let first = LoyaltyProgram {
            id: "lp1".into(),
            name: "Old Program".into(),
            is_active: true,
            rule: AccrualRule::PerTransaction { points: 5 },
            redemption: RedemptionPolicy {
                rate_per_point_kobo: 100,
                minimum_points: 100,
                max_discount: Rate::from_bps(2_000),
            },
        };
        let second = LoyaltyProgram {
            id: "lp2".into(),
            name: "New Program".into(),
            is_active: true,
            rule: AccrualRule::Combined {
                points: 2,
                points_per_unit: 1,
                unit_value_kobo: 10_000,
            },
            ..first.clone()
        };

        db.config().insert_loyalty_program(&first).await.unwrap();
        db.config().insert_loyalty_program(&second).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let active = ConfigRepository::active_loyalty_program(&mut conn)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(active.id, "lp2");
        assert_eq!(
            active.rule,
            AccrualRule::Combined {
                points: 2,
                points_per_unit: 1,
                unit_value_kobo: 10_000
            }
        );
    }

    #[tokio::test]
    async fn test_no_config_means_feature_inactive() {
        let db = db().await;
        let mut conn = db.pool().acquire().await.unwrap();

        assert!(ConfigRepository::active_taxes(&mut conn).await.unwrap().is_empty());
        assert!(ConfigRepository::active_loyalty_program(&mut conn)
            .await
            .unwrap()
            .is_none());
        assert!(ConfigRepository::payment_method_allowlist(&mut conn)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_allowlist() {
        let db = db().await;
        db.config()
            .insert_payment_method("pos_moniepoint", "POS Moniepoint", 0)
            .await
            .unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let codes = ConfigRepository::payment_method_allowlist(&mut conn).await.unwrap();
        assert_eq!(codes, vec!["pos_moniepoint".to_string()]);
    }
}
