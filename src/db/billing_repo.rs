// src/db/billing_repo.rs

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{common::error::AppError, models::billing::Invoice};

#[derive(Clone)]
pub struct BillingRepository {
    pool: PgPool,
}

// Fatura a gravar a partir de um evento
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub id: String,
    pub user_id: Uuid,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub invoice_number: Option<String>,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
}

impl BillingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Reentregas do mesmo evento só atualizam o status.
    pub async fn upsert_invoice<'e, E>(&self, executor: E, invoice: &NewInvoice) -> Result<Invoice, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let saved = sqlx::query_as::<_, Invoice>(
            r#"
            INSERT INTO invoices (
                id, user_id, amount, currency, status, invoice_number, customer_email, customer_name
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET status = EXCLUDED.status
            RETURNING id, user_id, amount, currency, status, invoice_number,
                      customer_email, customer_name, created_at
            "#,
        )
        .bind(&invoice.id)
        .bind(invoice.user_id)
        .bind(invoice.amount)
        .bind(&invoice.currency)
        .bind(&invoice.status)
        .bind(invoice.invoice_number.as_deref())
        .bind(invoice.customer_email.as_deref())
        .bind(invoice.customer_name.as_deref())
        .fetch_one(executor)
        .await?;
        Ok(saved)
    }

    pub async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Invoice>, AppError> {
        let invoices = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT id, user_id, amount, currency, status, invoice_number,
                   customer_email, customer_name, created_at
            FROM invoices
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(invoices)
    }
}
