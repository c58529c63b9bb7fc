//! Database service for the billing portal.

use crate::models::{
    AdminAlertRow, AdminInvoiceRow, AdminPaymentRow, Announcement, CreateAnnouncement,
    CreateInvoice, CreateServer, Invoice, ListAlertsFilter, ListInvoicesFilter,
    ListPaymentsFilter, Payment, PaymentAllocation, Server, SubmitPayment, UpdateAnnouncement,
};
use crate::services::metrics::{DB_QUERY_DURATION, INVOICES_TOTAL, PAYMENT_TRANSITIONS_TOTAL};
use crate::services::reconciliation::{self, DunningState};
use chrono::{Duration, NaiveDate, Utc};
use portal_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{info, instrument};
use uuid::Uuid;

const PAYMENT_COLUMNS: &str = "payment_id, server_id, amount_cents, method, bank, status, \
     proof_ref, validated_by, validated_utc, applied_by, applied_utc, rejected_by, rejected_utc, \
     rejection_reason, created_utc";

const INVOICE_COLUMNS: &str = "invoice_id, server_id, folio, issue_date, due_date, total_cents, \
     balance_cents, status, pdf_ref, xml_ref, created_utc";

const ANNOUNCEMENT_COLUMNS: &str = "announcement_id, server_id, kind, title, body, starts_at, \
     ends_at, status, created_by, created_utc, updated_utc";

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "billing-portal"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .idle_timeout(std::time::Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Server Operations
    // -------------------------------------------------------------------------

    /// Register a server (tenant environment).
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_server(&self, input: &CreateServer) -> Result<Server, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_server"])
            .start_timer();

        let server = sqlx::query_as::<_, Server>(
            r#"
            INSERT INTO servers (server_id, name, grace_days)
            VALUES ($1, $2, $3)
            RETURNING server_id, name, grace_days, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.name)
        .bind(input.grace_days)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "Server '{}' is already registered",
                    input.name
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create server: {}", e)),
        })?;

        timer.observe_duration();

        info!(server_id = %server.server_id, name = %server.name, "Server registered");

        Ok(server)
    }

    /// Resolve a server by its domain name (case-insensitive).
    #[instrument(skip(self))]
    pub async fn get_server_by_name(&self, name: &str) -> Result<Option<Server>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_server_by_name"])
            .start_timer();

        let server = sqlx::query_as::<_, Server>(
            r#"
            SELECT server_id, name, grace_days, created_utc
            FROM servers
            WHERE lower(name) = lower($1)
            "#,
        )
        .bind(name.trim())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get server: {}", e)))?;

        timer.observe_duration();

        Ok(server)
    }

    /// List registered domains for the admin selector.
    #[instrument(skip(self))]
    pub async fn list_server_names(&self) -> Result<Vec<String>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_server_names"])
            .start_timer();

        let names = sqlx::query_scalar::<_, String>("SELECT name FROM servers ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to list servers: {}", e))
            })?;

        timer.observe_duration();

        Ok(names)
    }

    // -------------------------------------------------------------------------
    // Invoice Operations
    // -------------------------------------------------------------------------

    /// Create an invoice and immediately reflect the new debt in the server's
    /// announcements. The whole pass runs in one transaction.
    ///
    /// `due_offset_days` is the fixed issue-to-due offset; it is a different
    /// knob from the server's dunning grace period.
    #[instrument(skip(self, server, input), fields(server_id = %server.server_id, folio = %input.folio))]
    pub async fn create_invoice(
        &self,
        server: &Server,
        input: &CreateInvoice,
        due_offset_days: i64,
        today: NaiveDate,
    ) -> Result<Invoice, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_invoice"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let existing = sqlx::query_scalar::<_, Uuid>(
            "SELECT invoice_id FROM invoices WHERE server_id = $1 AND folio = $2",
        )
        .bind(server.server_id)
        .bind(&input.folio)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to check folio: {}", e)))?;

        if existing.is_some() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Invoice with folio '{}' already exists for this server",
                input.folio
            )));
        }

        let due_date = input.issue_date + Duration::days(due_offset_days);

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            INSERT INTO invoices
                (invoice_id, server_id, folio, issue_date, due_date, total_cents, balance_cents,
                 status, pdf_ref, xml_ref)
            VALUES ($1, $2, $3, $4, $5, $6, $6, 'unpaid', $7, $8)
            RETURNING {INVOICE_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(server.server_id)
        .bind(&input.folio)
        .bind(input.issue_date)
        .bind(due_date)
        .bind(input.total_cents)
        .bind(&input.pdf_ref)
        .bind(&input.xml_ref)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "Invoice with folio '{}' already exists for this server",
                    input.folio
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create invoice: {}", e)),
        })?;

        reconciliation::regenerate_for_server(&mut tx, server, today, Utc::now()).await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        INVOICES_TOTAL.with_label_values(&["unpaid"]).inc();

        info!(invoice_id = %invoice.invoice_id, folio = %invoice.folio, "Invoice created");

        Ok(invoice)
    }

    /// Get an invoice by ID.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn get_invoice(&self, invoice_id: Uuid) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE invoice_id = $1"
        ))
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))?;

        timer.observe_duration();

        Ok(invoice)
    }

    /// List a server's invoices with outstanding balance, soonest due first.
    #[instrument(skip(self), fields(server_id = %server_id))]
    pub async fn list_open_invoices(&self, server_id: Uuid) -> Result<Vec<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_open_invoices"])
            .start_timer();

        let invoices = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            SELECT {INVOICE_COLUMNS}
            FROM invoices
            WHERE server_id = $1 AND balance_cents > 0
            ORDER BY due_date ASC
            "#
        ))
        .bind(server_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list open invoices: {}", e))
        })?;

        timer.observe_duration();

        Ok(invoices)
    }

    /// Paginated admin invoice listing with search, status filter and an
    /// allow-listed sort column.
    #[instrument(skip(self, filter))]
    pub async fn list_invoices_admin(
        &self,
        filter: &ListInvoicesFilter,
    ) -> Result<(Vec<AdminInvoiceRow>, i64), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices_admin"])
            .start_timer();

        let limit = filter.limit.clamp(1, 100);
        let page = filter.page.max(1);
        let offset = (page - 1) * limit;
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let status = filter.status.map(|s| s.as_str().to_string());

        // Sort column and direction come from typed enums, never raw input.
        let rows = sqlx::query_as::<_, AdminInvoiceRow>(&format!(
            r#"
            SELECT i.invoice_id, i.folio, i.issue_date, i.due_date, i.total_cents,
                   i.balance_cents, i.status, i.pdf_ref, i.xml_ref, s.name AS domain
            FROM invoices i
            JOIN servers s ON i.server_id = s.server_id
            WHERE ($1::TEXT IS NULL OR i.folio ILIKE '%' || $1 || '%' OR s.name ILIKE '%' || $1 || '%')
              AND ($2::TEXT IS NULL OR i.status = $2)
            ORDER BY {} {}
            LIMIT $3 OFFSET $4
            "#,
            filter.order_by.as_sql(),
            filter.order.as_sql()
        ))
        .bind(&search)
        .bind(&status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list invoices: {}", e)))?;

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM invoices i
            JOIN servers s ON i.server_id = s.server_id
            WHERE ($1::TEXT IS NULL OR i.folio ILIKE '%' || $1 || '%' OR s.name ILIKE '%' || $1 || '%')
              AND ($2::TEXT IS NULL OR i.status = $2)
            "#,
        )
        .bind(&search)
        .bind(&status)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to count invoices: {}", e)))?;

        timer.observe_duration();

        Ok((rows, total))
    }

    // -------------------------------------------------------------------------
    // Payment Operations
    // -------------------------------------------------------------------------

    /// Record a user-submitted payment after validating its allocations.
    ///
    /// Rejects, before any write: an empty or invalid invoice selection, an
    /// allocation exceeding an invoice's outstanding balance, and an
    /// allocation sum that does not match the submitted amount.
    #[instrument(skip(self, server, input), fields(server_id = %server.server_id))]
    pub async fn submit_payment(
        &self,
        server: &Server,
        input: &SubmitPayment,
    ) -> Result<Payment, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["submit_payment"])
            .start_timer();

        if input.allocations.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Select at least one invoice"
            )));
        }

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let selected_ids: Vec<Uuid> = input.allocations.iter().map(|a| a.invoice_id).collect();

        let open_invoices = sqlx::query_as::<_, (Uuid, i64)>(
            r#"
            SELECT invoice_id, balance_cents
            FROM invoices
            WHERE server_id = $1 AND invoice_id = ANY($2) AND balance_cents > 0
            "#,
        )
        .bind(server.server_id)
        .bind(&selected_ids)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to load selected invoices: {}", e))
        })?;

        if open_invoices.len() != selected_ids.len() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "An invoice in the selection is invalid, belongs to another server, or has no outstanding balance"
            )));
        }

        let mut allocated_total: i64 = 0;
        for alloc in &input.allocations {
            let balance = open_invoices
                .iter()
                .find(|(id, _)| *id == alloc.invoice_id)
                .map(|(_, balance)| *balance)
                .unwrap_or(0);

            if alloc.amount_cents > balance {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Allocation exceeds the outstanding balance of invoice {}",
                    alloc.invoice_id
                )));
            }

            allocated_total += alloc.amount_cents;
        }

        if allocated_total != input.amount_cents {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Sum of allocations does not match the submitted payment amount"
            )));
        }

        let payment = sqlx::query_as::<_, Payment>(&format!(
            r#"
            INSERT INTO payments
                (payment_id, server_id, amount_cents, method, bank, status, proof_ref)
            VALUES ($1, $2, $3, $4, $5, 'pending', $6)
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(server.server_id)
        .bind(input.amount_cents)
        .bind(&input.method)
        .bind(&input.bank)
        .bind(&input.proof_ref)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to insert payment: {}", e)))?;

        for alloc in &input.allocations {
            sqlx::query(
                r#"
                INSERT INTO payment_allocations (allocation_id, payment_id, invoice_id, amount_cents)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(payment.payment_id)
            .bind(alloc.invoice_id)
            .bind(alloc.amount_cents)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to insert allocation: {}", e))
            })?;
        }

        sqlx::query(
            r#"
            INSERT INTO alerts (alert_id, server_id, user_id, alert_type, message)
            VALUES ($1, $2, $3, 'payment_received', 'Payment received and pending review')
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(server.server_id)
        .bind(input.submitted_by)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to insert alert: {}", e)))?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        PAYMENT_TRANSITIONS_TOTAL
            .with_label_values(&["submitted", "ok"])
            .inc();

        info!(
            payment_id = %payment.payment_id,
            amount_cents = payment.amount_cents,
            allocations = input.allocations.len(),
            "Payment submitted"
        );

        Ok(payment)
    }

    /// Transition a payment `pending → validated`.
    ///
    /// The WHERE clause carries the expected status, so a concurrent duplicate
    /// request matches zero rows and reports a conflict instead of silently
    /// succeeding twice.
    #[instrument(skip(self), fields(payment_id = %payment_id, admin_id = %admin_id))]
    pub async fn validate_payment(
        &self,
        payment_id: Uuid,
        admin_id: Uuid,
    ) -> Result<Payment, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["validate_payment"])
            .start_timer();

        let payment = sqlx::query_as::<_, Payment>(&format!(
            r#"
            UPDATE payments
            SET status = 'validated', validated_by = $2, validated_utc = now()
            WHERE payment_id = $1 AND status = 'pending'
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(payment_id)
        .bind(admin_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to validate payment: {}", e))
        })?;

        timer.observe_duration();

        match payment {
            Some(payment) => {
                PAYMENT_TRANSITIONS_TOTAL
                    .with_label_values(&["validated", "ok"])
                    .inc();
                info!(payment_id = %payment.payment_id, "Payment validated");
                Ok(payment)
            }
            None => {
                PAYMENT_TRANSITIONS_TOTAL
                    .with_label_values(&["validated", "conflict"])
                    .inc();
                Err(AppError::Conflict(anyhow::anyhow!(
                    "Payment not found or no longer pending"
                )))
            }
        }
    }

    /// Transition a payment `pending → rejected`, recording the reason.
    #[instrument(skip(self, reason), fields(payment_id = %payment_id, admin_id = %admin_id))]
    pub async fn reject_payment(
        &self,
        payment_id: Uuid,
        admin_id: Uuid,
        reason: &str,
    ) -> Result<Payment, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["reject_payment"])
            .start_timer();

        let payment = sqlx::query_as::<_, Payment>(&format!(
            r#"
            UPDATE payments
            SET status = 'rejected', rejected_by = $2, rejected_utc = now(), rejection_reason = $3
            WHERE payment_id = $1 AND status = 'pending'
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(payment_id)
        .bind(admin_id)
        .bind(reason)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to reject payment: {}", e)))?;

        timer.observe_duration();

        match payment {
            Some(payment) => {
                PAYMENT_TRANSITIONS_TOTAL
                    .with_label_values(&["rejected", "ok"])
                    .inc();
                info!(payment_id = %payment.payment_id, "Payment rejected");
                Ok(payment)
            }
            None => {
                PAYMENT_TRANSITIONS_TOTAL
                    .with_label_values(&["rejected", "conflict"])
                    .inc();
                Err(AppError::Conflict(anyhow::anyhow!(
                    "Payment not found or no longer pending"
                )))
            }
        }
    }

    /// Apply a validated payment: decrement each allocated invoice's balance,
    /// recompute invoice statuses, regenerate announcements and run the unlock
    /// check. Everything happens inside one transaction; a payment that is not
    /// currently `validated` reports a conflict and changes nothing.
    #[instrument(skip(self), fields(payment_id = %payment_id, admin_id = %admin_id))]
    pub async fn apply_payment(
        &self,
        payment_id: Uuid,
        admin_id: Uuid,
        today: NaiveDate,
    ) -> Result<(Payment, DunningState), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["apply_payment"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let payment = sqlx::query_as::<_, Payment>(&format!(
            r#"
            UPDATE payments
            SET status = 'applied', applied_by = $2, applied_utc = now()
            WHERE payment_id = $1 AND status = 'validated'
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(payment_id)
        .bind(admin_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to apply payment: {}", e)))?;

        let Some(payment) = payment else {
            PAYMENT_TRANSITIONS_TOTAL
                .with_label_values(&["applied", "conflict"])
                .inc();
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Payment not found or not validated"
            )));
        };

        let allocations = sqlx::query_as::<_, PaymentAllocation>(
            r#"
            SELECT allocation_id, payment_id, invoice_id, amount_cents
            FROM payment_allocations
            WHERE payment_id = $1
            ORDER BY allocation_id
            "#,
        )
        .bind(payment.payment_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to load allocations: {}", e))
        })?;

        // Allocation amounts are trusted from submission time.
        for alloc in &allocations {
            sqlx::query(
                r#"
                UPDATE invoices
                SET balance_cents = balance_cents - $1,
                    status = CASE
                                 WHEN balance_cents - $1 <= 0 THEN 'paid'
                                 WHEN balance_cents - $1 >= total_cents THEN 'unpaid'
                                 ELSE 'partial'
                             END
                WHERE invoice_id = $2
                "#,
            )
            .bind(alloc.amount_cents)
            .bind(alloc.invoice_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to apply allocation: {}", e))
            })?;
        }

        let server = sqlx::query_as::<_, Server>(
            "SELECT server_id, name, grace_days, created_utc FROM servers WHERE server_id = $1",
        )
        .bind(payment.server_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to load server: {}", e)))?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Server not found for payment")))?;

        let now = Utc::now();
        let state = reconciliation::regenerate_for_server(&mut tx, &server, today, now).await?;
        reconciliation::unlock_if_settled(&mut tx, server.server_id, now).await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        PAYMENT_TRANSITIONS_TOTAL
            .with_label_values(&["applied", "ok"])
            .inc();

        info!(
            payment_id = %payment.payment_id,
            server_id = %server.server_id,
            allocations = allocations.len(),
            "Payment applied"
        );

        Ok((payment, state))
    }

    /// Get a payment by ID.
    #[instrument(skip(self), fields(payment_id = %payment_id))]
    pub async fn get_payment(&self, payment_id: Uuid) -> Result<Option<Payment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_payment"])
            .start_timer();

        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE payment_id = $1"
        ))
        .bind(payment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get payment: {}", e)))?;

        timer.observe_duration();

        Ok(payment)
    }

    /// List a payment's allocations.
    #[instrument(skip(self), fields(payment_id = %payment_id))]
    pub async fn list_allocations(
        &self,
        payment_id: Uuid,
    ) -> Result<Vec<PaymentAllocation>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_allocations"])
            .start_timer();

        let allocations = sqlx::query_as::<_, PaymentAllocation>(
            r#"
            SELECT allocation_id, payment_id, invoice_id, amount_cents
            FROM payment_allocations
            WHERE payment_id = $1
            ORDER BY allocation_id
            "#,
        )
        .bind(payment_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list allocations: {}", e))
        })?;

        timer.observe_duration();

        Ok(allocations)
    }

    /// Paginated admin payment listing with search, status filter and an
    /// allow-listed sort column.
    #[instrument(skip(self, filter))]
    pub async fn list_payments_admin(
        &self,
        filter: &ListPaymentsFilter,
    ) -> Result<(Vec<AdminPaymentRow>, i64), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_payments_admin"])
            .start_timer();

        let limit = filter.limit.clamp(1, 100);
        let page = filter.page.max(1);
        let offset = (page - 1) * limit;
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let status = filter.status.map(|s| s.as_str().to_string());

        let rows = sqlx::query_as::<_, AdminPaymentRow>(&format!(
            r#"
            SELECT p.payment_id, p.amount_cents, p.method, p.bank, p.status, p.proof_ref,
                   p.created_utc, s.name AS domain
            FROM payments p
            JOIN servers s ON p.server_id = s.server_id
            WHERE ($1::TEXT IS NULL
                   OR s.name ILIKE '%' || $1 || '%'
                   OR p.method ILIKE '%' || $1 || '%'
                   OR p.bank ILIKE '%' || $1 || '%')
              AND ($2::TEXT IS NULL OR p.status = $2)
            ORDER BY {} {}
            LIMIT $3 OFFSET $4
            "#,
            filter.order_by.as_sql(),
            filter.order.as_sql()
        ))
        .bind(&search)
        .bind(&status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list payments: {}", e)))?;

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM payments p
            JOIN servers s ON p.server_id = s.server_id
            WHERE ($1::TEXT IS NULL
                   OR s.name ILIKE '%' || $1 || '%'
                   OR p.method ILIKE '%' || $1 || '%'
                   OR p.bank ILIKE '%' || $1 || '%')
              AND ($2::TEXT IS NULL OR p.status = $2)
            "#,
        )
        .bind(&search)
        .bind(&status)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to count payments: {}", e)))?;

        timer.observe_duration();

        Ok((rows, total))
    }

    // -------------------------------------------------------------------------
    // Announcement Operations
    // -------------------------------------------------------------------------

    /// Recompute announcements for one server as an explicit administrative
    /// action.
    #[instrument(skip(self, server), fields(server_id = %server.server_id))]
    pub async fn regenerate_announcements(
        &self,
        server: &Server,
        today: NaiveDate,
    ) -> Result<DunningState, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["regenerate_announcements"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let state = reconciliation::regenerate_for_server(&mut tx, server, today, Utc::now()).await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        Ok(state)
    }

    /// List a server's announcements whose display window has not ended yet,
    /// newest first.
    #[instrument(skip(self), fields(server_id = %server_id))]
    pub async fn list_current_announcements(
        &self,
        server_id: Uuid,
    ) -> Result<Vec<Announcement>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_current_announcements"])
            .start_timer();

        let announcements = sqlx::query_as::<_, Announcement>(&format!(
            r#"
            SELECT {ANNOUNCEMENT_COLUMNS}
            FROM announcements
            WHERE server_id = $1 AND ends_at > now()
            ORDER BY created_utc DESC
            "#
        ))
        .bind(server_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list announcements: {}", e))
        })?;

        timer.observe_duration();

        Ok(announcements)
    }

    /// Create a manual announcement.
    #[instrument(skip(self, input), fields(server_id = %input.server_id))]
    pub async fn create_announcement(
        &self,
        input: &CreateAnnouncement,
    ) -> Result<Announcement, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_announcement"])
            .start_timer();

        let body = input
            .body
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let announcement = sqlx::query_as::<_, Announcement>(&format!(
            r#"
            INSERT INTO announcements
                (announcement_id, server_id, kind, title, body, starts_at, ends_at, status, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'active', $8)
            RETURNING {ANNOUNCEMENT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(input.server_id)
        .bind(input.kind.as_str())
        .bind(&input.title)
        .bind(body)
        .bind(input.starts_at)
        .bind(input.ends_at)
        .bind(input.created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to create announcement: {}", e))
        })?;

        timer.observe_duration();

        info!(announcement_id = %announcement.announcement_id, "Announcement created");

        Ok(announcement)
    }

    /// Get an announcement by ID.
    #[instrument(skip(self), fields(announcement_id = %announcement_id))]
    pub async fn get_announcement(
        &self,
        announcement_id: Uuid,
    ) -> Result<Option<Announcement>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_announcement"])
            .start_timer();

        let announcement = sqlx::query_as::<_, Announcement>(&format!(
            "SELECT {ANNOUNCEMENT_COLUMNS} FROM announcements WHERE announcement_id = $1"
        ))
        .bind(announcement_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get announcement: {}", e))
        })?;

        timer.observe_duration();

        Ok(announcement)
    }

    /// Update a manual announcement.
    #[instrument(skip(self, input), fields(announcement_id = %announcement_id))]
    pub async fn update_announcement(
        &self,
        announcement_id: Uuid,
        input: &UpdateAnnouncement,
    ) -> Result<Option<Announcement>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_announcement"])
            .start_timer();

        let kind = input.kind.map(|k| k.as_str().to_string());
        let body = input
            .body
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let announcement = sqlx::query_as::<_, Announcement>(&format!(
            r#"
            UPDATE announcements
            SET kind = COALESCE($2, kind),
                title = COALESCE($3, title),
                body = COALESCE($4, body),
                starts_at = COALESCE($5, starts_at),
                ends_at = COALESCE($6, ends_at),
                updated_utc = now()
            WHERE announcement_id = $1
            RETURNING {ANNOUNCEMENT_COLUMNS}
            "#
        ))
        .bind(announcement_id)
        .bind(&kind)
        .bind(&input.title)
        .bind(body)
        .bind(input.starts_at)
        .bind(input.ends_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update announcement: {}", e))
        })?;

        timer.observe_duration();

        Ok(announcement)
    }

    // -------------------------------------------------------------------------
    // Alert Operations
    // -------------------------------------------------------------------------

    /// Paginated admin alert listing with type filter and text search.
    #[instrument(skip(self, filter))]
    pub async fn list_alerts_admin(
        &self,
        filter: &ListAlertsFilter,
    ) -> Result<(Vec<AdminAlertRow>, i64), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_alerts_admin"])
            .start_timer();

        let limit = filter.limit.clamp(1, 200);
        let page = filter.page.max(1);
        let offset = (page - 1) * limit;
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let rows = sqlx::query_as::<_, AdminAlertRow>(
            r#"
            SELECT a.alert_id, a.alert_type, a.message, a.acknowledged, a.created_utc,
                   s.name AS domain
            FROM alerts a
            JOIN servers s ON a.server_id = s.server_id
            WHERE ($1::TEXT IS NULL OR a.alert_type = $1)
              AND ($2::TEXT IS NULL OR a.message ILIKE '%' || $2 || '%' OR s.name ILIKE '%' || $2 || '%')
            ORDER BY a.created_utc DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(&filter.alert_type)
        .bind(&search)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list alerts: {}", e)))?;

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM alerts a
            JOIN servers s ON a.server_id = s.server_id
            WHERE ($1::TEXT IS NULL OR a.alert_type = $1)
              AND ($2::TEXT IS NULL OR a.message ILIKE '%' || $2 || '%' OR s.name ILIKE '%' || $2 || '%')
            "#,
        )
        .bind(&filter.alert_type)
        .bind(&search)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to count alerts: {}", e)))?;

        timer.observe_duration();

        Ok((rows, total))
    }
}
