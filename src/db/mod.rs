use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use log::{error, info};
use rusqlite::{params, Connection, Row};
use tokio::sync::oneshot;

mod migrations;

use crate::models::{Confidence, GroundingSource, RecognitionRecord, SavedProduct};
use migrations::run_migrations;

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum DbCommand {
    Execute(DbTask),
    Shutdown,
}

struct DatabaseInner {
    sender: mpsc::Sender<DbCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for DatabaseInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(DbCommand::Shutdown) {
                error!("Failed to send shutdown to DB thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join DB thread: {join_err:?}");
            }
        }
    }
}

fn parse_datetime(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| anyhow!("invalid datetime '{value}': {err}"))
}

fn confidence_as_str(value: Confidence) -> &'static str {
    match value {
        Confidence::High => "high",
        Confidence::Medium => "medium",
        Confidence::Low => "low",
    }
}

fn confidence_from_str(value: &str) -> Result<Confidence> {
    match value {
        "high" => Ok(Confidence::High),
        "medium" => Ok(Confidence::Medium),
        "low" => Ok(Confidence::Low),
        _ => Err(anyhow!("unknown confidence '{value}'")),
    }
}

const PRODUCT_COLUMNS: &str = "id, product_name, origin, manufacture_date, expiry_date, \
     storage_duration, is_expired, days_remaining, raw_text_found, confidence, summary, \
     date_ambiguity_warning, is_food_product, grounding_sources, scanned_at";

fn row_to_product(row: &Row<'_>) -> Result<SavedProduct> {
    let sources_json: String = row.get(13)?;
    let grounding_sources: Vec<GroundingSource> = serde_json::from_str(&sources_json)
        .map_err(|err| anyhow!("invalid grounding sources JSON: {err}"))?;

    Ok(SavedProduct {
        id: row.get(0)?,
        record: RecognitionRecord {
            product_name: row.get(1)?,
            origin: row.get(2)?,
            manufacture_date: row.get(3)?,
            expiry_date: row.get(4)?,
            storage_duration: row.get(5)?,
            is_expired: row.get(6)?,
            days_remaining: row.get(7)?,
            raw_text_found: row.get(8)?,
            confidence: row
                .get::<_, Option<String>>(9)?
                .map(|s| confidence_from_str(&s))
                .transpose()?,
            summary: row.get(10)?,
            date_ambiguity_warning: row.get(11)?,
            is_food_product: row.get(12)?,
            grounding_sources,
        },
        scanned_at: parse_datetime(&row.get::<_, String>(14)?)?,
    })
}

fn insert_one(conn: &Connection, product: &SavedProduct) -> Result<()> {
    let record = &product.record;
    conn.execute(
        "INSERT INTO products (id, product_name, origin, manufacture_date, expiry_date, \
         storage_duration, is_expired, days_remaining, raw_text_found, confidence, summary, \
         date_ambiguity_warning, is_food_product, grounding_sources, scanned_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            product.id,
            record.product_name,
            record.origin,
            record.manufacture_date,
            record.expiry_date,
            record.storage_duration,
            record.is_expired,
            record.days_remaining,
            record.raw_text_found,
            record.confidence.map(confidence_as_str),
            record.summary,
            record.date_ambiguity_warning,
            record.is_food_product,
            serde_json::to_string(&record.grounding_sources)?,
            product.scanned_at.to_rfc3339(),
        ],
    )
    .with_context(|| "failed to insert product")?;
    Ok(())
}

/// Scan history store.
///
/// All SQLite work happens on one dedicated thread owning the connection;
/// async callers post closures over a channel and await a oneshot reply.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
    db_path: Arc<PathBuf>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let (command_tx, command_rx) = mpsc::channel::<DbCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let path_for_thread = db_path.clone();

        let worker = thread::Builder::new()
            .name("freshscan-db".into())
            .spawn(move || {
                let mut conn = match Connection::open(&path_for_thread) {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(Err(anyhow::Error::new(err)
                            .context("failed to open SQLite database")));
                        return;
                    }
                };

                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    error!("Failed to enable WAL mode: {err}");
                }
                if let Err(err) = conn.pragma_update(None, "foreign_keys", "ON") {
                    error!("Failed to enable foreign keys: {err}");
                }

                let init_result =
                    run_migrations(&mut conn).context("failed to run database migrations");
                if ready_tx.send(init_result).is_err() {
                    error!("DB initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        DbCommand::Execute(task) => {
                            task(&mut conn);
                        }
                        DbCommand::Shutdown => break,
                    }
                }

                info!("Database thread shutting down");
            })
            .with_context(|| "failed to spawn database worker thread")?;

        ready_rx
            .recv()
            .context("database worker exited before signaling readiness")??;

        info!("Database initialized at {}", db_path.as_path().display());

        Ok(Self {
            inner: Arc::new(DatabaseInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.inner.sender.clone();
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = DbCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("DB caller dropped before receiving result");
            }
        }));

        sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to DB thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("database thread terminated unexpectedly"))?
    }

    pub async fn insert_product(&self, product: &SavedProduct) -> Result<()> {
        let record = product.clone();
        self.execute(move |conn| insert_one(conn, &record)).await
    }

    /// Merge a batch (typically a finished live session) in one transaction.
    pub async fn insert_products(&self, products: &[SavedProduct]) -> Result<()> {
        let records = products.to_vec();
        self.execute(move |conn| {
            let tx = conn
                .transaction()
                .context("failed to open insert transaction")?;
            for product in &records {
                insert_one(&tx, product)?;
            }
            tx.commit().context("failed to commit product batch")?;
            Ok(())
        })
        .await
    }

    /// Full history, newest scan first.
    pub async fn list_products(&self) -> Result<Vec<SavedProduct>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY scanned_at DESC, id"
            ))?;

            let mut rows = stmt.query([])?;
            let mut products = Vec::new();
            while let Some(row) = rows.next()? {
                products.push(row_to_product(row)?);
            }
            Ok(products)
        })
        .await
    }

    /// Replace the stored row for this product id (user edits after review).
    pub async fn update_product(&self, product: &SavedProduct) -> Result<()> {
        let record = product.clone();
        self.execute(move |conn| {
            let rec = &record.record;
            let changed = conn
                .execute(
                    "UPDATE products
                     SET product_name = ?1,
                         origin = ?2,
                         manufacture_date = ?3,
                         expiry_date = ?4,
                         storage_duration = ?5,
                         is_expired = ?6,
                         days_remaining = ?7,
                         raw_text_found = ?8,
                         confidence = ?9,
                         summary = ?10,
                         date_ambiguity_warning = ?11
                     WHERE id = ?12",
                    params![
                        rec.product_name,
                        rec.origin,
                        rec.manufacture_date,
                        rec.expiry_date,
                        rec.storage_duration,
                        rec.is_expired,
                        rec.days_remaining,
                        rec.raw_text_found,
                        rec.confidence.map(confidence_as_str),
                        rec.summary,
                        rec.date_ambiguity_warning,
                        record.id,
                    ],
                )
                .with_context(|| "failed to update product")?;

            if changed == 0 {
                bail!("no product with id {}", record.id);
            }
            Ok(())
        })
        .await
    }

    pub async fn delete_product(&self, product_id: &str) -> Result<()> {
        let product_id = product_id.to_string();
        self.execute(move |conn| {
            conn.execute("DELETE FROM products WHERE id = ?1", params![product_id])
                .with_context(|| "failed to delete product")?;
            Ok(())
        })
        .await
    }

    /// The "purge all records" action: wipe the whole history.
    pub async fn purge_products(&self) -> Result<()> {
        self.execute(|conn| {
            conn.execute("DELETE FROM products", [])
                .with_context(|| "failed to purge products")?;
            Ok(())
        })
        .await
    }
}
