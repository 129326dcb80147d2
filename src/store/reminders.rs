//! Reminder repository for CRUD operations

use chrono::{DateTime, Duration, Local};

use super::DbPool;
use crate::{Error, Result};

/// A persisted reminder
#[derive(Debug, Clone)]
pub struct Reminder {
    pub id: i64,
    pub message: String,
    pub due_at: DateTime<Local>,
    pub created_at: DateTime<Local>,
    pub status: ReminderStatus,
}

/// Lifecycle state of a reminder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderStatus {
    /// Waiting for its due time (or a retry after failed delivery)
    Pending,
    /// Spoken to the user but not acknowledged
    Delivered,
    /// Acknowledged by the user
    Cleared,
}

impl ReminderStatus {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Delivered => "delivered",
            Self::Cleared => "cleared",
        }
    }

    pub(crate) fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "delivered" => Some(Self::Delivered),
            "cleared" => Some(Self::Cleared),
            _ => None,
        }
    }
}

/// Reminder repository
#[derive(Clone)]
pub struct ReminderRepo {
    pool: DbPool,
}

const COLUMNS: &str = "id, message, due_at, created_at, status";

impl ReminderRepo {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create a new pending reminder
    pub fn create(&self, message: &str, due_at: DateTime<Local>) -> Result<Reminder> {
        let conn = self.conn()?;
        let now = Local::now();

        conn.execute(
            "INSERT INTO reminders (message, due_at, created_at, status)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                message,
                due_at.to_rfc3339(),
                now.to_rfc3339(),
                ReminderStatus::Pending.as_str()
            ],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(Reminder {
            id: conn.last_insert_rowid(),
            message: message.to_string(),
            due_at,
            created_at: now,
            status: ReminderStatus::Pending,
        })
    }

    /// Get a reminder by id
    pub fn get(&self, id: i64) -> Result<Option<Reminder>> {
        let conn = self.conn()?;
        let reminder = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM reminders WHERE id = ?1"),
                [id],
                row_to_reminder,
            )
            .ok();
        Ok(reminder)
    }

    /// List reminders, optionally filtered by status, ordered by due time
    pub fn list(&self, status: Option<ReminderStatus>) -> Result<Vec<Reminder>> {
        let conn = self.conn()?;
        let mut stmt;
        let rows = if let Some(status) = status {
            stmt = conn
                .prepare(&format!(
                    "SELECT {COLUMNS} FROM reminders WHERE status = ?1 ORDER BY due_at"
                ))
                .map_err(|e| Error::Database(e.to_string()))?;
            stmt.query_map([status.as_str()], row_to_reminder)
                .map_err(|e| Error::Database(e.to_string()))?
                .filter_map(std::result::Result::ok)
                .collect()
        } else {
            stmt = conn
                .prepare(&format!("SELECT {COLUMNS} FROM reminders ORDER BY due_at"))
                .map_err(|e| Error::Database(e.to_string()))?;
            stmt.query_map([], row_to_reminder)
                .map_err(|e| Error::Database(e.to_string()))?
                .filter_map(std::result::Result::ok)
                .collect()
        };
        Ok(rows)
    }

    /// Pending reminders whose due time has passed, earliest first
    ///
    /// The comparison runs on parsed timestamps, not the stored strings,
    /// so offset changes never affect ordering.
    pub fn due(&self, now: DateTime<Local>) -> Result<Vec<Reminder>> {
        let mut pending = self.list(Some(ReminderStatus::Pending))?;
        pending.retain(|r| r.due_at <= now);
        pending.sort_by_key(|r| r.due_at);
        Ok(pending)
    }

    /// Earliest due time among pending reminders, if any
    pub fn next_pending_time(&self) -> Result<Option<DateTime<Local>>> {
        let pending = self.list(Some(ReminderStatus::Pending))?;
        Ok(pending.into_iter().map(|r| r.due_at).min())
    }

    /// Update message, due time, and/or status; returns the updated row
    pub fn update(
        &self,
        id: i64,
        message: Option<&str>,
        due_at: Option<DateTime<Local>>,
        status: Option<ReminderStatus>,
    ) -> Result<Option<Reminder>> {
        {
            let conn = self.conn()?;
            let mut updates = Vec::new();
            let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

            if let Some(message) = message {
                updates.push("message = ?");
                params.push(Box::new(message.to_string()));
            }
            if let Some(due_at) = due_at {
                updates.push("due_at = ?");
                params.push(Box::new(due_at.to_rfc3339()));
            }
            if let Some(status) = status {
                updates.push("status = ?");
                params.push(Box::new(status.as_str()));
            }

            if !updates.is_empty() {
                params.push(Box::new(id));
                let query = format!(
                    "UPDATE reminders SET {} WHERE id = ?{}",
                    updates
                        .iter()
                        .enumerate()
                        .map(|(i, u)| u.replace('?', &format!("?{}", i + 1)))
                        .collect::<Vec<_>>()
                        .join(", "),
                    params.len()
                );
                conn.execute(&query, rusqlite::params_from_iter(params.iter()))
                    .map_err(|e| Error::Database(e.to_string()))?;
            }
        }

        self.get(id)
    }

    /// Delete a reminder; returns whether a row was removed
    pub fn delete(&self, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let affected = conn
            .execute("DELETE FROM reminders WHERE id = ?1", [id])
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(affected > 0)
    }

    /// Mark a reminder as acknowledged
    pub fn clear(&self, id: i64) -> Result<Option<Reminder>> {
        self.update(id, None, None, Some(ReminderStatus::Cleared))
    }

    /// Push a reminder's due time out by `minutes`, keeping it pending
    pub fn snooze(&self, id: i64, minutes: i64) -> Result<Option<Reminder>> {
        let due = Local::now() + Duration::minutes(minutes);
        self.update(id, None, Some(due), Some(ReminderStatus::Pending))
    }
}

impl ReminderRepo {
    fn conn(&self) -> Result<super::DbConn> {
        self.pool.get().map_err(|e| Error::Database(e.to_string()))
    }
}

fn row_to_reminder(row: &rusqlite::Row<'_>) -> rusqlite::Result<Reminder> {
    let status_text: String = row.get(4)?;
    Ok(Reminder {
        id: row.get(0)?,
        message: row.get(1)?,
        due_at: parse_datetime(&row.get::<_, String>(2)?),
        created_at: parse_datetime(&row.get::<_, String>(3)?),
        status: ReminderStatus::from_str(&status_text).unwrap_or(ReminderStatus::Pending),
    })
}

fn parse_datetime(s: &str) -> DateTime<Local> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Local))
        .unwrap_or_else(|_| Local::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::init_memory;
    use chrono::TimeZone;

    fn repo() -> ReminderRepo {
        ReminderRepo::new(init_memory().unwrap())
    }

    fn in_minutes(minutes: i64) -> DateTime<Local> {
        Local::now() + Duration::minutes(minutes)
    }

    #[test]
    fn test_create_and_get_roundtrip() {
        let repo = repo();
        let due = Local
            .with_ymd_and_hms(2026, 9, 1, 15, 30, 45)
            .unwrap()
            + Duration::milliseconds(250);

        let created = repo.create("take out the trash", due).unwrap();
        let fetched = repo.get(created.id).unwrap().unwrap();

        assert_eq!(fetched.message, "take out the trash");
        assert_eq!(fetched.status, ReminderStatus::Pending);
        // Sub-second precision survives the round trip
        assert_eq!(fetched.due_at, due);
    }

    #[test]
    fn test_get_missing_is_none() {
        assert!(repo().get(999).unwrap().is_none());
    }

    #[test]
    fn test_due_filters_and_orders() {
        let repo = repo();
        let overdue_late = repo.create("late", in_minutes(-5)).unwrap();
        let overdue_early = repo.create("early", in_minutes(-60)).unwrap();
        repo.create("future", in_minutes(60)).unwrap();

        let due = repo.due(Local::now()).unwrap();
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].id, overdue_early.id);
        assert_eq!(due[1].id, overdue_late.id);
    }

    #[test]
    fn test_next_pending_ignores_non_pending() {
        let repo = repo();
        let soon = repo.create("soon", in_minutes(5)).unwrap();
        let cleared = repo.create("cleared", in_minutes(1)).unwrap();
        repo.clear(cleared.id).unwrap();

        let next = repo.next_pending_time().unwrap().unwrap();
        assert_eq!(next, soon.due_at);
    }

    #[test]
    fn test_next_pending_empty_is_none() {
        assert!(repo().next_pending_time().unwrap().is_none());
    }

    #[test]
    fn test_snooze_pushes_due_and_keeps_pending() {
        let repo = repo();
        let reminder = repo.create("call mom", in_minutes(-10)).unwrap();

        let snoozed = repo.snooze(reminder.id, 30).unwrap().unwrap();
        assert_eq!(snoozed.status, ReminderStatus::Pending);
        assert!(snoozed.due_at > Local::now() + Duration::minutes(29));
        assert!(repo.due(Local::now()).unwrap().is_empty());
    }

    #[test]
    fn test_update_message_only() {
        let repo = repo();
        let reminder = repo.create("old text", in_minutes(10)).unwrap();

        let updated = repo
            .update(reminder.id, Some("new text"), None, None)
            .unwrap()
            .unwrap();
        assert_eq!(updated.message, "new text");
        assert_eq!(updated.due_at, reminder.due_at);
    }

    #[test]
    fn test_delete() {
        let repo = repo();
        let reminder = repo.create("gone", in_minutes(10)).unwrap();
        assert!(repo.delete(reminder.id).unwrap());
        assert!(!repo.delete(reminder.id).unwrap());
    }

    #[test]
    fn test_list_by_status() {
        let repo = repo();
        let a = repo.create("a", in_minutes(1)).unwrap();
        repo.create("b", in_minutes(2)).unwrap();
        repo.clear(a.id).unwrap();

        assert_eq!(repo.list(Some(ReminderStatus::Pending)).unwrap().len(), 1);
        assert_eq!(repo.list(Some(ReminderStatus::Cleared)).unwrap().len(), 1);
        assert_eq!(repo.list(None).unwrap().len(), 2);
    }
}
