use super::{parse_timestamp, timestamp, Database};
use crate::error::{HubError, Result};
use crate::types::{LocaleAssignment, User};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

const USER_COLUMNS: &str =
    "id, username, email, password_hash, is_superuser, is_active, date_joined";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let date_joined: String = row.get(6)?;
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        is_superuser: row.get(4)?,
        is_active: row.get(5)?,
        date_joined: parse_timestamp(6, &date_joined)?,
    })
}

fn assignment_from_row(row: &Row<'_>) -> rusqlite::Result<LocaleAssignment> {
    let created_at: String = row.get(5)?;
    Ok(LocaleAssignment {
        id: row.get(0)?,
        user_id: row.get(1)?,
        locale_id: row.get(2)?,
        username: row.get(3)?,
        locale_code: row.get(4)?,
        created_at: parse_timestamp(5, &created_at)?,
    })
}

impl Database {
    pub fn create_user(
        &self,
        username: &str,
        email: &str,
        is_superuser: bool,
        password_hash: Option<&str>,
    ) -> Result<User> {
        if self.get_user_by_username(username)?.is_some() {
            return Err(HubError::Validation(format!(
                "a user named '{username}' already exists"
            )));
        }
        let date_joined = Utc::now();
        self.conn.execute(
            "INSERT INTO users
                (username, email, password_hash, is_superuser, is_active, date_joined)
             VALUES (?1, ?2, ?3, ?4, 1, ?5)",
            params![username, email, password_hash, is_superuser, timestamp(&date_joined)],
        )?;
        Ok(User {
            id: self.conn.last_insert_rowid(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: password_hash.map(str::to_string),
            is_superuser,
            is_active: true,
            date_joined,
        })
    }

    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
        Ok(self.conn.query_row(&sql, params![id], user_from_row).optional()?)
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![username], user_from_row)
            .optional()?)
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY username");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], user_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn set_password_hash(&self, user_id: i64, password_hash: &str) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE users SET password_hash = ?2 WHERE id = ?1",
            params![user_id, password_hash],
        )?;
        if changed == 0 {
            return Err(HubError::NotFound(format!("user {user_id}")));
        }
        Ok(())
    }

    pub fn set_user_active(&self, user_id: i64, active: bool) -> Result<()> {
        self.conn.execute(
            "UPDATE users SET is_active = ?2 WHERE id = ?1",
            params![user_id, active],
        )?;
        Ok(())
    }

    /// Get-or-create a group by name.
    pub fn ensure_group(&self, name: &str) -> Result<i64> {
        self.conn.execute(
            "INSERT OR IGNORE INTO groups (name) VALUES (?1)",
            params![name],
        )?;
        Ok(self
            .conn
            .query_row("SELECT id FROM groups WHERE name = ?1", params![name], |row| {
                row.get(0)
            })?)
    }

    pub fn group_id(&self, name: &str) -> Result<Option<i64>> {
        Ok(self
            .conn
            .query_row("SELECT id FROM groups WHERE name = ?1", params![name], |row| {
                row.get(0)
            })
            .optional()?)
    }

    pub fn add_user_to_group(&self, user_id: i64, group: &str) -> Result<()> {
        let group_id = self.ensure_group(group)?;
        self.conn.execute(
            "INSERT OR IGNORE INTO user_groups (user_id, group_id) VALUES (?1, ?2)",
            params![user_id, group_id],
        )?;
        Ok(())
    }

    /// Group names the user belongs to, sorted.
    pub fn user_groups(&self, user_id: i64) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT g.name FROM groups g
             JOIN user_groups ug ON ug.group_id = g.id
             WHERE ug.user_id = ?1
             ORDER BY g.name",
        )?;
        let rows = stmt.query_map(params![user_id], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<String>>>()?)
    }

    /// Assign a reviewer to a locale. Assigning twice is a no-op.
    pub fn assign_locale(&self, user_id: i64, locale_id: i64) -> Result<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO locale_assignments (user_id, locale_id, created_at)
             VALUES (?1, ?2, ?3)",
            params![user_id, locale_id, timestamp(&Utc::now())],
        )?;
        Ok(inserted > 0)
    }

    pub fn assigned_locale_ids(&self, user_id: i64) -> Result<Vec<i64>> {
        let mut stmt = self.conn.prepare(
            "SELECT locale_id FROM locale_assignments WHERE user_id = ?1 ORDER BY locale_id",
        )?;
        let rows = stmt.query_map(params![user_id], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<i64>>>()?)
    }

    /// Assignments ordered by username then locale code.
    pub fn list_assignments(&self) -> Result<Vec<LocaleAssignment>> {
        let mut stmt = self.conn.prepare(
            "SELECT a.id, a.user_id, a.locale_id, u.username, l.code, a.created_at
             FROM locale_assignments a
             JOIN users u ON u.id = a.user_id
             JOIN locales l ON l.id = a.locale_id
             ORDER BY u.username, l.code",
        )?;
        let rows = stmt.query_map([], assignment_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}
