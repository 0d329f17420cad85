//! Account lookup and registration over the `Users` table.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::container::{ContainerError, ContainerResult, Filter, RowId, TableContainer, VersionStrategy};
use crate::database::{DatabaseConnection, SqlLiteral};
use crate::schema::Schema;

pub const USERS_TABLE: &str = "Users";

const ROLE_ADMIN: i64 = 1;
const ROLE_PILOT: i64 = 0;

/// Profile of a logbook user. The password hash is kept apart and stays
/// opaque to this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub admin: bool,
}

impl User {
    pub fn new(
        username: impl Into<String>,
        firstname: impl Into<String>,
        lastname: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            firstname: firstname.into(),
            lastname: lastname.into(),
            email: email.into(),
            admin: false,
        }
    }
}

/// A [`TableContainer`] over the user accounts
pub struct UsersContainer {
    inner: TableContainer,
}

impl UsersContainer {
    pub async fn load(
        connection: Arc<dyn DatabaseConnection>,
        schema: &Schema,
        strategy: VersionStrategy,
    ) -> ContainerResult<Self> {
        let inner = TableContainer::for_table(connection, schema, USERS_TABLE, strategy).await?;
        Ok(Self { inner })
    }

    pub fn container(&self) -> &TableContainer {
        &self.inner
    }

    fn column(&self, name: &str) -> String {
        self.inner.naming().column_name(name)
    }

    fn text(&self, id: &RowId, name: &str) -> ContainerResult<String> {
        Ok(self
            .inner
            .get_column_value(id, &self.column(name))?
            .and_then(SqlLiteral::as_text)
            .unwrap_or_default())
    }

    fn row_for(&mut self, username: &str) -> ContainerResult<Option<RowId>> {
        let filter = Filter::equal(self.column("username"), username);
        self.inner.clear_filters();
        self.inner.apply_filter(filter)?;
        let id = self.inner.row_ids().into_iter().next();
        self.inner.clear_filters();
        Ok(id)
    }

    /// Look up a user by name.
    pub fn find(&mut self, username: &str) -> ContainerResult<Option<User>> {
        let Some(id) = self.row_for(username)? else {
            return Ok(None);
        };
        let role = self
            .inner
            .get_column_value(&id, &self.column("role"))?
            .and_then(SqlLiteral::as_i64)
            .unwrap_or(ROLE_PILOT);
        Ok(Some(User {
            username: username.to_string(),
            firstname: self.text(&id, "firstname")?,
            lastname: self.text(&id, "lastname")?,
            email: self.text(&id, "email")?,
            admin: role == ROLE_ADMIN,
        }))
    }

    pub fn user_exists(&mut self, username: &str) -> ContainerResult<bool> {
        Ok(self.row_for(username)?.is_some())
    }

    /// Stored password hash of `username`, if the user exists.
    pub fn password_hash(&mut self, username: &str) -> ContainerResult<Option<String>> {
        match self.row_for(username)? {
            Some(id) => Ok(Some(self.text(&id, "passwd")?)),
            None => Ok(None),
        }
    }

    fn write_profile(&mut self, id: &RowId, user: &User, password_hash: Option<&str>) -> ContainerResult<()> {
        let naming = self.inner.naming().clone();
        let col = |name: &str| naming.column_name(name);
        self.inner.set_text(id, &col("firstname"), &user.firstname)?;
        self.inner.set_text(id, &col("lastname"), &user.lastname)?;
        self.inner.set_text(id, &col("email"), &user.email)?;
        if let Some(hash) = password_hash {
            self.inner.set_text(id, &col("passwd"), hash)?;
        }
        Ok(())
    }

    /// Register a new user and commit it. The first user of an empty table
    /// becomes admin, everyone after that a regular pilot. Returns the user
    /// as stored.
    ///
    /// A failed commit discards the staged row before the error is returned.
    pub async fn create_user(&mut self, user: &User, password_hash: &str) -> ContainerResult<User> {
        self.inner.refresh().await?;
        self.inner.clear_filters();
        let first = self.inner.size() == 0;

        let (username, role_column) = (self.column("username"), self.column("role"));
        let id = self.inner.add_row();
        self.inner.set_text(&id, &username, &user.username)?;
        self.write_profile(&id, user, Some(password_hash))?;
        let role = if first { ROLE_ADMIN } else { ROLE_PILOT };
        self.inner.set_integer(&id, &role_column, role)?;

        if let Err(e) = self.inner.commit().await {
            self.inner.rollback();
            tracing::warn!(username = %user.username, error = %e, "user creation failed");
            return Err(e);
        }
        tracing::info!(username = %user.username, admin = first, "user created");
        Ok(User {
            admin: first,
            ..user.clone()
        })
    }

    /// Update the profile of an existing user, and the password hash when
    /// given. The admin flag is left alone.
    pub async fn modify_user(&mut self, user: &User, password_hash: Option<&str>) -> ContainerResult<()> {
        let id = self.row_for(&user.username)?.ok_or_else(|| {
            ContainerError::UnknownRow(RowId::Persistent(SqlLiteral::text(&user.username)))
        })?;
        self.write_profile(&id, user, password_hash)?;
        if let Err(e) = self.inner.commit().await {
            self.inner.rollback();
            return Err(e);
        }
        Ok(())
    }
}
