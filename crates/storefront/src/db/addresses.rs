//! Saved addresses.
//!
//! At most one address per user is the default; marking one as default
//! clears the flag on the others in the same transaction.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use filamento_core::{AddressId, UserId};

use super::RepositoryError;
use crate::models::address::{Address, ValidAddressInput};

#[derive(Debug, sqlx::FromRow)]
struct AddressRow {
    id: i32,
    user_id: i32,
    label: Option<String>,
    street: String,
    number: String,
    complement: Option<String>,
    neighborhood: String,
    city: String,
    state: String,
    zip_code: String,
    is_default: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AddressRow> for Address {
    fn from(row: AddressRow) -> Self {
        Self {
            id: AddressId::new(row.id),
            user_id: UserId::new(row.user_id),
            label: row.label,
            street: row.street,
            number: row.number,
            complement: row.complement,
            neighborhood: row.neighborhood,
            city: row.city,
            state: row.state,
            zip_code: row.zip_code,
            is_default: row.is_default,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const ADDRESS_COLUMNS: &str = "id, user_id, label, street, number, complement, neighborhood, \
                               city, state, zip_code, is_default, created_at, updated_at";

/// Repository for address database operations.
pub struct AddressRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AddressRepository<'a> {
    /// Create a new address repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List a user's addresses, default first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<Address>, RepositoryError> {
        let rows = sqlx::query_as::<_, AddressRow>(&format!(
            r"
            SELECT {ADDRESS_COLUMNS}
            FROM storefront.address
            WHERE user_id = $1
            ORDER BY is_default DESC, created_at ASC
            "
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Address::from).collect())
    }

    /// Get one of a user's addresses.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        user_id: UserId,
        id: AddressId,
    ) -> Result<Option<Address>, RepositoryError> {
        let row = sqlx::query_as::<_, AddressRow>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM storefront.address WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Address::from))
    }

    /// Create an address. The first address of a user is always the default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create(
        &self,
        user_id: UserId,
        input: &ValidAddressInput,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let (existing,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM storefront.address WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&mut *tx)
                .await?;
        let is_default = input.is_default || existing == 0;
        if is_default {
            clear_default(&mut tx, user_id).await?;
        }

        let a = &input.address;
        let row = sqlx::query_as::<_, AddressRow>(&format!(
            r"
            INSERT INTO storefront.address
                (user_id, label, street, number, complement, neighborhood, city, state,
                 zip_code, is_default)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {ADDRESS_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(input.label.as_deref())
        .bind(&a.street)
        .bind(&a.number)
        .bind(a.complement.as_deref())
        .bind(&a.neighborhood)
        .bind(&a.city)
        .bind(&a.state)
        .bind(a.zip_code.as_str())
        .bind(is_default)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(row.into())
    }

    /// Replace an address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address doesn't belong to the user.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn update(
        &self,
        user_id: UserId,
        id: AddressId,
        input: &ValidAddressInput,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if input.is_default {
            clear_default(&mut tx, user_id).await?;
        }

        let a = &input.address;
        let row = sqlx::query_as::<_, AddressRow>(&format!(
            r"
            UPDATE storefront.address SET
                label = $3, street = $4, number = $5, complement = $6, neighborhood = $7,
                city = $8, state = $9, zip_code = $10,
                is_default = is_default OR $11,
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {ADDRESS_COLUMNS}
            "
        ))
        .bind(id)
        .bind(user_id)
        .bind(input.label.as_deref())
        .bind(&a.street)
        .bind(&a.number)
        .bind(a.complement.as_deref())
        .bind(&a.neighborhood)
        .bind(&a.city)
        .bind(&a.state)
        .bind(a.zip_code.as_str())
        .bind(input.is_default)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        tx.commit().await?;

        Ok(row.into())
    }

    /// Delete an address. If it was the default, the oldest remaining address
    /// becomes the default.
    ///
    /// # Returns
    ///
    /// Returns `true` if the address was deleted, `false` if it didn't exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, user_id: UserId, id: AddressId) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let deleted: Option<(bool,)> = sqlx::query_as(
            r"
            DELETE FROM storefront.address
            WHERE id = $1 AND user_id = $2
            RETURNING is_default
            ",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((was_default,)) = deleted else {
            return Ok(false);
        };

        if was_default {
            sqlx::query(
                r"
                UPDATE storefront.address SET is_default = TRUE, updated_at = NOW()
                WHERE id = (
                    SELECT id FROM storefront.address
                    WHERE user_id = $1
                    ORDER BY created_at ASC
                    LIMIT 1
                )
                ",
            )
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(true)
    }
}

async fn clear_default(
    tx: &mut Transaction<'_, Postgres>,
    user_id: UserId,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE storefront.address SET is_default = FALSE, updated_at = NOW()
        WHERE user_id = $1 AND is_default
        ",
    )
    .bind(user_id)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
