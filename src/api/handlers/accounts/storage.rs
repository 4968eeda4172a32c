//! Account persistence: users, password material and the claims store.

use sqlx::{PgConnection, PgPool, Row};
use std::future::Future;
use uuid::Uuid;

use crate::api::handlers::is_unique_violation;
use crate::auth::{AuthError, Claim, ClaimType, ClaimsStore, HashedSecret};

/// Stored password material for a user.
pub(super) struct StoredCredential {
    pub password_hash: Vec<u8>,
    pub password_salt: Vec<u8>,
}

pub(super) enum InsertOutcome {
    Created(Uuid),
    Conflict,
}

pub(super) async fn insert_user(
    conn: &mut PgConnection,
    email: &str,
    hashed: &HashedSecret,
) -> Result<InsertOutcome, sqlx::Error> {
    let user_id = Uuid::new_v4();
    let query = r"
        INSERT INTO users (id, email, password_hash, password_salt)
        VALUES ($1, $2, $3, $4)
    ";
    match sqlx::query(query)
        .bind(user_id)
        .bind(email)
        .bind(hashed.hash.as_slice())
        .bind(hashed.salt.as_slice())
        .execute(conn)
        .await
    {
        Ok(_) => Ok(InsertOutcome::Created(user_id)),
        Err(err) if is_unique_violation(&err) => Ok(InsertOutcome::Conflict),
        Err(err) => Err(err),
    }
}

pub(super) async fn insert_claim(
    conn: &mut PgConnection,
    user_id: Uuid,
    claim: &Claim,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO user_claims (user_id, claim_type, claim_value) VALUES ($1, $2, $3)")
        .bind(user_id)
        .bind(claim.kind.as_str())
        .bind(&claim.value)
        .execute(conn)
        .await?;
    Ok(())
}

/// Password material lookup by normalized email.
pub(super) trait CredentialSource: Send + Sync {
    fn credential(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<Option<StoredCredential>, sqlx::Error>> + Send;
}

impl CredentialSource for PgPool {
    async fn credential(&self, email: &str) -> Result<Option<StoredCredential>, sqlx::Error> {
        lookup_credential(self, email).await
    }
}

pub(super) async fn lookup_credential(
    pool: &PgPool,
    email: &str,
) -> Result<Option<StoredCredential>, sqlx::Error> {
    let query = "SELECT password_hash, password_salt FROM users WHERE email = $1";
    let row = sqlx::query(query).bind(email).fetch_optional(pool).await?;
    Ok(row.map(|row| StoredCredential {
        password_hash: row.get("password_hash"),
        password_salt: row.get("password_salt"),
    }))
}

impl ClaimsStore for PgPool {
    async fn claims(&self, email: &str) -> Result<Vec<Claim>, AuthError> {
        let query = r"
            SELECT c.claim_type, c.claim_value
            FROM user_claims c
            JOIN users u ON u.id = c.user_id
            WHERE u.email = $1
            ORDER BY c.id
        ";
        let rows = sqlx::query(query).bind(email).fetch_all(self).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                Claim::new(
                    ClaimType::from(row.get::<String, _>("claim_type")),
                    row.get::<String, _>("claim_value"),
                )
            })
            .collect())
    }

    async fn add_claim(&self, email: &str, claim: &Claim) -> Result<bool, AuthError> {
        let query = r"
            INSERT INTO user_claims (user_id, claim_type, claim_value)
            SELECT id, $2, $3 FROM users WHERE email = $1
        ";
        let result = sqlx::query(query)
            .bind(email)
            .bind(claim.kind.as_str())
            .bind(&claim.value)
            .execute(self)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_claim(&self, email: &str, claim: &Claim) -> Result<bool, AuthError> {
        let mut tx = self.begin().await?;
        let user = sqlx::query("SELECT id FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(user) = user else {
            return Ok(false);
        };
        let user_id: Uuid = user.get("id");

        sqlx::query(
            "DELETE FROM user_claims WHERE user_id = $1 AND claim_type = $2 AND claim_value = $3",
        )
        .bind(user_id)
        .bind(claim.kind.as_str())
        .bind(&claim.value)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }
}
