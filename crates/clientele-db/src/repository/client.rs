//! SurrealDB implementation of [`ClientRepository`].
//!
//! Every statement filters on `tenant_id` as well as the record key, so
//! a client id from another tenant behaves exactly like an unknown id.

use chrono::{DateTime, NaiveDate, Utc};
use clientele_core::error::CoreResult;
use clientele_core::models::client::{Client, ClientDetails};
use clientele_core::repository::{ClientRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct ClientRow {
    tenant_id: String,
    title: String,
    first_name: String,
    last_name: String,
    email: String,
    phone: String,
    date_of_birth: Option<String>,
    street: Option<String>,
    suburb: Option<String>,
    state: Option<String>,
    post_code: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct ClientRowWithId {
    record_id: String,
    tenant_id: String,
    title: String,
    first_name: String,
    last_name: String,
    email: String,
    phone: String,
    date_of_birth: Option<String>,
    street: Option<String>,
    suburb: Option<String>,
    state: Option<String>,
    post_code: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ClientRow {
    fn into_client(self, id: Uuid) -> Result<Client, DbError> {
        let tenant_id =
            Uuid::parse_str(&self.tenant_id).map_err(|e| DbError::corrupt("client", e))?;
        let date_of_birth = self
            .date_of_birth
            .map(|d| d.parse::<NaiveDate>())
            .transpose()
            .map_err(|e| DbError::corrupt("client", e))?;
        Ok(Client {
            id,
            tenant_id,
            details: ClientDetails {
                title: self.title,
                first_name: self.first_name,
                last_name: self.last_name,
                email: self.email,
                phone: self.phone,
                date_of_birth,
                street: self.street,
                suburb: self.suburb,
                state: self.state,
                post_code: self.post_code,
            },
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl ClientRowWithId {
    fn try_into_client(self) -> Result<Client, DbError> {
        let id = Uuid::parse_str(&self.record_id).map_err(|e| DbError::corrupt("client", e))?;
        ClientRow {
            tenant_id: self.tenant_id,
            title: self.title,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone: self.phone,
            date_of_birth: self.date_of_birth,
            street: self.street,
            suburb: self.suburb,
            state: self.state,
            post_code: self.post_code,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .into_client(id)
    }
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

const DETAIL_ASSIGNMENTS: &str = "title = $title, \
     first_name = $first_name, \
     last_name = $last_name, \
     email = $email, \
     phone = $phone, \
     date_of_birth = $date_of_birth, \
     street = $street, \
     suburb = $suburb, \
     state = $state, \
     post_code = $post_code";

fn not_found(id: Uuid) -> DbError {
    DbError::NotFound {
        entity: "client".into(),
        id: id.to_string(),
    }
}

/// SurrealDB implementation of the Client repository.
#[derive(Clone)]
pub struct SurrealClientRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealClientRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    /// Run a `CREATE`/`UPDATE` that assigns every detail field and
    /// returns the resulting row, if any.
    async fn write_details(
        &self,
        statement: String,
        tenant_id: Uuid,
        id: Uuid,
        details: ClientDetails,
    ) -> Result<Option<Client>, DbError> {
        let result = self
            .db
            .query(statement)
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("title", details.title))
            .bind(("first_name", details.first_name))
            .bind(("last_name", details.last_name))
            .bind(("email", details.email))
            .bind(("phone", details.phone))
            .bind(("date_of_birth", details.date_of_birth.map(|d| d.to_string())))
            .bind(("street", details.street))
            .bind(("suburb", details.suburb))
            .bind(("state", details.state))
            .bind(("post_code", details.post_code))
            .await?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("client", e))?;

        let rows: Vec<ClientRow> = result.take(0)?;
        rows.into_iter()
            .next()
            .map(|row| row.into_client(id))
            .transpose()
    }
}

impl<C: Connection> ClientRepository for SurrealClientRepository<C> {
    async fn create(&self, tenant_id: Uuid, details: ClientDetails) -> CoreResult<Client> {
        let id = Uuid::new_v4();
        let statement = format!(
            "CREATE type::record('client', $id) SET tenant_id = $tenant_id, {DETAIL_ASSIGNMENTS}"
        );
        let client = self
            .write_details(statement, tenant_id, id, details)
            .await?
            .ok_or_else(|| not_found(id))?;

        tracing::debug!(client_id = %id, %tenant_id, "client created");
        Ok(client)
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> CoreResult<Client> {
        let mut result = self
            .db
            .query(
                "SELECT * FROM type::record('client', $id) \
                 WHERE tenant_id = $tenant_id",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ClientRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| not_found(id))?;
        Ok(row.into_client(id)?)
    }

    async fn update(&self, tenant_id: Uuid, id: Uuid, details: ClientDetails) -> CoreResult<Client> {
        let statement = format!(
            "UPDATE type::record('client', $id) SET {DETAIL_ASSIGNMENTS}, \
             updated_at = time::now() \
             WHERE tenant_id = $tenant_id"
        );
        Ok(self
            .write_details(statement, tenant_id, id, details)
            .await?
            .ok_or_else(|| not_found(id))?)
    }

    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> CoreResult<()> {
        let result = self
            .db
            .query(
                "DELETE type::record('client', $id) \
                 WHERE tenant_id = $tenant_id \
                 RETURN BEFORE",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("client", e))?;

        let rows: Vec<ClientRow> = result.take(0).map_err(DbError::from)?;
        if rows.is_empty() {
            return Err(not_found(id).into());
        }
        Ok(())
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> CoreResult<PaginatedResult<Client>> {
        let tenant_id_str = tenant_id.to_string();

        let mut count_result = self
            .db
            .query(
                "SELECT count() AS total FROM client \
                 WHERE tenant_id = $tenant_id GROUP ALL",
            )
            .bind(("tenant_id", tenant_id_str.clone()))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM client \
                 WHERE tenant_id = $tenant_id \
                 ORDER BY last_name ASC, first_name ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("tenant_id", tenant_id_str))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ClientRowWithId> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(ClientRowWithId::try_into_client)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
