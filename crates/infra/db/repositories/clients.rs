use anyhow::Result;
use async_trait::async_trait;
use diesel::{OptionalExtension, RunQueryDsl, prelude::*};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{entities::clients::ClientEntity, repositories::clients::ClientRepository},
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::clients},
};

pub struct ClientPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl ClientPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl ClientRepository for ClientPostgres {
    async fn find_by_id(&self, client_id: Uuid) -> Result<Option<ClientEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let client = clients::table
            .filter(clients::id.eq(client_id))
            .select(ClientEntity::as_select())
            .first::<ClientEntity>(&mut conn)
            .optional()?;

        Ok(client)
    }
}
