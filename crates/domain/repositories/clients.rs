use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::clients::ClientEntity;

#[async_trait]
#[automock]
pub trait ClientRepository {
    async fn find_by_id(&self, client_id: Uuid) -> Result<Option<ClientEntity>>;
}
