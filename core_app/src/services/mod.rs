pub mod storage;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait StorageService {
    /// Removes a pet picture. Deleting a missing object is not an error.
    async fn delete_pic(&self, path: &str) -> anyhow::Result<()>;
}

pub type ImplStorageService = Box<dyn StorageService>;
