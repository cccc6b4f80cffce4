//! Get trait for fetching single entities.

use async_trait::async_trait;

use crate::client::TioClient;
use crate::error::Result;

/// Fetch a single entity by ID.
///
/// # Example
///
/// ```ignore
/// use tioapi::{Asset, Get, TioClient};
///
/// let client = TioClient::from_env()?;
/// let asset = Asset::get(&client, "0b7c1b5e-5e1c-4a0b-9b0a-6f2f5a3c9d11".to_string()).await?;
/// ```
#[async_trait]
pub trait Get: Sized {
    /// The ID type for this entity (a UUID string for assets).
    type Id;

    /// Fetch the entity by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not found or the request fails.
    async fn get(client: &TioClient, id: Self::Id) -> Result<Self>;
}
