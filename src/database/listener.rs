//! Change-notification interface boundary.
//!
//! Thin listen/unlisten plumbing over Postgres NOTIFY channels. One
//! channel per table, named `quarry_changes_<table>`. Publishing (trigger
//! or application side) is an external collaborator; this module only
//! carries notifications to the process.

use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tracing::debug;

use crate::error::Result;

/// A received change notification.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeNotification {
    pub table: String,
    pub payload: String,
}

/// Subscribes to per-table change channels.
pub struct TableListener {
    listener: PgListener,
}

impl TableListener {
    pub async fn connect(pool: &PgPool) -> Result<Self> {
        let listener = PgListener::connect_with(pool).await?;
        Ok(Self { listener })
    }

    fn channel_for(table: &str) -> String {
        format!("quarry_changes_{table}")
    }

    fn table_for(channel: &str) -> String {
        channel
            .strip_prefix("quarry_changes_")
            .unwrap_or(channel)
            .to_string()
    }

    pub async fn listen(&mut self, table: &str) -> Result<()> {
        let channel = Self::channel_for(table);
        debug!(channel = %channel, "listen");
        self.listener.listen(&channel).await?;
        Ok(())
    }

    pub async fn unlisten(&mut self, table: &str) -> Result<()> {
        let channel = Self::channel_for(table);
        debug!(channel = %channel, "unlisten");
        self.listener.unlisten(&channel).await?;
        Ok(())
    }

    /// Wait for the next notification on any subscribed table.
    pub async fn recv(&mut self) -> Result<ChangeNotification> {
        let notification = self.listener.recv().await?;
        Ok(ChangeNotification {
            table: Self::table_for(notification.channel()),
            payload: notification.payload().to_string(),
        })
    }
}
