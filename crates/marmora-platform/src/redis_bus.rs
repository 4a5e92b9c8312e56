use anyhow::Result;
use redis::{AsyncCommands, Client};
use serde::Serialize;

/// The pub/sub channels this system announces on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    SalesApproved,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::SalesApproved => "sales.approved",
        }
    }
}

#[derive(Clone)]
pub struct RedisBus {
    client: Client,
}

impl RedisBus {
    pub fn connect(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)?;
        Ok(Self { client })
    }

    pub async fn publish_json<T: Serialize>(&self, channel: Channel, payload: &T) -> Result<()> {
        let mut connection = self.client.get_multiplexed_async_connection().await?;
        let serialized = serde_json::to_string(payload)?;
        let _: i64 = connection.publish(channel.as_str(), serialized).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_names_are_dotted_lowercase() {
        assert_eq!(Channel::SalesApproved.as_str(), "sales.approved");
    }
}
