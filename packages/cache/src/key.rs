//! Epoch-scoped cache keys.
//!
//! A key embeds the owning workspace's `cacheEpoch`; bumping the epoch
//! logically invalidates every prior entry for that workspace without
//! touching storage.

/// Build a key of the form `"<prefix>:<workspace_id>:v<epoch>"`.
pub fn build(prefix: &str, workspace_id: &str, epoch: u64) -> String {
    format!("{prefix}:{workspace_id}:v{epoch}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_embed_prefix_workspace_and_epoch() {
        assert_eq!(build("permissions", "ws-1", 3), "permissions:ws-1:v3");
    }

    #[test]
    fn different_epochs_produce_different_keys() {
        assert_ne!(build("permissions", "ws-1", 1), build("permissions", "ws-1", 2));
    }
}
