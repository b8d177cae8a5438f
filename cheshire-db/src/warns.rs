use crate::{CheshireDb, ReadWriteTree};
use color_eyre::eyre::Result;
use serde::{Deserialize, Serialize};
use sled::Tree;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Warn {
    pub reason: String,
    /// User id of the moderator who issued the warning.
    pub actor: u64,
}

/// Warnings per `(guild_id, user_id)`, oldest first.
pub struct WarnDb(Tree);

impl WarnDb {
    pub fn new(db: &CheshireDb) -> Result<Self> {
        let tree = db.open_tree("warns")?;

        fn append(_key: &[u8], old_value: Option<&[u8]>, merged_bytes: &[u8]) -> Option<Vec<u8>> {
            CheshireDb::create_update_with_deserialization::<Vec<Warn>>(
                old_value,
                |mut warns| {
                    let Ok(warn) = bincode::deserialize::<Warn>(merged_bytes) else {
                        tracing::error!("Failed to deserialize warn, {:?}", merged_bytes);
                        return warns;
                    };

                    warns.push(warn);
                    warns
                },
                Vec::new,
            )
        }

        tree.set_merge_operator(append);

        Ok(WarnDb(tree))
    }

    /// Stores a warning and returns how many the user now has.
    pub fn add(&self, guild_id: u64, user_id: u64, warn: &Warn) -> Result<usize> {
        let warns = self
            .0
            .typed_merge::<(u64, u64), Warn, Vec<Warn>>(&(guild_id, user_id), warn)?;

        Ok(warns.map_or(0, |warns| warns.len()))
    }

    pub fn get(&self, guild_id: u64, user_id: u64) -> Result<Vec<Warn>> {
        Ok(self
            .0
            .typed_get::<(u64, u64), Vec<Warn>>(&(guild_id, user_id))?
            .unwrap_or_default())
    }

    /// Drops every warning for the user and returns how many there were.
    pub fn clear(&self, guild_id: u64, user_id: u64) -> Result<usize> {
        Ok(self
            .0
            .typed_remove::<(u64, u64), Vec<Warn>>(&(guild_id, user_id))?
            .map_or(0, |warns| warns.len()))
    }
}
