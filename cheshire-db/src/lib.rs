pub mod birthdays;
pub mod warns;

use std::{fmt::Debug, path::Path};

use cheshire_traits::ForwardRefToTracing;
use color_eyre::eyre::{Context, Result};
use serde::{Serialize, de::DeserializeOwned};
use sled::{Db, Tree};

pub use birthdays::{Birthday, BirthdayDb};
pub use warns::{Warn, WarnDb};

pub trait ReadWriteTree {
    fn typed_get<K: Serialize, V: DeserializeOwned>(&self, key: &K) -> Result<Option<V>>;

    /// Stores `value` and returns what was there before.
    fn typed_insert<K: Serialize, V: Serialize + DeserializeOwned>(
        &self,
        key: &K,
        value: &V,
    ) -> Result<Option<V>>;

    fn typed_remove<K: Serialize, V: DeserializeOwned>(&self, key: &K) -> Result<Option<V>>;

    /// Every entry whose encoded key starts with the encoded `prefix`.
    fn typed_scan_prefix<P: Serialize, K: DeserializeOwned, V: DeserializeOwned>(
        &self,
        prefix: &P,
    ) -> Result<Vec<(K, V)>>;

    /// Feeds `change` to the tree's merge operator and returns the merged value.
    fn typed_merge<K: Serialize, M: Serialize, V: DeserializeOwned>(
        &self,
        key: &K,
        change: &M,
    ) -> Result<Option<V>>;
}

impl ReadWriteTree for Tree {
    fn typed_get<K: Serialize, V: DeserializeOwned>(&self, key: &K) -> Result<Option<V>> {
        Ok(self
            .get(bincode::serialize::<K>(key)?)?
            .map(|value| bincode::deserialize::<V>(&value))
            .transpose()?)
    }

    fn typed_insert<K: Serialize, V: Serialize + DeserializeOwned>(
        &self,
        key: &K,
        value: &V,
    ) -> Result<Option<V>> {
        Ok(self
            .insert(
                bincode::serialize::<K>(key)?,
                bincode::serialize::<V>(value)?,
            )?
            .map(|value| bincode::deserialize::<V>(&value))
            .transpose()?)
    }

    fn typed_remove<K: Serialize, V: DeserializeOwned>(&self, key: &K) -> Result<Option<V>> {
        Ok(self
            .remove(bincode::serialize::<K>(key)?)?
            .map(|value| bincode::deserialize::<V>(&value))
            .transpose()?)
    }

    fn typed_scan_prefix<P: Serialize, K: DeserializeOwned, V: DeserializeOwned>(
        &self,
        prefix: &P,
    ) -> Result<Vec<(K, V)>> {
        self.scan_prefix(bincode::serialize::<P>(prefix)?)
            .map(|entry| -> Result<(K, V)> {
                let (key, value) = entry?;
                Ok((
                    bincode::deserialize::<K>(&key)?,
                    bincode::deserialize::<V>(&value)?,
                ))
            })
            .collect()
    }

    fn typed_merge<K: Serialize, M: Serialize, V: DeserializeOwned>(
        &self,
        key: &K,
        change: &M,
    ) -> Result<Option<V>> {
        Ok(self
            .merge(
                bincode::serialize::<K>(key)?,
                bincode::serialize::<M>(change)?,
            )?
            .map(|value| bincode::deserialize::<V>(&value))
            .transpose()?)
    }
}

#[derive(Debug, Clone)]
pub struct CheshireDb(Db);

impl CheshireDb {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        sled::open(path)
            .map(Self)
            .wrap_err_with(|| format!("Failed to open database at {}", path.display()))
    }

    /// An in-memory database that is thrown away on drop.
    pub fn temporary() -> Result<Self> {
        sled::Config::new()
            .temporary(true)
            .open()
            .map(Self)
            .wrap_err("Failed to open temporary database")
    }

    /// Helper for merge operators: decode the old value (or start from the
    /// default), apply `update_function`, encode the result.
    ///
    /// If anything fails to decode the old bytes are kept as they are.
    fn create_update_with_deserialization<V: DeserializeOwned + Serialize + Debug>(
        old_value: Option<&[u8]>,
        update_function: impl FnOnce(V) -> V,
        get_default_value: impl FnOnce() -> V,
    ) -> Option<Vec<u8>> {
        old_value
            .map_or_else(
                || Ok(get_default_value()),
                |v| bincode::deserialize::<V>(v).wrap_err("Failed to deserialize"),
            )
            .trace_err_ok()
            .map(update_function)
            .map(|new_value| bincode::serialize::<V>(&new_value).wrap_err("Failed to serialize"))
            .transpose()
            .trace_err_ok()
            .flatten()
            .or_else(|| old_value.map(|v| v.to_vec()))
    }

    fn open_tree(&self, name: impl AsRef<[u8]>) -> Result<Tree> {
        self.0.open_tree(name).wrap_err("Failed to open tree")
    }
}
