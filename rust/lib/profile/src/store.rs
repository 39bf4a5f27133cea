use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, OnceLock, PoisonError};

use atlas_sql::SqliteStore;
use tracing::{debug, info, warn};

use crate::cache::{CacheEntry, ValueCache};
use crate::config::ProfileConfig;
use crate::error::ProfileError;
use crate::notify::{ChangeNotifier, ProfileEvent, SubscriptionId};
use crate::properties::{PropertyDef, PROPERTIES};
use crate::table::PropertyTable;
use crate::value::{PropertyType, PropertyValue};

static GLOBAL: OnceLock<PropertyStore> = OnceLock::new();
static GLOBAL_INIT: Mutex<()> = Mutex::new(());

/// Typed, cached, persistent property store.
///
/// - Reads go through the [`ValueCache`]; a miss loads the row from the
///   config database and caches the result, including "no value".
/// - `set` updates the cache first, then optionally persists, then notifies.
/// - `remove` deletes the row, evicts the cache entry, then notifies.
///
/// The store owns three database handles (config, QC, data). Only the config
/// database backs properties; the other two are handed out to subsystems
/// that run their own queries.
pub struct PropertyStore {
    config_db: SqliteStore,
    qc_db: SqliteStore,
    data_db: SqliteStore,
    cache: ValueCache,
    notifier: ChangeNotifier,
    registry: BTreeMap<&'static str, &'static PropertyDef>,
    /// Serializes cache + row updates of mutating calls.
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for PropertyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyStore").finish_non_exhaustive()
    }
}

impl PropertyStore {
    /// Open all three databases described by `config`. The three must
    /// resolve to different files.
    pub fn open(config: &ProfileConfig) -> Result<Self, ProfileError> {
        config.validate()?;
        let wal = config.storage.wal;
        let config_path = config.resolve_config_db();
        let config_db = SqliteStore::open_with(&config_path, wal)?;
        let qc_db = SqliteStore::open_with(&config.resolve_qc_db(), wal)?;
        let data_db = SqliteStore::open_with(&config.resolve_data_db(), wal)?;
        let store = Self::from_handles(config_db, qc_db, data_db)?;
        info!(
            config_db = %config_path.display(),
            properties = store.registry.len(),
            "property store opened"
        );
        Ok(store)
    }

    /// Open a store whose config database is `path`, with the QC and data
    /// databases placed next to it.
    pub fn open_file(path: &Path) -> Result<Self, ProfileError> {
        Self::open(&ProfileConfig::for_config_file(path))
    }

    /// A store backed by three private in-memory databases.
    pub fn open_in_memory() -> Result<Self, ProfileError> {
        Self::from_handles(
            SqliteStore::open_in_memory()?,
            SqliteStore::open_in_memory()?,
            SqliteStore::open_in_memory()?,
        )
    }

    /// Assemble a store from already opened handles and create the property
    /// table in `config_db`.
    pub fn from_handles(
        config_db: SqliteStore,
        qc_db: SqliteStore,
        data_db: SqliteStore,
    ) -> Result<Self, ProfileError> {
        PropertyTable::new(&config_db).init_schema()?;
        let registry = PROPERTIES.iter().map(|def| (def.key, def)).collect();
        Ok(Self {
            config_db,
            qc_db,
            data_db,
            cache: ValueCache::new(),
            notifier: ChangeNotifier::new(),
            registry,
            write_lock: Mutex::new(()),
        })
    }

    /// The process-wide store, opened from the environment on first access
    /// (see [`ProfileConfig::from_env`]).
    pub fn global() -> Result<&'static PropertyStore, ProfileError> {
        if let Some(store) = GLOBAL.get() {
            return Ok(store);
        }
        let _guard = GLOBAL_INIT.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(store) = GLOBAL.get() {
            return Ok(store);
        }
        let store = Self::open(&ProfileConfig::from_env()?)?;
        Ok(GLOBAL.get_or_init(|| store))
    }

    /// Make `store` the process-wide store. Fails if one already exists.
    pub fn install_global(store: PropertyStore) -> Result<&'static PropertyStore, ProfileError> {
        let _guard = GLOBAL_INIT.lock().unwrap_or_else(PoisonError::into_inner);
        if GLOBAL.get().is_some() {
            return Err(ProfileError::AlreadyInitialized);
        }
        Ok(GLOBAL.get_or_init(|| store))
    }

    fn table(&self) -> PropertyTable<'_> {
        PropertyTable::new(&self.config_db)
    }

    // ── Reads ──

    /// Untyped read. `Ok(None)` means the key has no stored value.
    pub fn value(&self, key: &str) -> Result<Option<PropertyValue>, ProfileError> {
        if let Some(entry) = self.cache.lookup(key) {
            return Ok(entry.into_value());
        }

        // Misses load under the write lock so a concurrent set/remove cannot
        // land between the row read and the cache fill.
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = self.cache.lookup(key) {
            return Ok(entry.into_value());
        }

        debug!(key, "property cache miss");
        let loaded = match self.table().read(key)? {
            Some(raw) => Some(PropertyValue::decode(&raw).map_err(|e| ProfileError::Corrupt {
                key: key.to_string(),
                reason: e.to_string(),
            })?),
            None => None,
        };

        match &loaded {
            Some(value) => self.cache.store(key, value.clone()),
            None => self.cache.store_absent(key),
        }
        Ok(loaded)
    }

    /// Typed read falling back to `default` when the key has no value.
    ///
    /// The default is neither cached nor persisted.
    pub fn get<T: PropertyType>(&self, key: &str, default: T) -> Result<T, ProfileError> {
        Ok(self.get_opt(key)?.unwrap_or(default))
    }

    /// Typed read without a default.
    pub fn get_opt<T: PropertyType>(&self, key: &str) -> Result<Option<T>, ProfileError> {
        self.value(key)?
            .map(|value| materialize(key, &value))
            .transpose()
    }

    /// Resolve `key`, then `fallback_key`, then `default`.
    pub fn get_with_fallback<T: PropertyType>(
        &self,
        key: &str,
        fallback_key: &str,
        default: T,
    ) -> Result<T, ProfileError> {
        if let Some(value) = self.get_opt(key)? {
            return Ok(value);
        }
        self.get(fallback_key, default)
    }

    /// Typed read that never fails: errors are logged and `default` is
    /// returned in their place.
    pub fn get_or_default<T: PropertyType>(&self, key: &str, default: T) -> T {
        match self.get(key, default.clone()) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "property read failed, using default");
                default
            }
        }
    }

    pub fn contains(&self, key: &str) -> Result<bool, ProfileError> {
        Ok(self.value(key)?.is_some())
    }

    /// Every key stored in the config database, in lexicographic order.
    pub fn keys(&self) -> Result<Vec<String>, ProfileError> {
        Ok(self.table().keys()?)
    }

    /// RFC 3339 time of the last persisted write of `key`, or `None` when
    /// no row exists. Cache-only values have no timestamp.
    pub fn updated_at(&self, key: &str) -> Result<Option<String>, ProfileError> {
        Ok(self.table().updated_at(key)?)
    }

    // ── Writes ──

    /// Set `key` to `value`.
    ///
    /// The cache is updated unconditionally. With `persist` the row is
    /// upserted as well; a failed write is returned as an error but leaves
    /// the cached value in place. A `ValueChanged` event is published in
    /// every case.
    ///
    /// Declared properties only accept values of their declared kind.
    pub fn set(
        &self,
        key: &str,
        value: impl Into<PropertyValue>,
        persist: bool,
    ) -> Result<(), ProfileError> {
        let value = value.into();
        if let Some(def) = self.registry.get(key) {
            if def.kind != value.kind() {
                return Err(ProfileError::TypeMismatch {
                    key: key.to_string(),
                    expected: def.kind,
                    found: value.kind(),
                });
            }
        }

        let (result, seq) = {
            let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.cache.store(key, value.clone());
            let result = if persist {
                self.persist(key, &value)
            } else {
                Ok(())
            };
            let seq = self.notifier.enqueue(ProfileEvent::ValueChanged {
                key: key.to_string(),
                value,
                persisted: persist && result.is_ok(),
            });
            (result, seq)
        };

        if let Err(e) = &result {
            warn!(key, error = %e, "property kept in cache only, persisting failed");
        } else {
            debug!(key, persist, "property set");
        }

        self.notifier.dispatch(seq);
        result
    }

    fn persist(&self, key: &str, value: &PropertyValue) -> Result<(), ProfileError> {
        let raw = value.encode().map_err(|e| ProfileError::Corrupt {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        self.table().write(key, &raw)?;
        Ok(())
    }

    /// Delete `key` from the database and the cache, then publish
    /// `KeyRemoved`. Removing a key that does not exist is not an error.
    ///
    /// If the delete fails nothing is changed and no event is published.
    pub fn remove(&self, key: &str) -> Result<(), ProfileError> {
        let seq = {
            let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
            let existed = self.table().delete(key)?;
            self.cache.evict(key);
            debug!(key, existed, "property removed");
            self.notifier.enqueue(ProfileEvent::KeyRemoved {
                key: key.to_string(),
            })
        };
        self.notifier.dispatch(seq);
        Ok(())
    }

    // ── Notification ──

    /// Register a listener for `ValueChanged` and `KeyRemoved` events.
    ///
    /// Listeners run synchronously inside `set`/`remove`, in the order the
    /// mutations took effect. A listener that writes the key it was notified
    /// about triggers another event for it; that nested event is delivered
    /// after the current one, before the outer call returns.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&ProfileEvent) + Send + Sync + 'static,
    {
        self.notifier.subscribe(handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe(id)
    }

    // ── Database handles ──

    pub fn config_database(&self) -> &SqliteStore {
        &self.config_db
    }

    pub fn qc_database(&self) -> &SqliteStore {
        &self.qc_db
    }

    pub fn data_database(&self) -> &SqliteStore {
        &self.data_db
    }

    // ── Declared properties ──

    /// All declared properties, ordered by key.
    pub fn definitions(&self) -> impl Iterator<Item = &'static PropertyDef> + '_ {
        self.registry.values().copied()
    }

    pub fn definition(&self, key: &str) -> Option<&'static PropertyDef> {
        self.registry.get(key).copied()
    }
}

fn materialize<T: PropertyType>(key: &str, value: &PropertyValue) -> Result<T, ProfileError> {
    T::from_value(value).ok_or_else(|| ProfileError::TypeMismatch {
        key: key.to_string(),
        expected: T::KIND,
        found: value.kind(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Color;
    use atlas_sql::SQLStore;
    use std::sync::Arc;

    fn store() -> PropertyStore {
        PropertyStore::open_in_memory().unwrap()
    }

    fn recorder(store: &PropertyStore) -> Arc<Mutex<Vec<ProfileEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        store.subscribe(move |e| sink.lock().unwrap().push(e.clone()));
        events
    }

    // ========================================================================
    // Reads and defaults
    // ========================================================================

    #[test]
    fn unset_key_returns_any_default() {
        let store = store();
        assert_eq!(store.get("nothing", "a".to_string()).unwrap(), "a");
        assert_eq!(store.get("nothing", "b".to_string()).unwrap(), "b");
        assert_eq!(store.get("nothing", 7i64).unwrap(), 7);
        assert!(!store.get("nothing", false).unwrap());
    }

    #[test]
    fn default_is_not_persisted() {
        let store = store();
        store.get("k", "x".to_string()).unwrap();
        assert!(store.keys().unwrap().is_empty());
        assert!(!store.contains("k").unwrap());
    }

    #[test]
    fn set_then_get() {
        let store = store();
        store.set("qc_sample_prefix", "QX", true).unwrap();
        assert_eq!(
            store.get("qc_sample_prefix", String::new()).unwrap(),
            "QX"
        );
        assert_eq!(store.keys().unwrap(), vec!["qc_sample_prefix"]);
    }

    #[test]
    fn get_opt_distinguishes_missing() {
        let store = store();
        assert_eq!(store.get_opt::<i64>("n").unwrap(), None);
        store.set("n", 3i64, true).unwrap();
        assert_eq!(store.get_opt::<i64>("n").unwrap(), Some(3));
    }

    #[test]
    fn keys_are_case_sensitive() {
        let store = store();
        store.set("Key", 1i64, true).unwrap();
        assert_eq!(store.get("key", 0i64).unwrap(), 0);
        assert_eq!(store.get("Key", 0i64).unwrap(), 1);
    }

    // ========================================================================
    // Type mismatch
    // ========================================================================

    #[test]
    fn color_read_as_string_is_mismatch() {
        let store = store();
        store.set("custom.color", Color::RED, true).unwrap();
        let err = store.get("custom.color", String::new()).unwrap_err();
        match err {
            ProfileError::TypeMismatch { key, expected, found } => {
                assert_eq!(key, "custom.color");
                assert_eq!(expected, crate::ValueKind::Text);
                assert_eq!(found, crate::ValueKind::Color);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn mismatch_falls_back_in_lenient_read() {
        let store = store();
        store.set("custom.flag", 1i64, true).unwrap();
        assert!(store.get_or_default("custom.flag", true));
    }

    #[test]
    fn declared_property_rejects_wrong_kind() {
        let store = store();
        let err = store.set("max_qc_file", "ten", true).unwrap_err();
        assert!(err.is_type_mismatch());
        assert_eq!(store.get_opt::<i64>("max_qc_file").unwrap(), None);
    }

    #[test]
    fn corrupt_row_is_reported() {
        let store = store();
        store
            .config_database()
            .exec(
                "INSERT INTO profile (key, value, updated_at) VALUES ('bad', 'not json', '')",
                &[],
            )
            .unwrap();
        let err = store.get("bad", String::new()).unwrap_err();
        assert!(matches!(err, ProfileError::Corrupt { .. }));
    }

    // ========================================================================
    // Fallback
    // ========================================================================

    #[test]
    fn fallback_uses_primary_when_set() {
        let store = store();
        store.set("module.x", "5", true).unwrap();
        store.set("global.x", "7", true).unwrap();
        let v = store.get_with_fallback("module.x", "global.x", "d".to_string()).unwrap();
        assert_eq!(v, "5");
    }

    #[test]
    fn fallback_uses_secondary_when_primary_unset() {
        let store = store();
        store.set("global.x", "7", true).unwrap();
        let v = store.get_with_fallback("module.x", "global.x", "d".to_string()).unwrap();
        assert_eq!(v, "7");
    }

    #[test]
    fn fallback_uses_default_when_both_unset() {
        let store = store();
        let v = store.get_with_fallback("module.x", "global.x", "d".to_string()).unwrap();
        assert_eq!(v, "d");
    }

    // ========================================================================
    // Cache behavior
    // ========================================================================

    #[test]
    fn cache_is_authoritative_after_population() {
        let store = store();
        store.set("k", "cached", true).unwrap();
        store
            .config_database()
            .exec(
                "UPDATE profile SET value = ?1 WHERE key = 'k'",
                &[PropertyValue::from("behind").encode().unwrap().into()],
            )
            .unwrap();
        assert_eq!(store.get("k", String::new()).unwrap(), "cached");
    }

    #[test]
    fn miss_is_cached_without_default() {
        let store = store();
        assert_eq!(store.get("k", 1i64).unwrap(), 1);
        assert_eq!(store.cache.lookup("k"), Some(CacheEntry::Absent));
        assert_eq!(store.get("k", 2i64).unwrap(), 2);
    }

    #[test]
    fn transient_set_updates_cache_only() {
        let store = store();
        store.set("session.override", true, false).unwrap();
        assert!(store.get("session.override", false).unwrap());
        assert!(store.keys().unwrap().is_empty());
    }

    #[test]
    fn failed_persist_keeps_cached_value() {
        let store = store();
        store.config_database().execute_batch("DROP TABLE profile").unwrap();
        let events = recorder(&store);

        let err = store.set("k", "v", true).unwrap_err();
        assert!(matches!(err, ProfileError::BackendUnavailable(_)));
        assert_eq!(store.get("k", String::new()).unwrap(), "v");

        let events = events.lock().unwrap();
        assert_eq!(
            events.as_slice(),
            &[ProfileEvent::ValueChanged {
                key: "k".into(),
                value: PropertyValue::from("v"),
                persisted: false,
            }]
        );
    }

    // ========================================================================
    // Remove
    // ========================================================================

    #[test]
    fn remove_restores_default() {
        let store = store();
        store.set("k", 5i64, true).unwrap();
        store.remove("k").unwrap();
        assert_eq!(store.get("k", 9i64).unwrap(), 9);
        assert!(store.keys().unwrap().is_empty());
    }

    #[test]
    fn remove_missing_is_noop() {
        let store = store();
        store.remove("never").unwrap();
        assert!(store.keys().unwrap().is_empty());
    }

    #[test]
    fn remove_drops_transient_value() {
        let store = store();
        store.set("k", "tmp", false).unwrap();
        store.remove("k").unwrap();
        assert_eq!(store.get("k", "d".to_string()).unwrap(), "d");
    }

    // ========================================================================
    // Notification
    // ========================================================================

    #[test]
    fn each_mutation_notifies_once_in_order() {
        let store = store();
        let events = recorder(&store);

        store.set("a", 1i64, true).unwrap();
        store.set("b", "x", false).unwrap();
        store.remove("a").unwrap();
        store.remove("ghost").unwrap();

        let events = events.lock().unwrap();
        assert_eq!(
            events.as_slice(),
            &[
                ProfileEvent::ValueChanged {
                    key: "a".into(),
                    value: PropertyValue::Int(1),
                    persisted: true,
                },
                ProfileEvent::ValueChanged {
                    key: "b".into(),
                    value: PropertyValue::from("x"),
                    persisted: false,
                },
                ProfileEvent::KeyRemoved { key: "a".into() },
                ProfileEvent::KeyRemoved { key: "ghost".into() },
            ]
        );
    }

    #[test]
    fn rejected_set_does_not_notify() {
        let store = store();
        let events = recorder(&store);
        assert!(store.set("is_touch_screen", 1i64, true).is_err());
        assert!(events.lock().unwrap().is_empty());
    }

    #[test]
    fn unsubscribed_listener_is_silent() {
        let store = store();
        let events = Arc::new(Mutex::new(0usize));
        let sink = events.clone();
        let id = store.subscribe(move |_| *sink.lock().unwrap() += 1);

        store.set("k", 1i64, true).unwrap();
        assert!(store.unsubscribe(id));
        store.set("k", 2i64, true).unwrap();
        assert_eq!(*events.lock().unwrap(), 1);
    }

    // ========================================================================
    // Database handles
    // ========================================================================

    #[test]
    fn handles_are_independent() {
        let store = store();
        store
            .qc_database()
            .execute_batch("CREATE TABLE qc_files (id INTEGER PRIMARY KEY)")
            .unwrap();
        assert!(store
            .data_database()
            .query("SELECT * FROM qc_files", &[])
            .is_err());
        assert!(store
            .qc_database()
            .query("SELECT * FROM profile", &[])
            .is_err());
    }

    #[test]
    fn open_missing_directory_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let store = PropertyStore::open_file(&dir.path().join("a/b/config.db")).unwrap();
        assert!(store.qc_database().path().unwrap().ends_with("a/b/qc.db"));
        assert!(store.data_database().path().unwrap().ends_with("a/b/data.db"));
    }
}
