//! Manager and store configuration.

use uuid::Uuid;

/// Default bound on simultaneously open result sets per store.
pub const DEFAULT_MAX_OPEN_RESULT_SETS: usize = 8;

/// Configuration for a [`KvManager`](crate::KvManager).
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Application (bundle) identifier that namespaces every store.
    pub app_id: String,

    /// Identifier of this device, used when addressing the local scope by id.
    pub local_device_id: String,

    /// Maximum number of open result sets per store.
    pub max_open_result_sets: usize,
}

impl ManagerConfig {
    /// Creates a configuration for the given application id.
    #[must_use]
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            local_device_id: Uuid::new_v4().to_string(),
            max_open_result_sets: DEFAULT_MAX_OPEN_RESULT_SETS,
        }
    }

    /// Sets the local device id.
    #[must_use]
    pub fn local_device_id(mut self, id: impl Into<String>) -> Self {
        self.local_device_id = id.into();
        self
    }

    /// Sets the bound on open result sets per store.
    #[must_use]
    pub const fn max_open_result_sets(mut self, value: usize) -> Self {
        self.max_open_result_sets = value;
        self
    }
}

/// Store flavours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KvStoreType {
    /// Every device writes into one shared keyspace.
    SingleVersion,
    /// Each device's replica lives in its own scope.
    DeviceCollaboration,
    /// Versioned store. Not supported.
    MultiVersion,
}

/// Data protection level of a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SecurityLevel {
    /// No level assigned.
    NoLevel,
    /// Public data.
    S0,
    /// Low risk.
    S1,
    /// Medium risk.
    S2,
    /// High risk.
    S3,
    /// Critical.
    S4,
}

/// Options for opening a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// Create the store if it does not exist yet.
    pub create_if_missing: bool,
    /// Whether the store is encrypted at rest.
    pub encrypt: bool,
    /// Whether backups are permitted.
    pub backup: bool,
    /// Whether to sync automatically after every local write.
    pub auto_sync: bool,
    /// Store flavour.
    pub kv_store_type: KvStoreType,
    /// Data protection level.
    pub security_level: SecurityLevel,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            encrypt: false,
            backup: true,
            auto_sync: false,
            kv_store_type: KvStoreType::DeviceCollaboration,
            security_level: SecurityLevel::S1,
        }
    }
}

impl Options {
    /// Creates options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the store if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether the store is encrypted.
    #[must_use]
    pub const fn encrypt(mut self, value: bool) -> Self {
        self.encrypt = value;
        self
    }

    /// Sets whether backups are permitted.
    #[must_use]
    pub const fn backup(mut self, value: bool) -> Self {
        self.backup = value;
        self
    }

    /// Sets whether local writes trigger a sync.
    #[must_use]
    pub const fn auto_sync(mut self, value: bool) -> Self {
        self.auto_sync = value;
        self
    }

    /// Sets the store flavour.
    #[must_use]
    pub const fn kv_store_type(mut self, value: KvStoreType) -> Self {
        self.kv_store_type = value;
        self
    }

    /// Sets the security level.
    #[must_use]
    pub const fn security_level(mut self, value: SecurityLevel) -> Self {
        self.security_level = value;
        self
    }

    /// Returns the first option that conflicts with an already open store.
    ///
    /// Only the options that shape the stored data are compared.
    pub(crate) fn conflict_with(&self, open: &Options) -> Option<&'static str> {
        if self.kv_store_type != open.kv_store_type {
            Some("kv_store_type")
        } else if self.security_level != open.security_level {
            Some("security_level")
        } else if self.encrypt != open.encrypt {
            Some("encrypt")
        } else {
            None
        }
    }
}
