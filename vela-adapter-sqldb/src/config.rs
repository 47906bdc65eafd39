//! Typed SQL database configuration

use vela_core::{AdapterError, AdapterResult, PropertyBag};

/// Service tier of the database
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edition {
    Basic,
    Standard,
    Premium,
}

impl Edition {
    pub fn parse(value: &str) -> AdapterResult<Self> {
        match value.to_ascii_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "standard" => Ok(Self::Standard),
            "premium" => Ok(Self::Premium),
            other => Err(AdapterError::invalid_property(
                "edition",
                format!("\"{}\" is not one of basic, standard, premium", other),
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Standard => "standard",
            Self::Premium => "premium",
        }
    }
}

/// Validated database configuration
///
/// The platform records the `provisioned-database` property once the database
/// is created; this adapter only reads it. On later transitions it is the
/// name the provider actually holds, and a `database_name` that differs from
/// it is a rename attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlDatabaseConfig {
    pub server_name: String,
    pub database_name: String,
    pub edition: Edition,
    pub max_size_gb: i64,
    pub collation: Option<String>,
    /// Name recorded when the database was provisioned, if any
    pub provisioned_name: Option<String>,
}

impl SqlDatabaseConfig {
    pub fn from_properties(bag: &PropertyBag) -> AdapterResult<Self> {
        let server_name = bag.require_string("server-name")?.to_string();
        let database_name = bag.require_string("database-name")?.to_string();

        let edition = match bag.get_string("edition") {
            Some(value) => Edition::parse(value)?,
            None => Edition::Standard,
        };

        let max_size_gb = bag.get_int("max-size-gb").unwrap_or(1);
        if max_size_gb <= 0 {
            return Err(AdapterError::invalid_property(
                "max-size-gb",
                "must be a positive integer",
            ));
        }

        Ok(Self {
            server_name,
            database_name,
            edition,
            max_size_gb,
            collation: bag.get_string("collation").map(str::to_string),
            provisioned_name: bag.get_string("provisioned-database").map(str::to_string),
        })
    }

    /// True when the requested name differs from the provisioned one
    pub fn is_rename(&self) -> bool {
        match &self.provisioned_name {
            Some(provisioned) => *provisioned != self.database_name,
            None => false,
        }
    }
}
