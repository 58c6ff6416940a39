use crate::model::ResourceType;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UnitLoadError {
    #[error("{kind} not found: {name}")]
    NotFound { name: String, kind: ResourceType },
    #[error("resource {key} already loaded")]
    Collision { key: String },
    #[error("failed to ingest {origin}: {cause}")]
    Ingestion {
        origin: String,
        #[source]
        cause: IngestionCause,
    },
    #[error("boot delegation: {name} not found")]
    BootDelegationFatal { name: String },
    #[error("resource {key} is not addressable by locator")]
    NoLocator { key: String },
    #[error("invalid locator: {0}")]
    InvalidLocator(String),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl UnitLoadError {
    /// Miss on a raw resource or store key; the kind is guessed from the suffix.
    pub fn not_found(name: impl Into<String>) -> Self {
        let name = name.into();
        let kind = ResourceType::guess(&name);
        UnitLoadError::NotFound { name, kind }
    }

    /// Miss on a logical unit name.
    pub fn unit_not_found(name: impl Into<String>) -> Self {
        UnitLoadError::NotFound {
            name: name.into(),
            kind: ResourceType::Unit,
        }
    }

    pub fn ingestion(origin: impl Into<String>, cause: impl Into<IngestionCause>) -> Self {
        UnitLoadError::Ingestion {
            origin: origin.into(),
            cause: cause.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, UnitLoadError::NotFound { .. })
    }
}

/// Underlying reason an ingestion call failed.
#[derive(Error, Debug)]
pub enum IngestionCause {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("path does not exist")]
    MissingPath,
    #[error("not a valid locator")]
    InvalidLocator,
}

/// Failures of the named engine registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("registry already populated; destroy it before loading a new context")]
    AlreadyPopulated,
    #[error("engine [{0}] already exists; names must be unique")]
    DuplicateName(String),
    #[error("no engine named [{0}]")]
    Missing(String),
}

pub type Result<T> = std::result::Result<T, UnitLoadError>;
