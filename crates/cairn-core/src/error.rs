//! Error types for Cairn

use thiserror::Error;

/// Result type alias using Cairn's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Cairn error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Structural errors (E001-E099)
    #[error("Structural violation: {0}")]
    StructuralViolation(String),

    #[error("Node '{0}' already exists")]
    DuplicateNode(String),

    #[error("Relationship {source_id} -[{relationship_type}]-> {target_id} already exists")]
    DuplicateRelationship {
        source_id: String,
        target_id: String,
        relationship_type: String,
    },

    #[error("Node '{id}' still has {count} relationship(s). Delete them first or use the cascade delete policy.")]
    DanglingRelationships { id: String, count: u64 },

    // Lookup errors (E100-E199)
    #[error("Node '{0}' not found. Run `cairn nodes list` to see all nodes.")]
    NodeNotFound(String),

    #[error("Relationship '{0}' not found.")]
    RelationshipNotFound(String),

    // Import errors (E200-E299)
    #[error("No import adapter registered for source type '{0}'")]
    AdapterNotFound(String),

    #[error("Source '{path}' is not a valid {source_type} collection")]
    SourceNotDetected { path: String, source_type: String },

    #[error("Import failed: {0}")]
    ImportFailed(String),

    // Database errors (E400-E499)
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Serialization errors (E500-E599)
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Input errors (E800-E899)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Generic errors
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::StructuralViolation(_) => "E001",
            Self::DuplicateNode(_) => "E002",
            Self::DuplicateRelationship { .. } => "E003",
            Self::DanglingRelationships { .. } => "E004",
            Self::NodeNotFound(_) => "E100",
            Self::RelationshipNotFound(_) => "E101",
            Self::AdapterNotFound(_) => "E200",
            Self::SourceNotDetected { .. } => "E201",
            Self::ImportFailed(_) => "E202",
            Self::DatabaseError(_) => "E400",
            Self::Serialization(_) => "E500",
            Self::ConfigError(_) => "E600",
            Self::InvalidInput(_) => "E800",
            Self::Other(_) | Self::Io(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::NodeNotFound(_) => Some("cairn nodes list".to_string()),
            Self::DanglingRelationships { .. } => {
                Some("cairn config set store.delete_policy cascade".to_string())
            }
            Self::AdapterNotFound(_) => Some("cairn import <path> --adapter obsidian".to_string()),
            Self::SourceNotDetected { source_type, .. } if source_type == "obsidian" => {
                Some("Point the import at a folder containing a .obsidian directory".to_string())
            }
            _ => None,
        }
    }

    /// Whether this error signals a missing node or relationship
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NodeNotFound(_) | Self::RelationshipNotFound(_))
    }
}
