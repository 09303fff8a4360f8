//! Import pipeline
//!
//! Converts an external note collection into nodes and relationships the
//! graph store accepts. Each source format is an [`ImportAdapter`] with five
//! ordered stages:
//!
//! 1. `detect`: cheap marker check, gating everything else
//! 2. `analyze`: dry-run counts, warnings, previews and a time estimate
//! 3. `parse`: raw documents, links and attachments
//! 4. `transform`: one node per document, markup rewritten
//! 5. `map_relationships`: resolved links plus folder anchors
//!
//! [`validate`] checks transformed nodes before commit, and
//! [`ImportPipeline`] runs the whole sequence against a [`GraphStore`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cairn_core::domain::import::{AdapterRegistry, ImportPipeline};
//!
//! let pipeline = ImportPipeline::new(store, AdapterRegistry::with_defaults());
//! let analysis = pipeline.analyze(vault_path, None).await?;
//! let report = pipeline.import(vault_path, Some("obsidian")).await?;
//! println!("{} of {} documents imported", report.succeeded(), report.documents);
//! ```
//!
//! [`GraphStore`]: crate::domain::graph::GraphStore

mod adapter;
mod markdown;
mod obsidian;
mod pipeline;
mod resolve;
mod types;
mod validate;

pub use adapter::{AdapterRegistry, ImportAdapter};
pub use obsidian::{IN_FOLDER, OBSIDIAN_SOURCE_TYPE, ObsidianAdapter};
pub use pipeline::{ImportFailure, ImportPipeline, ImportReport, ImportStage};
pub use types::{
    ImportAnalysis, ImportOptions, ImportWarning, LinkGraph, LinkGraphEdge, MS_PER_ATTACHMENT,
    MS_PER_DOCUMENT, MS_PER_LINK, ParsedSource, RawAttachment, RawDocument, RawLink,
    RawRelationship, RelationshipMap, TransformPreview, WarningKind, WarningSeverity,
    estimate_duration_ms,
};
pub use validate::{DEFAULT_MIN_CONTENT_LENGTH, NodeValidation, ValidationReport, ValidationStatus, validate};
