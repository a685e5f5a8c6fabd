// src/lib.rs

//! Mission package archive engine
//!
//! Builds, describes and extracts self-describing zip packages that bundle
//! files and structured event records under a versioned manifest.
//!
//! # Architecture
//!
//! - Manifest model: configuration parameters plus a content listing
//! - Builder: streams a manifest and its content into an archive, carrying
//!   unresolvable records forward from the archive it replaces
//! - Extractor: stages files for the caller's import resolvers and imports
//!   records in two passes, tolerating one level of forward references
//! - Legacy adapter: rewrites archives without a usable manifest in place
//! - Storage goes through the [`FileSystem`] trait, so everything runs
//!   against local disk or memory

pub mod archive;
pub mod config;
mod error;
pub mod filesystem;
pub mod hash;
pub mod inspect;
pub mod package;
pub mod progress;
pub mod receive;
pub mod record;
pub mod resolver;

pub use archive::{
    ArchiveFormatSelector, BuildError, BuildReport, ExtractReport, Extractor, ImportContext,
    PackageBuilder, PackageExtractor, get_manifest, has_recognized_manifest, load_manifest,
};
pub use config::EngineConfig;
pub use error::{Error, Result};
pub use filesystem::{FileSystem, LocalFs, MemoryFs};
pub use inspect::InspectedPackage;
pub use package::{
    ContentEntry, ContentKind, ContentList, ImportInstructions, MANIFEST_VERSION, Manifest,
    ManifestError, Parameter, ParameterSet,
};
pub use progress::{
    CallbackProgress, LogProgress, ProgressEvent, ProgressListener, SilentProgress,
};
pub use receive::{DeleteReport, ReceiveOutcome, delete_package, process_received};
pub use resolver::{
    ContentResolver, DirectoryImporter, DirectoryResolver, ImportOutcome, ImportResolver,
    RecordImporter, ResolverChain,
};
