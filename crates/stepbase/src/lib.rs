#![warn(missing_docs)]

//! Baseline-and-diff engine for STEP assemblies.
//!
//! A parsed [`AssemblyTree`](stepbase_kernel::AssemblyTree) becomes a
//! [`Baseline`]: a bill of materials with stable path ids, identical
//! siblings folded into quantities, and a [`GeometrySummary`] per
//! component. On top of a baseline the engine can
//!
//! - detect physical [`Interface`]s between parts (fastening, contact,
//!   proximity) and summarize them in an [`AssemblyGraph`];
//! - compare two baselines into a [`DiffReport`] classified by
//!   [`ImpactLevel`];
//! - validate a baseline and export its BOM;
//! - persist baselines in a [`BaselineStore`].
//!
//! [`Engine`] ties these steps to a [`GeometryKernel`](stepbase_kernel::GeometryKernel).

pub mod baseline;
pub mod bom;
pub mod builder;
pub mod compare;
pub mod config;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod input;
pub mod interface;
pub mod store;
pub mod validation;

#[cfg(test)]
mod testing;

pub use baseline::{Baseline, Component, ComponentId, ComponentType, SourceInfo, Totals};
pub use bom::{bom_lines, to_csv, BomLine};
pub use builder::BaselineBuilder;
pub use compare::{
    BaselineComparator, BomChange, BoundingBoxChange, DiffReport, DiffStatistics, FeatureChange, GeometryChange,
    ImpactLevel, InterfaceChange, MetadataChange, TopologyChange,
};
pub use config::{AnalysisConfig, BuilderConfig, CompareConfig, InterfaceConfig, ValidationConfig};
pub use engine::Engine;
pub use error::{EngineError, Result};
pub use geometry::GeometrySummary;
pub use input::ModelRequest;
pub use interface::{AssemblyGraph, Candidate, Interface, InterfaceDetector, InterfaceKind, InterfaceRule, Severity};
pub use store::{BaselineStore, FileStore, MemoryStore};
pub use validation::{validate, CheckStatus, ValidationReport};
