#![warn(missing_docs)]

//! STEP (ISO 10303-21) geometry kernel for stepbase.
//!
//! Reads AP203/AP214/AP242 exchange files into an
//! [`AssemblyTree`](stepbase_kernel::AssemblyTree): product structure from
//! `NEXT_ASSEMBLY_USAGE_OCCURRENCE` links, instance placements from
//! `ITEM_DEFINED_TRANSFORMATION`s, and measured B-rep geometry for every
//! part.
//!
//! # Example
//!
//! ```no_run
//! use stepbase_kernel::GeometryKernel;
//! use stepbase_step::StepKernel;
//!
//! let tree = StepKernel::new()
//!     .parse_path(std::path::Path::new("bracket.step"))
//!     .unwrap();
//! println!("unit: {}", tree.unit);
//! ```

mod brep;
mod entities;
mod error;
mod header;
mod kernel;
mod lexer;
mod parser;
mod product;
mod style;

pub use error::StepError;
pub use kernel::StepKernel;
pub use parser::{Parser, StepEntity, StepFile, StepValue};
