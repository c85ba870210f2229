//! Assembly tree returned by a kernel.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Primitives;

/// Linear unit of every length reported by a kernel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinearUnit {
    /// Millimeters (assumed when the model says nothing).
    #[default]
    Millimeter,
    /// Centimeters.
    Centimeter,
    /// Meters.
    Meter,
    /// Inches.
    Inch,
    /// Feet.
    Foot,
}

impl LinearUnit {
    /// Conventional unit symbol.
    pub fn symbol(&self) -> &'static str {
        match self {
            LinearUnit::Millimeter => "mm",
            LinearUnit::Centimeter => "cm",
            LinearUnit::Meter => "m",
            LinearUnit::Inch => "in",
            LinearUnit::Foot => "ft",
        }
    }
}

impl fmt::Display for LinearUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Whether a node is a part or an assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShapeKind {
    /// A leaf carrying geometry.
    Part,
    /// A node grouping other nodes.
    Assembly,
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShapeKind::Part => "PART",
            ShapeKind::Assembly => "ASSEMBLY",
        })
    }
}

/// Display colour, 8 bits per channel.
pub type Rgb = [u8; 3];

/// What a node holds.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeContent {
    /// A part; `None` when the kernel could not measure its geometry.
    Part(Option<Primitives>),
    /// An assembly of child nodes, in model order.
    Assembly(Vec<ShapeNode>),
}

/// One node of the assembly tree.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeNode {
    /// Product name.
    pub name: String,
    /// Part geometry or assembly children.
    pub content: ShapeContent,
    /// Display colour, when the model assigns one.
    pub color: Option<Rgb>,
}

impl ShapeNode {
    /// A part node.
    pub fn part(name: impl Into<String>, primitives: Option<Primitives>) -> Self {
        Self {
            name: name.into(),
            content: ShapeContent::Part(primitives),
            color: None,
        }
    }

    /// An assembly node.
    pub fn assembly(name: impl Into<String>, children: Vec<ShapeNode>) -> Self {
        Self {
            name: name.into(),
            content: ShapeContent::Assembly(children),
            color: None,
        }
    }

    /// Set the display colour.
    pub fn with_color(mut self, color: Option<Rgb>) -> Self {
        self.color = color;
        self
    }

    /// Node kind.
    pub fn kind(&self) -> ShapeKind {
        match self.content {
            ShapeContent::Part(_) => ShapeKind::Part,
            ShapeContent::Assembly(_) => ShapeKind::Assembly,
        }
    }

    /// Children in model order; empty for parts.
    pub fn children(&self) -> &[ShapeNode] {
        match &self.content {
            ShapeContent::Assembly(children) => children,
            ShapeContent::Part(_) => &[],
        }
    }

    /// Measured geometry of a part, if readable.
    pub fn primitives(&self) -> Option<&Primitives> {
        match &self.content {
            ShapeContent::Part(p) => p.as_ref(),
            ShapeContent::Assembly(_) => None,
        }
    }

    /// Number of nodes in this subtree, this node included.
    pub fn node_count(&self) -> usize {
        1 + self.children().iter().map(ShapeNode::node_count).sum::<usize>()
    }
}

/// A PRODUCT entry found in the model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductInfo {
    /// Product identifier.
    pub id: String,
    /// Product name.
    pub name: String,
    /// Free-form description.
    pub description: String,
}

/// File-level information from the model header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    /// FILE_DESCRIPTION text.
    pub description: Option<String>,
    /// FILE_NAME name.
    pub file_name: Option<String>,
    /// FILE_NAME time stamp.
    pub timestamp: Option<String>,
    /// First FILE_NAME author.
    pub author: Option<String>,
    /// First FILE_NAME organization.
    pub organization: Option<String>,
    /// Application protocol schema, e.g. `AUTOMOTIVE_DESIGN`.
    pub schema: Option<String>,
    /// Products declared in the model.
    #[serde(default)]
    pub products: Vec<ProductInfo>,
}

impl FileMetadata {
    /// True when the header carried nothing useful.
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.file_name.is_none()
            && self.timestamp.is_none()
            && self.author.is_none()
            && self.organization.is_none()
            && self.schema.is_none()
            && self.products.is_empty()
    }
}

/// Parsed model handed to the baseline builder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssemblyTree {
    /// Root node; `None` for a model without any shape.
    pub root: Option<ShapeNode>,
    /// Unit of every length in the tree.
    pub unit: LinearUnit,
    /// Header information.
    pub metadata: FileMetadata,
}

impl AssemblyTree {
    /// A tree in millimeters with no metadata.
    pub fn new(root: ShapeNode) -> Self {
        Self {
            root: Some(root),
            ..Self::default()
        }
    }

    /// Set the linear unit.
    pub fn with_unit(mut self, unit: LinearUnit) -> Self {
        self.unit = unit;
        self
    }

    /// Set the header metadata.
    pub fn with_metadata(mut self, metadata: FileMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// True when there is no root shape.
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }
}
