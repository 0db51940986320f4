//! Built-in Object Types
//!
//! Parametric stand-ins for solid modelling features. Geometry is reduced to
//! a summary (volume and edge lengths) so the recompute engine can be driven
//! and checked without a geometry kernel.

mod fillet;
mod fusion;
mod group;
mod primitive;

pub use fillet::Fillet;
pub use fusion::Fusion;
pub use group::Group;
pub use primitive::{BoxFeature, Cylinder};

use crate::object::{DocumentObject, ExecContext, ExecError, ExecResult};
use crate::property::{PropertySpec, PropertyValue};

/// Output: enclosed volume
pub const VOLUME: &str = "Volume";
/// Output: length of the shortest edge
pub const MIN_EDGE_LENGTH: &str = "MinEdgeLength";
/// Output: summed length of all edges
pub const EDGE_LENGTH: &str = "EdgeLength";

/// Output properties shared by every solid feature
pub(crate) fn shape_outputs() -> Vec<PropertySpec> {
    vec![
        PropertySpec::float(VOLUME, 0.0).output(),
        PropertySpec::float(MIN_EDGE_LENGTH, 0.0).output(),
        PropertySpec::float(EDGE_LENGTH, 0.0).output(),
    ]
}

/// Geometry summary of a solid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeSummary {
    pub volume: f64,
    pub min_edge_length: f64,
    pub edge_length: f64,
}

impl ShapeSummary {
    /// Read the outputs of an object referenced through `property`
    pub fn of(property: &str, object: &DocumentObject) -> ExecResult<Self> {
        let read = |name: &str| {
            object
                .properties()
                .float(name)
                .map_err(|_| ExecError::InvalidInput {
                    property: property.to_string(),
                    reason: format!("{} ({}) is not a solid", object.name(), object.type_name()),
                })
        };
        Ok(Self {
            volume: read(VOLUME)?,
            min_edge_length: read(MIN_EDGE_LENGTH)?,
            edge_length: read(EDGE_LENGTH)?,
        })
    }

    /// Store as the executing object's outputs
    pub fn write(self, ctx: &mut ExecContext<'_>) -> ExecResult<()> {
        ctx.set(VOLUME, PropertyValue::Float(self.volume))?;
        ctx.set(MIN_EDGE_LENGTH, PropertyValue::Float(self.min_edge_length))?;
        ctx.set(EDGE_LENGTH, PropertyValue::Float(self.edge_length))?;
        Ok(())
    }
}
