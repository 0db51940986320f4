//! Primitive solids

use std::f64::consts::PI;

use glam::DVec3;

use super::{ShapeSummary, shape_outputs};
use crate::object::{ExecContext, ExecOutcome, ExecResult, ObjectBehavior};
use crate::property::{PropertyConstraint, PropertySpec};

/// `Part::Box`
#[derive(Debug, Default)]
pub struct BoxFeature;

impl BoxFeature {
    pub const TYPE_NAME: &'static str = "Part::Box";
}

impl ObjectBehavior for BoxFeature {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn properties(&self) -> Vec<PropertySpec> {
        let mut specs = vec![
            PropertySpec::float("Length", 10.0).with_constraint(PropertyConstraint::Positive),
            PropertySpec::float("Width", 10.0).with_constraint(PropertyConstraint::Positive),
            PropertySpec::float("Height", 10.0).with_constraint(PropertyConstraint::Positive),
            PropertySpec::new("Placement", DVec3::ZERO),
        ];
        specs.extend(shape_outputs());
        specs
    }

    fn execute(&mut self, ctx: &mut ExecContext<'_>) -> ExecResult<ExecOutcome> {
        let length = ctx.float("Length")?;
        let width = ctx.float("Width")?;
        let height = ctx.float("Height")?;

        ShapeSummary {
            volume: length * width * height,
            min_edge_length: length.min(width).min(height),
            edge_length: 4.0 * (length + width + height),
        }
        .write(ctx)?;
        Ok(ExecOutcome::Recomputed)
    }
}

/// `Part::Cylinder`
#[derive(Debug, Default)]
pub struct Cylinder;

impl Cylinder {
    pub const TYPE_NAME: &'static str = "Part::Cylinder";
}

impl ObjectBehavior for Cylinder {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn properties(&self) -> Vec<PropertySpec> {
        let mut specs = vec![
            PropertySpec::float("Radius", 2.0).with_constraint(PropertyConstraint::Positive),
            PropertySpec::float("Height", 10.0).with_constraint(PropertyConstraint::Positive),
            PropertySpec::new("Placement", DVec3::ZERO),
        ];
        specs.extend(shape_outputs());
        specs
    }

    fn execute(&mut self, ctx: &mut ExecContext<'_>) -> ExecResult<ExecOutcome> {
        let radius = ctx.float("Radius")?;
        let height = ctx.float("Height")?;

        // Two circular edges; the seam is not counted
        let circumference = 2.0 * PI * radius;
        ShapeSummary {
            volume: PI * radius * radius * height,
            min_edge_length: circumference,
            edge_length: 2.0 * circumference,
        }
        .write(ctx)?;
        Ok(ExecOutcome::Recomputed)
    }
}
