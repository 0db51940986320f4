//! Rounded edges on a base solid

use std::f64::consts::PI;

use super::{ShapeSummary, shape_outputs};
use crate::object::{ExecContext, ExecError, ExecOutcome, ExecResult, ObjectBehavior};
use crate::property::{PropertyConstraint, PropertySpec};

/// `Part::Fillet`: rounds every edge of `Base` with `Radius`
#[derive(Debug, Default)]
pub struct Fillet;

impl Fillet {
    pub const TYPE_NAME: &'static str = "Part::Fillet";
}

impl ObjectBehavior for Fillet {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn properties(&self) -> Vec<PropertySpec> {
        let mut specs = vec![
            PropertySpec::link("Base"),
            PropertySpec::float("Radius", 1.0).with_constraint(PropertyConstraint::Positive),
        ];
        specs.extend(shape_outputs());
        specs
    }

    fn execute(&mut self, ctx: &mut ExecContext<'_>) -> ExecResult<ExecOutcome> {
        let base = ShapeSummary::of("Base", ctx.link("Base")?)?;
        let radius = ctx.float("Radius")?;

        if 2.0 * radius >= base.min_edge_length {
            return Err(ExecError::Failed(format!(
                "Fillet radius {} is too large for an edge of length {}",
                radius, base.min_edge_length
            )));
        }

        // Each edge loses a square prism and gains a quarter cylinder
        let removed = (1.0 - PI / 4.0) * radius * radius * base.edge_length;
        ShapeSummary {
            volume: base.volume - removed,
            min_edge_length: base.min_edge_length - 2.0 * radius,
            edge_length: base.edge_length,
        }
        .write(ctx)?;
        Ok(ExecOutcome::Recomputed)
    }
}
