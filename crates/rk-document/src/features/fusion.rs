//! Boolean union of several solids

use super::{ShapeSummary, shape_outputs};
use crate::container::PropertyContainer;
use crate::object::{ExecContext, ExecError, ExecOutcome, ExecResult, ObjectBehavior};
use crate::property::{PropertySpec, PropertyValue};

/// `Part::Fusion`: union of `Shapes`
#[derive(Debug, Default)]
pub struct Fusion;

impl Fusion {
    pub const TYPE_NAME: &'static str = "Part::Fusion";
}

impl ObjectBehavior for Fusion {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn properties(&self) -> Vec<PropertySpec> {
        let mut specs = vec![PropertySpec::link_list("Shapes")];
        specs.extend(shape_outputs());
        specs
    }

    fn execute(&mut self, ctx: &mut ExecContext<'_>) -> ExecResult<ExecOutcome> {
        let shapes = ctx.linked_list("Shapes")?;
        if shapes.len() < 2 {
            return Err(ExecError::InvalidInput {
                property: "Shapes".into(),
                reason: format!("at least two shapes are needed, got {}", shapes.len()),
            });
        }

        let mut total = ShapeSummary {
            volume: 0.0,
            min_edge_length: f64::INFINITY,
            edge_length: 0.0,
        };
        for shape in shapes {
            let summary = ShapeSummary::of("Shapes", shape)?;
            total.volume += summary.volume;
            total.min_edge_length = total.min_edge_length.min(summary.min_edge_length);
            total.edge_length += summary.edge_length;
        }
        total.write(ctx)?;
        Ok(ExecOutcome::Recomputed)
    }

    /// A shape listed twice is kept once
    fn on_changed(
        &mut self,
        property: &str,
        properties: &PropertyContainer,
    ) -> Vec<(String, PropertyValue)> {
        if property != "Shapes" {
            return Vec::new();
        }
        let Some(PropertyValue::LinkList(ids)) = properties.value("Shapes") else {
            return Vec::new();
        };

        let mut unique = Vec::with_capacity(ids.len());
        for id in ids {
            if !unique.contains(id) {
                unique.push(*id);
            }
        }
        if unique.len() == ids.len() {
            return Vec::new();
        }
        vec![("Shapes".to_string(), PropertyValue::LinkList(unique))]
    }
}
