//! Grouping container without geometry

use crate::object::{ExecContext, ExecOutcome, ExecResult, ExecuteState, ObjectBehavior, ObjectStatus};
use crate::property::PropertySpec;

/// `App::Group`: lists member objects in `Group`
#[derive(Debug, Default)]
pub struct Group;

impl Group {
    pub const TYPE_NAME: &'static str = "App::Group";
}

impl ObjectBehavior for Group {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn properties(&self) -> Vec<PropertySpec> {
        vec![PropertySpec::link_list("Group")]
    }

    /// Members recomputing does not affect the group itself
    fn must_execute(&self, state: &ExecuteState<'_>) -> bool {
        state.status == ObjectStatus::New || state.forced || state.has_changed("Group")
    }

    fn execute(&mut self, ctx: &mut ExecContext<'_>) -> ExecResult<ExecOutcome> {
        // Resolving the members reports dangling links
        ctx.linked_list("Group")?;
        Ok(ExecOutcome::NoChange)
    }
}
