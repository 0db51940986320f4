//! Integration tests for the recompute scheduler.

use std::cell::{Cell, RefCell};

use rk_document::{
    Document, DocumentError, ExecContext, ExecOutcome, ExecResult, ObjectBehavior, ObjectId,
    ObjectStatus, PropertyError, PropertySpec, PropertyValue, RecomputeFailure, TypeRegistry,
};

thread_local! {
    /// Names of the objects whose `execute()` ran, in call order
    static CALLS: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
    /// Object a `Toucher` asks to recompute while it executes
    static TOUCH_TARGET: Cell<Option<ObjectId>> = const { Cell::new(None) };
}

fn take_calls() -> Vec<String> {
    CALLS.with(|calls| std::mem::take(&mut *calls.borrow_mut()))
}

/// Sums the `Result` of its inputs and its own `Size`
#[derive(Debug)]
struct Counter;

impl ObjectBehavior for Counter {
    fn type_name(&self) -> &'static str {
        "Test::Counter"
    }

    fn properties(&self) -> Vec<PropertySpec> {
        vec![
            PropertySpec::link_list("Inputs"),
            PropertySpec::float("Size", 1.0),
            PropertySpec::float("Result", 0.0).output(),
        ]
    }

    fn execute(&mut self, ctx: &mut ExecContext<'_>) -> ExecResult<ExecOutcome> {
        CALLS.with(|calls| calls.borrow_mut().push(ctx.properties().name().to_string()));
        let mut total = ctx.float("Size")?;
        for input in ctx.linked_list("Inputs")? {
            total += input.properties().float("Result")?;
        }
        ctx.set("Result", PropertyValue::Float(total))?;
        Ok(ExecOutcome::Recomputed)
    }
}

/// Requests a touch of `TOUCH_TARGET` and leaves its own outputs alone
#[derive(Debug)]
struct Toucher;

impl ObjectBehavior for Toucher {
    fn type_name(&self) -> &'static str {
        "Test::Toucher"
    }

    fn properties(&self) -> Vec<PropertySpec> {
        vec![
            PropertySpec::link_list("Inputs"),
            PropertySpec::float("Result", 0.0).output(),
        ]
    }

    fn execute(&mut self, ctx: &mut ExecContext<'_>) -> ExecResult<ExecOutcome> {
        CALLS.with(|calls| calls.borrow_mut().push(ctx.properties().name().to_string()));
        if let Some(target) = TOUCH_TARGET.with(Cell::get) {
            ctx.request_touch(target);
        }
        Ok(ExecOutcome::NoChange)
    }
}

fn counter_document() -> Document {
    let mut registry = TypeRegistry::with_builtin_types();
    registry.register("Test::Counter", || Box::new(Counter));
    registry.register("Test::Toucher", || Box::new(Toucher));
    Document::with_registry("Counters", registry.into(), Default::default())
}

fn add_counter(doc: &mut Document, name: &str, inputs: Vec<ObjectId>) -> ObjectId {
    let id = doc.add_object("Test::Counter", Some(name)).unwrap();
    doc.set_property(id, "Inputs", inputs).unwrap();
    id
}

fn result(doc: &Document, id: ObjectId) -> f64 {
    doc.object(id).unwrap().properties().float("Result").unwrap()
}

#[test]
fn test_touch_propagates_to_dependents() {
    let mut doc = counter_document();
    let a = add_counter(&mut doc, "A", vec![]);
    let b = add_counter(&mut doc, "B", vec![a]);
    doc.recompute();
    take_calls();

    doc.set_property(a, "Size", 5.0).unwrap();
    let report = doc.recompute();

    assert_eq!(take_calls(), vec!["A", "B"]);
    assert!(report.is_ok());
    assert_eq!(doc.object(b).unwrap().status(), ObjectStatus::Valid);
    assert_eq!(result(&doc, b), 6.0);
}

#[test]
fn test_dependencies_run_first_regardless_of_creation_order() {
    let mut doc = counter_document();
    let sum = add_counter(&mut doc, "Sum", vec![]);
    let left = add_counter(&mut doc, "Left", vec![]);
    let right = add_counter(&mut doc, "Right", vec![left]);
    doc.set_property(sum, "Inputs", vec![left, right]).unwrap();

    doc.recompute();

    assert_eq!(take_calls(), vec!["Left", "Right", "Sum"]);
    assert_eq!(result(&doc, sum), 1.0 + 1.0 + 2.0);
}

#[test]
fn test_second_recompute_is_idle() {
    let mut doc = counter_document();
    let a = add_counter(&mut doc, "A", vec![]);
    add_counter(&mut doc, "B", vec![a]);

    let first = doc.recompute();
    assert_eq!(first.executed.len(), 2);
    take_calls();

    let second = doc.recompute();
    assert!(take_calls().is_empty());
    assert_eq!(second.visited(), 0);
    assert!(!doc.is_touched());
}

#[test]
fn test_cycle_is_contained() {
    let mut doc = counter_document();
    let a = add_counter(&mut doc, "A", vec![]);
    let b = add_counter(&mut doc, "B", vec![]);
    let c = add_counter(&mut doc, "C", vec![a]);
    doc.set_property(a, "Inputs", vec![b]).unwrap();
    doc.set_property(b, "Inputs", vec![c]).unwrap();
    let d = add_counter(&mut doc, "D", vec![c]);
    let e = add_counter(&mut doc, "E", vec![]);

    let report = doc.recompute();

    for id in [a, b, c] {
        let object = doc.object(id).unwrap();
        assert_eq!(object.status(), ObjectStatus::Error);
        assert_eq!(
            object.error_log().unwrap().failure,
            RecomputeFailure::CyclicDependency
        );
    }
    assert!(matches!(
        doc.object(d).unwrap().error_log().unwrap().failure,
        RecomputeFailure::UpstreamCycle(_)
    ));
    assert_eq!(doc.object(e).unwrap().status(), ObjectStatus::Valid);
    assert_eq!(take_calls(), vec!["E"]);
    assert_eq!(report.failed.len(), 4);
    assert_eq!(doc.get_recompute_log().len(), 4);
    assert!(doc.check_on_cycle());
}

#[test]
fn test_breaking_a_cycle_recovers() {
    let mut doc = counter_document();
    let a = add_counter(&mut doc, "A", vec![]);
    let b = add_counter(&mut doc, "B", vec![a]);
    doc.set_property(a, "Inputs", vec![b]).unwrap();
    doc.recompute();
    assert!(doc.object(a).unwrap().is_error());

    doc.set_property(a, "Inputs", Vec::<ObjectId>::new()).unwrap();
    doc.touch_object(b).unwrap();
    let report = doc.recompute();

    assert!(report.is_ok());
    assert!(doc.object(a).unwrap().is_valid());
    assert!(doc.object(b).unwrap().is_valid());
    assert!(!doc.check_on_cycle());
}

#[test]
fn test_box_and_fillet() {
    let mut doc = Document::new("Unnamed");
    let base = doc.add_object("Part::Box", None).unwrap();
    let fillet = doc.add_object("Part::Fillet", None).unwrap();
    doc.set_property(fillet, "Base", base).unwrap();
    doc.set_property(fillet, "Radius", 2.0).unwrap();
    assert!(doc.recompute().is_ok());

    // Invalid length is rejected and nothing is touched
    let err = doc.set_property(base, "Length", -5.0).unwrap_err();
    assert!(matches!(
        err,
        DocumentError::Property(PropertyError::ConstraintViolation { .. })
    ));
    assert_eq!(
        doc.object(base).unwrap().properties().float("Length").unwrap(),
        10.0
    );
    assert!(!doc.object(fillet).unwrap().is_touched());

    // Valid length recomputes both
    doc.set_property(base, "Length", 10.0).unwrap();
    assert!(doc.object(base).unwrap().is_touched());
    let report = doc.recompute();
    assert_eq!(report.executed, vec![base, fillet]);
    assert_eq!(doc.object(fillet).unwrap().status(), ObjectStatus::Valid);

    // A short edge breaks only the fillet
    doc.set_property(base, "Width", 3.5).unwrap();
    let report = doc.recompute();
    assert_eq!(report.executed, vec![base]);
    assert_eq!(doc.object(base).unwrap().status(), ObjectStatus::Valid);
    assert_eq!(doc.object(fillet).unwrap().status(), ObjectStatus::Error);
    assert!(doc.error_description(fillet).is_some());
}

#[test]
fn test_failed_object_stays_failed_until_fixed() {
    let mut doc = Document::new("Unnamed");
    let base = doc.add_object("Part::Box", None).unwrap();
    let fillet = doc.add_object("Part::Fillet", None).unwrap();
    doc.set_property(fillet, "Base", base).unwrap();
    doc.set_property(fillet, "Radius", 6.0).unwrap();

    doc.recompute();
    assert!(doc.object(fillet).unwrap().is_error());
    assert!(!doc.is_touched());

    doc.set_property(fillet, "Radius", 1.0).unwrap();
    let report = doc.recompute();

    assert_eq!(report.executed, vec![fillet]);
    assert!(doc.object(fillet).unwrap().is_valid());
    assert!(doc.object(fillet).unwrap().error_log().is_none());
}

fn failing_fillet() -> (Document, ObjectId) {
    let mut doc = Document::new("Unnamed");
    let base = doc.add_object("Part::Box", None).unwrap();
    let fillet = doc.add_object("Part::Fillet", None).unwrap();
    doc.set_property(fillet, "Base", base).unwrap();
    doc.set_property(fillet, "Radius", 6.0).unwrap();
    doc.recompute();
    assert!(doc.object(fillet).unwrap().is_error());
    (doc, fillet)
}

#[test]
fn test_label_edit_keeps_failure() {
    let (mut doc, fillet) = failing_fillet();
    let fusion = doc.add_object("Part::Fusion", None).unwrap();
    doc.set_property(fusion, "Shapes", vec![fillet]).unwrap();
    doc.recompute();

    doc.set_property(fillet, "Label", "Renamed").unwrap();
    let report = doc.recompute();

    assert!(report.executed.is_empty());
    let object = doc.object(fillet).unwrap();
    assert_eq!(object.status(), ObjectStatus::Error);
    assert!(object.error_log().is_some());
    assert!(doc.object(fusion).unwrap().is_error());
    assert!(!doc.is_touched());
}

#[test]
fn test_purge_keeps_failure() {
    let (mut doc, fillet) = failing_fillet();

    doc.set_property(fillet, "Label", "Renamed").unwrap();
    assert!(doc.object(fillet).unwrap().is_touched());
    doc.purge_touched();

    let object = doc.object(fillet).unwrap();
    assert_eq!(object.status(), ObjectStatus::Error);
    assert!(object.error_log().is_some());
    assert!(!doc.is_touched());
}

#[test]
fn test_touch_of_visited_object_waits_for_next_pass() {
    let mut doc = counter_document();
    let a = add_counter(&mut doc, "A", vec![]);
    let toucher = doc.add_object("Test::Toucher", Some("T")).unwrap();
    doc.set_property(toucher, "Inputs", vec![a]).unwrap();
    TOUCH_TARGET.with(|t| t.set(None));
    doc.recompute();
    take_calls();

    TOUCH_TARGET.with(|t| t.set(Some(a)));
    doc.set_property(a, "Size", 2.0).unwrap();
    let report = doc.recompute();

    assert_eq!(take_calls(), vec!["A", "T"]);
    assert_eq!(report.deferred, vec![a]);
    assert!(doc.object(a).unwrap().is_touched());
    assert!(!doc.object(toucher).unwrap().is_touched());

    TOUCH_TARGET.with(|t| t.set(None));
    let report = doc.recompute();
    assert_eq!(take_calls(), vec!["A", "T"]);
    assert!(report.deferred.is_empty());
    assert!(!doc.is_touched());
}

#[test]
fn test_touch_of_later_object_applies_in_same_pass() {
    let mut doc = counter_document();
    let toucher = doc.add_object("Test::Toucher", Some("T")).unwrap();
    let x = add_counter(&mut doc, "X", vec![toucher]);
    TOUCH_TARGET.with(|t| t.set(None));
    doc.recompute();
    take_calls();

    // Without the request X is skipped: T reports no change
    doc.touch_object(toucher).unwrap();
    let report = doc.recompute();
    assert_eq!(take_calls(), vec!["T"]);
    assert_eq!(report.skipped, vec![x]);

    TOUCH_TARGET.with(|t| t.set(Some(x)));
    doc.touch_object(toucher).unwrap();
    let report = doc.recompute();

    assert_eq!(take_calls(), vec!["T", "X"]);
    assert_eq!(report.executed, vec![toucher, x]);
    assert!(report.deferred.is_empty());
    assert!(!doc.is_touched());
}

#[test]
fn test_self_touch_is_coalesced() {
    let mut doc = counter_document();
    let toucher = doc.add_object("Test::Toucher", Some("T")).unwrap();
    TOUCH_TARGET.with(|t| t.set(Some(toucher)));

    let report = doc.recompute();

    assert_eq!(take_calls(), vec!["T"]);
    assert!(report.deferred.is_empty());
    assert!(!doc.is_touched());
    assert_eq!(doc.recompute().visited(), 0);
    assert!(take_calls().is_empty());
}
