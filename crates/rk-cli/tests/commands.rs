//! Integration tests for the rkdoc commands.

use rk_cli::commands;
use rk_document::{AppConfig, Application};

#[test]
fn test_demo_then_recompute() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("demo.ron");

    let summary = commands::demo(&mut Application::default(), &path).unwrap();
    assert_eq!(summary.executed, vec!["Box", "Fillet", "Cylinder"]);
    assert!(!summary.has_failures());

    let objects = commands::inspect(&mut Application::default(), &path).unwrap();
    let names: Vec<&str> = objects.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, vec!["Box", "Fillet", "Cylinder"]);
    assert_eq!(objects[1].dependencies, vec!["Box"]);
    assert!(objects.iter().all(|o| o.status == "New"));

    let summary = commands::recompute(&mut Application::default(), &path, false).unwrap();
    assert_eq!(summary.executed.len(), 3);
    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["document"], "Demo");
}

#[test]
fn test_graph_lists_edges() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("demo.ron");
    commands::demo(&mut Application::default(), &path).unwrap();

    let dot = commands::graph(&mut Application::default(), &path).unwrap();

    assert!(dot.starts_with("digraph"));
    assert!(dot.contains("\"Fillet\" -> \"Box\" [label=\"Base\"]"));
}

#[test]
fn test_demo_records_author() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("demo.ron");
    let config = AppConfig {
        author: "Ada".into(),
        ..Default::default()
    };
    commands::demo(&mut Application::new(config), &path).unwrap();

    let mut app = Application::default();
    let doc = app.open_document(&path).unwrap();
    assert_eq!(doc.properties().text("CreatedBy").unwrap(), "Ada");
    assert_eq!(doc.properties().text("LastModifiedBy").unwrap(), "Ada");
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = commands::inspect(&mut Application::default(), &dir.path().join("none.ron"));
    assert!(result.is_err());
}
