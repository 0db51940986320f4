//! Object Type Registry
//!
//! Maps type names such as `Part::Box` to constructors of their behavior.

use std::collections::HashMap;

use crate::features::{BoxFeature, Cylinder, Fillet, Fusion, Group};
use crate::object::ObjectBehavior;

/// Constructor of an object behavior
pub type BehaviorConstructor = fn() -> Box<dyn ObjectBehavior>;

/// Registry of creatable object types
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    constructors: HashMap<String, BehaviorConstructor>,
}

impl TypeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in type
    pub fn with_builtin_types() -> Self {
        let mut registry = Self::new();
        registry.register(BoxFeature::TYPE_NAME, || Box::new(BoxFeature));
        registry.register(Cylinder::TYPE_NAME, || Box::new(Cylinder));
        registry.register(Fillet::TYPE_NAME, || Box::new(Fillet));
        registry.register(Fusion::TYPE_NAME, || Box::new(Fusion));
        registry.register(Group::TYPE_NAME, || Box::new(Group));
        registry
    }

    /// Register a type, replacing any previous constructor of that name
    pub fn register(&mut self, type_name: impl Into<String>, constructor: BehaviorConstructor) {
        let type_name = type_name.into();
        if self.constructors.insert(type_name.clone(), constructor).is_some() {
            tracing::debug!("Replaced constructor of {}", type_name);
        }
    }

    /// Instantiate a behavior
    pub fn create(&self, type_name: &str) -> Option<Box<dyn ObjectBehavior>> {
        self.constructors.get(type_name).map(|ctor| ctor())
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.constructors.contains_key(type_name)
    }

    /// Registered names, sorted
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_types() {
        let registry = TypeRegistry::with_builtin_types();
        assert_eq!(
            registry.type_names(),
            vec![
                "App::Group",
                "Part::Box",
                "Part::Cylinder",
                "Part::Fillet",
                "Part::Fusion"
            ]
        );
        let behavior = registry.create("Part::Fillet").unwrap();
        assert_eq!(behavior.type_name(), "Part::Fillet");
        assert!(registry.create("Part::Sphere").is_none());
    }
}
