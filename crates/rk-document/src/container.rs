//! Property Container
//!
//! Named, insertion-ordered bag of properties shared by the document and by
//! every document object.

use crate::object::ObjectId;
use crate::persistence::{
    DocumentReader, DocumentWriter, LinkNames, PersistenceResult, PropertyRecord,
};
use crate::property::{
    ContainerRef, NullObserver, Property, PropertyError, PropertyObserver, PropertyResult,
    PropertySpec, PropertyType, PropertyValue,
};

/// A named bag of properties
#[derive(Debug, Clone)]
pub struct PropertyContainer {
    name: String,
    owner: ContainerRef,
    /// Properties in declaration order
    properties: Vec<Property>,
}

impl PropertyContainer {
    /// Create an empty container
    pub fn new(name: impl Into<String>, owner: ContainerRef) -> Self {
        Self {
            name: name.into(),
            owner,
            properties: Vec::new(),
        }
    }

    /// Create a container from a list of declarations
    pub fn with_properties(
        name: impl Into<String>,
        owner: ContainerRef,
        specs: impl IntoIterator<Item = PropertySpec>,
    ) -> PropertyResult<Self> {
        let mut container = Self::new(name, owner);
        for spec in specs {
            container.add_property(spec)?;
        }
        Ok(container)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn owner(&self) -> ContainerRef {
        self.owner
    }

    /// Declare a new property; names are unique within a container
    pub fn add_property(&mut self, spec: PropertySpec) -> PropertyResult<()> {
        if self.contains(&spec.name) {
            return Err(PropertyError::Duplicate(spec.name));
        }
        self.properties.push(Property::from_spec(spec, self.owner)?);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name() == name)
    }

    fn find_mut(&mut self, name: &str) -> PropertyResult<&mut Property> {
        self.properties
            .iter_mut()
            .find(|p| p.name() == name)
            .ok_or_else(|| PropertyError::NotFound(name.to_string()))
    }

    /// Get a property value by name
    pub fn value(&self, name: &str) -> Option<&PropertyValue> {
        self.get(name).map(Property::value)
    }

    /// Get a property value, failing with `NotFound`
    pub fn require(&self, name: &str) -> PropertyResult<&PropertyValue> {
        self.value(name)
            .ok_or_else(|| PropertyError::NotFound(name.to_string()))
    }

    /// Get a float property
    pub fn float(&self, name: &str) -> PropertyResult<f64> {
        let value = self.require(name)?;
        value
            .as_float()
            .ok_or_else(|| self.mismatch(name, value, PropertyType::Float))
    }

    /// Get a text property
    pub fn text(&self, name: &str) -> PropertyResult<&str> {
        let value = self.require(name)?;
        value
            .as_text()
            .ok_or_else(|| self.mismatch(name, value, PropertyType::Text))
    }

    fn mismatch(
        &self,
        name: &str,
        value: &PropertyValue,
        expected: PropertyType,
    ) -> PropertyError {
        PropertyError::TypeMismatch {
            property: name.to_string(),
            expected,
            found: value.property_type(),
        }
    }

    /// Iterate properties in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter()
    }

    /// Property names in declaration order
    pub fn names(&self) -> Vec<&str> {
        self.properties.iter().map(Property::name).collect()
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Validated write with notifications
    pub fn set_value(
        &mut self,
        name: &str,
        value: PropertyValue,
        observer: &mut dyn PropertyObserver,
    ) -> PropertyResult<()> {
        self.find_mut(name)?.set(value, observer)
    }

    /// Type-checked write bypassing read-only and constraint; returns the old value
    pub(crate) fn replace_value(
        &mut self,
        name: &str,
        value: PropertyValue,
        observer: &mut dyn PropertyObserver,
    ) -> PropertyResult<PropertyValue> {
        self.find_mut(name)?.replace(value, observer)
    }

    /// Write without any notification
    pub(crate) fn restore_value(&mut self, name: &str, value: PropertyValue) -> PropertyResult<()> {
        let prop = self.find_mut(name)?;
        prop.enable_notify(false);
        let result = prop.replace(value, &mut NullObserver);
        prop.enable_notify(true);
        result.map(|_| ())
    }

    /// Force the change notification of a property
    pub fn touch(&self, name: &str, observer: &mut dyn PropertyObserver) -> PropertyResult<()> {
        let prop = self
            .get(name)
            .ok_or_else(|| PropertyError::NotFound(name.to_string()))?;
        prop.touch(observer);
        Ok(())
    }

    /// Link-typed properties and the ids they reference, in declaration order
    pub fn links(&self) -> Vec<(&str, ObjectId)> {
        self.properties
            .iter()
            .flat_map(|p| p.value().links().iter().map(move |id| (p.name(), *id)))
            .collect()
    }

    pub fn mem_size(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.name.capacity()
            + self.properties.iter().map(Property::mem_size).sum::<usize>()
    }

    // ============== Persistence ==============

    /// Write every non-transient property as an ordered record
    pub fn save(&self, writer: &mut dyn DocumentWriter, names: &LinkNames) -> PersistenceResult<()> {
        for prop in self.properties.iter().filter(|p| !p.is_transient()) {
            writer.write_property(PropertyRecord::encode(prop, names))?;
        }
        Ok(())
    }

    /// Read records until the end of this container, with notification disabled
    pub fn restore(
        &mut self,
        reader: &mut dyn DocumentReader,
        names: &LinkNames,
    ) -> PersistenceResult<()> {
        while let Some(record) = reader.next_property()? {
            let Some(prop) = self.get(&record.name) else {
                tracing::warn!("Skipping unknown property {} on {}", record.name, self.name);
                continue;
            };
            if record.type_tag != prop.property_type().type_tag() {
                tracing::warn!(
                    "Skipping {}.{}: saved as {}, declared as {}",
                    self.name,
                    record.name,
                    record.type_tag,
                    prop.property_type()
                );
                continue;
            }
            let value = record.value.decode(names);
            self.restore_value(&record.name, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::{PropertyConstraint, PropertyFlags};

    fn sample() -> PropertyContainer {
        PropertyContainer::with_properties(
            "Box",
            ContainerRef::Document,
            [
                PropertySpec::text("Label", "Box"),
                PropertySpec::float("Length", 10.0).with_constraint(PropertyConstraint::Positive),
                PropertySpec::float("Width", 5.0),
                PropertySpec::link("Base"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_insertion_order() {
        let container = sample();
        assert_eq!(container.names(), vec!["Label", "Length", "Width", "Base"]);
    }

    #[test]
    fn test_duplicate_property() {
        let mut container = sample();
        let err = container
            .add_property(PropertySpec::float("Length", 1.0))
            .unwrap_err();
        assert_eq!(err, PropertyError::Duplicate("Length".into()));
        assert_eq!(container.len(), 4);
    }

    #[test]
    fn test_set_value_and_typed_getters() {
        let mut container = sample();
        container
            .set_value("Width", PropertyValue::Float(7.5), &mut NullObserver)
            .unwrap();

        assert_eq!(container.float("Width").unwrap(), 7.5);
        assert_eq!(container.text("Label").unwrap(), "Box");
        assert!(matches!(
            container.float("Label"),
            Err(PropertyError::TypeMismatch { .. })
        ));
        assert!(matches!(
            container.set_value("Depth", PropertyValue::Float(1.0), &mut NullObserver),
            Err(PropertyError::NotFound(_))
        ));
    }

    #[test]
    fn test_links() {
        let mut container = sample();
        let target = ObjectId::new();
        container
            .set_value("Base", PropertyValue::Link(Some(target)), &mut NullObserver)
            .unwrap();

        assert_eq!(container.links(), vec![("Base", target)]);
    }

    #[test]
    fn test_save_restore_skips_transient() {
        let mut container = sample();
        container
            .add_property(PropertySpec::float("Cache", 3.0).with_flags(PropertyFlags::TRANSIENT))
            .unwrap();
        container
            .set_value("Length", PropertyValue::Float(42.0), &mut NullObserver)
            .unwrap();

        let names = LinkNames::default();
        let mut file = crate::persistence::DocumentFile::default();
        file.begin_container(crate::persistence::ContainerHeader::Document {
            name: "Doc".into(),
        })
        .unwrap();
        container.save(&mut file, &names).unwrap();
        assert!(file.properties.iter().all(|r| r.name != "Cache"));

        let mut restored = sample();
        let mut reader = file.reader();
        reader.next_container().unwrap();
        restored.restore(&mut reader, &names).unwrap();
        assert_eq!(restored.float("Length").unwrap(), 42.0);
    }
}
