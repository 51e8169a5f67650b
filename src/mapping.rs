//! Seams to the object-mapping layer.
//!
//! The compiler asks a [`Mapping`] which predicate a member is stored under
//! and which RDF classes a type corresponds to. The executor hands grouped
//! triples to a [`Materializer`] to build objects. [`StaticMapping`] is a
//! table-driven implementation for callers that do not generate mappings
//! from an ontology.

use std::collections::HashMap;

use crate::compiler::model::TypeRef;
use crate::error::Result;
use crate::value::Value;

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

/// Resolves members and types of the object model to RDF vocabulary.
pub trait Mapping {
    /// The predicate URI a member of `declaring_type` is stored under.
    fn predicate(&self, declaring_type: &str, member: &str) -> Option<String>;

    /// The RDF classes instances of `ty` are typed with.
    fn rdf_classes(&self, ty: &TypeRef) -> Vec<String>;

    /// Classes of the known mapped subtypes of `ty`.
    ///
    /// Used to enumerate acceptable classes when the store does not reason.
    fn subclasses(&self, _ty: &TypeRef) -> Vec<String> {
        Vec::new()
    }
}

/// Table-driven [`Mapping`].
#[derive(Debug, Clone, Default)]
pub struct StaticMapping {
    predicates: HashMap<(String, String), String>,
    classes: HashMap<String, Vec<String>>,
    subtypes: HashMap<String, Vec<String>>,
}

impl StaticMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `declaring_type.member` to a predicate.
    pub fn property(mut self, declaring_type: &str, member: &str, predicate: &str) -> Self {
        self.predicates.insert(
            (declaring_type.to_string(), member.to_string()),
            predicate.to_string(),
        );
        self
    }

    /// Map a type to an RDF class. May be called repeatedly per type.
    pub fn class(mut self, type_name: &str, class: &str) -> Self {
        self.classes
            .entry(type_name.to_string())
            .or_default()
            .push(class.to_string());
        self
    }

    /// Declare `subtype` as a mapped subtype of `supertype`.
    ///
    /// Members declared on the supertype resolve for the subtype as well.
    pub fn subtype(mut self, supertype: &str, subtype: &str) -> Self {
        self.subtypes
            .entry(supertype.to_string())
            .or_default()
            .push(subtype.to_string());
        self
    }

    fn descendants(&self, type_name: &str, out: &mut Vec<String>) {
        if let Some(children) = self.subtypes.get(type_name) {
            for child in children {
                if !out.contains(child) {
                    out.push(child.clone());
                    self.descendants(child, out);
                }
            }
        }
    }

    fn supertype_of(&self, type_name: &str) -> Option<&str> {
        self.subtypes
            .iter()
            .find(|(_, children)| children.iter().any(|c| c == type_name))
            .map(|(parent, _)| parent.as_str())
    }
}

impl Mapping for StaticMapping {
    fn predicate(&self, declaring_type: &str, member: &str) -> Option<String> {
        let mut current = Some(declaring_type);
        while let Some(ty) = current {
            if let Some(p) = self.predicates.get(&(ty.to_string(), member.to_string())) {
                return Some(p.clone());
            }
            current = self.supertype_of(ty);
        }
        None
    }

    fn rdf_classes(&self, ty: &TypeRef) -> Vec<String> {
        self.classes.get(&ty.name).cloned().unwrap_or_default()
    }

    fn subclasses(&self, ty: &TypeRef) -> Vec<String> {
        let mut types = Vec::new();
        self.descendants(&ty.name, &mut types);

        let mut classes: Vec<String> = Vec::new();
        for t in types {
            for class in self.classes.get(&t).into_iter().flatten() {
                if !classes.contains(class) {
                    classes.push(class.clone());
                }
            }
        }
        classes
    }
}

/// A subject with its classes and property values, grouped from triples.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceData {
    pub uri: String,
    /// Objects of `rdf:type` triples.
    pub types: Vec<String>,
    /// Predicate URI to values, in first-seen order.
    pub properties: Vec<(String, Vec<Value>)>,
}

impl ResourceData {
    pub fn new(uri: &str) -> Self {
        ResourceData {
            uri: uri.to_string(),
            ..Self::default()
        }
    }

    /// Add a value, routing `rdf:type` objects to [`ResourceData::types`].
    pub fn add(&mut self, predicate: &str, value: Value) {
        if predicate == RDF_TYPE
            && let Value::Uri(class) = &value
        {
            if !self.types.contains(class) {
                self.types.push(class.clone());
            }
            return;
        }

        match self.properties.iter_mut().find(|(p, _)| p == predicate) {
            Some((_, values)) => {
                if !values.contains(&value) {
                    values.push(value);
                }
            }
            None => self.properties.push((predicate.to_string(), vec![value])),
        }
    }

    pub fn values(&self, predicate: &str) -> &[Value] {
        self.properties
            .iter()
            .find(|(p, _)| p == predicate)
            .map(|(_, v)| v.as_slice())
            .unwrap_or(&[])
    }
}

/// Builds result objects from grouped resource data.
pub trait Materializer {
    type Output;

    fn materialize(&self, item_type: &TypeRef, resource: ResourceData) -> Result<Self::Output>;
}

/// Materializer that returns the grouped data unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawResources;

impl Materializer for RawResources {
    type Output = ResourceData;

    fn materialize(&self, _item_type: &TypeRef, resource: ResourceData) -> Result<ResourceData> {
        Ok(resource)
    }
}
