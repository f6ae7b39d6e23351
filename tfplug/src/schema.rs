//! Schema types and builders for tfplug
//!
//! This module provides the schema system for describing provider, resource
//! and data source attributes, including nested attributes and validators.

use crate::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use crate::validator::Validator;
use std::collections::HashMap;
use std::sync::Arc;

/// AttributeType defines the type system for Terraform attributes
/// This must match Terraform's type system exactly
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeType {
    String,
    Number, // Always f64
    Bool,
    List(Box<AttributeType>),               // Ordered, allows duplicates
    Set(Box<AttributeType>),                // Unordered, no duplicates
    Map(Box<AttributeType>),                // String keys only
    Object(HashMap<String, AttributeType>), // Fixed structure
}

/// Schema is returned by providers/resources/data sources
/// Version is used for state migration
#[derive(Debug, Clone)]
pub struct Schema {
    pub version: i64,
    pub block: Block,
}

/// Block represents a configuration block
#[derive(Debug, Clone)]
pub struct Block {
    pub version: i64,
    pub attributes: Vec<Attribute>,
    pub description: String,
    pub deprecated: bool,
}

/// Attribute represents a single configuration attribute
#[derive(Clone)]
pub struct Attribute {
    pub name: String,
    pub r#type: AttributeType,
    pub description: String,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub sensitive: bool,
    pub validators: Vec<Arc<dyn Validator>>,
    pub nested_type: Option<NestedType>,
    pub deprecated: bool,
}

// Manual Debug implementation since validators don't implement Debug
impl std::fmt::Debug for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("type", &self.r#type)
            .field("description", &self.description)
            .field("required", &self.required)
            .field("optional", &self.optional)
            .field("computed", &self.computed)
            .field("sensitive", &self.sensitive)
            .field(
                "validators",
                &format!("{} validators", self.validators.len()),
            )
            .field("nested_type", &self.nested_type)
            .field("deprecated", &self.deprecated)
            .finish()
    }
}

/// NestedType for attributes with nested structures
#[derive(Debug, Clone)]
pub struct NestedType {
    pub attributes: Vec<Attribute>,
    pub nesting: ObjectNestingMode,
}

impl NestedType {
    pub fn single(attributes: Vec<Attribute>) -> Self {
        Self {
            attributes,
            nesting: ObjectNestingMode::Single,
        }
    }

    pub fn list(attributes: Vec<Attribute>) -> Self {
        Self {
            attributes,
            nesting: ObjectNestingMode::List,
        }
    }
}

/// ObjectNestingMode for nested attribute objects
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ObjectNestingMode {
    Single,
    List,
    Set,
    Map,
}

impl Schema {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.block.attributes.iter().find(|a| a.name == name)
    }

    /// Check a configuration against the schema: required attributes,
    /// attributes the schema doesn't know about, and attribute validators.
    /// Unknown values are skipped since they can't be judged before apply.
    pub fn validate(&self, config: &DynamicValue) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        validate_attributes(
            &self.block.attributes,
            &config.value,
            &AttributePath::root(),
            &mut diagnostics,
        );
        diagnostics
    }
}

fn validate_attributes(
    attributes: &[Attribute],
    value: &Dynamic,
    base: &AttributePath,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let empty = HashMap::new();
    let values = match value {
        Dynamic::Map(values) => values,
        Dynamic::Null => &empty,
        Dynamic::Unknown => return,
        other => {
            diagnostics.push(
                Diagnostic::error(
                    "Invalid configuration",
                    format!("Expected an object, got {}", other.type_name()),
                )
                .with_attribute(base.clone()),
            );
            return;
        }
    };

    for name in values.keys() {
        if !attributes.iter().any(|a| &a.name == name) {
            diagnostics.push(
                Diagnostic::error(
                    "Unsupported argument",
                    format!("An argument named \"{}\" is not expected here", name),
                )
                .with_attribute(base.clone().attribute(name)),
            );
        }
    }

    for attr in attributes {
        let path = base.clone().attribute(&attr.name);
        let value = values.get(&attr.name).unwrap_or(&Dynamic::Null);

        match value {
            Dynamic::Null => {
                if attr.required {
                    diagnostics.push(
                        Diagnostic::error(
                            "Missing required argument",
                            format!("The argument \"{}\" is required", path),
                        )
                        .with_attribute(path),
                    );
                }
                continue;
            }
            Dynamic::Unknown => continue,
            _ => {}
        }

        if attr.computed && !attr.optional && !attr.required {
            diagnostics.push(
                Diagnostic::error(
                    "Value for unconfigurable attribute",
                    format!("Can't configure a value for \"{}\": its value will be decided automatically", path),
                )
                .with_attribute(path.clone()),
            );
        }

        for validator in &attr.validators {
            validator.validate(value, &path, diagnostics);
        }

        if let Some(nested) = &attr.nested_type {
            match (nested.nesting, value) {
                (ObjectNestingMode::Single, _) => {
                    validate_attributes(&nested.attributes, value, &path, diagnostics)
                }
                (ObjectNestingMode::List | ObjectNestingMode::Set, Dynamic::List(items)) => {
                    for (idx, item) in items.iter().enumerate() {
                        validate_attributes(
                            &nested.attributes,
                            item,
                            &path.clone().index(idx as i64),
                            diagnostics,
                        );
                    }
                }
                (ObjectNestingMode::Map, Dynamic::Map(items)) => {
                    for (key, item) in items {
                        validate_attributes(
                            &nested.attributes,
                            item,
                            &path.clone().key(key),
                            diagnostics,
                        );
                    }
                }
                (_, other) => diagnostics.push(
                    Diagnostic::error(
                        "Invalid configuration",
                        format!("Unexpected {} for nested attribute", other.type_name()),
                    )
                    .with_attribute(path),
                ),
            }
        }
    }
}

/// AttributeBuilder provides fluent API for building attributes
pub struct AttributeBuilder {
    attribute: Attribute,
}

impl AttributeBuilder {
    pub fn new(name: &str, type_: AttributeType) -> Self {
        Self {
            attribute: Attribute {
                name: name.to_string(),
                r#type: type_,
                description: String::new(),
                required: false,
                optional: false,
                computed: false,
                sensitive: false,
                validators: Vec::new(),
                nested_type: None,
                deprecated: false,
            },
        }
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.attribute.description = desc.to_string();
        self
    }

    pub fn required(mut self) -> Self {
        self.attribute.required = true;
        self.attribute.optional = false;
        self
    }

    pub fn optional(mut self) -> Self {
        self.attribute.optional = true;
        self.attribute.required = false;
        self
    }

    pub fn computed(mut self) -> Self {
        self.attribute.computed = true;
        self
    }

    /// Mark as sensitive (hidden)
    pub fn sensitive(mut self) -> Self {
        self.attribute.sensitive = true;
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.attribute.deprecated = true;
        self
    }

    pub fn validator(mut self, validator: impl Validator + 'static) -> Self {
        self.attribute.validators.push(Arc::new(validator));
        self
    }

    /// Set nested type; the attribute type is derived from the nested attributes
    pub fn nested_type(mut self, nested: NestedType) -> Self {
        let object = AttributeType::Object(
            nested
                .attributes
                .iter()
                .map(|a| (a.name.clone(), a.r#type.clone()))
                .collect(),
        );
        self.attribute.r#type = match nested.nesting {
            ObjectNestingMode::Single => object,
            ObjectNestingMode::List => AttributeType::List(Box::new(object)),
            ObjectNestingMode::Set => AttributeType::Set(Box::new(object)),
            ObjectNestingMode::Map => AttributeType::Map(Box::new(object)),
        };
        self.attribute.nested_type = Some(nested);
        self
    }

    pub fn build(self) -> Attribute {
        self.attribute
    }
}

/// SchemaBuilder provides fluent API for building schemas
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self {
            schema: Schema {
                version: 0,
                block: Block {
                    version: 0,
                    attributes: Vec::new(),
                    description: String::new(),
                    deprecated: false,
                },
            },
        }
    }

    pub fn version(mut self, version: i64) -> Self {
        self.schema.version = version;
        self.schema.block.version = version;
        self
    }

    pub fn attribute(mut self, attr: Attribute) -> Self {
        self.schema.block.attributes.push(attr);
        self
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.schema.block.description = desc.to_string();
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.schema.block.deprecated = true;
        self
    }

    pub fn build(self) -> Schema {
        self.schema
    }
}

impl std::default::Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}
