//! Tree-sitter queries for TypeScript and TSX
//!
//! Calls and imports are shared with JavaScript since the TypeScript
//! grammar extends it.

pub use crate::javascript::queries::{CALLS, IMPORTS};

/// Declarations including interfaces, aliases, enums and member signatures
pub const DEFINITIONS: &str = r#"
(function_declaration
  name: (identifier) @name) @definition.function

(generator_function_declaration
  name: (identifier) @name) @definition.function

(class_declaration
  name: (type_identifier) @name) @definition.type

(abstract_class_declaration
  name: (type_identifier) @name) @definition.type

(interface_declaration
  name: (type_identifier) @name) @definition.interface

(type_alias_declaration
  name: (type_identifier) @name) @definition.type

(enum_declaration
  name: (identifier) @name) @definition.type

(method_definition
  name: (property_identifier) @name) @definition.method

(method_signature
  name: (property_identifier) @name) @definition.method

(public_field_definition
  name: (property_identifier) @name) @definition.field

(property_signature
  name: (property_identifier) @name) @definition.field

(variable_declarator
  name: (identifier) @name
  value: [(arrow_function) (function_expression)]) @definition.function
"#;

/// `extends` and `implements` clauses on classes and interfaces
pub const RELATIONS: &str = r#"
(class_declaration
  (class_heritage
    (extends_clause
      (identifier) @target))) @relation.inherits

(class_declaration
  (class_heritage
    (implements_clause
      (type_identifier) @target))) @relation.implements

(abstract_class_declaration
  (class_heritage
    (extends_clause
      (identifier) @target))) @relation.inherits

(abstract_class_declaration
  (class_heritage
    (implements_clause
      (type_identifier) @target))) @relation.implements

(interface_declaration
  (extends_type_clause
    (type_identifier) @target)) @relation.inherits
"#;

/// Types named in annotations
pub const TYPE_REFS: &str = r#"
(type_annotation
  (type_identifier) @ref)

(type_annotation
  (generic_type
    name: (type_identifier) @ref))
"#;
