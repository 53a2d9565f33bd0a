//! Tree-sitter queries for Go

/// Functions, methods, named types and struct fields
///
/// Interface method elements are collected by walking the interface body,
/// see `go::interface_methods`.
pub const DEFINITIONS: &str = r#"
(function_declaration
  name: (identifier) @name) @definition.function

(method_declaration
  name: (field_identifier) @name) @definition.method

(type_spec
  name: (type_identifier) @name) @definition.type

(field_declaration
  name: (field_identifier) @name) @definition.field
"#;

/// Call sites: plain and selector calls (`pkg.Fn()`, `recv.Method()`)
pub const CALLS: &str = r#"
(call_expression
  function: (identifier) @callee) @call

(call_expression
  function: (selector_expression
    field: (field_identifier) @callee)) @call
"#;

/// Struct embedding
pub const RELATIONS: &str = r#"
(field_declaration
  !name
  type: (type_identifier) @target) @relation.inherits

(field_declaration
  !name
  type: (pointer_type
    (type_identifier) @target)) @relation.inherits
"#;

/// Import specs
pub const IMPORTS: &str = r#"
(import_spec
  path: (interpreted_string_literal) @import)
"#;

/// Types named in parameters, results and fields
pub const TYPE_REFS: &str = r#"
(parameter_declaration
  type: (type_identifier) @ref)

(parameter_declaration
  type: (pointer_type
    (type_identifier) @ref))

(function_declaration
  result: (type_identifier) @ref)

(method_declaration
  result: (type_identifier) @ref)

(field_declaration
  name: (field_identifier)
  type: (type_identifier) @ref)
"#;
