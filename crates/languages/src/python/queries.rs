//! Tree-sitter queries for Python

/// Functions, classes and class-level attributes
pub const DEFINITIONS: &str = r#"
(function_definition
  name: (identifier) @name) @definition.function

(class_definition
  name: (identifier) @name) @definition.type

(class_definition
  body: (block
    (expression_statement
      (assignment
        left: (identifier) @name) @definition.field)))
"#;

/// Call sites: plain calls and attribute calls (`obj.method()`)
pub const CALLS: &str = r#"
(call
  function: (identifier) @callee) @call

(call
  function: (attribute
    attribute: (identifier) @callee)) @call
"#;

/// Base classes
pub const RELATIONS: &str = r#"
(class_definition
  superclasses: (argument_list
    (identifier) @target)) @relation.inherits

(class_definition
  superclasses: (argument_list
    (attribute
      attribute: (identifier) @target))) @relation.inherits
"#;

/// `import x` and `from m import x`
pub const IMPORTS: &str = r#"
(import_statement
  name: (dotted_name) @import)

(import_statement
  name: (aliased_import
    name: (dotted_name) @import))

(import_from_statement
  name: (dotted_name) @import)

(import_from_statement
  name: (aliased_import
    name: (dotted_name) @import))
"#;

/// Annotated parameter and return types
pub const TYPE_REFS: &str = r#"
(typed_parameter
  type: (type
    (identifier) @ref))

(typed_default_parameter
  type: (type
    (identifier) @ref))

(function_definition
  return_type: (type
    (identifier) @ref))
"#;
