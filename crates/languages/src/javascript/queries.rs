//! Tree-sitter queries for JavaScript

/// Functions, classes, methods, class fields and function-valued bindings
pub const DEFINITIONS: &str = r#"
(function_declaration
  name: (identifier) @name) @definition.function

(generator_function_declaration
  name: (identifier) @name) @definition.function

(class_declaration
  name: (identifier) @name) @definition.type

(method_definition
  name: (property_identifier) @name) @definition.method

(field_definition
  property: (property_identifier) @name) @definition.field

(variable_declarator
  name: (identifier) @name
  value: [(arrow_function) (function_expression)]) @definition.function
"#;

/// Call sites, member calls and constructor calls
pub const CALLS: &str = r#"
(call_expression
  function: (identifier) @callee) @call

(call_expression
  function: (member_expression
    property: (property_identifier) @callee)) @call

(new_expression
  constructor: (identifier) @callee) @call
"#;

/// `class A extends B`
pub const RELATIONS: &str = r#"
(class_declaration
  (class_heritage
    (identifier) @target)) @relation.inherits

(class_declaration
  (class_heritage
    (member_expression
      property: (property_identifier) @target))) @relation.inherits
"#;

/// ES module imports
pub const IMPORTS: &str = r#"
(import_statement
  (import_clause
    (identifier) @import))

(import_statement
  (import_clause
    (named_imports
      (import_specifier
        name: (identifier) @import))))

(import_statement
  (import_clause
    (namespace_import
      (identifier) @import)))
"#;
