//! Tree-sitter queries for Rust

/// Declarations, plus `impl` blocks as naming scopes
pub const DEFINITIONS: &str = r#"
(function_item
  name: (identifier) @name) @definition.function

(function_signature_item
  name: (identifier) @name) @definition.function

(struct_item
  name: (type_identifier) @name) @definition.type

(enum_item
  name: (type_identifier) @name) @definition.type

(union_item
  name: (type_identifier) @name) @definition.type

(type_item
  name: (type_identifier) @name) @definition.type

(trait_item
  name: (type_identifier) @name) @definition.interface

(mod_item
  name: (identifier) @name
  body: (declaration_list)) @definition.module

(field_declaration
  name: (field_identifier) @name) @definition.field

(enum_variant
  name: (identifier) @name) @definition.field

(impl_item
  type: (type_identifier) @name) @scope

(impl_item
  type: (generic_type
    type: (type_identifier) @name)) @scope

(impl_item
  type: (scoped_type_identifier
    name: (type_identifier) @name)) @scope
"#;

/// Call sites: plain, path-qualified and method calls
pub const CALLS: &str = r#"
(call_expression
  function: (identifier) @callee) @call

(call_expression
  function: (scoped_identifier
    name: (identifier) @callee)) @call

(call_expression
  function: (field_expression
    field: (field_identifier) @callee)) @call

(call_expression
  function: (generic_function
    function: (identifier) @callee)) @call
"#;

/// Trait implementations and supertraits
pub const RELATIONS: &str = r#"
(impl_item
  trait: (type_identifier) @target
  type: (type_identifier) @subject) @relation.implements

(impl_item
  trait: (scoped_type_identifier
    name: (type_identifier) @target)
  type: (type_identifier) @subject) @relation.implements

(impl_item
  trait: (generic_type
    type: (type_identifier) @target)
  type: (type_identifier) @subject) @relation.implements

(impl_item
  trait: (type_identifier) @target
  type: (generic_type
    type: (type_identifier) @subject)) @relation.implements

(trait_item
  bounds: (trait_bounds
    (type_identifier) @target)) @relation.inherits
"#;

/// `use` declarations, one capture per imported leaf
pub const IMPORTS: &str = r#"
(use_declaration
  argument: (identifier) @import)

(use_declaration
  argument: (scoped_identifier
    name: (identifier) @import))

(use_declaration
  argument: (use_as_clause
    path: (scoped_identifier
      name: (identifier) @import)))

(use_declaration
  argument: (scoped_use_list
    list: (use_list
      (identifier) @import)))

(use_declaration
  argument: (scoped_use_list
    list: (use_list
      (scoped_identifier
        name: (identifier) @import))))
"#;

/// Type names used in parameters, return types and fields
pub const TYPE_REFS: &str = r#"
(parameter
  type: (type_identifier) @ref)

(parameter
  type: (reference_type
    type: (type_identifier) @ref))

(parameter
  type: (generic_type
    type: (type_identifier) @ref))

(function_item
  return_type: (type_identifier) @ref)

(function_item
  return_type: (generic_type
    type: (type_identifier) @ref))

(field_declaration
  type: (type_identifier) @ref)
"#;
