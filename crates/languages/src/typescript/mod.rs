//! TypeScript grammar rules
//!
//! Signature and docstring rules are JavaScript's; this module adds the
//! builtin type names filtered from type references.

pub(crate) mod queries;

pub(crate) const BUILTIN_TYPES: &[&str] = &[
    "string", "number", "boolean", "bigint", "symbol", "object", "any", "unknown", "never",
    "void", "undefined", "null", "Array", "Promise", "Record", "Partial", "Readonly", "Map",
    "Set", "Date", "Error", "Function",
];
