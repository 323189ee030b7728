// src/models/schema.rs

//! Schema-driven rendering for persisted entities.
//!
//! Entities declare their fields once through [`Schema`]; [`render`] turns
//! that declaration into `Name(field=value, ...)`. `Display` impls delegate
//! here instead of building strings by hand.

use std::fmt;

use serde_json::Value;

/// A persisted entity with a fixed list of declared fields.
pub trait Schema {
    /// Entity name used as the rendering prefix.
    const NAME: &'static str;

    /// Declared fields in declaration order.
    fn fields(&self) -> Vec<(&'static str, Value)>;
}

/// Render an entity as `Name(field=value, ...)`.
///
/// Strings are rendered bare, everything else as compact JSON.
pub fn render<S: Schema + ?Sized>(entity: &S, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}(", S::NAME)?;
    for (i, (name, value)) in entity.fields().iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        match value {
            Value::String(s) => write!(f, "{name}={s}")?,
            other => write!(f, "{name}={other}")?,
        }
    }
    f.write_str(")")
}
