//! The sort compiler: sort specs to an ORDER BY fragment.

use crate::error::Result;
use crate::field::{map_field, FieldMapper};

/// Ascending direction suffix. Optional, and the default when omitted.
pub const SORT_ASCENDING: &str = "asc";
/// Descending direction suffix.
pub const SORT_DESCENDING: &str = "desc";

/// Compile an ordered list of `field[:asc|:desc]` specs into a SQL ORDER BY
/// fragment. Direction suffixes are case-insensitive; the emitted keywords
/// are uppercase. Unlike the condition compiler, input order is significant
/// and preserved.
pub fn gen_sort_string(sort_fields: &[String], mapper: Option<FieldMapper>) -> Result<String> {
    let mut parts: Vec<String> = Vec::with_capacity(sort_fields.len());

    for field in sort_fields {
        let lower = field.to_lowercase();
        let desc_suffix = format!(":{SORT_DESCENDING}");
        let asc_suffix = format!(":{SORT_ASCENDING}");

        if lower.ends_with(&desc_suffix) {
            let name = field[..field.len() - desc_suffix.len()].trim();
            let mapped = map_field(name, mapper)?;
            parts.push(format!("{mapped} DESC"));
        } else {
            let name = if lower.ends_with(&asc_suffix) {
                field[..field.len() - asc_suffix.len()].trim()
            } else {
                field.as_str()
            };
            let mapped = map_field(name, mapper)?;
            parts.push(format!("{mapped} ASC"));
        }
    }

    Ok(parts.join(", "))
}
