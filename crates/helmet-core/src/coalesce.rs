//! Value coalescing across a chart tree
//!
//! Resolves the caller's values against chart defaults for a whole chart
//! tree at once. The result is a single tree in which the section under a
//! dependency's name holds the values that dependency sees, recursively.
//!
//! Precedence rules:
//! - caller values win over chart defaults; tables deep-merge, scalars and
//!   lists are replaced wholesale
//! - a caller `null` for a defaulted key removes that key
//! - the `global` table of a chart is merged into each dependency's own
//!   `global` table; keys the dependency section already has keep their
//!   value, tables deep-merge with the dependency's keys winning and the
//!   parent's sibling keys surviving

use serde_json::{Map, Value as JsonValue};

use crate::chart::Chart;
use crate::error::{CoreError, Result};
use crate::values::{GLOBAL_KEY, Values, type_name};

type Table = Map<String, JsonValue>;

/// Coalesce caller values with the defaults of `chart` and all its dependencies
pub fn coalesce_values(chart: &Chart, caller: &Values) -> Result<Values> {
    let mut dest = match caller.inner() {
        JsonValue::Object(map) => map.clone(),
        JsonValue::Null => Table::new(),
        other => {
            return Err(CoreError::TypeMismatch {
                chart: chart.name().to_string(),
                found: type_name(other).to_string(),
            });
        }
    };

    coalesce_chart(chart, &mut dest, chart.name())?;
    Ok(Values::from(dest))
}

fn coalesce_chart(chart: &Chart, dest: &mut Table, prefix: &str) -> Result<()> {
    if let Some(defaults) = chart.values.as_table() {
        coalesce_tables(dest, defaults, prefix);
    }
    coalesce_dependencies(chart, dest, prefix)
}

fn coalesce_dependencies(chart: &Chart, dest: &mut Table, prefix: &str) -> Result<()> {
    for dependency in chart.dependencies() {
        let name = dependency.name();
        let slot = dest
            .entry(name.to_string())
            .or_insert_with(|| JsonValue::Object(Table::new()));

        let mut section = match slot {
            JsonValue::Object(section) => std::mem::take(section),
            JsonValue::Null => Table::new(),
            other => {
                return Err(CoreError::TypeMismatch {
                    chart: name.to_string(),
                    found: type_name(other).to_string(),
                });
            }
        };
        let sub_prefix = format!("{}.{}", prefix, name);

        let parent_global = dest.get(GLOBAL_KEY).cloned();
        coalesce_globals(&mut section, parent_global.as_ref(), &sub_prefix);
        coalesce_chart(dependency, &mut section, &sub_prefix)?;

        dest.insert(name.to_string(), JsonValue::Object(section));
    }
    Ok(())
}

/// Merge the parent's `global` table into a dependency section's `global`
fn coalesce_globals(section: &mut Table, parent_global: Option<&JsonValue>, prefix: &str) {
    let parent = match parent_global {
        None | Some(JsonValue::Null) => return ensure_global(section),
        Some(JsonValue::Object(map)) => map,
        Some(_) => {
            tracing::warn!(
                chart = %prefix,
                "skipping globals because the parent {} is not a table",
                GLOBAL_KEY
            );
            return;
        }
    };

    let global = section
        .entry(GLOBAL_KEY.to_string())
        .or_insert_with(|| JsonValue::Object(Table::new()));
    if global.is_null() {
        *global = JsonValue::Object(Table::new());
    }

    let JsonValue::Object(child) = global else {
        tracing::warn!(
            chart = %prefix,
            "skipping globals because the destination {} is not a table",
            GLOBAL_KEY
        );
        return;
    };

    for (key, parent_value) in parent {
        let full_key = format!("{}.{}.{}", prefix, GLOBAL_KEY, key);
        match child.get_mut(key) {
            None => {
                child.insert(key.clone(), parent_value.clone());
            }
            Some(JsonValue::Object(child_table)) => match parent_value {
                JsonValue::Object(parent_table) => {
                    coalesce_tables(child_table, parent_table, &full_key);
                }
                _ => tracing::warn!(
                    key = %full_key,
                    "cannot merge non-table global onto table, keeping the table"
                ),
            },
            Some(_) if parent_value.is_object() => tracing::warn!(
                key = %full_key,
                "cannot merge table global onto non-table, keeping the existing value"
            ),
            Some(_) => {}
        }
    }
}

fn ensure_global(section: &mut Table) {
    section
        .entry(GLOBAL_KEY.to_string())
        .or_insert_with(|| JsonValue::Object(Table::new()));
}

/// Merge `src` into `dst`, with `dst` taking precedence
///
/// Keys missing from `dst` are copied from `src`. A `null` in `dst` for a
/// key `src` defines deletes the key. Tables present on both sides merge
/// recursively; a table/non-table conflict keeps the `dst` value.
fn coalesce_tables(dst: &mut Table, src: &Table, prefix: &str) {
    for (key, src_value) in src {
        let full_key = format!("{}.{}", prefix, key);
        match dst.get_mut(key) {
            None => {
                dst.insert(key.clone(), src_value.clone());
            }
            Some(JsonValue::Null) => {
                dst.remove(key);
            }
            Some(JsonValue::Object(dst_table)) => match src_value {
                JsonValue::Object(src_table) => coalesce_tables(dst_table, src_table, &full_key),
                JsonValue::Null => {}
                _ => tracing::warn!(
                    key = %full_key,
                    "destination is a table, ignoring non-table default"
                ),
            },
            Some(_) if src_value.is_object() => tracing::warn!(
                key = %full_key,
                "cannot overwrite table with non-table value"
            ),
            Some(_) => {}
        }
    }
}
