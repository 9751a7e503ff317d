//! The `what_do_i_have` registration report.

use std::fmt::Write;

use crate::pipeline::FamilySnapshot;

/// Renders the merged registration view as an aligned text table.
///
/// The default instance of each family is flagged with `*`; plugin types
/// are sorted by name and instances keep registration order.
pub(crate) fn what_do_i_have(snapshot: &[FamilySnapshot]) -> String {
    let mut plugin_width = "PluginType".len();
    let mut name_width = "Name".len();
    let mut lifecycle_width = "Lifecycle".len();
    for family in snapshot {
        plugin_width = plugin_width.max(family.plugin.display_name().len());
        for instance in &family.instances {
            name_width = name_width.max(instance.name.len() + 1);
            lifecycle_width = lifecycle_width.max(instance.lifecycle.to_string().len());
        }
    }

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:plugin_width$}  {:name_width$}  {:lifecycle_width$}  Description",
        "PluginType", "Name", "Lifecycle",
    );
    let rule_width = plugin_width + name_width + lifecycle_width + "Description".len() + 6;
    out.push_str(&"-".repeat(rule_width));
    out.push('\n');

    for family in snapshot {
        let mut plugin_cell = family.plugin.display_name();
        for instance in &family.instances {
            let is_default = family.default_name == Some(instance.name);
            let name_cell = format!(
                "{}{}",
                if is_default { "*" } else { " " },
                instance.name
            );
            let _ = writeln!(
                out,
                "{:plugin_width$}  {:name_width$}  {:lifecycle_width$}  {}",
                plugin_cell,
                name_cell,
                instance.lifecycle.to_string(),
                instance.concrete,
            );
            plugin_cell = "";
        }
        if family.instances.is_empty() {
            let _ = writeln!(
                out,
                "{:plugin_width$}  {:name_width$}  {:lifecycle_width$}  (no instances)",
                plugin_cell, "", "",
            );
        }
    }
    out
}
