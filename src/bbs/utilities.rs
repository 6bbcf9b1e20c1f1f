//! Utilities menu reports built from the node directory.

use std::collections::HashMap;

use crate::mesh::NodeDirectory;

/// Battery percentage below which a node lands on the wall of shame.
pub const LOW_BATTERY_THRESHOLD: u32 = 20;

pub fn total_nodes(directory: &NodeDirectory) -> String {
    format!("Total nodes seen: {}", directory.len())
}

/// Count values and render them most-common first, ties by name.
fn counted<'a, I>(heading: &str, values: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for v in values {
        *counts.entry(v).or_default() += 1;
    }
    if counts.is_empty() {
        return format!("{}: none reported", heading);
    }
    let mut rows: Vec<(&str, usize)> = counts.into_iter().collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    let mut out = format!("{}:", heading);
    for (name, count) in rows {
        out.push_str(&format!("\n{}: {}", name, count));
    }
    out
}

pub fn hardware_models(directory: &NodeDirectory) -> String {
    counted(
        "Hardware Models",
        directory.nodes.values().filter_map(|n| n.hw_model.as_deref()),
    )
}

pub fn roles(directory: &NodeDirectory) -> String {
    counted(
        "Roles",
        directory.nodes.values().filter_map(|n| n.role.as_deref()),
    )
}

/// Nodes reporting a battery level under [`LOW_BATTERY_THRESHOLD`], lowest first.
pub fn wall_of_shame(directory: &NodeDirectory) -> String {
    let mut low: Vec<(u32, String)> = directory
        .nodes
        .values()
        .filter_map(|n| match n.battery_level {
            Some(level) if level < LOW_BATTERY_THRESHOLD => {
                Some((level, directory.short_name_for(n.node_id)))
            }
            _ => None,
        })
        .collect();
    if low.is_empty() {
        return format!(
            "No devices with battery levels below {}% found.",
            LOW_BATTERY_THRESHOLD
        );
    }
    low.sort();
    let mut out = format!("Devices with battery levels below {}%:", LOW_BATTERY_THRESHOLD);
    for (level, name) in low {
        out.push_str(&format!("\n{} - {}%", name, level));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::UserInfo;

    fn directory() -> NodeDirectory {
        let mut dir = NodeDirectory::new();
        for (id, short, hw, role) in [
            (1, "AAA", "TBEAM", "CLIENT"),
            (2, "BBB", "TBEAM", "ROUTER"),
            (3, "CCC", "RAK4631", "CLIENT"),
        ] {
            dir.update_node(
                id,
                &UserInfo {
                    long_name: format!("{} long", short),
                    short_name: short.into(),
                    hw_model: Some(hw.into()),
                    role: Some(role.into()),
                },
            );
        }
        dir
    }

    #[test]
    fn counts_are_sorted_by_frequency() {
        let dir = directory();
        assert_eq!(total_nodes(&dir), "Total nodes seen: 3");
        assert_eq!(hardware_models(&dir), "Hardware Models:\nTBEAM: 2\nRAK4631: 1");
        assert_eq!(roles(&dir), "Roles:\nCLIENT: 2\nROUTER: 1");
        assert_eq!(roles(&NodeDirectory::new()), "Roles: none reported");
    }

    #[test]
    fn wall_of_shame_lists_low_batteries_only() {
        let mut dir = directory();
        assert!(wall_of_shame(&dir).starts_with("No devices"));
        dir.update_battery(1, 15);
        dir.update_battery(2, 20);
        dir.update_battery(3, 4);
        assert_eq!(
            wall_of_shame(&dir),
            "Devices with battery levels below 20%:\nCCC - 4%\nAAA - 15%"
        );
    }
}
