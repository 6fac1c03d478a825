//! Rendering for `GET /stats`: a fixed-width ASCII table, one row per
//! storage node.

use std::collections::HashMap;

use crate::storage_node::StorageNode;

const COLUMN_WIDTH: usize = 15;
const HEADERS: [&str; 6] = ["node", "status", "#blocks", "used", "free", "total"];

/// Formats a byte count with a binary (1024-based) suffix, e.g. `1.5 MB`.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

fn center(text: &str, width: usize) -> String {
    if text.len() >= width {
        return text.to_string();
    }
    let total_pad = width - text.len();
    let left = total_pad / 2;
    let right = total_pad - left;
    format!("{}{}{}", " ".repeat(left), text, " ".repeat(right))
}

pub fn render(storage_nodes: &HashMap<u32, StorageNode>) -> String {
    let divider: String = "-".repeat(COLUMN_WIDTH + 1).repeat(HEADERS.len()) + "-";
    let mut out = String::new();

    out.push_str(&divider);
    out.push('\n');

    out.push('|');
    for header in HEADERS {
        out.push_str(&center(header, COLUMN_WIDTH));
        out.push('|');
    }
    out.push('\n');
    out.push_str(&divider);
    out.push('\n');

    let mut ids: Vec<&u32> = storage_nodes.keys().collect();
    ids.sort();

    for id in ids {
        let node = &storage_nodes[id];
        let row = [
            id.to_string(),
            if node.is_healthy { "running".to_string() } else { "down".to_string() },
            node.stats.blocks_stored.to_string(),
            format_bytes(node.stats.data_bytes_used as u64),
            format_bytes(node.stats.data_bytes_free as u64),
            format_bytes(node.stats.data_bytes_total as u64),
        ];
        out.push('|');
        for cell in row {
            out.push_str(&center(&cell, COLUMN_WIDTH));
            out.push('|');
        }
        out.push('\n');
    }

    out.push_str(&divider);
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_at_each_binary_scale() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(1024 * 1024 * 3), "3.0 MB");
    }

    #[test]
    fn renders_one_row_per_node() {
        let mut nodes = HashMap::new();
        nodes.insert(0, StorageNode::new(0, "127.0.0.1:9001"));
        nodes.insert(1, StorageNode::new(1, "127.0.0.1:9002"));
        let table = render(&nodes);
        // top divider, header, middle divider, one row per node, bottom divider
        assert_eq!(table.lines().count(), 3 + nodes.len() + 1);
    }
}
