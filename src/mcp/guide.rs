//! Markdown reference for the registered tools

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::time::Instant;

use serde::Serialize;

use super::tools::{CatalogEntry, ToolCategory};

#[derive(Debug, Serialize)]
pub struct GuideResponse {
    pub content: String,
    pub metadata: GuideMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct GuideMetadata {
    pub total_tools: usize,
    pub filtered_count: usize,
    pub generation_time_ms: f64,
    pub document_size_bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid_names: Option<Vec<String>>,
}

/// Build the guide for `catalog`, restricted to `tool_names` when given.
///
/// Names may carry an `mcp_` prefix. Unknown names are reported, not fatal.
pub fn generate_guide(catalog: &[CatalogEntry], tool_names: Option<&[String]>) -> GuideResponse {
    let started = Instant::now();

    let available: BTreeSet<&str> = catalog.iter().map(|e| e.definition.name.as_str()).collect();
    let mut selected: BTreeSet<&str> = BTreeSet::new();
    let mut invalid: BTreeSet<String> = BTreeSet::new();

    match tool_names {
        None => selected = available.clone(),
        Some(names) => {
            for name in names {
                let bare = name.strip_prefix("mcp_").unwrap_or(name);
                if let Some(&known) = available.get(name.as_str()).or_else(|| available.get(bare)) {
                    selected.insert(known);
                } else {
                    invalid.insert(name.clone());
                }
            }
        }
    }

    let mut content = String::new();
    let _ = writeln!(content, "# Context MCP Tools Usage Guide\n");
    let _ = writeln!(
        content,
        "Generated: {}  ",
        chrono::Local::now().format("%Y-%m-%d")
    );
    let _ = writeln!(
        content,
        "Tools documented: {} of {}",
        selected.len(),
        available.len()
    );
    if tool_names.is_some() {
        let listed: Vec<&str> = selected.iter().copied().collect();
        let _ = writeln!(content, "Filtered to: {}", listed.join(", "));
    }
    content.push('\n');

    for category in ToolCategory::ALL {
        let tools: Vec<&CatalogEntry> = catalog
            .iter()
            .filter(|e| e.category == category && selected.contains(e.definition.name.as_str()))
            .collect();
        if tools.is_empty() {
            continue;
        }

        let _ = writeln!(content, "## {} Tools ({})\n", category.title(), tools.len());
        for tool in tools {
            let schema = serde_json::to_string_pretty(&tool.definition.input_schema)
                .unwrap_or_else(|_| "{}".to_string());
            let _ = writeln!(content, "### {}", tool.definition.name);
            let _ = writeln!(content, "**Purpose**: {}\n", tool.definition.description);
            let _ = writeln!(content, "**Parameters**:\n```json\n{}\n```\n", schema);
            let _ = writeln!(content, "---\n");
        }
    }

    let warnings = if invalid.is_empty() {
        None
    } else {
        let word = if invalid.len() > 1 { "Tools" } else { "Tool" };
        let quoted: Vec<String> = invalid.iter().map(|n| format!("'{}'", n)).collect();
        let known: Vec<&str> = available.iter().copied().collect();
        Some(vec![format!(
            "{} {} not found. Available tools: {}",
            word,
            quoted.join(", "),
            known.join(", ")
        )])
    };

    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    GuideResponse {
        metadata: GuideMetadata {
            total_tools: available.len(),
            filtered_count: selected.len(),
            generation_time_ms: (elapsed_ms * 100.0).round() / 100.0,
            document_size_bytes: content.len(),
            invalid_names: (!invalid.is_empty()).then(|| invalid.into_iter().collect()),
        },
        content,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::tools::tool_catalog;

    #[test]
    fn test_full_guide_has_every_category() {
        let catalog = tool_catalog();
        let guide = generate_guide(&catalog, None);

        assert!(guide.content.starts_with("# Context MCP Tools Usage Guide"));
        assert!(guide.content.contains("## Navigation Tools (3)"));
        assert!(guide.content.contains("## Search Tools (4)"));
        assert!(guide.content.contains("## Read Tools (4)"));
        assert!(guide.content.contains("## Guide Tools (1)"));
        assert!(guide.content.contains("### read_file_tail"));
        assert!(guide.content.contains("```json"));
        assert_eq!(guide.metadata.total_tools, 12);
        assert_eq!(guide.metadata.filtered_count, 12);
        assert_eq!(guide.metadata.document_size_bytes, guide.content.len());
        assert!(guide.warnings.is_none());
        assert!(guide.metadata.invalid_names.is_none());
    }

    #[test]
    fn test_filter_accepts_prefixed_names_and_reports_unknown() {
        let catalog = tool_catalog();
        let names = vec![
            "mcp_list_directory".to_string(),
            "read_files".to_string(),
            "nope".to_string(),
        ];
        let guide = generate_guide(&catalog, Some(&names));

        assert_eq!(guide.metadata.filtered_count, 2);
        assert!(guide.content.contains("### list_directory"));
        assert!(guide.content.contains("### read_files"));
        assert!(!guide.content.contains("## Search Tools"));
        assert_eq!(guide.metadata.invalid_names, Some(vec!["nope".to_string()]));

        let warnings = guide.warnings.unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("Tool 'nope' not found. Available tools: "));
    }
}
