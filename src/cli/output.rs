use std::fmt::{self, Write as FmtWrite};

use console::style;
use serde::Serialize;

use crate::models::{OutputFormat, RecordPayload, SearchResults, StoredRecord};
use crate::services::SchemaReport;

pub trait Formatter {
    fn format_search_results(&self, results: &SearchResults) -> String;
    fn format_records(&self, records: &[StoredRecord]) -> String;
    fn format_status(&self, status: &StatusInfo) -> String;
    fn format_schema_report(&self, collection: &str, report: &SchemaReport) -> String;
    fn format_count(&self, collection: &str, count: u64) -> String;
    fn format_message(&self, message: &str) -> String;
    fn format_error(&self, error: &str) -> String;
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub embedding_model: String,
    pub embedding_url: String,
    pub embedding_dimension: u32,
    pub api_key_configured: bool,
    pub vector_store_driver: String,
    pub vector_store_url: String,
    pub vector_store_connected: bool,
    pub collection: String,
    pub collection_exists: bool,
    pub vector_store_points: u64,
}

/// Run `f` against a fresh buffer. Writing into a `String` cannot fail.
fn render(f: impl FnOnce(&mut String) -> fmt::Result) -> String {
    let mut output = String::new();
    let _ = f(&mut output);
    output
}

fn preview(text: &str, max_chars: usize) -> String {
    let head: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        format!("{head}...")
    } else {
        head
    }
}

fn write_payload_lines(output: &mut String, payload: &RecordPayload, indent: &str) -> fmt::Result {
    writeln!(
        output,
        "{indent}Source: {} ({})",
        payload.source_type,
        payload.source_name.as_deref().unwrap_or("-")
    )?;
    writeln!(
        output,
        "{indent}Category: {}  Importance: {:.2}",
        payload.category, payload.importance_score
    )?;
    if !payload.keywords.is_empty() {
        writeln!(output, "{indent}Keywords: {}", payload.keywords.join(", "))?;
    }
    if let Some(url) = &payload.url {
        writeln!(output, "{indent}URL: {url}")?;
    }
    writeln!(
        output,
        "{indent}Collected: {}",
        payload.collected_at.format("%Y-%m-%d %H:%M")
    )?;
    if let Some(summary) = &payload.summary {
        writeln!(output, "{indent}---")?;
        for line in preview(summary, 300).lines() {
            writeln!(output, "{indent}{line}")?;
        }
    }
    Ok(())
}

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_search_results(&self, results: &SearchResults) -> String {
        if results.is_empty() {
            return format!("No results found for: {}\n", results.query);
        }

        render(|output| {
            writeln!(output, "Search results for: \"{}\"", results.query)?;
            writeln!(
                output,
                "Found {} results in {}ms\n",
                results.len(),
                results.duration_ms
            )?;

            for (i, hit) in results.results.iter().enumerate() {
                writeln!(
                    output,
                    "{}. {} [Score: {:.3}]",
                    i + 1,
                    style(&hit.payload.title).bold(),
                    hit.score
                )?;
                writeln!(output, "   ID: {}", hit.vector_id)?;
                write_payload_lines(output, &hit.payload, "   ")?;
                writeln!(output)?;
            }
            Ok(())
        })
    }

    fn format_records(&self, records: &[StoredRecord]) -> String {
        if records.is_empty() {
            return "No records found.\n".to_string();
        }

        render(|output| {
            for record in records {
                writeln!(output, "{}", style(&record.payload.title).bold())?;
                writeln!(output, "  ID: {}", record.vector_id)?;
                writeln!(output, "  Source ID: {}", record.payload.source_id)?;
                write_payload_lines(output, &record.payload, "  ")?;
                writeln!(output)?;
            }
            Ok(())
        })
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        render(|output| {
            writeln!(output, "Status")?;
            writeln!(output, "------")?;

            let key_status = if status.api_key_configured {
                style("[KEY SET]").green()
            } else {
                style("[NO KEY]").yellow()
            };
            writeln!(output, "Embedding:     {} {}", status.embedding_model, key_status)?;
            writeln!(output, "  URL:         {}", status.embedding_url)?;
            writeln!(output, "  Dimension:   {}", status.embedding_dimension)?;
            writeln!(output)?;

            let vector_status = if status.vector_store_connected {
                style("[CONNECTED]").green()
            } else {
                style("[DISCONNECTED]").red()
            };
            writeln!(
                output,
                "Vector Store:  {} {}",
                status.vector_store_driver, vector_status
            )?;
            writeln!(output, "  URL:         {}", status.vector_store_url)?;
            writeln!(output, "  Collection:  {}", status.collection)?;
            if status.vector_store_connected {
                if status.collection_exists {
                    writeln!(output, "  Points:      {}", status.vector_store_points)?;
                } else {
                    writeln!(output, "  Points:      - (collection missing)")?;
                }
            }
            Ok(())
        })
    }

    fn format_schema_report(&self, collection: &str, report: &SchemaReport) -> String {
        render(|output| {
            let verdict = if report.schema_valid {
                style("[VALID]").green()
            } else {
                style("[INVALID]").red()
            };
            writeln!(output, "Collection '{collection}' {verdict}")?;
            if let Some(info) = &report.info {
                writeln!(output, "  Points:      {}", info.points_count)?;
                if let Some(size) = info.vector_size {
                    writeln!(output, "  Vector size: {size}")?;
                }
                if let Some(distance) = info.distance {
                    writeln!(output, "  Distance:    {distance}")?;
                }
            }
            for error in &report.errors {
                writeln!(output, "  ✗ {error}")?;
            }
            Ok(())
        })
    }

    fn format_count(&self, collection: &str, count: u64) -> String {
        format!("{collection}: {count} records\n")
    }

    fn format_message(&self, message: &str) -> String {
        format!("{message}\n")
    }

    fn format_error(&self, error: &str) -> String {
        format!("Error: {error}\n")
    }
}

pub struct JsonFormatter {
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn to_json<T: Serialize + ?Sized>(&self, value: &T) -> String {
        let encoded = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        encoded.unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }).to_string())
    }
}

impl Formatter for JsonFormatter {
    fn format_search_results(&self, results: &SearchResults) -> String {
        self.to_json(results)
    }

    fn format_records(&self, records: &[StoredRecord]) -> String {
        self.to_json(records)
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let json = serde_json::json!({
            "embedding": {
                "model": status.embedding_model,
                "url": status.embedding_url,
                "dimension": status.embedding_dimension,
                "api_key_configured": status.api_key_configured,
            },
            "vector_store": {
                "driver": status.vector_store_driver,
                "url": status.vector_store_url,
                "connected": status.vector_store_connected,
                "collection": status.collection,
                "collection_exists": status.collection_exists,
                "points": status.vector_store_points,
            }
        });
        self.to_json(&json)
    }

    fn format_schema_report(&self, collection: &str, report: &SchemaReport) -> String {
        self.to_json(&serde_json::json!({
            "collection": collection,
            "report": report,
        }))
    }

    fn format_count(&self, collection: &str, count: u64) -> String {
        self.to_json(&serde_json::json!({ "collection": collection, "count": count }))
    }

    fn format_message(&self, message: &str) -> String {
        serde_json::json!({"message": message}).to_string()
    }

    fn format_error(&self, error: &str) -> String {
        serde_json::json!({"error": error}).to_string()
    }
}

pub struct MarkdownFormatter;

impl MarkdownFormatter {
    fn write_payload(output: &mut String, payload: &RecordPayload) -> fmt::Result {
        writeln!(output, "| Field | Value |")?;
        writeln!(output, "|-------|-------|")?;
        writeln!(output, "| Source ID | `{}` |", payload.source_id)?;
        writeln!(output, "| Source type | {} |", payload.source_type)?;
        writeln!(output, "| Category | {} |", payload.category)?;
        writeln!(output, "| Importance | {:.2} |", payload.importance_score)?;
        if !payload.keywords.is_empty() {
            let keywords: Vec<String> = payload.keywords.iter().map(|k| format!("`{k}`")).collect();
            writeln!(output, "| Keywords | {} |", keywords.join(", "))?;
        }
        if let Some(url) = &payload.url {
            writeln!(output, "| URL | <{url}> |")?;
        }
        writeln!(output)?;
        if let Some(summary) = &payload.summary {
            writeln!(output, "> {}\n", summary.replace('\n', "\n> "))?;
        }
        Ok(())
    }
}

impl Formatter for MarkdownFormatter {
    fn format_search_results(&self, results: &SearchResults) -> String {
        if results.is_empty() {
            return format!("## No results found\n\nQuery: `{}`\n", results.query);
        }

        render(|output| {
            writeln!(output, "## Search Results\n")?;
            writeln!(output, "**Query:** `{}`\n", results.query)?;
            writeln!(
                output,
                "Found {} results in {}ms\n",
                results.len(),
                results.duration_ms
            )?;

            for (i, hit) in results.results.iter().enumerate() {
                writeln!(
                    output,
                    "### {}. {} (score {:.3})\n",
                    i + 1,
                    hit.payload.title,
                    hit.score
                )?;
                Self::write_payload(output, &hit.payload)?;
            }
            Ok(())
        })
    }

    fn format_records(&self, records: &[StoredRecord]) -> String {
        if records.is_empty() {
            return "*No records found.*\n".to_string();
        }

        render(|output| {
            for record in records {
                writeln!(output, "### {}\n", record.payload.title)?;
                writeln!(output, "**ID:** `{}`\n", record.vector_id)?;
                Self::write_payload(output, &record.payload)?;
            }
            Ok(())
        })
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        render(|output| {
            writeln!(output, "## Status\n")?;
            let key = if status.api_key_configured { "✅" } else { "⚠️" };
            writeln!(output, "### Embedding {key}\n")?;
            writeln!(output, "- **Model:** {}", status.embedding_model)?;
            writeln!(output, "- **URL:** `{}`", status.embedding_url)?;
            writeln!(output, "- **Dimension:** {}", status.embedding_dimension)?;
            writeln!(output)?;

            let connected = if status.vector_store_connected {
                "✅"
            } else {
                "❌"
            };
            writeln!(
                output,
                "### Vector Store ({}) {connected}\n",
                status.vector_store_driver
            )?;
            writeln!(output, "- **URL:** `{}`", status.vector_store_url)?;
            writeln!(output, "- **Collection:** {}", status.collection)?;
            writeln!(output, "- **Points:** {}", status.vector_store_points)?;
            Ok(())
        })
    }

    fn format_schema_report(&self, collection: &str, report: &SchemaReport) -> String {
        render(|output| {
            let verdict = if report.schema_valid { "✅" } else { "❌" };
            writeln!(output, "## Collection `{collection}` {verdict}\n")?;
            if let Some(info) = &report.info {
                writeln!(output, "- **Points:** {}", info.points_count)?;
                if let Some(size) = info.vector_size {
                    writeln!(output, "- **Vector size:** {size}")?;
                }
                if let Some(distance) = info.distance {
                    writeln!(output, "- **Distance:** {distance}")?;
                }
            }
            if !report.errors.is_empty() {
                writeln!(output, "\n**Problems:**\n")?;
                for error in &report.errors {
                    writeln!(output, "- {error}")?;
                }
            }
            Ok(())
        })
    }

    fn format_count(&self, collection: &str, count: u64) -> String {
        format!("**{collection}:** {count} records\n")
    }

    fn format_message(&self, message: &str) -> String {
        format!("> {message}\n")
    }

    fn format_error(&self, error: &str) -> String {
        format!("> ⚠️ **Error:** {error}\n")
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
        OutputFormat::Markdown => Box::new(MarkdownFormatter),
    }
}
