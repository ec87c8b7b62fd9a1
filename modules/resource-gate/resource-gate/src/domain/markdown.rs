//! Markdown renderings of discovery output, for agents and humans reading raw responses.

use std::collections::BTreeMap;
use std::fmt;

use resource_gate_sdk::ResourceSchema;

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

/// Field table of a single resource.
pub struct SchemaMarkdown<'a>(pub &'a ResourceSchema);

/// Every schema a caller may discover, preceded by an index line.
pub struct CatalogMarkdown<'a>(pub &'a [ResourceSchema]);

/// Relation map as a bullet list of `resource.field -> target` edges.
pub struct RelationsMarkdown<'a>(pub &'a BTreeMap<String, BTreeMap<String, String>>);

impl fmt::Display for SchemaMarkdown<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let schema = self.0;
        writeln!(f, "## {}\n", schema.resource)?;
        writeln!(f, "Label field: `{}`\n", schema.label_field)?;
        writeln!(f, "| Field | Type | Required | Read-only | Details |")?;
        writeln!(f, "|---|---|---|---|---|")?;
        for field in &schema.fields {
            let mut details = Vec::new();
            if let Some(options) = &field.select_options {
                details.push(format!("one of: {}", options.join(", ")));
            }
            if let Some(target) = &field.references {
                details.push(format!("references `{target}`"));
            }
            writeln!(
                f,
                "| {} | {} | {} | {} | {} |",
                field.name,
                field.field_type.as_str(),
                yes_no(field.required),
                yes_no(field.is_read_only),
                details.join("; ")
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for CatalogMarkdown<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# Resources\n")?;
        if self.0.is_empty() {
            return writeln!(f, "_No resources available._");
        }
        let names: Vec<&str> = self.0.iter().map(|s| s.resource.as_str()).collect();
        writeln!(f, "Available: {}\n", names.join(", "))?;
        for schema in self.0 {
            writeln!(f, "{}", SchemaMarkdown(schema))?;
        }
        Ok(())
    }
}

impl fmt::Display for RelationsMarkdown<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# Relations\n")?;
        if self.0.is_empty() {
            return writeln!(f, "_No relations._");
        }
        for (resource, fields) in self.0 {
            for (field, target) in fields {
                writeln!(f, "- `{resource}.{field}` -> `{target}`")?;
            }
        }
        Ok(())
    }
}

#[must_use]
pub fn render_schema(schema: &ResourceSchema) -> String {
    SchemaMarkdown(schema).to_string()
}

#[must_use]
pub fn render_catalog(schemas: &[ResourceSchema]) -> String {
    CatalogMarkdown(schemas).to_string()
}

#[must_use]
pub fn render_relations(relations: &BTreeMap<String, BTreeMap<String, String>>) -> String {
    RelationsMarkdown(relations).to_string()
}
