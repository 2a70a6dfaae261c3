//! Prompt construction for extraction requests.

use sha2::{Digest, Sha256};

use crate::types::schema::OutputSchema;

/// System prompt framing the extraction task.
pub const EXTRACT_SYSTEM_PROMPT: &str = "\
You extract structured information from personal notes. \
Respond with a single JSON object that conforms to the provided schema. \
Use null for optional fields the note does not support. \
Do not invent information that is not in the note. \
Output only JSON, with no surrounding prose.";

/// Format the extraction prompt for one document.
///
/// Field order follows the schema, so the rendered prompt is identical
/// across runs for the same schema and content.
pub fn format_extract_prompt(schema: &OutputSchema, content: &str) -> String {
    let mut field_lines = String::new();
    for (name, spec) in &schema.fields {
        let requirement = if spec.required { "required" } else { "optional" };
        let description = spec.description.as_deref().unwrap_or("");
        field_lines.push_str(&format!(
            "- {} ({}, {}): {}\n",
            name,
            spec.kind.type_name(),
            requirement,
            description
        ));
    }

    format!(
        "Extract a \"{name}\" object from the note below.\n\n\
         Fields:\n{fields}\n\
         JSON schema:\n{schema}\n\n\
         Note:\n---\n{content}\n---",
        name = schema.name,
        fields = field_lines,
        schema = schema.to_json_schema(),
        content = content,
    )
}

/// Fingerprint of the current prompt template, stored as provenance so
/// hosts can tell which prompt generation produced a record.
pub fn extract_prompt_hash() -> String {
    let mut hasher = Sha256::new();
    hasher.update(EXTRACT_SYSTEM_PROMPT.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}
