//! services/template_service.rs
//! Merge-field substitution for step subject/body templates. Rendering
//! is treated as an external collaborator; a render failure fails the
//! job.

use crate::errors::EngineError;
use crate::models::lead_model::Lead;

/// Replaces `{{field}}` placeholders with the lead's values. Optional
/// lead fields render as empty strings; an unknown placeholder is a
/// render error.
pub fn render_template(template: &str, lead: &Lead) -> Result<String, EngineError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        let close = after.find("}}").ok_or_else(|| {
            EngineError::Render("unclosed '{{' placeholder in template".to_string())
        })?;
        let key = after[..close].trim();
        out.push_str(&lead_field(lead, key)?);
        rest = &after[close + 2..];
    }
    out.push_str(rest);

    Ok(out)
}

fn lead_field(lead: &Lead, key: &str) -> Result<String, EngineError> {
    let value = match key {
        "email" => Some(lead.email.clone()),
        "first_name" => lead.first_name.clone(),
        "last_name" => lead.last_name.clone(),
        "property_address" => lead.property_address.clone(),
        "market_region" => lead.market_region.clone(),
        _ => {
            return Err(EngineError::Render(format!(
                "unknown template placeholder '{{{{{key}}}}}'"
            )));
        }
    };
    Ok(value.unwrap_or_default())
}
