//! String template rendering utilities.

pub struct TemplateVars;

impl TemplateVars {
    pub const IP: &'static str = "ip";
    pub const NAME: &'static str = "name";
    pub const ENDPOINTS: &'static str = "endpoints";
}

/// Substitute `{{key}}` placeholders in a single pass. Substituted values are
/// never scanned again, and unknown placeholders are left as written.
pub fn render(template: &str, variables: &[(&str, &str)]) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        result.push_str(&rest[..open]);
        let after_open = &rest[open + 2..];
        let Some(close) = after_open.find("}}") else {
            rest = &rest[open..];
            break;
        };

        let key = &after_open[..close];
        match variables.iter().find(|(name, _)| *name == key) {
            Some((_, value)) => result.push_str(value),
            None => result.push_str(&rest[open..open + 2 + close + 2]),
        }
        rest = &after_open[close + 2..];
    }

    result.push_str(rest);
    result
}

pub fn is_present(template: &str, key: &str) -> bool {
    let placeholder = format!("{{{{{}}}}}", key);
    template.contains(&placeholder)
}
