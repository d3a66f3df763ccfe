use crate::CompletionRequest;
use crate::RowSnapshot;

/// One generation rule as configured in the rule-definition sheet.
///
/// A rule with any required field empty or zero is inert and never fires.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rule {
    pub name: String,
    /// All must be non-empty, and all must change, for the rule to fire on
    /// the change path
    pub trigger_columns: Vec<String>,
    /// Templates with `{ColumnName}` placeholders
    pub system_message: String,
    pub user_message: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Column receiving the generated text
    pub destination: String,
}

impl Rule {
    pub fn is_inert(&self) -> bool {
        self.system_message.is_empty()
            || self.user_message.is_empty()
            || self.temperature == 0.0
            || self.max_tokens == 0
            || self.destination.is_empty()
            || self.trigger_columns.is_empty()
            || self.trigger_columns.iter().any(|c| c.is_empty())
    }

    /// Resolves both templates against the row
    pub fn completion_request(
        &self,
        row: &RowSnapshot,
    ) -> CompletionRequest {
        CompletionRequest {
            system_message: render_template(&self.system_message, row),
            user_message: render_template(&self.user_message, row),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

/// Replaces every `{Name}` whose name is a field of the row (including the
/// synthetic row index) by its value. Unknown placeholders are left as-is.
///
/// Substituted values are not re-scanned.
pub fn render_template(
    template: &str,
    row: &RowSnapshot,
) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        match after.find(['{', '}']) {
            Some(close) if after.as_bytes()[close] == b'}' => {
                let name = &after[..close];
                match row.get(name) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            // nested `{` or no closing brace: emit literally and move on
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
