//! Extended DNS Error (EDE, RFC 8914) text templating for blocked
//! answers. The matched rule's name is substituted into a per-blocklist
//! template string so operators can tell which list and rule fired
//! without exposing the whole rule database to the client.

use crate::Label;
use domain::base::opt::{ExtendedError, OptBuilder};

/// A `{rule}`-substituting EDE message template, plus the INFO-CODE to
/// attach (RFC 8914 §4: 15 = Blocked, 16 = Censored, 17 = Filtered,
/// 18 = Prohibited are the common choices for blocklists).
#[derive(Debug, Clone)]
pub struct EdeTemplate {
    info_code: u16,
    template: String,
}

impl EdeTemplate {
    /// Build a template. `template` may contain the literal substring
    /// `{rule}`, replaced with the matched rule's label at render time.
    pub fn new(info_code: u16, template: impl Into<String>) -> Self {
        Self {
            info_code,
            template: template.into(),
        }
    }

    /// The RFC 8914 "Blocked" template: `info-code 15`.
    pub fn blocked() -> Self {
        Self::new(15, "blocked by rule {rule}")
    }

    /// Render this template for a matched `rule`, producing text
    /// suitable for an EDE OPT record's EXTRA-TEXT field.
    pub fn render(&self, rule: &Label) -> String {
        self.template.replace("{rule}", rule)
    }

    /// Attach this template, rendered for `rule`, to an OPT record
    /// being built onto a response.
    pub fn attach(&self, opt: &mut OptBuilder<impl bytes::BufMut>, rule: &Label) -> Result<(), domain::base::ShortBuf> {
        let text = self.render(rule);
        opt.push(&ExtendedError::new(self.info_code, text.as_bytes())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_rule_name_into_template() {
        let template = EdeTemplate::blocked();
        assert_eq!(
            template.render(&Label::from("ads-list")),
            "blocked by rule ads-list"
        );
    }

    #[test]
    fn custom_template_without_placeholder_is_unchanged() {
        let template = EdeTemplate::new(17, "filtered");
        assert_eq!(template.render(&Label::from("ignored")), "filtered");
    }
}
