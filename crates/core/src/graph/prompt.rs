use crate::error::ConfigError;

const PLACEHOLDER: &str = "{task}";

/// The template the task description is substituted into.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PromptTemplate(String);

impl PromptTemplate {
    /// Creates a template, which must contain a `{task}` placeholder.
    pub fn new<S: Into<String>>(template: S) -> Result<Self, ConfigError> {
        let template = template.into();
        if !template.contains(PLACEHOLDER) {
            return Err(ConfigError::InvalidTemplate);
        }
        Ok(Self(template))
    }

    /// Substitutes `task` for every placeholder.
    #[inline]
    pub fn render(&self, task: &str) -> String {
        self.0.replace(PLACEHOLDER, task)
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self(include_str!("../prompts/agent.md").to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_template() {
        let prompt = PromptTemplate::default().render("list files");
        assert!(prompt.contains("list files"));
        assert!(!prompt.contains(PLACEHOLDER));
    }

    #[test]
    fn test_placeholder_required() {
        assert!(matches!(
            PromptTemplate::new("do something"),
            Err(ConfigError::InvalidTemplate)
        ));
        let template = PromptTemplate::new("Task: {task}").unwrap();
        assert_eq!(template.render("scan"), "Task: scan");
    }
}
