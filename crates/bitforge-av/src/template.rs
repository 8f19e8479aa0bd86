//! Variable substitution for command templates.

use std::collections::HashMap;
use std::path::Path;

/// Variable substitution context for command templates.
///
/// Supports variable substitution in strings using the `{varname}` syntax.
///
/// # Example
///
/// ```
/// use bitforge_av::TemplateContext;
/// use std::path::Path;
///
/// let ctx = TemplateContext::new().with_paths(
///     Path::new("/processing-input/scans/page.tif"),
///     Path::new("/processing-output/ab/cd/abcd.jpx"),
/// );
///
/// assert_eq!(ctx.substitute("{input}"), "/processing-input/scans/page.tif");
/// assert_eq!(ctx.substitute("{filestem}"), "page");
/// ```
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    vars: HashMap<String, String>,
}

impl TemplateContext {
    /// Create a new empty template context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set input/output related variables.
    ///
    /// This adds the following variables:
    /// - `{input}` - Full path to the input file
    /// - `{output}` - Full path to the output file
    /// - `{filename}` - Input file name with extension
    /// - `{filestem}` - Input file name without extension
    /// - `{extension}` - Input file extension
    pub fn with_paths(mut self, input: &Path, output: &Path) -> Self {
        self.set("input", &input.display().to_string());
        self.set("output", &output.display().to_string());

        if let Some(name) = input.file_name() {
            self.set("filename", &name.to_string_lossy());
        }
        if let Some(stem) = input.file_stem() {
            self.set("filestem", &stem.to_string_lossy());
        }
        if let Some(ext) = input.extension() {
            self.set("extension", &ext.to_string_lossy());
        }

        self
    }

    /// Add a custom variable.
    pub fn with_var(mut self, key: &str, value: &str) -> Self {
        self.set(key, value);
        self
    }

    /// Set a variable.
    pub fn set(&mut self, key: &str, value: &str) {
        self.vars.insert(key.to_string(), value.to_string());
    }

    /// Get a variable value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(|s| s.as_str())
    }

    /// Substitute variables in a string.
    ///
    /// Variables are in the form `{varname}`; unknown variables are left as-is.
    pub fn substitute(&self, template: &str) -> String {
        let mut result = template.to_string();
        for (key, value) in &self.vars {
            result = result.replace(&format!("{{{}}}", key), value);
        }
        result
    }

    /// Substitute variables in a list of strings.
    pub fn substitute_all(&self, templates: &[String]) -> Vec<String> {
        templates.iter().map(|t| self.substitute(t)).collect()
    }
}

/// Names from `required` that appear in none of the `templates`.
pub fn missing_placeholders<'a>(templates: &[String], required: &[&'a str]) -> Vec<&'a str> {
    required
        .iter()
        .copied()
        .filter(|name| {
            let placeholder = format!("{{{}}}", name);
            !templates.iter().any(|t| t.contains(&placeholder))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_substitute_paths() {
        let ctx = TemplateContext::new().with_paths(
            &PathBuf::from("/processing-input/a/scan.tif"),
            &PathBuf::from("/processing-output/12/34/1234.jpx"),
        );

        assert_eq!(ctx.substitute("{input}"), "/processing-input/a/scan.tif");
        assert_eq!(ctx.substitute("{output}"), "/processing-output/12/34/1234.jpx");
        assert_eq!(ctx.substitute("{filename}"), "scan.tif");
        assert_eq!(ctx.substitute("{extension}"), "tif");
    }

    #[test]
    fn test_unknown_variables_are_kept() {
        let ctx = TemplateContext::new().with_var("codec", "jpx");
        assert_eq!(ctx.substitute("{codec}-{unknown}"), "jpx-{unknown}");
    }

    #[test]
    fn test_substitute_all() {
        let ctx = TemplateContext::new().with_paths(Path::new("/in/x.png"), Path::new("/out/y.jpx"));
        let templates = vec![
            "convert".to_string(),
            "{input}".to_string(),
            "{output}".to_string(),
        ];
        assert_eq!(
            ctx.substitute_all(&templates),
            vec!["convert", "/in/x.png", "/out/y.jpx"]
        );
    }

    #[test]
    fn test_missing_placeholders() {
        let templates = vec!["tool".to_string(), "{input}".to_string()];
        assert_eq!(missing_placeholders(&templates, &["input", "output"]), vec!["output"]);

        let complete = vec!["--in={input}".to_string(), "--out={output}".to_string()];
        assert!(missing_placeholders(&complete, &["input", "output"]).is_empty());
    }
}
