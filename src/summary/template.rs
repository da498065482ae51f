//! Placeholder substitution for prompt templates.

use std::collections::HashMap;

/// Substitutes every `{key}` in `template` with its value from `variables`.
///
/// Substitution is literal, global and single-pass: inserted values are
/// never scanned for further placeholders. Placeholders without a matching
/// variable are left as written.
pub fn render(template: &str, variables: &HashMap<&str, &str>) -> String {
    if variables.is_empty() {
        return template.to_string();
    }

    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replaced = after.find('}').and_then(|close| {
            variables
                .get(&after[..close])
                .map(|value| (value, close))
        });

        match replaced {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_variables_return_template() {
        let template = "Summarize {diff} into {n_commit} messages";
        assert_eq!(render(template, &HashMap::new()), template);
    }

    #[test]
    fn substitution_is_global() {
        let vars = HashMap::from([("a", "x")]);
        assert_eq!(render("{a}{a}", &vars), "xx");
    }

    #[test]
    fn unknown_placeholders_left_verbatim() {
        let vars = HashMap::from([("diff", "+line")]);
        assert_eq!(
            render("{diff} for {commits}", &vars),
            "+line for {commits}"
        );
    }

    #[test]
    fn unused_variables_ignored() {
        let vars = HashMap::from([("messages", "- a"), ("unused", "zzz")]);
        assert_eq!(render("Merge:\n{messages}", &vars), "Merge:\n- a");
    }

    #[test]
    fn substitution_is_not_recursive() {
        let vars = HashMap::from([("diff", "{n_commit}"), ("n_commit", "3")]);
        assert_eq!(render("{diff} / {n_commit}", &vars), "{n_commit} / 3");
    }

    #[test]
    fn stray_braces_preserved() {
        let vars = HashMap::from([("diff", "D")]);
        assert_eq!(render("{{diff}} {", &vars), "{D} {");
        assert_eq!(render("fn x() { {diff} }", &vars), "fn x() { D }");
    }

    #[test]
    fn json_examples_in_templates_survive() {
        let vars = HashMap::from([("n_commit", "2")]);
        assert_eq!(
            render(r#"Reply as {"results": [..]} with {n_commit} items"#, &vars),
            r#"Reply as {"results": [..]} with 2 items"#
        );
    }
}
