// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `{{var}}` substitution against session variables.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*([A-Za-z0-9_.-]+)\s*\}\}").unwrap())
}

/// Replace every `{{name}}` token with the bound value of `name`.
/// Unbound tokens stay verbatim.
pub fn substitute(text: &str, variables: &HashMap<String, String>) -> String {
    token_re()
        .replace_all(text, |caps: &regex::Captures<'_>| {
            match variables.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn bound_tokens_are_replaced() {
        let v = vars(&[("name", "Ana"), ("city", "Lisbon")]);
        assert_eq!(substitute("Hi {{name}} from {{city}}!", &v), "Hi Ana from Lisbon!");
    }

    #[test]
    fn unbound_tokens_stay_verbatim() {
        let v = vars(&[("name", "Ana")]);
        assert_eq!(substitute("Hi {{name}}, order {{order_id}}", &v), "Hi Ana, order {{order_id}}");
    }

    #[test]
    fn whitespace_inside_braces_is_tolerated() {
        let v = vars(&[("name", "Ana")]);
        assert_eq!(substitute("Hi {{ name }}", &v), "Hi Ana");
    }

    #[test]
    fn text_without_tokens_passes_through() {
        assert_eq!(substitute("plain text { not a token }", &HashMap::new()), "plain text { not a token }");
    }
}
