use std::collections::BTreeMap;

use serde_json::Value;

use vellum_doc_core::Marks;

/// Parsed inline style declarations, keyed by property name. A `BTreeMap`
/// keeps serialization order stable.
pub type StyleAttrs = BTreeMap<String, String>;

/// Splits a raw `style` attribute into `(property, value)` pairs.
///
/// Declarations are separated by `;`, except inside quotes (font names
/// like `font-family: "Fira Sans";`). Malformed declarations are skipped
/// rather than failing the whole attribute.
pub fn parse_declarations(raw: &str) -> Vec<(String, String)> {
    let mut declarations = Vec::new();

    let mut current = String::new();
    let mut quote: Option<char> = None;
    for c in raw.chars() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
                current.push(c);
            }
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    current.push(c);
                }
                ';' => {
                    push_declaration(&mut declarations, &current);
                    current.clear();
                }
                _ => current.push(c),
            },
        }
    }
    push_declaration(&mut declarations, &current);

    declarations
}

fn push_declaration(declarations: &mut Vec<(String, String)>, piece: &str) {
    let piece = piece.trim();
    if piece.is_empty() {
        return;
    }
    let Some((key, value)) = piece.split_once(':') else {
        return;
    };

    let key = key.trim();
    if key.is_empty()
        || !key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        return;
    }

    let value = value
        .trim()
        .trim_matches(|c| c == '\'' || c == '"')
        .trim()
        .to_string();
    if value.is_empty() {
        return;
    }

    declarations.push((key.to_string(), value));
}

/// Merges the declarations in `raw` over `existing`. Later duplicates win,
/// both within `raw` and over what is already there. Merging an empty
/// string changes nothing.
pub fn merge_declarations(existing: &StyleAttrs, raw: &str) -> StyleAttrs {
    let mut merged = existing.clone();
    for (key, value) in parse_declarations(raw) {
        merged.insert(key, value);
    }
    merged
}

/// Folds a raw style attribute into a mark set. `color` and
/// `background-color` land in their typed marks; everything else rides in
/// the open map.
pub fn apply_declarations(marks: &mut Marks, raw: &str) {
    for (key, value) in parse_declarations(raw) {
        match key.as_str() {
            "color" => marks.color = Some(value),
            "background-color" => marks.background_color = Some(value),
            _ => {
                marks.extra.insert(key, Value::String(value));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_declarations() {
        let parsed = parse_declarations("color: red; font-weight: bold");
        assert_eq!(
            parsed,
            vec![
                ("color".to_string(), "red".to_string()),
                ("font-weight".to_string(), "bold".to_string()),
            ]
        );
    }

    #[test]
    fn semicolons_inside_quotes_do_not_split() {
        let parsed = parse_declarations("font-family: \"a;b\"; color: red");
        assert_eq!(
            parsed,
            vec![
                ("font-family".to_string(), "a;b".to_string()),
                ("color".to_string(), "red".to_string()),
            ]
        );
    }

    #[test]
    fn malformed_declarations_are_skipped() {
        let parsed = parse_declarations("nonsense; : red; color red; width: 10px");
        assert_eq!(parsed, vec![("width".to_string(), "10px".to_string())]);
    }

    #[test]
    fn invalid_property_names_are_skipped() {
        let parsed = parse_declarations("co lor: red; color: blue");
        assert_eq!(parsed, vec![("color".to_string(), "blue".to_string())]);
    }

    #[test]
    fn merge_with_empty_string_is_identity() {
        let mut existing = StyleAttrs::new();
        existing.insert("color".to_string(), "red".to_string());
        assert_eq!(merge_declarations(&existing, ""), existing);
    }

    #[test]
    fn later_duplicates_win() {
        let existing = StyleAttrs::new();
        let merged = merge_declarations(&existing, "color: red; color: blue");
        assert_eq!(merged.get("color"), Some(&"blue".to_string()));
    }

    #[test]
    fn declarations_route_into_marks() {
        let mut marks = Marks::default();
        apply_declarations(&mut marks, "color: red; background-color: #fff; font-weight: bold");
        assert_eq!(marks.color.as_deref(), Some("red"));
        assert_eq!(marks.background_color.as_deref(), Some("#fff"));
        assert_eq!(
            marks.extra.get("font-weight"),
            Some(&Value::String("bold".to_string()))
        );
    }
}
