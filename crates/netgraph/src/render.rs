//! Python source literals for attribute values.

use std::collections::BTreeMap;

use itertools::Itertools;

use crate::types::AttrValue;

/// Renders a value in argument position. Strings are pasted verbatim since
/// the editor stores source fragments such as `"(3, 3)"` as text.
pub fn python_arg(value: &AttrValue) -> String {
    match value {
        AttrValue::Text(text) => text.clone(),
        other => python_repr(other),
    }
}

/// Python `repr()` of a value.
pub fn python_repr(value: &AttrValue) -> String {
    match value {
        AttrValue::Null => "None".to_string(),
        AttrValue::Bool(b) => python_bool(*b).to_string(),
        AttrValue::Int(n) => n.to_string(),
        AttrValue::Float(f) => python_float(*f),
        AttrValue::Text(text) => python_str(text),
        AttrValue::List(items) => format!("[{}]", items.iter().map(python_repr).join(", ")),
    }
}

pub fn python_bool(b: bool) -> &'static str {
    if b {
        "True"
    } else {
        "False"
    }
}

/// Shortest round-trip form, always with a fractional part or exponent.
pub fn python_float(f: f64) -> String {
    if f.is_nan() {
        "float('nan')".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "float('inf')" } else { "float('-inf')" }.to_string()
    } else {
        format!("{:?}", f)
    }
}

/// Single-quoted string literal.
pub fn python_str(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Dict literal with keys in map order (sorted for a `BTreeMap`).
pub fn python_dict(map: &BTreeMap<String, AttrValue>) -> String {
    format!(
        "{{{}}}",
        map.iter()
            .map(|(key, value)| format!("{}: {}", python_str(key), python_repr(value)))
            .join(", ")
    )
}

pub fn python_int_list(values: &[i64]) -> String {
    format!("[{}]", values.iter().join(", "))
}

/// Tuple literal; a single element keeps its trailing comma.
pub fn python_int_tuple(values: &[i64]) -> String {
    match values {
        [only] => format!("({},)", only),
        _ => format!("({})", values.iter().join(", ")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalars() {
        assert_eq!(python_arg(&AttrValue::Bool(true)), "True");
        assert_eq!(python_arg(&AttrValue::Bool(false)), "False");
        assert_eq!(python_arg(&AttrValue::Int(-3)), "-3");
        assert_eq!(python_arg(&AttrValue::Null), "None");
    }

    #[test]
    fn test_floats_keep_a_fraction_or_exponent() {
        assert_eq!(python_float(0.5), "0.5");
        assert_eq!(python_float(1.0), "1.0");
        assert_eq!(python_float(1e-5), "1e-5");
        assert_eq!(python_float(0.1), "0.1");
        assert_eq!(python_float(f64::INFINITY), "float('inf')");
    }

    #[test]
    fn test_strings_verbatim_in_arguments_quoted_in_repr() {
        let text = AttrValue::from("(3, 3)");
        assert_eq!(python_arg(&text), "(3, 3)");
        assert_eq!(python_repr(&text), "'(3, 3)'");
        assert_eq!(python_str("it's"), r"'it\'s'");
    }

    #[test]
    fn test_lists_and_dicts() {
        let list = AttrValue::List(vec![AttrValue::Int(1), AttrValue::from("b")]);
        assert_eq!(python_arg(&list), "[1, 'b']");

        let mut map = BTreeMap::new();
        map.insert("zeta".to_string(), AttrValue::Bool(true));
        map.insert("alpha".to_string(), AttrValue::Float(0.25));
        assert_eq!(python_dict(&map), "{'alpha': 0.25, 'zeta': True}");
        assert_eq!(python_dict(&BTreeMap::new()), "{}");
    }

    #[test]
    fn test_int_sequences() {
        assert_eq!(python_int_list(&[3, 16]), "[3, 16]");
        assert_eq!(python_int_list(&[]), "[]");
        assert_eq!(python_int_tuple(&[0]), "(0,)");
        assert_eq!(python_int_tuple(&[0, 2, 1]), "(0, 2, 1)");
        assert_eq!(python_int_tuple(&[]), "()");
    }
}
