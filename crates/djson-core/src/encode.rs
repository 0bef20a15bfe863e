//! Indented JSON encoder over the read-only value surface.

use crate::error::{Error, Result};
use crate::value::{format_f64, Value};
use std::fmt::Write;

/// Serialize a value as JSON. An empty `indent` produces compact output;
/// anything else produces one element per line at `indent` per depth level.
/// Ranges materialize into arrays; an unresolved identifier is an error.
pub fn encode(value: &Value, indent: &str) -> Result<String> {
    let mut out = String::new();
    write_value(&mut out, value, indent, 0)?;
    Ok(out)
}

fn write_value(out: &mut String, value: &Value, indent: &str, depth: usize) -> Result<()> {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Int(n) => {
            let _ = write!(out, "{}", n);
        }
        Value::Float(f) => out.push_str(&format_f64(*f)),
        Value::Str(s) => write_string(out, s),
        Value::Array(arr) => {
            let items = arr.borrow();
            write_seq(out, items.len(), indent, depth, |out, idx| {
                write_value(out, &items[idx], indent, depth + 1)
            })?;
        }
        Value::Range(range) => {
            let len = range.len();
            write_seq(out, len, indent, depth, |out, idx| {
                let _ = write!(out, "{}", range.from + idx as i64);
                Ok(())
            })?;
        }
        Value::Object(obj) => {
            let obj = obj.borrow();
            let pairs = obj.pairs();
            if pairs.is_empty() {
                out.push_str("{}");
            } else {
                out.push('{');
                for (idx, (key, item)) in pairs.iter().enumerate() {
                    if idx > 0 {
                        out.push(',');
                    }
                    newline_pad(out, indent, depth + 1);
                    write_string(out, key);
                    out.push(':');
                    if !indent.is_empty() {
                        out.push(' ');
                    }
                    write_value(out, item, indent, depth + 1)?;
                }
                newline_pad(out, indent, depth);
                out.push('}');
            }
        }
        Value::Ident(id) => {
            return Err(Error::encode(format!(
                "cannot serialize unresolved identifier '{}'",
                id
            )))
        }
    }
    Ok(())
}

fn write_seq(
    out: &mut String,
    len: usize,
    indent: &str,
    depth: usize,
    mut write_item: impl FnMut(&mut String, usize) -> Result<()>,
) -> Result<()> {
    if len == 0 {
        out.push_str("[]");
        return Ok(());
    }
    out.push('[');
    for idx in 0..len {
        if idx > 0 {
            out.push(',');
        }
        newline_pad(out, indent, depth + 1);
        write_item(out, idx)?;
    }
    newline_pad(out, indent, depth);
    out.push(']');
    Ok(())
}

fn newline_pad(out: &mut String, indent: &str, depth: usize) {
    if indent.is_empty() {
        return;
    }
    out.push('\n');
    for _ in 0..depth {
        out.push_str(indent);
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Range;
    use serde_json::json;

    #[test]
    fn compact_output() {
        let value = Value::from(json!({"a": [1, 2], "b": "x"}));
        assert_eq!(
            encode(&value, "").expect("encode"),
            "{\"a\":[1,2],\"b\":\"x\"}"
        );
    }

    #[test]
    fn indented_output() {
        let value = Value::from(json!({"a": [1, 2]}));
        assert_eq!(
            encode(&value, "  ").expect("encode"),
            "{\n  \"a\": [\n    1,\n    2\n  ]\n}"
        );
    }

    #[test]
    fn scalars_and_trailing_zero_trimming() {
        assert_eq!(encode(&Value::Null, "").expect("encode"), "null");
        assert_eq!(encode(&Value::Bool(true), "").expect("encode"), "true");
        assert_eq!(encode(&Value::Float(2.0), "").expect("encode"), "2");
        assert_eq!(encode(&Value::Float(2.5), "").expect("encode"), "2.5");
    }

    #[test]
    fn strings_escape_for_valid_json() {
        let value = Value::str("a\"b\\c\nd");
        let encoded = encode(&value, "").expect("encode");
        assert_eq!(encoded, "\"a\\\"b\\\\c\\nd\"");
        let back: serde_json::Value =
            serde_json::from_str(&encoded).expect("encoder output re-parses");
        assert_eq!(back, json!("a\"b\\c\nd"));
    }

    #[test]
    fn ranges_materialize() {
        let value = Value::Range(Range { from: 1, to: 3 });
        assert_eq!(encode(&value, "").expect("encode"), "[1,2,3]");
    }

    #[test]
    fn encoded_output_reparses_to_the_same_tree() {
        let doc = json!({
            "s": "text",
            "n": 42,
            "f": 1.25,
            "flag": false,
            "nothing": null,
            "arr": [{"deep": [1, 2, 3]}]
        });
        let value = Value::from(doc.clone());
        for indent in ["", "  ", "\t"] {
            let encoded = encode(&value, indent).expect("encode");
            let back: serde_json::Value =
                serde_json::from_str(&encoded).expect("encoder output is valid JSON");
            assert_eq!(back, doc);
        }
    }
}
