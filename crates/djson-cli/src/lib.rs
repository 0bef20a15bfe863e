use djson_core::{Engine, Scope, Value};
use std::env;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::rc::Rc;

const DEFAULT_BUFFER_SIZE: usize = 4096;
const DEFAULT_INDENT: &str = "  ";

#[derive(Debug, Clone)]
enum InputSource {
    File(PathBuf),
    Literal(String),
    Stdin,
}

#[derive(Debug, Clone)]
struct CliOptions {
    input: InputSource,
    format: String,
    buffer_size: usize,
    indent: String,
    data: Option<String>,
}

pub fn run_from_env() -> Result<(), String> {
    run_from_args(env::args().skip(1).collect())
}

pub fn run_from_args(args: Vec<String>) -> Result<(), String> {
    let options = parse_args(args)?;
    let output = render(&options)?;
    println!("{output}");
    Ok(())
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut file: Option<PathBuf> = None;
    let mut literal: Option<String> = None;
    let mut format = "json".to_string();
    let mut buffer_size = DEFAULT_BUFFER_SIZE;
    let mut indent = DEFAULT_INDENT.to_string();
    let mut data: Option<String> = None;

    let mut i = 0usize;
    while i < args.len() {
        let token = &args[i];
        match token.as_str() {
            "--eval" | "-e" => {
                i += 1;
                literal = Some(
                    args.get(i)
                        .ok_or_else(|| "--eval requires a value".to_string())?
                        .to_string(),
                );
            }
            "--format" => {
                i += 1;
                format = args
                    .get(i)
                    .ok_or_else(|| "--format requires a value".to_string())?
                    .to_string();
            }
            "--buffer-size" => {
                i += 1;
                let value = args
                    .get(i)
                    .ok_or_else(|| "--buffer-size requires a value".to_string())?;
                buffer_size = value
                    .parse::<usize>()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| format!("invalid buffer size: {value}"))?;
            }
            "--indent" => {
                i += 1;
                indent = args
                    .get(i)
                    .ok_or_else(|| "--indent requires a value".to_string())?
                    .to_string();
            }
            "--data" => {
                i += 1;
                data = Some(
                    args.get(i)
                        .ok_or_else(|| "--data requires a value".to_string())?
                        .to_string(),
                );
            }
            "help" | "--help" | "-h" => return Err(help_text()),
            x if x.starts_with("--") => return Err(format!("unknown flag: {x}\n\n{}", help_text())),
            _ => {
                if file.is_some() {
                    return Err("only one FILE positional argument is allowed".to_string());
                }
                file = Some(PathBuf::from(token));
            }
        }
        i += 1;
    }

    if file.is_some() && literal.is_some() {
        return Err("pass either FILE or --eval, not both".to_string());
    }

    let input = match (file, literal) {
        (Some(path), None) => InputSource::File(path),
        (None, Some(source)) => InputSource::Literal(source),
        _ => InputSource::Stdin,
    };

    Ok(CliOptions {
        input,
        format,
        buffer_size,
        indent,
        data,
    })
}

fn render(options: &CliOptions) -> Result<String, String> {
    if options.format != "json" {
        return Err(format!("unknown output format: {}", options.format));
    }

    let engine = Engine::new();
    let mut scope = Scope::new();
    if let Some(payload) = load_data_payload(options.data.clone())? {
        scope.set(Rc::from("data"), Value::from(payload));
    }

    let value = match &options.input {
        InputSource::Literal(source) => engine
            .eval_with_scope(source, &mut scope)
            .map_err(|e| e.to_string())?,
        InputSource::File(path) => {
            let file =
                File::open(path).map_err(|e| format!("failed to open {}: {e}", path.display()))?;
            engine
                .eval_reader_with_scope(Box::new(file), options.buffer_size, &mut scope)
                .map_err(|e| e.to_string())?
        }
        InputSource::Stdin => engine
            .eval_reader_with_scope(Box::new(io::stdin()), options.buffer_size, &mut scope)
            .map_err(|e| e.to_string())?,
    };

    djson_core::encode(&value, &options.indent).map_err(|e| e.to_string())
}

/// `--data` accepts inline JSON or a path to a JSON file; either way the
/// parsed document is bound as the `data` variable.
fn load_data_payload(data: Option<String>) -> Result<Option<serde_json::Value>, String> {
    let Some(input) = data else {
        return Ok(None);
    };

    let as_path = PathBuf::from(&input);
    if as_path.exists() {
        let content = std::fs::read_to_string(&as_path)
            .map_err(|e| format!("failed to read {}: {e}", as_path.display()))?;
        let parsed = serde_json::from_str::<serde_json::Value>(&content)
            .map_err(|e| format!("invalid JSON in {}: {e}", as_path.display()))?;
        return Ok(Some(parsed));
    }

    let parsed = serde_json::from_str::<serde_json::Value>(&input)
        .map_err(|e| format!("invalid --data JSON: {e}"))?;
    Ok(Some(parsed))
}

fn help_text() -> String {
    [
        "djson CLI",
        "",
        "Usage:",
        "  djson [FILE] [--format json] [--buffer-size 4096] [--indent \"  \"]",
        "  djson --eval SOURCE [--data JSON_OR_PATH]",
        "",
        "Reads FILE (or stdin when no FILE and no --eval is given), evaluates",
        "it as a djson program, and writes the result of the last statement",
        "to stdout as JSON. --data binds a JSON document (inline or a file",
        "path) as the `data` variable before evaluation.",
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn unique_temp_file(prefix: &str, content: &str) -> PathBuf {
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "{}-{}-{}.djson",
            prefix,
            std::process::id(),
            ts
        ));
        std::fs::write(&path, content).expect("failed to write temp source");
        path
    }

    fn render_args(args: &[&str]) -> Result<String, String> {
        let options = parse_args(args.iter().map(|s| s.to_string()).collect())?;
        render(&options)
    }

    #[test]
    fn eval_flag_prints_the_last_statement() {
        assert_eq!(render_args(&["--eval", "5 + 2 * 3"]).expect("render"), "11");
    }

    #[test]
    fn indent_flag_shapes_the_output() {
        let out = render_args(&["--eval", "{\"a\": [1, 2]}", "--indent", " "])
            .expect("render");
        assert_eq!(out, "{\n \"a\": [\n  1,\n  2\n ]\n}");
        let compact = render_args(&["--eval", "{\"a\": [1, 2]}", "--indent", ""])
            .expect("render");
        assert_eq!(compact, "{\"a\":[1,2]}");
    }

    #[test]
    fn file_input_respects_buffer_size() {
        let path = unique_temp_file("djson-cli", "a = [1...5]; a.filter(v > 2)");
        let out = render_args(&[
            path.to_str().expect("utf8 temp path"),
            "--buffer-size",
            "3",
            "--indent",
            "",
        ])
        .expect("render");
        let parsed: serde_json::Value = serde_json::from_str(&out).expect("output is JSON");
        assert_eq!(parsed, serde_json::json!([3, 4, 5]));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn data_flag_binds_the_data_variable() {
        let out = render_args(&["--eval", "data.n * 2", "--data", "{\"n\": 21}"])
            .expect("render");
        assert_eq!(out, "42");
        let err =
            render_args(&["--eval", "1", "--data", "{not json"]).expect_err("bad data");
        assert!(err.contains("invalid --data JSON"));
    }

    #[test]
    fn unknown_format_and_flags_fail() {
        let err = render_args(&["--eval", "1", "--format", "yaml"]).expect_err("format");
        assert!(err.contains("unknown output format"));
        let err = parse_args(vec!["--frobnicate".to_string()]).expect_err("flag");
        assert!(err.contains("unknown flag"));
    }

    #[test]
    fn missing_file_fails_with_open_error() {
        let err = render_args(&["/nonexistent/definitely-missing.djson"]).expect_err("open");
        assert!(err.contains("failed to open"));
    }

    #[test]
    fn evaluation_errors_surface_with_their_code() {
        let err = render_args(&["--eval", "5 +"]).expect_err("parse error");
        assert!(err.contains("DJSON_E_PARSE"));
        let err = render_args(&["--eval", "nope.deep"]).expect_err("lookup error");
        assert!(err.contains("DJSON_E_LOOKUP"));
    }
}
