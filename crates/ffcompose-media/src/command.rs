//! FFmpeg argument vector construction.
//!
//! [`build_ffmpeg_args`] is a pure translation from a [`JobSpec`] to the
//! token list handed to the process supervisor: no I/O, no quoting, no
//! shell. Quoting exists only in [`render_command`], which produces the
//! human-readable line carried in logs and job results.

use ffcompose_models::{InputSource, JobSpec, OptionValue};

use crate::error::{MediaError, MediaResult};

/// Build the FFmpeg argument vector for a job.
///
/// Token order is fixed: global tokens, then `-i` per input (with any
/// per-input flags directly before their `-i`), then `-key value` options in
/// caller order, then the output path. Deterministic for a given spec.
pub fn build_ffmpeg_args(spec: &JobSpec) -> MediaResult<Vec<String>> {
    let mut args = Vec::new();

    for token in &spec.global_options {
        // A raw token with embedded spaces is a convenience form for several
        // tokens, unless the caller pre-quoted it themselves.
        if token.contains(' ') && !(token.starts_with('"') || token.starts_with('\'')) {
            args.extend(split_command_tokens(token)?);
        } else {
            args.push(token.clone());
        }
    }

    for input in &spec.input_files {
        match input {
            InputSource::Path(path) => {
                args.push("-i".to_string());
                args.push(path.clone());
            }
            InputSource::WithFlags(parts) => {
                let (path, flags) = parts.split_last().ok_or_else(|| {
                    MediaError::invalid_spec(
                        "input entry is an empty list; expected flag tokens followed by a path",
                    )
                })?;
                args.extend(flags.iter().cloned());
                args.push("-i".to_string());
                args.push(path.clone());
            }
        }
    }

    for (key, value) in &spec.options {
        append_option(&mut args, key, value)?;
    }

    args.push(spec.output_file.clone());

    Ok(args)
}

/// Emit the tokens for one `-key value` option.
fn append_option(args: &mut Vec<String>, key: &str, value: &OptionValue) -> MediaResult<()> {
    match value {
        OptionValue::Bool(true) => args.push(format!("-{key}")),
        // Absent-by-value: the caller kept the key but switched it off.
        OptionValue::Bool(false) | OptionValue::Null => {}
        OptionValue::Int(n) => {
            args.push(format!("-{key}"));
            args.push(n.to_string());
        }
        OptionValue::Float(x) => {
            args.push(format!("-{key}"));
            args.push(x.to_string());
        }
        OptionValue::Str(s) => {
            args.push(format!("-{key}"));
            args.push(s.clone());
        }
        OptionValue::List(items) => {
            for item in items {
                let rendered = match item {
                    OptionValue::Bool(b) => b.to_string(),
                    OptionValue::Int(n) => n.to_string(),
                    OptionValue::Float(x) => x.to_string(),
                    OptionValue::Str(s) => s.clone(),
                    OptionValue::List(_) | OptionValue::Null => {
                        return Err(MediaError::invalid_spec(format!(
                            "option '{key}' has a {} list element; only scalars can repeat a flag",
                            item.type_name()
                        )));
                    }
                };
                args.push(format!("-{key}"));
                args.push(rendered);
            }
        }
    }
    Ok(())
}

/// Split a raw token string with shell-style quoting rules.
///
/// Double- and single-quoted runs group into one token with the quotes
/// stripped; there is no escape processing. Unterminated quotes are an
/// error.
pub fn split_command_tokens(raw: &str) -> MediaResult<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;

    for ch in raw.chars() {
        match quote {
            Some(q) => {
                if ch == q {
                    quote = None;
                } else {
                    current.push(ch);
                }
            }
            None => match ch {
                '"' | '\'' => {
                    quote = Some(ch);
                    in_token = true;
                }
                c if c.is_whitespace() => {
                    if in_token {
                        tokens.push(std::mem::take(&mut current));
                        in_token = false;
                    }
                }
                c => {
                    current.push(c);
                    in_token = true;
                }
            },
        }
    }

    if quote.is_some() {
        return Err(MediaError::invalid_spec(format!(
            "unterminated quote in global option: {raw}"
        )));
    }
    if in_token {
        tokens.push(current);
    }

    Ok(tokens)
}

/// Render an argument vector for logs and error messages.
///
/// Tokens containing whitespace are wrapped in double quotes. Display only;
/// the engine never re-parses this string.
pub fn render_command(program: &str, args: &[String]) -> String {
    let mut rendered = Vec::with_capacity(args.len() + 1);
    rendered.push(quote_token(program));
    for arg in args {
        rendered.push(quote_token(arg));
    }
    rendered.join(" ")
}

fn quote_token(token: &str) -> String {
    if token.contains(char::is_whitespace) && !(token.starts_with('"') || token.starts_with('\'')) {
        format!("\"{token}\"")
    } else {
        token.to_string()
    }
}
