//! String builtins.
//!
//! Arguments arrive already converted to the declared parameter types, so a
//! non-string argument means the host table was called directly with bad
//! input.

use planardl_foundation::{Error, Result, Value};

fn string_arg<'a>(function: &str, args: &'a [Value], index: usize) -> Result<&'a str> {
    args.get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::extern_call(function, format!("argument {index} must be a String")))
}

/// `len(s) -> Int`, counting characters.
///
/// # Errors
///
/// Returns `ExternCall` if `s` is not a string.
pub fn len(args: &[Value]) -> Result<Value> {
    let s = string_arg("len", args, 0)?;
    i64::try_from(s.chars().count())
        .map(Value::Int)
        .map_err(|_| Error::extern_call("len", "length does not fit in an Int"))
}

/// `lower(s) -> String`
///
/// # Errors
///
/// Returns `ExternCall` if `s` is not a string.
pub fn lower(args: &[Value]) -> Result<Value> {
    Ok(Value::from(string_arg("lower", args, 0)?.to_lowercase()))
}

/// `upper(s) -> String`
///
/// # Errors
///
/// Returns `ExternCall` if `s` is not a string.
pub fn upper(args: &[Value]) -> Result<Value> {
    Ok(Value::from(string_arg("upper", args, 0)?.to_uppercase()))
}

/// `trim(s) -> String`
///
/// # Errors
///
/// Returns `ExternCall` if `s` is not a string.
pub fn trim(args: &[Value]) -> Result<Value> {
    Ok(Value::from(string_arg("trim", args, 0)?.trim()))
}

/// `starts_with(s, prefix)`
///
/// # Errors
///
/// Returns `ExternCall` if an argument is not a string.
pub fn starts_with(args: &[Value]) -> Result<Value> {
    let s = string_arg("starts_with", args, 0)?;
    let prefix = string_arg("starts_with", args, 1)?;
    Ok(Value::Bool(s.starts_with(prefix)))
}

/// `ends_with(s, suffix)`
///
/// # Errors
///
/// Returns `ExternCall` if an argument is not a string.
pub fn ends_with(args: &[Value]) -> Result<Value> {
    let s = string_arg("ends_with", args, 0)?;
    let suffix = string_arg("ends_with", args, 1)?;
    Ok(Value::Bool(s.ends_with(suffix)))
}

/// `contains(s, needle)`
///
/// # Errors
///
/// Returns `ExternCall` if an argument is not a string.
pub fn contains(args: &[Value]) -> Result<Value> {
    let s = string_arg("contains", args, 0)?;
    let needle = string_arg("contains", args, 1)?;
    Ok(Value::Bool(s.contains(needle)))
}

/// `is_pascal_case(s)`: an uppercase letter followed by letters and digits.
///
/// # Errors
///
/// Returns `ExternCall` if `s` is not a string.
pub fn is_pascal_case(args: &[Value]) -> Result<Value> {
    let s = string_arg("is_pascal_case", args, 0)?;
    let mut chars = s.chars();
    let ok = chars.next().is_some_and(|c| c.is_ascii_uppercase())
        && chars.all(|c| c.is_ascii_alphanumeric());
    Ok(Value::Bool(ok))
}

/// `is_snake_case(s)`: lowercase words joined by single underscores.
///
/// # Errors
///
/// Returns `ExternCall` if `s` is not a string.
pub fn is_snake_case(args: &[Value]) -> Result<Value> {
    let s = string_arg("is_snake_case", args, 0)?;
    let ok = s.starts_with(|c: char| c.is_ascii_lowercase())
        && s.split('_').all(|word| {
            !word.is_empty()
                && word
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        });
    Ok(Value::Bool(ok))
}

/// `to_int(s) -> Int?`, nil if `s` is not an integer.
///
/// # Errors
///
/// Returns `ExternCall` if `s` is not a string.
pub fn to_int(args: &[Value]) -> Result<Value> {
    let s = string_arg("to_int", args, 0)?;
    Ok(s.trim().parse::<i64>().map_or(Value::Nil, Value::Int))
}

/// `operator + (String, String) -> String`
///
/// # Errors
///
/// Returns `ExternCall` if an argument is not a string.
pub fn concat(args: &[Value]) -> Result<Value> {
    let left = string_arg("+", args, 0)?;
    let right = string_arg("+", args, 1)?;
    Ok(Value::from(format!("{left}{right}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use planardl_foundation::ErrorKind;

    fn call(f: fn(&[Value]) -> Result<Value>, args: &[&str]) -> Value {
        let args: Vec<Value> = args.iter().copied().map(Value::from).collect();
        f(&args).unwrap()
    }

    #[test]
    fn case_conversions() {
        assert_eq!(call(lower, &["WeB"]), Value::from("web"));
        assert_eq!(call(upper, &["web"]), Value::from("WEB"));
        assert_eq!(call(trim, &["  db \n"]), Value::from("db"));
        assert_eq!(call(len, &["héllo"]), Value::Int(5));
    }

    #[test]
    fn affixes() {
        assert_eq!(call(starts_with, &["nginx:1.25", "nginx"]), Value::Bool(true));
        assert_eq!(call(ends_with, &["nginx:1.25", "latest"]), Value::Bool(false));
        assert_eq!(call(contains, &["nginx:1.25", ":"]), Value::Bool(true));
        assert_eq!(call(concat, &["web", "-1"]), Value::from("web-1"));
    }

    #[test]
    fn naming_conventions() {
        for (s, pascal, snake) in [
            ("WebServer", true, false),
            ("web_server", false, true),
            ("web", false, true),
            ("Web2", true, false),
            ("web__server", false, false),
            ("_web", false, false),
            ("web_", false, false),
            ("", false, false),
        ] {
            assert_eq!(call(is_pascal_case, &[s]), Value::Bool(pascal), "{s}");
            assert_eq!(call(is_snake_case, &[s]), Value::Bool(snake), "{s}");
        }
    }

    #[test]
    fn to_int_is_nullable() {
        assert_eq!(call(to_int, &[" 42 "]), Value::Int(42));
        assert_eq!(call(to_int, &["forty-two"]), Value::Nil);
    }

    #[test]
    fn non_string_arguments_fail() {
        let err = lower(&[Value::Int(1)]).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::ExternCall { ref name, .. } if name == "lower"));
        assert!(starts_with(&[Value::from("a")]).is_err());
    }
}
