//! Method-expression parser.
//!
//! Converts a signature such as `fn(a, b.c.*, 'lit', 3)` into a dependency
//! descriptor used to marshal call arguments from live data. Literal commas
//! inside arguments are escaped as `\,`.

use crate::error::{StoreError, StoreResult};
use crate::path;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One parsed argument of a method expression.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArgDesc {
    /// The argument text with any `.*` suffix removed.
    pub name: String,
    /// Concrete value for string/number literals; `None` for paths.
    pub literal: Option<Value>,
    /// True if the argument names a path below its root property.
    pub structured: bool,
    /// Root property of a path argument; empty for literals.
    pub root_property: String,
    /// True if the argument ended in `.*`.
    pub wildcard: bool,
}

impl ArgDesc {
    /// Returns true if this argument carries a literal value.
    #[inline]
    pub fn is_literal(&self) -> bool {
        self.literal.is_some()
    }

    /// The effect trigger path for this argument (`.*` restored for
    /// wildcards); `None` for literals.
    pub fn trigger_path(&self) -> Option<String> {
        if self.is_literal() {
            None
        } else if self.wildcard {
            Some(format!("{}.*", self.name))
        } else {
            Some(self.name.clone())
        }
    }
}

/// A parsed method signature: name, arguments, and whether every argument
/// is a literal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    /// The identifier before the opening parenthesis.
    pub method_name: String,
    /// Parsed arguments in declaration order.
    pub args: Vec<ArgDesc>,
    /// True iff every argument is a literal.
    pub is_static: bool,
}

impl Signature {
    /// Iterate the non-literal arguments (the signature's dependencies).
    pub fn dependencies(&self) -> impl Iterator<Item = &ArgDesc> {
        self.args.iter().filter(|a| !a.is_literal())
    }
}

/// Parse a method expression into a [`Signature`].
///
/// Returns [`StoreError::MalformedExpression`] when the input is not of the
/// form `ident(arg, ...)`.
pub fn parse(expression: &str) -> StoreResult<Signature> {
    let trimmed = expression.trim();
    let open = trimmed
        .find('(')
        .ok_or_else(|| StoreError::malformed_expression(expression))?;
    let close = trimmed
        .rfind(')')
        .filter(|&c| c > open)
        .ok_or_else(|| StoreError::malformed_expression(expression))?;

    let method_name = trimmed[..open].trim();
    if method_name.is_empty() || !is_identifier(method_name) {
        return Err(StoreError::malformed_expression(expression));
    }

    let inner = &trimmed[open + 1..close];
    let args: Vec<ArgDesc> = if inner.trim().is_empty() {
        Vec::new()
    } else {
        split_args(inner).iter().map(|raw| parse_arg(raw)).collect()
    };

    let is_static = args.iter().all(ArgDesc::is_literal);
    Ok(Signature {
        method_name: method_name.to_owned(),
        args,
        is_static,
    })
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Split an argument list on commas, honoring `\,` escapes.
fn split_args(list: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut chars = list.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                current.push(c);
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            ',' => {
                args.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    args.push(current);
    args
}

/// Drop one level of backslash escapes.
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn parse_arg(raw: &str) -> ArgDesc {
    let arg = unescape(raw.trim());

    let mut probe = arg.chars();
    let first = probe.next();
    let leading = match first {
        Some('-') => probe.next(),
        other => other,
    };

    if matches!(leading, Some(c) if c.is_ascii_digit()) {
        return ArgDesc {
            name: arg.clone(),
            literal: Some(parse_number(&arg)),
            structured: false,
            root_property: String::new(),
            wildcard: false,
        };
    }

    if matches!(first, Some('\'') | Some('"')) && arg.len() >= 2 {
        let inner = &arg[1..arg.len() - 1];
        return ArgDesc {
            name: inner.to_owned(),
            literal: Some(Value::String(inner.to_owned())),
            structured: false,
            root_property: String::new(),
            wildcard: false,
        };
    }

    let (name, wildcard) = match arg.strip_suffix(".*") {
        Some(base) => (base.to_owned(), true),
        None => (arg, false),
    };
    ArgDesc {
        root_property: path::root(&name).to_owned(),
        structured: path::is_deep(&name),
        name,
        literal: None,
        wildcard,
    }
}

fn parse_number(raw: &str) -> Value {
    if let Ok(i) = raw.parse::<i64>() {
        return Value::from(i);
    }
    match raw.parse::<f64>() {
        Ok(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Err(_) => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_basic() {
        let sig = parse("_computeFullName(firstName, lastName)").unwrap();
        assert_eq!(sig.method_name, "_computeFullName");
        assert_eq!(sig.args.len(), 2);
        assert_eq!(sig.args[0].name, "firstName");
        assert_eq!(sig.args[0].root_property, "firstName");
        assert!(!sig.args[0].structured);
        assert!(!sig.is_static);
    }

    #[test]
    fn test_parse_no_args() {
        let sig = parse("refresh()").unwrap();
        assert!(sig.args.is_empty());
        assert!(sig.is_static);
    }

    #[test]
    fn test_parse_literals() {
        let sig = parse("fn('lit', \"other\", 3, -2.5)").unwrap();
        assert_eq!(sig.args[0].literal, Some(json!("lit")));
        assert_eq!(sig.args[1].literal, Some(json!("other")));
        assert_eq!(sig.args[2].literal, Some(json!(3)));
        assert_eq!(sig.args[3].literal, Some(json!(-2.5)));
        assert!(sig.is_static);
    }

    #[test]
    fn test_parse_structured_and_wildcard() {
        let sig = parse("fn(a, b.c.d, e.*)").unwrap();
        assert!(!sig.args[0].structured);
        assert!(sig.args[1].structured);
        assert_eq!(sig.args[1].root_property, "b");
        assert!(sig.args[2].wildcard);
        assert_eq!(sig.args[2].name, "e");
        assert_eq!(sig.args[2].trigger_path().unwrap(), "e.*");
    }

    #[test]
    fn test_parse_escaped_comma() {
        let sig = parse(r"fn('a\,b', c)").unwrap();
        assert_eq!(sig.args.len(), 2);
        assert_eq!(sig.args[0].literal, Some(json!("a,b")));
        assert_eq!(sig.args[1].name, "c");
    }

    #[test]
    fn test_parse_malformed() {
        assert!(parse("no parens").is_err());
        assert!(parse("(args)").is_err());
        assert!(parse("fn(").is_err());
        assert!(parse("3fn(a)").is_err());
    }

    #[test]
    fn test_dependencies() {
        let sig = parse("fn(a, 'x', b.c)").unwrap();
        let deps: Vec<_> = sig.dependencies().map(|a| a.name.as_str()).collect();
        assert_eq!(deps, ["a", "b.c"]);
    }
}
