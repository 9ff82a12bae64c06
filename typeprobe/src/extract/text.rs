//! Textual signature parsing
//!
//! Turns a parenthesized parameter description such as
//! `($self, /, sep=None, maxsplit=-1)` or a documentation line such as
//! `sorted(iterable, /, *, key=None, reverse=False)` into parameter counts.
//! No live reflection is involved.

use super::Binding;

/// Parameter counts recovered from a textual signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextShape {
    /// Parameters before the keyword-only marker.
    pub positional: usize,
    /// Parameters after the keyword-only marker.
    pub keyword_only: usize,
    /// A `$`-prefixed receiver marker was present.
    pub receiver: bool,
    /// A catch-all collector (`*args`, `**kwargs`, `...`) was present.
    pub variadic: bool,
    /// The first positional parameter is a bare `self` or `cls`.
    pub named_receiver: bool,
}

impl TextShape {
    /// Number of modelled parameters.
    pub fn arity(&self) -> usize {
        self.positional + self.keyword_only
    }

    /// Number of modelled parameters once a bare leading `self`/`cls` is
    /// consumed by a receiving binding.
    pub fn bound_arity(&self, binding: Binding) -> usize {
        if self.named_receiver && binding.has_receiver() {
            self.arity() - 1
        } else {
            self.arity()
        }
    }
}

/// Parse the first parenthesized group of `text`.
///
/// Returns `None` when there is no parameter list or it is unbalanced.
pub fn parse_text_signature(text: &str) -> Option<TextShape> {
    let open = text.find('(')?;
    let close = matching_paren(text, open)?;
    let inner = &text[open + 1..close];

    let mut shape = TextShape::default();
    let mut keyword_only = false;
    for token in split_top_level(inner) {
        let token = token.trim();
        match token {
            "" | "/" => continue,
            "*" => {
                keyword_only = true;
                continue;
            }
            "..." => {
                shape.variadic = true;
                continue;
            }
            _ => {}
        }
        if token.starts_with("**") {
            shape.variadic = true;
        } else if token.starts_with('*') {
            // `*args` collects the rest of the positionals.
            shape.variadic = true;
            keyword_only = true;
        } else if token.starts_with('$') {
            shape.receiver = true;
        } else if keyword_only {
            shape.keyword_only += 1;
        } else {
            if shape.positional == 0 && !shape.receiver && matches!(param_name(token), "self" | "cls") {
                shape.named_receiver = true;
            }
            shape.positional += 1;
        }
    }
    Some(shape)
}

/// Name part of a parameter token, without annotation or default.
fn param_name(token: &str) -> &str {
    token
        .split(|c| c == '=' || c == ':' || c == '[')
        .next()
        .unwrap_or(token)
        .trim()
}

/// Byte offset of the `)` closing the `(` at `open`.
fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (offset, c) in text[open..].char_indices() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return (c == ')').then_some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split on commas that are not nested in brackets or quotes.
fn split_top_level(inner: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in inner.char_indices() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&inner[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&inner[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receiver_and_keyword_only() {
        let shape = parse_text_signature("($self, /, length=1, byteorder='big', *, signed=False)").unwrap();
        insta::assert_debug_snapshot!(shape, @r"
        TextShape {
            positional: 2,
            keyword_only: 1,
            receiver: true,
            variadic: false,
            named_receiver: false,
        }
        ");
    }

    #[test]
    fn test_doc_line_with_name_prefix() {
        let shape = parse_text_signature("sorted(iterable, /, *, key=None, reverse=False)").unwrap();
        assert_eq!(shape.positional, 1);
        assert_eq!(shape.keyword_only, 2);
        assert_eq!(shape.arity(), 3);
        assert!(!shape.receiver);
    }

    #[test]
    fn test_empty_parameter_list() {
        assert_eq!(parse_text_signature("($self, /)").unwrap().arity(), 0);
        assert_eq!(parse_text_signature("f()").unwrap(), TextShape::default());
    }

    #[test]
    fn test_variadic_collectors_are_dropped() {
        let shape = parse_text_signature("S.format(*args, **kwargs) -> str").unwrap();
        assert_eq!(shape.arity(), 0);
        assert!(shape.variadic);

        let shape = parse_text_signature("print(value, ..., sep=' ', end='\\n')").unwrap();
        assert_eq!(shape.positional, 3);
        assert!(shape.variadic);
    }

    #[test]
    fn test_star_args_starts_keyword_only() {
        let shape = parse_text_signature("max(iterable, *[, default=obj, key=func]) -> value").unwrap();
        assert_eq!(shape.positional, 1);
        assert_eq!(shape.keyword_only, 0);

        let shape = parse_text_signature("f(a, *rest, flag)").unwrap();
        assert_eq!((shape.positional, shape.keyword_only), (1, 1));
    }

    #[test]
    fn test_nested_defaults_are_one_parameter() {
        let shape = parse_text_signature("f(a, b=(1, 2), c={'x': ','}, d='(')").unwrap();
        assert_eq!(shape.positional, 4);
    }

    #[test]
    fn test_optional_group_counts_once() {
        let shape = parse_text_signature("getattr(object, name[, default]) -> value").unwrap();
        assert_eq!(shape.positional, 2);
    }

    #[test]
    fn test_bare_receiver_is_consumed_by_binding() {
        let shape = parse_text_signature("(self, a, b=2)").unwrap();
        assert!(shape.named_receiver);
        assert_eq!(shape.arity(), 3);
        assert_eq!(shape.bound_arity(Binding::Instance), 2);
        assert_eq!(shape.bound_arity(Binding::Static), 3);

        let shape = parse_text_signature("(cls: type, /, data)").unwrap();
        assert_eq!(shape.bound_arity(Binding::Class), 1);

        // Only a leading one counts.
        let shape = parse_text_signature("(a, self)").unwrap();
        assert!(!shape.named_receiver);
        assert_eq!(shape.bound_arity(Binding::Instance), 2);
        let shape = parse_text_signature("($type, cls)").unwrap();
        assert_eq!(shape.bound_arity(Binding::Class), 1);
    }

    #[test]
    fn test_no_parameter_list() {
        assert_eq!(parse_text_signature("Return the absolute value."), None);
        assert_eq!(parse_text_signature("broken(a, b"), None);
        assert_eq!(parse_text_signature("mismatched(a]"), None);
    }
}
