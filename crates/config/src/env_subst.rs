/// Expand `${NAME}` and `${NAME:-fallback}` references in raw config text.
///
/// The fallback applies when the variable is unset or empty. References that
/// cannot be resolved and carry no fallback are kept verbatim.
pub fn substitute_env(input: &str) -> String {
    substitute_with(input, |name| std::env::var(name).ok())
}

fn substitute_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let body = &rest[start + 2..];
        let Some(end) = body.find('}') else {
            // Unterminated reference, emit the remainder as-is.
            out.push_str(&rest[start..]);
            return out;
        };

        let reference = &body[..end];
        let (name, fallback) = match reference.split_once(":-") {
            Some((name, fallback)) => (name, Some(fallback)),
            None => (reference, None),
        };

        let resolved = if is_var_name(name) {
            match (lookup(name), fallback) {
                (Some(value), Some(fallback)) if value.is_empty() => Some(fallback.to_string()),
                (Some(value), _) => Some(value),
                (None, Some(fallback)) => Some(fallback.to_string()),
                (None, None) => None,
            }
        } else {
            None
        };

        match resolved {
            Some(value) => out.push_str(&value),
            None => out.push_str(&rest[start..start + 2 + end + 1]),
        }
        rest = &body[end + 1..];
    }

    out.push_str(rest);
    out
}

fn is_var_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
