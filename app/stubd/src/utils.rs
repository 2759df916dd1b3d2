//! Config helpers.

/// Expand `${VAR}` patterns with environment variable values.
///
/// Unknown variables expand to an empty string. An unterminated `${` is
/// kept verbatim.
pub fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                if let Ok(val) = std::env::var(&after[..end]) {
                    result.push_str(&val);
                }
                rest = &after[end + 1..];
            }
            None => {
                result.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    result.push_str(rest);
    result
}
