/// Replace `${VAR}` placeholders in raw config text from the process
/// environment.
///
/// Unresolvable variables are left as-is.
pub fn substitute_env(input: &str) -> String {
    substitute_env_with(input, |name| std::env::var(name).ok())
}

/// Replace `${VAR}` placeholders using a custom lookup.
pub(crate) fn substitute_env_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            // Unterminated: keep the remainder verbatim.
            out.push_str(&rest[start..]);
            return out;
        };
        let name = &after[..end];
        match lookup(name).filter(|_| is_var_name(name)) {
            Some(value) => out.push_str(&value),
            None => out.push_str(&rest[start..start + 2 + end + 1]),
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}

fn is_var_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "APRS_PASSCODE" => Some("12345".into()),
            "PB_HOST" => Some("pb.local".into()),
            _ => None,
        }
    }

    #[test]
    fn substitutes_known_vars() {
        assert_eq!(
            substitute_env_with("pass = \"${APRS_PASSCODE}\"\nurl = \"http://${PB_HOST}:8090\"", lookup),
            "pass = \"12345\"\nurl = \"http://pb.local:8090\""
        );
    }

    #[test]
    fn leaves_unknown_and_malformed() {
        assert_eq!(substitute_env_with("${RARSMS_MISSING}", lookup), "${RARSMS_MISSING}");
        assert_eq!(substitute_env_with("${}", lookup), "${}");
        assert_eq!(substitute_env_with("a ${APRS_PASSCODE", lookup), "a ${APRS_PASSCODE");
    }

    #[test]
    fn plain_text_untouched() {
        assert_eq!(substitute_env("callsign = \"W1AW\" # $5"), "callsign = \"W1AW\" # $5");
    }
}
