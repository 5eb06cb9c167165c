// utils/phone.rs
//
// Pakistani MSISDNs reach us as `03001234567`, `923001234567` or
// `+923001234567`, and historical rows were stored in any of the three.
// Everything is compared on the 10 digit subscriber core.

const CORE_LEN: usize = 10;

/// The 10 digit subscriber number (`3001234567`), or `None` when the input
/// is not a Pakistani mobile number.
pub fn core_number(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let has_plus = trimmed.starts_with('+');

    let digits: String = trimmed
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '+'))
        .collect();

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let core = if let Some(rest) = digits.strip_prefix("92").filter(|r| r.len() == CORE_LEN) {
        rest
    } else if has_plus {
        return None;
    } else if let Some(rest) = digits.strip_prefix('0').filter(|r| r.len() == CORE_LEN) {
        rest
    } else if digits.len() == CORE_LEN {
        digits.as_str()
    } else {
        return None;
    };

    if !core.starts_with('3') {
        return None;
    }

    Some(core.to_string())
}

/// Canonical storage form for new rows.
pub fn to_e164(raw: &str) -> Option<String> {
    core_number(raw).map(|core| format!("+92{}", core))
}

/// Local, gateway and E.164 spellings of the same number, for lookups
/// against rows stored in any of them.
pub fn lookup_variants(raw: &str) -> Option<[String; 3]> {
    core_number(raw).map(|core| {
        [
            format!("0{}", core),
            format!("92{}", core),
            format!("+92{}", core),
        ]
    })
}

/// Format the SMS gateway expects (no plus sign).
pub fn to_gateway(raw: &str) -> Option<String> {
    core_number(raw).map(|core| format!("92{}", core))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_spellings_share_a_core() {
        for raw in ["+923001234567", "923001234567", "03001234567", "3001234567"] {
            assert_eq!(core_number(raw).as_deref(), Some("3001234567"), "{}", raw);
        }
    }

    #[test]
    fn separators_are_ignored() {
        assert_eq!(core_number("+92 300-123 4567").as_deref(), Some("3001234567"));
        assert_eq!(core_number("(0300) 1234567").as_deref(), Some("3001234567"));
    }

    #[test]
    fn variants_cover_every_stored_format() {
        let variants = lookup_variants("03001234567").unwrap();
        assert_eq!(
            variants,
            [
                "03001234567".to_string(),
                "923001234567".to_string(),
                "+923001234567".to_string()
            ]
        );
        assert_eq!(lookup_variants("+923001234567"), Some(variants.clone()));
        assert_eq!(lookup_variants("923001234567"), Some(variants));
    }

    #[test]
    fn rejects_non_pakistani_or_malformed_numbers() {
        assert_eq!(core_number(""), None);
        assert_eq!(core_number("0300123456"), None);
        assert_eq!(core_number("+443001234567"), None);
        assert_eq!(core_number("02134567890"), None);
        assert_eq!(core_number("0300abc4567"), None);
        assert_eq!(core_number("+03001234567"), None);
    }

    #[test]
    fn canonical_forms() {
        assert_eq!(to_e164("03001234567").as_deref(), Some("+923001234567"));
        assert_eq!(to_gateway("+923001234567").as_deref(), Some("923001234567"));
    }
}
