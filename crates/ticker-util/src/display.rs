//! Display helpers shared by the view projection and the CLI

/// Format an integer with `,` thousands separators (`1234567` → `1,234,567`).
pub fn format_count(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }

    out
}

/// `1 participant` / `N participants`
pub fn participant_label(count: u32) -> String {
    if count == 1 {
        "1 participant".to_string()
    } else {
        format!("{} participants", count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_grouping() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1000), "1,000");
        assert_eq!(format_count(1_234_567), "1,234,567");
    }

    #[test]
    fn participant_pluralization() {
        assert_eq!(participant_label(0), "0 participants");
        assert_eq!(participant_label(1), "1 participant");
        assert_eq!(participant_label(7), "7 participants");
    }
}
