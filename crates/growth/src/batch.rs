use chrono::NaiveDate;

/// Human-readable batch identifier: up to two 3-letter name prefixes plus the sowing date.
///
/// `"Romaine lettuce"` sown on 2024-03-01 becomes `"rom-let-2024mar01"`.
pub fn batch_id(material_name: &str, sown_on: NaiveDate) -> String {
    let mut parts: Vec<String> = material_name
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .take(2)
        .map(|word| word.chars().take(3).collect::<String>().to_lowercase())
        .collect();
    if parts.is_empty() {
        parts.push("crop".to_string());
    }
    parts.push(sown_on.format("%Y%b%d").to_string().to_lowercase());
    parts.join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_word_names_use_both_prefixes() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(batch_id("Romaine lettuce", day), "rom-let-2024mar01");
    }

    #[test]
    fn punctuation_and_short_words_are_handled() {
        let day = NaiveDate::from_ymd_opt(2023, 11, 9).unwrap();
        assert_eq!(batch_id("Bok-choy F1 hybrid", day), "bok-cho-2023nov09");
        assert_eq!(batch_id("  ", day), "crop-2023nov09");
    }
}
