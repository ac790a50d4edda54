/// 百分比字段归一：剥掉百分号，明显放大过的值（|v| > 100）按
/// 上游未除百的惯例折回。空串与占位符返回 None
pub fn normalize_percent_scalar<S: AsRef<str>>(s: S) -> Option<f64> {
    let raw = s.as_ref().trim();
    if raw.is_empty() || raw == "-" {
        return None;
    }
    let cleaned = raw.trim_end_matches('%').trim();
    let mut val = cleaned.parse::<f64>().ok()?;
    if val.abs() > 100.0 {
        val /= 100.0;
    }
    Some(val)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_percent_sign() {
        assert_eq!(normalize_percent_scalar("4.5%"), Some(4.5));
        assert_eq!(normalize_percent_scalar(" -3.2 % "), Some(-3.2));
    }

    #[test]
    fn folds_scaled_values() {
        assert_eq!(normalize_percent_scalar("350"), Some(3.5));
    }

    #[test]
    fn placeholders_are_none() {
        assert_eq!(normalize_percent_scalar(""), None);
        assert_eq!(normalize_percent_scalar("-"), None);
        assert_eq!(normalize_percent_scalar("n/a"), None);
    }
}
