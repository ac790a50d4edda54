/// 股票/ETF 代码转东方财富 secid：沪市（6 开头股票、5 开头 ETF）前缀 1，
/// 深市与北交所前缀 0
pub fn code_to_secid(code: &str) -> String {
    let trimmed = code.trim();
    if trimmed.starts_with('6') || trimmed.starts_with('5') {
        format!("1.{}", trimmed)
    } else {
        format!("0.{}", trimmed)
    }
}

/// 按代码前缀推断市场归属
pub fn code_to_market(code: &str) -> &'static str {
    match code.trim().chars().next() {
        Some('6') | Some('5') => "SH",
        Some('0') | Some('3') | Some('1') => "SZ",
        _ => "BJ",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secid_prefixes() {
        assert_eq!(code_to_secid("600519"), "1.600519");
        assert_eq!(code_to_secid("510300"), "1.510300");
        assert_eq!(code_to_secid("000001"), "0.000001");
        assert_eq!(code_to_secid("830799"), "0.830799");
    }

    #[test]
    fn market_inference() {
        assert_eq!(code_to_market("600519"), "SH");
        assert_eq!(code_to_market("300750"), "SZ");
        assert_eq!(code_to_market("830799"), "BJ");
    }
}
