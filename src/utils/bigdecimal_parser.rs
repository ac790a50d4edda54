use bigdecimal::BigDecimal;
use std::str::FromStr;

/// f64 转 BigDecimal；NaN/无穷返回 None。
/// 经十进制字符串中转，避免二进制浮点的尾数噪声入库
pub fn bigdecimal_from_f64(v: f64) -> Option<BigDecimal> {
    if !v.is_finite() {
        return None;
    }
    BigDecimal::from_str(&v.to_string()).ok()
}

/// Option<f64> 列值转 BigDecimal 列值
pub fn opt_bigdecimal(v: Option<f64>) -> Option<BigDecimal> {
    v.and_then(bigdecimal_from_f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finite_values_round_trip() {
        assert_eq!(
            bigdecimal_from_f64(12.34),
            Some(BigDecimal::from_str("12.34").unwrap())
        );
        assert_eq!(bigdecimal_from_f64(0.0), Some(BigDecimal::from(0)));
    }

    #[test]
    fn non_finite_is_none() {
        assert_eq!(bigdecimal_from_f64(f64::NAN), None);
        assert_eq!(bigdecimal_from_f64(f64::INFINITY), None);
        assert_eq!(opt_bigdecimal(None), None);
    }
}
