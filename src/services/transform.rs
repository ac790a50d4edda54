use polars::prelude::*;
use serde::Serialize;

use crate::services::errors::SourceError;

/// 单批清洗计数，随任务进度上报
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct CleanStats {
    pub input: usize,
    pub accepted: usize,
    /// 规则 1：主键字段为空
    pub rejected_null_key: usize,
    /// 规则 2：价格倒挂或非正
    pub rejected_inversion: usize,
    /// 规则 3：涨跌幅超出 ±30%
    pub rejected_limit: usize,
    /// 规则 4：主键重复（保留最后一条）
    pub deduped: usize,
}

impl CleanStats {
    pub fn rejected(&self) -> usize {
        self.rejected_null_key + self.rejected_inversion + self.rejected_limit
    }

    /// 拒绝率过半视为上游结构变化而非脏数据
    pub fn guard_drift(&self) -> Result<(), SourceError> {
        if self.input > 0 && self.rejected() * 2 > self.input {
            return Err(SourceError::SchemaDrift(format!(
                "rejected {}/{} rows in batch",
                self.rejected(),
                self.input
            )));
        }
        Ok(())
    }
}

/// OHLC 行情帧清洗：依序应用
/// 1. 主键空值剔除  2. 价格倒挂/出界/非正剔除  3. 涨跌停阈值剔除  4. 主键去重（保留末条）
///
/// 要求列：code (str), trade_date (date)，open/high/low/close/change_pct (f64)。
/// 保留行满足 low <= open,close <= high 且全部价格为正；
/// 价格为空的行不按倒挂处理，仅剔除确实违反不变量的行
pub fn clean_daily_bars(df: DataFrame) -> PolarsResult<(DataFrame, CleanStats)> {
    let mut stats = CleanStats {
        input: df.height(),
        ..Default::default()
    };

    let keyed = df
        .lazy()
        .filter(col("code").is_not_null().and(col("trade_date").is_not_null()))
        .collect()?;
    stats.rejected_null_key = stats.input - keyed.height();

    let inversion = col("high")
        .lt(col("low"))
        .fill_null(lit(false))
        .or(col("open").lt(col("low")).fill_null(lit(false)))
        .or(col("open").gt(col("high")).fill_null(lit(false)))
        .or(col("close").lt(col("low")).fill_null(lit(false)))
        .or(col("close").gt(col("high")).fill_null(lit(false)))
        .or(col("open").lt_eq(lit(0.0)).fill_null(lit(false)))
        .or(col("close").lt_eq(lit(0.0)).fill_null(lit(false)))
        .or(col("high").lt_eq(lit(0.0)).fill_null(lit(false)))
        .or(col("low").lt_eq(lit(0.0)).fill_null(lit(false)));
    let sane = keyed.lazy().filter(inversion.not()).collect()?;
    stats.rejected_inversion = stats.input - stats.rejected_null_key - sane.height();

    let over_limit = col("change_pct").abs().gt(lit(30.0)).fill_null(lit(false));
    let limited = sane.lazy().filter(over_limit.not()).collect()?;
    stats.rejected_limit =
        stats.input - stats.rejected_null_key - stats.rejected_inversion - limited.height();

    let before_dedup = limited.height();
    let deduped = limited.unique_stable(
        Some(&["code".to_string(), "trade_date".to_string()]),
        UniqueKeepStrategy::Last,
        None,
    )?;
    stats.deduped = before_dedup - deduped.height();
    stats.accepted = deduped.height();

    Ok((deduped, stats))
}

/// 非 OHLC 帧清洗：仅规则 1（主键空值）与规则 4（去重保留末条）
pub fn clean_keyed(df: DataFrame, pk_cols: &[&str]) -> PolarsResult<(DataFrame, CleanStats)> {
    let mut stats = CleanStats {
        input: df.height(),
        ..Default::default()
    };

    let mut not_null = lit(true);
    for pk in pk_cols {
        not_null = not_null.and(col(*pk).is_not_null());
    }
    let keyed = df.lazy().filter(not_null).collect()?;
    stats.rejected_null_key = stats.input - keyed.height();

    let before_dedup = keyed.height();
    let subset: Vec<String> = pk_cols.iter().map(|s| s.to_string()).collect();
    let deduped = keyed.unique_stable(Some(&subset), UniqueKeepStrategy::Last, None)?;
    stats.deduped = before_dedup - deduped.height();
    stats.accepted = deduped.height();

    Ok((deduped, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bar_frame(rows: &[(Option<&str>, f64, f64, f64, f64, f64)]) -> DataFrame {
        let codes: Vec<Option<String>> = rows.iter().map(|r| r.0.map(|s| s.to_string())).collect();
        let dates: Vec<NaiveDate> = rows
            .iter()
            .enumerate()
            .map(|(i, _)| NaiveDate::from_ymd_opt(2024, 1, 15 + i as u32 % 5).unwrap())
            .collect();
        let open: Vec<f64> = rows.iter().map(|r| r.1).collect();
        let high: Vec<f64> = rows.iter().map(|r| r.2).collect();
        let low: Vec<f64> = rows.iter().map(|r| r.3).collect();
        let close: Vec<f64> = rows.iter().map(|r| r.4).collect();
        let pct: Vec<f64> = rows.iter().map(|r| r.5).collect();
        DataFrame::new(vec![
            Series::new("code", codes),
            Series::new("trade_date", dates),
            Series::new("open", open),
            Series::new("high", high),
            Series::new("low", low),
            Series::new("close", close),
            Series::new("change_pct", pct),
        ])
        .unwrap()
    }

    #[test]
    fn price_inversion_is_rejected() {
        // high < low 的行剔除，计入规则 2
        let df = bar_frame(&[
            (Some("000001"), 10.0, 11.0, 9.5, 10.5, 1.2),
            (Some("000001"), 10.0, 9.0, 10.0, 9.5, -0.8),
        ]);
        let (out, stats) = clean_daily_bars(df).unwrap();
        assert_eq!(out.height(), 1);
        assert_eq!(stats.rejected_inversion, 1);
        assert_eq!(stats.rejected_limit, 0);
        assert_eq!(stats.accepted, 1);
    }

    #[test]
    fn limit_breach_is_rejected() {
        let df = bar_frame(&[
            (Some("000001"), 10.0, 11.0, 9.5, 10.5, 31.0),
            (Some("000001"), 10.0, 11.0, 9.5, 10.5, -31.0),
            (Some("000001"), 10.0, 11.0, 9.5, 10.5, 9.9),
        ]);
        let (out, stats) = clean_daily_bars(df).unwrap();
        assert_eq!(out.height(), 1);
        assert_eq!(stats.rejected_limit, 2);
    }

    #[test]
    fn null_key_is_rejected_first() {
        let df = bar_frame(&[
            (None, 10.0, 11.0, 9.5, 10.5, 1.0),
            (Some("000001"), 10.0, 11.0, 9.5, 10.5, 1.0),
        ]);
        let (out, stats) = clean_daily_bars(df).unwrap();
        assert_eq!(out.height(), 1);
        assert_eq!(stats.rejected_null_key, 1);
    }

    #[test]
    fn duplicate_pk_keeps_last() {
        let codes = vec!["000001", "000001"];
        let dates = vec![
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        ];
        let close = vec![10.0f64, 99.0];
        let df = DataFrame::new(vec![
            Series::new("code", codes),
            Series::new("trade_date", dates),
            Series::new("open", vec![10.0f64, 10.0]),
            Series::new("high", vec![100.0f64, 100.0]),
            Series::new("low", vec![1.0f64, 1.0]),
            Series::new("close", close),
            Series::new("change_pct", vec![1.0f64, 1.0]),
        ])
        .unwrap();
        let (out, stats) = clean_daily_bars(df).unwrap();
        assert_eq!(out.height(), 1);
        assert_eq!(stats.deduped, 1);
        let kept = out.column("close").unwrap().f64().unwrap().get(0).unwrap();
        assert_eq!(kept, 99.0);
    }

    #[test]
    fn majority_rejection_flags_drift() {
        let df = bar_frame(&[
            (Some("000001"), -1.0, 11.0, 9.5, 10.5, 1.0),
            (Some("000002"), -1.0, 11.0, 9.5, 10.5, 1.0),
            (Some("000003"), 10.0, 11.0, 9.5, 10.5, 1.0),
        ]);
        let (_, stats) = clean_daily_bars(df).unwrap();
        assert!(stats.guard_drift().is_err());
    }

    #[test]
    fn clean_batch_passes_drift_guard() {
        let df = bar_frame(&[(Some("000001"), 10.0, 11.0, 9.5, 10.5, 1.0)]);
        let (_, stats) = clean_daily_bars(df).unwrap();
        assert!(stats.guard_drift().is_ok());
    }
}
