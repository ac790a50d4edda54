use polars::prelude::*;
use polars::series::ops::NullBehavior;

/// 均线窗口
pub const MA_PERIODS: [usize; 4] = [5, 10, 20, 60];
/// MACD (快, 慢, 信号)
pub const MACD_PARAMS: (usize, usize, usize) = (12, 26, 9);
pub const RSI_PERIOD: usize = 14;
/// KDJ (n, m1, m2)
pub const KDJ_PARAMS: (usize, usize, usize) = (9, 3, 3);
/// 布林带 (窗口, 倍数)
pub const BOLL_PARAMS: (usize, f64) = (20, 2.0);
pub const CCI_PERIOD: usize = 14;
pub const ATR_PERIOD: usize = 14;
/// 指标最大回看窗口（MA60）
pub const MAX_LOOKBACK: usize = 60;

fn rolling(window_size: usize) -> RollingOptionsFixedWindow {
    RollingOptionsFixedWindow {
        window_size,
        min_periods: window_size,
        ..Default::default()
    }
}

fn ewm(span: usize) -> EWMOptions {
    EWMOptions {
        alpha: 2.0 / (span as f64 + 1.0),
        adjust: false,
        ..Default::default()
    }
}

/// 对按 trade_date 升序的日线帧计算全部技术指标。
/// 输入列: trade_date, open, high, low, close (f64), volume (i64)。
/// 行数不足最大窗口时照常计算，前段窗口未满处为 null
pub fn calculate_all(df: DataFrame) -> PolarsResult<DataFrame> {
    let (fast, slow, signal) = MACD_PARAMS;
    let (kdj_n, kdj_m1, kdj_m2) = KDJ_PARAMS;
    let (boll_n, boll_k) = BOLL_PARAMS;

    let sorted = df
        .lazy()
        .sort(["trade_date"], SortMultipleOptions::default())
        .collect()?;

    // 第一阶段：不依赖其他派生列的指标
    let ma_cols: Vec<Expr> = MA_PERIODS
        .iter()
        .map(|p| {
            col("close")
                .rolling_mean(rolling(*p))
                .round(2)
                .alias(format!("ma{}", p).as_str())
        })
        .collect();

    let delta = col("close").diff(1, NullBehavior::Ignore);
    let gain = when(delta.clone().gt(lit(0.0)))
        .then(delta.clone())
        .otherwise(lit(0.0));
    let loss = when(delta.clone().lt(lit(0.0)))
        .then(delta.clone() * lit(-1.0))
        .otherwise(lit(0.0));
    let avg_gain = gain.rolling_mean(rolling(RSI_PERIOD));
    let avg_loss = loss.rolling_mean(rolling(RSI_PERIOD));
    let avg_loss_safe = when(avg_loss.clone().gt(lit(0.0)))
        .then(avg_loss)
        .otherwise(lit(0.0001));
    let rsi = (lit(100.0) - lit(100.0) / (lit(1.0) + avg_gain / avg_loss_safe))
        .round(4)
        .alias("rsi_14");

    let low_n = col("low").rolling_min(rolling(kdj_n));
    let high_n = col("high").rolling_max(rolling(kdj_n));
    let denom = high_n.clone() - low_n.clone();
    let denom_safe = when(denom.clone().gt(lit(0.0)))
        .then(denom)
        .otherwise(lit(0.0001));
    let rsv = ((col("close") - low_n) / denom_safe * lit(100.0)).alias("kdj_rsv");

    let boll_mid = col("close").rolling_mean(rolling(boll_n));
    let boll_std = col("close").rolling_std(rolling(boll_n));
    let boll_cols = [
        (boll_mid.clone() + lit(boll_k) * boll_std.clone())
            .round(2)
            .alias("boll_upper"),
        boll_mid.clone().round(2).alias("boll_middle"),
        (boll_mid - lit(boll_k) * boll_std).round(2).alias("boll_lower"),
    ];

    let tp = (col("high") + col("low") + col("close")) / lit(3.0);
    let tp_ma = tp.clone().rolling_mean(rolling(CCI_PERIOD));
    let tp_std = tp.clone().rolling_std(rolling(CCI_PERIOD));
    // 平均绝对偏差用滚动标准差近似
    let md_safe = when(tp_std.clone().gt(lit(0.0)))
        .then(tp_std)
        .otherwise(lit(0.0001));
    let cci = ((tp - tp_ma) / (lit(0.015) * md_safe)).round(4).alias("cci");

    let prev_close = col("close").shift(lit(1));
    let tr = polars::lazy::dsl::max_horizontal([
        col("high") - col("low"),
        (col("high") - prev_close.clone()).abs(),
        (col("low") - prev_close).abs(),
    ])?;
    let atr = tr.rolling_mean(rolling(ATR_PERIOD)).round(4).alias("atr");

    let signed_volume = when(delta.clone().gt(lit(0.0)))
        .then(col("volume"))
        .when(delta.lt(lit(0.0)))
        .then(col("volume") * lit(-1))
        .otherwise(lit(0));
    let obv = signed_volume.cum_sum(false).alias("obv");

    let ema_fast = col("close").ewm_mean(ewm(fast));
    let ema_slow = col("close").ewm_mean(ewm(slow));
    let dif = (ema_fast - ema_slow).alias("macd_dif");

    let mut stage1: Vec<Expr> = ma_cols;
    stage1.extend([rsi, rsv, atr, cci, obv, dif]);
    stage1.extend(boll_cols);

    // 第二阶段：DEA 依赖 DIF，K 依赖 RSV
    let dea = col("macd_dif").ewm_mean(ewm(signal)).alias("macd_dea");
    let k = col("kdj_rsv").ewm_mean(ewm(kdj_m1 * 2 - 1)).alias("kdj_k");

    // 第三阶段：BAR 依赖 DIF/DEA，D/J 依赖 K
    let bar = ((col("macd_dif") - col("macd_dea")) * lit(2.0))
        .round(4)
        .alias("macd_bar");
    let d = col("kdj_k").ewm_mean(ewm(kdj_m2 * 2 - 1)).alias("kdj_d");

    let j = (lit(3.0) * col("kdj_k") - lit(2.0) * col("kdj_d"))
        .round(4)
        .alias("kdj_j");

    sorted
        .lazy()
        .with_columns(stage1)
        .with_columns([dea, k])
        .with_columns([bar, d])
        .with_columns([
            j,
            col("macd_dif").round(4).alias("macd_dif"),
            col("macd_dea").round(4).alias("macd_dea"),
            col("kdj_k").round(4).alias("kdj_k"),
            col("kdj_d").round(4).alias("kdj_d"),
        ])
        .drop(["kdj_rsv"])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_frame(n: usize) -> DataFrame {
        let dates: Vec<NaiveDate> = (0..n)
            .map(|i| NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Days::new(i as u64))
            .collect();
        // 缓慢上行的走势，数值稳定便于断言
        let close: Vec<f64> = (0..n).map(|i| 10.0 + (i as f64) * 0.1).collect();
        let open: Vec<f64> = close.iter().map(|c| c - 0.05).collect();
        let high: Vec<f64> = close.iter().map(|c| c + 0.2).collect();
        let low: Vec<f64> = close.iter().map(|c| c - 0.2).collect();
        let volume: Vec<i64> = (0..n).map(|i| 1_000 + i as i64).collect();
        DataFrame::new(vec![
            Series::new("trade_date", dates),
            Series::new("open", open),
            Series::new("high", high),
            Series::new("low", low),
            Series::new("close", close),
            Series::new("volume", volume),
        ])
        .unwrap()
    }

    #[test]
    fn ma5_matches_hand_rolled_mean() {
        let df = sample_frame(80);
        let out = calculate_all(df).unwrap();
        let ma5 = out.column("ma5").unwrap().f64().unwrap();
        // 第 5 行（下标 4）= 前 5 个收盘价均值
        let expected = (10.0 + 10.1 + 10.2 + 10.3 + 10.4) / 5.0;
        assert!((ma5.get(4).unwrap() - expected).abs() < 1e-9);
        // 窗口未满处为 null
        assert!(ma5.get(3).is_none());
    }

    #[test]
    fn ma60_needs_sixty_bars() {
        let df = sample_frame(80);
        let out = calculate_all(df).unwrap();
        let ma60 = out.column("ma60").unwrap().f64().unwrap();
        assert!(ma60.get(58).is_none());
        assert!(ma60.get(59).is_some());
    }

    #[test]
    fn obv_accumulates_signed_volume() {
        let df = sample_frame(10);
        let out = calculate_all(df).unwrap();
        let obv = out.column("obv").unwrap().i64().unwrap();
        // 收盘价单调上行：OBV = 第 2 根起成交量的累加
        let expected: i64 = (1..10).map(|i| 1_000 + i as i64).sum();
        assert_eq!(obv.get(9).unwrap(), expected);
    }

    #[test]
    fn rsi_saturates_high_on_monotonic_rise() {
        let df = sample_frame(40);
        let out = calculate_all(df).unwrap();
        let rsi = out.column("rsi_14").unwrap().f64().unwrap();
        let last = rsi.get(39).unwrap();
        assert!(last > 99.0, "rsi = {}", last);
    }

    #[test]
    fn boll_brackets_the_middle() {
        let df = sample_frame(40);
        let out = calculate_all(df).unwrap();
        let upper = out.column("boll_upper").unwrap().f64().unwrap().get(39).unwrap();
        let middle = out.column("boll_middle").unwrap().f64().unwrap().get(39).unwrap();
        let lower = out.column("boll_lower").unwrap().f64().unwrap().get(39).unwrap();
        assert!(lower < middle && middle < upper);
    }
}
