//! 抓取 → 清洗 → 行转换 → 幂等写入链路的场景测试。
//! 仓储以内存状态建模，幂等语义与 ON CONFLICT DO UPDATE 一致。

use std::collections::BTreeMap;

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use polars::prelude::*;
use proptest::prelude::*;

use leeksaver::models::NewDailyQuote;
use leeksaver::repositories::chunk::rows_per_chunk;
use leeksaver::services::transform::clean_daily_bars;
use leeksaver::sync::daily_quote::frame_to_rows;

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
}

/// 模拟上游：一只股票 2024-01-15..19 的 5 根日线
fn bars_for(code: &str) -> DataFrame {
    let dates: Vec<NaiveDate> = (15..20).map(date).collect();
    let n = dates.len();
    let close: Vec<f64> = (0..n).map(|i| 10.0 + i as f64 * 0.1).collect();
    let open: Vec<f64> = close.iter().map(|c| c - 0.05).collect();
    let high: Vec<f64> = close.iter().map(|c| c + 0.3).collect();
    let low: Vec<f64> = close.iter().map(|c| c - 0.3).collect();
    DataFrame::new(vec![
        Series::new("code", vec![code.to_string(); n]),
        Series::new("trade_date", dates),
        Series::new("open", open),
        Series::new("high", high),
        Series::new("low", low),
        Series::new("close", close),
        Series::new("volume", vec![1_000_000i64; n]),
        Series::new("amount", vec![1.0e7f64; n]),
        Series::new("change", vec![0.1f64; n]),
        Series::new("change_pct", vec![1.0f64; n]),
        Series::new("turnover_rate", vec![0.8f64; n]),
    ])
    .unwrap()
}

type Store = BTreeMap<(String, NaiveDate), Option<BigDecimal>>;

/// 幂等 upsert 的内存模型：分块后按主键覆盖写
fn apply_upsert(store: &mut Store, rows: &[NewDailyQuote]) {
    for chunk in rows.chunks(rows_per_chunk(11)) {
        for row in chunk {
            store.insert((row.code.clone(), row.trade_date), row.close.clone());
        }
    }
}

#[test]
fn happy_daily_sync_writes_fifteen_rows() {
    let codes = ["000001", "600519", "300750"];
    let mut store = Store::new();

    for code in codes {
        let (clean, stats) = clean_daily_bars(bars_for(code)).unwrap();
        assert!(stats.guard_drift().is_ok());
        assert_eq!(stats.accepted, 5);
        let rows = frame_to_rows(&clean).unwrap();
        apply_upsert(&mut store, &rows);
    }
    assert_eq!(store.len(), 15);

    // 重跑一遍，状态不变（幂等）
    let snapshot = store.clone();
    for code in codes {
        let (clean, _) = clean_daily_bars(bars_for(code)).unwrap();
        let rows = frame_to_rows(&clean).unwrap();
        apply_upsert(&mut store, &rows);
    }
    assert_eq!(store, snapshot);
}

#[test]
fn price_inversion_skips_write_without_error() {
    // high=9.0 < low=10.0 的单行
    let df = DataFrame::new(vec![
        Series::new("code", vec!["000001"]),
        Series::new("trade_date", vec![date(15)]),
        Series::new("open", vec![9.5f64]),
        Series::new("high", vec![9.0f64]),
        Series::new("low", vec![10.0f64]),
        Series::new("close", vec![9.5f64]),
        Series::new("volume", vec![100i64]),
        Series::new("amount", vec![950.0f64]),
        Series::new("change", vec![0.0f64]),
        Series::new("change_pct", vec![0.0f64]),
        Series::new("turnover_rate", vec![0.1f64]),
    ])
    .unwrap();

    let (clean, stats) = clean_daily_bars(df).unwrap();
    assert_eq!(stats.rejected_inversion, 1);
    assert_eq!(stats.accepted, 0);

    let rows = frame_to_rows(&clean).unwrap();
    let mut store = Store::new();
    apply_upsert(&mut store, &rows);
    assert!(store.is_empty());
}

#[test]
fn rerun_after_partial_write_converges() {
    // 先只写一个分片，再全量重跑，终态与一次性全量一致
    let (clean, _) = clean_daily_bars(bars_for("000001")).unwrap();
    let rows = frame_to_rows(&clean).unwrap();

    let mut partial = Store::new();
    apply_upsert(&mut partial, &rows[..2]);
    apply_upsert(&mut partial, &rows);

    let mut full = Store::new();
    apply_upsert(&mut full, &rows);
    assert_eq!(partial, full);
}

proptest! {
    // P1: 清洗后的行满足 low <= min(open,close) <= max(open,close) <= high
    // 且 |change_pct| <= 30
    #[test]
    fn accepted_rows_respect_price_invariants(
        raw in proptest::collection::vec(
            (0.01f64..100.0, 0.01f64..100.0, 0.01f64..100.0, 0.01f64..100.0, -50.0f64..50.0),
            1..40,
        )
    ) {
        let n = raw.len();
        let dates: Vec<NaiveDate> = (0..n).map(|i| {
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Days::new(i as u64)
        }).collect();
        let df = DataFrame::new(vec![
            Series::new("code", vec!["000001".to_string(); n]),
            Series::new("trade_date", dates),
            Series::new("open", raw.iter().map(|r| r.0).collect::<Vec<_>>()),
            Series::new("high", raw.iter().map(|r| r.1).collect::<Vec<_>>()),
            Series::new("low", raw.iter().map(|r| r.2).collect::<Vec<_>>()),
            Series::new("close", raw.iter().map(|r| r.3).collect::<Vec<_>>()),
            Series::new("volume", vec![100i64; n]),
            Series::new("amount", vec![1000.0f64; n]),
            Series::new("change", vec![0.0f64; n]),
            Series::new("change_pct", raw.iter().map(|r| r.4).collect::<Vec<_>>()),
            Series::new("turnover_rate", vec![0.5f64; n]),
        ]).unwrap();

        let (clean, stats) = clean_daily_bars(df).unwrap();
        prop_assert_eq!(stats.accepted, clean.height());

        let opens = clean.column("open").unwrap().f64().unwrap();
        let highs = clean.column("high").unwrap().f64().unwrap();
        let lows = clean.column("low").unwrap().f64().unwrap();
        let closes = clean.column("close").unwrap().f64().unwrap();
        let pcts = clean.column("change_pct").unwrap().f64().unwrap();
        for i in 0..clean.height() {
            let (o, h, l, c) = (
                opens.get(i).unwrap(),
                highs.get(i).unwrap(),
                lows.get(i).unwrap(),
                closes.get(i).unwrap(),
            );
            prop_assert!(l <= o.min(c), "low > min(open, close): {} {} {}", l, o, c);
            prop_assert!(o.max(c) <= h, "max(open, close) > high: {} {} {}", o, c, h);
            prop_assert!(l > 0.0 && h > 0.0);
            prop_assert!(pcts.get(i).unwrap().abs() <= 30.0);
        }
    }

    // P2: 同一批行重复 upsert 与只执行一次终态一致
    #[test]
    fn upsert_twice_equals_once(
        keys in proptest::collection::vec((0u32..50, 1u32..28), 1..200)
    ) {
        let rows: Vec<NewDailyQuote> = keys.iter().map(|(code, day)| NewDailyQuote {
            code: format!("{:06}", code),
            trade_date: date(*day),
            open: None,
            high: None,
            low: None,
            close: BigDecimal::try_from(*day as f64).ok(),
            volume: Some(1),
            amount: None,
            change: None,
            change_pct: None,
            turnover_rate: None,
        }).collect();

        let mut once = Store::new();
        apply_upsert(&mut once, &rows);

        let mut twice = Store::new();
        apply_upsert(&mut twice, &rows);
        apply_upsert(&mut twice, &rows);

        prop_assert_eq!(once, twice);
    }
}
