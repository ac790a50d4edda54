use chrono::{Datelike, Days, NaiveDate, Utc, Weekday};
use chrono_tz::Asia::Shanghai;

/// 今天（北京时间）
pub fn today_cn() -> NaiveDate {
    Utc::now().with_timezone(&Shanghai).date_naive()
}

/// 最近一个应当有收盘数据的交易日：周末回退到上周五。
/// 节假日逻辑待接入交易日历。
pub fn latest_trading_day(today: NaiveDate) -> NaiveDate {
    let mut target = today;
    while matches!(target.weekday(), Weekday::Sat | Weekday::Sun) {
        target = target - Days::new(1);
    }
    target
}

/// 新鲜度允许的最大滞后天数：周一允许 3 天（跨周末），平日 1 天
pub fn freshness_allowance(today: NaiveDate) -> i64 {
    if today.weekday() == Weekday::Mon {
        3
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weekend_rolls_back_to_friday() {
        // 2024-01-13 是周六
        let sat = NaiveDate::from_ymd_opt(2024, 1, 13).unwrap();
        assert_eq!(
            latest_trading_day(sat),
            NaiveDate::from_ymd_opt(2024, 1, 12).unwrap()
        );
        let sun = NaiveDate::from_ymd_opt(2024, 1, 14).unwrap();
        assert_eq!(
            latest_trading_day(sun),
            NaiveDate::from_ymd_opt(2024, 1, 12).unwrap()
        );
    }

    #[test]
    fn weekday_is_unchanged() {
        let wed = NaiveDate::from_ymd_opt(2024, 1, 17).unwrap();
        assert_eq!(latest_trading_day(wed), wed);
    }

    #[test]
    fn monday_allows_three_days() {
        let mon = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(freshness_allowance(mon), 3);
        let tue = NaiveDate::from_ymd_opt(2024, 1, 16).unwrap();
        assert_eq!(freshness_allowance(tue), 1);
    }
}
