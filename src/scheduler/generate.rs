use chrono::{DateTime, Datelike, Days, Duration, NaiveTime, TimeZone, Utc};
use chrono_tz::Asia::Shanghai;

use crate::scheduler::registry::{SpecialSchedule, TaskKind, TaskMetadata, TaskTier};
use crate::utils::config::{SchedulePolicy, WeeklySpec};

/// L1 波次内的位差步长（秒）
const L1_SLOT_SECONDS: u32 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// 6 字段 cron（秒 分 时 日 月 周），Asia/Shanghai
    Cron(String),
    Interval {
        every_seconds: u64,
        initial_delay_seconds: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerSpec {
    pub task_name: &'static str,
    pub kind: TaskKind,
    pub trigger: Trigger,
}

/// 注册表 + 策略旋钮 → 具体触发器集合。
/// 纯函数：相同输入产出完全相同的调度集（可 diff、可测试）
pub fn generate_schedule(
    registry: &[TaskMetadata],
    policy: &SchedulePolicy,
    financial: WeeklySpec,
    cleanup: WeeklySpec,
) -> Vec<TriggerSpec> {
    registry
        .iter()
        .map(|meta| TriggerSpec {
            task_name: meta.name,
            kind: meta.kind,
            trigger: trigger_for(meta, policy, financial, cleanup),
        })
        .collect()
}

fn trigger_for(
    meta: &TaskMetadata,
    policy: &SchedulePolicy,
    financial: WeeklySpec,
    cleanup: WeeklySpec,
) -> Trigger {
    match meta.tier {
        TaskTier::L1 => {
            let (hour, minute) = policy.l1_daily_time;
            let offset = meta.offset_multiplier * L1_SLOT_SECONDS;
            let total = hour * 3600 + minute * 60 + offset;
            // 位差越过午夜属于配置错误量级的偏移，取模保持合法 cron
            let total = total % 86_400;
            Trigger::Cron(format!(
                "{} {} {} * * *",
                total % 60,
                (total / 60) % 60,
                total / 3600
            ))
        }
        TaskTier::L2 => Trigger::Interval {
            every_seconds: policy.l2_interval_seconds,
            initial_delay_seconds: meta.offset_multiplier as u64 * policy.l2_task_offset_seconds,
        },
        TaskTier::Special => {
            let spec = match meta.special {
                Some(SpecialSchedule::FinancialWeekly) => financial,
                Some(SpecialSchedule::NewsCleanupWeekly) => cleanup,
                Some(SpecialSchedule::DailyHealthCheck) => {
                    return Trigger::Cron("0 0 9 * * *".to_string());
                }
                // 注册表测试保证 SPECIAL 任务都带周程来源
                None => {
                    return Trigger::Cron("0 0 9 * * *".to_string());
                }
            };
            Trigger::Cron(format!(
                "0 {} {} * * {}",
                spec.minute, spec.hour, spec.day_of_week
            ))
        }
    }
}

/// 由触发器推算下次触发时刻。
/// cron 只需覆盖本生成器产出的两种形态：每日与每周定点；
/// 间隔触发以最近一次启动时间外推，未跑过则按首次错峰延迟
pub fn next_fire(
    trigger: &Trigger,
    now: DateTime<Utc>,
    last_started: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    match trigger {
        Trigger::Cron(expr) => {
            let (sec, minute, hour, dow) = parse_own_cron(expr)?;
            let time = NaiveTime::from_hms_opt(hour, minute, sec)?;
            let now_cn = now.with_timezone(&Shanghai);
            let mut date = now_cn.date_naive();
            if now_cn.time() >= time {
                date = date + Days::new(1);
            }
            if let Some(dow) = dow {
                while date.weekday().num_days_from_sunday() != dow {
                    date = date + Days::new(1);
                }
            }
            match Shanghai.from_local_datetime(&date.and_time(time)) {
                chrono::LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
                chrono::LocalResult::Ambiguous(dt, _) => Some(dt.with_timezone(&Utc)),
                chrono::LocalResult::None => None,
            }
        }
        Trigger::Interval {
            every_seconds,
            initial_delay_seconds,
        } => match last_started {
            Some(last) => {
                let next = last + Duration::seconds(*every_seconds as i64);
                // 守护进程停过的话外推值已成过去，给出下界
                Some(next.max(now))
            }
            None => Some(now + Duration::seconds(*initial_delay_seconds as i64)),
        },
    }
}

/// 解析本生成器自己产出的 6 字段 cron（秒 分 时 * * 周|*）
fn parse_own_cron(expr: &str) -> Option<(u32, u32, u32, Option<u32>)> {
    let parts: Vec<&str> = expr.split_whitespace().collect();
    if parts.len() != 6 || parts[3] != "*" || parts[4] != "*" {
        return None;
    }
    let sec: u32 = parts[0].parse().ok()?;
    let minute: u32 = parts[1].parse().ok()?;
    let hour: u32 = parts[2].parse().ok()?;
    let dow = match parts[5] {
        "*" => None,
        raw => Some(raw.parse::<u32>().ok().filter(|d| *d <= 6)?),
    };
    Some((sec, minute, hour, dow))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::registry::registry;

    fn default_inputs() -> (SchedulePolicy, WeeklySpec, WeeklySpec) {
        (
            SchedulePolicy::default(),
            WeeklySpec {
                day_of_week: 6,
                hour: 20,
                minute: 0,
            },
            WeeklySpec {
                day_of_week: 1,
                hour: 2,
                minute: 0,
            },
        )
    }

    #[test]
    fn generation_is_deterministic() {
        let tasks = registry();
        let (policy, fin, cleanup) = default_inputs();
        let a = generate_schedule(&tasks, &policy, fin, cleanup);
        let b = generate_schedule(&tasks, &policy, fin, cleanup);
        assert_eq!(a, b);
        assert_eq!(a.len(), tasks.len());
    }

    #[test]
    fn l1_tasks_fire_at_daily_time_with_slots() {
        let tasks = registry();
        let (policy, fin, cleanup) = default_inputs();
        let specs = generate_schedule(&tasks, &policy, fin, cleanup);

        let market = specs
            .iter()
            .find(|s| s.task_name == "daily-market-sync")
            .unwrap();
        // 17:30 + 1*30s
        assert_eq!(market.trigger, Trigger::Cron("30 30 17 * * *".to_string()));

        let tech = specs
            .iter()
            .find(|s| s.task_name == "daily-tech-indicator-calc")
            .unwrap();
        // 17:30 + 10*30s = 17:35:00，晚于日线
        assert_eq!(tech.trigger, Trigger::Cron("0 35 17 * * *".to_string()));
    }

    #[test]
    fn l2_tasks_are_staggered() {
        let tasks = registry();
        let (policy, fin, cleanup) = default_inputs();
        let specs = generate_schedule(&tasks, &policy, fin, cleanup);

        let news = specs
            .iter()
            .find(|s| s.task_name == "intraday-global-news-sync")
            .unwrap();
        assert_eq!(
            news.trigger,
            Trigger::Interval {
                every_seconds: 300,
                initial_delay_seconds: 0
            }
        );

        let minute = specs
            .iter()
            .find(|s| s.task_name == "intraday-minute-quotes-sync")
            .unwrap();
        assert_eq!(
            minute.trigger,
            Trigger::Interval {
                every_seconds: 300,
                initial_delay_seconds: 360
            }
        );
    }

    #[test]
    fn special_tasks_use_configured_weekday() {
        let tasks = registry();
        let (policy, fin, cleanup) = default_inputs();
        let specs = generate_schedule(&tasks, &policy, fin, cleanup);

        let financial = specs
            .iter()
            .find(|s| s.task_name == "weekly-financial-sync")
            .unwrap();
        assert_eq!(financial.trigger, Trigger::Cron("0 0 20 * * 6".to_string()));

        let news_cleanup = specs
            .iter()
            .find(|s| s.task_name == "weekly-news-cleanup")
            .unwrap();
        assert_eq!(news_cleanup.trigger, Trigger::Cron("0 0 2 * * 1".to_string()));

        let doctor = specs
            .iter()
            .find(|s| s.task_name == "daily-health-check")
            .unwrap();
        assert_eq!(doctor.trigger, Trigger::Cron("0 0 9 * * *".to_string()));
    }

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        chrono::NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
            .and_utc()
    }

    #[test]
    fn daily_cron_next_fire_rolls_past_today() {
        let trigger = Trigger::Cron("30 30 17 * * *".to_string());
        // 北京时间 2024-01-15 10:00（UTC 02:00）：当天 17:30:30 还没到
        let now = utc(2024, 1, 15, 2, 0);
        let next = next_fire(&trigger, now, None).unwrap();
        assert_eq!(
            next.with_timezone(&Shanghai).to_rfc3339(),
            "2024-01-15T17:30:30+08:00"
        );
        // 北京时间 18:00 已过点，推到次日
        let now = utc(2024, 1, 15, 10, 0);
        let next = next_fire(&trigger, now, None).unwrap();
        assert_eq!(
            next.with_timezone(&Shanghai).to_rfc3339(),
            "2024-01-16T17:30:30+08:00"
        );
    }

    #[test]
    fn weekly_cron_next_fire_lands_on_weekday() {
        // 每周六 20:00；2024-01-15 是周一
        let trigger = Trigger::Cron("0 0 20 * * 6".to_string());
        let now = utc(2024, 1, 15, 2, 0);
        let next = next_fire(&trigger, now, None).unwrap();
        assert_eq!(
            next.with_timezone(&Shanghai).to_rfc3339(),
            "2024-01-20T20:00:00+08:00"
        );
    }

    #[test]
    fn interval_next_fire_extrapolates_from_last_run() {
        let trigger = Trigger::Interval {
            every_seconds: 300,
            initial_delay_seconds: 120,
        };
        let now = utc(2024, 1, 15, 2, 0);

        // 从未运行：首次错峰延迟
        assert_eq!(
            next_fire(&trigger, now, None).unwrap(),
            now + Duration::seconds(120)
        );
        // 2 分钟前跑过：上次启动 + 间隔
        let last = now - Duration::seconds(120);
        assert_eq!(
            next_fire(&trigger, now, Some(last)).unwrap(),
            last + Duration::seconds(300)
        );
        // 很久以前跑过：外推值被钳到当前时刻
        let stale = now - Duration::seconds(86_400);
        assert_eq!(next_fire(&trigger, now, Some(stale)).unwrap(), now);
    }

    #[test]
    fn foreign_cron_shapes_are_rejected() {
        assert!(parse_own_cron("0 0 2 1 * *").is_none());
        assert!(parse_own_cron("0 0 2 * * 7").is_none());
        assert!(parse_own_cron("bad").is_none());
    }

    #[test]
    fn policy_knobs_flow_through() {
        let tasks = registry();
        let (mut policy, fin, cleanup) = default_inputs();
        policy.l1_daily_time = (16, 0);
        policy.l2_interval_seconds = 600;
        policy.l2_task_offset_seconds = 60;
        let specs = generate_schedule(&tasks, &policy, fin, cleanup);

        let list = specs
            .iter()
            .find(|s| s.task_name == "daily-symbol-list-sync")
            .unwrap();
        assert_eq!(list.trigger, Trigger::Cron("0 0 16 * * *".to_string()));

        let rotation = specs
            .iter()
            .find(|s| s.task_name == "intraday-stock-news-rotation-sync")
            .unwrap();
        assert_eq!(
            rotation.trigger,
            Trigger::Interval {
                every_seconds: 600,
                initial_delay_seconds: 60
            }
        );
    }
}
