use serde::Serialize;

/// 任务层级：L1 收盘后日更、L2 日内轮询、SPECIAL 独立周程。
/// L3（按需实时）不进调度表，由实时缓存路径承接
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskTier {
    L1,
    L2,
    Special,
}

/// 任务到同步器入口的静态映射
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    SymbolList,
    DailyQuotes,
    Valuation,
    FundFlow,
    MarginTrade,
    DragonTiger,
    NorthboundFlow,
    MarketSentiment,
    SectorQuotes,
    TechIndicators,
    GlobalNews,
    StockNewsRotation,
    WatchlistQuotes,
    MinuteQuotes,
    NewsEmbeddings,
    FinancialStatements,
    NewsCleanup,
    DoctorCheck,
}

/// SPECIAL 任务的周程来源，具体坐标由配置给出
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialSchedule {
    /// 财务报表周度重扫（默认周六 20:00）
    FinancialWeekly,
    /// 新闻清理（默认周一 02:00）
    NewsCleanupWeekly,
    /// 数据医生巡检（每天 09:00）
    DailyHealthCheck,
}

/// 任务元数据，注册表加载后不可变
#[derive(Debug, Clone)]
pub struct TaskMetadata {
    pub name: &'static str,
    pub kind: TaskKind,
    pub tier: TaskTier,
    /// L1: 波次内 30 秒位差的倍数，错开建库压力；
    /// L2: 错峰间隔的倍数
    pub offset_multiplier: u32,
    pub special: Option<SpecialSchedule>,
    pub description: &'static str,
}

const fn task(
    name: &'static str,
    kind: TaskKind,
    tier: TaskTier,
    offset_multiplier: u32,
    description: &'static str,
) -> TaskMetadata {
    TaskMetadata {
        name,
        kind,
        tier,
        offset_multiplier,
        special: None,
        description,
    }
}

/// 全部定时任务的唯一事实来源。
/// tech_indicators 依赖 daily_quotes，通过更大的位差排在同波次之后
pub fn registry() -> Vec<TaskMetadata> {
    vec![
        // L1 日更组：收盘后统一执行，位差 30 秒递进
        task("daily-symbol-list-sync", TaskKind::SymbolList, TaskTier::L1, 0, "股票/ETF 列表同步"),
        task("daily-market-sync", TaskKind::DailyQuotes, TaskTier::L1, 1, "全市场日线同步"),
        task("daily-valuation-sync", TaskKind::Valuation, TaskTier::L1, 2, "估值数据同步"),
        task("daily-fund-flow-sync", TaskKind::FundFlow, TaskTier::L1, 3, "个股资金流同步"),
        task("daily-margin-trade-sync", TaskKind::MarginTrade, TaskTier::L1, 4, "两融数据同步"),
        task("daily-dragon-tiger-sync", TaskKind::DragonTiger, TaskTier::L1, 5, "龙虎榜同步"),
        task("daily-northbound-flow-sync", TaskKind::NorthboundFlow, TaskTier::L1, 6, "北向资金同步"),
        task("daily-market-sentiment-sync", TaskKind::MarketSentiment, TaskTier::L1, 7, "市场情绪同步"),
        task("daily-sector-sync", TaskKind::SectorQuotes, TaskTier::L1, 8, "板块行情同步"),
        task("daily-tech-indicator-calc", TaskKind::TechIndicators, TaskTier::L1, 10, "技术指标计算（依赖日线）"),
        // L2 日内组：固定间隔轮询，按倍数错峰
        task("intraday-global-news-sync", TaskKind::GlobalNews, TaskTier::L2, 0, "全市快讯同步"),
        task("intraday-stock-news-rotation-sync", TaskKind::StockNewsRotation, TaskTier::L2, 1, "自选股个股新闻轮询"),
        task("intraday-watchlist-quotes-sync", TaskKind::WatchlistQuotes, TaskTier::L2, 2, "自选股日线同步"),
        task("intraday-minute-quotes-sync", TaskKind::MinuteQuotes, TaskTier::L2, 3, "自选股分钟行情同步"),
        task("intraday-sector-quotes-sync", TaskKind::SectorQuotes, TaskTier::L2, 4, "板块行情日内刷新"),
        task("intraday-news-embeddings-gen", TaskKind::NewsEmbeddings, TaskTier::L2, 5, "新闻向量生成"),
        // SPECIAL 组：独立周程
        TaskMetadata {
            name: "weekly-financial-sync",
            kind: TaskKind::FinancialStatements,
            tier: TaskTier::Special,
            offset_multiplier: 0,
            special: Some(SpecialSchedule::FinancialWeekly),
            description: "财务报表全量重扫",
        },
        TaskMetadata {
            name: "weekly-news-cleanup",
            kind: TaskKind::NewsCleanup,
            tier: TaskTier::Special,
            offset_multiplier: 0,
            special: Some(SpecialSchedule::NewsCleanupWeekly),
            description: "过期新闻清理",
        },
        TaskMetadata {
            name: "daily-health-check",
            kind: TaskKind::DoctorCheck,
            tier: TaskTier::Special,
            offset_multiplier: 0,
            special: Some(SpecialSchedule::DailyHealthCheck),
            description: "数据健康巡检",
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_unique() {
        let tasks = registry();
        let mut names: Vec<&str> = tasks.iter().map(|t| t.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), tasks.len());
    }

    #[test]
    fn tech_indicators_scheduled_after_daily_quotes() {
        let tasks = registry();
        let daily = tasks
            .iter()
            .find(|t| t.kind == TaskKind::DailyQuotes)
            .unwrap();
        let tech = tasks
            .iter()
            .find(|t| t.kind == TaskKind::TechIndicators)
            .unwrap();
        assert_eq!(daily.tier, TaskTier::L1);
        assert_eq!(tech.tier, TaskTier::L1);
        assert!(tech.offset_multiplier > daily.offset_multiplier);
    }

    #[test]
    fn special_tasks_carry_schedule_source() {
        for t in registry() {
            match t.tier {
                TaskTier::Special => assert!(t.special.is_some(), "{}", t.name),
                _ => assert!(t.special.is_none(), "{}", t.name),
            }
        }
    }
}
