pub mod stock;
pub mod market_data;
pub mod financial;
pub mod valuation;
pub mod tech_indicator;
pub mod capital_flow;
pub mod sentiment;
pub mod news;
pub mod sector;
pub mod sync_error;
pub mod job_run;
pub mod doctor_report;

pub use stock::{NewStock, NewWatchlistEntry, Stock, WatchlistEntry};
pub use market_data::{DailyQuote, MinuteQuote, NewDailyQuote, NewMinuteQuote};
pub use financial::{Financial, NewFinancial};
pub use valuation::NewValuation;
pub use tech_indicator::{NewTechIndicator, TechIndicator};
pub use capital_flow::{NewDragonTiger, NewFundFlow, NewMarginTrade, NewNorthboundFlow};
pub use sentiment::{NewLimitUpStock, NewMarketSentiment};
pub use news::{NewNewsArticle, NewsArticle};
pub use sector::{NewSectorQuote, Sector};
pub use sync_error::{NewSyncError, SyncErrorRow};
pub use job_run::{JobRun, NewJobRun, UpdateJobRun};
pub use doctor_report::NewDoctorReport;
