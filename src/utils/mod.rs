pub mod config;
pub mod logging;
pub mod secid;
pub mod percent;
pub mod bigdecimal_parser;
pub mod http_client;
pub mod trading_day;
