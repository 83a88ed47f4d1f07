pub mod app;
pub mod commands;
pub mod context;
pub mod dispatch;
pub mod env;
pub mod history;
pub mod output;
pub mod prefix;
pub mod run;
pub mod runtime;
pub mod serve;
pub mod status;
pub mod tasks;
