//! Natural-language shell commands with a fail-fast executor and durable
//! history.
//!
//! A [`translator::Translator`] turns a request into candidate command lines,
//! the [`executor::SequentialExecutor`] gates each one through a
//! [`policy::CommandPolicy`] and runs them in order until the first failure,
//! and every attempt lands in a [`history::HistoryLog`].

pub mod agent;
pub mod bash_parser;
pub mod config;
pub mod error;
pub mod executor;
pub mod history;
pub mod i18n;
pub mod policy;
pub mod runner;
pub mod storage;
pub mod translator;
