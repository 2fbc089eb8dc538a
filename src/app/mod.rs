//! Job lifecycle around the crawl: triggering, isolation and reporting.

pub mod dispatcher;
pub mod job_store;
pub mod model;
pub mod queue;
pub mod runner;
pub mod worker;
