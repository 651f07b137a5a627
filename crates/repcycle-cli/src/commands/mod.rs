pub mod config;
pub mod countdown;
pub mod interval;
pub mod session;
pub mod stopwatch;
pub mod work_rest;
