mod config_parse;
mod scenario;
mod simulator;
mod support;
mod trace_output;
