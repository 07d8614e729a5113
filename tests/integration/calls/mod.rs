//! Call lifecycle tests

mod call_flow_test;
mod race_test;
