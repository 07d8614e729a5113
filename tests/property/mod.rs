//! Property-based tests

mod delivery_proptest;
