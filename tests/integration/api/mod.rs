//! HTTP route tests
//!
//! Requests go straight into the router with `tower::ServiceExt::oneshot`.

mod routes_test;
