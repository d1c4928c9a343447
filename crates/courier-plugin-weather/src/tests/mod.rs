//! Behavioural test suites for the weather plugin.

mod behaviour;
