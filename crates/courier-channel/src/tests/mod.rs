//! Behavioural test suites for the message channel.
