use std::fmt;

/// A marker type to indicate that a session timed out while idle.
#[derive(Debug)]
pub struct TimedOut;

impl fmt::Display for TimedOut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("timed out")
    }
}

impl std::error::Error for TimedOut {}

/// A marker type to indicate that a session ended before its first SETTINGS frame.
#[derive(Debug)]
pub struct SettingsNotReceived;

impl fmt::Display for SettingsNotReceived {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("settings not received")
    }
}

impl std::error::Error for SettingsNotReceived {}

/// A marker type to indicate that a session was torn down by its pool.
#[derive(Debug)]
pub struct SessionDestroyed;

impl fmt::Display for SessionDestroyed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("session destroyed")
    }
}

impl std::error::Error for SessionDestroyed {}

/// A marker type to indicate that an operation was canceled.
#[derive(Debug)]
pub struct OperationCanceled;

impl fmt::Display for OperationCanceled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("operation canceled")
    }
}

impl std::error::Error for OperationCanceled {}

/// A marker type to indicate that a session is no longer accepting streams.
#[derive(Debug)]
pub struct SessionClosing;

impl fmt::Display for SessionClosing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("session is closing")
    }
}

impl std::error::Error for SessionClosing {}
