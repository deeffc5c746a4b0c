#[derive(thiserror::Error, Debug)]
pub enum ScopeErrorKind {
    #[error("No scope registered with name `{name}`")]
    UnknownScope { name: String },
    #[error("No session is active on this thread. Enter a session before using session-scoped beans")]
    NoSession,
    #[error("Scope `{name}` is built in and can't be replaced")]
    ReservedName { name: String },
    #[error("Scope `{scope}` teardown finished with failed destruction callbacks for: {}", failed.join(", "))]
    Teardown { scope: String, failed: Vec<String> },
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerErrorKind {
    #[error("Container is not active. Call `refresh` first")]
    NotActive,
    #[error("Container has been closed")]
    Closed,
}
