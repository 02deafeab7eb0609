/// Errors raised while binding or driving a render context.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("no GL context is current on the calling thread")]
    NoCurrentContext,

    #[error("GL function {0} could not be resolved in the current context")]
    MissingGlFunction(String),

    #[error("render context was already initialized for this surface")]
    AlreadyInitialized,

    #[error("render context is not bound")]
    NotBound,

    #[error("engine render context creation failed: {message} (code {code})")]
    Create { code: i32, message: String },

    #[error("engine render call failed: {message} (code {code})")]
    Render { code: i32, message: String },
}
