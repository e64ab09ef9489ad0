//! Error kinds and the scoped diagnostic context for RAW encode/decode.
//!
//! Every error carries the chain of "While RAW-coding type X" contexts that
//! were active when it was raised. Contexts are entered with [`ErrorContext`],
//! a guard that pops itself on drop on every exit path.

use std::cell::RefCell;

/// Errors raised while encoding or decoding RAW data.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RawError {
    /// A declared or required field length exceeds the available bits.
    #[error("{context}field length {needed} bits exceeds the available {available} bits")]
    LengthError {
        context: String,
        needed: usize,
        available: usize,
    },
    /// Fewer bits remain in the source than the descriptor demands.
    #[error("{context}message is incomplete: needed {needed} bits, {available} remain")]
    IncompleteMessage {
        context: String,
        needed: usize,
        available: usize,
    },
    /// Encoding a value that was never assigned.
    #[error("{context}encoding an unbound value")]
    UnboundValue { context: String },
    /// A value type has no RAW mapping at all (configuration error).
    #[error("{context}type has no RAW encoding")]
    UnsupportedEncoding { context: String },
    /// A length-to/pointer-to target cannot be resolved in the encoding tree.
    #[error("{context}cannot resolve calculated field: {detail}")]
    InvalidCalculatedField { context: String, detail: String },
}

impl RawError {
    pub fn length_error(needed: usize, available: usize) -> Self {
        RawError::LengthError {
            context: current_context(),
            needed,
            available,
        }
    }

    pub fn incomplete(needed: usize, available: usize) -> Self {
        RawError::IncompleteMessage {
            context: current_context(),
            needed,
            available,
        }
    }

    pub fn unbound() -> Self {
        RawError::UnboundValue {
            context: current_context(),
        }
    }

    pub fn unsupported() -> Self {
        RawError::UnsupportedEncoding {
            context: current_context(),
        }
    }

    pub fn invalid_calc(detail: impl Into<String>) -> Self {
        RawError::InvalidCalculatedField {
            context: current_context(),
            detail: detail.into(),
        }
    }
}

thread_local! {
    static CONTEXT: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
    static REPORTS: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// Scoped diagnostic context: pushes a "While RAW-coding type X" entry on
/// creation and pops it on drop, so the chain is correct on every exit path.
pub struct ErrorContext(());

impl ErrorContext {
    pub fn new(entry: impl Into<String>) -> Self {
        CONTEXT.with(|c| c.borrow_mut().push(entry.into()));
        ErrorContext(())
    }
}

impl Drop for ErrorContext {
    fn drop(&mut self) {
        CONTEXT.with(|c| {
            c.borrow_mut().pop();
        });
    }
}

/// The active context chain, formatted as an error prefix. Empty when no
/// context is active.
pub fn current_context() -> String {
    CONTEXT.with(|c| {
        let chain = c.borrow();
        if chain.is_empty() {
            String::new()
        } else {
            let mut s = chain.join(": ");
            s.push_str(": ");
            s
        }
    })
}

/// Record a diagnostic for the current thread. Speculative (silent) decode
/// attempts skip this, so only the committed path reports.
pub fn report(message: impl Into<String>) {
    REPORTS.with(|r| r.borrow_mut().push(message.into()));
}

/// Drain the diagnostics recorded so far on this thread.
pub fn take_reports() -> Vec<String> {
    REPORTS.with(|r| std::mem::take(&mut *r.borrow_mut()))
}
