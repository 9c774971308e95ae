// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A cheap error wrapper that labels where in a parser an error occurred.
//!
//! The label is always a string literal. Dynamic data belongs in the cause.

use std::error::Error;
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContextualError<E> {
    context: &'static str,
    cause: E,
}

impl<E> ContextualError<E> {
    pub fn new(cause: E, context: &'static str) -> Self {
        Self { context, cause }
    }

    pub fn context(&self) -> &'static str {
        self.context
    }

    pub fn cause(&self) -> &E {
        &self.cause
    }

    pub fn into_cause(self) -> E {
        self.cause
    }
}

impl<E: fmt::Display> fmt::Display for ContextualError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.context, self.cause)
    }
}

impl<E> Error for ContextualError<E>
where
    E: Error + 'static,
{
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.cause)
    }
}

/// Attach a static label to the error of a `Result`.
pub trait WithContext<T, E> {
    fn context(self, context: &'static str) -> Result<T, ContextualError<E>>;
}

impl<T, E> WithContext<T, E> for Result<T, E> {
    fn context(self, context: &'static str) -> Result<T, ContextualError<E>> {
        self.map_err(|cause| ContextualError::new(cause, context))
    }
}
