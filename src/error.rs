//! Error types for the container.

use std::sync::Arc;

/// Resolution and configuration errors.
///
/// The variants follow the container's failure taxonomy: configuration
/// problems (the declarative model is incomplete or invalid), missing named
/// instances, cyclic dependency graphs, and build-plan execution failures.
/// `try_get_*` methods convert the absence-class variants
/// ([`Configuration`](BuildError::Configuration) and
/// [`MissingInstance`](BuildError::MissingInstance)) into `Ok(None)`; the
/// other variants always propagate.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BuildError {
    /// The declarative model has no usable registration for the plugin type.
    #[error("no configuration for plugin type {plugin_type}: {message}")]
    Configuration {
        /// The requested plugin type.
        plugin_type: &'static str,
        /// What was missing or invalid.
        message: String,
    },

    /// A named instance was requested but is not registered.
    #[error("no instance named '{name}' is registered for plugin type {plugin_type}")]
    MissingInstance {
        /// The requested plugin type.
        plugin_type: &'static str,
        /// The requested instance name.
        name: &'static str,
    },

    /// The build stack detected a plugin type resolving itself transitively.
    #[error("cyclic dependency detected: {}", .path.join(" -> "))]
    Cyclic {
        /// The chain of in-progress resolutions, ending with the repeat.
        path: Vec<String>,
    },

    /// A build plan failed while constructing an object.
    #[error("failure while building '{concrete_type}': {message}{}", format_stack(.stack))]
    Execution {
        /// The concrete type the failing plan was producing.
        concrete_type: &'static str,
        /// Root-cause description from the build-plan collaborator.
        message: String,
        /// Underlying error, when the collaborator supplied one.
        source: Option<Arc<dyn std::error::Error + Send + Sync>>,
        /// The build stack at the failing frame, outermost first.
        stack: Vec<String>,
    },

    /// A resolved object could not be downcast to the requested type.
    #[error("type mismatch resolving {0}")]
    TypeMismatch(&'static str),

    /// The owning container has been disposed.
    #[error("the container has been disposed")]
    Disposed,

    /// Aggregate report from `assert_configuration_is_valid`.
    #[error("configuration is not valid, {} failure(s):{}", .failures.len(), format_failures(.failures))]
    Invalid {
        /// Every per-instance failure collected during validation.
        failures: Vec<BuildError>,
    },
}

fn format_stack(stack: &[String]) -> String {
    if stack.is_empty() {
        return String::new();
    }
    let mut out = String::from("\nbuild stack:");
    for frame in stack {
        out.push_str("\n  ");
        out.push_str(frame);
    }
    out
}

fn format_failures(failures: &[BuildError]) -> String {
    let mut out = String::new();
    for failure in failures {
        out.push_str("\n  ");
        out.push_str(&failure.to_string().replace('\n', "\n  "));
    }
    out
}

impl BuildError {
    /// Configuration error for a plugin type with a detail message.
    pub fn configuration(plugin_type: &'static str, message: impl Into<String>) -> Self {
        BuildError::Configuration {
            plugin_type,
            message: message.into(),
        }
    }

    /// Execution failure wrapping a collaborator error as the root cause.
    ///
    /// The build stack is attached by the session at the failing frame.
    pub fn execution(
        concrete_type: &'static str,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        BuildError::Execution {
            concrete_type,
            message: source.to_string(),
            source: Some(Arc::new(source)),
            stack: Vec::new(),
        }
    }

    /// Execution failure from a plain message, with no underlying error.
    pub fn execution_message(concrete_type: &'static str, message: impl Into<String>) -> Self {
        BuildError::Execution {
            concrete_type,
            message: message.into(),
            source: None,
            stack: Vec::new(),
        }
    }

    /// Whether this error means "nothing is configured" rather than
    /// "something went wrong while building".
    pub fn is_absence(&self) -> bool {
        matches!(
            self,
            BuildError::Configuration { .. } | BuildError::MissingInstance { .. }
        )
    }

    /// Attaches the build stack to an `Execution` error that does not carry
    /// one yet. Other variants, and already-stacked executions, pass through.
    pub(crate) fn with_stack(self, frames: impl FnOnce() -> Vec<String>) -> Self {
        match self {
            BuildError::Execution {
                concrete_type,
                message,
                source,
                stack,
            } if stack.is_empty() => BuildError::Execution {
                concrete_type,
                message,
                source,
                stack: frames(),
            },
            other => other,
        }
    }
}

/// Result alias used throughout the container.
pub type BuildResult<T> = Result<T, BuildError>;
