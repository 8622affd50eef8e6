// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WiringError {
    #[error(
        "Invalid name '{0}': names must be non-empty and contain only ASCII letters, digits and '_'"
    )]
    InvalidName(String),

    #[error("Scheduler already exists in model: {0}")]
    DuplicateScheduler(String),

    #[error("Input wire already exists on scheduler {scheduler}: {wire}")]
    DuplicateInputWire { scheduler: String, wire: String },

    #[error("Input wire already bound: {0}")]
    AlreadyBound(String),

    #[error("Component already bound to wiring: {0}")]
    ComponentAlreadyBound(String),

    #[error("Component {component} does not declare '{name}'")]
    UndeclaredHandler { component: String, name: String },

    #[error("Component {component} declares '{name}' more than once")]
    DuplicateDeclaration { component: String, name: String },

    #[error("Component {component} cannot declare '{name}': the name is used by its own derived wires")]
    ReservedDeclaration { component: String, name: String },

    #[error("'{name}' on {component} is declared as {declared}, requested as {requested}")]
    SignatureMismatch {
        component: String,
        name: String,
        declared: String,
        requested: String,
    },

    #[error("Derived wire '{name}' already exists with output type {existing}, requested {requested}")]
    DerivedWireTypeMismatch {
        name: String,
        existing: String,
        requested: String,
    },

    #[error("Router {router} already has an output of type {existing} for address {address}, requested {requested}")]
    RoutedTypeMismatch {
        router: String,
        address: String,
        existing: String,
        requested: String,
    },

    #[error("Model has unbound input wires: {}", .0.join(", "))]
    UnboundInputWires(Vec<String>),

    #[error("Operation not supported: {0}")]
    NotSupported(String),

    #[error("Not running: {0}")]
    NotRunning(String),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, WiringError>;

/// Check that a scheduler, wire or derived-wire name is usable in the model.
pub fn validate_name(name: &str) -> Result<()> {
    if !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        Ok(())
    } else {
        Err(WiringError::InvalidName(name.to_string()))
    }
}
