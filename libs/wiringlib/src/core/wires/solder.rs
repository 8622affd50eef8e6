// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::fmt;

use serde::{Deserialize, Serialize};

/// How an output wire hands data to a soldered input wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolderType {
    /// Block until the destination has capacity.
    #[default]
    Put,
    /// Hand over only if the destination has capacity right now.
    Offer,
    /// Hand over immediately, ignoring capacity.
    Inject,
}

impl fmt::Display for SolderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Put => "PUT",
            Self::Offer => "OFFER",
            Self::Inject => "INJECT",
        })
    }
}
