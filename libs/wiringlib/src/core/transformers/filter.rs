// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use crate::core::error::Result;
use crate::core::wires::OutputWire;

impl<R: Clone + Send + 'static> OutputWire<R> {
    /// Wire carrying only the values for which `predicate` holds.
    ///
    /// Requesting the same `name` again returns the same wire.
    pub fn build_filter<P>(
        &self,
        name: &str,
        input_name: &str,
        predicate: P,
    ) -> Result<OutputWire<R>>
    where
        P: Fn(&R) -> bool + Send + Sync + 'static,
    {
        self.derived("filter", name, || {
            let (input, output) = self.build_direct_vertex::<R>(name, input_name)?;
            input.bind_optional(move |value: R| predicate(&value).then_some(value))?;
            tracing::debug!("[{}] Built filter {}", self.owner(), name);
            Ok(output)
        })
    }
}
