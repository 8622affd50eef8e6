// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use crate::core::error::Result;
use crate::core::wires::OutputWire;

impl<R: Clone + Send + 'static> OutputWire<R> {
    /// Wire carrying `transform` applied to each value. `None` results are dropped.
    ///
    /// Requesting the same `name` again returns the same wire; requesting it
    /// with a different output type fails.
    pub fn build_transformer<S, F>(
        &self,
        name: &str,
        input_name: &str,
        transform: F,
    ) -> Result<OutputWire<S>>
    where
        S: Clone + Send + 'static,
        F: Fn(R) -> Option<S> + Send + Sync + 'static,
    {
        self.derived("transformer", name, || {
            let (input, output) = self.build_direct_vertex::<S>(name, input_name)?;
            input.bind_optional(transform)?;
            tracing::debug!("[{}] Built transformer {}", self.owner(), name);
            Ok(output)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use crate::core::error::WiringError;
    use crate::core::model::WiringModel;
    use crate::core::scheduling::TaskSchedulerType;

    #[test]
    fn test_transform_and_suppress() {
        let model = WiringModel::new();
        let source = model
            .scheduler_builder::<i64>("source")
            .with_type(TaskSchedulerType::Direct)
            .build()
            .unwrap();
        let input = source.build_input_wire::<i64>("numbers").unwrap();
        input.bind(|x| x).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        source
            .output_wire()
            .build_transformer("describe", "values", |x: i64| {
                (x >= 0).then(|| format!("#{}", x))
            })
            .unwrap()
            .solder_to_consumer("collector", move |s: String| sink.lock().push(s))
            .unwrap();

        for x in [3, -1, 7] {
            input.put(x);
        }
        assert_eq!(*seen.lock(), vec!["#3".to_string(), "#7".to_string()]);
    }

    #[test]
    fn test_same_name_with_other_type_fails() {
        let model = WiringModel::new();
        let source = model
            .scheduler_builder::<u8>("source")
            .with_type(TaskSchedulerType::Direct)
            .build()
            .unwrap();
        let output = source.output_wire();

        output
            .build_transformer("widen", "values", |x: u8| Some(u32::from(x)))
            .unwrap();
        let err = output
            .build_transformer("widen", "values", |x: u8| Some(u64::from(x)))
            .unwrap_err();
        assert!(matches!(err, WiringError::DerivedWireTypeMismatch { .. }));
    }
}
