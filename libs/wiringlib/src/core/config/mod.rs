// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

pub mod model_config;
pub mod scheduler_config;

pub use model_config::WiringModelConfig;
pub use scheduler_config::TaskSchedulerConfiguration;
